//! HTTP API tests against a live server on an ephemeral port.

use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{fixture_yaml, rule_body, Layout, TestServer};

#[tokio::test]
async fn test_create_then_fetch_rule() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    let res = server
        .client
        .post(server.url("/api/rules"))
        .json(&rule_body("whoami"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().contains_key("x-request-id"));

    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["name"], "whoami");
    assert_eq!(created["fileName"], "whoami.yaml");
    assert_eq!(created["isValid"], true);

    let yaml = created["yamlContent"].as_str().unwrap();
    assert!(yaml.contains("Host(`whoami.example.com`)"));
    assert!(yaml.contains("http://10.0.0.5:8080"));
    assert!(yaml.contains("letsencrypt"));
    assert!(layout.dynamic().join("whoami.yaml").is_file());

    let fetched: Value = server
        .client
        .get(server.url(&format!("/api/rules/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], created["id"]);

    let res = server
        .client
        .get(server.url(&format!("/api/rules/{}/yaml", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/yaml"));
    assert!(res.text().await.unwrap().contains("whoami"));

    let middlewares: Vec<String> = server
        .client
        .get(server.url("/api/middlewares"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(middlewares, vec!["secure-headers".to_string()]);
}

#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    let first = server
        .client
        .post(server.url("/api/rules"))
        .json(&rule_body("api"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = server
        .client
        .post(server.url("/api/rules"))
        .json(&rule_body("api"))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("api"));

    let rules: Vec<Value> = server
        .client
        .get(server.url("/api/rules"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let named_api = rules.iter().filter(|r| r["name"] == "api").count();
    assert_eq!(named_api, 1);
    assert_eq!(rules.len(), 1);
}

#[tokio::test]
async fn test_shared_file_cannot_be_rewritten() {
    let layout = Layout::new();
    let shared = "http:\n  routers:\n    site:\n      rule: \"Host(`site.example.com`)\"\n      service: pool\n      entryPoints: [web]\n    admin:\n      rule: \"Host(`admin.example.com`)\"\n      service: pool\n      entryPoints: [web]\n  services:\n    pool:\n      loadBalancer:\n        servers:\n          - url: \"http://10.0.0.3\"\n";
    layout.write_dynamic("site.yaml", shared);
    let svc = layout.service(5).await;
    svc.sync_from_disk().await.unwrap();
    let server = TestServer::spawn(svc.clone()).await;

    let site = svc
        .list()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.spec.name == "site")
        .unwrap();
    let res = server
        .client
        .put(server.url(&format!("/api/rules/{}", site.id)))
        .json(&rule_body("site"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .delete(server.url(&format!("/api/rules/{}", site.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let on_disk = std::fs::read_to_string(layout.dynamic().join("site.yaml")).unwrap();
    assert_eq!(on_disk, shared);
}

#[tokio::test]
async fn test_invalid_payload_lists_field_errors() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    let res = server
        .client
        .post(server.url("/api/rules"))
        .json(&json!({ "name": "api", "backendUrl": "ftp://nowhere" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = res.json().await.unwrap();
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"hostname"));
    assert!(fields.iter().any(|f| f.starts_with("backendUrl")));
    assert!(!layout.dynamic().join("api.yaml").exists());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    let res = server
        .client
        .post(server.url("/api/rules"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_validate_endpoint() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    let res = server
        .client
        .post(server.url("/api/rules/validate"))
        .json(&json!({ "yamlContent": "http: : bad" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["valid"], false);

    let res = server
        .client
        .post(server.url("/api/rules/validate"))
        .json(&json!({ "yamlContent": fixture_yaml("web", "web.example.com", "http://10.0.0.1") }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["valid"], true);

    let res = server
        .client
        .post(server.url("/api/rules/validate"))
        .json(&rule_body("svc"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(!layout.dynamic().join("svc.yaml").exists());
}

#[tokio::test]
async fn test_unknown_rule_is_not_found() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    for path in ["/api/rules/missing", "/api/rules/missing/yaml"] {
        let res = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "GET {}", path);
    }

    let res = server
        .client
        .put(server.url("/api/rules/missing"))
        .json(&rule_body("missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server
        .client
        .delete(server.url("/api/rules/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_rename_and_delete() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    let created: Value = server
        .client
        .post(server.url("/api/rules"))
        .json(&rule_body("blog"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let mut body = rule_body("journal");
    body["hostname"] = json!("journal.example.com");
    let res = server
        .client
        .put(server.url(&format!("/api/rules/{}", id)))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["fileName"], "journal.yaml");
    assert!(layout.dynamic().join("journal.yaml").is_file());
    assert!(!layout.dynamic().join("blog.yaml").exists());

    let res = server
        .client
        .delete(server.url(&format!("/api/rules/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(!layout.dynamic().join("journal.yaml").exists());

    let rules: Vec<Value> = server
        .client
        .get(server.url("/api/rules"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(rules.is_empty());
}

#[tokio::test]
async fn test_resync_picks_up_external_files() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;
    layout.write_dynamic("zeta.yaml", &fixture_yaml("zeta", "zeta.example.com", "http://10.0.0.9"));
    layout.write_dynamic("alpha.yml", &fixture_yaml("alpha", "alpha.example.com", "http://10.0.0.8"));
    layout.write_dynamic("broken.yaml", "http: [unterminated");

    let res = server
        .client
        .post(server.url("/api/resync"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report, json!({ "count": 2, "retained": 0, "failures": 1 }));

    let rules: Vec<Value> = server
        .client
        .get(server.url("/api/rules"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = rules.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(rules[0]["hostname"], "alpha.example.com");
}

#[tokio::test]
async fn test_health_and_readiness() {
    let layout = Layout::new();
    let server = TestServer::spawn(layout.service(5).await).await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(
        body["dynamicPath"],
        layout.dynamic().display().to_string()
    );

    let res = server.client.get(server.url("/ready")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "ready": false }));

    server.readiness.mark_ready();
    let res = server.client.get(server.url("/ready")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    std::fs::remove_dir_all(layout.dynamic()).unwrap();
    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}
