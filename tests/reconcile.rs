//! Reconciliation and write-path tests against real directories.

use std::collections::HashSet;

use serde_json::json;
use traefik_config_manager::rules::RuleError;
use traefik_config_manager::storage::BackupStore;

mod common;

use common::{fixture_yaml, payload, rule_body, Layout};

#[tokio::test]
async fn test_resync_is_idempotent() {
    let layout = Layout::new();
    layout.write_dynamic("api.yaml", &fixture_yaml("api", "api.example.com", "http://10.0.0.1"));
    layout.write_dynamic("web.yml", &fixture_yaml("web", "web.example.com", "http://10.0.0.2"));
    let svc = layout.service(5).await;

    svc.sync_from_disk().await.unwrap();
    let first = svc.list().await.unwrap();
    svc.sync_from_disk().await.unwrap();
    let second = svc.list().await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_content_edit_keeps_id() {
    let layout = Layout::new();
    layout.write_dynamic("api.yaml", &fixture_yaml("api", "api.example.com", "http://10.0.0.1"));
    let svc = layout.service(5).await;
    svc.sync_from_disk().await.unwrap();
    let before = svc.list().await.unwrap().remove(0);

    // Router renamed inside the file too; identity follows the file stem.
    layout.write_dynamic("api.yaml", &fixture_yaml("api-v2", "api.example.org", "http://10.0.0.7"));
    svc.sync_from_disk().await.unwrap();
    let after = svc.list().await.unwrap().remove(0);

    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.spec.hostname, "api.example.org");
    assert_eq!(after.spec.backend_url, vec!["http://10.0.0.7".to_string()]);
}

#[tokio::test]
async fn test_file_rename_gets_new_id() {
    let layout = Layout::new();
    layout.write_dynamic("old.yaml", &fixture_yaml("old", "old.example.com", "http://10.0.0.1"));
    let svc = layout.service(5).await;
    svc.sync_from_disk().await.unwrap();
    let before = svc.list().await.unwrap().remove(0);

    std::fs::rename(layout.dynamic().join("old.yaml"), layout.dynamic().join("new.yaml")).unwrap();
    svc.sync_from_disk().await.unwrap();
    let rules = svc.list().await.unwrap();

    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].spec.name, "new");
    assert_ne!(rules[0].id, before.id);
    assert!(matches!(svc.get(&before.id).await, Err(RuleError::NotFound(_))));
}

#[tokio::test]
async fn test_ids_stay_unique_across_extensions_and_routers() {
    let layout = Layout::new();
    layout.write_dynamic("app.yaml", &fixture_yaml("app", "app.example.com", "http://10.0.0.1"));
    layout.write_dynamic("app.yml", &fixture_yaml("app", "app.example.net", "http://10.0.0.2"));
    layout.write_dynamic(
        "shared.yaml",
        "http:\n  routers:\n    one:\n      rule: \"Host(`one.example.com`)\"\n      service: pool\n    two:\n      rule: \"Host(`two.example.com`)\"\n      service: pool\n  services:\n    pool:\n      loadBalancer:\n        servers:\n          - url: \"http://10.0.0.3\"\n",
    );
    let svc = layout.service(5).await;

    let report = svc.sync_from_disk().await.unwrap();
    let rules = svc.list().await.unwrap();

    assert_eq!(report.count, 3);
    let ids: HashSet<&str> = rules.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), rules.len());

    let names: Vec<&str> = rules.iter().map(|r| r.spec.name.as_str()).collect();
    assert_eq!(names, vec!["app", "shared", "shared-two"]);
    assert_eq!(rules[0].file_name, "app.yaml");
}

#[tokio::test]
async fn test_failed_write_leaves_index_untouched() {
    let layout = Layout::new();
    let svc = layout.service(5).await;
    let rule = svc.create(payload(rule_body("api"))).await.unwrap();

    // A directory where the rule file should be makes the final rename fail.
    let live = layout.dynamic().join("api.yaml");
    std::fs::remove_file(&live).unwrap();
    std::fs::create_dir(&live).unwrap();

    let mut body = rule_body("api");
    body["hostname"] = json!("changed.example.com");
    let err = svc.update(&rule.id, payload(body)).await.unwrap_err();
    assert!(matches!(err, RuleError::Write { .. }), "got {:?}", err);

    let stored = svc.get(&rule.id).await.unwrap();
    assert_eq!(stored, rule);

    let leftovers: Vec<String> = std::fs::read_dir(layout.dynamic())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}

#[tokio::test]
async fn test_failed_write_keeps_previous_file_content() {
    let layout = Layout::new();
    // The live file name fits the filesystem's name limit; its hidden temp sibling
    // (`.{file}.{uuid}.tmp`) does not, so every rewrite fails before the rename.
    let name = "r".repeat(230);
    let original = fixture_yaml(&name, "long.example.com", "http://10.0.0.1");
    layout.write_dynamic(&format!("{}.yaml", name), &original);
    let svc = layout.service(5).await;
    svc.sync_from_disk().await.unwrap();
    let before = svc.list().await.unwrap().remove(0);
    assert_eq!(before.spec.name, name);

    let mut body = rule_body(&name);
    body["hostname"] = json!("changed.example.com");
    let err = svc.update(&before.id, payload(body)).await.unwrap_err();
    assert!(matches!(err, RuleError::Write { .. }), "got {:?}", err);

    let on_disk = std::fs::read_to_string(layout.dynamic().join(format!("{}.yaml", name))).unwrap();
    assert_eq!(on_disk, original);
    assert_eq!(svc.get(&before.id).await.unwrap(), before);

    let entries: Vec<String> = std::fs::read_dir(layout.dynamic())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec![format!("{}.yaml", name)]);
}

#[tokio::test]
async fn test_backups_are_pruned_per_rule() {
    let layout = Layout::new();
    let svc = layout.service(2).await;
    let api = svc.create(payload(rule_body("api"))).await.unwrap();
    let v2 = svc.create(payload(rule_body("api-v2"))).await.unwrap();
    svc.update(&v2.id, payload(rule_body("api-v2"))).await.unwrap();

    for i in 0..5 {
        let mut body = rule_body("api");
        body["priority"] = json!(i + 1);
        svc.update(&api.id, payload(body)).await.unwrap();
    }

    let store = BackupStore::new(layout.backups(), 2);
    assert_eq!(store.list("api").await.unwrap().len(), 2);
    assert_eq!(store.list("api-v2").await.unwrap().len(), 1);

    // The newest snapshot holds the content written by the fourth update.
    let newest = std::fs::read_to_string(&store.list("api").await.unwrap()[0]).unwrap();
    assert!(newest.contains("priority: 4"));
}

#[tokio::test]
async fn test_concurrent_writes_and_syncs_lose_nothing() {
    let layout = Layout::new();
    let svc = layout.service(5).await;

    let mut tasks = Vec::new();
    for i in 0..10 {
        let writer = svc.clone();
        tasks.push(tokio::spawn(async move {
            writer.create(payload(rule_body(&format!("rule-{}", i)))).await.map(|_| ())
        }));
        let syncer = svc.clone();
        tasks.push(tokio::spawn(async move { syncer.sync_from_disk().await.map(|_| ()) }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let rules = svc.list().await.unwrap();
    assert_eq!(rules.len(), 10);
    let ids: HashSet<&str> = rules.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids.len(), 10);
}
