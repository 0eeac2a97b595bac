//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use traefik_config_manager::config::SecurityConfig;
use traefik_config_manager::health::Readiness;
use traefik_config_manager::http::{AppState, HttpServer};
use traefik_config_manager::lifecycle::Shutdown;
use traefik_config_manager::rules::RulePayload;
use traefik_config_manager::RulesService;

/// Dynamic, metadata and backup directories under one temp root.
pub struct Layout {
    root: TempDir,
}

impl Layout {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    pub fn dynamic(&self) -> PathBuf {
        self.root.path().join("dynamic")
    }

    pub fn metadata(&self) -> PathBuf {
        self.root.path().join("metadata")
    }

    pub fn backups(&self) -> PathBuf {
        self.root.path().join("backups")
    }

    /// Initialized service over this layout.
    pub async fn service(&self, max_backups: usize) -> Arc<RulesService> {
        let svc = RulesService::new(self.dynamic(), self.metadata(), self.backups(), max_backups);
        svc.init().await.unwrap();
        Arc::new(svc)
    }

    /// Drop a file straight into the dynamic directory, as an operator would.
    pub fn write_dynamic(&self, file_name: &str, content: &str) {
        std::fs::create_dir_all(self.dynamic()).unwrap();
        std::fs::write(self.dynamic().join(file_name), content).unwrap();
    }
}

/// A running API server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub readiness: Arc<Readiness>,
    shutdown: Arc<Shutdown>,
}

impl TestServer {
    pub async fn spawn(rules: Arc<RulesService>) -> Self {
        let readiness = Arc::new(Readiness::new());
        let state = AppState {
            rules,
            readiness: readiness.clone(),
        };
        let server = HttpServer::new(state, &SecurityConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Arc::new(Shutdown::new());
        let wait = shutdown.wait();
        tokio::spawn(async move {
            let _ = server.run(listener, wait).await;
        });

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .unwrap();

        Self {
            addr,
            client,
            readiness,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// JSON body of a valid create request for `name`.
pub fn rule_body(name: &str) -> Value {
    json!({
        "name": name,
        "hostname": format!("{}.example.com", name),
        "backendUrl": ["http://10.0.0.5:8080"],
        "entryPoints": ["websecure"],
        "tls": true,
        "certResolver": "letsencrypt",
        "middlewares": ["secure-headers"]
    })
}

pub fn payload(value: Value) -> RulePayload {
    serde_json::from_value(value).unwrap()
}

/// A hand-written router file for `host` pointing at `backend`.
pub fn fixture_yaml(router: &str, host: &str, backend: &str) -> String {
    format!(
        "http:\n  routers:\n    {router}:\n      rule: \"Host(`{host}`)\"\n      service: {router}-svc\n      entryPoints:\n        - web\n  services:\n    {router}-svc:\n      loadBalancer:\n        servers:\n          - url: \"{backend}\"\n",
    )
}
