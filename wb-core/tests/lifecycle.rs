//! Integration tests for tenant lifecycle operations.
//!
//! These tests drive the orchestrator end to end:
//! - Pre-flight checks against real directories and proxy files
//! - Bring-up and tear-down step order
//! - Batch and restart sequencing
//!
//! Tests use a temp directory and a recording mock runtime, so no container
//! engine or certbot is needed.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wb_core::{
    layout::InstanceLayout,
    orchestrator::{BatchEvent, Note, Orchestrator, Phase},
    proxy::ProxySites,
    runtime::{ContainerRuntime, ContainerSpec, NetworkCreation, RunMode},
    tls::CertificateStore,
    Result, Settings, Tenant, TenantStore, WbError,
};

/// Mock runtime that records every call (doesn't require a container engine).
#[derive(Default)]
struct MockRuntime {
    calls: Mutex<Vec<String>>,
    /// Containers whose `run` fails
    failing: HashSet<String>,
    network_exists: bool,
}

impl MockRuntime {
    fn failing(names: &[&str]) -> Self {
        Self { failing: names.iter().map(|s| s.to_string()).collect(), ..Default::default() }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn command_error(command: &str) -> WbError {
        WbError::Command { command: command.to_string(), reason: "mock failure".to_string() }
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn create_network(&self, name: &str) -> Result<NetworkCreation> {
        self.record(format!("network create {}", name));
        if self.network_exists {
            return Ok(NetworkCreation::AlreadyExists);
        }
        Ok(NetworkCreation::Created)
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.record(format!("network rm {}", name));
        Ok(())
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<()> {
        self.record(format!("run {}", spec.name));
        if self.failing.contains(&spec.name) {
            return Err(Self::command_error("run"));
        }
        Ok(())
    }

    async fn stop(&self, name: &str, grace: Option<Duration>) -> Result<()> {
        match grace {
            Some(grace) => self.record(format!("stop -t {} {}", grace.as_secs(), name)),
            None => self.record(format!("stop {}", name)),
        }
        // Stopping something that isn't running fails in a real runtime.
        Err(Self::command_error("stop"))
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.record(format!("rm {}", name));
        Err(Self::command_error("rm"))
    }

    async fn pull(&self, image: &str) -> Result<()> {
        self.record(format!("pull {}", image));
        if image.contains("admin") {
            return Err(Self::command_error("pull"));
        }
        Ok(())
    }

    async fn running_containers(&self) -> Result<HashSet<String>> {
        Ok(HashSet::new())
    }

    async fn prune_networks(&self) -> Result<String> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Certificate store with a fixed answer.
struct MockCerts(bool);

#[async_trait]
impl CertificateStore for MockCerts {
    async fn has_certificate(&self, _subdomain: &str) -> Result<bool> {
        Ok(self.0)
    }
}

struct Fixture {
    _dir: TempDir,
    settings: Arc<Settings>,
    runtime: Arc<MockRuntime>,
    orchestrator: Orchestrator,
    store: TenantStore,
}

impl Fixture {
    fn new(runtime: MockRuntime) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for sub in ["mount", "sites-available", "sites-enabled"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }

        let settings = Arc::new(Settings {
            clerk_publishable_key: "pk".into(),
            clerk_secret_key: "sk".into(),
            domain: "example.org".into(),
            servers_file_path: root.join("servers.json"),
            mount_path: root.join("mount"),
            sites_available_path: root.join("sites-available"),
            sites_enabled_path: root.join("sites-enabled"),
            postgres_password: "pgroot".into(),
            anthropic_api_url: "https://api.example.org".into(),
            anthropic_api_key: "ak".into(),
            pg_password: "pgapp".into(),
            image_repository: "timroberton/comb".into(),
            docker_bin: "docker".into(),
        });
        let runtime = Arc::new(runtime);
        let orchestrator =
            Orchestrator::new(settings.clone(), runtime.clone(), Arc::new(MockCerts(true)));
        let store = TenantStore::new(&settings.servers_file_path);

        Self { _dir: dir, settings, runtime, orchestrator, store }
    }

    fn sites(&self) -> ProxySites {
        ProxySites::new(&self.settings.sites_available_path, &self.settings.sites_enabled_path)
    }

    /// Register `tenant` with its directories and proxy site in place.
    async fn ready(&self, tenant: &Tenant) {
        self.store.add(tenant.clone()).await.unwrap();
        InstanceLayout::new(&self.settings.mount_path, tenant).create().await.unwrap();
        self.sites().install(&tenant.subdomain(&self.settings.domain), tenant.port).await.unwrap();
    }
}

fn demo() -> Tenant {
    Tenant::new("demo", "Demo", 9100, "1.6.7")
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_bring_up_with_missing_directory_makes_no_runtime_calls() {
    let fx = Fixture::new(MockRuntime::default());
    fx.store.add(demo()).await.unwrap();

    let err = fx.orchestrator.bring_up(&demo(), RunMode::Detached).await.unwrap_err();

    assert!(matches!(err, WbError::NotReady { ref tenant, .. } if tenant == "demo"));
    assert!(fx.runtime.calls().is_empty());
}

#[tokio::test]
async fn test_missing_server_version_is_config_error() {
    let fx = Fixture::new(MockRuntime::default());
    let tenant = Tenant::new("demo", "Demo", 9100, "");

    let err = fx.orchestrator.bring_up(&tenant, RunMode::Detached).await.unwrap_err();

    assert!(matches!(err, WbError::Config { .. }));
    assert!(fx.runtime.calls().is_empty());
}

#[tokio::test]
async fn test_bring_up_step_order() {
    let fx = Fixture::new(MockRuntime::default());
    fx.ready(&demo()).await;

    let report = fx.orchestrator.bring_up(&demo(), RunMode::Detached).await.unwrap();

    assert_eq!(
        fx.runtime.calls(),
        vec!["network create demo", "run demo-postgres", "rm demo", "run demo"]
    );
    assert_eq!(report.phase, Phase::BringUp);
    assert_eq!(report.steps_run, 4);
    // Stale-container removal failures are not warnings.
    assert_eq!(report.warnings().count(), 0);
    assert!(report.notes.contains(&Note::Ok("Proxy configuration matches port 9100".into())));
}

#[tokio::test]
async fn test_existing_network_is_not_a_warning() {
    let fx = Fixture::new(MockRuntime { network_exists: true, ..Default::default() });
    fx.ready(&demo()).await;

    let report = fx.orchestrator.bring_up(&demo(), RunMode::Detached).await.unwrap();

    assert_eq!(report.warnings().count(), 0);
}

#[tokio::test]
async fn test_database_failure_is_a_warning() {
    let fx = Fixture::new(MockRuntime::failing(&["demo-postgres"]));
    fx.ready(&demo()).await;

    let report = fx.orchestrator.bring_up(&demo(), RunMode::Detached).await.unwrap();

    let warnings: Vec<&str> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("demo-postgres"));
    assert_eq!(fx.runtime.calls().last().unwrap(), "run demo");
}

#[tokio::test]
async fn test_admin_failure_aborts_remaining_steps() {
    let fx = Fixture::new(MockRuntime::failing(&["demo-admin"]));
    let mut tenant = demo();
    tenant.admin_version = Some("1.1.0".into());
    fx.ready(&tenant).await;

    let err = fx.orchestrator.bring_up(&tenant, RunMode::Detached).await.unwrap_err();

    assert!(
        matches!(err, WbError::ContainerStart { ref container, .. } if container == "demo-admin")
    );
    assert_eq!(
        fx.runtime.calls(),
        vec!["network create demo", "run demo-postgres", "rm demo-admin", "run demo-admin"]
    );
}

#[tokio::test]
async fn test_proxy_port_mismatch_blocks_bring_up() {
    let fx = Fixture::new(MockRuntime::default());
    fx.store.add(demo()).await.unwrap();
    InstanceLayout::new(&fx.settings.mount_path, &demo()).create().await.unwrap();
    fx.sites().install("demo.example.org", 9200).await.unwrap();

    let err = fx.orchestrator.bring_up(&demo(), RunMode::Detached).await.unwrap_err();

    assert!(matches!(err, WbError::ConfigMismatch { proxy_port: 9200, port: 9100, .. }));
    assert!(fx.runtime.calls().is_empty());
}

#[tokio::test]
async fn test_missing_proxy_and_certificate_are_advisory() {
    let dir_fx = Fixture::new(MockRuntime::default());
    let orchestrator = Orchestrator::new(
        dir_fx.settings.clone(),
        dir_fx.runtime.clone(),
        Arc::new(MockCerts(false)),
    );
    InstanceLayout::new(&dir_fx.settings.mount_path, &demo()).create().await.unwrap();

    let report = orchestrator.bring_up(&demo(), RunMode::Detached).await.unwrap();

    let warnings: Vec<&str> = report.warnings().collect();
    assert_eq!(
        warnings,
        vec![
            "No proxy configuration found for demo.example.org",
            "No TLS certificate found for demo.example.org",
            "Proxy site not enabled for demo.example.org",
        ]
    );
    assert_eq!(dir_fx.runtime.calls().len(), 4);
}

#[tokio::test]
async fn test_tear_down_order() {
    let fx = Fixture::new(MockRuntime::default());
    let mut tenant = demo();
    tenant.admin_version = Some("1.1.0".into());

    let report = fx.orchestrator.tear_down(&tenant).await;

    assert_eq!(
        fx.runtime.calls(),
        vec![
            "stop demo",
            "stop demo-admin",
            "rm demo-admin",
            "stop -t 30 demo-postgres",
            "network rm demo",
        ]
    );
    assert_eq!(report.phase, Phase::TearDown);
    assert_eq!(report.warnings().count(), 0);
}

#[tokio::test]
async fn test_stop_batch_skips_missing_tenants() {
    let fx = Fixture::new(MockRuntime::default());
    fx.store.add(demo()).await.unwrap();
    let mut missing = Vec::new();

    let reports = fx
        .orchestrator
        .stop_batch(&fx.store, &ids(&["ghost", "demo"]), &mut |event| {
            if let BatchEvent::Missing { id, .. } = event {
                missing.push(id.to_string());
            }
        })
        .await
        .unwrap();

    assert_eq!(missing, vec!["ghost"]);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].tenant, "demo");
}

#[tokio::test]
async fn test_app_failure_is_a_warning_and_batch_continues() {
    let fx = Fixture::new(MockRuntime::failing(&["a"]));
    let a = Tenant::new("a", "A", 3000, "1.6.7");
    let b = Tenant::new("b", "B", 3001, "1.6.7");
    fx.ready(&a).await;
    fx.ready(&b).await;

    let reports = fx
        .orchestrator
        .run_batch(&fx.store, &ids(&["a", "b"]), RunMode::Detached, &mut |_| {})
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    let warnings: Vec<&str> = reports[0].warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("start a"));
    assert_eq!(reports[1].warnings().count(), 0);
    assert_eq!(
        fx.runtime.calls(),
        vec![
            "network create a",
            "run a-postgres",
            "rm a",
            "run a",
            "network create b",
            "run b-postgres",
            "rm b",
            "run b",
        ]
    );
}

#[tokio::test]
async fn test_run_batch_stops_at_first_fatal_error() {
    let fx = Fixture::new(MockRuntime::default());
    let a = Tenant::new("a", "A", 3000, "1.6.7");
    let b = Tenant::new("b", "B", 3001, "1.6.7");
    fx.ready(&a).await;
    // b has no directories.
    fx.store.add(b).await.unwrap();
    let c = Tenant::new("c", "C", 3002, "1.6.7");
    fx.ready(&c).await;

    let err = fx
        .orchestrator
        .run_batch(&fx.store, &ids(&["a", "b", "c"]), RunMode::Detached, &mut |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, WbError::NotReady { ref tenant, .. } if tenant == "b"));
    assert!(fx.runtime.calls().iter().all(|c| !c.ends_with(" c") && !c.contains("c-postgres")));
}

#[tokio::test(start_paused = true)]
async fn test_restart_runs_two_full_passes() {
    let fx = Fixture::new(MockRuntime::default());
    let a = Tenant::new("a", "A", 3000, "1.6.7");
    let b = Tenant::new("b", "B", 3001, "1.6.7");
    fx.ready(&a).await;
    fx.ready(&b).await;
    let mut phases = Vec::new();

    let reports = fx
        .orchestrator
        .restart_batch(&fx.store, &ids(&["b", "a"]), RunMode::Detached, &mut |event| {
            match event {
                BatchEvent::Starting { phase, tenant } => {
                    phases.push(format!("{:?} {}", phase, tenant.id))
                }
                BatchEvent::Settling(_) => phases.push("settle".to_string()),
                _ => {}
            }
        })
        .await
        .unwrap();

    assert_eq!(
        phases,
        vec!["TearDown b", "TearDown a", "settle", "BringUp b", "BringUp a"]
    );
    assert_eq!(reports.len(), 4);
    let calls = fx.runtime.calls();
    let last_stop = calls.iter().rposition(|c| c.starts_with("stop")).unwrap();
    let first_run = calls.iter().position(|c| c.starts_with("run")).unwrap();
    assert!(last_stop < first_run);
}

#[tokio::test]
async fn test_pull_images_continues_past_failures() {
    let fx = Fixture::new(MockRuntime::default());
    let mut a = Tenant::new("a", "A", 3000, "1.5.0");
    a.admin_version = Some("1.0.0".into());
    let b = Tenant::new("b", "B", 3001, "1.6.7");
    let mut seen = Vec::new();

    let outcomes = fx.orchestrator.pull_images(&[a, b], |image| seen.push(image.to_string())).await;

    assert_eq!(
        seen,
        vec![
            "postgres:17.4",
            "timroberton/comb:wb-hmis-server-v1.5.0",
            "timroberton/comb:wb-fastr-server-v1.6.7",
            "timroberton/comb:wb-hmis-server-admin-v1.0.0",
        ]
    );
    let failed: Vec<&str> =
        outcomes.iter().filter(|o| o.error.is_some()).map(|o| o.image.as_str()).collect();
    assert_eq!(failed, vec!["timroberton/comb:wb-hmis-server-admin-v1.0.0"]);
}
