//! Ordered step plans for bring-up and tear-down.
//!
//! A plan is data: each step names one runtime action and how a failure of that
//! action is treated. Nothing is rolled back when a step fails.

use crate::config::Settings;
use crate::images::{admin_image, server_image, DATABASE_IMAGE};
use crate::layout::InstanceLayout;
use crate::ports::{derived_port, ADMIN_CONTAINER_PORT, APP_CONTAINER_PORT, DATABASE_CONTAINER_PORT};
use crate::runtime::{ContainerSpec, RunMode};
use crate::types::Tenant;
use std::fmt;
use std::time::Duration;

/// Grace period before the database container is killed on stop.
pub const DATABASE_STOP_GRACE: Duration = Duration::from_secs(30);

/// Host socket mounted into the application container.
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// What happens when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Abort the remaining steps with `ContainerStart`
    Required,
    /// Log and report a warning, then continue
    Warn,
    /// Continue silently (e.g. removing something that is already gone)
    Ignore,
}

/// One runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateNetwork(String),
    Run(ContainerSpec),
    Stop { container: String, grace: Option<Duration> },
    Remove(String),
    RemoveNetwork(String),
}

impl Action {
    /// Container or network the action targets.
    pub fn target(&self) -> &str {
        match self {
            Action::CreateNetwork(name) | Action::Remove(name) | Action::RemoveNetwork(name) => {
                name
            }
            Action::Run(spec) => &spec.name,
            Action::Stop { container, .. } => container,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::CreateNetwork(name) => write!(f, "create network {}", name),
            Action::Run(spec) => write!(f, "start {} ({})", spec.name, spec.image),
            Action::Stop { container, grace: Some(grace) } => {
                write!(f, "stop {} (grace {}s)", container, grace.as_secs())
            }
            Action::Stop { container, grace: None } => write!(f, "stop {}", container),
            Action::Remove(name) => write!(f, "remove container {}", name),
            Action::RemoveNetwork(name) => write!(f, "remove network {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub criticality: Criticality,
}

impl Step {
    fn new(action: Action, criticality: Criticality) -> Self {
        Self { action, criticality }
    }
}

/// Bring-up steps for `tenant`, in execution order.
pub fn bring_up(settings: &Settings, tenant: &Tenant, mode: RunMode) -> Vec<Step> {
    let layout = InstanceLayout::new(&settings.mount_path, tenant);
    let mut steps = vec![
        Step::new(Action::CreateNetwork(tenant.network().to_string()), Criticality::Warn),
        Step::new(Action::Run(database_spec(settings, tenant, &layout)), Criticality::Warn),
    ];

    if let Some(admin_version) = admin_version(tenant) {
        steps.push(Step::new(Action::Remove(tenant.admin_container()), Criticality::Ignore));
        steps.push(Step::new(
            Action::Run(admin_spec(settings, tenant, admin_version)),
            Criticality::Required,
        ));
    }

    steps.push(Step::new(Action::Remove(tenant.app_container().to_string()), Criticality::Ignore));
    steps.push(Step::new(
        Action::Run(app_spec(settings, tenant, &layout, mode)),
        Criticality::Warn,
    ));
    steps
}

/// Tear-down steps for `tenant`. Every step is best-effort.
pub fn tear_down(tenant: &Tenant) -> Vec<Step> {
    let mut steps = vec![Step::new(
        Action::Stop { container: tenant.app_container().to_string(), grace: None },
        Criticality::Ignore,
    )];

    if admin_version(tenant).is_some() {
        steps.push(Step::new(
            Action::Stop { container: tenant.admin_container(), grace: None },
            Criticality::Ignore,
        ));
        steps.push(Step::new(Action::Remove(tenant.admin_container()), Criticality::Ignore));
    }

    steps.push(Step::new(
        Action::Stop { container: tenant.database_container(), grace: Some(DATABASE_STOP_GRACE) },
        Criticality::Ignore,
    ));
    steps.push(Step::new(Action::RemoveNetwork(tenant.network().to_string()), Criticality::Ignore));
    steps
}

fn admin_version(tenant: &Tenant) -> Option<&str> {
    tenant.admin_version.as_deref().filter(|v| !v.trim().is_empty())
}

fn database_spec(settings: &Settings, tenant: &Tenant, layout: &InstanceLayout) -> ContainerSpec {
    ContainerSpec::new(tenant.database_container(), DATABASE_IMAGE)
        .auto_remove()
        .network(tenant.network())
        .publish(derived_port(tenant.port), DATABASE_CONTAINER_PORT)
        .env("POSTGRES_PASSWORD", &settings.postgres_password)
        .env("PGDATA", "/var/lib/postgresql/data/pgdata")
        .volume(layout.databases(), "/var/lib/postgresql/data")
        .volume(layout.sandbox(), "/app/sandbox")
}

fn admin_spec(settings: &Settings, tenant: &Tenant, admin_version: &str) -> ContainerSpec {
    ContainerSpec::new(tenant.admin_container(), admin_image(&settings.image_repository, admin_version))
        .auto_remove()
        .network(tenant.network())
        .env("ADMIN_VERSION", admin_version)
}

fn app_spec(
    settings: &Settings,
    tenant: &Tenant,
    layout: &InstanceLayout,
    mode: RunMode,
) -> ContainerSpec {
    let admin = admin_version(tenant);
    let mut spec = ContainerSpec::new(
        tenant.app_container(),
        server_image(&settings.image_repository, &tenant.server_version),
    )
    .mode(mode)
    .network(tenant.network())
    .publish(tenant.port, APP_CONTAINER_PORT)
    .volume(DOCKER_SOCKET, DOCKER_SOCKET)
    .volume(layout.databases(), "/app/databases")
    .volume(layout.sandbox(), "/app/sandbox")
    .volume(layout.assets(), "/app/assets")
    .env("SANDBOX_DIR_PATH_EXTERNAL", layout.sandbox().display().to_string());

    if admin.is_some() {
        spec = spec.env(
            "ADMIN_SERVER_HOST",
            format!("http://{}:{}", tenant.admin_container(), ADMIN_CONTAINER_PORT),
        );
    }
    spec = spec.env("SERVER_VERSION", &tenant.server_version);
    if let Some(admin) = admin {
        spec = spec.env("ADMIN_VERSION", admin);
    }
    spec = spec
        .env("DATABASE_FOLDER", tenant.instance_dir_name())
        .env("CLERK_PUBLISHABLE_KEY", &settings.clerk_publishable_key)
        .env("CLERK_SECRET_KEY", &settings.clerk_secret_key)
        .env("INSTANCE_ID", &tenant.id)
        .env("INSTANCE_NAME", &tenant.label);

    if tenant.is_french() {
        spec = spec.env("INSTANCE_LANGUAGE", "fr");
    }
    if tenant.is_ethiopian() {
        spec = spec.env("INSTANCE_CALENDAR", "ethiopian");
    }
    if tenant.is_open_access() {
        spec = spec.env("OPEN_ACCESS", "1");
    }

    spec.env("INSTANCE_REDIRECT_URL", format!("https://{}", tenant.subdomain(&settings.domain)))
        .env("PG_HOST", tenant.database_container())
        .env("PG_PORT", DATABASE_CONTAINER_PORT.to_string())
        .env("ANTHROPIC_API_URL", &settings.anthropic_api_url)
        .env("ANTHROPIC_API_KEY", &settings.anthropic_api_key)
        .env("PG_PASSWORD", &settings.pg_password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings() -> Settings {
        let env: HashMap<&str, &str> = [
            ("CLERK_PUBLISHABLE_KEY", "pk"),
            ("CLERK_SECRET_KEY", "sk"),
            ("DOMAIN", "example.org"),
            ("SERVERS_FILE_PATH", "/etc/wb/servers.json"),
            ("MOUNT_PATH", "/mnt/wb"),
            ("SITES_AVAILABLE_PATH", "/etc/nginx/sites-available"),
            ("SITES_ENABLED_PATH", "/etc/nginx/sites-enabled"),
            ("POSTGRES_PASSWORD", "pgroot"),
            ("ANTHROPIC_API_URL", "https://api.example.org"),
            ("ANTHROPIC_API_KEY", "ak"),
            ("PG_PASSWORD", "pgapp"),
        ]
        .into_iter()
        .collect();
        Settings::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap()
    }

    fn run_spec(step: &Step) -> &ContainerSpec {
        match &step.action {
            Action::Run(spec) => spec,
            other => panic!("expected a run step, got {other}"),
        }
    }

    #[test]
    fn test_bring_up_without_admin() {
        let tenant = Tenant::new("demo", "Demo", 9100, "1.6.7");
        let steps = bring_up(&settings(), &tenant, RunMode::Detached);

        let actions: Vec<String> = steps.iter().map(|s| s.action.to_string()).collect();
        assert_eq!(
            actions,
            vec![
                "create network demo",
                "start demo-postgres (postgres:17.4)",
                "remove container demo",
                "start demo (timroberton/comb:wb-fastr-server-v1.6.7)",
            ]
        );
        assert_eq!(steps[1].criticality, Criticality::Warn);
        assert_eq!(steps[3].criticality, Criticality::Warn);
    }

    #[test]
    fn test_database_spec() {
        let tenant = Tenant::new("demo", "Demo", 9100, "1.6.7");
        let steps = bring_up(&settings(), &tenant, RunMode::Detached);
        let db = run_spec(&steps[1]);

        assert!(db.auto_remove);
        assert_eq!(db.ports, vec![(19100, 5432)]);
        assert_eq!(db.env_value("POSTGRES_PASSWORD"), Some("pgroot"));
        assert_eq!(
            db.volumes,
            vec![
                ("/mnt/wb/demo/databases".to_string(), "/var/lib/postgresql/data".to_string()),
                ("/mnt/wb/demo/sandbox".to_string(), "/app/sandbox".to_string()),
            ]
        );
    }

    #[test]
    fn test_admin_steps_precede_app() {
        let mut tenant = Tenant::new("demo", "Demo", 9100, "1.5.2");
        tenant.admin_version = Some("1.1.0".into());
        let steps = bring_up(&settings(), &tenant, RunMode::Detached);

        assert_eq!(steps[2].action, Action::Remove("demo-admin".into()));
        let admin = run_spec(&steps[3]);
        assert_eq!(admin.image, "timroberton/comb:wb-hmis-server-admin-v1.1.0");
        assert_eq!(admin.env_value("ADMIN_VERSION"), Some("1.1.0"));
        assert_eq!(steps[3].criticality, Criticality::Required);

        let app = run_spec(&steps[5]);
        assert_eq!(app.image, "timroberton/comb:wb-hmis-server-v1.5.2");
        assert_eq!(app.env_value("ADMIN_SERVER_HOST"), Some("http://demo-admin:8001"));
    }

    #[test]
    fn test_app_environment() {
        let mut tenant = Tenant::new("demo", "Demo Site", 9100, "1.6.7");
        tenant.instance_dir = Some("legacy".into());
        tenant.french = Some(true);
        tenant.open_access = Some(true);
        let steps = bring_up(&settings(), &tenant, RunMode::Interactive);
        let app = run_spec(steps.last().unwrap());

        assert_eq!(app.mode, RunMode::Interactive);
        assert!(!app.auto_remove);
        assert_eq!(app.ports, vec![(9100, 8000)]);
        assert_eq!(app.volumes[0], (DOCKER_SOCKET.to_string(), DOCKER_SOCKET.to_string()));
        assert_eq!(app.env_value("SANDBOX_DIR_PATH_EXTERNAL"), Some("/mnt/wb/legacy/sandbox"));
        assert_eq!(app.env_value("DATABASE_FOLDER"), Some("legacy"));
        assert_eq!(app.env_value("INSTANCE_NAME"), Some("Demo Site"));
        assert_eq!(app.env_value("INSTANCE_LANGUAGE"), Some("fr"));
        assert_eq!(app.env_value("INSTANCE_CALENDAR"), None);
        assert_eq!(app.env_value("OPEN_ACCESS"), Some("1"));
        assert_eq!(app.env_value("INSTANCE_REDIRECT_URL"), Some("https://demo.example.org"));
        assert_eq!(app.env_value("PG_HOST"), Some("demo-postgres"));
        assert_eq!(app.env_value("PG_PORT"), Some("5432"));
        assert_eq!(app.env_value("PG_PASSWORD"), Some("pgapp"));
        assert_eq!(app.env_value("ADMIN_SERVER_HOST"), None);
    }

    #[test]
    fn test_tear_down_order() {
        let mut tenant = Tenant::new("demo", "Demo", 9100, "1.6.7");
        tenant.admin_version = Some("1.1.0".into());

        let actions: Vec<String> = tear_down(&tenant).iter().map(|s| s.action.to_string()).collect();
        assert_eq!(
            actions,
            vec![
                "stop demo",
                "stop demo-admin",
                "remove container demo-admin",
                "stop demo-postgres (grace 30s)",
                "remove network demo",
            ]
        );
        assert!(tear_down(&tenant).iter().all(|s| s.criticality != Criticality::Required));
    }

    #[test]
    fn test_empty_admin_version_is_ignored() {
        let mut tenant = Tenant::new("demo", "Demo", 9100, "1.6.7");
        tenant.admin_version = Some(String::new());
        assert_eq!(tear_down(&tenant).len(), 3);
        assert_eq!(bring_up(&settings(), &tenant, RunMode::Detached).len(), 4);
    }
}
