//! Container runtime abstraction.
//!
//! The orchestrator drives containers only through the [`ContainerRuntime`]
//! trait. Every method maps to a single runtime command; failure
//! classification (fatal vs. warning) is left to the caller.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub mod docker;

pub use docker::DockerCli;

/// Result of asking the runtime for a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCreation {
    Created,
    AlreadyExists,
}

/// How a container's process is attached to the caller's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Background with a pseudo-TTY (`-dt`)
    #[default]
    Detached,
    /// Foreground, attached to the operator's terminal (`-it`)
    Interactive,
}

/// Everything needed to start one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network: Option<String>,
    /// `(host, container)` port pairs
    pub ports: Vec<(u32, u16)>,
    /// `(host path, container path)` bind mounts
    pub volumes: Vec<(String, String)>,
    /// Environment, in the order it is passed to the runtime
    pub env: Vec<(String, String)>,
    pub mode: RunMode,
    /// Remove the container when it exits
    pub auto_remove: bool,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            network: None,
            ports: Vec::new(),
            volumes: Vec::new(),
            env: Vec::new(),
            mode: RunMode::Detached,
            auto_remove: false,
        }
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn publish(mut self, host: u32, container: u16) -> Self {
        self.ports.push((host, container));
        self
    }

    pub fn volume(mut self, host: impl AsRef<Path>, container: impl Into<String>) -> Self {
        self.volumes.push((host.as_ref().display().to_string(), container.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn auto_remove(mut self) -> Self {
        self.auto_remove = true;
        self
    }

    /// Value of an environment variable, if set.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Arguments to `docker`, starting with `run`.
    pub fn to_run_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if self.auto_remove {
            args.push("--rm".into());
        }
        args.push(
            match self.mode {
                RunMode::Detached => "-dt",
                RunMode::Interactive => "-it",
            }
            .into(),
        );
        args.extend(["--name".into(), self.name.clone()]);
        if let Some(network) = &self.network {
            args.extend(["--network".into(), network.clone()]);
        }
        for (host, container) in &self.ports {
            args.extend(["-p".into(), format!("{}:{}", host, container)]);
        }
        for (host, container) in &self.volumes {
            args.extend(["-v".into(), format!("{}:{}", host, container)]);
        }
        for (key, value) in &self.env {
            args.extend(["-e".into(), format!("{}={}", key, value)]);
        }
        args.push(self.image.clone());
        args
    }
}

/// Container runtime operations used by the orchestrator.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a network. An existing network of that name is not an error.
    async fn create_network(&self, name: &str) -> Result<NetworkCreation>;

    async fn remove_network(&self, name: &str) -> Result<()>;

    /// Start a container. Interactive runs return once the container exits.
    async fn run(&self, spec: &ContainerSpec) -> Result<()>;

    /// Stop a container, waiting up to `grace` before killing it.
    /// `None` uses the runtime's default grace period.
    async fn stop(&self, name: &str, grace: Option<Duration>) -> Result<()>;

    /// Remove a stopped container.
    async fn remove(&self, name: &str) -> Result<()>;

    async fn pull(&self, image: &str) -> Result<()>;

    /// Names of every running container.
    async fn running_containers(&self) -> Result<HashSet<String>>;

    /// Remove unused networks, returning the runtime's report.
    async fn prune_networks(&self) -> Result<String>;

    /// Runtime name, for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_order() {
        let spec = ContainerSpec::new("demo-postgres", "postgres:17.4")
            .auto_remove()
            .network("demo")
            .publish(19100, 5432)
            .volume("/mnt/demo/databases", "/var/lib/postgresql/data")
            .env("POSTGRES_PASSWORD", "secret");

        assert_eq!(
            spec.to_run_args(),
            vec![
                "run",
                "--rm",
                "-dt",
                "--name",
                "demo-postgres",
                "--network",
                "demo",
                "-p",
                "19100:5432",
                "-v",
                "/mnt/demo/databases:/var/lib/postgresql/data",
                "-e",
                "POSTGRES_PASSWORD=secret",
                "postgres:17.4",
            ]
        );
    }

    #[test]
    fn test_interactive_without_auto_remove() {
        let args = ContainerSpec::new("demo", "img").mode(RunMode::Interactive).to_run_args();
        assert_eq!(args, vec!["run", "-it", "--name", "demo", "img"]);
    }

    #[test]
    fn test_env_value() {
        let spec = ContainerSpec::new("demo", "img").env("A", "1").env("B", "x=y");
        assert_eq!(spec.env_value("B"), Some("x=y"));
        assert_eq!(spec.env_value("C"), None);
    }
}
