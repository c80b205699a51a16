//! Docker CLI runtime.
//!
//! Each operation shells out to the `docker` binary and inspects its exit status
//! (and, for a few calls, stdout or stderr text).

use super::{ContainerRuntime, ContainerSpec, NetworkCreation, RunMode};
use crate::error::{Result, WbError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runtime backed by the docker command line.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DOCKER_BIN)
    }
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.bin, args.join(" "))
    }

    /// Run with captured output. Spawn failures become `Command` errors; a
    /// non-zero exit is returned to the caller as-is.
    ///
    /// `shown` is the command text used in logs and errors.
    async fn output(&self, args: &[String], shown: &str) -> Result<Output> {
        debug!(command = %shown, "Running docker");
        Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| WbError::Command { command: shown.to_string(), reason: e.to_string() })
    }

    /// Run with captured output, failing on a non-zero exit.
    async fn checked(&self, args: &[String], shown: &str) -> Result<Output> {
        let output = self.output(args, shown).await?;
        if !output.status.success() {
            return Err(WbError::Command {
                command: shown.to_string(),
                reason: failure_reason(&output),
            });
        }
        Ok(output)
    }

    /// Run attached to the operator's terminal.
    async fn inherited(&self, args: &[String], shown: &str) -> Result<()> {
        debug!(command = %shown, "Running docker (attached)");
        let status = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| WbError::Command { command: shown.to_string(), reason: e.to_string() })?;

        if !status.success() {
            return Err(WbError::Command { command: shown.to_string(), reason: status.to_string() });
        }
        Ok(())
    }

    /// Captured run of a command whose full text is safe to show.
    async fn plain(&self, args: Vec<String>) -> Result<Output> {
        let shown = self.describe(&args);
        self.checked(&args, &shown).await
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        output.status.to_string()
    } else {
        stderr
    }
}

/// Stop arguments, with `-t <secs>` when a grace period is given.
fn stop_args(name: &str, grace: Option<Duration>) -> Vec<String> {
    let mut out = vec!["stop".to_string()];
    if let Some(grace) = grace {
        out.extend(["-t".to_string(), grace.as_secs().to_string()]);
    }
    out.push(name.to_string());
    out
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    #[instrument(skip(self))]
    async fn create_network(&self, name: &str) -> Result<NetworkCreation> {
        let args = args(["network", "create", name]);
        let shown = self.describe(&args);
        let output = self.output(&args, &shown).await?;
        if output.status.success() {
            return Ok(NetworkCreation::Created);
        }
        let reason = failure_reason(&output);
        if reason.contains("already exists") {
            return Ok(NetworkCreation::AlreadyExists);
        }
        Err(WbError::Command { command: shown, reason })
    }

    #[instrument(skip(self))]
    async fn remove_network(&self, name: &str) -> Result<()> {
        self.plain(args(["network", "rm", name])).await.map(|_| ())
    }

    #[instrument(skip(self, spec), fields(container = %spec.name, image = %spec.image))]
    async fn run(&self, spec: &ContainerSpec) -> Result<()> {
        let args = spec.to_run_args();
        // Environment values carry credentials; never log the full command line.
        let shown = format!("{} run {}", self.bin, spec.name);
        match spec.mode {
            RunMode::Interactive => self.inherited(&args, &shown).await,
            RunMode::Detached => self.checked(&args, &shown).await.map(|_| ()),
        }
    }

    #[instrument(skip(self))]
    async fn stop(&self, name: &str, grace: Option<Duration>) -> Result<()> {
        self.plain(stop_args(name, grace)).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn remove(&self, name: &str) -> Result<()> {
        self.plain(args(["container", "rm", name])).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn pull(&self, image: &str) -> Result<()> {
        let args = args(["pull", image]);
        let shown = self.describe(&args);
        self.inherited(&args, &shown).await
    }

    async fn running_containers(&self) -> Result<HashSet<String>> {
        let output = self.plain(args(["ps", "--format", "{{.Names}}"])).await?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    #[instrument(skip(self))]
    async fn prune_networks(&self) -> Result<String> {
        let output = self.plain(args(["network", "prune", "-f"])).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn name(&self) -> &str {
        "docker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_args() {
        assert_eq!(stop_args("demo", None), vec!["stop", "demo"]);
        assert_eq!(
            stop_args("demo-postgres", Some(Duration::from_secs(30))),
            vec!["stop", "-t", "30", "demo-postgres"]
        );
    }

    #[tokio::test]
    async fn test_run_error_hides_environment() {
        let docker = DockerCli::new("/nonexistent/docker-for-tests");
        let spec = ContainerSpec::new("demo", "img").env("PG_PASSWORD", "secret");
        let err = docker.run(&spec).await.unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_error() {
        let docker = DockerCli::new("/nonexistent/docker-for-tests");
        let err = docker.create_network("demo").await.unwrap_err();
        assert!(matches!(err, WbError::Command { ref command, .. } if command.contains("network create demo")));
    }
}
