//! TLS certificates, managed through certbot.

use crate::error::{Result, WbError};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Read-only view of the certificates installed on this host.
///
/// Bring-up only asks whether a certificate exists; the answer is advisory.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Whether a certificate named `subdomain` is installed.
    async fn has_certificate(&self, subdomain: &str) -> Result<bool>;
}

/// Certbot CLI wrapper.
#[derive(Debug, Clone)]
pub struct Certbot {
    bin: String,
}

impl Default for Certbot {
    fn default() -> Self {
        Self { bin: "certbot".to_string() }
    }
}

impl Certbot {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Raw `certbot certificates` output.
    pub async fn certificates(&self) -> Result<String> {
        let output = Command::new(&self.bin)
            .arg("certificates")
            .output()
            .await
            .map_err(|e| self.command_error("certificates", e.to_string()))?;

        if !output.status.success() {
            return Err(self.command_error(
                "certificates",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Request and install a certificate for `subdomain` through the nginx plugin.
    ///
    /// Certbot talks to the operator directly, so stdio is inherited.
    #[instrument(skip(self))]
    pub async fn issue(&self, subdomain: &str) -> Result<()> {
        self.run_inherited(&["--nginx", "-d", subdomain]).await?;
        info!("Certificate issued");
        Ok(())
    }

    /// Revoke and delete the certificate for `subdomain`.
    #[instrument(skip(self))]
    pub async fn revoke(&self, subdomain: &str) -> Result<()> {
        self.run_inherited(&["revoke", "--cert-name", subdomain, "--delete-after-revoke"])
            .await?;
        info!("Certificate revoked");
        Ok(())
    }

    async fn run_inherited(&self, args: &[&str]) -> Result<()> {
        let joined = args.join(" ");
        debug!(command = %joined, "Running certbot");
        let status = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.command_error(&joined, e.to_string()))?;

        if !status.success() {
            return Err(self.command_error(&joined, status.to_string()));
        }
        Ok(())
    }

    fn command_error(&self, args: &str, reason: String) -> WbError {
        WbError::Command { command: format!("{} {}", self.bin, args), reason }
    }
}

#[async_trait]
impl CertificateStore for Certbot {
    async fn has_certificate(&self, subdomain: &str) -> Result<bool> {
        Ok(lists_certificate(&self.certificates().await?, subdomain))
    }
}

/// Whether `certbot certificates` output names a certificate for `subdomain`.
pub fn lists_certificate(output: &str, subdomain: &str) -> bool {
    output.lines().any(|line| {
        line.trim()
            .strip_prefix("Certificate Name:")
            .is_some_and(|name| name.trim() == subdomain)
    })
}

/// Number of certificates in `certbot certificates` output.
pub fn count_certificates(output: &str) -> usize {
    output.matches("Certificate Name:").count()
}
