//! Checks run before any container is touched.

use super::{Note, Orchestrator};
use crate::error::{Result, WbError};
use crate::layout::InstanceLayout;
use crate::proxy::Upstream;
use crate::types::Tenant;
use tracing::{debug, warn};

impl Orchestrator {
    /// Pre-flight checks for bringing `tenant` up.
    ///
    /// Fatal problems are returned as errors: a missing server version,
    /// missing instance directories, or a proxy config pointing at another
    /// port. Everything else becomes a [`Note`].
    pub async fn preflight(&self, tenant: &Tenant) -> Result<Vec<Note>> {
        let mut notes = Vec::new();

        if tenant.server_version.trim().is_empty() {
            return Err(WbError::Config {
                reason: format!("Tenant '{}' must have a serverVersion specified", tenant.id),
            });
        }

        let layout = InstanceLayout::new(&self.settings.mount_path, tenant);
        layout.ensure_ready(&tenant.id).await?;

        if let Err(e) = layout.apply_sandbox_mode().await {
            notes.push(Note::Warning(format!("Could not set sandbox permissions: {}", e)));
        }

        let subdomain = tenant.subdomain(&self.settings.domain);
        match self.sites.upstream(&subdomain).await {
            Upstream::Port(port) if port == tenant.port => {
                notes.push(Note::Ok(format!("Proxy configuration matches port {}", port)));
            }
            Upstream::Port(port) => {
                return Err(WbError::ConfigMismatch {
                    tenant: tenant.id.clone(),
                    proxy_port: port,
                    port: tenant.port,
                });
            }
            Upstream::Missing => {
                notes.push(Note::Warning(format!("No proxy configuration found for {}", subdomain)));
            }
            Upstream::Unparsable => {
                notes.push(Note::Warning("Cannot parse port from proxy configuration".to_string()));
            }
        }

        match self.certs.has_certificate(&subdomain).await {
            Ok(true) => notes.push(Note::Ok(format!("TLS certificate found for {}", subdomain))),
            Ok(false) => {
                notes.push(Note::Warning(format!("No TLS certificate found for {}", subdomain)));
            }
            Err(e) => {
                debug!(error = %e, "Certificate lookup failed");
                notes.push(Note::Warning(format!("Cannot check TLS certificates: {}", e)));
            }
        }

        if self.sites.is_enabled(&subdomain).await {
            notes.push(Note::Ok(format!("Proxy site enabled for {}", subdomain)));
        } else {
            notes.push(Note::Warning(format!("Proxy site not enabled for {}", subdomain)));
        }

        for note in &notes {
            if let Note::Warning(message) = note {
                warn!(tenant = %tenant.id, "{}", message);
            }
        }
        Ok(notes)
    }
}
