//! Reverse-proxy (nginx) site files.
//!
//! One site file per tenant subdomain lives in `sites-available`; a symlink in
//! `sites-enabled` turns it on. Bring-up only reads the upstream port back out
//! of the site file.

use crate::error::{Result, WbError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Extracts the upstream port from a site file.
static UPSTREAM_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"proxy_pass\s+http://localhost:(\d+)").expect("Invalid upstream port regex")
});

/// What the proxy site file says about a tenant's upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Site file exists and names this port
    Port(u32),
    /// No site file
    Missing,
    /// Site file exists but no port could be read from it
    Unparsable,
}

/// One tenant's site as seen in `sites-available` / `sites-enabled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEntry {
    pub name: String,
    pub port: Option<u32>,
    /// Symlink target, for entries in `sites-enabled`
    pub target: Option<PathBuf>,
}

/// Site file locations for a proxy install.
#[derive(Debug, Clone)]
pub struct ProxySites {
    available: PathBuf,
    enabled: PathBuf,
}

impl ProxySites {
    pub fn new(available: impl Into<PathBuf>, enabled: impl Into<PathBuf>) -> Self {
        Self { available: available.into(), enabled: enabled.into() }
    }

    pub fn available_path(&self, subdomain: &str) -> PathBuf {
        self.available.join(subdomain)
    }

    pub fn enabled_path(&self, subdomain: &str) -> PathBuf {
        self.enabled.join(subdomain)
    }

    /// Read the upstream port configured for `subdomain`.
    pub async fn upstream(&self, subdomain: &str) -> Upstream {
        read_upstream(&self.available_path(subdomain)).await
    }

    /// Whether the site is linked into `sites-enabled`.
    pub async fn is_enabled(&self, subdomain: &str) -> bool {
        tokio::fs::symlink_metadata(self.enabled_path(subdomain)).await.is_ok()
    }

    /// Write the site file (unless one already exists) and (re)link it.
    ///
    /// Returns `true` if a new site file was written.
    #[instrument(skip(self))]
    pub async fn install(&self, subdomain: &str, port: u32) -> Result<bool> {
        let site = self.available_path(subdomain);
        let written = if tokio::fs::symlink_metadata(&site).await.is_ok() {
            debug!("Site file already exists, keeping it");
            false
        } else {
            tokio::fs::write(&site, render_site(subdomain, port))
                .await
                .map_err(|e| WbError::io(&site, e))?;
            true
        };

        let link = self.enabled_path(subdomain);
        match tokio::fs::remove_file(&link).await {
            Ok(()) => debug!("Removed existing symlink"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(WbError::io(&link, e)),
        }
        symlink(&site, &link).await.map_err(|e| WbError::io(&link, e))?;

        info!(written, "Proxy site installed");
        Ok(written)
    }

    /// Remove the symlink and the site file. Missing files are skipped.
    ///
    /// Returns `(link_removed, site_removed)`.
    #[instrument(skip(self))]
    pub async fn uninstall(&self, subdomain: &str) -> Result<(bool, bool)> {
        let link = remove_if_present(&self.enabled_path(subdomain)).await?;
        let site = remove_if_present(&self.available_path(subdomain)).await?;
        info!(link, site, "Proxy site removed");
        Ok((link, site))
    }

    /// Site files under `sites-available` whose name contains `domain`, sorted.
    pub async fn list_available(&self, domain: &str) -> Result<Vec<SiteEntry>> {
        let mut entries = Vec::new();
        for (name, path) in read_dir_matching(&self.available, domain).await? {
            let meta = tokio::fs::metadata(&path).await.map_err(|e| WbError::io(&path, e))?;
            if !meta.is_file() {
                continue;
            }
            let port = port_of(read_upstream(&path).await);
            entries.push(SiteEntry { name, port, target: None });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Entries under `sites-enabled` whose name contains `domain`, sorted.
    pub async fn list_enabled(&self, domain: &str) -> Result<Vec<SiteEntry>> {
        let mut entries = Vec::new();
        for (name, path) in read_dir_matching(&self.enabled, domain).await? {
            let target = tokio::fs::read_link(&path).await.ok();
            let port = port_of(read_upstream(target.as_deref().unwrap_or(&path)).await);
            entries.push(SiteEntry { name, port, target });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Site file body proxying `subdomain` to `localhost:<port>`.
pub fn render_site(subdomain: &str, port: u32) -> String {
    format!(
        "server {{
  listen 80;
  server_name {subdomain};
  location / {{
    proxy_pass http://localhost:{port};
    proxy_buffering off;
    proxy_set_header Host $host;
    proxy_set_header X-Real-IP $remote_addr;
    proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    proxy_set_header X-Forwarded-Proto $scheme;
  }}
}}
"
    )
}

/// Pull the upstream port out of site file text.
pub fn parse_upstream_port(content: &str) -> Option<u32> {
    UPSTREAM_PORT_REGEX.captures(content).and_then(|c| c[1].parse().ok())
}

/// Restart the proxy service so config changes take effect.
pub async fn restart_service() -> Result<()> {
    let command = "service nginx restart";
    let status = Command::new("service")
        .args(["nginx", "restart"])
        .status()
        .await
        .map_err(|e| WbError::Command { command: command.into(), reason: e.to_string() })?;
    if !status.success() {
        return Err(WbError::Command { command: command.into(), reason: status.to_string() });
    }
    Ok(())
}

async fn read_upstream(path: &Path) -> Upstream {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => parse_upstream_port(&content).map_or(Upstream::Unparsable, Upstream::Port),
        Err(e) if e.kind() == ErrorKind::NotFound => Upstream::Missing,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot read site file");
            Upstream::Unparsable
        }
    }
}

fn port_of(upstream: Upstream) -> Option<u32> {
    match upstream {
        Upstream::Port(port) => Some(port),
        _ => None,
    }
}

async fn read_dir_matching(dir: &Path, needle: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut reader = tokio::fs::read_dir(dir).await.map_err(|e| WbError::io(dir, e))?;
    let mut out = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|e| WbError::io(dir, e))? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.contains(needle) {
            out.push((name, entry.path()));
        }
    }
    Ok(out)
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(WbError::io(path, e)),
    }
}

#[cfg(unix)]
async fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(original, link).await
}

#[cfg(not(unix))]
async fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::copy(original, link).await.map(|_| ())
}
