//! Tenant registry backed by a JSON file.
//!
//! The file holds a pretty-printed JSON array of tenants, always sorted by id.
//! Every mutation re-reads the file, applies the change, and rewrites the whole
//! collection through a temporary sibling file plus an atomic rename, so readers
//! never observe a partial write.
//!
//! There is no cross-process lock. Two concurrent writers can both succeed and
//! the last rename wins, silently dropping the other writer's change.

use crate::error::{Result, WbError};
use crate::ports::allocate_port;
use crate::types::{label_from_id, Tenant, TenantChanges};
use crate::validation::validate;
use crate::version::latest;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};


/// Server version given to the first tenant of an empty registry.
pub const DEFAULT_SERVER_VERSION: &str = "1.0.0";

/// Durable, atomically-updated collection of tenants keyed by id.
#[derive(Debug, Clone)]
pub struct TenantStore {
    path: PathBuf,
}

impl TenantStore {
    /// Open the registry at `path`. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the live registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every registered tenant, in file order.
    ///
    /// A missing file reads as an empty registry. Any other I/O failure, or a
    /// file that is not a JSON array of tenants, is an error.
    pub async fn list(&self) -> Result<Vec<Tenant>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Registry file absent, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(WbError::io(&self.path, e)),
        };

        serde_json::from_str(&text)
            .map_err(|e| WbError::RegistryFormat { path: self.path.clone(), source: e })
    }

    /// Look up a single tenant.
    pub async fn get(&self, id: &str) -> Result<Option<Tenant>> {
        Ok(self.list().await?.into_iter().find(|t| t.id == id))
    }

    /// Look up a single tenant, failing with `NotFound` when absent.
    pub async fn require(&self, id: &str) -> Result<Tenant> {
        self.get(id).await?.ok_or_else(|| WbError::NotFound { target: id.to_string() })
    }

    /// Tenants carrying `tag`.
    pub async fn by_tag(&self, tag: &str) -> Result<Vec<Tenant>> {
        Ok(self.list().await?.into_iter().filter(|t| t.has_tag(tag)).collect())
    }

    /// Tenants whose server version equals `version` exactly.
    pub async fn by_version(&self, version: &str) -> Result<Vec<Tenant>> {
        Ok(self.list().await?.into_iter().filter(|t| t.server_version == version).collect())
    }

    /// Register a new tenant.
    ///
    /// # Errors
    /// * `Validation` - if any field rule is broken
    /// * `Conflict` - if the id is already registered
    #[instrument(skip(self, tenant), fields(tenant = %tenant.id))]
    pub async fn add(&self, tenant: Tenant) -> Result<()> {
        let mut tenants = self.list().await?;

        ensure_valid(&tenant)?;
        if tenants.iter().any(|t| t.id == tenant.id) {
            return Err(WbError::Conflict { id: tenant.id });
        }

        tenants.push(tenant);
        self.write(tenants).await?;
        info!("Tenant added");
        Ok(())
    }

    /// Register `id` with defaults taken from the current registry.
    ///
    /// The label is derived from the id, the server version is the highest one
    /// already registered (or `1.0.0`), and the port comes from the allocator.
    #[instrument(skip(self))]
    pub async fn add_default(&self, id: &str) -> Result<Tenant> {
        let existing = self.list().await?;
        let version = latest(existing.iter().map(|t| t.server_version.as_str()))
            .unwrap_or(DEFAULT_SERVER_VERSION);
        let tenant = Tenant::new(id, label_from_id(id), allocate_port(&existing), version);

        self.add(tenant.clone()).await?;
        Ok(tenant)
    }

    /// Merge `changes` onto an existing tenant and re-validate the result.
    ///
    /// Returns the merged record.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: &str, changes: &TenantChanges) -> Result<Tenant> {
        let mut tenants = self.list().await?;
        let index = position(&tenants, id)?;

        let updated = changes.apply_to(&tenants[index]);
        ensure_valid(&updated)?;

        tenants[index] = updated.clone();
        self.write(tenants).await?;
        info!("Tenant updated");
        Ok(updated)
    }

    /// Delete a tenant's registry entry.
    ///
    /// Containers, networks and instance directories are left untouched.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<Tenant> {
        let mut tenants = self.list().await?;
        let index = position(&tenants, id)?;

        let removed = tenants.remove(index);
        self.write(tenants).await?;
        info!("Tenant removed");
        Ok(removed)
    }

    /// Add `tags` to a tenant's tag set. Tags already present are kept once.
    #[instrument(skip(self))]
    pub async fn add_tags(&self, id: &str, tags: &[String]) -> Result<Tenant> {
        self.modify_tags(id, |current| {
            for tag in tags {
                if !current.contains(tag) {
                    current.push(tag.clone());
                }
            }
        })
        .await
    }

    /// Remove `tags` from a tenant's tag set. An emptied set becomes absent.
    #[instrument(skip(self))]
    pub async fn remove_tags(&self, id: &str, tags: &[String]) -> Result<Tenant> {
        self.modify_tags(id, |current| current.retain(|t| !tags.contains(t))).await
    }

    async fn modify_tags(&self, id: &str, edit: impl FnOnce(&mut Vec<String>)) -> Result<Tenant> {
        let mut tenants = self.list().await?;
        let index = position(&tenants, id)?;

        let tenant = &mut tenants[index];
        let mut tags = tenant.tags.take().unwrap_or_default();
        edit(&mut tags);
        tenant.tags = if tags.is_empty() { None } else { Some(tags) };

        let updated = tenant.clone();
        self.write(tenants).await?;
        debug!(tags = ?updated.tags, "Tags updated");
        Ok(updated)
    }

    /// Violations for every stored tenant that fails validation, keyed by id.
    pub async fn validate_all(&self) -> Result<(usize, BTreeMap<String, Vec<String>>)> {
        let tenants = self.list().await?;
        let errors = tenants
            .iter()
            .filter_map(|t| {
                let violations = validate(t);
                (!violations.is_empty())
                    .then(|| (t.id.clone(), violations.iter().map(|v| v.to_string()).collect()))
            })
            .collect();
        Ok((tenants.len(), errors))
    }

    /// Copy the live file to `<path>.backup.<timestamp>` and return that path.
    ///
    /// A missing live file is not an error: nothing is copied, and the returned
    /// path does not exist.
    #[instrument(skip(self))]
    pub async fn backup(&self) -> Result<PathBuf> {
        let timestamp = chrono::Utc::now()
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        let backup_path = sibling(&self.path, &format!(".backup.{}", timestamp));

        match tokio::fs::copy(&self.path, &backup_path).await {
            Ok(_) => info!(backup = %backup_path.display(), "Registry backed up"),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Registry file absent, nothing to back up");
            }
            Err(e) => return Err(WbError::io(&backup_path, e)),
        }

        Ok(backup_path)
    }

    /// Overwrite the live file with the contents of `backup_path`.
    #[instrument(skip(self))]
    pub async fn restore(&self, backup_path: &Path) -> Result<()> {
        let bytes =
            tokio::fs::read(backup_path).await.map_err(|e| WbError::io(backup_path, e))?;
        self.write_bytes(&bytes).await?;
        info!(backup = %backup_path.display(), "Registry restored");
        Ok(())
    }

    /// Sort by id and atomically replace the file.
    async fn write(&self, mut tenants: Vec<Tenant>) -> Result<()> {
        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        let text = serde_json::to_string_pretty(&tenants)
            .map_err(|e| WbError::RegistryFormat { path: self.path.clone(), source: e })?;
        self.write_bytes(text.as_bytes()).await
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let temp = sibling(&self.path, ".tmp");
        tokio::fs::write(&temp, bytes).await.map_err(|e| WbError::io(&temp, e))?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| WbError::io(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Registry written");
        Ok(())
    }
}

fn position(tenants: &[Tenant], id: &str) -> Result<usize> {
    tenants
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| WbError::NotFound { target: id.to_string() })
}

fn ensure_valid(tenant: &Tenant) -> Result<()> {
    let violations = validate(tenant);
    if violations.is_empty() {
        return Ok(());
    }
    Err(WbError::Validation {
        id: tenant.id.clone(),
        violations: violations.iter().map(|v| v.to_string()).collect(),
    })
}

/// `path` with `suffix` appended to its file name, in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
