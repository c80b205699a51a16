//! Per-tenant instance directories.
//!
//! Each tenant owns `<mount>/<instance_dir>/` with a fixed set of
//! subdirectories. They are created by an explicit init step; bring-up only
//! checks that they exist.

use crate::error::{Result, WbError};
use crate::types::Tenant;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Database storage, mounted into both database and application containers.
pub const DATABASES_DIR: &str = "databases";

/// Shared scratch space between the application and the database.
pub const SANDBOX_DIR: &str = "sandbox";

pub const ASSETS_DIR: &str = "assets";

pub const EXPORTS_DIR: &str = "exports";

/// Subdirectories that must exist before a tenant can be brought up.
pub const SUBDIRECTORIES: [&str; 4] = [DATABASES_DIR, SANDBOX_DIR, ASSETS_DIR, EXPORTS_DIR];

/// Permission mode applied to the sandbox directory.
pub const SANDBOX_MODE: u32 = 0o777;

/// Outcome of creating one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirStatus {
    Created(PathBuf),
    Existing(PathBuf),
}

/// Paths of one tenant's instance directory.
#[derive(Debug, Clone)]
pub struct InstanceLayout {
    root: PathBuf,
}

impl InstanceLayout {
    /// Layout for `tenant` under `mount_path`.
    pub fn new(mount_path: &Path, tenant: &Tenant) -> Self {
        Self { root: mount_path.join(tenant.instance_dir_name()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn databases(&self) -> PathBuf {
        self.root.join(DATABASES_DIR)
    }

    pub fn sandbox(&self) -> PathBuf {
        self.root.join(SANDBOX_DIR)
    }

    pub fn assets(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// First missing path among the root and its required subdirectories.
    pub async fn first_missing(&self) -> Option<PathBuf> {
        let candidates =
            std::iter::once(self.root.clone()).chain(SUBDIRECTORIES.iter().map(|d| self.root.join(d)));
        for path in candidates {
            if tokio::fs::symlink_metadata(&path).await.is_err() {
                return Some(path);
            }
        }
        None
    }

    /// Fail with `NotReady` unless every required directory exists.
    pub async fn ensure_ready(&self, tenant_id: &str) -> Result<()> {
        match self.first_missing().await {
            Some(path) => Err(WbError::NotReady { tenant: tenant_id.to_string(), path }),
            None => Ok(()),
        }
    }

    /// Re-apply [`SANDBOX_MODE`] on the sandbox directory.
    pub async fn apply_sandbox_mode(&self) -> Result<()> {
        let sandbox = self.sandbox();
        set_mode(&sandbox, SANDBOX_MODE).await.map_err(|e| WbError::io(&sandbox, e))
    }

    /// Create the root and every subdirectory that does not exist yet.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn create(&self) -> Result<Vec<DirStatus>> {
        let mut statuses = Vec::with_capacity(SUBDIRECTORIES.len() + 1);
        statuses.push(create_dir(&self.root).await?);
        for sub in SUBDIRECTORIES {
            statuses.push(create_dir(&self.root.join(sub)).await?);
        }
        self.apply_sandbox_mode().await?;
        info!("Instance directories ready");
        Ok(statuses)
    }

    /// Delete the instance directory and everything in it.
    ///
    /// Returns `false` if it did not exist.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn remove(&self) -> Result<bool> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                info!("Instance directory removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WbError::io(&self.root, e)),
        }
    }
}

async fn create_dir(path: &Path) -> Result<DirStatus> {
    if tokio::fs::symlink_metadata(path).await.is_ok() {
        debug!(path = %path.display(), "Directory already exists");
        return Ok(DirStatus::Existing(path.to_path_buf()));
    }
    tokio::fs::create_dir(path).await.map_err(|e| WbError::io(path, e))?;
    Ok(DirStatus::Created(path.to_path_buf()))
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(path: &Path, _mode: u32) -> std::io::Result<()> {
    tokio::fs::metadata(path).await.map(|_| ())
}
