//! Tenant domain types.

use serde::{Deserialize, Serialize};

/// One managed deployment: its identity, published port and container versions.
///
/// Field names serialize in camelCase to match the registry file format.
/// Optional fields are omitted entirely when unset so that a record which never
/// had tags round-trips byte-for-byte. Keys this type does not model are kept
/// in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Primary key; also the container, network and subdomain name
    #[serde(default)]
    pub id: String,

    /// Human-readable display name
    #[serde(default)]
    pub label: String,

    /// Published application port
    #[serde(default)]
    pub port: u32,

    /// On-disk instance directory name override (defaults to `id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_dir: Option<String>,

    /// Application version, selects image family and tag
    #[serde(default)]
    pub server_version: String,

    /// Admin service version; enables the admin container when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub french: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ethiopian: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_access: Option<bool>,

    /// Free-form labels used by `@tag` selectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Tenant {
    /// Create a tenant with the required fields set and every flag off.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        port: u32,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            port,
            instance_dir: None,
            server_version: server_version.into(),
            admin_version: None,
            french: Some(false),
            ethiopian: Some(false),
            open_access: Some(false),
            tags: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Directory name under the mount path holding this tenant's data.
    pub fn instance_dir_name(&self) -> &str {
        self.instance_dir.as_deref().filter(|d| !d.is_empty()).unwrap_or(&self.id)
    }

    /// Public hostname of this tenant under `domain`.
    pub fn subdomain(&self, domain: &str) -> String {
        format!("{}.{}", self.id, domain)
    }

    /// Whether this tenant carries `tag`. Case-sensitive.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.as_ref().is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    pub fn is_french(&self) -> bool {
        self.french.unwrap_or(false)
    }

    pub fn is_ethiopian(&self) -> bool {
        self.ethiopian.unwrap_or(false)
    }

    pub fn is_open_access(&self) -> bool {
        self.open_access.unwrap_or(false)
    }

    /// Name of the application container.
    pub fn app_container(&self) -> &str {
        &self.id
    }

    /// Name of the database container.
    pub fn database_container(&self) -> String {
        format!("{}-postgres", self.id)
    }

    /// Name of the admin container.
    pub fn admin_container(&self) -> String {
        format!("{}-admin", self.id)
    }

    /// Name of the isolated container network.
    pub fn network(&self) -> &str {
        &self.id
    }
}

/// Display label derived from an id: hyphens become spaces and each word is
/// capitalised (`south-sudan` -> `South Sudan`).
pub fn label_from_id(id: &str) -> String {
    id.split(['-', ' '])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Partial update applied on top of an existing tenant.
///
/// Only fields set to `Some` are merged. `instance_dir` and `admin_version` are
/// doubly optional so a change set can clear them (`Some(None)`). The id is not
/// part of the change set: it is immutable once registered. Tags change through
/// the registry's tag operations instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantChanges {
    pub label: Option<String>,
    pub port: Option<u32>,
    pub instance_dir: Option<Option<String>>,
    pub server_version: Option<String>,
    pub admin_version: Option<Option<String>>,
    pub french: Option<bool>,
    pub ethiopian: Option<bool>,
    pub open_access: Option<bool>,
}

impl TenantChanges {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow-merge these changes onto `tenant`, returning the merged record.
    pub fn apply_to(&self, tenant: &Tenant) -> Tenant {
        let mut merged = tenant.clone();
        if let Some(label) = &self.label {
            merged.label = label.clone();
        }
        if let Some(port) = self.port {
            merged.port = port;
        }
        if let Some(dir) = &self.instance_dir {
            merged.instance_dir = dir.clone();
        }
        if let Some(version) = &self.server_version {
            merged.server_version = version.clone();
        }
        if let Some(admin) = &self.admin_version {
            merged.admin_version = admin.clone();
        }
        if let Some(french) = self.french {
            merged.french = Some(french);
        }
        if let Some(ethiopian) = self.ethiopian {
            merged.ethiopian = Some(ethiopian);
        }
        if let Some(open_access) = self.open_access {
            merged.open_access = Some(open_access);
        }
        merged
    }

    /// Human-readable description of each field this change set touches.
    pub fn describe(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(label) = &self.label {
            out.push(format!("label: \"{}\"", label));
        }
        if let Some(port) = self.port {
            out.push(format!("port: {}", port));
        }
        if let Some(version) = &self.server_version {
            out.push(format!("server: {}", version));
        }
        match &self.admin_version {
            Some(Some(admin)) => out.push(format!("admin: {}", admin)),
            Some(None) => out.push("admin: None (removed)".to_string()),
            None => {}
        }
        match &self.instance_dir {
            Some(Some(dir)) => out.push(format!("instance-dir: {}", dir)),
            Some(None) => out.push("instance-dir: default".to_string()),
            None => {}
        }
        if let Some(french) = self.french {
            out.push(format!("french: {}", french));
        }
        if let Some(ethiopian) = self.ethiopian {
            out.push(format!("ethiopian: {}", ethiopian));
        }
        if let Some(open_access) = self.open_access {
            out.push(format!("open-access: {}", open_access));
        }
        out
    }
}
