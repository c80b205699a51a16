//! Target selectors.
//!
//! A selector names one or more tenants:
//! - `all` - every registered tenant
//! - `@<tag>` - tenants carrying a tag
//! - `server=<version>` - tenants on an exact server version
//! - anything else - a tenant id, or failing that a bare tag
//!
//! A list of selectors resolves to the concatenation of each selector's ids,
//! deduplicated in first-seen order. The order is preserved, not re-sorted:
//! it drives the sequential apply loop.

use crate::error::{Result, WbError};
use crate::registry::TenantStore;
use crate::types::Tenant;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Fields usable in `<field>=<value>` selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorField {
    /// Exact match on `serverVersion`
    Server,
}

impl SelectorField {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "server" => Some(SelectorField::Server),
            _ => None,
        }
    }

    fn matches(&self, tenant: &Tenant, value: &str) -> bool {
        match self {
            SelectorField::Server => tenant.server_version == value,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            SelectorField::Server => "version",
        }
    }
}

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Tag(String),
    Field { field: SelectorField, value: String },
    /// Tenant id, falling back to a bare tag
    Literal(String),
}

impl Selector {
    pub fn parse(s: &str) -> Self {
        if s == "all" {
            return Selector::All;
        }
        if let Some(tag) = s.strip_prefix('@') {
            return Selector::Tag(tag.to_string());
        }
        if let Some((field, value)) = s.split_once('=') {
            if let Some(field) = SelectorField::parse(field) {
                return Selector::Field { field, value: value.to_string() };
            }
        }
        Selector::Literal(s.to_string())
    }

    /// Ids this selector names within `tenants`, in registry order.
    pub fn resolve(&self, tenants: &[Tenant]) -> Result<Vec<String>> {
        match self {
            Selector::All => Ok(tenants.iter().map(|t| t.id.clone()).collect()),
            Selector::Tag(tag) => {
                let ids = tagged(tenants, tag);
                if ids.is_empty() {
                    return Err(WbError::NoMatch { kind: "tag", value: tag.clone() });
                }
                Ok(ids)
            }
            Selector::Field { field, value } => {
                let ids: Vec<String> = tenants
                    .iter()
                    .filter(|t| field.matches(t, value))
                    .map(|t| t.id.clone())
                    .collect();
                if ids.is_empty() {
                    return Err(WbError::NoMatch { kind: field.describe(), value: value.clone() });
                }
                Ok(ids)
            }
            Selector::Literal(name) => {
                if tenants.iter().any(|t| &t.id == name) {
                    return Ok(vec![name.clone()]);
                }
                // An unknown id is retried as a bare tag, so a mistyped id can
                // still match a tag of the same spelling.
                let ids = tagged(tenants, name);
                if ids.is_empty() {
                    return Err(WbError::NotFound { target: name.clone() });
                }
                Ok(ids)
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all"),
            Selector::Tag(tag) => write!(f, "@{}", tag),
            Selector::Field { field: SelectorField::Server, value } => write!(f, "server={}", value),
            Selector::Literal(name) => write!(f, "{}", name),
        }
    }
}

fn tagged(tenants: &[Tenant], tag: &str) -> Vec<String> {
    tenants.iter().filter(|t| t.has_tag(tag)).map(|t| t.id.clone()).collect()
}

/// Resolve several selectors against an already-loaded tenant list.
///
/// The first failing selector aborts the whole resolution.
pub fn resolve_selectors<S: AsRef<str>>(tenants: &[Tenant], selectors: &[S]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for raw in selectors {
        let selector = Selector::parse(raw.as_ref());
        for id in selector.resolve(tenants)? {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
    }

    Ok(ids)
}

/// Resolve selectors against the registry's current contents.
pub async fn resolve_targets<S: AsRef<str>>(
    store: &TenantStore,
    selectors: &[S],
) -> Result<Vec<String>> {
    let tenants = store.list().await?;
    let ids = resolve_selectors(&tenants, selectors)?;
    debug!(count = ids.len(), ?ids, "Resolved targets");
    Ok(ids)
}
