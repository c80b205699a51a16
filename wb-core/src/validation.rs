//! Field-level validation of tenant records.
//!
//! Validation always runs on a complete record: on create, and on the merged
//! result of every update. Never on a change set alone.

use crate::types::Tenant;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Lowest port a tenant may publish.
pub const MIN_PORT: u32 = 1000;

/// Highest port a tenant may publish.
pub const MAX_PORT: u32 = 65535;

/// Tenant ids: lowercase alphanumeric and hyphen, at least one character.
static TENANT_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("Invalid tenant id regex"));

/// A single broken rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    InvalidId,
    MissingLabel,
    MissingServerVersion,
    PortOutOfRange,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::InvalidId => write!(f, "ID must be lowercase alphanumeric with hyphens"),
            Violation::MissingLabel => write!(f, "Label is required"),
            Violation::MissingServerVersion => write!(f, "Server version is required"),
            Violation::PortOutOfRange => {
                write!(f, "Port must be between {} and {}", MIN_PORT, MAX_PORT)
            }
        }
    }
}

/// Check `tenant` against every field rule. Empty means valid.
pub fn validate(tenant: &Tenant) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !is_valid_id(&tenant.id) {
        violations.push(Violation::InvalidId);
    }
    if tenant.label.trim().is_empty() {
        violations.push(Violation::MissingLabel);
    }
    if tenant.server_version.trim().is_empty() {
        violations.push(Violation::MissingServerVersion);
    }
    if !(MIN_PORT..=MAX_PORT).contains(&tenant.port) {
        violations.push(Violation::PortOutOfRange);
    }

    violations
}

/// Whether `id` is usable as a tenant id.
pub fn is_valid_id(id: &str) -> bool {
    TENANT_ID_REGEX.is_match(id)
}
