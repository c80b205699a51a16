//! Core domain types for wb.

pub mod tenant;

// Re-exports
pub use tenant::{label_from_id, Tenant, TenantChanges};
