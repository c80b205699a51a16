//! WB Core Library
//!
//! Tenant registry, target resolution and container lifecycle orchestration
//! for single-host wb deployments.

pub mod config;
pub mod error;
pub mod images;
pub mod layout;
pub mod observability;
pub mod orchestrator;
pub mod ports;
pub mod proxy;
pub mod registry;
pub mod runtime;
pub mod selector;
pub mod tls;
pub mod types;
pub mod validation;
pub mod version;

// Re-export commonly used items
pub use config::Settings;
pub use error::{Result, WbError};
pub use observability::init as init_observability;
pub use orchestrator::{BatchEvent, Note, Orchestrator, Phase, StepReport};
pub use registry::TenantStore;
pub use runtime::{ContainerRuntime, ContainerSpec, DockerCli, RunMode};
pub use selector::{resolve_targets, Selector};
pub use tls::{CertificateStore, Certbot};
pub use types::{Tenant, TenantChanges};
