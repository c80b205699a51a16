//! Port allocation for tenants.
//!
//! New tenants get the next port above the highest one in use, starting at
//! 3000. Gaps left by removed tenants are not reclaimed, and two processes
//! allocating from the same snapshot can pick the same port.

use crate::types::Tenant;

/// First port handed out when no tenant is at or above it.
pub const BASE_PORT: u32 = 3000;

/// Offset from a tenant's published port to its database port.
pub const DATABASE_PORT_OFFSET: u32 = 10000;

/// Port the application listens on inside its container.
pub const APP_CONTAINER_PORT: u16 = 8000;

/// Port the admin service listens on inside its container.
pub const ADMIN_CONTAINER_PORT: u16 = 8001;

/// Port the database listens on inside its container.
pub const DATABASE_CONTAINER_PORT: u16 = 5432;

/// Next free port: highest existing port at or above [`BASE_PORT`], plus one.
pub fn allocate_port<'a>(tenants: impl IntoIterator<Item = &'a Tenant>) -> u32 {
    tenants
        .into_iter()
        .map(|t| t.port)
        .filter(|&port| port >= BASE_PORT)
        .max()
        .map_or(BASE_PORT, |max| max.saturating_add(1))
}

/// Host port for a tenant's database, derived from its published port.
pub fn derived_port(primary_port: u32) -> u32 {
    primary_port.saturating_add(DATABASE_PORT_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(port: u32) -> Tenant {
        Tenant::new(format!("t{}", port), "T", port, "1.0.0")
    }

    #[test]
    fn test_allocate_empty() {
        assert_eq!(allocate_port(&Vec::<Tenant>::new()), 3000);
    }

    #[test]
    fn test_allocate_after_highest() {
        assert_eq!(allocate_port(&[at(3005), at(3002)]), 3006);
    }

    #[test]
    fn test_allocate_ignores_low_ports() {
        assert_eq!(allocate_port(&[at(2999), at(1500)]), 3000);
        assert_eq!(allocate_port(&[at(2999), at(3000)]), 3001);
    }

    #[test]
    fn test_allocate_does_not_fill_gaps() {
        assert_eq!(allocate_port(&[at(3000), at(3010)]), 3011);
    }

    #[test]
    fn test_derived_port() {
        assert_eq!(derived_port(3005), 13005);
    }

    #[test]
    fn test_out_of_range_ports_do_not_overflow() {
        assert_eq!(allocate_port(&[at(u32::MAX)]), u32::MAX);
        assert_eq!(derived_port(u32::MAX - 5), u32::MAX);
    }
}
