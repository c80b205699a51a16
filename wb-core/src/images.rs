//! Container image references.

use crate::types::Tenant;
use crate::version::ImageFamily;

/// Database image, shared by every tenant.
pub const DATABASE_IMAGE: &str = "postgres:17.4";

/// Application image for `server_version` in `repository`.
pub fn server_image(repository: &str, server_version: &str) -> String {
    family_image(repository, ImageFamily::for_server(server_version), server_version)
}

/// Admin image for `admin_version` in `repository`. Always the legacy-admin family.
pub fn admin_image(repository: &str, admin_version: &str) -> String {
    family_image(repository, ImageFamily::LegacyAdmin, admin_version)
}

fn family_image(repository: &str, family: ImageFamily, version: &str) -> String {
    format!("{}:{}-v{}", repository, family.tag_prefix(), version)
}

/// Every image a fleet needs, in pull order.
///
/// The database image comes first, then each distinct server image, then each
/// distinct admin image, each group in first-seen order. Tenants without a
/// server version contribute no server image.
pub fn images_to_pull<'a>(
    repository: &str,
    tenants: impl IntoIterator<Item = &'a Tenant>,
) -> Vec<String> {
    let mut servers: Vec<String> = Vec::new();
    let mut admins: Vec<String> = Vec::new();

    for tenant in tenants {
        if !tenant.server_version.trim().is_empty() {
            push_unique(&mut servers, server_image(repository, &tenant.server_version));
        }
        if let Some(admin) = tenant.admin_version.as_deref().filter(|v| !v.is_empty()) {
            push_unique(&mut admins, admin_image(repository, admin));
        }
    }

    std::iter::once(DATABASE_IMAGE.to_string()).chain(servers).chain(admins).collect()
}

fn push_unique(list: &mut Vec<String>, image: String) {
    if !list.contains(&image) {
        list.push(image);
    }
}
