//! `wb config` commands

use super::{confirm, Context};
use anyhow::{bail, Context as _, Result};
use colored::{ColoredString, Colorize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tracing::warn;
use wb_core::version::compare_versions;
use wb_core::{resolve_targets, Tenant, TenantChanges};

#[derive(Tabled)]
struct TenantRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Server Version")]
    server: String,
    #[tabled(rename = "Admin Version")]
    admin: String,
    #[tabled(rename = "Port")]
    port: u32,
    #[tabled(rename = "Running")]
    running: String,
    #[tabled(rename = "Instance Dir")]
    instance_dir: String,
    #[tabled(rename = "French")]
    french: String,
    #[tabled(rename = "Ethiopian")]
    ethiopian: String,
    #[tabled(rename = "Open")]
    open_access: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

/// List registered tenants
pub async fn list(ctx: &Context, json: bool, tag: Option<String>) -> Result<()> {
    let tenants = match &tag {
        Some(tag) => ctx.store.by_tag(tag).await?,
        None => ctx.store.list().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tenants)?);
        return Ok(());
    }

    if tenants.is_empty() {
        match tag {
            Some(tag) => println!("No servers tagged '{}'", tag),
            None => println!("No servers configured"),
        }
        return Ok(());
    }

    let running = running_containers(ctx).await;
    let server_colors = VersionColors::new(tenants.iter().map(|t| t.server_version.as_str()));
    let admin_colors =
        VersionColors::new(tenants.iter().filter_map(|t| t.admin_version.as_deref()));

    let rows: Vec<TenantRow> = tenants
        .iter()
        .map(|t| TenantRow {
            id: t.id.clone(),
            label: t.label.clone(),
            server: server_colors.paint(&t.server_version).to_string(),
            admin: t
                .admin_version
                .as_deref()
                .map(|v| admin_colors.paint(v).to_string())
                .unwrap_or_default(),
            port: t.port,
            running: mark(running.contains(t.app_container())),
            instance_dir: t.instance_dir.clone().unwrap_or_default(),
            french: mark(t.is_french()),
            ethiopian: mark(t.is_ethiopian()),
            open_access: mark(t.is_open_access()),
            tags: t.tags.as_deref().map(|tags| tags.join(", ")).unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());

    println!("{}", table);
    println!("{}", format!("{} server(s)", tenants.len()).dimmed());

    Ok(())
}

async fn running_containers(ctx: &Context) -> HashSet<String> {
    match ctx.orchestrator().runtime().running_containers().await {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Cannot list running containers");
            HashSet::new()
        }
    }
}

fn mark(on: bool) -> String {
    if on {
        "✓".green().to_string()
    } else {
        String::new()
    }
}

/// Colours versions by age: newest green, second blue, oldest red, the rest dimmed.
struct VersionColors {
    rank: HashMap<String, usize>,
    count: usize,
}

impl VersionColors {
    fn new<'a>(versions: impl IntoIterator<Item = &'a str>) -> Self {
        let mut distinct: Vec<&str> = versions.into_iter().collect();
        distinct.sort_by(|a, b| compare_versions(b, a));
        distinct.dedup();

        let rank = distinct.iter().enumerate().map(|(i, v)| (v.to_string(), i)).collect();
        Self { rank, count: distinct.len() }
    }

    fn paint(&self, version: &str) -> ColoredString {
        match self.rank.get(version).copied() {
            Some(0) => version.green(),
            Some(i) if i + 1 == self.count => version.red(),
            Some(1) => version.blue(),
            _ => version.dimmed(),
        }
    }
}

/// Show one tenant
pub async fn show(ctx: &Context, id: &str, json: bool) -> Result<()> {
    let tenant = ctx.tenant(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tenant)?);
        return Ok(());
    }

    println!("{}", "Server Configuration".bold());
    println!("  ID:             {}", tenant.id);
    println!("  Label:          {}", tenant.label);
    println!("  Port:           {}", tenant.port);
    println!("  Instance Dir:   {}", tenant.instance_dir_name());
    println!("  Server Version: {}", tenant.server_version);
    println!("  Admin Version:  {}", tenant.admin_version.as_deref().unwrap_or("None"));
    println!("  French:         {}", yes_no(tenant.is_french()));
    println!("  Ethiopian:      {}", yes_no(tenant.is_ethiopian()));
    println!("  Open Access:    {}", yes_no(tenant.is_open_access()));
    if let Some(tags) = tenant.tags.as_deref().filter(|t| !t.is_empty()) {
        println!("  Tags:           {}", tags.join(", "));
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Register a new tenant with defaults
pub async fn add(ctx: &Context, id: &str) -> Result<()> {
    let tenant = ctx.store.add_default(id).await?;

    println!("{} Added server '{}' on port {}", "✓".green().bold(), tenant.id, tenant.port);
    println!("  Label: {}", tenant.label);
    println!("  Server version: {}", tenant.server_version);
    println!("  Admin version: None");
    println!();
    println!("Next: wb init-dirs {id} && wb init-nginx {id} && wb init-ssl {id}", id = tenant.id);

    Ok(())
}

/// Apply the same change set to every selected tenant
pub async fn update(ctx: &Context, selectors: &[String], changes: TenantChanges) -> Result<()> {
    if changes.is_empty() {
        println!("{}", "No changes specified".yellow());
        return Ok(());
    }

    let ids = resolve_targets(&ctx.store, selectors).await?;
    let mut failed = 0;

    for id in &ids {
        match ctx.store.update(id, &changes).await {
            Ok(_) => {
                println!("{} Updated '{}':", "✓".green().bold(), id);
                for line in changes.describe() {
                    println!("  {}", line);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} Failed to update '{}': {}", "✗".red().bold(), id, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} update(s) failed", failed, ids.len());
    }
    Ok(())
}

/// Remove registry entries (containers and data are left alone)
pub async fn remove(ctx: &Context, selector: &str, force: bool) -> Result<()> {
    let ids = resolve_targets(&ctx.store, &[selector]).await?;

    if !force {
        println!("The following server(s) will be removed from the registry:");
        for id in &ids {
            println!("  - {}", id);
        }
        if !confirm("Are you sure?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    for id in &ids {
        ctx.store.remove(id).await?;
        println!("{} Removed '{}'", "✓".green().bold(), id);
    }

    println!();
    println!("{}", "Note: containers are still running and instance data is kept.".yellow());
    println!("Stop them with: wb stop {}", ids.join(" "));

    Ok(())
}

/// Add tags to every selected tenant
pub async fn tag(ctx: &Context, selector: &str, tags: &[String]) -> Result<()> {
    for id in resolve_targets(&ctx.store, &[selector]).await? {
        let tenant = ctx.store.add_tags(&id, tags).await?;
        println!("{} Added tags to '{}': {}", "✓".green().bold(), id, tags.join(", "));
        print_tags(&tenant);
    }
    Ok(())
}

/// Remove tags from every selected tenant
pub async fn untag(ctx: &Context, selector: &str, tags: &[String]) -> Result<()> {
    for id in resolve_targets(&ctx.store, &[selector]).await? {
        let tenant = ctx.store.remove_tags(&id, tags).await?;
        println!("{} Removed tags from '{}': {}", "✓".green().bold(), id, tags.join(", "));
        print_tags(&tenant);
    }
    Ok(())
}

fn print_tags(tenant: &Tenant) {
    match tenant.tags.as_deref().filter(|t| !t.is_empty()) {
        Some(tags) => println!("  Tags: {}", tags.join(", ")),
        None => println!("  Tags: {}", "none".dimmed()),
    }
}

/// Check every stored record
pub async fn validate(ctx: &Context) -> Result<()> {
    let (count, errors) = ctx.store.validate_all().await?;

    if errors.is_empty() {
        println!("{} servers.json is valid", "✓".green().bold());
        println!("  {} server(s) configured", count);
        return Ok(());
    }

    println!("{} servers.json has errors:", "✗".red().bold());
    for (id, violations) in &errors {
        println!("  {}:", id.bold());
        for violation in violations {
            println!("    - {}", violation);
        }
    }
    bail!("{} of {} server(s) invalid", errors.len(), count)
}

/// Copy the registry file aside
pub async fn backup(ctx: &Context) -> Result<()> {
    let path = ctx.store.backup().await?;
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        println!("{} Backup created: {}", "✓".green().bold(), path.display());
    } else {
        println!("{}", "Nothing to back up: servers.json does not exist".yellow());
    }
    Ok(())
}

/// Replace the registry file with a backup, backing up the live file first
pub async fn restore(ctx: &Context, file: &Path, force: bool) -> Result<()> {
    if !tokio::fs::try_exists(file).await.unwrap_or(false) {
        bail!("Backup file not found: {}", file.display());
    }

    if !force {
        println!("This will replace {} with {}", ctx.store.path().display(), file.display());
        if !confirm("Continue?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let current = ctx.store.backup().await.context("Failed to back up the current registry")?;
    println!("Current registry saved to {}", current.display());

    ctx.store.restore(file).await?;
    println!("{} Restored from {}", "✓".green().bold(), file.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_colors_rank_newest_first() {
        let colors = VersionColors::new(["1.5.0", "1.10.0", "1.6.7", "1.5.0"]);
        assert_eq!(colors.count, 3);
        assert_eq!(colors.rank["1.10.0"], 0);
        assert_eq!(colors.rank["1.6.7"], 1);
        assert_eq!(colors.rank["1.5.0"], 2);
    }

    #[test]
    fn test_two_versions_are_green_and_red() {
        let colors = VersionColors::new(["2.0.0", "1.0.0"]);
        assert_eq!(colors.paint("2.0.0"), "2.0.0".green());
        assert_eq!(colors.paint("1.0.0"), "1.0.0".red());
    }

    #[test]
    fn test_middle_versions_dimmed() {
        let colors = VersionColors::new(["4.0.0", "3.0.0", "2.0.0", "1.0.0"]);
        assert_eq!(colors.paint("3.0.0"), "3.0.0".blue());
        assert_eq!(colors.paint("2.0.0"), "2.0.0".dimmed());
        assert_eq!(colors.paint("1.0.0"), "1.0.0".red());
    }
}
