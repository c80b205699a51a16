//! `wb init-nginx`, `wb remove-nginx` and `wb list-nginx` commands

use super::Context;
use anyhow::Result;
use colored::Colorize;
use wb_core::proxy::{self, SiteEntry};

/// Write the site file, enable it and restart nginx
pub async fn init(ctx: &Context, id: &str) -> Result<()> {
    let tenant = ctx.tenant(id).await?;
    let subdomain = tenant.subdomain(&ctx.settings.domain);
    let sites = ctx.sites();

    if sites.install(&subdomain, tenant.port).await? {
        println!("{} Created {}", "✓".green().bold(), sites.available_path(&subdomain).display());
    } else {
        println!(
            "  {} already exists, keeping it",
            sites.available_path(&subdomain).display().to_string().dimmed()
        );
    }
    println!("{} Enabled {}", "✓".green().bold(), sites.enabled_path(&subdomain).display());

    restart_nginx().await;
    Ok(())
}

/// Disable and delete the site, then restart nginx
pub async fn remove(ctx: &Context, id: &str) -> Result<()> {
    let tenant = ctx.tenant(id).await?;
    let subdomain = tenant.subdomain(&ctx.settings.domain);

    let (link, site) = ctx.sites().uninstall(&subdomain).await?;
    if !link && !site {
        println!("No nginx configuration found for {}", subdomain);
        return Ok(());
    }
    if link {
        println!("{} Disabled {}", "✓".green().bold(), subdomain);
    }
    if site {
        println!("{} Deleted site file for {}", "✓".green().bold(), subdomain);
    }

    restart_nginx().await;
    Ok(())
}

async fn restart_nginx() {
    match proxy::restart_service().await {
        Ok(()) => println!("{} nginx restarted", "✓".green().bold()),
        Err(e) => {
            println!("{} Failed to restart nginx: {}", "⚠".yellow().bold(), e);
            println!("  Restart it manually: sudo service nginx restart");
        }
    }
}

/// Show the sites available and enabled for this domain
pub async fn list(ctx: &Context) -> Result<()> {
    let sites = ctx.sites();
    let domain = &ctx.settings.domain;

    println!("{}", "Sites Available".bold());
    print_entries(&sites.list_available(domain).await?);

    println!();
    println!("{}", "Sites Enabled".bold());
    print_entries(&sites.list_enabled(domain).await?);

    Ok(())
}

fn print_entries(entries: &[SiteEntry]) {
    if entries.is_empty() {
        println!("  {}", "none".dimmed());
        return;
    }
    for entry in entries {
        let link = match entry.target {
            Some(_) => " (symlink)".dimmed().to_string(),
            None => String::new(),
        };
        let port = match entry.port {
            Some(port) => format!("port {}", port).cyan().to_string(),
            None => "port unknown".dimmed().to_string(),
        };
        println!("  {}{} -> {}", entry.name, link, port);
    }
}
