//! `wb init-ssl`, `wb remove-ssl` and `wb list-ssl` commands

use super::{confirm_typed, Context};
use anyhow::{bail, Context as _, Result};
use colored::Colorize;
use wb_core::tls::count_certificates;
use wb_core::Certbot;

/// Issue a certificate for the tenant's subdomain
pub async fn init(ctx: &Context, id: &str) -> Result<()> {
    let tenant = ctx.tenant(id).await?;
    let subdomain = tenant.subdomain(&ctx.settings.domain);

    println!("{} {}", "Requesting certificate for".cyan(), subdomain.bold());
    if let Err(e) = Certbot::default().issue(&subdomain).await {
        println!("{} Certificate request failed: {}", "✗".red().bold(), e);
        println!("Check that:");
        println!("  - certbot is installed");
        println!("  - nginx is configured for {} (wb init-nginx {})", subdomain, tenant.id);
        println!("  - DNS for {} points at this host", subdomain);
        println!("  - port 80 is reachable from the internet");
        bail!("Failed to obtain a certificate for {}", subdomain);
    }

    println!("{} Certificate installed for {}", "✓".green().bold(), subdomain);
    Ok(())
}

/// Revoke and delete the tenant's certificate
pub async fn remove(ctx: &Context, id: &str) -> Result<()> {
    let tenant = ctx.tenant(id).await?;
    let subdomain = tenant.subdomain(&ctx.settings.domain);

    println!("{} This revokes the certificate for {}.", "⚠".yellow().bold(), subdomain);
    if !confirm_typed(&format!("revoke {}", tenant.id))? {
        println!("Aborted.");
        return Ok(());
    }

    match Certbot::default().revoke(&subdomain).await {
        Ok(()) => println!("{} Certificate revoked for {}", "✓".green().bold(), subdomain),
        Err(e) => println!("{} Could not revoke certificate: {}", "⚠".yellow().bold(), e),
    }
    Ok(())
}

/// Print the installed certificates
pub async fn list() -> Result<()> {
    let output = Certbot::default()
        .certificates()
        .await
        .context("Failed to list certificates")?;

    println!("{}", output.trim_end());
    println!();
    println!("Found {} certificate(s)", count_certificates(&output));
    Ok(())
}
