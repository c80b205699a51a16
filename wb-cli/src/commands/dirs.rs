//! `wb init-dirs` and `wb remove-dirs` commands

use super::{confirm_typed, Context};
use anyhow::Result;
use colored::Colorize;
use wb_core::layout::{DirStatus, InstanceLayout};

/// Create the instance directory and its subdirectories
pub async fn init(ctx: &Context, id: &str) -> Result<()> {
    let tenant = ctx.tenant(id).await?;
    let layout = InstanceLayout::new(&ctx.settings.mount_path, &tenant);

    for status in layout.create().await? {
        match status {
            DirStatus::Created(path) => {
                println!("{} Created {}", "✓".green().bold(), path.display());
            }
            DirStatus::Existing(path) => {
                println!("  {} already exists", path.display().to_string().dimmed());
            }
        }
    }
    println!("{} Sandbox permissions set", "✓".green().bold());

    Ok(())
}

/// Delete the instance directory and everything under it
pub async fn remove(ctx: &Context, id: &str, force: bool) -> Result<()> {
    let tenant = ctx.tenant(id).await?;
    let layout = InstanceLayout::new(&ctx.settings.mount_path, &tenant);

    if !force {
        println!(
            "{} This permanently deletes {} and all instance data.",
            "⚠".yellow().bold(),
            layout.root().display()
        );
        if !confirm_typed(&tenant.id)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    if layout.remove().await? {
        println!("{} Removed {}", "✓".green().bold(), layout.root().display());
    } else {
        println!("{} does not exist", layout.root().display());
    }

    Ok(())
}
