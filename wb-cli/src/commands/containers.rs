//! `wb run`, `wb stop`, `wb restart`, `wb pull` and `wb prune` commands

use super::{print_event, Context};
use anyhow::{Context as _, Result};
use colored::Colorize;
use wb_core::{resolve_targets, RunMode};

fn run_mode(interactive: bool) -> RunMode {
    if interactive {
        RunMode::Interactive
    } else {
        RunMode::Detached
    }
}

/// Bring up every selected tenant, in order
pub async fn run(ctx: &Context, selectors: &[String], interactive: bool) -> Result<()> {
    let ids = resolve_targets(&ctx.store, selectors).await?;
    let orchestrator = ctx.orchestrator();

    let reports = orchestrator
        .run_batch(&ctx.store, &ids, run_mode(interactive), &mut print_event)
        .await
        .context("Startup aborted")?;

    println!("{} {} server(s) started", "✓".green().bold(), reports.len());
    Ok(())
}

/// Tear down every selected tenant, in order
pub async fn stop(ctx: &Context, selectors: &[String]) -> Result<()> {
    let ids = resolve_targets(&ctx.store, selectors).await?;
    let orchestrator = ctx.orchestrator();

    let reports = orchestrator.stop_batch(&ctx.store, &ids, &mut print_event).await?;

    println!("{} {} server(s) stopped", "✓".green().bold(), reports.len());
    Ok(())
}

/// Stop every selected tenant, then start them all again
pub async fn restart(ctx: &Context, selectors: &[String], interactive: bool) -> Result<()> {
    let ids = resolve_targets(&ctx.store, selectors).await?;
    let orchestrator = ctx.orchestrator();

    orchestrator
        .restart_batch(&ctx.store, &ids, run_mode(interactive), &mut print_event)
        .await
        .context("Restart aborted")?;

    println!("{} Restarted: {}", "✓".green().bold(), ids.join(", "));
    Ok(())
}

/// Pull the database image and every image the registry references
pub async fn pull(ctx: &Context) -> Result<()> {
    let tenants = ctx.store.list().await?;
    let orchestrator = ctx.orchestrator();

    let outcomes = orchestrator
        .pull_images(&tenants, |image| println!("{} {}", "Pulling:".cyan(), image))
        .await;

    let mut failed = 0;
    for outcome in &outcomes {
        if let Some(error) = &outcome.error {
            failed += 1;
            println!("{} Failed to pull {}: {}", "⚠".yellow().bold(), outcome.image, error);
        }
    }

    println!(
        "{} Pulled {} of {} image(s)",
        "✓".green().bold(),
        outcomes.len() - failed,
        outcomes.len()
    );
    Ok(())
}

/// Remove unused container networks
pub async fn prune(ctx: &Context) -> Result<()> {
    let orchestrator = ctx.orchestrator();
    let report = orchestrator
        .runtime()
        .prune_networks()
        .await
        .context("Failed to prune docker networks")?;

    println!("{} Docker networks pruned", "✓".green().bold());
    if !report.trim().is_empty() {
        println!("{}", report.trim_end());
    }
    Ok(())
}
