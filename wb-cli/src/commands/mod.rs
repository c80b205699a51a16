//! CLI command implementations

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Arc;
use wb_core::proxy::ProxySites;
use wb_core::{BatchEvent, Certbot, DockerCli, Note, Orchestrator, Phase, Settings, Tenant, TenantStore};

pub mod config;
pub mod containers;
pub mod dirs;
pub mod nginx;
pub mod ssl;

/// Everything a command needs, built once at startup.
pub struct Context {
    pub settings: Arc<Settings>,
    pub store: TenantStore,
}

impl Context {
    pub fn load() -> Result<Self> {
        let settings = Settings::from_env().context("Failed to load configuration")?;
        let store = TenantStore::new(&settings.servers_file_path);
        Ok(Self { settings: Arc::new(settings), store })
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.settings.clone(),
            Arc::new(DockerCli::new(&self.settings.docker_bin)),
            Arc::new(Certbot::default()),
        )
    }

    pub fn sites(&self) -> ProxySites {
        ProxySites::new(&self.settings.sites_available_path, &self.settings.sites_enabled_path)
    }

    /// Look up a registered tenant, with a hint on how to register it.
    pub async fn tenant(&self, id: &str) -> Result<Tenant> {
        self.store
            .require(id)
            .await
            .with_context(|| format!("Please add the tenant first using: wb config add {}", id))
    }
}

/// Ask a yes/no question. Only `y` or `yes` confirm.
pub fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} (y/N): ", question))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Ask the operator to type `expected` exactly.
pub fn confirm_typed(expected: &str) -> Result<bool> {
    println!("{}", format!("Type \"{}\" to confirm, or anything else to cancel:", expected).cyan());
    Ok(prompt("> ")? == expected)
}

fn prompt(text: &str) -> Result<String> {
    print!("{}", text);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub fn print_note(note: &Note) {
    match note {
        Note::Ok(message) => println!("{} {}", "✓".green().bold(), message),
        Note::Warning(message) => println!("{} {}", "⚠".yellow().bold(), message.yellow()),
    }
}

/// Live progress for batch operations.
pub fn print_event(event: BatchEvent<'_>) {
    match event {
        BatchEvent::Starting { phase: Phase::BringUp, tenant } => {
            println!("{} {} (port {})", "Run container:".cyan(), tenant.id.bold(), tenant.port);
        }
        BatchEvent::Starting { phase: Phase::TearDown, tenant } => {
            println!("{} {} (port {})", "Stop container:".cyan(), tenant.id.bold(), tenant.port);
        }
        BatchEvent::Finished(report) => {
            for note in &report.notes {
                print_note(note);
            }
            let verb = match report.phase {
                Phase::BringUp => "started",
                Phase::TearDown => "stopped",
            };
            println!("{} {} {}\n", "✓".green().bold(), report.tenant, verb);
        }
        BatchEvent::Missing { id, .. } => {
            eprintln!("{} Tenant '{}' not found", "✗".red().bold(), id);
        }
        BatchEvent::Settling(wait) => {
            println!("{}", format!("Waiting {}s before starting...", wait.as_secs()).dimmed());
        }
    }
}
