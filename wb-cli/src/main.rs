use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wb_core::TenantChanges;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "wb")]
#[command(about = "Manage wb server instances on this host", long_about = None)]
struct Cli {
    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the server registry (servers.json)
    #[command(subcommand, visible_alias = "c")]
    Config(ConfigCommands),

    /// Create the instance directories for a server
    InitDirs {
        /// Server ID
        id: String,
    },

    /// Delete the instance directories of a server
    RemoveDirs {
        /// Server ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Write and enable the nginx site for a server
    InitNginx {
        /// Server ID
        id: String,
    },

    /// Disable and delete the nginx site of a server
    RemoveNginx {
        /// Server ID
        id: String,
    },

    /// List nginx sites for this domain
    ListNginx,

    /// Obtain a TLS certificate for a server
    InitSsl {
        /// Server ID
        id: String,
    },

    /// Revoke the TLS certificate of a server
    RemoveSsl {
        /// Server ID
        id: String,
    },

    /// List installed TLS certificates
    ListSsl,

    /// Pull every image the registry needs
    Pull,

    /// Remove unused docker networks
    Prune,

    /// Start servers
    #[command(visible_alias = "start")]
    Run {
        /// Server IDs, @tag, field=value or "all"
        #[arg(required = true)]
        targets: Vec<String>,

        /// Attach to the application container
        #[arg(short, long)]
        interactive: bool,
    },

    /// Stop servers
    Stop {
        /// Server IDs, @tag, field=value or "all"
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Stop, then start servers
    Restart {
        /// Server IDs, @tag, field=value or "all"
        #[arg(required = true)]
        targets: Vec<String>,

        /// Attach to the application container
        #[arg(short, long)]
        interactive: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List servers
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Only servers with this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Show one server
    Show {
        /// Server ID
        id: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a server with default settings
    Add {
        /// Server ID (lowercase letters, digits and hyphens)
        id: String,
    },

    /// Change fields of one or more servers
    Update {
        /// Server IDs, @tag, field=value or "all"
        #[arg(required = true)]
        targets: Vec<String>,

        #[arg(long)]
        label: Option<String>,

        /// Server version
        #[arg(long)]
        server: Option<String>,

        /// Admin version ("none" removes it)
        #[arg(long)]
        admin: Option<String>,

        /// Instance directory name ("" resets it to the server ID)
        #[arg(long)]
        instance_dir: Option<String>,

        #[arg(long)]
        port: Option<u32>,

        #[arg(long, value_parser = parse_flag)]
        french: Option<bool>,

        #[arg(long, value_parser = parse_flag)]
        ethiopian: Option<bool>,

        #[arg(long, value_parser = parse_flag)]
        open_access: Option<bool>,
    },

    /// Remove servers from the registry
    Remove {
        /// Server ID, @tag, field=value or "all"
        target: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Check every server record
    Validate,

    /// Copy servers.json aside
    Backup,

    /// Replace servers.json with a backup
    Restore {
        /// Backup file
        file: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Add tags to servers
    Tag {
        /// Server ID, @tag, field=value or "all"
        target: String,

        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Remove tags from servers
    Untag {
        /// Server ID, @tag, field=value or "all"
        target: String,

        #[arg(required = true)]
        tags: Vec<String>,
    },
}

fn parse_flag(s: &str) -> std::result::Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(format!("expected true/false, yes/no or 1/0, got '{}'", s)),
    }
}

/// `None`, `none` and the empty string clear an optional field.
fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        if v.is_empty() || v.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(v)
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    wb_core::init_observability(cli.verbose)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let ctx = Context::load()?;

    match cli.command {
        Commands::Config(command) => match command {
            ConfigCommands::List { json, tag } => {
                commands::config::list(&ctx, json, tag).await?;
            }

            ConfigCommands::Show { id, json } => {
                commands::config::show(&ctx, &id, json).await?;
            }

            ConfigCommands::Add { id } => {
                commands::config::add(&ctx, &id).await?;
            }

            ConfigCommands::Update {
                targets,
                label,
                server,
                admin,
                instance_dir,
                port,
                french,
                ethiopian,
                open_access,
            } => {
                let changes = TenantChanges {
                    label,
                    port,
                    instance_dir: clearable(instance_dir),
                    server_version: server,
                    admin_version: clearable(admin),
                    french,
                    ethiopian,
                    open_access,
                };
                commands::config::update(&ctx, &targets, changes).await?;
            }

            ConfigCommands::Remove { target, force } => {
                commands::config::remove(&ctx, &target, force).await?;
            }

            ConfigCommands::Validate => {
                commands::config::validate(&ctx).await?;
            }

            ConfigCommands::Backup => {
                commands::config::backup(&ctx).await?;
            }

            ConfigCommands::Restore { file, force } => {
                commands::config::restore(&ctx, &file, force).await?;
            }

            ConfigCommands::Tag { target, tags } => {
                commands::config::tag(&ctx, &target, &tags).await?;
            }

            ConfigCommands::Untag { target, tags } => {
                commands::config::untag(&ctx, &target, &tags).await?;
            }
        },

        Commands::InitDirs { id } => {
            commands::dirs::init(&ctx, &id).await?;
        }

        Commands::RemoveDirs { id, force } => {
            commands::dirs::remove(&ctx, &id, force).await?;
        }

        Commands::InitNginx { id } => {
            commands::nginx::init(&ctx, &id).await?;
        }

        Commands::RemoveNginx { id } => {
            commands::nginx::remove(&ctx, &id).await?;
        }

        Commands::ListNginx => {
            commands::nginx::list(&ctx).await?;
        }

        Commands::InitSsl { id } => {
            commands::ssl::init(&ctx, &id).await?;
        }

        Commands::RemoveSsl { id } => {
            commands::ssl::remove(&ctx, &id).await?;
        }

        Commands::ListSsl => {
            commands::ssl::list().await?;
        }

        Commands::Pull => {
            commands::containers::pull(&ctx).await?;
        }

        Commands::Prune => {
            commands::containers::prune(&ctx).await?;
        }

        Commands::Run { targets, interactive } => {
            commands::containers::run(&ctx, &targets, interactive).await?;
        }

        Commands::Stop { targets } => {
            commands::containers::stop(&ctx, &targets).await?;
        }

        Commands::Restart { targets, interactive } => {
            commands::containers::restart(&ctx, &targets, interactive).await?;
        }
    }

    Ok(())
}
