//! linkcourier - answers download-link requests arriving over messaging channels.

mod commands;
mod email;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config_and_utils::{init_logging, Config, Paths};

/// linkcourier command-line interface.
#[derive(Parser)]
#[command(name = "linkcourier")]
#[command(about = "Answer download-link requests and manage the link catalog")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "LINKCOURIER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Base directory for runtime files (config, database, catalogs, outbox).
    /// Defaults to ~/.linkcourier
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the runtime directories and write config.json
    Init {
        /// Overwrite an existing config.json
        #[arg(long)]
        force: bool,
    },

    /// Handle one inbound message and spool the replies
    Handle {
        /// Channel the message arrived on
        #[arg(short, long, default_value = "email")]
        channel: String,
        /// Read the message from a file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Manage provider link catalogs
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },

    /// Manage per-sender trust state
    Sender {
        #[command(subcommand)]
        command: SenderCommands,
    },

    /// Inspect usage records
    Usage {
        #[command(subcommand)]
        command: UsageCommands,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Start a provider catalog (an existing one is kept as a backup)
    Create {
        /// Provider name
        provider: String,
        /// Signing key fingerprint
        #[arg(short, long)]
        fingerprint: String,
    },
    /// Add a release for one OS and locale
    AddLink {
        provider: String,
        os: String,
        locale: String,
        /// `binary_url$signature_url$sha256$`
        link: String,
    },
    /// List provider catalogs
    List,
    /// Print the reply text for an OS and locale
    Show {
        os: String,
        #[arg(default_value = "en")]
        locale: String,
        #[arg(short, long, default_value = "email")]
        channel: String,
    },
}

#[derive(Subcommand)]
enum SenderCommands {
    /// Deny every request from a sender until unblocked
    Block {
        /// Sender address as it appears on the channel
        sender: String,
        #[arg(short, long, default_value = "email")]
        channel: String,
    },
    /// Lift a block, keeping the request count
    Unblock {
        sender: String,
        #[arg(short, long, default_value = "email")]
        channel: String,
    },
    /// Forget everything about a sender
    Reset {
        sender: String,
        #[arg(short, long, default_value = "email")]
        channel: String,
    },
    /// Show a sender's abuse record
    Show {
        sender: String,
        #[arg(short, long, default_value = "email")]
        channel: String,
    },
}

#[derive(Subcommand)]
enum UsageCommands {
    /// Most recent records
    Recent {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Counts per status over the last hours
    Summary {
        #[arg(long, default_value = "24")]
        hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;
    paths.ensure_dirs()?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let interactive = !matches!(cli.command, Commands::Handle { .. });
    init_logging(log_level, &paths, interactive);

    match cli.command {
        Commands::Init { force } => commands::init(&config, &paths, force)?,
        Commands::Handle { channel, input } => {
            commands::handle(&config, &paths, &channel, input.as_deref()).await?;
        }
        Commands::Catalog { command } => match command {
            CatalogCommands::Create {
                provider,
                fingerprint,
            } => commands::catalog_create(&config, &paths, &provider, &fingerprint)?,
            CatalogCommands::AddLink {
                provider,
                os,
                locale,
                link,
            } => commands::catalog_add_link(&config, &paths, &provider, &os, &locale, &link)?,
            CatalogCommands::List => commands::catalog_list(&config, &paths)?,
            CatalogCommands::Show {
                os,
                locale,
                channel,
            } => commands::catalog_show(&config, &paths, &channel, &os, &locale)?,
        },
        Commands::Sender { command } => match command {
            SenderCommands::Block { sender, channel } => {
                commands::sender_block(&paths, &channel, &sender).await?
            }
            SenderCommands::Unblock { sender, channel } => {
                commands::sender_unblock(&paths, &channel, &sender).await?
            }
            SenderCommands::Reset { sender, channel } => {
                commands::sender_reset(&paths, &channel, &sender).await?
            }
            SenderCommands::Show { sender, channel } => {
                commands::sender_show(&paths, &channel, &sender).await?
            }
        },
        Commands::Usage { command } => match command {
            UsageCommands::Recent { limit } => commands::usage_recent(&paths, limit).await?,
            UsageCommands::Summary { hours } => commands::usage_summary(&paths, hours).await?,
        },
    }

    Ok(())
}
