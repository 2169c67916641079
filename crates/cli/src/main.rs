mod azure;
mod confirm;
mod discover;
mod migrate;
mod rollback;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cloud resource tag rename toolchain.
#[derive(Parser)]
#[command(name = "retag", version, about = "Rename cloud resource tags behind a durable undo ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover resources and export a tag inventory
    Discover {
        /// Output CSV path
        #[arg(long)]
        out: PathBuf,
        /// Subscription to search (repeatable; tenant-wide when omitted)
        #[arg(long = "subscription")]
        subscriptions: Vec<String>,
        /// Restrict to one resource type
        #[arg(long)]
        resource_type: Option<String>,
        /// Discovery page size
        #[arg(long, default_value = "100")]
        page_size: usize,
    },

    /// Rename a tag key across resources, backing up to an undo ledger
    Migrate {
        /// Tag key to rename away from
        #[arg(long)]
        old_tag: String,
        /// Tag key to rename to
        #[arg(long)]
        new_tag: String,
        /// Restrict to one resource type
        #[arg(long)]
        resource_type: Option<String>,
        /// Subscription to search (tenant-wide when omitted)
        #[arg(long)]
        subscription: Option<String>,
        /// Undo ledger path (timestamped default next to the working directory)
        #[arg(long)]
        backup_file: Option<PathBuf>,
        /// Report decisions without mutating anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore tag state from a backup ledger
    Rollback {
        /// Ledger written by a previous migrate run
        #[arg(long)]
        ledger: PathBuf,
        /// Only rows whose resource group matches exactly
        #[arg(long)]
        resource_group: Option<String>,
        /// Only rows whose resource name contains this substring
        #[arg(long)]
        name: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
        /// Report decisions without mutating anything
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Discover {
            out,
            subscriptions,
            resource_type,
            page_size,
        } => {
            discover::cmd_discover(&out, subscriptions, resource_type, page_size);
        }
        Commands::Migrate {
            old_tag,
            new_tag,
            resource_type,
            subscription,
            backup_file,
            dry_run,
        } => {
            migrate::cmd_migrate(migrate::MigrateArgs {
                old_tag,
                new_tag,
                resource_type,
                subscription,
                backup_file,
                dry_run,
            });
        }
        Commands::Rollback {
            ledger,
            resource_group,
            name,
            force,
            dry_run,
        } => {
            rollback::cmd_rollback(rollback::RollbackArgs {
                ledger,
                resource_group,
                name,
                force,
                dry_run,
            });
        }
    }
}
