//! CLI migrate subcommand: the forward tag rename run.
//!
//! Discovers resources carrying the old tag, opens the undo ledger, then
//! drives the transform engine over the list. Per-resource faults are
//! counted, never fatal; only setup failures exit non-zero.

use std::path::PathBuf;
use std::process;

use retag_core::client::{QueryScope, ResourceQuery};
use retag_core::discovery::{discover, RetryPolicy};
use retag_core::ledger::LedgerWriter;
use retag_core::model::TagRename;
use retag_core::transform::{TransformEngine, TransformOptions};

use crate::azure::{self, AzureClient};

pub struct MigrateArgs {
    pub old_tag: String,
    pub new_tag: String,
    pub resource_type: Option<String>,
    pub subscription: Option<String>,
    pub backup_file: Option<PathBuf>,
    pub dry_run: bool,
}

pub fn cmd_migrate(args: MigrateArgs) {
    let token = match azure::get_access_token() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let client = AzureClient::new(token);

    let scope = match args.subscription {
        Some(id) => QueryScope::Subscription(id),
        None => QueryScope::Tenant,
    };
    let mut query = ResourceQuery::new(scope);
    query.resource_type = args.resource_type;
    query.required_tag = Some(args.old_tag.clone());

    let resources = match discover(&client, &query, 100, &RetryPolicy::default()) {
        Ok(resources) => resources,
        Err(e) => {
            eprintln!("error: discovery failed: {e}");
            process::exit(1);
        }
    };
    if resources.is_empty() {
        println!("No resources carry tag '{}'; nothing to do.", args.old_tag);
        return;
    }
    println!(
        "Discovered {} resource(s) carrying tag '{}'.",
        resources.len(),
        args.old_tag
    );

    let rename = TagRename::new(args.old_tag, args.new_tag);
    let options = TransformOptions {
        dry_run: args.dry_run,
        ..TransformOptions::default()
    };

    let summary = if args.dry_run {
        // No ledger: a what-if run leaves no artifacts.
        let mut engine = TransformEngine::new(&client, rename, None, options);
        engine.run(&resources)
    } else {
        let path = args.backup_file.unwrap_or_else(default_backup_path);
        let mut ledger = match LedgerWriter::create(&path) {
            Ok(ledger) => ledger,
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        };
        println!("Backup ledger: {}", ledger.path().display());
        let mut engine = TransformEngine::new(&client, rename, Some(&mut ledger), options);
        engine.run(&resources)
    };

    println!();
    println!("{summary}");
}

/// Timestamped default so repeated runs never clobber an earlier ledger.
fn default_backup_path() -> PathBuf {
    let now = time::OffsetDateTime::now_utc();
    PathBuf::from(format!(
        "retag-backup-{:04}{:02}{:02}-{:02}{:02}{:02}.csv",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    ))
}
