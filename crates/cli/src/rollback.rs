//! CLI rollback subcommand: restore tag state from a completed ledger.

use std::path::PathBuf;
use std::process;

use retag_core::ledger::load_ledger;
use retag_core::rollback::{RollbackEngine, RollbackOptions};

use crate::azure::{self, AzureClient};
use crate::confirm::StdinConfirm;

pub struct RollbackArgs {
    pub ledger: PathBuf,
    pub resource_group: Option<String>,
    pub name: Option<String>,
    pub force: bool,
    pub dry_run: bool,
}

pub fn cmd_rollback(args: RollbackArgs) {
    // An unreadable or schema-invalid ledger is a setup failure; validate
    // it before touching the session.
    let records = match load_ledger(&args.ledger) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    println!(
        "Loaded {} ledger row(s) from {}",
        records.len(),
        args.ledger.display()
    );

    let token = match azure::get_access_token() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let client = AzureClient::new(token);

    let options = RollbackOptions {
        resource_group: args.resource_group,
        name_contains: args.name,
        force: args.force,
        dry_run: args.dry_run,
        ..RollbackOptions::default()
    };
    let engine = RollbackEngine::new(&client, options);
    let summary = engine.run(&records, &StdinConfirm);

    println!();
    println!("{summary}");
}
