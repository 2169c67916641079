//! CLI discover subcommand: list resources and export a tag inventory.

use std::path::Path;
use std::process;

use retag_core::client::{QueryScope, ResourceQuery};
use retag_core::discovery::{discover, RetryPolicy};
use retag_core::export;

use crate::azure::{self, AzureClient};

pub fn cmd_discover(
    out: &Path,
    mut subscriptions: Vec<String>,
    resource_type: Option<String>,
    page_size: usize,
) {
    let token = match azure::get_access_token() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    let client = AzureClient::new(token);

    let scope = if subscriptions.is_empty() {
        QueryScope::Tenant
    } else if subscriptions.len() == 1 {
        QueryScope::Subscription(subscriptions.remove(0))
    } else {
        QueryScope::Subscriptions(subscriptions)
    };
    let mut query = ResourceQuery::new(scope);
    query.resource_type = resource_type;

    let resources = match discover(&client, &query, page_size, &RetryPolicy::default()) {
        Ok(resources) => resources,
        Err(e) => {
            eprintln!("error: discovery failed: {e}");
            process::exit(1);
        }
    };
    println!("Discovered {} resource(s).", resources.len());

    if let Err(e) = export::write_inventory(out, &resources) {
        eprintln!("error: {e}");
        process::exit(1);
    }
    println!("Inventory written to {}", out.display());
}
