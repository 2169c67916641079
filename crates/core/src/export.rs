//! Inventory export.
//!
//! The report columns are not known ahead of time: each environment has
//! its own tag vocabulary. The union of tag keys across the result set
//! becomes a fixed column set at output time, and every resource's row is
//! projected against it.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::LedgerError;
use crate::ledger::csv_row;
use crate::model::ResourceRecord;

const FIXED_COLUMNS: [&str; 6] = [
    "Name",
    "ResourceGroupName",
    "ResourceId",
    "ResourceType",
    "Location",
    "SubscriptionId",
];

/// Sorted union of all tag keys present across the result set.
pub fn tag_columns(resources: &[ResourceRecord]) -> Vec<String> {
    let mut keys = BTreeSet::new();
    for resource in resources {
        for key in resource.tags.keys() {
            keys.insert(key.clone());
        }
    }
    keys.into_iter().collect()
}

/// Write the discovered set as CSV, one `Tag:<key>` column per union key.
/// A resource lacking a key gets an empty cell.
pub fn write_inventory(path: &Path, resources: &[ResourceRecord]) -> Result<(), LedgerError> {
    let tag_keys = tag_columns(resources);

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    for key in &tag_keys {
        header.push(format!("Tag:{key}"));
    }

    let mut out = String::new();
    let header_refs: Vec<&str> = header.iter().map(String::as_str).collect();
    out.push_str(&csv_row(&header_refs));
    out.push('\n');

    for resource in resources {
        let mut fields: Vec<&str> = vec![
            &resource.name,
            &resource.resource_group,
            &resource.id,
            &resource.resource_type,
            &resource.location,
            &resource.subscription_id,
        ];
        for key in &tag_keys {
            fields.push(resource.tags.get(key).map_or("", String::as_str));
        }
        out.push_str(&csv_row(&fields));
        out.push('\n');
    }

    std::fs::write(path, out).map_err(|e| LedgerError::Io {
        path: path.display().to_string(),
        source: e,
    })
}
