use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize};

/// Identity snapshot of a cloud resource at discovery time.
///
/// Produced fresh on every discovery or read call and never cached beyond
/// one run. Field names follow the discovery service wire format so rows
/// deserialize directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Opaque unique identifier, stable across calls.
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(rename = "resourceGroup", default)]
    pub resource_group: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "subscriptionId", default)]
    pub subscription_id: String,
    /// Tag keys are case sensitive; the write service treats them so.
    #[serde(default, deserialize_with = "null_as_empty_tags")]
    pub tags: BTreeMap<String, String>,
}

/// The management plane serializes an untagged resource as `"tags": null`.
fn null_as_empty_tags<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Option::<BTreeMap<String, String>>::deserialize(deserializer)?;
    Ok(tags.unwrap_or_default())
}

/// The tag key rename a run performs: `old_name` -> `new_name`, value kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRename {
    pub old_name: String,
    pub new_name: String,
}

impl TagRename {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }
}

/// One immutable ledger row: the pre-mutation state of a single resource.
///
/// A row is written and made durable *before* the corresponding mutation is
/// attempted. The ledger is append-only; `status` is set once at write time
/// and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub timestamp: String,
    pub name: String,
    pub resource_group_name: String,
    pub resource_id: String,
    pub resource_type: String,
    pub location: String,
    pub old_tag_name: String,
    pub new_tag_name: String,
    /// Value of `old_tag_name` at backup time. An absent tag is recorded as
    /// an empty string, never as a missing field.
    pub tag_value: String,
    /// Semicolon-joined set of all tag keys present before mutation.
    /// Forensic reference only.
    pub all_tags: String,
    pub status: String,
}

impl BackupRecord {
    /// Snapshot `resource` ahead of applying `rename`.
    pub fn capture(resource: &ResourceRecord, rename: &TagRename) -> Self {
        Self {
            timestamp: now_timestamp(),
            name: resource.name.clone(),
            resource_group_name: resource.resource_group.clone(),
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
            location: resource.location.clone(),
            old_tag_name: rename.old_name.clone(),
            new_tag_name: rename.new_name.clone(),
            tag_value: resource
                .tags
                .get(&rename.old_name)
                .cloned()
                .unwrap_or_default(),
            all_tags: resource
                .tags
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(";"),
            status: "Pending".to_string(),
        }
    }
}

/// Transient per-resource tag set change. Never persisted; exists only
/// within one apply operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    pub remove: BTreeSet<String>,
    pub add: BTreeMap<String, String>,
}

impl TagDelta {
    /// Project the delta onto a full tag map. Removals run before
    /// additions, so a key in both ends up with the added value.
    pub fn apply_to(&self, tags: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut next = tags.clone();
        for key in &self.remove {
            next.remove(key);
        }
        for (key, value) in &self.add {
            next.insert(key.clone(), value.clone());
        }
        next
    }
}

/// Generate a simple ISO 8601 timestamp.
pub fn now_timestamp() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
