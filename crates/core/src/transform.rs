//! The per-resource tag rename transaction.
//!
//! For each resource: fresh read, backup to the ledger, conflict check,
//! full-replace write, settle, verify. Faults never abort the queue; every
//! decision is logged with the resource identity before it is counted.

use std::time::Duration;

use crate::client::TagClient;
use crate::ledger::LedgerWriter;
use crate::model::{BackupRecord, ResourceRecord, TagDelta, TagRename};
use crate::report::{RunSummary, Tally};

/// Delay before re-reading a mutated resource, absorbing eventual
/// consistency lag in the backing service.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Run the decision logic but suppress the mutation, the verify step,
    /// and the ledger write.
    pub dry_run: bool,
    pub settle: Duration,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            settle: SETTLE_DELAY,
        }
    }
}

/// Terminal state of processing one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Renamed and verified on the live resource.
    Applied,
    /// Dry-run: the rename would have been applied.
    WouldApply,
    /// Old tag absent but the new tag is present; a previous run got here.
    AlreadyMigrated,
    /// Old tag absent, nothing to do.
    NoOldTag,
    /// The fresh read found no resource behind the discovered identity.
    ResourceGone,
    /// New tag already holds a different value; overwriting risks data
    /// loss, so the policy is always to skip.
    Conflict { existing: String, migrating: String },
    /// The ledger row could not be made durable; the resource was left
    /// untouched.
    BackupFailed(String),
    /// The post-write read did not show the expected state. The mutation
    /// may have partially succeeded; surfaced, never auto-corrected.
    VerifyFailed(String),
    /// A service fault interrupted the transaction.
    Failed(String),
}

impl TransformOutcome {
    pub fn tally(&self) -> Tally {
        match self {
            TransformOutcome::Applied | TransformOutcome::WouldApply => Tally::Success,
            TransformOutcome::AlreadyMigrated
            | TransformOutcome::NoOldTag
            | TransformOutcome::ResourceGone
            | TransformOutcome::Conflict { .. }
            | TransformOutcome::BackupFailed(_) => Tally::Skipped,
            TransformOutcome::VerifyFailed(_) | TransformOutcome::Failed(_) => Tally::Failure,
        }
    }
}

/// Sequential driver for one rename run.
pub struct TransformEngine<'a, C: TagClient> {
    client: &'a C,
    rename: TagRename,
    ledger: Option<&'a mut LedgerWriter>,
    options: TransformOptions,
}

impl<'a, C: TagClient> TransformEngine<'a, C> {
    /// A `None` ledger suppresses backup writes; dry runs must leave no
    /// artifacts on disk.
    pub fn new(
        client: &'a C,
        rename: TagRename,
        ledger: Option<&'a mut LedgerWriter>,
        options: TransformOptions,
    ) -> Self {
        Self {
            client,
            rename,
            ledger,
            options,
        }
    }

    /// Process every resource in order, folding outcomes into a summary.
    pub fn run(&mut self, resources: &[ResourceRecord]) -> RunSummary {
        let mut summary = RunSummary::new();
        for resource in resources {
            let outcome = self.process(resource);
            self.log_decision(resource, &outcome);
            summary.record(outcome.tally());
        }
        summary
    }

    fn process(&mut self, discovered: &ResourceRecord) -> TransformOutcome {
        // 1. Fresh read; time may have passed since discovery.
        let live = match self.client.get_resource(&discovered.id) {
            Ok(Some(resource)) => resource,
            Ok(None) => return TransformOutcome::ResourceGone,
            Err(e) => return TransformOutcome::Failed(e.to_string()),
        };

        let old_value = match live.tags.get(&self.rename.old_name) {
            Some(value) => value.clone(),
            None if live.tags.contains_key(&self.rename.new_name) => {
                return TransformOutcome::AlreadyMigrated
            }
            None => return TransformOutcome::NoOldTag,
        };

        // 2. Ledger row, durable before any mutation. A failed write skips
        //    the resource.
        if let Some(ledger) = self.ledger.as_deref_mut() {
            let record = BackupRecord::capture(&live, &self.rename);
            if let Err(e) = ledger.append(&record) {
                return TransformOutcome::BackupFailed(e.to_string());
            }
        }

        // 3. Conflict check on the target key.
        if let Some(existing) = live.tags.get(&self.rename.new_name) {
            if *existing != old_value {
                return TransformOutcome::Conflict {
                    existing: existing.clone(),
                    migrating: old_value,
                };
            }
        }

        // 4. Delta against the full live map; the write API is
        //    full-replace, not a merge.
        let mut delta = TagDelta::default();
        delta.remove.insert(self.rename.old_name.clone());
        if live.tags.get(&self.rename.new_name) != Some(&old_value) {
            delta
                .add
                .insert(self.rename.new_name.clone(), old_value);
        }
        let desired = delta.apply_to(&live.tags);

        if self.options.dry_run {
            return TransformOutcome::WouldApply;
        }
        if let Err(e) = self.client.replace_tags(&live.id, &desired) {
            return TransformOutcome::Failed(e.to_string());
        }

        // 5. Settle, then verify against another fresh read.
        std::thread::sleep(self.options.settle);
        match self.client.get_resource(&live.id) {
            Ok(Some(after)) => {
                let has_new = after.tags.contains_key(&self.rename.new_name);
                let has_old = after.tags.contains_key(&self.rename.old_name);
                if has_new && !has_old {
                    TransformOutcome::Applied
                } else {
                    TransformOutcome::VerifyFailed(format!(
                        "'{}' present: {}, '{}' present: {}",
                        self.rename.new_name, has_new, self.rename.old_name, has_old
                    ))
                }
            }
            Ok(None) => {
                TransformOutcome::VerifyFailed("resource disappeared during verification".into())
            }
            Err(e) => TransformOutcome::Failed(e.to_string()),
        }
    }

    fn log_decision(&self, resource: &ResourceRecord, outcome: &TransformOutcome) {
        let name = &resource.name;
        let old = &self.rename.old_name;
        let new = &self.rename.new_name;
        match outcome {
            TransformOutcome::Applied => {
                println!("[renamed] {name}: '{old}' -> '{new}'");
            }
            TransformOutcome::WouldApply => {
                println!("[dry-run] {name}: would rename '{old}' -> '{new}'");
            }
            TransformOutcome::AlreadyMigrated => {
                println!("[skip] {name}: '{old}' absent, '{new}' already present");
            }
            TransformOutcome::NoOldTag => {
                println!("[skip] {name}: tag '{old}' not present");
            }
            TransformOutcome::ResourceGone => {
                println!("[skip] {name}: resource no longer exists ({})", resource.id);
            }
            TransformOutcome::Conflict { existing, migrating } => {
                println!(
                    "[skip] {name}: '{new}' already set to '{existing}', \
                     refusing to overwrite with '{migrating}'"
                );
            }
            TransformOutcome::BackupFailed(e) => {
                eprintln!("[skip] {name}: backup write failed, resource not mutated: {e}");
            }
            TransformOutcome::VerifyFailed(detail) => {
                eprintln!("[fail] {name}: verification failed: {detail}");
            }
            TransformOutcome::Failed(e) => {
                eprintln!("[fail] {name}: {e}");
            }
        }
    }
}
