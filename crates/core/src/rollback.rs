//! Ledger-driven rollback.
//!
//! Consumes a completed backup ledger, re-derives the inverse rename per
//! row, and re-applies it with the same settle-then-verify discipline as
//! the forward transform. Deleted resources and already-reverted rows are
//! expected skips, never errors; running rollback twice is safe.

use std::time::Duration;

use crate::client::{Confirm, TagClient};
use crate::model::{BackupRecord, TagDelta};
use crate::report::{RunSummary, Tally};
use crate::transform::SETTLE_DELAY;

#[derive(Debug, Clone)]
pub struct RollbackOptions {
    /// Keep only ledger rows whose resource group matches exactly.
    pub resource_group: Option<String>,
    /// Keep only ledger rows whose resource name contains this substring.
    pub name_contains: Option<String>,
    /// Skip the operator confirmation gate.
    pub force: bool,
    /// Report decisions without mutating anything.
    pub dry_run: bool,
    pub settle: Duration,
}

impl Default for RollbackOptions {
    fn default() -> Self {
        Self {
            resource_group: None,
            name_contains: None,
            force: false,
            dry_run: false,
            settle: SETTLE_DELAY,
        }
    }
}

/// Terminal state of rolling back one ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Old tag restored from the ledger, new tag removed, verified.
    RolledBack,
    /// Dry-run: the row would have been restored.
    WouldRollBack,
    /// The resource was deleted between migration and rollback.
    ResourceGone,
    /// New tag absent, old tag present: a previous rollback got here.
    AlreadyRolledBack,
    /// Neither tag present: ambiguous live state, never guessed at.
    NeitherTagPresent,
    VerifyFailed(String),
    Failed(String),
}

impl RollbackOutcome {
    pub fn tally(&self) -> Tally {
        match self {
            RollbackOutcome::RolledBack | RollbackOutcome::WouldRollBack => Tally::Success,
            RollbackOutcome::ResourceGone
            | RollbackOutcome::AlreadyRolledBack
            | RollbackOutcome::NeitherTagPresent => Tally::Skipped,
            RollbackOutcome::VerifyFailed(_) | RollbackOutcome::Failed(_) => Tally::Failure,
        }
    }
}

/// Apply the row filters ahead of processing.
pub fn filter_records<'r>(
    records: &'r [BackupRecord],
    options: &RollbackOptions,
) -> Vec<&'r BackupRecord> {
    records
        .iter()
        .filter(|record| {
            options
                .resource_group
                .as_ref()
                .map_or(true, |group| record.resource_group_name == *group)
                && options
                    .name_contains
                    .as_ref()
                    .map_or(true, |needle| record.name.contains(needle.as_str()))
        })
        .collect()
}

/// Sequential driver for one rollback run.
pub struct RollbackEngine<'a, C: TagClient> {
    client: &'a C,
    options: RollbackOptions,
}

impl<'a, C: TagClient> RollbackEngine<'a, C> {
    pub fn new(client: &'a C, options: RollbackOptions) -> Self {
        Self { client, options }
    }

    /// Filter, display, gate on confirmation, then process every row.
    ///
    /// An empty filtered set and a declined confirmation are both clean
    /// completions: nothing is mutated and the summary stays at zero.
    pub fn run(&self, records: &[BackupRecord], confirm: &dyn Confirm) -> RunSummary {
        let mut summary = RunSummary::new();

        let selected = filter_records(records, &self.options);
        if selected.is_empty() {
            println!("No ledger rows match the filters; nothing to roll back.");
            return summary;
        }

        println!("{} ledger row(s) selected for rollback:", selected.len());
        for record in &selected {
            println!(
                "  {} ({}): restore '{}'='{}', remove '{}'",
                record.name,
                record.resource_group_name,
                record.old_tag_name,
                record.tag_value,
                record.new_tag_name
            );
        }

        if !self.options.force
            && !self.options.dry_run
            && !confirm.confirm(&format!(
                "Roll back {} resource(s) from the ledger?",
                selected.len()
            ))
        {
            println!("Rollback aborted; no changes made.");
            return summary;
        }

        for record in selected {
            let outcome = self.process(record);
            log_decision(record, &outcome);
            summary.record(outcome.tally());
        }
        summary
    }

    fn process(&self, record: &BackupRecord) -> RollbackOutcome {
        // 1. Existence check: deletion since migration is a legitimate skip.
        let live = match self.client.get_resource(&record.resource_id) {
            Ok(Some(resource)) => resource,
            Ok(None) => return RollbackOutcome::ResourceGone,
            Err(e) => return RollbackOutcome::Failed(e.to_string()),
        };

        // 2. Drift inspection on the live tag map.
        let has_new = live.tags.contains_key(&record.new_tag_name);
        let has_old = live.tags.contains_key(&record.old_tag_name);
        if !has_new {
            return if has_old {
                RollbackOutcome::AlreadyRolledBack
            } else {
                RollbackOutcome::NeitherTagPresent
            };
        }
        // New tag present; old tag possibly too. Proceed either way: the
        // ledger value is authoritative for the old key.

        // 3. Inverse delta, applied through the full-replace write.
        let mut delta = TagDelta::default();
        delta.remove.insert(record.new_tag_name.clone());
        delta
            .add
            .insert(record.old_tag_name.clone(), record.tag_value.clone());
        let desired = delta.apply_to(&live.tags);

        if self.options.dry_run {
            return RollbackOutcome::WouldRollBack;
        }
        if let Err(e) = self.client.replace_tags(&record.resource_id, &desired) {
            return RollbackOutcome::Failed(e.to_string());
        }

        // 4. Settle, then verify.
        std::thread::sleep(self.options.settle);
        match self.client.get_resource(&record.resource_id) {
            Ok(Some(after)) => {
                let restored = after.tags.contains_key(&record.old_tag_name);
                let removed = !after.tags.contains_key(&record.new_tag_name);
                if restored && removed {
                    RollbackOutcome::RolledBack
                } else {
                    RollbackOutcome::VerifyFailed(format!(
                        "'{}' present: {}, '{}' present: {}",
                        record.old_tag_name, restored, record.new_tag_name, !removed
                    ))
                }
            }
            Ok(None) => {
                RollbackOutcome::VerifyFailed("resource disappeared during verification".into())
            }
            Err(e) => RollbackOutcome::Failed(e.to_string()),
        }
    }
}

fn log_decision(record: &BackupRecord, outcome: &RollbackOutcome) {
    let name = &record.name;
    let old = &record.old_tag_name;
    let new = &record.new_tag_name;
    match outcome {
        RollbackOutcome::RolledBack => {
            println!("[restored] {name}: '{old}'='{}', removed '{new}'", record.tag_value);
        }
        RollbackOutcome::WouldRollBack => {
            println!(
                "[dry-run] {name}: would restore '{old}'='{}' and remove '{new}'",
                record.tag_value
            );
        }
        RollbackOutcome::ResourceGone => {
            println!("[skip] {name}: resource no longer exists ({})", record.resource_id);
        }
        RollbackOutcome::AlreadyRolledBack => {
            println!("[skip] {name}: already rolled back ('{new}' absent, '{old}' present)");
        }
        RollbackOutcome::NeitherTagPresent => {
            println!(
                "[skip] {name}: neither '{old}' nor '{new}' present; manual intervention required"
            );
        }
        RollbackOutcome::VerifyFailed(detail) => {
            eprintln!("[fail] {name}: verification failed: {detail}");
        }
        RollbackOutcome::Failed(e) => {
            eprintln!("[fail] {name}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::client::TagClient;
    use crate::error::ServiceError;
    use crate::model::ResourceRecord;

    // -- Mock tag service --

    #[derive(Clone, Default)]
    struct MockCloud {
        inner: Arc<Mutex<MockInner>>,
    }

    #[derive(Default)]
    struct MockInner {
        resources: BTreeMap<String, ResourceRecord>,
        replace_calls: usize,
    }

    impl MockCloud {
        fn with_resources(resources: Vec<ResourceRecord>) -> Self {
            let cloud = Self::default();
            {
                let mut inner = cloud.inner.lock().unwrap();
                for resource in resources {
                    inner.resources.insert(resource.id.clone(), resource);
                }
            }
            cloud
        }

        fn replace_calls(&self) -> usize {
            self.inner.lock().unwrap().replace_calls
        }

        fn tags_of(&self, id: &str) -> BTreeMap<String, String> {
            self.inner.lock().unwrap().resources[id].tags.clone()
        }
    }

    impl TagClient for MockCloud {
        fn get_resource(
            &self,
            resource_id: &str,
        ) -> Result<Option<ResourceRecord>, ServiceError> {
            Ok(self.inner.lock().unwrap().resources.get(resource_id).cloned())
        }

        fn replace_tags(
            &self,
            resource_id: &str,
            tags: &BTreeMap<String, String>,
        ) -> Result<(), ServiceError> {
            let mut inner = self.inner.lock().unwrap();
            inner.replace_calls += 1;
            if let Some(resource) = inner.resources.get_mut(resource_id) {
                resource.tags = tags.clone();
            }
            Ok(())
        }
    }

    // -- Confirmation doubles --

    struct Always(bool);

    impl Confirm for Always {
        fn confirm(&self, _prompt: &str) -> bool {
            self.0
        }
    }

    struct CountingConfirm {
        answer: bool,
        calls: Mutex<usize>,
    }

    impl CountingConfirm {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl Confirm for CountingConfirm {
        fn confirm(&self, _prompt: &str) -> bool {
            *self.calls.lock().unwrap() += 1;
            self.answer
        }
    }

    // -- Fixtures --

    const VM_ID: &str = "/subscriptions/x/resourceGroups/rg-app/providers/x/vm/vm-prod-01";

    fn ledger_row() -> BackupRecord {
        BackupRecord {
            timestamp: "2026-08-06T09:00:00Z".to_string(),
            name: "vm-prod-01".to_string(),
            resource_group_name: "rg-app".to_string(),
            resource_id: VM_ID.to_string(),
            resource_type: "x/vm".to_string(),
            location: "westeurope".to_string(),
            old_tag_name: "Environment".to_string(),
            new_tag_name: "Env".to_string(),
            tag_value: "Production".to_string(),
            all_tags: "Environment".to_string(),
            status: "Pending".to_string(),
        }
    }

    fn live_resource(tags: &[(&str, &str)]) -> ResourceRecord {
        ResourceRecord {
            id: VM_ID.to_string(),
            name: "vm-prod-01".to_string(),
            resource_type: "x/vm".to_string(),
            resource_group: "rg-app".to_string(),
            location: "westeurope".to_string(),
            subscription_id: "x".to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn forced() -> RollbackOptions {
        RollbackOptions {
            force: true,
            settle: Duration::ZERO,
            ..RollbackOptions::default()
        }
    }

    #[test]
    fn single_row_rollback_restores_old_tag() {
        let cloud = MockCloud::with_resources(vec![live_resource(&[("Env", "Production")])]);
        let engine = RollbackEngine::new(&cloud, forced());

        let summary = engine.run(&[ledger_row()], &Always(true));

        assert_eq!(summary.success, 1);
        assert_eq!(summary.failure, 0);
        assert_eq!(summary.skipped, 0);

        let tags = cloud.tags_of(VM_ID);
        assert_eq!(
            tags.get("Environment").map(String::as_str),
            Some("Production")
        );
        assert!(!tags.contains_key("Env"));
    }

    #[test]
    fn deleted_resource_is_skipped_not_fatal() {
        let cloud = MockCloud::with_resources(vec![]);
        let engine = RollbackEngine::new(&cloud, forced());

        let summary = engine.run(&[ledger_row()], &Always(true));

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failure, 0);
    }

    #[test]
    fn second_run_is_idempotent() {
        let cloud = MockCloud::with_resources(vec![live_resource(&[("Env", "Production")])]);
        let engine = RollbackEngine::new(&cloud, forced());
        let rows = [ledger_row()];

        let first = engine.run(&rows, &Always(true));
        assert_eq!(first.success, 1);
        let writes_after_first = cloud.replace_calls();

        let second = engine.run(&rows, &Always(true));
        assert_eq!(second.skipped, 1);
        assert_eq!(second.success, 0);
        assert_eq!(cloud.replace_calls(), writes_after_first);
    }

    #[test]
    fn neither_tag_present_is_flagged_for_manual_intervention() {
        let cloud = MockCloud::with_resources(vec![live_resource(&[("Owner", "ops")])]);
        let engine = RollbackEngine::new(&cloud, forced());

        let summary = engine.run(&[ledger_row()], &Always(true));

        assert_eq!(summary.skipped, 1);
        assert_eq!(cloud.replace_calls(), 0);
    }

    #[test]
    fn both_tags_present_restores_ledger_value() {
        let cloud = MockCloud::with_resources(vec![live_resource(&[
            ("Env", "Production"),
            ("Environment", "Stale"),
        ])]);
        let engine = RollbackEngine::new(&cloud, forced());

        let summary = engine.run(&[ledger_row()], &Always(true));

        assert_eq!(summary.success, 1);
        let tags = cloud.tags_of(VM_ID);
        assert_eq!(
            tags.get("Environment").map(String::as_str),
            Some("Production")
        );
        assert!(!tags.contains_key("Env"));
    }

    #[test]
    fn filters_select_by_group_and_name_substring() {
        let mut other_group = ledger_row();
        other_group.name = "vm-dev-09".to_string();
        other_group.resource_group_name = "rg-dev".to_string();
        let rows = vec![ledger_row(), other_group];

        let by_group = RollbackOptions {
            resource_group: Some("rg-app".to_string()),
            ..RollbackOptions::default()
        };
        let selected = filter_records(&rows, &by_group);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "vm-prod-01");

        let by_name = RollbackOptions {
            name_contains: Some("dev".to_string()),
            ..RollbackOptions::default()
        };
        let selected = filter_records(&rows, &by_name);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "vm-dev-09");
    }

    #[test]
    fn empty_filtered_set_exits_cleanly_without_confirmation() {
        let cloud = MockCloud::with_resources(vec![live_resource(&[("Env", "Production")])]);
        let options = RollbackOptions {
            resource_group: Some("rg-absent".to_string()),
            settle: Duration::ZERO,
            ..RollbackOptions::default()
        };
        let engine = RollbackEngine::new(&cloud, options);
        let confirm = CountingConfirm::new(true);

        let summary = engine.run(&[ledger_row()], &confirm);

        assert_eq!(summary.total(), 0);
        assert_eq!(confirm.calls(), 0);
        assert_eq!(cloud.replace_calls(), 0);
    }

    #[test]
    fn declined_confirmation_mutates_nothing() {
        let cloud = MockCloud::with_resources(vec![live_resource(&[("Env", "Production")])]);
        let options = RollbackOptions {
            settle: Duration::ZERO,
            ..RollbackOptions::default()
        };
        let engine = RollbackEngine::new(&cloud, options);
        let confirm = CountingConfirm::new(false);

        let summary = engine.run(&[ledger_row()], &confirm);

        assert_eq!(summary.total(), 0);
        assert_eq!(confirm.calls(), 1);
        assert_eq!(cloud.replace_calls(), 0);
    }

    #[test]
    fn dry_run_skips_confirmation_and_mutation() {
        let cloud = MockCloud::with_resources(vec![live_resource(&[("Env", "Production")])]);
        let options = RollbackOptions {
            dry_run: true,
            settle: Duration::ZERO,
            ..RollbackOptions::default()
        };
        let engine = RollbackEngine::new(&cloud, options);
        let confirm = CountingConfirm::new(false);

        let summary = engine.run(&[ledger_row()], &confirm);

        assert_eq!(summary.success, 1);
        assert_eq!(confirm.calls(), 0);
        assert_eq!(cloud.replace_calls(), 0);
        assert_eq!(
            cloud.tags_of(VM_ID).get("Env").map(String::as_str),
            Some("Production")
        );
    }
}
