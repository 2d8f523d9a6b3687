//! Inline edit reconciliation for one day's record.
//!
//! A [`DaySession`] owns, per metric field, an explicit state
//! (`Idle | Editing | Saving | Error`) and the edit buffer text. Displayed values
//! come from a two-tier model:
//!
//! 1. a non-empty edit buffer,
//! 2. the optimistic override recorded when our own save succeeded,
//! 3. the authoritative remote snapshot.
//!
//! An override is dropped once a remote snapshot at the same or a newer
//! revision arrives. Remote snapshots never touch edit buffers.

use crate::format::{format_optional, normalize_input, parse_value};
use crate::store::entry_for_day;
use crate::{
    EntryKey, Error, IdentityProvider, MetricEntry, MetricField, MetricStore, Result, StoreError,
    StoredEntry,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Lifecycle of one field's inline edit
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum FieldState {
    /// Showing the last known value, not focused
    #[default]
    Idle,
    /// Focused; the buffer is authoritative
    Editing,
    /// A save is in flight
    Saving,
    /// The last save failed; the buffer is kept for correction
    Error(String),
}

/// Per-field edit state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldEdit {
    pub state: FieldState,
    pub buffer: String,
    pub focused: bool,
    in_flight: Option<u64>,
    edited_while_saving: bool,
}

/// One save issued by a blur: the full record for the day
#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    pub seq: u64,
    pub key: EntryKey,
    pub field: MetricField,
    pub entry: MetricEntry,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Override {
    value: Option<f64>,
    revision: u64,
}

/// Edit session for a single (user, day) record
#[derive(Debug)]
pub struct DaySession {
    key: EntryKey,
    remote: Option<StoredEntry>,
    overrides: BTreeMap<MetricField, Override>,
    fields: BTreeMap<MetricField, FieldEdit>,
    pending: BTreeMap<u64, SaveRequest>,
    next_seq: u64,
}

impl DaySession {
    /// Start a session for `date` as the current user.
    ///
    /// Fails with [`Error::Unauthenticated`] when nobody is signed in.
    pub fn open(
        identity: &dyn IdentityProvider,
        date: NaiveDate,
        remote: Option<StoredEntry>,
    ) -> Result<Self> {
        let user = identity.require_user()?;
        let mut session = Self {
            key: EntryKey::new(user, date),
            remote: None,
            overrides: BTreeMap::new(),
            fields: MetricField::ALL
                .iter()
                .map(|f| (*f, FieldEdit::default()))
                .collect(),
            pending: BTreeMap::new(),
            next_seq: 1,
        };
        session.apply_remote(remote);
        Ok(session)
    }

    /// Open a session seeded with the store's current record for the day
    pub fn load(
        identity: &dyn IdentityProvider,
        store: &dyn MetricStore,
        date: NaiveDate,
    ) -> Result<Self> {
        let user = identity.require_user()?;
        let remote = entry_for_day(store, &user, date)?;
        Self::open(identity, date, remote)
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn date(&self) -> NaiveDate {
        self.key.date
    }

    pub fn edit(&self, field: MetricField) -> &FieldEdit {
        &self.fields[&field]
    }

    pub fn state(&self, field: MetricField) -> &FieldState {
        &self.fields[&field].state
    }

    /// Message of the last failed save, if the field is in `Error`
    pub fn error_message(&self, field: MetricField) -> Option<&str> {
        match &self.fields[&field].state {
            FieldState::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// Whether any field is being edited or saved
    pub fn is_busy(&self) -> bool {
        self.fields
            .values()
            .any(|e| matches!(e.state, FieldState::Editing | FieldState::Saving))
    }

    /// Last known saved value: our override if present, else the remote one
    pub fn committed(&self, field: MetricField) -> Option<f64> {
        match self.overrides.get(&field) {
            Some(o) => o.value,
            None => self.remote.as_ref().and_then(|r| field.get(&r.entry)),
        }
    }

    /// The full record as last known to be saved
    pub fn committed_entry(&self) -> MetricEntry {
        let mut entry = self
            .remote
            .as_ref()
            .map(|r| r.entry.clone())
            .unwrap_or_else(|| MetricEntry::empty(self.key.date));
        for (field, o) in &self.overrides {
            field.set(&mut entry, o.value);
        }
        entry
    }

    /// Text to show for `field`
    pub fn display(&self, field: MetricField) -> String {
        let edit = &self.fields[&field];
        if !edit.buffer.is_empty() {
            return edit.buffer.clone();
        }
        format_optional(field, self.committed(field))
    }

    /// Focus gained: start editing, seeding an empty buffer with the saved value
    pub fn focus(&mut self, field: MetricField) {
        let seed = format_optional(field, self.committed(field));
        let edit = self.field_mut(field);
        edit.focused = true;

        match edit.state {
            FieldState::Idle | FieldState::Error(_) => {
                edit.state = FieldState::Editing;
                // Unsaved text from an earlier focus is kept
                if edit.buffer.is_empty() {
                    edit.buffer = seed;
                }
            }
            FieldState::Editing | FieldState::Saving => {}
        }
    }

    /// Keystroke: store the normalized text as the new buffer
    pub fn input(&mut self, field: MetricField, raw: &str) {
        if !self.fields[&field].focused {
            self.focus(field);
        }
        let edit = self.field_mut(field);
        edit.buffer = normalize_input(field, raw);
        match edit.state {
            FieldState::Saving => edit.edited_while_saving = true,
            FieldState::Idle | FieldState::Error(_) => edit.state = FieldState::Editing,
            FieldState::Editing => {}
        }
    }

    /// Focus lost or explicit submit.
    ///
    /// Returns the save to issue, if any. A blur that leaves the value
    /// unchanged returns to `Idle` without saving.
    pub fn blur(&mut self, field: MetricField) -> Option<SaveRequest> {
        let committed = self.committed(field);
        let edit = self.field_mut(field);
        edit.focused = false;
        let unchanged = parse_value(field, &edit.buffer) == committed;

        let needs_save = match edit.state {
            FieldState::Editing if unchanged => {
                edit.state = FieldState::Idle;
                edit.buffer.clear();
                false
            }
            FieldState::Editing | FieldState::Error(_) => true,
            FieldState::Saving => edit.edited_while_saving,
            FieldState::Idle => false,
        };

        needs_save.then(|| self.issue_save(field))
    }

    /// Escape: drop the buffer and show the saved value again
    pub fn cancel(&mut self, field: MetricField) -> bool {
        let edit = self.field_mut(field);
        match edit.state {
            FieldState::Editing | FieldState::Error(_) => {
                edit.state = FieldState::Idle;
                edit.buffer.clear();
                edit.focused = false;
                edit.edited_while_saving = false;
                true
            }
            FieldState::Saving | FieldState::Idle => false,
        }
    }

    /// Report the outcome of a save previously returned by [`blur`](Self::blur)
    pub fn resolve_save(&mut self, seq: u64, outcome: std::result::Result<u64, StoreError>) {
        let Some(request) = self.pending.remove(&seq) else {
            tracing::warn!("Ignoring outcome of unknown save #{}", seq);
            return;
        };
        let field = request.field;
        let latest = self.fields[&field].in_flight == Some(seq);

        match outcome {
            Ok(revision) => {
                self.record_saved(&request.entry, revision);
                let edit = self.field_mut(field);
                if latest {
                    edit.in_flight = None;
                    if edit.edited_while_saving {
                        edit.state = FieldState::Editing;
                    } else {
                        edit.state = FieldState::Idle;
                        edit.buffer.clear();
                    }
                }
                tracing::info!(
                    "Saved {} for {} at revision {}",
                    field,
                    self.key.encode(),
                    revision
                );
            }
            Err(err) => {
                let message = err.user_message();
                tracing::warn!("Save of {} for {} failed: {}", field, self.key.encode(), message);
                let edit = self.field_mut(field);
                if latest {
                    edit.in_flight = None;
                    edit.state = FieldState::Error(message);
                }
            }
        }
    }

    /// Blur `field` and run the resulting save against `store` to completion
    pub fn commit_with(
        &mut self,
        store: &mut dyn MetricStore,
        field: MetricField,
    ) -> Result<Option<u64>> {
        let Some(request) = self.blur(field) else {
            return Ok(None);
        };
        let outcome = store.transact(&request.key, &request.entry);
        self.resolve_save(request.seq, outcome.clone());
        outcome.map(Some).map_err(Error::Store)
    }

    /// Replace the authoritative snapshot after an out-of-band refresh
    pub fn apply_remote(&mut self, snapshot: Option<StoredEntry>) {
        if let Some(s) = &snapshot {
            if s.key != self.key {
                tracing::warn!(
                    "Ignoring snapshot for {} in session for {}",
                    s.key.encode(),
                    self.key.encode()
                );
                return;
            }
            let revision = s.revision;
            self.overrides.retain(|_, o| o.revision > revision);
        }
        self.remote = snapshot;
    }

    /// Re-read the day from `store` and apply it
    pub fn refresh_from(&mut self, store: &dyn MetricStore) -> Result<()> {
        let snapshot = entry_for_day(store, &self.key.user, self.key.date)?;
        self.apply_remote(snapshot);
        Ok(())
    }

    fn field_mut(&mut self, field: MetricField) -> &mut FieldEdit {
        self.fields.entry(field).or_default()
    }

    fn issue_save(&mut self, field: MetricField) -> SaveRequest {
        let seq = self.next_seq;
        self.next_seq += 1;

        // Other fields still saving contribute their in-flight values
        let mut entry = self.committed_entry();
        for (other, edit) in &self.fields {
            if let Some(req) = edit.in_flight.and_then(|s| self.pending.get(&s)) {
                other.set(&mut entry, other.get(&req.entry));
            }
        }

        let edit = self.field_mut(field);
        let value = parse_value(field, &edit.buffer);
        edit.state = FieldState::Saving;
        edit.in_flight = Some(seq);
        edit.edited_while_saving = false;

        field.set(&mut entry, value);
        entry.is_manual = true;

        let request = SaveRequest {
            seq,
            key: self.key.clone(),
            field,
            entry,
        };
        self.pending.insert(seq, request.clone());
        tracing::debug!("Issued save #{} of {} = {:?}", seq, field, value);
        request
    }

    fn record_saved(&mut self, entry: &MetricEntry, revision: u64) {
        if self.remote.as_ref().is_some_and(|r| r.revision >= revision) {
            return;
        }
        for field in MetricField::ALL {
            let newer = self
                .overrides
                .get(&field)
                .map_or(true, |o| o.revision < revision);
            if newer {
                self.overrides.insert(
                    field,
                    Override {
                        value: field.get(entry),
                        revision,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, StaticIdentity, UserId};

    fn ann() -> StaticIdentity {
        StaticIdentity::signed_in(UserId::new("ann").unwrap())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 14).unwrap()
    }

    fn key() -> EntryKey {
        EntryKey::new(UserId::new("ann").unwrap(), today())
    }

    fn saved_day() -> MetricEntry {
        MetricEntry {
            steps: Some(8000),
            calories: Some(1900),
            protein: Some(150.0),
            workout_minutes: Some(30),
            weight: Some(182.5),
            ..MetricEntry::empty(today())
        }
    }

    fn store_with_day() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.transact(&key(), &saved_day()).unwrap();
        store
    }

    #[test]
    fn test_open_requires_identity() {
        let result = DaySession::open(&StaticIdentity::signed_out(), today(), None);
        assert!(matches!(result, Err(Error::Unauthenticated)));
    }

    #[test]
    fn test_focus_seeds_buffer_from_saved_value() {
        let store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.focus(MetricField::Steps);

        assert_eq!(session.state(MetricField::Steps), &FieldState::Editing);
        assert_eq!(session.edit(MetricField::Steps).buffer, "8,000 steps");
    }

    #[test]
    fn test_typed_grouped_value_saves_as_number() {
        let mut store = MemoryStore::new();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.focus(MetricField::Steps);
        session.input(MetricField::Steps, "1,234");
        assert_eq!(session.display(MetricField::Steps), "1,234");

        let revision = session.commit_with(&mut store, MetricField::Steps).unwrap();

        assert!(revision.is_some());
        assert_eq!(store.get(&key()).unwrap().entry.steps, Some(1234));
        assert_eq!(session.state(MetricField::Steps), &FieldState::Idle);
        assert_eq!(session.display(MetricField::Steps), "1,234 steps");
    }

    #[test]
    fn test_clearing_weight_keeps_other_fields() {
        let mut store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.focus(MetricField::Weight);
        session.input(MetricField::Weight, "");
        session.commit_with(&mut store, MetricField::Weight).unwrap();

        let saved = &store.get(&key()).unwrap().entry;
        assert_eq!(saved.weight, None);
        assert_eq!(saved.steps, Some(8000));
        assert_eq!(saved.calories, Some(1900));
        assert_eq!(saved.protein, Some(150.0));
        assert_eq!(saved.workout_minutes, Some(30));
        assert!(saved.is_manual);
    }

    #[test]
    fn test_zero_means_cleared() {
        let mut store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.input(MetricField::Calories, "0 kcal");
        session.commit_with(&mut store, MetricField::Calories).unwrap();

        assert_eq!(store.get(&key()).unwrap().entry.calories, None);
        assert_eq!(session.display(MetricField::Calories), "");
    }

    #[test]
    fn test_refresh_keeps_editing_buffer_and_updates_idle_fields() {
        let mut store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.focus(MetricField::Calories);
        session.input(MetricField::Calories, "2200");

        // Another device writes the day while we are typing
        let mut remote = saved_day();
        remote.steps = Some(9500);
        remote.calories = Some(1500);
        store.transact(&key(), &remote).unwrap();
        session.refresh_from(&store).unwrap();

        assert_eq!(session.display(MetricField::Calories), "2,200");
        assert_eq!(parse_value(MetricField::Calories, &session.display(MetricField::Calories)), Some(2200.0));
        assert_eq!(session.state(MetricField::Calories), &FieldState::Editing);
        assert_eq!(session.display(MetricField::Steps), "9,500 steps");
    }

    #[test]
    fn test_save_failure_keeps_buffer_and_can_retry() {
        let mut store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.input(MetricField::Protein, "170");
        store.fail_next_transact(StoreError::opaque());
        let err = session.commit_with(&mut store, MetricField::Protein).unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert_eq!(
            session.error_message(MetricField::Protein),
            Some(crate::error::GENERIC_SAVE_FAILURE)
        );
        assert_eq!(session.edit(MetricField::Protein).buffer, "170");
        assert_eq!(store.get(&key()).unwrap().entry.protein, Some(150.0));

        // Re-focus preserves the unsaved text; blur retries
        session.focus(MetricField::Protein);
        assert_eq!(session.edit(MetricField::Protein).buffer, "170");
        session.commit_with(&mut store, MetricField::Protein).unwrap();
        assert_eq!(store.get(&key()).unwrap().entry.protein, Some(170.0));
        assert_eq!(session.state(MetricField::Protein), &FieldState::Idle);
    }

    #[test]
    fn test_failure_message_comes_from_payload() {
        let mut store = MemoryStore::new();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();
        session.input(MetricField::Steps, "10");
        store.fail_next_transact(StoreError::new("Permission denied"));
        let _ = session.commit_with(&mut store, MetricField::Steps);
        assert_eq!(session.error_message(MetricField::Steps), Some("Permission denied"));
    }

    #[test]
    fn test_cancel_reverts_without_saving() {
        let store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.focus(MetricField::Weight);
        session.input(MetricField::Weight, "999");
        assert!(session.cancel(MetricField::Weight));

        assert_eq!(session.state(MetricField::Weight), &FieldState::Idle);
        assert_eq!(session.display(MetricField::Weight), "182.5 lbs");
        assert!(session.blur(MetricField::Weight).is_none());
    }

    #[test]
    fn test_untouched_blur_does_not_save() {
        let store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.focus(MetricField::Steps);
        assert!(session.blur(MetricField::Steps).is_none());
        assert_eq!(session.state(MetricField::Steps), &FieldState::Idle);
        assert!(session.edit(MetricField::Steps).buffer.is_empty());
    }

    #[test]
    fn test_override_survives_stale_refresh() {
        let mut store = store_with_day();
        let stale = entry_for_day(&store, &key().user, today()).unwrap();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.input(MetricField::Steps, "11000");
        session.commit_with(&mut store, MetricField::Steps).unwrap();

        // A refresh fetched before our write lands afterwards
        session.apply_remote(stale);
        assert_eq!(session.display(MetricField::Steps), "11,000 steps");
        assert_eq!(session.committed(MetricField::Steps), Some(11000.0));

        // A fresh snapshot replaces the override
        let mut newer = saved_day();
        newer.steps = Some(12000);
        store.transact(&key(), &newer).unwrap();
        session.refresh_from(&store).unwrap();
        assert_eq!(session.display(MetricField::Steps), "12,000 steps");
    }

    #[test]
    fn test_edit_during_save_issues_one_more_save() {
        crate::logging::init_test();
        let store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.input(MetricField::Steps, "9000");
        let first = session.blur(MetricField::Steps).unwrap();
        assert_eq!(session.state(MetricField::Steps), &FieldState::Saving);
        assert!(session.is_busy());

        // Typing while the first save is in flight
        session.focus(MetricField::Steps);
        session.input(MetricField::Steps, "9100");
        let second = session.blur(MetricField::Steps).unwrap();
        assert_ne!(first.seq, second.seq);
        assert_eq!(second.entry.steps, Some(9100));

        session.resolve_save(first.seq, Ok(2));
        assert_eq!(session.state(MetricField::Steps), &FieldState::Saving);
        session.resolve_save(second.seq, Ok(3));
        assert_eq!(session.state(MetricField::Steps), &FieldState::Idle);
        assert_eq!(session.committed(MetricField::Steps), Some(9100.0));
        assert!(!session.is_busy());
    }

    #[test]
    fn test_overlapping_saves_of_two_fields_keep_both_values() {
        let mut store = store_with_day();
        let mut session = DaySession::load(&ann(), &store, today()).unwrap();

        session.focus(MetricField::Steps);
        session.input(MetricField::Steps, "9000");
        let steps_save = session.blur(MetricField::Steps).unwrap();

        // Tab to calories before the steps save comes back
        session.focus(MetricField::Calories);
        session.input(MetricField::Calories, "2200");
        let calories_save = session.blur(MetricField::Calories).unwrap();
        assert_eq!(calories_save.entry.steps, Some(9000));
        assert_eq!(calories_save.entry.calories, Some(2200));

        let first = store.transact(&steps_save.key, &steps_save.entry);
        let second = store.transact(&calories_save.key, &calories_save.entry);
        session.resolve_save(steps_save.seq, first);
        session.resolve_save(calories_save.seq, second);

        let saved = &store.get(&key()).unwrap().entry;
        assert_eq!(saved.steps, Some(9000));
        assert_eq!(saved.calories, Some(2200));
        assert_eq!(session.display(MetricField::Steps), "9,000 steps");
        assert_eq!(session.display(MetricField::Calories), "2,200 kcal");
        assert!(!session.is_busy());
    }

    #[test]
    fn test_unknown_save_outcome_is_ignored() {
        let mut session = DaySession::open(&ann(), today(), None).unwrap();
        session.resolve_save(42, Ok(1));
        assert_eq!(session.committed(MetricField::Steps), None);
    }

    #[test]
    fn test_snapshot_for_other_day_is_ignored() {
        let mut store = MemoryStore::new();
        let other = EntryKey::new(UserId::new("ann").unwrap(), today().pred_opt().unwrap());
        let mut entry = MetricEntry::empty(other.date);
        entry.steps = Some(5);
        store.transact(&other, &entry).unwrap();

        let mut session = DaySession::open(&ann(), today(), None).unwrap();
        session.apply_remote(store.get(&other).cloned());
        assert_eq!(session.display(MetricField::Steps), "");
    }
}
