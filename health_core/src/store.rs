//! Store interfaces for metric entries and user identity.
//!
//! Records are addressed by their [`EntryKey`] (user x calendar date), never by
//! the opaque storage id, so the first save for a day and every later edit land
//! on the same record.

use crate::{EntryKey, Error, MetricEntry, Result, StoreError, StoredEntry, UserId};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use uuid::Uuid;

/// Filter predicates for a store query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryQuery {
    pub user: UserId,
    /// Only the record for exactly this day
    pub date: Option<NaiveDate>,
    /// Only records strictly before this day
    pub before: Option<NaiveDate>,
    /// Only records on or after this day
    pub since: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl EntryQuery {
    pub fn for_user(user: UserId) -> Self {
        Self {
            user,
            date: None,
            before: None,
            since: None,
            limit: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn before(mut self, date: NaiveDate) -> Self {
        self.before = Some(date);
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.since = Some(date);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, key: &EntryKey) -> bool {
        key.user == self.user
            && self.date.map_or(true, |d| key.date == d)
            && self.before.map_or(true, |b| key.date < b)
            && self.since.map_or(true, |s| key.date >= s)
    }

    /// Filter, order newest first and apply the limit
    pub fn apply<'a, I>(&self, records: I) -> Vec<StoredEntry>
    where
        I: IntoIterator<Item = &'a StoredEntry>,
    {
        let mut matched: Vec<StoredEntry> = records
            .into_iter()
            .filter(|r| self.matches(&r.key))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.key.date.cmp(&a.key.date));
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Query/transact interface of the backing datastore
pub trait MetricStore {
    /// Snapshot of the records matching `query`, newest first
    fn query(&self, query: &EntryQuery) -> Result<Vec<StoredEntry>>;

    /// Upsert the full record for `key`, returning its new revision.
    ///
    /// Replaying the same write is harmless: it is a full-record replacement.
    fn transact(&mut self, key: &EntryKey, entry: &MetricEntry) -> std::result::Result<u64, StoreError>;

    /// Receive the key of every record changed after this call
    fn subscribe(&mut self) -> Receiver<EntryKey>;
}

/// Fetch the record for one day
pub fn entry_for_day(
    store: &dyn MetricStore,
    user: &UserId,
    date: NaiveDate,
) -> Result<Option<StoredEntry>> {
    let query = EntryQuery::for_user(user.clone()).on(date).limit(1);
    Ok(store.query(&query)?.into_iter().next())
}

/// Fetch the most recent record strictly before `date`
pub fn previous_day_entry(
    store: &dyn MetricStore,
    user: &UserId,
    date: NaiveDate,
) -> Result<Option<StoredEntry>> {
    let query = EntryQuery::for_user(user.clone()).before(date).limit(1);
    Ok(store.query(&query)?.into_iter().next())
}

/// Fetch the `count` most recent entries for trends, newest first
pub fn recent_entries(
    store: &dyn MetricStore,
    user: &UserId,
    count: usize,
) -> Result<Vec<MetricEntry>> {
    let query = EntryQuery::for_user(user.clone()).limit(count);
    let entries: Vec<MetricEntry> = store
        .query(&query)?
        .into_iter()
        .map(|r| r.entry)
        .collect();
    tracing::debug!("Loaded {} recent entries for {}", entries.len(), user);
    Ok(entries)
}

/// Fetch every entry dated `from..=to`, newest first
pub fn entries_between(
    store: &dyn MetricStore,
    user: &UserId,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<MetricEntry>> {
    let mut query = EntryQuery::for_user(user.clone()).since(from);
    if let Some(next) = to.succ_opt() {
        query = query.before(next);
    }
    let entries: Vec<MetricEntry> = store
        .query(&query)?
        .into_iter()
        .map(|r| r.entry)
        .collect();
    tracing::debug!("Loaded {} entries for {} from {} to {}", entries.len(), user, from, to);
    Ok(entries)
}

pub(crate) fn check_entry_matches_key(
    key: &EntryKey,
    entry: &MetricEntry,
) -> std::result::Result<(), StoreError> {
    if key.date != entry.date {
        return Err(StoreError::new(format!(
            "Entry dated {} cannot be stored under {}",
            entry.date,
            key.encode()
        )));
    }
    Ok(())
}

pub(crate) fn notify(subscribers: &mut Vec<Sender<EntryKey>>, key: &EntryKey) {
    subscribers.retain(|tx| tx.send(key.clone()).is_ok());
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<EntryKey, StoredEntry>,
    revision: u64,
    subscribers: Vec<Sender<EntryKey>>,
    fail_next: Option<StoreError>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next transact reject with `err`
    pub fn fail_next_transact(&mut self, err: StoreError) {
        self.fail_next = Some(err);
    }

    pub fn get(&self, key: &EntryKey) -> Option<&StoredEntry> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MetricStore for MemoryStore {
    fn query(&self, query: &EntryQuery) -> Result<Vec<StoredEntry>> {
        Ok(query.apply(self.records.values()))
    }

    fn transact(&mut self, key: &EntryKey, entry: &MetricEntry) -> std::result::Result<u64, StoreError> {
        if let Some(err) = self.fail_next.take() {
            tracing::warn!("Rejecting write to {}: {}", key.encode(), err);
            return Err(err);
        }
        check_entry_matches_key(key, entry)?;

        self.revision += 1;
        let revision = self.revision;
        let id = self.records.get(key).map_or_else(Uuid::new_v4, |r| r.id);
        self.records.insert(
            key.clone(),
            StoredEntry {
                id,
                key: key.clone(),
                revision,
                entry: entry.clone(),
            },
        );
        notify(&mut self.subscribers, key);

        tracing::debug!("Stored {} at revision {}", key.encode(), revision);
        Ok(revision)
    }

    fn subscribe(&mut self) -> Receiver<EntryKey> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Source of the current authenticated user
pub trait IdentityProvider {
    fn current_user(&self) -> Option<UserId>;

    /// The current user, or [`Error::Unauthenticated`]
    fn require_user(&self) -> Result<UserId> {
        self.current_user().ok_or(Error::Unauthenticated)
    }
}

/// Identity fixed at construction
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity(pub Option<UserId>);

impl StaticIdentity {
    pub fn signed_in(user: UserId) -> Self {
        Self(Some(user))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}
