//! In-memory collaborator store.
//!
//! Implements every collaborator trait over plain vectors. Used by the unit
//! and integration tests and by the simtest harness. [`SharedStore`] wraps it
//! behind a mutex so concurrent deploy attempts can be exercised.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::catalog::{AnomalyId, AutomatonKind, CatalogedAnomaly, UpgradeTag};
use crate::store::{
    CatalogSource, DeployClaim, InsertOutcome, InteractionHistory, LinkageStore, NewLink,
    NotificationSink, StoreError, UpgradeFlags, UserId,
};
use crate::time::Timestamp;

/// A persisted linkage row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    pub id: u64,
    pub user: UserId,
    pub anomaly_id: AnomalyId,
    pub automaton: AutomatonKind,
    pub at: Timestamp,
    key: String,
}

#[derive(Debug, Clone)]
pub struct ClassificationRow {
    pub id: u64,
    pub author: UserId,
    pub classification_type: String,
    pub anomaly: Option<AnomalyId>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub author: UserId,
    pub classification_id: u64,
    pub at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct VoteRow {
    pub voter: UserId,
    pub classification_id: u64,
    pub upvote: bool,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub user: UserId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    anomalies: Vec<CatalogedAnomaly>,
    links: Vec<LinkRow>,
    classifications: Vec<ClassificationRow>,
    comments: Vec<CommentRow>,
    votes: Vec<VoteRow>,
    upgrades: HashSet<(UserId, UpgradeTag)>,
    claims: HashSet<String>,
    sent: Vec<SentNotification>,
    next_id: u64,
    failing_inserts: HashSet<AnomalyId>,
    catalog_failure: Option<StoreError>,
    notify_failure: Option<StoreError>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // ── Seeding ────────────────────────────────────────────────────────

    pub fn add_anomalies(&mut self, anomalies: impl IntoIterator<Item = CatalogedAnomaly>) {
        self.anomalies.extend(anomalies);
    }

    /// Record a classification and return its id.
    pub fn add_classification(&mut self, author: &UserId, classification_type: &str) -> u64 {
        self.push_classification(author, classification_type, None)
    }

    /// Record a classification of a specific anomaly.
    pub fn add_classification_of(
        &mut self,
        author: &UserId,
        classification_type: &str,
        anomaly: AnomalyId,
    ) -> u64 {
        self.push_classification(author, classification_type, Some(anomaly))
    }

    fn push_classification(
        &mut self,
        author: &UserId,
        classification_type: &str,
        anomaly: Option<AnomalyId>,
    ) -> u64 {
        let id = self.next_id();
        self.classifications.push(ClassificationRow {
            id,
            author: author.clone(),
            classification_type: classification_type.to_string(),
            anomaly,
        });
        id
    }

    pub fn add_comment(&mut self, author: &UserId, classification_id: u64, at: Timestamp) {
        self.comments.push(CommentRow {
            author: author.clone(),
            classification_id,
            at,
        });
    }

    pub fn add_vote(&mut self, voter: &UserId, classification_id: u64, upvote: bool, at: Timestamp) {
        self.votes.push(VoteRow {
            voter: voter.clone(),
            classification_id,
            upvote,
            at,
        });
    }

    pub fn grant_upgrade(&mut self, user: &UserId, tag: UpgradeTag) {
        self.upgrades.insert((user.clone(), tag));
    }

    // ── Fault injection ────────────────────────────────────────────────

    /// Make inserts for these anomaly ids fail. An empty slice heals.
    pub fn fail_inserts_for(&mut self, ids: &[AnomalyId]) {
        self.failing_inserts = ids.iter().copied().collect();
    }

    pub fn fail_catalog(&mut self, error: Option<StoreError>) {
        self.catalog_failure = error;
    }

    pub fn fail_notifications(&mut self, error: Option<StoreError>) {
        self.notify_failure = error;
    }

    // ── Inspection ─────────────────────────────────────────────────────

    pub fn links(&self) -> &[LinkRow] {
        &self.links
    }

    pub fn claims(&self) -> &HashSet<String> {
        &self.claims
    }

    pub fn sent_notifications(&self) -> &[SentNotification] {
        &self.sent
    }

    /// Whether `classification_id` was authored by someone other than `user`.
    /// Unknown classifications do not count.
    fn authored_by_other(&self, classification_id: u64, user: &UserId) -> bool {
        self.classifications
            .iter()
            .find(|c| c.id == classification_id)
            .is_some_and(|c| &c.author != user)
    }
}

impl CatalogSource for MemoryStore {
    fn fetch_anomalies(&self, tags: &[&str]) -> Result<Vec<CatalogedAnomaly>, StoreError> {
        if let Some(e) = &self.catalog_failure {
            return Err(e.clone());
        }
        Ok(self
            .anomalies
            .iter()
            .filter(|a| tags.contains(&a.anomaly_set.as_str()))
            .cloned()
            .collect())
    }
}

impl InteractionHistory for MemoryStore {
    fn count_comments(
        &self,
        user: &UserId,
        since: Timestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError> {
        Ok(self
            .comments
            .iter()
            .filter(|c| &c.author == user && c.at >= since)
            .filter(|c| !exclude_self || self.authored_by_other(c.classification_id, user))
            .count() as u32)
    }

    fn count_upvotes(
        &self,
        user: &UserId,
        since: Timestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError> {
        Ok(self
            .votes
            .iter()
            .filter(|v| &v.voter == user && v.upvote && v.at >= since)
            .filter(|v| !exclude_self || self.authored_by_other(v.classification_id, user))
            .count() as u32)
    }

    fn count_classifications(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<u32, StoreError> {
        Ok(self
            .classifications
            .iter()
            .filter(|c| &c.author == user && c.classification_type == classification_type)
            .count() as u32)
    }

    fn classified_anomalies(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<Vec<AnomalyId>, StoreError> {
        let mut ids: Vec<AnomalyId> = self
            .classifications
            .iter()
            .filter(|c| &c.author == user && c.classification_type == classification_type)
            .filter_map(|c| c.anomaly)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

impl UpgradeFlags for MemoryStore {
    fn has_upgrade(&self, user: &UserId, tag: UpgradeTag) -> Result<bool, StoreError> {
        Ok(self.upgrades.contains(&(user.clone(), tag)))
    }
}

impl LinkageStore for MemoryStore {
    fn count_links(
        &self,
        user: &UserId,
        automaton: AutomatonKind,
        since: Timestamp,
    ) -> Result<u32, StoreError> {
        Ok(self
            .links
            .iter()
            .filter(|l| &l.user == user && l.automaton == automaton && l.at >= since)
            .count() as u32)
    }

    fn insert_link(&mut self, link: &NewLink) -> Result<InsertOutcome, StoreError> {
        if self.failing_inserts.contains(&link.anomaly_id) {
            return Err(StoreError::Rejected(format!(
                "insert of anomaly {} failed",
                link.anomaly_id
            )));
        }
        let key = link.key();
        if self.links.iter().any(|l| l.key == key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        let id = self.next_id();
        self.links.push(LinkRow {
            id,
            user: link.user.clone(),
            anomaly_id: link.anomaly_id,
            automaton: link.automaton,
            at: link.at,
            key,
        });
        Ok(InsertOutcome::Inserted)
    }

    fn try_claim(&mut self, claim: &DeployClaim) -> Result<bool, StoreError> {
        Ok(self.claims.insert(claim.key()))
    }

    fn release_claim(&mut self, claim: &DeployClaim) -> Result<(), StoreError> {
        self.claims.remove(&claim.key());
        Ok(())
    }
}

impl NotificationSink for MemoryStore {
    fn notify(&mut self, user: &UserId, title: &str, body: &str) -> Result<(), StoreError> {
        if let Some(e) = &self.notify_failure {
            return Err(e.clone());
        }
        self.sent.push(SentNotification {
            user: user.clone(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Thread-safe handle to a [`MemoryStore`]. Every trait call takes the lock
/// for just that call, like independent requests against a real database.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<MemoryStore>>,
}

impl SharedStore {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, MemoryStore>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl CatalogSource for SharedStore {
    fn fetch_anomalies(&self, tags: &[&str]) -> Result<Vec<CatalogedAnomaly>, StoreError> {
        self.lock()?.fetch_anomalies(tags)
    }
}

impl InteractionHistory for SharedStore {
    fn count_comments(
        &self,
        user: &UserId,
        since: Timestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError> {
        self.lock()?.count_comments(user, since, exclude_self)
    }

    fn count_upvotes(
        &self,
        user: &UserId,
        since: Timestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError> {
        self.lock()?.count_upvotes(user, since, exclude_self)
    }

    fn count_classifications(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<u32, StoreError> {
        self.lock()?.count_classifications(user, classification_type)
    }

    fn classified_anomalies(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<Vec<AnomalyId>, StoreError> {
        self.lock()?.classified_anomalies(user, classification_type)
    }
}

impl UpgradeFlags for SharedStore {
    fn has_upgrade(&self, user: &UserId, tag: UpgradeTag) -> Result<bool, StoreError> {
        self.lock()?.has_upgrade(user, tag)
    }
}

impl LinkageStore for SharedStore {
    fn count_links(
        &self,
        user: &UserId,
        automaton: AutomatonKind,
        since: Timestamp,
    ) -> Result<u32, StoreError> {
        self.lock()?.count_links(user, automaton, since)
    }

    fn insert_link(&mut self, link: &NewLink) -> Result<InsertOutcome, StoreError> {
        self.lock()?.insert_link(link)
    }

    fn try_claim(&mut self, claim: &DeployClaim) -> Result<bool, StoreError> {
        self.lock()?.try_claim(claim)
    }

    fn release_claim(&mut self, claim: &DeployClaim) -> Result<(), StoreError> {
        self.lock()?.release_claim(claim)
    }
}

impl NotificationSink for SharedStore {
    fn notify(&mut self, user: &UserId, title: &str, body: &str) -> Result<(), StoreError> {
        self.lock()?.notify(user, title, body)
    }
}
