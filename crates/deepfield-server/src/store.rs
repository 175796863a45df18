//! Collaborator traits implemented over the module's tables.
//!
//! Users are identified by the hex form of their SpacetimeDB identity. The
//! adapter only writes on behalf of the reducer's caller.

use deepfield_logic::catalog::{AnomalyId, AutomatonKind, CatalogedAnomaly, UpgradeTag};
use deepfield_logic::store::{
    CatalogSource, DeployClaim, InsertOutcome, InteractionHistory, LinkageStore, NewLink,
    NotificationSink, StoreError, UpgradeFlags, UserId,
};
use deepfield_logic::time::Timestamp as LogicTimestamp;
use spacetimedb::{Identity, ReducerContext, Table, Timestamp};

use crate::tables::*;

pub fn user_id(identity: Identity) -> UserId {
    UserId::new(identity.to_string())
}

pub fn to_logic_time(ts: Timestamp) -> LogicTimestamp {
    LogicTimestamp::from_micros(ts.to_micros_since_unix_epoch())
}

fn to_host_time(ts: LogicTimestamp) -> Timestamp {
    Timestamp::from_micros_since_unix_epoch(ts.micros())
}

fn is_user(identity: &Identity, user: &UserId) -> bool {
    identity.to_string() == user.as_str()
}

pub struct TableStore<'a> {
    ctx: &'a ReducerContext,
}

impl<'a> TableStore<'a> {
    pub fn new(ctx: &'a ReducerContext) -> Self {
        Self { ctx }
    }

    /// Identity to write rows for. Refuses anyone but the caller.
    fn writer(&self, user: &UserId) -> Result<Identity, StoreError> {
        if is_user(&self.ctx.sender, user) {
            Ok(self.ctx.sender)
        } else {
            Err(StoreError::Rejected(format!(
                "{} cannot write on behalf of {}",
                self.ctx.sender, user
            )))
        }
    }

    /// Whether `classification_id` exists and belongs to someone else.
    fn authored_by_other(&self, classification_id: u64, user: &UserId) -> bool {
        self.ctx
            .db
            .classification()
            .id()
            .find(classification_id)
            .is_some_and(|c| !is_user(&c.author, user))
    }
}

impl CatalogSource for TableStore<'_> {
    fn fetch_anomalies(&self, tags: &[&str]) -> Result<Vec<CatalogedAnomaly>, StoreError> {
        let mut out = Vec::new();
        for row in self
            .ctx
            .db
            .anomaly()
            .iter()
            .filter(|r| tags.contains(&r.anomaly_set.as_str()))
        {
            let configuration = match serde_json::from_str(&row.configuration) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("anomaly {} has unreadable configuration: {}", row.id, e);
                    serde_json::Value::Null
                }
            };
            out.push(CatalogedAnomaly {
                id: row.id,
                anomaly_set: row.anomaly_set,
                parent_anomaly: row.parent_anomaly,
                content: row.content,
                configuration,
            });
        }
        // Catalog order is id order.
        out.sort_by_key(|a| a.id);
        Ok(out)
    }
}

impl InteractionHistory for TableStore<'_> {
    fn count_comments(
        &self,
        user: &UserId,
        since: LogicTimestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError> {
        let since = to_host_time(since);
        Ok(self
            .ctx
            .db
            .comment()
            .iter()
            .filter(|c| is_user(&c.author, user) && c.created_at >= since)
            .filter(|c| !exclude_self || self.authored_by_other(c.classification_id, user))
            .count() as u32)
    }

    fn count_upvotes(
        &self,
        user: &UserId,
        since: LogicTimestamp,
        exclude_self: bool,
    ) -> Result<u32, StoreError> {
        let since = to_host_time(since);
        Ok(self
            .ctx
            .db
            .vote()
            .iter()
            .filter(|v| v.upvote && is_user(&v.voter, user) && v.created_at >= since)
            .filter(|v| !exclude_self || self.authored_by_other(v.classification_id, user))
            .count() as u32)
    }

    fn count_classifications(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<u32, StoreError> {
        Ok(self
            .ctx
            .db
            .classification()
            .iter()
            .filter(|c| is_user(&c.author, user) && c.classification_type == classification_type)
            .count() as u32)
    }

    fn classified_anomalies(
        &self,
        user: &UserId,
        classification_type: &str,
    ) -> Result<Vec<AnomalyId>, StoreError> {
        let mut ids: Vec<AnomalyId> = self
            .ctx
            .db
            .classification()
            .iter()
            .filter(|c| is_user(&c.author, user) && c.classification_type == classification_type)
            .filter_map(|c| c.anomaly)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}

impl UpgradeFlags for TableStore<'_> {
    fn has_upgrade(&self, user: &UserId, tag: UpgradeTag) -> Result<bool, StoreError> {
        Ok(self
            .ctx
            .db
            .researched()
            .iter()
            .any(|r| is_user(&r.user, user) && r.tech_type == tag.as_str()))
    }
}

impl LinkageStore for TableStore<'_> {
    fn count_links(
        &self,
        user: &UserId,
        automaton: AutomatonKind,
        since: LogicTimestamp,
    ) -> Result<u32, StoreError> {
        let since = to_host_time(since);
        Ok(self
            .ctx
            .db
            .linked_anomaly()
            .iter()
            .filter(|l| {
                is_user(&l.author, user) && l.automaton == automaton.as_str() && l.date >= since
            })
            .count() as u32)
    }

    fn insert_link(&mut self, link: &NewLink) -> Result<InsertOutcome, StoreError> {
        let author = self.writer(&link.user)?;
        let key = link.key();
        if self.ctx.db.linked_anomaly().link_key().find(&key).is_some() {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        if self.ctx.db.anomaly().id().find(link.anomaly_id).is_none() {
            return Err(StoreError::Rejected(format!(
                "anomaly {} is not in the catalog",
                link.anomaly_id
            )));
        }
        self.ctx
            .db
            .linked_anomaly()
            .try_insert(LinkedAnomaly {
                id: 0,
                link_key: key.clone(),
                author,
                anomaly_id: link.anomaly_id,
                automaton: link.automaton.as_str().to_string(),
                date: to_host_time(link.at),
            })
            .map_err(|_| StoreError::Rejected(format!("link {key} could not be inserted")))?;
        Ok(InsertOutcome::Inserted)
    }

    fn try_claim(&mut self, claim: &DeployClaim) -> Result<bool, StoreError> {
        let user = self.writer(&claim.user)?;
        let key = claim.key();
        if self.ctx.db.deploy_claim().claim_key().find(&key).is_some() {
            return Ok(false);
        }
        self.ctx
            .db
            .deploy_claim()
            .try_insert(DeployClaimRow {
                claim_key: key.clone(),
                user,
                created_at: self.ctx.timestamp,
            })
            .map_err(|_| StoreError::Rejected(format!("claim {key} could not be inserted")))?;
        Ok(true)
    }

    fn release_claim(&mut self, claim: &DeployClaim) -> Result<(), StoreError> {
        self.ctx.db.deploy_claim().claim_key().delete(&claim.key());
        Ok(())
    }
}

impl NotificationSink for TableStore<'_> {
    fn notify(&mut self, user: &UserId, title: &str, body: &str) -> Result<(), StoreError> {
        let user = self.writer(user)?;
        self.ctx.db.notification().insert(Notification {
            id: 0,
            user,
            title: title.to_string(),
            body: body.to_string(),
            created_at: self.ctx.timestamp,
            acknowledged: false,
        });
        Ok(())
    }
}
