//! Agent registry: agent records and the referral graph.
//!
//! The only component that writes agent documents. Counter movement goes
//! through [`AgentRegistry::mutate_counters`] (server-side increments) and
//! rank changes through the optimistic guard in [`AgentRegistry::set_rank`].

use std::sync::Arc;

use bson::{doc, Bson, DateTime};
use tracing::info;

use crate::schemas::{AgentDoc, AgentStatus, AGENT_COLLECTION, OWNER_COLLECTION};
use crate::store::{DocumentStore, StoreError};
use crate::types::{schema_err, Result, UplineError};

/// Signed counter increments applied in one atomic store operation.
///
/// The engine only ever applies non-negative deltas; refunds and
/// withdrawals live outside this core.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterDelta {
    pub total_sales: i64,
    pub total_commission: i64,
    pub available_commission: i64,
    pub team_size: i64,
    pub direct_referrals: i64,
}

impl CounterDelta {
    /// Increment document with only the non-zero fields.
    fn to_increments(self) -> bson::Document {
        let mut deltas = bson::Document::new();
        for (field, value) in [
            ("total_sales", self.total_sales),
            ("total_commission", self.total_commission),
            ("available_commission", self.available_commission),
            ("team_size", self.team_size),
            ("direct_referrals", self.direct_referrals),
        ] {
            if value != 0 {
                deltas.insert(field, value);
            }
        }
        deltas
    }

    fn is_empty(self) -> bool {
        self.total_sales == 0
            && self.total_commission == 0
            && self.available_commission == 0
            && self.team_size == 0
            && self.direct_referrals == 0
    }
}

/// Registry over the agents collection and the owner-uniqueness gate.
#[derive(Clone)]
pub struct AgentRegistry {
    store: Arc<dyn DocumentStore>,
}

impl AgentRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a pending rank-1 agent for an owner.
    ///
    /// One agent per owner, enforced by an insert into the owner gate
    /// collection. A referrer must already exist; referral edges only ever
    /// point at pre-existing agents, so the graph stays a forest.
    pub async fn create(
        &self,
        owner_user_id: &str,
        referred_by: Option<&str>,
    ) -> Result<AgentDoc> {
        if let Some(referrer_id) = referred_by {
            self.get(referrer_id).await?;
        }

        let agent = AgentDoc::new(owner_user_id, referred_by);

        match self
            .store
            .insert(
                OWNER_COLLECTION,
                owner_user_id,
                doc! { "agent_id": &agent.id },
            )
            .await
        {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { .. }) => {
                return Err(UplineError::AlreadyRegistered(owner_user_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let record = bson::to_document(&agent).map_err(schema_err)?;
        self.store.insert(AGENT_COLLECTION, &agent.id, record).await?;

        if let Some(referrer_id) = referred_by {
            self.mutate_counters(
                referrer_id,
                CounterDelta {
                    team_size: 1,
                    direct_referrals: 1,
                    ..Default::default()
                },
            )
            .await?;
        }

        info!(
            agent_id = %agent.id,
            owner = %owner_user_id,
            referred_by = referred_by.unwrap_or("-"),
            "registered agent"
        );
        Ok(agent)
    }

    /// Fetch an agent by id.
    pub async fn get(&self, agent_id: &str) -> Result<AgentDoc> {
        let record = self
            .store
            .get(AGENT_COLLECTION, agent_id)
            .await?
            .ok_or_else(|| UplineError::NotFound(format!("agent {}", agent_id)))?;
        bson::from_document(record).map_err(schema_err)
    }

    /// Look up the agent owned by a user, if any.
    pub async fn find_by_owner(&self, owner_user_id: &str) -> Result<Option<AgentDoc>> {
        match self.store.get(OWNER_COLLECTION, owner_user_id).await? {
            Some(gate) => {
                let agent_id = gate
                    .get_str("agent_id")
                    .map_err(|_| UplineError::Schema("owner gate missing agent_id".into()))?;
                Ok(Some(self.get(agent_id).await?))
            }
            None => Ok(None),
        }
    }

    /// Resolve a referral code to its agent.
    pub async fn find_by_referral_code(&self, code: &str) -> Result<AgentDoc> {
        let mut found = self
            .store
            .query(AGENT_COLLECTION, doc! { "referral_code": code })
            .await?;
        match found.pop() {
            Some(record) => bson::from_document(record).map_err(schema_err),
            None => Err(UplineError::NotFound(format!("referral code {}", code))),
        }
    }

    /// Approve a pending agent, making it eligible to receive overrides.
    pub async fn approve(&self, agent_id: &str) -> Result<()> {
        let agent = self.get(agent_id).await?;
        if agent.status != AgentStatus::Pending {
            return Err(UplineError::InvalidTransition(format!(
                "agent {} is {}, only pending agents can be approved",
                agent_id,
                agent.status.as_str()
            )));
        }

        match self
            .store
            .compare_and_set(
                AGENT_COLLECTION,
                agent_id,
                "status",
                Bson::String(AgentStatus::Pending.as_str().to_string()),
                Bson::String(AgentStatus::Active.as_str().to_string()),
            )
            .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => {
                return Err(UplineError::InvalidTransition(format!(
                    "agent {} left pending state concurrently",
                    agent_id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        // Stamp approval time; a conflict means it was already stamped.
        match self
            .store
            .compare_and_set(
                AGENT_COLLECTION,
                agent_id,
                "approved_at",
                Bson::Null,
                Bson::DateTime(DateTime::now()),
            )
            .await
        {
            Ok(()) | Err(StoreError::Conflict { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        info!(agent_id = %agent_id, "approved agent");
        Ok(())
    }

    /// Apply counter increments in a single atomic store operation. This is
    /// the only path by which agent counters change.
    pub async fn mutate_counters(&self, agent_id: &str, delta: CounterDelta) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        match self
            .store
            .atomic_increment(AGENT_COLLECTION, agent_id, delta.to_increments())
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound { .. }) => {
                Err(UplineError::NotFound(format!("agent {}", agent_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Raise an agent's rank from an observed value.
    ///
    /// The observed rank doubles as the optimistic-concurrency guard: if
    /// another promotion landed first, the compare-and-set misses and the
    /// caller gets a retryable conflict.
    pub async fn set_rank(&self, agent_id: &str, observed_rank: i32, new_rank: i32) -> Result<()> {
        if new_rank <= observed_rank {
            return Err(UplineError::InvalidTransition(format!(
                "rank {} -> {} for agent {}",
                observed_rank, new_rank, agent_id
            )));
        }

        match self
            .store
            .compare_and_set(
                AGENT_COLLECTION,
                agent_id,
                "rank",
                Bson::Int32(observed_rank),
                Bson::Int32(new_rank),
            )
            .await
        {
            Ok(()) => {
                info!(agent_id = %agent_id, from = observed_rank, to = new_rank, "rank raised");
                Ok(())
            }
            Err(StoreError::Conflict { .. }) => Err(UplineError::Conflict(format!(
                "rank of agent {} moved past {}",
                agent_id, observed_rank
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Direct recruits of an agent.
    pub async fn team_members(&self, agent_id: &str) -> Result<Vec<AgentDoc>> {
        let records = self
            .store
            .query(AGENT_COLLECTION, doc! { "referred_by": agent_id })
            .await?;
        records
            .into_iter()
            .map(|record| bson::from_document(record).map_err(schema_err))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn one_agent_per_owner() {
        let registry = registry();
        registry.create("user-1", None).await.unwrap();
        let err = registry.create("user-1", None).await.unwrap_err();
        assert!(matches!(err, UplineError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn unknown_referrer_rejected() {
        let registry = registry();
        let err = registry.create("user-1", Some("ghost")).await.unwrap_err();
        assert!(matches!(err, UplineError::NotFound(_)));
    }

    #[tokio::test]
    async fn referral_bumps_referrer_team_counters() {
        let registry = registry();
        let referrer = registry.create("user-1", None).await.unwrap();
        registry.create("user-2", Some(&referrer.id)).await.unwrap();
        let reloaded = registry.get(&referrer.id).await.unwrap();
        assert_eq!(reloaded.team_size, 1);
        assert_eq!(reloaded.direct_referrals, 1);
    }

    #[tokio::test]
    async fn approve_only_moves_pending_to_active() {
        let registry = registry();
        let agent = registry.create("user-1", None).await.unwrap();
        registry.approve(&agent.id).await.unwrap();

        let reloaded = registry.get(&agent.id).await.unwrap();
        assert_eq!(reloaded.status, AgentStatus::Active);
        assert!(reloaded.approved_at.is_some());

        let err = registry.approve(&agent.id).await.unwrap_err();
        assert!(matches!(err, UplineError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn rank_never_moves_down_or_sideways() {
        let registry = registry();
        let agent = registry.create("user-1", None).await.unwrap();
        registry.set_rank(&agent.id, 1, 2).await.unwrap();

        let err = registry.set_rank(&agent.id, 2, 2).await.unwrap_err();
        assert!(matches!(err, UplineError::InvalidTransition(_)));
        let err = registry.set_rank(&agent.id, 2, 1).await.unwrap_err();
        assert!(matches!(err, UplineError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn stale_observed_rank_conflicts() {
        let registry = registry();
        let agent = registry.create("user-1", None).await.unwrap();
        registry.set_rank(&agent.id, 1, 2).await.unwrap();

        let err = registry.set_rank(&agent.id, 1, 2).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn find_by_referral_code_resolves() {
        let registry = registry();
        let agent = registry.create("user-1", None).await.unwrap();
        let found = registry
            .find_by_referral_code(&agent.referral_code)
            .await
            .unwrap();
        assert_eq!(found.id, agent.id);

        assert!(registry.find_by_referral_code("AGENTnone").await.is_err());
    }
}
