//! Engine facade.
//!
//! One explicitly-constructed instance per process, wired to a store
//! handle and passed by reference to callers; there is no process-wide
//! state beyond the store connection itself. The bot/command layer talks
//! to exactly this surface: register an agent, record a sale, fetch stats.

use std::sync::Arc;

use crate::catalog::LevelCatalog;
use crate::commission::{CommissionEngine, CommissionSplit};
use crate::config::EngineConfig;
use crate::ledger::SaleLedger;
use crate::registry::AgentRegistry;
use crate::schemas::AgentDoc;
use crate::stats::{AgentStats, StatsAggregator};
use crate::store::{DocumentStore, MongoStore};
use crate::types::Result;
use crate::upgrade::UpgradeEvaluator;

/// Commission & leveling engine.
#[derive(Clone)]
pub struct Engine {
    registry: AgentRegistry,
    ledger: SaleLedger,
    stats: StatsAggregator,
}

impl Engine {
    /// Wire the engine onto a store with the given level catalog.
    pub fn new(store: Arc<dyn DocumentStore>, catalog: LevelCatalog, config: &EngineConfig) -> Self {
        let catalog = Arc::new(catalog);
        let registry = AgentRegistry::new(store.clone());
        let commission = CommissionEngine::new(catalog.clone());
        let evaluator = UpgradeEvaluator::new(
            registry.clone(),
            store.clone(),
            catalog.clone(),
            config.retry_attempts,
        );
        let ledger = SaleLedger::new(
            registry.clone(),
            commission,
            evaluator,
            store.clone(),
            config.retry_attempts,
        );
        let stats = StatsAggregator::new(registry.clone(), store, catalog);
        Self {
            registry,
            ledger,
            stats,
        }
    }

    /// Connect to MongoDB per the config and wire the engine onto it.
    pub async fn connect(config: &EngineConfig) -> Result<Self> {
        let store = MongoStore::connect(&config.mongodb_uri, &config.mongodb_db).await?;
        Ok(Self::new(
            Arc::new(store),
            LevelCatalog::standard(),
            config,
        ))
    }

    /// Register a new agent, optionally joining a referrer's downline by
    /// referral code.
    pub async fn register_agent(
        &self,
        owner_user_id: &str,
        referral_code: Option<&str>,
    ) -> Result<AgentDoc> {
        let referred_by = match referral_code {
            Some(code) => Some(self.registry.find_by_referral_code(code).await?.id),
            None => None,
        };
        self.registry
            .create(owner_user_id, referred_by.as_deref())
            .await
    }

    /// Approve a pending agent. The decision itself is made outside this
    /// core; this applies it.
    pub async fn approve_agent(&self, agent_id: &str) -> Result<()> {
        self.registry.approve(agent_id).await
    }

    /// Record a sale and distribute commission, exactly once per sale id.
    pub async fn record_sale(
        &self,
        sale_id: &str,
        seller_agent_id: &str,
        amount: i64,
    ) -> Result<CommissionSplit> {
        self.ledger.record_sale(sale_id, seller_agent_id, amount).await
    }

    /// Financial, team, monthly, and upgrade-progress statistics.
    pub async fn get_agent_stats(&self, agent_id: &str) -> Result<AgentStats> {
        self.stats.stats(agent_id).await
    }

    /// Direct registry access for embedders and tests.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }
}
