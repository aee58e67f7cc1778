//! Upline - tiered referral commission and leveling engine
//!
//! Agents earn a percentage of the sales they generate and a flat override
//! on sales generated by their direct recruits, and are promoted through
//! ranks as they hit sales, team-size, and tenure thresholds.
//!
//! ## Components
//!
//! - **LevelCatalog**: static rank definitions (rates, promotion thresholds)
//! - **AgentRegistry**: agent records and the referral graph
//! - **CommissionEngine**: pure commission split computation
//! - **SaleLedger**: exactly-once sale recording and balance settlement
//! - **UpgradeEvaluator**: deterministic rank promotion
//! - **StatsAggregator**: read-only financial/team/monthly projections
//!
//! The engine consumes an abstract [`store::DocumentStore`]; a MongoDB
//! backend and an in-process backend are provided. Callers interact through
//! the [`Engine`] facade: `register_agent`, `record_sale`, `get_agent_stats`.

pub mod catalog;
pub mod commission;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod logging;
pub mod registry;
pub mod schemas;
pub mod stats;
pub mod store;
pub mod types;
pub mod upgrade;

pub use catalog::{LevelCatalog, LevelDefinition, PromotionRequirements, OVERRIDE_RATE_BP};
pub use commission::{CommissionShare, CommissionSplit};
pub use config::EngineConfig;
pub use engine::Engine;
pub use registry::{AgentRegistry, CounterDelta};
pub use schemas::{AgentDoc, AgentStatus};
pub use stats::AgentStats;
pub use store::{DocumentStore, MemoryStore, MongoStore, StoreError};
pub use types::{Result, UplineError};
pub use upgrade::{Promotion, UpgradeProgress};
