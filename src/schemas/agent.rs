//! Agent document schema.
//!
//! One record per program participant. Counters only ever move through
//! `AgentRegistry::mutate_counters` (server-side increments) and `rank`
//! only through the optimistic guard in `AgentRegistry::set_rank`.

use bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collection name for agents
pub const AGENT_COLLECTION: &str = "agents";

/// Gate collection enforcing one agent per owner: `_id` is the owner user id.
pub const OWNER_COLLECTION: &str = "agent_owners";

/// Agent lifecycle state. Suspended/terminated agents keep their history
/// but stop receiving overrides.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Active,
    Suspended,
    Terminated,
}

impl AgentStatus {
    /// Wire value, as stored in the `status` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Active => "active",
            AgentStatus::Suspended => "suspended",
            AgentStatus::Terminated => "terminated",
        }
    }
}

/// Agent document stored in the agents collection.
///
/// Invariants maintained by the engine:
/// - `available_commission + withdrawn_commission == total_commission`
/// - `total_sales` and `rank` never decrease
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AgentDoc {
    /// Agent id (uuid)
    #[serde(rename = "_id")]
    pub id: String,

    /// Owning user; unique across all agents
    pub owner_user_id: String,

    /// Code others register with to join this agent's downline
    pub referral_code: String,

    /// Upline agent, immutable once set; forms a forest
    pub referred_by: Option<String>,

    /// Current rank, 1-based into the level catalog
    pub rank: i32,

    pub status: AgentStatus,

    // Monetary counters, in cents
    pub total_sales: i64,
    pub total_commission: i64,
    pub available_commission: i64,
    pub withdrawn_commission: i64,

    // Team counters
    pub team_size: i64,
    pub direct_referrals: i64,

    /// Registration time; promotion tenure is measured from here
    pub created_at: DateTime,

    /// Set when the agent is approved (pending -> active)
    pub approved_at: Option<DateTime>,
}

impl AgentDoc {
    /// Create a fresh rank-1 pending agent.
    pub fn new(owner_user_id: &str, referred_by: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.to_string(),
            referral_code: format!("AGENT{}", owner_user_id),
            referred_by: referred_by.map(str::to_string),
            rank: 1,
            status: AgentStatus::Pending,
            total_sales: 0,
            total_commission: 0,
            available_commission: 0,
            withdrawn_commission: 0,
            team_size: 0,
            direct_referrals: 0,
            created_at: DateTime::now(),
            approved_at: None,
        }
    }
}
