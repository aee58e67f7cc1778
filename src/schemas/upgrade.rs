//! Upgrade record schema.
//!
//! Append-only audit log of rank promotions, with a snapshot of the
//! metrics that qualified the agent. The id is derived from agent and
//! target rank: an agent reaches a given rank at most once.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Collection name for upgrade records
pub const UPGRADE_COLLECTION: &str = "agent_upgrades";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpgradeRecordDoc {
    /// Deterministic id: `{agent_id}:{to_rank}`
    #[serde(rename = "_id")]
    pub id: String,

    pub agent_id: String,
    pub from_rank: i32,
    pub to_rank: i32,
    pub promoted_at: DateTime,

    // Qualifying metrics at promotion time
    pub total_sales: i64,
    pub team_size: i64,
    pub active_days: i64,
}

impl UpgradeRecordDoc {
    pub fn new(
        agent_id: &str,
        from_rank: i32,
        to_rank: i32,
        total_sales: i64,
        team_size: i64,
        active_days: i64,
    ) -> Self {
        Self {
            id: format!("{}:{}", agent_id, to_rank),
            agent_id: agent_id.to_string(),
            from_rank,
            to_rank,
            promoted_at: DateTime::now(),
            total_sales,
            team_size,
            active_days,
        }
    }
}
