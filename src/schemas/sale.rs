//! Sale document schema.
//!
//! A sale document doubles as the idempotency gate (its `_id` is the
//! externally supplied sale id, inserted if-absent) and as the settlement
//! state machine: the `*_credited` flags mark which party's balance
//! increments have been claimed, so a retried or resumed call never credits
//! the same party twice.

use bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::commission::{CommissionShare, CommissionSplit};

/// Collection name for sales
pub const SALE_COLLECTION: &str = "sales";

/// Sale event and settlement progress.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaleDoc {
    /// Externally supplied sale id; the idempotency key
    #[serde(rename = "_id")]
    pub sale_id: String,

    pub seller_agent_id: String,

    /// Sale amount in cents; always positive
    pub amount: i64,

    /// Seller's commission in cents, frozen at record time
    pub direct_commission: i64,

    /// Rate applied for the direct share, basis points
    pub direct_rate_bp: i64,

    /// Upline beneficiary, when an override was due at record time
    #[serde(default)]
    pub override_agent_id: Option<String>,

    /// Override amount in cents; zero when no override applies
    pub override_commission: i64,

    // Settlement phase claims
    pub seller_credited: bool,
    pub override_credited: bool,
    pub settled: bool,

    pub recorded_at: DateTime,
}

impl SaleDoc {
    /// Build an unsettled sale from a computed commission split.
    pub fn new(sale_id: &str, seller_agent_id: &str, amount: i64, split: &CommissionSplit) -> Self {
        Self {
            sale_id: sale_id.to_string(),
            seller_agent_id: seller_agent_id.to_string(),
            amount,
            direct_commission: split.direct.amount,
            direct_rate_bp: split.direct.rate_bp,
            override_agent_id: split
                .override_share
                .as_ref()
                .map(|share| share.agent_id.clone()),
            override_commission: split
                .override_share
                .as_ref()
                .map(|share| share.amount)
                .unwrap_or(0),
            seller_credited: false,
            override_credited: false,
            settled: false,
            recorded_at: DateTime::now(),
        }
    }

    /// The commission split this sale was recorded with.
    pub fn split(&self) -> CommissionSplit {
        CommissionSplit {
            direct: CommissionShare {
                agent_id: self.seller_agent_id.clone(),
                amount: self.direct_commission,
                rate_bp: self.direct_rate_bp,
            },
            override_share: self.override_agent_id.as_ref().map(|id| CommissionShare {
                agent_id: id.clone(),
                amount: self.override_commission,
                rate_bp: crate::catalog::OVERRIDE_RATE_BP,
            }),
        }
    }
}
