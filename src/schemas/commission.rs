//! Commission record schema.
//!
//! Append-only ledger of individual payouts, one or two per sale. Record
//! ids are derived from the sale id and kind, so re-appending during a
//! settlement resume is a no-op insert.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Collection name for commission records
pub const COMMISSION_COLLECTION: &str = "commission_records";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommissionKind {
    /// Seller's own share of the sale
    Direct,
    /// Upline's flat share of a recruit's sale
    Override,
}

impl CommissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionKind::Direct => "direct",
            CommissionKind::Override => "override",
        }
    }
}

/// One payout entry in the commission ledger.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommissionRecordDoc {
    /// Deterministic id: `{sale_id}:{kind}`
    #[serde(rename = "_id")]
    pub id: String,

    pub sale_id: String,
    pub beneficiary_agent_id: String,

    /// Payout in cents
    pub amount: i64,

    pub kind: CommissionKind,

    /// Rate the payout was computed with, basis points
    pub rate_bp: i64,

    pub created_at: DateTime,
}

impl CommissionRecordDoc {
    pub fn new(
        sale_id: &str,
        beneficiary_agent_id: &str,
        amount: i64,
        kind: CommissionKind,
        rate_bp: i64,
    ) -> Self {
        Self {
            id: format!("{}:{}", sale_id, kind.as_str()),
            sale_id: sale_id.to_string(),
            beneficiary_agent_id: beneficiary_agent_id.to_string(),
            amount,
            kind,
            rate_bp,
            created_at: DateTime::now(),
        }
    }
}
