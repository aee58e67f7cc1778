//! Commission computation.
//!
//! Pure arithmetic over already-fetched agent snapshots; the ledger owns
//! all fetching and mutation. Shares round down to whole cents.

use std::sync::Arc;

use crate::catalog::{LevelCatalog, OVERRIDE_RATE_BP};
use crate::schemas::{AgentDoc, AgentStatus};
use crate::types::{Result, UplineError};

/// One beneficiary's share of a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionShare {
    pub agent_id: String,
    /// Cents
    pub amount: i64,
    /// Rate the share was computed with, basis points
    pub rate_bp: i64,
}

/// Commission split for a single sale: the seller's direct share and, when
/// the seller has an active upline, the upline's flat override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionSplit {
    pub direct: CommissionShare,
    pub override_share: Option<CommissionShare>,
}

/// Computes commission splits against a level catalog.
#[derive(Clone)]
pub struct CommissionEngine {
    catalog: Arc<LevelCatalog>,
}

impl CommissionEngine {
    pub fn new(catalog: Arc<LevelCatalog>) -> Self {
        Self { catalog }
    }

    /// Split a sale between the seller and their upline.
    ///
    /// The override is paid only when an upline snapshot is present and
    /// active; otherwise it is dropped, not deferred.
    pub fn compute(
        &self,
        seller: &AgentDoc,
        upline: Option<&AgentDoc>,
        amount: i64,
    ) -> Result<CommissionSplit> {
        let level = self.catalog.definition(seller.rank).ok_or_else(|| {
            UplineError::Schema(format!(
                "agent {} has rank {} outside the catalog",
                seller.id, seller.rank
            ))
        })?;

        let direct = CommissionShare {
            agent_id: seller.id.clone(),
            amount: rate_amount(amount, level.commission_rate_bp),
            rate_bp: level.commission_rate_bp,
        };

        let override_share = upline
            .filter(|up| up.status == AgentStatus::Active)
            .map(|up| CommissionShare {
                agent_id: up.id.clone(),
                amount: rate_amount(amount, OVERRIDE_RATE_BP),
                rate_bp: OVERRIDE_RATE_BP,
            });

        Ok(CommissionSplit {
            direct,
            override_share,
        })
    }
}

/// `amount * rate_bp / 10_000`, rounded toward zero, overflow-safe.
pub(crate) fn rate_amount(amount: i64, rate_bp: i64) -> i64 {
    (amount as i128 * rate_bp as i128 / 10_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LevelCatalog;

    fn engine() -> CommissionEngine {
        CommissionEngine::new(Arc::new(LevelCatalog::standard()))
    }

    fn agent(rank: i32, status: AgentStatus) -> AgentDoc {
        let mut doc = AgentDoc::new("owner", None);
        doc.rank = rank;
        doc.status = status;
        doc
    }

    #[test]
    fn rank_one_sale_with_active_upline() {
        let seller = agent(1, AgentStatus::Active);
        let upline = agent(2, AgentStatus::Active);
        let split = engine().compute(&seller, Some(&upline), 10_000).unwrap();
        assert_eq!(split.direct.amount, 500);
        assert_eq!(split.direct.rate_bp, 500);
        let over = split.override_share.unwrap();
        assert_eq!(over.amount, 100);
        assert_eq!(over.agent_id, upline.id);
    }

    #[test]
    fn suspended_upline_gets_nothing() {
        let seller = agent(1, AgentStatus::Active);
        let upline = agent(3, AgentStatus::Suspended);
        let split = engine().compute(&seller, Some(&upline), 10_000).unwrap();
        assert!(split.override_share.is_none());
    }

    #[test]
    fn direct_rate_follows_seller_rank() {
        let seller = agent(3, AgentStatus::Active);
        let split = engine().compute(&seller, None, 10_000).unwrap();
        assert_eq!(split.direct.amount, 1_200);
    }

    #[test]
    fn shares_round_down_to_whole_cents() {
        let seller = agent(1, AgentStatus::Active);
        // 99 cents at 5% is 4.95 cents
        let split = engine().compute(&seller, None, 99).unwrap();
        assert_eq!(split.direct.amount, 4);
    }

    #[test]
    fn unknown_rank_is_a_schema_error() {
        let seller = agent(9, AgentStatus::Active);
        assert!(engine().compute(&seller, None, 100).is_err());
    }
}
