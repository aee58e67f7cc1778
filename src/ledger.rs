//! Sale ledger: exactly-once sale recording and balance settlement.
//!
//! The sale document is both the idempotency gate and the settlement state
//! machine. Recording works in two phases per beneficiary: claim the phase
//! with a compare-and-set on its flag, then apply that party's balance
//! increments. A replayed or resumed call re-runs only the unclaimed
//! phases, so no party is ever credited twice and a partial failure can
//! always be finished by calling again with the same sale id.

use std::sync::Arc;
use std::time::Duration;

use bson::Bson;
use tracing::{debug, error, warn};

use crate::commission::{CommissionEngine, CommissionSplit};
use crate::registry::{AgentRegistry, CounterDelta};
use crate::schemas::{CommissionKind, CommissionRecordDoc, SaleDoc, COMMISSION_COLLECTION, SALE_COLLECTION};
use crate::store::{DocumentStore, StoreError};
use crate::types::{schema_err, Result, UplineError};
use crate::upgrade::UpgradeEvaluator;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Records sales and applies commission splits.
#[derive(Clone)]
pub struct SaleLedger {
    registry: AgentRegistry,
    engine: CommissionEngine,
    evaluator: UpgradeEvaluator,
    store: Arc<dyn DocumentStore>,
    retry_attempts: u32,
}

impl SaleLedger {
    pub fn new(
        registry: AgentRegistry,
        engine: CommissionEngine,
        evaluator: UpgradeEvaluator,
        store: Arc<dyn DocumentStore>,
        retry_attempts: u32,
    ) -> Self {
        Self {
            registry,
            engine,
            evaluator,
            store,
            retry_attempts,
        }
    }

    /// Record a sale and distribute commission, exactly once per sale id.
    ///
    /// Replaying a known sale id finishes any unapplied settlement phases
    /// and returns the originally computed split; it is never an error.
    pub async fn record_sale(
        &self,
        sale_id: &str,
        seller_agent_id: &str,
        amount: i64,
    ) -> Result<CommissionSplit> {
        if amount <= 0 {
            return Err(UplineError::InvalidAmount(amount));
        }

        // Fast path: the sale is already recorded.
        if let Some(existing) = self.load_sale(sale_id).await? {
            debug!(sale_id = %sale_id, "duplicate sale id, resuming settlement");
            return self.settle(&existing).await;
        }

        let seller = self.registry.get(seller_agent_id).await?;
        let upline = match &seller.referred_by {
            Some(upline_id) => match self.registry.get(upline_id).await {
                Ok(agent) => Some(agent),
                // A dangling referral edge should not block the sale.
                Err(UplineError::NotFound(_)) => {
                    warn!(sale_id = %sale_id, upline = %upline_id, "upline record missing");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let split = self.engine.compute(&seller, upline.as_ref(), amount)?;
        if seller.referred_by.is_some() && split.override_share.is_none() {
            debug!(
                sale_id = %sale_id,
                seller = %seller_agent_id,
                "override dropped, upline missing or inactive"
            );
        }

        let sale = SaleDoc::new(sale_id, seller_agent_id, amount, &split);
        let record = bson::to_document(&sale).map_err(schema_err)?;
        match self.store.insert(SALE_COLLECTION, sale_id, record).await {
            Ok(()) => self.settle(&sale).await,
            Err(StoreError::AlreadyExists { .. }) => {
                // Lost the gate race; the winner's record is authoritative.
                let existing = self.load_sale(sale_id).await?.ok_or_else(|| {
                    UplineError::Conflict(format!("sale {} vanished during recording", sale_id))
                })?;
                self.settle(&existing).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load_sale(&self, sale_id: &str) -> Result<Option<SaleDoc>> {
        match self.store.get(SALE_COLLECTION, sale_id).await? {
            Some(record) => Ok(Some(bson::from_document(record).map_err(schema_err)?)),
            None => Ok(None),
        }
    }

    /// Apply any unapplied settlement phases, then evaluate promotions.
    /// Safe to call any number of times for the same sale.
    async fn settle(&self, sale: &SaleDoc) -> Result<CommissionSplit> {
        if !sale.settled {
            if self
                .claim_phase(&sale.sale_id, "seller_credited", sale.seller_credited)
                .await?
            {
                let delta = CounterDelta {
                    total_sales: sale.amount,
                    total_commission: sale.direct_commission,
                    available_commission: sale.direct_commission,
                    ..Default::default()
                };
                if let Err(e) = self.apply_with_retry(&sale.seller_agent_id, delta).await {
                    self.release_phase(&sale.sale_id, "seller_credited").await;
                    return Err(e);
                }
            }

            if let Some(upline_id) = &sale.override_agent_id {
                if self
                    .claim_phase(&sale.sale_id, "override_credited", sale.override_credited)
                    .await?
                {
                    let delta = CounterDelta {
                        total_commission: sale.override_commission,
                        available_commission: sale.override_commission,
                        ..Default::default()
                    };
                    if let Err(e) = self.apply_with_retry(upline_id, delta).await {
                        self.release_phase(&sale.sale_id, "override_credited").await;
                        return Err(e);
                    }
                }
            }

            self.append_commission_records(sale).await?;

            // A conflict here means another worker finished settlement first.
            match self
                .store
                .compare_and_set(
                    SALE_COLLECTION,
                    &sale.sale_id,
                    "settled",
                    Bson::Boolean(false),
                    Bson::Boolean(true),
                )
                .await
            {
                Ok(()) | Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        // Promotions are evaluated independently of this sale's outcome and
        // never change its already-recorded commission. Re-running them on a
        // replay is a harmless no-op when nothing qualifies.
        self.evaluator.check_and_promote(&sale.seller_agent_id).await?;
        if let Some(upline_id) = &sale.override_agent_id {
            self.evaluator.check_and_promote(upline_id).await?;
        }

        Ok(sale.split())
    }

    /// Claim a settlement phase. Returns whether this caller owns it: a
    /// flag already observed true or taken by a concurrent worker means the
    /// increments for that party are handled elsewhere.
    async fn claim_phase(&self, sale_id: &str, flag: &str, observed: bool) -> Result<bool> {
        if observed {
            return Ok(false);
        }
        match self
            .store
            .compare_and_set(
                SALE_COLLECTION,
                sale_id,
                flag,
                Bson::Boolean(false),
                Bson::Boolean(true),
            )
            .await
        {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict { .. }) => {
                debug!(sale_id = %sale_id, flag, "phase already claimed");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hand a failed phase back before surfacing an error, so a retry with
    /// the same sale id re-applies the missing credit instead of skipping a
    /// claimed-but-never-applied phase.
    async fn release_phase(&self, sale_id: &str, flag: &str) {
        if let Err(e) = self
            .store
            .compare_and_set(
                SALE_COLLECTION,
                sale_id,
                flag,
                Bson::Boolean(true),
                Bson::Boolean(false),
            )
            .await
        {
            // The claim stays taken; the sale needs operator attention.
            error!(sale_id = %sale_id, flag, error = %e, "failed to release settlement claim");
        }
    }

    /// Apply counter increments, retrying transient backend failures a
    /// bounded number of times before surfacing a retryable conflict.
    async fn apply_with_retry(&self, agent_id: &str, delta: CounterDelta) -> Result<()> {
        let attempts = self.retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 0..attempts {
            match self.registry.mutate_counters(agent_id, delta).await {
                Ok(()) => return Ok(()),
                Err(UplineError::Store(StoreError::Backend(msg))) => {
                    warn!(agent_id = %agent_id, attempt, error = %msg, "increment failed, retrying");
                    last_err = Some(msg);
                    tokio::time::sleep(RETRY_BACKOFF * (attempt + 1)).await;
                }
                Err(e) => return Err(e),
            }
        }
        Err(UplineError::Conflict(format!(
            "could not credit agent {} after {} attempts: {}",
            agent_id,
            attempts,
            last_err.unwrap_or_default()
        )))
    }

    /// Append the per-beneficiary ledger entries. Ids are derived from the
    /// sale id, so replays land on existing records.
    async fn append_commission_records(&self, sale: &SaleDoc) -> Result<()> {
        let mut records = vec![CommissionRecordDoc::new(
            &sale.sale_id,
            &sale.seller_agent_id,
            sale.direct_commission,
            CommissionKind::Direct,
            sale.direct_rate_bp,
        )];
        if let Some(upline_id) = &sale.override_agent_id {
            records.push(CommissionRecordDoc::new(
                &sale.sale_id,
                upline_id,
                sale.override_commission,
                CommissionKind::Override,
                crate::catalog::OVERRIDE_RATE_BP,
            ));
        }

        for record in records {
            let id = record.id.clone();
            let doc = bson::to_document(&record).map_err(schema_err)?;
            match self.store.insert(COMMISSION_COLLECTION, &id, doc).await {
                Ok(()) | Err(StoreError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
