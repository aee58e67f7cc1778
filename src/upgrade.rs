//! Rank promotion.
//!
//! After any state-changing event the evaluator re-checks the agent against
//! the next rank's thresholds and advances at most one rank, guarded by an
//! optimistic compare-and-set so concurrent evaluations can never skip or
//! double-apply a rank.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::LevelCatalog;
use crate::registry::AgentRegistry;
use crate::schemas::{AgentDoc, UpgradeRecordDoc, UPGRADE_COLLECTION};
use crate::store::{DocumentStore, StoreError};
use crate::types::{schema_err, Result, UplineError};

/// One requirement's progress toward the next rank.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequirementCheck {
    pub required: i64,
    pub current: i64,
    pub met: bool,
}

impl RequirementCheck {
    fn new(required: i64, current: i64) -> Self {
        Self {
            required,
            current,
            met: current >= required,
        }
    }
}

/// Progress toward the next rank. Absent entirely for top-rank agents.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeProgress {
    pub next_rank: i32,
    pub sales: RequirementCheck,
    pub team: RequirementCheck,
    pub tenure: RequirementCheck,
}

impl UpgradeProgress {
    /// All three thresholds are required.
    pub fn eligible(&self) -> bool {
        self.sales.met && self.team.met && self.tenure.met
    }
}

/// Outcome of a promotion check.
#[derive(Debug, Clone, Copy)]
pub struct Promotion {
    pub promoted: bool,
    pub new_rank: Option<i32>,
}

impl Promotion {
    fn none() -> Self {
        Self {
            promoted: false,
            new_rank: None,
        }
    }
}

/// Evaluate an agent snapshot against its current rank's promotion
/// requirements. Returns `None` at the top rank. Pure; shared with the
/// stats projection, which must never mutate.
pub fn evaluate(
    agent: &AgentDoc,
    catalog: &LevelCatalog,
    now: DateTime<Utc>,
) -> Result<Option<UpgradeProgress>> {
    let level = catalog.definition(agent.rank).ok_or_else(|| {
        UplineError::Schema(format!(
            "agent {} has rank {} outside the catalog",
            agent.id, agent.rank
        ))
    })?;

    let Some(reqs) = &level.requirements else {
        return Ok(None);
    };

    let active_days = (now - agent.created_at.to_chrono()).num_days();
    Ok(Some(UpgradeProgress {
        next_rank: agent.rank + 1,
        sales: RequirementCheck::new(reqs.min_total_sales, agent.total_sales),
        team: RequirementCheck::new(reqs.min_team_size, agent.team_size),
        tenure: RequirementCheck::new(reqs.min_active_days, active_days),
    }))
}

/// Promotes agents when they satisfy the next rank's requirements.
#[derive(Clone)]
pub struct UpgradeEvaluator {
    registry: AgentRegistry,
    store: Arc<dyn DocumentStore>,
    catalog: Arc<LevelCatalog>,
    retry_attempts: u32,
}

impl UpgradeEvaluator {
    pub fn new(
        registry: AgentRegistry,
        store: Arc<dyn DocumentStore>,
        catalog: Arc<LevelCatalog>,
        retry_attempts: u32,
    ) -> Self {
        Self {
            registry,
            store,
            catalog,
            retry_attempts,
        }
    }

    /// Check an agent and advance at most one rank.
    ///
    /// A compare-and-set miss means a concurrent evaluation already moved
    /// the rank; the check is retried from the fresh snapshot a bounded
    /// number of times.
    pub async fn check_and_promote(&self, agent_id: &str) -> Result<Promotion> {
        for attempt in 0..self.retry_attempts.max(1) {
            let agent = self.registry.get(agent_id).await?;

            let Some(progress) = evaluate(&agent, &self.catalog, Utc::now())? else {
                return Ok(Promotion::none());
            };
            if !progress.eligible() {
                return Ok(Promotion::none());
            }

            match self
                .registry
                .set_rank(agent_id, agent.rank, progress.next_rank)
                .await
            {
                Ok(()) => {
                    self.append_record(&agent, &progress).await?;
                    info!(
                        agent_id = %agent_id,
                        from = agent.rank,
                        to = progress.next_rank,
                        "agent promoted"
                    );
                    return Ok(Promotion {
                        promoted: true,
                        new_rank: Some(progress.next_rank),
                    });
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        agent_id = %agent_id,
                        attempt,
                        "concurrent rank change, re-evaluating"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Promotion::none())
    }

    async fn append_record(&self, agent: &AgentDoc, progress: &UpgradeProgress) -> Result<()> {
        let record = UpgradeRecordDoc::new(
            &agent.id,
            agent.rank,
            progress.next_rank,
            progress.sales.current,
            progress.team.current,
            progress.tenure.current,
        );
        let id = record.id.clone();
        let doc = bson::to_document(&record).map_err(schema_err)?;
        match self.store.insert(UPGRADE_COLLECTION, &id, doc).await {
            // The rank guard makes a duplicate possible only on replayed
            // settlement; the audit entry is already there.
            Ok(()) | Err(StoreError::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn agent_with(total_sales: i64, team_size: i64, days_ago: i64) -> AgentDoc {
        let mut agent = AgentDoc::new("owner", None);
        agent.total_sales = total_sales;
        agent.team_size = team_size;
        agent.created_at =
            bson::DateTime::from_chrono(Utc::now() - Duration::days(days_ago));
        agent
    }

    #[test]
    fn all_three_thresholds_required() {
        let catalog = LevelCatalog::standard();
        // Sales and tenure met, team one short of the 3 required for rank 2
        let agent = agent_with(100_000, 2, 31);
        let progress = evaluate(&agent, &catalog, Utc::now()).unwrap().unwrap();
        assert!(progress.sales.met);
        assert!(progress.tenure.met);
        assert!(!progress.team.met);
        assert!(!progress.eligible());
    }

    #[test]
    fn eligible_when_everything_met() {
        let catalog = LevelCatalog::standard();
        let agent = agent_with(100_000, 3, 31);
        let progress = evaluate(&agent, &catalog, Utc::now()).unwrap().unwrap();
        assert!(progress.eligible());
        assert_eq!(progress.next_rank, 2);
    }

    #[test]
    fn top_rank_has_no_progress() {
        let catalog = LevelCatalog::standard();
        let mut agent = agent_with(i64::MAX, i64::MAX, 10_000);
        agent.rank = 5;
        assert!(evaluate(&agent, &catalog, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn tenure_counts_whole_days() {
        let catalog = LevelCatalog::standard();
        let agent = agent_with(100_000, 3, 29);
        let progress = evaluate(&agent, &catalog, Utc::now()).unwrap().unwrap();
        assert!(!progress.tenure.met);
        assert_eq!(progress.tenure.current, 29);
    }
}
