//! Read-only statistics projections.
//!
//! Composes the registry with the commission and sale ledgers to report an
//! agent's financial, team, and monthly summaries plus upgrade progress.
//! Monthly figures are derived by filtering timestamped records, never
//! kept as running counters, so a month rollover needs no reset step.

use std::sync::Arc;

use bson::doc;
use chrono::{Datelike, TimeZone, Utc};
use serde::Serialize;

use crate::catalog::LevelCatalog;
use crate::registry::AgentRegistry;
use crate::schemas::{
    CommissionRecordDoc, SaleDoc, COMMISSION_COLLECTION, SALE_COLLECTION,
};
use crate::store::DocumentStore;
use crate::types::{schema_err, Result, UplineError};
use crate::upgrade::{evaluate, UpgradeProgress};

/// Identity and rank summary.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub id: String,
    pub rank: i32,
    pub level_name: &'static str,
    pub status: String,
    pub referral_code: String,
}

/// Lifetime money counters, in cents.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialSummary {
    pub total_sales: i64,
    pub total_commission: i64,
    pub available_commission: i64,
    pub withdrawn_commission: i64,
    pub commission_rate_bp: i64,
}

/// One direct recruit, as shown in the team roster.
#[derive(Debug, Clone, Serialize)]
pub struct TeamMemberSummary {
    pub id: String,
    pub rank: i32,
    pub status: String,
    pub total_sales: i64,
    pub joined_at: bson::DateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    pub team_size: i64,
    pub direct_referrals: i64,
    pub members: Vec<TeamMemberSummary>,
}

/// Current calendar month, derived from the ledgers.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    /// `YYYY-MM` label
    pub month: String,
    pub sales: i64,
    pub commission: i64,
    /// Flat stipend for the agent's rank; reported, not paid here
    pub monthly_bonus: i64,
}

/// Everything the caller-facing layers need to render an agent dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStats {
    pub agent: AgentInfo,
    pub financial: FinancialSummary,
    pub team: TeamSummary,
    pub monthly: MonthlySummary,
    /// Absent at the top rank
    pub upgrade: Option<UpgradeProgress>,
}

/// Read-only aggregation over registry and ledgers.
#[derive(Clone)]
pub struct StatsAggregator {
    registry: AgentRegistry,
    store: Arc<dyn DocumentStore>,
    catalog: Arc<LevelCatalog>,
}

impl StatsAggregator {
    pub fn new(
        registry: AgentRegistry,
        store: Arc<dyn DocumentStore>,
        catalog: Arc<LevelCatalog>,
    ) -> Self {
        Self {
            registry,
            store,
            catalog,
        }
    }

    /// Full statistics for one agent.
    pub async fn stats(&self, agent_id: &str) -> Result<AgentStats> {
        let agent = self.registry.get(agent_id).await?;
        let level = self.catalog.definition(agent.rank).ok_or_else(|| {
            UplineError::Schema(format!(
                "agent {} has rank {} outside the catalog",
                agent.id, agent.rank
            ))
        })?;

        let now = Utc::now();
        let month_start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .expect("first of the month is a valid instant");

        let commission: i64 = self
            .store
            .query(
                COMMISSION_COLLECTION,
                doc! { "beneficiary_agent_id": agent_id },
            )
            .await?
            .into_iter()
            .map(|record| bson::from_document::<CommissionRecordDoc>(record).map_err(schema_err))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|record| record.created_at.to_chrono() >= month_start)
            .map(|record| record.amount)
            .sum();

        let sales: i64 = self
            .store
            .query(SALE_COLLECTION, doc! { "seller_agent_id": agent_id })
            .await?
            .into_iter()
            .map(|record| bson::from_document::<SaleDoc>(record).map_err(schema_err))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|sale| sale.recorded_at.to_chrono() >= month_start)
            .map(|sale| sale.amount)
            .sum();

        let members = self
            .registry
            .team_members(agent_id)
            .await?
            .into_iter()
            .map(|member| TeamMemberSummary {
                id: member.id,
                rank: member.rank,
                status: member.status.as_str().to_string(),
                total_sales: member.total_sales,
                joined_at: member.created_at,
            })
            .collect();

        let upgrade = evaluate(&agent, &self.catalog, now)?;

        Ok(AgentStats {
            agent: AgentInfo {
                id: agent.id.clone(),
                rank: agent.rank,
                level_name: level.name,
                status: agent.status.as_str().to_string(),
                referral_code: agent.referral_code.clone(),
            },
            financial: FinancialSummary {
                total_sales: agent.total_sales,
                total_commission: agent.total_commission,
                available_commission: agent.available_commission,
                withdrawn_commission: agent.withdrawn_commission,
                commission_rate_bp: level.commission_rate_bp,
            },
            team: TeamSummary {
                team_size: agent.team_size,
                direct_referrals: agent.direct_referrals,
                members,
            },
            monthly: MonthlySummary {
                month: now.format("%Y-%m").to_string(),
                sales,
                commission,
                monthly_bonus: level.monthly_bonus,
            },
            upgrade,
        })
    }
}
