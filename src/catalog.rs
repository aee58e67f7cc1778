//! Level catalog: static rank definitions.
//!
//! Rates are basis points and amounts are cents, so every downstream
//! computation stays in exact integer arithmetic.

/// Flat override rate paid to an active upline on a direct recruit's sale,
/// independent of the upline's own rank.
pub const OVERRIDE_RATE_BP: i64 = 100;

/// Thresholds an agent must meet to advance past a rank. All three are
/// required.
#[derive(Debug, Clone, Copy)]
pub struct PromotionRequirements {
    /// Lifetime sales in cents
    pub min_total_sales: i64,
    /// Full downline head count
    pub min_team_size: i64,
    /// Whole days since registration
    pub min_active_days: i64,
}

/// One rank's definition.
#[derive(Debug, Clone)]
pub struct LevelDefinition {
    /// 1-based rank, contiguous across the catalog
    pub rank: i32,
    pub name: &'static str,
    /// Direct commission rate, basis points; strictly increasing with rank
    pub commission_rate_bp: i64,
    /// Entry floors for this rank, informational
    pub min_total_sales: i64,
    pub min_team_size: i64,
    /// Flat monthly stipend in cents; reported, never computed here
    pub monthly_bonus: i64,
    /// None only at the top rank
    pub requirements: Option<PromotionRequirements>,
}

/// Ordered, validated set of level definitions.
#[derive(Debug, Clone)]
pub struct LevelCatalog {
    levels: Vec<LevelDefinition>,
}

impl LevelCatalog {
    /// Build a catalog, validating rank contiguity, strictly increasing
    /// commission rates, and a terminal top rank.
    pub fn new(levels: Vec<LevelDefinition>) -> Result<Self, String> {
        if levels.is_empty() {
            return Err("catalog must define at least one level".to_string());
        }
        let mut prev_rate = 0;
        for (i, level) in levels.iter().enumerate() {
            let expected_rank = i as i32 + 1;
            if level.rank != expected_rank {
                return Err(format!(
                    "rank {} at position {} breaks contiguity",
                    level.rank, i
                ));
            }
            if level.commission_rate_bp <= prev_rate {
                return Err(format!(
                    "commission rate must strictly increase at rank {}",
                    level.rank
                ));
            }
            prev_rate = level.commission_rate_bp;
            if level.monthly_bonus < 0 || level.min_total_sales < 0 || level.min_team_size < 0 {
                return Err(format!("negative amount at rank {}", level.rank));
            }
            let is_top = i == levels.len() - 1;
            if is_top && level.requirements.is_some() {
                return Err("top rank must not define promotion requirements".to_string());
            }
            if !is_top && level.requirements.is_none() {
                return Err(format!("rank {} is missing promotion requirements", level.rank));
            }
        }
        Ok(Self { levels })
    }

    /// The five-rank reference configuration.
    pub fn standard() -> Self {
        let levels = vec![
            LevelDefinition {
                rank: 1,
                name: "Bronze",
                commission_rate_bp: 500,
                min_total_sales: 0,
                min_team_size: 0,
                monthly_bonus: 0,
                requirements: Some(PromotionRequirements {
                    min_total_sales: 100_000,
                    min_team_size: 3,
                    min_active_days: 30,
                }),
            },
            LevelDefinition {
                rank: 2,
                name: "Silver",
                commission_rate_bp: 800,
                min_total_sales: 100_000,
                min_team_size: 3,
                monthly_bonus: 5_000,
                requirements: Some(PromotionRequirements {
                    min_total_sales: 500_000,
                    min_team_size: 10,
                    min_active_days: 60,
                }),
            },
            LevelDefinition {
                rank: 3,
                name: "Gold",
                commission_rate_bp: 1_200,
                min_total_sales: 500_000,
                min_team_size: 10,
                monthly_bonus: 20_000,
                requirements: Some(PromotionRequirements {
                    min_total_sales: 2_000_000,
                    min_team_size: 30,
                    min_active_days: 90,
                }),
            },
            LevelDefinition {
                rank: 4,
                name: "Platinum",
                commission_rate_bp: 1_500,
                min_total_sales: 2_000_000,
                min_team_size: 30,
                monthly_bonus: 50_000,
                requirements: Some(PromotionRequirements {
                    min_total_sales: 5_000_000,
                    min_team_size: 100,
                    min_active_days: 120,
                }),
            },
            LevelDefinition {
                rank: 5,
                name: "Diamond",
                commission_rate_bp: 1_800,
                min_total_sales: 5_000_000,
                min_team_size: 100,
                monthly_bonus: 100_000,
                requirements: None,
            },
        ];
        Self::new(levels).expect("standard catalog is valid")
    }

    /// Definition for a rank, if the catalog has it.
    pub fn definition(&self, rank: i32) -> Option<&LevelDefinition> {
        if rank < 1 {
            return None;
        }
        self.levels.get(rank as usize - 1)
    }

    pub fn max_rank(&self) -> i32 {
        self.levels.len() as i32
    }
}

impl Default for LevelCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_five_terminal_capped_ranks() {
        let catalog = LevelCatalog::standard();
        assert_eq!(catalog.max_rank(), 5);
        assert!(catalog.definition(5).unwrap().requirements.is_none());
        assert!(catalog.definition(4).unwrap().requirements.is_some());
        assert!(catalog.definition(0).is_none());
        assert!(catalog.definition(6).is_none());
    }

    #[test]
    fn commission_rates_strictly_increase() {
        let catalog = LevelCatalog::standard();
        let mut prev = 0;
        for rank in 1..=catalog.max_rank() {
            let rate = catalog.definition(rank).unwrap().commission_rate_bp;
            assert!(rate > prev);
            prev = rate;
        }
    }

    #[test]
    fn non_contiguous_ranks_rejected() {
        let mut levels = vec![
            LevelDefinition {
                rank: 1,
                name: "Bronze",
                commission_rate_bp: 500,
                min_total_sales: 0,
                min_team_size: 0,
                monthly_bonus: 0,
                requirements: Some(PromotionRequirements {
                    min_total_sales: 1,
                    min_team_size: 1,
                    min_active_days: 1,
                }),
            },
            LevelDefinition {
                rank: 3,
                name: "Gold",
                commission_rate_bp: 800,
                min_total_sales: 0,
                min_team_size: 0,
                monthly_bonus: 0,
                requirements: None,
            },
        ];
        assert!(LevelCatalog::new(levels.clone()).is_err());
        levels[1].rank = 2;
        assert!(LevelCatalog::new(levels).is_ok());
    }
}
