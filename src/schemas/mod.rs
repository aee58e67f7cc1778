//! Typed document schemas.
//!
//! Every record crossing the store boundary is validated through these
//! structs; the engine never works on loosely-typed maps.

mod agent;
mod commission;
mod sale;
mod upgrade;

pub use agent::{AgentDoc, AgentStatus, AGENT_COLLECTION, OWNER_COLLECTION};
pub use commission::{CommissionKind, CommissionRecordDoc, COMMISSION_COLLECTION};
pub use sale::{SaleDoc, SALE_COLLECTION};
pub use upgrade::{UpgradeRecordDoc, UPGRADE_COLLECTION};
