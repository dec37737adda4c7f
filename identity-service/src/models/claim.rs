//! Claim model - organization→domain ownership edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claim entity: the organization owns the domain. Read-only to this core;
/// ownership-based authorization checks look these up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub claim_id: Uuid,
    pub org_id: Uuid,
    pub domain_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl Claim {
    pub fn new(org_id: Uuid, domain_id: Uuid) -> Self {
        Self {
            claim_id: Uuid::new_v4(),
            org_id,
            domain_id,
            created_utc: Utc::now(),
        }
    }
}
