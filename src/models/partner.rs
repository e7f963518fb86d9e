use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Category name that marks a partner as a teaching candidate.
pub const PROFESSOR_CATEGORY: &str = "Professor";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub is_instructor: bool,
    pub categories: BTreeSet<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PartnerRow {
    pub id: String,
    pub name: String,
    pub is_instructor: bool,
}

impl PartnerRow {
    pub fn into_partner(self, categories: BTreeSet<String>) -> Partner {
        Partner {
            id: self.id,
            name: self.name,
            is_instructor: self.is_instructor,
            categories,
        }
    }
}

impl Partner {
    /// Mirrors the instructor picker filter: flagged instructors, or partners
    /// with a category containing "professor" in any case.
    pub fn is_instructor_candidate(&self) -> bool {
        let needle = PROFESSOR_CATEGORY.to_lowercase();
        self.is_instructor
            || self
                .categories
                .iter()
                .any(|c| c.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartnerRequest {
    pub name: String,
    #[serde(default)]
    pub is_instructor: bool,
    #[serde(default)]
    pub categories: BTreeSet<String>,
}
