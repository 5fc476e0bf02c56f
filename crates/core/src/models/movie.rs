//! Movie model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A film in the catalog
///
/// Never updated once a show references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    /// Running time in minutes
    pub duration_minutes: u32,
    /// Age rating code, e.g. "PG-13"
    pub rating: String,
}

impl Movie {
    pub fn new(title: String, duration_minutes: u32, rating: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            duration_minutes,
            rating,
        }
    }
}
