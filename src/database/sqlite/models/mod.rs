#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An ingested document as recorded in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub document_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub chunk_count: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub document_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub chunk_count: i64,
}

impl Document {
    /// Human readable age of the upload relative to `now`
    #[inline]
    pub fn age_description(&self, now: DateTime<Utc>) -> String {
        let elapsed = now.signed_duration_since(self.uploaded_at);
        if elapsed.num_days() > 0 {
            format!("{} days ago", elapsed.num_days())
        } else if elapsed.num_hours() > 0 {
            format!("{} hours ago", elapsed.num_hours())
        } else if elapsed.num_minutes() > 0 {
            format!("{} minutes ago", elapsed.num_minutes())
        } else {
            "just now".to_string()
        }
    }
}
