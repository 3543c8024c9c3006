//! Visit model and cache key layout

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Namespace of the per-day dedup entries
pub const VISIT_KEY_PREFIX: &str = "visit:log";
/// Namespace of the not-yet-flushed per-blog counters
pub const PENDING_KEY_PREFIX: &str = "visit:pending";

/// One request to a blog-scoped route, attributed to a visitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub blog_id: String,
    pub visitor_id: String,
}

/// Pending (unflushed) unique visits of a blog
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PendingVisits {
    pub blog_id: String,
    /// Unique visits counted since the last flush
    pub pending: i64,
}

/// `YYYY-MM-DD`
pub fn date_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// `visit:log:<blogId>:<visitorId>:<YYYY-MM-DD>`
pub fn visit_log_key(blog_id: &str, visitor_id: &str, day: NaiveDate) -> String {
    format!("{}:{}:{}:{}", VISIT_KEY_PREFIX, blog_id, visitor_id, date_key(day))
}

/// `visit:pending:<blogId>`
pub fn pending_key(blog_id: &str) -> String {
    format!("{}:{}", PENDING_KEY_PREFIX, blog_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_key_is_scoped_to_blog_visitor_and_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            visit_log_key("blog-42", "u1", day),
            "visit:log:blog-42:u1:2024-03-07"
        );
    }

    #[test]
    fn pending_key_has_no_date() {
        assert_eq!(pending_key("blog-42"), "visit:pending:blog-42");
    }
}
