//! Fetch key definitions.
//!
//! A fetch key names a logical query ("all games in cohort X") whose
//! satisfied-at-least-once status is tracked independently of the entities it
//! returned. A query that came back empty is still marked, so "no results" is
//! not re-fetched on every load.

use std::fmt;

/// Cohort label used when a view spans every cohort.
pub const ALL_COHORTS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchKey(String);

impl FetchKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn all_users() -> Self {
        Self::new("users:all")
    }

    pub fn user(username: &str) -> Self {
        Self(format!("user:{username}"))
    }

    /// `cohort ?? 'all'`: an absent cohort selects the whole scoreboard.
    pub fn scoreboard(cohort: Option<&str>) -> Self {
        Self(format!("scoreboard:{}", cohort.unwrap_or(ALL_COHORTS)))
    }

    pub fn games(cohort: &str) -> Self {
        Self(format!("games:{cohort}"))
    }

    pub fn all_clubs() -> Self {
        Self::new("clubs:all")
    }

    pub fn club(id: &str) -> Self {
        Self(format!("club:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FetchKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoreboard_without_cohort_uses_all() {
        assert_eq!(FetchKey::scoreboard(None).as_str(), "scoreboard:all");
        assert_eq!(
            FetchKey::scoreboard(Some("1500-1600")).as_str(),
            "scoreboard:1500-1600"
        );
    }

    #[test]
    fn keys_for_distinct_queries_differ() {
        assert_ne!(FetchKey::club("users"), FetchKey::all_users());
        assert_ne!(FetchKey::games("1500-1600"), FetchKey::scoreboard(Some("1500-1600")));
        assert_eq!(FetchKey::user("bob"), FetchKey::from("user:bob"));
    }
}
