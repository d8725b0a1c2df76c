use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three vote ranks a user hands out each day.
///
/// Ordered by weight: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Low,
    Medium,
    High,
}

impl Rank {
    pub const ALL: [Rank; 3] = [Rank::Low, Rank::Medium, Rank::High];

    /// Weight added to a restaurant's score by a qualifying ballot.
    pub fn weight(self) -> i64 {
        match self {
            Rank::Low => 1,
            Rank::Medium => 2,
            Rank::High => 3,
        }
    }

    /// Wire string stored in a ballot record's `priority` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Rank::Low => "low",
            Rank::Medium => "medium",
            Rank::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Rank> {
        match s {
            "low" => Some(Rank::Low),
            "medium" => Some(Rank::Medium),
            "high" => Some(Rank::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A votable restaurant as held by the local session.
///
/// `vote` is the caller's pending selection and never leaves this client
/// until submission. `votes_count` is derived state: it is reset to zero and
/// recomputed from scratch on every reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub vote: Option<Rank>,
    pub votes_count: i64,
}

impl Restaurant {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            vote: None,
            votes_count: 0,
        }
    }
}

/// A restaurant record as returned by the store, before it becomes a
/// session-local [`Restaurant`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<RestaurantRecord> for Restaurant {
    fn from(record: RestaurantRecord) -> Self {
        Restaurant::new(record.id, record.name)
    }
}

/// One cast vote as stored remotely.
///
/// Ballots are immutable once cast. The store stamps both timestamps at
/// creation, so a `modified_at` that no longer matches `created_at` is
/// evidence of post-hoc tampering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ballot {
    pub id: String,
    pub author: String,
    #[serde(rename = "restaurant")]
    pub restaurant_id: String,
    pub priority: Rank,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Ballot {
    pub fn is_tampered(&self) -> bool {
        self.modified_at != self.created_at
    }
}
