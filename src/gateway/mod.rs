use crate::models::{Ballot, Rank, RestaurantRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("record store request failed: {0}")]
    Store(String),
    #[error("record store returned malformed data: {0}")]
    Malformed(String),
}

/// The narrow boundary to the remote record store.
///
/// The engine never talks to storage except through this trait. Saves return
/// `Ok(None)` when the store acknowledged the write but handed back no
/// record, which callers treat as a failure rather than a success.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SyncGateway: Send + Sync + 'static {
    /// Identity the store attributes the caller's own writes to.
    fn caller_id(&self) -> String;

    /// All restaurant records, unfiltered, in store order.
    async fn query_restaurants(&self) -> Result<Vec<RestaurantRecord>, GatewayError>;

    /// All ballot records created at or after the given instant.
    async fn query_ballots(
        &self,
        created_after: DateTime<Utc>,
    ) -> Result<Vec<Ballot>, GatewayError>;

    async fn save_restaurant(&self, name: &str)
        -> Result<Option<RestaurantRecord>, GatewayError>;

    async fn save_ballot(
        &self,
        restaurant_id: &str,
        priority: Rank,
    ) -> Result<Option<Ballot>, GatewayError>;

    /// Removes a ballot record. Best-effort; callers may ignore the result.
    async fn delete_ballot(&self, ballot_id: &str) -> Result<(), GatewayError>;
}
