
use crate::gateway::{GatewayError, SyncGateway};
use crate::models::{Ballot, Rank, Restaurant};
use crate::voting::{self, RankPool, REQUIRED_SELECTIONS};
use chrono::{DateTime, Local, NaiveTime, Utc};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 120;

/// Single outcome code delivered to the caller per operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The store acknowledged a write but returned no record.
    EmptyRecord,
    /// At least one tampered ballot was found and purged during a refresh.
    TamperedVoteFound,
    /// The caller's local selections do not form a valid ballot.
    BallotCountInvalid,
    /// Store-level failure.
    GeneralError(String),
}

/// What one reconciliation pass found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// False once the caller's own qualifying ballots exist for the period.
    pub can_vote: bool,
    /// Ballots excluded and purged for post-creation modification.
    pub tampered: usize,
    /// Ballots excluded because their author did not cast exactly three.
    pub disqualified: usize,
    /// Ballots whose weight reached a restaurant's score.
    pub counted: usize,
}

impl ReconcileReport {
    pub fn outcome(&self) -> Outcome {
        if self.tampered > 0 {
            Outcome::TamperedVoteFound
        } else {
            Outcome::Success
        }
    }
}

/// Start of the current voting period: local midnight, judged entirely by
/// this client's clock. Clients in different timezones window their queries
/// differently; the domain accepts that.
pub fn current_period_start() -> DateTime<Utc> {
    let midnight = Local::now().date_naive().and_time(NaiveTime::MIN);
    midnight
        .and_local_timezone(Local)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        // Midnight fell into a DST gap; read the naive instant as UTC.
        .unwrap_or_else(|| DateTime::from_naive_utc_and_offset(midnight, Utc))
}

/// Reconciliation engine over a remote record store.
///
/// Owns the session's restaurant list and derives every aggregate from
/// scratch on each pass. The store is multi-writer and only eventually
/// consistent, so all voting rules are enforced here at read time: an
/// author's ballots count only when exactly three of them exist in the
/// period, and a ballot whose modification time differs from its creation
/// time is dropped and purged.
///
/// A refresh replaces the restaurant list wholesale, discarding any pending
/// selections; sessions should start a fresh [`RankPool`] after each one.
pub struct Synchronizer<G: SyncGateway> {
    gateway: Arc<G>,
    restaurants: Vec<Restaurant>,
}

impl<G: SyncGateway> Synchronizer<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            restaurants: Vec::new(),
        }
    }

    pub fn restaurants(&self) -> &[Restaurant] {
        &self.restaurants
    }

    /// Applies one tap on the restaurant at `index`, drawing from the
    /// session's rank pool. Returns the restaurant's new selection.
    pub fn cycle_vote(&mut self, pool: &mut RankPool, index: usize) -> Option<Rank> {
        let restaurant = self.restaurants.get_mut(index)?;
        pool.cycle(&mut restaurant.vote);
        restaurant.vote
    }

    /// Replaces the local restaurant list with the store's current contents,
    /// scores zeroed, sorted ascending by case-insensitive name. The stable
    /// sort keeps store order for names that differ only by case.
    pub async fn fetch_restaurants(&mut self) -> Result<(), GatewayError> {
        let records = self.gateway.query_restaurants().await?;
        let mut restaurants: Vec<Restaurant> =
            records.into_iter().map(Restaurant::from).collect();
        restaurants.sort_by_key(|restaurant| restaurant.name.to_lowercase());

        info!("Fetched {} restaurants", restaurants.len());
        self.restaurants = restaurants;
        Ok(())
    }

    /// Validates and aggregates every ballot cast since `period_start` into
    /// the restaurant scores.
    pub async fn reconcile(
        &mut self,
        period_start: DateTime<Utc>,
    ) -> Result<ReconcileReport, GatewayError> {
        let ballots = self.gateway.query_ballots(period_start).await?;

        // Per-author totals over the whole batch, tampered records included:
        // a tampered record still counts against its author's daily three.
        let mut per_author: HashMap<&str, usize> = HashMap::new();
        for ballot in &ballots {
            *per_author.entry(ballot.author.as_str()).or_insert(0) += 1;
        }

        for restaurant in &mut self.restaurants {
            restaurant.votes_count = 0;
        }

        let caller = self.gateway.caller_id();
        let mut already_voted = false;
        let mut tampered = 0;
        let mut disqualified = 0;
        let mut counted = 0;

        for ballot in &ballots {
            if ballot.is_tampered() {
                tampered += 1;
                self.purge_tampered(ballot);
                continue;
            }

            let author_total = per_author.get(ballot.author.as_str()).copied().unwrap_or(0);
            if author_total != REQUIRED_SELECTIONS {
                disqualified += 1;
                continue;
            }

            if ballot.author == caller {
                already_voted = true;
            }

            // A dangling reference (restaurant deleted since the ballot was
            // cast) is dropped without failing the pass.
            if let Some(restaurant) = self
                .restaurants
                .iter_mut()
                .find(|restaurant| restaurant.id == ballot.restaurant_id)
            {
                restaurant.votes_count += ballot.priority.weight();
                counted += 1;
            }
        }

        if disqualified > 0 {
            warn!(
                "Excluded {} ballots from authors without exactly {} votes today",
                disqualified, REQUIRED_SELECTIONS
            );
        }
        info!(
            "Reconciled {} ballots: {} counted, {} disqualified, {} tampered",
            ballots.len(),
            counted,
            disqualified,
            tampered
        );

        Ok(ReconcileReport {
            can_vote: !already_voted,
            tampered,
            disqualified,
            counted,
        })
    }

    /// Full refresh: restaurants first, then the ballots of the current
    /// period. The restaurant list must be resolved before ballots can be
    /// mapped onto it.
    pub async fn refresh(&mut self) -> Result<ReconcileReport, GatewayError> {
        self.fetch_restaurants().await?;
        self.reconcile(current_period_start()).await
    }

    /// Submits the caller's current selections, one ballot record per
    /// selected restaurant.
    ///
    /// Saves are issued sequentially and stop at the first non-success, so a
    /// concurrent reader may observe a partial submission; the read-time
    /// count rule disqualifies such partial sets until completed. After any
    /// outcome, callers should [`refresh`](Self::refresh) to re-sync.
    pub async fn submit_votes(&self) -> Outcome {
        let selections = match voting::selections(&self.restaurants) {
            Ok(selections) => selections,
            Err(e) => {
                info!("Rejecting ballot submission: {}", e);
                return Outcome::BallotCountInvalid;
            }
        };

        for selection in &selections {
            match self
                .gateway
                .save_ballot(&selection.restaurant_id, selection.rank)
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    error!(
                        "Store returned no record for ballot on restaurant {}",
                        selection.restaurant_id
                    );
                    return Outcome::EmptyRecord;
                }
                Err(e) => {
                    error!(
                        "Failed to save ballot on restaurant {}: {}",
                        selection.restaurant_id, e
                    );
                    return Outcome::GeneralError(e.to_string());
                }
            }
        }

        info!("Submitted {} ballots", selections.len());
        Outcome::Success
    }

    /// Creates one new restaurant record with the given display name.
    pub async fn submit_restaurant(&self, name: &str) -> Outcome {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Outcome::GeneralError(format!(
                "restaurant name must be 1-{} characters",
                MAX_NAME_LEN
            ));
        }

        match self.gateway.save_restaurant(name).await {
            Ok(Some(record)) => {
                info!("Added restaurant {} ({})", record.name, record.id);
                Outcome::Success
            }
            Ok(None) => {
                error!("Store returned no record for restaurant {}", name);
                Outcome::EmptyRecord
            }
            Err(e) => {
                error!("Failed to save restaurant {}: {}", name, e);
                Outcome::GeneralError(e.to_string())
            }
        }
    }

    fn purge_tampered(&self, ballot: &Ballot) {
        warn!(
            "Purging tampered ballot {}: {}",
            ballot.id,
            serde_json::to_string(ballot).unwrap_or_default()
        );

        // Detached best-effort delete; reconciliation never waits on it and
        // the caller never sees the result.
        let gateway = Arc::clone(&self.gateway);
        let ballot_id = ballot.id.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.delete_ballot(&ballot_id).await {
                warn!("Failed to purge tampered ballot {}: {}", ballot_id, e);
            }
        });
    }
}
