//! Shared-list lunch voting over an eventually-consistent record store.
//!
//! A small group of clients reads and writes one multi-writer record set with
//! no central server. Each user hands out three ranked votes per day, one
//! ballot record per vote; every voting rule is enforced at read time by the
//! reconciliation engine in [`sync`], since the store offers no transactions
//! or locks.

pub mod db;
pub mod gateway;
pub mod models;
pub mod sync;
pub mod voting;

pub use gateway::{GatewayError, SyncGateway};
pub use models::{Ballot, Rank, Restaurant, RestaurantRecord};
pub use sync::{current_period_start, Outcome, ReconcileReport, Synchronizer};
pub use voting::{RankPool, Selection, SelectionError};
