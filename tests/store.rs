//! Integration tests running the engine against a real SQLite-backed store.

use chrono::{Duration, Utc};
use lunchvote::db::{SqliteStore, StoreConfig};
use lunchvote::{Outcome, Rank, RankPool, SyncGateway, Synchronizer};
use std::sync::Arc;
use uuid::Uuid;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn temp_config(user_id: &str) -> StoreConfig {
    let path = std::env::temp_dir().join(format!("lunchvote-test-{}.db", Uuid::new_v4()));
    StoreConfig {
        database_url: format!("sqlite:{}", path.display()),
        user_id: user_id.to_string(),
    }
}

/// Another client of the same database under a different identity.
async fn connect_as(config: &StoreConfig, user_id: &str) -> SqliteStore {
    SqliteStore::connect(&StoreConfig {
        database_url: config.database_url.clone(),
        user_id: user_id.to_string(),
    })
    .await
    .unwrap()
}

async fn cast_full_ballot(store: &SqliteStore, restaurant_ids: [&str; 3]) {
    for (restaurant_id, rank) in restaurant_ids.into_iter().zip(Rank::ALL) {
        store
            .save_ballot(restaurant_id, rank)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn saved_records_come_back_stamped() {
    init_logging();
    let store = connect_as(&temp_config("alice"), "alice").await;

    let record = store.save_restaurant("Taco Cart").await.unwrap().unwrap();
    assert_eq!(record.name, "Taco Cart");
    assert!(!record.id.is_empty());

    let ballot = store
        .save_ballot(&record.id, Rank::High)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ballot.author, "alice");
    assert_eq!(ballot.restaurant_id, record.id);
    assert_eq!(ballot.priority, Rank::High);
    assert_eq!(ballot.created_at, ballot.modified_at);
    assert!(!ballot.is_tampered());
}

#[tokio::test]
async fn ballot_query_windows_on_creation_time() {
    init_logging();
    let store = connect_as(&temp_config("alice"), "alice").await;
    let record = store.save_restaurant("Taco Cart").await.unwrap().unwrap();

    let ballot = store
        .save_ballot(&record.id, Rank::Low)
        .await
        .unwrap()
        .unwrap();

    // Age the ballot past the window boundary without marking it modified.
    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();
    sqlx::query("UPDATE votes SET created_at = ?, modified_at = ? WHERE id = ?")
        .bind(&yesterday)
        .bind(&yesterday)
        .bind(&ballot.id)
        .execute(store.pool())
        .await
        .unwrap();

    let window = Utc::now() - Duration::hours(1);
    assert!(store.query_ballots(window).await.unwrap().is_empty());

    let wide_window = Utc::now() - Duration::days(2);
    assert_eq!(store.query_ballots(wide_window).await.unwrap().len(), 1);
}

#[tokio::test]
async fn multi_user_reconciliation_end_to_end() {
    init_logging();
    let config = temp_config("alice");
    let alice = connect_as(&config, "alice").await;

    let a = alice.save_restaurant("arepa corner").await.unwrap().unwrap();
    let b = alice.save_restaurant("Burger Shack").await.unwrap().unwrap();
    let c = alice.save_restaurant("canteen").await.unwrap().unwrap();

    let bob = connect_as(&config, "bob").await;
    let mallory = connect_as(&config, "mallory").await;

    // Two complete ballots and one over-vote.
    cast_full_ballot(&alice, [&a.id, &b.id, &c.id]).await;
    cast_full_ballot(&bob, [&c.id, &b.id, &a.id]).await;
    cast_full_ballot(&mallory, [&a.id, &a.id, &a.id]).await;
    mallory.save_ballot(&a.id, Rank::High).await.unwrap().unwrap();

    let mut engine = Synchronizer::new(Arc::new(connect_as(&config, "carol").await));
    let report = engine.refresh().await.unwrap();

    assert!(report.can_vote);
    assert_eq!(report.counted, 6);
    assert_eq!(report.disqualified, 4);
    assert_eq!(report.tampered, 0);

    // Sorted case-insensitively; alice gave a/b/c 1/2/3 and bob the reverse.
    let names: Vec<&str> = engine
        .restaurants()
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["arepa corner", "Burger Shack", "canteen"]);
    let scores: Vec<i64> = engine
        .restaurants()
        .iter()
        .map(|r| r.votes_count)
        .collect();
    assert_eq!(scores, vec![4, 4, 4]);
}

#[tokio::test]
async fn own_qualifying_ballots_block_a_second_submission() {
    init_logging();
    let store = connect_as(&temp_config("alice"), "alice").await;
    for name in ["a", "b", "c"] {
        store.save_restaurant(name).await.unwrap().unwrap();
    }

    let mut engine = Synchronizer::new(Arc::new(store));
    assert!(engine.refresh().await.unwrap().can_vote);

    let mut pool = RankPool::new();
    for index in 0..3 {
        engine.cycle_vote(&mut pool, index);
    }
    assert_eq!(engine.submit_votes().await, Outcome::Success);

    let report = engine.refresh().await.unwrap();
    assert!(!report.can_vote);
    assert_eq!(report.counted, 3);

    let total: i64 = engine.restaurants().iter().map(|r| r.votes_count).sum();
    assert_eq!(total, 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn forged_tamper_row_is_excluded_and_deleted() {
    init_logging();
    let config = temp_config("alice");
    let alice = connect_as(&config, "alice").await;
    let a = alice.save_restaurant("a").await.unwrap().unwrap();
    let b = alice.save_restaurant("b").await.unwrap().unwrap();
    let c = alice.save_restaurant("c").await.unwrap().unwrap();

    cast_full_ballot(&alice, [&a.id, &b.id, &c.id]).await;

    // Retroactively promote alice's low vote, as a misbehaving client would.
    let edited = (Utc::now() + Duration::seconds(5)).to_rfc3339();
    sqlx::query("UPDATE votes SET priority = 'high', modified_at = ? WHERE priority = 'low'")
        .bind(&edited)
        .execute(alice.pool())
        .await
        .unwrap();

    let mut engine = Synchronizer::new(Arc::new(connect_as(&config, "carol").await));
    let report = engine.refresh().await.unwrap();

    assert_eq!(report.tampered, 1);
    assert_eq!(report.counted, 2);
    assert_eq!(report.outcome(), Outcome::TamperedVoteFound);

    // alice still holds three records in the batch, so her clean votes count.
    let scores: Vec<i64> = engine
        .restaurants()
        .iter()
        .map(|r| r.votes_count)
        .collect();
    assert_eq!(scores, vec![0, 2, 3]);

    // The detached purge task deletes the forged row from the store itself.
    let mut remaining = 3i64;
    for _ in 0..100 {
        remaining = sqlx::query_scalar("SELECT COUNT(*) FROM votes")
            .fetch_one(alice.pool())
            .await
            .unwrap();
        if remaining == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(remaining, 2);
}

#[tokio::test]
async fn deleted_restaurant_leaves_ballots_dangling_but_harmless() {
    init_logging();
    let config = temp_config("alice");
    let alice = connect_as(&config, "alice").await;
    let a = alice.save_restaurant("a").await.unwrap().unwrap();
    let b = alice.save_restaurant("b").await.unwrap().unwrap();
    let c = alice.save_restaurant("c").await.unwrap().unwrap();

    cast_full_ballot(&alice, [&a.id, &b.id, &c.id]).await;

    sqlx::query("DELETE FROM restaurants WHERE id = ?")
        .bind(&c.id)
        .execute(alice.pool())
        .await
        .unwrap();

    let mut engine = Synchronizer::new(Arc::new(connect_as(&config, "carol").await));
    let report = engine.refresh().await.unwrap();

    // The dangling high vote is dropped; the rest still aggregate.
    assert_eq!(report.counted, 2);
    assert_eq!(engine.restaurants().len(), 2);
    let scores: Vec<i64> = engine
        .restaurants()
        .iter()
        .map(|r| r.votes_count)
        .collect();
    assert_eq!(scores, vec![1, 2]);
}
