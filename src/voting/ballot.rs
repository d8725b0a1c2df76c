use crate::models::{Rank, Restaurant};
use thiserror::Error;

/// Every submission must use each of the three ranks exactly once.
pub const REQUIRED_SELECTIONS: usize = 3;

/// A validated (restaurant, rank) pair ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub restaurant_id: String,
    pub rank: Rank,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("a submission needs exactly {REQUIRED_SELECTIONS} ranked restaurants, found {0}")]
    WrongCount(usize),
    #[error("rank {0} is assigned to more than one restaurant")]
    DuplicateRank(Rank),
}

/// Collects the caller's current selections and checks that they form a
/// well-formed ballot before anything is sent to the store.
///
/// The rank pool already makes duplicate ranks impossible for callers that go
/// through it; the uniqueness check here guards restaurant sets assembled any
/// other way.
pub fn selections(restaurants: &[Restaurant]) -> Result<Vec<Selection>, SelectionError> {
    let picked: Vec<Selection> = restaurants
        .iter()
        .filter_map(|restaurant| {
            restaurant.vote.map(|rank| Selection {
                restaurant_id: restaurant.id.clone(),
                rank,
            })
        })
        .collect();

    if picked.len() != REQUIRED_SELECTIONS {
        return Err(SelectionError::WrongCount(picked.len()));
    }

    let mut seen = [false; REQUIRED_SELECTIONS];
    for selection in &picked {
        let index = selection.rank.weight() as usize - 1;
        if seen[index] {
            return Err(SelectionError::DuplicateRank(selection.rank));
        }
        seen[index] = true;
    }

    Ok(picked)
}
