use crate::models::Rank;
use std::collections::VecDeque;

/// The caller's pool of currently-unassigned vote ranks.
///
/// Exactly three rank tokens circulate between this pool and the restaurant
/// list. A tap on a restaurant either consumes the front token, promotes the
/// restaurant to the next token, or releases its token back into the pool.
/// Released tokens re-enter at the back, which is what makes repeated taps on
/// one restaurant cycle low -> medium -> high instead of oscillating between
/// the two lowest ranks.
///
/// The pool is owned by the session and passed to each tap; there is no
/// shared or static state.
#[derive(Debug, Clone)]
pub struct RankPool {
    unused: VecDeque<Rank>,
}

impl Default for RankPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RankPool {
    /// A fresh pool holding all three ranks, lowest first.
    pub fn new() -> Self {
        Self {
            unused: Rank::ALL.into_iter().collect(),
        }
    }

    /// Cycles the rank held in `slot`:
    ///
    /// - unranked slot, ranks available: assign the front of the pool
    /// - ranked slot, ranks available: swap the held rank for the front of
    ///   the pool, returning the held one to the back
    /// - ranked slot, pool empty: clear the slot and release its rank
    /// - unranked slot, pool empty: no-op
    pub fn cycle(&mut self, slot: &mut Option<Rank>) {
        match slot.take() {
            Some(held) => {
                if let Some(next) = self.unused.pop_front() {
                    *slot = Some(next);
                }
                self.unused.push_back(held);
            }
            None => {
                *slot = self.unused.pop_front();
            }
        }
    }

    /// Number of ranks not currently assigned to any restaurant.
    pub fn remaining(&self) -> usize {
        self.unused.len()
    }
}
