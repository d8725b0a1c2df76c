pub mod ballot;
pub mod ranks;

pub use ballot::{selections, Selection, SelectionError, REQUIRED_SELECTIONS};
pub use ranks::RankPool;
