pub mod matcher;
pub mod normalize;
pub mod similarity;
pub mod snapshot;

pub use matcher::{GroupSelectionStrategy, MatchResult, Router};
