pub mod cache;
pub mod engine;
pub mod ranking;

pub use engine::{SearchEngine, SearchOutcome, SearchPlan, SearchView};
