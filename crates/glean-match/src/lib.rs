pub mod engine;

pub use engine::{CandidatePair, MatchingEngine, ScoredPair};
