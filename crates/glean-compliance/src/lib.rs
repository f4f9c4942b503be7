pub mod engine;

pub use engine::{
    ComplianceEngine, ComplianceEvaluation, ComplianceInput, RULESET_VERSION,
};
