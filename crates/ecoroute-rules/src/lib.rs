//! Rule engine for EcoRoute offload decisions.
//!
//! ## Features
//!
//! - **Rule bundles**: ordered, conjunctive rules over the six-feature schema
//! - **Evaluator**: first-match scan producing a decision and confidence
//! - **Compiler**: trains a depth-bounded decision tree on recorded telemetry
//!   and flattens it into a bundle
//!
//! ## Example
//!
//! ```rust,no_run
//! use ecoroute_core::{Decision, FeatureVector, RawTelemetryRow};
//! use ecoroute_rules::{RuleCompiler, evaluate};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rows: Vec<RawTelemetryRow> = Vec::new();
//!     let bundle = RuleCompiler::default().train(&rows)?;
//!     let decision = evaluate(&bundle, &FeatureVector::default()).decision_or(Decision::Cloud);
//!     println!("{}", decision);
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod tree;

pub use bundle::{BUNDLE_FORMAT, Condition, Operator, Rule, RuleBundle, TrainingReport};
pub use compiler::{CleanedDataset, RuleCompiler};
pub use error::{Result, RuleError};
pub use evaluator::{Evaluation, evaluate, matching_rules};
pub use tree::{DecisionTree, Sample, TreeParams};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
