//! adaptest-core: adaptive testing engine and psychometric validation.
//!
//! Items are scored with the three-parameter logistic IRT model. A session
//! controller picks the most informative unanswered item, re-estimates the
//! respondent's θ by maximum likelihood after every answer and stops once the
//! estimate is precise or stable enough. Completed sessions feed the
//! validation toolkit and the psychometric report.

pub mod bank;
pub mod controller;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod export;
pub mod irt;
pub mod model;
pub mod parser;
pub mod report;
pub mod selection;
pub mod session;
pub mod statistics;
pub mod stopping;
pub mod store;
pub mod traits;
pub mod validation;

pub use error::{AssessmentError, AssessmentResult};
