//! adaptest-respondents: respondents for adaptive simulations.
//!
//! Implements the `Respondent` trait with simulated respondents that answer
//! from a true θ under the 3PL model, and scripted mock respondents for tests
//! and fixed-answer baselines.

pub mod config;
pub mod error;
pub mod mock;
pub mod simulated;

pub use config::{create_population, load_config, AdaptestConfig, RespondentConfig};
pub use error::RespondentError;
pub use mock::MockRespondent;
pub use simulated::{generate_population, SimulatedRespondent};
