//! adaptest-report: rendering and export for psychometric reports.
//!
//! HTML output for [`adaptest_core::report::PsychometricReport`] and CSV
//! writers (with a JSON column sidecar) for the per-response export.

pub mod export;
pub mod html;
