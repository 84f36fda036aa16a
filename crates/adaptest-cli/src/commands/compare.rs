//! The `adaptest compare` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::report::PsychometricReport;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(
        threshold.is_finite() && threshold >= 0.0,
        "threshold must be a non-negative number"
    );
    let baseline = PsychometricReport::load_json(&baseline_path)?;
    let current = PsychometricReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            // text format
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );

            if !report.regressions.is_empty() {
                println!("\nRegressions:");
                for r in &report.regressions {
                    println!(
                        "  {} {:.3} -> {:.3} ({:+.3})",
                        r.metric, r.baseline, r.current, r.delta
                    );
                }
            }

            if !report.improvements.is_empty() {
                println!("\nImprovements:");
                for i in &report.improvements {
                    println!(
                        "  {} {:.3} -> {:.3} ({:+.3})",
                        i.metric, i.baseline, i.current, i.delta
                    );
                }
            }

            if let Some(t) = &report.theta_shift {
                println!(
                    "\nFinal θ shift: t = {:.3}, p ≈ {:.3}, {} effect{}",
                    t.statistic,
                    t.p_value,
                    t.effect_size,
                    if t.significant { " (significant)" } else { "" }
                );
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
