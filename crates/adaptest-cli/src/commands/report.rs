//! The `adaptest report` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::engine::SimulationReport;
use adaptest_core::parser;
use adaptest_core::report::{PsychometricReport, ReportOptions};
use adaptest_core::validation::ValidationOptions;
use adaptest_report::export::write_export;
use adaptest_report::html::write_html_report;
use adaptest_respondents::config::load_config_from;

pub fn execute(
    simulation_path: PathBuf,
    bank_path: PathBuf,
    output: Option<PathBuf>,
    format: String,
    cv_folds: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let cv_folds = cv_folds.unwrap_or(config.cv_folds);
    anyhow::ensure!(cv_folds >= 2, "cv-folds must be at least 2");

    let simulation = SimulationReport::load_json(&simulation_path)?;
    let bank = parser::load_item_bank(&bank_path)?;
    if simulation.bank.id != bank.id() {
        eprintln!(
            "Warning: simulation ran against bank '{}', reporting with '{}'",
            simulation.bank.id,
            bank.id()
        );
    }

    let options = ReportOptions {
        validation: ValidationOptions {
            cv_folds,
            seed: config.seed,
        },
        ..ReportOptions::default()
    };
    let report = PsychometricReport::generate(&simulation.sessions, &bank, &options);

    println!(
        "{} sessions: criteria {}",
        report.metrics.session_count,
        if report.criteria.passed {
            "PASSED"
        } else {
            "NOT MET"
        }
    );
    for rec in &report.criteria.recommendations {
        println!("  - {rec}");
    }

    let output = output.unwrap_or_else(|| config.output_dir.clone());
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
    let formats: Vec<&str> = if format == "all" {
        vec!["json", "markdown", "html", "csv"]
    } else {
        format.split(',').map(str::trim).collect()
    };

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Report saved to: {}", path.display());
            }
            "markdown" | "md" => {
                let path = output.join(format!("report-{timestamp}.md"));
                std::fs::create_dir_all(&output)?;
                std::fs::write(&path, report.to_markdown())?;
                eprintln!("Markdown report: {}", path.display());
            }
            "html" => {
                let path = output.join(format!("report-{timestamp}.html"));
                write_html_report(&report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            "csv" => {
                let paths = write_export(
                    &simulation.sessions,
                    &bank,
                    &output,
                    &format!("responses-{timestamp}"),
                )?;
                eprintln!(
                    "Response export: {} (columns: {})",
                    paths.data.display(),
                    paths.metadata.display()
                );
            }
            _ => {
                eprintln!("Unknown format: {fmt}");
            }
        }
    }

    Ok(())
}
