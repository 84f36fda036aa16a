//! Quick simulation example: minimal programmatic usage of adaptest.
//!
//! Loads the bundled emotional-state bank, simulates a small population of
//! respondents and prints the resulting psychometric report.
//!
//! ```bash
//! cargo run --example quick_simulation
//! ```

use std::sync::Arc;

use adaptest_core::engine::{NoopReporter, SimulationConfig, SimulationEngine};
use adaptest_core::parser;
use adaptest_core::report::{PsychometricReport, ReportOptions};
use adaptest_core::traits::Respondent;
use adaptest_respondents::generate_population;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse an item bank from a TOML file
    let bank = parser::parse_item_bank("item-banks/emotional-state.toml".as_ref())?;
    println!("Loaded item bank: {} ({} items)", bank.name(), bank.len());
    let bank = Arc::new(bank);

    // Fifty respondents with θ ~ N(0, 1)
    let population: Vec<Arc<dyn Respondent>> = generate_population("demo", 50, 0.0, 1.0, 42)?
        .into_iter()
        .map(|r| Arc::new(r) as Arc<dyn Respondent>)
        .collect();

    let config = SimulationConfig {
        parallelism: 8,
        sessions_per_respondent: 2,
        ..Default::default()
    };
    let engine = SimulationEngine::new(Arc::clone(&bank), config);

    println!("\nRunning simulation...\n");
    let run = engine.run(&population, &NoopReporter).await?;

    println!("Simulation complete!");
    println!("  Sessions: {}", run.sessions.len());
    println!("  Mean questions: {:.1}", run.mean_questions());
    println!("  Duration: {}ms", run.duration_ms);
    if let Some(recovery) = run.recovery() {
        println!(
            "  θ recovery: bias {:+.3}, RMSE {:.3}",
            recovery.bias, recovery.rmse
        );
    }

    let report = PsychometricReport::generate(&run.sessions, &bank, &ReportOptions::default());
    println!("\n{}", report.to_markdown());

    report.save_json("quick_simulation_report.json".as_ref())?;
    println!("Report saved to quick_simulation_report.json");

    Ok(())
}
