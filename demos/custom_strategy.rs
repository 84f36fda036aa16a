//! Custom strategy example: plug a closure into the adaptive controller.
//!
//! Any `Fn(&Item, &Ability, &[ResponseRecord]) -> f64` is a selection
//! strategy. This one favours items whose difficulty is close to the current
//! θ and skips categories already asked twice. The session is driven by hand
//! with a simulated respondent.
//!
//! ```bash
//! cargo run --example custom_strategy -- 1.2
//! ```

use std::env;
use std::sync::Arc;

use adaptest_core::controller::AdaptiveController;
use adaptest_core::model::{Ability, Item, ResponseRecord};
use adaptest_core::parser;
use adaptest_core::selection::SelectionStrategy;
use adaptest_core::session::SessionOptions;
use adaptest_core::store::InMemoryAbilityStore;
use adaptest_respondents::SimulatedRespondent;

fn main() -> anyhow::Result<()> {
    let true_theta: f64 = match env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 0.5,
    };

    let bank = Arc::new(parser::parse_item_bank(
        "item-banks/emotional-state.toml".as_ref(),
    )?);
    let bank_for_strategy = Arc::clone(&bank);

    let strategy = move |item: &Item, ability: &Ability, history: &[ResponseRecord]| {
        let asked = history
            .iter()
            .filter(|r| {
                bank_for_strategy
                    .get(&r.item_id)
                    .is_some_and(|i| i.category == item.category)
            })
            .count();
        if asked >= 2 {
            return f64::NEG_INFINITY;
        }
        -(item.difficulty - ability.theta).abs()
    };
    println!("Strategy: {}", strategy.name());

    let store = Arc::new(InMemoryAbilityStore::new());
    let mut controller =
        AdaptiveController::new(Arc::clone(&bank), store).with_strategy(Arc::new(strategy));
    let respondent = SimulatedRespondent::new("demo", true_theta, 7);

    let options = SessionOptions {
        max_questions: 8,
        ..Default::default()
    };
    controller.start_session("demo-session", "demo", options)?;

    println!("\n{:<4} {:<8} {:<14} {:>8} {:>8} {:>8}", "#", "Item", "Category", "Answer", "θ", "SE");
    let mut n = 0;
    while let Some(item) = controller.select_next_question("demo-session") {
        let answer = respondent.answer(&item);
        let Some(ability) = controller.process_response(
            "demo-session",
            &item.id,
            answer.response,
            answer.time_spent_secs,
        )?
        else {
            break;
        };
        n += 1;
        println!(
            "{:<4} {:<8} {:<14} {:>8.1} {:>8.2} {:>8.2}",
            n, item.id, item.category, answer.response, ability.theta, ability.standard_error
        );
    }

    if let Some(done) = controller.complete_session("demo-session") {
        println!(
            "\nStopped: {} after {} items. True θ {:.2}, estimate {:.2}",
            done.stop_reason,
            done.responses.len(),
            true_theta,
            done.final_theta()
        );
    }

    Ok(())
}
