//! The `adaptest list-items` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use adaptest_core::irt;
use adaptest_core::model::Category;

pub fn execute(bank_path: PathBuf, category: Option<String>) -> Result<()> {
    let bank = adaptest_core::parser::load_item_bank(&bank_path)?;
    let filter: Option<Category> = category
        .as_deref()
        .map(|c| c.parse().map_err(|e: String| anyhow::anyhow!(e)))
        .transpose()?;

    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "Category",
        "Difficulty",
        "Discrimination",
        "Guessing",
        "Scale",
        "Info @ b",
    ]);

    let mut shown = 0;
    for item in bank.iter() {
        if filter.is_some_and(|f| item.category != f) {
            continue;
        }
        shown += 1;
        table.add_row(vec![
            Cell::new(&item.id),
            Cell::new(item.category),
            Cell::new(format!("{:+.2}", item.difficulty)),
            Cell::new(format!("{:.2}", item.discrimination)),
            Cell::new(format!("{:.2}", item.guessing)),
            Cell::new(format!("{}..{}", item.scale.min, item.scale.max)),
            Cell::new(format!(
                "{:.3}",
                irt::fisher_information(item, item.difficulty)
            )),
        ]);
    }

    println!("Item bank: {} ({shown} of {} items)", bank.name(), bank.len());
    println!("{table}");

    Ok(())
}
