//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = if bank_path.is_dir() {
        adaptest_core::parser::load_bank_directory(&bank_path)?
    } else {
        vec![adaptest_core::parser::parse_item_bank(&bank_path)?]
    };
    anyhow::ensure!(!banks.is_empty(), "no item banks found in {}", bank_path.display());

    let mut total_warnings = 0;

    for bank in &banks {
        let counts = bank
            .category_counts()
            .iter()
            .map(|(category, n)| format!("{category} {n}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Item bank: {} ({} items: {counts})", bank.name(), bank.len());

        let warnings = adaptest_core::parser::validate_item_bank(bank);
        for w in &warnings {
            let prefix = w
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All item banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
