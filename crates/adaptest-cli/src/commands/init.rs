//! The `adaptest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create adaptest.toml
    if std::path::Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    // Create example item bank
    std::fs::create_dir_all("item-banks")?;
    let example_path = std::path::Path::new("item-banks/example.toml");
    if example_path.exists() {
        println!("item-banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created item-banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit adaptest.toml to describe your respondent population");
    println!("  2. Run: adaptest validate --bank item-banks/example.toml");
    println!("  3. Run: adaptest simulate --bank item-banks/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

parallelism = 4
output_dir = "./adaptest-results"
seed = 42
cv_folds = 5
sessions_per_respondent = 1

[session]
target_precision = 0.3
max_questions = 15

[respondents.cohort]
type = "simulated"
count = 100
mean = 0.0
std_dev = 1.0

[respondents.neutral]
type = "fixed"
response = 3.0
"#;

const EXAMPLE_BANK: &str = r#"[item_bank]
id = "example"
name = "Example Emotional State Bank"
description = "A small starter bank covering the four emotional-state dimensions"
default_scale_min = 1.0
default_scale_max = 5.0

[[items]]
id = "val-1"
category = "valencia"
difficulty = -1.5
discrimination = 1.2

[[items]]
id = "val-2"
category = "valencia"
difficulty = -0.5
discrimination = 1.4

[[items]]
id = "val-3"
category = "valencia"
difficulty = 0.5
discrimination = 1.1

[[items]]
id = "val-4"
category = "valencia"
difficulty = 1.5
discrimination = 0.9

[[items]]
id = "ati-1"
category = "ativacao"
difficulty = -1.2
discrimination = 1.0

[[items]]
id = "ati-2"
category = "ativacao"
difficulty = -0.2
discrimination = 1.3

[[items]]
id = "ati-3"
category = "ativacao"
difficulty = 0.8
discrimination = 1.2

[[items]]
id = "ati-4"
category = "ativacao"
difficulty = 1.8
discrimination = 0.8

[[items]]
id = "con-1"
category = "concentracao"
difficulty = -1.0
discrimination = 1.1

[[items]]
id = "con-2"
category = "concentracao"
difficulty = 0.0
discrimination = 1.5

[[items]]
id = "con-3"
category = "concentracao"
difficulty = 1.0
discrimination = 1.2

[[items]]
id = "con-4"
category = "concentracao"
difficulty = 2.0
discrimination = 0.9

[[items]]
id = "mot-1"
category = "motivacao"
difficulty = -1.8
discrimination = 0.9

[[items]]
id = "mot-2"
category = "motivacao"
difficulty = -0.8
discrimination = 1.3

[[items]]
id = "mot-3"
category = "motivacao"
difficulty = 0.2
discrimination = 1.4

[[items]]
id = "mot-4"
category = "motivacao"
difficulty = 1.2
discrimination = 1.0
"#;
