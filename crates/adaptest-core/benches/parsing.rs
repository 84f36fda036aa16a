use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptest_core::parser::{parse_item_bank_str, validate_item_bank};

fn bench_toml_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("toml_parsing");

    for n in [24, 200, 1000] {
        let toml = generate_bank_toml(n);
        group.bench_function(format!("{n}_items"), |b| {
            b.iter(|| parse_item_bank_str(black_box(&toml), black_box("bench.toml".as_ref())))
        });
    }

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let bank = parse_item_bank_str(&generate_bank_toml(1000), "bench.toml".as_ref())
        .expect("generated bank parses");
    c.bench_function("validate_1000_items", |b| {
        b.iter(|| validate_item_bank(black_box(&bank)))
    });
}

fn generate_bank_toml(n: usize) -> String {
    const CATEGORIES: [&str; 4] = ["valencia", "ativacao", "concentracao", "motivacao"];
    let mut s = String::new();
    s.push_str(
        r#"[item_bank]
id = "bench"
name = "Benchmark"
description = "Generated for benchmarking"
"#,
    );
    for i in 0..n {
        s.push_str(&format!(
            r#"
[[items]]
id = "item_{i}"
category = "{}"
difficulty = {:.3}
discrimination = {:.2}
guessing = 0.1

[items.content]
text = "Statement {i}"
"#,
            CATEGORIES[i % 4],
            -3.0 + 6.0 * i as f64 / n as f64,
            0.8 + (i % 5) as f64 * 0.3,
        ));
    }
    s
}

criterion_group!(benches, bench_toml_parsing, bench_validation);
criterion_main!(benches);
