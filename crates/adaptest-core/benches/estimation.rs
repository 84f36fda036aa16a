use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptest_core::bank::ItemBank;
use adaptest_core::estimator::estimate_ability_mle;
use adaptest_core::irt::fisher_information;
use adaptest_core::model::{Ability, Category, Item, ResponseRecord, ResponseScale};
use adaptest_core::selection::{select_next_item, MaxInformation};
use adaptest_core::statistics::cronbach_alpha;
use chrono::Utc;

fn make_bank(n: usize) -> ItemBank {
    let items = (0..n).map(|i| {
        Item::new(
            format!("q{i}"),
            Category::ALL[i % 4],
            -3.0 + 6.0 * i as f64 / n as f64,
            0.8 + (i % 5) as f64 * 0.2,
            0.05 * (i % 3) as f64,
            ResponseScale::likert5(),
        )
        .expect("valid item")
    });
    ItemBank::from_items("bench", "Benchmark", items).expect("valid bank")
}

fn make_history(bank: &ItemBank, n: usize) -> Vec<ResponseRecord> {
    let now = Utc::now();
    bank.iter()
        .step_by((bank.len() / n).max(1))
        .take(n)
        .enumerate()
        .map(|(i, item)| {
            let response = if i % 3 == 0 { 2.0 } else { 4.0 };
            ResponseRecord::new(item, response, 3.0, now)
        })
        .collect()
}

fn bench_information(c: &mut Criterion) {
    let bank = make_bank(1);
    let item = &bank.items()[0];
    c.bench_function("fisher_information", |b| {
        b.iter(|| fisher_information(black_box(item), black_box(0.3)))
    });
}

fn bench_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_ability_mle");
    let bank = make_bank(200);

    for n in [5, 15, 50] {
        let history = make_history(&bank, n);
        group.bench_function(format!("{n}_responses"), |b| {
            b.iter(|| estimate_ability_mle(black_box(&history), black_box(&bank)))
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_next_item");

    for size in [50, 500] {
        let bank = make_bank(size);
        let history = make_history(&bank, 10);
        let ability = Ability::new("bench", 0.4, 0.5, history.clone());
        group.bench_function(format!("{size}_items"), |b| {
            b.iter(|| {
                select_next_item(
                    black_box(&bank),
                    black_box(&ability),
                    black_box(&history),
                    &MaxInformation,
                )
            })
        });
    }

    group.finish();
}

fn bench_alpha(c: &mut Criterion) {
    let matrix: Vec<Vec<f64>> = (0..10)
        .map(|i| (0..500).map(|j| ((i * 7 + j * 13) % 5 + 1) as f64).collect())
        .collect();
    c.bench_function("cronbach_alpha_10x500", |b| {
        b.iter(|| cronbach_alpha(black_box(&matrix)))
    });
}

criterion_group!(
    benches,
    bench_information,
    bench_estimation,
    bench_selection,
    bench_alpha
);
criterion_main!(benches);
