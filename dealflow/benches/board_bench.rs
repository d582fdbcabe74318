//! Benchmarks for board derivations.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dealflow::board::{partition_by_stage, BoardSummary, DealQuery, SortKey};
use dealflow::core::{Deal, DealStage};
use dealflow::records::SortDirection;
use dealflow::testing::DealFixture;

fn deals(count: usize) -> Vec<Deal> {
    (0..count)
        .map(|i| {
            let id = i64::try_from(i).unwrap_or(i64::MAX);
            DealFixture::new(id + 1)
                .name(format!("Deal {i}"))
                .value((i % 97) as f64 * 1_250.0)
                .stage(DealStage::ALL[i % DealStage::COUNT])
                .build()
        })
        .collect()
}

fn board_benchmark(c: &mut Criterion) {
    let deals = deals(1_000);

    c.bench_function("partition_by_stage_1000", |b| {
        b.iter(|| black_box(partition_by_stage(black_box(&deals)).len()));
    });

    c.bench_function("board_summary_1000", |b| {
        b.iter(|| black_box(BoardSummary::from_deals(black_box(&deals))));
    });

    let query = DealQuery::new()
        .with_search("deal 1")
        .sorted_by(SortKey::Value, SortDirection::Desc);
    c.bench_function("query_sort_1000", |b| {
        b.iter(|| black_box(query.apply(black_box(&deals)).len()));
    });
}

criterion_group!(benches, board_benchmark);
criterion_main!(benches);
