use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use formula_frame::{parse, Frame, MemFrame};
use std::time::Duration;

fn bench_rows() -> usize {
    std::env::var("FORMULA_FRAME_BENCH_ROWS")
        .ok()
        .and_then(|v| v.replace('_', "").parse::<usize>().ok())
        .filter(|&v| (1_000..=10_000_000).contains(&v))
        .unwrap_or(100_000)
}

fn build_frame(rows: usize) -> MemFrame {
    let regions = ["north", "south", "east", "west"];
    let mut frame = MemFrame::new();
    frame
        .add_column("id", (0..rows as i64).collect::<Vec<_>>())
        .unwrap();
    frame
        .add_column(
            "region",
            (0..rows)
                .map(|row| regions[row % regions.len()].to_string())
                .collect::<Vec<_>>(),
        )
        .unwrap();
    frame
        .add_column(
            "amount",
            (0..rows).map(|row| (row % 997) as f64 * 1.25).collect::<Vec<_>>(),
        )
        .unwrap();
    frame
}

fn bench_parse(c: &mut Criterion) {
    let formulas = [
        "profit := amount * 0.2 - 3",
        "if(amount > 100 && region == 'east', amount ^ 2, -amount)",
        "by(region, total := sum(amount), share := sum(amount) / global(sum(amount)))",
    ];
    c.bench_function("parse", |b| {
        b.iter(|| {
            for formula in formulas {
                black_box(parse(black_box(formula)).unwrap());
            }
        })
    });
}

fn bench_memory_eval(c: &mut Criterion) {
    let rows = bench_rows();
    let frame = build_frame(rows);

    let mut group = c.benchmark_group("memory_eval");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(rows as u64));

    for (label, formula) in [
        ("row_wise", "amount * 2 + id"),
        ("conditional", "if(amount > 500, amount, 0.0)"),
        ("aggregate", "amount - mean(amount)"),
        ("by", "by(region, total := sum(amount), n := count(id))"),
        ("sort", "sort('desc', region, amount)"),
    ] {
        group.bench_with_input(BenchmarkId::new(label, rows), &rows, |b, _| {
            b.iter(|| black_box(frame.evaluate(formula).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_memory_eval);
criterion_main!(benches);
