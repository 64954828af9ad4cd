use criterion::{Criterion, black_box, criterion_group, criterion_main};
use device_sidecar::capture::tail_lines;

fn server_log(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("[HTTP] --> POST /session/5f1c2e/element {{\"using\":\"id\",\"value\":\"row-{}\"}}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn benchmark_tail(c: &mut Criterion) {
    let small = server_log(400);
    let large = server_log(200_000);

    c.bench_function("tail_500_of_400", |b| {
        b.iter(|| tail_lines(black_box(&small), 500))
    });

    c.bench_function("tail_500_of_200k", |b| {
        b.iter(|| tail_lines(black_box(&large), 500))
    });
}

criterion_group!(benches, benchmark_tail);
criterion_main!(benches);
