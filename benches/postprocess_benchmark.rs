use criterion::{black_box, criterion_group, criterion_main, Criterion};
use emotion_api::classifier::utils::{rank_emotions, sigmoid_all};
use emotion_api::LabelTable;

fn sample_logits() -> Vec<f32> {
    (0..28).map(|i| ((i * 37) % 11) as f32 - 5.0).collect()
}

fn bench_sigmoid(c: &mut Criterion) {
    let logits = sample_logits();
    let mut group = c.benchmark_group("Sigmoid");
    group.sample_size(100);

    group.bench_function("goemotions_28", |b| b.iter(|| sigmoid_all(black_box(&logits))));

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let labels = LabelTable::goemotions();
    let probs = sigmoid_all(&sample_logits());
    let mut group = c.benchmark_group("Ranking");
    group.sample_size(100);

    for threshold in [0.0_f32, 0.05, 0.5] {
        group.bench_function(format!("threshold_{threshold}"), |b| {
            b.iter(|| rank_emotions(black_box(&probs), &labels, black_box(threshold)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sigmoid, bench_ranking);
criterion_main!(benches);
