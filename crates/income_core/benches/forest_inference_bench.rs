use criterion::{black_box, criterion_group, criterion_main, Criterion};
use income_core::forest::{Forest, Node, Tree, SCALE};

fn sample_forest() -> Forest {
    // 50 identical depth-2 trees over age and hours-per-week.
    let tree = Tree::new(vec![
        Node::internal(0, 0, 35, 1, 4),
        Node::internal(1, 1, 40, 2, 3),
        Node::leaf(2, vec![SCALE * 9 / 10, SCALE / 10]),
        Node::leaf(3, vec![SCALE * 7 / 10, SCALE * 3 / 10]),
        Node::leaf(4, vec![SCALE / 2, SCALE / 2]),
    ]);

    Forest::new(
        vec!["<=50K".to_string(), ">50K".to_string()],
        vec!["age".to_string(), "hours-per-week".to_string()],
        vec![tree; 50],
    )
}

fn bench_forest_predict(c: &mut Criterion) {
    let forest = sample_forest();
    let features = vec![black_box(39), black_box(40)];

    c.bench_function("forest_predict", |b| {
        b.iter(|| {
            let score = forest.predict(black_box(&features));
            black_box(score);
        });
    });
}

criterion_group!(forest_benches, bench_forest_predict);
criterion_main!(forest_benches);
