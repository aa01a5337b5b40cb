use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fraudscope::anomaly::{AnomalyDetector, IsolationForest};
use fraudscope::inference::{DetectorConfig, TrainedDetector};
use fraudscope::visualization::Pca;
use ndarray::Array2;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_transactions(n_rows: usize, n_features: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let mut columns: Vec<Column> = vec![Column::new(
        "Time".into(),
        (0..n_rows).map(|i| i as f64).collect::<Vec<_>>(),
    )];
    for i in 0..n_features {
        let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
        columns.push(Column::new(format!("V{}", i + 1).into(), values));
    }
    let amount: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 500.0).collect();
    columns.push(Column::new("Amount".into(), amount));
    columns.push(Column::new("Class".into(), vec![0i64; n_rows]));

    DataFrame::new(columns).unwrap()
}

fn create_matrix(n_rows: usize, n_features: usize) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>())
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");
    group.sample_size(10);

    for n_rows in [1000, 10000].iter() {
        let df = create_transactions(*n_rows, 28);
        group.bench_with_input(BenchmarkId::new("detector", n_rows), &df, |b, df| {
            b.iter(|| TrainedDetector::train(black_box(df), DetectorConfig::default()).unwrap())
        });
    }

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");
    group.sample_size(10);

    let detector = TrainedDetector::train(&create_transactions(5000, 28), DetectorConfig::default()).unwrap();

    for n_rows in [1000, 10000].iter() {
        let df = create_transactions(*n_rows, 28);
        group.bench_with_input(BenchmarkId::new("upload", n_rows), &df, |b, df| {
            b.iter(|| detector.score(black_box(df)).unwrap())
        });
    }

    group.finish();
}

fn bench_components(c: &mut Criterion) {
    let x = create_matrix(5000, 30);

    c.bench_function("isolation_forest_fit_5000x30", |b| {
        b.iter(|| {
            let mut forest = IsolationForest::new().with_contamination(0.0017).with_seed(42);
            forest.fit(black_box(&x)).unwrap();
            forest
        })
    });

    c.bench_function("pca_5000x30", |b| {
        b.iter(|| Pca::default().fit_transform(black_box(&x)).unwrap())
    });
}

criterion_group!(benches, bench_training, bench_scoring, bench_components);
criterion_main!(benches);
