use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hmsvm::{simulate_two_state_model, HmsvmModel, SimulationParams, StructuredModel};

fn joint_feature_vectors(model: &HmsvmModel) -> f64 {
    let mut total = 0.0;
    for (i, y) in model.labels().iter().enumerate() {
        let psi = model.get_joint_feature_vector(i, y).expect("failed to build feature vector");
        total += psi[0];
    }
    total
}

fn feature_benchmark(c: &mut Criterion) {
    let (ds, labels) =
        simulate_two_state_model(&SimulationParams::default()).expect("failed to simulate data");
    let model = HmsvmModel::new(ds, labels).expect("failed to build model");
    c.bench_function("joint_feature_vector", |b| {
        b.iter(|| joint_feature_vectors(black_box(&model)))
    });
    c.bench_function("check_training_setup", |b| {
        b.iter(|| black_box(&model).check_training_setup().expect("invalid training data"))
    });
}

criterion_group!(benchmarks, feature_benchmark);
criterion_main!(benchmarks);
