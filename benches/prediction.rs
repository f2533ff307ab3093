use cluster_subsets::{
    CacheConfig, ClusterSubsetState, ClusteringModel, Data, KMeans, ModelConfig, SubsetState,
};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array1;
use ndarray_rand::RandomExt;
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use ndarray_rand::rand_distr::Uniform;
use std::sync::Arc;

fn synthetic(n: usize) -> Data {
    let mut rng = StdRng::seed_from_u64(42);
    let mut data = Data::new("synthetic");
    for name in ["a", "b", "c", "d"] {
        let values = Array1::random_using(n, Uniform::new(0.0, 1.0), &mut rng);
        data.add_component(name, values.into_dyn()).unwrap();
    }
    data
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let data = Arc::new(synthetic(5000));
    let names = ["a", "b", "c", "d"];

    let cached = ClusteringModel::new(
        KMeans::new(8).max_iter(20).random_state(42),
        data.clone(),
        &names,
        ModelConfig::default(),
    )
    .unwrap();
    group.bench_function("predict_cached_n5000_k8", |b| {
        b.iter(|| cached.predict(black_box(&*data)).unwrap())
    });

    let uncached = ClusteringModel::new(
        KMeans::new(8).max_iter(20).random_state(42),
        data.clone(),
        &names,
        ModelConfig::default(),
    )
    .unwrap();
    group.bench_function("predict_uncached_n5000_k8", |b| {
        b.iter(|| {
            uncached.clear_cache();
            uncached.predict(black_box(&*data)).unwrap()
        })
    });

    let model = Arc::new(
        ClusteringModel::new(
            KMeans::new(8).max_iter(20).random_state(42),
            data.clone(),
            &names,
            ModelConfig::default().with_cache(CacheConfig::unbounded()),
        )
        .unwrap(),
    );
    group.bench_function("masks_all_clusters_n5000_k8", |b| {
        b.iter(|| {
            for k in 0..model.n_clusters() {
                let state = ClusterSubsetState::new(model.clone(), k).unwrap();
                black_box(state.to_mask(&*data, None).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_prediction);
criterion_main!(benches);
