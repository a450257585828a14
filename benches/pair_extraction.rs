//! Benchmarks for distance-matrix construction and greedy pair extraction.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};

use dcr_discovery::graph::Entity;
use dcr_discovery::oracle::TranslationalOracle;
use dcr_discovery::pairs::{DistanceMatrix, pairs_by_proportion, pairs_by_threshold};

const INSTANCES: usize = 200;
const DIM: usize = 32;

fn random_oracle() -> (TranslationalOracle, Vec<Entity>) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let mut builder = TranslationalOracle::builder();
    let mut instances = Vec::with_capacity(INSTANCES);
    for i in 0..INSTANCES {
        let name = format!("ex:i{i}");
        let vector: Vec<f64> = (0..DIM).map(|_| rng.gen_range(-1.0..1.0)).collect();
        builder = builder.entity(name.clone(), vector);
        instances.push(Entity::new(name));
    }
    (builder.build().unwrap(), instances)
}

fn bench_build_free(c: &mut Criterion) {
    let (oracle, instances) = random_oracle();

    c.bench_function("build_free_200", |bench| {
        bench.iter(|| black_box(DistanceMatrix::build_free(&oracle, &instances).unwrap()))
    });
}

fn bench_threshold(c: &mut Criterion) {
    let (oracle, instances) = random_oracle();
    let matrix = DistanceMatrix::build_free(&oracle, &instances).unwrap();

    c.bench_function("pairs_by_threshold_200", |bench| {
        bench.iter(|| black_box(pairs_by_threshold(&matrix, 2.5).unwrap()))
    });
}

fn bench_proportion(c: &mut Criterion) {
    let (oracle, instances) = random_oracle();
    let matrix = DistanceMatrix::build_free(&oracle, &instances).unwrap();

    c.bench_function("pairs_by_proportion_200", |bench| {
        bench.iter(|| black_box(pairs_by_proportion(&matrix, INSTANCES, 0.002).unwrap()))
    });
}

criterion_group!(benches, bench_build_free, bench_threshold, bench_proportion);
criterion_main!(benches);
