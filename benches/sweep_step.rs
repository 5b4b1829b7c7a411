//! Benchmarks for the per-tick interaction step.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use dissemination::{
    model::{ActiveLinkCache, InteractionRule, Population, Topology},
    schema::{RuleConfig, SetParams, TreeParams, VectorParams},
};

fn setup(rule: &RuleConfig, popsize: usize) -> (InteractionRule, Population, ActiveLinkCache, StdRng) {
    let mut rng = StdRng::seed_from_u64(7);
    let rule = InteractionRule::from_config(rule).unwrap();
    let topology = Topology::square_lattice(popsize, true).unwrap();
    let population = Population::new(topology, rule.model(), &mut rng);
    let cache = ActiveLinkCache::new(&population, rule.model());
    (rule, population, cache, rng)
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for popsize in [100, 400, 1600, 6400] {
        let config = RuleConfig::Axelrod(VectorParams::default());
        let (rule, mut population, mut cache, mut rng) = setup(&config, popsize);

        let mut tick = 0u64;
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_agents", popsize)),
            &popsize,
            |b, _| {
                b.iter(|| {
                    tick += 1;
                    rule.step(black_box(&mut population), &mut cache, &mut rng, tick);
                });
            },
        );
    }

    group.finish();
}

fn bench_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("rules");

    let rules = [
        RuleConfig::Axelrod(VectorParams::default()),
        RuleConfig::Extensible(SetParams::default()),
        RuleConfig::TreePrerequisite(TreeParams::default()),
    ];

    for config in rules {
        let (rule, mut population, mut cache, mut rng) = setup(&config, 400);

        let mut tick = 0u64;
        group.bench_with_input(
            BenchmarkId::from_parameter(config.name()),
            &config,
            |b, _| {
                b.iter(|| {
                    tick += 1;
                    rule.step(black_box(&mut population), &mut cache, &mut rng, tick);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_step, bench_rules);
criterion_main!(benches);
