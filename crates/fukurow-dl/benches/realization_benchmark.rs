use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fukurow_core::DependencySet;
use fukurow_dl::{
    AtomicConcept, AtomicRole, Hierarchy, HierarchyBuilder, Individual, InstanceManager, NoopProgressMonitor,
    RealizationConfig, Role,
};
use fukurow_tableau::{CompletionModel, EntailmentOracle, Fact, MarkerConcepts};

fn concept(index: usize) -> AtomicConcept {
    AtomicConcept::new(format!("http://example.org/Class{}", index))
}

fn individual(index: usize) -> Individual {
    Individual::named(format!("http://example.org/ind{}", index))
}

/// Binary tree of classes: Class{i} ⊑ Class{(i-1)/2}
fn create_concept_hierarchy(size: usize) -> Hierarchy<AtomicConcept> {
    let mut builder = HierarchyBuilder::new(AtomicConcept::thing(), AtomicConcept::nothing());
    builder.add_element(concept(0));
    for i in 1..size {
        builder.add_subsumption(concept(i), concept((i - 1) / 2));
    }
    builder.build()
}

fn create_role_hierarchy() -> Hierarchy<Role> {
    let mut builder = HierarchyBuilder::new(Role::Atomic(AtomicRole::top()), Role::Atomic(AtomicRole::bottom()));
    builder.add_element(Role::atomic("http://example.org/knows"));
    builder.build()
}

/// Every individual is tentatively in a leaf class; the oracle confirms every other one
fn create_fixture(classes: usize, individuals: usize) -> (CompletionModel, EntailmentOracle, Vec<Individual>) {
    let mut model = CompletionModel::new();
    let mut oracle = EntailmentOracle::new();
    let mut everyone = Vec::with_capacity(individuals);
    for i in 0..individuals {
        let ind = individual(i);
        let node = model.add_individual(ind.clone());
        let class = concept(classes - 1 - (i % (classes / 2)));
        model
            .add_concept_fact(class.clone(), node, DependencySet::from_branches([i as u32]))
            .expect("fixture fact");
        if i % 2 == 0 {
            oracle.entail(Fact::Concept(class, ind.clone()));
        }
        everyone.push(ind);
    }
    (model, oracle, everyone)
}

fn create_manager(classes: usize, individuals: usize) -> InstanceManager<EntailmentOracle> {
    let (model, oracle, everyone) = create_fixture(classes, individuals);
    let mut manager = InstanceManager::with_classified_hierarchies(
        oracle,
        everyone,
        &create_concept_hierarchy(classes),
        &create_role_hierarchy(),
        RealizationConfig::default(),
    )
    .expect("manager");
    manager.set_progress_monitor(Box::new(NoopProgressMonitor));
    manager
        .initialize_known_and_possible_instances(&model, &MarkerConcepts::new(), &[])
        .expect("seeding");
    manager
}

fn bench_hierarchy_builder(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy_builder");
    for size in [31, 127, 511] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| black_box(create_concept_hierarchy(size)))
        });
    }
    group.finish();
}

fn bench_realize(c: &mut Criterion) {
    let mut group = c.benchmark_group("realize");
    for individuals in [50, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(individuals), &individuals, |b, &individuals| {
            b.iter_batched(
                || create_manager(63, individuals),
                |mut manager| {
                    manager.realize().expect("realize");
                    black_box(manager.oracle().call_count())
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_lazy_instances(c: &mut Criterion) {
    c.bench_function("instances_of_root_lazy", |b| {
        b.iter_batched(
            || create_manager(63, 200),
            |mut manager| black_box(manager.instances(&concept(0), true).expect("instances")),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_hierarchy_builder, bench_realize, bench_lazy_instances);
criterion_main!(benches);
