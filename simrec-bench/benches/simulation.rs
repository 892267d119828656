//! simrec Benchmark Suite
//!
//! Performance targets (oracle cost excluded, closure oracle):
//!   step_recency_top3_500_items ........ < 20μs
//!   step_similarity_top5_500_items ..... < 100μs
//!   retrieval_similarity_top5_from_200 . < 200μs
//!   memory_update_history_200_items .... < 50μs

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use simrec_core::config::{RetrievalConfig, ShapingConfig, SimConfig, SimilarityWeights};
use simrec_core::retrieval;
use simrec_core::{
    ContextEntry, Gender, InMemoryCatalog, InteractionMemory, InteractionRecord, Item, ItemId,
    OracleError, OracleResponse, RatingRequest, SimulationEngine, User, UserId, UserList,
};

const GENRES: [&str; 8] = [
    "Action", "Comedy", "Drama", "Family", "Horror", "Romance", "Thriller", "Animation",
];

fn make_item(i: u64) -> Item {
    let i_usize = usize::try_from(i).unwrap_or(0);
    Item::new(i, format!("Movie {i}"))
        .with_tags("genres", [GENRES[i_usize % 8], GENRES[(i_usize / 8) % 8]])
        .with_tags("director", [format!("Director {}", i % 37)])
        .with_vote_average(3.0 + (i % 60) as f64 / 10.0)
        .with_popularity((i % 100) as f64)
}

fn catalog(n: u64) -> InMemoryCatalog {
    InMemoryCatalog::new((0..n).map(make_item)).expect("catalog")
}

fn users() -> UserList {
    UserList::new(
        (0..20)
            .map(|u| {
                User::new(
                    format!("User {u}"),
                    Gender::Unspecified,
                    20 + u,
                    "likes movies",
                )
            })
            .collect(),
    )
}

fn oracle(request: &RatingRequest<'_>) -> Result<OracleResponse, OracleError> {
    Ok(OracleResponse::rating((request.seed % 10 + 1) as f64))
}

type FnOracle = fn(&RatingRequest<'_>) -> Result<OracleResponse, OracleError>;

fn engine(retrieval: RetrievalConfig) -> SimulationEngine<FnOracle> {
    let mut config = SimConfig::default();
    config.episode.stop_probability = 0.0;
    config.shaping = ShapingConfig::Identity;
    config.retrieval = retrieval;
    SimulationEngine::new(&config, &catalog(500), &users(), oracle as FnOracle).expect("engine")
}

/// Benchmark: one step with recency retrieval over 500 items (target: < 20μs).
fn bench_step_recency(c: &mut Criterion) {
    let mut engine = engine(RetrievalConfig::Recency { top_k: 3 });
    engine.reset(Some(1), Some(UserId(0))).expect("reset");
    let mut action = 0_usize;

    c.bench_function("step_recency_top3_500_items", |b| {
        b.iter(|| {
            action = (action + 17) % 500;
            let outcome = engine.step(black_box(action)).expect("step");
            black_box(outcome);
        });
    });
}

/// Benchmark: one step with similarity retrieval over 500 items (target: < 100μs).
fn bench_step_similarity(c: &mut Criterion) {
    let mut engine = engine(RetrievalConfig::Similarity {
        top_k: 5,
        weights: SimilarityWeights::default(),
    });
    engine.reset(Some(1), Some(UserId(0))).expect("reset");
    // Warm the history so retrieval has something to rank.
    for action in 0..200 {
        engine.step(action).expect("warm-up step");
    }
    let mut action = 0_usize;

    c.bench_function("step_similarity_top5_500_items", |b| {
        b.iter(|| {
            action = (action + 13) % 500;
            let outcome = engine.step(black_box(action)).expect("step");
            black_box(outcome);
        });
    });
}

/// Benchmark: similarity top-5 from a 200-entry history (target: < 200μs).
fn bench_retrieval(c: &mut Criterion) {
    let policy = retrieval::build(&RetrievalConfig::Similarity {
        top_k: 5,
        weights: SimilarityWeights::default(),
    })
    .expect("policy");
    let history: Vec<ContextEntry> = (0..200)
        .map(|i| ContextEntry {
            item: Arc::new(make_item(i)),
            interaction: InteractionRecord {
                rating: (i % 10 + 1) as f64,
                step_index: i + 1,
                watch_count: 1,
            },
        })
        .collect();
    let current = make_item(999);

    c.bench_function("retrieval_similarity_top5_from_200", |b| {
        b.iter(|| {
            let picked = policy.retrieve(black_box(&current), black_box(&history));
            black_box(picked);
        });
    });
}

/// Benchmark: memory update plus history read with 200 items (target: < 50μs).
fn bench_memory(c: &mut Criterion) {
    let mut memory = InteractionMemory::new();
    let user = UserId(0);
    for i in 0..200_u64 {
        memory.update(user, &[ItemId::from(i)], &[5.0]).expect("update");
    }
    let mut next = 0_u64;

    c.bench_function("memory_update_history_200_items", |b| {
        b.iter(|| {
            next = (next + 7) % 200;
            memory
                .update(user, &[ItemId::from(next)], &[black_box(7.0)])
                .expect("update");
            black_box(memory.get_history(user));
        });
    });
}

criterion_group!(
    benches,
    bench_step_recency,
    bench_step_similarity,
    bench_retrieval,
    bench_memory,
);
criterion_main!(benches);
