use std::collections::HashSet;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use intune_core::{Candidate, RankLimit, SimilarityWeights, TasteProfile, UserId, rank, score};

const GENRES: [&str; 12] = [
    "pop", "rock", "jazz", "soul", "funk", "house", "techno", "ambient", "folk", "metal",
    "hip hop", "r&b",
];

fn profile(seed: usize) -> TasteProfile {
    let genres: Vec<&str> = (0..4).map(|i| GENRES[(seed + i * 5) % GENRES.len()]).collect();
    let artists: Vec<String> = (0..20).map(|i| format!("artist {}", (seed * 7 + i) % 60)).collect();
    let titles: Vec<String> = (0..40).map(|i| format!("track {}", (seed * 3 + i) % 150)).collect();
    let tracks: Vec<(&str, &str)> = titles
        .iter()
        .zip(artists.iter().cycle())
        .map(|(t, a)| (t.as_str(), a.as_str()))
        .collect();
    TasteProfile::new(genres, &artists, tracks)
}

fn bench_score(c: &mut Criterion) {
    let a = profile(1);
    let b = profile(2);
    c.bench_function("score_pair", |bench| {
        bench.iter(|| score(black_box(&a), black_box(&b)))
    });
}

fn bench_rank(c: &mut Criterion) {
    let me = Candidate {
        user_id: UserId(0),
        username: "me".into(),
        profile: profile(0),
    };
    let pool: Vec<Candidate> = (1..500)
        .map(|i| Candidate {
            user_id: UserId(i as i64),
            username: format!("user{i}"),
            profile: profile(i),
        })
        .collect();
    let pairs = HashSet::new();
    c.bench_function("rank_500", |bench| {
        bench.iter(|| {
            rank(
                black_box(&me),
                black_box(&pool),
                &pairs,
                RankLimit::new(20),
                &SimilarityWeights::DEFAULT,
            )
        })
    });
}

criterion_group!(benches, bench_score, bench_rank);
criterion_main!(benches);
