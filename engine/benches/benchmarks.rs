//! Performance benchmarks for eventmap-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eventmap_engine::{
    EntityInfo, LatLng, LayerCatalog, LayerInfo, PolylineType, Snapshot, SnapshotDoc, SyncState,
};

const LAYERS: [&str; 3] = ["ground", "first", "roof"];

fn create_catalog() -> LayerCatalog {
    LayerCatalog::new(LAYERS.iter().map(|name| LayerInfo::new(*name, 5)).collect())
        .expect("valid catalog")
}

/// A snapshot with `count` entities, one polyline for every four points.
fn create_snapshot(version: &str, count: usize, shift: f64) -> Snapshot {
    let mut snapshot = Snapshot::new(version);
    for i in 0..count {
        let layer = LAYERS[i % LAYERS.len()].to_string();
        let lat = i as f64 * 0.001 + shift;
        if i % 5 == 4 {
            snapshot = snapshot.with_entity(
                format!("__polyline_{layer}_{i}"),
                EntityInfo::Polyline {
                    points: (0..8).map(|j| LatLng::new(lat, j as f64 * 0.01)).collect(),
                    layer,
                    line_type: PolylineType::Power,
                },
            );
        } else {
            snapshot = snapshot.with_entity(
                format!("Marker {i}"),
                EntityInfo::Point {
                    lat,
                    lng: 13.4,
                    layer,
                },
            );
        }
    }
    snapshot
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [100usize, 1000] {
        let initial = create_snapshot("v1", size, 0.0);

        // Benchmark merging into an empty state
        group.bench_with_input(BenchmarkId::new("initial", size), &initial, |b, snapshot| {
            b.iter(|| {
                let mut state = SyncState::new(create_catalog());
                state.merge(black_box(snapshot)).expect("merge")
            })
        });

        // Benchmark a merge where nothing changed
        group.bench_with_input(BenchmarkId::new("unchanged", size), &initial, |b, snapshot| {
            let mut state = SyncState::new(create_catalog());
            state.merge(snapshot).expect("merge");
            b.iter(|| state.merge(black_box(snapshot)))
        });

        // Benchmark alternating between two versions where everything moved
        let moved = create_snapshot("v2", size, 1.0);
        group.bench_with_input(
            BenchmarkId::new("all_moved", size),
            &(initial.clone(), moved),
            |b, (first, second)| {
                let mut state = SyncState::new(create_catalog());
                let mut flip = false;
                b.iter(|| {
                    flip = !flip;
                    state.merge(black_box(if flip { second } else { first }))
                })
            },
        );
    }

    group.finish();
}

fn bench_documents(c: &mut Criterion) {
    let mut group = c.benchmark_group("documents");

    let mut state = SyncState::new(create_catalog());
    state
        .merge(&create_snapshot("v1", 1000, 0.0))
        .expect("merge");
    let json = state.to_document().to_json().expect("serialize");

    group.bench_function("to_document_1000", |b| b.iter(|| state.to_document()));

    group.bench_function("parse_1000", |b| {
        b.iter(|| SnapshotDoc::from_json(black_box(&json)))
    });

    group.bench_function("search_prefix", |b| b.iter(|| state.search(black_box("marker 5"))));

    group.finish();
}

criterion_group!(benches, bench_merge, bench_documents);
criterion_main!(benches);
