//! Nearest-measurement lookup benchmarks

use bn_spatial::{ImpulseResponse, ImpulseResponseCatalog, SpatialPosition};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

const RESPONSE_LENGTH: usize = 256;

/// Spherical grid: 72 azimuths x 13 elevations
fn grid_catalog() -> ImpulseResponseCatalog {
    let mut positions = Vec::new();
    for el in (-90..=90).step_by(15) {
        for az in (0..360).step_by(5) {
            positions.push(SpatialPosition::new(az as f32, el as f32, 1.5));
        }
    }
    let responses = positions
        .iter()
        .map(|_| ImpulseResponse::new(vec![0.0; RESPONSE_LENGTH], vec![0.0; RESPONSE_LENGTH]))
        .collect();

    match ImpulseResponseCatalog::from_parts(48000, RESPONSE_LENGTH, positions, responses) {
        Ok(catalog) => catalog,
        Err(e) => panic!("grid catalog: {e}"),
    }
}

fn bench_closest_index(c: &mut Criterion) {
    let catalog = grid_catalog();

    c.bench_function("closest_index_936", |b| {
        b.iter(|| catalog.closest_index(black_box(123.4), black_box(17.0), black_box(1.5)))
    });
}

fn bench_orbit(c: &mut Criterion) {
    let catalog = grid_catalog();
    let queries: Vec<SpatialPosition> = (0..360)
        .map(|az| SpatialPosition::new(az as f32, 0.0, 1.5))
        .collect();

    c.bench_function("closest_index_orbit_360", |b| {
        b.iter(|| {
            for query in &queries {
                let _ = black_box(catalog.nearest(query));
            }
        })
    });
}

criterion_group!(benches, bench_closest_index, bench_orbit);
criterion_main!(benches);
