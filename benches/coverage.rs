use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use station_viewshed::coverage::ViewshedEngine;
use station_viewshed::io::Station;
use station_viewshed::physics::{ANGLE_SCALE, ResolvedStation, station_fields};
use station_viewshed::terrain::Raster;

fn synthetic_dem(size: usize) -> Raster {
    let samples = (0..size * size)
        .map(|i| {
            let (x, y) = ((i % size) as f64, (i / size) as f64);
            300.0 + 40.0 * (x * 0.05).sin() * (y * 0.03).cos() + 5.0 * ((x + y) * 0.2).sin()
        })
        .collect();
    Raster::from_rows(samples, size, size, 0.0, size as f64 * 30.0, 30.0, -9999.0).unwrap()
}

fn viewshed_benchmark(c: &mut Criterion) {
    let dem = synthetic_dem(400);
    let centre = dem.geometry.cell_to_world(200, 200);
    let station = Station::new("bench", centre.x, centre.y, 10.0);
    let resolved = ResolvedStation::resolve(0, &station, &dem).unwrap();

    c.bench_function("station_fields_400", |b| {
        b.iter(|| station_fields(black_box(&dem), black_box(&resolved), ANGLE_SCALE))
    });

    let stations: Vec<Station> = (0..8)
        .map(|i| {
            let p = dem.geometry.cell_to_world(40 + i * 40, 360 - i * 40);
            Station::new(format!("s{}", i), p.x, p.y, 10.0)
        })
        .collect();
    let engine = ViewshedEngine::new(&dem);

    c.bench_function("viewshed_8_stations", |b| {
        b.iter(|| engine.run(black_box(&stations)).unwrap())
    });

    #[cfg(feature = "parallel")]
    c.bench_function("viewshed_8_stations_parallel", |b| {
        b.iter(|| engine.run_parallel(black_box(&stations)).unwrap())
    });
}

criterion_group!(benches, viewshed_benchmark);
criterion_main!(benches);
