//! Benchmarks for mesh optimization.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::{Point2, Point3};
use surfopt::prelude::*;

fn create_grid_uvs(n: usize) -> (Vec<Point2<f64>>, Vec<[usize; 3]>) {
    let mut uvs = Vec::with_capacity((n + 1) * (n + 1));
    let mut faces = Vec::with_capacity(n * n * 2);

    for j in 0..=n {
        for i in 0..=n {
            uvs.push(Point2::new(i as f64 / n as f64, j as f64 / n as f64));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;

            faces.push([v00, v10, v11]);
            faces.push([v00, v11, v01]);
        }
    }

    (uvs, faces)
}

fn bench_refinement(c: &mut Criterion) {
    let plane = PlanarSurface::xy();
    let (uvs, faces) = create_grid_uvs(4);
    let mesh: SurfaceMesh = build_on_surface(&plane, &uvs, &faces).unwrap();

    let field = UniformSize(0.05);
    let criteria = [SwapCriterion::Quality, SwapCriterion::Delaunay, SwapCriterion::Closeness];
    for criterion in criteria {
        let options = OptimizeOptions::new(criterion).sequential();
        c.bench_function(&format!("refine_grid_4_{criterion:?}"), |b| {
            b.iter_batched(
                || mesh.clone(),
                |mut mesh| optimize_surface_mesh(&mut mesh, &plane, &field, &options).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_coarsening(c: &mut Criterion) {
    let plane = PlanarSurface::xy();
    let (uvs, faces) = create_grid_uvs(32);
    let mesh: SurfaceMesh = build_on_surface(&plane, &uvs, &faces).unwrap();
    let options = OptimizeOptions::new(SwapCriterion::Quality).sequential();
    let field = UniformSize(0.1);

    c.bench_function("coarsen_grid_32", |b| {
        b.iter_batched(
            || mesh.clone(),
            |mut mesh| optimize_surface_mesh(&mut mesh, &plane, &field, &options).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_curved_batch(c: &mut Criterion) {
    let (uvs, faces) = create_grid_uvs(8);
    let make_patch = |k: usize| {
        let radius = 1.0 + k as f64;
        let surface = ParametricSurface::new(move |uv: Point2<f64>| {
            Point3::new(radius * uv.x.cos(), radius * uv.x.sin(), uv.y)
        })
        .with_tag(k);
        let mesh: SurfaceMesh = build_on_surface(&surface, &uvs, &faces).unwrap();
        (mesh, surface)
    };
    let patches: Vec<_> = (0..8).map(make_patch).collect();

    for (name, options) in [
        ("curved_batch_8_parallel", OptimizeOptions::new(SwapCriterion::Closeness)),
        ("curved_batch_8_sequential", OptimizeOptions::new(SwapCriterion::Closeness).sequential()),
    ] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || patches.clone(),
                |mut patches| optimize_surfaces(&mut patches, &UniformSize(0.2), &options).unwrap(),
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, bench_refinement, bench_coarsening, bench_curved_batch);
criterion_main!(benches);
