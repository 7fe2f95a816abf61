/// Benchmarks for environment precomputation and lookups
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{Vec2, Vec3};
use soft_pbr::rendering::environment::{compute_sh9, integrate_brdf_lut};
use soft_pbr::rendering::{EnvironmentConfig, EnvironmentMap, HdrImage};

/// Sky-like gradient: bright zenith, darker horizon, warm band in the west.
fn gradient_sky(width: usize, height: usize) -> HdrImage {
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        let v = y as f32 / height as f32;
        for x in 0..width {
            let u = x as f32 / width as f32;
            let warm = (1.0 - (u - 0.25).abs() * 4.0).max(0.0);
            pixels.push(Vec3::new(0.4 + warm, 0.6, 1.2) * (1.5 - v));
        }
    }
    HdrImage {
        width,
        height,
        pixels,
    }
}

fn bench_precompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("environment_precompute");
    group.sample_size(10);

    let sky = gradient_sky(512, 256);
    group.bench_function("sh9_512x256", |b| {
        b.iter(|| black_box(compute_sh9(black_box(&sky))));
    });
    group.bench_function("brdf_lut_64", |b| {
        b.iter(|| black_box(integrate_brdf_lut(64, 256)));
    });
    group.bench_function("full_load_256x128", |b| {
        let config = EnvironmentConfig {
            specular_base_width: 128,
            prefilter_samples: 64,
            brdf_lut_size: 32,
            brdf_samples: 128,
        };
        let small = gradient_sky(256, 128);
        b.iter(|| black_box(EnvironmentMap::from_image(small.clone(), config)));
    });
    group.finish();
}

fn bench_lookups(c: &mut Criterion) {
    let config = EnvironmentConfig {
        specular_base_width: 128,
        prefilter_samples: 64,
        brdf_lut_size: 32,
        brdf_samples: 128,
    };
    let Ok(env) = EnvironmentMap::from_image(gradient_sky(256, 128), config) else {
        return;
    };
    let n = Vec3::new(0.3, 0.8, 0.5).normalize();

    c.bench_function("eval_diffuse_sh", |b| {
        b.iter(|| black_box(env.eval_diffuse_sh(black_box(n))));
    });
    c.bench_function("sample_specular", |b| {
        b.iter(|| black_box(env.sample_specular(black_box(n), 0.35)));
    });
    c.bench_function("lookup_brdf", |b| {
        b.iter(|| black_box(env.lookup_brdf(black_box(0.7), 0.35)));
    });
    c.bench_function("sample_bilinear", |b| {
        let sky = gradient_sky(256, 128);
        b.iter(|| black_box(sky.sample_bilinear(black_box(Vec2::new(0.37, 0.61)))));
    });
}

criterion_group!(benches, bench_precompute, bench_lookups);
criterion_main!(benches);
