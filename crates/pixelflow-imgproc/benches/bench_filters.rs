use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use pixelflow_image::Image;
use pixelflow_imgproc::filter::{bilateral_filter, gaussian_blur, median_blur};
use rand::Rng;

fn random_image(width: usize, height: usize) -> Image<u8, 3> {
    let mut rng = rand::rng();
    let data = (0..width * height * 3).map(|_| rng.random::<u8>()).collect();
    Image::new([width, height].into(), data).unwrap()
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("Filters");

    for (width, height) in [(320, 240), (640, 480)].iter() {
        for kernel_size in [3, 5, 9].iter() {
            group.throughput(criterion::Throughput::Elements(
                (*width * *height * *kernel_size) as u64,
            ));

            let parameter_string = format!("{}x{}x{}", width, height, kernel_size);

            let src = random_image(*width, *height);
            let dst = Image::<u8, 3>::from_size_val(src.size(), 0).unwrap();

            group.bench_with_input(
                BenchmarkId::new("gaussian_blur", &parameter_string),
                &(&src, &dst),
                |b, i| {
                    let (src, mut dst) = (i.0, i.1.clone());
                    b.iter(|| black_box(gaussian_blur(src, &mut dst, *kernel_size, 0.0)))
                },
            );

            group.bench_with_input(
                BenchmarkId::new("median_blur", &parameter_string),
                &(&src, &dst),
                |b, i| {
                    let (src, mut dst) = (i.0, i.1.clone());
                    b.iter(|| black_box(median_blur(src, &mut dst, *kernel_size)))
                },
            );

            group.bench_with_input(
                BenchmarkId::new("bilateral_filter", &parameter_string),
                &(&src, &dst),
                |b, i| {
                    let (src, mut dst) = (i.0, i.1.clone());
                    b.iter(|| black_box(bilateral_filter(src, &mut dst, *kernel_size, 75.0, 75.0)))
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_filters);
criterion_main!(benches);
