//! Decode throughput on the CPU kernel.
//!
//! Two regimes: a wide batch at a small state count, and a short batch at
//! the 1,440-state posteriorgram size where the O(T·S²) inner reduction
//! dominates.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use trellis::{decode, Device, Tensor2, Tensor3};

fn synthetic(rng: &mut StdRng, len: usize) -> Vec<f32> {
    (0..len).map(|_| rng.random_range(0.01..1.0)).collect()
}

fn bench_decode(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(97);

    let mut group = c.benchmark_group("decode_cpu");
    group.sample_size(10);
    for &(batch, frames, states) in &[(16usize, 200usize, 128usize), (4, 50, 1440)] {
        let obs = synthetic(&mut rng, batch * frames * states);
        let trans = synthetic(&mut rng, states * states);
        let init = synthetic(&mut rng, states);
        group.bench_function(format!("{batch}x{frames}x{states}"), |b| {
            b.iter(|| {
                let observation = Tensor3::new(black_box(&obs), batch, frames, states).unwrap();
                let transition = Tensor2::new(&trans, states, states).unwrap();
                decode(
                    observation,
                    None,
                    Some(transition),
                    Some(&init),
                    false,
                    Device::Cpu,
                )
                .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
