use criterion::{Criterion, black_box, criterion_group, criterion_main};
use steady_core::{Accumulator, InjectError, Injector, Profile, tick};

struct Sink;

impl Injector for Sink {
    fn move_relative(&self, dx: i32, dy: i32) -> Result<(), InjectError> {
        black_box((dx, dy));
        Ok(())
    }

    fn scroll(&self, amount: i32) -> Result<(), InjectError> {
        black_box(amount);
        Ok(())
    }
}

fn bench_tick(c: &mut Criterion) {
    let profile = Profile::live(0.13, -0.7, 0.05);
    c.bench_function("tick_1000", |b| {
        b.iter(|| {
            let mut acc = Accumulator::new();
            for _ in 0..1000 {
                let _ = tick(&mut acc, black_box(&profile), black_box(0.5), &Sink);
            }
            acc
        });
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
