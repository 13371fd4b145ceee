//! Dispatch Benchmarks
//!
//! Measures what a call through a proxied method costs once it is
//! specialized, against the generic method and against the first call.
//!
//! # Benchmark Categories
//!
//! 1. **Cached dispatch**: binding lookup + compiled call
//! 2. **Generic call**: the same method with live attribute lookup
//! 3. **Specialization**: rewrite + compile after a reset
//! 4. **Binding**: proxy cache hits and misses

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use numbas_jit::{Jit, JitConfig, JitOptions, Proxy, introspect};
use numbas_runtime::{Class, Object, Scope, Value};
use std::sync::Arc;

// =============================================================================
// Benchmark Helpers
// =============================================================================

const HORNER: &str = "
    def eval(self, x):
        acc = 0.0
        for i in range(self.degree, -1, -1):
            acc = acc * x + self.coeffs[i]
        return acc * self.scale
";

fn subject(degree: usize) -> (Arc<Class>, Arc<Proxy>, Arc<Object>) {
    let class = Class::new("Poly", Scope::new("bench"));
    let proxy = Jit::default()
        .with_config(JitConfig::default())
        .specialize(&class, HORNER, JitOptions::new())
        .expect("method parses");
    let coeffs = Value::tuple((0..=degree).map(|i| Value::Float(1.0 / (i as f64 + 1.0))));
    let obj = class.instantiate([
        ("degree", Value::Int(degree as i64)),
        ("coeffs", coeffs),
        ("scale", Value::Float(0.5)),
    ]);
    (class, proxy, obj)
}

// =============================================================================
// Call Benchmarks
// =============================================================================

fn bench_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("call");

    for degree in [2usize, 16, 64] {
        let (_class, proxy, obj) = subject(degree);
        let args = [Value::Float(0.75)];

        // Warm up: compile once.
        let _ = obj.call_method("eval", &args);

        group.bench_with_input(BenchmarkId::new("specialized", degree), &degree, |b, _| {
            b.iter(|| black_box(obj.call_method("eval", black_box(&args))))
        });

        let binding = obj.get_attr("eval").expect("bound");
        group.bench_with_input(BenchmarkId::new("specialized_binding", degree), &degree, |b, _| {
            b.iter(|| black_box(binding.call(black_box(&args))))
        });

        group.bench_with_input(BenchmarkId::new("generic", degree), &degree, |b, _| {
            b.iter(|| black_box(proxy.call_generic(&obj, black_box(&args))))
        });
    }

    group.finish();
}

// =============================================================================
// Specialization Benchmarks
// =============================================================================

fn bench_specialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("specialize");

    for degree in [2usize, 64] {
        let (_class, _proxy, obj) = subject(degree);
        let binding = obj.get_attr("eval").expect("bound");
        let args = [Value::Float(0.75)];

        group.bench_with_input(BenchmarkId::new("reset_and_call", degree), &degree, |b, _| {
            b.iter(|| {
                let _ = introspect::reset(&binding);
                black_box(binding.call(&args))
            })
        });
    }

    group.finish();
}

// =============================================================================
// Binding Benchmarks
// =============================================================================

fn bench_binding(c: &mut Criterion) {
    let mut group = c.benchmark_group("binding");
    let (class, proxy, obj) = subject(2);

    group.bench_function("hit", |b| b.iter(|| black_box(proxy.get(&obj))));

    group.bench_function("miss_and_drop", |b| {
        b.iter(|| {
            let fresh = class.instantiate::<&str>([]);
            black_box(proxy.get(&fresh));
        })
    });

    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(dispatch_benches, bench_calls, bench_specialize, bench_binding);

criterion_main!(dispatch_benches);
