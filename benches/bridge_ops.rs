//! Benchmarks for bridge round-trips: wrapping, lifting, extraction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use termbridge::terms::Term;
use termbridge::{Expr, Session};

fn bench_wrap_drop(c: &mut Criterion) {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let raw = x.expr().raw();

    c.bench_function("wrap_drop", |bench| {
        bench.iter(|| black_box(Expr::wrap(&session, raw).unwrap()))
    });
}

fn bench_build_and_lift(c: &mut Criterion) {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let one = session.int(1).unwrap();

    c.bench_function("add_then_lift", |bench| {
        bench.iter(|| {
            let sum = x.add(&one).unwrap();
            black_box(sum.into_expr().lift().unwrap())
        })
    });
}

fn bench_simplify_sum(c: &mut Criterion) {
    let session = Session::default_session();
    let x = session.int_const("x").unwrap();
    let y = session.int_const("y").unwrap();
    let terms: Vec<_> = (0..16).map(|i| session.int(i).unwrap()).collect();
    let mut sum = x.add(&y).unwrap();
    for t in &terms {
        sum = sum.add(t).unwrap().add(&x).unwrap();
    }

    c.bench_function("simplify_sum_32", |bench| {
        bench.iter(|| black_box(sum.simplify().unwrap()))
    });
}

fn bench_bv_extract(c: &mut Criterion) {
    let session = Session::default_session();
    let narrow = session.bv(-5, 32).unwrap();
    let wide = session.bv(-5, 128).unwrap();

    c.bench_function("bv32_as_i64", |bench| {
        bench.iter(|| black_box(narrow.as_i64().unwrap()))
    });
    c.bench_function("bv128_as_i64", |bench| {
        bench.iter(|| black_box(wide.as_i64().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_wrap_drop,
    bench_build_and_lift,
    bench_simplify_sum,
    bench_bv_extract
);
criterion_main!(benches);
