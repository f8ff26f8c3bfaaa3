use std::fs::File;
use std::io::Write;

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::tempdir;

use macroforge::driver::transpile;

fn bench_transpile_short(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.pyx");
    File::create(&path)
        .unwrap()
        .write_all(
            b"\
!define VERSION: (3, 5, 0, 0)
!macro double(x): x + x
!method *items.joined(): \",\".join([items])

!macro describe(n):
    !if n > 0: kind = \"positive\"
    !elif n < 0: kind = \"negative\"
    !else: kind = \"zero\"

$mod 7
total %+= 1

$cases 3
describe(double(VERSION[0]))
result = (a, b, c).joined()
",
        )
        .unwrap();

    c.bench_function("transpile", |b| {
        b.iter(|| transpile(&path, false).unwrap())
    });
}

criterion_group!(benches, bench_transpile_short);
criterion_main!(benches);
