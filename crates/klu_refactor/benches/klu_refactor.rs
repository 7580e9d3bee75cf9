// SPDX-License-Identifier: LGPL-2.1-or-later

use std::{hint::black_box, sync::OnceLock};

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use klu_refactor::solver::{
    klu::{self, KluConfig, KluNumeric, KluSymbolic, testing},
    matrix::{builder::MatrixBuilder, csc::CscMatrix},
};

#[derive(Debug)]
struct Case {
    name: String,
    /// matrix after the change
    b: CscMatrix,
    symbolic: KluSymbolic,
    /// factors of the original matrix, path attached
    numeric: KluNumeric,
    nnz: usize,
}

/// `nblocks` diagonally dominant tridiagonal blocks of size `block`, each
/// coupled to the previous block through its first row.
fn block_tridiagonal(nblocks: usize, block: usize) -> CscMatrix {
    let n = nblocks * block;
    let mut b = MatrixBuilder::new(n, n);
    b.reserve(n * 4);
    for k in 0..n {
        let k1 = k - k % block;
        b.push(k, k, 4.0).expect("diagonal");
        if k > k1 {
            b.push(k, k - 1, -1.0).expect("upper");
        }
        if k + 1 < k1 + block {
            b.push(k, k + 1, -1.0).expect("lower");
        }
        if k1 > 0 && k == k1 {
            b.push(k, k1 - block, 0.5).expect("coupling");
        }
    }
    b.build_csc().expect("valid matrix")
}

fn make_case(name: &str, nblocks: usize, block: usize, config: &KluConfig) -> Case {
    let a = block_tridiagonal(nblocks, block);
    let (symbolic, numeric) = testing::factor(&a, config).expect("factor");

    // change a column near the end of the middle block
    let column = (nblocks / 2) * block + block - 2;
    let mut b = a.clone();
    for v in b.col_values_mut(column) {
        *v *= 1.25;
    }

    let path = testing::factorization_path(&b, &symbolic, &numeric, &[column]).expect("path");
    let mut numeric = numeric;
    numeric.attach_path(path).expect("attach path");

    let nnz = b.nnz();
    Case {
        name: name.to_string(),
        b,
        symbolic,
        numeric,
        nnz,
    }
}

fn load_cases() -> &'static Vec<Case> {
    static CASES: OnceLock<Vec<Case>> = OnceLock::new();
    CASES.get_or_init(|| {
        let config = KluConfig::default();
        vec![
            make_case("blocks_64x16", 64, 16, &config),
            make_case("blocks_16x256", 16, 256, &config),
            make_case("blocks_4x2048", 4, 2048, &config),
        ]
    })
}

fn bench_refactor(c: &mut Criterion) {
    let cases = load_cases();
    let config = KluConfig::default();

    for (group_name, along_path) in [("klu/refactor_full", false), ("klu/refactor_along_path", true)] {
        let mut group = c.benchmark_group(group_name);
        for case in cases {
            group.throughput(Throughput::Elements(case.nnz as u64));
            group.bench_with_input(BenchmarkId::from_parameter(&case.name), case, |b, case| {
                b.iter_batched(
                    || case.numeric.clone(),
                    |mut numeric| {
                        let status = if along_path {
                            klu::refactor_along_path(&case.b, &case.symbolic, &mut numeric, &config)
                        } else {
                            klu::refactor(&case.b, &case.symbolic, &mut numeric, &config)
                        };
                        black_box(status.expect("refactor"));
                        black_box(numeric);
                    },
                    BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }
}

criterion_group!(klu_refactor_benches, bench_refactor);
criterion_main!(klu_refactor_benches);
