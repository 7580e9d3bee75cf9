use clap::{Parser, ValueEnum};
use klu_refactor::solver::{
    klu::{self, BlockLu, KluConfig, KluNumeric, KluScale, KluStatus, testing},
    matrix::{csc::CscMatrix, mtx::load_matrix_market_csc_file},
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.3}s")
    } else if secs >= 1e-3 {
        format!("{:.3}ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3}us", secs * 1e6)
    } else {
        format!("{}ns", d.as_nanos())
    }
}

fn print_timing_breakdown(stages: &[(&str, Duration)], total_elapsed: Duration) {
    let accounted_secs = stages.iter().map(|(_, d)| d.as_secs_f64()).sum::<f64>();
    let total_secs = total_elapsed.as_secs_f64();
    let pct = |secs: f64| {
        if total_secs > 0.0 {
            secs / total_secs * 100.0
        } else {
            0.0
        }
    };

    println!();
    println!(
        "timing breakdown (accounted {}, total {}):",
        fmt_duration(Duration::from_secs_f64(accounted_secs)),
        fmt_duration(total_elapsed)
    );
    for (name, dur) in stages {
        println!(
            "  {name:<22} {:>12} ({:>6.2}%)",
            fmt_duration(*dur),
            pct(dur.as_secs_f64())
        );
    }
    let other_secs = (total_secs - accounted_secs).max(0.0);
    println!(
        "  {:<22} {:>12} ({:>6.2}%)",
        "other_overhead",
        fmt_duration(Duration::from_secs_f64(other_secs)),
        pct(other_secs)
    );
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScaleArg {
    None,
    Validate,
    Sum,
    Max,
}

impl From<ScaleArg> for Option<KluScale> {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::None => None,
            ScaleArg::Validate => Some(KluScale::Validate),
            ScaleArg::Sum => Some(KluScale::Sum),
            ScaleArg::Max => Some(KluScale::Max),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    about = "Loads a MatrixMarket coordinate matrix (.mtx), changes one column, and refactors it both fully and along the factorization path.",
    after_help = "Notes:\n  - The matrix is factored in its natural order without pivoting, so it should be diagonally dominant.\n  - Set RUST_LOG=klu_refactor=debug to see per-call logging.",
    version
)]
struct Args {
    /// Column to change (0-based). Defaults to the last column.
    #[arg(long)]
    column: Option<usize>,

    /// Multiply the values of the changed column by this factor.
    #[arg(long, default_value_t = 1.5)]
    factor: f64,

    /// Row scaling mode.
    #[arg(long, value_enum, default_value_t = ScaleArg::Max)]
    scale: ScaleArg,

    /// Keep going on zero or tiny pivots instead of stopping.
    #[arg(long)]
    keep_going: bool,

    /// Number of timed refactorizations of each kind.
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// Path to MatrixMarket coordinate matrix (.mtx)
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

fn print_matrix_stats(path: &PathBuf, a: &CscMatrix) {
    println!("matrix: {}", path.display());
    println!("dim: {} x {}", a.dim.nrows, a.dim.ncols);
    println!("nnz: {}", a.nnz());
}

/// Largest absolute difference between the factor values of two numeric objects
/// with the same layout.
fn max_factor_difference(lhs: &KluNumeric, rhs: &KluNumeric) -> f64 {
    let diff = |x: &[f64], y: &[f64]| {
        x.iter()
            .zip(y)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    };

    let mut max = diff(lhs.u_diag(), rhs.u_diag()).max(diff(lhs.offx(), rhs.offx()));
    for block in 0..lhs.nblocks() {
        if let (BlockLu::Lu(l), BlockLu::Lu(r)) = (lhs.block(block), rhs.block(block)) {
            for k in 0..l.nk() {
                max = max
                    .max(diff(l.l_column(k).1, r.l_column(k).1))
                    .max(diff(l.u_column(k).1, r.u_column(k).1));
            }
        }
    }
    max
}

fn fail(stages: &[(&str, Duration)], total_start: Instant, msg: String) -> ! {
    eprintln!("{msg}");
    print_timing_breakdown(stages, total_start.elapsed());
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let total_start = Instant::now();
    let mut stages: Vec<(&str, Duration)> = Vec::new();

    let args = Args::parse();
    let config = KluConfig {
        scale: args.scale.into(),
        halt_if_singular: !args.keep_going,
        halt_if_pivot_fails: !args.keep_going,
        ..Default::default()
    };

    let t = Instant::now();
    let a = match load_matrix_market_csc_file(&args.path) {
        Ok(a) => a,
        Err(e) => fail(&stages, total_start, format!("failed to load MatrixMarket file: {e}")),
    };
    stages.push(("load_matrix", t.elapsed()));
    print_matrix_stats(&args.path, &a);

    if !a.is_square() {
        eprintln!("only square matrices can be factored");
        print_timing_breakdown(&stages, total_start.elapsed());
        std::process::exit(2);
    }
    let n = a.dim.ncols;
    let column = args.column.unwrap_or(n.saturating_sub(1));
    if column >= n {
        fail(
            &stages,
            total_start,
            format!("column {column} out of range (n={n})"),
        );
    }

    let t = Instant::now();
    let (symbolic, numeric) = match testing::factor(&a, &config) {
        Ok(factors) => factors,
        Err(e) => {
            stages.push(("factor", t.elapsed()));
            fail(&stages, total_start, format!("factor failed: {e}"))
        }
    };
    stages.push(("factor", t.elapsed()));

    let mut b = a.clone();
    for v in b.col_values_mut(column) {
        *v *= args.factor;
    }

    let t = Instant::now();
    let path = match testing::factorization_path(&b, &symbolic, &numeric, &[column]) {
        Ok(path) => path,
        Err(e) => {
            stages.push(("path_analysis", t.elapsed()));
            fail(&stages, total_start, format!("path analysis failed: {e}"))
        }
    };
    stages.push(("path_analysis", t.elapsed()));
    let path_columns = path.columns().len();
    let variable_blocks = path.variable_blocks().len();
    let replayed = path.replay().len();

    let mut along_path = numeric.clone();
    if let Err(e) = along_path.attach_path(path) {
        fail(&stages, total_start, format!("attach path failed: {e}"));
    }
    let mut full = numeric;

    let repeat = args.repeat.max(1);
    let mut path_status = KluStatus::Ok;
    let t = Instant::now();
    for _ in 0..repeat {
        path_status = match klu::refactor_along_path(&b, &symbolic, &mut along_path, &config) {
            Ok(status) => status,
            Err(e) => {
                stages.push(("refactor_along_path", t.elapsed()));
                fail(&stages, total_start, format!("refactor along path failed: {e}"))
            }
        };
    }
    let path_time = t.elapsed();
    stages.push(("refactor_along_path", path_time));

    let mut full_status = KluStatus::Ok;
    let t = Instant::now();
    for _ in 0..repeat {
        full_status = match klu::refactor(&b, &symbolic, &mut full, &config) {
            Ok(status) => status,
            Err(e) => {
                stages.push(("refactor_full", t.elapsed()));
                fail(&stages, total_start, format!("full refactor failed: {e}"))
            }
        };
    }
    let full_time = t.elapsed();
    stages.push(("refactor_full", full_time));

    println!();
    println!(
        "klu: nblocks={} maxblock={} nzoff={} lnz={} unz={}",
        symbolic.nblocks(),
        symbolic.maxblock(),
        symbolic.nzoff(),
        full.lnz(),
        full.unz()
    );
    println!(
        "change: column {column} x {} -> path columns {path_columns}/{n}, variable blocks {variable_blocks}/{}, replayed off-diagonal {replayed}/{}",
        args.factor,
        symbolic.nblocks(),
        symbolic.nzoff()
    );
    println!("status: path {path_status:?} full {full_status:?}");
    println!(
        "metrics: numerical_rank={:?} singular_col={:?}",
        full.metrics().numerical_rank,
        full.metrics().singular_col
    );
    println!(
        "max |path - full| = {:.3e}",
        max_factor_difference(&along_path, &full)
    );
    if path_time > Duration::ZERO {
        println!(
            "speedup (full / path) over {repeat} run(s): {:.2}x",
            full_time.as_secs_f64() / path_time.as_secs_f64()
        );
    }

    print_timing_breakdown(&stages, total_start.elapsed());
}
