//! Job-driven command line front end.
//!
//! Jobs execute strictly left to right against one worker session and at
//! most one loaded system, e.g.:
//!
//! ```text
//! epsform --load sys.txt 1 4 --queue sys.queue --fuchsify --normalize \
//!         --factorep --write sys_epform.txt
//! ```

use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use epsform_core::{SingPoint, System, SystemConfig};
use epsform_engine::Engine;

#[derive(Parser)]
#[command(
    name = "epsform",
    about = "Reduce a linear differential system to epsilon form",
    after_help = "JOBS (executed in order):\n  \
        --load <file> <start> <end>   Load system; active block [start,end], 1-based (end 0 = all)\n  \
        --write <file>                Write system\n  \
        --queue <file>                Log transformations to <file> (overwrite)\n  \
        --queue-append <file>         Log transformations to <file> (append)\n  \
        --load-queue <file>           Load a transformation queue\n  \
        --replay                      Replay the queue against the loaded system\n  \
        --export <file>               Export the net transformation matrix\n  \
        --block <start> <end>         Activate a sub-block\n  \
        --analyze                     Show the block structure of the active block\n  \
        --eigenvalues                 Show residue eigenvalues\n  \
        --fuchsify                    Reduce all Poincare ranks to zero\n  \
        --fuchsify-at <sing>          Reduce the rank at one singularity\n  \
        --normalize                   Normalize residue eigenvalues\n  \
        --factorep                    Factor out epsilon (autodetect mu)\n  \
        --factorep-at <mu>            Factor out epsilon at a fixed mu\n  \
        --left-ranks                  Show left coupling pole orders\n  \
        --left-reduce <sing>          Reduce the left coupling at one singularity\n  \
        --left-fuchsify               Reduce all left couplings\n  \
        --left-fuchsify-at <sing>     Reduce the left coupling at one singularity, looping\n  \
        --jordan <sing>               Transform a residue to Jordan form\n  \
        --jordan-ep <sing>            Transform residue/ep to Jordan form\n\n\
        ENVIRONMENT:\n  EPSFORM_ENGINE   Path to the arithmetic worker (default: epsworker)"
)]
struct Cli {
    /// Path to the arithmetic worker executable.
    #[arg(long)]
    engine: Option<String>,

    /// Extra symbols for the worker session, comma separated.
    #[arg(long)]
    symbols: Option<String>,

    /// Solve linear systems with the worker's row-echelon routine.
    #[arg(long)]
    echelon_engine: bool,

    /// Allow eigenvalues u+v*ep with denominator <n> in u, v.
    #[arg(long, default_value_t = 1)]
    ev_denom: i64,

    /// Shorthand for --ev-denom 2.
    #[arg(long)]
    half_ev: bool,

    /// Log worker protocol traffic.
    #[arg(long)]
    verbose: bool,

    /// Report per-job wall times.
    #[arg(long)]
    timings: bool,

    /// The ordered job list.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    jobs: Vec<String>,
}

enum Job {
    Load {
        file: String,
        start: usize,
        end: Option<usize>,
    },
    Write(String),
    Queue {
        file: String,
        append: bool,
    },
    LoadQueue(String),
    Replay,
    Export(String),
    Block {
        start: usize,
        end: Option<usize>,
    },
    Analyze,
    Eigenvalues,
    Fuchsify,
    FuchsifyAt(String),
    Normalize,
    FactorEp,
    FactorEpAt(i64),
    LeftRanks,
    LeftReduce(String),
    LeftFuchsify,
    LeftFuchsifyAt(String),
    Jordan(String),
    JordanEp(String),
}

impl Job {
    fn name(&self) -> &'static str {
        match self {
            Job::Load { .. } => "load",
            Job::Write(_) => "write",
            Job::Queue { .. } => "queue",
            Job::LoadQueue(_) => "load-queue",
            Job::Replay => "replay",
            Job::Export(_) => "export",
            Job::Block { .. } => "block",
            Job::Analyze => "analyze",
            Job::Eigenvalues => "eigenvalues",
            Job::Fuchsify => "fuchsify",
            Job::FuchsifyAt(_) => "fuchsify-at",
            Job::Normalize => "normalize",
            Job::FactorEp => "factorep",
            Job::FactorEpAt(_) => "factorep-at",
            Job::LeftRanks => "left-ranks",
            Job::LeftReduce(_) => "left-reduce",
            Job::LeftFuchsify => "left-fuchsify",
            Job::LeftFuchsifyAt(_) => "left-fuchsify-at",
            Job::Jordan(_) => "jordan",
            Job::JordanEp(_) => "jordan-ep",
        }
    }
}

/// User-facing block ranges are 1-based inclusive; `end` 0 (or negative)
/// extends to the full dimension.
fn block_range(start: i64, end: i64) -> Result<(usize, Option<usize>)> {
    if start < 1 {
        bail!("block start must be >= 1");
    }
    let start = (start - 1) as usize;
    let end = if end < 1 { None } else { Some((end - 1) as usize) };
    if let Some(end) = end {
        if end < start {
            bail!("block end must be >= start");
        }
    }
    Ok((start, end))
}

fn parse_jobs(args: &[String]) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    let mut it = args.iter();

    while let Some(arg) = it.next() {
        let mut next = |flag: &str| -> Result<String> {
            it.next()
                .map(String::clone)
                .with_context(|| format!("missing argument for --{flag}"))
        };

        let job = match arg.as_str() {
            "--load" => {
                let file = next("load")?;
                let start: i64 = next("load")?.parse().context("bad <start>")?;
                let end: i64 = next("load")?.parse().context("bad <end>")?;
                let (start, end) = block_range(start, end)?;
                Job::Load { file, start, end }
            }
            "--write" => Job::Write(next("write")?),
            "--queue" => Job::Queue {
                file: next("queue")?,
                append: false,
            },
            "--queue-append" => Job::Queue {
                file: next("queue-append")?,
                append: true,
            },
            "--load-queue" => Job::LoadQueue(next("load-queue")?),
            "--replay" => Job::Replay,
            "--export" => Job::Export(next("export")?),
            "--block" => {
                let start: i64 = next("block")?.parse().context("bad <start>")?;
                let end: i64 = next("block")?.parse().context("bad <end>")?;
                let (start, end) = block_range(start, end)?;
                Job::Block { start, end }
            }
            "--analyze" => Job::Analyze,
            "--eigenvalues" => Job::Eigenvalues,
            "--fuchsify" => Job::Fuchsify,
            "--fuchsify-at" => Job::FuchsifyAt(next("fuchsify-at")?),
            "--normalize" => Job::Normalize,
            "--factorep" => Job::FactorEp,
            "--factorep-at" => {
                Job::FactorEpAt(next("factorep-at")?.parse().context("bad <mu>")?)
            }
            "--left-ranks" => Job::LeftRanks,
            "--left-reduce" => Job::LeftReduce(next("left-reduce")?),
            "--left-fuchsify" => Job::LeftFuchsify,
            "--left-fuchsify-at" => Job::LeftFuchsifyAt(next("left-fuchsify-at")?),
            "--jordan" => Job::Jordan(next("jordan")?),
            "--jordan-ep" => Job::JordanEp(next("jordan-ep")?),
            other => bail!("unknown job {other}"),
        };
        jobs.push(job);
    }

    Ok(jobs)
}

fn run_jobs(engine: &Engine, config: SystemConfig, jobs: &[Job], timings: bool) -> Result<()> {
    let mut system: Option<System> = None;

    fn current<'a>(system: &'a mut Option<System>) -> Result<&'a mut System> {
        system.as_mut().context("no system loaded")
    }

    for job in jobs {
        let started = Instant::now();

        match job {
            Job::Load { file, start, end } => {
                system = Some(
                    System::load(engine, file, *start, *end, config)
                        .with_context(|| format!("loading {file}"))?,
                );
                info!("loaded system from {file}.");
            }
            Job::Write(file) => {
                current(&mut system)?.write(file)?;
                info!("system written to {file}.");
            }
            Job::Queue { file, append } => {
                current(&mut system)?.queue().set_file(file, *append)?;
                info!(
                    "set transformation queue to {file}{}.",
                    if *append { " (append mode)" } else { "" }
                );
            }
            Job::LoadQueue(file) => {
                current(&mut system)?.queue().load(file)?;
                info!("loaded queue from {file}.");
            }
            Job::Replay => {
                info!("replay");
                current(&mut system)?.replay()?;
            }
            Job::Export(file) => {
                info!("export");
                let sys = current(&mut system)?;
                sys.queue().export(file)?;
                info!("transformation matrix exported to {file}.");
            }
            Job::Block { start, end } => {
                let old = current(&mut system)?;
                let queue_file = old.queue().filename().map(str::to_string);
                let mut fresh = old.reblock(*start, *end)?;
                if let Some(file) = queue_file {
                    fresh.queue().set_file(&file, true)?;
                }
                system = Some(fresh);
                match end {
                    Some(end) => info!("block [{},{}] activated.", start + 1, end + 1),
                    None => info!("block [{},-] activated.", start + 1),
                }
            }
            Job::Analyze => {
                info!("analyze");
                current(&mut system)?.analyze()?;
            }
            Job::Eigenvalues => {
                info!("eigenvalues");
                current(&mut system)?.print_eigenvalues()?;
            }
            Job::Fuchsify => {
                info!("fuchsify");
                current(&mut system)?.fuchsify()?;
            }
            Job::FuchsifyAt(sing) => {
                info!("fuchsify @ {sing}");
                let sys = current(&mut system)?;
                let point = SingPoint::parse(engine, sing)?;
                sys.fuchsify_at(&point)?;
            }
            Job::Normalize => {
                info!("normalize");
                current(&mut system)?.normalize()?;
            }
            Job::FactorEp => {
                info!("factor ep");
                current(&mut system)?.factor_ep()?;
            }
            Job::FactorEpAt(mu) => {
                info!("factor ep @ mu={mu}");
                current(&mut system)?.factor_ep_at(*mu)?;
            }
            Job::LeftRanks => {
                info!("left-ranks");
                current(&mut system)?.left_ranks()?;
            }
            Job::LeftReduce(sing) => {
                info!("left-reduce @ {sing}");
                let sys = current(&mut system)?;
                let point = SingPoint::parse(engine, sing)?;
                sys.left_reduce(&point)?;
            }
            Job::LeftFuchsify => {
                info!("left-fuchsify");
                current(&mut system)?.left_fuchsify()?;
            }
            Job::LeftFuchsifyAt(sing) => {
                info!("left-fuchsify @ {sing}");
                let sys = current(&mut system)?;
                let point = SingPoint::parse(engine, sing)?;
                sys.left_fuchsify_at(&point)?;
            }
            Job::Jordan(sing) => {
                info!("jordan @ {sing}");
                let sys = current(&mut system)?;
                let point = SingPoint::parse(engine, sing)?;
                sys.jordan_transform(&point, false)?;
            }
            Job::JordanEp(sing) => {
                info!("jordan-ep @ {sing}");
                let sys = current(&mut system)?;
                let point = SingPoint::parse(engine, sing)?;
                sys.jordan_transform(&point, true)?;
            }
        }

        if timings {
            info!("[{}] {:.3}s", job.name(), started.elapsed().as_secs_f64());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "info,epsform_engine=trace"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let jobs = parse_jobs(&cli.jobs)?;
    if jobs.is_empty() {
        bail!("no jobs given; see --help");
    }

    let engine_path = cli
        .engine
        .clone()
        .or_else(|| std::env::var("EPSFORM_ENGINE").ok())
        .unwrap_or_else(|| "epsworker".to_string());

    let engine = Engine::start(&engine_path, &[])
        .with_context(|| format!("starting worker {engine_path}"))?;

    if let Some(symbols) = &cli.symbols {
        for sym in symbols.split(',').filter(|s| !s.is_empty()) {
            engine.add_symbol(sym)?;
        }
    }
    engine.add_symbol("ep")?;
    engine.add_symbol("t")?;

    let config = SystemConfig {
        engine_echelon: cli.echelon_engine,
        ev_denom: if cli.half_ev { 2 } else { cli.ev_denom },
    };

    let total = Instant::now();
    run_jobs(&engine, config, &jobs, cli.timings)?;

    if cli.timings {
        info!("[total time] {:.3}s", total.elapsed().as_secs_f64());
    }

    Ok(())
}
