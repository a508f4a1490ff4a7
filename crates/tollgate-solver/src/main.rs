//! # tollgate-solve
//!
//! Command-line client for a Gatehouse instance.
//!
//! ## Usage
//! ```bash
//! # Full flow: CSRF token, challenge, solve, verify
//! tollgate-solve login --url http://127.0.0.1:8787 --action signup
//!
//! # Solve a saved challenge offline, print the verify payload
//! curl -s http://127.0.0.1:8787/challenge | tollgate-solve solve --threads 0
//! ```
//!
//! Exit codes: 0 verified (or degraded with `--fail-open`), 1 failed,
//! 2 attempt ceiling reached.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tollgate_common::constants::{DEFAULT_ACTION, DEFAULT_NETWORK_TIMEOUT_SECS};
use tollgate_common::{Challenge, VerifyPayload};
use tollgate_solver::client::GateClient;
use tollgate_solver::flow::{FailurePolicy, FlowConfig, FlowOutcome, FlowState, LoginFlow};
use tollgate_solver::solver::{SolveOptions, solve_parallel};
use tollgate_solver::{CancellationToken, ClientError, SolveError};

/// Tollgate proof-of-work client
#[derive(Parser, Debug)]
#[command(name = "tollgate-solve")]
#[command(author, version, about = "Solve Tollgate proof-of-work challenges", long_about = None)]
struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full login flow against a Gatehouse instance
    Login {
        /// Gatehouse base URL
        #[arg(short, long, env = "TOLLGATE_URL", default_value = "http://127.0.0.1:8787")]
        url: String,

        /// Action label to request a challenge for
        #[arg(short, long, default_value = DEFAULT_ACTION)]
        action: String,

        /// Per-call network deadline in seconds
        #[arg(long, default_value_t = DEFAULT_NETWORK_TIMEOUT_SECS)]
        timeout: u64,

        /// Continue with a placeholder token when the gate is unreachable
        #[arg(long)]
        fail_open: bool,

        /// Maximum candidates to try (default: from the challenge)
        #[arg(long)]
        max_attempts: Option<u64>,

        /// Hide the progress spinner
        #[arg(long)]
        quiet: bool,
    },

    /// Solve a challenge JSON and print the verify payload
    Solve {
        /// Challenge file, or '-' for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Number of threads (0 = auto-detect)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Maximum candidates to try (default: from the challenge)
        #[arg(long)]
        max_attempts: Option<u64>,

        /// Override the challenge's difficulty
        #[arg(long)]
        difficulty: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let code = match cli.command {
        Command::Login {
            url,
            action,
            timeout,
            fail_open,
            max_attempts,
            quiet,
        } => {
            let client = GateClient::with_timeout(url, Duration::from_secs(timeout))
                .context("Failed to build HTTP client")?;
            let config = FlowConfig {
                action,
                policy: if fail_open {
                    FailurePolicy::FailOpen
                } else {
                    FailurePolicy::FailClosed
                },
                solve: SolveOptions {
                    max_attempts,
                    ..Default::default()
                },
            };
            login(client, config, quiet).await
        }
        Command::Solve {
            input,
            threads,
            max_attempts,
            difficulty,
        } => {
            let challenge = read_challenge(&input)?;
            let options = SolveOptions {
                difficulty,
                max_attempts,
            };
            solve(challenge, options, threads).await?
        }
    };

    std::process::exit(code);
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for results
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .context("Failed to install log subscriber")
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

async fn login(client: GateClient, config: FlowConfig, quiet: bool) -> i32 {
    let mut flow = LoginFlow::new(client, config);
    cancel_on_ctrl_c(flow.cancellation());

    let pb = spinner(quiet);
    let mut states = flow.subscribe();
    let pb_state = pb.clone();
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let message = match &*states.borrow_and_update() {
                FlowState::Idle => "Starting",
                FlowState::ChallengeRequested => "Requesting challenge",
                FlowState::Solving => "Solving",
                FlowState::Verifying => "Verifying",
                _ => break,
            };
            pb_state.set_message(message);
        }
    });

    let outcome = flow.run().await;
    watcher.abort();
    pb.finish_and_clear();

    match outcome {
        FlowOutcome::Verified { payload, solution } => {
            eprintln!("✅ Verified");
            eprintln!("   Attempts: {}", format_number(solution.attempts));
            eprintln!("   Time: {:.2?}", solution.took);
            print_payload(&payload);
            0
        }
        FlowOutcome::Degraded { placeholder, cause } => {
            eprintln!("⚠️  Gate unavailable ({}), bot protection bypassed", cause);
            println!("{}", placeholder);
            0
        }
        FlowOutcome::Failed(ClientError::Solve(SolveError::Exhausted { attempts })) => {
            eprintln!("⏱️  No solution within {} attempts", format_number(attempts));
            2
        }
        FlowOutcome::Failed(e) => {
            eprintln!("❌ Verification failed: {}", e);
            1
        }
        FlowOutcome::Cancelled => {
            eprintln!("❌ Interrupted");
            1
        }
    }
}

async fn solve(challenge: Challenge, options: SolveOptions, threads: usize) -> Result<i32> {
    let threads = if threads == 0 { num_cpus() } else { threads };
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let difficulty = options.difficulty_for(&challenge);
    eprintln!("🔍 Difficulty: {} leading zeros, {} threads", difficulty, threads);

    let pb = spinner(false);
    let progress = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let ticker = {
        let pb = pb.clone();
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            while !cancel.is_cancelled() {
                interval.tick().await;
                let count = progress.load(Ordering::Relaxed);
                let rate = count / start.elapsed().as_secs().max(1);
                pb.set_message(format!(
                    "Attempts: {} | Rate: {}/s",
                    format_number(count),
                    format_number(rate)
                ));
            }
        })
    };

    let worker = {
        let challenge = challenge.clone();
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || solve_parallel(&challenge, &options, &cancel, &progress))
    };
    let result = worker.await.context("Solver worker failed")?;

    ticker.abort();
    pb.finish_and_clear();

    match result {
        Ok(solution) => {
            eprintln!(
                "✅ Solved: n = {} after {} attempts in {:.2?}",
                solution.number,
                format_number(solution.attempts),
                solution.took
            );
            print_payload(&VerifyPayload::from_challenge(&challenge, solution.number));
            Ok(0)
        }
        Err(SolveError::Exhausted { attempts }) => {
            eprintln!("⏱️  No solution within {} attempts", format_number(attempts));
            eprintln!("💡 Increase --max-attempts or lower --difficulty");
            Ok(2)
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            Ok(1)
        }
    }
}

fn read_challenge(input: &str) -> Result<Challenge> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read challenge from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };

    // A full `/challenge` response works too; `success` is ignored
    serde_json::from_str(&raw).context("Invalid challenge JSON")
}

fn print_payload(payload: &VerifyPayload) {
    match serde_json::to_string(payload) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode payload: {}", e),
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
