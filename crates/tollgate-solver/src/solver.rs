//! Proof-of-work search.
//!
//! Finds the smallest `n` such that `sha256(salt || challenge || n)` has the
//! required number of leading `'0'` hex characters. The search is always
//! bounded and always cancellable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tollgate_common::constants::{ALGORITHM, DEFAULT_DIFFICULTY, DEFAULT_MAX_NUMBER};
use tollgate_common::{Challenge, protocol};

use crate::error::SolveError;

/// Ceiling used when neither the caller nor the challenge sets one
pub const DEFAULT_MAX_ATTEMPTS: u64 = DEFAULT_MAX_NUMBER + 1;

/// Iterations between cancellation checks
pub const YIELD_EVERY: u64 = 1024;

/// Search parameters
#[derive(Debug, Clone, Default)]
pub struct SolveOptions {
    /// Overrides the challenge's difficulty
    pub difficulty: Option<usize>,

    /// Overrides the ceiling derived from the challenge's `maxnumber`
    pub max_attempts: Option<u64>,
}

impl SolveOptions {
    /// Explicit option, else the challenge's value, else the default
    pub fn difficulty_for(&self, challenge: &Challenge) -> usize {
        self.difficulty
            .or(challenge.difficulty)
            .unwrap_or(DEFAULT_DIFFICULTY)
    }

    /// Number of candidates to try: `0..ceiling`
    pub fn max_attempts_for(&self, challenge: &Challenge) -> u64 {
        self.max_attempts
            .or_else(|| challenge.max_number.map(|max| max.saturating_add(1)))
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }
}

/// A qualifying number and how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub number: u64,
    pub hash: String,
    pub attempts: u64,
    pub took: Duration,
}

fn check(challenge: &Challenge, options: &SolveOptions) -> Result<(usize, u64), SolveError> {
    if challenge.algorithm != ALGORITHM {
        return Err(SolveError::UnsupportedAlgorithm(challenge.algorithm.clone()));
    }

    let difficulty = options.difficulty_for(challenge);
    if difficulty > protocol::MAX_DIFFICULTY {
        return Err(SolveError::InvalidDifficulty(difficulty));
    }

    Ok((difficulty, options.max_attempts_for(challenge)))
}

/// Sequential search on the calling thread
pub fn solve(
    challenge: &Challenge,
    options: &SolveOptions,
    cancel: &CancellationToken,
) -> Result<Solution, SolveError> {
    let (difficulty, ceiling) = check(challenge, options)?;
    let start = Instant::now();

    for number in 0..ceiling {
        if number % YIELD_EVERY == 0 && cancel.is_cancelled() {
            tracing::debug!(attempts = number, "Solve cancelled");
            return Err(SolveError::Cancelled);
        }

        let hash = protocol::solution_hash(&challenge.salt, &challenge.challenge, number);
        if protocol::meets_difficulty(&hash, difficulty) {
            let solution = Solution {
                number,
                hash,
                attempts: number + 1,
                took: start.elapsed(),
            };
            tracing::debug!(
                difficulty = difficulty,
                attempts = solution.attempts,
                took_ms = solution.took.as_millis() as u64,
                "Challenge solved"
            );
            return Ok(solution);
        }
    }

    tracing::debug!(difficulty = difficulty, attempts = ceiling, "Solve exhausted");
    Err(SolveError::Exhausted { attempts: ceiling })
}

/// Run [`solve`] on a blocking worker.
///
/// Dropping the returned future cancels the search as well.
pub async fn solve_async(
    challenge: Challenge,
    options: SolveOptions,
    cancel: CancellationToken,
) -> Result<Solution, SolveError> {
    let worker = cancel.child_token();
    let _stop_on_drop = worker.clone().drop_guard();

    tokio::task::spawn_blocking(move || solve(&challenge, &options, &worker))
        .await
        .map_err(|e| SolveError::Worker(e.to_string()))?
}

/// Parallel search on the rayon pool.
///
/// Returns the same number as [`solve`]. `progress` counts hashed candidates
/// across all workers, so `attempts` may exceed `number + 1`.
pub fn solve_parallel(
    challenge: &Challenge,
    options: &SolveOptions,
    cancel: &CancellationToken,
    progress: &AtomicU64,
) -> Result<Solution, SolveError> {
    let (difficulty, ceiling) = check(challenge, options)?;
    let start = Instant::now();

    let found = (0..ceiling).into_par_iter().find_map_first(|number| {
        if cancel.is_cancelled() {
            return Some(Err(SolveError::Cancelled));
        }
        progress.fetch_add(1, Ordering::Relaxed);

        let hash = protocol::solution_hash(&challenge.salt, &challenge.challenge, number);
        protocol::meets_difficulty(&hash, difficulty).then_some(Ok((number, hash)))
    });

    match found {
        Some(Ok((number, hash))) => Ok(Solution {
            number,
            hash,
            attempts: progress.load(Ordering::Relaxed),
            took: start.elapsed(),
        }),
        Some(Err(e)) => Err(e),
        None => Err(SolveError::Exhausted { attempts: ceiling }),
    }
}
