//! Composite login flow.
//!
//! ```text
//! Idle -> ChallengeRequested -> Solving -> Verifying -> Verified
//!                 \________________\___________\_____-> Failed | Degraded
//! ```
//!
//! Each attempt starts from `Idle`. What happens on an infrastructure
//! failure is decided by [`FailurePolicy`]; failing open is logged loudly
//! because it means the attempt proceeds without bot protection.

use std::time::Duration;

use rand::Rng;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tollgate_common::VerifyPayload;
use tollgate_common::constants::DEFAULT_ACTION;

use crate::bridge::WidgetEvent;
use crate::client::GateClient;
use crate::error::{ClientError, SolveError};
use crate::solver::{Solution, SolveOptions, solve_async};

/// Observable flow state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    ChallengeRequested,
    Solving,
    Verifying,
    Verified,
    Failed { reason: String },
    /// Continued without verification under `FailOpen`
    Degraded { placeholder: String },
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Verified | Self::Failed { .. } | Self::Degraded { .. }
        )
    }
}

/// What to do when the pipeline breaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Surface the failure
    #[default]
    FailClosed,
    /// Substitute a locally generated placeholder token on timeouts,
    /// network errors and server-side faults. Explicit rejections
    /// (bad CSRF, failed verification) still fail.
    FailOpen,
}

/// Flow parameters
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub action: String,
    pub policy: FailurePolicy,
    pub solve: SolveOptions,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            action: DEFAULT_ACTION.to_string(),
            policy: FailurePolicy::default(),
            solve: SolveOptions::default(),
        }
    }
}

/// Result of one attempt
#[derive(Debug)]
pub enum FlowOutcome {
    Verified {
        payload: VerifyPayload,
        solution: Solution,
    },
    Failed(ClientError),
    Degraded {
        placeholder: String,
        cause: ClientError,
    },
    Cancelled,
}

/// Fetch challenge, solve, verify
pub struct LoginFlow {
    client: GateClient,
    config: FlowConfig,
    state: watch::Sender<FlowState>,
    cancel: CancellationToken,
}

impl LoginFlow {
    pub fn new(client: GateClient, config: FlowConfig) -> Self {
        let (state, _) = watch::channel(FlowState::Idle);
        Self {
            client,
            config,
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Receiver that sees every transition
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    /// Token that aborts the running attempt; clone it before `run`
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fresh cancellation token and `Idle` state after a cancelled attempt
    pub fn reset(&mut self) {
        self.cancel = CancellationToken::new();
        self.transition(FlowState::Idle);
    }

    pub fn client(&self) -> &GateClient {
        &self.client
    }

    /// Run one attempt from `Idle` to a terminal state
    pub async fn run(&mut self) -> FlowOutcome {
        if self.cancel.is_cancelled() {
            return FlowOutcome::Cancelled;
        }
        self.transition(FlowState::Idle);

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.attempt() => result,
        };

        match result {
            Ok((payload, solution)) => {
                tracing::info!(
                    action = %payload.action,
                    attempts = solution.attempts,
                    "Login verification passed"
                );
                self.transition(FlowState::Verified);
                FlowOutcome::Verified { payload, solution }
            }
            Err(ClientError::Cancelled) => {
                tracing::debug!(action = %self.config.action, "Login flow cancelled");
                FlowOutcome::Cancelled
            }
            Err(e) => self.fail(e),
        }
    }

    async fn attempt(&mut self) -> Result<(VerifyPayload, Solution), ClientError> {
        self.transition(FlowState::ChallengeRequested);
        if self.client.csrf_token().is_none() {
            self.client.fetch_csrf_token().await?;
        }
        let challenge = self.client.fetch_challenge(&self.config.action).await?;

        self.transition(FlowState::Solving);
        let solution = solve_async(challenge.clone(), self.config.solve.clone(), self.cancel.clone())
            .await
            .map_err(|e| match e {
                SolveError::Cancelled => ClientError::Cancelled,
                other => ClientError::Solve(other),
            })?;

        self.transition(FlowState::Verifying);
        let payload = VerifyPayload::from_challenge(&challenge, solution.number);
        self.client.verify(&payload).await?;

        Ok((payload, solution))
    }

    fn fail(&mut self, cause: ClientError) -> FlowOutcome {
        if self.config.policy == FailurePolicy::FailOpen && degradable(&cause) {
            let placeholder = placeholder_token();
            tracing::warn!(
                action = %self.config.action,
                reason = cause.kind(),
                error = %cause,
                "Bot protection bypassed: continuing with a placeholder token"
            );
            self.transition(FlowState::Degraded {
                placeholder: placeholder.clone(),
            });
            return FlowOutcome::Degraded { placeholder, cause };
        }

        tracing::info!(
            action = %self.config.action,
            reason = cause.kind(),
            error = %cause,
            "Login verification failed"
        );
        self.transition(FlowState::Failed {
            reason: cause.kind().to_string(),
        });
        FlowOutcome::Failed(cause)
    }

    fn transition(&self, next: FlowState) {
        // Nothing observable happens once the attempt is cancelled
        if self.cancel.is_cancelled() {
            return;
        }
        tracing::debug!(state = ?next, "Login flow transition");
        self.state.send_replace(next);
    }
}

/// Failures a fail-open policy may paper over
fn degradable(cause: &ClientError) -> bool {
    match cause {
        ClientError::Timeout { .. } | ClientError::Network { .. } | ClientError::Decode { .. } => {
            true
        }
        ClientError::Rejected { status, .. } => *status >= 500,
        ClientError::Solve(_) => true,
        ClientError::Cancelled | ClientError::Widget(_) => false,
    }
}

/// Locally generated stand-in; carries no proof of anything
fn placeholder_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    format!("placeholder-{}", hex::encode(bytes))
}

/// Verify a third-party CAPTCHA widget result.
///
/// Waits up to `wait` for the widget's event from a
/// [`WidgetBridge`](crate::bridge::WidgetBridge) registration, then passes
/// the token to `/verify-captcha`.
pub async fn captcha_login(
    client: &mut GateClient,
    events: oneshot::Receiver<WidgetEvent>,
    wait: Duration,
    cancel: &CancellationToken,
) -> Result<(), ClientError> {
    let event = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ClientError::Cancelled),
        event = tokio::time::timeout(wait, events) => event,
    };

    let token = match event {
        Err(_) => return Err(ClientError::Widget("no widget response in time".to_string())),
        Ok(Err(_)) => return Err(ClientError::Cancelled),
        Ok(Ok(WidgetEvent::Verified { token })) => token,
        Ok(Ok(WidgetEvent::Error { code })) => {
            return Err(ClientError::Widget(format!("Bot verification failed: {}", code)));
        }
        Ok(Ok(WidgetEvent::Expired)) => {
            return Err(ClientError::Widget("token expired".to_string()));
        }
        Ok(Ok(WidgetEvent::Timeout)) => {
            return Err(ClientError::Widget("widget timed out".to_string()));
        }
    };

    if client.csrf_token().is_none() {
        client.fetch_csrf_token().await?;
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = client.verify_captcha(&token) => result,
    }
}
