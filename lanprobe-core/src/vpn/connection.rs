//! Connection state controller
//!
//! Drives the client between Disconnected and Connected and blocks until the
//! client reports the target state. This is the only writer of the harness'
//! view of the connection state; everything else reads it through `state()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ControlError;
use crate::vpn::control::VpnControl;
use crate::vpn::poll::{poll_until, PollOutcome};
use crate::vpn::state::ConnectionState;

pub struct ConnectionController {
    client: Arc<dyn VpnControl>,
    poll_interval: Duration,
    state: ConnectionState,
}

impl ConnectionController {
    pub fn new(client: Arc<dyn VpnControl>, config: &ClientConfig) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval(),
            state: ConnectionState::default(),
        }
    }

    /// Last state observed from the client
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Re-query the client and return the fresh state
    pub async fn refresh(&mut self) -> Result<&ConnectionState, ControlError> {
        self.state = self.client.connection_state().await?;
        Ok(&self.state)
    }

    /// Connect and wait until the client reports Connected
    ///
    /// Succeeds immediately when already connected.
    #[tracing::instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn connect(&mut self, timeout: Duration) -> Result<(), ControlError> {
        self.transition(ConnectionState::Connected, timeout).await
    }

    /// Disconnect and wait until the client reports Disconnected
    ///
    /// Succeeds immediately when already disconnected.
    #[tracing::instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn disconnect(&mut self, timeout: Duration) -> Result<(), ControlError> {
        self.transition(ConnectionState::Disconnected, timeout).await
    }

    /// Best-effort disconnect used for teardown after a failure
    ///
    /// Errors are logged and returned but never panic, so callers can keep
    /// going with the next scenario.
    pub async fn force_disconnect(&mut self, timeout: Duration) -> Result<(), ControlError> {
        match self.disconnect(timeout).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Forced disconnect failed: {}", e);
                Err(e)
            }
        }
    }

    async fn transition(
        &mut self,
        target: ConnectionState,
        timeout: Duration,
    ) -> Result<(), ControlError> {
        let current = self.refresh().await?.clone();
        if current == target {
            debug!("Already {}, nothing to do", target);
            return Ok(());
        }

        info!("Requesting {} (currently {})", target, current);
        match target {
            ConnectionState::Connected => self.client.connect().await?,
            _ => self.client.disconnect().await?,
        }

        // Once the client has moved away from where it started, seeing the
        // starting state again means the request failed
        let left_origin = AtomicBool::new(false);
        let client = Arc::clone(&self.client);
        let outcome = poll_until(
            self.poll_interval,
            timeout,
            || client.connection_state(),
            |observed| {
                if *observed == target {
                    return true;
                }
                let back = current.is_terminal()
                    && left_origin.load(Ordering::Relaxed)
                    && *observed == current;
                if *observed != current {
                    left_origin.store(true, Ordering::Relaxed);
                }
                back
            },
        )
        .await;

        match outcome {
            Ok(PollOutcome::Settled(state)) if state == target => {
                self.state = state;
                info!("Client is {}", self.state);
                Ok(())
            }
            Ok(PollOutcome::Settled(state)) => {
                warn!("Client fell back to {} while moving to {}", state, target);
                self.state = state.clone();
                Err(ControlError::TransitionAbandoned { target, state })
            }
            Ok(PollOutcome::TimedOut { last, elapsed }) => {
                warn!("Client did not reach {} in time, last state {}", target, last);
                self.state = last.clone();
                Err(ControlError::StateTimeout {
                    target,
                    last,
                    elapsed_ms: elapsed.as_millis() as u64,
                })
            }
            Err(e) => Err(e),
        }
    }
}
