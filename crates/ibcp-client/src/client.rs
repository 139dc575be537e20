//! Client Portal gateway client and session lifecycle.
//!
//! [`GatewayClient::connect`] validates SSO, polls the brokerage session
//! status, re-authenticates a bounded number of times when the gateway is
//! connected but not authenticated, and starts the heartbeat.
//!
//! # Example
//!
//! ```ignore
//! use ibcp_client::{ClientConfig, GatewayClient};
//!
//! #[tokio::main]
//! async fn main() -> ibcp_client::Result<()> {
//!     let client = GatewayClient::connect(ClientConfig::default()).await?;
//!
//!     let account = client.selected_account().await?;
//!     println!("Trading account: {account}");
//!
//!     client.logout().await
//! }
//! ```

use crate::config::ClientConfig;
use crate::endpoints::Endpoint;
use crate::error::{GatewayError, Result};
use crate::heartbeat::{HeartbeatHandle, HeartbeatStatus};
use crate::session::{SessionState, SharedSession};
use crate::transport::{invoke_typed, GatewayRequest, HttpTransport, Transport};
use crate::types::{AuthStatus, LogoutResponse, ReauthenticateResponse, SsoValidation};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;

/// Re-authentication requests a single connect may issue.
pub const MAX_REAUTH_ATTEMPTS: u32 = 2;

/// Where the client's heartbeat is in its lifecycle.
#[derive(Debug)]
enum HeartbeatSlot {
    NotStarted,
    Active(HeartbeatHandle),
    /// A stop is joining the task; the receiver still sees its progress.
    Stopping(watch::Receiver<HeartbeatStatus>),
    Stopped(HeartbeatStatus),
}

/// What a `stop_heartbeat` caller has to do after inspecting the slot.
enum StopStep {
    Join(HeartbeatHandle),
    Wait(watch::Receiver<HeartbeatStatus>),
    Done(HeartbeatStatus),
}

/// Client Portal gateway client.
///
/// Owns the session state and at most one heartbeat. Dropping the client
/// stops its heartbeat.
pub struct GatewayClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session: SharedSession,
    heartbeat: Mutex<HeartbeatSlot>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.config.base_url)
            .field("session", &self.session.snapshot())
            .field("heartbeat", &self.heartbeat_status())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Creates a client over HTTP without contacting the gateway.
    ///
    /// # Errors
    /// Returns a configuration error if the HTTP transport cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a client over a custom transport without contacting the gateway.
    ///
    /// # Errors
    /// Returns a configuration error if the settings are invalid.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            session: SharedSession::new(),
            heartbeat: Mutex::new(HeartbeatSlot::NotStarted),
        })
    }

    /// Connects to the gateway over HTTP and establishes the session.
    ///
    /// # Errors
    /// - Transport errors from SSO validation, status or re-authentication.
    /// - [`GatewayError::NotConnected`] if the gateway has no brokerage session.
    /// - [`GatewayError::NotAuthenticated`] if re-authentication did not succeed
    ///   within [`MAX_REAUTH_ATTEMPTS`].
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.establish().await?;
        Ok(client)
    }

    /// Connects over a custom transport and establishes the session.
    ///
    /// # Errors
    /// Same as [`GatewayClient::connect`].
    pub async fn connect_with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let client = Self::with_transport(config, transport)?;
        client.establish().await?;
        Ok(client)
    }

    async fn establish(&self) -> Result<()> {
        let level = self.config.log_level;

        let user = self.validate_sso().await.map_err(|e| {
            gateway_log!(level, Error, error = %e, "Failed to validate SSO");
            e
        })?;
        gateway_log!(level, Debug, user = ?user.user_name, "SSO validated");

        let mut reauth_attempts = 0;
        loop {
            let state = self.session_status().await?;

            if !state.connected {
                gateway_log!(
                    level,
                    Error,
                    "Not connected to gateway, please log in to the Client Portal gateway again"
                );
                return Err(GatewayError::NotConnected);
            }

            if state.authenticated {
                gateway_log!(
                    level,
                    Info,
                    base_url = %self.config.base_url,
                    reauth_attempts,
                    competing = state.competing,
                    "Gateway session established"
                );
                if self.config.auto_tickle {
                    self.start_heartbeat()?;
                }
                return Ok(());
            }

            if reauth_attempts >= MAX_REAUTH_ATTEMPTS {
                gateway_log!(
                    level,
                    Error,
                    reauth_attempts,
                    "Session still unauthenticated after re-authentication"
                );
                return Err(GatewayError::NotAuthenticated);
            }

            reauth_attempts += 1;
            gateway_log!(level, Warning, attempt = reauth_attempts, "Session not authenticated, re-authenticating");
            self.reauthenticate().await?;
            tokio::time::sleep(self.config.reauth_grace()).await;
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Consistent snapshot of the session state.
    #[must_use]
    pub fn session(&self) -> SessionState {
        self.session.snapshot()
    }

    /// Returns true if the last known state is connected and authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.snapshot().is_ready()
    }

    /// Sends a request and decodes the reply, logging failures.
    ///
    /// Brokerage endpoints are refused locally unless the session is ready.
    pub(crate) async fn call<T: DeserializeOwned>(&self, request: GatewayRequest) -> Result<T> {
        if !request.endpoint.is_session_endpoint() {
            self.ensure_authenticated()?;
        }
        let name = request.endpoint.name();
        invoke_typed(self.transport.as_ref(), request)
            .await
            .map_err(|e| {
                gateway_log!(self.config.log_level, Error, endpoint = name, error = %e, "Gateway call failed");
                e
            })
    }

    /// Fails with [`GatewayError::NotAuthenticated`] unless the last known
    /// state is connected and authenticated.
    pub(crate) fn ensure_authenticated(&self) -> Result<()> {
        if self.session.snapshot().is_ready() {
            Ok(())
        } else {
            Err(GatewayError::NotAuthenticated)
        }
    }

    // =========================================================================
    // Session Endpoints
    // =========================================================================

    /// Validates the SSO session and returns the user record.
    ///
    /// # Errors
    /// Returns a transport error if the call fails.
    pub async fn validate_sso(&self) -> Result<SsoValidation> {
        self.call(Endpoint::ValidateSso.into()).await
    }

    /// Re-fetches the brokerage session status and overwrites the local state.
    ///
    /// # Errors
    /// Returns a transport error if the call fails; the state is left untouched.
    pub async fn session_status(&self) -> Result<SessionState> {
        let status: AuthStatus = self.call(Endpoint::SessionStatus.into()).await?;
        let state = self.session.apply_status(&status);
        gateway_log!(
            self.config.log_level,
            Info,
            connected = state.connected,
            authenticated = state.authenticated,
            competing = state.competing,
            message = ?state.message,
            "Session status"
        );
        Ok(state)
    }

    /// Checks that the session is still valid.
    ///
    /// # Errors
    /// - Transport errors unchanged.
    /// - [`GatewayError::SessionExpired`] if the gateway reports no remaining lifetime.
    pub async fn tickle(&self) -> Result<SsoValidation> {
        let reply = self.validate_sso().await?;
        gateway_log!(self.config.log_level, Info, expires = ?reply.expires, "Tickle");
        if !reply.is_valid() {
            return Err(GatewayError::SessionExpired);
        }
        Ok(reply)
    }

    /// Asks the gateway to re-authenticate the brokerage session.
    ///
    /// Does not poll status afterwards.
    ///
    /// # Errors
    /// Returns a transport error if the call fails.
    pub async fn reauthenticate(&self) -> Result<()> {
        let reply: ReauthenticateResponse = self.call(Endpoint::Reauthenticate.into()).await?;
        gateway_log!(self.config.log_level, Debug, message = ?reply.message, "Re-authentication requested");
        Ok(())
    }

    /// Stops the heartbeat and ends the gateway session.
    ///
    /// The heartbeat is stopped even if the logout call fails. Afterwards
    /// brokerage operations fail with [`GatewayError::NotAuthenticated`].
    ///
    /// # Errors
    /// Returns a transport error if the logout call fails.
    pub async fn logout(&self) -> Result<()> {
        let heartbeat = self.stop_heartbeat().await;
        gateway_log!(self.config.log_level, Debug, ticks = heartbeat.ticks(), "Heartbeat stopped for logout");

        let reply: LogoutResponse = self.call(Endpoint::Logout.into()).await?;
        self.session.mark_logged_out();
        gateway_log!(self.config.log_level, Info, status = ?reply.status, "Logged out");
        Ok(())
    }

    // =========================================================================
    // Heartbeat Control
    // =========================================================================

    /// Starts the heartbeat.
    ///
    /// Only one heartbeat can ever run per client; once stopped it cannot be
    /// restarted, a new connect is required.
    ///
    /// # Errors
    /// - [`GatewayError::NotAuthenticated`] if the session is not ready.
    /// - [`GatewayError::HeartbeatAlreadyStarted`] on a second start.
    /// - [`GatewayError::Configuration`] outside a Tokio runtime.
    pub fn start_heartbeat(&self) -> Result<()> {
        self.ensure_authenticated()?;

        let mut slot = self.heartbeat.lock();
        if !matches!(*slot, HeartbeatSlot::NotStarted) {
            return Err(GatewayError::HeartbeatAlreadyStarted);
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(GatewayError::Configuration(
                "heartbeat requires a Tokio runtime".to_string(),
            ));
        }

        *slot = HeartbeatSlot::Active(HeartbeatHandle::spawn(
            Arc::clone(&self.transport),
            self.session.clone(),
            self.config.tickle_interval(),
            self.config.log_level,
        ));
        Ok(())
    }

    /// Stops the heartbeat, waiting for it to end, and returns its final status.
    ///
    /// Concurrent callers all wait for the same task and see the same result.
    pub async fn stop_heartbeat(&self) -> HeartbeatStatus {
        let handle = match self.begin_stop() {
            StopStep::Join(handle) => handle,
            StopStep::Wait(status_rx) => return wait_for_stop(status_rx).await,
            StopStep::Done(status) => return status,
        };

        let status_rx = handle.subscribe();
        let outcome = handle.stop().await;
        let status = status_rx.borrow().clone();
        let final_status = if status.is_stopped() {
            status
        } else {
            HeartbeatStatus::Stopped {
                ticks: status.ticks(),
                error: outcome.err(),
            }
        };

        *self.heartbeat.lock() = HeartbeatSlot::Stopped(final_status.clone());
        final_status
    }

    /// Claims the heartbeat for stopping under the slot lock.
    fn begin_stop(&self) -> StopStep {
        let mut slot = self.heartbeat.lock();
        match std::mem::replace(&mut *slot, HeartbeatSlot::NotStarted) {
            HeartbeatSlot::Active(handle) => {
                *slot = HeartbeatSlot::Stopping(handle.subscribe());
                StopStep::Join(handle)
            }
            HeartbeatSlot::Stopping(status_rx) => {
                *slot = HeartbeatSlot::Stopping(status_rx.clone());
                StopStep::Wait(status_rx)
            }
            HeartbeatSlot::Stopped(status) => {
                *slot = HeartbeatSlot::Stopped(status.clone());
                StopStep::Done(status)
            }
            HeartbeatSlot::NotStarted => {
                let status = HeartbeatStatus::Stopped {
                    ticks: 0,
                    error: None,
                };
                *slot = HeartbeatSlot::Stopped(status.clone());
                StopStep::Done(status)
            }
        }
    }

    /// Current heartbeat status.
    #[must_use]
    pub fn heartbeat_status(&self) -> HeartbeatStatus {
        match &*self.heartbeat.lock() {
            HeartbeatSlot::NotStarted => HeartbeatStatus::NotStarted,
            HeartbeatSlot::Active(handle) => handle.status(),
            HeartbeatSlot::Stopping(status_rx) => status_rx.borrow().clone(),
            HeartbeatSlot::Stopped(status) => status.clone(),
        }
    }

    /// Receiver for heartbeat status changes, until the heartbeat has been
    /// stopped.
    ///
    /// The final [`HeartbeatStatus::Stopped`] value carries the error that
    /// ended the heartbeat.
    #[must_use]
    pub fn heartbeat_watch(&self) -> Option<watch::Receiver<HeartbeatStatus>> {
        match &*self.heartbeat.lock() {
            HeartbeatSlot::Active(handle) => Some(handle.subscribe()),
            HeartbeatSlot::Stopping(status_rx) => Some(status_rx.clone()),
            _ => None,
        }
    }
}

/// Waits for a heartbeat another caller is stopping.
async fn wait_for_stop(mut status_rx: watch::Receiver<HeartbeatStatus>) -> HeartbeatStatus {
    let outcome = status_rx
        .wait_for(HeartbeatStatus::is_stopped)
        .await
        .map(|status| status.clone());
    match outcome {
        Ok(status) => status,
        // Task gone without a final status.
        Err(_) => HeartbeatStatus::Stopped {
            ticks: status_rx.borrow().ticks(),
            error: Some(GatewayError::HeartbeatAborted(
                "heartbeat ended without a final status".to_string(),
            )),
        },
    }
}
