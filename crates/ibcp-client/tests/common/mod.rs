//! Shared fixtures for integration tests.
//!
//! [`ScriptedTransport`] replays canned replies per endpoint and records
//! every call with the (possibly paused) Tokio clock, so lifecycle timing
//! can be asserted without a live gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use ibcp_client::{ClientConfig, Endpoint, GatewayError, GatewayRequest, Result, Transport};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// Scripted Transport
// =============================================================================

/// A call seen by the transport.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub at: Instant,
}

/// In-memory transport answering from a per-endpoint script.
///
/// Replies are consumed in order; the last one repeats forever.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<&'static str, VecDeque<Result<serde_json::Value>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the replies for an endpoint.
    pub fn script(
        &self,
        endpoint: Endpoint,
        replies: impl IntoIterator<Item = Result<serde_json::Value>>,
    ) {
        self.replies
            .lock()
            .insert(endpoint.name(), replies.into_iter().collect());
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls made to one endpoint.
    pub fn calls_to(&self, endpoint: &Endpoint) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.endpoint.name() == endpoint.name())
            .cloned()
            .collect()
    }

    pub fn count(&self, endpoint: &Endpoint) -> usize {
        self.calls_to(endpoint).len()
    }

    /// Endpoint names in call order.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|c| c.endpoint.name()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn invoke(&self, request: GatewayRequest) -> Result<serde_json::Value> {
        let name = request.endpoint.name();
        self.calls.lock().push(RecordedCall {
            endpoint: request.endpoint,
            at: Instant::now(),
        });

        let mut replies = self.replies.lock();
        let queue = replies
            .get_mut(name)
            .ok_or_else(|| GatewayError::api(404, format!("no scripted reply for {name}")))?;
        match queue.len() {
            0 => Err(GatewayError::api(404, format!("no scripted reply for {name}"))),
            1 => queue[0].clone(),
            _ => queue
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::api(404, name.to_string()))),
        }
    }
}

// =============================================================================
// Gateway Replies
// =============================================================================

pub fn sso(expires: i64) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "USER_ID": 5551234,
        "USER_NAME": "trader1",
        "RESULT": true,
        "AUTH_TIME": 1_700_000_000_000_i64,
        "EXPIRES": expires
    }))
}

pub fn status(connected: bool, authenticated: bool) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "authenticated": authenticated,
        "competing": false,
        "connected": connected,
        "message": ""
    }))
}

pub fn tickle(connected: bool, authenticated: bool) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "session": "bb665d0f55b6289d70bc9ee7ca5d2a3f",
        "ssoExpires": 460_000,
        "iserver": {
            "authStatus": {
                "authenticated": authenticated,
                "competing": false,
                "connected": connected
            }
        }
    }))
}

pub fn ok() -> Result<serde_json::Value> {
    Ok(serde_json::json!({}))
}

/// A transport scripted for a session that is already authenticated.
pub fn authenticated_gateway() -> Arc<ScriptedTransport> {
    let transport = ScriptedTransport::new();
    transport.script(Endpoint::ValidateSso, [sso(600_000)]);
    transport.script(Endpoint::SessionStatus, [status(true, true)]);
    transport.script(Endpoint::Tickle, [tickle(true, true)]);
    transport.script(Endpoint::Logout, [Ok(serde_json::json!({ "status": true }))]);
    transport
}

/// Default timings with the heartbeat disabled.
pub fn config() -> ClientConfig {
    init_tracing();
    ClientConfig::default().with_auto_tickle(false)
}

pub const TICKLE_INTERVAL: Duration = Duration::from_secs(60);
pub const REAUTH_GRACE: Duration = Duration::from_secs(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
