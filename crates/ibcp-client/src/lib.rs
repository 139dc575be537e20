//! Session-managed client for the Interactive Brokers Client Portal gateway.
//!
//! Connects to a locally running gateway, re-authenticates the brokerage
//! session when needed, keeps it alive with a background heartbeat and
//! exposes account and order operations that refuse to run once the
//! session is gone.
//!
//! ```ignore
//! use ibcp_client::{ClientConfig, ConfigLoader, GatewayClient, OrderSide, OrderTicket};
//! use rust_decimal_macros::dec;
//!
//! let config = ConfigLoader::load()?;
//! let client = GatewayClient::connect(config).await?;
//!
//! let ticket = OrderTicket::limit(265598, OrderSide::Buy, dec!(10), dec!(185.50));
//! let replies = client.place_order(&ticket).await?;
//!
//! client.logout().await?;
//! ```

#[macro_use]
mod logging;

pub mod account;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod heartbeat;
pub mod orders;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{GatewayClient, MAX_REAUTH_ATTEMPTS};
pub use config::{ClientConfig, ConfigLoader, LogLevel};
pub use endpoints::{Endpoint, HttpMethod};
pub use error::{GatewayError, Result};
pub use heartbeat::{HeartbeatHandle, HeartbeatStatus};
pub use session::SessionState;
pub use transport::{invoke_typed, GatewayRequest, HttpTransport, Transport};
pub use types::{
    AuthStatus, LiveOrder, LiveOrders, OrderReply, OrderSide, OrderTicket, OrderType,
    PortfolioAccount, Position, SsoValidation, TickleResponse, TimeInForce, TradeAccounts,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_exports() {
        let config = ClientConfig::default();
        assert!(config.auto_tickle);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(MAX_REAUTH_ATTEMPTS, 2);
        assert_eq!(Endpoint::Tickle.method(), HttpMethod::Post);
        assert!(!SessionState::default().is_ready());
        assert_eq!(HeartbeatStatus::NotStarted.ticks(), 0);
    }
}
