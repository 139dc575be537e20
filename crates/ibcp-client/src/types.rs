//! Wire models for Client Portal gateway requests and responses.
//!
//! Field names follow the gateway's JSON. Money and quantity values use
//! `rust_decimal::Decimal`; unknown fields are ignored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Session Types
// =============================================================================

/// Response of the SSO validation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoValidation {
    #[serde(rename = "USER_ID", default)]
    pub user_id: Option<i64>,

    #[serde(rename = "USER_NAME", default)]
    pub user_name: Option<String>,

    #[serde(rename = "RESULT", default)]
    pub result: Option<bool>,

    #[serde(rename = "AUTH_TIME", default)]
    pub auth_time: Option<i64>,

    /// Remaining session lifetime in milliseconds; zero or absent means expired.
    #[serde(rename = "EXPIRES", default)]
    pub expires: Option<i64>,

    #[serde(rename = "IP", default)]
    pub ip: Option<String>,

    #[serde(rename = "IS_MASTER", default)]
    pub is_master: Option<bool>,

    #[serde(rename = "PAPER_USER_NAME", default)]
    pub paper_user_name: Option<String>,

    #[serde(rename = "LOGIN_TYPE", default)]
    pub login_type: Option<i64>,
}

impl SsoValidation {
    /// Returns true if the gateway reports remaining session lifetime.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.expires.unwrap_or(0) > 0
    }
}

/// Brokerage session flags reported by the status and tickle endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub competing: bool,
    pub connected: bool,
    pub message: Option<String>,
    pub fail: Option<String>,
    #[serde(rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

impl AuthStatus {
    /// Status with the given connection flags and nothing else.
    #[must_use]
    pub fn new(connected: bool, authenticated: bool) -> Self {
        Self {
            connected,
            authenticated,
            ..Default::default()
        }
    }
}

/// Gateway server identification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    #[serde(rename = "serverName")]
    pub server_name: Option<String>,
    #[serde(rename = "serverVersion")]
    pub server_version: Option<String>,
}

/// Response of the tickle (heartbeat) endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickleResponse {
    pub session: Option<String>,
    #[serde(rename = "ssoExpires")]
    pub sso_expires: Option<i64>,
    #[serde(rename = "userId")]
    pub user_id: Option<i64>,
    pub iserver: TickleIserver,
}

/// Brokerage section of a tickle response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickleIserver {
    #[serde(rename = "authStatus")]
    pub auth_status: AuthStatus,
}

impl TickleResponse {
    /// Session flags embedded in the heartbeat reply.
    ///
    /// A reply without an `iserver` section reports a dead session.
    #[must_use]
    pub fn auth_status(&self) -> &AuthStatus {
        &self.iserver.auth_status
    }
}

/// Response of the re-authenticate endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReauthenticateResponse {
    pub message: Option<String>,
}

/// Response of the logout endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoutResponse {
    pub status: Option<bool>,
}

// =============================================================================
// Account Types
// =============================================================================

/// Brokerage trade accounts visible to the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeAccounts {
    pub accounts: Vec<String>,
    #[serde(rename = "selectedAccount")]
    pub selected_account: String,
    pub aliases: HashMap<String, String>,
    #[serde(rename = "isPaper")]
    pub is_paper: Option<bool>,
}

/// An account as listed by the portfolio endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioAccount {
    pub id: String,
    #[serde(rename = "accountId")]
    pub account_id: String,
    #[serde(rename = "accountTitle")]
    pub account_title: Option<String>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub currency: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
}

/// An open portfolio position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    #[serde(rename = "acctId")]
    pub account_id: String,
    pub conid: i64,
    #[serde(rename = "contractDesc")]
    pub contract_desc: Option<String>,
    pub ticker: Option<String>,
    #[serde(rename = "assetClass")]
    pub asset_class: Option<String>,
    pub position: Decimal,
    #[serde(rename = "mktPrice")]
    pub market_price: Option<Decimal>,
    #[serde(rename = "mktValue")]
    pub market_value: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(rename = "avgCost")]
    pub avg_cost: Option<Decimal>,
    #[serde(rename = "avgPrice")]
    pub avg_price: Option<Decimal>,
    #[serde(rename = "realizedPnl")]
    pub realized_pnl: Option<Decimal>,
    #[serde(rename = "unrealizedPnl")]
    pub unrealized_pnl: Option<Decimal>,
}

impl Position {
    /// Returns true for a short position.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.position.is_sign_negative() && !self.position.is_zero()
    }
}

// =============================================================================
// Order Types
// =============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Order type as accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MKT")]
    Market,
    #[serde(rename = "LMT")]
    Limit,
    #[serde(rename = "STP")]
    Stop,
    #[serde(rename = "STOP_LIMIT")]
    StopLimit,
}

/// Time in force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Day,
    Gtc,
    Ioc,
    Opg,
}

/// A single order in a place-order request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTicket {
    /// Filled in from the selected account when the order is placed.
    #[serde(rename = "acctId", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// IB contract id.
    pub conid: i64,

    #[serde(rename = "cOID", skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,

    #[serde(rename = "orderType")]
    pub order_type: OrderType,

    pub side: OrderSide,

    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,

    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,

    #[serde(
        rename = "auxPrice",
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub aux_price: Option<Decimal>,

    pub tif: TimeInForce,

    #[serde(rename = "outsideRTH")]
    pub outside_rth: bool,
}

impl OrderTicket {
    /// Creates a market order.
    #[must_use]
    pub fn market(conid: i64, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            account_id: None,
            conid,
            client_order_id: None,
            order_type: OrderType::Market,
            side,
            quantity,
            price: None,
            aux_price: None,
            tif: TimeInForce::Day,
            outside_rth: false,
        }
    }

    /// Creates a limit order.
    #[must_use]
    pub fn limit(conid: i64, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            ..Self::market(conid, side, quantity)
        }
    }

    /// Sets the time in force.
    #[must_use]
    pub fn with_tif(mut self, tif: TimeInForce) -> Self {
        self.tif = tif;
        self
    }

    /// Sets a client order id.
    #[must_use]
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    /// Allows execution outside regular trading hours.
    #[must_use]
    pub fn with_outside_rth(mut self, allowed: bool) -> Self {
        self.outside_rth = allowed;
        self
    }
}

/// Body of a place-order request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PlaceOrderBody<'a> {
    pub orders: Vec<&'a OrderTicket>,
}

/// One element of a place-order reply.
///
/// The gateway either confirms the order (`order_id`, `order_status`) or
/// asks for confirmation of a warning (`id`, `message`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderReply {
    pub order_id: Option<String>,
    pub order_status: Option<String>,
    pub local_order_id: Option<String>,
    pub id: Option<String>,
    pub message: Vec<String>,
}

impl OrderReply {
    /// Returns true if the gateway wants the order confirmed first.
    #[must_use]
    pub fn needs_confirmation(&self) -> bool {
        self.order_id.is_none() && self.id.is_some()
    }
}

/// Live orders for the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveOrders {
    pub orders: Vec<LiveOrder>,
    pub snapshot: bool,
}

/// A working or recently completed order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveOrder {
    #[serde(rename = "acct")]
    pub account_id: String,
    #[serde(rename = "orderId")]
    pub order_id: i64,
    pub conid: i64,
    pub ticker: Option<String>,
    pub side: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "orderType")]
    pub order_type: Option<String>,
    pub price: Option<Decimal>,
    #[serde(rename = "filledQuantity")]
    pub filled_quantity: Option<Decimal>,
    #[serde(rename = "remainingQuantity")]
    pub remaining_quantity: Option<Decimal>,
    #[serde(rename = "timeInForce")]
    pub time_in_force: Option<String>,
}
