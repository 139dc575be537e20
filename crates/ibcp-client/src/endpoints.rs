//! Gateway endpoint descriptors.
//!
//! Every remote operation the client uses is a variant of [`Endpoint`], so
//! an operation that does not exist cannot be requested. Path parameters
//! are validated when the descriptor is built.

use crate::error::{GatewayError, Result};

/// Path prefix of the Client Portal REST API.
pub const API_PREFIX: &str = "/v1/api";

/// HTTP method used by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A remote gateway operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /sso/validate`
    ValidateSso,
    /// `POST /iserver/auth/status`
    SessionStatus,
    /// `POST /iserver/reauthenticate`
    Reauthenticate,
    /// `POST /logout`
    Logout,
    /// `POST /tickle`
    Tickle,
    /// `POST /iserver/account/{accountId}/orders`
    PlaceOrder { account_id: String },
    /// `GET /iserver/account/orders`
    LiveOrders,
    /// `GET /iserver/accounts`
    TradeAccounts,
    /// `GET /portfolio/accounts`
    PortfolioAccounts,
    /// `GET /portfolio/{accountId}/positions/{pageId}`
    PortfolioPositions { account_id: String, page_id: u32 },
}

impl Endpoint {
    /// Builds a place-order descriptor for an account.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidIdentifier`] if the account id is unsafe in a path.
    pub fn place_order(account_id: &str) -> Result<Self> {
        Ok(Self::PlaceOrder {
            account_id: validate_identifier(account_id)?.to_string(),
        })
    }

    /// Builds a portfolio-positions descriptor for an account page.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidIdentifier`] if the account id is unsafe in a path.
    pub fn portfolio_positions(account_id: &str, page_id: u32) -> Result<Self> {
        Ok(Self::PortfolioPositions {
            account_id: validate_identifier(account_id)?.to_string(),
            page_id,
        })
    }

    /// Logical operation name, used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidateSso => "sessionValidateSSO",
            Self::SessionStatus => "sessionStatus",
            Self::Reauthenticate => "sessionReauthenticate",
            Self::Logout => "sessionLogout",
            Self::Tickle => "sessionTickle",
            Self::PlaceOrder { .. } => "orderPlace",
            Self::LiveOrders => "ordersLive",
            Self::TradeAccounts => "accountIserver",
            Self::PortfolioAccounts => "portfolioAccounts",
            Self::PortfolioPositions { .. } => "portfolioPositions",
        }
    }

    /// HTTP method for this endpoint.
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        match self {
            Self::ValidateSso
            | Self::LiveOrders
            | Self::TradeAccounts
            | Self::PortfolioAccounts
            | Self::PortfolioPositions { .. } => HttpMethod::Get,
            Self::SessionStatus
            | Self::Reauthenticate
            | Self::Logout
            | Self::Tickle
            | Self::PlaceOrder { .. } => HttpMethod::Post,
        }
    }

    /// Full request path including [`API_PREFIX`], parameters substituted.
    #[must_use]
    pub fn path(&self) -> String {
        let suffix = match self {
            Self::ValidateSso => "/sso/validate".to_string(),
            Self::SessionStatus => "/iserver/auth/status".to_string(),
            Self::Reauthenticate => "/iserver/reauthenticate".to_string(),
            Self::Logout => "/logout".to_string(),
            Self::Tickle => "/tickle".to_string(),
            Self::PlaceOrder { account_id } => format!("/iserver/account/{account_id}/orders"),
            Self::LiveOrders => "/iserver/account/orders".to_string(),
            Self::TradeAccounts => "/iserver/accounts".to_string(),
            Self::PortfolioAccounts => "/portfolio/accounts".to_string(),
            Self::PortfolioPositions {
                account_id,
                page_id,
            } => format!("/portfolio/{account_id}/positions/{page_id}"),
        };
        format!("{API_PREFIX}{suffix}")
    }

    /// True for the session-management endpoints that work without an
    /// authenticated brokerage session.
    #[must_use]
    pub fn is_session_endpoint(&self) -> bool {
        matches!(
            self,
            Self::ValidateSso
                | Self::SessionStatus
                | Self::Reauthenticate
                | Self::Logout
                | Self::Tickle
        )
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

/// Validates an identifier (account id etc.) before it is placed in a path.
///
/// Valid identifiers contain only ASCII alphanumerics, hyphens and underscores.
pub(crate) fn validate_identifier(id: &str) -> Result<&str> {
    if id.is_empty() {
        return Err(GatewayError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(GatewayError::InvalidIdentifier(format!(
            "must contain only alphanumeric, hyphen, or underscore: {id}"
        )));
    }

    if id.len() > 64 {
        return Err(GatewayError::InvalidIdentifier(format!(
            "exceeds maximum length of 64: {}",
            id.len()
        )));
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_paths() {
        assert_eq!(Endpoint::ValidateSso.path(), "/v1/api/sso/validate");
        assert_eq!(Endpoint::SessionStatus.path(), "/v1/api/iserver/auth/status");
        assert_eq!(
            Endpoint::Reauthenticate.path(),
            "/v1/api/iserver/reauthenticate"
        );
        assert_eq!(Endpoint::Logout.path(), "/v1/api/logout");
        assert_eq!(Endpoint::Tickle.path(), "/v1/api/tickle");
    }

    #[test]
    fn test_path_parameters_substituted() {
        let place = Endpoint::place_order("DU123456").unwrap();
        assert_eq!(place.path(), "/v1/api/iserver/account/DU123456/orders");

        let positions = Endpoint::portfolio_positions("U7654321", 2).unwrap();
        assert_eq!(positions.path(), "/v1/api/portfolio/U7654321/positions/2");
    }

    #[test]
    fn test_methods() {
        assert_eq!(Endpoint::ValidateSso.method(), HttpMethod::Get);
        assert_eq!(Endpoint::Tickle.method(), HttpMethod::Post);
        assert_eq!(Endpoint::LiveOrders.method(), HttpMethod::Get);
        assert_eq!(
            Endpoint::place_order("DU1").unwrap().method(),
            HttpMethod::Post
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::Tickle.to_string(), "POST /v1/api/tickle");
    }

    #[test]
    fn test_session_endpoint_classification() {
        assert!(Endpoint::Tickle.is_session_endpoint());
        assert!(Endpoint::Logout.is_session_endpoint());
        assert!(!Endpoint::LiveOrders.is_session_endpoint());
        assert!(!Endpoint::PortfolioAccounts.is_session_endpoint());
    }

    #[test]
    fn test_validate_identifier_rejects_path_traversal() {
        assert!(Endpoint::place_order("../../etc/passwd").is_err());
        assert!(Endpoint::place_order("DU1/orders").is_err());
        assert!(Endpoint::portfolio_positions("a\\b", 0).is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_empty_and_long() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"A".repeat(65)).is_err());
        assert!(validate_identifier("DU_123-x").is_ok());
    }
}
