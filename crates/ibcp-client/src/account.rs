//! Account queries: trade accounts, portfolio accounts and positions.

use crate::client::GatewayClient;
use crate::endpoints::Endpoint;
use crate::error::{GatewayError, Result};
use crate::types::{PortfolioAccount, Position, TradeAccounts};

impl GatewayClient {
    /// Fetches the brokerage accounts visible to the session.
    ///
    /// # Errors
    /// [`GatewayError::NotAuthenticated`] without an authenticated session,
    /// otherwise transport errors.
    pub async fn trade_accounts(&self) -> Result<TradeAccounts> {
        let accounts: TradeAccounts = self.call(Endpoint::TradeAccounts.into()).await?;
        gateway_log!(
            self.config().log_level,
            Debug,
            count = accounts.accounts.len(),
            selected = %accounts.selected_account,
            "Trade accounts retrieved"
        );
        Ok(accounts)
    }

    /// Returns the account orders are placed against.
    ///
    /// # Errors
    /// [`GatewayError::AccountNotFound`] if the gateway selected none.
    pub async fn selected_account(&self) -> Result<String> {
        let accounts = self.trade_accounts().await?;
        if accounts.selected_account.is_empty() {
            return Err(GatewayError::AccountNotFound(
                "gateway reported no selected trade account".to_string(),
            ));
        }
        Ok(accounts.selected_account)
    }

    /// Lists the portfolio accounts.
    ///
    /// # Errors
    /// [`GatewayError::NotAuthenticated`] without an authenticated session,
    /// otherwise transport errors.
    pub async fn portfolio_accounts(&self) -> Result<Vec<PortfolioAccount>> {
        self.call(Endpoint::PortfolioAccounts.into()).await
    }

    /// Returns the id of the first portfolio account.
    ///
    /// # Errors
    /// [`GatewayError::AccountNotFound`] if there are no portfolio accounts.
    pub async fn portfolio_account(&self) -> Result<String> {
        self.portfolio_accounts()
            .await?
            .into_iter()
            .map(|account| {
                if account.id.is_empty() {
                    account.account_id
                } else {
                    account.id
                }
            })
            .find(|id| !id.is_empty())
            .ok_or_else(|| GatewayError::AccountNotFound("no portfolio accounts".to_string()))
    }

    /// Fetches one page of positions for the portfolio account.
    ///
    /// Pages start at 0.
    ///
    /// # Errors
    /// - [`GatewayError::AccountNotFound`] if there is no portfolio account.
    /// - [`GatewayError::InvalidIdentifier`] if the account id is not path-safe.
    /// - Transport errors.
    pub async fn portfolio_positions(&self, page_id: u32) -> Result<Vec<Position>> {
        let account_id = self.portfolio_account().await?;
        let endpoint = Endpoint::portfolio_positions(&account_id, page_id)?;
        let positions: Vec<Position> = self.call(endpoint.into()).await?;
        gateway_log!(
            self.config().log_level,
            Debug,
            account = %account_id,
            page_id,
            count = positions.len(),
            "Positions retrieved"
        );
        Ok(positions)
    }
}
