//! Order placement and live order queries.

use crate::client::GatewayClient;
use crate::endpoints::Endpoint;
use crate::error::{GatewayError, Result};
use crate::transport::GatewayRequest;
use crate::types::{LiveOrders, OrderReply, OrderTicket, PlaceOrderBody};

impl GatewayClient {
    /// Places an order against the selected trade account.
    ///
    /// Returns the gateway's replies unchanged: either order confirmations
    /// or prompts that need confirming (see [`OrderReply::needs_confirmation`]).
    ///
    /// # Errors
    /// - [`GatewayError::NotAuthenticated`] without an authenticated session.
    /// - [`GatewayError::AccountNotFound`] if no account is selected.
    /// - [`GatewayError::OrderRejected`] if the gateway refuses the order.
    /// - Transport errors.
    pub async fn place_order(&self, ticket: &OrderTicket) -> Result<Vec<OrderReply>> {
        let account_id = self.selected_account().await?;
        let endpoint = Endpoint::place_order(&account_id)?;

        let mut ticket = ticket.clone();
        ticket.account_id.get_or_insert_with(|| account_id.clone());

        gateway_log!(
            self.config().log_level,
            Info,
            account = %account_id,
            conid = ticket.conid,
            side = ?ticket.side,
            order_type = ?ticket.order_type,
            quantity = %ticket.quantity,
            price = ?ticket.price,
            "Placing order"
        );

        let request = GatewayRequest::new(endpoint).with_body(&PlaceOrderBody {
            orders: vec![&ticket],
        })?;
        let reply: serde_json::Value = self.call(request).await?;

        // Rejections come back as a 200 with an `error` object.
        if let Some(message) = reply.get("error").and_then(|e| e.as_str()) {
            gateway_log!(self.config().log_level, Warning, account = %account_id, error = message, "Order rejected");
            return Err(GatewayError::OrderRejected(message.to_string()));
        }

        let replies: Vec<OrderReply> = serde_json::from_value(reply)?;
        gateway_log!(
            self.config().log_level,
            Info,
            replies = replies.len(),
            order_id = ?replies.first().and_then(|r| r.order_id.as_deref()),
            "Order submitted"
        );
        Ok(replies)
    }

    /// Fetches the session's live orders.
    ///
    /// # Errors
    /// [`GatewayError::NotAuthenticated`] without an authenticated session,
    /// otherwise transport errors.
    pub async fn live_orders(&self) -> Result<LiveOrders> {
        let orders: LiveOrders = self.call(Endpoint::LiveOrders.into()).await?;
        gateway_log!(self.config().log_level, Debug, count = orders.orders.len(), "Live orders retrieved");
        Ok(orders)
    }
}
