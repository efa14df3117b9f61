//! Joining the inbound chain to the outbound client chain.
//!
//! The connect element sits at the tail of the server chain and drives
//! the client chain, whose own tail hands the request to the downstream
//! RPC collaborator (the next forwarder or the endpoint's manager).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use ovsfwd_common::{join_errors, FwdResult};

use crate::chain::{Chain, Ctx, Element, Next};
use crate::model::{Connection, Request};
use crate::portinfo::Side;

/// The outbound request/close RPC, provided by the surrounding mesh.
#[async_trait]
pub trait Downstream: Send + Sync {
    /// Sends the request to the next hop and returns its connection.
    async fn request(&self, ctx: &Ctx, request: &Request) -> FwdResult<Connection>;

    /// Closes the connection on the next hop.
    async fn close(&self, ctx: &Ctx, conn: &Connection) -> FwdResult<()>;
}

/// Tail element of the client chain wrapping the downstream RPC.
pub struct DownstreamElement {
    downstream: Arc<dyn Downstream>,
}

impl DownstreamElement {
    /// Creates the element.
    pub fn new(downstream: Arc<dyn Downstream>) -> Self {
        Self { downstream }
    }
}

#[async_trait]
impl Element for DownstreamElement {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        _next: Next<'_>,
    ) -> FwdResult<Connection> {
        let conn = self.downstream.request(ctx, request).await?;
        request.connection = conn.clone();
        Ok(conn)
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, _next: Next<'_>) -> FwdResult<()> {
        self.downstream.close(ctx, conn).await
    }
}

/// Clears negotiated state when translating the inbound connection into
/// this forwarder's own outgoing request; the mechanism elements behind
/// it append fresh preferences for the next hop.
pub struct MechanismTranslateClient;

#[async_trait]
impl Element for MechanismTranslateClient {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        request.connection.mechanism = None;
        request.mechanism_preferences.clear();
        next.request(ctx, request).await
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        next.close(ctx, conn).await
    }
}

/// The connection this forwarder holds toward the next hop, kept for
/// the close path.
#[derive(Debug, Clone)]
struct ClientConnection(Connection);

/// Tail element of the server chain running the client chain.
pub struct ConnectElement {
    client_chain: Chain,
}

impl ConnectElement {
    /// Creates the element over the composed client chain.
    pub fn new(client_chain: Chain) -> Self {
        Self { client_chain }
    }
}

#[async_trait]
impl Element for ConnectElement {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let mut client_request = Request {
            connection: request.connection.clone(),
            mechanism_preferences: Vec::new(),
        };
        let client_conn = self.client_chain.request(ctx, &mut client_request).await?;

        // context negotiated with the next hop (e.g. a clamped MTU)
        // flows back into the inbound connection
        request.connection.context = client_conn.context.clone();
        ctx.metadata()?
            .side(Side::Endpoint)
            .store(ClientConnection(client_conn));

        next.request(ctx, request).await
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let client_conn = match ctx
            .metadata()
            .ok()
            .and_then(|m| m.side(Side::Endpoint).load_and_delete::<ClientConnection>())
        {
            Some(ClientConnection(conn)) => conn,
            None => {
                warn!(connection = %conn.id, "no recorded downstream connection, closing with inbound state");
                conn.clone()
            }
        };

        let client_err = self.client_chain.close(ctx, &client_conn).await.err();
        let next_err = next.close(ctx, conn).await.err();

        match (client_err, next_err) {
            (None, None) => Ok(()),
            (Some(err), None) => Err(err),
            (prior, Some(err)) => Err(join_errors(prior, err)),
        }
    }
}
