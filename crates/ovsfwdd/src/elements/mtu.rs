//! MTU clamp for VLAN breakout connections.
//!
//! The egress interface's MTU is queried once per interface and cached;
//! a breakout connection's context MTU is reduced to it when larger or
//! unset.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use ovsfwd_common::FwdResult;
use ovsfwd_link::Links;
use ovsfwd_ovs::L2ConnectionPoint;

use crate::chain::{Ctx, Element, Next};
use crate::model::{Connection, Request};

use super::vlan::VIA_LABEL;

/// Outbound MTU element for VLAN breakout connections.
pub struct MtuClient {
    l2_connections: HashMap<String, L2ConnectionPoint>,
    links: Links,
    mtus: Mutex<HashMap<String, u32>>,
}

impl MtuClient {
    /// Creates the element over the configured egress table.
    pub fn new(l2_connections: HashMap<String, L2ConnectionPoint>, links: Links) -> Self {
        Self {
            l2_connections,
            links,
            mtus: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Element for MtuClient {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let postpone = ctx.postpone();
        let mut conn = next.request(ctx, request).await?;

        if conn.mechanism.as_ref().and_then(|m| m.as_vlan()).is_none() {
            return Ok(conn);
        }
        let Some(l2_point) = conn
            .labels
            .get(VIA_LABEL)
            .and_then(|via| self.l2_connections.get(via))
        else {
            return Ok(conn);
        };
        if l2_point.interface.is_empty() {
            return Ok(conn);
        }

        let cached = self.mtus.lock().unwrap().get(&l2_point.interface).copied();
        let local_mtu = match cached {
            Some(mtu) => mtu,
            None => match self.links.get_mtu(&l2_point.interface).await {
                Ok(mtu) => {
                    self.mtus
                        .lock()
                        .unwrap()
                        .insert(l2_point.interface.clone(), mtu);
                    mtu
                }
                Err(err) => {
                    let close_ctx = postpone();
                    let close_result = next.close(&close_ctx, &conn).await;
                    return Err(match close_result {
                        Err(close_err) => ovsfwd_common::FwdError::joined(err, close_err),
                        Ok(()) => err,
                    });
                }
            },
        };

        if local_mtu > 0 && (conn.context.mtu > local_mtu || conn.context.mtu == 0) {
            debug!(
                interface = %l2_point.interface,
                mtu = local_mtu,
                "clamping connection MTU to egress interface"
            );
            conn.context.mtu = local_mtu;
        }
        Ok(conn)
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        next.close(ctx, conn).await
    }
}
