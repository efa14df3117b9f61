//! Inbound mechanism dispatch.
//!
//! Routes the request to the element matching the connection's
//! negotiated mechanism: kernel connections carrying an SR-IOV device
//! token take the VF path behind the resource pool, other kernel
//! connections the veth path, VXLAN connections the tunnel server.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ovsfwd_common::{FwdError, FwdResult};

use crate::chain::{Ctx, Element, Next};
use crate::model::{Connection, Mechanism, Request};
use crate::portinfo::Side;

use super::resourcepool::ResourcePool;

/// Dispatching server element.
pub struct MechanismsServer {
    veth: Arc<dyn Element>,
    smartvf: Arc<dyn Element>,
    vxlan: Arc<dyn Element>,
    resource_pool: Arc<dyn ResourcePool>,
    resource_lock: Arc<Mutex<()>>,
}

impl MechanismsServer {
    /// Creates the dispatcher.
    pub fn new(
        veth: Arc<dyn Element>,
        smartvf: Arc<dyn Element>,
        vxlan: Arc<dyn Element>,
        resource_pool: Arc<dyn ResourcePool>,
        resource_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            veth,
            smartvf,
            vxlan,
            resource_pool,
            resource_lock,
        }
    }

    fn has_device_token(conn: &Connection) -> bool {
        conn.mechanism
            .as_ref()
            .and_then(|m| m.as_kernel())
            .map(|k| k.device_token_id.is_some())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Element for MechanismsServer {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        match request.connection.mechanism {
            Some(Mechanism::Kernel(_)) => {
                if Self::has_device_token(&request.connection) {
                    {
                        let _guard = self.resource_lock.lock().await;
                        self.resource_pool
                            .assign(ctx, &request.connection, Side::Client)
                            .await?;
                    }
                    match self.smartvf.request(ctx, request, next).await {
                        Ok(conn) => Ok(conn),
                        Err(err) => {
                            let _guard = self.resource_lock.lock().await;
                            let _ = self
                                .resource_pool
                                .release(ctx, &request.connection, Side::Client)
                                .await;
                            Err(err)
                        }
                    }
                } else {
                    self.veth.request(ctx, request, next).await
                }
            }
            Some(Mechanism::Vxlan(_)) => self.vxlan.request(ctx, request, next).await,
            Some(Mechanism::Vlan(_)) | None => Err(FwdError::parse(
                "mechanism",
                "no supported mechanism negotiated for the inbound connection",
            )),
        }
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        match conn.mechanism {
            Some(Mechanism::Kernel(_)) => {
                if Self::has_device_token(conn) {
                    let result = self.smartvf.close(ctx, conn, next).await;
                    let _guard = self.resource_lock.lock().await;
                    self.resource_pool.release(ctx, conn, Side::Client).await?;
                    result
                } else {
                    self.veth.close(ctx, conn, next).await
                }
            }
            Some(Mechanism::Vxlan(_)) => self.vxlan.close(ctx, conn, next).await,
            Some(Mechanism::Vlan(_)) | None => next.close(ctx, conn).await,
        }
    }
}
