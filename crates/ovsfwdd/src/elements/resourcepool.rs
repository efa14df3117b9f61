//! Seam to the SR-IOV PCI token/pool accounting subsystem.
//!
//! The pool itself lives outside this forwarder; the trait carries just
//! enough contract for the kernel element: a successful `assign` leaves a
//! `VfConfig` in the connection metadata for the side being plumbed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ovsfwd_common::FwdResult;

use crate::chain::{Ctx, Element, Next};
use crate::model::{Connection, Request};
use crate::portinfo::Side;

/// SR-IOV resource accounting collaborator.
#[async_trait]
pub trait ResourcePool: Send + Sync {
    /// Reserves a VF for the connection and records its `VfConfig`.
    async fn assign(&self, ctx: &Ctx, conn: &Connection, side: Side) -> FwdResult<()>;

    /// Returns the VF reserved for the connection to the pool.
    async fn release(&self, ctx: &Ctx, conn: &Connection, side: Side) -> FwdResult<()>;
}

/// Pool used by the kernel-only composer: every operation is a no-op.
pub struct NullResourcePool;

#[async_trait]
impl ResourcePool for NullResourcePool {
    async fn assign(&self, _ctx: &Ctx, _conn: &Connection, _side: Side) -> FwdResult<()> {
        Ok(())
    }

    async fn release(&self, _ctx: &Ctx, _conn: &Connection, _side: Side) -> FwdResult<()> {
        Ok(())
    }
}

/// Chain element running the pool around the rest of the chain.
///
/// The server and client variants share one lock; the pool
/// implementation requires its accounting to be serialized across both.
pub struct ResourcePoolElement {
    pool: Arc<dyn ResourcePool>,
    lock: Arc<Mutex<()>>,
    side: Side,
}

impl ResourcePoolElement {
    /// Creates the element for the given side over a shared pool lock.
    pub fn new(pool: Arc<dyn ResourcePool>, lock: Arc<Mutex<()>>, side: Side) -> Self {
        Self { pool, lock, side }
    }
}

#[async_trait]
impl Element for ResourcePoolElement {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let needs_vf = request
            .connection
            .mechanism
            .as_ref()
            .and_then(|m| m.as_kernel())
            .map(|k| k.device_token_id.is_some())
            .unwrap_or(false);
        if needs_vf {
            let _guard = self.lock.lock().await;
            self.pool.assign(ctx, &request.connection, self.side).await?;
        }

        match next.request(ctx, request).await {
            Ok(conn) => Ok(conn),
            Err(err) => {
                if needs_vf {
                    let _guard = self.lock.lock().await;
                    let _ = self.pool.release(ctx, &request.connection, self.side).await;
                }
                Err(err)
            }
        }
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let result = next.close(ctx, conn).await;
        let has_token = conn
            .mechanism
            .as_ref()
            .and_then(|m| m.as_kernel())
            .map(|k| k.device_token_id.is_some())
            .unwrap_or(false);
        if has_token {
            let _guard = self.lock.lock().await;
            self.pool.release(ctx, conn, self.side).await?;
        }
        result
    }
}
