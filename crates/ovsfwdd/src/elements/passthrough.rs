//! Stand-ins for external collaborator elements.
//!
//! Discovery, round-robin endpoint selection, file-descriptor passing,
//! interface injection and kernel connection-context are provided by the
//! surrounding mesh. They keep their position in the chain here so the
//! composition order is real, but their behavior lives outside this
//! forwarder.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use ovsfwd_common::FwdResult;

use crate::chain::{Ctx, Element, Next};
use crate::model::{Connection, Request};

struct Passthrough {
    name: &'static str,
}

#[async_trait]
impl Element for Passthrough {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        trace!(element = self.name, "request passthrough");
        next.request(ctx, request).await
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        trace!(element = self.name, "close passthrough");
        next.close(ctx, conn).await
    }
}

fn passthrough(name: &'static str) -> Arc<dyn Element> {
    Arc::new(Passthrough { name })
}

/// Receives passed file descriptors from the previous hop.
pub fn fd_recv() -> Arc<dyn Element> {
    passthrough("fd-recv")
}

/// Sends file descriptors to the next hop.
pub fn fd_send() -> Arc<dyn Element> {
    passthrough("fd-send")
}

/// Looks up the network service and its endpoints in the registry.
pub fn discover() -> Arc<dyn Element> {
    passthrough("discover")
}

/// Picks one endpoint among the discovered candidates.
pub fn round_robin() -> Arc<dyn Element> {
    passthrough("round-robin")
}

/// Moves the container-side interface into the pod namespace.
pub fn inject() -> Arc<dyn Element> {
    passthrough("inject")
}

/// Applies kernel connection-context (routes, addresses) in the pod.
pub fn kernel_ctx() -> Arc<dyn Element> {
    passthrough("kernel-ctx")
}

/// Filters mechanism preferences against what the peer can accept.
pub fn filter_mechanisms() -> Arc<dyn Element> {
    passthrough("filter-mechanisms")
}
