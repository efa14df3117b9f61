//! The request/close element chain.
//!
//! A chain is an ordered list of elements. Request runs front-to-back;
//! each element performs its setup, delegates to [`Next`], and undoes its
//! own side effect when a later element fails. Close traverses the same
//! list, with each element sequencing its teardown before or after the
//! delegation as its semantics require, so teardown effectively unwinds
//! back-to-front.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tokio::time::Instant;

use ovsfwd_common::{FwdError, FwdResult};

use crate::model::{Connection, Request};
use crate::portinfo::ConnMetadata;

/// Deadline granted to a postponed close when the caller had none left.
const POSTPONE_DEFAULT: Duration = Duration::from_millis(1000);

/// Lower bound for a postponed close deadline.
const POSTPONE_MIN: Duration = Duration::from_millis(100);

/// Upper bound for a postponed close deadline.
const POSTPONE_MAX: Duration = Duration::from_millis(5000);

/// Per-request context threaded through the chain.
///
/// Carries the connection's metadata bag and the request deadline. The
/// bag is installed by the metadata element at the head of the chain;
/// everything downstream reads it through [`Ctx::metadata`].
#[derive(Debug, Clone, Default)]
pub struct Ctx {
    meta: OnceCell<Arc<ConnMetadata>>,
    deadline: Option<Instant>,
}

impl Ctx {
    /// A context without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires at the given instant.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            meta: OnceCell::new(),
            deadline: Some(deadline),
        }
    }

    /// Installs the connection metadata bag. Later calls are ignored.
    pub fn set_metadata(&self, meta: Arc<ConnMetadata>) {
        let _ = self.meta.set(meta);
    }

    /// Returns the connection metadata bag.
    pub fn metadata(&self) -> FwdResult<&Arc<ConnMetadata>> {
        self.meta
            .get()
            .ok_or_else(|| FwdError::internal("connection metadata not initialized"))
    }

    /// Fails when the deadline has expired.
    pub fn check(&self) -> FwdResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(FwdError::cancelled("request deadline expired"))
            }
            _ => Ok(()),
        }
    }

    /// Captures a postponed-close context factory.
    ///
    /// The returned closure builds a context that keeps the metadata but
    /// carries a fresh bounded deadline, so teardown is attempted even
    /// when the caller's deadline has already expired. The budget is the
    /// time that was left at capture, clamped.
    pub fn postpone(&self) -> impl FnOnce() -> Ctx {
        let remaining = self
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .filter(|d| !d.is_zero())
            .unwrap_or(POSTPONE_DEFAULT)
            .clamp(POSTPONE_MIN, POSTPONE_MAX);
        let meta = self.meta.clone();
        move || Ctx {
            meta,
            deadline: Some(Instant::now() + remaining),
        }
    }
}

/// One composable unit of the connection lifecycle.
///
/// Implementations must be idempotent under repeated request/close for
/// the same connection: before producing side effects, an element checks
/// whether its port-info slot already exists and becomes a no-op on an
/// established connection.
#[async_trait]
pub trait Element: Send + Sync {
    /// Contributes this element's setup and delegates to the rest.
    async fn request(&self, ctx: &Ctx, request: &mut Request, next: Next<'_>)
        -> FwdResult<Connection>;

    /// Contributes this element's teardown and delegates to the rest.
    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()>;
}

/// Cursor over the remaining elements of a chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    elements: &'a [Arc<dyn Element>],
}

impl<'a> Next<'a> {
    /// A cursor covering the whole slice.
    pub fn new(elements: &'a [Arc<dyn Element>]) -> Self {
        Self { elements }
    }

    /// Invokes the next element's request, or completes the request.
    pub async fn request(&self, ctx: &Ctx, request: &mut Request) -> FwdResult<Connection> {
        match self.elements.split_first() {
            None => Ok(request.connection.clone()),
            Some((head, rest)) => {
                ctx.check()?;
                head.request(ctx, request, Next { elements: rest }).await
            }
        }
    }

    /// Invokes the next element's close, or completes the close.
    pub async fn close(&self, ctx: &Ctx, conn: &Connection) -> FwdResult<()> {
        match self.elements.split_first() {
            None => Ok(()),
            Some((head, rest)) => head.close(ctx, conn, Next { elements: rest }).await,
        }
    }
}

/// An owned element list with request/close entry points.
pub struct Chain {
    elements: Vec<Arc<dyn Element>>,
}

impl Chain {
    /// Builds a chain from its elements, in request order.
    pub fn new(elements: Vec<Arc<dyn Element>>) -> Self {
        Self { elements }
    }

    /// Runs a request through the chain.
    pub async fn request(&self, ctx: &Ctx, request: &mut Request) -> FwdResult<Connection> {
        Next::new(&self.elements).request(ctx, request).await
    }

    /// Runs a close through the chain.
    pub async fn close(&self, ctx: &Ctx, conn: &Connection) -> FwdResult<()> {
        Next::new(&self.elements).close(ctx, conn).await
    }
}
