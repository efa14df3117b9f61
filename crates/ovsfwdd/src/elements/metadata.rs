//! Head-of-chain element owning per-connection metadata.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ovsfwd_common::FwdResult;

use crate::chain::{Ctx, Element, Next};
use crate::model::{Connection, Request};
use crate::portinfo::ConnMetadata;

/// Process-wide map of live connection metadata bags.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    connections: Mutex<HashMap<String, Arc<ConnMetadata>>>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bag for the connection, creating it on first use.
    /// The second value reports whether the bag was created now.
    fn get_or_create(&self, conn_id: &str) -> (Arc<ConnMetadata>, bool) {
        let mut connections = self.connections.lock().unwrap();
        if let Some(existing) = connections.get(conn_id) {
            return (existing.clone(), false);
        }
        let meta = Arc::new(ConnMetadata::new());
        connections.insert(conn_id.to_string(), meta.clone());
        (meta, true)
    }

    fn remove(&self, conn_id: &str) {
        self.connections.lock().unwrap().remove(conn_id);
    }

    /// Number of connections currently tracked.
    pub fn len(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// True when no connection is tracked.
    pub fn is_empty(&self) -> bool {
        self.connections.lock().unwrap().is_empty()
    }
}

/// Installs the connection's metadata bag into the request context.
pub struct MetadataElement {
    registry: Arc<MetadataRegistry>,
}

impl MetadataElement {
    /// Creates the element over the given registry.
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Element for MetadataElement {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let conn_id = request.connection.id.clone();
        let (meta, created) = self.registry.get_or_create(&conn_id);
        ctx.set_metadata(meta);

        match next.request(ctx, request).await {
            Ok(conn) => Ok(conn),
            Err(err) => {
                // a refresh keeps its bag; a failed first request leaves none
                if created {
                    self.registry.remove(&conn_id);
                }
                Err(err)
            }
        }
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let (meta, _) = self.registry.get_or_create(&conn.id);
        ctx.set_metadata(meta);
        let result = next.close(ctx, conn).await;
        self.registry.remove(&conn.id);
        result
    }
}
