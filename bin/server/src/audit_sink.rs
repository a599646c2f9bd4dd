//! Binary-specific `AuditSink` plumbing: a sink that fans out to two inner
//! sinks, and a queryable wrapper around the audit crate's in-memory test
//! fake so the `/api/v1/audit` routes have something to read back without
//! this workspace owning a real audit store (§4.4, §6).

use async_trait::async_trait;
use jobgrid_audit::sink::testing::InMemoryAuditSink;
use jobgrid_audit::{AuditRecord, AuditSink};
use std::sync::Arc;

/// Emits every record to both inner sinks in sequence. Neither inner
/// failure can surface to the caller — `AuditSink::emit` is infallible by
/// contract.
pub struct CombinedSink<A, B> {
    a: A,
    b: B,
}

impl<A: AuditSink, B: AuditSink> CombinedSink<A, B> {
    #[must_use]
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

#[async_trait]
impl<A: AuditSink, B: AuditSink> AuditSink for CombinedSink<A, B> {
    async fn emit(&self, record: AuditRecord) {
        self.a.emit(record.clone()).await;
        self.b.emit(record).await;
    }
}

/// Wraps [`InMemoryAuditSink`] behind a cheap-to-clone handle so the same
/// backing store can be threaded into `AppState` both as a fan-out target
/// (via [`CombinedSink`]) and as a readable source for the audit routes.
#[derive(Clone)]
pub struct QueryableAuditSink {
    inner: Arc<InMemoryAuditSink>,
}

impl QueryableAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InMemoryAuditSink::new()),
        }
    }

    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.records()
    }
}

impl Default for QueryableAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for QueryableAuditSink {
    async fn emit(&self, record: AuditRecord) {
        self.inner.emit(record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgrid_audit::{AuditRecordBuilder, EntityRef, UserRef};

    fn record() -> AuditRecord {
        AuditRecordBuilder::new(
            "login",
            EntityRef::new("user", "u1"),
            UserRef {
                user_id: "u1".to_string(),
                username: "alice".to_string(),
                role: "admin".to_string(),
            },
        )
        .build()
    }

    #[tokio::test]
    async fn combined_sink_reaches_both_inner_sinks() {
        let queryable = QueryableAuditSink::new();
        let combined = CombinedSink::new(jobgrid_audit::TracingAuditSink, queryable.clone());
        combined.emit(record()).await;
        assert_eq!(queryable.records().len(), 1);
    }
}
