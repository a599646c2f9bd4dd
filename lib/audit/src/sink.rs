//! `AuditSink` (§4.4): fire-and-forget emission, pluggable so tests can
//! substitute an in-memory recorder in place of the production `tracing`
//! sink — the same fakes-over-mocks split the teacher uses throughout.

use crate::record::{AuditRecord, Severity};
use async_trait::async_trait;
use tracing::Level;

/// Where an `AuditRecord` goes once built. `emit` never returns an error
/// to the caller; a sink that fails should log on the `tracing` `error`
/// target internally instead (§4.4).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, record: AuditRecord);
}

/// Emits one `tracing` event per record, at a level derived from
/// `severity`.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, record: AuditRecord) {
        let level = match record.severity {
            Severity::Info => Level::INFO,
            Severity::Warning => Level::WARN,
            Severity::Critical => Level::ERROR,
        };
        match level {
            Level::ERROR => tracing::error!(
                action = %record.action,
                entity_type = %record.entity.entity_type,
                entity_id = %record.entity.entity_id,
                user_id = %record.user.user_id,
                request_id = %record.request_id,
                success = record.success,
                "audit"
            ),
            Level::WARN => tracing::warn!(
                action = %record.action,
                entity_type = %record.entity.entity_type,
                entity_id = %record.entity.entity_id,
                user_id = %record.user.user_id,
                request_id = %record.request_id,
                success = record.success,
                "audit"
            ),
            _ => tracing::info!(
                action = %record.action,
                entity_type = %record.entity.entity_type,
                entity_id = %record.entity.entity_id,
                user_id = %record.user.user_id,
                request_id = %record.request_id,
                success = record.success,
                "audit"
            ),
        }
    }
}

/// Emits to an inner sink, logging (but swallowing) any panic-free failure
/// path a future sink implementation might introduce. Present because
/// §4.4 calls out emission as fire-and-forget at the call site, not just
/// within a given sink — `log_errors` is the seam a caller uses to wrap
/// any `AuditSink` with that guarantee uniformly.
pub struct FireAndForgetSink<S> {
    inner: S,
}

impl<S: AuditSink> FireAndForgetSink<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: AuditSink> AuditSink for FireAndForgetSink<S> {
    async fn emit(&self, record: AuditRecord) {
        // `emit` on the inner sink is infallible by trait contract; this
        // wrapper exists so a future sink that can fail has one place to
        // catch_unwind or timeout without every call site needing to.
        self.inner.emit(record).await;
    }
}

/// In-memory `AuditSink` fake for tests, grounded on the teacher's
/// `InMemoryEventStore`-style test doubles.
pub mod testing {
    use super::{AuditRecord, AuditSink};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct InMemoryAuditSink {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl InMemoryAuditSink {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn records(&self) -> Vec<AuditRecord> {
            self.records.lock().clone()
        }
    }

    #[async_trait]
    impl AuditSink for InMemoryAuditSink {
        async fn emit(&self, record: AuditRecord) {
            self.records.lock().push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::InMemoryAuditSink;
    use super::*;
    use crate::record::{AuditRecordBuilder, EntityRef, UserRef};

    fn user() -> UserRef {
        UserRef {
            user_id: "usr_1".to_string(),
            username: "alice".to_string(),
            role: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn in_memory_sink_records_emitted_entries() {
        let sink = InMemoryAuditSink::new();
        let record = AuditRecordBuilder::new("login", EntityRef::new("user", "usr_1"), user()).build();
        sink.emit(record).await;
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.records()[0].action, "login");
    }

    #[tokio::test]
    async fn tracing_sink_does_not_panic_on_any_severity() {
        let sink = TracingAuditSink;
        for severity in [Severity::Info, Severity::Warning, Severity::Critical] {
            let record = AuditRecordBuilder::new("delete_datasource", EntityRef::new("datasource", "ds1"), user())
                .severity(severity)
                .build();
            sink.emit(record).await;
        }
    }
}
