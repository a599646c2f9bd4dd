//! Audit log records, redaction, and pluggable sinks (C5, §4.4).

pub mod record;
pub mod redact;
pub mod sink;

pub use record::{default_severity, AuditRecord, AuditRecordBuilder, EntityRef, Severity, UserRef};
pub use redact::{mask_connection_config, redact};
pub use sink::{AuditSink, FireAndForgetSink, TracingAuditSink};
