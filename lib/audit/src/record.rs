//! The audit record shape and severity defaults (§4.4).

use crate::redact::redact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of an audit event, also used to pick the `tracing` level the
/// production sink emits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// The entity an audit action was performed on or for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
    pub entity_name: Option<String>,
}

impl EntityRef {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            entity_name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }
}

/// The actor an audit action was attributed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub user_id: String,
    pub username: String,
    pub role: String,
}

/// One audit log entry (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub severity: Severity,
    pub entity: EntityRef,
    pub user: UserRef,
    pub client_ip: String,
    pub user_agent: String,
    pub request_id: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub details: Option<Value>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Returns the default severity for `action` per §4.4's table, matched on
/// a normalized lowercase action name. Callers with a more specific
/// severity in mind (e.g. a failed operation) should pass their own via
/// `AuditRecordBuilder::severity` instead of relying on this.
#[must_use]
pub fn default_severity(action: &str) -> Severity {
    let action = action.to_ascii_lowercase();
    match action.as_str() {
        "login" | "logout" | "refresh" | "token_refresh" => Severity::Info,
        "login_failed" | "password_change" => Severity::Warning,
        _ if (action.starts_with("delete") && (action.contains("datasource") || action.contains("task")))
            || action.contains("config_change") =>
        {
            Severity::Critical
        }
        _ => Severity::Info,
    }
}

/// Builds an `AuditRecord`, applying redaction to `old_value`/`new_value`/
/// `details` before the record is considered complete.
pub struct AuditRecordBuilder {
    action: String,
    severity: Severity,
    entity: EntityRef,
    user: UserRef,
    client_ip: String,
    user_agent: String,
    request_id: String,
    old_value: Option<Value>,
    new_value: Option<Value>,
    details: Option<Value>,
    success: bool,
    error_message: Option<String>,
}

impl AuditRecordBuilder {
    #[must_use]
    pub fn new(action: impl Into<String>, entity: EntityRef, user: UserRef) -> Self {
        let action = action.into();
        let severity = default_severity(&action);
        Self {
            action,
            severity,
            entity,
            user,
            client_ip: String::new(),
            user_agent: String::new(),
            request_id: String::new(),
            old_value: None,
            new_value: None,
            details: None,
            success: true,
            error_message: None,
        }
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn old_value(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    #[must_use]
    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    #[must_use]
    pub fn details(mut self, value: Value) -> Self {
        self.details = Some(value);
        self
    }

    #[must_use]
    pub fn failure(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }

    #[must_use]
    pub fn build(mut self) -> AuditRecord {
        if let Some(v) = self.old_value.as_mut() {
            redact(v);
        }
        if let Some(v) = self.new_value.as_mut() {
            redact(v);
        }
        if let Some(v) = self.details.as_mut() {
            redact(v);
        }
        AuditRecord {
            id: ulid::Ulid::new().to_string(),
            timestamp: Utc::now(),
            action: self.action,
            severity: self.severity,
            entity: self.entity,
            user: self.user,
            client_ip: self.client_ip,
            user_agent: self.user_agent,
            request_id: self.request_id,
            old_value: self.old_value,
            new_value: self.new_value,
            details: self.details,
            success: self.success,
            error_message: self.error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> UserRef {
        UserRef {
            user_id: "usr_1".to_string(),
            username: "alice".to_string(),
            role: "admin".to_string(),
        }
    }

    #[test]
    fn default_severity_table() {
        assert_eq!(default_severity("login"), Severity::Info);
        assert_eq!(default_severity("login_failed"), Severity::Warning);
        assert_eq!(default_severity("delete_datasource"), Severity::Critical);
        assert_eq!(default_severity("config_change"), Severity::Critical);
        assert_eq!(default_severity("list_tasks"), Severity::Info);
    }

    #[test]
    fn builder_redacts_sensitive_fields_on_build() {
        let record = AuditRecordBuilder::new(
            "create_task",
            EntityRef::new("task", "w1"),
            user(),
        )
        .new_value(json!({ "config": { "api_key": "sk-abc" } }))
        .build();

        assert_eq!(record.new_value.unwrap()["config"]["api_key"], "[REDACTED]");
    }

    #[test]
    fn failure_sets_success_false_and_error_message() {
        let record = AuditRecordBuilder::new("login_failed", EntityRef::new("user", "usr_1"), user())
            .failure("bad password")
            .build();
        assert!(!record.success);
        assert_eq!(record.error_message.as_deref(), Some("bad password"));
        assert_eq!(record.severity, Severity::Warning);
    }
}
