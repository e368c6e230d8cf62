//! Structured audit trail for every Sender state transition
//! (spec.md §4.4 "Auditing", SPEC_FULL.md §4.9).
//!
//! Routed through its own `tracing` target so `init_audit_logging` can point
//! it at a dedicated JSON-lines file separate from the operational log.

use tracing::info;

pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    AttemptStart,
    Succeeded,
    RetryableFailure,
    TerminalFailure,
    Vanished,
    ShutdownDuringBackoff,
    MoveToUploadedFailed,
    MoveToDeadLetterFailed,
}

impl AuditEvent {
    fn as_str(self) -> &'static str {
        match self {
            AuditEvent::AttemptStart => "attempt_start",
            AuditEvent::Succeeded => "succeeded",
            AuditEvent::RetryableFailure => "retryable_failure",
            AuditEvent::TerminalFailure => "terminal_failure",
            AuditEvent::Vanished => "vanished",
            AuditEvent::ShutdownDuringBackoff => "shutdown_during_backoff",
            AuditEvent::MoveToUploadedFailed => "move_to_uploaded_failed",
            AuditEvent::MoveToDeadLetterFailed => "move_to_dead_letter_failed",
        }
    }
}

#[derive(Default)]
pub struct AuditRecord<'a> {
    pub filename: &'a str,
    pub size: Option<u64>,
    pub destination_url: Option<&'a str>,
    pub attempt_number: u32,
    pub duration_ms: u64,
    pub status_code: Option<u16>,
    pub response_snippet: Option<&'a str>,
    pub failure_category: Option<&'a str>,
    pub failure_detail: Option<&'a str>,
    pub exception_type: Option<&'a str>,
}

pub fn emit(event: AuditEvent, record: AuditRecord<'_>) {
    info!(
        target: AUDIT_TARGET,
        event = event.as_str(),
        filename = record.filename,
        size = record.size,
        destination_url = record.destination_url,
        attempt_number = record.attempt_number,
        duration_ms = record.duration_ms,
        status_code = record.status_code,
        response_snippet = record.response_snippet,
        failure_category = record.failure_category,
        failure_detail = record.failure_detail,
        exception_type = record.exception_type,
        "upload audit event"
    );
}
