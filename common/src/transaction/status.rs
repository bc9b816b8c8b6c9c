use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Processing stage a transaction reached on a node.
///
/// A node reports several of these over time. Only the terminal ones end
/// the status stream of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    StatelessValidationFailed,
    StatelessValidationSuccess,
    StatefulValidationFailed,
    StatefulValidationSuccess,
    Rejected,
    Committed,
    MstExpired,
    NotReceived,
    MstPending,
    EnoughSignaturesCollected,
}

impl TxStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TxStatus::StatelessValidationFailed => "STATELESS_VALIDATION_FAILED",
            TxStatus::StatelessValidationSuccess => "STATELESS_VALIDATION_SUCCESS",
            TxStatus::StatefulValidationFailed => "STATEFUL_VALIDATION_FAILED",
            TxStatus::StatefulValidationSuccess => "STATEFUL_VALIDATION_SUCCESS",
            TxStatus::Rejected => "REJECTED",
            TxStatus::Committed => "COMMITTED",
            TxStatus::MstExpired => "MST_EXPIRED",
            TxStatus::NotReceived => "NOT_RECEIVED",
            TxStatus::MstPending => "MST_PENDING",
            TxStatus::EnoughSignaturesCollected => "ENOUGH_SIGNATURES_COLLECTED",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::StatelessValidationFailed
                | TxStatus::Rejected
                | TxStatus::Committed
                | TxStatus::MstExpired
                | TxStatus::NotReceived
        )
    }
}

impl Display for TxStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: TxStatus,
    #[serde(default)]
    pub error_code: u32,
    #[serde(default)]
    pub error_message: String,
}

impl StatusReport {
    pub fn new(status: TxStatus) -> Self {
        Self {
            status,
            error_code: 0,
            error_message: String::new(),
        }
    }

    pub fn failed(status: TxStatus, error_code: u32, error_message: impl Into<String>) -> Self {
        Self {
            status,
            error_code,
            error_message: error_message.into(),
        }
    }
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.error_code == 0 && self.error_message.is_empty() {
            return write!(f, "{}", self.status);
        }
        write!(
            f,
            "{} (code {}: {})",
            self.status, self.error_code, self.error_message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_matches_as_str() {
        for status in [
            TxStatus::Committed,
            TxStatus::StatefulValidationFailed,
            TxStatus::EnoughSignaturesCollected,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TxStatus::Committed.is_terminal());
        assert!(TxStatus::Rejected.is_terminal());
        assert!(!TxStatus::StatefulValidationFailed.is_terminal());
        assert!(!TxStatus::EnoughSignaturesCollected.is_terminal());
    }

    #[test]
    fn test_report_without_error_fields() {
        let report: StatusReport = serde_json::from_str(r#"{"status":"COMMITTED"}"#).unwrap();
        assert_eq!(report, StatusReport::new(TxStatus::Committed));
        assert_eq!(report.to_string(), "COMMITTED");
    }
}
