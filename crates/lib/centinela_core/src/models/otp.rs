//! One-time password models.
//!
//! Only a SHA-256 hash of a code is stored. The plaintext leaves the service
//! once, in [`IssuedOtp`], for delivery to the user.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpStatus {
    NotUsed,
    Used,
}

impl OtpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpStatus::NotUsed => "NOT_USED",
            OtpStatus::Used => "USED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NOT_USED" => Some(OtpStatus::NotUsed),
            "USED" => Some(OtpStatus::Used),
            _ => None,
        }
    }
}

/// A stored OTP code.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpCode {
    pub id: String,
    pub user_id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub code_hash: String,
    pub status: OtpStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpCode")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Plaintext code and its record, returned once at issuance.
#[derive(Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub record: OtpCode,
}

impl fmt::Debug for IssuedOtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedOtp")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn debug_output_hides_the_code() {
        let now = Utc::now();
        let issued = IssuedOtp {
            code: "123456".into(),
            record: OtpCode {
                id: "o1".into(),
                user_id: "u1".into(),
                email: "a@b.com".into(),
                code_hash: "deadbeef".into(),
                status: OtpStatus::NotUsed,
                created_at: now,
                expires_at: now + Duration::minutes(10),
            },
        };
        let printed = format!("{issued:?}");
        assert!(!printed.contains("123456"));
        assert!(!printed.contains("deadbeef"));
        assert!(printed.contains("u1"));

        let json = serde_json::to_value(&issued.record).unwrap();
        assert!(json.get("codeHash").is_none());
        assert_eq!(json["status"], "NOT_USED");
    }

    #[test]
    fn status_round_trips_through_its_column_value() {
        for status in [OtpStatus::NotUsed, OtpStatus::Used] {
            assert_eq!(OtpStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OtpStatus::parse("EXPIRED"), None);
    }
}
