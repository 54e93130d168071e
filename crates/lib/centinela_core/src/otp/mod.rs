//! One-time passwords.
//!
//! Codes are six digits, valid for ten minutes and redeemable once. A user
//! may be issued at most three codes in any ten-minute window. Delivery is
//! left to the caller: [`OtpService::issue`] hands back the plaintext once and
//! nothing else ever sees it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::auth::AuthError;
use crate::models::otp::{IssuedOtp, OtpCode, OtpStatus};
use crate::store::{OtpStore, UserStore};
use crate::uuid::uuidv7;

/// Issuance and lifetime limits.
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    /// Codes allowed per user within `window`.
    pub max_codes: usize,
    pub window: Duration,
    /// How long a code stays redeemable.
    pub ttl: Duration,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            max_codes: 3,
            window: Duration::minutes(10),
            ttl: Duration::minutes(10),
        }
    }
}

#[derive(Clone)]
pub struct OtpService {
    users: Arc<dyn UserStore>,
    store: Arc<dyn OtpStore>,
    policy: OtpPolicy,
}

impl OtpService {
    pub fn new(users: Arc<dyn UserStore>, store: Arc<dyn OtpStore>) -> Self {
        Self {
            users,
            store,
            policy: OtpPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OtpPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Issue a fresh code for `user_id`.
    pub async fn issue(&self, user_id: &str) -> Result<IssuedOtp, AuthError> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if user.is_deleted() {
            return Err(AuthError::UserDeleted);
        }

        let code = generate_code();
        let now = Utc::now();
        let record = OtpCode {
            id: uuidv7().to_string(),
            user_id: user.id,
            email: user.email,
            code_hash: hash_code(&code),
            status: OtpStatus::NotUsed,
            created_at: now,
            expires_at: now + self.policy.ttl,
        };

        let inserted = self
            .store
            .insert_otp_within_limit(
                record.clone(),
                now - self.policy.window,
                self.policy.max_codes,
            )
            .await?;
        if !inserted {
            debug!(user_id = %record.user_id, "otp issuance limit reached");
            return Err(AuthError::OtpRateLimited {
                limit: self.policy.max_codes,
                window: humantime::format_duration(
                    self.policy.window.to_std().unwrap_or_default(),
                )
                .to_string(),
            });
        }

        info!(user_id = %record.user_id, otp_id = %record.id, "otp issued");
        Ok(IssuedOtp { code, record })
    }

    /// Redeem `code` against the user's most recent OTP.
    pub async fn validate(&self, user_id: &str, code: &str) -> Result<(), AuthError> {
        let latest = self.store.latest_otp(user_id).await?.ok_or_else(|| {
            AuthError::NotFound("This user does not have OTP codes generated".into())
        })?;

        if latest.status == OtpStatus::Used {
            return Err(AuthError::OtpUsed);
        }
        if latest.is_expired(Utc::now()) {
            return Err(AuthError::OtpExpired);
        }
        if hash_code(code.trim()) != latest.code_hash {
            debug!(user_id = %user_id, otp_id = %latest.id, "otp mismatch");
            return Err(AuthError::OtpInvalid);
        }
        if !self.store.mark_otp_used(user_id, &latest.id).await? {
            return Err(AuthError::OtpUsed);
        }

        info!(user_id = %user_id, otp_id = %latest.id, "otp redeemed");
        Ok(())
    }
}

/// Six random digits, zero padded.
fn generate_code() -> String {
    format!("{:06}", rng().random_range(0..1_000_000u32))
}

fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::User;
    use crate::store::memory::MemoryStore;

    fn service() -> (OtpService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.put_user(User {
            id: "u1".into(),
            email: "a@b.com".into(),
            roles: vec!["USER".into()],
            deleted_at: None,
        });
        (OtpService::new(store.clone(), store.clone()), store)
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn issue_then_redeem_once() {
        let (otp, _) = service();
        let issued = otp.issue("u1").await.unwrap();
        assert_eq!(issued.record.email, "a@b.com");
        assert_ne!(issued.record.code_hash, issued.code);
        assert_eq!(
            issued.record.expires_at - issued.record.created_at,
            Duration::minutes(10)
        );

        otp.validate("u1", &issued.code).await.unwrap();
        assert!(matches!(
            otp.validate("u1", &issued.code).await,
            Err(AuthError::OtpUsed)
        ));
    }

    #[tokio::test]
    async fn unknown_and_deleted_users_get_no_code() {
        let (otp, store) = service();
        assert!(matches!(
            otp.issue("ghost").await,
            Err(AuthError::UserNotFound)
        ));

        store.put_user(User {
            id: "u2".into(),
            email: "gone@b.com".into(),
            roles: vec![],
            deleted_at: Some(Utc::now()),
        });
        assert!(matches!(otp.issue("u2").await, Err(AuthError::UserDeleted)));
    }

    #[tokio::test]
    async fn at_most_three_codes_per_window() {
        let (otp, _) = service();
        for _ in 0..3 {
            otp.issue("u1").await.unwrap();
        }
        match otp.issue("u1").await {
            Err(AuthError::OtpRateLimited { limit, window }) => {
                assert_eq!(limit, 3);
                assert_eq!(window, "10m");
            }
            other => panic!("expected OtpRateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_the_latest_code_counts() {
        let (otp, _) = service();
        let first = otp.issue("u1").await.unwrap();
        let second = otp.issue("u1").await.unwrap();

        if first.code != second.code {
            assert!(matches!(
                otp.validate("u1", &first.code).await,
                Err(AuthError::OtpInvalid)
            ));
        }
        otp.validate("u1", &second.code).await.unwrap();
    }

    #[tokio::test]
    async fn wrong_expired_and_missing_codes() {
        let (otp, _) = service();
        assert!(matches!(
            otp.validate("u1", "000000").await,
            Err(AuthError::NotFound(_))
        ));

        let issued = otp.issue("u1").await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };
        assert!(matches!(
            otp.validate("u1", wrong).await,
            Err(AuthError::OtpInvalid)
        ));

        let stale = otp.clone().with_policy(OtpPolicy {
            ttl: Duration::seconds(-1),
            ..OtpPolicy::default()
        });
        let expired = stale.issue("u1").await.unwrap();
        assert!(matches!(
            stale.validate("u1", &expired.code).await,
            Err(AuthError::OtpExpired)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_succeed_once() {
        let (otp, _) = service();
        let issued = otp.issue("u1").await.unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let otp = otp.clone();
                let code = issued.code.clone();
                tokio::spawn(async move { otp.validate("u1", &code).await })
            })
            .collect();

        let mut redeemed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => redeemed += 1,
                Err(AuthError::OtpUsed) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(redeemed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issuance_respects_limit() {
        let (otp, _) = service();
        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let otp = otp.clone();
                tokio::spawn(async move { otp.issue("u1").await })
            })
            .collect();

        let mut issued = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => issued += 1,
                Err(AuthError::OtpRateLimited { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(issued, 3);
    }

    #[tokio::test]
    async fn rate_limit_message_carries_no_code() {
        let (otp, _) = service();
        let mut codes = Vec::new();
        for _ in 0..3 {
            codes.push(otp.issue("u1").await.unwrap().code);
        }
        let message = otp.issue("u1").await.unwrap_err().to_string();
        assert!(codes.iter().all(|c| !message.contains(c.as_str())));
    }
}
