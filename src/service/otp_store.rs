use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::OtpError;
use crate::models::otp_codes::{MobileOtp, OtpKey};

/// Persistence for pending OTP challenges, at most one per [`OtpKey`].
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Inserts the challenge for `key` or replaces the hash and expiry of the existing one.
    async fn upsert(
        &self,
        key: &OtpKey,
        otp_hash: &str,
        expiration_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MobileOtp, OtpError>;

    async fn find(&self, key: &OtpKey) -> Result<Option<MobileOtp>, OtpError>;

    /// Deletes `record` only if it is still stored with the same hash.
    /// Returns `false` when another request already consumed or re-issued it.
    async fn delete(&self, record: &MobileOtp) -> Result<bool, OtpError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, OtpError>;
}

pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn upsert(
        &self,
        key: &OtpKey,
        otp_hash: &str,
        expiration_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MobileOtp, OtpError> {
        // NULL never conflicts with NULL, so each flow targets its own partial unique index.
        let query = match key.user_id {
            None => {
                r#"
                    INSERT INTO mobile_otps (
                        id,
                        phone_number,
                        user_id,
                        otp_hash,
                        expiration_at,
                        created_at,
                        modified_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $6)
                    ON CONFLICT (phone_number) WHERE user_id IS NULL
                    DO UPDATE SET
                        otp_hash = EXCLUDED.otp_hash,
                        expiration_at = EXCLUDED.expiration_at,
                        modified_at = EXCLUDED.modified_at
                    RETURNING *
                "#
            }
            Some(_) => {
                r#"
                    INSERT INTO mobile_otps (
                        id,
                        phone_number,
                        user_id,
                        otp_hash,
                        expiration_at,
                        created_at,
                        modified_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $6)
                    ON CONFLICT (user_id, phone_number) WHERE user_id IS NOT NULL
                    DO UPDATE SET
                        otp_hash = EXCLUDED.otp_hash,
                        expiration_at = EXCLUDED.expiration_at,
                        modified_at = EXCLUDED.modified_at
                    RETURNING *
                "#
            }
        };

        let record = sqlx::query_as::<_, MobileOtp>(query)
            .bind(Uuid::new_v4())
            .bind(&key.phone_number)
            .bind(key.user_id)
            .bind(otp_hash)
            .bind(expiration_at)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find(&self, key: &OtpKey) -> Result<Option<MobileOtp>, OtpError> {
        let record = sqlx::query_as::<_, MobileOtp>(
            r#"
                SELECT *
                FROM mobile_otps
                WHERE phone_number = $1
                  AND user_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(&key.phone_number)
        .bind(key.user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete(&self, record: &MobileOtp) -> Result<bool, OtpError> {
        let result = sqlx::query("DELETE FROM mobile_otps WHERE id = $1 AND otp_hash = $2")
            .bind(record.id)
            .bind(&record.otp_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, OtpError> {
        let result = sqlx::query("DELETE FROM mobile_otps WHERE expiration_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Process-local store for development without a database, and for tests.
#[derive(Default)]
pub struct InMemoryOtpStore {
    records: Mutex<HashMap<OtpKey, MobileOtp>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn upsert(
        &self,
        key: &OtpKey,
        otp_hash: &str,
        expiration_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MobileOtp, OtpError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(key.clone())
            .and_modify(|existing| {
                existing.otp_hash = otp_hash.to_string();
                existing.expiration_at = expiration_at;
                existing.modified_at = now;
            })
            .or_insert_with(|| MobileOtp {
                id: Uuid::new_v4(),
                phone_number: key.phone_number.clone(),
                user_id: key.user_id,
                otp_hash: otp_hash.to_string(),
                expiration_at,
                created_at: now,
                modified_at: now,
            });

        Ok(record.clone())
    }

    async fn find(&self, key: &OtpKey) -> Result<Option<MobileOtp>, OtpError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn delete(&self, record: &MobileOtp) -> Result<bool, OtpError> {
        let mut records = self.records.lock().await;
        let key = record.key();
        let still_current = records
            .get(&key)
            .is_some_and(|stored| stored.id == record.id && stored.otp_hash == record.otp_hash);

        if still_current {
            records.remove(&key);
        }
        Ok(still_current)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, OtpError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}
