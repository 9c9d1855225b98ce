//! Integration tests for `PgOtpStore` and `OtpService` against a real Postgres.

mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use common::{db_pool, unique_phone_number};
use mobile_otp::config::crypto::CryptoService;
use mobile_otp::error::OtpError;
use mobile_otp::models::otp_codes::OtpKey;
use mobile_otp::models::settings::{ALL_ZERO, OtpSettings};
use mobile_otp::service::otp_service::OtpService;
use mobile_otp::service::otp_store::{OtpStore, PgOtpStore};
use mobile_otp::utils::clock::SystemClock;

// Postgres keeps microseconds.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[tokio::test]
async fn upsert_keeps_identity_and_replaces_hash() {
    let Some(pool) = db_pool().await else { return };
    let store = PgOtpStore::new(pool);
    let key = OtpKey::new(unique_phone_number(), None);
    let issued_at = now();

    let first = store
        .upsert(&key, "hash-1", issued_at + Duration::minutes(5), issued_at)
        .await
        .unwrap();

    let reissued_at = issued_at + Duration::seconds(30);
    let second = store
        .upsert(&key, "hash-2", reissued_at + Duration::minutes(5), reissued_at)
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.otp_hash, "hash-2");
    assert_eq!(second.expiration_at, reissued_at + Duration::minutes(5));
    assert_eq!(second.modified_at, reissued_at);

    let stored = store.find(&key).await.unwrap().unwrap();
    assert_eq!(stored, second);
}

#[tokio::test]
async fn anonymous_and_owned_keys_are_separate_slots() {
    let Some(pool) = db_pool().await else { return };
    let store = PgOtpStore::new(pool);
    let phone_number = unique_phone_number();
    let user_id = Uuid::new_v4();
    let other_user_id = Uuid::new_v4();
    let issued_at = now();
    let expiration_at = issued_at + Duration::minutes(5);

    let anonymous = OtpKey::new(phone_number.clone(), None);
    let owned = OtpKey::new(phone_number.clone(), Some(user_id));

    let login = store
        .upsert(&anonymous, "login", expiration_at, issued_at)
        .await
        .unwrap();
    let change = store
        .upsert(&owned, "change", expiration_at, issued_at)
        .await
        .unwrap();
    assert_ne!(login.id, change.id);

    // Re-issuing the owned slot leaves the login slot alone.
    store
        .upsert(&owned, "change-2", expiration_at, issued_at)
        .await
        .unwrap();

    assert_eq!(store.find(&anonymous).await.unwrap().unwrap().otp_hash, "login");
    let stored = store.find(&owned).await.unwrap().unwrap();
    assert_eq!(stored.otp_hash, "change-2");
    assert_eq!(stored.user_id, Some(user_id));
    assert!(store
        .find(&OtpKey::new(phone_number, Some(other_user_id)))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deletes_consume_once() {
    let Some(pool) = db_pool().await else { return };
    let store = Arc::new(PgOtpStore::new(pool));
    let key = OtpKey::new(unique_phone_number(), None);
    let issued_at = now();
    let record = store
        .upsert(&key, "hash", issued_at + Duration::minutes(5), issued_at)
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let record = record.clone();
            tokio::spawn(async move { store.delete(&record).await.unwrap() })
        })
        .collect();

    let mut consumed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            consumed += 1;
        }
    }

    assert_eq!(consumed, 1);
    assert!(store.find(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_record_does_not_delete_a_reissue() {
    let Some(pool) = db_pool().await else { return };
    let store = PgOtpStore::new(pool);
    let key = OtpKey::new(unique_phone_number(), None);
    let issued_at = now();
    let expiration_at = issued_at + Duration::minutes(5);

    let stale = store
        .upsert(&key, "hash-1", expiration_at, issued_at)
        .await
        .unwrap();
    store
        .upsert(&key, "hash-2", expiration_at, issued_at)
        .await
        .unwrap();

    assert!(!store.delete(&stale).await.unwrap());
    assert_eq!(store.find(&key).await.unwrap().unwrap().otp_hash, "hash-2");
}

#[tokio::test]
async fn delete_expired_removes_only_past_records() {
    let Some(pool) = db_pool().await else { return };
    let store = PgOtpStore::new(pool);
    let cutoff = now();

    let expired = OtpKey::new(unique_phone_number(), None);
    let at_boundary = OtpKey::new(unique_phone_number(), Some(Uuid::new_v4()));
    let pending = OtpKey::new(unique_phone_number(), None);

    store
        .upsert(&expired, "hash", cutoff - Duration::seconds(1), cutoff - Duration::minutes(5))
        .await
        .unwrap();
    store
        .upsert(&at_boundary, "hash", cutoff, cutoff - Duration::minutes(5))
        .await
        .unwrap();
    store
        .upsert(&pending, "hash", cutoff + Duration::minutes(5), cutoff)
        .await
        .unwrap();

    // Other tests share the table, so only a lower bound holds.
    assert!(store.delete_expired(cutoff).await.unwrap() >= 1);

    assert!(store.find(&expired).await.unwrap().is_none());
    assert!(store.find(&at_boundary).await.unwrap().is_some());
    assert!(store.find(&pending).await.unwrap().is_some());
}

fn service(store: Arc<PgOtpStore>) -> OtpService {
    OtpService::new(
        store,
        CryptoService::new(64, 1, 1).unwrap(),
        Arc::new(SystemClock),
        OtpSettings {
            otp_generation_feature: ALL_ZERO.to_string(),
            ..OtpSettings::default()
        },
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn service_verifies_a_code_once() {
    let Some(pool) = db_pool().await else { return };
    let service = Arc::new(service(Arc::new(PgOtpStore::new(pool))));
    let phone_number = unique_phone_number();

    let issued = service.issue(&phone_number, None).await.unwrap();
    assert_eq!(issued.code, "000000");

    assert!(matches!(
        service.verify(&phone_number, "123456", None).await,
        Err(OtpError::Invalid)
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let phone_number = phone_number.clone();
            tokio::spawn(async move { service.verify(&phone_number, "000000", None).await })
        })
        .collect();

    let mut verified = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => verified += 1,
            Err(err) => assert!(matches!(err, OtpError::NotFound)),
        }
    }
    assert_eq!(verified, 1);
}
