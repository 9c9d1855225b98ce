//! Postgres-backed test harness.
//!
//! One container per test binary, started on first use with migrations applied.
//! Tests get their own pool because each `#[tokio::test]` has its own runtime.

use eyre::{Result, WrapErr};
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// `None` when no container runtime is reachable.
static SHARED_INFRA: OnceCell<Option<SharedTestInfra>> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .start()
            .await
            .wrap_err("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!("postgresql://postgres:postgres@{pg_host}:{pg_port}/postgres");

        let pool = PgPool::connect(&db_url)
            .await
            .wrap_err("Failed to connect to Postgres for migrations")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .wrap_err("Failed to run migrations")?;
        pool.close().await;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> Option<&'static Self> {
        SHARED_INFRA
            .get_or_init(|| async {
                match Self::init().await {
                    Ok(infra) => Some(infra),
                    Err(err) => {
                        eprintln!("skipping Postgres tests: {err:#}");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

/// A fresh pool on the shared, migrated database.
/// Returns `None` (and the caller skips) when Docker is unavailable.
pub async fn db_pool() -> Option<PgPool> {
    let infra = SharedTestInfra::get().await?;
    let pool = PgPool::connect(&infra.db_url)
        .await
        .expect("Failed to connect to test database");
    Some(pool)
}

/// A phone number no other test in the run uses, since the database is shared.
pub fn unique_phone_number() -> String {
    let suffix = Uuid::new_v4().as_u128() % 10_000_000_000;
    format!("+94{suffix:010}")
}
