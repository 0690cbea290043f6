use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Name of the unique constraint on voucher codes
pub const VOUCHER_CODE_CONSTRAINT: &str = "vouchers_code_key";

/// Name of the partial unique index allowing one unused voucher per (user, campaign)
pub const UNUSED_VOUCHER_INDEX: &str = "vouchers_one_unused_per_user_campaign";

/// Errors raised by the persistence ports
///
/// Both the Postgres implementations and the in-memory test doubles report
/// constraint outcomes through these variants, so the engine never inspects
/// driver-specific error codes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("voucher code already exists")]
    DuplicateCode,

    #[error("an unused voucher already exists for this user and campaign")]
    DuplicateUnused,

    #[error("campaign capacity of {capacity} reached")]
    CapacityExceeded { issued: i64, capacity: i64 },

    /// The committed count is already past capacity; should never happen
    #[error("campaign has {issued} vouchers but capacity is {capacity}")]
    CapacityCorrupted { issued: i64, capacity: i64 },

    #[error("voucher already redeemed")]
    AlreadyRedeemed,

    #[error("campaign still has {0} issued vouchers")]
    CampaignHasVouchers(i64),

    /// An update would set capacity below the vouchers already issued
    #[error("capacity {capacity} is below the {issued} vouchers already issued")]
    CapacityBelowIssued { issued: i64, capacity: i64 },

    #[error("store operation timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                match db_err.constraint() {
                    Some(VOUCHER_CODE_CONSTRAINT) => return StoreError::DuplicateCode,
                    Some(UNUSED_VOUCHER_INDEX) => return StoreError::DuplicateUnused,
                    _ => {}
                }
            }
        }
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            other => StoreError::Database(other),
        }
    }
}

/// Creates and configures a PostgreSQL connection pool
///
/// Every connection carries a server-side `statement_timeout` so that a
/// stuck query surfaces as an error instead of hanging the request.
pub async fn create_pool(config: &AppConfig) -> Result<DbPool, sqlx::Error> {
    tracing::debug!("Creating database connection pool");

    let statement_timeout = config.db_statement_timeout.as_millis().to_string();
    let options = PgConnectOptions::from_str(&config.database_url)?
        .options([("statement_timeout", statement_timeout.as_str())]);

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout)
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Applies the embedded SQL migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations completed successfully");
    Ok(())
}
