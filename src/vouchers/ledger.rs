use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::StoreError;
use crate::vouchers::{NewPurchase, NewVoucher, Purchase, PurchaseStatus, Voucher};

/// System of record for issued vouchers and the purchases that consume them
///
/// Implementations must make `insert_voucher` and `mark_redeemed` atomic:
/// concurrent callers never observe a state that breaks capacity,
/// one-unused-voucher-per-user or single redemption.
#[async_trait]
pub trait VoucherLedger: Send + Sync {
    /// Vouchers ever issued for a campaign, redeemed ones included
    async fn count_issued(&self, campaign_id: i64) -> Result<i64, StoreError>;

    async fn find_unused(&self, user_id: i64, campaign_id: i64) -> Result<Option<Voucher>, StoreError>;

    /// The user's voucher with this code, if it is still valid at `now`
    async fn find_by_code(
        &self,
        user_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Voucher>, StoreError>;

    /// Insert a voucher, re-checking capacity and uniqueness atomically
    ///
    /// # Errors
    /// - `DuplicateCode` when the code is taken
    /// - `DuplicateUnused` when the user already holds an unused voucher for the campaign
    /// - `CapacityExceeded` when the campaign is full
    /// - `NotFound` when the campaign no longer exists
    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, StoreError>;

    /// Set `used_at` on an unused voucher and record the purchase, both or neither
    ///
    /// Fails with `AlreadyRedeemed` when `used_at` was already set.
    async fn mark_redeemed(
        &self,
        voucher_id: i64,
        at: DateTime<Utc>,
        purchase: NewPurchase,
    ) -> Result<Purchase, StoreError>;

    /// A user's purchases, newest first
    async fn purchases_for_user(&self, user_id: i64) -> Result<Vec<Purchase>, StoreError>;
}

const VOUCHER_COLUMNS: &str =
    "id, code, user_id, campaign_id, discount, valid_from, valid_to, used_at, created_at, updated_at";

const PURCHASE_COLUMNS: &str =
    "id, user_id, transaction_id, campaign_id, voucher_id, discount_applied, final_price, status, created_at";

/// PostgreSQL voucher ledger
#[derive(Clone)]
pub struct PgVoucherLedger {
    pool: PgPool,
}

impl PgVoucherLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoucherLedger for PgVoucherLedger {
    async fn count_issued(&self, campaign_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vouchers WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn find_unused(&self, user_id: i64, campaign_id: i64) -> Result<Option<Voucher>, StoreError> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {} FROM vouchers WHERE user_id = $1 AND campaign_id = $2 AND used_at IS NULL",
            VOUCHER_COLUMNS
        ))
        .bind(user_id)
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    async fn find_by_code(
        &self,
        user_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Voucher>, StoreError> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {} FROM vouchers WHERE user_id = $1 AND code = $2 AND valid_to >= $3",
            VOUCHER_COLUMNS
        ))
        .bind(user_id)
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialises issuance per campaign until commit
        let capacity: Option<i32> =
            sqlx::query_scalar("SELECT capacity FROM campaigns WHERE id = $1 FOR UPDATE")
                .bind(voucher.campaign_id)
                .fetch_optional(&mut *tx)
                .await?;
        let capacity = i64::from(capacity.ok_or(StoreError::NotFound)?);

        let issued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vouchers WHERE campaign_id = $1")
            .bind(voucher.campaign_id)
            .fetch_one(&mut *tx)
            .await?;

        if issued > capacity {
            return Err(StoreError::CapacityCorrupted { issued, capacity });
        }
        if issued == capacity {
            return Err(StoreError::CapacityExceeded { issued, capacity });
        }

        let inserted = sqlx::query_as::<_, Voucher>(&format!(
            r#"
            INSERT INTO vouchers (code, user_id, campaign_id, discount, valid_from, valid_to)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            VOUCHER_COLUMNS
        ))
        .bind(&voucher.code)
        .bind(voucher.user_id)
        .bind(voucher.campaign_id)
        .bind(voucher.discount)
        .bind(voucher.valid_from)
        .bind(voucher.valid_to)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(inserted)
    }

    async fn mark_redeemed(
        &self,
        voucher_id: i64,
        at: DateTime<Utc>,
        purchase: NewPurchase,
    ) -> Result<Purchase, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Compare-and-set on used_at; the losing writer gets no row back
        let redeemed: Option<i64> = sqlx::query_scalar(
            "UPDATE vouchers SET used_at = $2, updated_at = $2 WHERE id = $1 AND used_at IS NULL RETURNING id",
        )
        .bind(voucher_id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        if redeemed.is_none() {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vouchers WHERE id = $1)")
                .bind(voucher_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                StoreError::AlreadyRedeemed
            } else {
                StoreError::NotFound
            });
        }

        let recorded = sqlx::query_as::<_, Purchase>(&format!(
            r#"
            INSERT INTO purchases (user_id, transaction_id, campaign_id, voucher_id, discount_applied, final_price, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            PURCHASE_COLUMNS
        ))
        .bind(purchase.user_id)
        .bind(&purchase.transaction_id)
        .bind(purchase.campaign_id)
        .bind(voucher_id)
        .bind(purchase.discount_applied)
        .bind(purchase.final_price)
        .bind(PurchaseStatus::Completed)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(recorded)
    }

    async fn purchases_for_user(&self, user_id: i64) -> Result<Vec<Purchase>, StoreError> {
        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT {} FROM purchases WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            PURCHASE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }
}
