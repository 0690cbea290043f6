use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::campaigns::{Campaign, CampaignDraft, CampaignStatus};
use crate::db::StoreError;

/// Persistence port for campaign definitions
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Find a campaign by ID
    async fn get(&self, id: i64) -> Result<Option<Campaign>, StoreError>;

    /// All campaigns created by a user, newest first
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Campaign>, StoreError>;

    async fn insert(&self, owner_id: i64, draft: CampaignDraft) -> Result<Campaign, StoreError>;

    /// Persist every mutable field of `campaign`; `NotFound` if the row is gone
    ///
    /// Fails with `CapacityBelowIssued` when the new capacity is smaller than
    /// the vouchers already issued, counted under the row lock issuance takes.
    async fn update(&self, campaign: &Campaign) -> Result<Campaign, StoreError>;

    /// Delete an owned campaign
    ///
    /// Fails with `CampaignHasVouchers` when any voucher references it, used
    /// or not.
    async fn delete(&self, id: i64, owner_id: i64) -> Result<(), StoreError>;

    /// An active campaign with the same discount whose window overlaps
    /// `[start, end)`
    async fn find_active_overlapping(
        &self,
        discount: Decimal,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Campaign>, StoreError>;
}

const CAMPAIGN_COLUMNS: &str =
    "id, name, discount, start_date, end_date, capacity, status, creator_id, created_at, updated_at";

/// PostgreSQL campaign store
#[derive(Clone)]
pub struct PgCampaignStore {
    pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn get(&self, id: i64) -> Result<Option<Campaign>, StoreError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(campaign)
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Campaign>, StoreError> {
        let campaigns = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {} FROM campaigns WHERE creator_id = $1 ORDER BY created_at DESC, id DESC",
            CAMPAIGN_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(campaigns)
    }

    async fn insert(&self, owner_id: i64, draft: CampaignDraft) -> Result<Campaign, StoreError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            INSERT INTO campaigns (name, discount, start_date, end_date, capacity, status, creator_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(&draft.name)
        .bind(draft.discount)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(draft.capacity)
        .bind(draft.status)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(campaign)
    }

    async fn update(&self, campaign: &Campaign) -> Result<Campaign, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Same row lock issuance takes, so the count cannot move under us
        let locked: Option<i64> =
            sqlx::query_scalar("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
                .bind(campaign.id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Err(StoreError::NotFound);
        }

        let issued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vouchers WHERE campaign_id = $1")
            .bind(campaign.id)
            .fetch_one(&mut *tx)
            .await?;

        if i64::from(campaign.capacity) < issued {
            return Err(StoreError::CapacityBelowIssued {
                issued,
                capacity: i64::from(campaign.capacity),
            });
        }

        let updated = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            UPDATE campaigns
            SET name = $2, discount = $3, start_date = $4, end_date = $5,
                capacity = $6, status = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(campaign.discount)
        .bind(campaign.start_date)
        .bind(campaign.end_date)
        .bind(campaign.capacity)
        .bind(campaign.status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so no issuance can slip in between the count and the delete
        let locked: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM campaigns WHERE id = $1 AND creator_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Err(StoreError::NotFound);
        }

        let vouchers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vouchers WHERE campaign_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if vouchers > 0 {
            return Err(StoreError::CampaignHasVouchers(vouchers));
        }

        sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_active_overlapping(
        &self,
        discount: Decimal,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Campaign>, StoreError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            SELECT {}
            FROM campaigns
            WHERE status = $1 AND discount = $2 AND start_date < $4 AND end_date > $3
            LIMIT 1
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(CampaignStatus::Active)
        .bind(discount)
        .bind(start)
        .bind(end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(campaign)
    }
}
