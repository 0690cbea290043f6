use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::campaigns::{
    Campaign, CampaignDirectory, CampaignDraft, CampaignStore, CreateCampaignRequest,
    UpdateCampaignRequest,
};
use crate::db::StoreError;
use crate::error::ApiError;

/// Campaign CRUD, scoped to the owning user
///
/// Every mutation invalidates the directory's cached projection so that
/// issuance never acts on a stale definition for longer than one request.
#[derive(Clone)]
pub struct CampaignService {
    store: Arc<dyn CampaignStore>,
    directory: CampaignDirectory,
}

impl CampaignService {
    pub fn new(store: Arc<dyn CampaignStore>, directory: CampaignDirectory) -> Self {
        Self { store, directory }
    }

    /// Create a campaign owned by `owner_id`
    ///
    /// # Validation
    /// - name 1..=255 characters, 0 < discount <= 100, capacity >= 1, start < end
    /// - no other active campaign with the same discount overlaps the window
    #[tracing::instrument(skip(self, request))]
    pub async fn create_campaign(
        &self,
        owner_id: i64,
        request: CreateCampaignRequest,
    ) -> Result<Campaign, ApiError> {
        request.validate()?;

        if let Some(existing) = self
            .store
            .find_active_overlapping(request.discount, request.start_date, request.end_date)
            .await?
        {
            warn!(
                "Rejecting campaign '{}': overlaps active campaign {} with the same discount",
                request.name, existing.id
            );
            return Err(ApiError::Conflict {
                message: format!(
                    "An active campaign with a {}% discount already runs in this period (id {})",
                    existing.discount, existing.id
                ),
            });
        }

        let campaign = self.store.insert(owner_id, CampaignDraft::from(request)).await?;
        info!("Created campaign {} for user {}", campaign.id, owner_id);
        Ok(campaign)
    }

    pub async fn list_campaigns(&self, owner_id: i64) -> Result<Vec<Campaign>, ApiError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    /// Fetch an owned campaign; other users' campaigns read as not found
    pub async fn get_campaign(&self, campaign_id: i64, owner_id: i64) -> Result<Campaign, ApiError> {
        match self.store.get(campaign_id).await? {
            Some(campaign) if campaign.creator_id == owner_id => Ok(campaign),
            _ => Err(not_found(campaign_id)),
        }
    }

    /// Merge a partial update onto an owned campaign
    ///
    /// The merged campaign is re-validated as a whole, so an update that only
    /// moves `end_date` before the stored `start_date` is still rejected.
    #[tracing::instrument(skip(self, request))]
    pub async fn update_campaign(
        &self,
        campaign_id: i64,
        owner_id: i64,
        request: UpdateCampaignRequest,
    ) -> Result<Campaign, ApiError> {
        request.validate()?;

        let mut campaign = self.get_campaign(campaign_id, owner_id).await?;
        request.apply_to(&mut campaign);
        campaign.check_definition().map_err(ApiError::InvalidInput)?;

        let updated = match self.store.update(&campaign).await {
            Ok(updated) => updated,
            Err(StoreError::NotFound) => return Err(not_found(campaign_id)),
            Err(e) => return Err(e.into()),
        };

        self.directory.invalidate(campaign_id).await;
        info!("Updated campaign {}", campaign_id);
        Ok(updated)
    }

    /// Delete an owned campaign that has never issued a voucher
    #[tracing::instrument(skip(self))]
    pub async fn delete_campaign(&self, campaign_id: i64, owner_id: i64) -> Result<(), ApiError> {
        match self.store.delete(campaign_id, owner_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(not_found(campaign_id)),
            Err(e) => return Err(e.into()),
        }

        self.directory.invalidate(campaign_id).await;
        info!("Deleted campaign {}", campaign_id);
        Ok(())
    }
}

fn not_found(campaign_id: i64) -> ApiError {
    ApiError::NotFound {
        resource: "Campaign".to_string(),
        id: campaign_id.to_string(),
    }
}
