// Campaign Directory: read-mostly cache-aside lookup of campaign definitions

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheAside, CacheKey};
use crate::campaigns::{Campaign, CampaignStore};
use crate::db::StoreError;

#[derive(Clone)]
pub struct CampaignDirectory {
    store: Arc<dyn CampaignStore>,
    cache: CacheAside,
    ttl: Duration,
}

impl CampaignDirectory {
    pub fn new(store: Arc<dyn CampaignStore>, cache: CacheAside, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Load a campaign, preferring the cache
    ///
    /// A miss reads the store and repopulates the cache. Returns
    /// `StoreError::NotFound` when the store has no such campaign.
    pub async fn get_campaign(&self, campaign_id: i64) -> Result<Campaign, StoreError> {
        let key = CacheKey::campaign(campaign_id);

        if let Some(campaign) = self.cache.get_json::<Campaign>(&key).await {
            return Ok(campaign);
        }

        let campaign = self
            .store
            .get(campaign_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        self.cache.put_json(&key, &campaign, self.ttl).await;
        Ok(campaign)
    }

    /// Drop the cached projection; called after any campaign mutation
    pub async fn invalidate(&self, campaign_id: i64) {
        self.cache.invalidate(&CacheKey::campaign(campaign_id)).await;
    }
}
