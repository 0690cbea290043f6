use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::{CacheAside, CacheKey};
use crate::campaigns::{Campaign, CampaignDirectory, Eligibility};
use crate::db::StoreError;
use crate::vouchers::{
    is_well_formed, CodeGenerator, NewPurchase, NewVoucher, Purchase, PurchasePricing, Voucher,
    VoucherError, VoucherLedger, VoucherValidation, VOUCHER_VALIDITY_DAYS,
};

/// Attempts at drawing an unused code before giving up
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// Issuance, validation and redemption of vouchers
///
/// The cache only ever shortcuts reads. Every decision that mutates state is
/// re-checked by the ledger, which enforces capacity, one unused voucher per
/// (user, campaign) and single redemption atomically.
#[derive(Clone)]
pub struct VoucherService {
    directory: CampaignDirectory,
    ledger: Arc<dyn VoucherLedger>,
    cache: CacheAside,
    codes: Arc<dyn CodeGenerator>,
    pricing: PurchasePricing,
    voucher_ttl: Duration,
}

impl VoucherService {
    pub fn new(
        directory: CampaignDirectory,
        ledger: Arc<dyn VoucherLedger>,
        cache: CacheAside,
        codes: Arc<dyn CodeGenerator>,
        pricing: PurchasePricing,
        voucher_ttl: Duration,
    ) -> Self {
        Self {
            directory,
            ledger,
            cache,
            codes,
            pricing,
            voucher_ttl,
        }
    }

    /// Issue a voucher for `campaign_id` to `user_id`
    ///
    /// # Errors
    /// - `CampaignNotFound`, `CampaignNotActive`, `CampaignNotStarted`, `CampaignExpired`
    /// - `VoucherAlreadyIssued` when the user holds an unused voucher for the campaign
    /// - `CapacityExceeded` when the campaign has issued all its vouchers
    /// - `CodeGenerationExhausted` after `MAX_CODE_ATTEMPTS` code collisions
    #[tracing::instrument(skip(self))]
    pub async fn issue_voucher(&self, user_id: i64, campaign_id: i64) -> Result<Voucher, VoucherError> {
        let campaign = self.load_campaign(campaign_id).await?;
        let now = Utc::now();

        match campaign.eligibility(now) {
            Eligibility::Eligible => {}
            Eligibility::NotActive(status) => {
                return Err(VoucherError::CampaignNotActive { campaign_id, status })
            }
            Eligibility::NotStarted => return Err(VoucherError::CampaignNotStarted(campaign_id)),
            Eligibility::Ended => return Err(VoucherError::CampaignExpired(campaign_id)),
        }

        let dedupe_key = CacheKey::user_campaign_voucher(user_id, campaign_id);
        if let Some(cached) = self.cache.get_json::<Voucher>(&dedupe_key).await {
            if !cached.is_used() && cached.user_id == user_id && cached.campaign_id == campaign_id {
                debug!("Cached unused voucher {} blocks issuance", cached.id);
                return Err(VoucherError::VoucherAlreadyIssued(campaign_id));
            }
        }
        if self.ledger.find_unused(user_id, campaign_id).await?.is_some() {
            return Err(VoucherError::VoucherAlreadyIssued(campaign_id));
        }

        let capacity = i64::from(campaign.capacity);
        let issued = self.ledger.count_issued(campaign_id).await?;
        if issued > capacity {
            error!("Campaign {} has {} vouchers against capacity {}", campaign_id, issued, capacity);
            return Err(VoucherError::InvariantViolation(format!(
                "campaign {} over capacity ({}/{})",
                campaign_id, issued, capacity
            )));
        }
        if issued == capacity {
            return Err(VoucherError::CapacityExceeded(campaign_id));
        }

        let voucher = self.insert_with_fresh_code(user_id, &campaign, now).await?;
        info!(
            "Issued voucher {} ({}) for campaign {} to user {}",
            voucher.id, voucher.code, campaign_id, user_id
        );

        let ttl = self.cache_ttl_for(&voucher, now);
        self.cache.put_json(&dedupe_key, &voucher, ttl).await;
        self.cache
            .put_json(&CacheKey::user_code_voucher(user_id, &voucher.code), &voucher, ttl)
            .await;

        Ok(voucher)
    }

    /// Look up a voucher by the user's code and report its usage state
    ///
    /// Read-only. Unknown, foreign and expired codes are all `VoucherNotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn validate_voucher(&self, user_id: i64, code: &str) -> Result<VoucherValidation, VoucherError> {
        if !is_well_formed(code) {
            return Err(VoucherError::VoucherNotFound);
        }

        let now = Utc::now();
        let voucher = self.find_voucher_by_code(user_id, code, now).await?;

        let campaign = match self.directory.get_campaign(voucher.campaign_id).await {
            Ok(campaign) => campaign,
            Err(StoreError::NotFound) => {
                error!(
                    "Voucher {} references missing campaign {}",
                    voucher.id, voucher.campaign_id
                );
                return Err(VoucherError::InvariantViolation(format!(
                    "voucher {} has no campaign",
                    voucher.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(VoucherValidation {
            is_used: voucher.is_used(),
            campaign,
            voucher,
        })
    }

    /// Redeem a voucher: record the purchase and set `used_at` in one step
    ///
    /// Exactly one of any number of concurrent calls for the same voucher
    /// succeeds; the others get `AlreadyRedeemed`.
    #[tracing::instrument(skip(self, voucher), fields(voucher_id = voucher.id, user_id = voucher.user_id))]
    pub async fn redeem_voucher(&self, voucher: &Voucher) -> Result<Purchase, VoucherError> {
        if voucher.is_used() {
            return Err(VoucherError::AlreadyRedeemed);
        }

        let quote = self.pricing.quote(voucher.discount);
        let purchase = NewPurchase {
            user_id: voucher.user_id,
            transaction_id: format!("TXN-{}", Uuid::new_v4()),
            campaign_id: voucher.campaign_id,
            discount_applied: quote.discount_applied,
            final_price: quote.final_price,
        };

        let recorded = match self.ledger.mark_redeemed(voucher.id, Utc::now(), purchase).await {
            Ok(recorded) => recorded,
            Err(StoreError::AlreadyRedeemed) => return Err(VoucherError::AlreadyRedeemed),
            Err(StoreError::NotFound) => return Err(VoucherError::VoucherNotFound),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Redeemed voucher {} as purchase {} at {}",
            voucher.id, recorded.transaction_id, recorded.final_price
        );

        self.cache
            .invalidate(&CacheKey::user_campaign_voucher(voucher.user_id, voucher.campaign_id))
            .await;
        self.cache
            .invalidate(&CacheKey::user_code_voucher(voucher.user_id, &voucher.code))
            .await;

        Ok(recorded)
    }

    /// Redeem the user's unused, unexpired voucher for a campaign
    #[tracing::instrument(skip(self))]
    pub async fn purchase(&self, user_id: i64, campaign_id: i64) -> Result<Purchase, VoucherError> {
        let voucher = self
            .ledger
            .find_unused(user_id, campaign_id)
            .await?
            .filter(|v| v.is_valid_at(Utc::now()))
            .ok_or(VoucherError::VoucherNotFound)?;

        self.redeem_voucher(&voucher).await
    }

    pub async fn purchase_history(&self, user_id: i64) -> Result<Vec<Purchase>, VoucherError> {
        Ok(self.ledger.purchases_for_user(user_id).await?)
    }

    async fn load_campaign(&self, campaign_id: i64) -> Result<Campaign, VoucherError> {
        match self.directory.get_campaign(campaign_id).await {
            Ok(campaign) => Ok(campaign),
            Err(StoreError::NotFound) => Err(VoucherError::CampaignNotFound(campaign_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_with_fresh_code(
        &self,
        user_id: i64,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> Result<Voucher, VoucherError> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let candidate = NewVoucher {
                code: self.codes.generate(),
                user_id,
                campaign_id: campaign.id,
                discount: campaign.discount,
                valid_from: now,
                valid_to: now + ChronoDuration::days(VOUCHER_VALIDITY_DAYS),
            };

            match self.ledger.insert_voucher(candidate).await {
                Ok(voucher) => return Ok(voucher),
                Err(StoreError::DuplicateCode) => {
                    warn!("Voucher code collision on attempt {}/{}", attempt, MAX_CODE_ATTEMPTS);
                }
                Err(StoreError::DuplicateUnused) => {
                    return Err(VoucherError::VoucherAlreadyIssued(campaign.id))
                }
                Err(StoreError::CapacityExceeded { .. }) => {
                    return Err(VoucherError::CapacityExceeded(campaign.id))
                }
                Err(StoreError::NotFound) => return Err(VoucherError::CampaignNotFound(campaign.id)),
                Err(e) => return Err(e.into()),
            }
        }

        error!("Gave up generating a voucher code for campaign {}", campaign.id);
        Err(VoucherError::CodeGenerationExhausted(MAX_CODE_ATTEMPTS))
    }

    async fn find_voucher_by_code(
        &self,
        user_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Voucher, VoucherError> {
        let key = CacheKey::user_code_voucher(user_id, code);

        if let Some(cached) = self.cache.get_json::<Voucher>(&key).await {
            if cached.user_id == user_id && cached.code == code {
                if cached.is_valid_at(now) {
                    return Ok(cached);
                }
                self.cache.invalidate(&key).await;
                return Err(VoucherError::VoucherNotFound);
            }
        }

        let voucher = self
            .ledger
            .find_by_code(user_id, code, now)
            .await?
            .ok_or(VoucherError::VoucherNotFound)?;

        self.cache.put_json(&key, &voucher, self.cache_ttl_for(&voucher, now)).await;
        Ok(voucher)
    }

    /// Configured TTL, cut short so an entry never outlives its voucher
    fn cache_ttl_for(&self, voucher: &Voucher, now: DateTime<Utc>) -> Duration {
        let remaining = (voucher.valid_to - now).to_std().unwrap_or(Duration::ZERO);
        self.voucher_ttl.min(remaining)
    }
}
