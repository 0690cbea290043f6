// In-memory doubles for the persistence and cache ports
//
// `InMemoryStore` holds campaigns, vouchers and purchases behind one async
// mutex, so each port operation is atomic the way a database transaction is.
// Every operation yields before taking the lock, letting concurrent tests
// interleave between an engine's check and its write.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::auth::TokenService;
use crate::cache::{CacheAside, CacheError, CacheStore};
use crate::campaigns::{
    Campaign, CampaignDirectory, CampaignDraft, CampaignService, CampaignStatus, CampaignStore,
};
use crate::db::StoreError;
use crate::vouchers::{
    CodeGenerator, NewPurchase, NewVoucher, Purchase, PurchasePricing, PurchaseStatus,
    RandomCodeGenerator, Voucher, VoucherLedger, VoucherService,
};
use crate::AppState;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes";

#[derive(Default)]
struct State {
    campaigns: BTreeMap<i64, Campaign>,
    vouchers: Vec<Voucher>,
    purchases: Vec<Purchase>,
    next_campaign_id: i64,
    next_voucher_id: i64,
    next_purchase_id: i64,
    unavailable: bool,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `StoreError::Timeout`
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    pub async fn purchase_count(&self) -> usize {
        self.state.lock().await.purchases.len()
    }

    pub async fn vouchers_for_campaign(&self, campaign_id: i64) -> Vec<Voucher> {
        self.state
            .lock()
            .await
            .vouchers
            .iter()
            .filter(|v| v.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    async fn lock(&self) -> Result<tokio::sync::MutexGuard<'_, State>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(StoreError::Timeout);
        }
        Ok(state)
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Campaign>, StoreError> {
        Ok(self.lock().await?.campaigns.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Campaign>, StoreError> {
        let state = self.lock().await?;
        let mut owned: Vec<Campaign> = state
            .campaigns
            .values()
            .filter(|c| c.creator_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }

    async fn insert(&self, owner_id: i64, draft: CampaignDraft) -> Result<Campaign, StoreError> {
        let mut state = self.lock().await?;
        state.next_campaign_id += 1;
        let now = Utc::now();
        let campaign = Campaign {
            id: state.next_campaign_id,
            name: draft.name,
            discount: draft.discount,
            start_date: draft.start_date,
            end_date: draft.end_date,
            capacity: draft.capacity,
            status: draft.status,
            creator_id: owner_id,
            created_at: now,
            updated_at: now,
        };
        state.campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn update(&self, campaign: &Campaign) -> Result<Campaign, StoreError> {
        let mut state = self.lock().await?;
        if !state.campaigns.contains_key(&campaign.id) {
            return Err(StoreError::NotFound);
        }
        let issued = state.vouchers.iter().filter(|v| v.campaign_id == campaign.id).count() as i64;
        if i64::from(campaign.capacity) < issued {
            return Err(StoreError::CapacityBelowIssued {
                issued,
                capacity: i64::from(campaign.capacity),
            });
        }
        let stored = state.campaigns.get_mut(&campaign.id).ok_or(StoreError::NotFound)?;
        *stored = Campaign {
            updated_at: Utc::now(),
            ..campaign.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<(), StoreError> {
        let mut state = self.lock().await?;
        match state.campaigns.get(&id) {
            Some(c) if c.creator_id == owner_id => {}
            _ => return Err(StoreError::NotFound),
        }
        let vouchers = state.vouchers.iter().filter(|v| v.campaign_id == id).count() as i64;
        if vouchers > 0 {
            return Err(StoreError::CampaignHasVouchers(vouchers));
        }
        state.campaigns.remove(&id);
        Ok(())
    }

    async fn find_active_overlapping(
        &self,
        discount: Decimal,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Campaign>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .campaigns
            .values()
            .find(|c| {
                c.status == CampaignStatus::Active
                    && c.discount == discount
                    && c.start_date < end
                    && c.end_date > start
            })
            .cloned())
    }
}

#[async_trait]
impl VoucherLedger for InMemoryStore {
    async fn count_issued(&self, campaign_id: i64) -> Result<i64, StoreError> {
        let state = self.lock().await?;
        Ok(state.vouchers.iter().filter(|v| v.campaign_id == campaign_id).count() as i64)
    }

    async fn find_unused(&self, user_id: i64, campaign_id: i64) -> Result<Option<Voucher>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .vouchers
            .iter()
            .find(|v| v.user_id == user_id && v.campaign_id == campaign_id && v.used_at.is_none())
            .cloned())
    }

    async fn find_by_code(
        &self,
        user_id: i64,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Voucher>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .vouchers
            .iter()
            .find(|v| v.user_id == user_id && v.code == code && v.valid_to >= now)
            .cloned())
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, StoreError> {
        let mut state = self.lock().await?;

        let capacity = i64::from(
            state
                .campaigns
                .get(&voucher.campaign_id)
                .ok_or(StoreError::NotFound)?
                .capacity,
        );
        let issued = state
            .vouchers
            .iter()
            .filter(|v| v.campaign_id == voucher.campaign_id)
            .count() as i64;
        if issued > capacity {
            return Err(StoreError::CapacityCorrupted { issued, capacity });
        }
        if issued == capacity {
            return Err(StoreError::CapacityExceeded { issued, capacity });
        }
        if state.vouchers.iter().any(|v| v.code == voucher.code) {
            return Err(StoreError::DuplicateCode);
        }
        if state.vouchers.iter().any(|v| {
            v.user_id == voucher.user_id && v.campaign_id == voucher.campaign_id && v.used_at.is_none()
        }) {
            return Err(StoreError::DuplicateUnused);
        }

        state.next_voucher_id += 1;
        let now = Utc::now();
        let inserted = Voucher {
            id: state.next_voucher_id,
            code: voucher.code,
            user_id: voucher.user_id,
            campaign_id: voucher.campaign_id,
            discount: voucher.discount,
            valid_from: voucher.valid_from,
            valid_to: voucher.valid_to,
            used_at: None,
            created_at: now,
            updated_at: now,
        };
        state.vouchers.push(inserted.clone());
        Ok(inserted)
    }

    async fn mark_redeemed(
        &self,
        voucher_id: i64,
        at: DateTime<Utc>,
        purchase: NewPurchase,
    ) -> Result<Purchase, StoreError> {
        let mut state = self.lock().await?;

        let voucher = state
            .vouchers
            .iter_mut()
            .find(|v| v.id == voucher_id)
            .ok_or(StoreError::NotFound)?;
        if voucher.used_at.is_some() {
            return Err(StoreError::AlreadyRedeemed);
        }
        voucher.used_at = Some(at);
        voucher.updated_at = at;

        state.next_purchase_id += 1;
        let recorded = Purchase {
            id: state.next_purchase_id,
            user_id: purchase.user_id,
            transaction_id: purchase.transaction_id,
            campaign_id: purchase.campaign_id,
            voucher_id,
            discount_applied: purchase.discount_applied,
            final_price: purchase.final_price,
            status: PurchaseStatus::Completed,
            created_at: at,
        };
        state.purchases.push(recorded.clone());
        Ok(recorded)
    }

    async fn purchases_for_user(&self, user_id: i64) -> Result<Vec<Purchase>, StoreError> {
        let state = self.lock().await?;
        let mut owned: Vec<Purchase> = state
            .purchases
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned)
    }
}

/// TTL cache held in process memory
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        matches!(self.get(key).await, Ok(Some(_)))
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Cache whose every operation hangs for an hour, so only the op timeout ends it
#[derive(Default)]
pub struct StalledCache {
    calls: AtomicUsize,
}

impl StalledCache {
    pub const STALL: Duration = Duration::from_secs(3600);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Self::STALL).await;
    }
}

#[async_trait]
impl CacheStore for StalledCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.stall().await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        self.stall().await;
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        self.stall().await;
        Ok(())
    }
}

/// Hands out a fixed sequence of codes, repeating the last one forever
pub struct ScriptedCodes {
    codes: StdMutex<VecDeque<String>>,
}

impl ScriptedCodes {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: StdMutex::new(codes.iter().map(|c| c.to_string()).collect()),
        }
    }
}

impl CodeGenerator for ScriptedCodes {
    fn generate(&self) -> String {
        let mut codes = self.codes.lock().unwrap();
        if codes.len() > 1 {
            codes.pop_front().unwrap()
        } else {
            codes.front().cloned().unwrap_or_else(|| RandomCodeGenerator.generate())
        }
    }
}

/// An active campaign that started an hour ago and runs for 30 days
pub fn campaign_draft(discount: Decimal, capacity: i32) -> CampaignDraft {
    let now = Utc::now();
    CampaignDraft {
        name: format!("{}% off", discount),
        discount,
        start_date: now - ChronoDuration::hours(1),
        end_date: now + ChronoDuration::days(30),
        capacity,
        status: CampaignStatus::Active,
    }
}

pub fn new_voucher(campaign: &Campaign, user_id: i64, code: &str) -> NewVoucher {
    let now = Utc::now();
    NewVoucher {
        code: code.to_string(),
        user_id,
        campaign_id: campaign.id,
        discount: campaign.discount,
        valid_from: now,
        valid_to: now + ChronoDuration::days(30),
    }
}

/// A voucher engine over the given doubles: base price 100, default TTLs
pub fn voucher_service(
    store: Arc<InMemoryStore>,
    cache: Arc<dyn CacheStore>,
    codes: Arc<dyn CodeGenerator>,
) -> VoucherService {
    let cache = CacheAside::new(cache, Duration::from_millis(100));
    let directory = CampaignDirectory::new(store.clone(), cache.clone(), Duration::from_secs(300));
    VoucherService::new(
        directory,
        store,
        cache,
        codes,
        PurchasePricing::new(Decimal::ONE_HUNDRED),
        Duration::from_secs(1800),
    )
}

/// Router state wired to in-memory doubles
pub fn app_state(store: Arc<InMemoryStore>) -> AppState {
    let cache_store: Arc<dyn CacheStore> = Arc::new(InMemoryCache::new());
    let cache = CacheAside::new(cache_store.clone(), Duration::from_millis(100));
    let directory = CampaignDirectory::new(store.clone(), cache, Duration::from_secs(300));

    AppState {
        campaign_service: CampaignService::new(store.clone(), directory),
        voucher_service: voucher_service(store, cache_store, Arc::new(RandomCodeGenerator)),
        tokens: Arc::new(TokenService::new(TEST_JWT_SECRET.to_string())),
    }
}

/// A valid bearer header value for `user_id`
pub fn bearer_for(user_id: i64) -> String {
    let token = TokenService::new(TEST_JWT_SECRET.to_string())
        .generate_access_token(user_id, &format!("user{}@example.com", user_id))
        .unwrap();
    format!("Bearer {}", token)
}
