/// Cache key builders
pub struct CacheKey;

impl CacheKey {
    pub fn campaign(campaign_id: i64) -> String {
        format!("campaign:{}", campaign_id)
    }

    /// Dedupe key: the user's unused voucher for a campaign
    pub fn user_campaign_voucher(user_id: i64, campaign_id: i64) -> String {
        format!("voucher:user:{}:campaign:{}", user_id, campaign_id)
    }

    /// Lookup key: a voucher by the user's code
    pub fn user_code_voucher(user_id: i64, code: &str) -> String {
        format!("voucher:user:{}:code:{}", user_id, code)
    }
}
