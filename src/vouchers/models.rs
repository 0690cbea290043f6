use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::campaigns::Campaign;

/// Days a voucher stays valid after issuance
pub const VOUCHER_VALIDITY_DAYS: i64 = 30;

/// An issued voucher
///
/// `discount` is copied from the campaign at issuance and never recomputed.
/// `used_at` is written at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Voucher {
    #[schema(example = 17)]
    pub id: i64,
    #[schema(example = "K7Q2ZP0A")]
    pub code: String,
    pub user_id: i64,
    pub campaign_id: i64,
    #[schema(value_type = String, example = "30.00")]
    pub discount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Voucher {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Unexpired iff `valid_to >= now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_to >= now
    }
}

/// A voucher about to be inserted
#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub code: String,
    pub user_id: i64,
    pub campaign_id: i64,
    pub discount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

/// Purchase status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Completed,
}

/// The monetary transaction that consumed a voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Purchase {
    pub id: i64,
    pub user_id: i64,
    #[schema(example = "TXN-6f1c4f3e-8d8e-4a4b-9a55-0d2b1b0b6c1e")]
    pub transaction_id: String,
    pub campaign_id: i64,
    pub voucher_id: i64,
    /// Money taken off the base price
    #[schema(value_type = String, example = "30.00")]
    pub discount_applied: Decimal,
    #[schema(value_type = String, example = "70.00")]
    pub final_price: Decimal,
    pub status: PurchaseStatus,
    pub created_at: DateTime<Utc>,
}

/// A purchase about to be recorded alongside a redemption
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub user_id: i64,
    pub transaction_id: String,
    pub campaign_id: i64,
    pub discount_applied: Decimal,
    pub final_price: Decimal,
}

/// Result of validating a voucher: the voucher, its campaign and usage state
#[derive(Debug, Clone)]
pub struct VoucherValidation {
    pub voucher: Voucher,
    pub campaign: Campaign,
    pub is_used: bool,
}

/// Request DTO for POST /api/vouchers/generate and POST /api/purchases
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CampaignIdRequest {
    #[validate(range(min = 1, message = "campaign_id must be positive"))]
    #[schema(example = 1)]
    pub campaign_id: i64,
}

/// Request DTO for POST /api/vouchers/validate
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ValidateVoucherRequest {
    #[validate(length(equal = 8, message = "Voucher codes are 8 characters long"))]
    #[schema(example = "K7Q2ZP0A")]
    pub code: String,
}

/// Response DTO for POST /api/vouchers/validate
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoucherValidationResponse {
    pub is_used: bool,
    pub campaign_id: i64,
    pub campaign_name: String,
    #[schema(value_type = String, example = "30.00")]
    pub discount_rate: Decimal,
    pub valid_to: DateTime<Utc>,
}

impl From<VoucherValidation> for VoucherValidationResponse {
    fn from(validation: VoucherValidation) -> Self {
        Self {
            is_used: validation.is_used,
            campaign_id: validation.voucher.campaign_id,
            campaign_name: validation.campaign.name,
            discount_rate: validation.voucher.discount,
            valid_to: validation.voucher.valid_to,
        }
    }
}
