use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Campaign status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Active,
    Paused,
    Expired,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a campaign may issue vouchers at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotActive(CampaignStatus),
    NotStarted,
    Ended,
}

/// A time-boxed promotional campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Campaign {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "Summer Sale")]
    pub name: String,
    /// Discount percentage, 0 < discount <= 100
    #[schema(value_type = String, example = "30.00")]
    pub discount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Maximum number of vouchers the campaign may ever issue
    #[schema(example = 500)]
    pub capacity: i32,
    pub status: CampaignStatus,
    pub creator_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Eligible iff status is active and `now` lies in `[start_date, end_date)`
    pub fn eligibility(&self, now: DateTime<Utc>) -> Eligibility {
        if self.status != CampaignStatus::Active {
            Eligibility::NotActive(self.status)
        } else if now < self.start_date {
            Eligibility::NotStarted
        } else if now >= self.end_date {
            Eligibility::Ended
        } else {
            Eligibility::Eligible
        }
    }

    /// Checks the cross-field invariants that request validation alone
    /// cannot see after a partial update is merged
    pub fn check_definition(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name must not be empty".to_string());
        }
        if self.discount <= Decimal::ZERO || self.discount > Decimal::ONE_HUNDRED {
            return Err("Discount must be greater than 0 and at most 100".to_string());
        }
        if self.capacity < 1 {
            return Err("Capacity must be at least 1".to_string());
        }
        if self.start_date >= self.end_date {
            return Err("Start date must be before end date".to_string());
        }
        Ok(())
    }
}

/// Fields needed to insert a campaign
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    pub name: String,
    pub discount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub capacity: i32,
    pub status: CampaignStatus,
}

/// Request DTO for POST /api/campaigns
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_window"))]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[schema(example = "Summer Sale")]
    pub name: String,
    #[validate(custom = "validate_discount_rate")]
    #[schema(value_type = String, example = "30")]
    pub discount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    #[schema(example = 500)]
    pub capacity: i32,
    pub status: Option<CampaignStatus>,
}

impl From<CreateCampaignRequest> for CampaignDraft {
    fn from(request: CreateCampaignRequest) -> Self {
        Self {
            name: request.name,
            discount: request.discount,
            start_date: request.start_date,
            end_date: request.end_date,
            capacity: request.capacity,
            status: request.status.unwrap_or_default(),
        }
    }
}

/// Request DTO for PUT /api/campaigns/{id}
///
/// All fields are optional; omitted fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    #[validate(custom = "validate_discount_rate")]
    #[schema(value_type = Option<String>, example = "25")]
    pub discount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,
    pub status: Option<CampaignStatus>,
}

impl UpdateCampaignRequest {
    /// Merges the provided fields onto a stored campaign
    pub fn apply_to(self, campaign: &mut Campaign) {
        if let Some(name) = self.name {
            campaign.name = name;
        }
        if let Some(discount) = self.discount {
            campaign.discount = discount;
        }
        if let Some(start_date) = self.start_date {
            campaign.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            campaign.end_date = end_date;
        }
        if let Some(capacity) = self.capacity {
            campaign.capacity = capacity;
        }
        if let Some(status) = self.status {
            campaign.status = status;
        }
    }
}

/// Validates that a discount rate lies in (0, 100]
pub fn validate_discount_rate(discount: &Decimal) -> Result<(), ValidationError> {
    if *discount <= Decimal::ZERO || *discount > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("discount_out_of_range");
        err.message = Some("Discount must be greater than 0 and at most 100".into());
        return Err(err);
    }
    Ok(())
}

fn validate_create_window(request: &CreateCampaignRequest) -> Result<(), ValidationError> {
    if request.start_date >= request.end_date {
        let mut err = ValidationError::new("invalid_window");
        err.message = Some("Start date must be before end date".into());
        return Err(err);
    }
    Ok(())
}
