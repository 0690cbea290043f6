// Voucher engine error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use crate::campaigns::CampaignStatus;
use crate::db::StoreError;
use crate::error::ErrorResponse;

/// Coarse classification of engine failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Conflict,
    Transient,
    InvariantViolation,
}

/// Failures of issuance, validation and redemption
#[derive(Debug, thiserror::Error)]
pub enum VoucherError {
    #[error("Campaign {0} not found")]
    CampaignNotFound(i64),

    #[error("Voucher not found or expired")]
    VoucherNotFound,

    #[error("Campaign {campaign_id} is {status}")]
    CampaignNotActive {
        campaign_id: i64,
        status: CampaignStatus,
    },

    #[error("Campaign {0} has not started yet")]
    CampaignNotStarted(i64),

    #[error("Campaign {0} has ended")]
    CampaignExpired(i64),

    #[error("An unused voucher for campaign {0} was already issued to this user")]
    VoucherAlreadyIssued(i64),

    #[error("Campaign {0} has no vouchers left")]
    CapacityExceeded(i64),

    #[error("Voucher has already been redeemed")]
    AlreadyRedeemed,

    #[error("Could not generate a unique voucher code after {0} attempts")]
    CodeGenerationExhausted(usize),

    #[error("Store unavailable: {0}")]
    Transient(#[source] StoreError),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl VoucherError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoucherError::CampaignNotFound(_) | VoucherError::VoucherNotFound => ErrorKind::NotFound,
            VoucherError::CampaignNotActive { .. }
            | VoucherError::CampaignNotStarted(_)
            | VoucherError::CampaignExpired(_) => ErrorKind::InvalidState,
            VoucherError::VoucherAlreadyIssued(_)
            | VoucherError::CapacityExceeded(_)
            | VoucherError::AlreadyRedeemed
            | VoucherError::CodeGenerationExhausted(_) => ErrorKind::Conflict,
            VoucherError::Transient(_) => ErrorKind::Transient,
            VoucherError::InvariantViolation(_) => ErrorKind::InvariantViolation,
        }
    }

    /// Machine-readable code, distinct per rejection
    pub fn error_code(&self) -> &'static str {
        match self {
            VoucherError::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            VoucherError::VoucherNotFound => "VOUCHER_NOT_FOUND",
            VoucherError::CampaignNotActive { .. } => "CAMPAIGN_NOT_ACTIVE",
            VoucherError::CampaignNotStarted(_) => "CAMPAIGN_NOT_STARTED",
            VoucherError::CampaignExpired(_) => "CAMPAIGN_EXPIRED",
            VoucherError::VoucherAlreadyIssued(_) => "VOUCHER_ALREADY_ISSUED",
            VoucherError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            VoucherError::AlreadyRedeemed => "VOUCHER_ALREADY_REDEEMED",
            VoucherError::CodeGenerationExhausted(_) => "CODE_GENERATION_EXHAUSTED",
            VoucherError::Transient(_) => "STORE_UNAVAILABLE",
            VoucherError::InvariantViolation(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InvariantViolation => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Store failures that reach the engine unclassified
///
/// Constraint outcomes (`DuplicateCode`, `DuplicateUnused`, ...) are mapped
/// explicitly at each call site; this conversion covers what is left.
impl From<StoreError> for VoucherError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CapacityCorrupted { issued, capacity } => VoucherError::InvariantViolation(
                format!("{} vouchers issued against capacity {}", issued, capacity),
            ),
            other => VoucherError::Transient(other),
        }
    }
}

impl IntoResponse for VoucherError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self.kind() {
            ErrorKind::NotFound | ErrorKind::InvalidState => {
                debug!("Voucher request rejected: {}", self);
                self.to_string()
            }
            ErrorKind::Conflict => {
                warn!("Voucher conflict: {}", self);
                self.to_string()
            }
            ErrorKind::Transient => {
                error!("Voucher store failure: {:?}", self);
                "The service is temporarily unavailable, retry later".to_string()
            }
            ErrorKind::InvariantViolation => {
                error!("Voucher invariant violation: {}", self);
                "An internal server error occurred".to_string()
            }
        };

        (status, Json(ErrorResponse::new(self.error_code(), message))).into_response()
    }
}
