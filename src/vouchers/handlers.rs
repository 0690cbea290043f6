// HTTP handlers for voucher and purchase endpoints

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::vouchers::{
    CampaignIdRequest, Purchase, ValidateVoucherRequest, Voucher, VoucherError,
    VoucherValidationResponse,
};
use crate::AppState;

/// Error returned by voucher handlers: a malformed request or an engine rejection
#[derive(Debug)]
pub enum VoucherApiError {
    Request(ApiError),
    Engine(VoucherError),
}

impl From<VoucherError> for VoucherApiError {
    fn from(err: VoucherError) -> Self {
        VoucherApiError::Engine(err)
    }
}

impl From<validator::ValidationErrors> for VoucherApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        VoucherApiError::Request(ApiError::from(errors))
    }
}

impl axum::response::IntoResponse for VoucherApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            VoucherApiError::Request(err) => err.into_response(),
            VoucherApiError::Engine(err) => err.into_response(),
        }
    }
}

/// Handler for POST /api/vouchers/generate
/// Issues a voucher for a campaign to the authenticated user
#[utoipa::path(
    post,
    path = "/api/vouchers/generate",
    request_body = CampaignIdRequest,
    responses(
        (status = 201, description = "Voucher issued", body = Voucher),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already issued, capacity exhausted or no free code", body = crate::error::ErrorResponse),
        (status = 422, description = "Campaign not active, not started or ended", body = crate::error::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vouchers"
)]
pub async fn generate_voucher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CampaignIdRequest>,
) -> Result<(StatusCode, Json<Voucher>), VoucherApiError> {
    payload.validate()?;

    let voucher = state
        .voucher_service
        .issue_voucher(user.user_id, payload.campaign_id)
        .await?;

    Ok((StatusCode::CREATED, Json(voucher)))
}

/// Handler for POST /api/vouchers/validate
/// Reports whether the caller's voucher code is valid and whether it was used
#[utoipa::path(
    post,
    path = "/api/vouchers/validate",
    request_body = ValidateVoucherRequest,
    responses(
        (status = 200, description = "Voucher found", body = VoucherValidationResponse),
        (status = 404, description = "Unknown or expired code", body = crate::error::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "vouchers"
)]
pub async fn validate_voucher(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ValidateVoucherRequest>,
) -> Result<Json<VoucherValidationResponse>, VoucherApiError> {
    payload.validate()?;

    let validation = state
        .voucher_service
        .validate_voucher(user.user_id, &payload.code)
        .await?;

    Ok(Json(validation.into()))
}

/// Handler for POST /api/purchases
/// Redeems the caller's voucher for a campaign as a discounted purchase
#[utoipa::path(
    post,
    path = "/api/purchases",
    request_body = CampaignIdRequest,
    responses(
        (status = 201, description = "Purchase completed", body = Purchase),
        (status = 404, description = "No unused, unexpired voucher for the campaign", body = crate::error::ErrorResponse),
        (status = 409, description = "Voucher already redeemed", body = crate::error::ErrorResponse),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchases"
)]
pub async fn create_purchase(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CampaignIdRequest>,
) -> Result<(StatusCode, Json<Purchase>), VoucherApiError> {
    payload.validate()?;

    let purchase = state
        .voucher_service
        .purchase(user.user_id, payload.campaign_id)
        .await?;

    Ok((StatusCode::CREATED, Json(purchase)))
}

/// Handler for GET /api/purchases
/// Lists the caller's purchases, newest first
#[utoipa::path(
    get,
    path = "/api/purchases",
    responses(
        (status = 200, description = "Purchase history", body = Vec<Purchase>),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "purchases"
)]
pub async fn purchase_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Purchase>>, VoucherApiError> {
    let purchases = state.voucher_service.purchase_history(user.user_id).await?;
    tracing::debug!("Retrieved {} purchases for user {}", purchases.len(), user.user_id);
    Ok(Json(purchases))
}
