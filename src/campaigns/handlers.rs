// HTTP handlers for campaign endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthenticatedUser;
use crate::campaigns::{Campaign, CreateCampaignRequest, UpdateCampaignRequest};
use crate::error::ApiError;
use crate::AppState;

/// Handler for POST /api/campaigns
/// Creates a campaign owned by the authenticated user
#[utoipa::path(
    post,
    path = "/api/campaigns",
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Campaign created", body = Campaign),
        (status = 400, description = "Invalid campaign definition", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 409, description = "Overlapping active campaign with the same discount", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "campaigns"
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    tracing::debug!("User {} creating campaign '{}'", user.user_id, payload.name);

    let campaign = state
        .campaign_service
        .create_campaign(user.user_id, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(campaign)))
}

/// Handler for GET /api/campaigns
/// Lists the campaigns owned by the authenticated user
#[utoipa::path(
    get,
    path = "/api/campaigns",
    responses(
        (status = 200, description = "Campaigns owned by the caller", body = Vec<Campaign>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "campaigns"
)]
pub async fn list_campaigns(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let campaigns = state.campaign_service.list_campaigns(user.user_id).await?;
    tracing::debug!("Retrieved {} campaigns for user {}", campaigns.len(), user.user_id);
    Ok(Json(campaigns))
}

/// Handler for GET /api/campaigns/:id
#[utoipa::path(
    get,
    path = "/api/campaigns/{id}",
    params(
        ("id" = i64, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign found", body = Campaign),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "campaigns"
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = state.campaign_service.get_campaign(id, user.user_id).await?;
    Ok(Json(campaign))
}

/// Handler for PUT /api/campaigns/:id
/// Partially updates a campaign; omitted fields are left unchanged
#[utoipa::path(
    put,
    path = "/api/campaigns/{id}",
    params(
        ("id" = i64, Path, description = "Campaign ID")
    ),
    request_body = UpdateCampaignRequest,
    responses(
        (status = 200, description = "Campaign updated", body = Campaign),
        (status = 400, description = "Invalid campaign definition", body = crate::error::ErrorResponse),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Capacity below the vouchers already issued", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "campaigns"
)]
pub async fn update_campaign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> Result<Json<Campaign>, ApiError> {
    tracing::debug!("User {} updating campaign {}", user.user_id, id);

    let campaign = state
        .campaign_service
        .update_campaign(id, user.user_id, payload)
        .await?;

    Ok(Json(campaign))
}

/// Handler for DELETE /api/campaigns/:id
#[utoipa::path(
    delete,
    path = "/api/campaigns/{id}",
    params(
        ("id" = i64, Path, description = "Campaign ID")
    ),
    responses(
        (status = 204, description = "Campaign deleted"),
        (status = 404, description = "Campaign not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Campaign has issued vouchers", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "campaigns"
)]
pub async fn delete_campaign(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.campaign_service.delete_campaign(id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
