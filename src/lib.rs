pub mod auth;
pub mod cache;
pub mod campaigns;
pub mod config;
pub mod db;
pub mod error;
pub mod vouchers;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{extract::FromRef, http::StatusCode, response::Json, routing::get, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use auth::TokenService;
use campaigns::{Campaign, CampaignService, CampaignStatus, CreateCampaignRequest, UpdateCampaignRequest};
use error::ErrorResponse;
use vouchers::{
    CampaignIdRequest, Purchase, PurchaseStatus, ValidateVoucherRequest, Voucher, VoucherService,
    VoucherValidationResponse,
};

/// Upper bound on the time spent serving one request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Registers the bearer JWT scheme referenced by the protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        campaigns::create_campaign,
        campaigns::list_campaigns,
        campaigns::get_campaign,
        campaigns::update_campaign,
        campaigns::delete_campaign,
        vouchers::generate_voucher,
        vouchers::validate_voucher,
        vouchers::create_purchase,
        vouchers::purchase_history,
    ),
    components(
        schemas(
            Campaign, CampaignStatus, CreateCampaignRequest, UpdateCampaignRequest,
            Voucher, CampaignIdRequest, ValidateVoucherRequest, VoucherValidationResponse,
            Purchase, PurchaseStatus, ErrorResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "campaigns", description = "Promotional campaign management"),
        (name = "vouchers", description = "Voucher issuance and validation"),
        (name = "purchases", description = "Voucher redemption and purchase history")
    ),
    info(
        title = "Voucher Campaign API",
        version = "1.0.0",
        description = "Issues, validates and redeems discount vouchers for time-boxed campaigns"
    )
)]
pub struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub campaign_service: CampaignService,
    pub voucher_service: VoucherService,
    pub tokens: Arc<TokenService>,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// Handler for GET /health
async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds tracing, timeout and CORS layers
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        // Campaign routes
        .route(
            "/api/campaigns",
            post(campaigns::create_campaign).get(campaigns::list_campaigns),
        )
        .route(
            "/api/campaigns/:id",
            get(campaigns::get_campaign)
                .put(campaigns::update_campaign)
                .delete(campaigns::delete_campaign),
        )
        // Voucher routes
        .route("/api/vouchers/generate", post(vouchers::generate_voucher))
        .route("/api/vouchers/validate", post(vouchers::validate_voucher))
        // Purchase routes
        .route(
            "/api/purchases",
            post(vouchers::create_purchase).get(vouchers::purchase_history),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors),
        )
        .with_state(state)
}
