// Campaign module
// Campaign definitions, their cache-aside directory and owner-scoped CRUD

pub mod directory;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use directory::CampaignDirectory;
pub use handlers::*;
pub use models::*;
pub use repository::{CampaignStore, PgCampaignStore};
pub use service::CampaignService;
