pub mod code;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod pricing;
pub mod service;

pub use code::*;
pub use error::*;
pub use handlers::*;
pub use ledger::{PgVoucherLedger, VoucherLedger};
pub use models::*;
pub use pricing::*;
pub use service::*;
