//! HTTP handlers for fingersheet-web

pub mod errors;
pub mod health;
pub mod ui;
pub mod upload;

pub use errors::{handle_panic, not_found};
pub use health::health_routes;
pub use ui::ui_routes;
pub use upload::upload_routes;
