pub mod app;
pub mod config;
pub mod metrics;
pub mod users;

pub use app::{build_app, build_issuer, build_router, AppState};
pub use config::{load_service_config, service_config_from, ServiceConfig};
