use actix_web::web;

pub mod error;
pub mod health;
pub mod notes;

/// Largest request body accepted by any route, raw or decoded
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Register every route plus the body size limits. Shared by `main` and the
/// handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
        .app_data(web::FormConfig::default().limit(MAX_BODY_BYTES));

    health::config_routes(cfg);
    notes::config(cfg);
}
