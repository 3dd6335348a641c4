use actix_web::{web, HttpResponse, Responder};
use chrono::{SecondsFormat, Utc};
use notes_types::HealthStatus;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)));
}

/// Liveness only: never touches storage
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthStatus {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
