use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod config;
mod controllers;
mod db;
mod models;

use config::Config;
use db::NoteStore;

pub struct AppState {
    /// Pooled storage client, shared by every request
    pub store: Arc<dyn NoteStore>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Initializing {:?} database at {}",
        config.backend,
        config.database_location()
    );

    // Schema must exist before the listener opens
    let store = match db::open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let public_dir = config.public_dir.clone();
    let serve_public = public_dir.is_dir();
    if serve_public {
        log::info!("Serving static files from {:?}", public_dir);
    } else {
        log::info!("Static directory {:?} not found, serving API only", public_dir);
    }

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let mut app = App::new()
            .app_data(web::Data::new(AppState {
                store: Arc::clone(&store),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::configure);

        // Registered last so API routes take precedence
        if serve_public {
            app = app.service(Files::new("/", public_dir.clone()).index_file("index.html"));
        }

        app
    })
    .bind((config.bind_address.as_str(), config.port))?
    .run();

    log::info!("Notes App Server running on http://localhost:{}", config.port);
    log::info!("Database: {}", config.database_location());

    let server_handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            log::warn!("Failed to listen for Ctrl+C");
            return;
        }
        log::info!("Received Ctrl+C, shutting down...");
        server_handle.stop(true).await;
        log::info!("Shutdown complete");
    });

    server.await
}
