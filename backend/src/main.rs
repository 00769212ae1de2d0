mod catalog;
mod detector;
mod receipt;
mod routes;
mod ws;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use catalog::Catalog;
use detector::Detector;
use routes::configure_routes;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let catalog = match Catalog::load() {
        Ok(catalog) => catalog,
        Err(e) => {
            log::error!("Failed to load product catalog: {e}");
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Catalog loading failed: {e}"),
            ));
        }
    };
    log::info!("Catalog loaded with {} products", catalog.entries().len());

    // Detection mode is fixed here for the life of the process.
    let detector = Detector::from_env(&catalog);

    let catalog = web::Data::new(catalog);
    let detector = web::Data::new(detector);

    let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let bind_address = format!("0.0.0.0:{}", port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(catalog.clone())
            .app_data(detector.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
