use actix_cors::Cors;
use actix_web::{App, HttpServer};
use std::io;
use tracing_subscriber::EnvFilter;

mod database;
mod error;
mod models;
mod routes;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let db_uri: String =
        std::env::var("MONGODB_URI").unwrap_or_else(|_| String::from("mongodb://localhost:27017"));
    let bind_addr: String =
        std::env::var("FIR_BIND_ADDR").unwrap_or_else(|_| String::from("127.0.0.1:8000"));

    models::profile::load_keys();
    database::connect(db_uri).await;

    tracing::info!(%bind_addr, "starting fir-server");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(models::profile::ProfileAuthenticationMiddlewareFactory)
            .service(routes::get_file)
            .service(routes::profile::login)
            .service(routes::profile::create_profile)
            .service(routes::profile::get_profile)
            .service(routes::report::get_reports)
            .service(routes::report::get_report)
            .service(routes::report::create_report)
            .service(routes::report::create_report_details)
            .service(routes::report::create_report_attachment)
            .service(routes::report::create_risk_assessment)
            .service(routes::report::close_report)
            .service(routes::location::get_sites)
            .service(routes::location::get_site_departments)
            .service(routes::location::get_department_areas)
            .service(routes::location::get_area_equipment)
    })
    .bind(bind_addr)?
    .run()
    .await
}
