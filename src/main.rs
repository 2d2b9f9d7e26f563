use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use barcode_api::config::Settings;
use barcode_api::scan::Scanner;
use barcode_api::server;
use std::{env, fs, process};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: ./barcode-api [config file]";

fn get_args() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        println!("{USAGE}");
        process::exit(1);
    }

    args.get(1).cloned()
}

#[actix_web::main]
async fn main() -> Result<()> {
    let config_file = get_args();
    let settings = Settings::load(config_file.as_deref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Scratch directory for uploads
    fs::create_dir_all(&settings.upload_dir)
        .with_context(|| format!("failed to create upload dir {:?}", settings.upload_dir))?;

    let scanner = Scanner::from_backends(&settings.scan_backends)?
        .with_max_dimension(settings.max_image_dimension);
    let scanner = web::Data::new(scanner);
    let limit = settings.max_upload_bytes;
    let (host, port) = settings.bind_addr();
    let workers = settings.workers;
    let settings = web::Data::new(settings);

    info!("listening on {host}:{port}");

    // Start the HTTP server
    let mut http = HttpServer::new(move || {
        App::new()
            .app_data(scanner.clone())
            .app_data(settings.clone())
            .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
            .wrap(middleware::Logger::default())
            .configure(server::configure(limit))
    });
    if let Some(workers) = workers {
        http = http.workers(workers);
    }

    http.bind((host.as_str(), port))
        .with_context(|| format!("failed to bind {host}:{port}"))?
        .run()
        .await?;

    Ok(())
}
