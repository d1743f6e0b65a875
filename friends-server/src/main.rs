use friends_common::db::create_db_async_pool;

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, LogSpecification, Logger, Naming, WriteMode,
};

use crate::handlers::error;
use crate::services::api::RouteLimiters;

mod env;
mod handlers;
mod middleware;
mod services;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut port = 9000u16;

    let mut args = std::env::args();

    // Eat the first argument, which is the relative path to the executable
    args.next();

    while let Some(arg) = args.next() {
        match arg.to_lowercase().as_str() {
            "--port" => {
                let port_str = match args.next() {
                    Some(s) => s,
                    None => {
                        eprintln!("ERROR: --port option specified but no port was given");
                        std::process::exit(1);
                    }
                };

                port = match port_str.parse::<u16>() {
                    Ok(p) => p,
                    Err(_) => {
                        eprintln!("ERROR: Incorrect format for port. Integer expected");
                        std::process::exit(1);
                    }
                };

                continue;
            }
            a => {
                eprintln!("ERROR: Invalid argument: {}", &a);
                std::process::exit(1);
            }
        }
    }

    let base_addr = format!("127.0.0.1:{}", &port);

    let log_spec = match LogSpecification::parse(&env::CONF.log_level) {
        Ok(s) => s,
        Err(_) => {
            eprintln!(
                "WARNING: Invalid log level '{}'. Falling back to info",
                env::CONF.log_level
            );
            LogSpecification::info()
        }
    };

    let logger = Logger::with(log_spec)
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start();

    let _logger = match logger {
        Ok(l) => l,
        Err(e) => {
            eprintln!("ERROR: Failed to start logger: {e}");
            std::process::exit(1);
        }
    };

    let actix_workers = env::CONF.workers.actix_workers;

    // To prevent resource starvation, max connections must be at least as large as the number of
    // actix workers
    let db_max_connections = env::CONF.db.max_connections.max(actix_workers as u32);

    log::info!("Connecting to database...");

    let db_async_pool = match create_db_async_pool(
        &env::CONF.db.database_uri,
        db_max_connections,
        env::CONF.db.idle_timeout,
    )
    .await
    {
        Ok(p) => p,
        Err(e) => {
            log::error!("Failed to connect to database: {e}");
            eprintln!("ERROR: Failed to connect to database");
            std::process::exit(1);
        }
    };

    log::info!("Successfully connected to database");

    // Shared across workers so that per-IP limits apply to the whole server
    let limiters = RouteLimiters::default();

    log::info!("Listening on {base_addr} with {actix_workers} workers");

    HttpServer::new(move || {
        let limiters = limiters.clone();

        App::new()
            .app_data(Data::new(db_async_pool.clone()))
            .app_data(error::json_config())
            .app_data(error::path_config())
            .app_data(error::query_config())
            .configure(|cfg| services::api::configure(cfg, limiters))
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(actix_workers)
    .bind(base_addr)?
    .run()
    .await?;

    Ok(())
}
