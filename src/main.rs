// src/main.rs
//
// Diagnostic HTTP service: every transaction is logged by `DiagLogLayer`.
//
//   DIAGLOG_PORT__=8000 DIAGLOG_LOG_LEVEL__=debug cargo run
//   curl -X POST -d '{"a":1}' http://127.0.0.1:8000/echo

use std::net::SocketAddr;

use tokio::net::TcpListener;

use diaglog_rs::logger::{Level, Logger};
use diaglog_rs::{Config, build_app};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let logger = Logger::from_config(&config);

    let app = build_app(&config, logger.clone());

    let listener = TcpListener::bind(config.bind_address()).await?;
    logger.log(
        Level::Info,
        format!(
            "Serving on http://{} (capture policy: {})",
            listener.local_addr()?,
            config.capture_policy
        ),
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
