// apps/bookshop/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use bookshop::config::{AppConfig, LogFormat};
use bookshop::db;
use bookshop::state::AppState;
use bookshop::web::configure_app_routes;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  // RUST_LOG overrides the default level.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => Arc::new(cfg),
    Err(e) => {
      init_tracing(LogFormat::Pretty);
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::other(e.to_string()));
    }
  };
  init_tracing(app_config.log_format);
  tracing::info!("Starting bookshop order service...");

  let store = db::connect(&app_config).await.map_err(|e| {
    tracing::error!(error = %e, "Failed to open the store.");
    std::io::Error::other(e.to_string())
  })?;

  if app_config.seed_db {
    if let Err(e) = db::seed::seed(store.as_ref()).await {
      tracing::error!(error = %e, "Failed to seed database.");
    }
  }

  let app_state = AppState::with_defaults(app_config.clone(), store);

  let server_address = app_config.bind_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
