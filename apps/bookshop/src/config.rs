// apps/bookshop/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

pub const MIN_CLAIM_CODE_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
  Postgres,
  Memory,
}

impl FromStr for StorageBackend {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
      "memory" | "in-memory" => Ok(StorageBackend::Memory),
      other => Err(AppError::Config(format!(
        "Invalid STORAGE_BACKEND '{}': expected 'postgres' or 'memory'",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
  #[default]
  Pretty,
  Json,
}

impl FromStr for LogFormat {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pretty" | "text" => Ok(LogFormat::Pretty),
      "json" => Ok(LogFormat::Json),
      other => Err(AppError::Config(format!(
        "Invalid LOG_FORMAT '{}': expected 'pretty' or 'json'",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub storage_backend: StorageBackend,
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub seed_db: bool,

  pub email_sender: String,

  /// Units across one order that trigger the bulk discount.
  pub bulk_discount_threshold: i64,
  pub bulk_discount_percent: i64,

  pub claim_code_length: usize,
  /// Upper bound on claim-code draws and on persist retries after a collision.
  pub claim_code_attempts: u32,

  pub log_format: LogFormat,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_source(|name| env::var(name).ok())
  }

  /// Builds the configuration from an arbitrary variable lookup.
  pub fn from_source<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let server_host = get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parse_or(&get, "SERVER_PORT", 8080u16)?;
    let storage_backend = match get("STORAGE_BACKEND") {
      Some(raw) => raw.parse::<StorageBackend>()?,
      None => StorageBackend::Postgres,
    };
    let database_url = get("DATABASE_URL");
    if storage_backend == StorageBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (required when STORAGE_BACKEND=postgres)".to_string(),
      ));
    }
    let run_migrations = parse_or(&get, "RUN_MIGRATIONS", true)?;
    let seed_db = parse_or(&get, "SEED_DB", false)?;
    let email_sender = get("EMAIL_SENDER").unwrap_or_else(|| "noreply@bookshop.local".to_string());

    let bulk_discount_threshold = parse_or(&get, "BULK_DISCOUNT_THRESHOLD", 5i64)?;
    if bulk_discount_threshold < 1 {
      return Err(AppError::Config("BULK_DISCOUNT_THRESHOLD must be at least 1".to_string()));
    }
    let bulk_discount_percent = parse_or(&get, "BULK_DISCOUNT_PERCENT", 5i64)?;
    if !(0..=100).contains(&bulk_discount_percent) {
      return Err(AppError::Config("BULK_DISCOUNT_PERCENT must be between 0 and 100".to_string()));
    }

    let claim_code_length = parse_or(&get, "CLAIM_CODE_LENGTH", 10usize)?;
    if claim_code_length < MIN_CLAIM_CODE_LENGTH {
      return Err(AppError::Config(format!(
        "CLAIM_CODE_LENGTH must be at least {}",
        MIN_CLAIM_CODE_LENGTH
      )));
    }
    let claim_code_attempts = parse_or(&get, "CLAIM_CODE_ATTEMPTS", 5u32)?;
    if claim_code_attempts == 0 {
      return Err(AppError::Config("CLAIM_CODE_ATTEMPTS must be at least 1".to_string()));
    }

    let log_format = match get("LOG_FORMAT") {
      Some(raw) => raw.parse::<LogFormat>()?,
      None => LogFormat::default(),
    };

    // Never log DATABASE_URL: it carries credentials.
    tracing::info!(
      host = %server_host,
      port = server_port,
      backend = ?storage_backend,
      "Application configuration loaded successfully."
    );

    Ok(Self {
      server_host,
      server_port,
      storage_backend,
      database_url,
      run_migrations,
      seed_db,
      email_sender,
      bulk_discount_threshold,
      bulk_discount_percent,
      claim_code_length,
      claim_code_attempts,
      log_format,
    })
  }

  /// Defaults with the in-memory backend; what tests and local demos start from.
  pub fn in_memory() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      storage_backend: StorageBackend::Memory,
      database_url: None,
      run_migrations: false,
      seed_db: false,
      email_sender: "noreply@bookshop.local".to_string(),
      bulk_discount_threshold: 5,
      bulk_discount_percent: 5,
      claim_code_length: 10,
      claim_code_attempts: 5,
      log_format: LogFormat::Pretty,
    }
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
  G: Fn(&str) -> Option<String>,
{
  match get(name) {
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e))),
    None => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
  }

  #[test]
  fn defaults_apply_when_only_database_url_is_set() {
    let cfg = AppConfig::from_source(lookup(&[("DATABASE_URL", "postgres://localhost/bookshop")])).unwrap();
    assert_eq!(cfg.server_host, "127.0.0.1");
    assert_eq!(cfg.server_port, 8080);
    assert_eq!(cfg.storage_backend, StorageBackend::Postgres);
    assert!(cfg.run_migrations);
    assert!(!cfg.seed_db);
    assert_eq!(cfg.bulk_discount_threshold, 5);
    assert_eq!(cfg.bulk_discount_percent, 5);
    assert_eq!(cfg.claim_code_length, 10);
    assert_eq!(cfg.claim_code_attempts, 5);
    assert_eq!(cfg.log_format, LogFormat::Pretty);
  }

  #[test]
  fn postgres_backend_requires_database_url() {
    let err = AppConfig::from_source(lookup(&[])).unwrap_err();
    assert!(matches!(err, AppError::Config(m) if m.contains("DATABASE_URL")));
  }

  #[test]
  fn memory_backend_needs_no_database() {
    let cfg = AppConfig::from_source(lookup(&[("STORAGE_BACKEND", "memory"), ("LOG_FORMAT", "json")])).unwrap();
    assert_eq!(cfg.storage_backend, StorageBackend::Memory);
    assert_eq!(cfg.database_url, None);
    assert_eq!(cfg.log_format, LogFormat::Json);
  }

  #[test]
  fn rejects_bad_values() {
    let base = [("STORAGE_BACKEND", "memory")];
    for (name, value) in [
      ("SERVER_PORT", "eighty"),
      ("SEED_DB", "sometimes"),
      ("BULK_DISCOUNT_PERCENT", "101"),
      ("BULK_DISCOUNT_THRESHOLD", "0"),
      ("CLAIM_CODE_LENGTH", "6"),
      ("CLAIM_CODE_ATTEMPTS", "0"),
      ("STORAGE_BACKEND", "sqlite"),
    ] {
      let mut vars = base.to_vec();
      vars.retain(|(k, _)| *k != name);
      vars.push((name, value));
      let result = AppConfig::from_source(lookup(&vars));
      assert!(matches!(result, Err(AppError::Config(_))), "{}={} should be rejected", name, value);
    }
  }

  #[test]
  fn blank_values_fall_back_to_defaults() {
    let cfg = AppConfig::from_source(lookup(&[("STORAGE_BACKEND", "memory"), ("SERVER_PORT", "  ")])).unwrap();
    assert_eq!(cfg.server_port, 8080);
    assert_eq!(cfg.bind_address(), "127.0.0.1:8080");
  }
}
