//! Process configuration read from the environment.

use chrono::FixedOffset;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::shipping::ShippingRates;
use crate::domain::value_objects::Sellers;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent means in-memory storage.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub nats_url: Option<String>,
    pub nats_subject: String,
    pub shipping: ShippingRates,
    pub sellers: Sellers,
    /// Offset that defines local midnight for reporting periods.
    pub utc_offset: FixedOffset,
    pub invoice_base_url: String,
    pub order_id_prefix: String,
}

/// Loads `.env` if present, then reads the process environment.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

/// Builds the configuration from an arbitrary lookup so tests can feed a map.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let optional = |var: &str| lookup(var).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let or_default = |var: &str, default: &str| optional(var).unwrap_or_else(|| default.to_string());
    fn parse<T: FromStr>(var: &str, raw: String) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar { var: var.to_string(), reason: e.to_string() })
    }

    let low_weight_kg: Decimal = parse("SHIP_LOW_WEIGHT_KG", or_default("SHIP_LOW_WEIGHT_KG", "5"))?;
    if low_weight_kg < Decimal::ZERO {
        return Err(ConfigError::InvalidEnvVar { var: "SHIP_LOW_WEIGHT_KG".into(), reason: "must be a non-negative number".into() });
    }
    let shipping = ShippingRates {
        home_province: or_default("HOME_PROVINCE", "Đà Nẵng"),
        home_fee: parse::<Decimal>("SHIP_HOME_FEE", or_default("SHIP_HOME_FEE", "30000"))?,
        base_fee: parse::<Decimal>("SHIP_BASE_FEE", or_default("SHIP_BASE_FEE", "35000"))?,
        low_weight_kg,
        per_kg_fee: parse::<Decimal>("SHIP_PER_KG_FEE", or_default("SHIP_PER_KG_FEE", "7000"))?,
    };

    let sellers = Sellers::new(or_default("SELLERS", "admin").split(','))
        .map_err(|e| ConfigError::InvalidEnvVar { var: "SELLERS".into(), reason: e.to_string() })?;

    let offset_hours: i32 = parse("UTC_OFFSET_HOURS", or_default("UTC_OFFSET_HOURS", "7"))?;
    let utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| ConfigError::InvalidEnvVar {
        var: "UTC_OFFSET_HOURS".into(),
        reason: "offset out of range".into(),
    })?;

    Ok(AppConfig {
        database_url: optional("DATABASE_URL"),
        db_max_connections: parse("DB_MAX_CONNECTIONS", or_default("DB_MAX_CONNECTIONS", "10"))?,
        bind_addr: parse("BIND_ADDR", or_default("BIND_ADDR", "0.0.0.0:8083"))?,
        log_level: or_default("LOG_LEVEL", "info"),
        nats_url: optional("NATS_URL"),
        nats_subject: or_default("NATS_SUBJECT", "backoffice.orders"),
        shipping,
        sellers,
        utc_offset,
        invoice_base_url: or_default("INVOICE_BASE_URL", "/invoice").trim_end_matches('/').to_string(),
        order_id_prefix: or_default("ORDER_ID_PREFIX", "DH"),
    })
}
