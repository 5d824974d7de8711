//! Service Configuration
//!
//! All credentials and paths are read once from the process environment by
//! `AppConfig::from_env` and handed to components at construction. Business
//! logic never reads ambient environment state.

use crate::fees::FeePolicy;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Default TTL for staged registrations awaiting payment confirmation.
pub const DEFAULT_PENDING_TTL_SECS: u64 = 30 * 60;

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database path (authoritative record store)
    pub database_path: PathBuf,
    /// Ledger mirror CSV path
    pub ledger_path: PathBuf,
    /// Root directory for generated QR/PDF artifacts
    pub artifacts_dir: PathBuf,
    /// Event code prefixed to every registrant identifier
    pub event_code: String,
    /// Payment gateway credentials
    pub gateway: GatewayConfig,
    /// Messaging provider credentials (None disables notifications)
    pub messaging: Option<MessagingConfig>,
    /// Admin credentials for the reporting surface
    pub admin: AdminConfig,
    /// Semester fee policy
    pub fee: FeePolicy,
    /// How long a staged registration survives without payment confirmation
    pub pending_ttl_secs: u64,
}

/// Payment gateway credentials and endpoint.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    /// Overridable so tests can point at a mock server
    pub base_url: String,
}

/// Messaging provider (WhatsApp) credentials and endpoint.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, without the `whatsapp:` prefix
    pub from_number: String,
    /// Dialing prefix applied to registrant phone numbers
    pub country_code: String,
    pub base_url: String,
}

/// Admin credentials for session-gated routes.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

impl AppConfig {
    /// Read the full configuration from the environment.
    ///
    /// Gateway credentials are mandatory; everything else falls back to a
    /// sensible default. Messaging is disabled unless both the account SID
    /// and auth token are present.
    pub fn from_env() -> Result<Self> {
        let key_id = std::env::var("GATEWAY_KEY_ID").ok();
        let key_secret = std::env::var("GATEWAY_KEY_SECRET").ok();
        let (key_id, key_secret) = match (key_id, key_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => bail!("set GATEWAY_KEY_ID and GATEWAY_KEY_SECRET in the environment"),
        };

        let gateway = GatewayConfig {
            key_id,
            key_secret,
            base_url: env_or("GATEWAY_URL", "https://api.razorpay.com"),
        };

        let messaging = match (
            std::env::var("MSG_ACCOUNT_SID").ok(),
            std::env::var("MSG_AUTH_TOKEN").ok(),
        ) {
            (Some(account_sid), Some(auth_token)) => Some(MessagingConfig {
                account_sid,
                auth_token,
                from_number: env_or("MSG_WHATSAPP_FROM", "+14155238886"),
                country_code: env_or("MSG_COUNTRY_CODE", "+91"),
                base_url: env_or("MSG_URL", "https://api.twilio.com"),
            }),
            _ => None,
        };

        let admin = AdminConfig {
            username: env_or("ADMIN_USERNAME", "admin"),
            password: env_or("ADMIN_PASSWORD", "admin"),
        };

        let mut fee = FeePolicy::default();
        if let Ok(price) = std::env::var("FEE_UNIT_PRICE") {
            fee.unit_price = price
                .parse()
                .context("FEE_UNIT_PRICE must be a whole rupee amount")?;
        }
        if let Ok(semesters) = std::env::var("FEE_WAIVED_SEMESTERS") {
            fee.waived_semesters = semesters
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim()
                        .parse()
                        .context("FEE_WAIVED_SEMESTERS entries must be semester numbers")
                })
                .collect::<Result<_>>()?;
        }
        if let Ok(mode) = std::env::var("FEE_WAIVER_MODE") {
            fee.waiver_mode = mode.parse()?;
        }

        let pending_ttl_secs = match std::env::var("PENDING_TTL_SECS") {
            Ok(v) => v.parse().context("PENDING_TTL_SECS must be seconds")?,
            Err(_) => DEFAULT_PENDING_TTL_SECS,
        };

        Ok(Self {
            database_path: env_or("FESTPASS_DB", "data/festpass.db").into(),
            ledger_path: env_or("FESTPASS_LEDGER", "data/registrations.csv").into(),
            artifacts_dir: env_or("FESTPASS_ARTIFACTS", "data/artifacts").into(),
            event_code: env_or("EVENT_CODE", "FEST2025"),
            gateway,
            messaging,
            admin,
            fee,
            pending_ttl_secs,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
