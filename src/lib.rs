//! Festpass - event registration service
//!
//! Collects attendee details, charges a flat per-head fee through the
//! payment gateway, issues a QR pass and PDF receipt, records registrations
//! in SQLite (mirrored to a CSV ledger), marks attendance on QR scan, and
//! exposes a session-gated admin surface with aggregates, exports and
//! refunds.
//!
//! ## Module Structure
//!
//! - `config`: environment-sourced configuration, read once at startup
//! - `fees`: the pluggable semester fee policy
//! - `store`: authoritative SQLite record store
//! - `ledger`: derived CSV mirror of the store
//! - `pending`: TTL-bounded staging for in-flight registrations
//! - `gateway`: payment gateway REST client (orders, refunds)
//! - `notify`: best-effort confirmation messaging
//! - `artifacts`: QR pass and PDF receipt generation
//! - `registration`: the workflow facade tying the above together
//! - `auth`: admin session management
//! - `reports`: snapshot exports for the admin surface
//! - `api`: REST API

pub mod api;
pub mod artifacts;
pub mod auth;
pub mod config;
pub mod fees;
pub mod gateway;
pub mod ledger;
pub mod notify;
pub mod pending;
pub mod registration;
pub mod reports;
pub mod store;

pub use api::{routes::build_router, ApiState};
pub use artifacts::ArtifactStore;
pub use auth::AdminAuth;
pub use config::{AppConfig, GatewayConfig, MessagingConfig};
pub use fees::{FeePolicy, FeeQuote, WaiverMode, MAX_SEMESTER};
pub use gateway::{GatewayOrder, GatewayRefund, PaymentGateway};
pub use ledger::LedgerMirror;
pub use notify::Notifier;
pub use pending::{PendingStore, StagedRegistration};
pub use registration::{
    PaymentInit, Registrar, RegistrationError, RegistrationInput, StartOutcome,
};
pub use store::{
    AttendanceOutcome, DashboardTotals, NewRegistrant, PaymentStatus, Registrant,
    RegistrantStore, StoreError,
};
