//! Confirmation Notifications
//!
//! Best-effort WhatsApp confirmation through the messaging provider's REST
//! API (Twilio wire format). The sender is constructed disabled when no
//! credentials are configured. Callers log failures and move on; a lost
//! message never fails a registration.

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::config::MessagingConfig;
use crate::store::{PaymentStatus, Registrant};

pub struct Notifier {
    inner: Option<MessagingClient>,
}

struct MessagingClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    country_code: String,
}

impl Notifier {
    pub fn new(config: Option<&MessagingConfig>) -> Self {
        let inner = config.map(|cfg| MessagingClient {
            http: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            account_sid: cfg.account_sid.clone(),
            auth_token: cfg.auth_token.clone(),
            from_number: cfg.from_number.clone(),
            country_code: cfg.country_code.clone(),
        });
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Send the registration confirmation. A no-op when unconfigured.
    pub async fn send_confirmation(&self, reg: &Registrant, fee_waived: bool) -> Result<()> {
        let Some(client) = &self.inner else {
            debug!("messaging not configured; skipping confirmation");
            return Ok(());
        };
        let body = compose_confirmation(reg, fee_waived);
        client.send_whatsapp(&reg.phone, &body).await
    }
}

impl MessagingClient {
    async fn send_whatsapp(&self, phone: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let params = [
            ("From", format!("whatsapp:{}", self.from_number)),
            ("To", format!("whatsapp:{}{phone}", self.country_code)),
            ("Body", body.to_string()),
        ];
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .context("messaging request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("messaging provider rejected send: {status} {text}");
        }
        debug!(to = %phone, "confirmation sent");
        Ok(())
    }
}

/// Confirmation body: payment details when paid, the waiver note otherwise.
fn compose_confirmation(reg: &Registrant, fee_waived: bool) -> String {
    let payment_info = if reg.payment_status == PaymentStatus::Paid && !fee_waived {
        format!(
            "\n\nPayment details:\nAmount paid: Rs {}\nUPI ref: {}\nPayment ID: {}\nStatus: {}",
            reg.amount(),
            reg.upi_ref.as_deref().unwrap_or("N/A"),
            reg.payment_id.as_deref().unwrap_or("N/A"),
            reg.payment_status.as_str(),
        )
    } else {
        "\n\nYour semester qualifies for the fee waiver; any charge will be refunded after the event.".to_string()
    };
    format!(
        "Hi {}! Your spot is confirmed.\nEvent ID: {}{}\n\nSee you there!",
        reg.name, reg.uid, payment_info
    )
}
