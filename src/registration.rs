//! Registration Workflow
//!
//! The `Registrar` owns every collaborator and drives the registrant
//! lifecycle:
//!
//! ```text
//! start ──> gateway order ──> staged (pending store)
//!                                │ payment confirmed
//!                                v
//!                         persisted (paid)  <── durability boundary
//!                                │
//!              ┌───────┬────────┼─────────┐   post-commit, best-effort,
//!              QR      PDF   ledger    notify  individually fault-isolated
//!
//! verify: registered -> attended (at most once)
//! refund: paid -> refunded (at most once, gateway first)
//! ```
//!
//! Persistence is the durability boundary: a failure before it leaves no
//! trace, and a failure after it is logged without undoing the commit.

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::fees::{FeePolicy, MAX_SEMESTER};
use crate::gateway::PaymentGateway;
use crate::ledger::LedgerMirror;
use crate::notify::Notifier;
use crate::pending::{PendingStore, StagedRegistration};
use crate::store::{
    AttendanceOutcome, NewRegistrant, PaymentStatus, Registrant, RegistrantStore, StoreError,
};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),
    #[error("email or phone number already registered")]
    DuplicateContact,
    #[error("session expired; please register again")]
    SessionExpired,
    #[error("unknown registrant: {0}")]
    UnknownRegistrant(String),
    #[error("refund already processed")]
    AlreadyRefunded,
    #[error("payment not completed; nothing to refund")]
    NotPaid,
    #[error("payment gateway error: {0}")]
    Gateway(#[source] anyhow::Error),
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateContact => Self::DuplicateContact,
            other => Self::Storage(other),
        }
    }
}

/// Raw registration form fields.
#[derive(Debug, Clone)]
pub struct RegistrationInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub semester: u8,
    pub party_size: u8,
}

/// Data the caller needs to drive the client-side payment widget.
#[derive(Debug, Clone)]
pub struct PaymentInit {
    pub session_token: String,
    pub order_id: String,
    /// Total fee in whole rupees
    pub amount: u64,
    pub amount_minor: u64,
    pub currency: String,
    pub gateway_key_id: String,
}

/// Outcome of starting a registration.
#[derive(Debug)]
pub enum StartOutcome {
    /// A gateway order was created; the registration is staged until the
    /// payment confirmation arrives.
    PaymentRequired(PaymentInit),
    /// The fee was waived outright; the registrant is already durable.
    Registered(Registrant),
}

pub struct Registrar {
    store: RegistrantStore,
    ledger: LedgerMirror,
    pending: PendingStore,
    gateway: PaymentGateway,
    notifier: Notifier,
    artifacts: ArtifactStore,
    policy: FeePolicy,
    event_code: String,
}

impl Registrar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: RegistrantStore,
        ledger: LedgerMirror,
        pending: PendingStore,
        gateway: PaymentGateway,
        notifier: Notifier,
        artifacts: ArtifactStore,
        policy: FeePolicy,
        event_code: String,
    ) -> Self {
        Self {
            store,
            ledger,
            pending,
            gateway,
            notifier,
            artifacts,
            policy,
            event_code,
        }
    }

    pub fn store(&self) -> &RegistrantStore {
        &self.store
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn policy(&self) -> &FeePolicy {
        &self.policy
    }

    pub fn gateway_key_id(&self) -> &str {
        self.gateway.key_id()
    }

    // ========================================================================
    // REGISTRATION
    // ========================================================================

    /// Validate the form, compute the fee, create the gateway order and
    /// stage the payload. No durable side effects unless the fee is fully
    /// waived, in which case the registrant is persisted immediately.
    pub async fn start(&self, input: RegistrationInput) -> Result<StartOutcome, RegistrationError> {
        validate(&input, &self.policy)?;

        if self.store.contact_in_use(&input.email, &input.phone)? {
            return Err(RegistrationError::DuplicateContact);
        }

        let quote = self.policy.quote(input.semester, input.party_size);
        let uid = self.generate_uid();

        if quote.due_now_minor == 0 {
            // Free tier: no order, durable immediately
            let reg = self.store.insert(&NewRegistrant {
                uid,
                name: input.name,
                email: input.email,
                phone: input.phone,
                semester: input.semester,
                party_size: input.party_size,
                amount_minor: 0,
                upi_ref: None,
                payment_id: None,
                order_id: None,
                payment_status: PaymentStatus::Paid,
            })?;
            info!(uid = %reg.uid, semester = reg.semester, "fee-waived registration persisted");
            self.run_post_commit(&reg).await;
            return Ok(StartOutcome::Registered(reg));
        }

        let order = self
            .gateway
            .create_order(quote.due_now_minor)
            .await
            .map_err(RegistrationError::Gateway)?;

        let session_token = self.pending.stage(StagedRegistration {
            uid,
            name: input.name,
            email: input.email,
            phone: input.phone,
            semester: input.semester,
            party_size: input.party_size,
            amount_minor: quote.total_minor,
            order_id: order.id.clone(),
        });

        Ok(StartOutcome::PaymentRequired(PaymentInit {
            session_token,
            order_id: order.id,
            amount: quote.total,
            amount_minor: quote.total_minor,
            currency: "INR".to_string(),
            gateway_key_id: self.gateway.key_id().to_string(),
        }))
    }

    /// Finalize a registration after the gateway confirmed payment.
    ///
    /// Fails closed when the staged payload is gone (session expiry). The
    /// insert is the durability boundary; everything after it is best-effort.
    /// The staged payload is only consumed on a successful insert: a
    /// persistence failure puts it back under the same token so the
    /// confirmed payment is not lost and the completion can be retried.
    pub async fn complete(
        &self,
        session_token: &str,
        payment_id: &str,
        upi_ref: Option<String>,
    ) -> Result<Registrant, RegistrationError> {
        let staged = self
            .pending
            .take(session_token)
            .ok_or(RegistrationError::SessionExpired)?;

        let result = self.store.insert(&NewRegistrant {
            uid: staged.uid.clone(),
            name: staged.name.clone(),
            email: staged.email.clone(),
            phone: staged.phone.clone(),
            semester: staged.semester,
            party_size: staged.party_size,
            amount_minor: staged.amount_minor,
            upi_ref,
            payment_id: Some(payment_id.to_string()),
            order_id: Some(staged.order_id.clone()),
            payment_status: PaymentStatus::Paid,
        });
        let reg = match result {
            Ok(reg) => reg,
            Err(err) => {
                warn!(uid = %staged.uid, error = %err, "persistence failed; re-staging payload");
                self.pending.restore(session_token, staged);
                return Err(err.into());
            }
        };
        info!(uid = %reg.uid, amount = reg.amount(), "registration persisted");

        self.run_post_commit(&reg).await;
        Ok(reg)
    }

    /// Post-commit side effects. Each failure is logged and isolated from
    /// the others; none can undo the committed registration.
    async fn run_post_commit(&self, reg: &Registrant) {
        if let Err(e) = self.artifacts.write_qr(&reg.uid) {
            warn!(uid = %reg.uid, error = %e, "QR generation failed");
        }
        if let Err(e) = self.artifacts.write_receipt(reg) {
            warn!(uid = %reg.uid, error = %e, "receipt generation failed");
        }
        if let Err(e) = self.ledger.append(reg) {
            warn!(uid = %reg.uid, error = %e, "ledger append failed");
        }
        let waived = self.policy.waived(reg.semester);
        if let Err(e) = self.notifier.send_confirmation(reg, waived).await {
            warn!(uid = %reg.uid, error = %e, "confirmation send failed");
        }
    }

    // ========================================================================
    // ATTENDANCE
    // ========================================================================

    /// Attendance scan. The store performs the compare-and-set; a successful
    /// transition is mirrored into the ledger.
    pub fn verify_attendance(&self, uid: &str) -> Result<AttendanceOutcome, RegistrationError> {
        let outcome = self.store.mark_attended(uid)?;
        if let AttendanceOutcome::Marked(reg) = &outcome {
            info!(uid = %reg.uid, name = %reg.name, "attendance marked");
            if let Err(e) = self.ledger.mark_present(uid) {
                warn!(uid, error = %e, "ledger attendance update failed");
            }
        }
        Ok(outcome)
    }

    // ========================================================================
    // REFUND
    // ========================================================================

    /// Admin-triggered refund for the full fee (registrant plus dependents).
    ///
    /// Conflicts are rejected before any gateway call; a gateway failure
    /// leaves state untouched, so retrying the whole action is safe.
    pub async fn refund(&self, uid: &str) -> Result<Registrant, RegistrationError> {
        let reg = self
            .store
            .get(uid)?
            .ok_or_else(|| RegistrationError::UnknownRegistrant(uid.to_string()))?;
        if reg.refunded {
            return Err(RegistrationError::AlreadyRefunded);
        }
        if reg.payment_status != PaymentStatus::Paid {
            return Err(RegistrationError::NotPaid);
        }
        // Free-tier rows carry paid status with no captured payment; check
        // the amount before requiring a payment id.
        if reg.amount_minor == 0 {
            return Err(RegistrationError::Validation(
                "registration was free; nothing to refund".to_string(),
            ));
        }
        let Some(payment_id) = reg.payment_id.as_deref() else {
            return Err(RegistrationError::NotPaid);
        };

        let refund = self
            .gateway
            .refund_payment(payment_id, reg.amount_minor)
            .await
            .map_err(RegistrationError::Gateway)?;

        if !self.store.mark_refunded(uid, &refund.id)? {
            // Lost a race with another refund of the same registrant
            warn!(uid, refund_id = %refund.id, "refund state already transitioned");
            return Err(RegistrationError::AlreadyRefunded);
        }
        if let Err(e) = self.ledger.update_status(uid, PaymentStatus::Refunded.as_str()) {
            warn!(uid, error = %e, "ledger refund update failed");
        }

        self.store
            .get(uid)?
            .ok_or_else(|| RegistrationError::UnknownRegistrant(uid.to_string()))
    }

    // ========================================================================
    // ADMIN
    // ========================================================================

    /// Explicit admin removal of a registrant.
    pub fn delete(&self, uid: &str) -> Result<(), RegistrationError> {
        if !self.store.delete(uid)? {
            return Err(RegistrationError::UnknownRegistrant(uid.to_string()));
        }
        info!(uid, "registrant deleted by admin");
        Ok(())
    }

    /// Registrants whose semester qualifies for the post-event refund.
    pub fn refund_eligible(&self) -> Result<Vec<Registrant>, RegistrationError> {
        let mut out = Vec::new();
        for semester in 1..=MAX_SEMESTER {
            if self.policy.refund_eligible(semester) {
                out.extend(self.store.list_by_semester(semester)?);
            }
        }
        Ok(out)
    }

    fn generate_uid(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.event_code, &suffix[..8])
    }
}

fn validate(input: &RegistrationInput, policy: &FeePolicy) -> Result<(), RegistrationError> {
    if input.name.trim().is_empty() {
        return Err(RegistrationError::Validation("name is required".to_string()));
    }
    if input.email.trim().is_empty() || !input.email.contains('@') {
        return Err(RegistrationError::Validation(
            "a valid email is required".to_string(),
        ));
    }
    let phone = input.phone.trim();
    if phone.len() < 7 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(RegistrationError::Validation(
            "a valid phone number is required".to_string(),
        ));
    }
    if input.semester == 0 || input.semester > MAX_SEMESTER {
        return Err(RegistrationError::Validation(format!(
            "semester must be between 1 and {MAX_SEMESTER}"
        )));
    }
    if !policy.party_size_ok(input.party_size) {
        return Err(RegistrationError::Validation(format!(
            "party size must be between 0 and {}",
            policy.max_party_size
        )));
    }
    Ok(())
}
