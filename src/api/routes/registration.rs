//! Registration endpoints.
//!
//! `POST /pay` starts a registration and returns the payment-initiation
//! payload; `POST /payment-success` finalizes it once the client-side
//! payment widget reports success.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{error_reply, ApiState, ErrorResponse, SESSION_TOKEN_HEADER};
use crate::registration::{RegistrationInput, StartOutcome};
use crate::store::Registrant;

#[derive(Debug, Deserialize)]
pub struct StartRegistrationRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub semester: u8,
    #[serde(default)]
    pub party_size: u8,
}

#[derive(Debug, Serialize)]
pub struct PaymentInitBody {
    pub session_token: String,
    pub order_id: String,
    /// Total fee in whole rupees
    pub amount: u64,
    pub amount_minor: u64,
    pub currency: String,
    pub gateway_key_id: String,
}

#[derive(Debug, Serialize)]
pub struct StartRegistrationResponse {
    pub success: bool,
    /// True when the fee was waived and the registrant is already durable
    pub waived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInitBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrant: Option<Registrant>,
}

/// POST /pay
pub async fn start_registration(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<StartRegistrationRequest>,
) -> Result<Json<StartRegistrationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let input = RegistrationInput {
        name: req.name,
        email: req.email,
        phone: req.phone,
        semester: req.semester,
        party_size: req.party_size,
    };
    match state.registrar.start(input).await.map_err(error_reply)? {
        StartOutcome::PaymentRequired(init) => Ok(Json(StartRegistrationResponse {
            success: true,
            waived: false,
            payment: Some(PaymentInitBody {
                session_token: init.session_token,
                order_id: init.order_id,
                amount: init.amount,
                amount_minor: init.amount_minor,
                currency: init.currency,
                gateway_key_id: init.gateway_key_id,
            }),
            registrant: None,
        })),
        StartOutcome::Registered(reg) => Ok(Json(StartRegistrationResponse {
            success: true,
            waived: true,
            payment: None,
            registrant: Some(reg),
        })),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletePaymentRequest {
    /// Payment id reported by the gateway's client-side widget
    pub payment_id: String,
    /// Optional UPI reference entered by the registrant
    pub upi_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletePaymentResponse {
    pub success: bool,
    pub registrant: Registrant,
    pub qr_url: String,
    pub pdf_url: String,
}

/// POST /payment-success
pub async fn complete_payment(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(req): Json<CompletePaymentRequest>,
) -> Result<Json<CompletePaymentResponse>, (StatusCode, Json<ErrorResponse>)> {
    let token = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!(
                    "missing {SESSION_TOKEN_HEADER} header"
                ))),
            )
        })?;

    let reg = state
        .registrar
        .complete(token, &req.payment_id, req.upi_ref)
        .await
        .map_err(error_reply)?;

    Ok(Json(CompletePaymentResponse {
        qr_url: format!("/get-qr/{}", reg.uid),
        pdf_url: format!("/get-pdf/{}", reg.uid),
        success: true,
        registrant: reg,
    }))
}
