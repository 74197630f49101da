//! Payment initiation. Only a stub gateway exists; it always succeeds.

use async_trait::async_trait;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
	pub phone_number: String,
	pub amount: f64,
}

impl PaymentRequest {
	pub fn new(phone_number: impl Into<String>, amount: f64) -> Result<Self, PipelineError> {
		let phone_number = phone_number.into();
		if phone_number.trim().is_empty() {
			return Err(PipelineError::PaymentFailed("phone number is required".into()));
		}
		if !amount.is_finite() || amount < 0.0 {
			return Err(PipelineError::PaymentFailed(format!("invalid amount {amount}")));
		}
		Ok(Self { phone_number, amount })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
	pub successful: bool,
	pub message: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
	async fn charge(&self, request: &PaymentRequest) -> PaymentReceipt;
}

/// Gateway that accepts every request without contacting anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPaymentGateway;

#[async_trait]
impl PaymentGateway for StubPaymentGateway {
	async fn charge(&self, request: &PaymentRequest) -> PaymentReceipt {
		tracing::info!(amount = request.amount, "payment.stub.charge");
		PaymentReceipt {
			successful: true,
			message: "Payment initiated successfully!".into(),
		}
	}
}

/// Runs a charge and folds an unsuccessful receipt into an error.
pub async fn initiate(gateway: &dyn PaymentGateway, request: PaymentRequest) -> Result<PaymentReceipt, PipelineError> {
	let receipt = gateway.charge(&request).await;
	if receipt.successful {
		Ok(receipt)
	} else {
		Err(PipelineError::PaymentFailed(receipt.message))
	}
}
