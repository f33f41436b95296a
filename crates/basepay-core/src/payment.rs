use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::{
    PaymentNetwork, PaymentRequest, PaymentResult, PreferenceInput, PreferenceOverrides,
    ProviderConfig,
};
use crate::error::ConnectorError;
use crate::ports::{PortError, ProviderFactory, RpcRequest, WalletProvider};
use crate::session::{normalize_preference, ProviderSession};

pub const TRANSACTION_HASH_LEN: usize = 66;

/// The two response shapes `wallet_sendCalls` is known to return.
#[derive(Debug, Clone, PartialEq)]
enum SendCallsResponse<'a> {
    Hash(&'a str),
    Calls {
        calls_id: &'a str,
        data_callback: Option<&'a Value>,
    },
}

impl<'a> SendCallsResponse<'a> {
    /// String first, then object with `callsId`, then reject.
    fn classify(raw: &'a Value) -> Result<Self, ConnectorError> {
        match raw {
            Value::String(hash) if hash.chars().count() >= TRANSACTION_HASH_LEN => {
                Ok(Self::Hash(hash))
            }
            Value::Object(fields) => match fields.get("callsId").and_then(Value::as_str) {
                Some(calls_id) if calls_id.chars().count() >= TRANSACTION_HASH_LEN => {
                    Ok(Self::Calls {
                        calls_id,
                        data_callback: fields
                            .get("capabilities")
                            .and_then(|capabilities| capabilities.get("dataCallback"))
                            .filter(|callback| is_truthy(callback)),
                    })
                }
                _ => Err(ConnectorError::MalformedPaymentResponse(format!(
                    "could not extract transaction hash from object response; available fields: {}",
                    fields.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
                ))),
            },
            other => Err(ConnectorError::MalformedPaymentResponse(format!(
                "expected string of at least {TRANSACTION_HASH_LEN} characters or object with callsId, got {}",
                json_type_name(other)
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `null`, `false`, `0` and `""` carry no payer info.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn hash_prefix(raw: &str) -> String {
    raw.chars().take(TRANSACTION_HASH_LEN).collect()
}

pub fn normalize_payment_response(raw: &Value) -> Result<PaymentResult, ConnectorError> {
    match SendCallsResponse::classify(raw)? {
        SendCallsResponse::Hash(hash) => Ok(PaymentResult {
            transaction_hash: hash_prefix(hash),
            payer_info_responses: None,
        }),
        SendCallsResponse::Calls {
            calls_id,
            data_callback,
        } => Ok(PaymentResult {
            transaction_hash: hash_prefix(calls_id),
            payer_info_responses: data_callback.cloned(),
        }),
    }
}

/// Submits one `wallet_sendCalls` and normalizes whatever comes back.
pub async fn execute_payment(
    provider: &dyn WalletProvider,
    request: &PaymentRequest,
) -> Result<PaymentResult, ConnectorError> {
    let params = serde_json::to_value(request)
        .map_err(|e| PortError::Validation(format!("payment request serialization failed: {e}")))?;
    let raw = provider
        .request(RpcRequest::new("wallet_sendCalls", Value::Array(vec![params])))
        .await?;
    normalize_payment_response(&raw)
}

/// One-shot payments, each on its own freshly built provider that is always disconnected.
#[derive(Debug, Clone)]
pub struct PaymentExecutor {
    factory: Arc<dyn ProviderFactory>,
    app_name: String,
    app_logo_url: Option<String>,
}

impl PaymentExecutor {
    pub fn new(factory: Arc<dyn ProviderFactory>, app_name: impl Into<String>) -> Self {
        Self {
            factory,
            app_name: app_name.into(),
            app_logo_url: None,
        }
    }

    pub fn with_app_logo_url(mut self, url: impl Into<String>) -> Self {
        self.app_logo_url = Some(url.into());
        self
    }

    fn session_for(&self, chain_id: u64) -> ProviderSession {
        let preference = PreferenceInput::Structured(PreferenceOverrides {
            telemetry: Some(true),
            extra: Map::new(),
            options: None,
        });
        ProviderSession::new(
            Arc::clone(&self.factory),
            ProviderConfig {
                app_name: self.app_name.clone(),
                app_logo_url: self.app_logo_url.clone(),
                app_chain_ids: vec![chain_id],
                preference: normalize_preference(Some(&preference)),
            },
        )
    }

    /// The provider is disconnected exactly once on every path after it was built. An execution
    /// error wins over a cleanup error; a cleanup error after success is `CleanupFailed`.
    pub async fn execute_with_lifecycle(
        &self,
        request: &PaymentRequest,
        network: PaymentNetwork,
    ) -> Result<PaymentResult, ConnectorError> {
        let chain_id = network.chain_id();
        if request.chain_id != chain_id {
            tracing::warn!(
                request_chain = request.chain_id,
                network_chain = chain_id,
                "payment request chain differs from network; submitting unchanged"
            );
        }

        let mut session = self.session_for(chain_id);
        let provider = session.provider().await?;
        let outcome = execute_payment(provider.as_ref(), request).await;
        let cleanup = provider.disconnect().await;

        match (outcome, cleanup) {
            (Ok(result), Ok(())) => {
                tracing::info!(
                    chain_id,
                    transaction_hash = %result.transaction_hash,
                    payer_info = result.payer_info_responses.is_some(),
                    "payment submitted"
                );
                Ok(result)
            }
            (Ok(_), Err(cleanup_err)) => Err(ConnectorError::CleanupFailed(cleanup_err)),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                tracing::warn!(
                    error = %cleanup_err,
                    "provider cleanup failed after payment error"
                );
                Err(err)
            }
        }
    }
}
