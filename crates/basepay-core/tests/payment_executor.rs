mod common;

use std::sync::Arc;

use alloy::primitives::{address, Bytes, U256};
use basepay_core::{
    ConnectorError, PaymentCall, PaymentExecutor, PaymentNetwork, PaymentRequest, PortError,
    ProviderFactory, BASE_CHAIN_ID, BASE_SEPOLIA_CHAIN_ID,
};
use common::{FakeFactory, FakeProvider};
use serde_json::{json, Value};

const HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

fn usdc_transfer(chain_id: u64) -> PaymentRequest {
    PaymentRequest::new(
        chain_id,
        vec![PaymentCall::new(
            address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
            Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb]),
            U256::ZERO,
        )],
    )
}

fn executor_answering(response: Result<Value, PortError>) -> (PaymentExecutor, Arc<FakeFactory>) {
    let provider = Arc::new(FakeProvider::default());
    provider.push_response("wallet_sendCalls", response);
    let factory = Arc::new(FakeFactory::shared(provider));
    let executor = PaymentExecutor::new(
        Arc::clone(&factory) as Arc<dyn ProviderFactory>,
        "Coffee Shop",
    );
    (executor, factory)
}

#[tokio::test]
async fn string_response_is_the_transaction_hash() {
    let (executor, factory) = executor_answering(Ok(json!(HASH)));

    let result = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_SEPOLIA_CHAIN_ID), PaymentNetwork::Test)
        .await
        .expect("payment");

    assert_eq!(result.transaction_hash, HASH);
    assert_eq!(result.payer_info_responses, None);
    assert_eq!(factory.created()[0].disconnect_count(), 1);
}

#[tokio::test]
async fn calls_response_carries_payer_info() {
    let calls_id = format!("0x{}", "2".repeat(64));
    let (executor, factory) = executor_answering(Ok(json!({
        "callsId": calls_id,
        "capabilities": { "dataCallback": { "email": "a@b.c" } }
    })));

    let result = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect("payment");

    assert_eq!(result.transaction_hash, calls_id);
    let payer_info = result.payer_info_responses.expect("payer info");
    assert_eq!(payer_info.get("email"), Some(&json!("a@b.c")));
    assert_eq!(factory.created()[0].disconnect_count(), 1);
}

#[tokio::test]
async fn opaque_data_callback_keeps_the_hash() {
    let calls_id = format!("0x{}", "b".repeat(64));
    let (executor, factory) = executor_answering(Ok(json!({
        "callsId": calls_id,
        "capabilities": { "dataCallback": "opaque-token" }
    })));

    let result = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect("payment already sent");

    assert_eq!(result.transaction_hash, calls_id);
    assert_eq!(result.payer_info_responses, Some(json!("opaque-token")));
    let created = factory.created();
    let provider = &created[0];
    assert_eq!(provider.request_count("wallet_sendCalls"), 1);
    assert_eq!(provider.disconnect_count(), 1);
}

#[tokio::test]
async fn false_data_callback_is_no_payer_info() {
    let calls_id = format!("0x{}", "c".repeat(64));
    let (executor, _factory) = executor_answering(Ok(json!({
        "callsId": calls_id,
        "capabilities": { "dataCallback": false }
    })));

    let result = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect("payment");
    assert_eq!(result.transaction_hash, calls_id);
    assert_eq!(result.payer_info_responses, None);
}

#[tokio::test]
async fn unknown_object_lists_its_fields_and_still_cleans_up() {
    let (executor, factory) = executor_answering(Ok(json!({ "foo": 1 })));

    let err = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect_err("malformed");

    assert!(matches!(err, ConnectorError::MalformedPaymentResponse(_)));
    assert!(err.to_string().contains("foo"));
    assert_eq!(factory.created()[0].disconnect_count(), 1);
}

#[tokio::test]
async fn send_failure_is_propagated_after_one_cleanup() {
    let (executor, factory) =
        executor_answering(Err(PortError::Rpc(basepay_core::RpcError::new(
            4001,
            "User rejected the request.",
        ))));

    let err = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect_err("rejected");

    match err {
        ConnectorError::Provider(PortError::Rpc(rpc)) => assert_eq!(rpc.code, 4001),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(factory.created()[0].disconnect_count(), 1);
}

#[tokio::test]
async fn cleanup_failure_after_success_is_reported() {
    let provider = Arc::new(FakeProvider::default());
    provider.push_response("wallet_sendCalls", Ok(json!(HASH)));
    provider.fail_disconnect("transport already closed");
    let factory = Arc::new(FakeFactory::shared(provider));
    let executor = PaymentExecutor::new(factory as Arc<dyn ProviderFactory>, "Coffee Shop");

    let err = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect_err("cleanup failed");
    assert!(matches!(err, ConnectorError::CleanupFailed(PortError::Transport(_))));
}

#[tokio::test]
async fn execution_error_wins_over_cleanup_error() {
    let provider = Arc::new(FakeProvider::default());
    provider.push_response("wallet_sendCalls", Ok(json!(42)));
    provider.fail_disconnect("transport already closed");
    let factory = Arc::new(FakeFactory::shared(Arc::clone(&provider)));
    let executor = PaymentExecutor::new(factory as Arc<dyn ProviderFactory>, "Coffee Shop");

    let err = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect_err("malformed");
    assert!(matches!(err, ConnectorError::MalformedPaymentResponse(_)));
    assert_eq!(provider.disconnect_count(), 1);
}

#[tokio::test]
async fn construction_failure_skips_cleanup() {
    let (executor, factory) = executor_answering(Ok(json!(HASH)));
    factory.fail_next(1);

    let err = executor
        .execute_with_lifecycle(&usdc_transfer(BASE_CHAIN_ID), PaymentNetwork::Main)
        .await
        .expect_err("construction fails");
    assert!(matches!(err, ConnectorError::Provider(PortError::Transport(_))));
    assert!(factory.created().is_empty());
}

#[tokio::test]
async fn every_payment_gets_its_own_provider() {
    let factory = Arc::new(FakeFactory::fresh(|| {
        let provider = FakeProvider::default();
        provider.set_default("wallet_sendCalls", json!(HASH));
        provider
    }));
    let executor = PaymentExecutor::new(
        Arc::clone(&factory) as Arc<dyn ProviderFactory>,
        "Coffee Shop",
    )
    .with_app_logo_url("https://coffee.example/logo.png");

    for _ in 0..2 {
        executor
            .execute_with_lifecycle(&usdc_transfer(BASE_SEPOLIA_CHAIN_ID), PaymentNetwork::Test)
            .await
            .expect("payment");
    }

    let created = factory.created();
    assert_eq!(created.len(), 2);
    assert!(!Arc::ptr_eq(&created[0], &created[1]));
    for provider in &created {
        assert_eq!(provider.disconnect_count(), 1);
        assert_eq!(provider.request_count("wallet_sendCalls"), 1);
    }

    let config = &factory.configs()[0];
    assert_eq!(config.app_chain_ids, vec![BASE_SEPOLIA_CHAIN_ID]);
    assert_eq!(config.preference.telemetry, Some(true));
    assert_eq!(config.preference.options, "all");
    assert_eq!(
        config.app_logo_url.as_deref(),
        Some("https://coffee.example/logo.png")
    );
}

#[tokio::test]
async fn request_is_sent_in_wallet_wire_form() {
    let (executor, factory) = executor_answering(Ok(json!(HASH)));
    let request = usdc_transfer(BASE_SEPOLIA_CHAIN_ID)
        .with_capability("dataCallback", json!({ "requests": [{ "type": "email" }] }));

    executor
        .execute_with_lifecycle(&request, PaymentNetwork::Test)
        .await
        .expect("payment");

    let sent = &factory.created()[0].requests()[0];
    assert_eq!(sent.method, "wallet_sendCalls");
    let params = &sent.params[0];
    assert_eq!(params["version"], "2.0.0");
    assert_eq!(params["chainId"], "0x14a34");
    assert_eq!(params["calls"][0]["data"], "0xa9059cbb");
    assert_eq!(params["calls"][0]["value"], "0x0");
    assert_eq!(
        params["capabilities"]["dataCallback"]["requests"][0]["type"],
        "email"
    );
}
