#![allow(dead_code)]

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use async_trait::async_trait;
use serde_json::{json, Value};
use tiny_http::{Response, Server, StatusCode};

use basepay_adapters::DeterministicProvider;
use basepay_core::{PortError, ProviderConfig, ProviderFactory, WalletProvider};

pub type RecordedCalls = Arc<Mutex<Vec<Value>>>;

/// Mock JSON-RPC endpoint. `answer` maps a request body to `(status, response body)`.
pub fn spawn_rpc_server<F>(
    max_requests: usize,
    answer: F,
) -> (String, RecordedCalls, thread::JoinHandle<()>)
where
    F: Fn(&Value) -> (u16, Value) + Send + 'static,
{
    spawn_server(max_requests, move |req| {
        let (code, response) = answer(req);
        (code, response.to_string(), "application/json")
    })
}

/// Answers every request with the same raw body, e.g. an HTML error page from a gateway.
pub fn spawn_text_server(
    max_requests: usize,
    code: u16,
    body: &'static str,
) -> (String, RecordedCalls, thread::JoinHandle<()>) {
    spawn_server(max_requests, move |_| (code, body.to_owned(), "text/html"))
}

fn spawn_server<F>(
    max_requests: usize,
    answer: F,
) -> (String, RecordedCalls, thread::JoinHandle<()>)
where
    F: Fn(&Value) -> (u16, String, &'static str) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("start server");
    let addr = format!("http://{}/rpc", server.server_addr());
    let calls: RecordedCalls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);

    let join = thread::spawn(move || {
        for _ in 0..max_requests {
            let mut req = match server.recv() {
                Ok(r) => r,
                Err(_) => break,
            };
            let mut body = String::new();
            let _ = req.as_reader().read_to_string(&mut body);
            let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            if let Ok(mut g) = recorded.lock() {
                g.push(payload.clone());
            }
            let (code, response, content_type) = answer(&payload);
            let response = Response::from_string(response)
                .with_status_code(StatusCode(code))
                .with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                        .expect("content type header"),
                );
            let _ = req.respond(response);
        }
    });

    (addr, calls, join)
}

pub fn rpc_result(request: &Value, result: Value) -> (u16, Value) {
    (
        200,
        json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": result }),
    )
}

pub fn rpc_error(request: &Value, code: i64, message: &str) -> (u16, Value) {
    (
        200,
        json!({
            "jsonrpc": "2.0",
            "id": request["id"].clone(),
            "error": { "code": code, "message": message }
        }),
    )
}

pub fn methods(calls: &RecordedCalls) -> Vec<String> {
    calls
        .lock()
        .expect("recorded calls")
        .iter()
        .filter_map(|c| c["method"].as_str().map(str::to_owned))
        .collect()
}

/// Hands the same deterministic wallet to every caller so tests can drive its debug hooks.
#[derive(Debug, Clone)]
pub struct SharedWalletFactory(pub Arc<DeterministicProvider>);

#[async_trait]
impl ProviderFactory for SharedWalletFactory {
    async fn create(&self, _config: &ProviderConfig) -> Result<Arc<dyn WalletProvider>, PortError> {
        Ok(Arc::clone(&self.0) as Arc<dyn WalletProvider>)
    }
}
