use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tether_core::{LIVENESS_METHOD, RemoteService, ServiceError, time};

/// Has no liveness method of its own; the exporter injects one.
pub struct Greeter;

#[async_trait]
impl RemoteService for Greeter {
    fn interface(&self) -> &str {
        "Greeter"
    }

    async fn invoke(&self, method: &str, args: Value) -> Result<Value, ServiceError> {
        match method {
            "greet" => {
                let name = args
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ServiceError::bad_arguments("expected {\"name\": string}"))?;
                Ok(json!(format!("Hello, {name}!")))
            }
            other => Err(ServiceError::unknown_method(other)),
        }
    }
}

/// Answers liveness probes itself and counts them.
#[derive(Default)]
pub struct Clock {
    probes: AtomicU64,
}

#[async_trait]
impl RemoteService for Clock {
    fn interface(&self) -> &str {
        "Clock"
    }

    fn implements_liveness(&self) -> bool {
        true
    }

    async fn invoke(&self, method: &str, _args: Value) -> Result<Value, ServiceError> {
        match method {
            LIVENESS_METHOD => {
                self.probes.fetch_add(1, Ordering::Relaxed);
                Ok(Value::Bool(true))
            }
            "now" => Ok(json!(time::now())),
            "probes" => Ok(json!(self.probes.load(Ordering::Relaxed))),
            other => Err(ServiceError::unknown_method(other)),
        }
    }
}
