//! Liveness injection for exported services.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ServiceError;
use crate::service::{LIVENESS_METHOD, RemoteService};

/// Decorator that answers [`LIVENESS_METHOD`] with `true` and forwards
/// every other call to the wrapped service untouched.
pub struct CapabilityProxy {
    target: Arc<dyn RemoteService>,
}

impl CapabilityProxy {
    /// Returns `target` itself when it already answers liveness probes.
    /// Wrapping a proxy again is a no-op.
    pub fn wrap(target: Arc<dyn RemoteService>) -> Arc<dyn RemoteService> {
        if target.implements_liveness() {
            return target;
        }
        Arc::new(Self { target })
    }
}

#[async_trait]
impl RemoteService for CapabilityProxy {
    fn interface(&self) -> &str {
        self.target.interface()
    }

    fn implements_liveness(&self) -> bool {
        true
    }

    async fn invoke(&self, method: &str, args: Value) -> Result<Value, ServiceError> {
        if method == LIVENESS_METHOD {
            return Ok(Value::Bool(true));
        }
        self.target.invoke(method, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Billing;

    #[async_trait]
    impl RemoteService for Billing {
        fn interface(&self) -> &str {
            "Billing"
        }

        async fn invoke(&self, method: &str, args: Value) -> Result<Value, ServiceError> {
            match method {
                "total" => {
                    let items = args
                        .as_array()
                        .ok_or_else(|| ServiceError::bad_arguments("expected an array"))?;
                    Ok(json!(items.iter().filter_map(Value::as_i64).sum::<i64>()))
                }
                "refund" => Err(ServiceError::new("Refused", "refunds are closed")),
                other => Err(ServiceError::unknown_method(other)),
            }
        }
    }

    struct SelfChecking;

    #[async_trait]
    impl RemoteService for SelfChecking {
        fn interface(&self) -> &str {
            "SelfChecking"
        }

        fn implements_liveness(&self) -> bool {
            true
        }

        async fn invoke(&self, method: &str, _args: Value) -> Result<Value, ServiceError> {
            match method {
                LIVENESS_METHOD => Ok(Value::Bool(false)),
                other => Err(ServiceError::unknown_method(other)),
            }
        }
    }

    #[tokio::test]
    async fn ping_succeeds_without_target_support() {
        let proxy = CapabilityProxy::wrap(Arc::new(Billing));
        assert_eq!(proxy.invoke("ping", Value::Null).await, Ok(Value::Bool(true)));
        assert_eq!(proxy.interface(), "Billing");
    }

    #[tokio::test]
    async fn other_calls_forward_results_and_errors() {
        let target: Arc<dyn RemoteService> = Arc::new(Billing);
        let proxy = CapabilityProxy::wrap(target.clone());

        for (method, args) in [
            ("total", json!([1, 2, 3])),
            ("total", json!("nope")),
            ("refund", json!({"id": 7})),
            ("missing", Value::Null),
        ] {
            assert_eq!(
                proxy.invoke(method, args.clone()).await,
                target.invoke(method, args).await,
                "method {method}"
            );
        }
    }

    #[tokio::test]
    async fn existing_liveness_is_left_alone() {
        let target: Arc<dyn RemoteService> = Arc::new(SelfChecking);
        let wrapped = CapabilityProxy::wrap(target.clone());
        assert!(Arc::ptr_eq(&target, &wrapped));
        assert_eq!(wrapped.invoke("ping", Value::Null).await, Ok(Value::Bool(false)));
    }

    #[test]
    fn wrapping_twice_is_idempotent() {
        let once = CapabilityProxy::wrap(Arc::new(Billing));
        let twice = CapabilityProxy::wrap(once.clone());
        assert!(Arc::ptr_eq(&once, &twice));
    }
}
