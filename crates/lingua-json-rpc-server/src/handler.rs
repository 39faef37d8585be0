use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;

pub type HandlerResult = Result<Value, HandlerError>;

/// Trait for handling JSON-RPC method calls
///
/// Handlers receive the raw `params` (JSON `null` when absent) and the
/// language resolved for the request. Domain failures are returned as
/// [`HandlerError::Rpc`]; the processor turns them into localized error
/// responses.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, params: Value, language: &str) -> HandlerResult;
}

/// Adapter for synchronous closures.
pub struct FunctionHandler<F> {
    handler_fn: F,
}

#[async_trait]
impl<F> MethodHandler for FunctionHandler<F>
where
    F: Fn(Value, &str) -> HandlerResult + Send + Sync,
{
    async fn call(&self, params: Value, language: &str) -> HandlerResult {
        (self.handler_fn)(params, language)
    }
}

/// Adapter for closures returning a future. The language is passed owned so
/// the future can be `'static`.
pub struct AsyncFunctionHandler<F> {
    handler_fn: F,
}

#[async_trait]
impl<F, Fut> MethodHandler for AsyncFunctionHandler<F>
where
    F: Fn(Value, String) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn call(&self, params: Value, language: &str) -> HandlerResult {
        (self.handler_fn)(params, language.to_string()).await
    }
}

/// Wrap a synchronous closure as a [`MethodHandler`].
pub fn handler_fn<F>(handler_fn: F) -> FunctionHandler<F>
where
    F: Fn(Value, &str) -> HandlerResult + Send + Sync,
{
    FunctionHandler { handler_fn }
}

/// Wrap an async closure as a [`MethodHandler`].
pub fn async_handler_fn<F, Fut>(handler_fn: F) -> AsyncFunctionHandler<F>
where
    F: Fn(Value, String) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    AsyncFunctionHandler { handler_fn }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl MethodHandler for EchoHandler {
        async fn call(&self, params: Value, language: &str) -> HandlerResult {
            Ok(json!({"params": params, "language": language}))
        }
    }

    #[tokio::test]
    async fn test_trait_handler() {
        let result = EchoHandler.call(json!([1, 2]), "fr-FR").await.unwrap();
        assert_eq!(result, json!({"params": [1, 2], "language": "fr-FR"}));
    }

    #[tokio::test]
    async fn test_sync_function_handler() {
        let handler = handler_fn(|params, _language| match params.as_str() {
            Some("boom") => Err(RpcError::new(103, "Invalid action").into()),
            _ => Ok(json!("pong")),
        });

        assert_eq!(handler.call(Value::Null, "en-US").await.unwrap(), json!("pong"));
        assert!(matches!(
            handler.call(json!("boom"), "en-US").await,
            Err(HandlerError::Rpc(RpcError { code: 103, .. }))
        ));
    }

    #[tokio::test]
    async fn test_async_function_handler() {
        let handler = async_handler_fn(|params: Value, language: String| async move {
            tokio::task::yield_now().await;
            Ok::<_, HandlerError>(json!({
                "sum": params[0].as_i64().unwrap_or(0) + 1,
                "language": language
            }))
        });

        let result = handler.call(json!([41]), "es-ES").await.unwrap();
        assert_eq!(result, json!({"sum": 42, "language": "es-ES"}));
    }
}
