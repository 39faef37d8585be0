//! Turns one inbound message into exactly one reply.
//!
//! The processor holds no per-connection state; any number of sessions can
//! share it. Every failure below the transport is converted to a JSON-RPC
//! error response here.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::catalog::DEFAULT_LANGUAGE;
use crate::error::{HandlerError, JsonRpcErrorObject};
use crate::error_codes::{INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
use crate::registry::MethodRegistry;
use crate::request::JsonRpcRequest;
use crate::response::{JsonRpcMessage, JsonRpcReply};
use crate::types::RequestId;

#[derive(Debug, Clone)]
pub struct RequestProcessor {
    registry: Arc<MethodRegistry>,
}

impl RequestProcessor {
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Parse raw message bytes and process the result.
    ///
    /// Bytes that are not JSON (including invalid UTF-8) yield a `ParseError`
    /// with a `null` id.
    pub async fn handle_message(&self, payload: &[u8]) -> JsonRpcReply {
        match serde_json::from_slice::<Value>(payload) {
            Ok(value) => self.handle_value(value).await,
            Err(err) => {
                debug!(error = %err, bytes = payload.len(), "unparseable message");
                let error = self.localized_error(None, PARSE_ERROR, DEFAULT_LANGUAGE, None);
                JsonRpcReply::Single(error)
            }
        }
    }

    /// Arrays are batches, anything else is a single request.
    pub async fn handle_value(&self, value: Value) -> JsonRpcReply {
        match value {
            Value::Array(requests) => JsonRpcReply::Batch(self.handle_batch(requests).await),
            other => JsonRpcReply::Single(self.handle_request(other).await),
        }
    }

    /// Process batch elements one after another, preserving their order.
    ///
    /// Every element yields a response, so the output has the same length as
    /// the input. Handlers are not isolated from each other: a failure in one
    /// element does not undo side effects of earlier ones.
    pub async fn handle_batch(&self, requests: Vec<Value>) -> Vec<JsonRpcMessage> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.handle_request(request).await);
        }
        responses
    }

    pub async fn handle_request(&self, request: Value) -> JsonRpcMessage {
        let request = match JsonRpcRequest::from_value(request) {
            Ok(request) => request,
            Err(err) => {
                debug!(reason = %err, "invalid request");
                return self.localized_error(None, INVALID_REQUEST, DEFAULT_LANGUAGE, None);
            }
        };

        let language = request.language().to_string();
        let JsonRpcRequest {
            method, params, id, ..
        } = request;

        let descriptor = match self.registry.get(&method) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                debug!(%method, "{}", err);
                return self.localized_error(id, METHOD_NOT_FOUND, &language, None);
            }
        };

        let outcome = AssertUnwindSafe(descriptor.call(params, &language))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => JsonRpcMessage::success(id, result),
            Ok(Err(HandlerError::Rpc(err))) => {
                if !descriptor.allows_error(err.code) {
                    warn!(
                        %method,
                        code = err.code,
                        "handler returned an error code it does not declare"
                    );
                }
                debug!(%method, code = err.code, detail = %err.message, "handler reported error");
                self.localized_error(id, err.code, &language, err.data)
            }
            Ok(Err(HandlerError::Internal(message))) => {
                warn!(%method, error = %message, "handler failed");
                JsonRpcMessage::error(id, JsonRpcErrorObject::internal_error(message))
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(%method, %message, "handler panicked");
                JsonRpcMessage::error(id, JsonRpcErrorObject::new(INTERNAL_ERROR, message, None))
            }
        }
    }

    fn localized_error(
        &self,
        id: Option<RequestId>,
        code: i64,
        language: &str,
        data: Option<Value>,
    ) -> JsonRpcMessage {
        let message = self.registry.error_message(code, language);
        JsonRpcMessage::error(id, JsonRpcErrorObject::new(code, message, data))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
