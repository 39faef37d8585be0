//! Method registry shared by every connection.
//!
//! One lock guards both the method map and the error catalog. Descriptors are
//! stored behind `Arc`, so a lookup hands out a snapshot and handlers always
//! run with the lock released.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{DEFAULT_LANGUAGE, ErrorCatalog};
use crate::handler::{HandlerResult, MethodHandler};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

/// Registered record binding a method name to its handler and metadata.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    description: Option<String>,
    params_schema: Value,
    result_schema: Value,
    allowed_errors: BTreeSet<i64>,
    handler: Arc<dyn MethodHandler>,
}

impl MethodDescriptor {
    pub fn new<H>(name: impl Into<String>, handler: H) -> Self
    where
        H: MethodHandler + 'static,
    {
        Self::from_arc(name, Arc::new(handler))
    }

    /// Share one handler between several method names.
    pub fn from_arc(name: impl Into<String>, handler: Arc<dyn MethodHandler>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params_schema: Value::Null,
            result_schema: Value::Null,
            allowed_errors: BTreeSet::new(),
            handler,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_params_schema(mut self, schema: Value) -> Self {
        self.params_schema = schema;
        self
    }

    pub fn with_result_schema(mut self, schema: Value) -> Self {
        self.result_schema = schema;
        self
    }

    pub fn with_allowed_errors(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
        self.allowed_errors.extend(codes);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn params_schema(&self) -> &Value {
        &self.params_schema
    }

    pub fn result_schema(&self) -> &Value {
        &self.result_schema
    }

    pub fn allowed_errors(&self) -> &BTreeSet<i64> {
        &self.allowed_errors
    }

    /// An empty set means the method did not declare its errors.
    pub fn allows_error(&self, code: i64) -> bool {
        self.allowed_errors.is_empty() || self.allowed_errors.contains(&code)
    }

    pub async fn call(&self, params: Value, language: &str) -> HandlerResult {
        self.handler.call(params, language).await
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params_schema", &self.params_schema)
            .field("result_schema", &self.result_schema)
            .field("allowed_errors", &self.allowed_errors)
            .finish_non_exhaustive()
    }
}

struct RegistryInner {
    methods: HashMap<String, Arc<MethodDescriptor>>,
    catalog: ErrorCatalog,
}

pub struct MethodRegistry {
    inner: RwLock<RegistryInner>,
}

impl MethodRegistry {
    /// Empty registry with the standard error catalog.
    pub fn new() -> Self {
        Self::with_catalog(ErrorCatalog::standard())
    }

    pub fn with_catalog(catalog: ErrorCatalog) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                methods: HashMap::new(),
                catalog,
            }),
        }
    }

    /// Insert or atomically replace the descriptor under its name.
    /// Returns the descriptor it replaced.
    pub fn register(&self, descriptor: MethodDescriptor) -> Option<Arc<MethodDescriptor>> {
        let name = descriptor.name.clone();
        let previous = self
            .inner
            .write()
            .methods
            .insert(name.clone(), Arc::new(descriptor));
        debug!(method = %name, replaced = previous.is_some(), "registered method");
        previous
    }

    /// Register several descriptors under one lock acquisition.
    pub fn register_all(&self, descriptors: impl IntoIterator<Item = MethodDescriptor>) {
        let mut inner = self.inner.write();
        for descriptor in descriptors {
            debug!(method = %descriptor.name, "registered method");
            inner
                .methods
                .insert(descriptor.name.clone(), Arc::new(descriptor));
        }
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.inner.write().methods.remove(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.read().methods.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<Arc<MethodDescriptor>, RegistryError> {
        self.inner
            .read()
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::MethodNotFound(name.to_string()))
    }

    /// Snapshot of registered names; order is unspecified.
    pub fn method_names(&self) -> Vec<String> {
        self.inner.read().methods.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_error_message(
        &self,
        code: i64,
        language: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.inner.write().catalog.set_message(code, language, text);
    }

    /// Localized text for `code`; falls back to en-US, then "Unknown error".
    pub fn error_message(&self, code: i64, language: &str) -> String {
        self.inner.read().catalog.message(code, language)
    }

    pub fn default_language(&self) -> &'static str {
        DEFAULT_LANGUAGE
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MethodRegistry")
            .field("methods", &inner.methods.len())
            .field("error_messages", &inner.catalog.len())
            .finish()
    }
}
