//! Access-controlled key/value store exposed as three JSON-RPC methods.
//!
//! Every record remembers the access level of the caller that added it;
//! callers below that level cannot read it. Only `superAdmin` may delete.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lingua_json_rpc_server::prelude::*;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

pub const ACCESS_DENIED: i64 = 100;
pub const INVALID_ACCESS_LEVEL: i64 = 101;
pub const DATA_NOT_FOUND: i64 = 102;
pub const INVALID_ACTION: i64 = 103;
pub const DATA_ALREADY_EXISTS: i64 = 104;
pub const MISSING_REQUIRED_FIELD: i64 = 105;

const LANGUAGES: [&str; 4] = ["en-US", "ru-RU", "fr-FR", "es-ES"];

/// `(code, language, text)`. Code 105 ships only in en-US and ru-RU.
const ERROR_MESSAGES: &[(i64, &str, &str)] = &[
    (ACCESS_DENIED, "en-US", "Access denied"),
    (INVALID_ACCESS_LEVEL, "en-US", "Invalid access level"),
    (DATA_NOT_FOUND, "en-US", "Data not found"),
    (INVALID_ACTION, "en-US", "Invalid action"),
    (DATA_ALREADY_EXISTS, "en-US", "Data already exists"),
    (MISSING_REQUIRED_FIELD, "en-US", "Missing required field"),
    (ACCESS_DENIED, "ru-RU", "Доступ запрещен"),
    (INVALID_ACCESS_LEVEL, "ru-RU", "Неверный уровень доступа"),
    (DATA_NOT_FOUND, "ru-RU", "Данные не найдены"),
    (INVALID_ACTION, "ru-RU", "Неверное действие"),
    (DATA_ALREADY_EXISTS, "ru-RU", "Данные уже существуют"),
    (MISSING_REQUIRED_FIELD, "ru-RU", "Отсутствует обязательное поле"),
    (ACCESS_DENIED, "fr-FR", "Accès refusé"),
    (INVALID_ACCESS_LEVEL, "fr-FR", "Niveau d'accès invalide"),
    (DATA_NOT_FOUND, "fr-FR", "Données non trouvées"),
    (INVALID_ACTION, "fr-FR", "Action invalide"),
    (DATA_ALREADY_EXISTS, "fr-FR", "Données déjà existantes"),
    (ACCESS_DENIED, "es-ES", "Acceso denegado"),
    (INVALID_ACCESS_LEVEL, "es-ES", "Nivel de acceso inválido"),
    (DATA_NOT_FOUND, "es-ES", "Datos no encontrados"),
    (INVALID_ACTION, "es-ES", "Acción inválida"),
    (DATA_ALREADY_EXISTS, "es-ES", "Datos ya existen"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    User,
    Admin,
    SuperAdmin,
}

impl AccessLevel {
    /// Unrecognized names fall back to the lowest level.
    pub fn from_name(name: &str) -> Self {
        match name {
            "superAdmin" => AccessLevel::SuperAdmin,
            "admin" => AccessLevel::Admin,
            _ => AccessLevel::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::User => "user",
            AccessLevel::Admin => "admin",
            AccessLevel::SuperAdmin => "superAdmin",
        }
    }

    pub fn can_access(&self, required: AccessLevel) -> bool {
        *self >= required
    }
}

#[derive(Debug, Clone)]
struct SecretRecord {
    data: String,
    min_access_level: AccessLevel,
}

#[derive(Debug, Default)]
pub struct SecretDataManager {
    store: Mutex<BTreeMap<String, SecretRecord>>,
}

impl SecretDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the three methods and their error texts on `registry`.
    pub fn register_methods(self: &Arc<Self>, registry: &MethodRegistry) {
        for (code, language, text) in ERROR_MESSAGES {
            registry.set_error_message(*code, *language, *text);
        }

        let manager = Arc::clone(self);
        let manage = MethodDescriptor::new(
            "manageSecretData",
            handler_fn(move |params, _language| manager.manage(&params)),
        )
        .with_description("Manage secure data storage with add, get, and delete operations")
        .with_params_schema(json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["add", "get", "delete"]},
                "dataID": {"type": "string"},
                "userData": {"type": "string"},
                "accessLevel": {"type": "string", "enum": ["user", "admin", "superAdmin"]},
                "language": language_schema(),
            },
            "required": ["action", "dataID", "accessLevel"]
        }))
        .with_result_schema(json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": ["success", "failure"]},
                "message": {"type": "string"},
                "data": {"type": ["string", "null"]}
            }
        }))
        .with_allowed_errors([
            INVALID_REQUEST,
            METHOD_NOT_FOUND,
            INVALID_PARAMS,
            INTERNAL_ERROR,
            ACCESS_DENIED,
            INVALID_ACCESS_LEVEL,
            DATA_NOT_FOUND,
            INVALID_ACTION,
            DATA_ALREADY_EXISTS,
            MISSING_REQUIRED_FIELD,
        ]);

        let manager = Arc::clone(self);
        let list = MethodDescriptor::new(
            "listSecretData",
            handler_fn(move |params, _language| manager.list(&params)),
        )
        .with_description("List all secret data IDs accessible by the user")
        .with_params_schema(json!({
            "type": "object",
            "properties": {
                "accessLevel": {"type": "string", "enum": ["user", "admin", "superAdmin"]},
                "language": language_schema(),
            },
            "required": ["accessLevel"]
        }))
        .with_result_schema(json!({
            "type": "object",
            "properties": {
                "status": {"type": "string"},
                "message": {"type": "string"},
                "data": {"type": "array", "items": {"type": "string"}},
                "count": {"type": "integer"}
            }
        }))
        .with_allowed_errors([INVALID_ACCESS_LEVEL, MISSING_REQUIRED_FIELD]);

        let manager = Arc::clone(self);
        let stats = MethodDescriptor::new(
            "getSecretDataStats",
            handler_fn(move |params, _language| manager.stats(&params)),
        )
        .with_description("Get statistics about secret data")
        .with_params_schema(json!({
            "type": "object",
            "properties": {
                "accessLevel": {"type": "string", "enum": ["admin", "superAdmin"]},
                "language": language_schema(),
            },
            "required": ["accessLevel"]
        }))
        .with_result_schema(json!({
            "type": "object",
            "properties": {
                "status": {"type": "string"},
                "message": {"type": "string"},
                "stats": {"type": "object"}
            }
        }))
        .with_allowed_errors([ACCESS_DENIED, INVALID_ACCESS_LEVEL, MISSING_REQUIRED_FIELD]);

        registry.register_all([manage, list, stats]);
        info!("Secret data methods registered");
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.store.lock().len()
    }

    fn manage(&self, params: &Value) -> HandlerResult {
        let fields = params_object(params)?;
        let (Some(action), Some(data_id), Some(level)) = (
            fields.get("action"),
            fields.get("dataID"),
            fields.get("accessLevel"),
        ) else {
            return Err(missing_field("action, dataID, or accessLevel"));
        };

        let action = action
            .as_str()
            .ok_or_else(|| missing_field("action must be a string"))?;
        let data_id = data_id
            .as_str()
            .ok_or_else(|| missing_field("dataID must be a string"))?;
        let level = access_level(level)?;
        let user_data = match fields.get("userData") {
            None | Some(Value::Null) => "",
            Some(Value::String(data)) => data.as_str(),
            Some(_) => return Err(missing_field("userData must be a string")),
        };

        let mut store = self.store.lock();
        match action {
            "add" => {
                if store.contains_key(data_id) {
                    let err = RpcError::new(DATA_ALREADY_EXISTS, "Data with ID already exists");
                    return Err(err.into());
                }
                store.insert(
                    data_id.to_string(),
                    SecretRecord {
                        data: user_data.to_string(),
                        min_access_level: level,
                    },
                );
                debug!(data_id, level = level.as_str(), "secret data added");
                Ok(outcome("Data added successfully", Value::Null))
            }
            "get" => {
                let record = store
                    .get(data_id)
                    .ok_or_else(|| RpcError::new(DATA_NOT_FOUND, "Data not found"))?;
                if !level.can_access(record.min_access_level) {
                    return Err(RpcError::new(ACCESS_DENIED, "Access denied to this data").into());
                }
                Ok(outcome("Data retrieved successfully", json!(record.data)))
            }
            "delete" => {
                if level != AccessLevel::SuperAdmin {
                    let err = RpcError::new(ACCESS_DENIED, "Only superAdmin can delete data");
                    return Err(err.into());
                }
                if store.remove(data_id).is_none() {
                    return Err(RpcError::new(DATA_NOT_FOUND, "Data not found").into());
                }
                debug!(data_id, "secret data deleted");
                Ok(outcome("Data deleted successfully", Value::Null))
            }
            other => Err(RpcError::new(INVALID_ACTION, format!("Invalid action: {other}")).into()),
        }
    }

    fn list(&self, params: &Value) -> HandlerResult {
        let level = required_access_level(params)?;
        let store = self.store.lock();
        let ids: Vec<&str> = store
            .iter()
            .filter(|(_, record)| level.can_access(record.min_access_level))
            .map(|(id, _)| id.as_str())
            .collect();

        Ok(json!({
            "status": "success",
            "message": "Data list retrieved successfully",
            "data": ids,
            "count": ids.len(),
        }))
    }

    fn stats(&self, params: &Value) -> HandlerResult {
        let level = required_access_level(params)?;
        if level == AccessLevel::User {
            let err = RpcError::new(ACCESS_DENIED, "Only admin or superAdmin can view stats");
            return Err(err.into());
        }

        let store = self.store.lock();
        let visible_to = |viewer: AccessLevel| {
            store
                .values()
                .filter(|record| viewer.can_access(record.min_access_level))
                .count()
        };

        Ok(json!({
            "status": "success",
            "message": "Statistics retrieved successfully",
            "stats": {
                "total_data": store.len(),
                "user_accessible": visible_to(AccessLevel::User),
                "admin_accessible": visible_to(AccessLevel::Admin),
                "super_admin_accessible": visible_to(AccessLevel::SuperAdmin),
                "created_at": Utc::now().timestamp(),
            }
        }))
    }
}

fn language_schema() -> Value {
    json!({"type": "string", "enum": LANGUAGES, "default": DEFAULT_LANGUAGE})
}

fn outcome(message: &str, data: Value) -> Value {
    json!({"status": "success", "message": message, "data": data})
}

fn missing_field(detail: &str) -> HandlerError {
    RpcError::new(MISSING_REQUIRED_FIELD, format!("Missing required field: {detail}")).into()
}

fn params_object(params: &Value) -> Result<&Map<String, Value>, HandlerError> {
    params
        .as_object()
        .ok_or_else(|| missing_field("params must be an object"))
}

fn access_level(value: &Value) -> Result<AccessLevel, HandlerError> {
    value
        .as_str()
        .map(AccessLevel::from_name)
        .ok_or_else(|| RpcError::new(INVALID_ACCESS_LEVEL, "accessLevel must be a string").into())
}

fn required_access_level(params: &Value) -> Result<AccessLevel, HandlerError> {
    let level = params_object(params)?
        .get("accessLevel")
        .ok_or_else(|| missing_field("accessLevel is required"))?;
    access_level(level)
}
