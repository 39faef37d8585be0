//! Localized error text.
//!
//! Codes map to per-language strings. Resolution tries the requested
//! language, then [`DEFAULT_LANGUAGE`], then [`UNKNOWN_ERROR_MESSAGE`], so a
//! lookup never fails.

use std::collections::HashMap;

use crate::error::JsonRpcErrorCode;

/// Language used when a request names none, and the first fallback.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Text returned when a code has no entry in any usable language.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

const RUSSIAN_STANDARD_MESSAGES: [(JsonRpcErrorCode, &str); 5] = [
    (JsonRpcErrorCode::ParseError, "Ошибка разбора"),
    (JsonRpcErrorCode::InvalidRequest, "Неверный запрос"),
    (JsonRpcErrorCode::MethodNotFound, "Метод не найден"),
    (JsonRpcErrorCode::InvalidParams, "Неверные параметры"),
    (JsonRpcErrorCode::InternalError, "Внутренняя ошибка"),
];

#[derive(Debug, Clone)]
pub struct ErrorCatalog {
    messages: HashMap<i64, HashMap<String, String>>,
}

impl ErrorCatalog {
    /// Catalog with no entries at all.
    pub fn empty() -> Self {
        Self {
            messages: HashMap::new(),
        }
    }

    /// Catalog seeded with the standard JSON-RPC codes in en-US and ru-RU.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        for code in JsonRpcErrorCode::STANDARD {
            catalog.set_message(code.code(), DEFAULT_LANGUAGE, code.message());
        }
        for (code, text) in RUSSIAN_STANDARD_MESSAGES {
            catalog.set_message(code.code(), "ru-RU", text);
        }
        catalog
    }

    pub fn set_message(&mut self, code: i64, language: impl Into<String>, text: impl Into<String>) {
        self.messages
            .entry(code)
            .or_default()
            .insert(language.into(), text.into());
    }

    /// Exact entry for `(code, language)`, without any fallback.
    pub fn lookup(&self, code: i64, language: &str) -> Option<&str> {
        self.messages
            .get(&code)?
            .get(language)
            .map(String::as_str)
    }

    /// Resolve text for `code` with the language fallback chain.
    pub fn message(&self, code: i64, language: &str) -> String {
        self.lookup(code, language)
            .or_else(|| self.lookup(code, DEFAULT_LANGUAGE))
            .unwrap_or(UNKNOWN_ERROR_MESSAGE)
            .to_string()
    }

    /// Languages that have text for `code`, sorted.
    pub fn languages(&self, code: i64) -> Vec<String> {
        let mut languages: Vec<String> = self
            .messages
            .get(&code)
            .map(|by_language| by_language.keys().cloned().collect())
            .unwrap_or_default();
        languages.sort();
        languages
    }

    /// Number of `(code, language)` entries.
    pub fn len(&self) -> usize {
        self.messages.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
