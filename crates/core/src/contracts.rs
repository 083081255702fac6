//! Contract records keyed by contract number.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::KnowledgeConfig;

/// Result of one lookup. Fields are whatever the record carries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractLookup {
    pub found: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContractLookup {
    pub fn not_found() -> Self {
        Self::default()
    }

    fn text_field(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.fields.get(*key)? {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
            Value::Bool(flag) => Some(if *flag { "да" } else { "нет" }.to_owned()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
    }

    pub fn payment_status(&self) -> Option<String> {
        self.text_field(&["payment_status", "payment", "оплата", "статус_оплаты"])
    }

    pub fn documents_received(&self) -> Option<String> {
        self.text_field(&["documents_received", "documents_status", "документы"])
    }

    pub fn certificate_status(&self) -> Option<String> {
        self.text_field(&[
            "certificate_status",
            "education_document_status",
            "diploma_status",
            "документ_об_образовании",
        ])
    }

    pub fn tracking_number(&self) -> Option<String> {
        self.text_field(&["tracking_number", "track_number", "трек_номер"])
    }

    /// True when at least one reportable field is present.
    pub fn is_usable(&self) -> bool {
        self.found
            && (self.payment_status().is_some()
                || self.documents_received().is_some()
                || self.certificate_status().is_some()
                || self.tracking_number().is_some())
    }
}

/// Read-only contract map. Malformed data yields an empty registry.
#[derive(Clone, Debug, Default)]
pub struct ContractRegistry {
    records: HashMap<String, Map<String, Value>>,
    malformed: bool,
}

impl ContractRegistry {
    pub fn from_json_str(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(map) => Self {
                records: map
                    .into_iter()
                    .filter_map(|(key, value)| match value {
                        Value::Object(record) => Some((key.trim().to_owned(), record)),
                        _ => None,
                    })
                    .collect(),
                malformed: false,
            },
            Err(_) => Self { records: HashMap::new(), malformed: true },
        }
    }

    /// A missing or unreadable file behaves like an empty map.
    pub fn from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json_str(&raw),
            Err(_) => Self { records: HashMap::new(), malformed: true },
        }
    }

    /// Inline JSON wins over the file; neither configured means an empty registry.
    pub fn from_config(config: &KnowledgeConfig) -> Self {
        match (&config.contract_info_json, &config.contracts_path) {
            (Some(raw), _) => Self::from_json_str(raw),
            (None, Some(path)) => Self::from_path(path),
            (None, None) => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed
    }

    pub fn lookup(&self, contract_number: i64) -> ContractLookup {
        match self.records.get(&contract_number.to_string()) {
            Some(record) => ContractLookup { found: true, fields: record.clone() },
            None => ContractLookup::not_found(),
        }
    }
}
