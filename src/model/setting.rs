//! Policy settings.

use serde::{Deserialize, Serialize};

/// Value carried by a setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SettingValue {
    /// Use the remote default for this setting.
    UseDefault,
    /// Explicit string value.
    Value(String),
    /// Explicit boolean toggle.
    Enabled(bool),
}

/// A named setting attached to a policy. Names are unique within a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Setting {
    /// Remote identifier, empty until created.
    pub id: String,
    pub name: String,
    pub value: SettingValue,
}

/// Body sent when creating or updating a setting and shape returned when listing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingPayload {
    pub setting_name: String,
    pub use_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl Setting {
    pub fn new(name: impl Into<String>, value: SettingValue) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            value,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn use_default(&self) -> bool {
        matches!(self.value, SettingValue::UseDefault)
    }

    /// Settings are matched across desired and remote state by case-insensitive name.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn to_payload(&self) -> SettingPayload {
        let (setting_value, enabled) = match &self.value {
            SettingValue::UseDefault => (None, None),
            SettingValue::Value(v) => (Some(v.clone()), None),
            SettingValue::Enabled(e) => (None, Some(*e)),
        };
        SettingPayload {
            setting_name: self.name.clone(),
            use_default: self.use_default(),
            setting_value,
            enabled,
        }
    }

    /// Decode a remote setting. A defaulted setting discards any echoed value.
    pub fn from_payload(id: &str, payload: &SettingPayload) -> Self {
        let value = if payload.use_default {
            SettingValue::UseDefault
        } else if let Some(v) = &payload.setting_value {
            SettingValue::Value(v.clone())
        } else {
            SettingValue::Enabled(payload.enabled.unwrap_or(false))
        };
        Setting::new(payload.setting_name.clone(), value).with_id(id)
    }
}
