//! Policy filters and their wire payloads.
//!
//! A filter restricts where or to whom a policy applies. The nine filter
//! kinds share the `allowed`/`enabled` flags and differ only in payload,
//! so they are modelled as one struct carrying a [`FilterData`] enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection type matched by an access-control filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessConnection {
    WithAccessGateway,
    WithoutAccessGateway,
}

/// Access-control filter payload, JSON-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessControlRef {
    pub connection: AccessConnection,
    pub condition: String,
    pub gateway: String,
}

/// Reference to a remote object (delivery group or tag), JSON-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectRef {
    pub uuid: String,
    pub server: String,
}

/// Variant-specific filter payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterData {
    AccessControl(AccessControlRef),
    BranchRepeater,
    ClientIp(String),
    ClientName(String),
    DeliveryGroup(ObjectRef),
    DeliveryGroupType(String),
    OrganizationalUnit(String),
    User(String),
    Tag(ObjectRef),
}

/// Discriminant of [`FilterData`], used for grouping and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FilterKind {
    AccessControl,
    BranchRepeater,
    ClientIp,
    ClientName,
    DeliveryGroup,
    DeliveryGroupType,
    OrganizationalUnit,
    User,
    Tag,
}

impl FilterKind {
    pub const ALL: [FilterKind; 9] = [
        FilterKind::AccessControl,
        FilterKind::BranchRepeater,
        FilterKind::ClientIp,
        FilterKind::ClientName,
        FilterKind::DeliveryGroup,
        FilterKind::DeliveryGroupType,
        FilterKind::OrganizationalUnit,
        FilterKind::User,
        FilterKind::Tag,
    ];

    /// Filter type name used by the remote service.
    pub fn wire_name(self) -> &'static str {
        match self {
            FilterKind::AccessControl => "AccessControl",
            FilterKind::BranchRepeater => "BranchRepeater",
            FilterKind::ClientIp => "ClientIP",
            FilterKind::ClientName => "ClientName",
            FilterKind::DeliveryGroup => "DesktopGroup",
            FilterKind::DeliveryGroupType => "DesktopKind",
            FilterKind::OrganizationalUnit => "OU",
            FilterKind::User => "User",
            FilterKind::Tag => "DesktopTag",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.wire_name().eq_ignore_ascii_case(name))
    }

    /// Whether this filter kind may only be attached to policies with a user setting.
    pub fn requires_user_setting(self) -> bool {
        !matches!(self, FilterKind::User)
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Errors decoding a filter received from the remote service.
#[derive(Debug, thiserror::Error)]
pub enum FilterDecodeError {
    #[error("unknown filter type '{0}'")]
    UnknownType(String),

    #[error("invalid {kind} filter data: {message}")]
    InvalidData { kind: FilterKind, message: String },
}

/// Body sent when creating a filter and shape returned when listing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterPayload {
    pub filter_type: String,
    #[serde(default)]
    pub filter_data: String,
    pub is_allowed: bool,
    pub is_enabled: bool,
}

/// A filter attached to a policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    /// Remote identifier, empty until created.
    pub id: String,
    pub allowed: bool,
    enabled: bool,
    pub data: FilterData,
}

impl Filter {
    pub fn new(data: FilterData, allowed: bool, enabled: bool) -> Self {
        // branch-repeater filters have no enabled flag of their own
        let enabled = enabled || matches!(data, FilterData::BranchRepeater);
        Self {
            id: String::new(),
            allowed,
            enabled,
            data,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Copy of this filter with the remote identifier cleared.
    pub fn without_id(&self) -> Self {
        let mut filter = self.clone();
        filter.id.clear();
        filter
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn kind(&self) -> FilterKind {
        match &self.data {
            FilterData::AccessControl(_) => FilterKind::AccessControl,
            FilterData::BranchRepeater => FilterKind::BranchRepeater,
            FilterData::ClientIp(_) => FilterKind::ClientIp,
            FilterData::ClientName(_) => FilterKind::ClientName,
            FilterData::DeliveryGroup(_) => FilterKind::DeliveryGroup,
            FilterData::DeliveryGroupType(_) => FilterKind::DeliveryGroupType,
            FilterData::OrganizationalUnit(_) => FilterKind::OrganizationalUnit,
            FilterData::User(_) => FilterKind::User,
            FilterData::Tag(_) => FilterKind::Tag,
        }
    }

    /// Same filter ignoring the remote identifier.
    pub fn same_content(&self, other: &Filter) -> bool {
        self.allowed == other.allowed && self.enabled == other.enabled && self.data == other.data
    }

    /// Produce the wire payload for this filter.
    pub fn to_payload(&self) -> Result<FilterPayload, serde_json::Error> {
        let filter_data = match &self.data {
            FilterData::AccessControl(reference) => serde_json::to_string(reference)?,
            FilterData::BranchRepeater => String::new(),
            FilterData::ClientIp(value)
            | FilterData::ClientName(value)
            | FilterData::DeliveryGroupType(value)
            | FilterData::OrganizationalUnit(value)
            | FilterData::User(value) => value.clone(),
            FilterData::DeliveryGroup(reference) | FilterData::Tag(reference) => {
                serde_json::to_string(reference)?
            }
        };

        Ok(FilterPayload {
            filter_type: self.kind().wire_name().to_string(),
            filter_data,
            is_allowed: self.allowed,
            is_enabled: self.enabled,
        })
    }

    /// Decode a filter received from the remote service.
    pub fn from_payload(id: &str, payload: &FilterPayload) -> Result<Self, FilterDecodeError> {
        let kind = FilterKind::from_wire_name(&payload.filter_type)
            .ok_or_else(|| FilterDecodeError::UnknownType(payload.filter_type.clone()))?;

        let invalid = |e: serde_json::Error| FilterDecodeError::InvalidData {
            kind,
            message: e.to_string(),
        };

        let raw = payload.filter_data.clone();
        let data = match kind {
            FilterKind::AccessControl => {
                FilterData::AccessControl(serde_json::from_str(&raw).map_err(invalid)?)
            }
            FilterKind::BranchRepeater => FilterData::BranchRepeater,
            FilterKind::ClientIp => FilterData::ClientIp(raw),
            FilterKind::ClientName => FilterData::ClientName(raw),
            FilterKind::DeliveryGroup => {
                FilterData::DeliveryGroup(serde_json::from_str(&raw).map_err(invalid)?)
            }
            FilterKind::DeliveryGroupType => FilterData::DeliveryGroupType(raw),
            FilterKind::OrganizationalUnit => FilterData::OrganizationalUnit(raw),
            FilterKind::User => FilterData::User(raw),
            FilterKind::Tag => FilterData::Tag(serde_json::from_str(&raw).map_err(invalid)?),
        };

        Ok(Filter::new(data, payload.is_allowed, payload.is_enabled).with_id(id))
    }
}
