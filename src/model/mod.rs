//! Domain model shared by the configuration layer, the remote layer and the
//! reconciler: policy sets, ordered policies, settings and typed filters.

pub mod filter;
pub mod policy;
pub mod setting;

pub use filter::{
    AccessConnection, AccessControlRef, Filter, FilterData, FilterDecodeError, FilterKind,
    FilterPayload, ObjectRef,
};
pub use policy::{
    Policy, PolicySet, PolicySetType, DEFAULT_POLICY_SET_ID, DEFAULT_POLICY_SET_NAME,
};
pub use setting::{Setting, SettingPayload, SettingValue};
