//! Field schema for the managed network resource.
//!
//! The descriptor is static data: it declares which fields exist, their
//! types, defaults, and whether they may change on update. Validation of
//! supplied values happens upstream, before a configuration reaches the
//! controller.

use std::collections::BTreeMap;

use serde_json::{json, Value};

/// Configurable field names.
pub const NAME: &str = "name";
pub const VALUE_SPECS: &str = "value_specs";
pub const ADMIN_STATE_UP: &str = "admin_state_up";
pub const TENANT_ID: &str = "tenant_id";
pub const SHARED: &str = "shared";
pub const DHCP_AGENT_IDS: &str = "dhcp_agent_ids";

/// Read-only attribute names resolvable from the last fetched snapshot.
pub const ATTRIBUTES: &[&str] = &[
    "status",
    "name",
    "subnets",
    "admin_state_up",
    "tenant_id",
    "show",
];

/// Value type of a configurable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Bool,
    Map,
    List,
}

/// Schema entry for one configurable field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub field_type: FieldType,
    pub default: Option<Value>,
    pub update_allowed: bool,
    /// Settable by administrative callers only. Enforced by the policy
    /// engine in front of the controller, not here.
    pub admin_only: bool,
}

impl FieldSchema {
    fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            default: None,
            update_allowed: false,
            admin_only: false,
        }
    }

    fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn updatable(mut self) -> Self {
        self.update_allowed = true;
        self
    }

    fn admin(mut self) -> Self {
        self.admin_only = true;
        self
    }
}

/// Static descriptor of the managed resource's configurable fields.
///
/// Field names are unique by construction.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    fields: BTreeMap<&'static str, FieldSchema>,
}

impl ResourceDescriptor {
    /// Descriptor for a virtual network with DHCP-agent scheduling.
    pub fn network() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(NAME, FieldSchema::new(FieldType::String).updatable());
        fields.insert(
            VALUE_SPECS,
            FieldSchema::new(FieldType::Map)
                .default_value(json!({}))
                .updatable(),
        );
        fields.insert(
            ADMIN_STATE_UP,
            FieldSchema::new(FieldType::Bool)
                .default_value(json!(true))
                .updatable(),
        );
        fields.insert(TENANT_ID, FieldSchema::new(FieldType::String).admin());
        fields.insert(
            SHARED,
            FieldSchema::new(FieldType::Bool)
                .default_value(json!(false))
                .updatable()
                .admin(),
        );
        fields.insert(
            DHCP_AGENT_IDS,
            FieldSchema::new(FieldType::List).updatable().admin(),
        );
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in stable order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Fields with a declared default, in stable order.
    pub fn defaults(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.fields
            .iter()
            .filter_map(|(name, schema)| schema.default.as_ref().map(|d| (*name, d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_descriptor_fields() {
        let descriptor = ResourceDescriptor::network();
        let names: Vec<_> = descriptor.field_names().collect();
        assert_eq!(
            names,
            vec![
                ADMIN_STATE_UP,
                DHCP_AGENT_IDS,
                NAME,
                SHARED,
                TENANT_ID,
                VALUE_SPECS
            ]
        );
    }

    #[test]
    fn test_network_defaults() {
        let descriptor = ResourceDescriptor::network();
        assert_eq!(
            descriptor.get(ADMIN_STATE_UP).unwrap().default,
            Some(json!(true))
        );
        assert_eq!(descriptor.get(SHARED).unwrap().default, Some(json!(false)));
        assert_eq!(
            descriptor.get(VALUE_SPECS).unwrap().default,
            Some(json!({}))
        );
        assert_eq!(descriptor.get(NAME).unwrap().default, None);
        assert_eq!(descriptor.get(DHCP_AGENT_IDS).unwrap().default, None);
    }

    #[test]
    fn test_update_and_admin_flags() {
        let descriptor = ResourceDescriptor::network();
        // tenant_id can only be set at creation, by an administrator
        let tenant = descriptor.get(TENANT_ID).unwrap();
        assert!(!tenant.update_allowed);
        assert!(tenant.admin_only);

        let agents = descriptor.get(DHCP_AGENT_IDS).unwrap();
        assert!(agents.update_allowed);
        assert!(agents.admin_only);

        let name = descriptor.get(NAME).unwrap();
        assert!(name.update_allowed);
        assert!(!name.admin_only);
    }
}
