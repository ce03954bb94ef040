//! Projection of declarative configuration into remote payloads.
//!
//! Pure transforms, no remote calls. The agent list never reaches a
//! payload: it is stripped into a side channel and reconciled out-of-band.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::client::Payload;
use crate::schema::{ResourceDescriptor, DHCP_AGENT_IDS, NAME, VALUE_SPECS};

/// Desired agent set stripped from a projected configuration.
///
/// `Some` means the field was supplied this round and a reconciliation
/// pass is due; an explicitly empty set means "unschedule everywhere".
/// `None` means no reconciliation this round.
pub type AgentSideChannel = Option<BTreeSet<String>>;

fn agent_set(value: &Value) -> BTreeSet<String> {
    value
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Merge `value_specs` entries into the payload. Entries from the map win
/// over projected fields, matching the control plane's extension semantics.
fn flatten_value_specs(payload: &mut Payload) {
    if let Some(Value::Object(specs)) = payload.remove(VALUE_SPECS) {
        for (key, value) in specs {
            payload.insert(key, value);
        }
    }
}

/// Project a full configuration into a create payload.
///
/// Applies descriptor defaults, drops unset (`null`) fields, substitutes
/// `physical_name` for a missing symbolic name, flattens `value_specs`,
/// and strips the agent list into the side channel.
pub fn project_create(
    descriptor: &ResourceDescriptor,
    config: &Payload,
    physical_name: &str,
) -> (Payload, AgentSideChannel) {
    let mut payload = Payload::new();
    for (name, default) in descriptor.defaults() {
        payload.insert(name.to_string(), default.clone());
    }
    for (name, value) in config {
        if value.is_null() {
            continue;
        }
        payload.insert(name.clone(), value.clone());
    }

    let agents = payload.remove(DHCP_AGENT_IDS).map(|v| agent_set(&v));

    flatten_value_specs(&mut payload);

    if descriptor.contains(NAME) && !payload.contains_key(NAME) {
        payload.insert(NAME.to_string(), Value::String(physical_name.to_string()));
    }

    (payload, agents)
}

/// Project the changed fields of an updated configuration into a sparse
/// update payload.
///
/// Only fields named in `changed` that the descriptor allows on update are
/// considered. The agent list goes to the side channel when changed to a
/// list value; changed to `null` (or not changed at all) it means no
/// reconciliation this round.
pub fn project_update(
    descriptor: &ResourceDescriptor,
    new_config: &Payload,
    changed: &BTreeSet<String>,
) -> (Payload, AgentSideChannel) {
    let mut payload = Payload::new();
    for name in changed {
        if name == DHCP_AGENT_IDS {
            continue;
        }
        let updatable = descriptor
            .get(name)
            .map(|schema| schema.update_allowed)
            .unwrap_or(false);
        if !updatable {
            continue;
        }
        if let Some(value) = new_config.get(name) {
            if !value.is_null() {
                payload.insert(name.clone(), value.clone());
            }
        }
    }

    flatten_value_specs(&mut payload);

    let agents = if changed.contains(DHCP_AGENT_IDS) {
        match new_config.get(DHCP_AGENT_IDS) {
            Some(value) if !value.is_null() => Some(agent_set(value)),
            _ => None,
        }
    } else {
        None
    };

    (payload, agents)
}
