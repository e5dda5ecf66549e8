//! Generic planning over a resource [`Schema`].
//!
//! The planner fills in defaults, diffs the proposed configuration against the
//! prior state, and decides whether the change can be applied in place or
//! needs the resource to be replaced. Computed values that will only be known
//! after apply are planned as `null`. Set attributes and set blocks compare
//! by membership, not order.

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Block, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource change.
///
/// - `prior` is `None` when the resource is being created.
/// - A `null` `proposed` value plans the destruction of `prior`.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    match (prior, proposed) {
        (None, proposed) => plan_create(schema, proposed),
        (Some(prior), Value::Null) => plan_destroy(prior),
        (Some(prior), proposed) => plan_update(schema, prior, proposed),
    }
}

/// Apply attribute defaults to every unset attribute, including nested blocks.
pub fn apply_defaults(block: &Block, value: &mut Value) {
    let Value::Object(obj) = value else {
        return;
    };

    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            let unset = obj.get(name).map_or(true, Value::is_null);
            if unset {
                obj.insert(name.clone(), default.clone());
            }
        }
    }

    for (name, nested) in &block.blocks {
        match (nested.nesting_mode, obj.get_mut(name)) {
            (BlockNestingMode::Single, Some(inner)) => apply_defaults(&nested.block, inner),
            (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(items))) => {
                for item in items {
                    apply_defaults(&nested.block, item);
                }
            },
            _ => {},
        }
    }
}

fn plan_create(schema: &Schema, mut proposed: Value) -> PlanResult {
    apply_defaults(&schema.block, &mut proposed);

    let mut changes = Vec::new();
    if let Value::Object(obj) = &mut proposed {
        for (name, attr) in &schema.block.attributes {
            if attr.flags.is_computed_only() {
                obj.insert(name.clone(), Value::Null);
                continue;
            }
            if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
                changes.push(AttributeChange::added(name.clone(), value.clone()));
            }
        }
        for name in schema.block.blocks.keys() {
            if let Some(value) = obj.get(name).filter(|v| !is_empty_block(v)) {
                changes.push(AttributeChange::added(name.clone(), value.clone()));
            }
        }
    }

    sort_changes(&mut changes);
    PlanResult::with_changes(proposed, changes, false)
}

fn plan_destroy(prior: &Value) -> PlanResult {
    let changes = match prior {
        Value::Object(obj) => obj
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
            .collect(),
        _ => Vec::new(),
    };
    PlanResult::with_changes(Value::Null, changes, false)
}

fn plan_update(schema: &Schema, prior: &Value, mut proposed: Value) -> PlanResult {
    apply_defaults(&schema.block, &mut proposed);

    let empty = Map::new();
    let prior_obj = prior.as_object().unwrap_or(&empty);
    let null = Value::Null;

    let mut changes = Vec::new();
    let mut requires_replace = false;

    if let Value::Object(obj) = &proposed {
        for (name, attr) in &schema.block.attributes {
            if attr.flags.is_computed_only() {
                continue;
            }
            let before = prior_obj.get(name).unwrap_or(&null);
            let after = obj.get(name).unwrap_or(&null);
            // Optional+computed attributes left unset keep the provider's value.
            if attr.flags.computed && after.is_null() {
                continue;
            }
            let changed = match attr.attr_type {
                AttributeType::Set(_) => !same_members(before, after),
                _ => before != after,
            };
            if changed {
                requires_replace |= attr.requires_replace;
                changes.push(change_between(name, before, after));
            }
        }

        for (name, nested) in &schema.block.blocks {
            let before = prior_obj.get(name).unwrap_or(&null);
            let after = obj.get(name).unwrap_or(&null);
            // Unconfigured blocks filled in by the provider keep their value.
            if nested.use_state_for_unknown && is_empty_block(after) {
                continue;
            }
            let equal = match nested.nesting_mode {
                BlockNestingMode::Set => {
                    (is_empty_block(before) && is_empty_block(after)) || same_members(before, after)
                },
                _ => blocks_equal(before, after),
            };
            if !equal {
                requires_replace |= nested.requires_replace;
                changes.push(change_between(name, before, after));
            }
        }
    }

    if changes.is_empty() {
        return PlanResult::no_change(prior.clone());
    }

    if let Value::Object(obj) = &mut proposed {
        for (name, attr) in &schema.block.attributes {
            if !attr.flags.computed {
                continue;
            }
            let configured = obj.get(name).is_some_and(|v| !v.is_null());
            if configured {
                continue;
            }
            let value = if attr.use_state_for_unknown && !requires_replace {
                prior_obj.get(name).cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            };
            obj.insert(name.clone(), value);
        }

        for (name, nested) in &schema.block.blocks {
            if !nested.use_state_for_unknown || !obj.get(name).map_or(true, is_empty_block) {
                continue;
            }
            let value = if requires_replace {
                Value::Null
            } else {
                prior_obj.get(name).cloned().unwrap_or(Value::Null)
            };
            obj.insert(name.clone(), value);
        }
    }

    sort_changes(&mut changes);
    PlanResult::with_changes(proposed, changes, requires_replace)
}

fn change_between(name: &str, before: &Value, after: &Value) -> AttributeChange {
    match (before.is_null(), after.is_null()) {
        (true, _) => AttributeChange::added(name, after.clone()),
        (false, true) => AttributeChange::removed(name, before.clone()),
        (false, false) => AttributeChange::modified(name, before.clone(), after.clone()),
    }
}

/// Absent, null and empty-list blocks are all "no block".
fn is_empty_block(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn blocks_equal(before: &Value, after: &Value) -> bool {
    (is_empty_block(before) && is_empty_block(after)) || equivalent(before, after)
}

static NULL: Value = Value::Null;

/// Structural equality where a missing object key equals an explicit null.
fn equivalent(before: &Value, after: &Value) -> bool {
    match (before, after) {
        (Value::Object(a), Value::Object(b)) => a
            .keys()
            .chain(b.keys())
            .all(|k| equivalent(a.get(k).unwrap_or(&NULL), b.get(k).unwrap_or(&NULL))),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equivalent(x, y))
        },
        _ => before == after,
    }
}

/// Order-insensitive comparison of two arrays, matching each element once.
fn same_members(before: &Value, after: &Value) -> bool {
    let (Value::Array(a), Value::Array(b)) = (before, after) else {
        return equivalent(before, after);
    };
    if a.len() != b.len() {
        return false;
    }
    let mut unmatched: Vec<&Value> = b.iter().collect();
    a.iter().all(|x| match unmatched.iter().position(|y| equivalent(x, y)) {
        Some(i) => {
            unmatched.swap_remove(i);
            true
        },
        None => false,
    })
}

fn sort_changes(changes: &mut [AttributeChange]) {
    changes.sort_by(|a, b| a.path.cmp(&b.path));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_use_state_for_unknown(),
            )
            .with_attribute("version_id", Attribute::computed_string())
            .with_attribute(
                "function_name",
                Attribute::required_string().with_requires_replace(),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "api_body_format",
                Attribute::optional_computed_string().with_default(json!("CUSTOM")),
            )
            .with_block(
                "secret",
                NestedBlock::single(
                    Block::new().with_attribute("name", Attribute::required_string()),
                )
                .with_requires_replace(),
            )
            .with_block(
                "models",
                NestedBlock::list(Block::new().with_attribute("uri", Attribute::required_string())),
            )
    }

    #[test]
    fn test_plan_create() {
        let plan = plan_resource(&schema(), None, json!({"function_name": "echo", "id": "x"}));

        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["api_body_format"], "CUSTOM");
        assert!(plan.planned_state["id"].is_null());
        assert!(plan.planned_state["version_id"].is_null());
        let paths: Vec<_> = plan.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["api_body_format", "function_name"]);
    }

    #[test]
    fn test_plan_no_change_keeps_prior_state() {
        let prior = json!({
            "id": "fn-1",
            "version_id": "ver-1",
            "function_name": "echo",
            "api_body_format": "CUSTOM",
            "models": []
        });
        let plan = plan_resource(&schema(), Some(&prior), json!({"function_name": "echo"}));

        assert!(plan.changes.is_empty());
        assert_eq!(plan.planned_state, prior);
    }

    #[test]
    fn test_plan_in_place_update() {
        let prior = json!({
            "id": "fn-1",
            "version_id": "ver-1",
            "function_name": "echo",
            "api_body_format": "CUSTOM"
        });
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"function_name": "echo", "description": "now described"}),
        );

        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "description");
        assert_eq!(plan.planned_state["id"], "fn-1");
        assert!(plan.planned_state["version_id"].is_null());
    }

    #[test]
    fn test_plan_requires_replace_attribute() {
        let prior = json!({"id": "fn-1", "function_name": "echo"});
        let plan = plan_resource(&schema(), Some(&prior), json!({"function_name": "renamed"}));

        assert!(plan.requires_replace);
        assert!(plan.planned_state["id"].is_null());
    }

    #[test]
    fn test_plan_requires_replace_block() {
        let prior = json!({
            "id": "t-1",
            "function_name": "echo",
            "api_body_format": "CUSTOM",
            "secret": {"name": "a"}
        });
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"function_name": "echo", "secret": {"name": "b"}}),
        );

        assert!(plan.requires_replace);
        assert_eq!(plan.changes[0].path, "secret");
    }

    #[test]
    fn test_plan_block_change_in_place() {
        let prior = json!({
            "id": "fn-1",
            "function_name": "echo",
            "api_body_format": "CUSTOM",
            "models": [{"uri": "a"}]
        });
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"function_name": "echo", "models": [{"uri": "b"}]}),
        );

        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 1);
    }

    #[test]
    fn test_plan_block_missing_keys_equal_nulls() {
        let prior = json!({
            "id": "fn-1",
            "function_name": "echo",
            "api_body_format": "CUSTOM",
            "models": [{"uri": "a", "checksum": null}]
        });
        let plan = plan_resource(
            &schema(),
            Some(&prior),
            json!({"function_name": "echo", "models": [{"uri": "a"}]}),
        );

        assert!(plan.changes.is_empty());
    }

    fn set_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string().with_use_state_for_unknown())
            .with_attribute(
                "types",
                Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::required())
                    .with_requires_replace(),
            )
            .with_block(
                "secrets",
                NestedBlock::set(Block::new().with_attribute("name", Attribute::required_string())),
            )
            .with_block(
                "health",
                NestedBlock::single(Block::new().with_attribute("port", Attribute::required_int64()))
                    .with_use_state_for_unknown(),
            )
    }

    #[test]
    fn test_plan_set_reorder_is_no_change() {
        let prior = json!({
            "id": "t-1",
            "types": ["LOGS", "METRICS"],
            "secrets": [{"name": "a"}, {"name": "b"}]
        });
        let plan = plan_resource(
            &set_schema(),
            Some(&prior),
            json!({"types": ["METRICS", "LOGS"], "secrets": [{"name": "b"}, {"name": "a"}]}),
        );

        assert!(plan.changes.is_empty());
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state, prior);
    }

    #[test]
    fn test_plan_set_membership_change() {
        let prior = json!({"id": "t-1", "types": ["LOGS", "METRICS"]});
        let plan = plan_resource(&set_schema(), Some(&prior), json!({"types": ["LOGS", "LOGS"]}));

        assert!(plan.requires_replace);
        assert_eq!(plan.changes[0].path, "types");
    }

    #[test]
    fn test_plan_unconfigured_block_keeps_prior_value() {
        let prior = json!({"id": "t-1", "types": ["LOGS"], "health": {"port": 8000}});

        let unchanged = plan_resource(&set_schema(), Some(&prior), json!({"types": ["LOGS"]}));
        assert!(unchanged.changes.is_empty());

        let added = plan_resource(
            &set_schema(),
            Some(&prior),
            json!({"types": ["LOGS"], "secrets": [{"name": "a"}]}),
        );
        assert_eq!(added.changes.len(), 1);
        assert_eq!(added.planned_state["health"], json!({"port": 8000}));

        let configured = plan_resource(
            &set_schema(),
            Some(&prior),
            json!({"types": ["LOGS"], "health": {"port": 9000}}),
        );
        assert_eq!(configured.changes[0].path, "health");
    }

    #[test]
    fn test_plan_destroy() {
        let prior = json!({"id": "fn-1", "function_name": "echo", "description": null});
        let plan = plan_resource(&schema(), Some(&prior), Value::Null);

        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 2);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_apply_defaults_in_nested_blocks() {
        let block = Block::new().with_block(
            "health",
            NestedBlock::single(
                Block::new().with_attribute(
                    "protocol",
                    Attribute::optional_string().with_default(json!("HTTP")),
                ),
            ),
        );
        let mut value = json!({"health": {"protocol": null}});
        apply_defaults(&block, &mut value);
        assert_eq!(value["health"]["protocol"], "HTTP");
    }
}
