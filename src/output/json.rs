//! Results as JSON
//!
//! Each entity becomes an array of objects. Child results attached to a row
//! appear under `"_linked"`, keyed by child entity name.

use crate::results::{EntityResult, Results};
use serde_json::{Map, Value};

/// Key holding the child results of a row
pub const LINKED_KEY: &str = "_linked";

/// `{ entity: [ {field: value, ..., "_linked": {...}} ] }`
pub fn results_to_json(results: &Results) -> Value {
    Value::Object(
        results
            .iter()
            .map(|(name, result)| (name.to_string(), result_to_json(result)))
            .collect(),
    )
}

/// The rows of one entity as an array of objects
pub fn result_to_json(result: &EntityResult) -> Value {
    let rows = result
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut object: Map<String, Value> = result
                .headers()
                .iter()
                .zip(row)
                .map(|(header, value)| {
                    let value = value.clone().map_or(Value::Null, Value::String);
                    (header.clone(), value)
                })
                .collect();

            let mut linked = Map::new();
            for children in [result.linked_field_data(index), result.linked_entity_data(index)]
                .into_iter()
                .flatten()
            {
                for (child, child_result) in children.iter() {
                    linked.insert(child.to_string(), result_to_json(child_result));
                }
            }
            if !linked.is_empty() {
                object.insert(LINKED_KEY.to_string(), Value::Object(linked));
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}
