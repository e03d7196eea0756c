//! Applying shape descriptors to records
//!
//! [`Shaper`] is the seam between the pipeline and whatever turns stored
//! records into output values. [`FieldShaper`] is the bundled implementation
//! working directly on JSON.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::store::Record;
use crate::template::ShapeDescriptor;

/// Turns a record, or an array of records, into its output shape
pub trait Shaper: Send + Sync {
    /// Shape `value` according to `descriptor`; must not mutate shared state
    fn shape(&self, value: &Value, descriptor: &ShapeDescriptor) -> Result<Value>;
}

/// JSON shaper implementing every descriptor option
///
/// Per record, in order:
///
/// 1. `prehook` runs on the input
/// 2. the selected keys are `fields` (or every key), plus related keys, minus `exclude`
/// 3. a selected key absent from the record becomes `null`, or is skipped with `allow_missing`
/// 4. related values are shaped with their own descriptor; with `merge` their keys
///    are hoisted into the parent under `prefix`
/// 5. `aliases` rename output keys
/// 6. `values_list` emits the values as an array, collapsed to a scalar by `flat`
///    when only one is selected
/// 7. `camelcase` converts output keys, then `posthook` runs
///
/// Arrays are shaped element by element; other scalars pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldShaper;

impl Shaper for FieldShaper {
    fn shape(&self, value: &Value, descriptor: &ShapeDescriptor) -> Result<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.shape(item, descriptor))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(record) => self.shape_record(record, descriptor),
            other => Ok(other.clone()),
        }
    }
}

impl FieldShaper {
    fn shape_record(&self, record: &Record, descriptor: &ShapeDescriptor) -> Result<Value> {
        let input = match &descriptor.prehook {
            Some(hook) => hook.call(Value::Object(record.clone())),
            None => Value::Object(record.clone()),
        };
        let Value::Object(record) = input else {
            return Ok(input);
        };

        let mut keys: Vec<String> = match &descriptor.fields {
            Some(fields) => fields.clone(),
            None => record.keys().cloned().collect(),
        };
        for field in descriptor.related.keys() {
            if !keys.contains(field) && record.contains_key(field) {
                keys.push(field.clone());
            }
        }
        keys.retain(|key| !descriptor.exclude.contains(key));

        let renamed: HashMap<&str, &str> = descriptor
            .aliases
            .iter()
            .map(|(output, source)| (source.as_str(), output.as_str()))
            .collect();

        let mut selected: Vec<(String, Value)> = Vec::with_capacity(keys.len());
        for key in &keys {
            let (output, source) = match descriptor.aliases.get(key) {
                Some(source) => (key.as_str(), source.as_str()),
                None => (
                    renamed.get(key.as_str()).copied().unwrap_or(key.as_str()),
                    key.as_str(),
                ),
            };

            let value = match record.get(source) {
                Some(value) => value.clone(),
                None if descriptor.allow_missing => continue,
                None => Value::Null,
            };

            match descriptor.related.get(source) {
                Some(nested) => {
                    let shaped = self.shape(&value, nested)?;
                    match shaped {
                        Value::Object(fields) if nested.merge => {
                            for (field, value) in fields {
                                selected.push((format!("{}{}", nested.prefix, field), value));
                            }
                        }
                        shaped => selected.push((output.to_string(), shaped)),
                    }
                }
                None => selected.push((output.to_string(), value)),
            }
        }

        let shaped = if descriptor.values_list {
            let mut values: Vec<Value> = selected.into_iter().map(|(_, value)| value).collect();
            if descriptor.flat && values.len() == 1 {
                values.pop().unwrap_or(Value::Null)
            } else {
                Value::Array(values)
            }
        } else {
            let mut out = Map::new();
            for (key, value) in selected {
                let key = if descriptor.camelcase {
                    to_camel_case(&key)
                } else {
                    key
                };
                out.insert(key, value);
            }
            Value::Object(out)
        };

        Ok(match &descriptor.posthook {
            Some(hook) => hook.call(shaped),
            None => shaped,
        })
    }
}

/// `snake_case` to `camelCase`; leading underscores are kept
pub fn to_camel_case(key: &str) -> String {
    let trimmed = key.trim_start_matches('_');
    let mut out = String::with_capacity(key.len());
    out.push_str(&key[..key.len() - trimmed.len()]);

    let mut upper = false;
    for c in trimmed.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Hook;
    use serde_json::json;

    fn shape(value: Value, descriptor: &ShapeDescriptor) -> Value {
        FieldShaper.shape(&value, descriptor).unwrap()
    }

    #[test]
    fn test_fields_select_and_missing_become_null() {
        let d = ShapeDescriptor::with_fields(["title", "year"]);
        assert_eq!(
            shape(json!({"title": "Dune", "secret": 1}), &d),
            json!({"title": "Dune", "year": null})
        );

        let lenient = ShapeDescriptor {
            allow_missing: true,
            ..d
        };
        assert_eq!(shape(json!({"title": "Dune"}), &lenient), json!({"title": "Dune"}));
    }

    #[test]
    fn test_exclude_without_fields_keeps_the_rest() {
        let d = ShapeDescriptor {
            exclude: vec!["password".into()],
            ..ShapeDescriptor::default()
        };
        assert_eq!(
            shape(json!({"name": "jan", "password": "x"}), &d),
            json!({"name": "jan"})
        );
    }

    #[test]
    fn test_alias_renames_source_field() {
        let mut d = ShapeDescriptor::with_fields(["isbn", "title"]);
        d.aliases.insert("book_title".into(), "title".into());
        assert_eq!(
            shape(json!({"isbn": "ABC123", "title": "Title"}), &d),
            json!({"isbn": "ABC123", "book_title": "Title"})
        );

        // Selecting the output name directly works as well
        let mut d = ShapeDescriptor::with_fields(["book_title"]);
        d.aliases.insert("book_title".into(), "title".into());
        assert_eq!(shape(json!({"title": "Title"}), &d), json!({"book_title": "Title"}));
    }

    #[test]
    fn test_related_objects_and_lists_are_shaped() {
        let mut d = ShapeDescriptor::with_fields(["title", "author"]);
        d.related.insert("author".into(), ShapeDescriptor::with_fields(["name"]));
        d.related.insert(
            "tags".into(),
            ShapeDescriptor {
                values_list: true,
                ..ShapeDescriptor::with_fields(["label"])
            },
        );

        let out = shape(
            json!({
                "title": "Dune",
                "author": {"name": "Frank", "born": 1920},
                "tags": [{"label": "scifi", "id": 1}, {"label": "epic", "id": 2}]
            }),
            &d,
        );
        assert_eq!(
            out,
            json!({"title": "Dune", "author": {"name": "Frank"}, "tags": ["scifi", "epic"]})
        );
    }

    #[test]
    fn test_merge_hoists_related_fields_with_prefix() {
        let mut d = ShapeDescriptor::with_fields(["title", "author"]);
        d.related.insert(
            "author".into(),
            ShapeDescriptor {
                merge: true,
                prefix: "author_".into(),
                ..ShapeDescriptor::with_fields(["name"])
            },
        );
        assert_eq!(
            shape(json!({"title": "Dune", "author": {"name": "Frank"}}), &d),
            json!({"title": "Dune", "author_name": "Frank"})
        );
    }

    #[test]
    fn test_values_list_flat_and_not_flat() {
        let flat = ShapeDescriptor {
            values_list: true,
            ..ShapeDescriptor::with_fields(["id"])
        };
        assert_eq!(shape(json!([{"id": 1}, {"id": 2}]), &flat), json!([1, 2]));

        let pairs = ShapeDescriptor {
            values_list: true,
            flat: false,
            ..ShapeDescriptor::with_fields(["id"])
        };
        assert_eq!(shape(json!({"id": 1}), &pairs), json!([1]));
    }

    #[test]
    fn test_camelcase_and_hooks() {
        let d = ShapeDescriptor {
            camelcase: true,
            prehook: Some(Hook::new("add_full", |mut v| {
                v["full_name"] = json!("Frank Herbert");
                v
            })),
            posthook: Some(Hook::new("wrap", |v| json!({"author": v}))),
            ..ShapeDescriptor::default()
        };
        assert_eq!(
            shape(json!({"first_name": "Frank"}), &d),
            json!({"author": {"firstName": "Frank", "fullName": "Frank Herbert"}})
        );
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("book_title"), "bookTitle");
        assert_eq!(to_camel_case("_private_key"), "_privateKey");
        assert_eq!(to_camel_case("id"), "id");
    }
}
