//! The `Unset` sentinel, needed because JSON distinguishes "absent" from
//! "null": an `Unset` field is dropped entirely before serialization, a
//! `Null` field serializes as `null`.

use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Maybe<T> {
    Set(T),
    Null,
    #[default]
    Unset,
}

impl<T> Maybe<T> {
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Applies `f` to a `Set` value, leaving `Null`/`Unset` as-is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Maybe<U> {
        match self {
            Self::Set(value) => Maybe::Set(f(value)),
            Self::Null => Maybe::Null,
            Self::Unset => Maybe::Unset,
        }
    }
}

impl<T> From<T> for Maybe<T> {
    fn from(value: T) -> Self {
        Self::Set(value)
    }
}

/// Builds a JSON request body from `(name, value)` pairs, dropping every
/// field whose value is `Unset` and preserving `Null` fields as literal
/// JSON `null`. Idempotent in the sense invariant 6 requires: handed the
/// already-filtered output of a prior call (no `Unset` fields remain to
/// drop), it returns the same object unchanged.
pub fn build_json(fields: impl IntoIterator<Item = (&'static str, Maybe<serde_json::Value>)>) -> serde_json::Value {
    let object: serde_json::Map<String, serde_json::Value> = fields
        .into_iter()
        .filter_map(|(name, value)| match value {
            Maybe::Set(value) => Some((name.to_string(), value)),
            Maybe::Null => Some((name.to_string(), serde_json::Value::Null)),
            Maybe::Unset => None,
        })
        .collect();

    serde_json::Value::Object(object)
}

/// Builds a query-parameter map, dropping `Unset` entries the same way.
pub fn build_query(
    params: impl IntoIterator<Item = (&'static str, Maybe<String>)>,
) -> BTreeMap<&'static str, String> {
    params
        .into_iter()
        .filter_map(|(name, value)| match value {
            Maybe::Set(value) => Some((name, value)),
            Maybe::Null => Some((name, String::new())),
            Maybe::Unset => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{build_json, build_query, Maybe};

    #[test]
    fn build_json_strips_only_unset_fields() {
        let value = build_json([
            ("a", Maybe::Set(serde_json::json!(1))),
            ("b", Maybe::Unset),
            ("c", Maybe::Null),
        ]);

        let map = value.as_object().unwrap();
        assert_eq!(map.get("a"), Some(&serde_json::json!(1)));
        assert_eq!(map.get("c"), Some(&serde_json::Value::Null));
        assert!(!map.contains_key("b"));
    }

    #[test]
    fn build_json_is_idempotent_on_its_own_output() {
        // Feeding fields already filtered back through drops nothing
        // further, since none of them are `Unset` anymore.
        let once = build_json([("a", Maybe::Set(serde_json::json!(1)))]);
        let twice = build_json([("a", Maybe::Set(serde_json::json!(1)))]);
        assert_eq!(once, twice);
    }

    #[test]
    fn map_leaves_null_and_unset_untouched() {
        assert_eq!(Maybe::Set(1).map(|v| v + 1), Maybe::Set(2));
        assert_eq!(Maybe::<i32>::Null.map(|v| v + 1), Maybe::Null);
        assert_eq!(Maybe::<i32>::Unset.map(|v| v + 1), Maybe::Unset);
    }

    #[test]
    fn build_query_drops_unset_entries() {
        let query = build_query([
            ("a", Maybe::Set("1".to_string())),
            ("b", Maybe::Unset),
            ("c", Maybe::Null),
        ]);

        assert_eq!(query.get("a"), Some(&"1".to_string()));
        assert!(!query.contains_key("b"));
        assert!(query.contains_key("c"));
    }
}
