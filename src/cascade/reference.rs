//! Loose reference normalization
//!
//! The store holds two historical reference shapes: a bare id string, and an
//! object with an `id` field (older documents also carry a stable
//! `elementKey` on array elements). Everything downstream of the store
//! boundary works on the normalized `Reference` union.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// A reference as it appears in a stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    /// Bare id string
    RawId(String),
    /// Object form, written by older app versions
    RefObject {
        id: String,
        #[serde(rename = "elementKey", skip_serializing_if = "Option::is_none")]
        element_key: Option<String>,
    },
}

impl Reference {
    pub fn id(&self) -> &str {
        match self {
            Reference::RawId(id) => id,
            Reference::RefObject { id, .. } => id,
        }
    }

    /// Normalize a raw store value into a reference, if it is one
    pub fn from_bson(value: &Bson) -> Option<Reference> {
        match value {
            Bson::String(s) => Some(Reference::RawId(s.clone())),
            Bson::Document(d) => {
                let id = d.get_str("id").ok()?;
                Some(Reference::RefObject {
                    id: id.to_string(),
                    element_key: d.get_str("elementKey").ok().map(|k| k.to_string()),
                })
            }
            _ => None,
        }
    }
}

/// True when a raw store value is a reference to `target`, in either shape
pub fn value_is_ref(value: &Bson, target: &str) -> bool {
    Reference::from_bson(value).is_some_and(|r| r.id() == target)
}

/// True when an array element references `target` through `subpath`.
/// An empty subpath means the element itself is the reference.
pub fn element_references(element: &Bson, subpath: &str, target: &str) -> bool {
    if subpath.is_empty() {
        return value_is_ref(element, target);
    }
    let Bson::Document(doc) = element else {
        return false;
    };
    let (head, rest) = match subpath.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (subpath, ""),
    };
    match doc.get(head) {
        Some(Bson::Array(items)) => items
            .iter()
            .any(|item| element_references(item, rest, target)),
        Some(value) if rest.is_empty() => value_is_ref(value, target),
        Some(value) => element_references(value, rest, target),
        None => false,
    }
}

/// Result of removing a target's references from an array field
#[derive(Debug)]
pub struct ArrayStrip {
    /// Dotted path of the array field itself (prefix of the edge path)
    pub array_path: String,
    /// The array with the target's references removed
    pub remaining: Vec<Bson>,
    /// How many elements were dropped
    pub removed: usize,
}

/// Rewrite the array on `doc` at the edge path `path`, dropping elements
/// that reference `target`. The path addresses the reference *inside* the
/// elements (e.g. `assignedUsers.user`); the first array encountered along
/// the path is the one rewritten. Returns None when the path does not reach
/// an array on this document.
pub fn strip_from_array(doc: &Document, path: &str, target: &str) -> Option<ArrayStrip> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut current: &Document = doc;
    for (i, segment) in segments.iter().enumerate() {
        match current.get(*segment) {
            Some(Bson::Array(items)) => {
                let subpath = segments[i + 1..].join(".");
                let remaining: Vec<Bson> = items
                    .iter()
                    .filter(|el| !element_references(el, &subpath, target))
                    .cloned()
                    .collect();
                let removed = items.len() - remaining.len();
                return Some(ArrayStrip {
                    array_path: segments[..=i].join("."),
                    remaining,
                    removed,
                });
            }
            Some(Bson::Document(next)) => current = next,
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_normalize_both_shapes() {
        let raw = Bson::String("u1".to_string());
        assert_eq!(Reference::from_bson(&raw), Some(Reference::RawId("u1".into())));

        let obj = Bson::Document(doc! { "id": "u1", "elementKey": "k-3" });
        let r = Reference::from_bson(&obj).unwrap();
        assert_eq!(r.id(), "u1");
        assert_eq!(
            r,
            Reference::RefObject {
                id: "u1".to_string(),
                element_key: Some("k-3".to_string())
            }
        );

        assert_eq!(Reference::from_bson(&Bson::Int32(7)), None);
        assert_eq!(Reference::from_bson(&Bson::Document(doc! { "name": "x" })), None);
    }

    #[test]
    fn test_value_is_ref() {
        assert!(value_is_ref(&Bson::String("u1".into()), "u1"));
        assert!(value_is_ref(&Bson::Document(doc! { "id": "u1" }), "u1"));
        assert!(!value_is_ref(&Bson::String("u2".into()), "u1"));
    }

    #[test]
    fn test_strip_scalar_array() {
        let team = doc! { "_id": "team1", "members": ["u1", { "id": "u2" }, "u3"] };
        let strip = strip_from_array(&team, "members", "u2").unwrap();
        assert_eq!(strip.array_path, "members");
        assert_eq!(strip.removed, 1);
        assert_eq!(strip.remaining.len(), 2);
    }

    #[test]
    fn test_strip_array_of_objects() {
        let project = doc! {
            "_id": "p1",
            "assignedUsers": [
                { "user": "u1", "role": "dev" },
                { "user": { "id": "u2" }, "role": "qa", "elementKey": "e-9" },
            ],
        };
        let strip = strip_from_array(&project, "assignedUsers.user", "u2").unwrap();
        assert_eq!(strip.array_path, "assignedUsers");
        assert_eq!(strip.removed, 1);
        assert_eq!(
            strip.remaining,
            vec![Bson::Document(doc! { "user": "u1", "role": "dev" })]
        );
    }

    #[test]
    fn test_strip_nested_array() {
        let report = doc! {
            "_id": "r1",
            "filters": { "users": ["u1", "u2"], "projects": ["p1"] },
        };
        let strip = strip_from_array(&report, "filters.users", "u1").unwrap();
        assert_eq!(strip.array_path, "filters.users");
        assert_eq!(strip.remaining, vec![Bson::String("u2".to_string())]);
    }

    #[test]
    fn test_strip_missing_path() {
        let doc = doc! { "_id": "x", "name": "no arrays here" };
        assert!(strip_from_array(&doc, "members", "u1").is_none());
    }

    #[test]
    fn test_strip_no_match_removes_nothing() {
        let team = doc! { "_id": "team1", "members": ["u1"] };
        let strip = strip_from_array(&team, "members", "u9").unwrap();
        assert_eq!(strip.removed, 0);
        assert_eq!(strip.remaining.len(), 1);
    }
}
