//! Assignee set value type and the added/removed projection between two sets
//!
//! A course's assignees are persisted as an ordered JSON array, but membership
//! is what matters: an id appears at most once and order never affects
//! equality. All course code goes through [`Assignees`] instead of raw vectors
//! so duplicate insertion cannot happen by accident.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free list of user ids assigned to a course
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Assignees {
    ids: Vec<String>,
}

impl Assignees {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any id sequence, keeping the first occurrence of each id
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for id in ids {
            set.insert(id);
        }
        set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    /// Append `id` unless it is already a member. Returns true if it was added.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Remove `id` if present. Returns true if it was a member.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    /// Members of `self` that are not members of `other`, in `self` order
    pub fn difference(&self, other: &Assignees) -> Vec<String> {
        let other: HashSet<&str> = other.ids.iter().map(String::as_str).collect();
        self.ids
            .iter()
            .filter(|id| !other.contains(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }
}

impl PartialEq for Assignees {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.ids.iter().all(|id| other.contains(id))
    }
}

impl Eq for Assignees {}

impl From<Vec<String>> for Assignees {
    fn from(ids: Vec<String>) -> Self {
        Self::from_ids(ids)
    }
}

impl From<Assignees> for Vec<String> {
    fn from(set: Assignees) -> Self {
        set.ids
    }
}

impl<'a> IntoIterator for &'a Assignees {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

/// Membership change between an original and an updated assignee set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssigneeDiff {
    /// In updated, not in original
    pub added: Vec<String>,
    /// In original, not in updated
    pub removed: Vec<String>,
}

impl AssigneeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute who was added and who was removed going from `original` to `updated`
pub fn project(original: &Assignees, updated: &Assignees) -> AssigneeDiff {
    AssigneeDiff {
        added: updated.difference(original),
        removed: original.difference(updated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> Assignees {
        Assignees::from_ids(ids.iter().copied())
    }

    #[test]
    fn test_duplicates_collapse_on_construction() {
        let assignees = set(&["u1", "u2", "u1", "u3", "u2"]);
        assert_eq!(assignees.as_slice(), &["u1", "u2", "u3"]);
    }

    #[test]
    fn test_insert_is_add_if_absent() {
        let mut assignees = set(&["u1"]);
        assert!(assignees.insert("u2"));
        assert!(!assignees.insert("u1"));
        assert!(!assignees.insert("u2"));
        assert_eq!(assignees.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut assignees = set(&["u1", "u2"]);
        assert!(assignees.remove("u1"));
        assert!(!assignees.remove("u1"));
        assert_eq!(assignees.as_slice(), &["u2"]);
    }

    #[test]
    fn test_equality_ignores_order() {
        assert_eq!(set(&["u1", "u2"]), set(&["u2", "u1"]));
        assert_ne!(set(&["u1", "u2"]), set(&["u1"]));
        assert_ne!(set(&["u1", "u2"]), set(&["u1", "u3"]));
    }

    #[test]
    fn test_deserialize_dedupes() {
        let assignees: Assignees = serde_json::from_str(r#"["a","b","a"]"#).unwrap();
        assert_eq!(assignees.as_slice(), &["a", "b"]);
        assert_eq!(serde_json::to_string(&assignees).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_project_swap() {
        let diff = project(&set(&["u1", "u2"]), &set(&["u2", "u3"]));
        assert_eq!(diff.added, vec!["u3"]);
        assert_eq!(diff.removed, vec!["u1"]);
    }

    #[test]
    fn test_project_no_change_reordered() {
        let diff = project(&set(&["u1", "u2"]), &set(&["u2", "u1"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_project_from_and_to_empty() {
        let diff = project(&Assignees::new(), &set(&["u1", "u2"]));
        assert_eq!(diff.added, vec!["u1", "u2"]);
        assert!(diff.removed.is_empty());

        let diff = project(&set(&["u1", "u2"]), &Assignees::new());
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, vec!["u1", "u2"]);
    }

    #[test]
    fn test_project_set_laws() {
        let cases: Vec<(Vec<&str>, Vec<&str>)> = vec![
            (vec![], vec![]),
            (vec!["a"], vec!["a"]),
            (vec!["a", "b", "c"], vec!["c", "d"]),
            (vec!["a", "a", "b"], vec!["b", "b", "e", "e"]),
            (vec!["x", "y"], vec!["p", "q", "x"]),
        ];

        for (original, updated) in cases {
            let original = set(&original);
            let updated = set(&updated);
            let diff = project(&original, &updated);

            for id in &diff.added {
                assert!(!diff.removed.contains(id), "added and removed overlap on {}", id);
                assert!(updated.contains(id));
                assert!(!original.contains(id));
            }
            for id in &diff.removed {
                assert!(original.contains(id));
                assert!(!updated.contains(id));
            }

            // (original \ removed) ∪ added == updated
            let mut rebuilt = original.clone();
            for id in &diff.removed {
                rebuilt.remove(id);
            }
            for id in &diff.added {
                assert!(rebuilt.insert(id.clone()), "duplicate in added: {}", id);
            }
            assert_eq!(rebuilt, updated);
        }
    }
}
