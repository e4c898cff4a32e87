//! Finder results: matched and not-matched name sets per key

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use weft_object::{ClassId, ObjectId, Reflect, Subject};

/// Key of a finder result entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultKey {
    /// A resolved type or object
    Subject(Subject),
    /// An input expression that resolved to nothing, e.g. `"Nope"` or `/^X/`
    Spec(String),
}

impl ResultKey {
    /// The subject, if this key is one
    pub fn subject(&self) -> Option<Subject> {
        match self {
            ResultKey::Subject(subject) => Some(*subject),
            ResultKey::Spec(_) => None,
        }
    }

    /// Render the key with type paths resolved
    pub fn describe(&self, reflect: &dyn Reflect) -> String {
        match self {
            ResultKey::Subject(subject) => reflect.describe(*subject),
            ResultKey::Spec(spec) => spec.clone(),
        }
    }
}

impl From<Subject> for ResultKey {
    fn from(subject: Subject) -> Self {
        ResultKey::Subject(subject)
    }
}

impl From<ClassId> for ResultKey {
    fn from(id: ClassId) -> Self {
        ResultKey::Subject(Subject::Class(id))
    }
}

impl From<ObjectId> for ResultKey {
    fn from(id: ObjectId) -> Self {
        ResultKey::Subject(Subject::Object(id))
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKey::Subject(subject) => write!(f, "{}", subject),
            ResultKey::Spec(spec) => write!(f, "{}", spec),
        }
    }
}

type NameSets = BTreeMap<ResultKey, BTreeSet<String>>;

/// Result of a type, method or pointcut search
///
/// `matched` maps each found type or object to the names found on it (empty
/// for type searches). `not_matched` maps inputs that found nothing to the
/// names that were asked for. A name is never both matched and not matched
/// under the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinderResult {
    matched: NameSets,
    not_matched: NameSets,
}

impl FinderResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a matched entry
    pub fn with_matched<I, S>(mut self, key: impl Into<ResultKey>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append_matched(key.into(), names.into_iter().map(Into::into).collect());
        self
    }

    /// Builder: add a not-matched entry
    pub fn with_not_matched<I, S>(mut self, key: impl Into<ResultKey>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append_not_matched(key.into(), names.into_iter().map(Into::into).collect());
        self
    }

    /// Matched entries
    pub fn matched(&self) -> &BTreeMap<ResultKey, BTreeSet<String>> {
        &self.matched
    }

    /// Not-matched entries
    pub fn not_matched(&self) -> &BTreeMap<ResultKey, BTreeSet<String>> {
        &self.not_matched
    }

    /// Keys that matched
    pub fn matched_keys(&self) -> impl Iterator<Item = &ResultKey> {
        self.matched.keys()
    }

    /// Keys that did not match
    pub fn not_matched_keys(&self) -> impl Iterator<Item = &ResultKey> {
        self.not_matched.keys()
    }

    /// Matched subjects, in key order
    pub fn matched_subjects(&self) -> Vec<Subject> {
        self.matched.keys().filter_map(ResultKey::subject).collect()
    }

    /// Names matched under a key
    pub fn matched_names(&self, key: &ResultKey) -> Option<&BTreeSet<String>> {
        self.matched.get(key)
    }

    /// Whether nothing matched; not-matched entries do not count
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Add matched names under a key, dropping them from `not_matched`
    pub fn append_matched(&mut self, key: ResultKey, names: BTreeSet<String>) {
        if let Some(missing) = self.not_matched.get_mut(&key) {
            missing.retain(|n| !names.contains(n));
            if missing.is_empty() {
                self.not_matched.remove(&key);
            }
        }
        self.matched.entry(key).or_default().extend(names);
    }

    /// Add not-matched names under a key, purging names already matched
    pub fn append_not_matched(&mut self, key: ResultKey, names: BTreeSet<String>) {
        let purged: BTreeSet<String> = match self.matched.get(&key) {
            Some(found) => names.into_iter().filter(|n| !found.contains(n)).collect(),
            None => names,
        };
        if self.matched.contains_key(&key) && purged.is_empty() {
            return;
        }
        self.not_matched.entry(key).or_default().extend(purged);
    }

    /// Accumulate another result into this one
    pub fn append(&mut self, other: FinderResult) {
        for (key, names) in other.matched {
            self.append_matched(key, names);
        }
        for (key, names) in other.not_matched {
            self.append_not_matched(key, names);
        }
    }

    /// Per-key union
    pub fn union(&self, other: &FinderResult) -> FinderResult {
        let mut result = self.clone();
        result.append(other.clone());
        result
    }

    /// Per-key intersection; keys must be on both sides
    pub fn intersection(&self, other: &FinderResult) -> FinderResult {
        let mut result = FinderResult {
            matched: intersect(&self.matched, &other.matched),
            not_matched: intersect(&self.not_matched, &other.not_matched),
        };
        result.purge();
        result
    }

    /// Per-key difference
    ///
    /// A key on both sides whose difference is empty is dropped.
    pub fn minus(&self, other: &FinderResult) -> FinderResult {
        let mut result = FinderResult {
            matched: subtract(&self.matched, &other.matched),
            not_matched: subtract(&self.not_matched, &other.not_matched),
        };
        result.purge();
        result
    }

    /// Drop matched keys found in `other.matched`, whatever their names
    pub fn without_keys(&self, other: &FinderResult) -> FinderResult {
        let mut result = self.clone();
        result.matched.retain(|key, _| !other.matched.contains_key(key));
        result
    }

    /// Copy of the matched entries only
    pub fn matched_only(&self) -> FinderResult {
        FinderResult {
            matched: self.matched.clone(),
            not_matched: NameSets::new(),
        }
    }

    fn purge(&mut self) {
        let matched = &self.matched;
        self.not_matched.retain(|key, missing| match matched.get(key) {
            Some(found) => {
                missing.retain(|n| !found.contains(n));
                !missing.is_empty()
            }
            None => true,
        });
    }

    /// JSON rendering with type paths resolved, for diagnostics
    pub fn to_json(&self, reflect: &dyn Reflect) -> serde_json::Value {
        let render = |sets: &NameSets| -> serde_json::Map<String, serde_json::Value> {
            sets.iter()
                .map(|(key, names)| (key.describe(reflect), json!(names)))
                .collect()
        };
        json!({
            "matched": render(&self.matched),
            "not_matched": render(&self.not_matched),
        })
    }
}

impl fmt::Display for FinderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FinderResult {{ matched: {:?}, not_matched: {:?} }}", self.matched, self.not_matched)
    }
}

fn intersect(a: &NameSets, b: &NameSets) -> NameSets {
    a.iter()
        .filter_map(|(key, names)| {
            b.get(key)
                .map(|other| (key.clone(), names.intersection(other).cloned().collect()))
        })
        .collect()
}

fn subtract(a: &NameSets, b: &NameSets) -> NameSets {
    a.iter()
        .filter_map(|(key, names)| match b.get(key) {
            Some(other) => {
                let rest: BTreeSet<String> = names.difference(other).cloned().collect();
                (!rest.is_empty()).then(|| (key.clone(), rest))
            }
            None => Some((key.clone(), names.clone())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(n: u32) -> ResultKey {
        ResultKey::Subject(Subject::Class(ClassId(n)))
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_merges_per_key() {
        let a = FinderResult::new().with_matched(class(1), ["a", "b"]);
        let b = FinderResult::new()
            .with_matched(class(1), ["c"])
            .with_matched(class(2), ["d"]);
        let u = a.union(&b);
        assert_eq!(u.matched_names(&class(1)), Some(&set(&["a", "b", "c"])));
        assert_eq!(u.matched_names(&class(2)), Some(&set(&["d"])));
    }

    #[test]
    fn test_union_with_empty_is_identity() {
        let a = FinderResult::new()
            .with_matched(class(1), ["a"])
            .with_not_matched(ResultKey::Spec("Nope".into()), Vec::<String>::new());
        assert_eq!(a.union(&FinderResult::new()), a);
        assert_eq!(FinderResult::new().union(&a), a);
    }

    #[test]
    fn test_intersection_keeps_common_keys() {
        let a = FinderResult::new()
            .with_matched(class(1), ["a", "b"])
            .with_matched(class(2), ["x"]);
        let b = FinderResult::new().with_matched(class(1), ["b", "c"]);
        let i = a.intersection(&b);
        assert_eq!(i.matched().len(), 1);
        assert_eq!(i.matched_names(&class(1)), Some(&set(&["b"])));
    }

    #[test]
    fn test_intersection_keeps_key_with_empty_names() {
        let a = FinderResult::new().with_matched(class(1), Vec::<String>::new());
        let b = FinderResult::new().with_matched(class(1), Vec::<String>::new());
        assert_eq!(a.intersection(&b).matched().len(), 1);
    }

    #[test]
    fn test_minus_drops_emptied_keys() {
        let a = FinderResult::new()
            .with_matched(class(1), ["a", "b"])
            .with_matched(class(2), ["c"]);
        let b = FinderResult::new()
            .with_matched(class(1), ["a"])
            .with_matched(class(2), ["c"]);
        let m = a.minus(&b);
        assert_eq!(m.matched_names(&class(1)), Some(&set(&["b"])));
        assert!(m.matched_names(&class(2)).is_none());
    }

    #[test]
    fn test_append_not_matched_purges_matched_names() {
        let mut r = FinderResult::new().with_matched(class(1), ["a"]);
        r.append_not_matched(class(1), set(&["a", "b"]));
        assert_eq!(r.not_matched().get(&class(1)), Some(&set(&["b"])));

        r.append_not_matched(class(1), set(&["a"]));
        assert_eq!(r.not_matched().get(&class(1)), Some(&set(&["b"])));
    }

    #[test]
    fn test_append_matched_clears_not_matched() {
        let mut r = FinderResult::new().with_not_matched(class(1), ["a"]);
        r.append_matched(class(1), set(&["a"]));
        assert!(r.not_matched().is_empty());
        assert!(!r.is_empty());
    }

    #[test]
    fn test_empty_means_nothing_matched() {
        let r = FinderResult::new().with_not_matched(ResultKey::Spec("X".into()), Vec::<String>::new());
        assert!(r.is_empty());
        assert_eq!(r.not_matched_keys().count(), 1);
    }
}
