//! Option specifications
//!
//! Callers describe what to select with a `Spec`: an ordered list of
//! `key => values` pairs where keys may be any synonym of a canonical option
//! (`type`, `classes`, `on_types`, `exclude_type`, ...). Each consumer parses
//! a `Spec` against its `OptionTable` into an `OptionsSpecification` keyed by
//! canonical names, rejecting unknown keys.

use crate::aspects::join_point::JoinPoint;
use crate::aspects::pointcut::Pointcut;
use crate::diagnostics::DiagnosticSink;
use crate::error::{Result, WeftError};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use weft_object::{ClassId, ObjectId, Subject};

/// A single option value
#[derive(Clone)]
pub enum OptionValue {
    /// Boolean flag
    Flag(bool),
    /// Literal name: a type path, method name, option name or exception kind
    Name(String),
    /// Name pattern
    Pattern(Regex),
    /// The "all" sentinel
    All,
    /// Type handle
    Class(ClassId),
    /// Object handle
    Object(ObjectId),
    /// Explicit join point
    JoinPoint(JoinPoint),
    /// Resolved pointcut
    Pointcut(Arc<Pointcut>),
    /// Nested specification, e.g. for `named_pointcuts`
    Spec(Spec),
    /// Diagnostic sink for the `log` option
    Log(DiagnosticSink),
}

impl OptionValue {
    /// Compile a pattern value
    pub fn pattern(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(OptionValue::Pattern)
            .map_err(|e| WeftError::invalid(format!("bad pattern /{}/: {}", source, e)))
    }

    /// Whether the value counts as "set" for a flag option
    pub fn is_truthy(&self) -> bool {
        !matches!(self, OptionValue::Flag(false))
    }

    /// The literal name, if this is a name value
    pub fn as_name(&self) -> Option<&str> {
        match self {
            OptionValue::Name(name) => Some(name),
            _ => None,
        }
    }

    /// The subject, if this is a type or object handle
    pub fn as_subject(&self) -> Option<Subject> {
        match self {
            OptionValue::Class(id) => Some(Subject::Class(*id)),
            OptionValue::Object(id) => Some(Subject::Object(*id)),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(b) => write!(f, "{}", b),
            OptionValue::Name(name) => write!(f, "{:?}", name),
            OptionValue::Pattern(re) => write!(f, "/{}/", re.as_str()),
            OptionValue::All => write!(f, "all"),
            OptionValue::Class(id) => write!(f, "{}", id),
            OptionValue::Object(id) => write!(f, "{}", id),
            OptionValue::JoinPoint(jp) => write!(f, "{}", jp),
            OptionValue::Pointcut(pc) => write!(f, "{}", pc),
            OptionValue::Spec(spec) => write!(f, "{}", spec),
            OptionValue::Log(_) => write!(f, "<log>"),
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Flag(b)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Name(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Name(s)
    }
}

impl From<Regex> for OptionValue {
    fn from(re: Regex) -> Self {
        OptionValue::Pattern(re)
    }
}

impl From<ClassId> for OptionValue {
    fn from(id: ClassId) -> Self {
        OptionValue::Class(id)
    }
}

impl From<ObjectId> for OptionValue {
    fn from(id: ObjectId) -> Self {
        OptionValue::Object(id)
    }
}

impl From<Subject> for OptionValue {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::Class(id) => OptionValue::Class(id),
            Subject::Object(id) => OptionValue::Object(id),
        }
    }
}

impl From<JoinPoint> for OptionValue {
    fn from(jp: JoinPoint) -> Self {
        OptionValue::JoinPoint(jp)
    }
}

impl From<Pointcut> for OptionValue {
    fn from(pc: Pointcut) -> Self {
        OptionValue::Pointcut(Arc::new(pc))
    }
}

impl From<Arc<Pointcut>> for OptionValue {
    fn from(pc: Arc<Pointcut>) -> Self {
        OptionValue::Pointcut(pc)
    }
}

impl From<Spec> for OptionValue {
    fn from(spec: Spec) -> Self {
        OptionValue::Spec(spec)
    }
}

impl From<DiagnosticSink> for OptionValue {
    fn from(sink: DiagnosticSink) -> Self {
        OptionValue::Log(sink)
    }
}

/// Caller-facing option list
#[derive(Clone, Default)]
pub struct Spec {
    entries: Vec<(String, Vec<OptionValue>)>,
}

impl Spec {
    /// Create an empty specification
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value under `key`
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.push(key, vec![value.into()]);
        self
    }

    /// Add several values under `key`
    pub fn with_all<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<OptionValue>,
    {
        self.push(key, values.into_iter().map(Into::into).collect());
        self
    }

    /// Set a flag option
    pub fn flag(self, key: &str) -> Self {
        self.with(key, true)
    }

    /// Append values under `key`
    pub fn push(&mut self, key: &str, values: Vec<OptionValue>) {
        self.entries.push((key.to_string(), values));
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[(String, Vec<OptionValue>)] {
        &self.entries
    }

    /// Whether no option was given
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, values)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} => [", key)?;
            for (j, value) in values.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            write!(f, "]")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Canonical option names and their synonyms
#[derive(Debug, Default)]
pub struct OptionTable {
    synonyms: FxHashMap<String, String>,
}

const PREPOSITIONS: [&str; 4] = ["for_", "on_", "in_", "within_"];

impl OptionTable {
    /// Canonical name for a key, if recognized
    pub fn canonical(&self, key: &str) -> Option<&str> {
        self.synonyms.get(key).map(String::as_str)
    }

    /// Every recognized key, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.synonyms.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn option(mut self, canonical: &str, synonyms: &[&str]) -> Self {
        self.synonyms.insert(canonical.to_string(), canonical.to_string());
        for synonym in synonyms {
            self.synonyms.insert(synonym.to_string(), canonical.to_string());
        }
        self
    }

    /// A selector option: synonyms, `for_`/`on_`/`in_`/`within_` variants and
    /// an `exclude_` counterpart accepting the `exclude_`-prefixed synonyms
    fn selector(self, canonical: &str, synonyms: &[&str]) -> Self {
        let mut names: Vec<String> = vec![canonical.to_string()];
        names.extend(synonyms.iter().map(|s| s.to_string()));

        let mut with_prepositions: Vec<String> = names.clone();
        for name in &names {
            for prefix in PREPOSITIONS {
                with_prepositions.push(format!("{}{}", prefix, name));
            }
        }
        let refs: Vec<&str> = with_prepositions.iter().map(String::as_str).collect();
        let table = self.option(canonical, &refs);

        let exclude_canonical = format!("exclude_{}", canonical);
        let excludes: Vec<String> = names.iter().map(|n| format!("exclude_{}", n)).collect();
        let refs: Vec<&str> = excludes.iter().map(String::as_str).collect();
        table.option(&exclude_canonical, &refs)
    }

    fn universal(self) -> Self {
        self.option(LOG, &["logger"])
            .option(NOOP, &[])
            .option(IGNORE_NO_MATCHING, &["ignore_no_jps"])
    }

    fn type_selectors(self) -> Self {
        self.selector(TYPES, &["type", "class", "classes", "module", "modules", "name", "names"])
            .selector(
                TYPES_AND_DESCENDANTS,
                &["type_and_descendants", "types_and_descendents", "type_and_descendents"],
            )
            .selector(TYPES_AND_ANCESTORS, &["type_and_ancestors"])
    }

    fn method_selectors(self) -> Self {
        let mut methods: Vec<String> = [
            "method",
            "within_method",
            "within_methods",
            "calling",
            "invoking",
            "invocations_of",
            "calls_to",
            "sending_message_to",
            "sending_messages_to",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let matching: Vec<String> = std::iter::once(METHODS.to_string())
            .chain(methods.iter().cloned())
            .map(|s| {
                if s.ends_with("method") || s.ends_with("methods") {
                    format!("{}_matching", s)
                } else {
                    format!("{}_methods_matching", s)
                }
            })
            .collect();
        let excludes: Vec<String> = methods.iter().map(|s| format!("exclude_{}", s)).collect();
        methods.extend(matching);
        let refs: Vec<&str> = methods.iter().map(String::as_str).collect();
        let exclude_refs: Vec<&str> = excludes.iter().map(String::as_str).collect();

        self.option(METHODS, &refs)
            .option(EXCLUDE_METHODS, &exclude_refs)
            .option(METHOD_OPTIONS, &["options", "method_option", "restricting_methods_to"])
    }
}

// Canonical option names
pub(crate) const LOG: &str = "log";
pub(crate) const NOOP: &str = "noop";
pub(crate) const IGNORE_NO_MATCHING: &str = "ignore_no_matching_join_points";
pub(crate) const TYPES: &str = "types";
pub(crate) const TYPES_AND_DESCENDANTS: &str = "types_and_descendants";
pub(crate) const TYPES_AND_ANCESTORS: &str = "types_and_ancestors";
pub(crate) const OBJECTS: &str = "objects";
pub(crate) const METHODS: &str = "methods";
pub(crate) const EXCLUDE_METHODS: &str = "exclude_methods";
pub(crate) const METHOD_OPTIONS: &str = "method_options";
pub(crate) const ATTRIBUTES: &str = "attributes";
pub(crate) const EXCLUDE_ATTRIBUTES: &str = "exclude_attributes";
pub(crate) const ATTRIBUTE_OPTIONS: &str = "attribute_options";
pub(crate) const JOIN_POINTS: &str = "join_points";
pub(crate) const POINTCUTS: &str = "pointcuts";
pub(crate) const NAMED_POINTCUTS: &str = "named_pointcuts";
pub(crate) const MATCHING: &str = "matching";
pub(crate) const CONSTANTS_MATCHING: &str = "constants_matching";
pub(crate) const CLASS_VARIABLES_MATCHING: &str = "class_variables_matching";
pub(crate) const EXCEPTIONS: &str = "exceptions";

/// The three type selectors, in resolution order
pub(crate) const TYPE_SELECTORS: [&str; 3] = [TYPES, TYPES_AND_DESCENDANTS, TYPES_AND_ANCESTORS];

/// Options understood by the type finder
pub static TYPE_FINDER_OPTIONS: Lazy<OptionTable> =
    Lazy::new(|| OptionTable::default().type_selectors().universal());

/// Options understood by the method finder
pub static METHOD_FINDER_OPTIONS: Lazy<OptionTable> = Lazy::new(|| {
    OptionTable::default()
        .type_selectors()
        .selector(OBJECTS, &["object"])
        .method_selectors()
        .universal()
});

/// Options understood by the pointcut finder
pub static POINTCUT_FINDER_OPTIONS: Lazy<OptionTable> = Lazy::new(|| {
    let mut table = OptionTable::default().type_selectors().universal();
    for prefix in ["", "constants_", "class_variables_"] {
        let with_names = format!("{}with_names_matching", prefix);
        let named = format!("{}named", prefix);
        table = table.option(&format!("{}matching", prefix), &[with_names.as_str(), named.as_str()]);
    }
    table
});

/// Options understood by `Pointcut::new`
pub static POINTCUT_OPTIONS: Lazy<OptionTable> = Lazy::new(pointcut_table);

fn pointcut_table() -> OptionTable {
    OptionTable::default()
        .type_selectors()
        .selector(OBJECTS, &["object"])
        .selector(JOIN_POINTS, &["join_point"])
        .selector(POINTCUTS, &["pointcut"])
        .selector(NAMED_POINTCUTS, &["named_pointcut"])
        .method_selectors()
        .option(ATTRIBUTES, &["attribute"])
        .option(EXCLUDE_ATTRIBUTES, &["exclude_attribute"])
        .option(ATTRIBUTE_OPTIONS, &["attribute_option"])
        .universal()
}

/// Options understood by `Aspect::new`
pub static ASPECT_OPTIONS: Lazy<OptionTable> =
    Lazy::new(|| pointcut_table().option(EXCEPTIONS, &["exception"]));

/// Parsed options keyed by canonical name
#[derive(Clone, Default)]
pub struct OptionsSpecification {
    values: BTreeMap<String, Vec<OptionValue>>,
}

impl OptionsSpecification {
    /// Parse a caller's spec against a table of recognized options
    pub fn parse(table: &OptionTable, spec: &Spec) -> Result<Self> {
        let mut values: BTreeMap<String, Vec<OptionValue>> = BTreeMap::new();
        let mut unknown = Vec::new();
        for (key, given) in spec.entries() {
            match table.canonical(key) {
                Some(canonical) => values
                    .entry(canonical.to_string())
                    .or_default()
                    .extend(given.iter().cloned()),
                None => unknown.push(key.clone()),
            }
        }
        if !unknown.is_empty() {
            return Err(WeftError::invalid(format!("unknown options: {}", unknown.join(", "))));
        }
        Ok(Self { values })
    }

    /// Values given for a canonical option (empty if absent)
    pub fn get(&self, key: &str) -> &[OptionValue] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any value was given for a canonical option
    pub fn given(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    /// Whether a flag option is set
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).iter().any(OptionValue::is_truthy)
    }

    /// Resolve without installing anything
    pub fn noop(&self) -> bool {
        self.flag(NOOP)
    }

    /// Accept an empty match
    pub fn ignore_no_matching_join_points(&self) -> bool {
        self.flag(IGNORE_NO_MATCHING)
    }

    /// Sink from the `log` option, or the default sink
    pub fn sink(&self) -> DiagnosticSink {
        self.get(LOG)
            .iter()
            .find_map(|v| match v {
                OptionValue::Log(sink) => Some(sink.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Canonical keys that were given
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Display for OptionsSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut spec = Spec::new();
        for (key, values) in &self.values {
            if key != LOG {
                spec.push(key, values.clone());
            }
        }
        write!(f, "{}", spec)
    }
}

impl fmt::Debug for OptionsSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
