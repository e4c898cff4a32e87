//! Type finder: resolves type names, handles and patterns to types

use crate::error::{Result, WeftError};
use crate::finders::result::{FinderResult, ResultKey};
use crate::options::{OptionValue, OptionsSpecification, Spec, TYPE_FINDER_OPTIONS, TYPE_SELECTORS};
use crate::options::{TYPES_AND_ANCESTORS, TYPES_AND_DESCENDANTS};
use regex::Regex;
use std::collections::BTreeSet;
use weft_object::{ClassId, Reflect, Subject};

/// Finds types known to a live object model
///
/// Selectors: `types` (also `type`, `classes`, `modules`, `names`, ...),
/// `types_and_descendants`, `types_and_ancestors`, and `exclude_` variants
/// of each. Values are type handles, qualified names or patterns.
///
/// Patterns are split on `::` and walked segment by segment from the top
/// level. The first segment may match the end of a name, the last segment
/// the start of one, and middle segments must match whole names:
///
/// | Pattern       | Behaves like                 |
/// |---------------|------------------------------|
/// | `/Foo/`       | `/.*Foo.*/` on top-level names |
/// | `/Fo::Ba/`    | `/.*Fo::Ba.*/`               |
/// | `/A::B::C/`   | `/.*A::B::C.*/` with `B` exact |
pub struct TypeFinder<'a> {
    reflect: &'a dyn Reflect,
}

impl<'a> TypeFinder<'a> {
    /// Create a finder over a reflection surface
    pub fn new(reflect: &'a dyn Reflect) -> Self {
        Self { reflect }
    }

    /// Find types matching a specification
    pub fn find(&self, spec: &Spec) -> Result<FinderResult> {
        let options = OptionsSpecification::parse(&TYPE_FINDER_OPTIONS, spec)?;
        self.find_with(&options)
    }

    pub(crate) fn find_with(&self, options: &OptionsSpecification) -> Result<FinderResult> {
        let found = self.find_selected(options, "")?;
        let excluded = self.find_selected(options, "exclude_")?;
        let result = found.without_keys(&excluded);

        options.sink().debug(format!(
            "type finder: {} matched, {} not matched",
            result.matched().len(),
            result.not_matched().len()
        ));
        Ok(result)
    }

    /// Resolve every type selector under a key prefix (`""` or `"exclude_"`)
    pub(crate) fn find_selected(&self, options: &OptionsSpecification, prefix: &str) -> Result<FinderResult> {
        let mut result = FinderResult::new();
        for selector in TYPE_SELECTORS {
            let key = format!("{}{}", prefix, selector);
            result.append(self.find_selector(selector, options.get(&key))?);
        }
        Ok(result)
    }

    /// Whether a specification names any types at all
    pub(crate) fn types_given(options: &OptionsSpecification) -> bool {
        TYPE_SELECTORS.iter().any(|s| options.given(s))
    }

    fn find_selector(&self, selector: &str, values: &[OptionValue]) -> Result<FinderResult> {
        let mut result = FinderResult::new();
        for value in values {
            result.append(self.find_value(value)?);
        }

        if selector == TYPES_AND_DESCENDANTS || selector == TYPES_AND_ANCESTORS {
            let roots: Vec<ClassId> = result.matched_subjects().iter().filter_map(Subject::as_class).collect();
            for root in roots {
                let related = if selector == TYPES_AND_DESCENDANTS {
                    self.reflect.descendants(root)
                } else {
                    self.reflect.ancestors(root)
                };
                for id in related {
                    result.append_matched(ResultKey::from(id), BTreeSet::new());
                }
            }
        }
        Ok(result)
    }

    fn find_value(&self, value: &OptionValue) -> Result<FinderResult> {
        match value {
            OptionValue::Class(id) => Ok(match self.reflect.class_path(*id) {
                Some(_) => FinderResult::new().with_matched(*id, Vec::<String>::new()),
                None => FinderResult::new().with_not_matched(ResultKey::Spec(id.to_string()), Vec::<String>::new()),
            }),
            OptionValue::Name(name) => Ok(self.find_by_name(name)),
            OptionValue::Pattern(re) => self.find_by_pattern(re),
            OptionValue::All => Ok(self.all_types()),
            other => Err(WeftError::invalid(format!(
                "types must be type handles, names or patterns, got {}",
                other
            ))),
        }
    }

    /// Resolve a qualified name such as `Outer::Inner`
    ///
    /// Blank names resolve to an empty result.
    pub fn find_by_name(&self, name: &str) -> FinderResult {
        let name = name.trim();
        if name.is_empty() {
            return FinderResult::new();
        }
        let segments: Vec<&str> = name.split("::").collect();
        match self.reflect.resolve_path(&segments) {
            Some(id) => FinderResult::new().with_matched(id, Vec::<String>::new()),
            None => FinderResult::new().with_not_matched(ResultKey::Spec(name.to_string()), Vec::<String>::new()),
        }
    }

    /// Every type reachable from the top-level namespace
    pub fn all_types(&self) -> FinderResult {
        let mut result = FinderResult::new();
        let mut pending: Vec<Option<ClassId>> = vec![None];
        while let Some(namespace) = pending.pop() {
            for (_, id) in self.reflect.namespace_members(namespace) {
                if !result.matched().contains_key(&ResultKey::from(id)) {
                    result.append_matched(ResultKey::from(id), BTreeSet::new());
                    pending.push(Some(id));
                }
            }
        }
        result
    }

    /// Resolve a name pattern by walking the namespace tree
    pub fn find_by_pattern(&self, pattern: &Regex) -> Result<FinderResult> {
        let source = pattern.as_str();
        if source.is_empty() {
            return Ok(FinderResult::new());
        }

        let segments: Vec<&str> = source.split("::").collect();
        let last = segments.len() - 1;
        // None stands for the top-level namespace
        let mut containers: Vec<Option<ClassId>> = vec![None];
        let mut walked = false;

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                continue;
            }
            let segment_re = compile_segment(segment, index == 0, index == last)?;
            let mut next = Vec::new();
            for container in &containers {
                for (name, id) in self.reflect.namespace_members(*container) {
                    if segment_re.is_match(&name) && !next.contains(&Some(id)) {
                        next.push(Some(id));
                    }
                }
            }
            containers = next;
            walked = true;
            if containers.is_empty() {
                break;
            }
        }

        let mut result = FinderResult::new();
        if walked {
            for id in containers.into_iter().flatten() {
                let path_matches = self
                    .reflect
                    .class_path(id)
                    .map(|path| pattern.is_match(&path))
                    .unwrap_or(false);
                if path_matches {
                    result.append_matched(ResultKey::from(id), BTreeSet::new());
                }
            }
        }
        if result.is_empty() {
            result.append_not_matched(ResultKey::Spec(format!("/{}/", source)), BTreeSet::new());
        }
        Ok(result)
    }
}

fn compile_segment(segment: &str, first: bool, last: bool) -> Result<Regex> {
    let left = if first { "" } else { r"\A" };
    let right = if last { "" } else { r"\z" };
    Regex::new(&format!("{}(?:{}){}", left, segment, right))
        .map_err(|e| WeftError::invalid(format!("bad type pattern segment {:?}: {}", segment, e)))
}
