//! Pointcuts: resolved sets of join points

use crate::aspects::join_point::JoinPoint;
use crate::error::{Result, WeftError};
use crate::finders::method_finder::{self, MethodOptions};
use crate::finders::{FinderResult, MethodFinder, NameMatcher, PointcutFinder, ResultKey, TypeFinder};
use crate::options::{OptionValue, OptionsSpecification, Spec, POINTCUT_FINDER_OPTIONS, POINTCUT_OPTIONS};
use crate::options::{
    ATTRIBUTES, ATTRIBUTE_OPTIONS, EXCLUDE_ATTRIBUTES, EXCLUDE_METHODS, JOIN_POINTS, METHODS, METHOD_OPTIONS,
    NAMED_POINTCUTS, POINTCUTS,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Sub};
use std::sync::Arc;
use weft_object::{Reflect, Subject};

/// A resolved selection of join points
///
/// Built once from a specification against the current object model.
/// Methods defined after resolution are not picked up.
#[derive(Debug, Clone, Default)]
pub struct Pointcut {
    specification: String,
    candidate_types: FinderResult,
    candidate_types_excluded: FinderResult,
    candidate_objects: FinderResult,
    join_points_matched: BTreeSet<JoinPoint>,
    join_points_not_matched: BTreeSet<JoinPoint>,
}

impl Pointcut {
    /// Resolve a pointcut specification
    ///
    /// Options: type selectors, `objects`, `join_points`, `methods`,
    /// `method_options`, `attributes`, `attribute_options`, `pointcuts`,
    /// `named_pointcuts` and `exclude_` variants. Methods default to all
    /// when neither methods nor attributes are given.
    pub fn new(reflect: &dyn Reflect, spec: &Spec) -> Result<Self> {
        let options = OptionsSpecification::parse(&POINTCUT_OPTIONS, spec)?;
        Self::from_options(reflect, &options)
    }

    pub(crate) fn from_options(reflect: &dyn Reflect, options: &OptionsSpecification) -> Result<Self> {
        let method_options = MethodOptions::parse(options.get(METHOD_OPTIONS))?;
        let attribute_mode = AttributeMode::parse(options.get(ATTRIBUTE_OPTIONS))?;

        let mut methods = NameMatcher::from_values(options.get(METHODS), METHODS)?;
        let attributes = NameMatcher::from_values(options.get(ATTRIBUTES), ATTRIBUTES)?;
        if attributes.iter().any(NameMatcher::is_all) {
            return Err(WeftError::invalid("all is not supported for attributes"));
        }
        let mut excludes = NameMatcher::from_values(options.get(EXCLUDE_METHODS), EXCLUDE_METHODS)?;
        let excluded_attributes = NameMatcher::from_values(options.get(EXCLUDE_ATTRIBUTES), EXCLUDE_ATTRIBUTES)?;

        methods.extend(attribute_mode.method_matchers(&attributes)?);
        excludes.extend(attribute_mode.method_matchers(&excluded_attributes)?);
        if methods.is_empty() && attributes.is_empty() {
            methods.push(NameMatcher::All);
        }

        let type_finder = TypeFinder::new(reflect);
        let mut pointcut = Pointcut {
            specification: options.to_string(),
            candidate_types: type_finder.find_selected(options, "")?,
            candidate_types_excluded: type_finder.find_selected(options, "exclude_")?,
            ..Pointcut::default()
        };
        for object in method_finder::objects(options)? {
            pointcut
                .candidate_objects
                .append_matched(ResultKey::from(object), BTreeSet::new());
        }

        let types = pointcut
            .candidate_types
            .without_keys(&pointcut.candidate_types_excluded)
            .matched_subjects();
        let objects = pointcut.candidate_objects.matched_subjects();
        let finder = MethodFinder::new(reflect);

        if method_options.instance {
            let found = finder.find_methods(&types, &methods, &excludes, &method_options.instance_side());
            pointcut.add_join_points(&found, true);
        }
        if method_options.has_class_side() {
            let found = finder.find_methods(&types, &methods, &excludes, &method_options.class_side());
            pointcut.add_join_points(&found, false);
        }
        let found = finder.find_methods(&objects, &methods, &excludes, &method_options);
        pointcut.add_join_points(&found, true);

        for join_point in join_point_values(options.get(JOIN_POINTS))? {
            if join_point.exists(reflect) {
                pointcut.join_points_matched.insert(join_point);
            } else {
                pointcut.join_points_not_matched.insert(join_point);
            }
        }

        let mut included = pointcut_values(options.get(POINTCUTS))?;
        included.extend(named_pointcuts(reflect, options.get(NAMED_POINTCUTS))?);
        for other in included {
            pointcut.join_points_matched.extend(other.join_points_matched.iter().cloned());
            pointcut
                .join_points_not_matched
                .extend(other.join_points_not_matched.iter().cloned());
        }

        let exclusions = Exclusions::from_options(reflect, options, &pointcut.candidate_types_excluded, excludes)?;
        pointcut.join_points_matched.retain(|jp| !exclusions.excludes(jp));

        options.sink().debug(format!(
            "pointcut: {} join points matched, {} not matched",
            pointcut.join_points_matched.len(),
            pointcut.join_points_not_matched.len()
        ));
        Ok(pointcut)
    }

    fn add_join_points(&mut self, found: &FinderResult, instance_method: bool) {
        let make = |subject: Subject, name: &String| match (subject, instance_method) {
            (Subject::Class(class), false) => JoinPoint::class_method(class, name.clone()),
            _ => JoinPoint::new(subject, name.clone()),
        };
        for (key, names) in found.matched() {
            if let Some(subject) = key.subject() {
                self.join_points_matched.extend(names.iter().map(|n| make(subject, n)));
            }
        }
        for (key, names) in found.not_matched() {
            if let Some(subject) = key.subject() {
                self.join_points_not_matched.extend(names.iter().map(|n| make(subject, n)));
            }
        }
    }

    /// Join points the pointcut selects
    pub fn join_points_matched(&self) -> &BTreeSet<JoinPoint> {
        &self.join_points_matched
    }

    /// Requested join points that do not exist
    pub fn join_points_not_matched(&self) -> &BTreeSet<JoinPoint> {
        &self.join_points_not_matched
    }

    /// Types named by the type selectors
    pub fn candidate_types(&self) -> &FinderResult {
        &self.candidate_types
    }

    /// Types named by the `exclude_` type selectors
    pub fn candidate_types_excluded(&self) -> &FinderResult {
        &self.candidate_types_excluded
    }

    /// Objects selected after exclusions
    pub fn candidate_objects(&self) -> &FinderResult {
        &self.candidate_objects
    }

    /// Rendering of the options the pointcut was built from
    pub fn specification(&self) -> &str {
        &self.specification
    }

    /// Whether nothing was matched and nothing was reported missing
    pub fn is_empty(&self) -> bool {
        self.join_points_matched.is_empty() && self.join_points_not_matched.is_empty()
    }

    /// Union of two pointcuts
    pub fn or(&self, other: &Pointcut) -> Pointcut {
        Pointcut {
            specification: format!("({}) or ({})", self.specification, other.specification),
            candidate_types: self.candidate_types.union(&other.candidate_types),
            candidate_types_excluded: self.candidate_types_excluded.union(&other.candidate_types_excluded),
            candidate_objects: self.candidate_objects.union(&other.candidate_objects),
            join_points_matched: &self.join_points_matched | &other.join_points_matched,
            join_points_not_matched: &self.join_points_not_matched | &other.join_points_not_matched,
        }
    }

    /// Intersection of two pointcuts
    pub fn and(&self, other: &Pointcut) -> Pointcut {
        Pointcut {
            specification: format!("({}) and ({})", self.specification, other.specification),
            candidate_types: self.candidate_types.intersection(&other.candidate_types),
            candidate_types_excluded: self
                .candidate_types_excluded
                .intersection(&other.candidate_types_excluded),
            candidate_objects: self.candidate_objects.intersection(&other.candidate_objects),
            join_points_matched: &self.join_points_matched & &other.join_points_matched,
            join_points_not_matched: &self.join_points_not_matched & &other.join_points_not_matched,
        }
    }

    /// Join points of `self` that `other` does not select
    pub fn minus(&self, other: &Pointcut) -> Pointcut {
        Pointcut {
            specification: format!("({}) minus ({})", self.specification, other.specification),
            candidate_types: self.candidate_types.clone(),
            candidate_types_excluded: self.candidate_types_excluded.clone(),
            candidate_objects: self.candidate_objects.clone(),
            join_points_matched: &self.join_points_matched - &other.join_points_matched,
            join_points_not_matched: &self.join_points_not_matched - &other.join_points_not_matched,
        }
    }

    /// Render join points with type paths resolved
    pub fn describe(&self, reflect: &dyn Reflect) -> String {
        let render = |set: &BTreeSet<JoinPoint>| set.iter().map(|jp| jp.describe(reflect)).collect::<Vec<_>>().join(", ");
        format!(
            "Pointcut {{ matched: [{}], not_matched: [{}] }}",
            render(&self.join_points_matched),
            render(&self.join_points_not_matched)
        )
    }
}

impl PartialEq for Pointcut {
    fn eq(&self, other: &Self) -> bool {
        self.join_points_matched == other.join_points_matched
            && self.join_points_not_matched == other.join_points_not_matched
    }
}

impl Eq for Pointcut {}

impl BitOr for &Pointcut {
    type Output = Pointcut;

    fn bitor(self, other: &Pointcut) -> Pointcut {
        self.or(other)
    }
}

impl BitAnd for &Pointcut {
    type Output = Pointcut;

    fn bitand(self, other: &Pointcut) -> Pointcut {
        self.and(other)
    }
}

impl Sub for &Pointcut {
    type Output = Pointcut;

    fn sub(self, other: &Pointcut) -> Pointcut {
        self.minus(other)
    }
}

impl fmt::Display for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointcut {{ matched: [")?;
        for (i, jp) in self.join_points_matched.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", jp)?;
        }
        write!(f, "], not_matched: [")?;
        for (i, jp) in self.join_points_not_matched.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", jp)?;
        }
        write!(f, "] }}")
    }
}

/// Which accessor methods an attribute expands to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeMode {
    Readers,
    Writers,
    Both,
}

impl AttributeMode {
    fn parse(values: &[OptionValue]) -> Result<Self> {
        let (mut read, mut write) = (false, false);
        for value in values {
            match value.as_name().map(str::trim) {
                Some("readers") | Some("reader") => read = true,
                Some("writers") | Some("writer") => write = true,
                _ => {
                    return Err(WeftError::invalid(format!(
                        "attribute options must be readers or writers, got {}",
                        value
                    )))
                }
            }
        }
        Ok(match (read, write) {
            (true, false) => AttributeMode::Readers,
            (false, true) => AttributeMode::Writers,
            _ => AttributeMode::Both,
        })
    }

    /// Reader `name` and writer `name=` matchers for attribute selectors
    fn method_matchers(self, attributes: &[NameMatcher]) -> Result<Vec<NameMatcher>> {
        let mut matchers = Vec::new();
        for attribute in attributes {
            let (reader, writer) = match attribute {
                NameMatcher::Exact(name) => {
                    let base = name.trim_start_matches(['@', ':']).trim_end_matches('=');
                    (NameMatcher::Exact(base.to_string()), NameMatcher::Exact(format!("{}=", base)))
                }
                NameMatcher::Pattern(re) => {
                    let source = re.as_str().trim_end_matches('$').trim_end_matches('=');
                    let (anchor, rest) = match source.strip_prefix('^') {
                        Some(rest) => ("^", rest),
                        None => ("", source),
                    };
                    let rest = rest.trim_start_matches(['@', ':']);
                    let reader = compile(&format!(r"{}{}.*\b$", anchor, rest))?;
                    let writer = compile(&format!("{}{}=$", anchor, rest))?;
                    (NameMatcher::Pattern(reader), NameMatcher::Pattern(writer))
                }
                NameMatcher::All => continue,
            };
            if self != AttributeMode::Writers {
                matchers.push(reader);
            }
            if self != AttributeMode::Readers {
                matchers.push(writer);
            }
        }
        Ok(matchers)
    }
}

fn compile(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| WeftError::invalid(format!("bad attribute pattern /{}/: {}", source, e)))
}

/// Everything removed from a pointcut after resolution
struct Exclusions {
    pointcuts: Vec<Arc<Pointcut>>,
    join_points: Vec<JoinPoint>,
    subjects: BTreeSet<Subject>,
    methods: Vec<NameMatcher>,
}

impl Exclusions {
    fn from_options(
        reflect: &dyn Reflect,
        options: &OptionsSpecification,
        types_excluded: &FinderResult,
        methods: Vec<NameMatcher>,
    ) -> Result<Self> {
        let mut pointcuts = pointcut_values(options.get("exclude_pointcuts"))?;
        pointcuts.extend(named_pointcuts(reflect, options.get("exclude_named_pointcuts"))?);

        let mut subjects: BTreeSet<Subject> = types_excluded.matched_subjects().into_iter().collect();
        for value in options.get("exclude_objects") {
            if let Some(subject) = value.as_subject() {
                subjects.insert(subject);
            }
        }
        Ok(Self {
            pointcuts,
            join_points: join_point_values(options.get("exclude_join_points"))?,
            subjects,
            methods,
        })
    }

    fn excludes(&self, jp: &JoinPoint) -> bool {
        self.subjects.contains(&jp.target())
            || self.join_points.contains(jp)
            || self.methods.iter().any(|m| m.matches(jp.method_name()))
            || self.pointcuts.iter().any(|pc| pc.join_points_matched.contains(jp))
    }
}

fn join_point_values(values: &[OptionValue]) -> Result<Vec<JoinPoint>> {
    values
        .iter()
        .map(|value| match value {
            OptionValue::JoinPoint(jp) => Ok(jp.clone()),
            other => Err(WeftError::invalid(format!("expected a join point, got {}", other))),
        })
        .collect()
}

pub(crate) fn pointcut_values(values: &[OptionValue]) -> Result<Vec<Arc<Pointcut>>> {
    values
        .iter()
        .map(|value| match value {
            OptionValue::Pointcut(pc) => Ok(Arc::clone(pc)),
            other => Err(WeftError::invalid(format!("expected a pointcut, got {}", other))),
        })
        .collect()
}

/// Resolve nested pointcut-finder specifications
pub(crate) fn named_pointcuts(reflect: &dyn Reflect, values: &[OptionValue]) -> Result<Vec<Arc<Pointcut>>> {
    let mut found = Vec::new();
    for value in values {
        let OptionValue::Spec(spec) = value else {
            return Err(WeftError::invalid(format!(
                "named pointcuts must be given as a pointcut lookup, got {}",
                value
            )));
        };
        let options = OptionsSpecification::parse(&POINTCUT_FINDER_OPTIONS, spec)?;
        found.extend(PointcutFinder::new(reflect).find_with(&options)?.found_pointcuts());
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_object::{ClassId, Runtime, Value, Visibility};

    fn shop() -> (Runtime, ClassId) {
        let rt = Runtime::new();
        let cart = rt.define_class("Cart", None).unwrap();
        rt.define_method(cart, "total", Visibility::Public, |_, _| Ok(Value::Int(0))).unwrap();
        rt.define_method(cart, "add", Visibility::Public, |_, _| Ok(Value::Null)).unwrap();
        rt.define_attribute(cart, "owner", true, true).unwrap();
        (rt, cart)
    }

    fn names(pc: &Pointcut) -> Vec<String> {
        pc.join_points_matched().iter().map(|jp| jp.method_name().to_string()).collect()
    }

    #[test]
    fn test_attribute_readers_and_writers() {
        let (rt, cart) = shop();
        let pc = Pointcut::new(&rt, &Spec::new().with("type", cart).with("attribute", "owner")).unwrap();
        assert_eq!(names(&pc), vec!["owner", "owner="]);

        let pc = Pointcut::new(
            &rt,
            &Spec::new()
                .with("type", cart)
                .with("attributes", "@owner")
                .with("attribute_options", "writer"),
        )
        .unwrap();
        assert_eq!(names(&pc), vec!["owner="]);

        let pc = Pointcut::new(
            &rt,
            &Spec::new()
                .with("type", cart)
                .with("attributes", Regex::new("^own").unwrap())
                .with("attribute_options", "readers"),
        )
        .unwrap();
        assert_eq!(names(&pc), vec!["owner"]);
    }

    #[test]
    fn test_attribute_all_is_rejected() {
        let (rt, cart) = shop();
        let err = Pointcut::new(&rt, &Spec::new().with("type", cart).with("attributes", OptionValue::All)).unwrap_err();
        assert!(err.is_invalid_specification());
    }

    #[test]
    fn test_missing_explicit_join_point_is_not_matched() {
        let (rt, cart) = shop();
        let pc = Pointcut::new(
            &rt,
            &Spec::new().with_all("join_points", [JoinPoint::new(cart, "total"), JoinPoint::new(cart, "nope")]),
        )
        .unwrap();
        assert_eq!(names(&pc), vec!["total"]);
        assert!(pc.join_points_not_matched().contains(&JoinPoint::new(cart, "nope")));
        assert!(!pc.is_empty());
    }

    #[test]
    fn test_display_lists_join_points() {
        let (rt, cart) = shop();
        let pc = Pointcut::new(&rt, &Spec::new().with("type", cart).with("method", "total")).unwrap();
        assert_eq!(pc.to_string(), format!("Pointcut {{ matched: [{}#total], not_matched: [] }}", cart));
        assert_eq!(pc.describe(&rt), "Pointcut { matched: [Cart#total], not_matched: [] }");
    }
}
