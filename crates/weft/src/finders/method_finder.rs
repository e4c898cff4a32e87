//! Method finder: resolves method names on types and objects

use crate::error::{Result, WeftError};
use crate::finders::result::{FinderResult, ResultKey};
use crate::finders::type_finder::TypeFinder;
use crate::finders::NameMatcher;
use crate::options::{OptionValue, OptionsSpecification, Spec};
use crate::options::{EXCLUDE_METHODS, METHODS, METHOD_FINDER_OPTIONS, METHOD_OPTIONS, OBJECTS};
use std::collections::BTreeSet;
use weft_object::{MethodView, Reflect, Subject, ViewScope, Visibility};

/// Recognized method option values and their synonyms
const RECOGNIZED_METHOD_OPTIONS: &[(&str, &[&str])] = &[
    ("all", &["all_methods"]),
    ("public", &["public_methods"]),
    ("private", &["private_methods"]),
    ("protected", &["protected_methods"]),
    ("instance", &["instance_methods"]),
    ("class", &["class_methods"]),
    ("singleton", &["singleton_methods"]),
    (
        "exclude_ancestor_methods",
        &[
            "exclude_ancestors",
            "exclude_ancestors_methods",
            "suppress_ancestors",
            "suppress_ancestor_methods",
            "suppress_ancestors_methods",
        ],
    ),
    ("include_system_methods", &["include_all_system_methods"]),
];

/// Methods hidden unless `include_system_methods` is given
const SYSTEM_METHOD_PREFIX: &str = "__";

/// Parsed `method_options`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodOptions {
    /// List public methods
    pub public: bool,
    /// List protected methods
    pub protected: bool,
    /// List private methods
    pub private: bool,
    /// Instance-side methods
    pub instance: bool,
    /// Class-side methods, inherited included
    pub class: bool,
    /// Methods defined directly on the type's class side or on the object
    pub singleton: bool,
    /// Drop names any ancestor also reports
    pub exclude_ancestor_methods: bool,
    /// Keep `__`-prefixed names
    pub include_system_methods: bool,
}

impl MethodOptions {
    /// Parse option values, canonicalizing synonyms
    ///
    /// `instance` is implied unless `class` or `singleton` is given.
    pub fn parse(values: &[OptionValue]) -> Result<Self> {
        let mut options = MethodOptions::default();
        for value in values {
            let name = match value {
                OptionValue::Name(name) => name.trim(),
                OptionValue::All => "all",
                other => return Err(WeftError::invalid(format!("unrecognized method option {}", other))),
            };
            let canonical = RECOGNIZED_METHOD_OPTIONS
                .iter()
                .find(|(canonical, synonyms)| *canonical == name || synonyms.contains(&name))
                .map(|(canonical, _)| *canonical)
                .ok_or_else(|| WeftError::invalid(format!("unrecognized method option {:?}", name)))?;
            match canonical {
                "public" => options.public = true,
                "protected" => options.protected = true,
                "private" => options.private = true,
                "instance" => options.instance = true,
                "class" => options.class = true,
                "singleton" => options.singleton = true,
                "exclude_ancestor_methods" => options.exclude_ancestor_methods = true,
                "include_system_methods" => options.include_system_methods = true,
                _ => {}
            }
        }

        if options.singleton && (options.class || options.public || options.protected || options.private) {
            return Err(WeftError::invalid(
                "the singleton method option can't be combined with class, public, protected or private",
            ));
        }
        if !options.class && !options.singleton {
            options.instance = true;
        }
        Ok(options)
    }

    /// Same options restricted to the instance side
    pub fn instance_side(self) -> Self {
        Self {
            instance: true,
            class: false,
            singleton: false,
            ..self
        }
    }

    /// Same options restricted to the class and singleton sides
    pub fn class_side(self) -> Self {
        Self { instance: false, ..self }
    }

    /// Whether any class-side scope is selected
    pub fn has_class_side(&self) -> bool {
        self.class || self.singleton
    }

    fn visibilities(&self) -> Vec<Visibility> {
        let mut visibilities = Vec::new();
        if self.public {
            visibilities.push(Visibility::Public);
        }
        if self.protected {
            visibilities.push(Visibility::Protected);
        }
        if self.private {
            visibilities.push(Visibility::Private);
        }
        if visibilities.is_empty() {
            visibilities.push(Visibility::Public);
        }
        visibilities
    }

    /// Reflection views to list for a subject
    pub fn views(&self, subject: Subject) -> Vec<MethodView> {
        let mut views = Vec::new();
        for visibility in self.visibilities() {
            if self.instance {
                views.push(MethodView::new(visibility, ViewScope::Instance));
            }
            if self.class && subject.is_class() {
                views.push(MethodView::new(visibility, ViewScope::Class));
            }
        }
        if self.singleton {
            views.push(MethodView::new(Visibility::Public, ViewScope::Singleton));
            views.push(MethodView::new(Visibility::Protected, ViewScope::Singleton));
        }
        views
    }
}

/// Finds methods on types and objects
///
/// Options: any type selector, `objects`, `methods`, `exclude_methods` and
/// `method_options`. Matched values are method names.
pub struct MethodFinder<'a> {
    reflect: &'a dyn Reflect,
}

impl<'a> MethodFinder<'a> {
    /// Create a finder over a reflection surface
    pub fn new(reflect: &'a dyn Reflect) -> Self {
        Self { reflect }
    }

    /// Find methods matching a specification
    pub fn find(&self, spec: &Spec) -> Result<FinderResult> {
        let options = OptionsSpecification::parse(&METHOD_FINDER_OPTIONS, spec)?;
        self.find_with(&options)
    }

    pub(crate) fn find_with(&self, options: &OptionsSpecification) -> Result<FinderResult> {
        let method_options = MethodOptions::parse(options.get(METHOD_OPTIONS))?;
        let methods = NameMatcher::from_values(options.get(METHODS), "methods")?;
        let excludes = NameMatcher::from_values(options.get(EXCLUDE_METHODS), "exclude_methods")?;

        let mut subjects = Vec::new();
        if TypeFinder::types_given(options) {
            subjects.extend(TypeFinder::new(self.reflect).find_with(options)?.matched_subjects());
        }
        subjects.extend(objects(options)?);

        let result = self.find_methods(&subjects, &methods, &excludes, &method_options);
        options.sink().debug(format!(
            "method finder: {} of {} subjects matched",
            result.matched().len(),
            subjects.len()
        ));
        Ok(result)
    }

    /// Find methods on already resolved subjects
    pub(crate) fn find_methods(
        &self,
        subjects: &[Subject],
        methods: &[NameMatcher],
        excludes: &[NameMatcher],
        options: &MethodOptions,
    ) -> FinderResult {
        let found = self.find_all_by(subjects, methods, options);
        if excludes.is_empty() {
            return found;
        }
        let mut result = if excludes.iter().any(NameMatcher::is_all) {
            found.minus(&found.matched_only())
        } else {
            let excluded = self.find_all_by(subjects, excludes, options);
            found.minus(&excluded.matched_only())
        };
        // Subjects whose every match was excluded stay visible as not matched
        let requested: BTreeSet<String> = methods.iter().map(ToString::to_string).collect();
        for key in found.matched_keys() {
            if result.matched_names(key).is_none() {
                result.append_not_matched(key.clone(), requested.clone());
            }
        }
        result
    }

    fn find_all_by(&self, subjects: &[Subject], matchers: &[NameMatcher], options: &MethodOptions) -> FinderResult {
        let requested: BTreeSet<String> = matchers.iter().map(ToString::to_string).collect();
        let mut result = FinderResult::new();
        for subject in subjects {
            let found = self.find_in(*subject, matchers, options);
            if found.is_empty() {
                result.append_not_matched(ResultKey::from(*subject), requested.clone());
            } else {
                result.append_matched(ResultKey::from(*subject), found);
            }
        }
        result
    }

    fn find_in(&self, subject: Subject, matchers: &[NameMatcher], options: &MethodOptions) -> BTreeSet<String> {
        let views = options.views(subject);
        let listed: BTreeSet<String> = views
            .iter()
            .flat_map(|view| self.reflect.method_names(subject, *view))
            .collect();

        let mut found = BTreeSet::new();
        for matcher in matchers {
            let mut names: BTreeSet<String> = listed.iter().filter(|n| matcher.matches(n)).cloned().collect();
            if options.exclude_ancestor_methods {
                self.remove_ancestor_methods(subject, options, &mut names);
            }
            found.extend(names);
        }
        if !options.include_system_methods {
            found.retain(|name| !name.starts_with(SYSTEM_METHOD_PREFIX));
        }
        found
    }

    /// Drop names reported by any ancestor other than the subject's own type
    fn remove_ancestor_methods(&self, subject: Subject, options: &MethodOptions, names: &mut BTreeSet<String>) {
        let own_type = match subject {
            Subject::Class(id) => id,
            Subject::Object(id) => match self.reflect.class_of(id) {
                Some(class) => class,
                None => return,
            },
        };
        let views = options.views(Subject::Class(own_type));
        for ancestor in self.reflect.ancestors(own_type) {
            if ancestor == own_type {
                continue;
            }
            for view in &views {
                for name in self.reflect.method_names(Subject::Class(ancestor), *view) {
                    names.remove(&name);
                }
            }
        }
    }
}

/// Objects selected by `objects` minus `exclude_objects`
pub(crate) fn objects(options: &OptionsSpecification) -> Result<Vec<Subject>> {
    let excluded = object_values(options.get("exclude_objects"))?;
    Ok(object_values(options.get(OBJECTS))?
        .into_iter()
        .filter(|subject| !excluded.contains(subject))
        .collect())
}

fn object_values(values: &[OptionValue]) -> Result<Vec<Subject>> {
    let mut subjects = Vec::new();
    for value in values {
        match value {
            OptionValue::Object(id) => {
                let subject = Subject::Object(*id);
                if !subjects.contains(&subject) {
                    subjects.push(subject);
                }
            }
            other => return Err(WeftError::invalid(format!("objects must be object handles, got {}", other))),
        }
    }
    Ok(subjects)
}
