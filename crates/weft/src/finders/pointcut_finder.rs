//! Pointcut finder: looks up pointcuts stored in named slots of types

use crate::aspects::pointcut::Pointcut;
use crate::error::{Result, WeftError};
use crate::finders::result::{FinderResult, ResultKey};
use crate::finders::type_finder::TypeFinder;
use crate::finders::NameMatcher;
use crate::options::{OptionsSpecification, Spec};
use crate::options::{CLASS_VARIABLES_MATCHING, CONSTANTS_MATCHING, MATCHING, POINTCUT_FINDER_OPTIONS};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use weft_object::{ClassId, NamedSlot, NamedValue, Reflect};

const CLASS_VARIABLE_PREFIX: &str = "@@";

/// Pointcuts found per type
///
/// `result()` carries the slot names per type (class variables prefixed with
/// `@@`) and the unresolved type expressions.
#[derive(Debug, Clone, Default)]
pub struct PointcutFinderResult {
    result: FinderResult,
    pointcuts: BTreeMap<ClassId, Vec<(String, Arc<Pointcut>)>>,
}

impl PointcutFinderResult {
    /// Slot names per type, and what did not match
    pub fn result(&self) -> &FinderResult {
        &self.result
    }

    /// Pointcuts found on one type, by slot name
    pub fn pointcuts_of(&self, class: ClassId) -> &[(String, Arc<Pointcut>)] {
        self.pointcuts.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every pointcut found, each once
    pub fn found_pointcuts(&self) -> Vec<Arc<Pointcut>> {
        let mut found: Vec<Arc<Pointcut>> = Vec::new();
        for (_, pointcut) in self.pointcuts.values().flatten() {
            if !found.iter().any(|p| Arc::ptr_eq(p, pointcut)) {
                found.push(Arc::clone(pointcut));
            }
        }
        found
    }

    /// Whether no pointcut was found
    pub fn is_empty(&self) -> bool {
        self.pointcuts.is_empty()
    }

    fn record(&mut self, class: ClassId, slot_name: String, pointcut: Arc<Pointcut>) {
        let entry = self.pointcuts.entry(class).or_default();
        if entry.iter().any(|(name, _)| *name == slot_name) {
            return;
        }
        self.result
            .append_matched(ResultKey::from(class), BTreeSet::from([slot_name.clone()]));
        entry.push((slot_name, pointcut));
    }
}

/// Finds pointcuts held in constants and class variables
///
/// Options: any type selector (required), plus `matching` for both slot
/// kinds, `constants_matching` and `class_variables_matching`. Without name
/// options every pointcut on the matched types is returned. Slot values that
/// are not pointcuts are ignored.
pub struct PointcutFinder<'a> {
    reflect: &'a dyn Reflect,
}

impl<'a> PointcutFinder<'a> {
    /// Create a finder over a reflection surface
    pub fn new(reflect: &'a dyn Reflect) -> Self {
        Self { reflect }
    }

    /// Find pointcuts matching a specification
    pub fn find(&self, spec: &Spec) -> Result<PointcutFinderResult> {
        let options = OptionsSpecification::parse(&POINTCUT_FINDER_OPTIONS, spec)?;
        self.find_with(&options)
    }

    pub(crate) fn find_with(&self, options: &OptionsSpecification) -> Result<PointcutFinderResult> {
        if !TypeFinder::types_given(options) {
            return Err(WeftError::invalid("pointcut lookup needs at least one type option"));
        }
        let mut found = PointcutFinderResult::default();
        if options.noop() {
            return Ok(found);
        }

        let types = TypeFinder::new(self.reflect).find_with(options)?;
        if types.is_empty() {
            found.result = types;
            return Ok(found);
        }
        let classes: Vec<ClassId> = types.matched_subjects().iter().filter_map(|s| s.as_class()).collect();

        let both = NameMatcher::from_values(options.get(MATCHING), MATCHING)?;
        let constants = NameMatcher::from_values(options.get(CONSTANTS_MATCHING), CONSTANTS_MATCHING)?;
        let class_variables = NameMatcher::from_values(options.get(CLASS_VARIABLES_MATCHING), CLASS_VARIABLES_MATCHING)?;

        if both.is_empty() && constants.is_empty() && class_variables.is_empty() {
            let all = [NameMatcher::All];
            self.find_in_slots(&classes, NamedSlot::Constant, &all, &mut found);
            self.find_in_slots(&classes, NamedSlot::ClassVariable, &all, &mut found);
        } else {
            self.find_in_slots(&classes, NamedSlot::Constant, &both, &mut found);
            self.find_in_slots(&classes, NamedSlot::ClassVariable, &both, &mut found);
            self.find_in_slots(&classes, NamedSlot::Constant, &constants, &mut found);
            self.find_in_slots(&classes, NamedSlot::ClassVariable, &class_variables, &mut found);
        }

        options.sink().debug(format!(
            "pointcut finder: {} pointcuts on {} types",
            found.found_pointcuts().len(),
            found.pointcuts.len()
        ));
        Ok(found)
    }

    fn find_in_slots(
        &self,
        classes: &[ClassId],
        slot: NamedSlot,
        matchers: &[NameMatcher],
        found: &mut PointcutFinderResult,
    ) {
        if matchers.is_empty() {
            return;
        }
        for class in classes {
            for (name, value) in self.reflect.named_values(*class, slot) {
                if !matchers.iter().any(|m| slot_name_matches(m, slot, &name)) {
                    continue;
                }
                if let Some(pointcut) = as_pointcut(&value) {
                    let slot_name = match slot {
                        NamedSlot::Constant => name,
                        NamedSlot::ClassVariable => format!("{}{}", CLASS_VARIABLE_PREFIX, name),
                    };
                    found.record(*class, slot_name, pointcut);
                }
            }
        }
    }
}

/// Class variable names match with or without their `@@` prefix
fn slot_name_matches(matcher: &NameMatcher, slot: NamedSlot, name: &str) -> bool {
    match (slot, matcher) {
        (NamedSlot::Constant, _) => matcher.matches(name),
        (NamedSlot::ClassVariable, NameMatcher::Exact(exact)) => exact.trim_start_matches(CLASS_VARIABLE_PREFIX) == name,
        (NamedSlot::ClassVariable, _) => {
            matcher.matches(name) || matcher.matches(&format!("{}{}", CLASS_VARIABLE_PREFIX, name))
        }
    }
}

fn as_pointcut(value: &NamedValue) -> Option<Arc<Pointcut>> {
    if let Ok(pointcut) = Arc::clone(value).downcast::<Pointcut>() {
        return Some(pointcut);
    }
    value.downcast_ref::<Arc<Pointcut>>().cloned()
}
