//! Aspects: advice attached to the join points of a pointcut

use crate::aspects::advice::{Advice, AdviceChain, AdviceKind, AdviceNode};
use crate::aspects::join_point::JoinPoint;
use crate::aspects::pointcut::Pointcut;
use crate::config::{NoMatchPolicy, WeavingConfig};
use crate::error::{Result, WeftError};
use crate::finders::TypeFinder;
use crate::options::{OptionsSpecification, Spec, ASPECT_OPTIONS};
use crate::options::{EXCEPTIONS, JOIN_POINTS, NAMED_POINTCUTS, OBJECTS, POINTCUTS};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use weft_object::{Interception, MethodKey, Runtime};

static NEXT_ASPECT_ID: AtomicU64 = AtomicU64::new(1);

/// Advice installed on every join point a pointcut matches
///
/// Created advising; `unadvise` removes exactly the chain links this aspect
/// installed and restores the original methods once a slot holds no advice.
pub struct Aspect {
    id: u64,
    kinds: Vec<AdviceKind>,
    advice: Advice,
    pointcut: Pointcut,
    exceptions: Vec<String>,
    runtime: Arc<Runtime>,
    noop: bool,
    installed: Mutex<Vec<MethodKey>>,
}

impl Aspect {
    /// Resolve `spec` and install one kind of advice with default weaving settings
    pub fn new(runtime: Arc<Runtime>, kind: AdviceKind, spec: &Spec, advice: Advice) -> Result<Self> {
        Self::with_config(runtime, &[kind], spec, advice, &WeavingConfig::default())
    }

    /// Resolve `spec` and install several kinds of advice sharing one body
    ///
    /// Allowed combinations: `before` with one of `after`, `after_returning`
    /// or `after_raising`. `around` stands alone.
    pub fn with_kinds(runtime: Arc<Runtime>, kinds: &[AdviceKind], spec: &Spec, advice: Advice) -> Result<Self> {
        Self::with_config(runtime, kinds, spec, advice, &WeavingConfig::default())
    }

    /// Resolve and install under explicit weaving settings
    pub fn with_config(
        runtime: Arc<Runtime>,
        kinds: &[AdviceKind],
        spec: &Spec,
        advice: Advice,
        config: &WeavingConfig,
    ) -> Result<Self> {
        let options = OptionsSpecification::parse(&ASPECT_OPTIONS, spec)?;
        let kinds = AdviceKind::sort_by_priority(kinds);
        validate(&kinds, &options)?;
        let exceptions = exception_kinds(&options)?;

        let pointcut = Pointcut::from_options(runtime.as_ref(), &options)?;
        let sink = options.sink();

        if pointcut.join_points_matched().is_empty() {
            let ignore = options.ignore_no_matching_join_points() || config.ignore_no_matching_join_points;
            if !ignore {
                match config.on_no_matching_join_points {
                    NoMatchPolicy::Error => {
                        return Err(WeftError::NoMatchingJoinPoints {
                            specification: options.to_string(),
                        })
                    }
                    NoMatchPolicy::Warn => {
                        sink.warn(format!("no join points were matched by {}", options));
                    }
                }
            }
        }

        let aspect = Aspect {
            id: NEXT_ASPECT_ID.fetch_add(1, Ordering::Relaxed),
            kinds,
            advice,
            pointcut,
            exceptions,
            runtime,
            noop: options.noop() || config.noop,
            installed: Mutex::new(Vec::new()),
        };
        if aspect.noop {
            sink.debug(format!("aspect {}: noop, nothing installed", aspect.id));
        } else {
            aspect.install()?;
        }
        Ok(aspect)
    }

    fn install(&self) -> Result<()> {
        let table = self.runtime.interceptions();
        let exceptions: Arc<[String]> = Arc::from(self.exceptions.clone());
        let guard = table.lock();

        let mut chains = Vec::new();
        for join_point in self.pointcut.join_points_matched() {
            let key = join_point.key();
            let chain = match table.get(&key) {
                Some(existing) => match existing.as_any().downcast_ref::<AdviceChain>() {
                    Some(chain) => chain.clone(),
                    None => {
                        return Err(WeftError::invalid(format!(
                            "{} is already intercepted by a foreign handler",
                            join_point.describe(self.runtime.as_ref())
                        )))
                    }
                },
                None => AdviceChain::new(join_point.clone()),
            };
            // Lowest priority first, so the highest ends up outermost
            let nodes = self
                .kinds
                .iter()
                .rev()
                .map(|kind| AdviceNode::new(*kind, self.advice.clone(), self.id, Arc::clone(&exceptions)));
            chains.push((key, chain.wrapped(nodes)));
        }

        let mut installed = self.installed.lock();
        for (key, chain) in chains {
            tracing::debug!(target: "weft", aspect = self.id, slot = %key, "installing advice");
            table.install(&guard, key.clone(), Arc::new(chain));
            installed.push(key);
        }
        Ok(())
    }

    /// Remove this aspect's advice; calling it again does nothing
    pub fn unadvise(&self) {
        let mut installed = self.installed.lock();
        if installed.is_empty() {
            return;
        }
        let table = self.runtime.interceptions();
        let guard = table.lock();
        for key in installed.drain(..) {
            let Some(existing) = table.get(&key) else {
                continue;
            };
            let Some(chain) = existing.as_any().downcast_ref::<AdviceChain>() else {
                continue;
            };
            let rest = chain.without_aspect(self.id);
            if rest.is_empty() {
                tracing::debug!(target: "weft", aspect = self.id, slot = %key, "restoring original method");
                table.remove(&guard, &key);
            } else {
                tracing::debug!(target: "weft", aspect = self.id, slot = %key, "removing advice");
                let rest: Arc<dyn Interception> = Arc::new(rest);
                table.install(&guard, key, rest);
            }
        }
    }

    /// Whether advice of this aspect is currently installed
    pub fn is_advising(&self) -> bool {
        !self.installed.lock().is_empty()
    }

    /// Identifier of this aspect's chain links
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Advice kinds, outermost first
    pub fn kinds(&self) -> &[AdviceKind] {
        &self.kinds
    }

    /// Advice body
    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    /// Resolved pointcut
    pub fn pointcut(&self) -> &Pointcut {
        &self.pointcut
    }

    /// Exception kinds `after_raising` advice handles; empty means all
    pub fn exceptions(&self) -> &[String] {
        &self.exceptions
    }

    /// Whether the aspect was created without installing anything
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Join points advised
    pub fn join_points_matched(&self) -> &BTreeSet<JoinPoint> {
        self.pointcut.join_points_matched()
    }

    /// Requested join points that do not exist
    pub fn join_points_not_matched(&self) -> &BTreeSet<JoinPoint> {
        self.pointcut.join_points_not_matched()
    }
}

impl PartialEq for Aspect {
    fn eq(&self, other: &Self) -> bool {
        self.kinds == other.kinds && self.pointcut == other.pointcut && self.advice.ptr_eq(&other.advice)
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aspect")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .field("pointcut", &self.pointcut.to_string())
            .field("noop", &self.noop)
            .finish()
    }
}

fn validate(kinds: &[AdviceKind], options: &OptionsSpecification) -> Result<()> {
    use AdviceKind::*;

    if kinds.is_empty() {
        return Err(WeftError::invalid("an advice kind is required"));
    }
    let has = |kind| kinds.contains(&kind);
    for other in [Before, After, AfterReturning, AfterRaising] {
        if has(Around) && has(other) {
            return Err(WeftError::invalid(format!("around can't be used with {}", other)));
        }
    }
    for other in [AfterReturning, AfterRaising] {
        if has(After) && has(other) {
            return Err(WeftError::invalid(format!("after can't be used with {}", other)));
        }
    }
    if has(AfterReturning) && has(AfterRaising) {
        return Err(WeftError::invalid("after_returning can't be used with after_raising"));
    }
    if options.given(EXCEPTIONS) && !has(AfterRaising) {
        return Err(WeftError::invalid("exceptions can only be given with after_raising"));
    }

    let pointcuts_given = options.given(POINTCUTS) || options.given(NAMED_POINTCUTS);
    let subjects_given = TypeFinder::types_given(options) || options.given(OBJECTS);
    if pointcuts_given && subjects_given {
        return Err(WeftError::invalid(
            "pointcuts or named pointcuts can't be combined with types or objects",
        ));
    }
    if !pointcuts_given && !subjects_given && !options.given(JOIN_POINTS) {
        return Err(WeftError::invalid(
            "one of pointcuts, named_pointcuts, join_points, types or objects is required",
        ));
    }
    Ok(())
}

fn exception_kinds(options: &OptionsSpecification) -> Result<Vec<String>> {
    options
        .get(EXCEPTIONS)
        .iter()
        .map(|value| {
            value
                .as_name()
                .map(|name| name.trim().to_string())
                .ok_or_else(|| WeftError::invalid(format!("exceptions must be exception kind names, got {}", value)))
        })
        .collect()
}
