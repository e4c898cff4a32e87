//! Weft
//!
//! Run-time aspect weaving over a live object model:
//! - Type, method and pointcut finders with set-algebra results
//! - Pointcuts: resolved, composable sets of join points
//! - Before, after, after-returning, after-raising and around advice
//! - Aspects that install advice chains and splice them out again
//!
//! ```ignore
//! let spec = Spec::new().with("type", "Shop::Cart").with("method", "total");
//! let aspect = create_aspect(&runtime, AdviceKind::Before, &spec, Advice::new(|ctx| {
//!     tracing::info!("calling {}", ctx.join_point());
//!     Ok(Value::Null)
//! }))?;
//! aspect.unadvise();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod aspects;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod finders;
pub mod options;
pub mod weaver;

pub use aspects::{Advice, AdviceContext, AdviceKind, Aspect, JoinPoint, Pointcut};
pub use config::{ConfigError, NoMatchPolicy, WeavingConfig, WeftConfig};
pub use diagnostics::{Diagnostic, DiagnosticSink, Level};
pub use error::{Result, WeftError};
pub use finders::{FinderResult, MethodFinder, MethodOptions, PointcutFinder, PointcutFinderResult, ResultKey, TypeFinder};
pub use options::{OptionValue, OptionsSpecification, Spec};
pub use weaver::Weaver;

use std::sync::Arc;
use weft_object::{Reflect, Runtime};

/// Resolve the types a specification selects
pub fn resolve_types(reflect: &dyn Reflect, spec: &Spec) -> Result<FinderResult> {
    TypeFinder::new(reflect).find(spec)
}

/// Resolve the methods a specification selects
pub fn resolve_methods(reflect: &dyn Reflect, spec: &Spec) -> Result<FinderResult> {
    MethodFinder::new(reflect).find(spec)
}

/// Resolve a pointcut
pub fn make_pointcut(reflect: &dyn Reflect, spec: &Spec) -> Result<Pointcut> {
    Pointcut::new(reflect, spec)
}

/// Resolve `spec` and install advice on every matched join point
pub fn create_aspect(runtime: &Arc<Runtime>, kind: AdviceKind, spec: &Spec, advice: Advice) -> Result<Aspect> {
    Aspect::new(Arc::clone(runtime), kind, spec, advice)
}
