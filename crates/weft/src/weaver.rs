//! Weaver: a runtime paired with weaving settings

use crate::aspects::{Advice, AdviceKind, Aspect, Pointcut};
use crate::config::WeftConfig;
use crate::error::Result;
use crate::finders::{FinderResult, MethodFinder, PointcutFinder, PointcutFinderResult, TypeFinder};
use crate::options::Spec;
use std::path::Path;
use std::sync::Arc;
use weft_object::Runtime;

/// Entry point bundling a runtime with a `WeftConfig`
///
/// ```ignore
/// let weaver = Weaver::from_config_file(runtime, "weft.toml")?;
/// let aspect = weaver.advise(AdviceKind::Before, &spec, advice)?;
/// ```
#[derive(Debug, Clone)]
pub struct Weaver {
    runtime: Arc<Runtime>,
    config: WeftConfig,
}

impl Weaver {
    /// Weaver with default settings
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            config: WeftConfig::default(),
        }
    }

    /// Weaver with explicit settings
    pub fn with_config(runtime: Arc<Runtime>, config: WeftConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { runtime, config })
    }

    /// Weaver with settings read from a TOML file
    pub fn from_config_file<P: AsRef<Path>>(runtime: Arc<Runtime>, path: P) -> Result<Self> {
        let config = WeftConfig::from_file(path)?;
        Ok(Self { runtime, config })
    }

    /// Runtime advice is woven into
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Weaving settings
    pub fn config(&self) -> &WeftConfig {
        &self.config
    }

    /// Resolve types
    pub fn types(&self, spec: &Spec) -> Result<FinderResult> {
        TypeFinder::new(self.runtime.as_ref()).find(spec)
    }

    /// Resolve methods
    pub fn methods(&self, spec: &Spec) -> Result<FinderResult> {
        MethodFinder::new(self.runtime.as_ref()).find(spec)
    }

    /// Look up pointcuts stored on types
    pub fn named_pointcuts(&self, spec: &Spec) -> Result<PointcutFinderResult> {
        PointcutFinder::new(self.runtime.as_ref()).find(spec)
    }

    /// Resolve a pointcut
    pub fn pointcut(&self, spec: &Spec) -> Result<Pointcut> {
        Pointcut::new(self.runtime.as_ref(), spec)
    }

    /// Create an aspect with one advice kind
    pub fn advise(&self, kind: AdviceKind, spec: &Spec, advice: Advice) -> Result<Aspect> {
        self.advise_all(&[kind], spec, advice)
    }

    /// Create an aspect with several advice kinds sharing one body
    pub fn advise_all(&self, kinds: &[AdviceKind], spec: &Spec, advice: Advice) -> Result<Aspect> {
        Aspect::with_config(Arc::clone(&self.runtime), kinds, spec, advice, &self.config.weaving)
    }
}
