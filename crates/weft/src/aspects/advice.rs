//! Advice kinds, advice bodies and the chains installed on method slots
//!
//! Each advised slot holds one immutable `AdviceChain`. A chain lists its
//! nodes innermost first; a call enters at the outermost node and every node
//! decides when to run its advice relative to the rest of the chain. The
//! innermost node continues into the original method through
//! `Invocation::proceed`.
//!
//! | Kind              | Runs advice                                   |
//! |-------------------|-----------------------------------------------|
//! | `before`          | before the rest of the chain                  |
//! | `after_returning` | after a normal return, may replace the value  |
//! | `after_raising`   | after a matching raise, then re-raises        |
//! | `after`           | after either outcome                          |
//! | `around`          | instead of the rest, which it may `proceed` to |

use crate::aspects::join_point::JoinPoint;
use crate::error::WeftError;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use weft_object::{CallResult, Interception, Invocation, Raised, Runtime, Value};

/// When advice runs relative to the advised method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    /// Wraps the call and decides whether to proceed
    Around,
    /// Runs before the call
    Before,
    /// Runs after the call, whatever its outcome
    After,
    /// Runs after a normal return
    AfterReturning,
    /// Runs after a raise
    AfterRaising,
}

/// Runs one node: its advice and the rest of the chain
type Strategy = fn(&AdviceNode, &mut AdviceContext<'_>) -> CallResult;

impl AdviceKind {
    /// Kinds from outermost to innermost when one aspect uses several
    pub const PRIORITY_ORDER: [AdviceKind; 5] = [
        AdviceKind::Around,
        AdviceKind::Before,
        AdviceKind::After,
        AdviceKind::AfterReturning,
        AdviceKind::AfterRaising,
    ];

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            AdviceKind::Around => "around",
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturning => "after_returning",
            AdviceKind::AfterRaising => "after_raising",
        }
    }

    /// Deduplicate and sort kinds by priority
    pub fn sort_by_priority(kinds: &[AdviceKind]) -> Vec<AdviceKind> {
        Self::PRIORITY_ORDER
            .iter()
            .copied()
            .filter(|kind| kinds.contains(kind))
            .collect()
    }

    fn strategy(self) -> Strategy {
        match self {
            AdviceKind::Around => run_around,
            AdviceKind::Before => run_before,
            AdviceKind::After => run_after,
            AdviceKind::AfterReturning => run_after_returning,
            AdviceKind::AfterRaising => run_after_raising,
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdviceKind {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "around" => Ok(AdviceKind::Around),
            "before" => Ok(AdviceKind::Before),
            "after" => Ok(AdviceKind::After),
            "after_returning" | "after_returning_from" => Ok(AdviceKind::AfterReturning),
            "after_raising" | "after_raising_within" => Ok(AdviceKind::AfterRaising),
            other => Err(WeftError::invalid(format!("unknown advice kind {:?}", other))),
        }
    }
}

/// Advice body
pub type AdviceFn = dyn Fn(&mut AdviceContext<'_>) -> CallResult + Send + Sync;

/// Shared handle to an advice body
///
/// Two handles are the same advice when they share the allocation.
#[derive(Clone)]
pub struct Advice(Arc<AdviceFn>);

impl Advice {
    /// Wrap a closure
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&mut AdviceContext<'_>) -> CallResult + Send + Sync + 'static,
    {
        Self(Arc::new(body))
    }

    /// Whether both handles refer to the same body
    pub fn ptr_eq(&self, other: &Advice) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn call(&self, ctx: &mut AdviceContext<'_>) -> CallResult {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice({:p})", Arc::as_ptr(&self.0))
    }
}

/// What advice sees of the advised call
pub struct AdviceContext<'a> {
    join_point: &'a JoinPoint,
    kind: AdviceKind,
    runtime: &'a Runtime,
    receiver: &'a Value,
    args: Vec<Value>,
    returned_value: Option<Value>,
    raised: Option<Raised>,
    next: &'a dyn Fn(&[Value]) -> CallResult,
}

impl<'a> AdviceContext<'a> {
    /// Advised join point
    pub fn join_point(&self) -> &JoinPoint {
        self.join_point
    }

    /// Kind of the running advice
    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    /// Runtime the call happens in
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// Object or type receiving the call
    pub fn receiver(&self) -> &'a Value {
        self.receiver
    }

    /// Call arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Replace the arguments passed on to the rest of the chain
    ///
    /// Only meaningful in `before` and `around` advice.
    pub fn set_args(&mut self, args: Vec<Value>) {
        self.args = args;
    }

    /// Value returned by the advised method, once known
    pub fn returned_value(&self) -> Option<&Value> {
        self.returned_value.as_ref()
    }

    /// Replace the value the call returns
    pub fn set_returned_value(&mut self, value: Value) {
        self.returned_value = Some(value);
    }

    /// Exception raised by the advised method, once known
    pub fn raised(&self) -> Option<&Raised> {
        self.raised.as_ref()
    }

    /// Replace the exception the call raises
    pub fn set_raised(&mut self, raised: Raised) {
        self.raised = Some(raised);
    }

    /// Run the rest of the chain with the current arguments
    pub fn proceed(&mut self) -> CallResult {
        let args = self.args.clone();
        self.proceed_with(&args)
    }

    /// Run the rest of the chain with other arguments
    ///
    /// Only `around` advice may proceed.
    pub fn proceed_with(&mut self, args: &[Value]) -> CallResult {
        if self.kind != AdviceKind::Around {
            return Err(Raised::new(
                "RuntimeError",
                format!("proceed is only available to around advice, not {}", self.kind),
            ));
        }
        (self.next)(args)
    }

    fn call_next(&self) -> CallResult {
        (self.next)(&self.args)
    }
}

/// One installed piece of advice
#[derive(Debug, Clone)]
pub struct AdviceNode {
    kind: AdviceKind,
    advice: Advice,
    aspect_id: u64,
    exceptions: Arc<[String]>,
}

impl AdviceNode {
    pub(crate) fn new(kind: AdviceKind, advice: Advice, aspect_id: u64, exceptions: Arc<[String]>) -> Self {
        Self {
            kind,
            advice,
            aspect_id,
            exceptions,
        }
    }

    /// Kind of the advice
    pub fn kind(&self) -> AdviceKind {
        self.kind
    }

    /// Aspect that installed the node
    pub fn aspect_id(&self) -> u64 {
        self.aspect_id
    }

    /// Whether `after_raising` advice handles this exception
    fn handles(&self, raised: &Raised) -> bool {
        self.exceptions.is_empty() || self.exceptions.iter().any(|kind| raised.is_a(kind))
    }
}

fn run_before(node: &AdviceNode, ctx: &mut AdviceContext<'_>) -> CallResult {
    node.advice.call(ctx)?;
    ctx.call_next()
}

fn run_after_returning(node: &AdviceNode, ctx: &mut AdviceContext<'_>) -> CallResult {
    let value = ctx.call_next()?;
    ctx.returned_value = Some(value);
    node.advice.call(ctx)?;
    Ok(ctx.returned_value.take().unwrap_or_default())
}

fn run_after_raising(node: &AdviceNode, ctx: &mut AdviceContext<'_>) -> CallResult {
    match ctx.call_next() {
        Ok(value) => Ok(value),
        Err(raised) if node.handles(&raised) => {
            ctx.raised = Some(raised.clone());
            node.advice.call(ctx)?;
            Err(ctx.raised.take().unwrap_or(raised))
        }
        Err(raised) => Err(raised),
    }
}

fn run_after(node: &AdviceNode, ctx: &mut AdviceContext<'_>) -> CallResult {
    match ctx.call_next() {
        Ok(value) => ctx.returned_value = Some(value),
        Err(raised) => ctx.raised = Some(raised),
    }
    node.advice.call(ctx)?;
    match ctx.raised.take() {
        Some(raised) => Err(raised),
        None => Ok(ctx.returned_value.take().unwrap_or_default()),
    }
}

fn run_around(node: &AdviceNode, ctx: &mut AdviceContext<'_>) -> CallResult {
    node.advice.call(ctx)
}

/// Advice installed on one method slot, innermost first
#[derive(Debug, Clone)]
pub struct AdviceChain {
    join_point: JoinPoint,
    nodes: Vec<AdviceNode>,
}

impl AdviceChain {
    pub(crate) fn new(join_point: JoinPoint) -> Self {
        Self {
            join_point,
            nodes: Vec::new(),
        }
    }

    /// Advised join point
    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    /// Nodes, innermost first
    pub fn nodes(&self) -> &[AdviceNode] {
        &self.nodes
    }

    /// Whether the chain holds no advice
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Copy with `nodes` added outside the existing ones
    pub(crate) fn wrapped(&self, nodes: impl IntoIterator<Item = AdviceNode>) -> Self {
        let mut chain = self.clone();
        chain.nodes.extend(nodes);
        chain
    }

    /// Copy without the nodes of one aspect
    pub(crate) fn without_aspect(&self, aspect_id: u64) -> Self {
        Self {
            join_point: self.join_point.clone(),
            nodes: self
                .nodes
                .iter()
                .filter(|node| node.aspect_id != aspect_id)
                .cloned()
                .collect(),
        }
    }

    /// Aspects with nodes in this chain, in first-installed order
    pub fn aspect_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = Vec::new();
        for node in &self.nodes {
            if !ids.contains(&node.aspect_id) {
                ids.push(node.aspect_id);
            }
        }
        ids
    }

    fn run(&self, depth: usize, invocation: &Invocation<'_>, args: &[Value]) -> CallResult {
        let Some(node) = depth.checked_sub(1).and_then(|i| self.nodes.get(i)) else {
            return invocation.proceed_marking(args, &self.aspect_ids());
        };
        let next = |args: &[Value]| self.run(depth - 1, invocation, args);
        let mut ctx = AdviceContext {
            join_point: &self.join_point,
            kind: node.kind,
            runtime: invocation.runtime(),
            receiver: invocation.receiver(),
            args: args.to_vec(),
            returned_value: None,
            raised: None,
            next: &next,
        };
        (node.kind.strategy())(node, &mut ctx)
    }
}

impl Interception for AdviceChain {
    fn intercept(&self, invocation: &Invocation<'_>) -> CallResult {
        // An inherited slot reached after a subtype's chain: each aspect runs once per call
        let applied = invocation.applied();
        if self.nodes.iter().any(|node| applied.contains(&node.aspect_id)) {
            let rest = Self {
                join_point: self.join_point.clone(),
                nodes: self
                    .nodes
                    .iter()
                    .filter(|node| !applied.contains(&node.aspect_id))
                    .cloned()
                    .collect(),
            };
            return rest.run(rest.nodes.len(), invocation, invocation.args());
        }
        self.run(self.nodes.len(), invocation, invocation.args())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
