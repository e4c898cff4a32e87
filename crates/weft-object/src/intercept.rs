//! Interception of method slots
//!
//! Every dispatch step consults the interception table before running the
//! method a class, module or object defines. An installed interception
//! receives an `Invocation` that can `proceed` into the rest of the dispatch
//! chain, which is how advice wraps the original behaviour.

use crate::raised::CallResult;
use crate::runtime::Runtime;
use crate::subject::MethodKey;
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::any::Any;
use std::sync::Arc;

/// Handler installed on a method slot
pub trait Interception: Any + Send + Sync {
    /// Handle a call that reached the intercepted slot
    fn intercept(&self, invocation: &Invocation<'_>) -> CallResult;

    /// Upcast for downcasting to the concrete handler type
    fn as_any(&self) -> &dyn Any;
}

/// A call that reached an intercepted method slot
pub struct Invocation<'a> {
    runtime: &'a Runtime,
    receiver: &'a Value,
    key: &'a MethodKey,
    args: &'a [Value],
    position: usize,
    applied: &'a [u64],
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        runtime: &'a Runtime,
        receiver: &'a Value,
        key: &'a MethodKey,
        args: &'a [Value],
        position: usize,
        applied: &'a [u64],
    ) -> Self {
        Self {
            runtime,
            receiver,
            key,
            args,
            position,
            applied,
        }
    }

    /// Runtime the call happens in
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// Receiver of the call
    pub fn receiver(&self) -> &'a Value {
        self.receiver
    }

    /// Intercepted slot
    pub fn key(&self) -> &'a MethodKey {
        self.key
    }

    /// Name of the called method
    pub fn method_name(&self) -> &'a str {
        &self.key.name
    }

    /// Arguments the call was made with
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Marks left by interceptions that already ran for this call
    ///
    /// Empty at the first intercepted link. Links further up the ancestor
    /// chain see every mark passed to `proceed_marking` below them.
    pub fn applied(&self) -> &'a [u64] {
        self.applied
    }

    /// Continue dispatch past this interception with the given arguments
    ///
    /// Runs the method the intercepted slot defines, or the next definition
    /// up the ancestor chain (which may itself be intercepted).
    pub fn proceed(&self, args: &[Value]) -> CallResult {
        self.runtime
            .resume(self.receiver, &self.key.name, args, self.position, self.applied)
    }

    /// Like `proceed`, recording `marks` for the interceptions further up
    pub fn proceed_marking(&self, args: &[Value], marks: &[u64]) -> CallResult {
        let mut applied = self.applied.to_vec();
        applied.extend(marks.iter().filter(|mark| !self.applied.contains(mark)));
        self.runtime
            .resume(self.receiver, &self.key.name, args, self.position, &applied)
    }
}

/// Proof that the caller holds the weave lock
pub type WeaveGuard<'a> = MutexGuard<'a, ()>;

/// Interceptions installed per method slot
///
/// Lookups are lock-free reads of the current handler. Installation and
/// removal take the weave lock so read-modify-write sequences on a slot are
/// serialized.
pub struct InterceptionTable {
    entries: DashMap<MethodKey, Arc<dyn Interception>>,
    weave_lock: Mutex<()>,
}

impl InterceptionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            weave_lock: Mutex::new(()),
        }
    }

    /// Acquire the weave lock
    pub fn lock(&self) -> WeaveGuard<'_> {
        self.weave_lock.lock()
    }

    /// Current handler of a slot
    pub fn get(&self, key: &MethodKey) -> Option<Arc<dyn Interception>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Publish a handler for a slot, returning the one it replaces
    pub fn install(
        &self,
        _guard: &WeaveGuard<'_>,
        key: MethodKey,
        handler: Arc<dyn Interception>,
    ) -> Option<Arc<dyn Interception>> {
        self.entries.insert(key, handler)
    }

    /// Remove the handler of a slot
    pub fn remove(&self, _guard: &WeaveGuard<'_>, key: &MethodKey) -> Option<Arc<dyn Interception>> {
        self.entries.remove(key).map(|(_, handler)| handler)
    }

    /// Whether a slot is intercepted
    pub fn contains(&self, key: &MethodKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of intercepted slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no slot is intercepted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of intercepted slots, sorted
    pub fn keys(&self) -> Vec<MethodKey> {
        let mut keys: Vec<MethodKey> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl Default for InterceptionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InterceptionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionTable")
            .field("slots", &self.keys())
            .finish()
    }
}
