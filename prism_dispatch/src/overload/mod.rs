//! Overload resolution for native call targets.
//!
//! A [`CallTarget`] groups every native signature sharing one dispatch
//! name. Resolution narrows it to the candidates whose parameter types equal
//! a requested type signature exactly.
//!
//! # Resolution
//!
//! 1. The owner's signature cache is consulted under its lock; the lock is
//!    held until a miss has been inserted, so each requested signature is
//!    narrowed at most once per owner.
//! 2. Exact match on parameter count and positional type names.
//! 3. If nothing matched, candidates declared with a leading context
//!    parameter are compared again with that parameter stripped.
//! 4. No match: [`DispatchError::NoMatchingOverload`] listing every
//!    candidate.
//!
//! Enumerating all overloads resolves each candidate's own signature and
//! installs the collection with [`OnceLock::set`]; concurrent builders
//! converge on whichever collection was installed first.

pub mod bound;
pub mod constructor;

pub use bound::BoundCallable;
pub use constructor::ConstructorTarget;

use crate::error::{DispatchError, DispatchResult};
use crate::native::NativeMember;
use crate::runtime::Runtime;
use crate::symbol::Symbol;
use crate::value::Value;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Native invocation entry point.
///
/// Receives the runtime and the arguments; instance members get their
/// receiver as the first argument. Implicit context parameters are never
/// passed: the runtime stands in for them.
pub type NativeThunk = Arc<dyn Fn(&Runtime, &[Value]) -> DispatchResult<Value> + Send + Sync>;

/// Ordered parameter type names.
pub type TypeSig = SmallVec<[Symbol; 4]>;

// =============================================================================
// Native Signature
// =============================================================================

/// One candidate of a call target.
#[derive(Clone)]
pub struct NativeSignature {
    /// Parameter types, context parameter included when present.
    params: TypeSig,
    return_type: Symbol,
    has_context_param: bool,
    thunk: NativeThunk,
}

impl NativeSignature {
    pub fn new<'a>(
        params: impl IntoIterator<Item = &'a str>,
        return_type: &str,
        thunk: NativeThunk,
    ) -> Self {
        Self {
            params: params.into_iter().map(Symbol::new).collect(),
            return_type: Symbol::new(return_type),
            has_context_param: false,
            thunk,
        }
    }

    /// Build from already interned type names.
    pub fn from_parts(
        params: TypeSig,
        return_type: Symbol,
        has_context_param: bool,
        thunk: NativeThunk,
    ) -> Self {
        Self {
            has_context_param: has_context_param && !params.is_empty(),
            params,
            return_type,
            thunk,
        }
    }

    /// The first parameter is an implicit context parameter.
    pub fn with_context_param(mut self) -> Self {
        self.has_context_param = !self.params.is_empty();
        self
    }

    /// Signature of a method or constructor record, if it has a thunk.
    pub fn from_member(member: &NativeMember) -> Option<Self> {
        Some(Self::from_parts(
            member.parameter_types.clone(),
            member.return_type.clone(),
            member.has_context_param,
            member.thunk.clone()?,
        ))
    }

    #[inline]
    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    /// Parameters a caller supplies.
    #[inline]
    pub fn explicit_params(&self) -> &[Symbol] {
        if self.has_context_param {
            &self.params[1..]
        } else {
            &self.params
        }
    }

    #[inline]
    pub fn return_type(&self) -> &Symbol {
        &self.return_type
    }

    #[inline]
    pub fn has_context_param(&self) -> bool {
        self.has_context_param
    }

    #[inline]
    pub(crate) fn thunk(&self) -> &NativeThunk {
        &self.thunk
    }

    #[inline]
    fn matches(&self, requested: &[Symbol], strip_context: bool) -> bool {
        let params = if strip_context {
            if !self.has_context_param {
                return false;
            }
            self.explicit_params()
        } else {
            self.params()
        };
        params == requested
    }

    #[inline]
    pub(crate) fn invoke(&self, runtime: &Runtime, args: &[Value]) -> DispatchResult<Value> {
        (self.thunk)(runtime, args)
    }
}

impl fmt::Display for NativeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) -> {}", join(&self.params), self.return_type)
    }
}

impl fmt::Debug for NativeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeSignature{}", self)
    }
}

fn join(types: &[Symbol]) -> String {
    let mut out = String::new();
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(ty.as_str());
    }
    out
}

// =============================================================================
// Call Target
// =============================================================================

/// A dispatch name with its candidate signatures.
pub struct CallTarget {
    name: Symbol,
    candidates: Arc<[Arc<NativeSignature>]>,
    narrowed: Mutex<FxHashMap<TypeSig, Arc<CallTarget>>>,
    overloads: OnceLock<Arc<[Arc<CallTarget>]>>,
}

impl CallTarget {
    pub fn new(name: impl Into<Symbol>, candidates: impl IntoIterator<Item = NativeSignature>) -> Self {
        Self::from_shared(
            name.into(),
            candidates.into_iter().map(Arc::new).collect(),
        )
    }

    fn from_shared(name: Symbol, candidates: Arc<[Arc<NativeSignature>]>) -> Self {
        Self {
            name,
            candidates,
            narrowed: Mutex::new(FxHashMap::default()),
            overloads: OnceLock::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    #[inline]
    pub fn candidates(&self) -> &[Arc<NativeSignature>] {
        &self.candidates
    }

    /// Number of distinct signatures narrowed so far.
    pub fn narrowed_count(&self) -> usize {
        self.narrowed.lock().len()
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Narrow to the candidates accepting exactly `requested`.
    ///
    /// Returns the same target for the same signature every time.
    pub fn resolve(&self, runtime: &Runtime, requested: &[Symbol]) -> DispatchResult<Arc<CallTarget>> {
        let mut cache = self.narrowed.lock();
        if let Some(hit) = cache.get(requested) {
            return Ok(hit.clone());
        }

        let mut matched: Vec<Arc<NativeSignature>> = self
            .candidates
            .iter()
            .filter(|c| c.matches(requested, false))
            .cloned()
            .collect();

        if matched.is_empty() && runtime.config().context_param_fallback {
            matched = self
                .candidates
                .iter()
                .filter(|c| c.matches(requested, true))
                .cloned()
                .collect();
        }

        if matched.is_empty() {
            tracing::debug!(
                name = %self.name,
                requested = %join(requested),
                candidates = self.candidates.len(),
                "no matching overload"
            );
            return Err(self.no_match(requested));
        }

        tracing::trace!(
            name = %self.name,
            requested = %join(requested),
            matched = matched.len(),
            "narrowed call target"
        );
        let narrowed = Arc::new(CallTarget::from_shared(self.name.clone(), matched.into()));
        cache.insert(requested.iter().cloned().collect(), narrowed.clone());
        Ok(narrowed)
    }

    /// Narrow and bind the result to `instance`.
    pub fn resolve_bound(
        &self,
        runtime: &Runtime,
        requested: &[Symbol],
        instance: Value,
    ) -> DispatchResult<Value> {
        let narrowed = self.resolve(runtime, requested)?;
        Ok(Value::Bound(Arc::new(BoundCallable::new(
            instance,
            Value::Function(narrowed),
        ))))
    }

    /// Every candidate narrowed to its own signature, in candidate order.
    pub fn enumerate_overloads(&self, runtime: &Runtime) -> DispatchResult<Arc<[Arc<CallTarget>]>> {
        if let Some(existing) = self.overloads.get() {
            return Ok(existing.clone());
        }

        let built: Arc<[Arc<CallTarget>]> = self
            .candidates
            .iter()
            .map(|candidate| self.resolve(runtime, candidate.params()))
            .collect::<DispatchResult<Vec<_>>>()?
            .into();

        if self.overloads.set(built.clone()).is_err() {
            tracing::trace!(name = %self.name, "overload enumeration already installed");
        }
        Ok(self.overloads.get().cloned().unwrap_or(built))
    }

    fn no_match(&self, requested: &[Symbol]) -> DispatchError {
        DispatchError::NoMatchingOverload {
            name: self.name.to_string(),
            requested: join(requested),
            available: self.candidates.iter().map(|c| c.to_string()).collect(),
        }
    }

    // =========================================================================
    // Invocation
    // =========================================================================

    /// Call without a receiver.
    pub fn call(&self, runtime: &Runtime, args: &[Value]) -> DispatchResult<Value> {
        self.invoke(runtime, None, args)
    }

    /// Call with an optional receiver prepended to the native arguments.
    ///
    /// A lone candidate only checks arity and leaves conversions to the
    /// native code. Several candidates are narrowed by the argument types.
    pub fn invoke(
        &self,
        runtime: &Runtime,
        receiver: Option<&Value>,
        args: &[Value],
    ) -> DispatchResult<Value> {
        let candidate = match &*self.candidates {
            [single] => {
                if single.explicit_params().len() != args.len() {
                    return Err(self.no_match(&runtime.signature_of(args)));
                }
                single.clone()
            }
            _ => {
                let requested = runtime.signature_of(args);
                let narrowed = self.resolve(runtime, &requested)?;
                match narrowed.candidates.first() {
                    Some(first) => first.clone(),
                    None => return Err(self.no_match(&requested)),
                }
            }
        };

        match receiver {
            Some(receiver) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(receiver.clone());
                full.extend_from_slice(args);
                candidate.invoke(runtime, &full)
            }
            None => candidate.invoke(runtime, args),
        }
    }
}

impl fmt::Debug for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallTarget")
            .field("name", &self.name)
            .field("candidates", &self.candidates)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
