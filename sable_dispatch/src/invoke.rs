//! Invocation execution layer.
//!
//! The last hop of a dispatch: arity checking, argument coercion to the
//! selected signature, and the native-body call. Resolution has already
//! happened by the time control reaches this module; failures here are
//! either plumbing errors (arity drift between resolution and invocation)
//! or exceptions raised by the callee, which pass through untouched.

use sable_core::error::{DispatchError, DispatchResult};
use sable_core::value::Value;
use sable_meta::method::{ParamType, ReflectedMethod};
use smallvec::SmallVec;

/// Inline argument buffer sized for typical call shapes.
pub type ArgBuf = SmallVec<[Value; 6]>;

/// Whether any argument needs conversion before the body runs.
///
/// The only value conversion this runtime performs is int-to-float widening
/// into a declared float parameter, including the element type of a varargs
/// collector. Reference upcasts are free at the value level.
#[must_use]
pub fn needs_coercion(method: &ReflectedMethod, args: &[Value]) -> bool {
    let params = method.params();
    if method.is_varargs() && !params.is_empty() {
        let fixed = params.len() - 1;
        let element = params[fixed];
        params[..fixed]
            .iter()
            .zip(args)
            .any(|(p, a)| widens(*p, a))
            || args[fixed.min(args.len())..]
                .iter()
                .any(|a| widens(element, a))
    } else {
        params.iter().zip(args).any(|(p, a)| widens(*p, a))
    }
}

fn widens(param: ParamType, arg: &Value) -> bool {
    matches!((param, arg), (ParamType::Float, Value::Int(_)))
}

/// Coerce arguments to the method's declared signature.
#[must_use]
pub fn coerce(method: &ReflectedMethod, args: &[Value]) -> ArgBuf {
    let params = method.params();
    let mut out = ArgBuf::with_capacity(args.len());
    if method.is_varargs() && !params.is_empty() {
        let fixed = params.len() - 1;
        let element = params[fixed];
        for (i, arg) in args.iter().enumerate() {
            let param = if i < fixed { params[i] } else { element };
            out.push(coerce_one(param, arg));
        }
    } else {
        for (param, arg) in params.iter().zip(args) {
            out.push(coerce_one(*param, arg));
        }
    }
    out
}

fn coerce_one(param: ParamType, arg: &Value) -> Value {
    match (param, arg) {
        (ParamType::Float, Value::Int(n)) => Value::Float(*n as f64),
        _ => arg.clone(),
    }
}

/// Invoke with coercion.
pub fn invoke(method: &ReflectedMethod, receiver: &Value, args: &[Value]) -> DispatchResult<Value> {
    check_arity(method, args)?;
    if needs_coercion(method, args) {
        let coerced = coerce(method, args);
        method.call(receiver, &coerced)
    } else {
        method.call(receiver, args)
    }
}

/// Invoke without the coercion scan.
///
/// Used by the call-site fast path when the cached target recorded that the
/// call shape needs no conversion.
pub fn invoke_uncoerced(
    method: &ReflectedMethod,
    receiver: &Value,
    args: &[Value],
) -> DispatchResult<Value> {
    check_arity(method, args)?;
    method.call(receiver, args)
}

fn check_arity(method: &ReflectedMethod, args: &[Value]) -> DispatchResult<()> {
    let params = method.params();
    let ok = if method.is_varargs() {
        args.len() >= params.len().saturating_sub(1)
    } else {
        args.len() == params.len()
    };
    if ok {
        Ok(())
    } else {
        Err(DispatchError::invocation(format!(
            "arity mismatch invoking {}: expected {}, got {}",
            method.describe(),
            params.len(),
            args.len()
        )))
    }
}
