//! Overload resolution tests.
//!
//! Coverage:
//! - Exact-signature narrowing and memoization
//! - First-resolution identity under concurrent requests
//! - Overload enumeration races
//! - Dispatch of native methods defined on classes

use prism_dispatch::{
    CallTarget, ClassSpec, DispatchError, MemberTags, NativeMember, NativeSignature, NativeThunk,
    Runtime, Symbol, TypeSig, Value,
};
use std::sync::{Arc, Barrier};
use std::thread;

fn tag(value: i64) -> NativeThunk {
    Arc::new(move |_, _| Ok(Value::Int(value)))
}

fn sig(types: &[&str]) -> TypeSig {
    types.iter().map(|t| Symbol::new(t)).collect()
}

fn convert() -> CallTarget {
    CallTarget::new(
        "convert",
        [
            NativeSignature::new(["double"], "X", tag(1)),
            NativeSignature::new(["int"], "X", tag(2)),
        ],
    )
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_convert_double() {
    let rt = Runtime::new();
    let narrowed = convert().resolve(&rt, &sig(&["double"])).unwrap();
    assert_eq!(narrowed.candidates().len(), 1);
    assert_eq!(narrowed.candidates()[0].to_string(), "(double) -> X");
    assert_eq!(narrowed.call(&rt, &[Value::Float(0.5)]).unwrap(), Value::Int(1));
}

#[test]
fn test_resolution_is_idempotent() {
    let rt = Runtime::new();
    let target = convert();
    let first = target.resolve(&rt, &sig(&["int"])).unwrap();
    for _ in 0..16 {
        assert!(Arc::ptr_eq(&first, &target.resolve(&rt, &sig(&["int"])).unwrap()));
    }
    assert_eq!(target.narrowed_count(), 1);
}

#[test]
fn test_no_matching_overload() {
    let rt = Runtime::new();
    let err = convert().resolve(&rt, &sig(&["double", "int"])).unwrap_err();
    match err {
        DispatchError::NoMatchingOverload {
            name,
            requested,
            available,
        } => {
            assert_eq!(name, "convert");
            assert_eq!(requested, "double, int");
            assert_eq!(available.len(), 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_exact_phase_wins_over_context_phase() {
    let rt = Runtime::new();
    let target = CallTarget::new(
        "f",
        [
            NativeSignature::new(["Context", "int"], "X", tag(1)).with_context_param(),
            NativeSignature::new(["int"], "X", tag(2)),
        ],
    );
    let narrowed = target.resolve(&rt, &sig(&["int"])).unwrap();
    assert_eq!(narrowed.candidates().len(), 1);
    assert_eq!(narrowed.call(&rt, &[Value::Int(0)]).unwrap(), Value::Int(2));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_first_resolution_identity() {
    const THREADS: usize = 8;
    let rt = Arc::new(Runtime::new());
    let target = Arc::new(convert());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let rt = rt.clone();
            let target = target.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                target.resolve(&rt, &sig(&["double"])).unwrap()
            })
        })
        .collect();

    let results: Vec<Arc<CallTarget>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(target.narrowed_count(), 1);
}

#[test]
fn test_concurrent_enumeration_converges() {
    const THREADS: usize = 8;
    let rt = Arc::new(Runtime::new());
    let target = Arc::new(convert());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let rt = rt.clone();
            let target = target.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                target.enumerate_overloads(&rt).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for result in &results[1..] {
        assert!(Arc::ptr_eq(&results[0], result));
    }
    assert_eq!(results[0].len(), 2);
}

// =============================================================================
// Class Dispatch
// =============================================================================

#[test]
fn test_overloaded_method_dispatch_through_instance() {
    let rt = Runtime::new();
    let class = rt
        .define_class(
            ClassSpec::new("Converter")
                .member(NativeMember::method("convert", ["double"], "X", tag(1)))
                .member(NativeMember::method("convert", ["int"], "X", tag(2)))
                .member(NativeMember::method("convert", ["string"], "X", tag(3))),
        )
        .unwrap();
    let obj = rt.instantiate(&class);
    let method = rt.get_attr(&obj, "convert").unwrap().unwrap();

    assert_eq!(rt.call(&method, &[Value::Float(1.0)]).unwrap(), Value::Int(1));
    assert_eq!(rt.call(&method, &[Value::Int(1)]).unwrap(), Value::Int(2));
    assert_eq!(rt.call(&method, &[Value::str("s")]).unwrap(), Value::Int(3));
    assert!(rt.call(&method, &[Value::None]).is_err());
}

#[test]
fn test_static_method_has_no_receiver() {
    let rt = Runtime::new();
    let class = rt
        .define_class(ClassSpec::new("Math").member(
            NativeMember::method(
                "Twice",
                ["int"],
                "int",
                Arc::new(|_, args: &[Value]| Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))),
            )
            .with_tags(MemberTags::STATIC),
        ))
        .unwrap();
    let function = rt.get_attr(&Value::Class(class), "Twice").unwrap().unwrap();
    assert!(matches!(function, Value::Function(_)));
    assert_eq!(rt.call(&function, &[Value::Int(21)]).unwrap(), Value::Int(42));
}

#[test]
fn test_static_operator_binds_left_operand() {
    let rt = Runtime::new();
    let class = rt
        .define_class(ClassSpec::new("Money").member(
            NativeMember::method(
                "op_Addition",
                ["Money", "int"],
                "Money",
                Arc::new(|_, args: &[Value]| Ok(Value::tuple(args.iter().cloned()))),
            )
            .with_tags(MemberTags::STATIC),
        ))
        .unwrap();
    let obj = rt.instantiate(&class);
    let add = rt.get_attr(&obj, "__add__").unwrap().unwrap();
    let out = rt.call(&add, &[Value::Int(5)]).unwrap();
    let items = out.as_tuple().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].is(&obj));
    assert_eq!(items[1], Value::Int(5));
}

#[test]
fn test_context_parameter_is_not_passed() {
    let rt = Runtime::new();
    let class = rt
        .define_class(ClassSpec::new("Fmt").member(
            NativeMember::method(
                "format",
                ["CodeContext", "string"],
                "string",
                Arc::new(|_, args: &[Value]| Ok(Value::Int(args.len() as i64))),
            )
            .with_context_param(),
        ))
        .unwrap();
    let obj = rt.instantiate(&class);
    let format = rt.get_attr(&obj, "format").unwrap().unwrap();
    // Receiver plus the one explicit argument.
    assert_eq!(rt.call(&format, &[Value::str("x")]).unwrap(), Value::Int(2));
}
