use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::{
    host::{Class, ClassMethod, Function, StaticMethod},
    value::BinaryOp,
};

fn add() -> Value {
    Function::new("add", |args, _| args[0].binary_op(BinaryOp::Add, &args[1])).into()
}

fn passthrough() -> Interceptor {
    interceptor(|wrapped, _, args, kwargs| wrapped.call(args, kwargs))
}

/// Interceptor that records every receiver it sees and the first argument
fn recording(log: Arc<Mutex<Vec<(Option<Value>, Value)>>>) -> Interceptor {
    interceptor(move |wrapped, receiver, args, kwargs| {
        log.lock().push((receiver.cloned(), args.first().cloned().unwrap_or(Value::None)));
        wrapped.call(args, kwargs)
    })
}

#[test]
fn test_passthrough_plain_function() {
    let wrapped_add: Value = FunctionWrapper::new(add(), passthrough()).into();
    let result = wrapped_add.call(vec![Value::Int(2), Value::Int(3)], Kwargs::new()).unwrap();
    assert_eq!(result, Value::Int(5));
}

#[test]
fn test_unbound_call_passes_no_receiver() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let wrapper: Value = FunctionWrapper::new(add(), recording(Arc::clone(&seen))).into();
    wrapper.call(vec![Value::Int(1), Value::Int(1)], Kwargs::new()).unwrap();
    assert_eq!(seen.lock().as_slice(), &[(None, Value::Int(1))]);
}

#[test]
fn test_wrapper_is_transparent_for_metadata() {
    let wrapper: Value = FunctionWrapper::new(add(), passthrough()).into();
    assert_eq!(wrapper.get_attr("name").unwrap(), Value::from("add"));
    assert_eq!(wrapper.repr().unwrap(), "<FunctionWrapper for function>");
    wrapper.set_attr("_self_calls", Value::Int(0)).unwrap();
    assert!(wrapper.get_attr(WRAPPED).unwrap().get_attr("_self_calls").is_err());
}

const WRAPPED: &str = crate::proxy::WRAPPED_ATTR;

fn method_class(seen: Arc<Mutex<Vec<(Option<Value>, Value)>>>) -> Value {
    let method = Function::new("method", |args, _| Ok(args[1].clone()));
    let class = Class::new("Obj");
    class.define("method", FunctionWrapper::new(method.into(), recording(seen)).into());
    class.into()
}

#[test]
fn test_instance_method_receiver_via_instance_and_class() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let class = method_class(Arc::clone(&seen));
    let instance = class.call(Vec::new(), Kwargs::new()).unwrap();

    let via_instance = instance.get_attr("method").unwrap();
    assert_eq!(via_instance.call(vec![Value::Int(7)], Kwargs::new()).unwrap(), Value::Int(7));

    let via_class = class.get_attr("method").unwrap();
    assert_eq!(
        via_class.call(vec![instance.clone(), Value::Int(7)], Kwargs::new()).unwrap(),
        Value::Int(7)
    );

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    for (receiver, arg) in seen.iter() {
        assert!(receiver.as_ref().unwrap().is(&instance));
        assert_eq!(arg, &Value::Int(7));
    }
}

#[test]
fn test_class_call_without_receiver_is_an_arity_error() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let class = method_class(Arc::clone(&seen));
    let via_class = class.get_attr("method").unwrap();
    let err = via_class.call(Vec::new(), Kwargs::new()).unwrap_err();
    assert!(matches!(err, WraptError::MissingReceiver { .. }));
    assert!(seen.lock().is_empty());
}

#[test]
fn test_classmethod_receiver_is_the_class() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let cm = Function::new("cm", |args, _| Ok(args[1].clone()));
    let class = Class::new("Obj");
    class.define(
        "cm",
        FunctionWrapper::new(ClassMethod::new(cm.into()).into(), recording(Arc::clone(&seen))).into(),
    );
    let class: Value = class.into();
    let instance = class.call(Vec::new(), Kwargs::new()).unwrap();

    let via_class = class.get_attr("cm").unwrap().call(vec![Value::Int(5)], Kwargs::new()).unwrap();
    let via_instance = instance.get_attr("cm").unwrap().call(vec![Value::Int(5)], Kwargs::new()).unwrap();
    assert_eq!(via_class, Value::Int(5));
    assert_eq!(via_instance, Value::Int(5));

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    for (receiver, _) in seen.iter() {
        assert!(receiver.as_ref().unwrap().is(&class));
    }
}

#[test]
fn test_staticmethod_receiver_is_none() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let class = Class::new("Obj");
    class.define(
        "sm",
        FunctionWrapper::new(StaticMethod::new(add()).into(), recording(Arc::clone(&seen))).into(),
    );
    let class: Value = class.into();
    let instance = class.call(Vec::new(), Kwargs::new()).unwrap();

    let result = instance
        .get_attr("sm")
        .unwrap()
        .call(vec![Value::Int(1), Value::Int(2)], Kwargs::new())
        .unwrap();
    assert_eq!(result, Value::Int(3));
    assert_eq!(seen.lock().as_slice(), &[(None, Value::Int(1))]);
}

#[test]
fn test_binding_is_idempotent() {
    let wrapper = FunctionWrapper::new(add(), passthrough());
    let receiver = Value::list([]);
    let bound = wrapper.bind(Some(&receiver), None).unwrap();
    let again = bound.bind(Some(&receiver), None).unwrap();
    assert!(Arc::ptr_eq(&bound, &again));
}

#[test]
fn test_none_receiver_rebinds_to_new_wrapper() {
    let wrapper = FunctionWrapper::new(add(), passthrough());
    let unbound = wrapper.bind(None, None).unwrap();
    assert!(unbound.receiver().is_none());

    let receiver = Value::Int(40);
    let rebound = unbound.bind(Some(&receiver), None).unwrap();
    assert!(!Arc::ptr_eq(&unbound, &rebound));
    assert_eq!(rebound.receiver(), Some(&receiver));
    assert!(Arc::ptr_eq(rebound.parent(), &wrapper));
    assert_eq!(rebound.call(vec![Value::Int(2)], Kwargs::new()).unwrap(), Value::Int(42));
}

#[test]
fn test_classification_is_stable() {
    let plain = FunctionWrapper::new(add(), passthrough());
    let class_method = FunctionWrapper::new(ClassMethod::new(add()).into(), passthrough());
    let static_method = FunctionWrapper::new(StaticMethod::new(add()).into(), passthrough());
    assert_eq!(plain.binding(), Binding::Function);
    assert_eq!(class_method.binding(), Binding::ClassMethod);
    assert_eq!(static_method.binding(), Binding::StaticMethod);

    let owner: Value = Class::new("Owner").into();
    for _ in 0..3 {
        assert_eq!(plain.bind(Some(&Value::Int(1)), None).unwrap().binding(), Binding::Function);
        assert_eq!(class_method.bind(None, Some(&owner)).unwrap().binding(), Binding::ClassMethod);
        assert_eq!(static_method.bind(None, None).unwrap().binding(), Binding::StaticMethod);
    }
    assert_eq!(class_method.binding(), Binding::ClassMethod);
}

#[test]
fn test_nested_wrapper_inherits_binding() {
    let inner = FunctionWrapper::new(ClassMethod::new(add()).into(), passthrough());
    let outer = FunctionWrapper::new(inner.into(), passthrough());
    assert_eq!(outer.binding(), Binding::ClassMethod);
}

fn counting(calls: Arc<AtomicUsize>) -> Interceptor {
    interceptor(move |wrapped, _, args, kwargs| {
        calls.fetch_add(1, Ordering::SeqCst);
        wrapped.call(args, kwargs)
    })
}

#[test]
fn test_gate_short_circuits_interceptor() {
    let calls = Arc::new(AtomicUsize::new(0));
    let off: Value = FunctionWrapper::with_options(
        add(),
        counting(Arc::clone(&calls)),
        WrapperOptions::default().enabled(false),
    )
    .into();
    assert_eq!(off.call(vec![Value::Int(1), Value::Int(2)], Kwargs::new()).unwrap(), Value::Int(3));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let on: Value = FunctionWrapper::with_options(
        add(),
        counting(Arc::clone(&calls)),
        WrapperOptions::default().enabled(true),
    )
    .into();
    on.call(vec![Value::Int(1), Value::Int(2)], Kwargs::new()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_gate_predicate_and_callable_value() {
    let calls = Arc::new(AtomicUsize::new(0));
    let switch = Arc::new(AtomicUsize::new(0));
    let predicate = {
        let switch = Arc::clone(&switch);
        Enabled::predicate(move || Ok(switch.load(Ordering::SeqCst) == 1))
    };
    let wrapper: Value =
        FunctionWrapper::with_options(add(), counting(Arc::clone(&calls)), WrapperOptions::default().enabled(predicate))
            .into();

    wrapper.call(vec![Value::Int(1), Value::Int(1)], Kwargs::new()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    switch.store(1, Ordering::SeqCst);
    wrapper.call(vec![Value::Int(1), Value::Int(1)], Kwargs::new()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let gate: Value = Function::new("gate", |_, _| Ok(Value::Int(0))).into();
    let gated: Value =
        FunctionWrapper::with_options(add(), counting(Arc::clone(&calls)), WrapperOptions::default().enabled(Enabled::Value(gate)))
            .into();
    gated.call(vec![Value::Int(1), Value::Int(1)], Kwargs::new()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_gate_applies_to_bound_wrappers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let method = Function::new("method", |args, _| Ok(args[1].clone()));
    let class = Class::new("Obj");
    class.define(
        "method",
        FunctionWrapper::with_options(
            method.into(),
            counting(Arc::clone(&calls)),
            WrapperOptions::default().enabled(false),
        )
        .into(),
    );
    let class: Value = class.into();
    let instance = class.call(Vec::new(), Kwargs::new()).unwrap();
    let via_class = class.get_attr("method").unwrap();
    let result = via_class.call(vec![instance, Value::Int(9)], Kwargs::new()).unwrap();
    assert_eq!(result, Value::Int(9));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_bind_against_non_descriptor_fails_immediately() {
    let wrapper = FunctionWrapper::new(Value::Int(3), passthrough());
    let err = wrapper.bind(Some(&Value::Int(1)), None).unwrap_err();
    assert!(matches!(err, WraptError::AttributeNotFound { .. }));
}

struct FixedResolver(Value);

impl Resolver for FixedResolver {
    fn resolve(&self, _descriptor: &Value, _receiver: Option<&Value>, _owner: Option<&Value>) -> Result<Value> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_injected_resolver_is_used_for_binding() {
    let replacement: Value = Function::new("replacement", |_, _| Ok(Value::from("replaced"))).into();
    let wrapper = FunctionWrapper::with_options(
        add(),
        passthrough(),
        WrapperOptions::default().resolver(Arc::new(FixedResolver(replacement))),
    );
    let bound = wrapper.bind(Some(&Value::Int(1)), None).unwrap();
    assert_eq!(bound.call(Vec::new(), Kwargs::new()).unwrap(), Value::from("replaced"));
}

#[test]
fn test_inplace_rewraps_into_function_wrapper() {
    let calls = Arc::new(AtomicUsize::new(0));
    let wrapper: Value = FunctionWrapper::new(Value::Int(1), counting(calls)).into();
    let after = wrapper.inplace_op(BinaryOp::Add, &Value::Int(1)).unwrap();
    assert!(!after.is(&wrapper));
    assert_eq!(after.type_name(), "FunctionWrapper");
    assert_eq!(after, Value::Int(2));
}

#[test]
fn test_bind_under_trace_subscriber() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        let wrapper = FunctionWrapper::new(add(), passthrough());
        let bound = wrapper.bind(Some(&Value::Int(1)), None).unwrap();
        assert_eq!(bound.receiver(), Some(&Value::Int(1)));
        assert!(wrapper.bind(None, None).unwrap().receiver().is_none());
    });
}
