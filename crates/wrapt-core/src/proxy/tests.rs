use pretty_assertions::assert_eq;

use super::*;
use crate::{
    host::{Class, Function},
    value::{Kwargs, UnaryOp},
};

fn proxy(value: Value) -> Value {
    ObjectProxy::new(value).into()
}

#[test]
fn test_forwards_arithmetic_and_comparison() {
    let p = proxy(Value::Int(10));
    assert_eq!(p.binary_op(BinaryOp::Add, &Value::Int(5)).unwrap(), Value::Int(15));
    assert_eq!(Value::Int(5).binary_op(BinaryOp::Sub, &p).unwrap(), Value::Int(-5));
    assert_eq!(p.binary_op(BinaryOp::FloorDiv, &Value::Int(3)).unwrap(), Value::Int(3));
    assert_eq!(p.unary_op(UnaryOp::Neg).unwrap(), Value::Int(-10));
    assert!(p.equals(&Value::Int(10)).unwrap());
    assert!(p.lt(&Value::Int(11)).unwrap());
    assert!(Value::Int(9).lt(&p).unwrap());
    assert_eq!(p.hash_value().unwrap(), Value::Int(10).hash_value().unwrap());
    assert_eq!(p.to_float().unwrap(), 10.0);
    assert!(p.truthy().unwrap());
    assert_eq!(p.display().unwrap(), "10");
}

#[test]
fn test_forwards_container_protocol() {
    let list = Value::list([Value::Int(1), Value::Int(2), Value::Int(3)]);
    let p = proxy(list.clone());
    assert_eq!(p.len().unwrap(), 3);
    assert!(p.contains(&Value::Int(2)).unwrap());
    assert_eq!(p.get_item(&Value::Int(-1)).unwrap(), Value::Int(3));
    p.set_item(&Value::Int(0), Value::Int(7)).unwrap();
    assert_eq!(list.get_item(&Value::Int(0)).unwrap(), Value::Int(7));
    assert_eq!(
        p.get_slice(Some(1), None).unwrap(),
        Value::list([Value::Int(2), Value::Int(3)])
    );
    p.del_item(&Value::Int(0)).unwrap();

    let first: Vec<Value> = p.iter().unwrap().collect::<Result<_>>().unwrap();
    let second: Vec<Value> = p.iter().unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(first, vec![Value::Int(2), Value::Int(3)]);
    assert_eq!(first, second);
}

#[test]
fn test_repr_names_proxy_and_wrapped_type() {
    assert_eq!(proxy(Value::Int(1)).repr().unwrap(), "<ObjectProxy for int>");
    assert_eq!(proxy(Value::list([])).repr().unwrap(), "<ObjectProxy for list>");
}

#[test]
fn test_attribute_writes_reach_wrapped_value() {
    let class: Value = Class::new("Record").into();
    let record = class.call(Vec::new(), Kwargs::new()).unwrap();
    let p = proxy(record.clone());

    p.set_attr("label", Value::from("x")).unwrap();
    assert_eq!(record.get_attr("label").unwrap(), Value::from("x"));
    assert_eq!(p.get_attr("label").unwrap(), Value::from("x"));
    p.del_attr("label").unwrap();
    assert!(record.get_attr("label").is_err());
}

#[test]
fn test_own_attributes_never_touch_wrapped_value() {
    let class: Value = Class::new("Record").into();
    let record = class.call(Vec::new(), Kwargs::new()).unwrap();
    let p = proxy(record.clone());

    p.set_attr("_self_note", Value::Int(1)).unwrap();
    assert_eq!(p.get_attr("_self_note").unwrap(), Value::Int(1));
    assert!(record.get_attr("_self_note").is_err());
    assert!(record.dir().unwrap().is_empty());

    let err = p.get_attr("_self_missing").unwrap_err();
    assert_eq!(err.to_string(), "'ObjectProxy' object has no attribute '_self_missing'");
}

#[test]
fn test_wrapped_attribute_retargets_proxy() {
    let p = ObjectProxy::new(Value::Int(1));
    let handle: Value = p.clone().into();
    assert_eq!(handle.get_attr(WRAPPED_ATTR).unwrap(), Value::Int(1));
    handle.set_attr(WRAPPED_ATTR, Value::from("two")).unwrap();
    assert_eq!(p.wrapped().unwrap(), Value::from("two"));
    assert!(handle.del_attr(WRAPPED_ATTR).is_err());
}

#[test]
fn test_inplace_on_mutable_payload_keeps_identity() {
    let list = Value::list([Value::Int(1), Value::Int(2), Value::Int(3)]);
    let p = proxy(list.clone());
    let after = p.inplace_op(BinaryOp::Add, &Value::list([Value::Int(4), Value::Int(5)])).unwrap();
    assert!(after.is(&p));
    assert_eq!(
        list,
        Value::list([1, 2, 3, 4, 5].map(Value::Int))
    );
}

#[test]
fn test_inplace_on_immutable_payload_rewraps() {
    let original = Value::Int(10);
    let p = proxy(original.clone());
    let after = p.inplace_op(BinaryOp::Add, &Value::Int(5)).unwrap();
    assert!(!after.is(&p));
    assert_eq!(after.type_name(), "ObjectProxy");
    assert_eq!(after, Value::Int(15));
    assert_eq!(p, Value::Int(10));
    assert_eq!(original, Value::Int(10));
}

#[test]
fn test_uninitialized_proxy_fails_every_forwarded_operation() {
    let p = ObjectProxy::uninitialized();
    let handle: Value = p.clone().into();
    let err = handle.len().unwrap_err();
    assert_eq!(err.to_string(), "ObjectProxy wrapped value has not been initialized");
    assert!(matches!(handle.get_attr("x"), Err(WraptError::Uninitialized { .. })));
    assert!(handle.repr().is_err());

    p.set_wrapped(Value::list([]));
    assert_eq!(handle.len().unwrap(), 0);
    assert!(p.take_wrapped().is_some());
    assert!(matches!(handle.truthy(), Err(WraptError::Uninitialized { .. })));
}

#[test]
fn test_copy_and_serialize_are_unsupported() {
    let p = proxy(Value::list([]));
    let err = p.copy().unwrap_err();
    assert_eq!(
        err.to_string(),
        "ObjectProxy must define __copy__(); it must be explicitly supported by a subtype"
    );
    assert!(matches!(p.deep_copy(), Err(WraptError::Unsupported { .. })));
    assert!(serde_json::to_string(&p).is_err());
}

#[test]
fn test_object_proxy_is_not_callable() {
    let func: Value = Function::new("f", |_, _| Ok(Value::Int(1))).into();
    let p = proxy(func);
    assert!(!p.is_callable());
    assert!(p.call(Vec::new(), Kwargs::new()).is_err());
}

#[test]
fn test_scoped_resource_forwarding() {
    let class = Class::new("Resource");
    class.define(
        "enter",
        Function::new("enter", |args, _| {
            args[0].set_attr("open", Value::Bool(true))?;
            Ok(Value::from("handle"))
        })
        .into(),
    );
    class.define(
        "exit",
        Function::new("exit", |args, _| {
            args[0].set_attr("open", Value::Bool(false))?;
            Ok(Value::Bool(false))
        })
        .into(),
    );
    let class: Value = class.into();
    let resource = class.call(Vec::new(), Kwargs::new()).unwrap();
    let p = proxy(resource.clone());

    assert_eq!(p.enter().unwrap(), Value::from("handle"));
    assert_eq!(resource.get_attr("open").unwrap(), Value::Bool(true));
    assert!(!p.exit(None).unwrap());
    assert_eq!(resource.get_attr("open").unwrap(), Value::Bool(false));
}

#[test]
fn test_oversized_repetition_through_proxy_is_an_error() {
    let p = proxy(Value::from("abc"));
    let err = p.binary_op(BinaryOp::Mul, &Value::Int(i64::MAX)).unwrap_err();
    assert!(matches!(err, WraptError::Overflow { .. }));

    let items = Value::list(vec![1.into()]);
    let p = proxy(items.clone());
    assert!(p.inplace_op(BinaryOp::Mul, &Value::Int(i64::MAX)).is_err());
    assert_eq!(items.len().unwrap(), 1);
}
