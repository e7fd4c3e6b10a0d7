// Foxscream Prelude
// Primitive class hierarchy, value constructors and built-in functions

use std::rc::Rc;

use crate::ast::ClassKind;
use crate::error::{ErrorKind, FoxError, FoxResult};
use crate::resolve::{resolve, CallSignature, Parameter, TypeSpec};

use super::value::{
    BoundMethod, Callable, ClassLink, Dict, Function, NativeCall, NativeFn, Object, ObjectKind,
    Overload, Payload, Value,
};
use super::Runtime;

/// Handles to the prelude classes and singletons
pub struct Prelude {
    pub object: Value,
    pub class: Value,
    pub function: Value,
    pub none: Value,
    pub number: Value,
    pub int: Value,
    pub float: Value,
    pub bool: Value,
    pub collection: Value,
    pub array: Value,
    pub dict: Value,
    pub str: Value,
    null: Value,
    true_value: Value,
    false_value: Value,
}

fn make_class(name: &str, parents: &[&Value], converter: Option<NativeFn>) -> Value {
    let mut object = Object::new(
        ObjectKind::Class(ClassKind::Class),
        ClassLink::SelfClass,
        Payload::None,
    );
    object.name = name.to_string();
    object.parents = parents.iter().map(|p| (*p).clone()).collect();
    object.converter = converter;
    let class = Value::new(object);
    let resolution = resolve(&class);
    class.borrow_mut().resolution = Some(Rc::new(resolution));
    class
}

fn make_primitive(class: &Value, payload: Payload) -> Value {
    let mut object = Object::new(ObjectKind::Primitive, ClassLink::Of(class.clone()), payload);
    object.parents = vec![class.clone()];
    Value::new(object)
}

impl Prelude {
    pub fn new() -> Self {
        let object = make_class("object", &[], None);
        let class = make_class("class", &[&object], Some(not_constructible));
        let function = make_class("function", &[&object], Some(not_constructible));
        let none = make_class("none", &[&object], Some(not_constructible));
        let number = make_class("number", &[&object], Some(not_constructible));
        let int = make_class("int", &[&number], Some(convert_int));
        let float = make_class("float", &[&number], Some(convert_float));
        let bool = make_class("bool", &[&object], Some(convert_bool));
        let collection = make_class("collection", &[&object], Some(not_constructible));
        let array = make_class("array", &[&collection], Some(convert_array));
        let dict = make_class("dict", &[&collection], Some(convert_dict));
        let str = make_class("str", &[&collection], Some(convert_str));

        let null = make_primitive(&none, Payload::Null);
        let true_value = make_primitive(&bool, Payload::Bool(true));
        let false_value = make_primitive(&bool, Payload::Bool(false));

        Self {
            object,
            class,
            function,
            none,
            number,
            int,
            float,
            bool,
            collection,
            array,
            dict,
            str,
            null,
            true_value,
            false_value,
        }
    }

    // ==================== Constructors ====================

    pub fn null(&self) -> Value {
        self.null.clone()
    }

    pub fn bool(&self, value: bool) -> Value {
        if value {
            self.true_value.clone()
        } else {
            self.false_value.clone()
        }
    }

    pub fn int(&self, value: i64) -> Value {
        make_primitive(&self.int, Payload::Int(value))
    }

    pub fn float(&self, value: f64) -> Value {
        make_primitive(&self.float, Payload::Float(value))
    }

    pub fn str(&self, value: impl Into<String>) -> Value {
        make_primitive(&self.str, Payload::Str(value.into()))
    }

    pub fn array(&self, items: Vec<Value>) -> Value {
        make_primitive(&self.array, Payload::Array(items))
    }

    pub fn dict(&self, dict: Dict) -> Value {
        make_primitive(&self.dict, Payload::Dict(dict))
    }

    pub fn function(&self, name: &str, function: Function) -> Value {
        let value = make_primitive(&self.function, Payload::Function(function));
        value.borrow_mut().name = name.to_string();
        value
    }

    pub fn bound(&self, name: &str, bound: BoundMethod) -> Value {
        let value = make_primitive(&self.function, Payload::Bound(bound));
        value.borrow_mut().name = name.to_string();
        value
    }

    // ==================== Types ====================

    /// The class a value is an instance of; classes report `class`
    pub fn class_of(&self, value: &Value) -> Value {
        value.class_of().unwrap_or_else(|| self.class.clone())
    }

    /// Candidate type of a runtime value: its class, plus the data fields of
    /// instances. Function-valued fields are behaviour, not shape.
    pub fn candidate_type(&self, value: &Value) -> TypeSpec {
        let class = self.class_of(value);
        if !value.is_instance() {
            return TypeSpec::nominal(class);
        }
        let mut fields: Vec<(String, TypeSpec)> = value
            .borrow()
            .fields
            .iter()
            .filter(|(_, field)| {
                !matches!(
                    field.borrow().payload,
                    Payload::Function(_) | Payload::Bound(_)
                )
            })
            .map(|(name, field)| (name.clone(), TypeSpec::nominal(self.class_of(field))))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        TypeSpec::of_class_with_fields(class, fields)
    }

    fn classes(&self) -> [(&'static str, &Value); 12] {
        [
            ("object", &self.object),
            ("class", &self.class),
            ("function", &self.function),
            ("none", &self.none),
            ("number", &self.number),
            ("int", &self.int),
            ("float", &self.float),
            ("bool", &self.bool),
            ("collection", &self.collection),
            ("array", &self.array),
            ("dict", &self.dict),
            ("str", &self.str),
        ]
    }

    fn native(&self, name: &str, signature: CallSignature, body: NativeFn) -> Value {
        let overload = Rc::new(Overload::new(name, signature, Callable::Native(body)));
        self.function(
            name,
            Function {
                overloads: vec![overload],
            },
        )
    }

    /// Every binding the root scope starts with
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings: Vec<(String, Value)> = self
            .classes()
            .iter()
            .map(|(name, class)| (name.to_string(), (*class).clone()))
            .collect();

        bindings.push(("null".into(), self.null()));
        bindings.push(("true".into(), self.bool(true)));
        bindings.push(("false".into(), self.bool(false)));

        let any = || TypeSpec::nominal(self.object.clone());
        bindings.push((
            "print".into(),
            self.native(
                "print",
                CallSignature {
                    var_positional: Some(Parameter::new("values", any())),
                    ..CallSignature::default()
                },
                builtin_print,
            ),
        ));
        bindings.push((
            "len".into(),
            self.native(
                "len",
                CallSignature {
                    return_type: Some(TypeSpec::nominal(self.int.clone())),
                    positional: vec![Parameter::new(
                        "value",
                        TypeSpec::nominal(self.collection.clone()),
                    )],
                    ..CallSignature::default()
                },
                builtin_len,
            ),
        ));
        bindings.push((
            "type".into(),
            self.native(
                "type",
                CallSignature {
                    return_type: Some(TypeSpec::nominal(self.class.clone())),
                    positional: vec![Parameter::new("value", any())],
                    ..CallSignature::default()
                },
                builtin_type,
            ),
        ));

        bindings
    }
}

impl Default for Prelude {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Built-in functions ====================

fn builtin_print(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    let line: Vec<String> = call.args.iter().map(|v| v.to_string()).collect();
    rt.write_line(&line.join(" "), call.span)?;
    Ok(rt.prelude.null())
}

fn builtin_len(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    let length = call.args.first().and_then(|value| match &value.borrow().payload {
        Payload::Str(s) => Some(s.chars().count()),
        Payload::Array(items) => Some(items.len()),
        Payload::Dict(dict) => Some(dict.len()),
        _ => None,
    });
    match length {
        Some(n) => Ok(rt.prelude.int(n as i64)),
        None => Err(FoxError::type_error(
            "len() expects a str, array or dict",
            call.span,
            rt.file(),
        )),
    }
}

fn builtin_type(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    match call.args.first() {
        Some(value) => Ok(rt.prelude.class_of(value)),
        None => Ok(rt.prelude.null()),
    }
}

// ==================== Class converters ====================

fn single_argument(rt: &Runtime, call: &NativeCall, class: &str) -> FoxResult<Option<Value>> {
    if !call.kwargs.is_empty() || call.args.len() > 1 {
        return Err(FoxError::new(
            ErrorKind::ArityMismatch,
            format!(
                "{}() takes at most 1 positional argument but {} were given",
                class,
                call.args.len() + call.kwargs.len()
            ),
            call.span,
            rt.file(),
        ));
    }
    Ok(call.args.first().cloned())
}

fn not_constructible(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    Err(FoxError::type_error(
        "This prelude class cannot be instantiated",
        call.span,
        rt.file(),
    ))
}

fn convert_int(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    let Some(value) = single_argument(rt, &call, "int")? else {
        return Ok(rt.prelude.int(0));
    };
    let converted = match &value.borrow().payload {
        Payload::Int(n) => Ok(*n),
        Payload::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        Payload::Bool(b) => Ok(*b as i64),
        Payload::Str(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid literal for int(): '{}'", s)),
        _ => Err(format!("int() cannot convert {}", value.type_name())),
    };
    converted
        .map(|n| rt.prelude.int(n))
        .map_err(|message| FoxError::value_error(message, call.span, rt.file()))
}

fn convert_float(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    let Some(value) = single_argument(rt, &call, "float")? else {
        return Ok(rt.prelude.float(0.0));
    };
    let converted = match &value.borrow().payload {
        Payload::Int(n) => Ok(*n as f64),
        Payload::Float(f) => Ok(*f),
        Payload::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Payload::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid literal for float(): '{}'", s)),
        _ => Err(format!("float() cannot convert {}", value.type_name())),
    };
    converted
        .map(|f| rt.prelude.float(f))
        .map_err(|message| FoxError::value_error(message, call.span, rt.file()))
}

fn convert_str(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    let text = single_argument(rt, &call, "str")?
        .map(|value| value.to_string())
        .unwrap_or_default();
    Ok(rt.prelude.str(text))
}

fn convert_bool(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    let truthy = single_argument(rt, &call, "bool")?.is_some_and(|value| value.is_truthy());
    Ok(rt.prelude.bool(truthy))
}

fn convert_array(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    let Some(value) = single_argument(rt, &call, "array")? else {
        return Ok(rt.prelude.array(Vec::new()));
    };
    let items = match &value.borrow().payload {
        Payload::Array(items) => Some(items.clone()),
        Payload::Dict(dict) => Some(dict.keys()),
        Payload::Str(s) => Some(s.chars().map(|c| rt.prelude.str(c)).collect()),
        _ => None,
    };
    match items {
        Some(items) => Ok(rt.prelude.array(items)),
        None => Err(FoxError::type_error(
            format!("array() cannot convert {}", value.type_name()),
            call.span,
            rt.file(),
        )),
    }
}

fn convert_dict(rt: &mut Runtime, call: NativeCall) -> FoxResult<Value> {
    match single_argument(rt, &call, "dict")? {
        None => Ok(rt.prelude.dict(Dict::new())),
        Some(value) => {
            let copied = match &value.borrow().payload {
                Payload::Dict(dict) => Some(dict.clone()),
                _ => None,
            };
            copied.map(|dict| rt.prelude.dict(dict)).ok_or_else(|| {
                FoxError::type_error(
                    format!("dict() cannot convert {}", value.type_name()),
                    call.span,
                    rt.file(),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::type_match;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hierarchy_distances() {
        let prelude = Prelude::new();
        let five = prelude.int(5);

        let int = TypeSpec::nominal(prelude.int.clone());
        let number = TypeSpec::nominal(prelude.number.clone());
        let object = TypeSpec::nominal(prelude.object.clone());
        let candidate = prelude.candidate_type(&five);

        assert_eq!(type_match(&int, &candidate), Some(0));
        assert_eq!(type_match(&number, &candidate), Some(1));
        assert_eq!(type_match(&object, &candidate), Some(2));
    }

    #[test]
    fn test_booleans_and_null_are_singletons() {
        let prelude = Prelude::new();
        assert!(prelude.bool(true).ptr_eq(&prelude.bool(true)));
        assert!(prelude.null().ptr_eq(&prelude.null()));
        assert_eq!(prelude.null().type_name(), "none");
    }

    #[test]
    fn test_classes_report_class() {
        let prelude = Prelude::new();
        assert!(prelude.class_of(&prelude.int).ptr_eq(&prelude.class));
        assert_eq!(prelude.str("x").type_name(), "str");
    }
}
