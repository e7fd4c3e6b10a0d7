// Foxscream Calls
// Function and class definition, overload dispatch, argument binding and
// instantiation

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::{CallArg, ClassDef, ClassKind, Expr, FunctionDef, ParamKind, TypeExpr};
use crate::error::{ErrorKind, FoxError, FoxResult, Span, StackFrame};
use crate::resolve::{
    resolve, select_overload, type_match, ArgRef, CallPlan, CallSignature, CallSite, Parameter,
    ResolveError, Slot, TypeSpec,
};

use super::capture::free_names;
use super::scope::{ScopeKind, Signal};
use super::value::{
    BoundMethod, Callable, ClassLink, Dict, DictKey, Function, NativeCall, Object, ObjectKind,
    Overload, Payload, Value,
};
use super::Runtime;

/// Arguments evaluated at a call site
struct Arguments {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl Runtime {
    // ==================== Call sites ====================

    pub(crate) fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[CallArg],
        expected: Option<TypeSpec>,
        span: Span,
    ) -> FoxResult<Value> {
        let target = self.eval_expr(callee)?;
        if self.scopes.interrupted() {
            return Ok(target);
        }

        let mut arguments = Arguments {
            positional: Vec::new(),
            keyword: Vec::new(),
        };
        for arg in args {
            let value = self.eval_expr(&arg.value)?;
            if self.scopes.interrupted() {
                return Ok(value);
            }
            match &arg.name {
                Some(name) => arguments.keyword.push((name.clone(), value)),
                None => arguments.positional.push(value),
            }
        }

        self.call_with(&target, arguments, expected, span)
    }

    /// Call `callee` with positional arguments only
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>, span: Span) -> FoxResult<Value> {
        let arguments = Arguments {
            positional: args,
            keyword: Vec::new(),
        };
        self.call_with(callee, arguments, None, span)
    }

    fn call_with(
        &mut self,
        callee: &Value,
        arguments: Arguments,
        expected: Option<TypeSpec>,
        span: Span,
    ) -> FoxResult<Value> {
        let (candidates, receiver) = match &callee.borrow().payload {
            Payload::Function(function) => (
                function
                    .overloads
                    .iter()
                    .map(|overload| (Rc::clone(overload), 0))
                    .collect::<Vec<_>>(),
                None,
            ),
            Payload::Bound(bound) => (bound.candidates.clone(), Some(bound.receiver.clone())),
            _ => (Vec::new(), None),
        };

        if candidates.is_empty() {
            if callee.is_class() {
                return self.instantiate(callee, arguments, span);
            }
            return Err(FoxError::new(
                ErrorKind::NotCallable,
                format!("'{}' is not callable", callee.type_name()),
                span,
                self.file(),
            ));
        }

        let name = callee.name();
        self.dispatch(&name, callee, &candidates, receiver, arguments, expected, span)
    }

    /// Select the best overload among `candidates` and invoke it
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &mut self,
        name: &str,
        callee: &Value,
        candidates: &[(Rc<Overload>, u32)],
        receiver: Option<Value>,
        arguments: Arguments,
        expected: Option<TypeSpec>,
        span: Span,
    ) -> FoxResult<Value> {
        let site = CallSite {
            positional: arguments
                .positional
                .iter()
                .map(|value| self.prelude.candidate_type(value))
                .collect(),
            keyword: arguments
                .keyword
                .iter()
                .map(|(name, value)| (name.clone(), self.prelude.candidate_type(value)))
                .collect(),
            expected_return: expected,
        };
        let signatures: Vec<(&CallSignature, u32)> = candidates
            .iter()
            .map(|(overload, distance)| (&overload.signature, *distance))
            .collect();

        let (index, plan) = select_overload(&signatures, &site)
            .map_err(|error| self.overload_error(error, name, &arguments, span))?;
        let overload = Rc::clone(&candidates[index].0);

        match &overload.body {
            Callable::Native(native) => native(
                self,
                NativeCall {
                    args: arguments.positional,
                    kwargs: arguments.keyword,
                    span,
                },
            ),
            Callable::User { def, closure } => self.call_user(
                &overload,
                def,
                closure,
                callee,
                receiver,
                arguments,
                &plan,
                span,
            ),
        }
    }

    fn overload_error(
        &self,
        error: ResolveError,
        name: &str,
        arguments: &Arguments,
        span: Span,
    ) -> FoxError {
        let shown = if name.is_empty() { "<fn>" } else { name };
        match error {
            ResolveError::AmbiguousOverload { candidates } => FoxError::new(
                ErrorKind::AmbiguousOverload,
                format!(
                    "Call to '{}' is ambiguous: {} overloads match equally well",
                    shown, candidates
                ),
                span,
                self.file(),
            )
            .with_help("Add an overload with more specific parameter types"),
            ResolveError::NoMatchingOverload { arity_only: true } => FoxError::new(
                ErrorKind::ArityMismatch,
                format!(
                    "No overload of '{}' takes {} argument(s)",
                    shown,
                    arguments.positional.len() + arguments.keyword.len()
                ),
                span,
                self.file(),
            ),
            ResolveError::NoMatchingOverload { arity_only: false } => {
                let mut types: Vec<String> = arguments
                    .positional
                    .iter()
                    .map(|value| value.type_name())
                    .collect();
                types.extend(
                    arguments
                        .keyword
                        .iter()
                        .map(|(name, value)| format!("{}={}", name, value.type_name())),
                );
                FoxError::type_error(
                    format!(
                        "No overload of '{}' accepts arguments ({})",
                        shown,
                        types.join(", ")
                    ),
                    span,
                    self.file(),
                )
            }
            other => self.resolve_error(other, span),
        }
    }

    // ==================== User functions ====================

    /// Run a user overload. The body sees, innermost first: its parameters,
    /// the receiver's fields (methods only), a fresh copy of the captured
    /// variables, then the globals.
    #[allow(clippy::too_many_arguments)]
    fn call_user(
        &mut self,
        overload: &Overload,
        def: &Rc<FunctionDef>,
        closure: &Rc<FxHashMap<String, Value>>,
        callee: &Value,
        receiver: Option<Value>,
        arguments: Arguments,
        plan: &CallPlan,
        span: Span,
    ) -> FoxResult<Value> {
        if self.depth >= self.config.max_call_depth {
            return Err(FoxError::runtime_error(
                format!(
                    "Stack overflow: call depth exceeded {}",
                    self.config.max_call_depth
                ),
                span,
                self.file(),
            ));
        }
        self.depth += 1;

        let saved = self.scopes.current();
        let root = self.scopes.root();
        let closure_scope = self.scopes.enter(ScopeKind::Closure, root, None);
        for (name, value) in closure.iter() {
            self.scopes.bind(name.clone(), value.deep_copy());
        }

        let fields_layer = match &receiver {
            Some(target) if !target.borrow().fields.is_empty() => {
                let layer = self.scopes.descend(ScopeKind::Fields, None);
                let fields: Vec<(String, Value)> = target
                    .borrow()
                    .fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                // Sibling methods called by bare name keep the receiver
                let mut seeded: FxHashMap<String, Value> = FxHashMap::default();
                for (name, value) in fields {
                    let value = if matches!(value.borrow().payload, Payload::Function(_)) {
                        let candidates = self.method_candidates(target, &name);
                        self.prelude.bound(
                            &name,
                            BoundMethod {
                                receiver: target.clone(),
                                candidates,
                            },
                        )
                    } else {
                        value
                    };
                    self.scopes.bind(name.clone(), value.clone());
                    seeded.insert(name, value);
                }
                Some((layer, target.clone(), seeded))
            }
            _ => None,
        };

        let function_scope = self.scopes.descend(ScopeKind::Function, None);
        if let Some(name) = &def.name {
            self.scopes.bind(name.clone(), callee.clone());
        }
        if let Some(target) = &receiver {
            self.scopes.bind("self", target.clone());
        }

        let result = self
            .bind_arguments(&overload.signature, def, arguments, plan)
            .and_then(|_| self.eval_statements(&def.body));
        let result = self.run_defers(function_scope, result);
        let signal = self.scopes.take_signal(function_scope);
        self.scopes.release(function_scope);

        if let Some((layer, target, seeded)) = fields_layer {
            let changed: Vec<(String, Value)> = self
                .scopes
                .bindings(layer)
                .iter()
                .filter(|(name, value)| !seeded.get(*name).is_some_and(|old| old.ptr_eq(value)))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            if !changed.is_empty() {
                target.borrow_mut().fields.extend(changed);
            }
            self.scopes.release(layer);
        }
        self.scopes.release(closure_scope);
        self.scopes.set_current(saved);
        self.depth -= 1;

        let value = match (result, signal) {
            (Ok(_), Signal::Returning { value, .. }) => value,
            (Ok(value), _) => value,
            (Err(mut error), _) => {
                error.push_frame(StackFrame::new(
                    overload.name.clone(),
                    self.file(),
                    span.start.line,
                    span.start.column,
                ));
                return Err(error);
            }
        };

        if let Some(declared) = &overload.signature.return_type {
            let candidate = self.prelude.candidate_type(&value);
            if type_match(declared, &candidate).is_none() {
                return Err(FoxError::type_error(
                    format!(
                        "'{}' is declared to return {} but returned '{}'",
                        overload.name,
                        declared,
                        value.type_name()
                    ),
                    span,
                    self.file(),
                ));
            }
        }
        Ok(value)
    }

    /// Bind arguments into the current (function) scope following `plan`.
    /// Missing keyword parameters evaluate their default here, after the
    /// parameters before them are bound.
    fn bind_arguments(
        &mut self,
        signature: &CallSignature,
        def: &FunctionDef,
        arguments: Arguments,
        plan: &CallPlan,
    ) -> FoxResult<()> {
        for (slot, arg) in plan.slots.iter().enumerate() {
            let Some(param) = signature.parameter(slot) else {
                continue;
            };
            let value = match arg {
                Some(ArgRef::Positional(i)) => arguments.positional[*i].clone(),
                Some(ArgRef::Keyword(i)) => arguments.keyword[*i].1.clone(),
                None => self.default_value(def, &param.name)?,
            };
            self.scopes.bind(param.name.clone(), value);
        }

        if let Some(rest) = &signature.var_positional {
            let items = plan
                .extra_positional
                .iter()
                .map(|&i| arguments.positional[i].clone())
                .collect();
            let value = self.prelude.array(items);
            self.scopes.bind(rest.name.clone(), value);
        }

        if let Some(options) = &signature.var_keyword {
            let mut dict = Dict::new();
            for &i in &plan.extra_keyword {
                let (name, value) = &arguments.keyword[i];
                dict.insert(
                    DictKey::Str(name.clone()),
                    self.prelude.str(name.as_str()),
                    value.clone(),
                );
            }
            let value = self.prelude.dict(dict);
            self.scopes.bind(options.name.clone(), value);
        }
        Ok(())
    }

    fn default_value(&mut self, def: &FunctionDef, name: &str) -> FoxResult<Value> {
        let default = def.params.iter().find_map(|param| match &param.kind {
            ParamKind::Keyword(expr) if param.name == name => Some(expr),
            _ => None,
        });
        match default {
            Some(expr) => self.eval_expr(expr),
            None => Ok(self.prelude.null()),
        }
    }

    // ==================== Definitions ====================

    /// Build the declared type a type annotation names
    pub(crate) fn eval_type(&mut self, ty: &TypeExpr) -> FoxResult<TypeSpec> {
        match ty {
            TypeExpr::Named { name, span } => {
                let class = self
                    .scopes
                    .get(name)
                    .ok_or_else(|| FoxError::undeclared_name(name, *span, self.file()))?;
                if !class.is_class() {
                    return Err(FoxError::type_error(
                        format!("'{}' is not a class and cannot be used as a type", name),
                        *span,
                        self.file(),
                    ));
                }
                Ok(TypeSpec::nominal(class))
            }
            TypeExpr::Variants { members, .. } => Ok(TypeSpec::variants(self.eval_types(members)?)),
            TypeExpr::Union { members, .. } => Ok(TypeSpec::union(self.eval_types(members)?)),
            TypeExpr::Exclude { base, excluded, .. } => {
                let base = self.eval_type(base)?;
                Ok(base.excluding(self.eval_types(excluded)?))
            }
            TypeExpr::Fields { fields, .. } => {
                let mut declared = Vec::with_capacity(fields.len());
                for (name, field) in fields {
                    declared.push((name.clone(), self.eval_type(field)?));
                }
                declared.sort_by(|a, b| a.0.cmp(&b.0));
                Ok(TypeSpec::structural(declared))
            }
        }
    }

    fn eval_types(&mut self, members: &[TypeExpr]) -> FoxResult<Vec<TypeSpec>> {
        members.iter().map(|member| self.eval_type(member)).collect()
    }

    fn build_signature(&mut self, def: &FunctionDef) -> FoxResult<CallSignature> {
        let mut signature = CallSignature {
            return_type: def
                .return_type
                .as_ref()
                .map(|ty| self.eval_type(ty))
                .transpose()?,
            ..CallSignature::default()
        };

        for param in &def.params {
            let ty = match &param.type_hint {
                Some(hint) => self.eval_type(hint)?,
                None => TypeSpec::nominal(self.prelude.object.clone()),
            };
            let parameter = Parameter::new(param.name.clone(), ty);
            match param.kind {
                ParamKind::Positional => signature.positional.push(parameter),
                ParamKind::Keyword(_) => signature.keyword.push(parameter),
                ParamKind::VarPositional => signature.var_positional = Some(parameter),
                ParamKind::VarKeyword => signature.var_keyword = Some(parameter),
            }
        }
        Ok(signature)
    }

    /// Evaluate a function expression. A named declaration joins the
    /// function already bound to that name in the current scope as a new
    /// overload.
    pub(crate) fn define_function(&mut self, def: &Rc<FunctionDef>) -> FoxResult<Value> {
        let signature = self.build_signature(def)?;

        let mut captured = FxHashMap::default();
        for name in free_names(def) {
            let Some(value) = self.scopes.get(&name) else {
                continue;
            };
            if self
                .builtins
                .get(&name)
                .is_some_and(|builtin| builtin.ptr_eq(&value))
            {
                continue;
            }
            captured.insert(name, value.deep_copy());
        }

        let name = def.name.clone().unwrap_or_default();
        let overload = Rc::new(Overload::new(
            name.as_str(),
            signature,
            Callable::User {
                def: Rc::clone(def),
                closure: Rc::new(captured),
            },
        ));

        if name.is_empty() {
            return Ok(self.prelude.function(
                "",
                Function {
                    overloads: vec![overload],
                },
            ));
        }

        let current = self.scopes.current();
        let existing = self
            .scopes
            .bindings(current)
            .get(&name)
            .and_then(|value| match &value.borrow().payload {
                Payload::Function(function) => Some(function.clone()),
                _ => None,
            });
        let function = match existing {
            Some(function) => function.with_overload(overload),
            None => Function {
                overloads: vec![overload],
            },
        };
        let value = self.prelude.function(&name, function);
        self.scopes.bind(name, value.clone());
        Ok(value)
    }

    fn eval_parent(&mut self, expr: &Expr, after_has: bool) -> FoxResult<Value> {
        let parent = self.eval_expr(expr)?;
        if !parent.is_class() {
            return Err(FoxError::type_error(
                format!("Cannot inherit from '{}', which is not a class", parent),
                expr.span(),
                self.file(),
            ));
        }
        if parent.class_kind() == Some(ClassKind::Trait) && !after_has {
            return Err(FoxError::type_error(
                format!("Trait '{}' can only be listed after 'has'", parent.name()),
                expr.span(),
                self.file(),
            ));
        }
        Ok(parent)
    }

    /// Evaluate a class declaration: parents, then the body in a class
    /// scope, then the resolution tables
    pub(crate) fn define_class(&mut self, def: &Rc<ClassDef>) -> FoxResult<Value> {
        let mut parents = Vec::with_capacity(def.parents.len() + def.traits.len() + 1);
        for parent in &def.parents {
            parents.push(self.eval_parent(parent, false)?);
        }
        if parents.is_empty() {
            parents.push(self.prelude.object.clone());
        }
        for mixin in &def.traits {
            parents.push(self.eval_parent(mixin, true)?);
        }

        let saved = self.scopes.current();
        let scope = self.scopes.descend(ScopeKind::Class, None);
        let result = self.eval_statements(&def.body);
        let result = self.run_defers(scope, result);
        let record = self.scopes.release(scope);
        self.scopes.set_current(saved);
        result?;

        let name = def.name.clone().unwrap_or_default();
        let mut object = Object::new(
            ObjectKind::Class(def.kind),
            ClassLink::SelfClass,
            Payload::None,
        );
        object.name = name.clone();
        object.parents = parents;
        if let Some(record) = record {
            for (field, value) in record.bindings {
                if record.statics.contains(&field) {
                    object.fields.insert(field, value);
                } else {
                    object.template.insert(field, value);
                }
            }
        }

        let class = Value::new(object);
        let resolution = resolve(&class);
        debug!(
            class = %name,
            ancestors = resolution.ancestry.len(),
            class_fields = resolution.class_fields.len(),
            instance_fields = resolution.instance_fields.len(),
            "class defined"
        );
        class.borrow_mut().resolution = Some(Rc::new(resolution));

        if !name.is_empty() {
            self.scopes.bind(name, class.clone());
        }
        Ok(class)
    }

    // ==================== Objects ====================

    /// Every definition of `name` visible from `receiver`, each with its
    /// field distance. Overloads reachable along several paths keep their
    /// nearest distance.
    pub(crate) fn method_candidates(&self, receiver: &Value, name: &str) -> Vec<(Rc<Overload>, u32)> {
        let mut found: Vec<(Rc<Overload>, u32)> = Vec::new();
        let mut collect = |value: Option<Value>, distance: u32| {
            let Some(value) = value else {
                return;
            };
            let object = value.borrow();
            let Payload::Function(function) = &object.payload else {
                return;
            };
            for overload in &function.overloads {
                match found.iter_mut().find(|(seen, _)| seen.id == overload.id) {
                    Some(entry) => entry.1 = entry.1.min(distance),
                    None => found.push((Rc::clone(overload), distance)),
                }
            }
        };

        collect(receiver.get_own_field(name), 0);

        if receiver.is_class() {
            let resolution = self.resolution_of(receiver);
            for (ancestor, distance) in &resolution.ancestry {
                collect(ancestor.get_own_field(name), *distance);
            }
        } else {
            let class = self.prelude.class_of(receiver);
            let resolution = self.resolution_of(&class);
            let lineage = std::iter::once((class.clone(), 0)).chain(resolution.ancestry.iter().cloned());
            for (ancestor, distance) in lineage {
                let template = ancestor.borrow().template.get(name).cloned();
                collect(template, distance + 1);
                collect(ancestor.get_own_field(name), distance + 1);
            }
        }
        found
    }

    /// Call a class value: build an instance from the flattened template,
    /// then run `init`
    fn instantiate(&mut self, class: &Value, arguments: Arguments, span: Span) -> FoxResult<Value> {
        let (kind, converter) = {
            let object = class.borrow();
            (object.kind, object.converter)
        };
        if let Some(convert) = converter {
            return convert(
                self,
                NativeCall {
                    args: arguments.positional,
                    kwargs: arguments.keyword,
                    span,
                },
            );
        }
        match kind {
            ObjectKind::Class(ClassKind::Static) => {
                return Err(FoxError::runtime_error(
                    format!("Cannot instantiate static class '{}'", class.name()),
                    span,
                    self.file(),
                ))
            }
            ObjectKind::Class(ClassKind::Trait) => {
                return Err(FoxError::runtime_error(
                    format!("Cannot instantiate trait '{}'", class.name()),
                    span,
                    self.file(),
                ))
            }
            _ => {}
        }

        let resolution = self.resolution_of(class);
        let mut object = Object::new(
            ObjectKind::Instance,
            ClassLink::Of(class.clone()),
            Payload::None,
        );
        object.parents = vec![class.clone()];
        for (name, slot) in resolution.instance_fields.iter() {
            if let Slot::Owned { owner, .. } = slot {
                if let Some(value) = owner.borrow().template.get(name) {
                    object.fields.insert(name.clone(), value.deep_copy());
                }
            }
        }
        let instance = Value::new(object);

        let candidates = self.method_candidates(&instance, "init");
        if candidates.is_empty() {
            if !arguments.positional.is_empty() || !arguments.keyword.is_empty() {
                return Err(FoxError::new(
                    ErrorKind::ArityMismatch,
                    format!(
                        "'{}' has no init and takes no arguments",
                        class.name()
                    ),
                    span,
                    self.file(),
                ));
            }
            return Ok(instance);
        }

        let init = instance
            .get_own_field("init")
            .unwrap_or_else(|| self.prelude.null());
        self.dispatch("init", &init, &candidates, Some(instance.clone()), arguments, None, span)?;
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Value {
        Runtime::new().run(source).unwrap()
    }

    fn error_kind(source: &str) -> ErrorKind {
        Runtime::new().run(source).unwrap_err().kind
    }

    #[test]
    fn test_keyword_defaults_and_varargs() {
        let source = "fn f(a, b = a + 1, *rest, **opts) { [a, b, rest, opts] }
                      f(1, 5, 6, 7, flag=true)";
        assert_eq!(eval(source).to_string(), "[1, 5, [6, 7], [\"flag\": true]]");
        assert_eq!(eval("fn g(a, b = a + 1) { b }; g(1)").to_string(), "2");
        assert_eq!(eval("fn h(a, b = 0) { a - b }; h(b=1, a=10)").to_string(), "9");
    }

    #[test]
    fn test_method_reached_through_diamond_is_one_candidate() {
        let source = "class Base { fn who() { \"base\" } }
                      class L of Base { }
                      class R of Base { }
                      class D of L, R { }
                      [D().who(), D.who()]";
        assert_eq!(eval(source).to_string(), "[\"base\", \"base\"]");
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(error_kind("fn f(a) { a }; f()"), ErrorKind::ArityMismatch);
        assert_eq!(error_kind("fn f(a) { a }; f(1, 2)"), ErrorKind::ArityMismatch);
        assert_eq!(error_kind("fn f(a) { a }; f(b=1)"), ErrorKind::ArityMismatch);
    }

    #[test]
    fn test_type_mismatch_lists_argument_types() {
        let error = Runtime::new()
            .run("fn f(a: int) { a }; f(\"x\")")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::TypeError);
        assert!(error.message.contains("(str)"));
    }

    #[test]
    fn test_redeclaring_identical_signature_replaces() {
        assert_eq!(eval("fn f(a) { 1 }; fn f(a) { 2 }; f(0)").to_string(), "2");
    }

    #[test]
    fn test_overload_keeps_other_aliases() {
        let source = "fn f(a: int) { \"int\" }
                      g = f
                      fn f(a: str) { \"str\" }
                      [f(\"x\"), f(1)]";
        assert_eq!(eval(source).to_string(), "[\"str\", \"int\"]");
        assert_eq!(
            error_kind("fn f(a: int) { 1 }; g = f; fn f(a: str) { 2 }; g(\"x\")"),
            ErrorKind::TypeError
        );
    }

    #[test]
    fn test_recursion_through_own_name() {
        assert_eq!(
            eval("fn fact(n) { if n <= 1 { 1 } else { n * fact(n - 1) } }; fact(10)").to_string(),
            "3628800"
        );
    }

    #[test]
    fn test_call_depth_limit() {
        let error = Runtime::new()
            .run("fn down(n) { down(n + 1) }; down(0)")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::RuntimeError);
        assert!(error.message.starts_with("Stack overflow"));
        assert!(!error.stack_trace.is_empty());
    }

    #[test]
    fn test_declared_return_type_is_checked() {
        assert_eq!(error_kind("fn f() -> int { \"no\" }; f()"), ErrorKind::TypeError);
        assert_eq!(eval("fn f() -> number { 2 }; f()").to_string(), "2");
    }

    #[test]
    fn test_static_class_and_trait_cannot_be_instantiated() {
        assert_eq!(error_kind("static class S { }; S()"), ErrorKind::RuntimeError);
        assert_eq!(error_kind("trait class T { }; T()"), ErrorKind::RuntimeError);
        assert_eq!(error_kind("trait class T { }; class C of T { }"), ErrorKind::TypeError);
    }

    #[test]
    fn test_static_members_live_on_the_class() {
        let source = "class Counter { static made = 0; static fn bump() { made += 1 } }
                      Counter.bump(); Counter.bump()
                      Counter.made";
        assert_eq!(eval(source).to_string(), "2");
    }

    #[test]
    fn test_not_callable() {
        assert_eq!(error_kind("x = 3; x()"), ErrorKind::NotCallable);
    }
}
