// Foxscream Evaluator
// Statements, expressions, control flow and field access

use std::rc::Rc;

use tracing::{trace, warn};

use crate::ast::{AssignOp, BinaryOp, Expr, Literal, MatchArm, Stmt, TypeExpr};
use crate::error::{ErrorKind, FoxError, FoxResult, Span};
use crate::resolve::{ancestor_distance, resolve, type_match, Resolution, ResolveError};

use super::ops::{self, OpError};
use super::scope::{ScopeId, ScopeKind, Signal};
use super::value::{BoundMethod, ObjectKind, Payload, Value};
use super::Runtime;

/// Remaining stack below which evaluation switches to a fresh segment
const RED_ZONE: usize = 100 * 1024;
/// Size of each freshly allocated stack segment
const STACK_GROWTH: usize = 1024 * 1024;

/// Where an assignment stores its value
enum Place {
    Name(String),
    Field(Value, String),
    Index(Value, Value),
}

impl Runtime {
    // ==================== Statements ====================

    /// Evaluate `statements` in the current scope until one raises a signal
    pub(crate) fn eval_statements(&mut self, statements: &[Stmt]) -> FoxResult<Value> {
        let mut last = self.prelude.null();
        for stmt in statements {
            if self.scopes.interrupted() {
                break;
            }
            trace!(line = stmt.span().start.line, "statement");
            last = self.eval_statement(stmt)?;
        }
        Ok(last)
    }

    fn eval_statement(&mut self, stmt: &Stmt) -> FoxResult<Value> {
        match stmt {
            Stmt::Expression { expr, .. } => self.eval_expr(expr),
            Stmt::Defer { expr, .. } => {
                self.scopes.register_defer(Rc::clone(expr));
                Ok(self.prelude.null())
            }
            Stmt::Static { expr, span } => {
                let current = self.scopes.current();
                if self.scopes.scope(current).kind != ScopeKind::Class {
                    return Err(FoxError::runtime_error(
                        "'static' is only allowed directly inside a class body",
                        *span,
                        self.file(),
                    ));
                }
                let name = static_name(expr).ok_or_else(|| {
                    FoxError::runtime_error(
                        "'static' needs an assignment or a named declaration",
                        *span,
                        self.file(),
                    )
                })?;
                let value = self.eval_expr(expr)?;
                self.scopes.mark_static(name);
                Ok(value)
            }
        }
    }

    /// Loop and function bodies run their statements directly in the scope
    /// already prepared for them
    pub(crate) fn eval_body(&mut self, body: &Expr) -> FoxResult<Value> {
        match body {
            Expr::Block { statements, .. } => self.eval_statements(statements),
            other => self.eval_expr(other),
        }
    }

    // ==================== Scoped evaluation ====================

    /// Run `body` in a new scope under the current one. The scope's defers
    /// run and the scope is released whatever `body` returns.
    pub(crate) fn scoped<F>(
        &mut self,
        kind: ScopeKind,
        label: Option<String>,
        body: F,
    ) -> FoxResult<Value>
    where
        F: FnOnce(&mut Self, ScopeId) -> FoxResult<Value>,
    {
        let saved = self.scopes.current();
        let id = self.scopes.descend(kind, label);
        let result = body(self, id);
        let result = self.run_defers(id, result);
        self.scopes.release(id);
        self.scopes.set_current(saved);
        result
    }

    /// Run the deferred expressions of scope `id`, newest first, inside that
    /// scope. The value of the last defer becomes the scope's value. While
    /// they run, the pending signal is set aside; a defer raising its own
    /// signal replaces it.
    pub(crate) fn run_defers(&mut self, id: ScopeId, result: FoxResult<Value>) -> FoxResult<Value> {
        let defers = self.scopes.take_defers(id);
        let Some(first) = defers.first() else {
            return result;
        };
        let span = first.span();

        let saved = self.scopes.current();
        self.scopes.set_current(id);

        let mut pending = self.scopes.signal(id).clone();
        if pending.is_set() {
            self.scopes.clear_signal_path(id, &pending);
        }

        let mut value = None;
        let mut failure: Option<FoxError> = None;
        for expr in &defers {
            match self.eval_expr(expr) {
                Ok(v) => value = Some(v),
                Err(error) => {
                    if result.is_err() || failure.is_some() {
                        warn!(error = %error.message, "error raised by a deferred expression was discarded");
                    } else {
                        failure = Some(error);
                    }
                }
            }
            let raised = self.scopes.signal(id).clone();
            if raised.is_set() {
                self.scopes.clear_signal_path(id, &raised);
                pending = raised;
            }
        }

        let delivered = if pending.is_set() && result.is_ok() {
            self.deliver(pending, span)
        } else {
            Ok(())
        };
        self.scopes.set_current(saved);

        match (result, failure) {
            (Err(error), _) => Err(error),
            (Ok(_), Some(error)) => Err(error),
            (Ok(body_value), None) => {
                delivered?;
                Ok(value.unwrap_or(body_value))
            }
        }
    }

    /// Raise `signal` from the current scope
    pub(crate) fn deliver(&mut self, signal: Signal, span: Span) -> FoxResult<()> {
        self.scopes.raise(signal).map_err(|undelivered| {
            let keyword = undelivered.keyword;
            match undelivered.label {
                Some(label) => FoxError::label_not_found(
                    format!("No enclosing construct labeled '{}' for '{}'", label, keyword),
                    span,
                    self.file(),
                ),
                None => {
                    let message = match keyword {
                        "break" | "continue" => format!("'{}' outside of a loop", keyword),
                        "leave" => "'leave' outside of a block".to_string(),
                        _ => format!("'{}' outside of a function", keyword),
                    };
                    FoxError::runtime_error(message, span, self.file())
                }
            }
        })
    }

    // ==================== Expressions ====================

    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> FoxResult<Value> {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.eval_node(expr))
    }

    fn eval_node(&mut self, expr: &Expr) -> FoxResult<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Int(n) => self.prelude.int(*n),
                Literal::Float(f) => self.prelude.float(*f),
                Literal::Str(s) => self.prelude.str(s.as_str()),
            }),

            Expr::Identifier { name, span } => self
                .scopes
                .get(name)
                .ok_or_else(|| FoxError::undeclared_name(name, *span, self.file())),

            Expr::Binary {
                left,
                op,
                right,
                span,
            } => self.eval_binary(left, *op, right, *span),

            Expr::Unary { op, operand, span } => {
                let value = self.eval_expr(operand)?;
                if self.scopes.interrupted() {
                    return Ok(value);
                }
                ops::unary(&self.prelude, *op, &value).map_err(|e| self.op_error(e, *span))
            }

            Expr::Assignment {
                target,
                op,
                type_hint,
                value,
                span,
            } => self.eval_assignment(target, *op, type_hint.as_ref(), value, *span),

            Expr::Call { callee, args, span } => self.eval_call(callee, args, None, *span),

            Expr::Field { object, name, span } => {
                let receiver = self.eval_expr(object)?;
                if self.scopes.interrupted() {
                    return Ok(receiver);
                }
                self.get_field(&receiver, name, *span)
            }

            Expr::Index {
                object,
                index,
                span,
            } => {
                let target = self.eval_expr(object)?;
                let key = self.eval_expr(index)?;
                if self.scopes.interrupted() {
                    return Ok(self.prelude.null());
                }
                ops::index(&self.prelude, &target, &key).map_err(|e| self.op_error(e, *span))
            }

            Expr::Slice {
                object,
                start,
                end,
                step,
                span,
            } => {
                let target = self.eval_expr(object)?;
                let start = self.eval_optional(start)?;
                let end = self.eval_optional(end)?;
                let step = self.eval_optional(step)?;
                if self.scopes.interrupted() {
                    return Ok(self.prelude.null());
                }
                ops::slice(
                    &self.prelude,
                    &target,
                    start.as_ref(),
                    end.as_ref(),
                    step.as_ref(),
                )
                .map_err(|e| self.op_error(e, *span))
            }

            Expr::Array { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval_expr(element)?);
                    if self.scopes.interrupted() {
                        break;
                    }
                }
                Ok(self.prelude.array(items))
            }

            Expr::Dictionary { entries, span } => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval_expr(key)?;
                    let value = self.eval_expr(value)?;
                    if self.scopes.interrupted() {
                        return Ok(self.prelude.null());
                    }
                    pairs.push((key, value));
                }
                ops::build_dict(&self.prelude, pairs).map_err(|e| self.op_error(e, *span))
            }

            Expr::Block { statements, .. } => self.eval_block(statements, None),

            Expr::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.eval_if(condition, then_branch, else_branch.as_deref(), None),

            Expr::While {
                condition,
                body,
                else_branch,
                ..
            } => self.eval_while(condition, body, else_branch.as_deref(), None),

            Expr::DoWhile {
                body, condition, ..
            } => self.eval_do_while(body, condition, None),

            Expr::For {
                variable,
                iterable,
                body,
                else_branch,
                span,
            } => self.eval_for(variable, iterable, body, else_branch.as_deref(), None, *span),

            Expr::Match {
                subject,
                arms,
                default,
                ..
            } => self.eval_match(subject, arms, default.as_deref(), None),

            Expr::Function { def } => self.define_function(def),

            Expr::Class { def } => self.define_class(def),

            Expr::Return { value, span } => {
                let result = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => self.prelude.null(),
                };
                if self.scopes.interrupted() {
                    return Ok(result);
                }
                self.deliver(
                    Signal::Returning {
                        explicit: value.is_some(),
                        value: result.clone(),
                    },
                    *span,
                )?;
                Ok(result)
            }

            Expr::Break { label, span } => {
                self.deliver(Signal::Breaking(label.clone()), *span)?;
                Ok(self.prelude.null())
            }

            Expr::Continue { label, span } => {
                self.deliver(Signal::Continuing(label.clone()), *span)?;
                Ok(self.prelude.null())
            }

            Expr::Leave { label, span } => {
                self.deliver(Signal::Leaving(label.clone()), *span)?;
                Ok(self.prelude.null())
            }

            Expr::Labeled { label, body, span } => self.eval_labeled(label, body, *span),
        }
    }

    fn eval_optional(&mut self, expr: &Option<Box<Expr>>) -> FoxResult<Option<Value>> {
        match expr {
            Some(expr) => self.eval_expr(expr).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn op_error(&self, error: OpError, span: Span) -> FoxError {
        FoxError::new(error.kind, error.message, span, self.file())
    }

    pub(crate) fn resolve_error(&self, error: ResolveError, span: Span) -> FoxError {
        let kind = match &error {
            ResolveError::AmbiguousField { .. } => ErrorKind::AmbiguousField,
            ResolveError::AmbiguousOverload { .. } => ErrorKind::AmbiguousOverload,
            ResolveError::NoMatchingOverload { arity_only: true } => ErrorKind::ArityMismatch,
            ResolveError::NoMatchingOverload { arity_only: false } => ErrorKind::TypeError,
        };
        let mut fox = FoxError::new(kind, capitalize(&error.to_string()), span, self.file());
        if kind == ErrorKind::AmbiguousField {
            fox = fox.with_help("Override the field in the class to pick one definition");
        }
        fox
    }

    // ==================== Operators ====================

    fn eval_binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr, span: Span) -> FoxResult<Value> {
        let lhs = self.eval_expr(left)?;
        if self.scopes.interrupted() {
            return Ok(lhs);
        }

        match op {
            BinaryOp::And if !lhs.is_truthy() => return Ok(lhs),
            BinaryOp::Or if lhs.is_truthy() => return Ok(lhs),
            BinaryOp::And | BinaryOp::Or => return self.eval_expr(right),
            _ => {}
        }

        let rhs = self.eval_expr(right)?;
        if self.scopes.interrupted() {
            return Ok(rhs);
        }

        let holds = match op {
            BinaryOp::In | BinaryOp::NotIn => {
                ops::contains(&rhs, &lhs).map_err(|e| self.op_error(e, span))?
            }
            BinaryOp::Has | BinaryOp::NotHas => self.relation_has(&lhs, &rhs, span)?,
            BinaryOp::Of | BinaryOp::NotOf => {
                if !rhs.is_class() {
                    return Err(FoxError::type_error(
                        format!("Right operand of 'of' must be a class, not '{}'", rhs.type_name()),
                        span,
                        self.file(),
                    ));
                }
                self.is_a(&lhs, &rhs)
            }
            BinaryOp::Is | BinaryOp::IsNot => lhs.ptr_eq(&rhs),
            _ => {
                return ops::binary(&self.prelude, op, &lhs, &rhs)
                    .map_err(|e| self.op_error(e, span));
            }
        };

        let negated = matches!(
            op,
            BinaryOp::NotIn | BinaryOp::NotHas | BinaryOp::NotOf | BinaryOp::IsNot
        );
        Ok(self.prelude.bool(holds != negated))
    }

    fn relation_has(&self, subject: &Value, probe: &Value, span: Span) -> FoxResult<bool> {
        if let Some(name) = probe.as_str() {
            return Ok(!matches!(self.lookup_field(subject, &name), Ok(None)));
        }
        if probe.is_class() {
            return Ok(self.is_a(subject, probe));
        }
        Err(FoxError::type_error(
            format!(
                "Right operand of 'has' must be a field name or a trait, not '{}'",
                probe.type_name()
            ),
            span,
            self.file(),
        ))
    }

    /// Whether `value` is an instance of `class` or, for class values, a
    /// subclass of it
    pub(crate) fn is_a(&self, value: &Value, class: &Value) -> bool {
        ancestor_distance(&self.prelude.class_of(value), class).is_some()
            || (value.is_class() && ancestor_distance(value, class).is_some())
    }

    // ==================== Assignment ====================

    fn eval_place(&mut self, target: &Expr, span: Span) -> FoxResult<Option<Place>> {
        let place = match target {
            Expr::Identifier { name, .. } => Place::Name(name.clone()),
            Expr::Field { object, name, .. } => Place::Field(self.eval_expr(object)?, name.clone()),
            Expr::Index { object, index, .. } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                Place::Index(object, index)
            }
            _ => {
                return Err(FoxError::syntax_error(
                    "Invalid assignment target",
                    span,
                    self.file(),
                ))
            }
        };
        if self.scopes.interrupted() {
            return Ok(None);
        }
        Ok(Some(place))
    }

    fn read_place(&mut self, place: &Place, span: Span) -> FoxResult<Value> {
        match place {
            Place::Name(name) => self
                .scopes
                .get(name)
                .ok_or_else(|| FoxError::undeclared_name(name, span, self.file())),
            Place::Field(object, name) => self.get_field(object, name, span),
            Place::Index(object, index) => {
                ops::index(&self.prelude, object, index).map_err(|e| self.op_error(e, span))
            }
        }
    }

    fn eval_assignment(
        &mut self,
        target: &Expr,
        op: AssignOp,
        type_hint: Option<&TypeExpr>,
        value: &Expr,
        span: Span,
    ) -> FoxResult<Value> {
        let declared = type_hint.map(|hint| self.eval_type(hint)).transpose()?;

        let Some(place) = self.eval_place(target, span)? else {
            return Ok(self.prelude.null());
        };

        let mut result = match value {
            Expr::Call {
                callee,
                args,
                span: call_span,
            } if declared.is_some() => self.eval_call(callee, args, declared.clone(), *call_span)?,
            other => self.eval_expr(other)?,
        };
        if self.scopes.interrupted() {
            return Ok(result);
        }

        if let Some(binary) = op.binary_op() {
            let current = self.read_place(&place, span)?;
            result = ops::binary(&self.prelude, binary, &current, &result)
                .map_err(|e| self.op_error(e, span))?;
        }

        if let Some(declared) = &declared {
            let candidate = self.prelude.candidate_type(&result);
            if type_match(declared, &candidate).is_none() {
                return Err(FoxError::type_error(
                    format!(
                        "Cannot assign '{}' to a binding declared as {}",
                        result.type_name(),
                        declared
                    ),
                    span,
                    self.file(),
                ));
            }
        }

        match place {
            Place::Name(name) => {
                let current = self.scopes.current();
                if self.scopes.scope(current).kind == ScopeKind::Class {
                    self.scopes.bind(name, result.clone());
                } else {
                    self.scopes.assign(&name, result.clone());
                }
            }
            Place::Field(object, name) => self.set_field(&object, &name, result.clone(), span)?,
            Place::Index(object, index) => ops::set_index(&object, &index, result.clone())
                .map_err(|e| self.op_error(e, span))?,
        }
        Ok(result)
    }

    // ==================== Fields ====================

    /// Resolution tables of `class`, computed on demand for classes that
    /// were never resolved
    pub(crate) fn resolution_of(&self, class: &Value) -> Rc<Resolution> {
        let cached = class.borrow().resolution.clone();
        match cached {
            Some(resolution) => resolution,
            None => {
                let resolution = Rc::new(resolve(class));
                class.borrow_mut().resolution = Some(Rc::clone(&resolution));
                resolution
            }
        }
    }

    /// Find `name` on `receiver`: own fields first, then the class-field
    /// table of its class (one step further away). Classes consult their
    /// own class-field table.
    pub(crate) fn lookup_field(
        &self,
        receiver: &Value,
        name: &str,
    ) -> Result<Option<(Value, u32)>, ResolveError> {
        if let Some(value) = receiver.get_own_field(name) {
            return Ok(Some((value, 0)));
        }

        if receiver.is_class() {
            let resolution = self.resolution_of(receiver);
            return Ok(resolution
                .class_fields
                .lookup(name)?
                .and_then(|(owner, distance)| {
                    owner.get_own_field(name).map(|value| (value, distance))
                }));
        }

        let class = self.prelude.class_of(receiver);
        let resolution = self.resolution_of(&class);
        // Ambiguous template names are never copied into instances
        resolution.instance_fields.lookup(name)?;
        Ok(resolution
            .class_fields
            .lookup(name)?
            .and_then(|(owner, distance)| {
                owner.get_own_field(name).map(|value| (value, distance + 1))
            }))
    }

    pub(crate) fn get_field(&mut self, receiver: &Value, name: &str, span: Span) -> FoxResult<Value> {
        let found = self
            .lookup_field(receiver, name)
            .map_err(|e| self.resolve_error(e, span))?;
        let Some((value, _)) = found else {
            return Err(FoxError::unknown_field(
                &receiver.type_name(),
                name,
                span,
                self.file(),
            ));
        };

        if !matches!(value.borrow().payload, Payload::Function(_)) {
            return Ok(value);
        }
        let candidates = self.method_candidates(receiver, name);
        Ok(self.prelude.bound(
            name,
            BoundMethod {
                receiver: receiver.clone(),
                candidates,
            },
        ))
    }

    pub(crate) fn set_field(
        &mut self,
        receiver: &Value,
        name: &str,
        value: Value,
        span: Span,
    ) -> FoxResult<()> {
        let kind = receiver.borrow().kind;
        match kind {
            ObjectKind::Primitive => Err(FoxError::type_error(
                format!("Cannot set field '{}' on a '{}' value", name, receiver.type_name()),
                span,
                self.file(),
            )),
            ObjectKind::Instance => {
                receiver.borrow_mut().fields.insert(name.to_string(), value);
                Ok(())
            }
            ObjectKind::Class(_) => {
                let added = receiver
                    .borrow_mut()
                    .fields
                    .insert(name.to_string(), value)
                    .is_none();
                if added {
                    let resolution = Rc::new(resolve(receiver));
                    receiver.borrow_mut().resolution = Some(resolution);
                }
                Ok(())
            }
        }
    }

    // ==================== Control flow ====================

    pub(crate) fn eval_block(&mut self, statements: &[Stmt], label: Option<String>) -> FoxResult<Value> {
        self.scoped(ScopeKind::Block, label, |rt, _| rt.eval_statements(statements))
    }

    /// Evaluate an `if` or `match` branch, handing the label to its block
    fn eval_branch(&mut self, branch: &Expr, label: Option<String>) -> FoxResult<Value> {
        match branch {
            Expr::Block { statements, .. } => self.eval_block(statements, label),
            Expr::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.eval_if(condition, then_branch, else_branch.as_deref(), label),
            other => self.eval_expr(other),
        }
    }

    fn eval_if(
        &mut self,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        label: Option<String>,
    ) -> FoxResult<Value> {
        let test = self.eval_expr(condition)?;
        if self.scopes.interrupted() {
            return Ok(test);
        }
        if test.is_truthy() {
            self.eval_branch(then_branch, label)
        } else {
            match else_branch {
                Some(branch) => self.eval_branch(branch, label),
                None => Ok(self.prelude.null()),
            }
        }
    }

    /// Run one loop iteration in its own block scope and settle the loop
    /// scope's signal. Returns whether the loop keeps going.
    fn iterate<F>(&mut self, loop_id: ScopeId, last: &mut Value, body: F) -> FoxResult<bool>
    where
        F: FnOnce(&mut Self) -> FoxResult<Value>,
    {
        let value = self.scoped(ScopeKind::Block, None, |rt, _| body(rt))?;
        let signal = self.scopes.take_signal(loop_id);
        if !self.scopes.scope(loop_id).absorbs(&signal) {
            let passing = signal.is_set();
            self.scopes.set_signal(loop_id, signal);
            if !passing {
                *last = value;
            }
            return Ok(!passing);
        }
        match signal {
            Signal::Continuing(_) => {
                *last = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn eval_else(&mut self, ran: bool, else_branch: Option<&Expr>, last: Value) -> FoxResult<Value> {
        match else_branch {
            Some(branch) if !ran && !self.scopes.interrupted() => self.eval_expr(branch),
            _ => Ok(last),
        }
    }

    fn eval_while(
        &mut self,
        condition: &Expr,
        body: &Expr,
        else_branch: Option<&Expr>,
        label: Option<String>,
    ) -> FoxResult<Value> {
        let mut ran = false;
        let last = self.scoped(ScopeKind::Loop, label, |rt, loop_id| {
            let mut last = rt.prelude.null();
            loop {
                let test = rt.eval_expr(condition)?;
                if rt.scopes.interrupted() || !test.is_truthy() {
                    break;
                }
                ran = true;
                if !rt.iterate(loop_id, &mut last, |rt| rt.eval_body(body))? {
                    break;
                }
            }
            Ok(last)
        })?;
        self.eval_else(ran, else_branch, last)
    }

    fn eval_do_while(&mut self, body: &Expr, condition: &Expr, label: Option<String>) -> FoxResult<Value> {
        self.scoped(ScopeKind::Loop, label, |rt, loop_id| {
            let mut last = rt.prelude.null();
            loop {
                if !rt.iterate(loop_id, &mut last, |rt| rt.eval_body(body))? {
                    break;
                }
                let test = rt.eval_expr(condition)?;
                if rt.scopes.interrupted() || !test.is_truthy() {
                    break;
                }
            }
            Ok(last)
        })
    }

    fn eval_for(
        &mut self,
        variable: &str,
        iterable: &Expr,
        body: &Expr,
        else_branch: Option<&Expr>,
        label: Option<String>,
        span: Span,
    ) -> FoxResult<Value> {
        let source = self.eval_expr(iterable)?;
        if self.scopes.interrupted() {
            return Ok(source);
        }
        let items = self.iteration_items(&source, span)?;

        let mut ran = false;
        let last = self.scoped(ScopeKind::Loop, label, |rt, loop_id| {
            let mut last = rt.prelude.null();
            for item in items {
                ran = true;
                let keep_going = rt.iterate(loop_id, &mut last, |rt| {
                    rt.scopes.bind(variable, item);
                    rt.eval_body(body)
                })?;
                if !keep_going {
                    break;
                }
            }
            Ok(last)
        })?;
        self.eval_else(ran, else_branch, last)
    }

    /// Snapshot of what a `for` loop walks: array elements, dict keys or
    /// the characters of a string
    fn iteration_items(&self, source: &Value, span: Span) -> FoxResult<Vec<Value>> {
        let object = source.borrow();
        match &object.payload {
            Payload::Array(items) => Ok(items.clone()),
            Payload::Dict(dict) => Ok(dict.keys()),
            Payload::Str(s) => Ok(s.chars().map(|c| self.prelude.str(c)).collect()),
            _ => Err(FoxError::type_error(
                format!("'{}' is not iterable", source.type_name()),
                span,
                self.file(),
            )),
        }
    }

    fn eval_match(
        &mut self,
        subject: &Expr,
        arms: &[MatchArm],
        default: Option<&Expr>,
        label: Option<String>,
    ) -> FoxResult<Value> {
        let subject = self.eval_expr(subject)?;
        if self.scopes.interrupted() {
            return Ok(subject);
        }

        for arm in arms {
            for pattern in &arm.patterns {
                let pattern = self.eval_expr(pattern)?;
                if self.scopes.interrupted() {
                    return Ok(pattern);
                }
                let matched = if pattern.is_class() {
                    subject == pattern || self.is_a(&subject, &pattern)
                } else {
                    subject == pattern
                };
                if matched {
                    return self.eval_branch(&arm.body, label);
                }
            }
        }

        match default {
            Some(branch) => self.eval_branch(branch, label),
            None => Ok(self.prelude.null()),
        }
    }

    fn eval_labeled(&mut self, label: &str, body: &Expr, span: Span) -> FoxResult<Value> {
        let label = Some(label.to_string());
        match body {
            Expr::Block { statements, .. } => self.eval_block(statements, label),
            Expr::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.eval_if(condition, then_branch, else_branch.as_deref(), label),
            Expr::While {
                condition,
                body,
                else_branch,
                ..
            } => self.eval_while(condition, body, else_branch.as_deref(), label),
            Expr::DoWhile {
                body, condition, ..
            } => self.eval_do_while(body, condition, label),
            Expr::For {
                variable,
                iterable,
                body,
                else_branch,
                ..
            } => self.eval_for(variable, iterable, body, else_branch.as_deref(), label, span),
            Expr::Match {
                subject,
                arms,
                default,
                ..
            } => self.eval_match(subject, arms, default.as_deref(), label),
            other => self.scoped(ScopeKind::Block, label, |rt, _| rt.eval_expr(other)),
        }
    }
}

/// Name bound by a `static` member
fn static_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Assignment { target, .. } => match target.as_ref() {
            Expr::Identifier { name, .. } => Some(name.clone()),
            _ => None,
        },
        Expr::Function { def } => def.name.clone(),
        Expr::Class { def } => def.name.clone(),
        _ => None,
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Value {
        Runtime::new().run(source).unwrap()
    }

    fn error_kind(source: &str) -> ErrorKind {
        Runtime::new().run(source).unwrap_err().kind
    }

    #[test]
    fn test_blocks_evaluate_to_last_statement() {
        assert_eq!(eval("{ 1; 2; 3 }").to_string(), "3");
    }

    #[test]
    fn test_operand_evaluation_stops_on_signal() {
        let mut rt = Runtime::new();
        rt.run("x = 0; fn f(c) { x = if c { return 1 } else { 2 }; x }")
            .unwrap();
        assert_eq!(rt.run("f(true)").unwrap().to_string(), "1");
        assert_eq!(rt.run("f(false)").unwrap().to_string(), "2");
    }

    #[test]
    fn test_short_circuit_returns_deciding_operand() {
        assert_eq!(eval("0 or \"fallback\"").to_string(), "fallback");
        assert_eq!(eval("0 and undefined_name").to_string(), "0");
    }

    #[test]
    fn test_continue_skips_rest_of_iteration() {
        let value = eval(
            "total = 0
             for i in [1, 2, 3, 4] { if i % 2 == 0 { continue }; total += i }
             total",
        );
        assert_eq!(value.to_string(), "4");
    }

    #[test]
    fn test_labeled_break_exits_outer_loop() {
        let value = eval(
            "hits = 0
             label outer: for i in [1, 2, 3] {
                 for j in [1, 2, 3] {
                     if j == 2 { break outer }
                     hits += 1
                 }
             }
             hits",
        );
        assert_eq!(value.to_string(), "1");
    }

    #[test]
    fn test_leave_exits_labeled_block() {
        let value = eval(
            "label done: { x = 1; leave done; x = 2 }
             x",
        );
        assert_eq!(value.to_string(), "1");
    }

    #[test]
    fn test_loop_else_runs_only_when_body_never_ran() {
        assert_eq!(eval("for x in [] { 1 } else { 7 }").to_string(), "7");
        assert_eq!(eval("for x in [1, 2] { x * 10 } else { 7 }").to_string(), "20");
        assert_eq!(eval("while false { 1 }").to_string(), "null");
    }

    #[test]
    fn test_do_while_runs_at_least_once() {
        assert_eq!(eval("n = 5; do { n += 1 } while n < 3; n").to_string(), "6");
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        assert_eq!(error_kind("break"), ErrorKind::RuntimeError);
        assert_eq!(error_kind("for x in [1] { break nowhere }"), ErrorKind::LabelNotFound);
    }

    #[test]
    fn test_match_by_value_and_class() {
        let source = "fn describe(v) {
                          match v {
                              case 0, 1 { \"small\" }
                              case str { \"text\" }
                              else { \"other\" }
                          }
                      }
                      [describe(1), describe(\"a\"), describe(9)]";
        assert_eq!(eval(source).to_string(), "[\"small\", \"text\", \"other\"]");
    }

    #[test]
    fn test_relations() {
        assert_eq!(eval("5 of number").to_string(), "true");
        assert_eq!(eval("5 not of str").to_string(), "true");
        assert_eq!(eval("2 in [1, 2]").to_string(), "true");
        assert_eq!(eval("class P { x = 1 }; P() has \"x\"").to_string(), "true");
        assert_eq!(eval("a = [1]; b = a; a is b").to_string(), "true");
        assert_eq!(eval("[1] is [1]").to_string(), "false");
    }

    #[test]
    fn test_typed_assignment_checks_value() {
        assert_eq!(eval("n: number = 3; n").to_string(), "3");
        assert_eq!(error_kind("n: int = \"three\""), ErrorKind::TypeError);
    }

    #[test]
    fn test_setting_field_on_primitive_fails() {
        assert_eq!(error_kind("x = 5; x.y = 1"), ErrorKind::TypeError);
    }
}
