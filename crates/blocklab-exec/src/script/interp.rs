//! Tree-walking evaluator for parsed scripts.
//!
//! # Architecture
//!
//! Statements execute against a chain of [`Scope`]s and report how control
//! left them through [`Flow`]. Exceptions and budget exhaustion travel on
//! the error side as [`Abort`], so `?` unwinds both. Only `try` statements
//! intercept `Abort::Throw`; nothing intercepts `Abort::Timeout`.
//!
//! Every executed statement costs one step. The step counter is checked on
//! every tick; the wall clock only every [`DEADLINE_CHECK_INTERVAL`] steps.
//!
//! Script function calls push a [`Frame`] that records the function name
//! and the line currently executing. Errors created while frames are live
//! capture them as their `stack` text.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::ast::{BinaryOp, DeclKind, Expr, FunctionDef, LogicalOp, Script, Stmt, StmtKind, UnaryOp};
use super::error::{Abort, Budget};
use super::methods;
use super::scope::{Assignment, Scope, ScopeKind};
use super::value::{
    array_index, loose_equals, strict_equals, Callable, Object, ObjectKind, TooDeep, Value,
};

/// How often (in steps) the wall-clock deadline is consulted.
pub const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Arrays grow densely up to this length; larger indices become plain
/// properties.
pub const MAX_DENSE_LENGTH: usize = 1 << 20;

/// Longest string (in bytes) a script may build by default.
pub const MAX_STRING_LENGTH: usize = 1 << 24;

/// Message of the `RangeError` thrown for values nested too deeply to
/// convert or serialize.
pub const TOO_DEEP: &str = "Maximum call stack size exceeded";

/// Resource limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub step_limit: Option<u64>,
    pub time_limit: Option<Duration>,
    pub max_call_depth: usize,
    pub max_string_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            step_limit: Some(1_000_000),
            time_limit: Some(Duration::from_secs(5)),
            max_call_depth: 100,
            max_string_length: MAX_STRING_LENGTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub name: Rc<str>,
    pub line: u32,
    pub this: Value,
}

/// How a statement completed.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter {
    limits: Limits,
    steps: u64,
    started: Instant,
    frames: Vec<Frame>,
    rng: ChaCha8Rng,
    completion: Option<Value>,
    /// Scopes created during the run, cleared by [`Interpreter::release`].
    scopes: Vec<Weak<Scope>>,
}

impl Interpreter {
    pub fn new(limits: Limits, seed: u64) -> Self {
        Interpreter {
            limits,
            steps: 0,
            started: Instant::now(),
            frames: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            completion: None,
            scopes: Vec::new(),
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Runs `script` with `global` as its top-level scope and returns the
    /// value of the last top-level expression statement, if any ran.
    pub fn run(&mut self, script: &Script, global: &Rc<Scope>) -> Result<Option<Value>, Abort> {
        self.started = Instant::now();
        self.completion = None;
        self.frames.push(Frame {
            name: Rc::from("<anonymous>"),
            line: 1,
            this: Value::Undefined,
        });
        self.hoist(&script.body, global);
        let result = self.exec_stmts(&script.body, global);
        self.frames.clear();
        result?;
        Ok(self.completion.take())
    }

    /// Clears every scope created during the run so closures stored in
    /// them stop keeping each other alive.
    pub fn release(&mut self) {
        for scope in self.scopes.drain(..).filter_map(|s| s.upgrade()) {
            scope.clear();
        }
        self.completion = None;
    }

    /// Charges one step against the budgets.
    pub fn tick(&mut self) -> Result<(), Abort> {
        self.steps += 1;
        if let Some(limit) = self.limits.step_limit {
            if self.steps > limit {
                return Err(Abort::Timeout(Budget::Steps { limit }));
            }
        }
        if let Some(limit) = self.limits.time_limit {
            if self.steps % DEADLINE_CHECK_INTERVAL == 0 && self.started.elapsed() >= limit {
                return Err(Abort::Timeout(Budget::time(limit)));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Builds an error object whose `stack` reflects the live frames.
    pub fn make_error(&self, name: &str, message: &str) -> Value {
        let mut object = Object::new(ObjectKind::Error);
        object.properties.insert("name".into(), Value::from(name));
        object.properties.insert("message".into(), Value::from(message));
        object
            .properties
            .insert("stack".into(), Value::from(self.stack_text(name, message)));
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn stack_text(&self, name: &str, message: &str) -> String {
        let mut out = if message.is_empty() {
            name.to_string()
        } else {
            format!("{name}: {message}")
        };
        for frame in self.frames.iter().rev() {
            out.push_str(&format!("\n    at {} (line {})", frame.name, frame.line));
        }
        out
    }

    pub fn throw(&self, name: &str, message: impl AsRef<str>) -> Abort {
        Abort::Throw(self.make_error(name, message.as_ref()))
    }

    pub fn type_error(&self, message: impl AsRef<str>) -> Abort {
        self.throw("TypeError", message)
    }

    pub fn range_error(&self, message: impl AsRef<str>) -> Abort {
        self.throw("RangeError", message)
    }

    /// Fails with `RangeError: Invalid string length` when a string of
    /// `len` bytes would exceed the limit. Call before allocating.
    pub fn check_string_length(&self, len: usize) -> Result<(), Abort> {
        if len > self.limits.max_string_length {
            return Err(self.range_error("Invalid string length"));
        }
        Ok(())
    }

    /// `String(value)` as scripts observe it: nesting too deep to convert
    /// is a `RangeError`.
    pub fn string_of(&self, value: &Value) -> Result<Rc<str>, Abort> {
        value.try_to_js_string().map_err(|TooDeep| self.range_error(TOO_DEEP))
    }

    fn primitive(&self, value: &Value) -> Result<Value, Abort> {
        match value {
            Value::Object(_) => Ok(Value::String(self.string_of(value)?)),
            other => Ok(other.clone()),
        }
    }

    fn reference_error(&self, name: &str) -> Abort {
        self.throw("ReferenceError", format!("{name} is not defined"))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_stmts(&mut self, stmts: &[Stmt], scope: &Rc<Scope>) -> Result<Flow, Abort> {
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Result<Flow, Abort> {
        self.tick()?;
        if let Some(frame) = self.frames.last_mut() {
            frame.line = stmt.line;
        }
        match &stmt.kind {
            StmtKind::Declare { kind, decls } => {
                self.declare(*kind, decls, scope)?;
                Ok(Flow::Normal)
            }
            StmtKind::Function(_) | StmtKind::Empty => Ok(Flow::Normal),
            StmtKind::Expr(expr) => {
                let value = self.eval(expr, scope)?;
                if self.frames.len() == 1 {
                    self.completion = Some(value);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Block(body) => {
                let inner = self.enter_block(body, scope);
                self.exec_stmts(body, &inner)
            }
            StmtKind::If {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, scope)?.to_boolean() {
                    self.exec_stmt(then, scope)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { test, body } => {
                while self.eval(test, scope)?.to_boolean() {
                    if let Some(exit) = self.loop_body(body, scope)? {
                        return Ok(exit);
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::DoWhile { body, test } => {
                loop {
                    if let Some(exit) = self.loop_body(body, scope)? {
                        return Ok(exit);
                    }
                    if !self.eval(test, scope)?.to_boolean() {
                        return Ok(Flow::Normal);
                    }
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body, scope),
            StmtKind::ForEach {
                decl,
                name,
                of,
                subject,
                body,
            } => {
                let target = self.eval(subject, scope)?;
                let items = if *of {
                    self.iterate(&target, subject)?
                } else {
                    enumerable_keys(&target).into_iter().map(Value::from).collect()
                };
                for item in items {
                    let iteration = match decl {
                        Some(kind @ (DeclKind::Let | DeclKind::Const)) => {
                            let inner = scope.child(ScopeKind::Block);
                            inner.declare(name, item, *kind == DeclKind::Let);
                            inner
                        }
                        _ => {
                            self.assign_name(name, item, scope)?;
                            Rc::clone(scope)
                        }
                    };
                    if let Some(exit) = self.loop_body(body, &iteration)? {
                        return Ok(exit);
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Throw(expr) => Err(Abort::Throw(self.eval(expr, scope)?)),
            StmtKind::Try {
                block,
                param,
                handler,
                finalizer,
            } => self.exec_try(block, param.as_deref(), handler.as_deref(), finalizer.as_deref(), scope),
        }
    }

    /// Runs one loop iteration; `Some` means the loop must exit with that flow.
    fn loop_body(&mut self, body: &Stmt, scope: &Rc<Scope>) -> Result<Option<Flow>, Abort> {
        Ok(match self.exec_stmt(body, scope)? {
            Flow::Break => Some(Flow::Normal),
            Flow::Return(value) => Some(Flow::Return(value)),
            Flow::Normal | Flow::Continue => None,
        })
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &Rc<Scope>,
    ) -> Result<Flow, Abort> {
        let lexical = matches!(
            init,
            Some(Stmt {
                kind: StmtKind::Declare {
                    kind: DeclKind::Let | DeclKind::Const,
                    ..
                },
                ..
            })
        );
        let scope = if lexical {
            self.block_scope(scope)
        } else {
            Rc::clone(scope)
        };
        if let Some(init) = init {
            self.exec_stmt(init, &scope)?;
        }
        loop {
            if let Some(test) = test {
                if !self.eval(test, &scope)?.to_boolean() {
                    return Ok(Flow::Normal);
                }
            }
            if let Some(exit) = self.loop_body(body, &scope)? {
                return Ok(exit);
            }
            if let Some(update) = update {
                self.eval(update, &scope)?;
            }
        }
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        param: Option<&str>,
        handler: Option<&[Stmt]>,
        finalizer: Option<&[Stmt]>,
        scope: &Rc<Scope>,
    ) -> Result<Flow, Abort> {
        let inner = self.enter_block(block, scope);
        let mut result = self.exec_stmts(block, &inner);
        if let (Err(Abort::Throw(thrown)), Some(handler)) = (&result, handler) {
            let thrown = thrown.clone();
            let catch_scope = self.block_scope(scope);
            if let Some(param) = param {
                catch_scope.declare(param, thrown, true);
            }
            let catch_scope = self.enter_block(handler, &catch_scope);
            result = self.exec_stmts(handler, &catch_scope);
        }
        if let Some(finalizer) = finalizer {
            if !matches!(result, Err(Abort::Timeout(_))) {
                let inner = self.enter_block(finalizer, scope);
                match self.exec_stmts(finalizer, &inner)? {
                    Flow::Normal => {}
                    abrupt => return Ok(abrupt),
                }
            }
        }
        result
    }

    fn declare(
        &mut self,
        kind: DeclKind,
        decls: &[(String, Option<Expr>)],
        scope: &Rc<Scope>,
    ) -> Result<(), Abort> {
        for (name, init) in decls {
            match kind {
                DeclKind::Var => {
                    if let Some(init) = init {
                        let value = self.eval(init, scope)?;
                        self.assign_name(name, value, scope)?;
                    }
                }
                DeclKind::Let | DeclKind::Const => {
                    let value = match init {
                        Some(init) => self.eval(init, scope)?,
                        None => Value::Undefined,
                    };
                    scope.declare(name, value, kind == DeclKind::Let);
                }
            }
        }
        Ok(())
    }

    fn iterate(&self, target: &Value, subject: &Expr) -> Result<Vec<Value>, Abort> {
        match target {
            Value::String(s) => Ok(s.chars().map(|c| Value::from(c.to_string())).collect()),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Array(items) => Ok(items.clone()),
                _ => Err(self.type_error(format!("{} is not iterable", describe(subject)))),
            },
            _ => Err(self.type_error(format!("{} is not iterable", describe(subject)))),
        }
    }

    // ------------------------------------------------------------------
    // Scopes and hoisting
    // ------------------------------------------------------------------

    fn block_scope(&mut self, parent: &Rc<Scope>) -> Rc<Scope> {
        let scope = parent.child(ScopeKind::Block);
        self.scopes.push(Rc::downgrade(&scope));
        scope
    }

    /// Gives a block its own scope when it declares anything lexically.
    fn enter_block(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Rc<Scope> {
        let lexical = body.iter().any(|stmt| {
            matches!(
                stmt.kind,
                StmtKind::Declare {
                    kind: DeclKind::Let | DeclKind::Const,
                    ..
                } | StmtKind::Function(_)
            )
        });
        if !lexical {
            return Rc::clone(scope);
        }
        let inner = self.block_scope(scope);
        self.declare_functions(body, &inner);
        inner
    }

    /// Declares `var` names (from anywhere in the body) and function
    /// declarations (from its top level) before the body runs.
    fn hoist(&mut self, body: &[Stmt], scope: &Rc<Scope>) {
        let mut names = Vec::new();
        for stmt in body {
            collect_var_names(stmt, &mut names);
        }
        for name in &names {
            scope.declare_var(name);
        }
        self.declare_functions(body, scope);
    }

    fn declare_functions(&mut self, body: &[Stmt], scope: &Rc<Scope>) {
        for stmt in body {
            if let StmtKind::Function(def) = &stmt.kind {
                if let Some(name) = &def.name {
                    scope.declare(name, closure(def, scope), true);
                }
            }
        }
    }

    fn lookup(&self, name: &str, scope: &Scope) -> Result<Value, Abort> {
        scope.lookup(name).ok_or_else(|| self.reference_error(name))
    }

    fn assign_name(&self, name: &str, value: Value, scope: &Scope) -> Result<(), Abort> {
        match scope.assign(name, value) {
            Assignment::Done => Ok(()),
            Assignment::ReadOnly => Err(self.type_error("Assignment to constant variable.")),
            Assignment::Unresolved => Err(self.reference_error(name)),
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Calls `function` with the given receiver and arguments.
    pub fn call(&mut self, function: &Value, this: Value, args: &[Value]) -> Result<Value, Abort> {
        match function.as_callable() {
            Some(callable) => self.invoke(callable, function, this, args),
            None => Err(self.type_error(format!("{} is not a function", function.to_js_string()))),
        }
    }

    fn invoke(
        &mut self,
        callable: Callable,
        function: &Value,
        this: Value,
        args: &[Value],
    ) -> Result<Value, Abort> {
        let (def, closure_scope) = match callable {
            Callable::Native { func, .. } => return func(self, &this, args),
            Callable::Script { def, scope } => (def, scope),
        };
        if self.frames.len() >= self.limits.max_call_depth {
            return Err(self.range_error(TOO_DEEP));
        }
        let local = closure_scope.child(ScopeKind::Function);
        self.scopes.push(Rc::downgrade(&local));
        if let Some(name) = &def.name {
            local.declare(name, function.clone(), true);
        }
        local.declare("arguments", Value::array(args.to_vec()), true);
        for (i, param) in def.params.iter().enumerate() {
            local.declare(param, args.get(i).cloned().unwrap_or_default(), true);
        }
        self.hoist(&def.body, &local);
        self.frames.push(Frame {
            name: Rc::from(def.name.as_deref().unwrap_or("<anonymous>")),
            line: def.line,
            this,
        });
        let result = self.exec_stmts(&def.body, &local);
        self.frames.pop();
        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &Rc<Scope>) -> Result<Vec<Value>, Abort> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope)?);
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], scope: &Rc<Scope>) -> Result<Value, Abort> {
        let (this, name) = match callee {
            Expr::Member { object, property } => (self.eval(object, scope)?, property.clone()),
            Expr::Index { object, index } => {
                let this = self.eval(object, scope)?;
                (this, self.eval(index, scope)?.to_property_key())
            }
            _ => {
                let function = self.eval(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                return match function.as_callable() {
                    Some(callable) => self.invoke(callable, &function, Value::Undefined, &args),
                    None => Err(self.type_error(format!("{} is not a function", describe(callee)))),
                };
            }
        };
        let method = self.get_property(&this, &name)?;
        let args = self.eval_args(args, scope)?;
        if let Some(callable) = method.as_callable() {
            return self.invoke(callable, &method, this, &args);
        }
        if let Some(result) = methods::call(self, &this, &name, &args) {
            return result;
        }
        Err(self.type_error(format!("{} is not a function", describe(callee))))
    }

    fn eval_new(&mut self, callee: &Expr, args: &[Expr], scope: &Rc<Scope>) -> Result<Value, Abort> {
        let function = self.eval(callee, scope)?;
        let args = self.eval_args(args, scope)?;
        match function.as_callable() {
            Some(Callable::Native { func, .. }) => func(self, &Value::Undefined, &args),
            Some(callable @ Callable::Script { .. }) => {
                let instance = Value::object(ObjectKind::Ordinary);
                let result = self.invoke(callable, &function, instance.clone(), &args)?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => instance,
                })
            }
            None => Err(self.type_error(format!("{} is not a constructor", describe(callee)))),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Result<Value, Abort> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(Rc::clone(s))),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::This => Ok(self.frames.last().map(|f| f.this.clone()).unwrap_or_default()),
            Expr::Ident(name) => self.lookup(name, scope),
            Expr::Array(items) => Ok(Value::array(self.eval_args(items, scope)?)),
            Expr::Object(props) => {
                let mut entries = Vec::with_capacity(props.len());
                for (key, value) in props {
                    entries.push((key.clone(), self.eval(value, scope)?));
                }
                Ok(Value::record(entries))
            }
            Expr::Function(def) => Ok(closure(def, scope)),
            Expr::Member { object, property } => {
                let target = self.eval(object, scope)?;
                self.get_property(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object, scope)?;
                let key = self.eval(index, scope)?.to_property_key();
                self.get_property(&target, &key)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args, scope),
            Expr::New { callee, args } => self.eval_new(callee, args, scope),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Update {
                delta,
                prefix,
                target,
            } => {
                let place = self.place(target, scope)?;
                let old = self.read(&place, scope)?.to_number();
                let new = old + delta;
                self.write(&place, Value::Number(new), scope)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, scope)?;
                let settled = match op {
                    LogicalOp::And => !left.to_boolean(),
                    LogicalOp::Or => left.to_boolean(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if settled {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test, scope)?.to_boolean() {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
            Expr::Assign { op, target, value } => {
                let place = self.place(target, scope)?;
                let value = match op {
                    None => self.eval(value, scope)?,
                    Some(op) => {
                        let current = self.read(&place, scope)?;
                        let rhs = self.eval(value, scope)?;
                        self.binary(*op, &current, &rhs)?
                    }
                };
                self.write(&place, value.clone(), scope)?;
                Ok(value)
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &Rc<Scope>) -> Result<Value, Abort> {
        if op == UnaryOp::Typeof {
            if let Expr::Ident(name) = operand {
                if scope.lookup(name).is_none() {
                    return Ok(Value::from("undefined"));
                }
            }
        }
        let value = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::Not => Value::Bool(!value.to_boolean()),
            UnaryOp::Typeof => Value::from(value.type_of()),
            UnaryOp::Void => Value::Undefined,
        })
    }

    fn place(&mut self, target: &Expr, scope: &Rc<Scope>) -> Result<Place, Abort> {
        match target {
            Expr::Ident(name) => Ok(Place::Name(name.clone())),
            Expr::Member { object, property } => {
                Ok(Place::Property(self.eval(object, scope)?, property.clone()))
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = self.eval(index, scope)?.to_property_key();
                Ok(Place::Property(object, key))
            }
            _ => Err(self.throw("SyntaxError", "Invalid left-hand side in assignment")),
        }
    }

    fn read(&self, place: &Place, scope: &Scope) -> Result<Value, Abort> {
        match place {
            Place::Name(name) => self.lookup(name, scope),
            Place::Property(object, key) => self.get_property(object, key),
        }
    }

    fn write(&self, place: &Place, value: Value, scope: &Scope) -> Result<(), Abort> {
        match place {
            Place::Name(name) => self.assign_name(name, value, scope),
            Place::Property(object, key) => self.set_property(object, key, value),
        }
    }

    pub fn binary(&self, op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Abort> {
        let number = |f: fn(f64, f64) -> f64| Ok(Value::Number(f(left.to_number(), right.to_number())));
        match op {
            BinaryOp::Add => {
                let (l, r) = (self.primitive(left)?, self.primitive(right)?);
                if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
                    let (l, r) = (l.to_js_string(), r.to_js_string());
                    self.check_string_length(l.len() + r.len())?;
                    Ok(Value::from(format!("{l}{r}")))
                } else {
                    Ok(Value::Number(l.to_number() + r.to_number()))
                }
            }
            BinaryOp::Sub => number(|a, b| a - b),
            BinaryOp::Mul => number(|a, b| a * b),
            BinaryOp::Div => number(|a, b| a / b),
            BinaryOp::Rem => number(|a, b| a % b),
            BinaryOp::Pow => number(power),
            BinaryOp::Lt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Less))),
            BinaryOp::Gt => Ok(Value::Bool(compare(left, right) == Some(Ordering::Greater))),
            BinaryOp::Lte => Ok(Value::Bool(matches!(
                compare(left, right),
                Some(Ordering::Less | Ordering::Equal)
            ))),
            BinaryOp::Gte => Ok(Value::Bool(matches!(
                compare(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ))),
            BinaryOp::Eq => Ok(Value::Bool(loose_equals(left, right))),
            BinaryOp::NotEq => Ok(Value::Bool(!loose_equals(left, right))),
            BinaryOp::StrictEq => Ok(Value::Bool(strict_equals(left, right))),
            BinaryOp::StrictNotEq => Ok(Value::Bool(!strict_equals(left, right))),
            BinaryOp::In => {
                let key = left.to_property_key();
                match right {
                    Value::Object(obj) => {
                        let object = obj.borrow();
                        let present = match &object.kind {
                            ObjectKind::Array(items) => {
                                key == "length"
                                    || array_index(&key).is_some_and(|i| i < items.len())
                                    || object.properties.contains_key(&key)
                            }
                            _ => object.properties.contains_key(&key),
                        };
                        Ok(Value::Bool(present))
                    }
                    other => Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{key}' in {}",
                        other.to_js_string()
                    ))),
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn get_property(&self, target: &Value, key: &str) -> Result<Value, Abort> {
        match target {
            Value::Undefined | Value::Null => Err(self.type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                target.to_js_string()
            ))),
            Value::String(s) => Ok(if key == "length" {
                Value::Number(s.chars().count() as f64)
            } else if let Some(i) = array_index(key) {
                s.chars()
                    .nth(i)
                    .map(|c| Value::from(c.to_string()))
                    .unwrap_or_default()
            } else {
                Value::Undefined
            }),
            Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
            Value::Object(obj) => {
                let object = obj.borrow();
                match &object.kind {
                    ObjectKind::Array(items) => {
                        if key == "length" {
                            return Ok(Value::Number(items.len() as f64));
                        }
                        if let Some(item) = array_index(key).and_then(|i| items.get(i)) {
                            return Ok(item.clone());
                        }
                    }
                    ObjectKind::Function(callable) => match key {
                        "name" => return Ok(Value::from(callable.name())),
                        "length" => return Ok(Value::Number(callable.arity() as f64)),
                        _ => {}
                    },
                    ObjectKind::Ordinary | ObjectKind::Error => {}
                }
                Ok(object.properties.get(key).cloned().unwrap_or_default())
            }
        }
    }

    pub fn set_property(&self, target: &Value, key: &str, value: Value) -> Result<(), Abort> {
        let obj = match target {
            Value::Undefined | Value::Null => {
                return Err(self.type_error(format!(
                    "Cannot set properties of {} (setting '{key}')",
                    target.to_js_string()
                )))
            }
            Value::Object(obj) => obj,
            // Writes to primitives are silently dropped.
            _ => return Ok(()),
        };
        let mut object = obj.borrow_mut();
        if object.frozen {
            return Err(self.type_error(format!(
                "Cannot assign to read only property '{key}' of object"
            )));
        }
        if let ObjectKind::Array(items) = &mut object.kind {
            if key == "length" {
                let len = value.to_number();
                if !(len >= 0.0 && len.fract() == 0.0 && len <= MAX_DENSE_LENGTH as f64) {
                    return Err(self.range_error("Invalid array length"));
                }
                items.resize(len as usize, Value::Undefined);
                return Ok(());
            }
            if let Some(i) = array_index(key).filter(|i| *i < MAX_DENSE_LENGTH) {
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
                return Ok(());
            }
        }
        object.properties.insert(key.to_string(), value);
        Ok(())
    }
}

enum Place {
    Name(String),
    Property(Value, String),
}

fn closure(def: &Rc<FunctionDef>, scope: &Rc<Scope>) -> Value {
    Value::object(ObjectKind::Function(Callable::Script {
        def: Rc::clone(def),
        scope: Rc::clone(scope),
    }))
}

fn collect_var_names(stmt: &Stmt, out: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::Declare {
            kind: DeclKind::Var,
            decls,
        } => out.extend(decls.iter().map(|(name, _)| name.clone())),
        StmtKind::Block(body) => body.iter().for_each(|s| collect_var_names(s, out)),
        StmtKind::If {
            then, otherwise, ..
        } => {
            collect_var_names(then, out);
            if let Some(otherwise) = otherwise {
                collect_var_names(otherwise, out);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => collect_var_names(body, out),
        StmtKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_var_names(init, out);
            }
            collect_var_names(body, out);
        }
        StmtKind::ForEach {
            decl, name, body, ..
        } => {
            if *decl == Some(DeclKind::Var) {
                out.push(name.clone());
            }
            collect_var_names(body, out);
        }
        StmtKind::Try {
            block,
            handler,
            finalizer,
            ..
        } => {
            for body in [Some(block), handler.as_ref(), finalizer.as_ref()].into_iter().flatten() {
                body.iter().for_each(|s| collect_var_names(s, out));
            }
        }
        _ => {}
    }
}

/// Keys visited by `for (k in value)`, `Object.keys` and JSON output.
pub fn enumerable_keys(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
        Value::Object(obj) => {
            let object = obj.borrow();
            let mut keys: Vec<String> = match &object.kind {
                ObjectKind::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
                _ => Vec::new(),
            };
            let hidden: &[&str] = match object.kind {
                ObjectKind::Error => &["name", "message", "stack"],
                _ => &[],
            };
            keys.extend(
                object
                    .properties
                    .keys()
                    .filter(|k| !hidden.contains(&k.as_str()))
                    .cloned(),
            );
            keys
        }
        _ => Vec::new(),
    }
}

fn to_primitive(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::String(value.to_js_string()),
        other => other.clone(),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (to_primitive(left), to_primitive(right)) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        f64::NAN
    } else {
        base.powf(exponent)
    }
}

/// Source-ish rendering of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::This => "this".into(),
        Expr::Member { object, property } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::builtins;
    use crate::script::parser::parse;

    fn run(source: &str) -> Result<Option<Value>, Abort> {
        run_with(source, Limits::default())
    }

    fn run_with(source: &str, limits: Limits) -> Result<Option<Value>, Abort> {
        let script = parse(source, 64).unwrap();
        let realm = Scope::new(ScopeKind::Realm, None);
        builtins::install(&realm);
        let global = realm.child(ScopeKind::Global);
        let mut interp = Interpreter::new(limits, 7);
        let result = interp.run(&script, &global);
        interp.release();
        global.clear();
        result
    }

    fn value_of(source: &str) -> String {
        match run(source) {
            Ok(Some(value)) => value.to_js_string().to_string(),
            Ok(None) => "<none>".into(),
            Err(Abort::Throw(v)) => format!("threw {}", v.to_js_string()),
            Err(Abort::Timeout(b)) => format!("timeout {b}"),
        }
    }

    #[test]
    fn arithmetic_and_coercion() {
        assert_eq!(value_of("1 + 2 * 3"), "7");
        assert_eq!(value_of("'a' + 1 + 2"), "a12");
        assert_eq!(value_of("1 + 2 + 'a'"), "3a");
        assert_eq!(value_of("'3' * '4'"), "12");
        assert_eq!(value_of("7 % -3"), "1");
        assert_eq!(value_of("2 ** 10"), "1024");
        assert_eq!(value_of("[1, 2] + ''"), "1,2");
    }

    #[test]
    fn functions_closures_and_hoisting() {
        assert_eq!(value_of("f(2); function f(n) { return n * 2 }"), "4");
        assert_eq!(
            value_of(
                "function counter() { var n = 0; return function () { n += 1; return n } }
                 var c = counter(); c(); c()"
            ),
            "2"
        );
        assert_eq!(value_of("var x; typeof x"), "undefined");
        assert_eq!(value_of("typeof missing"), "undefined");
    }

    #[test]
    fn loops_with_break_and_continue() {
        let source = "
            var total = 0;
            for (var i = 0; i < 10; i++) {
              if (i == 2) { continue; }
              if (i == 5) { break; }
              total += i;
            }
            total";
        assert_eq!(value_of(source), "8");
        assert_eq!(value_of("var s = ''; for (var k in [7, 8]) { s += k } s"), "01");
        assert_eq!(value_of("var s = 0; for (var v of [7, 8]) { s += v } s"), "15");
        assert_eq!(value_of("var n = 0; do { n++ } while (n < 3); n"), "3");
    }

    #[test]
    fn exceptions_are_catchable_and_finally_runs() {
        let source = "
            var log = [];
            try { null.x } catch (e) { log.push(e.name) } finally { log.push('done') }
            log.join(' ')";
        assert_eq!(value_of(source), "TypeError done");
        assert_eq!(value_of("try { throw 5 } catch (e) { e + 1 }"), "6");
    }

    #[test]
    fn uncaught_errors_carry_a_stack() {
        let Err(Abort::Throw(error)) = run("function boom() {\n  throw new Error('bad');\n}\nboom();") else {
            panic!("expected a throw");
        };
        let Value::Object(obj) = error else { panic!("expected an object") };
        let stack = obj.borrow().properties.get("stack").unwrap().to_js_string();
        assert_eq!(&*stack, "Error: bad\n    at boom (line 2)\n    at <anonymous> (line 4)");
    }

    #[test]
    fn undeclared_names_throw_reference_errors() {
        assert_eq!(value_of("nope + 1"), "threw ReferenceError: nope is not defined");
        assert_eq!(value_of("undefined()"), "threw TypeError: undefined is not a function");
        assert_eq!(value_of("Math = 1"), "threw TypeError: Assignment to constant variable.");
    }

    #[test]
    fn const_cannot_be_reassigned() {
        assert_eq!(
            value_of("const k = 1; k = 2"),
            "threw TypeError: Assignment to constant variable."
        );
    }

    #[test]
    fn arrays_grow_on_index_assignment() {
        assert_eq!(value_of("var a = []; a[2] = 'x'; a.length"), "3");
        assert_eq!(value_of("var a = [1, 2, 3]; a.length = 1; a"), "1");
        assert_eq!(value_of("var a = ['p']; a['0']"), "p");
    }

    #[test]
    fn step_budget_stops_infinite_loops() {
        let limits = Limits {
            step_limit: Some(1_000),
            time_limit: None,
            max_call_depth: 50,
            ..Limits::default()
        };
        let result = run_with("while (true) {}", limits);
        assert!(matches!(result, Err(Abort::Timeout(Budget::Steps { limit: 1_000 }))));
    }

    #[test]
    fn time_budget_stops_infinite_loops() {
        let limits = Limits {
            step_limit: None,
            time_limit: Some(Duration::ZERO),
            max_call_depth: 50,
            ..Limits::default()
        };
        let result = run_with("for (;;) {}", limits);
        assert!(matches!(result, Err(Abort::Timeout(Budget::Time { limit_ms: 0 }))));
    }

    #[test]
    fn split_limit_wraps_like_an_unsigned_length() {
        assert_eq!(value_of("'a-b-c'.split('-', -1).length"), "3");
        assert_eq!(value_of("'a-b-c'.split('-', 2)"), "a,b");
        assert_eq!(value_of("'a-b-c'.split('-', 0).length"), "0");
        assert_eq!(value_of("'a-b-c'.split('-', 4294967297)"), "a");
        assert_eq!(value_of("'a-b-c'.split('-', NaN).length"), "0");
    }

    #[test]
    fn string_building_respects_the_length_limit() {
        let limits = Limits {
            max_string_length: 64,
            ..Limits::default()
        };
        let thrown = |source: &str| match run_with(source, limits) {
            Err(Abort::Throw(error)) => error.to_js_string().to_string(),
            other => panic!("{source}: expected a throw, got {other:?}"),
        };
        for source in [
            "'x'.padStart(65)",
            "'x'.padEnd(100, 'ab')",
            "'ab'.repeat(33)",
            "[1, 2, 3].join('-'.repeat(40))",
            "'x'.concat('y'.repeat(60), 'zzzz')",
            "var s = 'x'; while (true) { s = s + s; }",
            "'xx'.replace('x', 'y'.repeat(64))",
            "'xx'.replaceAll('x', 'y'.repeat(40))",
        ] {
            assert_eq!(thrown(source), "RangeError: Invalid string length", "{source}");
        }
        assert!(matches!(
            run_with("'x'.padStart(64).length", limits),
            Ok(Some(Value::Number(n))) if n == 64.0
        ));
        assert!(matches!(
            run_with("'ab'.repeat(32).length", limits),
            Ok(Some(Value::Number(n))) if n == 64.0
        ));
    }

    #[test]
    fn deep_nesting_is_a_range_error_when_converted() {
        let limits = Limits {
            step_limit: Some(100_000),
            ..Limits::default()
        };
        for tail in ["String(a)", "a + ''", "a.join()", "JSON.stringify(a)", "a.toString()"] {
            let source = format!("var a = []; for (var i = 0; i < 1000; i++) {{ a = [a]; }} {tail}");
            let Err(Abort::Throw(error)) = run_with(&source, limits) else {
                panic!("{tail}: expected a throw");
            };
            assert_eq!(
                &*error.to_js_string(),
                "RangeError: Maximum call stack size exceeded",
                "{tail}"
            );
        }
        // Shallow values still convert.
        assert_eq!(value_of("var a = [[1, [2]], 3]; String(a)"), "1,2,3");
    }

    #[test]
    fn runaway_recursion_is_a_range_error() {
        let limits = Limits {
            max_call_depth: 20,
            ..Limits::default()
        };
        let result = run_with("function f() { return f() } f()", limits);
        let Err(Abort::Throw(error)) = result else { panic!("expected a throw") };
        assert_eq!(
            &*error.to_js_string(),
            "RangeError: Maximum call stack size exceeded"
        );
    }

    #[test]
    fn completion_ignores_declarations() {
        assert_eq!(value_of("var a = 1;"), "<none>");
        assert_eq!(value_of("1; var a = 2;"), "1");
        assert_eq!(value_of("function f() { 5 } f()"), "undefined");
    }
}
