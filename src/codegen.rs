use std::rc::Rc;

use crate::{
    ast::{
        BasicLit, BinaryOp, BlockStmt, ElseBranch, Expr, ExprStmt, ForStmt, FuncBody, FuncExpr,
        IfStmt, ImportExpr, Operand, OperandKind, ProgramFile, SelectorPiece, Stmt, StmtKind,
        Tail, TailKind, UnaryExpr, UnaryOp, UsingStmt, WhileStmt,
    },
    diagnostics::{Diagnostic, EaselError, SourceSpan},
    environment::{ScopeRef, Scopes},
    machine::Importer,
    number::Num,
    package::Registry,
    value::{deep_equal, ObjectValue, Value, ValueKind},
};

/// A lowered expression: a suspended computation producing a value.
pub type Evaluator = Rc<dyn Fn() -> Result<Value, EaselError>>;

/// A lowered statement: a suspended computation producing an effect or a
/// control signal.
pub type Invoker = Rc<dyn Fn() -> Result<(), Interrupt>>;

/// Non-local control flow, kept apart from error values so loop and frame
/// handlers can recover the signals they own.
pub enum Interrupt {
    Continue,
    Break,
    Return,
    Failure(EaselError),
}

impl From<EaselError> for Interrupt {
    fn from(err: EaselError) -> Self {
        Interrupt::Failure(err)
    }
}

impl From<Diagnostic> for Interrupt {
    fn from(diag: Diagnostic) -> Self {
        Interrupt::Failure(diag.into())
    }
}

fn runtime_at(span: SourceSpan, message: impl Into<String>) -> EaselError {
    Diagnostic::runtime(message).with_span(span).into()
}

fn compile_at(span: SourceSpan, message: impl Into<String>) -> EaselError {
    Diagnostic::compile(message).with_span(span).into()
}

/// Lowers AST nodes into evaluator/invoker closures. Name resolution,
/// literal parsing and the static checks all happen here; the produced
/// closures only read resolved `(scope, slot)` pairs at run time.
pub struct Compiler {
    scopes: Scopes,
    registry: Rc<Registry>,
    importer: Rc<Importer>,
    at_global: bool,
    in_loop: bool,
}

impl Compiler {
    pub fn new(scopes: Scopes, registry: Rc<Registry>, importer: Rc<Importer>) -> Self {
        Self {
            scopes,
            registry,
            importer,
            at_global: true,
            in_loop: false,
        }
    }

    fn nested(&self, scopes: Scopes) -> Compiler {
        Compiler {
            scopes,
            registry: Rc::clone(&self.registry),
            importer: Rc::clone(&self.importer),
            at_global: false,
            in_loop: self.in_loop,
        }
    }

    fn loop_body(&self, scopes: Scopes) -> Compiler {
        let mut child = self.nested(scopes);
        child.in_loop = true;
        child
    }

    /// Function and block-expression bodies are new frames: loop signals
    /// do not cross them.
    fn frame_body(&self, scopes: Scopes) -> Compiler {
        let mut child = self.nested(scopes);
        child.in_loop = false;
        child
    }

    pub fn lower_program(&self, file: &ProgramFile) -> Result<Invoker, EaselError> {
        let mut invokers = Vec::with_capacity(file.stmts.len());
        for stmt in &file.stmts {
            invokers.push(self.lower_stmt(stmt)?);
        }
        Ok(Rc::new(move || {
            for invoker in &invokers {
                match invoker() {
                    Ok(()) => {}
                    // A return reached through a nested top-level block
                    // ends the script early.
                    Err(Interrupt::Return) => return Ok(()),
                    Err(other) => return Err(other),
                }
            }
            Ok(())
        }))
    }

    fn lower_stmt(&self, stmt: &Stmt) -> Result<Invoker, EaselError> {
        match &stmt.kind {
            StmtKind::If(node) => self.lower_if(node),
            StmtKind::For(node) => self.lower_for(node, stmt.span),
            StmtKind::While(node) => self.lower_while(node),
            StmtKind::Return(expr) => self.lower_return(expr.as_ref(), stmt.span),
            StmtKind::Break => {
                if !self.in_loop {
                    return Err(compile_at(
                        stmt.span,
                        "break statement cannot be used outside loop",
                    ));
                }
                Ok(Rc::new(|| Err(Interrupt::Break)))
            }
            StmtKind::Continue => {
                if !self.in_loop {
                    return Err(compile_at(
                        stmt.span,
                        "continue statement cannot be used outside loop",
                    ));
                }
                Ok(Rc::new(|| Err(Interrupt::Continue)))
            }
            StmtKind::Using(node) => self.lower_using(node, stmt.span),
            StmtKind::Expr(node) => self.lower_expr_stmt(node, stmt.span),
        }
    }

    fn lower_block(&self, block: &BlockStmt) -> Result<Invoker, EaselError> {
        let mut invokers = Vec::with_capacity(block.stmts.len());
        for stmt in &block.stmts {
            invokers.push(self.lower_stmt(stmt)?);
        }
        Ok(Rc::new(move || {
            for invoker in &invokers {
                invoker()?;
            }
            Ok(())
        }))
    }

    fn lower_if(&self, node: &IfStmt) -> Result<Invoker, EaselError> {
        let cond = self.lower_expr(&node.cond)?;
        let cond_span = node.cond.span;
        let block = self.nested(self.scopes.with_scope()).lower_block(&node.block)?;
        let else_invoker = match &node.else_branch {
            Some(ElseBranch::Block(block)) => {
                Some(self.nested(self.scopes.with_scope()).lower_block(block)?)
            }
            Some(ElseBranch::If(nested)) => Some(self.lower_if(nested)?),
            None => None,
        };
        Ok(Rc::new(move || {
            let verdict = cond()?;
            match verdict.as_bool() {
                Some(true) => block(),
                Some(false) => match &else_invoker {
                    Some(invoker) => invoker(),
                    None => Ok(()),
                },
                None => Err(runtime_at(cond_span, "condition expression must be bool").into()),
            }
        }))
    }

    fn lower_while(&self, node: &WhileStmt) -> Result<Invoker, EaselError> {
        let cond = self.lower_expr(&node.cond)?;
        let cond_span = node.cond.span;
        let body = self
            .loop_body(self.scopes.with_scope())
            .lower_block(&node.block)?;
        Ok(Rc::new(move || loop {
            let verdict = cond()?;
            match verdict.as_bool() {
                Some(true) => {}
                Some(false) => return Ok(()),
                None => {
                    return Err(runtime_at(cond_span, "condition expression must be bool").into());
                }
            }
            match body() {
                Ok(()) => {}
                Err(Interrupt::Break) => return Ok(()),
                Err(Interrupt::Continue) => continue,
                Err(other) => return Err(other),
            }
        }))
    }

    fn lower_for(&self, node: &ForStmt, span: SourceSpan) -> Result<Invoker, EaselError> {
        if node.binds.len() > 2 {
            return Err(compile_at(
                span,
                "bad for statement: expected 0, 1 or 2 variables",
            ));
        }

        let over = self.lower_expr(&node.over)?;
        let over_span = node.over.span;

        let body_scopes = self.scopes.with_scope();
        let binds: Vec<(ScopeRef, u32)> = node
            .binds
            .iter()
            .map(|ident| body_scopes.register(&ident.name))
            .collect();
        let body = self.loop_body(body_scopes).lower_block(&node.block)?;

        // Arrays bind `value` or `(index, value)`; objects bind `key` or
        // `(key, value)`.
        let bind_array = {
            let binds = binds.clone();
            move |idx: usize, element: Value| match binds.as_slice() {
                [] => {}
                [(scope, slot)] => scope.borrow_mut().define(*slot, element),
                [(first_scope, first), (second_scope, second)] => {
                    first_scope
                        .borrow_mut()
                        .define(*first, Value::num(Num::from_usize(idx)));
                    second_scope.borrow_mut().define(*second, element);
                }
                _ => unreachable!("bind arity checked during lowering"),
            }
        };
        let bind_object = {
            let binds = binds.clone();
            move |key: Value, value: Value| match binds.as_slice() {
                [] => {}
                [(scope, slot)] => scope.borrow_mut().define(*slot, key),
                [(first_scope, first), (second_scope, second)] => {
                    first_scope.borrow_mut().define(*first, key);
                    second_scope.borrow_mut().define(*second, value);
                }
                _ => unreachable!("bind arity checked during lowering"),
            }
        };

        Ok(Rc::new(move || {
            let collection = over()?;
            match &*collection.0 {
                ValueKind::Array(arr) => {
                    for idx in 0..arr.len() {
                        bind_array(idx, arr.at(idx));
                        match body() {
                            Ok(()) => {}
                            Err(Interrupt::Break) => return Ok(()),
                            Err(Interrupt::Continue) => continue,
                            Err(other) => return Err(other),
                        }
                    }
                    Ok(())
                }
                ValueKind::Object(obj) => {
                    let pairs: Vec<(Value, Value)> = obj
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    for (key, value) in pairs {
                        bind_object(key, value);
                        match body() {
                            Ok(()) => {}
                            Err(Interrupt::Break) => return Ok(()),
                            Err(Interrupt::Continue) => continue,
                            Err(other) => return Err(other),
                        }
                    }
                    Ok(())
                }
                _ => Err(runtime_at(
                    over_span,
                    format!(
                        "{} not iterable (expected array or object)",
                        collection.type_name()
                    ),
                )
                .into()),
            }
        }))
    }

    fn lower_return(
        &self,
        expr: Option<&Expr>,
        span: SourceSpan,
    ) -> Result<Invoker, EaselError> {
        if self.at_global {
            return Err(compile_at(
                span,
                "return statement cannot be used in global scope",
            ));
        }
        let scopes = self.scopes.clone();
        match expr {
            None => Ok(Rc::new(move || {
                scopes.set_return(Value::none());
                Err(Interrupt::Return)
            })),
            Some(expr) => {
                let eval = self.lower_expr(expr)?;
                Ok(Rc::new(move || {
                    let value = eval()?;
                    scopes.set_return(value);
                    Err(Interrupt::Return)
                }))
            }
        }
    }

    fn lower_using(&self, node: &UsingStmt, span: SourceSpan) -> Result<Invoker, EaselError> {
        let package = self.registry.get(&node.name.name).ok_or_else(|| {
            compile_at(span, format!("unknown package `{}`", node.name.name))
        })?;

        let mut mirror = ObjectValue::new();
        for (name, value) in package.objects() {
            mirror
                .insert(Value::string(name.clone()), value.clone())
                .map_err(|err| compile_at(span, err))?;
        }
        let mirror = Value::object(mirror);

        let binding = node
            .alias
            .as_ref()
            .map(|alias| alias.name.clone())
            .unwrap_or_else(|| node.name.name.clone());
        let (scope, slot) = self.scopes.register(&binding);

        Ok(Rc::new(move || {
            scope.borrow_mut().define(slot, mirror.clone());
            Ok(())
        }))
    }

    fn lower_expr_stmt(&self, node: &ExprStmt, span: SourceSpan) -> Result<Invoker, EaselError> {
        let Some(assign) = &node.assign else {
            if node.is_pub {
                return Err(compile_at(span, "pub requires an assignment"));
            }
            let eval = self.lower_expr(&node.expr)?;
            return Ok(Rc::new(move || {
                eval()?;
                Ok(())
            }));
        };

        let name = addressable_name(&node.expr)
            .ok_or_else(|| compile_at(span, "lhs must be addressable"))?;

        if node.is_pub {
            if !self.at_global {
                return Err(compile_at(span, "pub is only allowed at file top level"));
            }
            if assign.op.is_some() {
                return Err(compile_at(
                    span,
                    "augmented assignment cannot be used with pub",
                ));
            }
            if !self.scopes.global().borrow_mut().mark_exported(&name) {
                return Err(compile_at(
                    span,
                    format!("name `{name}` is already exported"),
                ));
            }
        }

        let rhs = self.lower_expr(&assign.value)?;

        match assign.op {
            None => {
                let (scope, slot) = self.scopes.register(&name);
                Ok(Rc::new(move || {
                    let value = rhs()?;
                    scope.borrow_mut().define(slot, value);
                    Ok(())
                }))
            }
            Some(op) => {
                // Augmented assignment requires an already-bound name.
                let (scope, slot) = self.scopes.lookup(&name).ok_or_else(|| {
                    compile_at(
                        span,
                        format!("augmented assignment to undefined variable `{name}`"),
                    )
                })?;
                Ok(Rc::new(move || {
                    let value = rhs()?;
                    let old = scope.borrow().get(slot).ok_or_else(|| {
                        runtime_at(span, format!("variable {name} not defined"))
                    })?;
                    let combined = eval_binary(op, &old, &value)
                        .map_err(|err| attach_span(err, span))?;
                    scope.borrow_mut().define(slot, combined);
                    Ok(())
                }))
            }
        }
    }

    pub fn lower_expr(&self, expr: &Expr) -> Result<Evaluator, EaselError> {
        let head = self.lower_unary(&expr.head)?;
        if expr.chain.is_empty() {
            return Ok(head);
        }

        struct OpInfo {
            op: BinaryOp,
            priority: u8,
            position: usize,
        }

        let mut evals: Vec<Evaluator> = Vec::with_capacity(expr.chain.len() + 1);
        evals.push(head);
        let mut ops: Vec<OpInfo> = Vec::with_capacity(expr.chain.len());
        for (position, (op, operand)) in expr.chain.iter().enumerate() {
            ops.push(OpInfo {
                op: *op,
                priority: op.priority(),
                position,
            });
            evals.push(self.lower_unary(operand)?);
        }

        // Stable sort: equal-precedence operators keep source order and so
        // evaluate left to right.
        ops.sort_by(|a, b| b.priority.cmp(&a.priority));

        let span = expr.span;
        Ok(Rc::new(move || {
            let mut consumed = vec![false; evals.len()];
            let mut stack: Vec<Value> = Vec::new();

            for info in &ops {
                let i = info.position;
                let left = (!consumed[i]).then(|| &evals[i]);
                let right = (!consumed[i + 1]).then(|| &evals[i + 1]);
                consumed[i] = true;
                consumed[i + 1] = true;

                let rval = match right {
                    Some(eval) => eval()?,
                    None => stack.pop().ok_or_else(|| {
                        runtime_at(span, "expression operand stack underflow")
                    })?,
                };
                let lval = match left {
                    Some(eval) => eval()?,
                    None => stack.pop().ok_or_else(|| {
                        runtime_at(span, "expression operand stack underflow")
                    })?,
                };

                let result =
                    eval_binary(info.op, &lval, &rval).map_err(|err| attach_span(err, span))?;
                stack.push(result);
            }

            stack
                .pop()
                .ok_or_else(|| runtime_at(span, "expression operand stack underflow"))
        }))
    }

    fn lower_unary(&self, node: &UnaryExpr) -> Result<Evaluator, EaselError> {
        let operand = self.lower_operand(&node.operand)?;
        let span = node.span;
        match node.op {
            None => Ok(operand),
            Some(UnaryOp::Negate) => Ok(Rc::new(move || {
                let value = operand()?;
                match value.as_num() {
                    Some(num) => Ok(Value::num(num.neg())),
                    None => Err(runtime_at(
                        span,
                        format!(
                            "{} doesn't support unary operator '-' (expected number)",
                            value.type_name()
                        ),
                    )),
                }
            })),
            Some(UnaryOp::Not) => Ok(Rc::new(move || {
                let value = operand()?;
                match value.as_bool() {
                    Some(b) => Ok(Value::bool(!b)),
                    None => Err(runtime_at(
                        span,
                        format!(
                            "{} doesn't support unary operator 'not' (expected bool)",
                            value.type_name()
                        ),
                    )),
                }
            })),
        }
    }

    fn lower_operand(&self, node: &Operand) -> Result<Evaluator, EaselError> {
        let span = node.span;
        let mut eval = match &node.kind {
            OperandKind::Block(block) => self.lower_block_expr(block)?,
            OperandKind::Func(func) => self.lower_func(func, span)?,
            OperandKind::Import(import) => self.lower_import(import)?,
            OperandKind::Basic(lit) => lower_basic_lit(lit, span)?,
            OperandKind::None => Rc::new(|| Ok(Value::none())),
            OperandKind::Bool(value) => {
                let value = *value;
                Rc::new(move || Ok(Value::bool(value)))
            }
            OperandKind::Array(elems) => {
                let mut evals = Vec::with_capacity(elems.len());
                for elem in elems {
                    evals.push(self.lower_expr(elem)?);
                }
                Rc::new(move || {
                    let mut items = Vec::with_capacity(evals.len());
                    for eval in &evals {
                        items.push(eval()?);
                    }
                    Ok(Value::array(items))
                })
            }
            OperandKind::Object(items) => {
                let mut evals = Vec::with_capacity(items.len());
                for (key, value) in items {
                    evals.push((self.lower_expr(key)?, self.lower_expr(value)?));
                }
                Rc::new(move || {
                    let mut object = ObjectValue::new();
                    for (position, (key_eval, value_eval)) in evals.iter().enumerate() {
                        let key = key_eval()?;
                        // The key must canonicalise before the value runs.
                        key.canonical_bytes().map_err(|err| {
                            runtime_at(
                                span,
                                format!("key on position {} is {}", position + 1, err),
                            )
                        })?;
                        let value = value_eval()?;
                        object
                            .insert(key, value)
                            .map_err(|err| runtime_at(span, err))?;
                    }
                    Ok(Value::object(object))
                })
            }
            OperandKind::Name(name) => {
                let (scope, slot) = self.scopes.register(name);
                let name = name.clone();
                Rc::new(move || {
                    scope.borrow().get(slot).ok_or_else(|| {
                        runtime_at(span, format!("variable {name} not defined"))
                    })
                })
            }
            OperandKind::Paren(inner) => self.lower_expr(inner)?,
        };

        for tail in &node.tails {
            eval = self.lower_tail(eval, tail)?;
        }
        Ok(eval)
    }

    fn lower_block_expr(&self, block: &BlockStmt) -> Result<Evaluator, EaselError> {
        let scopes = self.scopes.with_frame();
        let frame = Rc::clone(scopes.innermost());
        let invoker = self.frame_body(scopes).lower_block(block)?;
        Ok(Rc::new(move || {
            frame.borrow_mut().set_return(Value::none());
            match invoker() {
                Ok(()) | Err(Interrupt::Return) => {}
                Err(Interrupt::Break) | Err(Interrupt::Continue) => {
                    return Err(Diagnostic::runtime(
                        "loop control flow cannot escape block expression",
                    )
                    .into());
                }
                Err(Interrupt::Failure(err)) => return Err(err),
            }
            Ok(frame.borrow().get_return())
        }))
    }

    fn lower_func(&self, node: &FuncExpr, span: SourceSpan) -> Result<Evaluator, EaselError> {
        let mut names: Vec<String> = Vec::with_capacity(node.params.len());
        for param in &node.params {
            if names.contains(&param.name) {
                return Err(compile_at(span, "bad function: argument names must be unique"));
            }
            names.push(param.name.clone());
        }

        let scopes = self.scopes.with_frame();
        let frame = Rc::clone(scopes.innermost());
        // Arguments always live in the function's own frame, shadowing any
        // outer bindings of the same name.
        let slots: Vec<u32> = names
            .iter()
            .map(|name| frame.borrow_mut().register(name))
            .collect();

        let arity = names.len();
        let bind_args = {
            let frame = Rc::clone(&frame);
            move |args: &[Value]| -> Result<(), EaselError> {
                if args.len() != arity {
                    return Err(Diagnostic::runtime(format!(
                        "expected arguments {arity}, got {}",
                        args.len()
                    ))
                    .into());
                }
                let mut frame = frame.borrow_mut();
                for (slot, value) in slots.iter().zip(args) {
                    frame.define(*slot, value.clone());
                }
                Ok(())
            }
        };

        let callable: crate::value::FuncCallable = match &node.body {
            FuncBody::Expr(body) => {
                let eval = self.frame_body(scopes).lower_expr(body)?;
                Rc::new(move |args: &[Value]| {
                    bind_args(args)?;
                    eval()
                })
            }
            FuncBody::Block(body) => {
                let invoker = self.frame_body(scopes).lower_block(body)?;
                let frame = Rc::clone(&frame);
                Rc::new(move |args: &[Value]| {
                    bind_args(args)?;
                    frame.borrow_mut().set_return(Value::none());
                    match invoker() {
                        Ok(()) | Err(Interrupt::Return) => {}
                        Err(Interrupt::Break) | Err(Interrupt::Continue) => {
                            return Err(Diagnostic::runtime(
                                "loop control flow cannot escape closure",
                            )
                            .into());
                        }
                        Err(Interrupt::Failure(err)) => return Err(err),
                    }
                    Ok(frame.borrow().get_return())
                })
            }
        };

        let params = names;
        Ok(Rc::new(move || {
            Ok(Value::func(Some(params.clone()), Rc::clone(&callable)))
        }))
    }

    fn lower_import(&self, node: &ImportExpr) -> Result<Evaluator, EaselError> {
        let span = node.span;
        let raw = decode_string_literal(&node.path)
            .map_err(|err| compile_at(span, format!("bad import path: {err}")))?;
        let path = Importer::normalize_path(&raw).map_err(|err| compile_at(span, err))?;

        let importer = Rc::clone(&self.importer);
        Ok(Rc::new(move || {
            importer
                .import(&path)
                .map_err(|err| attach_span(err, span))
        }))
    }

    fn lower_tail(&self, prev: Evaluator, tail: &Tail) -> Result<Evaluator, EaselError> {
        let span = tail.span;
        match &tail.kind {
            TailKind::Select(pieces) => {
                let mut keys = Vec::with_capacity(pieces.len());
                for piece in pieces {
                    let key = match piece {
                        SelectorPiece::Ident(name) => name.clone(),
                        SelectorPiece::Str(raw) => decode_string_literal(raw)
                            .map_err(|err| compile_at(span, format!("bad selector: {err}")))?,
                    };
                    keys.push(Value::string(key));
                }
                Ok(Rc::new(move || {
                    let mut current = prev()?;
                    for key in &keys {
                        let object = current.as_object().ok_or_else(|| {
                            runtime_at(
                                span,
                                format!(
                                    "unsupported selector for {} (expected object)",
                                    current.type_name()
                                ),
                            )
                        })?;
                        current = object.get(key).map_err(|err| {
                            runtime_at(span, format!("cannot get value by {key}: {err}"))
                        })?;
                    }
                    Ok(current)
                }))
            }
            TailKind::Index(exprs) => {
                let mut evals = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    evals.push(self.lower_expr(expr)?);
                }
                Ok(Rc::new(move || {
                    let target = prev()?;
                    match &*target.0 {
                        ValueKind::Array(arr) => {
                            if evals.len() != 1 {
                                return Err(runtime_at(
                                    span,
                                    "array indexer must have 1 argument",
                                ));
                            }
                            let index = evals[0]()?;
                            let num = index.as_num().ok_or_else(|| {
                                runtime_at(
                                    span,
                                    format!("index must be number, got {}", index.type_name()),
                                )
                            })?;
                            let idx = num.as_i64().map_err(|err| {
                                runtime_at(
                                    span,
                                    format!("cannot represent number as integer index: {err}"),
                                )
                            })?;
                            arr.get(idx).map_err(|err| {
                                runtime_at(span, format!("cannot get array element: {err}"))
                            })
                        }
                        ValueKind::Object(_) => {
                            let mut current = target.clone();
                            for (position, eval) in evals.iter().enumerate() {
                                let object = current.as_object().ok_or_else(|| {
                                    runtime_at(
                                        span,
                                        format!(
                                            "value at index {position} unsupports indexer \
                                             (expected object, got {})",
                                            current.type_name()
                                        ),
                                    )
                                })?;
                                let key = eval()?;
                                current = object.get(&key).map_err(|err| {
                                    runtime_at(
                                        span,
                                        format!("cannot get value by index {position}: {err}"),
                                    )
                                })?;
                            }
                            Ok(current)
                        }
                        _ => Err(runtime_at(
                            span,
                            format!("unsupported indexer for {}", target.type_name()),
                        )),
                    }
                }))
            }
            TailKind::Call(args) => {
                let mut evals = Vec::with_capacity(args.len());
                for arg in args {
                    evals.push(self.lower_expr(arg)?);
                }
                Ok(Rc::new(move || {
                    let target = prev()?;
                    let func = target.as_func().ok_or_else(|| {
                        runtime_at(
                            span,
                            format!(
                                "unsupported caller expression for {} (expected func)",
                                target.type_name()
                            ),
                        )
                    })?;
                    let mut call_args = Vec::with_capacity(evals.len());
                    for eval in &evals {
                        call_args.push(eval()?);
                    }
                    func.call(&call_args)
                        .map_err(|err| attach_span(err, span))
                }))
            }
        }
    }
}

/// A statement LHS must be a single bare identifier.
fn addressable_name(expr: &Expr) -> Option<String> {
    if !expr.chain.is_empty() || expr.head.op.is_some() {
        return None;
    }
    if !expr.head.operand.tails.is_empty() {
        return None;
    }
    match &expr.head.operand.kind {
        OperandKind::Name(name) => Some(name.clone()),
        _ => None,
    }
}

fn lower_basic_lit(lit: &BasicLit, span: SourceSpan) -> Result<Evaluator, EaselError> {
    let value = match lit {
        BasicLit::Number(raw) => {
            let num = Num::parse(raw)
                .map_err(|err| compile_at(span, format!("bad number literal: {err}")))?;
            Value::num(num)
        }
        BasicLit::Str(raw) => {
            let text = decode_string_literal(raw)
                .map_err(|err| compile_at(span, format!("bad string literal: {err}")))?;
            Value::string(text)
        }
    };
    Ok(Rc::new(move || Ok(value.clone())))
}

/// Decodes the escape sequences of a raw string literal. Unknown escape
/// letters are dropped; short or malformed sequences are errors.
pub fn decode_string_literal(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let esc = chars
            .next()
            .ok_or_else(|| "backslash not escaped".to_string())?;
        match esc {
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'u' => out.push(unicode_escape(&mut chars, 4)?),
            'U' => out.push(unicode_escape(&mut chars, 8)?),
            _ => {}
        }
    }
    Ok(out)
}

fn unicode_escape(chars: &mut std::str::Chars<'_>, width: usize) -> Result<char, String> {
    let mut code = 0u32;
    for _ in 0..width {
        let digit = chars.next().ok_or_else(|| {
            format!(
                "invalid \\{} char, expected {width} bytes",
                if width == 4 { "u" } else { "U" }
            )
        })?;
        let value = digit
            .to_digit(16)
            .ok_or_else(|| "illegal char in escape sequence".to_string())?;
        code = code * 16 + value;
    }
    char::from_u32(code).ok_or_else(|| "illegal char in escape sequence".to_string())
}

fn attach_span(err: EaselError, span: SourceSpan) -> EaselError {
    match err {
        EaselError::Diagnostic(mut diag) => {
            if diag.span.is_none() {
                diag.span = Some(span);
            }
            EaselError::Diagnostic(diag)
        }
        other => other,
    }
}

/// Combines two evaluated operands. Both sides are always computed before
/// this runs.
pub fn eval_binary(op: BinaryOp, lval: &Value, rval: &Value) -> Result<Value, EaselError> {
    use BinaryOp::*;

    if op == Add {
        if let (ValueKind::Str(a), ValueKind::Str(b)) = (&*lval.0, &*rval.0) {
            return Ok(Value::string(format!("{a}{b}")));
        }
        if let (ValueKind::Array(a), ValueKind::Array(b)) = (&*lval.0, &*rval.0) {
            return Ok(Value::new(ValueKind::Array(a.concat(b))));
        }
    }

    let unsupported = || {
        EaselError::from(Diagnostic::runtime(format!(
            "unsupported operand type for {}: {} and {}",
            op.symbol(),
            lval.type_name(),
            rval.type_name()
        )))
    };

    match op {
        Equal | NotEqual => {
            if std::mem::discriminant(&*lval.0) != std::mem::discriminant(&*rval.0) {
                return Err(unsupported());
            }
            let equal = deep_equal(lval, rval);
            Ok(Value::bool(if op == Equal { equal } else { !equal }))
        }
        Less | LessEqual | Greater | GreaterEqual => {
            let (Some(a), Some(b)) = (lval.as_num(), rval.as_num()) else {
                return Err(unsupported());
            };
            let verdict = match op {
                Less => a < b,
                LessEqual => a <= b,
                Greater => a > b,
                GreaterEqual => a >= b,
                _ => unreachable!("comparison operators matched above"),
            };
            Ok(Value::bool(verdict))
        }
        Add | Sub | Mul | Div | Rem => {
            let (Some(a), Some(b)) = (lval.as_num(), rval.as_num()) else {
                return Err(unsupported());
            };
            let result = match op {
                Add => a.checked_add(b),
                Sub => a.checked_sub(b),
                Mul => a.checked_mul(b),
                Div => a.checked_div(b),
                Rem => a.checked_rem(b),
                _ => unreachable!("arithmetic operators matched above"),
            };
            result
                .map(Value::num)
                .map_err(|err| Diagnostic::runtime(format!("op '{}': {err}", op.symbol())).into())
        }
        And | Or => {
            let (Some(a), Some(b)) = (lval.as_bool(), rval.as_bool()) else {
                return Err(unsupported());
            };
            Ok(Value::bool(if op == And { a && b } else { a || b }))
        }
    }
}
