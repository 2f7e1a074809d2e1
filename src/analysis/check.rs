use crate::analysis::{
    index::{param_names, DeclIndex, TypeNames, TypeRef},
    mutability::{Mutability, NamingPolicy},
    report::{Diagnostic, SubjectKind},
    resolve::{Binding, LocalScope, Resolver},
};
use crate::language::{
    ast::{
        AssignOp, AssignStmt, Block, Expr, ExprKind, Field, FuncDecl, FuncType, GoStmt, Ident,
        RangeStmt, Stmt, ValueSpec,
    },
    span::{Position, Span},
};
use crate::project::package::SourceFile;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Why a function body was left out of the analysis.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("nesting exceeds the limit of {limit}")]
    TooDeep { limit: usize },
    #[error("internal fault: {0}")]
    Fault(String),
}

/// Everything shared by the checks of one file.
pub struct FileContext<'a> {
    pub index: &'a DeclIndex,
    pub policy: &'a NamingPolicy,
    pub package: &'a str,
    pub file: &'a SourceFile,
    pub types: &'a HashSet<String>,
    pub max_depth: usize,
}

impl<'a> FileContext<'a> {
    fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.index, self.package, &self.file.imports, self.types)
    }
}

pub fn check_function(
    cx: &FileContext<'_>,
    decl: &FuncDecl,
) -> Result<Vec<Diagnostic>, SkipReason> {
    let Some(body) = &decl.body else {
        return Ok(Vec::new());
    };
    let mut checker = FunctionChecker::new(cx);
    checker.env.push_scope();
    if let Some(recv) = &decl.recv {
        checker.declare_fields(std::slice::from_ref(recv));
    }
    checker.declare_signature(&decl.sig);
    checker.visit_stmts(&body.stmts)?;
    checker.env.pop_scope();
    Ok(checker.diagnostics)
}

struct TaskFrame {
    base_depth: usize,
    reported: HashSet<String>,
}

/// Lexical scopes of one function body plus the `go` statements being walked.
#[derive(Default)]
struct FnEnv {
    scopes: Vec<HashMap<String, Binding>>,
    tasks: Vec<TaskFrame>,
}

impl FnEnv {
    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, binding: Binding) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding);
        }
    }

    fn bound_in_current(&self, name: &str) -> bool {
        self.scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name))
    }

    fn depth_of(&self, name: &str) -> Option<usize> {
        self.scopes
            .iter()
            .rposition(|scope| scope.contains_key(name))
    }
}

impl LocalScope for FnEnv {
    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

struct FunctionChecker<'c, 'a> {
    cx: &'c FileContext<'a>,
    resolver: Resolver<'a>,
    env: FnEnv,
    diagnostics: Vec<Diagnostic>,
    depth: usize,
}

impl<'c, 'a> FunctionChecker<'c, 'a> {
    fn new(cx: &'c FileContext<'a>) -> Self {
        Self {
            cx,
            resolver: cx.resolver(),
            env: FnEnv::default(),
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    fn enter(&mut self) -> Result<(), SkipReason> {
        self.depth += 1;
        if self.depth > self.cx.max_depth {
            return Err(SkipReason::TooDeep {
                limit: self.cx.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn type_names(&self) -> TypeNames<'a> {
        self.resolver.type_names()
    }

    fn named_type(&self, ty: &Expr) -> Option<TypeRef> {
        let env = &self.env;
        self.type_names()
            .named_type(ty, &|name: &str| env.is_bound(name))
    }

    fn initializer_type(&self, value: &Expr) -> Option<TypeRef> {
        let env = &self.env;
        self.type_names()
            .initializer_type(value, &|name: &str| env.is_bound(name))
    }

    fn report(&mut self, span: Span, kind: SubjectKind, name: String) {
        let file = self.cx.file;
        let position = Position::resolve(&file.path, &file.lines, span.start);
        self.diagnostics.push(Diagnostic::new(position, span, kind, name));
    }

    // Declarations

    fn declare_fields(&mut self, fields: &[Field]) {
        for field in fields {
            let ty = self.named_type(&field.ty);
            for name in &field.names {
                self.env.declare(&name.name, Binding::typed(ty.clone()));
            }
        }
    }

    fn declare_signature(&mut self, sig: &FuncType) {
        self.declare_fields(&sig.params);
        self.declare_fields(&sig.results);
    }

    fn declare_value_specs(&mut self, specs: &[ValueSpec]) -> Result<(), SkipReason> {
        for spec in specs {
            for value in &spec.values {
                self.visit_expr(value)?;
            }
            let types: Vec<Option<TypeRef>> = (0..spec.names.len())
                .map(|slot| {
                    let env = &self.env;
                    self.type_names()
                        .of_value_spec(spec, slot, &|name: &str| env.is_bound(name))
                })
                .collect();
            for (name, ty) in spec.names.iter().zip(types) {
                self.env.declare(&name.name, Binding::typed(ty));
            }
        }
        Ok(())
    }

    // Statements

    fn visit_block(&mut self, block: &Block) -> Result<(), SkipReason> {
        self.env.push_scope();
        self.visit_stmts(&block.stmts)?;
        self.env.pop_scope();
        Ok(())
    }

    fn visit_stmts(&mut self, stmts: &[Stmt]) -> Result<(), SkipReason> {
        for stmt in stmts {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_opt_stmt(&mut self, stmt: Option<&Stmt>) -> Result<(), SkipReason> {
        match stmt {
            Some(stmt) => self.visit_stmt(stmt),
            None => Ok(()),
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<(), SkipReason> {
        self.enter()?;
        match stmt {
            Stmt::Var(specs) | Stmt::Const(specs) => self.declare_value_specs(specs)?,
            Stmt::Type(specs) => {
                for spec in specs {
                    self.env.declare(&spec.name.name, Binding::default());
                }
            }
            Stmt::Expr(expr) => self.visit_expr(expr)?,
            Stmt::Send(send) => {
                self.visit_expr(&send.chan)?;
                self.visit_expr(&send.value)?;
            }
            Stmt::IncDec(stmt) => self.check_target(&stmt.target)?,
            Stmt::Assign(assign) => self.visit_assign(assign)?,
            Stmt::Go(go) => self.visit_go(go)?,
            Stmt::Defer(defer) => self.visit_expr(&defer.call)?,
            Stmt::Return(ret) => {
                for result in &ret.results {
                    self.visit_expr(result)?;
                }
            }
            Stmt::Branch(_) | Stmt::Empty(_) => {}
            Stmt::Block(block) => self.visit_block(block)?,
            Stmt::If(stmt) => {
                self.env.push_scope();
                self.visit_opt_stmt(stmt.init.as_deref())?;
                self.visit_expr(&stmt.cond)?;
                self.visit_block(&stmt.then)?;
                self.visit_opt_stmt(stmt.els.as_deref())?;
                self.env.pop_scope();
            }
            Stmt::Switch(stmt) => {
                self.env.push_scope();
                self.visit_opt_stmt(stmt.init.as_deref())?;
                if let Some(tag) = &stmt.tag {
                    self.visit_expr(tag)?;
                }
                for clause in &stmt.clauses {
                    for expr in &clause.exprs {
                        self.visit_expr(expr)?;
                    }
                    self.env.push_scope();
                    self.visit_stmts(&clause.body)?;
                    self.env.pop_scope();
                }
                self.env.pop_scope();
            }
            Stmt::TypeSwitch(stmt) => {
                self.env.push_scope();
                self.visit_opt_stmt(stmt.init.as_deref())?;
                self.visit_expr(&stmt.subject)?;
                for clause in &stmt.clauses {
                    self.env.push_scope();
                    if let Some(binding) = &stmt.binding {
                        let ty = match clause.exprs.as_slice() {
                            [single] => self.named_type(single),
                            _ => None,
                        };
                        self.env.declare(&binding.name, Binding::typed(ty));
                    }
                    self.visit_stmts(&clause.body)?;
                    self.env.pop_scope();
                }
                self.env.pop_scope();
            }
            Stmt::Select(stmt) => {
                for clause in &stmt.clauses {
                    self.env.push_scope();
                    self.visit_opt_stmt(clause.comm.as_deref())?;
                    self.visit_stmts(&clause.body)?;
                    self.env.pop_scope();
                }
            }
            Stmt::For(stmt) => {
                self.env.push_scope();
                self.visit_opt_stmt(stmt.init.as_deref())?;
                if let Some(cond) = &stmt.cond {
                    self.visit_expr(cond)?;
                }
                self.visit_opt_stmt(stmt.post.as_deref())?;
                self.visit_block(&stmt.body)?;
                self.env.pop_scope();
            }
            Stmt::Range(stmt) => self.visit_range(stmt)?,
            Stmt::Labeled(labeled) => self.visit_stmt(&labeled.stmt)?,
        }
        self.leave();
        Ok(())
    }

    fn visit_assign(&mut self, assign: &AssignStmt) -> Result<(), SkipReason> {
        for value in &assign.rhs {
            self.visit_expr(value)?;
        }
        if assign.op != AssignOp::Define {
            for target in &assign.lhs {
                self.check_target(target)?;
            }
            return Ok(());
        }

        let paired = assign.lhs.len() == assign.rhs.len();
        for (slot, target) in assign.lhs.iter().enumerate() {
            let Some(ident) = target.as_ident() else {
                self.visit_expr(target)?;
                continue;
            };
            if ident.is_blank() {
                continue;
            }
            if self.env.bound_in_current(&ident.name) {
                // `:=` reuses names already declared in the same scope.
                self.check_variable(ident);
                continue;
            }
            let ty = if paired {
                self.initializer_type(&assign.rhs[slot])
            } else {
                None
            };
            self.env.declare(&ident.name, Binding::typed(ty));
        }
        Ok(())
    }

    fn visit_range(&mut self, stmt: &RangeStmt) -> Result<(), SkipReason> {
        self.visit_expr(&stmt.subject)?;
        self.env.push_scope();
        for target in [&stmt.key, &stmt.value].into_iter().flatten() {
            if stmt.define {
                if let Some(ident) = target.as_ident() {
                    self.env.declare(&ident.name, Binding::default());
                }
            } else {
                self.check_target(target)?;
            }
        }
        self.visit_block(&stmt.body)?;
        self.env.pop_scope();
        Ok(())
    }

    fn visit_go(&mut self, go: &GoStmt) -> Result<(), SkipReason> {
        self.env.tasks.push(TaskFrame {
            base_depth: self.env.scopes.len(),
            reported: HashSet::new(),
        });
        let result = self.visit_expr(&go.call);
        self.env.tasks.pop();
        result
    }

    // Assignment targets

    fn check_target(&mut self, target: &Expr) -> Result<(), SkipReason> {
        match &target.unparen().kind {
            ExprKind::Ident(ident) => self.check_variable(ident),
            ExprKind::Selector { base, field } => {
                if let Some(receiver) = base.unparen().as_ident() {
                    if self.resolver.is_import(&receiver.name, &self.env) {
                        if self.cx.policy.violates(&field.name) {
                            self.report(
                                field.span,
                                SubjectKind::Variable,
                                format!("{}.{}", receiver.name, field.name),
                            );
                        }
                        return Ok(());
                    }
                    if self.cx.policy.violates(&field.name) {
                        let owner = self
                            .resolver
                            .receiver_type(&receiver.name, &self.env)
                            .map(|ty| ty.name)
                            .unwrap_or_else(|_| receiver.name.clone());
                        self.report(
                            field.span,
                            SubjectKind::Field,
                            format!("{owner}.{}", field.name),
                        );
                    }
                }
            }
            _ => {}
        }
        self.visit_expr(target)
    }

    fn check_variable(&mut self, ident: &Ident) {
        if self.cx.policy.violates(&ident.name) {
            self.report(ident.span, SubjectKind::Variable, ident.name.clone());
        }
    }

    // Expressions

    fn visit_expr(&mut self, expr: &Expr) -> Result<(), SkipReason> {
        self.enter()?;
        match &expr.kind {
            ExprKind::Ident(ident) => self.note_use(ident),
            ExprKind::BasicLit(..) => {}
            ExprKind::CompositeLit { elts, .. } => {
                for elt in elts {
                    match &elt.kind {
                        ExprKind::KeyValue { key, value } => {
                            // Bare keys name struct fields.
                            if key.as_ident().is_none() {
                                self.visit_expr(key)?;
                            }
                            self.visit_expr(value)?;
                        }
                        _ => self.visit_expr(elt)?,
                    }
                }
            }
            ExprKind::KeyValue { key, value } => {
                self.visit_expr(key)?;
                self.visit_expr(value)?;
            }
            ExprKind::FuncLit { sig, body } => {
                self.env.push_scope();
                self.declare_signature(sig);
                self.visit_stmts(&body.stmts)?;
                self.env.pop_scope();
            }
            ExprKind::Paren(inner)
            | ExprKind::Star(inner)
            | ExprKind::Selector { base: inner, .. }
            | ExprKind::TypeAssert { base: inner, .. }
            | ExprKind::Unary { operand: inner, .. } => self.visit_expr(inner)?,
            ExprKind::Index { base, indices } => {
                self.visit_expr(base)?;
                for index in indices {
                    self.visit_expr(index)?;
                }
            }
            ExprKind::Slice {
                base,
                low,
                high,
                max,
            } => {
                self.visit_expr(base)?;
                for part in [low, high, max].into_iter().flatten() {
                    self.visit_expr(part)?;
                }
            }
            ExprKind::Call { func, args, .. } => {
                self.visit_expr(func)?;
                for arg in args {
                    self.visit_expr(arg)?;
                }
                self.check_call(func, args);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs)?;
                self.visit_expr(rhs)?;
            }
            ExprKind::ArrayType { .. }
            | ExprKind::Ellipsis(_)
            | ExprKind::MapType { .. }
            | ExprKind::ChanType { .. }
            | ExprKind::FuncType(_)
            | ExprKind::StructType(_)
            | ExprKind::InterfaceType(_) => {}
        }
        self.leave();
        Ok(())
    }

    /// Reports a mutable binding declared outside an enclosing `go` statement.
    fn note_use(&mut self, ident: &Ident) {
        if self.env.tasks.is_empty() || !Mutability::of(&ident.name).is_mutable() {
            return;
        }
        if self.cx.policy.is_exempt(&ident.name) {
            return;
        }
        let Some(depth) = self.env.depth_of(&ident.name) else {
            return;
        };
        let mut crossings = 0;
        for frame in &mut self.env.tasks {
            if depth < frame.base_depth && frame.reported.insert(ident.name.clone()) {
                crossings += 1;
            }
        }
        for _ in 0..crossings {
            self.report(ident.span, SubjectKind::Capture, ident.name.clone());
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr]) {
        let literal;
        let params: &[String] = match &callee.unparen().kind {
            ExprKind::FuncLit { sig, .. } => {
                literal = param_names(&sig.params);
                &literal
            }
            _ => {
                let id = match self.resolver.resolve_call(callee, &self.env) {
                    Ok(id) => id,
                    Err(miss) => {
                        tracing::trace!(file = %self.cx.file.path.display(), %miss, "unresolved call site");
                        return;
                    }
                };
                let index = self.cx.index;
                match index.signature(&id) {
                    Some(params) => params,
                    None => {
                        tracing::trace!(target_id = %id, "call target has no declaration");
                        return;
                    }
                }
            }
        };
        let mut violations = Vec::new();
        for (arg, param) in args.iter().zip(params) {
            let Some(arg) = arg.unparen().as_ident() else {
                continue;
            };
            if self.cx.policy.tag(param) != Some(Mutability::Mutable) {
                continue;
            }
            if is_predeclared_value(&arg.name) && !self.env.is_bound(&arg.name) {
                continue;
            }
            if self.cx.policy.violates(&arg.name) {
                violations.push((arg.span, arg.name.clone()));
            }
        }
        for (span, name) in violations {
            self.report(span, SubjectKind::Argument, name);
        }
    }
}

fn is_predeclared_value(name: &str) -> bool {
    matches!(name, "nil" | "true" | "false" | "iota")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::Decl;
    use crate::tests::Fixture;

    fn check(source: &str, max_depth: usize) -> Vec<Result<Vec<Diagnostic>, SkipReason>> {
        let program = Fixture::new().file("p", "p.go", source).build();
        let index = DeclIndex::build(&program);
        let policy = NamingPolicy::default();
        let pkg = &program.packages[0];
        let types = index.local_types(&pkg.id).cloned().unwrap_or_default();
        let cx = FileContext {
            index: &index,
            policy: &policy,
            package: &pkg.id,
            file: &pkg.files[0],
            types: &types,
            max_depth,
        };
        pkg.files[0]
            .ast
            .decls
            .iter()
            .filter_map(|decl| match decl {
                Decl::Func(func) => Some(check_function(&cx, func)),
                _ => None,
            })
            .collect()
    }

    fn names(source: &str) -> Vec<(SubjectKind, String)> {
        check(source, 512)
            .into_iter()
            .flat_map(|result| result.expect("checked"))
            .map(|diag| (diag.kind, diag.name))
            .collect()
    }

    #[test]
    fn define_reuse_in_same_scope_is_an_assignment() {
        let found = names(
            "package p\n\nfunc f() {\n\tx := 1\n\tx, mutY := 2, 3\n\tif true {\n\t\tx := 4\n\t\t_ = x\n\t}\n\t_, _ = x, mutY\n}\n",
        );
        assert_eq!(found, [(SubjectKind::Variable, "x".to_string())]);
    }

    #[test]
    fn inc_dec_and_compound_assignments_are_checked() {
        let found = names("package p\n\nfunc f(n, mutN int) {\n\tn++\n\tmutN--\n\tn += 2\n\tmutN <<= 1\n}\n");
        assert_eq!(
            found,
            [
                (SubjectKind::Variable, "n".to_string()),
                (SubjectKind::Variable, "n".to_string()),
            ]
        );
    }

    #[test]
    fn range_assign_checks_targets_and_range_define_declares() {
        let found = names(
            "package p\n\nfunc f(xs []int) {\n\tvar i, mutV int\n\tfor i, mutV = range xs {\n\t}\n\tfor k, v := range xs {\n\t\t_, _ = k, v\n\t}\n\t_, _ = i, mutV\n}\n",
        );
        assert_eq!(found, [(SubjectKind::Variable, "i".to_string())]);
    }

    #[test]
    fn field_names_use_declared_receiver_type() {
        let found = names(
            "package p\n\ntype User struct{ age, mutAge int }\n\nfunc f(u *User, v struct{ age int }) {\n\tu.mutAge = 1\n\tu.age = 2\n\tv.age = 3\n\tw := &User{}\n\tw.age = 4\n}\n",
        );
        assert_eq!(
            found,
            [
                (SubjectKind::Field, "User.age".to_string()),
                (SubjectKind::Field, "v.age".to_string()),
                (SubjectKind::Field, "User.age".to_string()),
            ]
        );
    }

    #[test]
    fn predeclared_values_are_not_arguments() {
        let found = names("package p\n\nfunc g(mutP *int) {}\n\nfunc f(p *int) {\n\tg(nil)\n\tg(p)\n}\n");
        assert_eq!(found, [(SubjectKind::Argument, "p".to_string())]);
    }

    #[test]
    fn goroutine_captures_are_reported_once_per_statement() {
        let found = names(
            "package p\n\nfunc work(n int) {}\n\nfunc f() {\n\tmutCount := 0\n\tlimit := 3\n\tgo func() {\n\t\tmutCount++\n\t\tmutCount += limit\n\t\tmutLocal := 1\n\t\tmutLocal++\n\t}()\n\tgo work(mutCount)\n\tgo func(mutArg int) { mutArg++ }(limit)\n}\n",
        );
        assert_eq!(
            found,
            [
                (SubjectKind::Capture, "mutCount".to_string()),
                (SubjectKind::Capture, "mutCount".to_string()),
                (SubjectKind::Argument, "limit".to_string()),
            ]
        );
    }

    #[test]
    fn deep_nesting_skips_the_function() {
        let results = check(
            "package p\n\nfunc deep() { x := ((((((((1)))))))); _ = x }\n\nfunc flat() { y := 1; y = 2 }\n",
            6,
        );
        assert_eq!(results[0], Err(SkipReason::TooDeep { limit: 6 }));
        let flat = results[1].as_ref().expect("flat is checked");
        assert_eq!(flat.len(), 1);
    }
}
