use crate::analysis::index::{DeclIndex, QualifiedId, TypeNames, TypeRef};
use crate::language::ast::{Expr, ExprKind};
use crate::project::imports::ImportTable;
use std::collections::HashSet;
use thiserror::Error;

/// A function-local binding as far as call resolution cares.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    pub ty: Option<TypeRef>,
}

impl Binding {
    pub fn typed(ty: Option<TypeRef>) -> Self {
        Self { ty }
    }
}

/// Lexical view of the bindings visible at a call site.
pub trait LocalScope {
    fn lookup(&self, name: &str) -> Option<&Binding>;

    fn is_bound(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

/// A scope with nothing bound, for resolving outside function bodies.
pub struct NoLocals;

impl LocalScope for NoLocals {
    fn lookup(&self, _name: &str) -> Option<&Binding> {
        None
    }
}

/// Why a call site was left unchecked. Never reported to the user.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Miss {
    #[error("`{0}` is a local binding, not a package function")]
    ShadowedFunction(String),
    #[error("`{0}` is not a function of the current package")]
    UnknownFunction(String),
    #[error("`{0}` is neither an import nor a known binding")]
    UnknownReceiver(String),
    #[error("declared type of `{0}` is unknown")]
    UntypedReceiver(String),
    #[error("receiver is not a simple identifier")]
    ComplexReceiver,
    #[error("callee is not a name or selector")]
    UnsupportedCallee,
}

/// Maps call sites in one file back to [`QualifiedId`]s.
pub struct Resolver<'a> {
    index: &'a DeclIndex,
    package: &'a str,
    imports: &'a ImportTable,
    types: &'a HashSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        index: &'a DeclIndex,
        package: &'a str,
        imports: &'a ImportTable,
        types: &'a HashSet<String>,
    ) -> Self {
        Self {
            index,
            package,
            imports,
            types,
        }
    }

    pub fn type_names(&self) -> TypeNames<'a> {
        TypeNames {
            package: self.package,
            types: self.types,
            imports: self.imports,
        }
    }

    /// Resolves the callee of a call expression.
    pub fn resolve_call(&self, callee: &Expr, scope: &dyn LocalScope) -> Result<QualifiedId, Miss> {
        let callee = strip_instantiation(callee);
        match &callee.kind {
            ExprKind::Ident(ident) => {
                if scope.is_bound(&ident.name) {
                    return Err(Miss::ShadowedFunction(ident.name.clone()));
                }
                if self.index.has_function(self.package, &ident.name) {
                    Ok(QualifiedId::function(self.package, &ident.name))
                } else {
                    Err(Miss::UnknownFunction(ident.name.clone()))
                }
            }
            ExprKind::Selector { base, field } => {
                let Some(receiver) = base.unparen().as_ident() else {
                    return Err(Miss::ComplexReceiver);
                };
                if !scope.is_bound(&receiver.name) {
                    if let Some(path) = self.imports.resolve(&receiver.name) {
                        return Ok(QualifiedId::function(path, &field.name));
                    }
                }
                let ty = self.receiver_type(&receiver.name, scope)?;
                Ok(QualifiedId::method(&ty.package, &ty.name, &field.name))
            }
            _ => Err(Miss::UnsupportedCallee),
        }
    }

    /// Declared type of a receiver identifier: the innermost local binding,
    /// else a package-level variable.
    pub fn receiver_type(&self, name: &str, scope: &dyn LocalScope) -> Result<TypeRef, Miss> {
        if let Some(binding) = scope.lookup(name) {
            return binding
                .ty
                .clone()
                .ok_or_else(|| Miss::UntypedReceiver(name.to_string()));
        }
        match self.index.package_var(self.package, name) {
            Some(Some(ty)) => Ok(ty.clone()),
            Some(None) => Err(Miss::UntypedReceiver(name.to_string())),
            None => Err(Miss::UnknownReceiver(name.to_string())),
        }
    }

    pub fn is_import(&self, name: &str, scope: &dyn LocalScope) -> bool {
        !scope.is_bound(name) && self.imports.contains(name)
    }
}

/// `f[T]`, `(f)` and `(pkg.F[T])` all call the underlying name.
fn strip_instantiation(expr: &Expr) -> &Expr {
    let expr = expr.unparen();
    match &expr.kind {
        ExprKind::Index { base, .. } => match &base.unparen().kind {
            ExprKind::Ident(_) | ExprKind::Selector { .. } => base.unparen(),
            _ => expr,
        },
        _ => expr,
    }
}
