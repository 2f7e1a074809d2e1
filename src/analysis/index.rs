use crate::language::ast::{Decl, Expr, ExprKind, Field, FuncDecl, UnaryOp, ValueSpec};
use crate::project::{imports::ImportTable, package::Program};
use std::{
    collections::{HashMap, HashSet},
    fmt,
};

/// Key naming one function or method across the program:
/// `<package>.<name>` or `<package>.<ReceiverType>.<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedId(String);

impl QualifiedId {
    pub fn function(package: &str, name: &str) -> Self {
        Self(format!("{package}.{name}"))
    }

    pub fn method(package: &str, receiver: &str, name: &str) -> Self {
        Self(format!("{package}.{receiver}.{name}"))
    }

    /// Identifier of a declaration as it appears in `package`.
    pub fn of_decl(package: &str, decl: &FuncDecl) -> Option<Self> {
        match &decl.recv {
            None => Some(Self::function(package, &decl.name.name)),
            Some(recv) => {
                receiver_type_name(&recv.ty).map(|ty| Self::method(package, ty, &decl.name.name))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifiedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named type, fully qualified by the package that declares it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub package: String,
    pub name: String,
}

impl TypeRef {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

/// Package-level names that call resolution needs besides signatures.
#[derive(Clone, Debug, Default)]
pub struct PackageSymbols {
    pub functions: HashSet<String>,
    pub types: HashSet<String>,
    /// Package-level variables and, when derivable, their named type.
    pub vars: HashMap<String, Option<TypeRef>>,
}

#[derive(Clone, Debug, Default)]
pub struct DeclIndex {
    signatures: HashMap<QualifiedId, Vec<String>>,
    packages: HashMap<String, PackageSymbols>,
}

impl DeclIndex {
    pub fn build(program: &Program) -> Self {
        let mut index = DeclIndex::default();
        for pkg in &program.packages {
            let mut symbols = PackageSymbols::default();
            let mut pending_vars: Vec<(&ImportTable, &ValueSpec)> = Vec::new();
            for file in &pkg.files {
                for decl in &file.ast.decls {
                    match decl {
                        Decl::Func(func) => {
                            if func.recv.is_none() {
                                symbols.functions.insert(func.name.name.clone());
                            }
                            if let Some(id) = QualifiedId::of_decl(&pkg.id, func) {
                                index.signatures.insert(id, param_names(&func.sig.params));
                            }
                        }
                        Decl::Type(specs) => {
                            symbols
                                .types
                                .extend(specs.iter().map(|spec| spec.name.name.clone()));
                        }
                        Decl::Var(specs) => {
                            pending_vars.extend(specs.iter().map(|spec| (&file.imports, spec)));
                        }
                        Decl::Const(_) => {}
                    }
                }
            }

            // Variable types may name types declared in a later file.
            for (imports, spec) in pending_vars {
                let names = TypeNames {
                    package: &pkg.id,
                    types: &symbols.types,
                    imports,
                };
                for (slot, name) in spec.names.iter().enumerate() {
                    if name.is_blank() {
                        continue;
                    }
                    let ty = names.of_value_spec(spec, slot, &|_: &str| false);
                    symbols.vars.insert(name.name.clone(), ty);
                }
            }

            tracing::trace!(
                package = %pkg.id,
                functions = symbols.functions.len(),
                types = symbols.types.len(),
                vars = symbols.vars.len(),
                "indexed package"
            );
            index.packages.insert(pkg.id.clone(), symbols);
        }
        index
    }

    pub fn signature(&self, id: &QualifiedId) -> Option<&[String]> {
        self.signatures.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &QualifiedId) -> bool {
        self.signatures.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn package(&self, id: &str) -> Option<&PackageSymbols> {
        self.packages.get(id)
    }

    pub fn has_function(&self, package: &str, name: &str) -> bool {
        self.package(package)
            .is_some_and(|symbols| symbols.functions.contains(name))
    }

    pub fn package_var(&self, package: &str, name: &str) -> Option<&Option<TypeRef>> {
        self.package(package)
            .and_then(|symbols| symbols.vars.get(name))
    }

    pub fn local_types(&self, package: &str) -> Option<&HashSet<String>> {
        self.package(package).map(|symbols| &symbols.types)
    }
}

/// Parameter names in declaration order. Unnamed parameters take the blank
/// name so later positions still line up.
pub fn param_names(params: &[Field]) -> Vec<String> {
    let mut names = Vec::new();
    for field in params {
        if field.names.is_empty() {
            names.push("_".to_string());
        } else {
            names.extend(field.names.iter().map(|name| name.name.clone()));
        }
    }
    names
}

/// Base type name of a receiver: `T`, `*T`, `T[K]` and `*T[K]` all give `T`.
pub fn receiver_type_name(ty: &Expr) -> Option<&str> {
    match &ty.kind {
        ExprKind::Ident(ident) => Some(&ident.name),
        ExprKind::Star(inner) | ExprKind::Paren(inner) => receiver_type_name(inner),
        ExprKind::Index { base, .. } => receiver_type_name(base),
        _ => None,
    }
}

/// Turns type and initializer expressions into [`TypeRef`]s from the point
/// of view of one file. `bound` reports names shadowed by local bindings.
pub struct TypeNames<'a> {
    pub package: &'a str,
    pub types: &'a HashSet<String>,
    pub imports: &'a ImportTable,
}

impl<'a> TypeNames<'a> {
    pub fn named_type(&self, ty: &Expr, bound: &dyn Fn(&str) -> bool) -> Option<TypeRef> {
        match &ty.kind {
            ExprKind::Ident(ident) => {
                if !bound(&ident.name) && self.types.contains(&ident.name) {
                    Some(TypeRef::new(self.package, ident.name.clone()))
                } else {
                    None
                }
            }
            ExprKind::Selector { base, field } => {
                let alias = base.unparen().as_ident()?;
                if bound(&alias.name) {
                    return None;
                }
                let path = self.imports.resolve(&alias.name)?;
                Some(TypeRef::new(path, field.name.clone()))
            }
            ExprKind::Star(inner) | ExprKind::Paren(inner) => self.named_type(inner, bound),
            ExprKind::Index { base, .. } => self.named_type(base, bound),
            _ => None,
        }
    }

    /// Type of `T{...}`, `&T{...}` and `new(T)`.
    pub fn initializer_type(&self, value: &Expr, bound: &dyn Fn(&str) -> bool) -> Option<TypeRef> {
        match &value.kind {
            ExprKind::CompositeLit { ty: Some(ty), .. } => self.named_type(ty, bound),
            ExprKind::Unary {
                op: UnaryOp::Addr,
                operand,
            } => match &operand.unparen().kind {
                ExprKind::CompositeLit { .. } => self.initializer_type(operand.unparen(), bound),
                _ => None,
            },
            ExprKind::Call { func, args, .. } => {
                let callee = func.unparen().as_ident()?;
                if callee.name != "new" || bound("new") || args.len() != 1 {
                    return None;
                }
                self.named_type(&args[0], bound)
            }
            ExprKind::Paren(inner) => self.initializer_type(inner, bound),
            _ => None,
        }
    }

    /// Type of the `slot`-th name of a `var` spec: its declared type, else the
    /// matching initializer when names and values pair up one to one.
    pub fn of_value_spec(
        &self,
        spec: &ValueSpec,
        slot: usize,
        bound: &dyn Fn(&str) -> bool,
    ) -> Option<TypeRef> {
        if let Some(ty) = &spec.ty {
            return self.named_type(ty, bound);
        }
        if spec.values.len() == spec.names.len() {
            return self.initializer_type(&spec.values[slot], bound);
        }
        None
    }
}
