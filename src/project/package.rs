use crate::language::{ast, errors::SyntaxError, parser::parse_file, span::LineIndex};
use crate::project::{
    gomod::{find_go_mod, GoMod, GoModError},
    imports::ImportTable,
};
use miette::Diagnostic;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path used in diagnostics, relative to the working directory when possible.
    pub path: PathBuf,
    pub source: String,
    pub lines: LineIndex,
    pub ast: ast::File,
    pub imports: ImportTable,
}

#[derive(Debug, Clone)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub dir: PathBuf,
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub packages: Vec<Package>,
}

#[derive(Debug)]
pub struct FileErrors {
    pub path: PathBuf,
    pub source: String,
    pub errors: Vec<SyntaxError>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("failed to access {}: {error}", .path.display())]
    #[diagnostic(code(go_immutable::load::io))]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("invalid target pattern `{pattern}`: {reason}")]
    #[diagnostic(
        code(go_immutable::load::pattern),
        help("use a directory (`./pkg`), a recursive pattern (`./...`) or an import path inside the module")
    )]
    InvalidPattern { pattern: String, reason: String },
    #[error("pattern `{pattern}` matched no Go packages")]
    #[diagnostic(code(go_immutable::load::no_packages))]
    NoPackages { pattern: String },
    #[error(transparent)]
    #[diagnostic(transparent)]
    GoMod(#[from] GoModError),
    #[error("{} file(s) failed to parse", .0.len())]
    #[diagnostic(code(go_immutable::load::syntax))]
    Syntax(Vec<FileErrors>),
}

impl Program {
    /// Assembles packages in the given order and fills every file's import
    /// table, using package clause names of the loaded packages as aliases.
    pub fn new(mut packages: Vec<Package>) -> Self {
        let names: HashMap<String, String> = packages
            .iter()
            .map(|pkg| (pkg.id.clone(), pkg.name.clone()))
            .collect();
        for pkg in &mut packages {
            for file in &mut pkg.files {
                file.imports = ImportTable::build(&file.ast.imports, &names);
            }
        }
        Self { packages }
    }

    pub fn file_count(&self) -> usize {
        self.packages.iter().map(|pkg| pkg.files.len()).sum()
    }
}

/// Parses the files of one package. `files` are `(display path, source)`
/// pairs and are kept in the given order.
pub fn parse_package(
    id: &str,
    dir: &Path,
    files: Vec<(PathBuf, String)>,
) -> Result<Package, Vec<FileErrors>> {
    let mut parsed = Vec::new();
    let mut failures = Vec::new();
    for (path, source) in files {
        match parse_file(&source) {
            Ok(ast) => parsed.push(SourceFile {
                path,
                lines: LineIndex::new(&source),
                source,
                ast,
                imports: ImportTable::default(),
            }),
            Err(errs) => failures.push(FileErrors {
                path,
                source,
                errors: errs.errors,
            }),
        }
    }
    if !failures.is_empty() {
        return Err(failures);
    }
    let name = parsed
        .first()
        .map(|file| file.ast.package.name.clone())
        .unwrap_or_else(|| default_package_name(id).to_string());
    Ok(Package {
        id: id.to_string(),
        name,
        dir: dir.to_path_buf(),
        files: parsed,
    })
}

fn default_package_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

struct Target {
    dir: PathBuf,
    recursive: bool,
}

/// Resolves `pattern` relative to `cwd` and loads every matching package.
pub fn load_program(pattern: &str, cwd: &Path) -> Result<Program, LoadError> {
    let target = resolve_target(pattern, cwd)?;
    let module = module_for(&target.dir)?;
    tracing::debug!(
        module = %module.module,
        root = %module.root.display(),
        "resolved module"
    );

    let mut dirs = Vec::new();
    if target.recursive {
        collect_package_dirs(&target.dir, &module.root, &mut dirs)?;
    } else if has_go_files(&target.dir)? {
        dirs.push(target.dir.clone());
    }

    let cwd = canonicalize(cwd)?;
    let mut packages = Vec::new();
    let mut failures = Vec::new();
    for dir in dirs {
        let id = package_id(&module, &dir);
        let mut files = Vec::new();
        for path in go_files(&dir)? {
            let source = fs::read_to_string(&path).map_err(|error| LoadError::Io {
                path: path.clone(),
                error,
            })?;
            files.push((display_path(&path, &cwd), source));
        }
        match parse_package(&id, &dir, files) {
            Ok(pkg) => {
                tracing::debug!(package = %pkg.id, files = pkg.files.len(), "loaded package");
                packages.push(pkg);
            }
            Err(mut errs) => failures.append(&mut errs),
        }
    }

    if !failures.is_empty() {
        return Err(LoadError::Syntax(failures));
    }
    if packages.is_empty() {
        return Err(LoadError::NoPackages {
            pattern: pattern.to_string(),
        });
    }
    let program = Program::new(packages);
    tracing::info!(
        packages = program.packages.len(),
        files = program.file_count(),
        "loaded program"
    );
    Ok(program)
}

fn resolve_target(pattern: &str, cwd: &Path) -> Result<Target, LoadError> {
    let invalid = |reason: &str| LoadError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };
    if pattern.trim().is_empty() {
        return Err(invalid("pattern is empty"));
    }
    let (base, recursive) = match pattern.strip_suffix("...") {
        Some(rest) => {
            let rest = rest.strip_suffix('/').unwrap_or(rest);
            if !rest.is_empty() && rest.ends_with('/') {
                return Err(invalid("unexpected `/` before `...`"));
            }
            (if rest.is_empty() { "." } else { rest }, true)
        }
        None => (pattern, false),
    };
    if base.contains("...") {
        return Err(invalid("`...` is only supported as the final path element"));
    }

    let is_path = base.starts_with('.') || Path::new(base).is_absolute();
    let dir = if is_path || cwd.join(base).is_dir() {
        cwd.join(base)
    } else {
        import_path_dir(base, cwd).ok_or_else(|| {
            invalid("not a directory and not an import path inside the current module")
        })?
    };
    if !dir.is_dir() {
        return Err(invalid("directory does not exist"));
    }
    Ok(Target {
        dir: canonicalize(&dir)?,
        recursive,
    })
}

fn import_path_dir(import_path: &str, cwd: &Path) -> Option<PathBuf> {
    let module = GoMod::load(&find_go_mod(cwd)?).ok()?;
    if import_path == module.module {
        return Some(module.root);
    }
    let rest = import_path.strip_prefix(&module.module)?.strip_prefix('/')?;
    Some(module.root.join(rest))
}

fn module_for(dir: &Path) -> Result<GoMod, LoadError> {
    match find_go_mod(dir) {
        Some(path) => {
            let mut module = GoMod::load(&path)?;
            module.root = canonicalize(&module.root)?;
            Ok(module)
        }
        None => {
            let module = dir
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("main")
                .to_string();
            tracing::warn!(
                dir = %dir.display(),
                module = %module,
                "no go.mod found; using the directory name as module path"
            );
            Ok(GoMod {
                path: dir.join(crate::project::gomod::GO_MOD),
                root: dir.to_path_buf(),
                module,
                go_version: None,
            })
        }
    }
}

fn package_id(module: &GoMod, dir: &Path) -> String {
    let rel = dir.strip_prefix(&module.root).unwrap_or(Path::new(""));
    let segments: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        module.module.clone()
    } else {
        format!("{}/{}", module.module, segments.join("/"))
    }
}

fn collect_package_dirs(
    dir: &Path,
    module_root: &Path,
    out: &mut Vec<PathBuf>,
) -> Result<(), LoadError> {
    if dir != module_root && dir.join(crate::project::gomod::GO_MOD).is_file() {
        tracing::debug!(dir = %dir.display(), "skipping nested module");
        return Ok(());
    }
    if has_go_files(dir)? {
        out.push(dir.to_path_buf());
    }
    for child in sorted_entries(dir)? {
        if !child.is_dir() {
            continue;
        }
        let name = child
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.starts_with('.') || name.starts_with('_') || name == "testdata" || name == "vendor"
        {
            continue;
        }
        collect_package_dirs(&child, module_root, out)?;
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |error| LoadError::Io {
        path: dir.to_path_buf(),
        error,
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        entries.push(entry.map_err(io_err)?.path());
    }
    entries.sort();
    Ok(entries)
}

fn is_go_source(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".go")
        && !name.ends_with("_test.go")
        && !name.starts_with('.')
        && !name.starts_with('_')
        && path.is_file()
}

fn go_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|path| is_go_source(path))
        .collect())
}

fn has_go_files(dir: &Path) -> Result<bool, LoadError> {
    Ok(!go_files(dir)?.is_empty())
}

fn canonicalize(path: &Path) -> Result<PathBuf, LoadError> {
    path.canonicalize().map_err(|error| LoadError::Io {
        path: path.to_path_buf(),
        error,
    })
}

fn display_path(path: &Path, cwd: &Path) -> PathBuf {
    path.strip_prefix(cwd)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(path, contents).expect("write file");
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().expect("tempdir");
        let root = dir.path();
        write(root, "go.mod", "module go-immutable\n\ngo 1.21\n");
        write(root, "main.go", "package main\n\nfunc main() {}\n");
        write(
            root,
            "example/example.go",
            "package example\n\nimport \"go-immutable/example/mod1\"\n\nfunc f() { mod1.Do() }\n",
        );
        write(root, "example/example_test.go", "package example\n");
        write(root, "example/mod1/mod1.go", "package mod1\n\nfunc Do() {}\n");
        write(root, "example/testdata/skip.go", "package skip\n");
        write(root, "nested/go.mod", "module other\n");
        write(root, "nested/n.go", "package n\n");
        dir
    }

    #[test]
    fn recursive_pattern_loads_packages_in_path_order() {
        let dir = fixture();
        let program = load_program("./...", dir.path()).expect("load");
        let ids: Vec<_> = program.packages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            ["go-immutable", "go-immutable/example", "go-immutable/example/mod1"]
        );
        let example = &program.packages[1];
        assert_eq!(example.name, "example");
        assert_eq!(example.files.len(), 1);
        assert_eq!(example.files[0].path, Path::new("example/example.go"));
        assert_eq!(
            example.files[0].imports.resolve("mod1"),
            Some("go-immutable/example/mod1")
        );
    }

    #[test]
    fn single_directory_and_import_path_patterns() {
        let dir = fixture();
        let program = load_program("./example", dir.path()).expect("load dir");
        assert_eq!(program.packages.len(), 1);
        assert_eq!(program.packages[0].id, "go-immutable/example");

        let program = load_program("go-immutable/example/...", dir.path()).expect("load path");
        assert_eq!(program.packages.len(), 2);
    }

    #[test]
    fn syntax_errors_fail_the_load() {
        let dir = fixture();
        write(dir.path(), "broken/b.go", "package broken\nfunc {\n");
        match load_program("./...", dir.path()) {
            Err(LoadError::Syntax(files)) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].path, Path::new("broken/b.go"));
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn bad_patterns_are_fatal() {
        let dir = fixture();
        assert!(matches!(
            load_program("./missing", dir.path()),
            Err(LoadError::InvalidPattern { .. })
        ));
        assert!(matches!(
            load_program("", dir.path()),
            Err(LoadError::InvalidPattern { .. })
        ));
        let empty = tempdir().expect("tempdir");
        write(empty.path(), "go.mod", "module empty\n");
        assert!(matches!(
            load_program("./...", empty.path()),
            Err(LoadError::NoPackages { .. })
        ));
    }

    #[test]
    fn missing_go_mod_falls_back_to_directory_name() {
        let dir = tempdir().expect("tempdir");
        write(dir.path(), "app/a.go", "package app\n");
        let program = load_program("./app", dir.path()).expect("load");
        assert_eq!(program.packages[0].id, "app");
    }
}
