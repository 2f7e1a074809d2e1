//! Mutability analysis over a loaded [`Program`].
//!
//! The declaration index is built for the whole program before any function
//! body is checked, so calls across packages see every signature. Each body is
//! then checked on its own and may be skipped without affecting the others.

pub mod check;
pub mod index;
pub mod mutability;
pub mod report;
pub mod resolve;

use crate::language::ast::{Decl, FuncDecl};
use crate::project::{
    config::Config,
    package::{Package, Program, SourceFile},
};
use check::{check_function, FileContext, SkipReason};
use index::DeclIndex;
use mutability::NamingPolicy;
use report::{Diagnostic, DiagnosticSink, Report};
use std::{
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

/// One function body together with where it was declared.
struct Unit<'p> {
    package: &'p Package,
    file: &'p SourceFile,
    decl: &'p FuncDecl,
}

/// Body checker run for every function; swapped out only by tests.
type CheckFn = fn(&FileContext<'_>, &FuncDecl) -> Result<Vec<Diagnostic>, SkipReason>;

pub fn analyze(program: &Program, config: &Config) -> Report {
    analyze_with(program, config, check_function)
}

fn analyze_with(program: &Program, config: &Config, body: CheckFn) -> Report {
    let index = DeclIndex::build(program);
    tracing::debug!(declarations = index.len(), "built declaration index");

    let policy = NamingPolicy::new(config.exempt.iter().cloned());
    let units = collect_units(program);
    let jobs = worker_count(config.jobs, units.len());
    let analyzer = Analyzer {
        index: &index,
        policy: &policy,
        max_depth: config.max_depth,
        body,
    };

    let sink = DiagnosticSink::default();
    let skipped = AtomicUsize::new(0);
    if jobs <= 1 {
        for unit in &units {
            analyzer.run(unit, &sink, &skipped);
        }
    } else {
        let next = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..jobs {
                scope.spawn(|| loop {
                    let slot = next.fetch_add(1, Ordering::Relaxed);
                    let Some(unit) = units.get(slot) else {
                        break;
                    };
                    analyzer.run(unit, &sink, &skipped);
                });
            }
        });
    }

    let report = Report::new(
        sink.into_inner(),
        units.len(),
        skipped.load(Ordering::Relaxed),
    );
    tracing::info!(
        functions = report.functions,
        skipped = report.skipped,
        diagnostics = report.count(),
        jobs,
        "analysis finished"
    );
    report
}

fn collect_units(program: &Program) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    for package in &program.packages {
        for file in &package.files {
            for decl in &file.ast.decls {
                if let Decl::Func(decl) = decl {
                    units.push(Unit {
                        package,
                        file,
                        decl,
                    });
                }
            }
        }
    }
    units
}

fn worker_count(requested: usize, units: usize) -> usize {
    let jobs = if requested == 0 {
        thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        requested
    };
    jobs.min(units.max(1))
}

struct Analyzer<'a> {
    index: &'a DeclIndex,
    policy: &'a NamingPolicy,
    max_depth: usize,
    body: CheckFn,
}

impl Analyzer<'_> {
    fn run(&self, unit: &Unit<'_>, sink: &DiagnosticSink, skipped: &AtomicUsize) {
        match self.check(unit) {
            Ok(diagnostics) => sink.extend(diagnostics),
            Err(reason) => {
                skipped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    package = %unit.package.id,
                    file = %unit.file.path.display(),
                    function = %unit.decl.name.name,
                    %reason,
                    "skipping function"
                );
            }
        }
    }

    fn check(&self, unit: &Unit<'_>) -> Result<Vec<Diagnostic>, SkipReason> {
        let empty = HashSet::new();
        let cx = FileContext {
            index: self.index,
            policy: self.policy,
            package: &unit.package.id,
            file: unit.file,
            types: self.index.local_types(&unit.package.id).unwrap_or(&empty),
            max_depth: self.max_depth,
        };
        panic::catch_unwind(AssertUnwindSafe(|| (self.body)(&cx, unit.decl)))
            .unwrap_or_else(|payload| Err(SkipReason::Fault(panic_message(payload.as_ref()))))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
