use crate::diagnostics::MutabilityDiagnostic;
use crate::language::span::{Position, Span};
use crate::project::{config::OutputFormat, package::Program};
use miette::NamedSource;
use serde::Serialize;
use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SubjectKind {
    Argument,
    Variable,
    /// Write to a struct field, named `Type.field`. Older Go checkers for this
    /// convention print the same finding as `Variable 'recv.field'`, so their
    /// output does not diff line for line against ours.
    Field,
    Capture,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::Argument => "Argument",
            SubjectKind::Variable => "Variable",
            SubjectKind::Field => "Field",
            SubjectKind::Capture => "Capture",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: Position,
    pub span: Span,
    pub kind: SubjectKind,
    pub name: String,
}

impl Diagnostic {
    pub fn new(position: Position, span: Span, kind: SubjectKind, name: String) -> Self {
        Self {
            position,
            span,
            kind,
            name,
        }
    }

    pub fn message(&self) -> String {
        match self.kind {
            SubjectKind::Capture => format!(
                "Capture '{}' is mutable and must not be shared with a goroutine",
                self.name
            ),
            kind => format!("{kind} '{}' should be prefixed with 'mut' or 'Mut'", self.name),
        }
    }

    pub fn help(&self) -> &'static str {
        match self.kind {
            SubjectKind::Argument => "the parameter is declared mutable; pass a `mut`-prefixed binding",
            SubjectKind::Variable => "rename the binding with a `mut` prefix or stop assigning to it",
            SubjectKind::Field => "rename the field with a `mut`/`Mut` prefix or stop assigning to it",
            SubjectKind::Capture => "pass an immutable copy to the goroutine instead",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message())
    }
}

/// Collects diagnostics from concurrent checker workers.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    inner: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn extend(&self, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            return;
        }
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(diagnostics);
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    file: String,
    line: usize,
    column: usize,
    kind: SubjectKind,
    name: &'a str,
    message: String,
}

/// Outcome of one analysis run, in source-position order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
    pub functions: usize,
    pub skipped: usize,
}

impl Report {
    pub fn new(mut diagnostics: Vec<Diagnostic>, functions: usize, skipped: usize) -> Self {
        diagnostics.sort_by(|a, b| {
            (&a.position, a.kind, &a.name).cmp(&(&b.position, b.kind, &b.name))
        });
        Self {
            diagnostics,
            functions,
            skipped,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn render(&self, format: OutputFormat, program: &Program) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Plain => Ok(self.render_plain()),
            OutputFormat::Json => self.render_json(),
            OutputFormat::Fancy => Ok(self.render_fancy(program)),
        }
    }

    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        for diagnostic in &self.diagnostics {
            out.push_str(&diagnostic.to_string());
            out.push('\n');
        }
        out
    }

    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        let entries: Vec<JsonDiagnostic<'_>> = self
            .diagnostics
            .iter()
            .map(|diagnostic| JsonDiagnostic {
                file: diagnostic.position.file.display().to_string(),
                line: diagnostic.position.line,
                column: diagnostic.position.column,
                kind: diagnostic.kind,
                name: &diagnostic.name,
                message: diagnostic.message(),
            })
            .collect();
        let mut out = serde_json::to_string_pretty(&entries)?;
        out.push('\n');
        Ok(out)
    }

    /// Source-annotated reports; diagnostics whose file is not part of
    /// `program` fall back to the plain line.
    pub fn render_fancy(&self, program: &Program) -> String {
        let mut out = String::new();
        for diagnostic in &self.diagnostics {
            let source = program
                .packages
                .iter()
                .flat_map(|pkg| &pkg.files)
                .find(|file| file.path == diagnostic.position.file);
            match source {
                Some(file) => {
                    let named =
                        NamedSource::new(file.path.display().to_string(), file.source.clone());
                    let report = miette::Report::new(MutabilityDiagnostic::new(named, diagnostic));
                    out.push_str(&format!("{report:?}\n"));
                }
                None => {
                    out.push_str(&diagnostic.to_string());
                    out.push('\n');
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn diag(file: &str, line: usize, column: usize, kind: SubjectKind, name: &str) -> Diagnostic {
        Diagnostic::new(
            Position {
                file: Path::new(file).to_path_buf(),
                line,
                column,
                offset: 0,
            },
            Span::default(),
            kind,
            name.to_string(),
        )
    }

    #[test]
    fn plain_lines_follow_the_fixed_format() {
        let report = Report::new(
            vec![
                diag("b.go", 1, 1, SubjectKind::Variable, "x"),
                diag("a.go", 9, 3, SubjectKind::Field, "User.age"),
                diag("a.go", 2, 5, SubjectKind::Argument, "immutableVariable"),
                diag("a.go", 9, 1, SubjectKind::Capture, "mutCount"),
            ],
            4,
            0,
        );
        assert_eq!(
            report.render_plain(),
            "a.go:2:5: Argument 'immutableVariable' should be prefixed with 'mut' or 'Mut'\n\
             a.go:9:1: Capture 'mutCount' is mutable and must not be shared with a goroutine\n\
             a.go:9:3: Field 'User.age' should be prefixed with 'mut' or 'Mut'\n\
             b.go:1:1: Variable 'x' should be prefixed with 'mut' or 'Mut'\n"
        );
        assert_eq!(report.count(), 4);
    }

    #[test]
    fn sink_accepts_concurrent_appends() {
        let sink = DiagnosticSink::default();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let sink = &sink;
                scope.spawn(move || {
                    for line in 0..25 {
                        sink.extend(vec![diag("x.go", worker * 100 + line + 1, 1, SubjectKind::Variable, "x")]);
                    }
                });
            }
        });
        let report = Report::new(sink.into_inner(), 0, 0);
        assert_eq!(report.count(), 100);
        let lines: Vec<usize> = report.diagnostics().iter().map(|d| d.position.line).collect();
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        assert_eq!(lines, sorted);
    }

    #[test]
    fn json_carries_every_field() {
        let report = Report::new(vec![diag("a.go", 3, 7, SubjectKind::Variable, "x")], 1, 0);
        let value: serde_json::Value =
            serde_json::from_str(&report.render_json().expect("json")).expect("parse");
        assert_eq!(value[0]["file"], "a.go");
        assert_eq!(value[0]["line"], 3);
        assert_eq!(value[0]["column"], 7);
        assert_eq!(value[0]["kind"], "Variable");
        assert_eq!(value[0]["name"], "x");
        assert_eq!(
            value[0]["message"],
            "Variable 'x' should be prefixed with 'mut' or 'Mut'"
        );
    }

    #[test]
    fn empty_report_renders_nothing() {
        let report = Report::default();
        assert!(report.is_clean());
        assert_eq!(report.render_plain(), "");
        assert_eq!(report.render_json().expect("json"), "[]\n");
    }
}
