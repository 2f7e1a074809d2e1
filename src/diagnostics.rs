use crate::{
    analysis::report::{Diagnostic as Finding, SubjectKind},
    language::errors::SyntaxError,
    project::package::{FileErrors, LoadError},
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(go_immutable::syntax))]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label,
        }
    }
}

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(go_immutable::naming))]
pub struct MutabilityDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl MutabilityDiagnostic {
    pub fn new(src: NamedSource<String>, finding: &Finding) -> Self {
        let label = match finding.kind {
            SubjectKind::Argument => "immutable argument for a mutable parameter",
            SubjectKind::Variable => "assigned here",
            SubjectKind::Field => "field assigned here",
            SubjectKind::Capture => "shared with a goroutine here",
        };
        Self {
            src,
            span: (finding.span.start, finding.span.len()).into(),
            help: Some(finding.help().to_string()),
            message: finding.message(),
            label: label.to_string(),
        }
    }
}

pub fn emit_syntax_errors(errors: &[FileErrors]) {
    for file in errors {
        let src = NamedSource::new(file.path.display().to_string(), file.source.clone());
        for err in &file.errors {
            let diagnostic = SyntaxDiagnostic::from_error(src.clone(), err.clone());
            eprintln!("{:?}", Report::new(diagnostic));
        }
    }
}

/// Prints a fatal load error; syntax errors get one source snippet each.
pub fn emit_load_error(error: LoadError) {
    match error {
        LoadError::Syntax(files) => {
            emit_syntax_errors(&files);
            let paths: Vec<String> = files
                .iter()
                .map(|file| file.path.display().to_string())
                .collect();
            eprintln!("error: failed to parse {}", paths.join(", "));
        }
        other => eprintln!("{:?}", Report::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::{Position, Span};
    use std::path::PathBuf;

    #[test]
    fn mutability_diagnostic_points_at_the_name() {
        let source = "package p\n\nfunc f() { x = 1 }\n".to_string();
        let finding = Finding::new(
            Position {
                file: PathBuf::from("p.go"),
                line: 3,
                column: 12,
                offset: 22,
            },
            Span::new(22, 23),
            SubjectKind::Variable,
            "x".to_string(),
        );
        let diagnostic =
            MutabilityDiagnostic::new(NamedSource::new("p.go", source), &finding);
        assert_eq!(
            diagnostic.to_string(),
            "Variable 'x' should be prefixed with 'mut' or 'Mut'"
        );
        let code = Diagnostic::code(&diagnostic).map(|code| code.to_string());
        assert_eq!(code.as_deref(), Some("go_immutable::naming"));
    }
}
