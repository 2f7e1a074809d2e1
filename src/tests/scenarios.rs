use super::Fixture;
use crate::analysis::{
    analyze,
    index::{DeclIndex, QualifiedId},
    report::{Report, SubjectKind},
};
use crate::language::ast::Decl;
use crate::project::{config::Config, package::Program};

fn lines(report: &Report) -> Vec<String> {
    report.render_plain().lines().map(str::to_string).collect()
}

fn findings(program: &Program) -> Vec<(SubjectKind, String)> {
    analyze(program, &Config::default())
        .diagnostics()
        .iter()
        .map(|diag| (diag.kind, diag.name.clone()))
        .collect()
}

fn single(source: &str) -> Program {
    Fixture::new().file("demo", "demo.go", source).build()
}

const EXAMPLE: &str = "package example

import \"go-immutable/example/mod1\"

type User struct {
\tmutName string
\tmutAge  int
}

func (User) ChangeSomething(mutFuncVar int) {
}

func changeUser(u User, mutLolWhat int) {
\tmutLolWhat = 4

\tu.mutName = \"John\"
\tu.mutAge = 30
}

func test() {
\timmutableVariable := 3
\tmutableVariable := 4

\tchangeLol(immutableVariable, mutableVariable)

\tmod1.ChangeSomething(immutableVariable)

\tvar lol mod1.LolWhat
\tlol.ChangeSomething(immutableVariable)


\tvar user User
\tuser.ChangeSomething(immutableVariable)
}
";

const MOD1: &str = "package mod1

type LolWhat struct{}

func (LolWhat) ChangeSomething(mutFuncVar int) {}

func ChangeSomething(mutX int) {}
";

fn example_program() -> Program {
    Fixture::new()
        .file("go-immutable/example", "example/example.go", EXAMPLE)
        .file("go-immutable/example/mod1", "example/mod1/mod1.go", MOD1)
        .build()
}

#[test]
fn example_module_reports_every_immutable_argument() {
    let report = analyze(&example_program(), &Config::default());
    let message = "Argument 'immutableVariable' should be prefixed with 'mut' or 'Mut'";
    assert_eq!(
        lines(&report),
        [
            format!("example/example.go:26:23: {message}"),
            format!("example/example.go:29:22: {message}"),
            format!("example/example.go:33:23: {message}"),
        ]
    );
}

#[test]
fn mutable_parameter_rejects_immutable_argument() {
    let program = single(
        "package demo

func f(mutFuncVar int) {}

func g() {
\timmutableVariable := 1
\tmutableVariable := 2
\tf(immutableVariable)
\tf(mutableVariable)
}
",
    );
    assert_eq!(
        findings(&program),
        [(SubjectKind::Argument, "immutableVariable".to_string())]
    );
}

#[test]
fn immutable_parameter_accepts_anything() {
    let program = single(
        "package demo

func f(a, b int, rest ...int) {}

func g(mutA int) {
\tx := 1
\tf(mutA, x, x, mutA)
}
",
    );
    assert!(findings(&program).is_empty());
}

#[test]
fn declaration_is_free_but_reassignment_is_not() {
    let program = single(
        "package demo

func g() {
\tx := 3
\tx = 4
\tvar y int
\ty = 5
\tmutZ := 1
\tmutZ = 2
\t_ = 6
\t_, _, _ = x, y, mutZ
}
",
    );
    assert_eq!(
        findings(&program),
        [
            (SubjectKind::Variable, "x".to_string()),
            (SubjectKind::Variable, "y".to_string()),
        ]
    );
}

#[test]
fn field_assignment_checks_the_field_name() {
    let program = single(
        "package demo

type User struct {
\tage    int
\tmutAge int
}

func g() {
\tvar user User
\tuser.mutAge = 30
\tuser.age = 30
}
",
    );
    let report = analyze(&program, &Config::default());
    assert_eq!(
        lines(&report),
        ["demo.go:11:7: Field 'User.age' should be prefixed with 'mut' or 'Mut'"]
    );
}

#[test]
fn goroutines_must_not_share_mutable_bindings() {
    let program = single(
        "package demo

func update(p *int) {}

func g() {
\tmutTotal := 0
\tlimit := 10
\tgo func() {
\t\tmutTotal = limit
\t}()
\tgo update(&mutTotal)
\tgo func() {
\t\tprintln(limit)
\t}()
}
",
    );
    let report = analyze(&program, &Config::default());
    let capture = "Capture 'mutTotal' is mutable and must not be shared with a goroutine";
    assert_eq!(
        lines(&report),
        [
            format!("demo.go:9:3: {capture}"),
            format!("demo.go:11:13: {capture}"),
        ]
    );
}

#[test]
fn goroutines_must_not_call_methods_on_mutable_receivers() {
    let program = single(
        "package demo

type Counter struct{ mutN int }

func (c *Counter) Inc() {}

func g() {
\tmutC := &Counter{}
\tplain := &Counter{}
\tgo func() {
\t\tmutC.Inc()
\t}()
\tgo mutC.Inc()
\tgo plain.Inc()
}
",
    );
    let report = analyze(&program, &Config::default());
    let capture = "Capture 'mutC' is mutable and must not be shared with a goroutine";
    assert_eq!(
        lines(&report),
        [
            format!("demo.go:11:3: {capture}"),
            format!("demo.go:13:5: {capture}"),
        ]
    );
}

#[test]
fn method_on_imported_type_resolves_through_alias() {
    let program = Fixture::new()
        .file(
            "example.com/app",
            "app/app.go",
            "package app

import m \"example.com/lib/models\"

type Local struct{}

func (l *Local) Update(mutTarget int) {}

func run() {
\tvar svc m.Service
\tremote := &m.Service{}
\tlocal := Local{}
\tx := 1
\tmutY := 2
\tsvc.Update(x)
\tsvc.Update(mutY)
\tremote.Update(x)
\tlocal.Update(x)
}
",
        )
        .file(
            "example.com/lib/models",
            "models/models.go",
            "package models

type Service struct{}

func (s *Service) Update(mutTarget int) {}
",
        )
        .build();
    let report = analyze(&program, &Config::default());
    assert_eq!(
        lines(&report),
        [
            "app/app.go:15:13: Argument 'x' should be prefixed with 'mut' or 'Mut'",
            "app/app.go:17:16: Argument 'x' should be prefixed with 'mut' or 'Mut'",
            "app/app.go:18:15: Argument 'x' should be prefixed with 'mut' or 'Mut'",
        ]
    );
}

#[test]
fn undeterminable_receivers_are_skipped() {
    let program = single(
        "package demo

type Svc struct{}

func (s Svc) Update(mutTarget int) {}

func make() Svc { return Svc{} }

func g(v interface{}) {
\tx := 1
\tv.(Svc).Update(x)
\tmake().Update(x)
\ts := make()
\ts.Update(x)
\tunknown.Update(x)
}
",
    );
    assert!(findings(&program).is_empty());
}

#[test]
fn repeated_runs_are_identical() {
    let program = example_program();
    let first = analyze(&program, &Config::default()).render_plain();
    let second = analyze(&program, &Config::default()).render_plain();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn parallel_checking_matches_sequential_order() {
    let program = example_program();
    let sequential = analyze(&program, &Config::default());
    let parallel = analyze(
        &program,
        &Config {
            jobs: 4,
            ..Config::default()
        },
    );
    assert_eq!(sequential.diagnostics(), parallel.diagnostics());
}

#[test]
fn declaration_and_call_site_keys_agree() {
    let program = example_program();
    let index = DeclIndex::build(&program);
    for pkg in &program.packages {
        for file in &pkg.files {
            for decl in &file.ast.decls {
                let Decl::Func(func) = decl else { continue };
                let id = QualifiedId::of_decl(&pkg.id, func).expect("qualified");
                assert!(index.contains(&id), "{id} missing from the index");
            }
        }
    }
    assert!(index.contains(&QualifiedId::method(
        "go-immutable/example/mod1",
        "LolWhat",
        "ChangeSomething"
    )));
}

#[test]
fn configured_exemptions_silence_names() {
    let program = single(
        "package demo

func h() error { return nil }

func g() {
\terr := h()
\terr = h()
\t_ = err
}
",
    );
    assert_eq!(
        findings(&program),
        [(SubjectKind::Variable, "err".to_string())]
    );
    let config = Config {
        exempt: ["err".to_string()].into_iter().collect(),
        ..Config::default()
    };
    assert!(analyze(&program, &config).is_clean());
}

#[test]
fn deeply_nested_function_is_skipped_alone() {
    let program = single(
        "package demo

func deep() {
\tif true { if true { if true { if true { x := 1; x = 2 } } } }
}

func shallow() {
\ty := 1
\ty = 2
}
",
    );
    let config = Config {
        max_depth: 5,
        ..Config::default()
    };
    let report = analyze(&program, &config);
    assert_eq!(report.functions, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        report
            .diagnostics()
            .iter()
            .map(|diag| diag.name.as_str())
            .collect::<Vec<_>>(),
        ["y"]
    );
}
