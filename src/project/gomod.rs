use miette::Diagnostic;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till1},
    character::complete::{char, space0, space1},
    sequence::delimited,
    IResult,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const GO_MOD: &str = "go.mod";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoMod {
    pub path: PathBuf,
    pub root: PathBuf,
    pub module: String,
    pub go_version: Option<String>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum GoModError {
    #[error("failed to read {}: {error}", .path.display())]
    #[diagnostic(code(go_immutable::gomod::io))]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("{} has no module directive", .path.display())]
    #[diagnostic(
        code(go_immutable::gomod::missing_module),
        help("add a line like `module example.com/project` to go.mod")
    )]
    MissingModule { path: PathBuf },
}

impl GoMod {
    pub fn load(path: &Path) -> Result<Self, GoModError> {
        let text = fs::read_to_string(path).map_err(|error| GoModError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let module = parse_module_path(&text).ok_or_else(|| GoModError::MissingModule {
            path: path.to_path_buf(),
        })?;
        let root = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            path: path.to_path_buf(),
            root,
            module,
            go_version: parse_go_version(&text),
        })
    }
}

pub fn find_go_mod(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_dir() {
        start.to_path_buf()
    } else {
        start
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    };
    loop {
        let candidate = current.join(GO_MOD);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

pub fn parse_module_path(text: &str) -> Option<String> {
    directive_lines(text).find_map(|line| module_directive(line).ok().map(|(_, path)| path))
}

pub fn parse_go_version(text: &str) -> Option<String> {
    directive_lines(text).find_map(|line| go_directive(line).ok().map(|(_, v)| v.to_string()))
}

fn directive_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(|line| match line.find("//") {
        Some(index) => &line[..index],
        None => line,
    })
}

fn module_directive(input: &str) -> IResult<&str, String> {
    let (input, _) = space0(input)?;
    let (input, _) = tag("module")(input)?;
    let (input, _) = space1(input)?;
    let (input, path) = alt((
        delimited(char('"'), is_not("\""), char('"')),
        delimited(char('`'), is_not("`"), char('`')),
        take_till1(|c: char| c.is_whitespace()),
    ))(input)?;
    Ok((input, path.to_string()))
}

fn go_directive(input: &str) -> IResult<&str, &str> {
    let (input, _) = space0(input)?;
    let (input, _) = tag("go")(input)?;
    let (input, _) = space1(input)?;
    take_till1(|c: char| c.is_whitespace())(input)
}
