use crate::project::package::{parse_package, Program};
use std::path::PathBuf;

mod scenarios;

/// In-memory program built from source strings, in insertion order.
#[derive(Default)]
pub(crate) struct Fixture {
    packages: Vec<(String, Vec<(PathBuf, String)>)>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn file(mut self, package: &str, path: &str, source: &str) -> Self {
        let entry = (PathBuf::from(path), source.to_string());
        match self.packages.iter_mut().find(|(id, _)| id == package) {
            Some((_, files)) => files.push(entry),
            None => self.packages.push((package.to_string(), vec![entry])),
        }
        self
    }

    pub(crate) fn build(self) -> Program {
        let packages = self
            .packages
            .into_iter()
            .map(|(id, files)| {
                let dir = PathBuf::from(&id);
                match parse_package(&id, &dir, files) {
                    Ok(pkg) => pkg,
                    Err(failures) => panic!(
                        "fixture package {id} failed to parse: {:?}",
                        failures
                            .iter()
                            .flat_map(|file| file.errors.iter().map(|err| err.message.clone()))
                            .collect::<Vec<_>>()
                    ),
                }
            })
            .collect();
        Program::new(packages)
    }
}
