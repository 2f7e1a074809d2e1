pub mod config;
pub mod gomod;
pub mod imports;
pub mod package;

pub use package::{load_program, FileErrors, LoadError, Package, Program, SourceFile};
