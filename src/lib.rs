pub mod analysis;
pub mod diagnostics;
pub mod language;
pub mod lint;
pub mod logging;
pub mod project;

#[cfg(test)]
mod tests;
