//! Pure-virtual interface extraction for C++ headers.

pub mod lexer;
pub mod normalizer;
pub mod parser;
pub mod preprocessor;
pub mod resolver;
pub mod spelling;

pub use resolver::{PlainClass, UnitModel};

use protocol::ExtractError;
use rustc_hash::FxHashSet;
use tracing::debug;

#[cfg(test)]
mod edge_cases;

#[derive(Debug, Clone, Default)]
pub struct CppHarness {
    symbols: FxHashSet<String>,
}

impl CppHarness {
    /// `symbols` are the names defined before every unit, as with `-D`.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn symbols(&self) -> &FxHashSet<String> {
        &self.symbols
    }

    /// Extract the interfaces declared in one unit. Lexing and parsing
    /// failures abort the unit; per-method problems become warnings.
    pub fn extract(&self, unit: &str, text: &str) -> Result<UnitModel, ExtractError> {
        let tokens = lexer::tokenize(text, &self.symbols).map_err(|source| ExtractError::Lex {
            unit: unit.to_string(),
            source,
        })?;
        debug!("{}: {} tokens", unit, tokens.len());

        let tree = parser::parse(&tokens).map_err(|source| ExtractError::Parse {
            unit: unit.to_string(),
            source,
        })?;
        debug!("{}: {} scopes", unit, tree.len());

        let model = resolver::resolve(unit, &tree);
        debug!(
            "{}: {} interfaces, {} diagnostics",
            unit,
            model.records.len(),
            model.diagnostics.len()
        );
        Ok(model)
    }
}
