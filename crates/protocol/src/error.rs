//! Error taxonomy of the extraction pipeline.
//!
//! `LexError` and `ParseError` abort the unit they occur in, `SignatureError`
//! only affects one method, and `NameCollisionError` is raised once all units
//! have been merged.

use crate::{Diagnostic, Position};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated block comment")]
    UnterminatedComment { position: Position },

    #[error("unterminated string literal")]
    UnterminatedString { position: Position },

    #[error("unterminated character literal")]
    UnterminatedChar { position: Position },

    #[error("#{directive} without a matching #if")]
    UnbalancedConditional { position: Position, directive: String },

    #[error("conditional block is never closed with #endif")]
    UnterminatedConditional { position: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedComment { position }
            | LexError::UnterminatedString { position }
            | LexError::UnterminatedChar { position }
            | LexError::UnbalancedConditional { position, .. }
            | LexError::UnterminatedConditional { position } => *position,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {expected}")]
pub struct ParseError {
    pub position: Position,
    pub expected: String,
}

impl ParseError {
    pub fn new(position: Position, expected: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("cannot split parameter list: {0}")]
    UnsplittableParameters(String),

    #[error("no return type for `{0}`")]
    MissingReturnType(String),

    #[error("cannot locate the method name")]
    MissingName,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "`{qualified_name}` names two different classes ({first_unit}:{first_position} and {second_unit}:{second_position})"
)]
pub struct NameCollisionError {
    pub qualified_name: String,
    pub first_unit: String,
    pub first_position: Position,
    pub second_unit: String,
    pub second_position: Position,
}

/// A fatal failure of a pipeline run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{unit}:{}: {source}", .source.position())]
    Lex { unit: String, source: LexError },

    #[error("{unit}:{}: {source}", .source.position)]
    Parse { unit: String, source: ParseError },

    #[error(transparent)]
    NameCollision(#[from] NameCollisionError),
}

impl ExtractError {
    pub fn unit(&self) -> &str {
        match self {
            ExtractError::Lex { unit, .. } | ExtractError::Parse { unit, .. } => unit,
            ExtractError::NameCollision(err) => &err.second_unit,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            ExtractError::Lex { source, .. } => source.position(),
            ExtractError::Parse { source, .. } => source.position,
            ExtractError::NameCollision(err) => err.second_position,
        }
    }

    /// The terminal error record of a failed run.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = match self {
            ExtractError::Lex { source, .. } => source.to_string(),
            ExtractError::Parse { source, .. } => source.to_string(),
            ExtractError::NameCollision(err) => err.to_string(),
        };
        Diagnostic::error(self.unit(), self.position(), message)
    }
}
