use serde::{Deserialize, Serialize};
use std::fmt;

pub mod diagnostics;
pub mod error;
pub mod model;

pub use diagnostics::{Diagnostic, Severity};
pub use error::{ExtractError, LexError, NameCollisionError, ParseError, SignatureError};
pub use model::{
    Indirection, IndirectionKind, InterfaceModel, InterfaceRecord, MethodSignature, NameKind,
    Parameter, Qualifier, RedefinitionOutcome, RefQualifier, TypeDescriptor,
};

/// 1-based location inside a source unit.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl Access {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "public" => Some(Access::Public),
            "protected" => Some(Access::Protected),
            "private" => Some(Access::Private),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Protected => "protected",
            Access::Private => "private",
        }
    }
}

/// The keyword a class-like scope was introduced with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClassKey {
    Class,
    Struct,
    Union,
}

impl ClassKey {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(ClassKey::Class),
            "struct" => Some(ClassKey::Struct),
            "union" => Some(ClassKey::Union),
            _ => None,
        }
    }

    /// Access in effect before the first access specifier of a body.
    pub fn default_access(&self) -> Access {
        match self {
            ClassKey::Class => Access::Private,
            ClassKey::Struct | ClassKey::Union => Access::Public,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_access_follows_class_key() {
        assert_eq!(ClassKey::Class.default_access(), Access::Private);
        assert_eq!(ClassKey::Struct.default_access(), Access::Public);
        assert_eq!(ClassKey::from_keyword("struct"), Some(ClassKey::Struct));
        assert_eq!(ClassKey::from_keyword("namespace"), None);
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(12, 5).to_string(), "12:5");
        assert!(Position::new(1, 9) < Position::new(2, 1));
    }
}
