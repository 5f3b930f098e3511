//! The Interface Model: canonical signatures grouped per interface.
//!
//! Everything in here is produced by the extraction pipeline and handed,
//! read-only, to the generator. Equality is structural, so two declarations
//! that only differ in qualifier order or whitespace compare equal.

use crate::{Access, ClassKey, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Qualifiers that apply to the method itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    Const,
    Volatile,
    Inline,
}

impl Qualifier {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "const" => Some(Qualifier::Const),
            "volatile" => Some(Qualifier::Volatile),
            "inline" => Some(Qualifier::Inline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RefQualifier {
    LValue,
    RValue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndirectionKind {
    Pointer,
    LvalueReference,
    RvalueReference,
}

impl IndirectionKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            IndirectionKind::Pointer => "*",
            IndirectionKind::LvalueReference => "&",
            IndirectionKind::RvalueReference => "&&",
        }
    }
}

/// One level of `*`, `&` or `&&` together with the cv-qualifiers written
/// to its right.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Indirection {
    pub kind: IndirectionKind,
    pub is_const: bool,
    pub is_volatile: bool,
}

impl Indirection {
    pub fn new(kind: IndirectionKind) -> Self {
        Self {
            kind,
            is_const: false,
            is_volatile: false,
        }
    }
}

/// A type as written in a declaration.
///
/// `indirections` is ordered from the base type outwards, so
/// `const int * const` is base `int` (const) followed by one const pointer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub base: String,
    pub is_const: bool,
    pub is_volatile: bool,
    pub indirections: Vec<Indirection>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub array_suffix: String,
    /// Qualified name of a nested enum or alias the base refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
}

impl TypeDescriptor {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            is_const: false,
            is_volatile: false,
            indirections: Vec::new(),
            array_suffix: String::new(),
            resolved: None,
        }
    }

    pub fn with_indirection(mut self, indirection: Indirection) -> Self {
        self.indirections.push(indirection);
        self
    }

    pub fn is_void(&self) -> bool {
        self.base == "void" && self.indirections.is_empty() && self.array_suffix.is_empty()
    }

    pub fn has_indirection(&self) -> bool {
        !self.indirections.is_empty()
    }

    /// Canonical source spelling, e.g. `const int* const`.
    pub fn spelling(&self) -> String {
        let mut out = String::new();
        if self.is_const {
            out.push_str("const ");
        }
        if self.is_volatile {
            out.push_str("volatile ");
        }
        out.push_str(&self.base);
        for level in &self.indirections {
            out.push_str(level.kind.symbol());
            if level.is_const {
                out.push_str(" const");
            }
            if level.is_volatile {
                out.push_str(" volatile");
            }
        }
        out.push_str(&self.array_suffix);
        out
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spelling())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    pub name: Option<String>,
    /// Default argument text, kept verbatim and never evaluated.
    pub default_value: Option<String>,
}

/// How a method is named. Unparseable declarations keep their text and the
/// reason so callers can still report them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    Identifier,
    Operator,
    Conversion,
    Destructor,
    Unparseable { reason: String, text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub kind: NameKind,
    pub return_type: Option<TypeDescriptor>,
    pub qualifiers: BTreeSet<Qualifier>,
    pub ref_qualifier: Option<RefQualifier>,
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    pub is_noexcept: bool,
    pub defined_inline: bool,
    pub parameters: Vec<Parameter>,
    pub access: Access,
}

impl MethodSignature {
    /// Stand-in for a declaration the normalizer rejected.
    pub fn placeholder(name: impl Into<String>, text: impl Into<String>, reason: impl Into<String>, access: Access) -> Self {
        Self {
            name: name.into(),
            kind: NameKind::Unparseable {
                reason: reason.into(),
                text: text.into(),
            },
            return_type: None,
            qualifiers: BTreeSet::new(),
            ref_qualifier: None,
            is_virtual: false,
            is_pure_virtual: false,
            is_noexcept: false,
            defined_inline: false,
            parameters: Vec::new(),
            access,
        }
    }

    pub fn is_const(&self) -> bool {
        self.qualifiers.contains(&Qualifier::Const)
    }

    pub fn is_volatile(&self) -> bool {
        self.qualifiers.contains(&Qualifier::Volatile)
    }

    pub fn is_inline(&self) -> bool {
        self.qualifiers.contains(&Qualifier::Inline)
    }

    /// A concrete override must provide this method.
    pub fn is_mandatory_override(&self) -> bool {
        self.is_pure_virtual
    }

    /// Virtual but with a default implementation.
    pub fn is_overridable(&self) -> bool {
        self.is_virtual && !self.is_pure_virtual
    }

    pub fn is_destructor(&self) -> bool {
        self.kind == NameKind::Destructor
    }

    pub fn is_operator(&self) -> bool {
        self.kind == NameKind::Operator
    }

    pub fn is_unparseable(&self) -> bool {
        matches!(self.kind, NameKind::Unparseable { .. })
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// What the resolver did when one qualified name was defined more than once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RedefinitionOutcome {
    #[default]
    Unique,
    Replaced {
        discarded: usize,
        method_set_changed: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub qualified_name: String,
    pub name: String,
    pub class_key: ClassKey,
    pub namespaces: Vec<String>,
    pub enclosing_classes: Vec<String>,
    pub template_params: Vec<String>,
    pub bases: Vec<String>,
    pub methods: Vec<MethodSignature>,
    pub redefinition: RedefinitionOutcome,
    pub unit: String,
    pub position: Position,
    /// Identifies the anonymous namespaces the class was declared in. Two
    /// records with the same qualified name and different boundaries are
    /// distinct classes that the emitted name cannot tell apart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<String>,
    pub fingerprint: String,
}

impl InterfaceRecord {
    pub fn is_template(&self) -> bool {
        !self.template_params.is_empty()
    }

    /// `T<Elem>` for templates, the plain name otherwise.
    pub fn template_interface(&self) -> String {
        if self.is_template() {
            format!("{}<{}>", self.name, self.template_params.join(", "))
        } else {
            self.name.clone()
        }
    }

    pub fn mandatory_methods(&self) -> impl Iterator<Item = &MethodSignature> {
        self.methods.iter().filter(|m| m.is_mandatory_override())
    }

    pub fn overridable_methods(&self) -> impl Iterator<Item = &MethodSignature> {
        self.methods.iter().filter(|m| m.is_overridable())
    }

    pub fn has_destructor(&self) -> bool {
        self.methods.iter().any(|m| m.is_destructor())
    }

    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Stable digest over the parts of the record that describe the interface.
    pub fn compute_fingerprint(&self) -> String {
        let canonical = format!(
            "{:?}|{:?}|{:?}|{:?}",
            self.qualified_name, self.class_key, self.template_params, self.methods
        );
        format!("{:x}", md5::compute(canonical))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceModel {
    pub interfaces: Vec<InterfaceRecord>,
}

impl InterfaceModel {
    pub fn new(interfaces: Vec<InterfaceRecord>) -> Self {
        Self { interfaces }
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InterfaceRecord> {
        self.interfaces.iter()
    }

    pub fn get(&self, qualified_name: &str) -> Option<&InterfaceRecord> {
        self.interfaces.iter().find(|r| r.qualified_name == qualified_name)
    }

    /// Interfaces whose qualified name starts with `prefix`.
    pub fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a InterfaceRecord> + 'a {
        self.interfaces
            .iter()
            .filter(move |r| r.qualified_name.starts_with(prefix))
    }
}

impl<'a> IntoIterator for &'a InterfaceModel {
    type Item = &'a InterfaceRecord;
    type IntoIter = std::slice::Iter<'a, InterfaceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.interfaces.iter()
    }
}
