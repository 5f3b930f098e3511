//! Signature Normalizer.
//!
//! Turns the raw tokens of one method declaration into a canonical
//! [`MethodSignature`]. Qualifiers are collected as a set in one linear scan,
//! so their source order never matters.

use crate::lexer::{Token, TokenKind};
use crate::parser::RawMethodSpan;
use crate::spelling;
use protocol::{
    Indirection, IndirectionKind, MethodSignature, NameKind, Parameter, Qualifier, RefQualifier,
    SignatureError, TypeDescriptor,
};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Declaration specifiers that say nothing about the signature.
const SPECIFIERS: &[&str] = &[
    "static",
    "explicit",
    "constexpr",
    "consteval",
    "friend",
    "extern",
    "mutable",
    "register",
    "thread_local",
];

const BUILTIN_TYPES: &[&str] = &[
    "void", "bool", "char", "wchar_t", "char8_t", "char16_t", "char32_t", "short", "int", "long",
    "signed", "unsigned", "float", "double", "auto",
];

/// Identifiers that take a parenthesized argument without being a method name.
const PAREN_KEYWORDS: &[&str] = &["decltype", "alignas", "__attribute__", "__declspec"];

pub struct Normalizer<'a> {
    /// Nested enums and aliases visible at this point, by simple name.
    type_facts: &'a FxHashMap<String, String>,
}

struct NameSite<'t> {
    /// Index of the first token that belongs to the name.
    start: usize,
    /// Index of the `(` opening the parameter list.
    params_open: usize,
    name: String,
    kind: NameKind,
    conversion: Vec<&'t Token>,
}

impl<'a> Normalizer<'a> {
    pub fn new(type_facts: &'a FxHashMap<String, String>) -> Self {
        Self { type_facts }
    }

    pub fn normalize(&self, span: &RawMethodSpan) -> Result<MethodSignature, SignatureError> {
        let tokens = strip_attributes(&span.tokens);
        let site = locate_name(&tokens)?;
        let close = matching_paren(&tokens, site.params_open)
            .ok_or_else(|| SignatureError::UnsplittableParameters(spelling::join(tokens[site.params_open..].iter().copied())))?;

        let mut signature = MethodSignature {
            name: site.name.clone(),
            kind: site.kind.clone(),
            return_type: None,
            qualifiers: BTreeSet::new(),
            ref_qualifier: None,
            is_virtual: false,
            is_pure_virtual: false,
            is_noexcept: false,
            defined_inline: span.has_body,
            parameters: split_parameters(&tokens[site.params_open + 1..close])?,
            access: span.access,
        };

        let mut type_tokens = Vec::new();
        for &token in &tokens[..site.start] {
            match token.text.as_str() {
                "virtual" => signature.is_virtual = true,
                "inline" => {
                    signature.qualifiers.insert(Qualifier::Inline);
                }
                text if SPECIFIERS.contains(&text) => {}
                _ => type_tokens.push(token),
            }
        }

        let trailing_return = trailing(&tokens[close + 1..], &mut signature);

        signature.return_type = match site.kind {
            NameKind::Destructor => None,
            NameKind::Conversion => parse_type(&site.conversion),
            _ => {
                let written = match trailing_return {
                    Some(trailing) if type_tokens.iter().all(|t| t.is("auto")) => trailing,
                    _ => type_tokens,
                };
                if written.is_empty() {
                    return Err(SignatureError::MissingReturnType(site.name));
                }
                let (descriptor, method_cv) = return_type(&written);
                signature.qualifiers.extend(method_cv);
                let mut descriptor = descriptor.ok_or_else(|| SignatureError::MissingReturnType(site.name.clone()))?;
                descriptor.resolved = self.type_facts.get(&descriptor.base).cloned();
                Some(descriptor)
            }
        };

        signature.is_virtual |= signature.is_pure_virtual;
        Ok(signature)
    }
}

/// Name to report for a declaration the normalizer rejected.
pub fn best_effort_name(tokens: &[Token]) -> String {
    if let Some(index) = tokens.iter().position(|t| t.is("operator")) {
        let end = if tokens.get(index + 1).is_some_and(|t| t.is("(")) {
            index + 3
        } else {
            tokens[index..]
                .iter()
                .position(|t| t.is("("))
                .map_or(tokens.len(), |offset| index + offset)
        };
        return spelling::join(&tokens[index..end.min(tokens.len())]);
    }
    tokens
        .iter()
        .position(|t| t.is("("))
        .and_then(|index| index.checked_sub(1))
        .map(|index| &tokens[index])
        .filter(|t| t.kind == TokenKind::Identifier)
        .map_or_else(|| "<unnamed>".to_string(), |t| t.text.clone())
}

fn strip_attributes(tokens: &[Token]) -> Vec<&Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut depth = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if depth == 0 && token.is("[") && tokens.get(i + 1).is_some_and(|t| t.is("[")) {
            depth = 2;
            i += 2;
            continue;
        }
        if depth > 0 {
            if token.is("[") {
                depth += 1;
            } else if token.is("]") {
                depth -= 1;
            }
        } else {
            out.push(token);
        }
        i += 1;
    }
    out
}

fn locate_name<'t>(tokens: &[&'t Token]) -> Result<NameSite<'t>, SignatureError> {
    let mut angle = 0usize;
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        match token.text.as_str() {
            "operator" => return operator_site(tokens, i),
            "<" => angle += 1,
            ">" => angle = angle.saturating_sub(1),
            "(" if angle == 0 => {
                let prev = i.checked_sub(1).map(|p| tokens[p]).ok_or(SignatureError::MissingName)?;
                if PAREN_KEYWORDS.contains(&prev.text.as_str()) {
                    i = matching_paren(tokens, i).ok_or(SignatureError::MissingName)? + 1;
                    continue;
                }
                if prev.kind != TokenKind::Identifier {
                    return Err(SignatureError::MissingName);
                }
                let destructor = i >= 2 && tokens[i - 2].is("~");
                return Ok(NameSite {
                    start: if destructor { i - 2 } else { i - 1 },
                    params_open: i,
                    name: if destructor { format!("~{}", prev.text) } else { prev.text.clone() },
                    kind: if destructor { NameKind::Destructor } else { NameKind::Identifier },
                    conversion: Vec::new(),
                });
            }
            _ => {}
        }
        i += 1;
    }
    Err(SignatureError::MissingName)
}

fn operator_site<'t>(tokens: &[&'t Token], at: usize) -> Result<NameSite<'t>, SignatureError> {
    let is = |index: usize, text: &str| tokens.get(index).is_some_and(|t| t.is(text));
    let next = tokens.get(at + 1).ok_or(SignatureError::MissingName)?;

    let operator = |name: String, params_open: usize| NameSite {
        start: at,
        params_open,
        name,
        kind: NameKind::Operator,
        conversion: Vec::new(),
    };

    let site = match next.text.as_str() {
        "(" if is(at + 2, ")") => operator("operator()".to_string(), at + 3),
        "[" if is(at + 2, "]") => operator("operator[]".to_string(), at + 3),
        "new" | "delete" => {
            if is(at + 2, "[") && is(at + 3, "]") {
                operator(format!("operator {}[]", next.text), at + 4)
            } else {
                operator(format!("operator {}", next.text), at + 2)
            }
        }
        _ if next.is_punct() => {
            let mut end = at + 1;
            let mut symbol = String::new();
            while let Some(token) = tokens.get(end).filter(|t| t.is_punct() && !t.is("(")) {
                symbol.push_str(&token.text);
                end += 1;
            }
            operator(format!("operator{symbol}"), end)
        }
        _ => {
            let mut end = at + 1;
            let mut angle = 0usize;
            while let Some(token) = tokens.get(end) {
                match token.text.as_str() {
                    "<" => angle += 1,
                    ">" => angle = angle.saturating_sub(1),
                    "(" if angle == 0 => break,
                    _ => {}
                }
                end += 1;
            }
            let conversion = tokens[at + 1..end].to_vec();
            NameSite {
                start: at,
                params_open: end,
                name: format!("operator {}", spelling::join(conversion.iter().copied())),
                kind: NameKind::Conversion,
                conversion,
            }
        }
    };

    if is(site.params_open, "(") {
        Ok(site)
    } else {
        Err(SignatureError::MissingName)
    }
}

fn matching_paren(tokens: &[&Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        if token.is("(") {
            depth += 1;
        } else if token.is(")") {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
        }
    }
    None
}

/// Everything after the parameter list. Returns the trailing return type
/// tokens when `-> T` is present.
fn trailing<'t>(tokens: &[&'t Token], signature: &mut MethodSignature) -> Option<Vec<&'t Token>> {
    let mut trailing_return = None;
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].text.as_str() {
            "const" => {
                signature.qualifiers.insert(Qualifier::Const);
            }
            "volatile" => {
                signature.qualifiers.insert(Qualifier::Volatile);
            }
            "&" => signature.ref_qualifier = Some(RefQualifier::LValue),
            "&&" => signature.ref_qualifier = Some(RefQualifier::RValue),
            "noexcept" => {
                signature.is_noexcept = true;
                if tokens.get(i + 1).is_some_and(|t| t.is("(")) {
                    let Some(close) = matching_paren(tokens, i + 1) else {
                        break;
                    };
                    if close == i + 3 && tokens[i + 2].is("false") {
                        signature.is_noexcept = false;
                    }
                    i = close;
                }
            }
            "throw" => {
                if tokens.get(i + 1).is_some_and(|t| t.is("(")) {
                    let Some(close) = matching_paren(tokens, i + 1) else {
                        break;
                    };
                    if close == i + 2 {
                        signature.is_noexcept = true;
                    }
                    i = close;
                }
            }
            "override" | "final" => signature.is_virtual = true,
            "->" => {
                let mut end = i + 1;
                let mut angle = 0usize;
                while let Some(token) = tokens.get(end) {
                    match token.text.as_str() {
                        "<" => angle += 1,
                        ">" => angle = angle.saturating_sub(1),
                        "override" | "final" | "=" if angle == 0 => break,
                        _ => {}
                    }
                    end += 1;
                }
                trailing_return = Some(tokens[i + 1..end].to_vec());
                i = end;
                continue;
            }
            "=" => {
                if tokens.get(i + 1).is_some_and(|t| t.is("0")) {
                    signature.is_pure_virtual = true;
                }
                i += 2;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    trailing_return
}

/// By-value return types hand their top-level cv tokens to the method;
/// with an indirection they qualify the pointee or the pointer.
fn return_type(tokens: &[&Token]) -> (Option<TypeDescriptor>, Vec<Qualifier>) {
    if has_indirection(tokens) {
        return (parse_type(tokens), Vec::new());
    }
    let mut qualifiers = Vec::new();
    let mut rest = Vec::with_capacity(tokens.len());
    let mut angle = 0usize;
    for &token in tokens {
        match token.text.as_str() {
            "<" => angle += 1,
            ">" => angle = angle.saturating_sub(1),
            "const" | "volatile" if angle == 0 => {
                qualifiers.extend(Qualifier::from_keyword(&token.text));
                continue;
            }
            _ => {}
        }
        rest.push(token);
    }
    (parse_type(&rest), qualifiers)
}

fn has_indirection(tokens: &[&Token]) -> bool {
    let mut depth = 0usize;
    tokens.iter().any(|token| {
        match token.text.as_str() {
            "<" | "(" => depth += 1,
            ">" | ")" => depth = depth.saturating_sub(1),
            "*" | "&" | "&&" if depth == 0 => return true,
            _ => {}
        }
        false
    })
}

/// Build a descriptor, reading indirections right to left so that
/// `const int* const` keeps both consts where they belong.
fn parse_type(tokens: &[&Token]) -> Option<TypeDescriptor> {
    let mut end = tokens.len();
    let mut levels = Vec::new();
    let (mut is_const, mut is_volatile) = (false, false);
    while end > 0 {
        let kind = match tokens[end - 1].text.as_str() {
            "const" => {
                is_const = true;
                None
            }
            "volatile" => {
                is_volatile = true;
                None
            }
            "*" => Some(IndirectionKind::Pointer),
            "&" => Some(IndirectionKind::LvalueReference),
            "&&" => Some(IndirectionKind::RvalueReference),
            _ => break,
        };
        if let Some(kind) = kind {
            levels.push(Indirection {
                kind,
                is_const,
                is_volatile,
            });
            is_const = false;
            is_volatile = false;
        }
        end -= 1;
    }
    levels.reverse();

    let mut base = Vec::with_capacity(end);
    let mut angle = 0usize;
    for &token in &tokens[..end] {
        match token.text.as_str() {
            "<" => angle += 1,
            ">" => angle = angle.saturating_sub(1),
            "const" if angle == 0 => {
                is_const = true;
                continue;
            }
            "volatile" if angle == 0 => {
                is_volatile = true;
                continue;
            }
            _ => {}
        }
        base.push(token);
    }
    if base.is_empty() {
        return None;
    }

    Some(TypeDescriptor {
        base: spelling::join(base),
        is_const,
        is_volatile,
        indirections: levels,
        array_suffix: String::new(),
        resolved: None,
    })
}

fn split_parameters(tokens: &[&Token]) -> Result<Vec<Parameter>, SignatureError> {
    if tokens.is_empty() || (tokens.len() == 1 && tokens[0].is("void")) {
        return Ok(Vec::new());
    }
    let unsplittable = || SignatureError::UnsplittableParameters(spelling::join(tokens.iter().copied()));

    let mut pieces: Vec<&[&Token]> = Vec::new();
    let (mut paren, mut angle, mut brace, mut bracket) = (0i32, 0i32, 0i32, 0i32);
    let mut start = 0;
    for (index, token) in tokens.iter().enumerate() {
        match token.text.as_str() {
            "(" => paren += 1,
            ")" => paren -= 1,
            "<" => angle += 1,
            ">" if angle > 0 => angle -= 1,
            "{" => brace += 1,
            "}" => brace -= 1,
            "[" => bracket += 1,
            "]" => bracket -= 1,
            "," if paren == 0 && angle == 0 && brace == 0 && bracket == 0 => {
                pieces.push(&tokens[start..index]);
                start = index + 1;
            }
            _ => {}
        }
        if paren < 0 || brace < 0 || bracket < 0 {
            return Err(unsplittable());
        }
    }
    if paren != 0 || angle != 0 || brace != 0 || bracket != 0 {
        return Err(unsplittable());
    }
    pieces.push(&tokens[start..]);

    pieces
        .into_iter()
        .map(|piece| parameter(piece).ok_or_else(&unsplittable))
        .collect()
}

fn parameter(tokens: &[&Token]) -> Option<Parameter> {
    let mut depth = 0i32;
    let eq = tokens.iter().position(|token| {
        match token.text.as_str() {
            "(" | "<" | "[" | "{" => depth += 1,
            ")" | ">" | "]" | "}" => depth -= 1,
            "=" if depth == 0 => return true,
            _ => {}
        }
        false
    });
    let (declaration, default_value) = match eq {
        Some(index) if index + 1 < tokens.len() => (
            &tokens[..index],
            Some(spelling::join(tokens[index + 1..].iter().copied())),
        ),
        Some(_) => return None,
        None => (tokens, None),
    };

    let mut end = declaration.len();
    while end > 0 && declaration[end - 1].is("]") {
        let open = declaration[..end].iter().rposition(|t| t.is("["))?;
        end = open;
    }
    let array_suffix = spelling::join(declaration[end..].iter().copied());
    let declaration = &declaration[..end];

    let (type_tokens, name) = match declaration.split_last() {
        Some((last, rest)) if is_parameter_name(last, rest) => (rest, Some(last.text.clone())),
        _ => (declaration, None),
    };

    let mut ty = parse_type(type_tokens)?;
    ty.array_suffix = array_suffix;
    Some(Parameter {
        ty,
        name,
        default_value,
    })
}

/// A trailing identifier is a name when what precedes it still contains a
/// base type of its own.
fn is_parameter_name(last: &Token, rest: &[&Token]) -> bool {
    if last.kind != TokenKind::Identifier || BUILTIN_TYPES.contains(&last.text.as_str()) {
        return false;
    }
    match rest.last() {
        None => false,
        Some(prev) if prev.is("::") || ["typename", "struct", "class", "enum", "union"].contains(&prev.text.as_str()) => {
            false
        }
        Some(_) => rest
            .iter()
            .any(|t| t.kind == TokenKind::Identifier || t.is(">") || t.is("...")),
    }
}
