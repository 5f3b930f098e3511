//! Declaration parser. Function bodies are balanced, never read.

use crate::lexer::{Token, TokenKind};
use crate::spelling;
use protocol::{Access, ClassKey, ParseError, Position};
use tracing::trace;

pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    AnonymousNamespace,
    Class,
    Struct,
    TemplateClass,
}

impl ScopeKind {
    pub fn is_class_like(self) -> bool {
        matches!(self, ScopeKind::Class | ScopeKind::Struct | ScopeKind::TemplateClass)
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// Empty for the global scope and anonymous namespaces.
    pub name: String,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub position: Position,
    pub class: Option<ClassBody>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassBody {
    pub key: Option<ClassKey>,
    pub template_params: Vec<String>,
    pub bases: Vec<String>,
    pub is_final: bool,
    pub members: Vec<Member>,
}

impl ClassBody {
    pub fn key(&self) -> ClassKey {
        self.key.unwrap_or(ClassKey::Class)
    }

    pub fn methods(&self) -> impl Iterator<Item = &RawMethodSpan> {
        self.members.iter().filter_map(|member| match member {
            Member::Method(span) => Some(span),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Method(RawMethodSpan),
    /// A nested enum or type alias, usable as a return type by later methods.
    TypeFact(TypeFact),
    /// A nested class; the scope id points into the tree.
    Class(ScopeId),
    Other {
        kind: OtherKind,
        text: String,
        access: Access,
        position: Position,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherKind {
    Constructor,
    Function,
    Data,
    Declaration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFactKind {
    Enum,
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFact {
    pub name: String,
    pub kind: TypeFactKind,
    pub position: Position,
}

/// Tokens of one method declaration, from its first qualifier up to (not
/// including) the terminating `;` or body.
#[derive(Debug, Clone)]
pub struct RawMethodSpan {
    pub tokens: Vec<Token>,
    pub access: Access,
    pub has_body: bool,
    pub position: Position,
}

impl RawMethodSpan {
    pub fn text(&self) -> String {
        spelling::join(&self.tokens)
    }

    /// Ends in `= 0`.
    pub fn is_pure_virtual(&self) -> bool {
        ends_pure(&self.tokens)
    }

    pub fn is_virtual(&self) -> bool {
        self.is_pure_virtual()
            || self
                .tokens
                .iter()
                .any(|token| token.is("virtual") || token.is("override") || token.is("final"))
    }
}

#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    fn new() -> Self {
        Self {
            scopes: vec![Scope {
                id: 0,
                kind: ScopeKind::Global,
                name: String::new(),
                parent: None,
                children: Vec::new(),
                position: Position::new(1, 1),
                class: None,
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        0
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.len() <= 1
    }

    /// All scopes in pre-order, which is also source order of their openings.
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn class_scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().filter(|scope| scope.kind.is_class_like())
    }

    /// Ancestors from the outermost down to `id` itself.
    pub fn path(&self, id: ScopeId) -> Vec<&Scope> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(scope_id) = current {
            let scope = &self.scopes[scope_id];
            path.push(scope);
            current = scope.parent;
        }
        path.reverse();
        path
    }

    /// Named segments only; anonymous namespaces and the global scope add none.
    pub fn qualified_name(&self, id: ScopeId) -> String {
        self.path(id)
            .iter()
            .filter(|scope| !scope.name.is_empty())
            .map(|scope| scope.name.as_str())
            .collect::<Vec<_>>()
            .join("::")
    }

    /// Named namespace segments enclosing `id`.
    pub fn namespaces(&self, id: ScopeId) -> Vec<String> {
        self.path(id)
            .iter()
            .filter(|scope| scope.kind == ScopeKind::Namespace)
            .map(|scope| scope.name.clone())
            .collect()
    }

    /// Names of the classes enclosing `id`, outermost first, excluding `id`.
    pub fn enclosing_classes(&self, id: ScopeId) -> Vec<String> {
        let path = self.path(id);
        path[..path.len().saturating_sub(1)]
            .iter()
            .filter(|scope| scope.kind.is_class_like())
            .map(|scope| scope.name.clone())
            .collect()
    }

    pub fn anonymous_ancestors(&self, id: ScopeId) -> Vec<&Scope> {
        self.path(id)
            .into_iter()
            .filter(|scope| scope.kind == ScopeKind::AnonymousNamespace)
            .collect()
    }

    fn push(&mut self, parent: ScopeId, kind: ScopeKind, name: String, position: Position) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            id,
            kind,
            name,
            parent: Some(parent),
            children: Vec::new(),
            position,
            class: None,
        });
        self.scopes[parent].children.push(id);
        id
    }

    fn class_mut(&mut self, id: ScopeId) -> &mut ClassBody {
        self.scopes[id].class.get_or_insert_with(ClassBody::default)
    }
}

/// Parse a token stream into a scope tree.
pub fn parse(tokens: &[Token]) -> Result<ScopeTree, ParseError> {
    let significant: Vec<Token> = tokens
        .iter()
        .filter(|token| token.kind != TokenKind::Directive)
        .cloned()
        .collect();
    let mut parser = Parser {
        tokens: &significant,
        pos: 0,
        tree: ScopeTree::new(),
    };
    let root = parser.tree.root();
    parser.declarations(root, None)?;
    Ok(parser.tree)
}

const CLASS_KEYS: &[&str] = &["class", "struct", "union"];
const ACCESS_KEYWORDS: &[&str] = &["public", "protected", "private"];
const HEAD_SPECIFIERS: &[&str] = &["alignas", "__declspec", "__attribute__", "__attribute", "decltype"];

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    tree: ScopeTree,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    /// The token under the cursor; callers have already peeked it.
    fn current(&self) -> &'t Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, ahead: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn peek_is(&self, ahead: usize, text: &str) -> bool {
        self.peek_at(ahead).is_some_and(|token| token.is(text))
    }

    fn eof_position(&self) -> Position {
        self.tokens.last().map_or(Position::new(1, 1), |token| token.position)
    }

    /// Declarations of a namespace-level scope. `open` describes the brace
    /// that must close it; `None` for the global scope.
    fn declarations(&mut self, scope: ScopeId, open: Option<(Position, String)>) -> Result<(), ParseError> {
        loop {
            let Some(token) = self.peek() else {
                return match open {
                    Some((position, what)) => Err(ParseError::new(
                        self.eof_position(),
                        format!("`}}` closing {what} opened at {position}"),
                    )),
                    None => Ok(()),
                };
            };
            match token.text.as_str() {
                "}" => {
                    if open.is_some() {
                        self.pos += 1;
                        return Ok(());
                    }
                    return Err(ParseError::new(token.position, "a declaration, found unmatched `}`"));
                }
                ";" => self.pos += 1,
                "namespace" => self.namespace(scope)?,
                "inline" if self.peek_is(1, "namespace") => self.pos += 1,
                "template" => self.template(scope)?,
                "extern" if self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Literal) && self.peek_is(2, "{") => {
                    let position = token.position;
                    self.pos += 3;
                    self.declarations(scope, Some((position, "`extern` block".to_string())))?;
                }
                text if CLASS_KEYS.contains(&text) && self.class_definition_ahead() => {
                    self.class_definition(scope, Vec::new())?;
                }
                _ => self.skip_declaration()?,
            }
        }
    }

    fn namespace(&mut self, scope: ScopeId) -> Result<(), ParseError> {
        let keyword = self.current();
        self.pos += 1;

        let mut names = Vec::new();
        while let Some(token) = self.peek() {
            if token.kind != TokenKind::Identifier {
                break;
            }
            names.push(token.text.clone());
            self.pos += 1;
            if self.peek_is(0, "::") {
                self.pos += 1;
                // `namespace a::inline b`
                if self.peek_is(0, "inline") {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        self.skip_attributes();

        match self.peek() {
            Some(token) if token.is("=") => self.skip_declaration(),
            Some(token) if token.is("{") => {
                self.pos += 1;
                let inner = if names.is_empty() {
                    trace!("anonymous namespace at {}", keyword.position);
                    self.tree
                        .push(scope, ScopeKind::AnonymousNamespace, String::new(), keyword.position)
                } else {
                    names.iter().fold(scope, |parent, name| {
                        self.tree
                            .push(parent, ScopeKind::Namespace, name.clone(), keyword.position)
                    })
                };
                let what = if names.is_empty() {
                    "anonymous namespace".to_string()
                } else {
                    format!("namespace `{}`", names.join("::"))
                };
                self.declarations(inner, Some((keyword.position, what)))
            }
            Some(token) => Err(ParseError::new(token.position, "`{` after namespace name")),
            None => Err(ParseError::new(self.eof_position(), "`{` after namespace name")),
        }
    }

    fn template(&mut self, scope: ScopeId) -> Result<(), ParseError> {
        self.pos += 1;
        if !self.peek_is(0, "<") {
            // explicit instantiation
            return self.skip_declaration();
        }
        let mut params = self.template_params()?;
        while self.peek_is(0, "template") && self.peek_is(1, "<") {
            self.pos += 1;
            params = self.template_params()?;
        }
        match self.peek() {
            Some(token) if CLASS_KEYS.contains(&token.text.as_str()) && self.class_definition_ahead() => {
                self.class_definition(scope, params).map(|_| ())
            }
            _ => self.skip_declaration(),
        }
    }

    /// Consume `<...>` and return the declared parameter names.
    fn template_params(&mut self) -> Result<Vec<String>, ParseError> {
        let open = self.current().position;
        self.pos += 1;

        let mut groups: Vec<Vec<&Token>> = vec![Vec::new()];
        let mut angle = 0usize;
        let mut paren = 0usize;
        loop {
            let Some(token) = self.peek() else {
                return Err(ParseError::new(
                    self.eof_position(),
                    format!("`>` closing template parameter list opened at {open}"),
                ));
            };
            self.pos += 1;
            match token.text.as_str() {
                "(" => paren += 1,
                ")" => paren = paren.saturating_sub(1),
                "<" if paren == 0 => angle += 1,
                ">" if paren == 0 => {
                    if angle == 0 {
                        break;
                    }
                    angle -= 1;
                }
                "," if paren == 0 && angle == 0 => {
                    groups.push(Vec::new());
                    continue;
                }
                _ => {}
            }
            if let Some(group) = groups.last_mut() {
                group.push(token);
            }
        }

        let params = groups
            .iter()
            .filter(|group| !group.is_empty())
            .enumerate()
            .map(|(index, group)| template_param_name(group).unwrap_or_else(|| format!("T{index}")))
            .collect();
        Ok(params)
    }

    /// Whether the class key at the cursor starts a definition (`{` follows
    /// the head) rather than a forward declaration or an elaborated type.
    fn class_definition_ahead(&self) -> bool {
        let head = &self.tokens[self.pos + 1..];
        let mut angle = 0usize;
        let mut index = 0;
        while let Some(token) = head.get(index) {
            match token.text.as_str() {
                "{" => return true,
                "<" => angle += 1,
                ">" => angle = angle.saturating_sub(1),
                "(" if angle > 0 || (index > 0 && is_head_specifier(&head[index - 1])) => {
                    match closing_paren(head, index) {
                        Some(close) => index = close,
                        None => return false,
                    }
                }
                ";" | "(" | ")" | "=" | "}" => return false,
                _ => {}
            }
            index += 1;
        }
        false
    }

    /// `__declspec(...)`, `alignas(...)` and friends on a class head.
    fn skip_head_specifier(&mut self) -> Result<(), ParseError> {
        self.pos += 1;
        let open = self.current().position;
        self.pos += 1;
        self.skip_balanced_from(open, "(", ")")
    }

    fn class_definition(&mut self, scope: ScopeId, template_params: Vec<String>) -> Result<ScopeId, ParseError> {
        let key_token = self.current();
        let key = ClassKey::from_keyword(&key_token.text).unwrap_or(ClassKey::Class);
        self.pos += 1;
        self.skip_attributes();

        let mut name = String::new();
        let mut name_position = key_token.position;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Identifier if is_head_specifier(token) && self.peek_is(1, "(") => {
                    self.skip_head_specifier()?;
                }
                TokenKind::Identifier if token.is("final") && !name.is_empty() => break,
                TokenKind::Identifier => {
                    name = token.text.clone();
                    name_position = token.position;
                    self.pos += 1;
                }
                _ if token.is("::") => self.pos += 1,
                _ if token.is("<") => self.skip_angles()?,
                _ if token.is("[") && self.peek_is(1, "[") => self.skip_attributes(),
                _ => break,
            }
        }

        let mut is_final = false;
        if self.peek_is(0, "final") {
            is_final = true;
            self.pos += 1;
        }

        let mut bases = Vec::new();
        if self.peek_is(0, ":") {
            self.pos += 1;
            bases = self.base_clause();
        }

        let Some(open) = self.peek().filter(|token| token.is("{")) else {
            let position = self.peek().map_or(self.eof_position(), |token| token.position);
            return Err(ParseError::new(position, "`{` opening class body"));
        };
        self.pos += 1;

        if name.is_empty() {
            // Unnamed classes cannot be mocked; only their extent matters.
            self.skip_balanced_from(open.position, "{", "}")?;
            self.after_class_body();
            return Ok(scope);
        }

        let kind = if !template_params.is_empty() {
            ScopeKind::TemplateClass
        } else if key == ClassKey::Class {
            ScopeKind::Class
        } else {
            ScopeKind::Struct
        };
        let id = self.tree.push(scope, kind, name.clone(), name_position);
        trace!("class `{}` ({:?}) at {}", name, kind, name_position);
        {
            let body = self.tree.class_mut(id);
            body.key = Some(key);
            body.template_params = template_params;
            body.bases = bases;
            body.is_final = is_final;
        }

        self.class_body(id, key, &name, open.position)?;
        self.after_class_body();
        Ok(id)
    }

    fn base_clause(&mut self) -> Vec<String> {
        let mut bases = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut angle = 0usize;
        let mut paren = 0usize;
        while let Some(token) = self.peek() {
            match token.text.as_str() {
                "{" if angle == 0 && paren == 0 => break,
                "<" => angle += 1,
                ">" => angle = angle.saturating_sub(1),
                "(" => paren += 1,
                ")" => paren = paren.saturating_sub(1),
                "," if angle == 0 && paren == 0 => {
                    bases.push(spelling::join(&current));
                    current.clear();
                    self.pos += 1;
                    continue;
                }
                _ => {}
            }
            let modifier = current.is_empty()
                && (ACCESS_KEYWORDS.contains(&token.text.as_str()) || token.is("virtual"));
            if !modifier {
                current.push(token.clone());
            }
            self.pos += 1;
        }
        if !current.is_empty() {
            bases.push(spelling::join(&current));
        }
        bases
    }

    /// Consume the declarators after a class body (`} instance;`).
    fn after_class_body(&mut self) {
        match self.peek() {
            Some(token) if token.is(";") => self.pos += 1,
            Some(token) if token.kind == TokenKind::Identifier || token.is("*") || token.is("&") => {
                while let Some(token) = self.peek() {
                    if token.is("}") {
                        break;
                    }
                    self.pos += 1;
                    if token.is(";") {
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    /// Members of one class body. The ambient access starts from the class
    /// key default and only lives for this body.
    fn class_body(&mut self, id: ScopeId, key: ClassKey, name: &str, open: Position) -> Result<(), ParseError> {
        let mut access = key.default_access();
        loop {
            let Some(token) = self.peek() else {
                return Err(ParseError::new(
                    self.eof_position(),
                    format!("`}}` closing class `{name}` opened at {open}"),
                ));
            };
            match token.text.as_str() {
                "}" => {
                    self.pos += 1;
                    return Ok(());
                }
                ";" => self.pos += 1,
                text if ACCESS_KEYWORDS.contains(&text) && self.peek_is(1, ":") => {
                    access = Access::from_keyword(text).unwrap_or(access);
                    self.pos += 2;
                }
                // `public slots:` and similar
                text if ACCESS_KEYWORDS.contains(&text) && self.peek_is(2, ":") => {
                    access = Access::from_keyword(text).unwrap_or(access);
                    self.pos += 3;
                }
                text if CLASS_KEYS.contains(&text) && self.class_definition_ahead() => {
                    let nested = self.class_definition(id, Vec::new())?;
                    if nested != id {
                        self.tree.class_mut(id).members.push(Member::Class(nested));
                    }
                }
                "template" => {
                    let position = token.position;
                    self.pos += 1;
                    let params = if self.peek_is(0, "<") {
                        self.template_params()?
                    } else {
                        Vec::new()
                    };
                    let class_key = self.peek().map(|t| t.text.as_str()).unwrap_or_default();
                    if CLASS_KEYS.contains(&class_key) && self.class_definition_ahead() {
                        let nested = self.class_definition(id, params)?;
                        if nested != id {
                            self.tree.class_mut(id).members.push(Member::Class(nested));
                        }
                    } else {
                        // member templates cannot be virtual
                        let text = self.collect_declaration()?;
                        self.push_other(id, OtherKind::Function, text, access, position);
                    }
                }
                "enum" => self.enum_fact(id)?,
                "using" | "typedef" => self.alias_fact(id, access)?,
                "friend" | "static_assert" => self.skip_declaration()?,
                _ => self.member(id, name, access)?,
            }
        }
    }

    fn member(&mut self, id: ScopeId, class_name: &str, access: Access) -> Result<(), ParseError> {
        let all = self.tokens;
        let start = self.pos;
        let position = all[start].position;
        let mut paren = 0usize;
        let mut bracket = 0usize;
        let mut inner_brace = 0usize;
        let mut seen_params = false;
        let mut in_init_list = false;

        let (end, has_body) = loop {
            let Some(token) = self.peek() else {
                return Err(ParseError::new(
                    self.eof_position(),
                    format!("`;` ending member declaration started at {position}"),
                ));
            };
            match token.text.as_str() {
                "(" => paren += 1,
                ")" => {
                    if paren == 0 {
                        return Err(ParseError::new(token.position, "balanced parentheses in member declaration"));
                    }
                    paren -= 1;
                    if paren == 0 {
                        seen_params = true;
                    }
                }
                "[" => bracket += 1,
                "]" => bracket = bracket.saturating_sub(1),
                "{" if paren > 0 => inner_brace += 1,
                "}" if paren > 0 && inner_brace > 0 => inner_brace -= 1,
                "}" if paren > 0 => {
                    return Err(ParseError::new(token.position, "`)` closing parameter list"));
                }
                ";" if paren > 0 && inner_brace == 0 => {
                    return Err(ParseError::new(token.position, "`)` closing parameter list"));
                }
                ";" if paren == 0 && bracket == 0 => {
                    let end = self.pos;
                    self.pos += 1;
                    break (end, false);
                }
                ":" if paren == 0 && seen_params && !in_init_list => in_init_list = true,
                "{" if paren == 0 && bracket == 0 => {
                    let previous_is_name = self.pos > start
                        && (all[self.pos - 1].kind == TokenKind::Identifier || all[self.pos - 1].is(">"));
                    if seen_params && !(in_init_list && previous_is_name) {
                        let end = self.pos;
                        self.skip_balanced()?;
                        if self.peek_is(0, ";") {
                            self.pos += 1;
                        }
                        break (end, true);
                    }
                    // brace initializer of a data member or of an init-list entry
                    self.skip_balanced()?;
                    continue;
                }
                "}" => {
                    return Err(ParseError::new(token.position, "`;` ending member declaration"));
                }
                _ => {}
            }
            self.pos += 1;
        };

        let tokens = &all[start..end];
        if seen_params && is_method(tokens, class_name) {
            trace!("method span at {}: {}", position, spelling::join(tokens));
            self.tree.class_mut(id).members.push(Member::Method(RawMethodSpan {
                tokens: tokens.to_vec(),
                access,
                has_body,
                position,
            }));
        } else {
            let kind = if !seen_params {
                OtherKind::Data
            } else if is_constructor(tokens, class_name) {
                OtherKind::Constructor
            } else {
                OtherKind::Function
            };
            self.push_other(id, kind, spelling::join(tokens), access, position);
        }
        Ok(())
    }

    fn push_other(&mut self, id: ScopeId, kind: OtherKind, text: String, access: Access, position: Position) {
        self.tree.class_mut(id).members.push(Member::Other {
            kind,
            text,
            access,
            position,
        });
    }

    fn enum_fact(&mut self, id: ScopeId) -> Result<(), ParseError> {
        let position = self.current().position;
        self.pos += 1;
        if self.peek_is(0, "class") || self.peek_is(0, "struct") {
            self.pos += 1;
        }
        self.skip_attributes();
        let name = self
            .peek()
            .filter(|token| token.kind == TokenKind::Identifier)
            .map(|token| token.text.clone());
        self.skip_declaration()?;
        if let Some(name) = name {
            self.tree.class_mut(id).members.push(Member::TypeFact(TypeFact {
                name,
                kind: TypeFactKind::Enum,
                position,
            }));
        }
        Ok(())
    }

    fn alias_fact(&mut self, id: ScopeId, access: Access) -> Result<(), ParseError> {
        let all = self.tokens;
        let start = self.pos;
        let position = all[start].position;
        self.skip_declaration()?;
        let tokens = &all[start..self.pos];
        match alias_name(tokens) {
            Some(name) => self.tree.class_mut(id).members.push(Member::TypeFact(TypeFact {
                name,
                kind: TypeFactKind::Alias,
                position,
            })),
            None => self.push_other(id, OtherKind::Declaration, spelling::join(tokens), access, position),
        }
        Ok(())
    }

    /// Consume one declaration and return its canonical text.
    fn collect_declaration(&mut self) -> Result<String, ParseError> {
        let all = self.tokens;
        let start = self.pos;
        self.skip_declaration()?;
        Ok(spelling::join(without_semicolon(&all[start..self.pos])))
    }

    /// Skip to the end of a declaration we do not model: the next `;` at
    /// depth zero, or the end of a function body. Stops before a `}` that
    /// closes the enclosing scope.
    fn skip_declaration(&mut self) -> Result<(), ParseError> {
        let mut paren = 0usize;
        let mut seen_params = false;
        while let Some(token) = self.peek() {
            match token.text.as_str() {
                "(" => paren += 1,
                ")" => {
                    paren = paren.saturating_sub(1);
                    if paren == 0 {
                        seen_params = true;
                    }
                }
                ";" if paren == 0 => {
                    self.pos += 1;
                    return Ok(());
                }
                "{" => {
                    self.skip_balanced()?;
                    if seen_params && paren == 0 {
                        return Ok(());
                    }
                    continue;
                }
                "}" if paren == 0 => return Ok(()),
                _ => {}
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Skip a balanced `{ ... }` group starting at the cursor.
    fn skip_balanced(&mut self) -> Result<(), ParseError> {
        let open = self.current().position;
        self.pos += 1;
        self.skip_balanced_from(open, "{", "}")
    }

    /// The opener has been consumed already.
    fn skip_balanced_from(&mut self, open: Position, opener: &str, closer: &str) -> Result<(), ParseError> {
        let mut depth = 1usize;
        while let Some(token) = self.peek() {
            self.pos += 1;
            if token.is(opener) {
                depth += 1;
            } else if token.is(closer) {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(ParseError::new(
            self.eof_position(),
            format!("`{closer}` matching `{opener}` at {open}"),
        ))
    }

    fn skip_angles(&mut self) -> Result<(), ParseError> {
        let open = self.current().position;
        self.pos += 1;
        self.skip_balanced_from(open, "<", ">")
    }

    fn skip_attributes(&mut self) {
        while self.peek_is(0, "[") && self.peek_is(1, "[") {
            let mut depth = 0usize;
            while let Some(token) = self.peek() {
                self.pos += 1;
                if token.is("[") {
                    depth += 1;
                } else if token.is("]") {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
            }
        }
    }
}

/// `virtual` anywhere, a destructor of the enclosing class, or a trailing
/// `= 0`. `override` and `final` also imply a virtual method.
fn is_method(tokens: &[Token], class_name: &str) -> bool {
    let virtual_marker = tokens
        .iter()
        .any(|token| token.is("virtual") || token.is("override") || token.is("final"));
    let destructor = tokens
        .windows(3)
        .any(|w| w[0].is("~") && w[1].is(class_name) && w[2].is("("));
    virtual_marker || destructor || ends_pure(tokens)
}

fn ends_pure(tokens: &[Token]) -> bool {
    matches!(tokens, [.., eq, zero] if eq.is("=") && zero.is("0"))
}

fn is_head_specifier(token: &Token) -> bool {
    HEAD_SPECIFIERS.contains(&token.text.as_str())
}

/// Index of the `)` matching the `(` at `open`.
fn closing_paren(tokens: &[Token], open: usize) -> Option<usize> {
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

fn is_constructor(tokens: &[Token], class_name: &str) -> bool {
    tokens
        .windows(2)
        .any(|w| w[0].is(class_name) && w[1].is("("))
}

fn template_param_name(group: &[&Token]) -> Option<String> {
    let end = group
        .iter()
        .position(|token| token.is("="))
        .unwrap_or(group.len());
    let declared = &group[..end];
    if declared.len() < 2 {
        return None;
    }
    declared
        .last()
        .filter(|token| token.kind == TokenKind::Identifier && !token.is("typename") && !token.is("class"))
        .map(|token| token.text.clone())
}

fn without_semicolon(tokens: &[Token]) -> &[Token] {
    match tokens.split_last() {
        Some((last, rest)) if last.is(";") => rest,
        _ => tokens,
    }
}

/// `using X = ...;` or `typedef ... X;` (including `typedef R (*X)(...)`).
fn alias_name(tokens: &[Token]) -> Option<String> {
    let first = tokens.first()?;
    if first.is("using") {
        return match tokens {
            [_, name, eq, ..] if name.kind == TokenKind::Identifier && eq.is("=") => Some(name.text.clone()),
            _ => None,
        };
    }
    let body = without_semicolon(tokens);
    if let Some(w) = body.windows(3).find(|w| w[0].is("(") && w[1].is("*")) {
        if w[2].kind == TokenKind::Identifier {
            return Some(w[2].text.clone());
        }
    }
    body.iter()
        .rev()
        .find(|token| token.kind == TokenKind::Identifier)
        .map(|token| token.text.clone())
}
