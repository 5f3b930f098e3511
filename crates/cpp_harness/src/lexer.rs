use crate::preprocessor::{ConditionalStack, DirectiveEffect};
use protocol::{LexError, Position};
use rustc_hash::FxHashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    /// `const`, `volatile`, `inline` or `virtual`.
    Qualifier,
    Literal,
    Punct,
    /// An opaque preprocessor line that is not a conditional.
    Directive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
    /// Byte offset of the first character.
    pub offset: usize,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::Qualifier)
    }

    pub fn is_punct(&self) -> bool {
        self.kind == TokenKind::Punct
    }

    /// Byte offset one past the last character.
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

const QUALIFIERS: &[&str] = &["const", "volatile", "inline", "virtual"];
const MULTI_PUNCT: &[&str] = &["->*", "...", "->", "::", "&&"];
const STRING_PREFIXES: &[&str] = &["L", "u", "U", "u8", "R", "LR", "uR", "UR", "u8R"];

/// Tokenize `source` with `symbols` as the initially defined macro names.
pub fn tokenize(source: &str, symbols: &FxHashSet<String>) -> Result<Vec<Token>, LexError> {
    Lexer::new(source, symbols).run()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    at_line_start: bool,
    conditionals: ConditionalStack,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, symbols: &FxHashSet<String>) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            at_line_start: true,
            conditionals: ConditionalStack::new(symbols),
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.peek(0) {
            match c {
                b'\n' => self.bump(),
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.bump(),
                b'#' if self.at_line_start => self.directive()?,
                _ if !self.conditionals.is_active() => self.skip_inactive_line()?,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment()?,
                b'"' => self.quoted(b'"')?,
                b'\'' => self.quoted(b'\'')?,
                b'0'..=b'9' => self.number(),
                b'.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.number(),
                c if is_ident_start(c) => self.identifier()?,
                _ => self.punct(),
            }
        }
        self.conditionals.finish()?;
        Ok(self.tokens)
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
                self.at_line_start = true;
            } else if c & 0xC0 != 0x80 {
                // Count characters, not UTF-8 continuation bytes.
                self.column += 1;
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize, position: Position) {
        self.tokens.push(Token {
            kind,
            text: self.src[start..self.pos].to_string(),
            position,
            offset: start,
        });
        self.at_line_start = false;
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == b'\n' {
                break;
            }
            self.bump();
        }
    }

    /// Block comments still open and close inside inactive regions, so a
    /// directive written in one is not taken for a real one.
    fn skip_inactive_line(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek(0) {
            match c {
                b'\n' => break,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment()?,
                _ => {
                    self.at_line_start = false;
                    self.bump();
                }
            }
        }
        Ok(())
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let position = self.position();
        let line_start = self.at_line_start;
        self.bump();
        self.bump();
        loop {
            match self.peek(0) {
                None => return Err(LexError::UnterminatedComment { position }),
                Some(b'*') if self.peek(1) == Some(b'/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some(_) => self.bump(),
            }
        }
        // A comment before `#` does not stop it from being a directive.
        self.at_line_start = line_start;
        Ok(())
    }

    fn quoted(&mut self, quote: u8) -> Result<(), LexError> {
        let start = self.pos;
        let position = self.position();
        self.bump();
        loop {
            match self.peek(0) {
                None | Some(b'\n') => {
                    return Err(if quote == b'"' {
                        LexError::UnterminatedString { position }
                    } else {
                        LexError::UnterminatedChar { position }
                    });
                }
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some(_) => self.bump(),
            }
        }
        self.push(TokenKind::Literal, start, position);
        Ok(())
    }

    fn raw_string(&mut self, start: usize, position: Position) -> Result<(), LexError> {
        // At the opening quote of R"delim( ... )delim".
        self.bump();
        let delim_start = self.pos;
        while let Some(c) = self.peek(0) {
            if c == b'(' || c == b'\n' {
                break;
            }
            self.bump();
        }
        if self.peek(0) != Some(b'(') {
            return Err(LexError::UnterminatedString { position });
        }
        let closing = format!("){}\"", &self.src[delim_start..self.pos]);
        match self.src[self.pos..].find(&closing) {
            Some(rel) => {
                let end = self.pos + rel + closing.len();
                while self.pos < end {
                    self.bump();
                }
                self.push(TokenKind::Literal, start, position);
                Ok(())
            }
            None => Err(LexError::UnterminatedString { position }),
        }
    }

    fn number(&mut self) {
        let start = self.pos;
        let position = self.position();
        while let Some(c) = self.peek(0) {
            let exponent = matches!(c, b'e' | b'E' | b'p' | b'P')
                && matches!(self.peek(1), Some(b'+') | Some(b'-'));
            if exponent {
                self.bump();
                self.bump();
            } else if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || c == b'\'' {
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Literal, start, position);
    }

    fn identifier(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let position = self.position();
        while self.peek(0).is_some_and(is_ident_continue) {
            self.bump();
        }
        let word = &self.src[start..self.pos];

        if STRING_PREFIXES.contains(&word) {
            match self.peek(0) {
                Some(b'"') if word.ends_with('R') => return self.raw_string(start, position),
                Some(quote @ (b'"' | b'\'')) => {
                    self.quoted(quote)?;
                    // Fold the prefix into the literal that was just pushed.
                    if let Some(literal) = self.tokens.last_mut() {
                        literal.text = self.src[start..self.pos].to_string();
                        literal.offset = start;
                        literal.position = position;
                    }
                    return Ok(());
                }
                _ => {}
            }
        }

        let kind = if QUALIFIERS.contains(&word) {
            TokenKind::Qualifier
        } else {
            TokenKind::Identifier
        };
        self.push(kind, start, position);
        Ok(())
    }

    fn punct(&mut self) {
        let start = self.pos;
        let position = self.position();
        let rest = &self.src[start..];
        let len = MULTI_PUNCT
            .iter()
            .find(|p| rest.starts_with(**p))
            .map_or_else(|| rest.chars().next().map_or(1, char::len_utf8), |p| p.len());
        for _ in 0..len {
            self.bump();
        }
        self.push(TokenKind::Punct, start, position);
    }

    fn directive(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        let position = self.position();
        let mut body = String::new();
        self.bump();

        while let Some(c) = self.peek(0) {
            match c {
                b'\n' => break,
                b'\\' if self.peek(1) == Some(b'\n') => {
                    self.bump();
                    self.bump();
                    body.push(' ');
                }
                b'\\' if self.peek(1) == Some(b'\r') && self.peek(2) == Some(b'\n') => {
                    self.bump();
                    self.bump();
                    self.bump();
                    body.push(' ');
                }
                b'/' if self.peek(1) == Some(b'/') => self.skip_line(),
                b'/' if self.peek(1) == Some(b'*') => {
                    self.block_comment()?;
                    body.push(' ');
                }
                _ => {
                    let char_start = self.pos;
                    self.bump();
                    while self.peek(0).is_some_and(|b| b & 0xC0 == 0x80) {
                        self.bump();
                    }
                    body.push_str(&self.src[char_start..self.pos]);
                }
            }
        }

        let was_active = self.conditionals.is_active();
        let effect = self.conditionals.apply(&body, position)?;
        if effect == DirectiveEffect::Passthrough && was_active {
            self.tokens.push(Token {
                kind: TokenKind::Directive,
                text: format!("#{}", body.trim()),
                position,
                offset: start,
            });
        }
        self.at_line_start = false;
        Ok(())
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}
