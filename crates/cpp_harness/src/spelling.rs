use crate::lexer::{Token, TokenKind};

/// Join tokens into canonical text: one space between adjacent words and
/// after commas, nothing elsewhere. Independent of the source whitespace.
pub fn join<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(prev) = prev {
            if needs_space(prev, token) {
                out.push(' ');
            }
        }
        out.push_str(&token.text);
        prev = Some(token);
    }
    out
}

fn needs_space(prev: &Token, next: &Token) -> bool {
    let word = |t: &Token| matches!(t.kind, TokenKind::Identifier | TokenKind::Qualifier | TokenKind::Literal);
    (word(prev) && word(next)) || prev.is(",")
}
