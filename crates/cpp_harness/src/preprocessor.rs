//! Conditional inclusion for `#if`-family directives.
//!
//! Only symbol presence is evaluated. `#if` expressions other than `0`, `1`
//! and `[!]defined(NAME)` count as true.

use protocol::{LexError, Position};
use rustc_hash::FxHashSet;
use tracing::debug;

/// What the lexer should do with a directive after it has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveEffect {
    /// Consumed by the conditional stack.
    Conditional,
    /// Not a conditional; emit it as an opaque token when active.
    Passthrough,
}

#[derive(Debug, Clone)]
struct Frame {
    parent_active: bool,
    branch_taken: bool,
    active: bool,
    opened_at: Position,
}

#[derive(Debug, Clone)]
pub struct ConditionalStack {
    frames: Vec<Frame>,
    defines: FxHashSet<String>,
}

impl ConditionalStack {
    pub fn new(symbols: &FxHashSet<String>) -> Self {
        Self {
            frames: Vec::new(),
            defines: symbols.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.frames.last().map_or(true, |frame| frame.active)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defines.contains(name)
    }

    /// Apply one directive. `body` is the text after `#`, comments removed.
    pub fn apply(&mut self, body: &str, position: Position) -> Result<DirectiveEffect, LexError> {
        let body = body.trim();
        let (name, rest) = match body.find(|c: char| c.is_whitespace() || c == '(' || c == '!') {
            Some(idx) => (&body[..idx], body[idx..].trim()),
            None => (body, ""),
        };

        match name {
            "ifdef" => {
                let cond = self.is_defined(first_word(rest));
                self.open(cond, position);
            }
            "ifndef" => {
                let cond = !self.is_defined(first_word(rest));
                self.open(cond, position);
            }
            "if" => {
                let cond = self.evaluate(rest);
                self.open(cond, position);
            }
            "elif" => {
                let cond = self.evaluate(rest);
                let frame = self.top_mut("elif", position)?;
                frame.active = frame.parent_active && !frame.branch_taken && cond;
                frame.branch_taken |= cond;
            }
            "else" => {
                let frame = self.top_mut("else", position)?;
                frame.active = frame.parent_active && !frame.branch_taken;
                frame.branch_taken = true;
            }
            "endif" => {
                if self.frames.pop().is_none() {
                    return Err(LexError::UnbalancedConditional {
                        position,
                        directive: "endif".to_string(),
                    });
                }
            }
            "define" => {
                if self.is_active() {
                    let symbol = first_word(rest);
                    if !symbol.is_empty() {
                        debug!("#define {}", symbol);
                        self.defines.insert(symbol.to_string());
                    }
                }
                return Ok(DirectiveEffect::Passthrough);
            }
            "undef" => {
                if self.is_active() {
                    self.defines.remove(first_word(rest));
                }
                return Ok(DirectiveEffect::Passthrough);
            }
            _ => return Ok(DirectiveEffect::Passthrough),
        }

        Ok(DirectiveEffect::Conditional)
    }

    /// Fails when a conditional is still open at end of input.
    pub fn finish(&self) -> Result<(), LexError> {
        match self.frames.last() {
            Some(frame) => Err(LexError::UnterminatedConditional {
                position: frame.opened_at,
            }),
            None => Ok(()),
        }
    }

    fn open(&mut self, cond: bool, position: Position) {
        let parent_active = self.is_active();
        self.frames.push(Frame {
            parent_active,
            branch_taken: cond,
            active: parent_active && cond,
            opened_at: position,
        });
    }

    fn top_mut(&mut self, directive: &str, position: Position) -> Result<&mut Frame, LexError> {
        self.frames
            .last_mut()
            .ok_or_else(|| LexError::UnbalancedConditional {
                position,
                directive: directive.to_string(),
            })
    }

    fn evaluate(&self, expr: &str) -> bool {
        let expr = expr.trim();
        if let Some(negated) = expr.strip_prefix('!') {
            return !self.evaluate(negated);
        }
        if let Some(inner) = strip_parens(expr) {
            return self.evaluate(inner);
        }
        if let Some(operand) = expr.strip_prefix("defined") {
            let operand = operand.trim();
            let operand = strip_parens(operand).unwrap_or(operand);
            return self.is_defined(first_word(operand));
        }
        !matches!(expr, "0" | "false")
    }
}

fn first_word(text: &str) -> &str {
    let text = text.trim();
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    &text[..end]
}

fn strip_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stack(symbols: &[&str]) -> ConditionalStack {
        let set: FxHashSet<String> = symbols.iter().map(|s| s.to_string()).collect();
        ConditionalStack::new(&set)
    }

    #[test]
    fn test_ifdef_else_inverts() {
        let mut cond = stack(&["CLASS_I5"]);
        let pos = Position::new(1, 1);
        assert_eq!(cond.apply("ifdef CLASS_I5", pos).unwrap(), DirectiveEffect::Conditional);
        assert!(cond.is_active());
        cond.apply("else", pos).unwrap();
        assert!(!cond.is_active());
        cond.apply("endif", pos).unwrap();
        assert!(cond.is_active());
        assert!(cond.finish().is_ok());
    }

    #[test]
    fn test_nested_inactive_parent_wins() {
        let mut cond = stack(&["INNER"]);
        let pos = Position::new(1, 1);
        cond.apply("ifdef OUTER", pos).unwrap();
        cond.apply("ifdef INNER", pos).unwrap();
        assert!(!cond.is_active());
        cond.apply("else", pos).unwrap();
        assert!(!cond.is_active());
        cond.apply("endif", pos).unwrap();
        cond.apply("endif", pos).unwrap();
        assert!(cond.is_active());
    }

    #[test]
    fn test_if_expressions() {
        let mut cond = stack(&["A"]);
        let pos = Position::new(1, 1);
        cond.apply("if 0", pos).unwrap();
        assert!(!cond.is_active());
        cond.apply("elif defined(A)", pos).unwrap();
        assert!(cond.is_active());
        cond.apply("else", pos).unwrap();
        assert!(!cond.is_active());
        cond.apply("endif", pos).unwrap();

        cond.apply("if !defined(A)", pos).unwrap();
        assert!(!cond.is_active());
        cond.apply("endif", pos).unwrap();
    }

    #[test]
    fn test_define_in_active_region_only() {
        let mut cond = stack(&[]);
        let pos = Position::new(1, 1);
        cond.apply("ifndef GUARD_HPP", pos).unwrap();
        assert_eq!(cond.apply("define GUARD_HPP", pos).unwrap(), DirectiveEffect::Passthrough);
        cond.apply("endif", pos).unwrap();
        assert!(cond.is_defined("GUARD_HPP"));

        cond.apply("if 0", pos).unwrap();
        cond.apply("define HIDDEN", pos).unwrap();
        cond.apply("endif", pos).unwrap();
        assert!(!cond.is_defined("HIDDEN"));
    }

    #[test]
    fn test_unbalanced_directives() {
        let mut cond = stack(&[]);
        let err = cond.apply("endif", Position::new(7, 1)).unwrap_err();
        assert_eq!(
            err,
            LexError::UnbalancedConditional {
                position: Position::new(7, 1),
                directive: "endif".to_string()
            }
        );

        cond.apply("ifdef X", Position::new(9, 1)).unwrap();
        assert_eq!(
            cond.finish().unwrap_err(),
            LexError::UnterminatedConditional {
                position: Position::new(9, 1)
            }
        );
    }
}
