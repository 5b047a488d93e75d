//! `#if` Expression Evaluation
//!
//! Evaluates fully expanded controlling expressions. `defined` and
//! `__has_include` must already be resolved and remaining identifiers
//! replaced; see [`Preprocessor`](super::Preprocessor).

use thiserror::Error;

use super::lexer::{Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("{0}")]
    Invalid(String),

    #[error("division by zero in preprocessor expression")]
    DivisionByZero,
}

type ExprResult = Result<i64, ExprError>;

/// Evaluate a controlling expression
pub fn evaluate(tokens: &[Token]) -> ExprResult {
    if tokens.is_empty() {
        return Err(ExprError::Invalid("expected value in expression".into()));
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let value = parser.conditional(true)?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::Invalid(format!(
            "token is not a valid binary operator in a preprocessor subexpression: '{}'",
            extra.text
        )));
    }
    Ok(value)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

fn precedence(op: &str) -> Option<u8> {
    Some(match op {
        "*" | "/" | "%" => 10,
        "+" | "-" => 9,
        "<<" | ">>" => 8,
        "<" | "<=" | ">" | ">=" => 7,
        "==" | "!=" => 6,
        "&" => 5,
        "^" => 4,
        "|" => 3,
        "&&" => 2,
        "||" => 1,
        _ => return None,
    })
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExprError> {
        match self.next() {
            Some(t) if t.is_punct(punct) => Ok(()),
            _ => Err(ExprError::Invalid(format!("expected '{}' in expression", punct))),
        }
    }

    /// `live` is false inside a branch whose value is discarded, where
    /// division by zero is not an error
    fn conditional(&mut self, live: bool) -> ExprResult {
        let cond = self.binary(1, live)?;
        if !self.peek().is_some_and(|t| t.is_punct("?")) {
            return Ok(cond);
        }
        self.pos += 1;
        let then = self.conditional(live && cond != 0)?;
        self.expect(":")?;
        let otherwise = self.conditional(live && cond == 0)?;
        Ok(if cond != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min_prec: u8, live: bool) -> ExprResult {
        let mut lhs = self.unary(live)?;

        loop {
            let Some(token) = self.peek() else { break };
            if token.kind != TokenKind::Punct {
                break;
            }
            let op = token.text.as_str();
            let Some(prec) = precedence(op) else { break };
            if prec < min_prec {
                break;
            }
            self.pos += 1;

            let rhs_live = match op {
                "&&" => live && lhs != 0,
                "||" => live && lhs == 0,
                _ => live,
            };
            let rhs = self.binary(prec + 1, rhs_live)?;
            lhs = apply(op, lhs, rhs, rhs_live)?;
        }

        Ok(lhs)
    }

    fn unary(&mut self, live: bool) -> ExprResult {
        let Some(token) = self.peek() else {
            return Err(ExprError::Invalid("expected value in expression".into()));
        };
        if token.kind == TokenKind::Punct {
            let op = token.text.as_str();
            if matches!(op, "!" | "~" | "-" | "+") {
                self.pos += 1;
                let value = self.unary(live)?;
                return Ok(match op {
                    "!" => (value == 0) as i64,
                    "~" => !value,
                    "-" => value.wrapping_neg(),
                    _ => value,
                });
            }
        }
        self.primary(live)
    }

    fn primary(&mut self, live: bool) -> ExprResult {
        let Some(token) = self.next() else {
            return Err(ExprError::Invalid("expected value in expression".into()));
        };
        match token.kind {
            TokenKind::Punct if token.text == "(" => {
                let value = self.conditional(live)?;
                self.expect(")")?;
                Ok(value)
            }
            TokenKind::Number => parse_integer(&token.text),
            TokenKind::Literal => parse_char_literal(&token.text),
            // Identifiers left after expansion evaluate to zero
            TokenKind::Ident => Ok(match token.text.as_str() {
                "true" => 1,
                _ => 0,
            }),
            _ => Err(ExprError::Invalid(format!(
                "invalid token at start of a preprocessor expression: '{}'",
                token.text
            ))),
        }
    }
}

fn apply(op: &str, lhs: i64, rhs: i64, live: bool) -> ExprResult {
    Ok(match op {
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => {
            if live {
                return Err(ExprError::DivisionByZero);
            }
            0
        }
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "<<" => lhs.wrapping_shl(rhs as u32 & 63),
        ">>" => lhs.wrapping_shr(rhs as u32 & 63),
        "<" => (lhs < rhs) as i64,
        "<=" => (lhs <= rhs) as i64,
        ">" => (lhs > rhs) as i64,
        ">=" => (lhs >= rhs) as i64,
        "==" => (lhs == rhs) as i64,
        "!=" => (lhs != rhs) as i64,
        "&" => lhs & rhs,
        "^" => lhs ^ rhs,
        "|" => lhs | rhs,
        "&&" => (lhs != 0 && rhs != 0) as i64,
        "||" => (lhs != 0 || rhs != 0) as i64,
        _ => return Err(ExprError::Invalid(format!("unsupported operator '{}'", op))),
    })
}

/// Parse an integer literal with optional `u`/`l` suffixes
pub fn parse_integer(text: &str) -> ExprResult {
    let digits: String = text
        .trim_end_matches(['u', 'U', 'l', 'L'])
        .chars()
        .filter(|&c| c != '\'')
        .collect();

    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits.as_str())
    };

    u64::from_str_radix(body, radix)
        .map(|v| v as i64)
        .map_err(|_| ExprError::Invalid(format!("invalid integer constant '{}' in expression", text)))
}

/// Value of a character literal such as `'a'` or `L'\n'`
pub fn parse_char_literal(text: &str) -> ExprResult {
    let invalid = || ExprError::Invalid(format!("invalid token in expression: {}", text));

    let start = text.find('\'').ok_or_else(invalid)?;
    let inner = text[start + 1..].strip_suffix('\'').ok_or_else(invalid)?;
    let mut chars = inner.chars();

    let value = match chars.next().ok_or_else(invalid)? {
        '\\' => match chars.next().ok_or_else(invalid)? {
            'n' => 10,
            't' => 9,
            'r' => 13,
            'a' => 7,
            'b' => 8,
            'f' => 12,
            'v' => 11,
            'x' => {
                let hex: String = chars.by_ref().take_while(|c| c.is_ascii_hexdigit()).collect();
                i64::from_str_radix(&hex, 16).map_err(|_| invalid())?
            }
            d @ '0'..='7' => {
                let mut octal = d.to_string();
                octal.extend(chars.by_ref().take(2).take_while(|c| ('0'..='7').contains(c)));
                i64::from_str_radix(&octal, 8).map_err(|_| invalid())?
            }
            other => other as i64,
        },
        c => c as i64,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::lexer::tokenize;

    fn eval(text: &str) -> ExprResult {
        evaluate(&tokenize(text))
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Ok(7));
        assert_eq!(eval("(1 + 2) * 3"), Ok(9));
        assert_eq!(eval("1 << 4 | 1"), Ok(17));
        assert_eq!(eval("-3 + ~0"), Ok(-4));
        assert_eq!(eval("10 / 3 % 2"), Ok(1));
    }

    #[test]
    fn test_logic_and_ternary() {
        assert_eq!(eval("1 && 0 || 2 > 1"), Ok(1));
        assert_eq!(eval("!0 ? 5 : 6"), Ok(5));
        assert_eq!(eval("0 ? 5 : 0 ? 6 : 7"), Ok(7));
        assert_eq!(eval("1 == 1 && 2 != 3"), Ok(1));
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("0x1F"), Ok(31));
        assert_eq!(eval("010"), Ok(8));
        assert_eq!(eval("0b101"), Ok(5));
        assert_eq!(eval("201112L"), Ok(201112));
        assert_eq!(eval("100UL"), Ok(100));
        assert_eq!(eval("'A'"), Ok(65));
        assert_eq!(eval(r"'\n'"), Ok(10));
        assert_eq!(eval(r"'\x41'"), Ok(65));
        assert_eq!(eval("true"), Ok(1));
        assert_eq!(eval("UNKNOWN_NAME"), Ok(0));
    }

    #[test]
    fn test_division_by_zero_only_when_evaluated() {
        assert_eq!(eval("1 / 0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval("0 && 1 / 0"), Ok(0));
        assert_eq!(eval("1 || 1 % 0"), Ok(1));
        assert_eq!(eval("1 ? 2 : 1 / 0"), Ok(2));
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(matches!(eval(""), Err(ExprError::Invalid(_))));
        assert!(matches!(eval("1 +"), Err(ExprError::Invalid(_))));
        assert!(matches!(eval("(1"), Err(ExprError::Invalid(_))));
        assert!(matches!(eval("1 2"), Err(ExprError::Invalid(_))));
        assert!(matches!(eval("\"str\""), Err(ExprError::Invalid(_))));
        assert!(matches!(eval("09"), Err(ExprError::Invalid(_))));
    }
}
