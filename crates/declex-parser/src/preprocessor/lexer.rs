//! Preprocessing tokens
//!
//! A small line tokenizer shared by macro expansion and `#if` evaluation.
//! Tokens remember whether whitespace preceded them so that expanded text
//! can be re-spelled faithfully.

/// Token classes relevant to preprocessing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// String or character literal, including any encoding prefix
    Literal,
    Punct,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub space_before: bool,
    /// Set on identifiers that must not be expanded again
    pub no_expand: bool,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, space_before: bool) -> Self {
        Self {
            kind,
            text: text.into(),
            space_before,
            no_expand: false,
        }
    }

    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }

    pub fn is_ident(&self, text: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == text
    }
}

const PUNCT3: &[&str] = &["...", "<<=", ">>=", "->*"];
const PUNCT2: &[&str] = &[
    "##", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "::", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", ".*",
];
const STRING_PREFIXES: &[&str] = &["L", "u", "U", "u8", "R", "LR", "uR", "UR", "u8R"];

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Split one logical line into tokens
pub fn tokenize(line: &str) -> Vec<Token> {
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut space = false;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            space = true;
            i += 1;
            continue;
        }

        let start = i;
        let kind = if is_ident_start(c) {
            while i < len && is_ident_continue(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if i < len && (chars[i] == '"' || chars[i] == '\'') && STRING_PREFIXES.contains(&word.as_str()) {
                if word.ends_with('R') && chars[i] == '"' {
                    i = skip_raw_string(&chars, i);
                } else {
                    i = skip_quoted(&chars, i);
                }
                TokenKind::Literal
            } else {
                TokenKind::Ident
            }
        } else if c.is_ascii_digit() || (c == '.' && i + 1 < len && chars[i + 1].is_ascii_digit()) {
            i += 1;
            while i < len {
                let d = chars[i];
                if (d == '+' || d == '-') && matches!(chars[i - 1], 'e' | 'E' | 'p' | 'P') {
                    i += 1;
                } else if d.is_ascii_alphanumeric() || d == '.' || d == '_' {
                    i += 1;
                } else if d == '\'' && i + 1 < len && chars[i + 1].is_ascii_alphanumeric() {
                    // digit separator
                    i += 1;
                } else {
                    break;
                }
            }
            TokenKind::Number
        } else if c == '"' || c == '\'' {
            i = skip_quoted(&chars, i);
            TokenKind::Literal
        } else if c.is_ascii_punctuation() {
            let rest: String = chars[i..len.min(i + 3)].iter().collect();
            let width = if PUNCT3.iter().any(|p| rest.starts_with(p)) {
                3
            } else if PUNCT2.iter().any(|p| rest.starts_with(p)) {
                2
            } else {
                1
            };
            i += width;
            TokenKind::Punct
        } else {
            i += 1;
            TokenKind::Other
        };

        let text: String = chars[start..i].iter().collect();
        tokens.push(Token::new(kind, text, space));
        space = false;
    }

    tokens
}

/// Index just past a quoted literal starting at `start`; unterminated
/// literals run to the end of the line.
fn skip_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn skip_raw_string(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    let mut delimiter = String::new();
    while i < chars.len() && chars[i] != '(' {
        delimiter.push(chars[i]);
        i += 1;
    }
    let terminator: Vec<char> = format!("){}\"", delimiter).chars().collect();
    while i < chars.len() {
        if chars[i..].starts_with(&terminator) {
            return i + terminator.len();
        }
        i += 1;
    }
    chars.len()
}

/// Spell tokens back into text
pub fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.space_before {
            out.push(' ');
        }
        out.push_str(&token.text);
    }
    out
}

/// The `#` operator: spell tokens as a string literal
pub fn stringify(tokens: &[Token]) -> String {
    let mut out = String::from("\"");
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.space_before {
            out.push(' ');
        }
        if token.kind == TokenKind::Literal {
            for c in token.text.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
        } else {
            out.push_str(&token.text);
        }
    }
    out.push('"');
    out
}
