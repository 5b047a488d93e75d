//! Macro Table and Expansion
//!
//! Object-like and function-like macros with the `#` and `##` operators,
//! variadic parameters and the usual rescan rule: a macro is not expanded
//! again inside its own replacement.

use std::collections::HashMap;
use thiserror::Error;

use super::lexer::{stringify, tokenize, Token, TokenKind};

/// A `#define`d macro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    pub name: String,
    /// `None` for object-like macros
    pub params: Option<Vec<String>>,
    pub variadic: bool,
    pub body: Vec<Token>,
}

impl MacroDef {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Whether two definitions are identical, as required for a silent
    /// redefinition
    pub fn same_definition(&self, other: &MacroDef) -> bool {
        self.params == other.params
            && self.variadic == other.variadic
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(&other.body)
                .enumerate()
                .all(|(i, (a, b))| a.text == b.text && (i == 0 || a.space_before == b.space_before))
    }

    fn param_index(&self, token: &Token) -> Option<usize> {
        if token.kind != TokenKind::Ident {
            return None;
        }
        let params = self.params.as_ref()?;
        if self.variadic && token.text == "__VA_ARGS__" {
            return Some(params.len());
        }
        params.iter().position(|p| *p == token.text)
    }
}

/// Why a `#define` could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefineError {
    #[error("macro name missing")]
    MissingName,

    #[error("{0}")]
    BadParameters(String),
}

/// Parse the text after `#define`
pub fn parse_define(text: &str) -> Result<MacroDef, DefineError> {
    let tokens = tokenize(text);
    let name = match tokens.first() {
        Some(t) if t.kind == TokenKind::Ident => t.text.clone(),
        _ => return Err(DefineError::MissingName),
    };

    let mut pos = 1;
    let mut params = None;
    let mut variadic = false;

    // A function-like macro has its '(' directly after the name
    if tokens.get(1).is_some_and(|t| t.is_punct("(") && !t.space_before) {
        pos = 2;
        let mut list = Vec::new();
        loop {
            let Some(token) = tokens.get(pos) else {
                return Err(DefineError::BadParameters(
                    "missing ')' in macro parameter list".into(),
                ));
            };
            pos += 1;
            if token.is_punct(")") && list.is_empty() && !variadic {
                break;
            }
            if token.is_punct("...") {
                variadic = true;
            } else if token.kind == TokenKind::Ident && token.text != "__VA_ARGS__" {
                if list.contains(&token.text) {
                    return Err(DefineError::BadParameters(format!(
                        "duplicate macro parameter name '{}'",
                        token.text
                    )));
                }
                list.push(token.text.clone());
            } else {
                return Err(DefineError::BadParameters(
                    "invalid token in macro parameter list".into(),
                ));
            }

            match tokens.get(pos) {
                Some(t) if t.is_punct(")") => {
                    pos += 1;
                    break;
                }
                Some(t) if t.is_punct(",") && !variadic => pos += 1,
                _ => {
                    return Err(DefineError::BadParameters(
                        "expected comma in macro parameter list".into(),
                    ))
                }
            }
        }
        params = Some(list);
    }

    let mut body: Vec<Token> = tokens[pos.min(tokens.len())..].to_vec();
    if let Some(first) = body.first_mut() {
        first.space_before = false;
    }

    if let (Some(first), Some(last)) = (body.first(), body.last()) {
        if first.is_punct("##") || (body.len() > 1 && last.is_punct("##")) {
            return Err(DefineError::BadParameters(
                "'##' cannot appear at either end of a macro expansion".into(),
            ));
        }
    }

    Ok(MacroDef {
        name,
        params,
        variadic,
        body,
    })
}

/// Where expansion happens, for `__FILE__` and `__LINE__`
#[derive(Debug, Clone, Copy)]
pub struct ExpansionContext<'a> {
    pub file: &'a str,
    pub line: u32,
}

/// Problems found while expanding a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionIssue {
    UnterminatedCall(String),
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
}

impl std::fmt::Display for ExpansionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpansionIssue::UnterminatedCall(name) => {
                write!(f, "unterminated function-like macro invocation '{}'", name)
            }
            ExpansionIssue::ArgumentCount {
                name,
                expected,
                got,
            } if got > expected => write!(
                f,
                "too many arguments provided to function-like macro invocation '{}'",
                name
            ),
            ExpansionIssue::ArgumentCount { name, .. } => write!(
                f,
                "too few arguments provided to function-like macro invocation '{}'",
                name
            ),
        }
    }
}

/// The set of currently defined macros
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a macro, returning the definition it replaced
    pub fn define(&mut self, def: MacroDef) -> Option<MacroDef> {
        self.macros.insert(def.name.clone(), def)
    }

    pub fn undefine(&mut self, name: &str) -> Option<MacroDef> {
        self.macros.remove(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name) || matches!(name, "__FILE__" | "__LINE__")
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Fully macro-expand a token sequence
    pub fn expand(
        &self,
        tokens: &[Token],
        ctx: ExpansionContext<'_>,
        issues: &mut Vec<ExpansionIssue>,
    ) -> Vec<Token> {
        let mut disabled = Vec::new();
        self.expand_tokens(tokens, &mut disabled, ctx, issues)
    }

    fn expand_tokens(
        &self,
        tokens: &[Token],
        disabled: &mut Vec<String>,
        ctx: ExpansionContext<'_>,
        issues: &mut Vec<ExpansionIssue>,
    ) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            if token.kind != TokenKind::Ident || token.no_expand {
                out.push(token.clone());
                i += 1;
                continue;
            }

            match token.text.as_str() {
                "__LINE__" => {
                    out.push(Token::new(TokenKind::Number, ctx.line.to_string(), token.space_before));
                    i += 1;
                    continue;
                }
                "__FILE__" => {
                    let literal = stringify(&[Token::new(TokenKind::Literal, ctx.file, false)]);
                    out.push(Token::new(TokenKind::Literal, literal, token.space_before));
                    i += 1;
                    continue;
                }
                _ => {}
            }

            let Some(def) = self.macros.get(&token.text) else {
                out.push(token.clone());
                i += 1;
                continue;
            };

            if disabled.contains(&def.name) {
                let mut painted = token.clone();
                painted.no_expand = true;
                out.push(painted);
                i += 1;
                continue;
            }

            let replacement = if def.is_function_like() {
                if !tokens.get(i + 1).is_some_and(|t| t.is_punct("(")) {
                    out.push(token.clone());
                    i += 1;
                    continue;
                }
                let Some((args, close)) = collect_arguments(tokens, i + 1) else {
                    issues.push(ExpansionIssue::UnterminatedCall(def.name.clone()));
                    out.extend(tokens[i..].iter().cloned());
                    break;
                };
                let Some(args) = bind_arguments(def, args, issues) else {
                    out.extend(tokens[i..=close].iter().cloned());
                    i = close + 1;
                    continue;
                };
                i = close + 1;
                self.substitute(def, &args, disabled, ctx, issues)
            } else {
                i += 1;
                self.substitute(def, &[], disabled, ctx, issues)
            };

            disabled.push(def.name.clone());
            let mut expanded = self.expand_tokens(&replacement, disabled, ctx, issues);
            disabled.pop();

            if let Some(first) = expanded.first_mut() {
                first.space_before = token.space_before;
            }
            out.extend(expanded);
        }

        out
    }

    /// Replace parameters in the body and apply `#` and `##`
    fn substitute(
        &self,
        def: &MacroDef,
        args: &[Vec<Token>],
        disabled: &mut Vec<String>,
        ctx: ExpansionContext<'_>,
        issues: &mut Vec<ExpansionIssue>,
    ) -> Vec<Token> {
        let body = &def.body;
        let mut out: Vec<Token> = Vec::with_capacity(body.len());
        let mut i = 0;

        while i < body.len() {
            let token = &body[i];

            if def.is_function_like() && token.is_punct("#") {
                if let Some(idx) = body.get(i + 1).and_then(|t| def.param_index(t)) {
                    out.push(Token::new(
                        TokenKind::Literal,
                        stringify(&args[idx]),
                        token.space_before,
                    ));
                    i += 2;
                    continue;
                }
            }

            if let Some(idx) = def.param_index(token) {
                let pasted = body.get(i + 1).is_some_and(|t| t.is_punct("##"))
                    || (i > 0 && body[i - 1].is_punct("##"));
                let mut replacement = if pasted {
                    args[idx].clone()
                } else {
                    self.expand_tokens(&args[idx], disabled, ctx, issues)
                };
                match replacement.first_mut() {
                    Some(first) => first.space_before = token.space_before,
                    None => replacement.push(placemarker()),
                }
                out.extend(replacement);
                i += 1;
                continue;
            }

            out.push(token.clone());
            i += 1;
        }

        let mut result = paste_tokens(out);
        result.retain(|t| !is_placemarker(t));
        result
    }
}

fn placemarker() -> Token {
    Token::new(TokenKind::Other, "", false)
}

fn is_placemarker(token: &Token) -> bool {
    token.kind == TokenKind::Other && token.text.is_empty()
}

fn paste_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut result: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        if !token.is_punct("##") || result.is_empty() {
            result.push(token);
            continue;
        }
        let Some(rhs) = iter.next() else {
            break;
        };
        let Some(lhs) = result.pop() else {
            break;
        };

        // GNU comma handling for `, ## __VA_ARGS__`: drop the comma when the
        // variadic arguments are empty, otherwise keep both sides unpasted
        if lhs.is_punct(",") {
            if !is_placemarker(&rhs) {
                result.push(lhs);
                result.push(rhs);
            }
            continue;
        }
        if is_placemarker(&lhs) {
            let mut rhs = rhs;
            rhs.space_before = lhs.space_before;
            result.push(rhs);
            continue;
        }
        if is_placemarker(&rhs) {
            result.push(lhs);
            continue;
        }

        let mut pasted = tokenize(&format!("{}{}", lhs.text, rhs.text));
        if let Some(first) = pasted.first_mut() {
            first.space_before = lhs.space_before;
        }
        result.extend(pasted);
    }

    result
}

/// Split a parenthesized argument list starting at `open`.
///
/// Returns the raw arguments and the index of the closing parenthesis.
fn collect_arguments(tokens: &[Token], open: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;

    for (offset, token) in tokens[open + 1..].iter().enumerate() {
        if token.is_punct("(") {
            depth += 1;
        } else if token.is_punct(")") {
            if depth == 0 {
                return Some((args, open + 1 + offset));
            }
            depth -= 1;
        } else if token.is_punct(",") && depth == 0 {
            args.push(Vec::new());
            continue;
        }
        if let Some(current) = args.last_mut() {
            current.push(token.clone());
        }
    }
    None
}

/// Match raw arguments to parameters, folding the variadic tail into one
/// argument
fn bind_arguments(
    def: &MacroDef,
    mut args: Vec<Vec<Token>>,
    issues: &mut Vec<ExpansionIssue>,
) -> Option<Vec<Vec<Token>>> {
    let named = def.params.as_ref().map_or(0, Vec::len);

    if named == 0 && args.len() == 1 && args[0].is_empty() && !def.variadic {
        return Some(Vec::new());
    }

    if def.variadic {
        // F(a, ...) may be called as F(x)
        if args.len() < named {
            issues.push(ExpansionIssue::ArgumentCount {
                name: def.name.clone(),
                expected: named,
                got: args.len(),
            });
            return None;
        }
        let mut variadic = Vec::new();
        if args.len() > named {
            for (n, arg) in args.drain(named..).enumerate() {
                if n > 0 {
                    variadic.push(Token::new(TokenKind::Punct, ",", false));
                }
                variadic.extend(arg);
            }
        }
        args.push(variadic);
        return Some(args);
    }

    if args.len() != named {
        issues.push(ExpansionIssue::ArgumentCount {
            name: def.name.clone(),
            expected: named,
            got: args.len(),
        });
        return None;
    }
    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::lexer::join_tokens;

    fn table(defines: &[&str]) -> MacroTable {
        let mut table = MacroTable::new();
        for d in defines {
            table.define(parse_define(d).unwrap());
        }
        table
    }

    fn expand(table: &MacroTable, text: &str) -> String {
        let mut issues = Vec::new();
        let out = table.expand(
            &tokenize(text),
            ExpansionContext {
                file: "t.h",
                line: 7,
            },
            &mut issues,
        );
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
        join_tokens(&out)
    }

    #[test]
    fn test_parse_define_forms() {
        let obj = parse_define("FOO 1 + 2").unwrap();
        assert!(!obj.is_function_like());
        assert_eq!(join_tokens(&obj.body), "1 + 2");

        let space = parse_define("BAR (x)").unwrap();
        assert!(!space.is_function_like());

        let func = parse_define("MAX(a, b) ((a) > (b) ? (a) : (b))").unwrap();
        assert_eq!(func.params, Some(vec!["a".to_string(), "b".to_string()]));

        let va = parse_define("LOG(fmt, ...) printf(fmt, __VA_ARGS__)").unwrap();
        assert!(va.variadic);

        assert_eq!(parse_define("").unwrap_err(), DefineError::MissingName);
        assert_eq!(parse_define("123").unwrap_err(), DefineError::MissingName);
        assert!(matches!(
            parse_define("F(a, a) a").unwrap_err(),
            DefineError::BadParameters(_)
        ));
        assert!(matches!(
            parse_define("F(a b) a").unwrap_err(),
            DefineError::BadParameters(_)
        ));
    }

    #[test]
    fn test_object_and_function_expansion() {
        let t = table(&["N 10", "SQ(x) ((x) * (x))", "EMPTY"]);
        assert_eq!(expand(&t, "int a[N];"), "int a[10];");
        assert_eq!(expand(&t, "y = SQ(N + 1);"), "y = ((10 + 1) * (10 + 1));");
        assert_eq!(expand(&t, "EMPTY int x;"), "int x;");
        assert_eq!(expand(&t, "int SQ;"), "int SQ;");
    }

    #[test]
    fn test_self_reference_is_not_reexpanded() {
        let t = table(&["foo foo + 1", "a b", "b a"]);
        assert_eq!(expand(&t, "foo"), "foo + 1");
        assert_eq!(expand(&t, "a"), "a");
    }

    #[test]
    fn test_stringify_and_paste() {
        let t = table(&[
            "STR(x) #x",
            "CAT(a, b) a ## b",
            "DECL(n) int var_ ## n;",
        ]);
        assert_eq!(expand(&t, "STR(a + b)"), "\"a + b\"");
        assert_eq!(expand(&t, "CAT(foo, bar)"), "foobar");
        assert_eq!(expand(&t, "DECL(3)"), "int var_3;");
        assert_eq!(expand(&t, "CAT(, x)"), "x");
    }

    #[test]
    fn test_variadic_and_comma_elision() {
        let t = table(&[
            "CALL(f, ...) f(__VA_ARGS__)",
            "LOG(fmt, ...) printf(fmt, ## __VA_ARGS__)",
        ]);
        assert_eq!(expand(&t, "CALL(g, 1, 2)"), "g(1, 2)");
        assert_eq!(expand(&t, "CALL(g)"), "g()");
        assert_eq!(expand(&t, "LOG(\"x\")"), "printf(\"x\")");
        assert_eq!(expand(&t, "LOG(\"x\", 1)"), "printf(\"x\", 1)");
    }

    #[test]
    fn test_builtin_location_macros() {
        let t = MacroTable::new();
        assert_eq!(expand(&t, "__LINE__ __FILE__"), "7 \"t.h\"");
        assert!(t.is_defined("__FILE__"));
    }

    #[test]
    fn test_argument_count_mismatch_leaves_call() {
        let t = table(&["TWO(a, b) a b"]);
        let mut issues = Vec::new();
        let out = t.expand(
            &tokenize("TWO(1)"),
            ExpansionContext { file: "t.h", line: 1 },
            &mut issues,
        );
        assert_eq!(join_tokens(&out), "TWO(1)");
        assert_eq!(
            issues,
            vec![ExpansionIssue::ArgumentCount {
                name: "TWO".into(),
                expected: 2,
                got: 1
            }]
        );

        issues.clear();
        t.expand(
            &tokenize("TWO(1, 2"),
            ExpansionContext { file: "t.h", line: 1 },
            &mut issues,
        );
        assert_eq!(issues, vec![ExpansionIssue::UnterminatedCall("TWO".into())]);
    }

    #[test]
    fn test_same_definition() {
        let a = parse_define("X  1 +  2").unwrap();
        let b = parse_define("X 1 + 2").unwrap();
        let c = parse_define("X 1+2").unwrap();
        assert!(a.same_definition(&b));
        assert!(!a.same_definition(&c));
    }
}
