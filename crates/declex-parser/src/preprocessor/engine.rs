//! Preprocessor
//!
//! Runs directives over the main buffer and every file it includes and
//! produces a single expanded text. Each output line keeps the file and
//! line it came from so later diagnostics and declarations can be located.

use declex_core::Location;
use std::collections::HashSet;
use std::iter::Peekable;
use std::path::PathBuf;
use std::rc::Rc;
use std::vec::IntoIter;
use tracing::{debug, info, warn};

use super::callbacks::{DirectiveContext, InclusionEvent, PpCallbacks};
use super::config::MacroDefinition;
use super::diagnostics::{DiagId, DiagnosticsEngine};
use super::expr::{self, ExprError};
use super::headers::{FoundFile, HeaderSearch};
use super::lexer::{is_ident_continue, join_tokens, tokenize, Token, TokenKind};
use super::line_map::LineMap;
use super::macros::{parse_define, DefineError, ExpansionContext, ExpansionIssue, MacroTable};
use super::source::{FileId, MemoryBuffer, SourceManager};

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 200;

/// Text lines with unbalanced parentheses are joined up to this many
/// physical lines, so macro invocations may span lines
const MAX_JOINED_LINES: u32 = 64;

/// Settings applied when the preprocessor is created
#[derive(Debug, Clone)]
pub struct PreprocessorOptions {
    pub predefines: Vec<MacroDefinition>,
    /// Paths that resolve to the given buffer whether or not they exist
    pub remapped_files: Vec<(PathBuf, MemoryBuffer)>,
    pub max_include_depth: usize,
}

impl Default for PreprocessorOptions {
    fn default() -> Self {
        Self {
            predefines: Vec::new(),
            remapped_files: Vec::new(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// Output of a preprocessing run
#[derive(Debug, Clone, Default)]
pub struct PreprocessedUnit {
    pub text: String,
    pub line_map: LineMap,
}

struct Conditional {
    line: u32,
    active: bool,
    /// Some branch of this group has been taken
    taken: bool,
    seen_else: bool,
    parent_active: bool,
}

struct FileFrame {
    id: FileId,
    name: Rc<str>,
    file_index: u32,
    dir_index: Option<usize>,
}

struct PendingText {
    tokens: Vec<Token>,
    first_line: u32,
    line_count: u32,
    depth: i32,
}

struct LogicalLine {
    text: String,
    number: u32,
    /// Physical lines joined by backslash continuations
    span: u32,
}

pub struct Preprocessor<'d> {
    diags: &'d mut DiagnosticsEngine,
    source_manager: SourceManager,
    header_search: HeaderSearch,
    macros: MacroTable,
    callbacks: Vec<Box<dyn PpCallbacks>>,
    suppress_include_not_found: bool,
    once_files: HashSet<usize>,
    include_stack: Vec<FileFrame>,
    max_include_depth: usize,
    output: String,
    line_map: LineMap,
}

impl<'d> Preprocessor<'d> {
    pub fn new(
        diags: &'d mut DiagnosticsEngine,
        source_manager: SourceManager,
        header_search: HeaderSearch,
        options: PreprocessorOptions,
    ) -> Self {
        let mut pp = Self {
            diags,
            source_manager,
            header_search,
            macros: MacroTable::new(),
            callbacks: Vec::new(),
            suppress_include_not_found: false,
            once_files: HashSet::new(),
            include_stack: Vec::new(),
            max_include_depth: options.max_include_depth,
            output: String::new(),
            line_map: LineMap::new(),
        };
        pp.initialize(options);
        pp
    }

    fn initialize(&mut self, options: PreprocessorOptions) {
        for (path, buffer) in options.remapped_files {
            let entry = self
                .source_manager
                .file_manager_mut()
                .get_virtual_file(&path);
            self.source_manager.override_file_contents(&entry, buffer);
        }

        for predefine in &options.predefines {
            match parse_define(&format!("{} {}", predefine.name, predefine.value)) {
                Ok(def) => {
                    self.macros.define(def);
                }
                Err(_) => warn!("Ignoring malformed predefined macro {}", predefine.name),
            }
        }
    }

    pub fn add_pp_callbacks(&mut self, callbacks: Box<dyn PpCallbacks>) {
        self.callbacks.push(callbacks);
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn source_manager(&self) -> &SourceManager {
        &self.source_manager
    }

    /// Preprocess the main file and everything it includes
    pub fn preprocess(mut self) -> PreprocessedUnit {
        let Some(main) = self.source_manager.main_file() else {
            warn!("No main file to preprocess");
            return PreprocessedUnit::default();
        };

        info!("Preprocessing {}", self.source_manager.file_name(main));
        self.process_file(main, None);
        debug!(
            "Preprocessed {} lines, {} macros defined",
            self.line_map.len(),
            self.macros.len()
        );

        PreprocessedUnit {
            text: self.output,
            line_map: self.line_map,
        }
    }

    fn process_file(&mut self, id: FileId, dir_index: Option<usize>) {
        let name = self.source_manager.file_name(id);
        let file_index = self.line_map.add_file(name.clone());
        let text = strip_comments(&self.source_manager.buffer(id));
        self.include_stack.push(FileFrame {
            id,
            name,
            file_index,
            dir_index,
        });

        let mut conditionals: Vec<Conditional> = Vec::new();
        let mut pending: Option<PendingText> = None;

        for line in logical_lines(&text) {
            if let Some(directive) = line.text.trim_start().strip_prefix('#') {
                if let Some(p) = pending.take() {
                    self.emit_pending(p);
                }
                self.handle_directive(directive, line.number, &mut conditionals);
                self.emit_blank(line.number, line.span);
                continue;
            }

            if !is_active(&conditionals) {
                self.emit_blank(line.number, line.span);
                continue;
            }

            let mut tokens = tokenize(&line.text);
            let p = pending.get_or_insert_with(|| PendingText {
                tokens: Vec::new(),
                first_line: line.number,
                line_count: 0,
                depth: 0,
            });
            if !p.tokens.is_empty() {
                if let Some(first) = tokens.first_mut() {
                    first.space_before = true;
                }
            }
            p.depth += paren_delta(&tokens);
            p.tokens.extend(tokens);
            p.line_count += line.span;

            if p.depth <= 0 || p.line_count >= MAX_JOINED_LINES {
                if let Some(p) = pending.take() {
                    self.emit_pending(p);
                }
            }
        }
        if let Some(p) = pending.take() {
            self.emit_pending(p);
        }

        for conditional in &conditionals {
            self.report(
                DiagId::UnterminatedConditional,
                conditional.line,
                "unterminated conditional directive",
            );
        }
        self.include_stack.pop();
    }

    fn handle_directive(&mut self, text: &str, line: u32, conditionals: &mut Vec<Conditional>) {
        let text = text.trim_start();
        let keyword_len = text
            .find(|c: char| !is_ident_continue(c))
            .unwrap_or(text.len());
        let (keyword, rest) = text.split_at(keyword_len);
        let active = is_active(conditionals);

        match keyword {
            "if" | "ifdef" | "ifndef" => {
                let value = active
                    && match keyword {
                        "ifdef" => self.eval_ifdef(rest, line),
                        "ifndef" => !self.eval_ifdef(rest, line),
                        _ => self.eval_if(rest, line),
                    };
                conditionals.push(Conditional {
                    line,
                    active: value,
                    taken: value,
                    seen_else: false,
                    parent_active: active,
                });
            }
            "elif" => match conditionals.last_mut() {
                None => self.report(DiagId::ConditionalWithoutIf, line, "#elif without #if"),
                Some(cond) => {
                    if cond.seen_else {
                        self.report(DiagId::ElseAfterElse, line, "#elif after #else");
                    }
                    if cond.parent_active && !cond.taken {
                        let value = self.eval_if(rest, line);
                        cond.active = value;
                        cond.taken = value;
                    } else {
                        cond.active = false;
                    }
                }
            },
            "else" => match conditionals.last_mut() {
                None => self.report(DiagId::ConditionalWithoutIf, line, "#else without #if"),
                Some(cond) => {
                    if cond.seen_else {
                        self.report(DiagId::ElseAfterElse, line, "#else after #else");
                    }
                    cond.seen_else = true;
                    cond.active = cond.parent_active && !cond.taken;
                    cond.taken = true;
                }
            },
            "endif" => {
                if conditionals.pop().is_none() {
                    self.report(DiagId::ConditionalWithoutIf, line, "#endif without #if");
                }
            }
            _ if !active => {}
            "include" | "include_next" | "import" => self.handle_include(keyword, rest, line),
            "define" => self.handle_define(rest, line),
            "undef" => self.handle_undef(rest, line),
            "error" => self.report(DiagId::ErrorDirective, line, rest.trim()),
            "warning" => self.report(DiagId::WarningDirective, line, rest.trim()),
            "pragma" => {
                if rest.trim() == "once" {
                    self.mark_once();
                }
            }
            "" | "line" | "ident" | "sccs" => {}
            _ => self.report(
                DiagId::InvalidDirective,
                line,
                "invalid preprocessing directive",
            ),
        }
    }

    fn handle_include(&mut self, directive: &str, rest: &str, line: u32) {
        let Some((file_name, is_angled)) = self.parse_include_target(rest, line) else {
            return;
        };
        let Some((includer_dir, from_index)) = self.search_start(directive == "include_next") else {
            return;
        };

        let found = self.header_search.lookup_file(
            &file_name,
            is_angled,
            Some(&includer_dir),
            from_index,
            self.source_manager.file_manager_mut(),
        );

        {
            let event = InclusionEvent {
                hash_location: self.current_location(line),
                directive,
                file_name: &file_name,
                is_angled,
                file: found.as_ref().map(|f| &f.entry),
            };
            let mut ctx = DirectiveContext::new(
                &mut self.source_manager,
                &mut self.suppress_include_not_found,
            );
            for callbacks in &mut self.callbacks {
                callbacks.inclusion_directive(&event, &mut ctx);
            }
        }

        let Some(FoundFile { entry, dir_index }) = found else {
            if self.suppress_include_not_found {
                debug!("Missing include {} not reported", file_name);
            } else {
                self.report(
                    DiagId::FileNotFound,
                    line,
                    format!("'{}' file not found", file_name),
                );
            }
            return;
        };

        if self.once_files.contains(&entry.uid()) {
            debug!("Skipping {} (already included once)", entry.name().display());
            return;
        }
        if directive == "import" {
            self.once_files.insert(entry.uid());
        }
        if self.include_stack.len() > self.max_include_depth {
            self.report(
                DiagId::IncludeNestedTooDeeply,
                line,
                "#include nested too deeply",
            );
            return;
        }

        match self.source_manager.create_file_id(&entry) {
            Ok(id) => {
                debug!("Entering {}", entry.name().display());
                self.process_file(id, dir_index);
            }
            Err(err) => self.report(
                DiagId::CannotOpenFile,
                line,
                format!("cannot open file '{}': {}", entry.name().display(), err),
            ),
        }
    }

    /// Includer directory and search restart index for a lookup made from
    /// the current file
    fn search_start(&self, include_next: bool) -> Option<(PathBuf, Option<usize>)> {
        let frame = self.include_stack.last()?;
        let from_index = if include_next {
            frame.dir_index.map(|i| i + 1)
        } else {
            None
        };
        Some((
            self.source_manager.file_dir(frame.id).to_path_buf(),
            from_index,
        ))
    }

    fn parse_include_target(&mut self, rest: &str, line: u32) -> Option<(String, bool)> {
        let rest = rest.trim();
        let spelled = if rest.starts_with('"') || rest.starts_with('<') {
            rest.to_string()
        } else {
            // Computed include: the operand must expand to a header name
            let expanded = self.expand_tokens(&tokenize(rest), line);
            join_tokens(&expanded)
        };

        match split_header_name(&spelled) {
            Some(("", _)) => {
                self.report(DiagId::EmptyFilename, line, "empty filename");
                None
            }
            Some((name, angled)) => Some((name.to_string(), angled)),
            None => {
                self.report(
                    DiagId::InvalidDirective,
                    line,
                    "expected \"FILENAME\" or <FILENAME>",
                );
                None
            }
        }
    }

    fn handle_define(&mut self, rest: &str, line: u32) {
        match parse_define(rest) {
            Ok(def) if def.name == "defined" => self.report(
                DiagId::MacroNameMissing,
                line,
                "'defined' cannot be used as a macro name",
            ),
            Ok(def) => {
                let redefined = self
                    .macros
                    .get(&def.name)
                    .is_some_and(|previous| !previous.same_definition(&def));
                if redefined {
                    self.report(
                        DiagId::MacroRedefined,
                        line,
                        format!("'{}' macro redefined", def.name),
                    );
                }
                self.macros.define(def);
            }
            Err(e @ DefineError::MissingName) => {
                self.report(DiagId::MacroNameMissing, line, e.to_string())
            }
            Err(DefineError::BadParameters(message)) => {
                self.report(DiagId::BadMacroParameters, line, message)
            }
        }
    }

    fn handle_undef(&mut self, rest: &str, line: u32) {
        match tokenize(rest).first() {
            Some(token) if token.kind == TokenKind::Ident => {
                self.macros.undefine(&token.text);
            }
            _ => self.report(DiagId::MacroNameMissing, line, "macro name missing"),
        }
    }

    fn mark_once(&mut self) {
        let entry = self
            .include_stack
            .last()
            .and_then(|frame| self.source_manager.file_entry(frame.id));
        if let Some(entry) = entry {
            self.once_files.insert(entry.uid());
        }
    }

    fn is_defined(&self, name: &str) -> bool {
        self.macros.is_defined(name) || matches!(name, "__has_include" | "__has_include_next")
    }

    fn eval_ifdef(&mut self, rest: &str, line: u32) -> bool {
        match tokenize(rest).first() {
            Some(token) if token.kind == TokenKind::Ident => self.is_defined(&token.text),
            _ => {
                self.report(DiagId::MacroNameMissing, line, "macro name missing");
                false
            }
        }
    }

    fn eval_if(&mut self, rest: &str, line: u32) -> bool {
        let tokens = self.resolve_defined(tokenize(rest), line);
        let expanded = self.expand_tokens(&tokens, line);
        // `defined` may also come out of a macro expansion
        let resolved = self.resolve_defined(expanded, line);

        match expr::evaluate(&resolved) {
            Ok(value) => value != 0,
            Err(ExprError::DivisionByZero) => {
                self.report(DiagId::DivisionByZero, line, ExprError::DivisionByZero.to_string());
                false
            }
            Err(ExprError::Invalid(message)) => {
                self.report(DiagId::InvalidExpression, line, message);
                false
            }
        }
    }

    /// Replace `defined X`, `defined(X)` and `__has_include(...)` with
    /// their values
    fn resolve_defined(&mut self, tokens: Vec<Token>, line: u32) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut iter = tokens.into_iter().peekable();

        while let Some(token) = iter.next() {
            let value = if token.is_ident("defined") {
                let paren = iter.next_if(|t| t.is_punct("(")).is_some();
                let name = match iter.next() {
                    Some(t) if t.kind == TokenKind::Ident => t.text,
                    _ => {
                        self.report(DiagId::MacroNameMissing, line, "macro name missing");
                        String::new()
                    }
                };
                if paren && iter.next_if(|t| t.is_punct(")")).is_none() {
                    self.report(
                        DiagId::InvalidExpression,
                        line,
                        "missing ')' after 'defined'",
                    );
                }
                !name.is_empty() && self.is_defined(&name)
            } else if token.is_ident("__has_include") || token.is_ident("__has_include_next") {
                let next = token.text == "__has_include_next";
                self.eval_has_include(next, &mut iter, line)
            } else {
                out.push(token);
                continue;
            };

            out.push(Token::new(
                TokenKind::Number,
                if value { "1" } else { "0" },
                token.space_before,
            ));
        }

        out
    }

    fn eval_has_include(
        &mut self,
        include_next: bool,
        iter: &mut Peekable<IntoIter<Token>>,
        line: u32,
    ) -> bool {
        if iter.next_if(|t| t.is_punct("(")).is_none() {
            self.report(
                DiagId::InvalidExpression,
                line,
                "missing '(' after '__has_include'",
            );
            return false;
        }

        let mut operand = Vec::new();
        let mut depth = 0usize;
        for token in iter.by_ref() {
            if token.is_punct("(") {
                depth += 1;
            } else if token.is_punct(")") {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            operand.push(token);
        }

        let spelled = join_tokens(&operand);
        let Some((name, angled)) = split_header_name(&spelled) else {
            self.report(
                DiagId::InvalidExpression,
                line,
                "expected \"FILENAME\" or <FILENAME>",
            );
            return false;
        };
        let Some((includer_dir, from_index)) = self.search_start(include_next) else {
            return false;
        };

        self.header_search
            .lookup_file(
                name,
                angled,
                Some(&includer_dir),
                from_index,
                self.source_manager.file_manager_mut(),
            )
            .is_some()
    }

    fn expand_tokens(&mut self, tokens: &[Token], line: u32) -> Vec<Token> {
        let name = self.current_name();
        let mut issues = Vec::new();
        let expanded = self.macros.expand(
            tokens,
            ExpansionContext { file: &name, line },
            &mut issues,
        );

        for issue in issues {
            let id = match issue {
                ExpansionIssue::UnterminatedCall(_) => DiagId::UnterminatedMacroCall,
                ExpansionIssue::ArgumentCount { .. } => DiagId::MacroArgumentCount,
            };
            self.report(id, line, issue.to_string());
        }
        expanded
    }

    fn emit_pending(&mut self, pending: PendingText) {
        let expanded = self.expand_tokens(&pending.tokens, pending.first_line);
        self.emit_line(&join_tokens(&expanded), pending.first_line);
        self.emit_blank(pending.first_line + 1, pending.line_count.saturating_sub(1));
    }

    fn emit_line(&mut self, text: &str, line: u32) {
        let file_index = self.include_stack.last().map_or(0, |f| f.file_index);
        self.output.push_str(text);
        self.output.push('\n');
        self.line_map.push(file_index, line);
    }

    fn emit_blank(&mut self, first_line: u32, count: u32) {
        for offset in 0..count {
            self.emit_line("", first_line + offset);
        }
    }

    fn current_name(&self) -> Rc<str> {
        self.include_stack
            .last()
            .map_or_else(|| Rc::from(""), |f| f.name.clone())
    }

    fn current_location(&self, line: u32) -> Location {
        Location::new(self.current_name().to_string(), line, 0)
    }

    fn report(&mut self, id: DiagId, line: u32, message: impl Into<String>) {
        let location = self.current_location(line);
        self.diags.report(id, Some(location), message);
    }
}

fn is_active(conditionals: &[Conditional]) -> bool {
    conditionals.last().map_or(true, |c| c.active)
}

fn paren_delta(tokens: &[Token]) -> i32 {
    tokens.iter().fold(0, |depth, t| {
        if t.is_punct("(") {
            depth + 1
        } else if t.is_punct(")") {
            depth - 1
        } else {
            depth
        }
    })
}

/// Split `"name"` or `<name>` into the name and whether it was angled
fn split_header_name(text: &str) -> Option<(&str, bool)> {
    let (close, angled) = match text.chars().next()? {
        '"' => ('"', false),
        '<' => ('>', true),
        _ => return None,
    };
    let end = text[1..].find(close)? + 1;
    Some((&text[1..end], angled))
}

/// Replace comments with whitespace, keeping every newline so line numbers
/// do not move
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                out.push(' ');
                let mut last = c;
                while let Some(&n) = chars.peek() {
                    if n == '\n' {
                        if last != '\\' {
                            break;
                        }
                        // continued line comment
                        out.push_str("\\\n");
                    }
                    if n != '\r' {
                        last = n;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push(' ');
                let mut last = '\0';
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                    }
                    if last == '*' && n == '/' {
                        break;
                    }
                    last = n;
                }
            }
            '"' | '\'' => {
                // 1'000 uses ' as a digit separator
                if c == '\'' && out.chars().next_back().is_some_and(|p| p.is_ascii_digit()) {
                    out.push(c);
                    continue;
                }
                out.push(c);
                while let Some(n) = chars.next() {
                    out.push(n);
                    if n == '\n' || n == c {
                        break;
                    }
                    if n == '\\' {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Split text into lines, joining backslash continuations
fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 1;
    let mut span = 0;

    for (index, raw) in text.lines().enumerate() {
        if span == 0 {
            start = index as u32 + 1;
        }
        span += 1;
        if let Some(body) = raw.strip_suffix('\\') {
            current.push_str(body);
            continue;
        }
        current.push_str(raw);
        lines.push(LogicalLine {
            text: std::mem::take(&mut current),
            number: start,
            span,
        });
        span = 0;
    }
    if span > 0 {
        lines.push(LogicalLine {
            text: current,
            number: start,
            span,
        });
    }

    lines
}
