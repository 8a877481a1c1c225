//! Scans host-language expression text embedded in a template, rewriting
//! `$name` placeholders into NameMapper calls as it goes.
//!
//! Ported from `_LowLevelParser` in `Cheetah/Parser.py`. The original
//! interleaves character scanning with on-the-fly rewriting of `$vars`
//! found mid-expression (inside `#if`, `#set`, call arguments, …); this
//! port keeps that interleaving rather than tokenizing fully and
//! rewriting in a second pass, since brackets and `$vars` can nest
//! arbitrarily inside one another.

use crate::error::{CompileError, Result};
use crate::namemapper::{self, NameChunk};
use crate::settings::Settings;
use crate::source_reader::SourceReader;
use crate::tables;

pub struct Lexer<'src> {
    pub reader: SourceReader<'src>,
}

/// An argument list parsed from a `def`/directive argument position:
/// `(a, b=1, *args, **kwargs)`.
#[derive(Debug, Clone, Default)]
pub struct ArgList {
    pub names: Vec<String>,
    pub defaults: Vec<Option<String>>,
}

impl ArgList {
    pub fn push(&mut self, name: String, default: Option<String>) {
        self.names.push(name);
        self.defaults.push(default);
    }
}

impl<'src> Lexer<'src> {
    pub fn new(reader: SourceReader<'src>) -> Self {
        Self { reader }
    }

    fn fail_lexical(&self, start: u32, detail: impl Into<String>) -> CompileError {
        CompileError::Lexical {
            span: self.reader.span_to_here(start),
            detail: detail.into(),
        }
    }

    pub fn match_ident_start(&self) -> bool {
        self.reader
            .peek()
            .map(tables::IDENT_START)
            .unwrap_or(false)
    }

    /// `name(.name)*`, not including a leading `$`.
    pub fn get_dotted_name(&mut self) -> Result<String> {
        let start = self.reader.pos();
        if !self.match_ident_start() {
            return Err(self.fail_lexical(start, "expected an identifier"));
        }
        self.consume_ident()?;
        loop {
            if self.reader.at_end() || self.reader.peek()? != '.' {
                break;
            }
            if !self.reader.peek_at(1).map(tables::IDENT_START).unwrap_or(false) {
                break;
            }
            self.reader.advance(1)?; // consume '.'
            self.consume_ident()?;
        }
        Ok(self.reader.src()[start as usize..self.reader.pos() as usize].to_string())
    }

    fn consume_ident(&mut self) -> Result<()> {
        while !self.reader.at_end() {
            let c = self.reader.peek()?;
            if tables::IDENT_CONT(c) {
                self.reader.getc()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    pub fn match_cheetah_var_start(&self, settings: &Settings) -> bool {
        self.reader
            .peek()
            .map(|c| c.to_string() == settings.cheetah_var_start_token)
            .unwrap_or(false)
    }

    /// Consumes the leading `$` and parses the chunk list that follows.
    pub fn get_cheetah_var(&mut self, settings: &Settings, plain: bool) -> Result<String> {
        if self.match_cheetah_var_start(settings) {
            self.reader.advance(1)?;
        }
        let chunks = self.get_cheetah_var_name_chunks(settings)?;
        Ok(namemapper::gen_cheetah_var(settings, &chunks, plain))
    }

    /// Parses `a.b.c[1].d().x.y.z` into ordered `NameChunk`s. Ported
    /// verbatim from `getCheetahVarNameChunks`.
    pub fn get_cheetah_var_name_chunks(&mut self, settings: &Settings) -> Result<Vec<NameChunk>> {
        let mut chunks = Vec::new();
        while !self.reader.at_end() {
            let c = self.reader.peek()?;
            if !(tables::IDENT_START(c) || tables::IDENT_CONT(c) || c == '.') {
                break;
            }
            if c == '.' {
                let next_is_ident = self.reader.peek_at(1).map(tables::IDENT_START).unwrap_or(false);
                if next_is_ident {
                    self.reader.advance(1)?;
                } else {
                    break;
                }
            }

            let mut dotted_name = self.get_dotted_name()?;
            let mut rest = String::new();
            let mut auto_call = true;

            if !self.reader.at_end() {
                let next = self.reader.peek()?;
                if next == '(' || next == '[' {
                    rest = self.scan_enclosed(settings)?;
                    if let Some(period) = dotted_name.rfind('.') {
                        let head = dotted_name[..period].to_string();
                        chunks.push(NameChunk::new(head, auto_call, ""));
                        dotted_name = dotted_name[period + 1..].to_string();
                    }
                    if rest.starts_with('(') {
                        auto_call = false;
                    }
                }
            }
            chunks.push(NameChunk::new(dotted_name, auto_call, rest));
        }
        Ok(chunks)
    }

    /// Reads a bracketed group starting at `(`, `[`, or `{` through its
    /// matching close, rewriting any `$vars` found along the way and
    /// copying string literals verbatim.
    pub fn scan_enclosed(&mut self, settings: &Settings) -> Result<String> {
        let start = self.reader.pos();
        let open = self.reader.peek()?;
        let close = tables::closing_delimiter(open)
            .ok_or_else(|| self.fail_lexical(start, "expected an opening delimiter"))?;
        self.reader.getc()?;

        let mut out = String::new();
        out.push(open);
        let mut depth = 1u32;

        loop {
            if self.reader.at_end() {
                return Err(self.fail_lexical(
                    start,
                    format!("EOF reached before a matching '{close}' was found"),
                ));
            }
            let c = self.reader.peek()?;
            if c == '\'' || c == '"' {
                out.push_str(&self.get_string_literal()?);
                continue;
            }
            if tables::closing_delimiter(c).is_some() {
                out.push_str(&self.scan_enclosed(settings)?);
                continue;
            }
            if c == close {
                self.reader.getc()?;
                out.push(close);
                depth -= 1;
                if depth == 0 {
                    break;
                }
                continue;
            }
            if c == settings.cheetah_var_start_token.chars().next().unwrap_or('$')
                && self.reader.peek_at(1).map(tables::IDENT_START).unwrap_or(false)
            {
                out.push_str(&self.get_cheetah_var(settings, false)?);
                continue;
            }
            out.push(self.reader.getc()?);
        }

        Ok(out)
    }

    /// Consumes a quoted string literal (single, double, or triple
    /// quoted), returning the exact source text including delimiters.
    pub fn get_string_literal(&mut self) -> Result<String> {
        let start = self.reader.pos();
        for opener in tables::TRIPLE_QUOTE_STARTS {
            if self.reader.startswith(opener, None) {
                let closer = tables::triple_quote_closer(opener);
                self.reader.advance(opener.len() as u32)?;
                loop {
                    if self.reader.at_end() {
                        return Err(self.fail_lexical(start, "unterminated triple-quoted string"));
                    }
                    if self.reader.startswith(closer, None) {
                        self.reader.advance(closer.len() as u32)?;
                        break;
                    }
                    self.reader.getc()?;
                }
                return Ok(self.reader.src()[start as usize..self.reader.pos() as usize].to_string());
            }
        }

        let quote = self.reader.peek()?;
        self.reader.getc()?;
        loop {
            if self.reader.at_end() {
                return Err(self.fail_lexical(start, "unterminated string literal"));
            }
            let c = self.reader.getc()?;
            if c == '\\' && !self.reader.at_end() {
                self.reader.getc()?;
                continue;
            }
            if c == quote {
                break;
            }
        }
        Ok(self.reader.src()[start as usize..self.reader.pos() as usize].to_string())
    }

    /// Reads a `(...)` call-argument string, rewriting `$vars` found
    /// inside. Unlike the general `scan_enclosed`, a `$name` immediately
    /// followed by whitespace and a bare `=` (not `==`) names a keyword
    /// argument: it is re-emitted via `get_cheetah_var(settings, true)`
    /// (no NameMapper rewriting) instead of the usual rewritten form,
    /// so `$foo(bar=$baz)` compiles to `foo(bar=VFFSL(...))` rather
    /// than `foo(VFFSL("bar",...)=VFFSL(...))`.
    pub fn get_call_arg_string(&mut self, settings: &Settings) -> Result<String> {
        let start = self.reader.pos();
        if self.reader.peek()? != '(' {
            return Err(self.fail_lexical(start, "expected '('"));
        }
        self.reader.getc()?;

        let mut out = String::new();
        out.push('(');
        let mut depth = 1u32;

        loop {
            if self.reader.at_end() {
                return Err(self.fail_lexical(start, "EOF reached before a matching ')' was found"));
            }
            let c = self.reader.peek()?;
            if c == '\'' || c == '"' {
                out.push_str(&self.get_string_literal()?);
                continue;
            }
            if tables::closing_delimiter(c).is_some() {
                out.push_str(&self.scan_enclosed(settings)?);
                continue;
            }
            if c == ')' {
                self.reader.getc()?;
                out.push(')');
                depth -= 1;
                if depth == 0 {
                    break;
                }
                continue;
            }
            if c == settings.cheetah_var_start_token.chars().next().unwrap_or('$')
                && self.reader.peek_at(1).map(tables::IDENT_START).unwrap_or(false)
            {
                let var_start = self.reader.pos();
                let rewritten = self.get_cheetah_var(settings, false)?;
                let ws = self.get_whitespace();
                let followed_by_bare_eq = !self.reader.at_end()
                    && self.reader.peek()? == '='
                    && self.reader.peek_at(1).map(|c| c != '=').unwrap_or(true);
                if followed_by_bare_eq {
                    let var_end = self.reader.pos();
                    self.reader.set_pos(var_start)?;
                    let plain = self.get_cheetah_var(settings, true)?;
                    self.reader.set_pos(var_end)?;
                    out.push_str(&plain);
                } else {
                    out.push_str(&rewritten);
                }
                out.push_str(&ws);
                continue;
            }
            out.push(self.reader.getc()?);
        }

        Ok(out)
    }

    /// Reads an expression up to end-of-line or to one of `stop_words`
    /// appearing as a whole word at bracket depth 0, rewriting `$vars`.
    /// Returns the rewritten text and, if a stop word terminated the
    /// scan, which one.
    pub fn get_expression(
        &mut self,
        settings: &Settings,
        stop_words: &[&str],
    ) -> Result<(String, Option<String>)> {
        let mut out = String::new();
        let mut last_word_was_for = false;

        loop {
            if self.reader.at_end() || matches!(self.reader.peek()?, '\r' | '\n') {
                return Ok((out, None));
            }
            let c = self.reader.peek()?;

            if c == '\'' || c == '"' {
                out.push_str(&self.get_string_literal()?);
                continue;
            }
            if tables::closing_delimiter(c).is_some() {
                out.push_str(&self.scan_enclosed(settings)?);
                continue;
            }
            if self.match_cheetah_var_start(settings)
                && self.reader.peek_at(1).map(tables::IDENT_START).unwrap_or(false)
            {
                out.push_str(&self.get_cheetah_var(settings, false)?);
                continue;
            }
            if tables::IDENT_START(c) {
                let word_start = self.reader.pos();
                let word = self.get_dotted_name_single_segment()?;
                if word == "for" {
                    last_word_was_for = true;
                } else if word == tables::COMPREHENSION_CONTINUATION && last_word_was_for {
                    last_word_was_for = false;
                } else if stop_words.contains(&word.as_str()) {
                    self.reader.set_pos(word_start)?;
                    return Ok((out, Some(word)));
                } else {
                    last_word_was_for = false;
                }
                out.push_str(&word);
                continue;
            }

            out.push(self.reader.getc()?);
        }
    }

    fn get_dotted_name_single_segment(&mut self) -> Result<String> {
        let start = self.reader.pos();
        self.consume_ident()?;
        Ok(self.reader.src()[start as usize..self.reader.pos() as usize].to_string())
    }

    /// Reads an argument list for `#def`/`#block`/macro directives:
    /// `(a, b=1, *args, **kwargs)` or, when no parens are present, the
    /// bare comma-separated tail of a directive line. Default values are
    /// copied verbatim (not NameMapper-rewritten), matching the
    /// original's `useNameMapper=False` default for this call.
    pub fn get_def_arg_list(&mut self) -> Result<ArgList> {
        let parenthesized = !self.reader.at_end() && self.reader.peek()? == '(';
        if parenthesized {
            self.reader.advance(1)?;
        }
        let exit_pos = if parenthesized {
            None
        } else {
            Some(self.reader.find_eol(false))
        };

        let mut list = ArgList::default();
        loop {
            self.skip_inline_whitespace()?;
            if let Some(exit) = exit_pos {
                if self.reader.pos() >= exit {
                    break;
                }
            }
            if self.reader.at_end() {
                if parenthesized {
                    return Err(self.fail_lexical(
                        self.reader.pos(),
                        "EOF reached before a matching ')' was found for the '('",
                    ));
                }
                break;
            }
            if parenthesized && self.reader.peek()? == ')' {
                self.reader.advance(1)?;
                break;
            }

            let mut name = String::new();
            while !self.reader.at_end() && matches!(self.reader.peek()?, '*') {
                name.push(self.reader.getc()?);
            }
            if self.match_ident_start() {
                name.push_str(&self.get_dotted_name()?);
            }
            if name.is_empty() {
                break;
            }

            self.skip_inline_whitespace()?;
            let mut default = None;
            if !self.reader.at_end() && self.reader.peek()? == '=' {
                self.reader.advance(1)?;
                self.skip_inline_whitespace()?;
                default = Some(self.read_default_value(parenthesized, exit_pos)?);
            }
            list.push(name, default);

            self.skip_inline_whitespace()?;
            if !self.reader.at_end() && self.reader.peek()? == ',' {
                self.reader.advance(1)?;
                continue;
            }
            if parenthesized && !self.reader.at_end() && self.reader.peek()? == ')' {
                self.reader.advance(1)?;
                break;
            }
            break;
        }
        Ok(list)
    }

    fn read_default_value(&mut self, parenthesized: bool, exit_pos: Option<u32>) -> Result<String> {
        let mut out = String::new();
        loop {
            if self.reader.at_end() {
                break;
            }
            if let Some(exit) = exit_pos {
                if self.reader.pos() >= exit {
                    break;
                }
            }
            let c = self.reader.peek()?;
            if c == ',' {
                break;
            }
            if parenthesized && c == ')' {
                break;
            }
            if c == '\'' || c == '"' {
                out.push_str(&self.get_string_literal()?);
                continue;
            }
            if tables::closing_delimiter(c).is_some() {
                out.push_str(&self.plain_scan_enclosed()?);
                continue;
            }
            out.push(self.reader.getc()?);
        }
        Ok(out.trim().to_string())
    }

    /// Like `scan_enclosed` but never rewrites `$vars` (used for default
    /// argument values and `#set` lvalues).
    pub fn plain_scan_enclosed(&mut self) -> Result<String> {
        let start = self.reader.pos();
        let open = self.reader.peek()?;
        let close = tables::closing_delimiter(open)
            .ok_or_else(|| self.fail_lexical(start, "expected an opening delimiter"))?;
        self.reader.getc()?;
        let mut out = String::new();
        out.push(open);
        loop {
            if self.reader.at_end() {
                return Err(self.fail_lexical(
                    start,
                    format!("EOF reached before a matching '{close}' was found"),
                ));
            }
            let c = self.reader.peek()?;
            if c == '\'' || c == '"' {
                out.push_str(&self.get_string_literal()?);
                continue;
            }
            if tables::closing_delimiter(c).is_some() {
                out.push_str(&self.plain_scan_enclosed()?);
                continue;
            }
            if c == close {
                self.reader.getc()?;
                out.push(close);
                break;
            }
            out.push(self.reader.getc()?);
        }
        Ok(out)
    }

    fn skip_inline_whitespace(&mut self) -> Result<()> {
        self.reader.get_whitespace(None, " \t\x0c\r\n");
        Ok(())
    }

    /// Consumes inline (non-newline) whitespace, returning it.
    pub fn get_whitespace(&mut self) -> String {
        self.reader.get_whitespace(None, " \t\x0c").to_string()
    }

    /// A single undotted identifier (`name`), no leading `$`.
    pub fn get_identifier(&mut self) -> Result<String> {
        let start = self.reader.pos();
        if !self.match_ident_start() {
            return Err(self.fail_lexical(start, "expected an identifier"));
        }
        self.consume_ident()?;
        Ok(self.reader.src()[start as usize..self.reader.pos() as usize].to_string())
    }

    pub fn match_directive_start(&self, settings: &Settings) -> bool {
        self.reader.startswith(&settings.directive_start_token, None)
    }

    pub fn get_directive_start_token(&mut self, settings: &Settings) -> Result<()> {
        self.reader.advance(settings.directive_start_token.len() as u32)
    }

    pub fn match_directive_end_token(&self, settings: &Settings) -> bool {
        self.reader.startswith(&settings.directive_end_token, None)
    }

    pub fn get_directive_end_token(&mut self, settings: &Settings) -> Result<()> {
        self.reader.advance(settings.directive_end_token.len() as u32)
    }

    /// Peeks past the directive start token for a recognized directive
    /// name (or `@` for decorators), without consuming anything.
    pub fn match_directive(&self, settings: &Settings) -> Option<String> {
        if !self.match_directive_start(settings) {
            return None;
        }
        let after_token = self.reader.pos() + settings.directive_start_token.len() as u32;
        if self.reader.peek_at(settings.directive_start_token.len() as i64).ok() == Some('@') {
            return Some("@".to_string());
        }
        if self.reader.startswith("compiler-settings", Some(after_token)) {
            return Some("compiler-settings".to_string());
        }
        let mut end = after_token;
        let src = self.reader.src();
        while (end as usize) < src.len() {
            let c = src[end as usize..].chars().next().unwrap();
            if tables::IDENT_CONT(c) {
                end += c.len_utf8() as u32;
            } else {
                break;
            }
        }
        if end == after_token {
            return None;
        }
        let name = &src[after_token as usize..end as usize];
        if tables::CUSTOM_DIRECTIVES.contains(&name)
            || tables::SIMPLE_INDENTING_DIRECTIVES.contains(&name)
            || tables::SIMPLE_EXPR_DIRECTIVES.contains(&name)
            || settings.macro_directives.contains_key(name)
        {
            Some(name.to_string())
        } else {
            None
        }
    }

    /// True when the character right after a `:` (if any) on the current
    /// line holds real content — a short-form `#if x: body#` directive
    /// rather than the ordinary multi-line form.
    pub fn match_colon_for_single_line_short_form(&self) -> Result<bool> {
        if self.reader.at_end() || self.reader.peek()? != ':' {
            return Ok(false);
        }
        let eol = self.reader.find_eol(false);
        let after_colon = self.reader.pos() + 1;
        if after_colon >= eol {
            return Ok(false);
        }
        let rest = &self.reader.src()[after_colon as usize..eol as usize];
        Ok(!rest.trim().is_empty())
    }

    /// Parses the comma-separated `keywords` list in `#compiler-settings
    /// keyword1, keyword2`.
    pub fn get_target_vars_list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        loop {
            if self.reader.at_end() {
                break;
            }
            let c = self.reader.peek()?;
            if c == ' ' || c == '\t' || c == '\x0c' {
                self.reader.get_whitespace(None, " \t\x0c");
            } else if c == '\r' || c == '\n' {
                break;
            } else if c == ',' {
                self.reader.advance(1)?;
            } else if self.match_ident_start() {
                names.push(self.get_dotted_name()?);
            } else {
                break;
            }
        }
        Ok(names)
    }

    /// One of the Python assignment operators (`=`, `+=`, `-=`, …).
    pub fn get_assignment_operator(&mut self) -> Result<String> {
        const ASSIGN_OPS: &[&str] = &[
            "**=", ">>=", "<<=", "+=", "-=", "*=", "/=", "^=", "%=", "&=", "|=", "=",
        ];
        for op in ASSIGN_OPS {
            if self.reader.startswith(op, None) {
                self.reader.advance(op.len() as u32)?;
                return Ok(op.to_string());
            }
        }
        Err(self.fail_lexical(self.reader.pos(), "expected an assignment operator"))
    }

    /// Like `get_expression`, but also stops at a bare `:` seen at bracket
    /// depth 0 (brackets and strings are already consumed atomically by
    /// `scan_enclosed`/`get_string_literal`, so any `:` reaching this loop
    /// is a top-level one). Used by directives whose expression is
    /// terminated by the directive's own trailing colon (`#if`, `#call`,
    /// `#filter`, and the short-form detection shared by `#for`/`#while`/
    /// `#try`).
    pub fn get_expression_to_colon(
        &mut self,
        settings: &Settings,
        stop_words: &[&str],
    ) -> Result<(String, Option<String>)> {
        let mut out = String::new();
        let mut last_word_was_for = false;

        loop {
            if self.reader.at_end() || matches!(self.reader.peek()?, '\r' | '\n') {
                return Ok((out, None));
            }
            let c = self.reader.peek()?;

            if c == ':' {
                return Ok((out, Some(":".to_string())));
            }
            if c == '\'' || c == '"' {
                out.push_str(&self.get_string_literal()?);
                continue;
            }
            if tables::closing_delimiter(c).is_some() {
                out.push_str(&self.scan_enclosed(settings)?);
                continue;
            }
            if self.match_cheetah_var_start(settings)
                && self.reader.peek_at(1).map(tables::IDENT_START).unwrap_or(false)
            {
                out.push_str(&self.get_cheetah_var(settings, false)?);
                continue;
            }
            if tables::IDENT_START(c) {
                let word_start = self.reader.pos();
                let word = self.get_dotted_name_single_segment()?;
                if word == "for" {
                    last_word_was_for = true;
                } else if word == tables::COMPREHENSION_CONTINUATION && last_word_was_for {
                    last_word_was_for = false;
                } else if stop_words.contains(&word.as_str()) {
                    self.reader.set_pos(word_start)?;
                    return Ok((out, Some(word)));
                } else {
                    last_word_was_for = false;
                }
                out.push_str(&word);
                continue;
            }

            out.push(self.reader.getc()?);
        }
    }

    /// Scans the left-hand side of a `#set` directive up to (but not
    /// including) the first top-level assignment operator, rewriting
    /// `$vars` in their plain (non-NameMapper) form, matching the
    /// original's `useNameMapper=False` for this scan.
    pub fn get_expression_to_assignment(&mut self, settings: &Settings) -> Result<String> {
        // Longest-match-first, and distinct from the compound `*=`/`==`-style
        // operators so a bare `=` never fires inside `==`.
        const COMPOUND_ASSIGN_OPS: &[&str] = &[
            "**=", ">>=", "<<=", "+=", "-=", "*=", "/=", "^=", "%=", "&=", "|=",
        ];
        let mut out = String::new();

        loop {
            if self.reader.at_end() || matches!(self.reader.peek()?, '\r' | '\n') {
                return Ok(out);
            }
            let c = self.reader.peek()?;

            if COMPOUND_ASSIGN_OPS.iter().any(|op| self.reader.startswith(op, None)) {
                return Ok(out);
            }
            if c == '=' && self.reader.peek_at(1).ok() != Some('=') {
                return Ok(out);
            }
            if c == '\'' || c == '"' {
                out.push_str(&self.get_string_literal()?);
                continue;
            }
            if tables::closing_delimiter(c).is_some() {
                out.push_str(&self.plain_scan_enclosed()?);
                continue;
            }
            if self.match_cheetah_var_start(settings)
                && self.reader.peek_at(1).map(tables::IDENT_START).unwrap_or(false)
            {
                out.push_str(&self.get_cheetah_var(settings, true)?);
                continue;
            }
            out.push(self.reader.getc()?);
        }
    }

    /// Scans an expression, returning the alternating list of text chunks
    /// and stop words (unlike `get_expression`, which concatenates them).
    pub fn get_expression_parts(&mut self, settings: &Settings, stop_words: &[&str]) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        loop {
            let (text, stop) = self.get_expression(settings, stop_words)?;
            parts.push(text);
            match stop {
                Some(word) => {
                    self.consume_ident()?;
                    parts.push(word);
                }
                None => break,
            }
        }
        Ok(parts)
    }

    /// Like `get_expression_parts`, but used where the whole scan is also
    /// terminated by a top-level `:` (the `#if cond then x else y:` ternary
    /// form needs to see `then`/`else` as parts while still stopping dead
    /// at the directive's own colon). The colon itself is left unconsumed.
    pub fn get_expression_parts_to_colon(&mut self, settings: &Settings, stop_words: &[&str]) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        loop {
            let (text, stop) = self.get_expression_to_colon(settings, stop_words)?;
            parts.push(text);
            match stop.as_deref() {
                Some(":") | None => break,
                Some(_) => {
                    let word = stop.unwrap();
                    self.consume_ident()?;
                    parts.push(word);
                }
            }
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_reader::SourceReader;

    fn lexer(src: &'static str) -> Lexer<'static> {
        Lexer::new(SourceReader::new(src, None))
    }

    #[test]
    fn get_dotted_name_reads_segments() {
        let mut l = lexer("foo.bar.baz rest");
        assert_eq!(l.get_dotted_name().unwrap(), "foo.bar.baz");
    }

    #[test]
    fn name_chunks_split_on_call_and_index() {
        let settings = Settings::default();
        let mut l = lexer("a.b.c[1].d().x.y.z");
        let chunks = l.get_cheetah_var_name_chunks(&settings).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].name, "a.b.c");
        assert_eq!(chunks[0].tail, "[1]");
        assert_eq!(chunks[1].name, "d");
        assert!(!chunks[1].may_autocall);
        assert_eq!(chunks[2].name, "x.y.z");
    }

    #[test]
    fn get_expression_rewrites_nested_var() {
        let settings = Settings::default();
        let mut l = lexer("1 + $x.y + 2");
        let (code, stop) = l.get_expression(&settings, &[]).unwrap();
        assert!(stop.is_none());
        assert_eq!(code, "1 + VFFSL(SL, \"x.y\", False, True) + 2");
    }

    #[test]
    fn get_expression_stops_before_stop_word_at_depth_zero() {
        let settings = Settings::default();
        let mut l = lexer("x then y else z");
        let (code, stop) = l.get_expression(&settings, &["then", "else"]).unwrap();
        assert_eq!(code, "x ");
        assert_eq!(stop.as_deref(), Some("then"));
    }

    #[test]
    fn comprehension_in_is_not_a_stop_word() {
        let settings = Settings::default();
        let mut l = lexer("x for x in y");
        let (code, stop) = l.get_expression(&settings, &["in"]).unwrap();
        assert_eq!(code, "x for x in y");
        assert!(stop.is_none());
    }

    #[test]
    fn get_def_arg_list_parses_defaults_and_varargs() {
        let mut l = lexer("(a, b=1, *args, **kwargs)");
        let list = l.get_def_arg_list().unwrap();
        assert_eq!(list.names, vec!["a", "b", "*args", "**kwargs"]);
        assert_eq!(list.defaults[1].as_deref(), Some("1"));
        assert_eq!(list.defaults[0], None);
    }

    #[test]
    fn get_call_arg_string_rewrites_vars_inside() {
        let settings = Settings::default();
        let mut l = lexer("($x, 1)");
        let s = l.get_call_arg_string(&settings).unwrap();
        assert_eq!(s, "(VFFSL(SL, \"x\", False, True), 1)");
    }

    #[test]
    fn string_literals_are_not_rewritten() {
        let settings = Settings::default();
        let mut l = lexer("('$not_a_var')");
        let s = l.get_call_arg_string(&settings).unwrap();
        assert_eq!(s, "('$not_a_var')");
    }

    #[test]
    fn keyword_arg_name_is_not_name_mapper_rewritten() {
        let settings = Settings::default();
        let mut l = lexer("($bar=$baz)");
        let s = l.get_call_arg_string(&settings).unwrap();
        assert_eq!(s, "(bar=VFFSL(SL, \"baz\", False, True))");
    }

    #[test]
    fn double_equals_after_a_var_is_not_mistaken_for_a_keyword_arg() {
        let settings = Settings::default();
        let mut l = lexer("($bar==$baz)");
        let s = l.get_call_arg_string(&settings).unwrap();
        assert_eq!(
            s,
            "(VFFSL(SL, \"bar\", False, True)==VFFSL(SL, \"baz\", False, True))"
        );
    }
}
