//! Drives the [`Lexer`] through a directive state machine, feeding the
//! codegen builders as it goes.
//!
//! Ported from `Parser`/`_LowLevelParser` in `Cheetah/Parser.py`. The
//! original interleaves low-level character matching (`_LowLevelParser`)
//! with directive dispatch (`Parser`) in one class hierarchy; this port
//! keeps the low-level scanning in [`Lexer`] and the directive state
//! machine here, but preserves the same method-by-method structure so the
//! two stay easy to compare against the original.

mod directives;

use crate::codegen::class_builder::ClassBuilder;
use crate::codegen::module_builder::ModuleBuilder;
use crate::error::{CompileError, Result};
use crate::lexer::Lexer;
use crate::settings::Settings;
use crate::source_reader::SourceReader;
use crate::tables;

/// Drives one template source through to a finished module definition.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    settings: Settings,
    module: ModuleBuilder,
    class: ClassBuilder,
    open_directives: Vec<String>,
    /// Single-slot save of `use_search_list`, restored when a nested
    /// `#def` closure closes. Not a stack: this mirrors
    /// `_useSearchList_orig` in the original, which has the same
    /// latent limitation for doubly-nested closures.
    saved_use_search_list: Option<bool>,
}

impl<'src> Parser<'src> {
    pub fn new(src: &'src str, filename: Option<String>, main_class_name: &str, runtime_module: &str, settings: Settings) -> Self {
        let lexer = Lexer::new(SourceReader::new(src, filename.clone()));
        let mut module = ModuleBuilder::new(main_class_name, runtime_module);
        module.set_source_path(filename);
        let mut class = ClassBuilder::new(main_class_name, "Template", &settings);
        let main_method_name = settings.main_method_name.clone();
        class.start_method_def(&settings, main_method_name, &[]);
        Self {
            lexer,
            settings,
            module,
            class,
            open_directives: Vec::new(),
            saved_use_search_list: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn fail_syntax(&self, start: u32, detail: impl Into<String>) -> CompileError {
        CompileError::InvalidSyntax {
            span: self.lexer.reader.span_to_here(start),
            detail: detail.into(),
        }
    }

    fn fail_mismatched_end(&self, start: u32, expected: impl Into<String>, found: impl Into<String>) -> CompileError {
        CompileError::MismatchedEnd {
            span: self.lexer.reader.span_to_here(start),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Drains the whole source. The top-level entry point.
    pub fn parse(&mut self) -> Result<()> {
        self.parse_loop()?;
        self.assert_empty_open_directives_stack()?;
        Ok(())
    }

    /// Like `parse()`, but stops at `end_pos` and leaves the open-directive
    /// stack unchecked — used for short-form directive bodies and macro
    /// re-parses, mirroring `Parser.parse(breakPoint=..., assertEmptyStack=False)`.
    fn parse_until(&mut self, end_pos: u32) -> Result<()> {
        let orig_break_point = self.lexer.reader.break_point();
        self.lexer.reader.set_break_point(end_pos)?;
        let result = self.parse_loop();
        self.lexer.reader.set_break_point(orig_break_point)?;
        result
    }

    fn parse_loop(&mut self) -> Result<()> {
        while !self.lexer.reader.at_end() {
            if !self.preceded_by_escape() && self.lexer.reader.startswith(&self.settings.comment_start_token, None) {
                self.eat_comment()?;
            } else if !self.preceded_by_escape() && self.match_placeholder_start() {
                self.eat_placeholder()?;
            } else if !self.preceded_by_escape() && self.looks_like_directive_attempt() {
                let start = self.lexer.reader.pos();
                match self.lexer.match_directive(&self.settings) {
                    Some(_) => self.eat_directive()?,
                    None => {
                        return Err(CompileError::UnknownDirective {
                            span: self.lexer.reader.span_to_here(start),
                            name: self.guess_directive_name(start),
                        });
                    }
                }
            } else if !self.preceded_by_escape() && self.lexer.reader.startswith(&self.settings.psp_start_token, None) {
                self.eat_psp()?;
            } else {
                self.eat_plain_text()?;
            }
        }
        Ok(())
    }

    /// True at a directive-start-token (`#`) whose following character
    /// could plausibly begin a directive name or a decorator (`@`) — the
    /// distinction Python's `directiveStartTokenRE` draws with its
    /// `(?=[A-Za-z_@])` lookahead, used to tell a genuine but unrecognized
    /// directive from a lone `#` that is just literal text.
    fn looks_like_directive_attempt(&self) -> bool {
        if !self.lexer.reader.startswith(&self.settings.directive_start_token, None) {
            return false;
        }
        let offset = self.settings.directive_start_token.len() as i64;
        matches!(
            self.lexer.reader.peek_at(offset),
            Ok(c) if tables::IDENT_START(c) || c == '@'
        )
    }

    fn guess_directive_name(&self, start: u32) -> String {
        let after = (start + self.settings.directive_start_token.len() as u32) as usize;
        let src = self.lexer.reader.src();
        let mut end = after;
        while end < src.len() {
            let c = src[end..].chars().next().unwrap();
            if tables::IDENT_CONT(c) || c == '@' {
                end += c.len_utf8();
            } else {
                break;
            }
        }
        src[after..end].to_string()
    }

    /// Finalizes the main method, class, and module, returning the
    /// generated source text.
    pub fn finish(mut self) -> String {
        self.class.close_def();
        let class_name = self.class.class_name().to_string();
        self.module.finish_class(class_name, self.class);
        self.module.wrap_module_def(&self.settings)
    }

    fn preceded_by_escape(&self) -> bool {
        let pos = self.lexer.reader.pos();
        if pos == 0 {
            return false;
        }
        self.lexer.reader.src().as_bytes().get(pos as usize - 1) == Some(&b'\\')
    }

    fn match_placeholder_start(&self) -> bool {
        if !self.lexer.match_cheetah_var_start(&self.settings) {
            return false;
        }
        matches!(
            self.lexer.reader.peek_at(1),
            Ok(c) if tables::IDENT_START(c) || matches!(c, '(' | '{' | '[')
        )
    }

    // -- non-directive eat methods -----------------------------------

    fn eat_plain_text(&mut self) -> Result<()> {
        let start = self.lexer.reader.pos();
        while !self.lexer.reader.at_end() {
            if !self.preceded_by_escape()
                && (self.lexer.reader.startswith(&self.settings.comment_start_token, None)
                    || self.match_placeholder_start()
                    || self.looks_like_directive_attempt()
                    || self.lexer.reader.startswith(&self.settings.psp_start_token, None))
            {
                break;
            }
            self.lexer.reader.getc()?;
        }
        let text = self.lexer.reader.src()[start as usize..self.lexer.reader.pos() as usize].to_string();
        let text = text.replace(&format!("\\{}", self.settings.cheetah_var_start_token), &self.settings.cheetah_var_start_token);
        let text = text.replace(&format!("\\{}", self.settings.directive_start_token), &self.settings.directive_start_token);
        self.class.current_method().add_str_const(&text);
        Ok(())
    }

    fn eat_comment(&mut self) -> Result<()> {
        let line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        if line_clear {
            self.class.current_method().handle_ws_before_directive();
        }
        self.lexer.reader.advance(self.settings.comment_start_token.len() as u32)?;
        let comment = self.lexer.reader.read_to_eol(None, line_clear)?.to_string();
        // A bar comment is one whose entire remaining text (after the EOL,
        // if any, is stripped) is made up of '#' characters, e.g. "##---".
        // Only that shape is dropped; "##real comment" is kept as-is.
        let without_eol = comment.strip_suffix("\r\n").or_else(|| comment.strip_suffix('\n')).unwrap_or(&comment);
        let is_bar_comment = !without_eol.is_empty() && without_eol.chars().all(|c| c == '#');
        if !is_bar_comment {
            let prefix = " ".repeat(self.settings.comment_offset as usize);
            for line in comment.lines() {
                self.class.current_method().add_chunk(&format!("#{prefix}{line}"));
            }
        }
        Ok(())
    }

    fn eat_placeholder(&mut self) -> Result<()> {
        let start = self.lexer.reader.pos();
        let (line, col) = self.lexer.reader.row_col(start);
        self.lexer.reader.advance(self.settings.cheetah_var_start_token.len() as u32)?;

        let enclosure_pos = self.lexer.reader.pos();
        let open = match self.lexer.reader.peek() {
            Ok(c @ ('(' | '{' | '[')) => Some(c),
            _ => None,
        };

        let expr = if let Some(open) = open {
            let close = tables::closing_delimiter(open)
                .ok_or_else(|| self.fail_syntax(start, "expected an opening delimiter"))?;
            self.lexer.reader.advance(1)?;
            self.lexer.get_whitespace();
            if self.lexer.match_ident_start() {
                let chunks = self.lexer.get_cheetah_var_name_chunks(&self.settings)?;
                let mut expr = crate::namemapper::gen_cheetah_var(&self.settings, &chunks, false);
                expr.push_str(&self.lexer.get_whitespace());
                if self.lexer.reader.peek().ok() == Some(close) {
                    self.lexer.reader.advance(1)?;
                } else {
                    return Err(self.fail_syntax(start, format!("expected closing '{close}'")));
                }
                expr
            } else {
                // An arbitrary expression body: rewind to include the
                // opening delimiter and let `scan_enclosed` track nested
                // brackets/strings/$vars down to the matching close, then
                // strip the outer pair back off.
                self.lexer.reader.set_pos(enclosure_pos)?;
                let mut scanned = self.lexer.scan_enclosed(&self.settings)?;
                scanned.pop();
                scanned.remove(0);
                scanned
            }
        } else {
            let chunks = self.lexer.get_cheetah_var_name_chunks(&self.settings)?;
            crate::namemapper::gen_cheetah_var(&self.settings, &chunks, false)
        };

        let raw = self.lexer.reader.src()[start as usize..self.lexer.reader.pos() as usize].to_string();
        self.class.current_method().add_placeholder(&self.settings, &expr, "", &raw, line, col);
        Ok(())
    }

    fn eat_psp(&mut self) -> Result<()> {
        self.lexer.reader.advance(self.settings.psp_start_token.len() as u32)?;
        let start = self.lexer.reader.pos();
        while !self.lexer.reader.at_end() && !self.lexer.reader.startswith(&self.settings.psp_end_token, None) {
            self.lexer.reader.getc()?;
        }
        let text = self.lexer.reader.src()[start as usize..self.lexer.reader.pos() as usize]
            .trim()
            .to_string();
        self.class.current_method().add_chunk(&text);
        if self.lexer.reader.startswith(&self.settings.psp_end_token, None) {
            self.lexer.reader.advance(self.settings.psp_end_token.len() as u32)?;
        }
        Ok(())
    }

    // -- generic directive-tag plumbing -------------------------------

    /// Consumes whatever sits between the end of a directive's expression
    /// and the true end of its tag: an optional trailing comment-vs-real-
    /// directive disambiguation, the directive end token, and (when the
    /// directive occupied a whole line by itself) the line's own
    /// terminator plus the leading whitespace buffered for the *next*
    /// line. Ported from `_eatRestOfDirectiveTag`.
    fn eat_rest_of_directive_tag(&mut self, is_line_clear: bool, end_of_first_line: u32) -> Result<()> {
        let mut found_comment = false;
        if self.lexer.reader.startswith(&self.settings.comment_start_token, None) {
            let pos = self.lexer.reader.pos();
            self.lexer.reader.advance(1)?;
            let matched = self.lexer.match_directive(&self.settings);
            if matched.is_none() {
                self.lexer.reader.set_pos(pos)?;
                found_comment = true;
                self.eat_comment()?;
            } else {
                self.lexer.reader.set_pos(pos)?;
            }
        }

        if !found_comment && self.lexer.match_directive_end_token(&self.settings) {
            self.lexer.get_directive_end_token(&self.settings)?;
        } else if is_line_clear && !self.lexer.reader.at_end() && matches!(self.lexer.reader.peek()?, '\r' | '\n') {
            self.lexer.reader.read_to_eol(None, true)?;
        }

        if is_line_clear && (self.lexer.reader.at_end() || self.lexer.reader.pos() > end_of_first_line) {
            self.class.current_method().handle_ws_before_directive();
        }
        Ok(())
    }

    /// Slurps raw text up to (but not past) a matching `#end <directive_name>`,
    /// applying the same line-clear gobbling rule as `_eatRestOfDirectiveTag`.
    /// Used by `#compiler-settings` (and would be used by a block-form
    /// macro call body). Ported from `_eatToThisEndDirective`.
    fn eat_to_this_end_directive(&mut self, directive_name: &str) -> Result<String> {
        let directive_char = self
            .settings
            .directive_start_token
            .chars()
            .next()
            .unwrap_or('#');
        let start = self.lexer.reader.pos();
        let mut final_pos = start;
        let mut end_raw_pos = start;
        let mut is_line_clear = false;

        while !self.lexer.reader.at_end() {
            if self.lexer.reader.peek()? == directive_char {
                if self.lexer.match_directive(&self.settings).as_deref() == Some("end") {
                    end_raw_pos = self.lexer.reader.pos();
                    self.lexer.get_directive_start_token(&self.settings)?;
                    self.lexer.reader.advance(3)?; // "end"
                    self.lexer.get_whitespace();
                    if self.lexer.reader.startswith(directive_name, None) {
                        if self.lexer.reader.is_line_clear_to_pos(Some(end_raw_pos))? {
                            is_line_clear = true;
                            end_raw_pos = self.lexer.reader.find_bol(Some(end_raw_pos));
                        }
                        self.lexer.reader.advance(directive_name.len() as u32)?;
                        self.lexer.get_whitespace();
                        final_pos = self.lexer.reader.pos();
                        break;
                    }
                }
            }
            self.lexer.reader.getc()?;
            final_pos = self.lexer.reader.pos();
            end_raw_pos = final_pos;
        }

        let text = self.lexer.reader.read_to(end_raw_pos, Some(start))?.to_string();
        self.lexer.reader.set_pos(final_pos)?;

        let end_of_first_line = self.lexer.reader.find_eol(false);
        if self.lexer.match_directive_end_token(&self.settings) {
            self.lexer.get_directive_end_token(&self.settings)?;
        } else if is_line_clear && !self.lexer.reader.at_end() && matches!(self.lexer.reader.peek()?, '\r' | '\n') {
            self.lexer.reader.read_to_eol(None, true)?;
        }
        if is_line_clear && self.lexer.reader.pos() > end_of_first_line {
            self.class.current_method().handle_ws_before_directive();
        }
        Ok(text)
    }

    fn push_open_directive(&mut self, name: &str) {
        debug_assert!(tables::CLOSEABLE_DIRECTIVES.contains(&name));
        self.open_directives.push(name.to_string());
    }

    fn pop_open_directive(&mut self, name: &str) -> Result<()> {
        let start = self.lexer.reader.pos();
        match self.open_directives.last() {
            None => Err(self.fail_mismatched_end(start, "<nothing open>", name)),
            Some(top) if top == name => {
                self.open_directives.pop();
                Ok(())
            }
            Some(top) => Err(self.fail_mismatched_end(start, top.clone(), name)),
        }
    }

    fn assert_empty_open_directives_stack(&self) -> Result<()> {
        if let Some(top) = self.open_directives.last() {
            return Err(CompileError::MismatchedEnd {
                span: self.lexer.reader.span_to_here(self.lexer.reader.pos()),
                expected: format!("end {top}"),
                found: "<end of source>".to_string(),
            });
        }
        Ok(())
    }
}
