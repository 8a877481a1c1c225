//! The directive dispatcher and every specific directive handler.
//!
//! Ported from the `eat*`/`add*` method pairs on `Parser`/`Compiler` in
//! `Cheetah/Parser.py` and `Cheetah/Compiler.py`. Each `eat_*` method here
//! mirrors one `eat*` method from the original, consuming source text and
//! driving the matching `ClassBuilder`/`MethodBuilder`/`ModuleBuilder` call.

use crate::error::{CompileError, Result};
use crate::lexer::Lexer;
use crate::namemapper;
use crate::source_reader::SourceReader;
use crate::tables;

use super::Parser;

const END_DIRECTIVE_NAMES: &[&str] = &["def", "block", "call", "filter", "while", "for", "if", "try"];

impl<'src> Parser<'src> {
    pub(super) fn eat_directive(&mut self) -> Result<()> {
        let start = self.lexer.reader.pos();
        let Some(name) = self.lexer.match_directive(&self.settings) else {
            return Err(CompileError::UnknownDirective {
                span: self.lexer.reader.span_to_here(start),
                name: self.guess_directive_name(start),
            });
        };
        let (row, col) = self.lexer.reader.row_col(start);
        tracing::trace!(directive = %name, row, col, "dispatching directive");

        match name.as_str() {
            "extends" => self.eat_extends(),
            "implements" => self.eat_implements(),
            "super" => self.eat_super(),
            "slurp" => self.eat_slurp(),
            "filter" => self.eat_filter(),
            "call" => self.eat_call(),
            "attr" => self.eat_attr(),
            "def" => self.eat_def_or_block("def").map(|_| ()),
            "block" => self.eat_def_or_block("block").map(|_| ()),
            "@" => self.eat_decorator(),
            "set" => self.eat_set(),
            "if" => self.eat_if(),
            "compiler-settings" => self.eat_compiler_settings(),
            "encoding" => self.eat_encoding(),
            "end" => self.eat_end_directive(),
            other if tables::SIMPLE_INDENTING_DIRECTIVES.contains(&other) => {
                self.eat_simple_indenting_directive(other)
            }
            other if tables::SIMPLE_EXPR_DIRECTIVES.contains(&other) => self.eat_simple_expr_directive(other),
            other => self.eat_macro_call(&other.to_string()),
        }
    }

    // -- simple indenting group (for/while/try/else/elif/except/finally) --

    fn eat_simple_indenting_directive(&mut self, directive_name: &str) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.get_whitespace();

        let (expr, _) = self.lexer.get_expression_to_colon(&self.settings, &[])?;
        let expr = expr.trim().to_string();

        if self.lexer.match_colon_for_single_line_short_form()? {
            self.lexer.reader.advance(1)?;
            let dedent_group = matches!(directive_name, "else" | "elif" | "except" | "finally");
            self.apply_indenting_callback(directive_name, &expr, dedent_group.then_some(false));
            self.lexer.reader.get_whitespace(Some(1), " \t\x0c");
            let end = self.lexer.reader.find_eol(true);
            self.parse_until(end)?;
            self.class.current_method().commit_str_const();
            self.class.current_method().dedent();
        } else {
            if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == ':' {
                self.lexer.reader.advance(1)?;
            }
            self.lexer.get_whitespace();
            self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
            if tables::CLOSEABLE_DIRECTIVES.contains(&directive_name) {
                self.push_open_directive(directive_name);
            }
            self.apply_indenting_callback(directive_name, &expr, None);
        }
        Ok(())
    }

    fn apply_indenting_callback(&mut self, directive_name: &str, expr: &str, dedent_override: Option<bool>) {
        match directive_name {
            "for" | "while" | "try" => self.class.current_method().add_indenting_directive(expr),
            "else" | "elif" => {
                let dedent = dedent_override.unwrap_or(true);
                self.class.current_method().add_else(expr, dedent);
            }
            "except" | "finally" => {
                let dedent = dedent_override.unwrap_or(true);
                self.class.current_method().add_re_indenting_directive(expr, dedent);
            }
            _ => unreachable!("not a simple indenting directive: {directive_name}"),
        }
    }

    // -- simple expr group ---------------------------------------------

    fn eat_simple_expr_directive(&mut self, directive_name: &str) -> Result<()> {
        let include_name = directive_name != "silent";
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        if !include_name {
            self.lexer.reader.advance(directive_name.len() as u32)?;
        }
        let (expr, _) = self.lexer.get_expression(&self.settings, &[])?;
        let expr = expr.trim().to_string();

        let first_word = expr.split_whitespace().next().unwrap_or("").to_string();
        if tables::CLOSEABLE_DIRECTIVES.contains(&first_word.as_str()) {
            self.push_open_directive(&first_word);
        }
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        match directive_name {
            "return" => self.class.current_method().add_return(&expr),
            "yield" => self.class.current_method().add_yield(&expr),
            "silent" => self.class.current_method().add_silent(&expr),
            "import" | "from" if self.settings.use_legacy_import_mode => {
                self.module.add_import_statement(&self.settings, expr)
            }
            "import" | "from" => self.class.current_method().add_chunk(&expr),
            _ => self.class.current_method().add_chunk(&expr),
        }
        Ok(())
    }

    // -- one-off directives ----------------------------------------------

    fn eat_extends(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("extends".len() as u32)?;
        self.lexer.get_whitespace();
        let base_class_name = self.lexer.reader.read_to_eol(None, false)?.trim().to_string();
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        let subclass_main_name = self.settings.main_method_name_for_subclasses.clone();
        self.class.set_main_method_name(&subclass_main_name);

        let resolved = self.module.resolve_base_class(&self.settings, &base_class_name);
        self.class.set_base_class(resolved);
        Ok(())
    }

    fn eat_implements(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("implements".len() as u32)?;
        self.lexer.get_whitespace();
        let start = self.lexer.reader.pos();
        let method_name = self.lexer.get_identifier()?;
        if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == '(' {
            return Err(self.fail_syntax(start, "#implements does not take an argument list"));
        }
        let _ = self.lexer.get_expression(&self.settings, &[])?;
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
        self.class.set_main_method_name(&method_name);
        Ok(())
    }

    fn eat_super(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("super".len() as u32)?;
        self.lexer.get_whitespace();

        let mut args_pairs: Vec<(String, Option<String>)> = Vec::new();
        if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == '(' {
            let args = self.lexer.get_def_arg_list()?;
            args_pairs = args.names.into_iter().zip(args.defaults).collect();
            if args_pairs.first().map(|(n, _)| n == "self").unwrap_or(false) {
                args_pairs.remove(0);
            }
        }
        let _ = self.lexer.get_expression(&self.settings, &[])?;
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        let call_expr = self.class.add_super_call(&args_pairs);
        self.class.current_method().add_filtered_chunk(&self.settings, &call_expr, "", None);
        Ok(())
    }

    fn eat_set(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance(3)?; // "set"
        self.lexer.get_whitespace();

        #[derive(PartialEq)]
        enum Style {
            Local,
            Global,
            Module,
        }
        let mut style = Style::Local;
        if self.lexer.reader.startswith("global", None) {
            self.lexer.get_identifier()?;
            self.lexer.get_whitespace();
            style = Style::Global;
        } else if self.lexer.reader.startswith("module", None) {
            self.lexer.get_identifier()?;
            self.lexer.get_whitespace();
            style = Style::Module;
        }

        let lvalue = self.lexer.get_expression_to_assignment(&self.settings)?.trim().to_string();
        let op = self.lexer.get_assignment_operator()?;
        let (rvalue, _) = self.lexer.get_expression(&self.settings, &[])?;
        let rvalue = rvalue.trim().to_string();
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        match style {
            Style::Global => {
                let (primary, secondary) = split_global_set_lvalue(&lvalue);
                let new_lvalue = format!("self._CHEETAH__globalSetVars[\"{primary}\"]{secondary}");
                self.class.current_method().add_set(&format!("{new_lvalue} {op} {rvalue}"));
            }
            Style::Module => {
                self.module.add_module_global(format!("{lvalue} {op} {rvalue}"));
            }
            Style::Local => {
                self.class.current_method().add_set(&format!("{lvalue} {op} {rvalue}"));
            }
        }
        Ok(())
    }

    fn eat_slurp(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        if is_line_clear {
            self.class.current_method().handle_ws_before_directive();
        }
        self.class.current_method().commit_str_const();
        self.lexer.reader.read_to_eol(None, true)?;
        Ok(())
    }

    fn eat_call(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("call".len() as u32)?;

        let use_autocalling_orig = self.settings.use_autocalling;
        self.settings.use_autocalling = false;
        self.lexer.get_whitespace();
        let function_name = if self.lexer.match_cheetah_var_start(&self.settings) {
            self.lexer.get_cheetah_var(&self.settings, false)?
        } else {
            let chunks = self.lexer.get_cheetah_var_name_chunks(&self.settings)?;
            namemapper::gen_cheetah_var(&self.settings, &chunks, true)
        };
        self.settings.use_autocalling = use_autocalling_orig;
        self.lexer.get_whitespace();

        let (args, _) = self.lexer.get_expression_to_colon(&self.settings, &[])?;
        let args = args.trim().to_string();

        if self.lexer.match_colon_for_single_line_short_form()? {
            self.lexer.reader.advance(1)?;
            self.class.current_method().start_call_region(&self.settings, &function_name, &args);
            self.lexer.reader.get_whitespace(Some(1), " \t\x0c");
            let end = self.lexer.reader.find_eol(false);
            self.parse_until(end)?;
            self.class.current_method().end_call_region(&self.settings);
        } else {
            if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == ':' {
                self.lexer.reader.advance(1)?;
            }
            self.lexer.get_whitespace();
            self.push_open_directive("call");
            self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
            self.class.current_method().start_call_region(&self.settings, &function_name, &args);
        }
        Ok(())
    }

    fn eat_filter(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("filter".len() as u32)?;
        self.lexer.get_whitespace();

        let (the_filter, is_klass) = if self.lexer.match_cheetah_var_start(&self.settings) {
            let (expr, _) = self.lexer.get_expression_to_colon(&self.settings, &[])?;
            (expr, true)
        } else {
            let ident = self.lexer.get_identifier()?;
            self.lexer.get_whitespace();
            (ident, false)
        };

        if self.lexer.match_colon_for_single_line_short_form()? {
            self.lexer.reader.advance(1)?;
            self.lexer.reader.get_whitespace(Some(1), " \t\x0c");
            self.class.current_method().set_filter(&the_filter, is_klass);
            let end = self.lexer.reader.find_eol(false);
            self.parse_until(end)?;
            self.class.current_method().close_filter_block();
        } else {
            if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == ':' {
                self.lexer.reader.advance(1)?;
            }
            self.lexer.get_whitespace();
            self.push_open_directive("filter");
            self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
            self.class.current_method().set_filter(&the_filter, is_klass);
        }
        Ok(())
    }

    fn eat_if(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;

        let parts = self.lexer.get_expression_parts_to_colon(&self.settings, &["then", "else"])?;
        let has_then = parts.iter().any(|p| p == "then");
        let has_else = parts.iter().any(|p| p == "else");

        if has_then && has_else {
            let mut condition = String::new();
            let mut true_expr = String::new();
            let mut false_expr = String::new();
            let mut region = 0u8;
            for part in &parts {
                match part.as_str() {
                    "then" => region = 1,
                    "else" => region = 2,
                    _ => match region {
                        0 => condition.push_str(part),
                        1 => true_expr.push_str(part),
                        _ => false_expr.push_str(part),
                    },
                }
            }
            self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
            self.class
                .current_method()
                .add_ternary_expr(&self.settings, condition.trim(), true_expr.trim(), false_expr.trim());
            return Ok(());
        }

        let expr = parts.concat().trim().to_string();
        if self.lexer.match_colon_for_single_line_short_form()? {
            self.lexer.reader.advance(1)?;
            self.class.current_method().add_if(&expr);
            self.lexer.reader.get_whitespace(Some(1), " \t\x0c");
            let end = self.lexer.reader.find_eol(true);
            self.parse_until(end)?;
            self.class.current_method().commit_str_const();
            self.class.current_method().dedent();
        } else {
            if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == ':' {
                self.lexer.reader.advance(1)?;
            }
            self.lexer.get_whitespace();
            self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
            self.push_open_directive("if");
            self.class.current_method().add_if(&expr);
        }
        Ok(())
    }

    fn eat_attr(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("attr".len() as u32)?;
        self.lexer.get_whitespace();
        if self.lexer.match_cheetah_var_start(&self.settings) {
            self.lexer.reader.advance(self.settings.cheetah_var_start_token.len() as u32)?;
        }
        let attrib_name = self.lexer.get_identifier()?;
        self.lexer.get_whitespace();
        self.lexer.get_assignment_operator()?;
        let (expr, _) = self.lexer.get_expression(&self.settings, &[])?;
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        let full_expr = format!("{attrib_name} ={expr}");
        self.class
            .add_attribute(full_expr)
            .map_err(|detail| self.fail_syntax(end_of_first_line, detail))?;
        Ok(())
    }

    fn eat_decorator(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        let (decorator_expr, _) = self.lexer.get_expression(&self.settings, &[])?;
        self.class.add_decorator(decorator_expr);
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        self.lexer.get_whitespace();
        let pos = self.lexer.reader.pos();
        match self.lexer.match_directive(&self.settings).as_deref() {
            Some("def") | Some("block") | Some("@") => self.eat_directive(),
            _ => Err(self.fail_syntax(pos, "a decorator must be followed by #def, #block, or another decorator")),
        }
    }

    fn eat_compiler_settings(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("compiler-settings".len() as u32)?;
        let _ = self.lexer.get_target_vars_list()?;
        let _ = self.lexer.get_expression(&self.settings, &[])?;
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        let body = self.eat_to_this_end_directive("compiler-settings")?;
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            self.settings
                .set_by_name(key.trim(), value.trim())
                .map_err(|detail| self.fail_syntax(self.lexer.reader.pos(), detail))?;
        }
        Ok(())
    }

    fn eat_encoding(&mut self) -> Result<()> {
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance("encoding".len() as u32)?;
        self.lexer.get_whitespace();
        let encoding = self.lexer.reader.read_to_eol(None, true)?.trim().to_string();
        self.module.set_module_encoding(encoding);
        Ok(())
    }

    // -- def / block -------------------------------------------------------

    fn eat_def_or_block(&mut self, directive_name: &str) -> Result<(String, String)> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        let start = self.lexer.reader.pos();
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance(directive_name.len() as u32)?;
        self.lexer.get_whitespace();
        if self.lexer.match_cheetah_var_start(&self.settings) {
            self.lexer.reader.advance(self.settings.cheetah_var_start_token.len() as u32)?;
        }
        let method_name = self.lexer.get_identifier()?;
        self.lexer.get_whitespace();

        let mut args_pairs: Vec<(String, Option<String>)> = Vec::new();
        if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == '(' {
            let args = self.lexer.get_def_arg_list()?;
            args_pairs = args.names.into_iter().zip(args.defaults).collect();
            if args_pairs.first().map(|(n, _)| n == "self").unwrap_or(false) {
                args_pairs.remove(0);
            }
        }

        if self.lexer.match_colon_for_single_line_short_form()? {
            let is_nested_def = self.settings.allow_nested_def_scopes && self.open_directives.iter().any(|d| d == "def");
            self.lexer.reader.advance(1)?;
            let full_signature = self.lexer.reader.src()[start as usize..end_of_first_line as usize].to_string();
            self.eat_single_line_def(directive_name, &method_name, &args_pairs, start, end_of_first_line)?;

            if directive_name == "block" {
                self.class.close_block();
            } else if !is_nested_def {
                self.class.close_def();
            } else {
                self.class.current_method().dedent();
            }
            self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
            Ok((method_name, full_signature))
        } else {
            if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == ':' {
                self.lexer.reader.advance(1)?;
            }
            self.push_open_directive(directive_name);
            self.eat_multi_line_def(directive_name, &method_name, &args_pairs, start, is_line_clear)?;
            let signature = self.lexer.reader.src()[start as usize..self.lexer.reader.pos() as usize].to_string();
            Ok((method_name, signature))
        }
    }

    fn eat_multi_line_def(
        &mut self,
        directive_name: &str,
        method_name: &str,
        args: &[(String, Option<String>)],
        start: u32,
        is_line_clear: bool,
    ) -> Result<()> {
        let _ = self.lexer.get_expression(&self.settings, &[])?;
        let signature = self.lexer.reader.src()[start as usize..self.lexer.reader.pos() as usize].to_string();
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        let signature = signature.lines().map(|l| l.trim()).collect::<Vec<_>>().join(" ");
        let (row, col) = self.lexer.reader.row_col(start);
        let parser_comment = format!("CHEETAH: generated from {signature} at line {row}, col {col}.");

        let is_nested_def = self.settings.allow_nested_def_scopes && self.open_directives.iter().filter(|d| d.as_str() == "def").count() > 1;

        if directive_name == "block" || (directive_name == "def" && !is_nested_def) {
            self.class.start_method_def(&self.settings, method_name, args);
        } else {
            self.saved_use_search_list = Some(self.settings.use_search_list);
            self.settings.use_search_list = false;
            self.class.current_method().add_closure(method_name, args, &parser_comment);
        }
        Ok(())
    }

    fn eat_single_line_def(
        &mut self,
        directive_name: &str,
        method_name: &str,
        args: &[(String, Option<String>)],
        start: u32,
        end_pos: u32,
    ) -> Result<()> {
        let full_signature = self.lexer.reader.src()[start as usize..end_pos as usize].to_string();
        let (row, col) = self.lexer.reader.row_col(start);
        let parser_comment = format!("Generated from {full_signature} at line {row}, col {col}.");
        let is_nested_def = self.settings.allow_nested_def_scopes && self.open_directives.iter().any(|d| d == "def");

        let saved_use_search_list = if directive_name == "def" && is_nested_def {
            let orig = self.settings.use_search_list;
            self.settings.use_search_list = false;
            Some(orig)
        } else {
            None
        };

        if directive_name == "block" || (directive_name == "def" && !is_nested_def) {
            self.class.start_method_def(&self.settings, method_name, args);
        } else {
            self.class.current_method().add_closure(method_name, args, &parser_comment);
        }

        self.lexer.reader.get_whitespace(Some(1), " \t\x0c");
        self.parse_until(end_pos)?;

        if let Some(orig) = saved_use_search_list {
            self.settings.use_search_list = orig;
        }
        Ok(())
    }

    fn handle_end_def(&mut self) -> Result<()> {
        let is_nested_def = self.settings.allow_nested_def_scopes && self.open_directives.iter().any(|d| d == "def");
        if !is_nested_def {
            self.class.close_def();
        } else {
            if let Some(orig) = self.saved_use_search_list.take() {
                self.settings.use_search_list = orig;
            }
            self.class.current_method().commit_str_const();
            self.class.current_method().dedent();
        }
        Ok(())
    }

    // -- #end --------------------------------------------------------------

    fn eat_end_directive(&mut self) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance(3)?; // "end"
        self.lexer.get_whitespace();

        let pos = self.lexer.reader.pos();
        let mut found: Option<&str> = None;
        for key in END_DIRECTIVE_NAMES {
            if self.lexer.reader.startswith(*key, Some(pos)) {
                found = Some(*key);
                break;
            }
        }
        let directive_name = found.ok_or_else(|| self.fail_syntax(pos, "invalid #end directive"))?;

        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.reader.advance(directive_name.len() as u32)?;
        let _ = self.lexer.get_expression(&self.settings, &[])?;
        self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;

        if tables::CLOSEABLE_DIRECTIVES.contains(&directive_name) {
            self.pop_open_directive(directive_name)?;
        }

        match directive_name {
            "def" => self.handle_end_def()?,
            "block" => self.class.close_block(),
            "call" => self.class.current_method().end_call_region(&self.settings),
            "filter" => self.class.current_method().close_filter_block(),
            "while" | "for" | "if" | "try" => {
                self.class.current_method().commit_str_const();
                self.class.current_method().dedent();
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    // -- macro calls ---------------------------------------------------------

    /// Expands a user-registered macro directive and recursively re-parses
    /// its generated text in place.
    ///
    /// The handler returns a freshly generated `String`, but `Parser` is
    /// generic over the borrowed lifetime of the original source. Rather
    /// than restructure the whole pipeline around owned source buffers for
    /// this one feature, the generated text is leaked for the remainder of
    /// the process — acceptable for a compiler that runs once per process
    /// and exits.
    fn eat_macro_call(&mut self, macro_name: &str) -> Result<()> {
        let is_line_clear = self.lexer.reader.is_line_clear_to_pos(None)?;
        let end_of_first_line = self.lexer.reader.find_eol(false);
        self.lexer.get_directive_start_token(&self.settings)?;
        self.lexer.reader.advance(macro_name.len() as u32)?;
        self.lexer.get_whitespace();

        let args = if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == '(' {
            let list = self.lexer.get_def_arg_list()?;
            list.names
                .into_iter()
                .zip(list.defaults)
                .map(|(n, d)| match d {
                    Some(v) => format!("{n}={v}"),
                    None => n,
                })
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            let (expr, _) = self.lexer.get_expression_to_colon(&self.settings, &[])?;
            expr.trim().to_string()
        };

        let body = if self.lexer.match_colon_for_single_line_short_form()? {
            self.lexer.reader.advance(1)?;
            self.lexer.reader.read_to_eol(None, false)?.to_string()
        } else {
            if !self.lexer.reader.at_end() && self.lexer.reader.peek()? == ':' {
                self.lexer.reader.advance(1)?;
            }
            self.lexer.get_whitespace();
            self.eat_rest_of_directive_tag(is_line_clear, end_of_first_line)?;
            self.eat_to_this_end_directive(macro_name)?
        };

        let handler = self
            .settings
            .macro_directives
            .get(macro_name)
            .cloned()
            .ok_or_else(|| self.fail_syntax(self.lexer.reader.pos(), format!("unknown macro directive '{macro_name}'")))?;
        let generated = handler(&args, &body);
        let generated: &'src str = Box::leak(generated.into_boxed_str());

        let filename = self.lexer.reader.filename().map(str::to_string);
        let sub_lexer = Lexer::new(SourceReader::new(generated, filename));
        let orig_lexer = std::mem::replace(&mut self.lexer, sub_lexer);
        let result = self.parse_loop();
        self.lexer = orig_lexer;
        result
    }
}

/// Splits a `#set global` lvalue into its `self._CHEETAH__globalSetVars`
/// key and the remaining attribute/index chain, per `Compiler.addSet`.
fn split_global_set_lvalue(lvalue: &str) -> (String, String) {
    let dot = lvalue.find('.').map(|i| i as i64).unwrap_or(-1);
    let bracket = lvalue.find('[').map(|i| i as i64).unwrap_or(-1);
    let split_pos = if dot > 0 && (bracket < 0 || dot < bracket) {
        dot
    } else {
        bracket
    };
    if split_pos > 0 {
        let sp = split_pos as usize;
        (lvalue[..sp].to_string(), lvalue[sp..].to_string())
    } else {
        (lvalue.to_string(), String::new())
    }
}
