//! Accumulates the body of one generated method.
//!
//! Ported from `MethodCompiler`/`AutoMethodCompiler` in
//! `Cheetah/Compiler.py`. Plain-text runs are buffered separately from
//! code chunks so consecutive literal text can be committed as one
//! triple-quoted `write(...)` call instead of many small ones.

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Instance,
    ClassMethod,
    StaticMethod,
}

#[derive(Debug, Clone)]
struct CallRegion {
    id: String,
    function_name: String,
    args: String,
}

#[derive(Debug, Clone)]
struct FilterRegion {
    id: String,
}

pub struct MethodBuilder {
    name: String,
    kind: MethodKind,
    indent: String,
    indent_level: u32,
    pending_str_const: String,
    signature: Option<String>,
    body_chunks: Vec<String>,
    arg_list: Vec<(String, Option<String>)>,
    call_regions: Vec<CallRegion>,
    filter_regions: Vec<FilterRegion>,
    has_return: bool,
    is_generator: bool,
    next_cache_id: u32,
    auto_wrapped: bool,
    decorators: Vec<String>,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>, settings: &Settings, auto_wrapped: bool) -> Self {
        let mut builder = Self {
            name: name.into(),
            kind: MethodKind::Instance,
            indent: settings.indentation_step.clone(),
            indent_level: settings.initial_meth_indent_level,
            pending_str_const: String::new(),
            signature: None,
            body_chunks: Vec::new(),
            arg_list: if auto_wrapped {
                vec![("self".to_string(), None)]
            } else {
                Vec::new()
            },
            call_regions: Vec::new(),
            filter_regions: Vec::new(),
            has_return: false,
            is_generator: false,
            next_cache_id: 0,
            auto_wrapped,
            decorators: Vec::new(),
        };
        if auto_wrapped {
            builder.add_auto_setup(settings);
        }
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_kind(&mut self, kind: MethodKind) {
        self.kind = kind;
    }

    pub fn add_arg(&mut self, name: impl Into<String>, default: Option<String>) {
        self.arg_list.push((name.into(), default));
    }

    pub fn add_decorator(&mut self, expr: String) {
        self.decorators.push(expr);
    }

    fn next_cache_id(&mut self) -> String {
        self.next_cache_id += 1;
        format!("_{}", self.next_cache_id)
    }

    fn indentation(&self) -> String {
        self.indent.repeat(self.indent_level as usize)
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        assert!(self.indent_level > 0, "attempt to dedent past indent level 0");
        self.indent_level -= 1;
    }

    /// Buffers literal text for later `commit_str_const`.
    pub fn add_str_const(&mut self, text: &str) {
        self.pending_str_const.push_str(text);
    }

    /// Truncates the pending literal buffer back to the start of the
    /// current line, implementing the line-clear rule for directives
    /// that occupy a whole line by themselves.
    pub fn handle_ws_before_directive(&mut self) {
        if self.pending_str_const.is_empty() {
            return;
        }
        let bol = self
            .pending_str_const
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        self.pending_str_const.truncate(bol);
    }

    fn append_to_prev_chunk(&mut self, appendage: &str) {
        if let Some(last) = self.body_chunks.last_mut() {
            last.push_str(appendage);
        }
    }

    pub fn add_chunk(&mut self, chunk: &str) {
        self.commit_str_const();
        self.body_chunks
            .push(format!("\n{}{}", self.indentation(), chunk));
    }

    pub fn add_write_chunk(&mut self, chunk: &str) {
        self.add_chunk(&format!("write({chunk})"));
    }

    /// Flushes the pending literal text as one `write("""…""")` call.
    pub fn commit_str_const(&mut self) {
        if self.pending_str_const.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending_str_const);
        let literal = python_triple_quoted_literal(&text);
        self.add_write_chunk_raw(&literal);
    }

    /// Like `add_write_chunk` but bypasses `commit_str_const` (the text
    /// passed in already *is* a commit).
    fn add_write_chunk_raw(&mut self, literal: &str) {
        let chunk = format!("write({literal})");
        self.body_chunks
            .push(format!("\n{}{}", self.indentation(), chunk));
    }

    pub fn add_filtered_chunk(&mut self, settings: &Settings, expr: &str, filter_args: &str, raw_expr: Option<&str>) {
        if settings.always_filter_none {
            match raw_expr {
                Some(raw) if !raw.contains('\n') && !raw.contains('\r') => {
                    self.add_chunk(&format!("_v = {expr} # {raw:?}"));
                }
                _ => self.add_chunk(&format!("_v = {expr}")),
            }
            self.add_chunk(&format!("if _v is not NO_CONTENT: write(_filter(_v{filter_args}))"));
        } else {
            self.add_chunk(&format!("write(_filter({expr}{filter_args}))"));
        }
    }

    pub fn add_placeholder(&mut self, settings: &Settings, expr: &str, filter_args: &str, raw: &str, line: u32, col: u32) {
        self.add_filtered_chunk(settings, expr, filter_args, Some(raw));
        self.append_to_prev_chunk(&format!(" # from line {line}, col {col}."));
    }

    pub fn add_silent(&mut self, expr: &str) {
        self.add_chunk(expr);
    }

    pub fn add_set(&mut self, global_set_vars_expr: &str) {
        self.add_chunk(global_set_vars_expr);
    }

    pub fn add_indenting_directive(&mut self, expr: &str) {
        let expr = if expr.is_empty() || expr.ends_with(':') {
            expr.to_string()
        } else {
            format!("{expr}:")
        };
        self.add_chunk(&expr);
        self.indent();
    }

    pub fn add_re_indenting_directive(&mut self, expr: &str, dedent: bool) {
        self.commit_str_const();
        if dedent {
            self.dedent();
        }
        let expr = if expr.ends_with(':') {
            expr.to_string()
        } else {
            format!("{expr}:")
        };
        self.add_chunk(&expr);
        self.indent();
    }

    pub fn add_if(&mut self, expr: &str) {
        self.add_indenting_directive(expr);
    }

    pub fn add_ternary_expr(&mut self, settings: &Settings, condition: &str, true_expr: &str, false_expr: &str) {
        self.add_indenting_directive(condition);
        self.add_filtered_chunk(settings, true_expr, "", None);
        self.dedent();
        self.add_indenting_directive("else");
        self.add_filtered_chunk(settings, false_expr, "", None);
        self.dedent();
    }

    pub fn add_else(&mut self, expr: &str, dedent: bool) {
        let expr = rewrite_else_if_to_elif(expr);
        self.add_re_indenting_directive(&expr, dedent);
    }

    pub fn add_closure(&mut self, function_name: &str, args: &[(String, Option<String>)], comment: &str) {
        let arg_str = args
            .iter()
            .map(|(name, default)| match default {
                Some(d) => format!("{name}={d}"),
                None => name.clone(),
            })
            .collect::<Vec<_>>()
            .join(",");
        self.add_indenting_directive(&format!("def {function_name}({arg_str}):"));
        self.add_chunk(&format!("#{comment}"));
    }

    pub fn add_return(&mut self, expr: &str) {
        assert!(!self.is_generator, "cannot mix #return and #yield");
        self.add_chunk(expr);
        self.has_return = true;
    }

    pub fn add_yield(&mut self, expr: &str) {
        assert!(!self.has_return, "cannot mix #return and #yield");
        self.is_generator = true;
        let body = expr.replace("yield", "");
        if !body.trim().is_empty() {
            self.add_chunk(expr);
        } else {
            self.add_chunk("if _dummyTrans:");
            self.indent();
            self.add_chunk("yield trans.response().getvalue()");
            self.add_chunk("trans = DummyTransaction()");
            self.add_chunk("write = trans.response().write");
            self.dedent();
            self.add_chunk("else:");
            self.indent();
            self.add_chunk("raise TypeError(\"This method cannot be called with a trans arg\")");
            self.dedent();
        }
    }

    pub fn start_call_region(&mut self, settings: &Settings, function_name: &str, args: &str) {
        let id = self.next_cache_id();
        self.add_chunk(&format!("## START CALL REGION: {id} of {function_name} in the source."));
        self.add_chunk(&format!("_orig_trans{id} = trans"));
        self.add_chunk(&format!("_wasBuffering{id} = self._CHEETAH__isBuffering"));
        self.add_chunk(&format!("trans = _callCollector{id} = DummyTransaction()"));
        if settings.auto_assign_dummy_transaction_to_self {
            self.add_chunk("self.transaction = trans");
        } else {
            self.add_chunk("self._CHEETAH__isBuffering = True");
        }
        self.add_chunk(&format!("write = _callCollector{id}.response().write"));
        self.call_regions.push(CallRegion {
            id,
            function_name: function_name.to_string(),
            args: args.to_string(),
        });
    }

    pub fn end_call_region(&mut self, settings: &Settings) {
        let region = self
            .call_regions
            .pop()
            .expect("end_call_region with no open call region");
        let id = &region.id;
        self.add_chunk(&format!("trans = _orig_trans{id}"));
        if settings.auto_assign_dummy_transaction_to_self {
            self.add_chunk("self.transaction = trans");
        }
        self.add_chunk("write = trans.response().write");
        self.add_chunk(&format!("self._CHEETAH__isBuffering = _wasBuffering{id}"));
        self.add_chunk(&format!("del _wasBuffering{id}"));
        self.add_chunk(&format!("del _orig_trans{id}"));
        self.add_chunk(&format!("_callArgVal{id} = _callCollector{id}.response().getvalue()"));
        self.add_chunk(&format!("del _callCollector{id}"));
        let extra_args = if region.args.is_empty() {
            String::new()
        } else {
            format!(", {}", region.args)
        };
        self.add_filtered_chunk(
            settings,
            &format!("{}(_callArgVal{}{})", region.function_name, id, extra_args),
            "",
            None,
        );
        self.add_chunk(&format!("del _callArgVal{id}"));
        self.add_chunk(&format!("## END CALL REGION: {id} of {}.", region.function_name));
        self.add_chunk("");
    }

    pub fn set_filter(&mut self, the_filter: &str, is_class: bool) {
        let id = self.next_cache_id();
        self.add_chunk(&format!("_orig_filter{id} = _filter"));
        if is_class {
            self.add_chunk(&format!(
                "_filter = self._CHEETAH__currentFilter = {}(self).filter",
                the_filter.trim()
            ));
        } else if the_filter.eq_ignore_ascii_case("none") {
            self.add_chunk("_filter = self._CHEETAH__initialFilter");
        } else {
            self.add_chunk(&format!("filterName = {the_filter:?}"));
            self.add_chunk(&format!("if filterName in self._CHEETAH__filters:"));
            self.indent();
            self.add_chunk("_filter = self._CHEETAH__currentFilter = self._CHEETAH__filters[filterName]");
            self.dedent();
            self.add_chunk("else:");
            self.indent();
            self.add_chunk(
                "_filter = self._CHEETAH__currentFilter = self._CHEETAH__filters[filterName] = getattr(self._CHEETAH__filtersLib, filterName)(self).filter",
            );
            self.dedent();
        }
        self.filter_regions.push(FilterRegion { id });
    }

    pub fn close_filter_block(&mut self) {
        let region = self
            .filter_regions
            .pop()
            .expect("close_filter_block with no open filter region");
        self.add_chunk(&format!(
            "_filter = self._CHEETAH__currentFilter = _orig_filter{}",
            region.id
        ));
    }

    fn add_auto_setup(&mut self, settings: &Settings) {
        match self.kind {
            MethodKind::Instance => {
                self.add_chunk("trans = NO_CONTENT");
                self.add_chunk("if 'trans' in KWs: trans = KWs['trans']");
                self.add_chunk("_dummyTrans = False");
                self.add_chunk("if not trans:");
                self.indent();
                self.add_chunk("_dummyTrans = True");
                self.add_chunk("trans = DummyTransaction()");
                if settings.auto_assign_dummy_transaction_to_self {
                    self.add_chunk("self.transaction = trans");
                }
                self.dedent();
                self.add_chunk("write = trans.response().write");
                if settings.use_name_mapper {
                    self.add_chunk("SL = self._CHEETAH__searchList");
                }
                self.add_chunk("_filter = self._CHEETAH__currentFilter");
            }
            MethodKind::ClassMethod | MethodKind::StaticMethod => {
                self.add_chunk("trans = NO_CONTENT");
                self.add_chunk("if 'trans' in KWs: trans = KWs['trans']");
                self.add_chunk("_dummyTrans = False");
                self.add_chunk("if not trans:");
                self.indent();
                self.add_chunk("_dummyTrans = True");
                self.add_chunk("trans = DummyTransaction()");
                self.dedent();
                self.add_chunk("write = trans.response().write");
                self.add_chunk("_filter = lambda x, **kwargs: x if x is not None else ''");
            }
        }
    }

    fn add_auto_cleanup(&mut self) {
        self.add_chunk("if _dummyTrans:");
        self.indent();
        self.add_chunk("return trans.response().getvalue()");
        self.dedent();
        self.add_chunk("else:");
        self.indent();
        self.add_chunk("return NO_CONTENT");
        self.dedent();
    }

    /// Replaces a body chunk that is an exact textual match for `needle`
    /// (ignoring the leading newline+indentation `add_chunk` prepends).
    pub fn replace_chunk_exact(&mut self, needle: &str, replacement: &str) {
        for chunk in &mut self.body_chunks {
            if chunk.trim_start_matches(['\n', ' ']) == needle {
                let prefix_len = chunk.len() - chunk.trim_start_matches(['\n', ' ']).len();
                let prefix = chunk[..prefix_len].to_string();
                *chunk = format!("{prefix}{replacement}");
            }
        }
    }

    pub fn method_signature(&self) -> String {
        let args = self
            .arg_list
            .iter()
            .map(|(name, default)| match default {
                Some(d) => format!("{name}={d}"),
                None => name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}def {}({}, **KWs)", self.indent, self.name, args)
    }

    /// Finalizes the method body (running auto-cleanup if this is an
    /// auto-wrapped method) and returns the full `def ...:` text.
    pub fn method_def(mut self, settings: &Settings) -> String {
        if self.auto_wrapped && !self.is_generator {
            self.add_auto_cleanup();
        }
        self.commit_str_const();
        let signature = self.signature.take().unwrap_or_else(|| self.method_signature());
        let body = self.body_chunks.join("");
        let decorators = self
            .decorators
            .iter()
            .map(|d| format!("{}@{d}\n", self.indent))
            .collect::<String>();
        let _ = settings;
        format!("{decorators}{signature}:\n{body}")
    }
}

fn rewrite_else_if_to_elif(expr: &str) -> String {
    let trimmed = expr.trim_start();
    if let Some(rest) = trimmed.strip_prefix("else") {
        let rest_trimmed = rest.trim_start();
        if let Some(cond) = rest_trimmed.strip_prefix("if ") {
            return format!("elif {cond}");
        }
    }
    expr.to_string()
}

/// Approximates CPython's `repr()` for a `str`, then rewrites the quote
/// style to a triple-quoted literal the way `commitStrConst` does, so
/// embedded newlines and quotes inside plain template text survive
/// un-escaped in the generated source. The delimiter is whichever of
/// `"""`/`'''` does not appear in `text`; if both appear, falls back to
/// `"""` and escapes every colliding run of three `"` so it no longer
/// reads as the closing delimiter.
fn python_triple_quoted_literal(text: &str) -> String {
    let has_triple_double = text.contains("\"\"\"");
    let has_triple_single = text.contains("'''");

    let (open, close, quote_char, escape_runs) = if !has_triple_double {
        ("\"\"\"", "\"\"\"", '"', false)
    } else if !has_triple_single {
        ("'''", "'''", '\'', false)
    } else {
        ("\"\"\"", "\"\"\"", '"', true)
    };

    let mut body = String::with_capacity(text.len());
    let mut quote_run = 0u32;
    for c in text.chars() {
        if c == '\\' {
            body.push_str("\\\\");
            quote_run = 0;
            continue;
        }
        if escape_runs && c == quote_char {
            quote_run += 1;
            if quote_run == 3 {
                body.push('\\');
                body.push(c);
                quote_run = 0;
                continue;
            }
        } else {
            quote_run = 0;
        }
        body.push(c);
    }
    format!("{open}{body}{close}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_str_const_wraps_in_triple_quotes() {
        let settings = Settings::default();
        let mut m = MethodBuilder::new("respond", &settings, false);
        m.add_str_const("hello\nworld");
        m.commit_str_const();
        let def = m.method_def(&settings);
        assert!(def.contains("write(\"\"\"hello\nworld\"\"\")"));
    }

    #[test]
    fn commit_str_const_falls_back_to_double_quotes_with_escaping_when_both_delimiters_collide() {
        let settings = Settings::default();
        let mut m = MethodBuilder::new("respond", &settings, false);
        m.add_str_const("has \"\"\" and ''' both");
        m.commit_str_const();
        let def = m.method_def(&settings);
        assert!(def.contains(r#"write("""has ""\" and ''' both""")"#));
    }

    #[test]
    fn indenting_directive_appends_colon_and_indents() {
        let settings = Settings::default();
        let mut m = MethodBuilder::new("respond", &settings, false);
        m.add_if("x > 0");
        m.add_chunk("write('yes')");
        m.dedent();
        let def = m.method_def(&settings);
        assert!(def.contains("if x > 0:"));
    }

    #[test]
    fn auto_wrapped_method_gets_setup_and_cleanup() {
        let settings = Settings::default();
        let m = MethodBuilder::new("respond", &settings, true);
        let def = m.method_def(&settings);
        assert!(def.contains("trans = NO_CONTENT"));
        assert!(def.contains("return trans.response().getvalue()"));
    }

    #[test]
    fn handle_ws_before_directive_truncates_to_line_start() {
        let settings = Settings::default();
        let mut m = MethodBuilder::new("respond", &settings, false);
        m.add_str_const("text\n   ");
        m.handle_ws_before_directive();
        m.commit_str_const();
        let def = m.method_def(&settings);
        assert!(def.contains("write(\"\"\"text\n\"\"\")"));
    }
}
