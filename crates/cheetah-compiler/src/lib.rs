//! Compiler for the Cheetah template language: source text in, a
//! generated host-module source string out.
//!
//! The pipeline is [`source_reader::SourceReader`] → [`lexer::Lexer`] →
//! the directive [`parser`] → [`codegen`]'s three builders. [`compile`]
//! is the one pure entry point; [`compile_with_diagnostics`] wraps it
//! for callers (the CLI) that want a renderable report instead of a bare
//! error on failure.

pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod namemapper;
mod parser;
pub mod settings;
pub mod source_reader;
pub mod span;
pub mod tables;

#[cfg(test)]
mod snapshot_tests;

pub use error::CompileError;
pub use parser::Parser;
pub use settings::Settings;
pub use span::Span;

use diagnostics::Diagnostics;

/// Inputs to one [`compile`] call beyond the source text itself.
#[derive(Clone)]
pub struct CompileOptions {
    /// Name of the generated class; also the `__main__` guard's entry point.
    pub main_class_name: String,
    /// Import path substituted for `Cheetah.Template` and friends in the
    /// generated module's header imports.
    pub runtime_module: String,
    /// Used only for diagnostics and `__CHEETAH_src__`; does not affect parsing.
    pub filename: Option<String>,
    pub settings: Settings,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            main_class_name: "DynamicallyCompiledCheetahTemplate".to_string(),
            runtime_module: "Cheetah.Template".to_string(),
            filename: None,
            settings: Settings::default(),
        }
    }
}

/// Compiles `source` into generated module text.
///
/// On a parse error, the returned [`CompileError`] carries a [`Span`]
/// that a caller can render with [`diagnostics::DiagnosticsPrinter`] via
/// [`compile_with_diagnostics`].
pub fn compile(source: &str, options: CompileOptions) -> error::Result<String> {
    let span = tracing::debug_span!(
        "compile",
        filename = options.filename.as_deref().unwrap_or("<string>"),
        main_class = %options.main_class_name,
    );
    let _enter = span.enter();

    let mut parser = Parser::new(
        source,
        options.filename,
        &options.main_class_name,
        &options.runtime_module,
        options.settings,
    );
    parser.parse()?;
    Ok(parser.finish())
}

/// Like [`compile`], but never returns `Err`: a failed pass still yields
/// whatever [`Diagnostics`] could be built from the error, paired with
/// `None` in place of the module text, so a CLI can print a report and
/// exit non-zero rather than matching on a bare `Result`.
pub fn compile_with_diagnostics(source: &str, options: CompileOptions) -> (Option<String>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    match compile(source, options) {
        Ok(text) => (Some(text), diagnostics),
        Err(err) => {
            let span = err.span().unwrap_or_else(|| Span::at(0));
            diagnostics.error(err.to_string(), span).emit();
            (None, diagnostics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_plain_text_to_a_respond_method() {
        let out = compile("hello world", CompileOptions::default()).unwrap();
        assert!(out.contains("class DynamicallyCompiledCheetahTemplate(Template):"));
        assert!(out.contains("def respond("));
        assert!(out.contains("hello world"));
    }

    #[test]
    fn unknown_directive_is_a_reportable_error() {
        let result = compile("#bogus 1 + 1", CompileOptions::default());
        assert!(matches!(result, Err(CompileError::UnknownDirective { .. })));
    }

    #[test]
    fn compile_with_diagnostics_renders_a_report_on_failure() {
        let (text, diagnostics) = compile_with_diagnostics("#bogus", CompileOptions::default());
        assert!(text.is_none());
        assert!(diagnostics.has_errors());
        assert!(!diagnostics.printer("#bogus").render().is_empty());
    }

    #[test]
    fn source_path_is_threaded_into_the_src_constant() {
        let mut options = CompileOptions::default();
        options.filename = Some("greeting.tmpl".to_string());
        let out = compile("hi", options).unwrap();
        assert!(out.contains("__CHEETAH_src__ = \"greeting.tmpl\""));
    }
}
