//! Compiler settings.
//!
//! Ported from `_DEFAULT_COMPILER_SETTINGS` in `Cheetah/Compiler.py`. Unlike
//! the original's `dict`-of-anything, each documented key gets its own
//! typed field; `#compiler-settings` mutates the live struct directly
//! rather than stringly-keyed lookups.

use indexmap::IndexMap;

/// A user-registered macro directive body: `(#mymacro arg1, arg2: body)`
/// expands, via this callback, into template source text that is
/// recursively re-parsed in place.
pub type MacroFn = std::sync::Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct Settings {
    pub use_name_mapper: bool,
    pub use_search_list: bool,
    pub allow_search_list_as_meth_arg: bool,
    pub use_autocalling: bool,
    pub use_dotted_notation: bool,
    pub always_filter_none: bool,
    pub use_legacy_import_mode: bool,
    pub prioritize_search_list_over_self: bool,
    pub auto_assign_dummy_transaction_to_self: bool,
    pub use_kws_dict_arg_for_passing_trans: bool,

    pub comment_offset: u32,
    pub main_method_name: String,
    pub main_method_name_for_subclasses: String,
    pub indentation_step: String,
    pub initial_meth_indent_level: u32,

    pub auto_import_for_extends_directive: bool,

    pub cheetah_var_start_token: String,
    pub comment_start_token: String,
    pub directive_start_token: String,
    pub directive_end_token: String,
    pub psp_start_token: String,
    pub psp_end_token: String,
    pub gettext_tokens: Vec<String>,
    pub allow_nested_def_scopes: bool,

    pub macro_directives: IndexMap<String, MacroFn>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_name_mapper: true,
            use_search_list: true,
            allow_search_list_as_meth_arg: true,
            use_autocalling: false,
            use_dotted_notation: true,
            always_filter_none: true,
            use_legacy_import_mode: true,
            prioritize_search_list_over_self: false,
            auto_assign_dummy_transaction_to_self: false,
            use_kws_dict_arg_for_passing_trans: true,

            comment_offset: 1,
            main_method_name: "respond".to_string(),
            main_method_name_for_subclasses: "writeBody".to_string(),
            indentation_step: "    ".to_string(),
            initial_meth_indent_level: 2,

            auto_import_for_extends_directive: true,

            cheetah_var_start_token: "$".to_string(),
            comment_start_token: "##".to_string(),
            directive_start_token: "#".to_string(),
            directive_end_token: "#".to_string(),
            psp_start_token: "<%".to_string(),
            psp_end_token: "%>".to_string(),
            gettext_tokens: vec!["_".to_string(), "N_".to_string(), "ngettext".to_string()],
            allow_nested_def_scopes: true,

            macro_directives: IndexMap::new(),
        }
    }
}

impl Settings {
    /// Applies one `key = value` pair from a `#compiler-settings` block.
    /// Unknown keys are rejected rather than silently ignored, matching
    /// the original's `setattr`-on-a-known-schema behavior.
    pub fn set_by_name(&mut self, key: &str, raw_value: &str) -> Result<(), String> {
        let value = raw_value.trim();
        match key {
            "useNameMapper" => self.use_name_mapper = parse_bool(value)?,
            "useSearchList" => self.use_search_list = parse_bool(value)?,
            "allowSearchListAsMethArg" => self.allow_search_list_as_meth_arg = parse_bool(value)?,
            "useAutocalling" => self.use_autocalling = parse_bool(value)?,
            "useDottedNotation" => self.use_dotted_notation = parse_bool(value)?,
            "alwaysFilterNone" => self.always_filter_none = parse_bool(value)?,
            "useLegacyImportMode" => self.use_legacy_import_mode = parse_bool(value)?,
            "prioritizeSearchListOverSelf" => self.prioritize_search_list_over_self = parse_bool(value)?,
            "autoAssignDummyTransactionToSelf" => {
                self.auto_assign_dummy_transaction_to_self = parse_bool(value)?
            }
            "useKWsDictArgForPassingTrans" => self.use_kws_dict_arg_for_passing_trans = parse_bool(value)?,
            "commentOffset" => {
                self.comment_offset = value.parse().map_err(|_| format!("not an integer: {value}"))?
            }
            "mainMethodName" => self.main_method_name = unquote(value),
            "mainMethodNameForSubclasses" => self.main_method_name_for_subclasses = unquote(value),
            "indentationStep" => self.indentation_step = unquote(value),
            "initialMethIndentLevel" => {
                self.initial_meth_indent_level =
                    value.parse().map_err(|_| format!("not an integer: {value}"))?
            }
            "autoImportForExtendsDirective" => self.auto_import_for_extends_directive = parse_bool(value)?,
            "cheetahVarStartToken" => self.cheetah_var_start_token = unquote(value),
            "commentStartToken" => self.comment_start_token = unquote(value),
            "directiveStartToken" => self.directive_start_token = unquote(value),
            "directiveEndToken" => self.directive_end_token = unquote(value),
            "PSPStartToken" => self.psp_start_token = unquote(value),
            "PSPEndToken" => self.psp_end_token = unquote(value),
            "allowNestedDefScopes" => self.allow_nested_def_scopes = parse_bool(value)?,
            _ => return Err(format!("unknown compiler setting '{key}'")),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        other => Err(format!("not a boolean: {other}")),
    }
}

fn unquote(value: &str) -> String {
    let v = value.trim();
    if v.len() >= 2 {
        let bytes = v.as_bytes();
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'\'' || first == b'"') && first == last {
            return v[1..v.len() - 1].to_string();
        }
    }
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let s = Settings::default();
        assert!(s.use_name_mapper);
        assert!(!s.use_autocalling);
        assert_eq!(s.main_method_name, "respond");
        assert_eq!(s.indentation_step, "    ");
        assert_eq!(s.initial_meth_indent_level, 2);
    }

    #[test]
    fn set_by_name_updates_typed_fields() {
        let mut s = Settings::default();
        s.set_by_name("useAutocalling", "True").unwrap();
        assert!(s.use_autocalling);
        s.set_by_name("mainMethodName", "'index'").unwrap();
        assert_eq!(s.main_method_name, "index");
    }

    #[test]
    fn set_by_name_rejects_unknown_keys() {
        let mut s = Settings::default();
        assert!(s.set_by_name("notAThing", "1").is_err());
    }
}
