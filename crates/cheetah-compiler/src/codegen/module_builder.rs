//! Assembles the final generated module text: header, imports, module
//! constants, special vars, class bodies, and the `__main__` footer.
//!
//! Ported from `Compiler` in `Cheetah/Compiler.py`. The Python-specific
//! import targets (`Cheetah.Template`, `Cheetah.NameMapper`, …) are
//! parameterized behind a `runtime_module` path so the core never
//! hardcodes a Python package that this crate does not ship.

use indexmap::IndexSet;

use crate::codegen::class_builder::ClassBuilder;
use crate::settings::Settings;

pub struct ModuleBuilder {
    main_class_name: String,
    runtime_module: String,
    source_path: Option<String>,
    module_encoding: Option<String>,
    module_header_lines: Vec<String>,
    special_vars: Vec<(String, String)>,
    import_statements: Vec<String>,
    imported_var_names: IndexSet<String>,
    module_constants: Vec<String>,
    finished_classes: Vec<(String, ClassBuilder)>,
    main_method_name_arg: Option<String>,
}

impl ModuleBuilder {
    pub fn new(main_class_name: impl Into<String>, runtime_module: impl Into<String>) -> Self {
        let runtime_module = runtime_module.into();
        let mut imported_var_names = IndexSet::new();
        for name in ["Template", "DummyTransaction", "NotFound", "Filters"] {
            imported_var_names.insert(name.to_string());
        }

        Self {
            main_class_name: main_class_name.into(),
            source_path: None,
            import_statements: vec![
                "import sys".to_string(),
                "import os".to_string(),
                "import os.path".to_string(),
                format!("from {runtime_module} import NO_CONTENT"),
                format!("from {runtime_module} import Template"),
                format!("from {runtime_module} import DummyTransaction"),
                format!(
                    "from {runtime_module} import NotFound, valueForName, valueFromSearchList, valueFromFrameOrSearchList"
                ),
                format!("import {runtime_module}.filters as Filters"),
            ],
            runtime_module,
            module_encoding: None,
            module_header_lines: Vec::new(),
            special_vars: Vec::new(),
            imported_var_names,
            module_constants: vec![
                "VFFSL=valueFromFrameOrSearchList".to_string(),
                "VFSL=valueFromSearchList".to_string(),
                "VFN=valueForName".to_string(),
            ],
            finished_classes: Vec::new(),
            main_method_name_arg: None,
        }
    }

    pub fn set_main_method_name_arg(&mut self, name: Option<String>) {
        self.main_method_name_arg = name;
    }

    pub fn set_source_path(&mut self, path: Option<String>) {
        self.source_path = path;
    }

    pub fn set_module_encoding(&mut self, encoding: String) {
        self.module_encoding = Some(encoding);
    }

    pub fn add_module_header(&mut self, line: String) {
        self.module_header_lines.push(line);
    }

    pub fn add_module_global(&mut self, line: String) {
        self.module_constants.push(line);
    }

    pub fn add_special_var(&mut self, base_name: &str, contents: &str) {
        self.special_vars
            .push((format!("__{base_name}__"), contents.trim().to_string()));
    }

    pub fn imported_var_names(&self) -> &IndexSet<String> {
        &self.imported_var_names
    }

    pub fn add_imported_var_names(&mut self, settings: &Settings, names: impl IntoIterator<Item = String>) {
        if settings.use_legacy_import_mode {
            for n in names {
                self.imported_var_names.insert(n);
            }
        }
    }

    pub fn add_import_statement(&mut self, settings: &Settings, statement: String) {
        self.import_statements.push(statement.clone());
        let var_names = extract_imported_names(&statement);
        self.add_imported_var_names(settings, var_names);
    }

    /// Resolves the `#extends` base class, auto-importing it when it
    /// isn't already a known name, per `setBaseClass`.
    pub fn resolve_base_class(&mut self, settings: &Settings, base_class_name: &str) -> String {
        if !settings.auto_import_for_extends_directive
            || base_class_name == "object"
            || self.imported_var_names.contains(base_class_name)
        {
            return base_class_name.to_string();
        }

        let chunks: Vec<&str> = base_class_name.split('.').collect();
        if chunks.len() == 1 {
            if !self.imported_var_names.contains(base_class_name) {
                let statement = format!("from {base_class_name} import {base_class_name}");
                self.add_import_statement(settings, statement);
            }
            return base_class_name.to_string();
        }

        let (mod_name, final_class_name) = (chunks[..chunks.len() - 1].join("."), chunks[chunks.len() - 1]);
        let statement = format!("from {mod_name} import {final_class_name}");
        self.add_import_statement(settings, statement);
        final_class_name.to_string()
    }

    pub fn finish_class(&mut self, class_name: String, class: ClassBuilder) {
        self.finished_classes.push((class_name, class));
    }

    fn module_header(&self, settings: &Settings) -> String {
        let mut header = String::new();
        if let Some(encoding) = &self.module_encoding {
            header.push_str(&format!("# -*- coding: {encoding} -*-\n"));
        }
        if !self.module_header_lines.is_empty() {
            let offset = " ".repeat(settings.comment_offset as usize);
            header.push('#');
            header.push_str(&offset);
            header.push_str(&self.module_header_lines.join(&format!("\n#{offset}")));
            header.push('\n');
        }
        header
    }

    fn special_vars_text(&self) -> String {
        let mut sorted = self.special_vars.clone();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        sorted
            .into_iter()
            .map(|(k, v)| format!("{k} = {v:?}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Assembles the final module text.
    pub fn wrap_module_def(mut self, settings: &Settings) -> String {
        let src_const = match &self.source_path {
            Some(path) => format!("__CHEETAH_src__ = {path:?}"),
            None => "__CHEETAH_src__ = None".to_string(),
        };
        self.module_constants.push(src_const);

        let header = self.module_header(settings);
        let special_vars = self.special_vars_text();
        let imports = self.import_statements.join("\n");
        let constants = self.module_constants.join("\n");
        let classes = self
            .finished_classes
            .into_iter()
            .map(|(_, class)| class.class_def(settings))
            .collect::<Vec<_>>()
            .join("\n\n");
        let footer = self.module_footer();

        let mut sections = vec![header, imports, constants];
        if !special_vars.is_empty() {
            sections.push(special_vars);
        }
        sections.push(classes);
        sections.push(footer);

        sections
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string()
            + "\n"
    }

    fn module_footer(&self) -> String {
        format!(
            "if __name__ == '__main__':\n    from os import environ\n    from sys import stdout\n    stdout.write({}(searchList=[environ]).respond())\n",
            self.main_class_name
        )
    }
}

/// Extracts the imported variable names from a statement of the form
/// `import a, b` or `from mod import a, b as c` (handling aliases).
fn extract_imported_names(statement: &str) -> Vec<String> {
    let Some(idx) = statement.find("import") else {
        return Vec::new();
    };
    let tail = &statement[idx + "import".len()..];
    tail.split(',')
        .filter_map(|part| part.split_whitespace().last())
        .filter(|name| *name != "*")
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_imports_cover_the_runtime_surface() {
        let m = ModuleBuilder::new("MyTemplate", "cheetah_runtime");
        assert!(m.imported_var_names().contains("Template"));
        assert!(m.imported_var_names().contains("DummyTransaction"));
    }

    #[test]
    fn resolve_base_class_imports_an_unknown_single_segment_name() {
        let settings = Settings::default();
        let mut m = ModuleBuilder::new("MyTemplate", "cheetah_runtime");
        let resolved = m.resolve_base_class(&settings, "BaseTemplate");
        assert_eq!(resolved, "BaseTemplate");
        assert!(
            m.import_statements
                .iter()
                .any(|s| s == "from BaseTemplate import BaseTemplate")
        );
    }

    #[test]
    fn resolve_base_class_skips_import_for_object() {
        let settings = Settings::default();
        let mut m = ModuleBuilder::new("MyTemplate", "cheetah_runtime");
        let before = m.import_statements.len();
        let resolved = m.resolve_base_class(&settings, "object");
        assert_eq!(resolved, "object");
        assert_eq!(m.import_statements.len(), before);
    }

    #[test]
    fn module_footer_writes_respond_under_main_guard() {
        let m = ModuleBuilder::new("MyTemplate", "cheetah_runtime");
        assert!(m.module_footer().contains("MyTemplate(searchList=[environ]).respond()"));
    }
}
