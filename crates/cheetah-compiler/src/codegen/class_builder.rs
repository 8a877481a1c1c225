//! Accumulates one generated class: its finished methods plus any
//! `#attr` literals.
//!
//! Ported from `ClassCompiler` in `Cheetah/Compiler.py`.

use crate::codegen::method_builder::MethodBuilder;
use crate::settings::Settings;

pub struct ClassBuilder {
    class_name: String,
    base_class: String,
    main_method_name: String,
    finished: Vec<MethodBuilder>,
    active: Vec<MethodBuilder>,
    attributes: Vec<String>,
    decorators_for_next_method: Vec<String>,
}

impl ClassBuilder {
    pub fn new(class_name: impl Into<String>, base_class: impl Into<String>, settings: &Settings) -> Self {
        let mut builder = Self {
            class_name: class_name.into(),
            base_class: base_class.into(),
            main_method_name: settings.main_method_name.clone(),
            finished: Vec::new(),
            active: Vec::new(),
            attributes: Vec::new(),
            decorators_for_next_method: Vec::new(),
        };
        builder.setup_init_method(settings);
        builder
    }

    fn setup_init_method(&mut self, settings: &Settings) {
        let mut init = MethodBuilder::new("__init__", settings, false);
        init.add_chunk(&format!("super({}, self).__init__(*args, **KWs)", self.class_name));
        self.finished.insert(0, init);
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn set_base_class(&mut self, base_class: impl Into<String>) {
        self.base_class = base_class.into();
    }

    pub fn add_decorator(&mut self, decorator_expr: String) {
        self.decorators_for_next_method.push(decorator_expr);
    }

    pub fn start_method_def(&mut self, settings: &Settings, method_name: impl Into<String>, args: &[(String, Option<String>)]) {
        let mut method = MethodBuilder::new(method_name, settings, true);
        for (name, default) in args {
            method.add_arg(name.clone(), default.clone());
        }
        for decorator in self.take_decorators_for_next_method() {
            method.add_decorator(decorator);
        }
        self.active.push(method);
    }

    pub fn current_method(&mut self) -> &mut MethodBuilder {
        self.active.last_mut().expect("no active method being compiled")
    }

    pub fn current_method_name(&self) -> &str {
        self.active
            .last()
            .map(|m| m.name())
            .expect("no active method being compiled")
    }

    pub fn close_def(&mut self) {
        let mut method = self.active.pop().expect("close_def with no active method");
        method.commit_str_const();
        self.finished.push(method);
    }

    /// Like `close_def`, but additionally splices a call to the new
    /// block method into the (now current) enclosing method.
    pub fn close_block(&mut self) {
        let mut method = self.active.pop().expect("close_block with no active method");
        method.commit_str_const();
        let name = method.name().to_string();
        self.finished.push(method);
        if let Some(enclosing) = self.active.last_mut() {
            enclosing.add_chunk(&format!("self.{name}(trans=trans)"));
        }
    }

    pub fn add_attribute(&mut self, expr: String) -> Result<(), String> {
        if expr.contains("VFN(") || expr.contains("VFFSL(") {
            return Err(
                "invalid #attr directive: it should only contain simple Python literals".into(),
            );
        }
        self.attributes.push(expr);
        Ok(())
    }

    pub fn add_super_call(&mut self, args: &[(String, Option<String>)]) -> String {
        let method_name = self.current_method_name().to_string();
        let arg_string = args
            .iter()
            .map(|(name, default)| match default {
                Some(d) => format!("{name}={d}"),
                None => name.clone(),
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("super({}, self).{}({})", self.class_name, method_name, arg_string)
    }

    /// Renames the configured main method (e.g. `respond`) to
    /// `new_name`, patching the one recognized call-site shape a
    /// `#block` closure may have already emitted.
    pub fn set_main_method_name(&mut self, new_name: &str) {
        if new_name == self.main_method_name {
            return;
        }
        let old_name = self.main_method_name.clone();
        if let Some(main) = self
            .finished
            .iter_mut()
            .chain(self.active.iter_mut())
            .find(|m| m.name() == old_name)
        {
            main.set_name(new_name.to_string());
        }
        let needle = format!("write(self.{old_name}(trans=trans))");
        let replacement = format!("write(self.{new_name}(trans=trans))");
        for method in self.finished.iter_mut().chain(self.active.iter_mut()) {
            method.replace_chunk_exact(&needle, &replacement);
        }
        self.main_method_name = new_name.to_string();
    }

    pub fn class_signature(&self) -> String {
        format!("class {}({}):", self.class_name, self.base_class)
    }

    pub fn class_def(self, settings: &Settings) -> String {
        let ind = settings.indentation_step.clone();
        let method_defs = self
            .finished
            .into_iter()
            .map(|m| m.method_def(settings))
            .collect::<Vec<_>>()
            .join("\n\n");
        let attributes = self
            .attributes
            .iter()
            .map(|a| format!("{ind}{a}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut out = vec![self.class_signature()];
        out.push(format!("{ind}{}", "#".repeat(50)));
        out.push(format!("{ind}## CHEETAH GENERATED METHODS"));
        out.push(String::new());
        out.push(method_defs);
        out.push(format!("{ind}{}", "#".repeat(50)));
        out.push(format!("{ind}## CHEETAH GENERATED ATTRIBUTES"));
        out.push(String::new());
        out.push(attributes);
        out.join("\n")
    }

    pub fn take_decorators_for_next_method(&mut self) -> Vec<String> {
        std::mem::take(&mut self.decorators_for_next_method)
    }
}
