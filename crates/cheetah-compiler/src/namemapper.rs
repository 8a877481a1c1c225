//! Rewrites `$a.b.c[1].d().x.y.z`-shaped placeholders into the runtime
//! lookup calls that implement NameMapper's unified dotted notation.
//!
//! Ported from `GenUtils.{genCheetahVar,genPlainVar,genNameMapperVar}` in
//! `Cheetah/Compiler.py`.

use crate::settings::Settings;

/// One segment of a parsed `$var`: a dotted name, whether autocalling may
/// apply to it, and anything trailing it (an index, slice, or call).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameChunk {
    pub name: String,
    pub may_autocall: bool,
    pub tail: String,
}

impl NameChunk {
    pub fn new(name: impl Into<String>, may_autocall: bool, tail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            may_autocall,
            tail: tail.into(),
        }
    }
}

/// Renders `nameChunks` into source text, honoring `useNameMapper`.
pub fn gen_cheetah_var(settings: &Settings, chunks: &[NameChunk], plain: bool) -> String {
    if settings.use_name_mapper && !plain {
        gen_name_mapper_var(settings, chunks)
    } else {
        gen_plain_var(chunks)
    }
}

/// `$a.b.c` without NameMapper: just joins the chunks with dots.
pub fn gen_plain_var(chunks: &[NameChunk]) -> String {
    let mut parts = chunks.iter();
    let Some(first) = parts.next() else {
        return String::new();
    };
    let mut code = format!("{}{}", first.name, first.tail);
    for chunk in parts {
        code.push('.');
        code.push_str(&chunk.name);
        code.push_str(&chunk.tail);
    }
    code
}

/// `$a.b.c[1].d().x.y.z` → nested `VFFSL`/`VFN` calls.
///
/// The first chunk is resolved against the search list (`VFFSL`, or a
/// plain `VFN` off the first dotted segment when `useSearchList` is
/// disabled); every subsequent chunk wraps the accumulated expression in
/// `VFN`.
pub fn gen_name_mapper_var(settings: &Settings, chunks: &[NameChunk]) -> String {
    let default_use_ac = settings.use_autocalling;
    let use_dotted_notation = settings.use_dotted_notation;
    let use_search_list = settings.use_search_list;

    let mut iter = chunks.iter();
    let Some(first) = iter.next() else {
        return String::new();
    };

    let mut code = if !use_search_list {
        match first.name.find('.') {
            Some(idx) => {
                let (before, after) = (&first.name[..idx], &first.name[idx + 1..]);
                format!(
                    "VFN({}, \"{}\", {}, {})",
                    before,
                    after,
                    py_bool(default_use_ac && first.may_autocall),
                    py_bool(use_dotted_notation),
                ) + &first.tail
            }
            None => format!("{}{}", first.name, first.tail),
        }
    } else {
        format!(
            "VFFSL(SL, \"{}\", {}, {})",
            first.name,
            py_bool(default_use_ac && first.may_autocall),
            py_bool(use_dotted_notation),
        ) + &first.tail
    };

    for chunk in iter {
        code = format!(
            "VFN({}, \"{}\", {}, {})",
            code,
            chunk.name,
            py_bool(default_use_ac && chunk.may_autocall),
            py_bool(use_dotted_notation),
        ) + &chunk.tail;
    }

    code
}

fn py_bool(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_uses_vffsl() {
        let settings = Settings::default();
        let chunks = vec![NameChunk::new("a", true, "")];
        assert_eq!(
            gen_name_mapper_var(&settings, &chunks),
            "VFFSL(SL, \"a\", False, True)"
        );
    }

    #[test]
    fn chained_chunks_nest_vfn_around_vffsl() {
        let settings = Settings::default();
        let chunks = vec![
            NameChunk::new("a.b.c", true, "[1]"),
            NameChunk::new("d", false, "()"),
            NameChunk::new("x.y.z", true, ""),
        ];
        let code = gen_name_mapper_var(&settings, &chunks);
        assert_eq!(
            code,
            "VFN(VFN(VFFSL(SL, \"a.b.c\", False, True)[1], \"d\", False, True)(), \"x.y.z\", False, True)"
        );
    }

    #[test]
    fn autocalling_setting_gates_may_autocall() {
        let mut settings = Settings::default();
        settings.use_autocalling = true;
        let chunks = vec![NameChunk::new("a", true, "")];
        assert_eq!(
            gen_name_mapper_var(&settings, &chunks),
            "VFFSL(SL, \"a\", True, True)"
        );
    }

    #[test]
    fn plain_var_ignores_name_mapper_settings() {
        let chunks = vec![NameChunk::new("a.b", true, ""), NameChunk::new("c", true, "()")];
        assert_eq!(gen_plain_var(&chunks), "a.b.c()");
    }

    #[test]
    fn use_search_list_false_splits_first_segment() {
        let mut settings = Settings::default();
        settings.use_search_list = false;
        let chunks = vec![NameChunk::new("root.attr", true, "")];
        assert_eq!(
            gen_name_mapper_var(&settings, &chunks),
            "VFN(root, \"attr\", False, True)"
        );
    }
}
