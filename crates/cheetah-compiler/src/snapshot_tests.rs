//! Snapshot tests over full compiled module output.
//!
//! Organized by directive, one snapshot per construct, mirroring the
//! file-based snapshot style used for bytecode emission tests elsewhere
//! in this codebase's lineage.

use crate::{CompileOptions, compile};
use indoc::indoc;

macro_rules! snap {
    ($source:expr) => {{
        let source = $source.trim_start_matches('\n');
        let out = compile(source, CompileOptions::default()).expect("compile failed");
        insta::assert_snapshot!(out);
    }};
}

#[test]
fn plain_text_only() {
    snap!(indoc! {r#"
        Hello, world!
    "#});
}

#[test]
fn placeholder_lookup() {
    snap!(indoc! {r#"
        Hello, $name!
    "#});
}

#[test]
fn if_else_directive() {
    snap!(indoc! {r#"
        #if $n > 1
        many
        #else
        one
        #end if
    "#});
}

#[test]
fn for_loop_directive() {
    snap!(indoc! {r#"
        #for $item in $items
        - $item
        #end for
    "#});
}

#[test]
fn def_with_default_arg() {
    snap!(indoc! {r#"
        #def greet($who="world")
        Hello, $who!
        #end def
        $greet()
    "#});
}

#[test]
fn extends_renames_main_method() {
    snap!(indoc! {r#"
        #extends Base
        $x
    "#});
}

#[test]
fn set_directive_binds_a_local() {
    snap!(indoc! {r#"
        #set $x = 1 + 1
        $x
    "#});
}

#[test]
fn filter_directive_wraps_writes() {
    snap!(indoc! {r#"
        #filter Markdown
        *hi*
        #end filter
    "#});
}
