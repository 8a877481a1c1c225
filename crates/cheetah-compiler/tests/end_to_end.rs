//! End-to-end scenarios over the full `compile()` pipeline.

use cheetah_compiler::{CompileError, CompileOptions, compile};

fn compile_ok(source: &str) -> String {
    compile(source, CompileOptions::default()).unwrap_or_else(|e| panic!("compile failed: {e}"))
}

#[test]
fn hello_world_writes_literal_then_a_namemapper_lookup() {
    let out = compile_ok("Hello, $who!\n");
    assert!(out.contains(r#"write("""Hello, """)"#));
    assert!(out.contains("VFFSL("));
    assert!(out.contains("\"who\""));
    assert!(out.contains(r#"write("""!"#));
}

#[test]
fn if_else_block_emits_a_host_if_with_both_branches() {
    let out = compile_ok("#if $n > 1\nmany\n#else\none\n#end if\n");
    assert!(out.contains("if VFFSL("));
    assert!(out.contains("\"n\""));
    assert!(out.contains("> 1"));
    assert!(out.contains("else:"));
    assert!(out.contains(r#"write("""many"#));
    assert!(out.contains(r#"write("""one"#));
}

#[test]
fn nested_def_becomes_a_closure_with_search_list_disabled() {
    let out = compile_ok("#def outer\n  #def inner($x)\n    $x\n  #end def\n  $self.inner(1)\n#end def\n");
    assert!(out.contains("def outer("));
    assert!(out.contains("def inner(x"));
    // useSearchList is disabled inside the nested closure, so $x is a
    // direct reference rather than a VFFSL-wrapped lookup.
    let inner_start = out.find("def inner(").unwrap();
    let inner_body = &out[inner_start..];
    let first_write = inner_body.find("write(").unwrap();
    let snippet = &inner_body[first_write..first_write + 40];
    assert!(!snippet.contains("VFFSL"), "expected a direct reference, got: {snippet}");
}

#[test]
fn call_region_redirects_its_body_into_a_buffered_transaction() {
    let out = compile_ok("#call $wrap\nhi\n#end call\n");
    assert!(out.contains("VFFSL("));
    assert!(out.contains("\"wrap\""));
    assert!(out.contains("_callCollector"));
    assert!(out.contains("_callArgVal"));
}

#[test]
fn extends_auto_imports_the_base_and_renames_the_main_method() {
    let out = compile_ok("#extends Base\n$x\n");
    assert!(out.contains("from Base import Base"));
    assert!(out.contains("class DynamicallyCompiledCheetahTemplate(Base):"));
    assert!(out.contains("def writeBody("));
    assert!(!out.contains("def respond("));
}

#[test]
fn short_form_ternary_emits_an_if_else_with_one_write_per_branch() {
    let out = compile_ok("#if $a then $b else $c\n");
    assert!(out.contains("if VFFSL("));
    assert!(out.contains("else:"));
    assert!(out.contains("\"b\""));
    assert!(out.contains("\"c\""));
}

#[test]
fn unbalanced_brackets_in_an_expression_fail_with_a_located_lexical_error() {
    let result = compile("$foo(1, 2\n", CompileOptions::default());
    assert!(matches!(result, Err(CompileError::Lexical { .. })), "{result:?}");
}

#[test]
fn mismatched_end_is_reported_with_both_names() {
    let result = compile("#if $a\nhi\n#end for\n", CompileOptions::default());
    match result {
        Err(CompileError::MismatchedEnd { expected, found, .. }) => {
            assert_eq!(expected, "if");
            assert_eq!(found, "for");
        }
        other => panic!("expected MismatchedEnd, got {other:?}"),
    }
}

#[test]
fn escaped_tokens_render_as_literal_dollar_and_hash() {
    let out = compile_ok(r"\$not a var \#not a directive");
    assert!(out.contains("$not a var #not a directive"));
}

#[test]
fn compiling_the_same_source_twice_is_byte_identical() {
    let a = compile_ok("#if $x\nhi\n#end if\n");
    let b = compile_ok("#if $x\nhi\n#end if\n");
    assert_eq!(a, b);
}
