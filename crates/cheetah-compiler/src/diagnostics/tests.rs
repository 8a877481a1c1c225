use super::*;

#[test]
fn emit_and_count() {
    let mut diags = Diagnostics::new();
    diags.error("bad token", Span::new(0, 3)).emit();
    diags.warning("unused var", Span::new(5, 8)).emit();

    assert_eq!(diags.len(), 2);
    assert_eq!(diags.error_count(), 1);
    assert_eq!(diags.warning_count(), 1);
    assert!(diags.has_errors());
    assert!(diags.has_warnings());
}

#[test]
fn related_and_fix_survive_the_builder() {
    let mut diags = Diagnostics::new();
    diags
        .error("mismatched end", Span::new(10, 13))
        .related_to("opened here", Span::new(0, 3))
        .fix("close the if", "#end if")
        .emit();

    let rendered = diags.printer("0123456789012345").render();
    assert!(rendered.contains("mismatched end"));
}

#[test]
fn empty_diagnostics_render_nothing() {
    let diags = Diagnostics::new();
    assert_eq!(diags.printer("source").render(), "");
}
