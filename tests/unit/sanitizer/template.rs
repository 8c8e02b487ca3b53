use super::*;

#[test]
fn rejects_script_tag() {
    let err = validate_template("<div><script>alert(1)</script></div>", "").unwrap_err();
    assert!(matches!(err, GraphicsError::TemplateRejected(_)));
}

#[test]
fn rejects_inline_event_handler() {
    let err = validate_template(r#"<div onclick="x()">hi</div>"#, "").unwrap_err();
    assert!(matches!(err, GraphicsError::TemplateRejected(_)));
}

#[test]
fn does_not_false_positive_on_data_attribute() {
    let ids = validate_template(r#"<div data-on-click="x">hi</div>"#, "").unwrap();
    assert!(ids.is_empty());
}

#[test]
fn rejects_css_import() {
    let err = validate_template("<div></div>", "@import url(x);").unwrap_err();
    assert!(matches!(err, GraphicsError::TemplateRejected(_)));
}

#[test]
fn rejects_style_breakout() {
    let err = validate_template("<div></div>", "body{}</style><script>x</script>").unwrap_err();
    assert!(matches!(err, GraphicsError::TemplateRejected(_)));
}

#[test]
fn rejects_javascript_scheme() {
    let err = validate_template(r#"<a href="javascript:alert(1)">x</a>"#, "").unwrap_err();
    assert!(matches!(err, GraphicsError::TemplateRejected(_)));
}

#[test]
fn rejects_http_scheme() {
    let err = validate_template(r#"<img src="http://evil.example/x.png">"#, "").unwrap_err();
    assert!(matches!(err, GraphicsError::TemplateRejected(_)));
}

#[test]
fn extracts_asset_ids_from_asset_scheme() {
    let ids = validate_template(r#"<img src="asset://logo_1">"#, "").unwrap();
    assert_eq!(ids.len(), 1);
    assert!(ids.contains("logo_1"));
}

#[test]
fn extracts_asset_ids_from_css_too() {
    let ids = validate_template(
        "<div></div>",
        "background-image: url(asset://bg-2); color: red;",
    )
    .unwrap();
    assert!(ids.contains("bg-2"));
}

#[test]
fn sanitize_css_strips_import_and_comments() {
    let sanitized = sanitize_css("/* c */ @import url(x); .a { color: red; }");
    assert!(!sanitized.contains("@import"));
    assert!(!sanitized.contains("/*"));
    assert!(sanitized.contains(".a"));
}

#[test]
fn sanitize_css_collapses_whitespace() {
    let sanitized = sanitize_css(".a {\n\n  color:  red;\n}");
    assert!(!sanitized.contains('\n'));
}

#[test]
fn sanitize_runs_before_validate_in_manager_pipeline() {
    // sanitize_css removes @import before validate_template runs, so the combined pipeline
    // accepts CSS that would be rejected unsanitized.
    let raw_css = "@import url(evil); .a{color:red}";
    let sanitized = sanitize_css(raw_css);
    assert!(validate_template("<div></div>", &sanitized).is_ok());
}
