use std::collections::HashSet;
use trawl_core::{extract, ExtractError};

const URL: &str = "http://ex.com/page";

#[test]
fn extracts_title_body_and_links() {
    let html = r#"<html><head><title>Test</title></head><body><h1>Parse me!</h1><a href="/about">x</a></body></html>"#;
    let page = extract(URL, html).unwrap();
    assert_eq!(page.title, "Test");
    assert!(page.body.contains("Parse me!"));
    assert_eq!(page.links, HashSet::from(["http://ex.com/about".to_string()]));
}

#[test]
fn missing_title_is_empty() {
    let page = extract(URL, "<body><p>Only text</p></body>").unwrap();
    assert_eq!(page.title, "");
    assert_eq!(page.body, "Only text ");
}

#[test]
fn heading_made_of_a_link_contributes_no_text() {
    let page = extract(URL, r#"<h1><a href="/x">Home</a></h1><p>Body text</p>"#).unwrap();
    assert!(!page.body.contains("Home"));
    assert!(page.body.contains("Body text"));
    assert!(page.links.contains("http://ex.com/x"));
}

#[test]
fn link_after_text_in_paragraph_is_kept() {
    let page = extract(URL, r#"<p>See <a href="/doc">the docs</a> now</p>"#).unwrap();
    assert_eq!(page.body, "See  the docs  now ");
}

#[test]
fn text_outside_text_tags_is_ignored() {
    let page = extract(URL, "<div>menu</div><p>kept <b>bold</b></p><span>footer</span>").unwrap();
    assert_eq!(page.body, "kept  bold ");
}

#[test]
fn script_inside_paragraph_is_not_text() {
    let page = extract(URL, "<p>before<script>var x = 1;</script>after</p>").unwrap();
    assert_eq!(page.body, "before after ");
}

#[test]
fn mismatched_close_tag_recovers() {
    // </div> closes the div and silently drops the unclosed <p><b>.
    let html = "<div><p><b>inside</div><span>after</span><h2>Next</h2>";
    let page = extract(URL, html).unwrap();
    assert!(page.body.contains("inside"));
    assert!(!page.body.contains("after"));
    assert!(page.body.contains("Next"));
}

#[test]
fn stray_close_tag_is_ignored() {
    let page = extract(URL, "<p>one</em> two</p>").unwrap();
    assert_eq!(page.body, "one  two ");
}

#[test]
fn second_title_is_malformed() {
    let html = "<html><head><title>One</title></head><body><title>Two</title></body></html>";
    let err = extract(URL, html).unwrap_err();
    assert!(matches!(err, ExtractError::MalformedMarkup(_)));
}

#[test]
fn empty_second_title_is_tolerated() {
    let page = extract(URL, "<title>One</title><title></title>").unwrap();
    assert_eq!(page.title, "One");
}

#[test]
fn entities_are_decoded() {
    let page = extract(URL, "<title>Tom &amp; Jerry</title><p>caf&eacute; &lt;ok&gt; &#39;q&#39;</p>").unwrap();
    assert_eq!(page.title, "Tom & Jerry");
    assert_eq!(page.body, "café <ok> 'q' ");
}

#[test]
fn links_are_resolved_and_deduplicated() {
    let html = r##"
        <a href="#top">top</a>
        <a href="/a">a</a>
        <a href="/a">again</a>
        <a href="b/c">rel</a>
        <a href="https://other.org/x">abs</a>
        <a name="anchor">no href</a>
    "##;
    let page = extract("https://ex.com/dir/page", html).unwrap();
    let expected: HashSet<String> = [
        "https://ex.com/a",
        "https://ex.com/b/c",
        "https://other.org/x",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(page.links, expected);
}

#[test]
fn slash_links_are_appended_to_the_origin() {
    let page = extract(URL, r#"<a href="//evil.com/x">x</a><a href="/a/../b">y</a>"#).unwrap();
    let expected: HashSet<String> =
        ["http://ex.com//evil.com/x", "http://ex.com/a/../b"].into_iter().map(String::from).collect();
    assert_eq!(page.links, expected);
}

#[test]
fn origin_keeps_a_non_default_port() {
    let page = extract("http://127.0.0.1:8080/dir/page", r#"<a href="/next">n</a>"#).unwrap();
    assert_eq!(page.links, HashSet::from(["http://127.0.0.1:8080/next".to_string()]));
}

#[test]
fn unbalanced_attribute_quote_is_read_as_text() {
    let html = r#"<title>Page</title><p>Intro <a href="/x>link</a> more</p><p>Rest</p>"#;
    let page = extract(URL, html).unwrap();
    assert_eq!(page.title, "Page");
    assert!(page.body.contains("Intro"));
    assert!(page.body.contains("link"));
    assert!(page.body.contains("Rest"));
    assert!(page.links.is_empty());
}

#[test]
fn unbalanced_quote_without_closing_bracket_cannot_be_parsed() {
    assert!(matches!(
        extract(URL, r#"<p>text</p><a href="/x"#),
        Err(ExtractError::MalformedMarkup(_))
    ));
}

#[test]
fn unterminated_tag_cannot_be_parsed() {
    assert!(matches!(
        extract(URL, "<p>text</p><img src=\"x\""),
        Err(ExtractError::MalformedMarkup(_))
    ));
}
