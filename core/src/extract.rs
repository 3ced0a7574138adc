//! Streaming extraction of title, body text and outbound links from raw HTML.
//!
//! The markup is read as a flat stream of start tag, end tag and text events.
//! A stack of open tag names gives the context of each text chunk. Broken
//! nesting is tolerated: an end tag closes the nearest matching open tag and
//! silently discards anything opened after it, and an end tag with no open
//! counterpart is ignored. Only a tag stream that cannot be read at all
//! (an unterminated tag or comment) or a page with two titles is rejected.

use crate::ExtractError;
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

const LINK_TAG: &str = "a";
const TITLE_TAG: &str = "title";
const TEXT_TAGS: [&str; 6] = ["p", "h1", "h2", "h3", "h4", "h5"];
const RAW_TEXT_TAGS: [&str; 2] = ["script", "style"];

/// What the indexer needs from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Text of the `<title>` element, trimmed; empty when the page has none.
    pub title: String,
    /// Text chunks found under paragraph and heading tags, each followed by a space.
    pub body: String,
    /// Deduplicated absolute urls of the page anchors.
    pub links: HashSet<String>,
}

/// Parse `html` fetched from `url`. Relative links are resolved against `url`.
pub fn extract(url: &str, html: &str) -> Result<ExtractedPage, ExtractError> {
    let mut parser = PageParser::new();
    let mut lexer = Lexer::new(html);
    while let Some(event) = lexer.next_event()? {
        parser.handle(event)?;
    }
    Ok(ExtractedPage {
        title: parser.title.trim().to_string(),
        body: parser.body,
        links: resolve_links(url, &parser.links),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event<'a> {
    Start { name: String, attrs: Vec<(String, Option<String>)>, self_closing: bool },
    End { name: String },
    Text(Cow<'a, str>),
}

fn malformed(msg: impl Into<String>) -> ExtractError {
    ExtractError::MalformedMarkup(msg.into())
}

struct Lexer<'a> {
    html: &'a str,
    pos: usize,
    /// Set after `<script>`/`<style>`: everything up to the matching end tag is text.
    raw_text: Option<String>,
}

impl<'a> Lexer<'a> {
    fn new(html: &'a str) -> Self {
        Self { html, pos: 0, raw_text: None }
    }

    fn next_event(&mut self) -> Result<Option<Event<'a>>, ExtractError> {
        loop {
            if self.pos >= self.html.len() {
                return Ok(None);
            }
            let rest = &self.html[self.pos..];

            if let Some(tag) = self.raw_text.take() {
                let needle = format!("</{tag}");
                let end = rest.to_ascii_lowercase().find(&needle).unwrap_or(rest.len());
                if end > 0 {
                    self.pos += end;
                    return Ok(Some(Event::Text(Cow::Borrowed(&rest[..end]))));
                }
            }

            if !rest.starts_with('<') {
                let end = rest.find('<').unwrap_or(rest.len());
                self.pos += end;
                return Ok(Some(Event::Text(html_escape::decode_html_entities(&rest[..end]))));
            }

            let bytes = rest.as_bytes();
            if rest.starts_with("<!--") {
                let end = rest[4..].find("-->").ok_or_else(|| malformed("unterminated comment"))?;
                self.pos += 4 + end + 3;
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                let end = rest.find('>').ok_or_else(|| malformed("unterminated declaration"))?;
                self.pos += end + 1;
                continue;
            }
            if rest.starts_with("</") {
                let end = rest.find('>').ok_or_else(|| malformed("unterminated end tag"))?;
                self.pos += end + 1;
                let name: String = rest[2..end]
                    .chars()
                    .take_while(|c| !c.is_whitespace() && *c != '/')
                    .collect();
                if name.is_empty() {
                    continue;
                }
                return Ok(Some(Event::End { name: name.to_ascii_lowercase() }));
            }
            if bytes.get(1).is_some_and(u8::is_ascii_alphabetic) {
                return self.start_tag(rest).map(Some);
            }

            // A lone '<' that opens nothing is plain text.
            let end = rest[1..].find('<').map_or(rest.len(), |i| i + 1);
            self.pos += end;
            return Ok(Some(Event::Text(html_escape::decode_html_entities(&rest[..end]))));
        }
    }

    fn start_tag(&mut self, rest: &'a str) -> Result<Event<'a>, ExtractError> {
        let bytes = rest.as_bytes();
        let name_end = bytes[1..]
            .iter()
            .position(|b| b.is_ascii_whitespace() || *b == b'/' || *b == b'>')
            .map_or(bytes.len(), |i| i + 1);
        let name = rest[1..name_end].to_ascii_lowercase();

        let mut quote: Option<u8> = None;
        let mut prev = b' ';
        let mut end = None;
        for (i, &b) in bytes.iter().enumerate().skip(name_end) {
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if (b == b'"' || b == b'\'') && prev == b'=' => quote = Some(b),
                None if b == b'>' => {
                    end = Some(i);
                    break;
                }
                None => {}
            }
            if !b.is_ascii_whitespace() {
                prev = b;
            }
        }
        let end = match end {
            Some(end) => end,
            // An attribute quote that never closes: the run up to the first '>' is text.
            None if quote.is_some() => {
                let gt = rest[name_end..]
                    .find('>')
                    .ok_or_else(|| malformed(format!("unterminated tag <{name}")))?;
                let run = &rest[..name_end + gt + 1];
                debug!(tag = %name, "unbalanced attribute quote, keeping the tag as text");
                self.pos += run.len();
                return Ok(Event::Text(html_escape::decode_html_entities(run)));
            }
            None => return Err(malformed(format!("unterminated tag <{name}"))),
        };

        let attr_src = &rest[name_end..end];
        let self_closing = attr_src.trim_end().ends_with('/');
        let attrs = parse_attrs(attr_src);
        self.pos += end + 1;
        if !self_closing && RAW_TEXT_TAGS.contains(&name.as_str()) {
            self.raw_text = Some(name.clone());
        }
        Ok(Event::Start { name, attrs, self_closing })
    }
}

fn parse_attrs(src: &str) -> Vec<(String, Option<String>)> {
    let b = src.as_bytes();
    let len = b.len();
    let mut attrs = Vec::new();
    let mut i = 0;
    while i < len {
        while i < len && (b[i].is_ascii_whitespace() || b[i] == b'/') {
            i += 1;
        }
        let start = i;
        while i < len && !b[i].is_ascii_whitespace() && b[i] != b'=' && b[i] != b'/' {
            i += 1;
        }
        if start == i {
            i += 1;
            continue;
        }
        let name = src[start..i].to_ascii_lowercase();
        while i < len && b[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < len && b[i] == b'=' {
            i += 1;
            while i < len && b[i].is_ascii_whitespace() {
                i += 1;
            }
            let value = if i < len && (b[i] == b'"' || b[i] == b'\'') {
                let q = b[i];
                let vs = i + 1;
                i = vs;
                while i < len && b[i] != q {
                    i += 1;
                }
                let v = &src[vs..i.min(len)];
                i += 1;
                v
            } else {
                let vs = i;
                while i < len && !b[i].is_ascii_whitespace() {
                    i += 1;
                }
                &src[vs..i]
            };
            attrs.push((name, Some(html_escape::decode_html_entities(value).into_owned())));
        } else {
            attrs.push((name, None));
        }
    }
    attrs
}

struct PageParser {
    stack: Vec<String>,
    /// True until the first accepted chunk of the current text-bearing element.
    first_chunk: bool,
    title_tags: usize,
    title: String,
    body: String,
    links: Vec<String>,
}

impl PageParser {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            first_chunk: true,
            title_tags: 0,
            title: String::new(),
            body: String::new(),
            links: Vec::new(),
        }
    }

    fn handle(&mut self, event: Event<'_>) -> Result<(), ExtractError> {
        match event {
            Event::Start { name, attrs, self_closing } => {
                self.open(&name, &attrs);
                if self_closing {
                    self.close(&name);
                }
            }
            Event::End { name } => self.close(&name),
            Event::Text(text) => self.data(&text)?,
        }
        Ok(())
    }

    fn open(&mut self, name: &str, attrs: &[(String, Option<String>)]) {
        if name == LINK_TAG {
            let href = attrs.iter().find(|(k, _)| k == "href").and_then(|(_, v)| v.clone());
            if let Some(href) = href {
                self.links.push(href);
            }
        }
        if name == TITLE_TAG {
            self.title_tags += 1;
        }
        if TEXT_TAGS.contains(&name) {
            self.first_chunk = true;
        }
        self.stack.push(name.to_string());
    }

    fn close(&mut self, name: &str) {
        if self.stack.last().is_some_and(|top| top == name) {
            self.stack.pop();
            return;
        }
        match self.stack.iter().rposition(|open| open == name) {
            Some(idx) => {
                debug!(tag = name, discarded = ?&self.stack[idx + 1..], "closing mismatched tag");
                self.stack.truncate(idx);
            }
            None => debug!(tag = name, "ignoring end tag with no open counterpart"),
        }
    }

    fn data(&mut self, text: &str) -> Result<(), ExtractError> {
        let current = self.stack.last().map(String::as_str);
        if current == Some(TITLE_TAG) {
            if self.title_tags > 1 && !self.title.trim().is_empty() && !text.trim().is_empty() {
                return Err(malformed(format!(
                    "several title tags: {:?} then {:?}",
                    self.title.trim(),
                    text.trim()
                )));
            }
            self.title.push_str(text);
        } else if current.is_some_and(|t| RAW_TEXT_TAGS.contains(&t)) {
            return Ok(());
        } else if self.in_text_context() {
            // Skip headings and paragraphs made of nothing but a link label.
            if !(current == Some(LINK_TAG) && self.first_chunk) {
                self.body.push_str(text);
                self.body.push(' ');
                self.first_chunk = false;
            }
        }
        Ok(())
    }

    fn in_text_context(&self) -> bool {
        self.stack.iter().any(|t| TEXT_TAGS.contains(&t.as_str()))
    }
}

/// Turn raw `href` values into absolute urls. Targets without a scheme are
/// appended verbatim to the page origin (`scheme://host[:port]`), so
/// `//other.org/x` stays on the page host and `..` segments are kept.
fn resolve_links(page_url: &str, raw: &[String]) -> HashSet<String> {
    let origin = Url::parse(page_url)
        .ok()
        .filter(Url::has_host)
        .map(|u| u.origin().ascii_serialization());
    let mut links = HashSet::new();
    for link in raw {
        let link = link.trim();
        if link.starts_with('#') {
            continue;
        }
        if Url::parse(link).is_ok() {
            links.insert(link.to_string());
            continue;
        }
        match &origin {
            Some(origin) if link.starts_with('/') => {
                links.insert(format!("{origin}{link}"));
            }
            Some(origin) => {
                links.insert(format!("{origin}/{link}"));
            }
            None => debug!(link, page_url, "no origin to resolve link against"),
        }
    }
    links
}
