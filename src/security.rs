//! Escaping and encoding helpers used by the filter library

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left alone by query-string encoding (`-_.~` and alphanumerics)
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Reserved characters kept verbatim by IRI encoding
const IRI_RESERVED: &str = "/#%[]=:;$&()+,!?*@'~";

/// HTML and JavaScript escaping
pub struct HtmlEscaper;

impl HtmlEscaper {
    /// Escape HTML special characters
    pub fn escape(input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        for c in input.chars() {
            match c {
                '&' => output.push_str("&amp;"),
                '>' => output.push_str("&gt;"),
                '<' => output.push_str("&lt;"),
                '"' => output.push_str("&quot;"),
                '\'' => output.push_str("&#39;"),
                c => output.push(c),
            }
        }
        output
    }

    /// Escape for use inside JavaScript string literals
    ///
    /// ASCII letters, digits, space and `/` pass through; everything else
    /// becomes `\uXXXX` (UTF-16 code units).
    pub fn escape_js(input: &str) -> String {
        let mut output = String::with_capacity(input.len());
        for c in input.chars() {
            if c.is_ascii_alphanumeric() || c == ' ' || c == '/' {
                output.push(c);
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    output.push_str(&format!("\\u{:04X}", unit));
                }
            }
        }
        output
    }

    /// Backslash-escape `\`, `"` and `'`
    pub fn add_slashes(input: &str) -> String {
        input
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\'', "\\'")
    }
}

/// Query-string encoding; spaces become `+`
pub fn url_encode(input: &str) -> String {
    input
        .split(' ')
        .map(|part| utf8_percent_encode(part, QUERY).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Encode an IRI into a URI, keeping reserved characters
pub fn iri_encode(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut buf = [0u8; 4];
    for c in input.chars() {
        if IRI_RESERVED.contains(c) {
            output.push(c);
        } else {
            output.push_str(&url_encode(c.encode_utf8(&mut buf)));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            HtmlEscaper::escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(HtmlEscaper::escape("plain"), "plain");
    }

    #[test]
    fn test_js_escape() {
        assert_eq!(HtmlEscaper::escape_js("a b/c"), "a b/c");
        assert_eq!(HtmlEscaper::escape_js("'\n"), "\\u0027\\u000A");
        assert_eq!(HtmlEscaper::escape_js("😀"), "\\uD83D\\uDE00");
    }

    #[test]
    fn test_add_slashes() {
        assert_eq!(HtmlEscaper::add_slashes(r#"I'm "x" \"#), r#"I\'m \"x\" \\"#);
    }

    #[test]
    fn test_url_encoding() {
        assert_eq!(url_encode("a b&c=d/é"), "a+b%26c%3Dd%2F%C3%A9");
        assert_eq!(url_encode("safe-_.~"), "safe-_.~");
        assert_eq!(
            iri_encode("/path?q=ä ö#frag"),
            "/path?q=%C3%A4+%C3%B6#frag"
        );
    }
}
