use std::borrow::Cow;

/// Maximum description length in characters before an ellipsis is appended.
pub const DESCRIPTION_LIMIT: usize = 250;

/// Ellipsis string used for truncation
const ELLIPSIS: &str = "...";

/// Elements whose text content never reaches the reader.
const SKIPPED_ELEMENTS: [&str; 2] = ["script", "style"];

/// Elements that separate words when rendered, so removing them must leave a space.
const BREAKING_ELEMENTS: [&str; 16] = [
    "br", "p", "div", "li", "ul", "ol", "tr", "td", "h1", "h2", "h3", "h4", "h5", "h6",
    "blockquote", "hr",
];

/// Converts an HTML fragment to plain text.
///
/// Tags are removed, `<script>`/`<style>` bodies are dropped, block-level
/// boundaries become spaces and HTML entities (`&amp;`, `&nbsp;`, `&#8217;`, ...)
/// are decoded. A `<` that cannot open a tag (`"a < b"`) is kept as text.
///
/// # Examples
///
/// ```
/// use podfeed::util::strip_html;
///
/// assert_eq!(strip_html("<p>Tom &amp; Jerry</p>"), " Tom & Jerry ");
/// assert_eq!(strip_html("1 < 2"), "1 < 2");
/// ```
pub fn strip_html(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.to_string();
    }

    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];

        let opens_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        if !opens_tag {
            out.push('<');
            rest = after;
            continue;
        }

        // An unterminated tag swallows the remainder, as a browser would
        let Some(gt) = after.find('>') else {
            rest = "";
            break;
        };

        let tag = &after[..gt];
        rest = &after[gt + 1..];

        let name = tag_name(tag);
        if !tag.starts_with('/') && SKIPPED_ELEMENTS.contains(&name.as_str()) {
            rest = skip_element_body(rest, &name);
            out.push(' ');
        } else if BREAKING_ELEMENTS.contains(&name.as_str()) {
            out.push(' ');
        }
    }
    out.push_str(rest);

    html_escape::decode_html_entities(&out).into_owned()
}

/// Lowercased element name of a tag body such as `/P` or `img src="x"`.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Returns the input following the closing tag of `name`, or `""` if it never closes.
fn skip_element_body<'a>(rest: &'a str, name: &str) -> &'a str {
    let lower = rest.to_ascii_lowercase();
    let closing = format!("</{name}");
    match lower.find(&closing) {
        Some(start) => match rest[start..].find('>') {
            Some(end) => &rest[start + end + 1..],
            None => "",
        },
        None => "",
    }
}

/// Collapses every whitespace run to a single space and trims both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to at most `max_chars` characters, appending `...` when anything was cut.
///
/// Counts characters rather than bytes so multi-byte text never splits mid-codepoint.
/// Returns `Cow::Borrowed` when the input already fits.
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS)),
        None => Cow::Borrowed(s),
    }
}

/// Turns an upstream description (often HTML) into a short plain-text blurb.
///
/// HTML is stripped, control characters removed, whitespace collapsed and the
/// result cut at [`DESCRIPTION_LIMIT`] characters. The output is never longer
/// than `DESCRIPTION_LIMIT + 3` characters.
pub fn sanitize_description(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let text = strip_html(raw);
    let text = collapse_whitespace(&strip_control_chars(&text));
    truncate_chars(&text, DESCRIPTION_LIMIT).into_owned()
}

/// Cleans a single-line field such as a title or author name.
pub fn clean_inline(raw: &str) -> String {
    collapse_whitespace(&strip_control_chars(raw))
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences from text.
///
/// Feed text is attacker-controlled and ends up on a terminal when printed by
/// the CLI. Removes C0 controls (except tab, newline, CR), DEL, CSI sequences
/// (`\x1b[` ... final byte 0x40-0x7E), OSC sequences (`\x1b]` ... BEL or ST)
/// and bare ESC bytes.
///
/// Returns `Cow::Borrowed` when the input contains no control characters (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let is_control = |b: u8| b == 0x1b || b == 0x7f || (b < 0x20 && !matches!(b, 0x09 | 0x0a | 0x0d));

    let bytes = s.as_bytes();
    if !bytes.iter().any(|&b| is_control(b)) {
        return Cow::Borrowed(s);
    }

    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];
        if b == 0x1b {
            match bytes.get(i + 1) {
                Some(b'[') => {
                    i += 2;
                    while i < len {
                        let c = bytes[i];
                        i += 1;
                        if (0x40..=0x7e).contains(&c) {
                            break;
                        }
                    }
                }
                Some(b']') => {
                    i += 2;
                    while i < len {
                        if bytes[i] == 0x07 {
                            i += 1;
                            break;
                        }
                        if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                            i += 2;
                            break;
                        }
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        } else if is_control(b) {
            i += 1;
        } else {
            let start = i;
            while i < len && !is_control(bytes[i]) {
                i += 1;
            }
            // Only ASCII control bytes end a run, and those never occur
            // inside a multi-byte UTF-8 sequence.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}
