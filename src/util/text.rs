use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string in terminal columns (CJK and emoji count as 2).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

const ELLIPSIS: &str = "...";

/// Truncate `s` to at most `max_width` columns, appending "..." when cut.
///
/// Widths of 3 or less have no room for the ellipsis and return as many
/// leading characters as fit. Returns `Cow::Borrowed` when nothing is cut.
///
/// # Examples
///
/// ```
/// use gstv_feed::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Rain alert in Surat", 10), "Rain al...");
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let (budget, suffix) = if max_width <= ELLIPSIS.len() {
        (max_width, "")
    } else {
        (max_width - ELLIPSIS.len(), ELLIPSIS)
    };

    let mut used = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        cut = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..cut], suffix))
}

/// Strip terminal control characters and ANSI escape sequences.
///
/// Article text comes from a CMS and is rendered straight into the terminal,
/// so CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ST`) sequences, bare
/// ESC, DEL and C0 controls are removed. Tab, newline and CR are kept.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    // Parameters and intermediates up to the final byte
                    for n in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&n) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(n) = chars.next() {
                        if n == '\x07' {
                            break;
                        }
                        if n == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped_control(c) {
            out.push(c);
        }
    }

    Cow::Owned(out)
}

fn is_stripped_control(c: char) -> bool {
    c == '\x1b' || c == '\x7f' || (c < '\x20' && !matches!(c, '\t' | '\n' | '\r'))
}

/// Tags that end a paragraph-level block.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "figure", "figcaption", "tr", "table", "section",
];

/// Tags whose content is never shown.
const HIDDEN_TAGS: &[&str] = &["script", "style", "iframe", "noscript"];

/// Convert an HTML article body into plain paragraphs for the reader.
///
/// Block-level tags become paragraph breaks, `<li>` items get a bullet, the
/// content of script/style/embed tags is dropped, and the common named and
/// numeric entities are decoded. Runs of whitespace collapse to one space and
/// the result never contains more than one blank line in a row.
///
/// # Examples
///
/// ```
/// use gstv_feed::util::html_to_text;
///
/// let text = html_to_text("<p>Heavy rain in <b>Surat</b></p><p>Schools shut&nbsp;today</p>");
/// assert_eq!(text, "Heavy rain in Surat\n\nSchools shut today");
/// ```
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut hidden_until: Option<String> = None;

    while let Some(lt) = rest.find('<') {
        if hidden_until.is_none() {
            push_text(&mut out, &rest[..lt]);
        }
        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            // Unterminated tag: treat the remainder as text
            if hidden_until.is_none() {
                push_text(&mut out, &rest[lt..]);
            }
            rest = "";
            break;
        };

        let tag = &after[..gt];
        rest = &after[gt + 1..];

        let closing = tag.starts_with('/');
        let name: String = tag
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if let Some(hidden) = &hidden_until {
            if closing && *hidden == name {
                hidden_until = None;
            }
            continue;
        }

        if HIDDEN_TAGS.contains(&name.as_str()) && !closing && !tag.ends_with('/') {
            hidden_until = Some(name);
            continue;
        }

        if BLOCK_TAGS.contains(&name.as_str()) {
            out.push_str("\n\n");
            if name == "li" && !closing {
                out.push_str("• ");
            }
        }
    }
    if hidden_until.is_none() {
        push_text(&mut out, rest);
    }

    normalize_paragraphs(&out)
}

fn push_text(out: &mut String, raw: &str) {
    if raw.is_empty() {
        return;
    }
    out.push_str(&decode_entities(raw));
}

fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        // Entities are short; anything longer is a literal ampersand
        match tail[1..].find(';').filter(|&semi| semi <= 10) {
            Some(semi) => {
                let entity = &tail[1..semi + 1];
                match decode_entity(entity) {
                    Some(c) => out.push(c),
                    None => out.push_str(&tail[..semi + 2]),
                }
                rest = &tail[semi + 2..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        "ndash" => Some('–'),
        "mdash" => Some('—'),
        "hellip" => Some('…'),
        "rsquo" => Some('’'),
        "lsquo" => Some('‘'),
        "rdquo" => Some('”'),
        "ldquo" => Some('“'),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Collapse whitespace inside paragraphs and keep single blank lines between them.
fn normalize_paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
