//! Markdown helpers for rendering remote text inside chat posts

/// Replace markdown-reserved characters with HTML entities so remote
/// subjects cannot break table or link syntax.
pub fn markdown_to_html_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match entity_for(ch) {
            Some(entity) => out.push_str(entity),
            None => out.push(ch),
        }
    }
    out
}

const fn entity_for(ch: char) -> Option<&'static str> {
    Some(match ch {
        '!' => "&#33;",
        '#' => "&#35;",
        '(' => "&#40;",
        ')' => "&#41;",
        '*' => "&#42;",
        '+' => "&#43;",
        '-' => "&#45;",
        '.' => "&#46;",
        '/' => "&#47;",
        ':' => "&#58;",
        '<' => "&#60;",
        '>' => "&#62;",
        '[' => "&#91;",
        '\\' => "&#92;",
        ']' => "&#93;",
        '_' => "&#95;",
        '`' => "&#96;",
        '|' => "&#124;",
        '~' => "&#126;",
        _ => return None,
    })
}

/// Subject shown when the remote event has none.
pub fn ensure_subject(subject: &str) -> &str {
    if subject.is_empty() {
        "(No subject)"
    } else {
        subject
    }
}
