use chrono::{DateTime, Utc};

const MAX_STEM_BYTES: usize = 80;
const FALLBACK_STEM: &str = "Unknown_Novel";
const HASH_LEN: usize = 6;

/// `{sanitized_novel}_{count}ch_{YYYYMMDDTHHMMSS}_{hash6}.html`
///
/// The hash covers the concatenated chapter titles, so two downloads of the
/// same chapters at the same second get the same name.
pub fn document_filename<'a>(
    novel_title: &str,
    chapter_titles: impl IntoIterator<Item = &'a str>,
    chapter_count: usize,
    generated_at: DateTime<Utc>,
) -> String {
    let stem = sanitize_file_name(novel_title);
    let timestamp = generated_at.format("%Y%m%dT%H%M%S");
    let joined: String = chapter_titles.into_iter().collect();
    let mut hash = title_hash(&joined);
    hash.truncate(HASH_LEN);
    format!("{stem}_{chapter_count}ch_{timestamp}_{hash}.html")
}

/// Filesystem-safe stem: forbidden characters and whitespace become `_`,
/// runs of `_` collapse, Windows device names get a trailing `_`.
pub fn sanitize_file_name(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.trim().chars() {
        let c = if is_forbidden(c) || c.is_whitespace() {
            '_'
        } else {
            c
        };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    let mut stem = compacted.trim_matches(['_', '.']).to_string();
    if stem.len() > MAX_STEM_BYTES {
        let mut end = MAX_STEM_BYTES;
        while !stem.is_char_boundary(end) {
            end -= 1;
        }
        stem.truncate(end);
    }
    if stem.is_empty() {
        return FALLBACK_STEM.to_string();
    }
    if is_reserved_windows_name(&stem) {
        stem.push('_');
    }
    stem
}

/// Shift-subtract string hash (`h = h * 31 + unit` over UTF-16 units,
/// wrapping at 32 bits), absolute value in base 36. Not collision resistant;
/// only used to label files.
pub fn title_hash(input: &str) -> String {
    let hash = input.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32)
    });
    to_base36(i64::from(hash).unsigned_abs())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
