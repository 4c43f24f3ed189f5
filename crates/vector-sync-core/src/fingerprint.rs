//! Content fingerprinting.
//!
//! A fingerprint is the SHA-256 of a canonical string built from a record's
//! agent labels, tag labels, title and description:
//!
//! ```text
//! sorted(lower(agent labels)).join(",")
//!   | sorted(lower(tag labels)).join(",")
//!   | lower(trim(strip_markup(title)))
//!   | lower(trim(strip_markup(description)))
//! ```
//!
//! Label order and case never influence the digest, so re-importing the same
//! logical item always lands on the same fingerprint. Stored fingerprints
//! depend on these exact rules: lower-casing is ASCII-only, trimming only
//! removes the six ASCII blank characters listed in [`TRIM_CHARS`], and
//! [`strip_markup`] follows PHP's `strip_tags` byte for byte.

use sha2::{Digest, Sha256};

use crate::models::Term;

/// Characters removed from both ends of title and description.
pub const TRIM_CHARS: [char; 6] = [' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Compute the hex-encoded fingerprint of a context item.
///
/// Term labels are taken as stored; see [`canonical_string`] for the exact
/// input to the hash.
pub fn fingerprint(agents: &[Term], tags: &[Term], title: &str, description: &str) -> String {
    let canonical = canonical_string(agents, tags, title, description);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the `|`-separated canonical string that [`fingerprint`] hashes.
pub fn canonical_string(agents: &[Term], tags: &[Term], title: &str, description: &str) -> String {
    [
        label_key(agents),
        label_key(tags),
        normalize_text(title),
        normalize_text(description),
    ]
    .join("|")
}

/// Lower-case, sort and comma-join the labels of a term list.
fn label_key(terms: &[Term]) -> String {
    let mut keys: Vec<String> = terms.iter().map(|t| t.label.to_ascii_lowercase()).collect();
    keys.sort();
    keys.join(",")
}

/// Strip markup, trim, and lower-case a free-text field.
pub fn normalize_text(text: &str) -> String {
    strip_markup(text)
        .trim_matches(&TRIM_CHARS[..])
        .to_ascii_lowercase()
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    Text,
    /// Inside `<...>`.
    Tag,
    /// Inside `<?...?>`.
    Processing,
    /// Inside `<!...>`.
    Declaration,
    /// Inside `<!--...-->`.
    Comment,
}

/// C `isspace`, which unlike [`u8::is_ascii_whitespace`] includes `\x0B`.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}

fn toggle_quote(in_quote: &mut Option<u8>, c: u8) {
    match *in_quote {
        None => *in_quote = Some(c),
        Some(q) if q == c => *in_quote = None,
        Some(_) => {}
    }
}

/// Remove markup from `input` the way PHP's `strip_tags` does.
///
/// - A `<` opens a tag unless the next byte is whitespace; a `<` at the very
///   end of the input opens a tag too, so it is removed.
/// - A `<` inside a tag nests: the matching `>` closes it instead of the tag.
/// - A `>` inside a quoted attribute value does not close the tag.
/// - `<!-- ... -->` comments, `<!...>` declarations and `<?...?>`
///   processing instructions are removed.
/// - An unterminated tag swallows the rest of the input.
/// - NUL bytes outside tags are dropped.
pub fn strip_markup(input: &str) -> String {
    let buf = input.as_bytes();
    let mut out = Vec::with_capacity(buf.len());
    let mut state = State::Text;
    let mut depth = 0usize;
    let mut in_quote: Option<u8> = None;
    let mut last = 0u8;
    let mut parens = 0i32;
    let mut xml = false;

    let prev = |i: usize, n: usize| if i >= n { buf[i - n] } else { 0 };

    for (i, &c) in buf.iter().enumerate() {
        let next_is_space = buf.get(i + 1).copied().is_some_and(is_space);

        match state {
            State::Text => match c {
                0 => {}
                b'<' if next_is_space => out.push(c),
                b'<' => {
                    last = b'<';
                    state = State::Tag;
                }
                b'>' if depth > 0 => depth -= 1,
                _ => out.push(c),
            },
            State::Tag => match c {
                b'<' => {
                    if in_quote.is_none() && !next_is_space {
                        depth += 1;
                    }
                }
                b'>' => {
                    if depth > 0 {
                        depth -= 1;
                    } else if in_quote.is_none() && !(xml && prev(i, 1) == b'-') {
                        last = b'>';
                        in_quote = None;
                        xml = false;
                        state = State::Text;
                    }
                }
                b'"' | b'\'' => toggle_quote(&mut in_quote, c),
                b'!' if prev(i, 1) == b'<' => {
                    last = c;
                    state = State::Declaration;
                }
                b'?' if prev(i, 1) == b'<' => {
                    parens = 0;
                    state = State::Processing;
                }
                _ => {}
            },
            State::Processing => match c {
                b'(' if last != b'"' && last != b'\'' => {
                    last = c;
                    parens += 1;
                }
                b')' if last != b'"' && last != b'\'' => {
                    last = c;
                    parens -= 1;
                }
                b'>' => {
                    if depth > 0 {
                        depth -= 1;
                    } else if in_quote.is_none()
                        && parens == 0
                        && last != b'"'
                        && prev(i, 1) == b'?'
                    {
                        in_quote = None;
                        state = State::Text;
                    }
                }
                b'"' | b'\'' if i >= 1 && prev(i, 1) != b'\\' => {
                    if last == c {
                        last = 0;
                    } else if last != b'\\' {
                        last = c;
                    }
                    toggle_quote(&mut in_quote, c);
                }
                // `<?xml` is markup, not a processing instruction.
                b'l' | b'L'
                    if i > 4
                        && prev(i, 1).eq_ignore_ascii_case(&b'm')
                        && prev(i, 2).eq_ignore_ascii_case(&b'x')
                        && prev(i, 3) == b'?'
                        && prev(i, 4) == b'<' =>
                {
                    xml = true;
                    state = State::Tag;
                }
                _ => {}
            },
            State::Declaration => match c {
                b'>' => {
                    if depth > 0 {
                        depth -= 1;
                    } else if in_quote.is_none() {
                        state = State::Text;
                    }
                }
                b'"' | b'\'' if prev(i, 1) != b'\\' => toggle_quote(&mut in_quote, c),
                b'-' if prev(i, 1) == b'-' && prev(i, 2) == b'!' => state = State::Comment,
                b'e' | b'E' if i > 6 && buf[i - 6..i].eq_ignore_ascii_case(b"doctyp") => {
                    state = State::Tag;
                }
                _ => {}
            },
            State::Comment => {
                if c == b'>' && in_quote.is_none() && prev(i, 1) == b'-' && prev(i, 2) == b'-' {
                    state = State::Text;
                }
            }
        }
    }

    // Only ASCII delimiters and NUL bytes are removed, so `out` stays valid UTF-8.
    String::from_utf8_lossy(&out).into_owned()
}
