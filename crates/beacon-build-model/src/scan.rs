//! Best-effort scanners shared by every target-extraction strategy.
//!
//! Build-description files mix Swift manifest syntax and Starlark rule calls,
//! and neither is worth a full parser here. These helpers are intentionally
//! conservative: they avoid panics and runaway scanning, and reduce false
//! positives by skipping content inside common string literal forms.
//!
//! Supported string literal forms:
//! - `'...'`
//! - `"..."` (with backslash escapes)
//! - `'''...'''` / `"""..."""` (raw strings; can span lines)
//!
//! Known limitation: the depth-counted delimiter scan can misparse delimiters
//! inside string literals that mix quote forms in unbalanced ways. That is an
//! accepted best-effort trade, not something to paper over with stricter
//! guessing.

/// Tracks whether the scan position is inside a string literal.
#[derive(Debug, Default, Clone, Copy)]
struct LiteralState {
    in_single: bool,
    in_double: bool,
    in_triple_single: bool,
    in_triple_double: bool,
}

impl LiteralState {
    /// Advance over byte `i` if it participates in string-literal handling.
    ///
    /// Returns the next scan position when the byte was consumed (entering,
    /// leaving, or inside a literal), or `None` when the caller should treat
    /// the byte as ordinary content.
    fn advance(&mut self, bytes: &[u8], i: usize) -> Option<usize> {
        if self.in_triple_single {
            if bytes[i..].starts_with(b"'''") {
                self.in_triple_single = false;
                return Some(i + 3);
            }
            return Some(i + 1);
        }
        if self.in_triple_double {
            if bytes[i..].starts_with(b"\"\"\"") {
                self.in_triple_double = false;
                return Some(i + 3);
            }
            return Some(i + 1);
        }
        if self.in_single {
            if bytes[i] == b'\\' {
                return Some((i + 2).min(bytes.len()));
            }
            if bytes[i] == b'\'' {
                self.in_single = false;
            }
            return Some(i + 1);
        }
        if self.in_double {
            if bytes[i] == b'\\' {
                return Some((i + 2).min(bytes.len()));
            }
            if bytes[i] == b'"' {
                self.in_double = false;
            }
            return Some(i + 1);
        }

        if bytes[i..].starts_with(b"'''") {
            self.in_triple_single = true;
            return Some(i + 3);
        }
        if bytes[i..].starts_with(b"\"\"\"") {
            self.in_triple_double = true;
            return Some(i + 3);
        }
        if bytes[i] == b'\'' {
            self.in_single = true;
            return Some(i + 1);
        }
        if bytes[i] == b'"' {
            self.in_double = true;
            return Some(i + 1);
        }

        None
    }

    fn in_literal(&self) -> bool {
        self.in_single || self.in_double || self.in_triple_single || self.in_triple_double
    }
}

/// Find the position just past the close delimiter matching the open
/// delimiter at `open_index`, counting nested pairs and skipping string
/// literals.
///
/// This is the one balanced-scan primitive every strategy shares; `(`/`)`,
/// `[`/`]` and `{`/`}` all go through it.
pub fn find_matching_close(contents: &str, open_index: usize) -> Option<usize> {
    let bytes = contents.as_bytes();
    let open = *bytes.get(open_index)?;
    let close = match open {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        _ => return None,
    };

    let mut depth = 0usize;
    let mut state = LiteralState::default();
    let mut i = open_index;
    while i < bytes.len() {
        if let Some(next) = state.advance(bytes, i) {
            i = next;
            continue;
        }
        let b = bytes[i];
        i += 1;
        if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// The span between a matched open/close delimiter pair, exclusive of both.
pub fn extract_balanced(contents: &str, open_index: usize) -> Option<(&str, usize)> {
    let end = find_matching_close(contents, open_index)?;
    Some((&contents[open_index + 1..end - 1], end))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// All start offsets of `keyword` outside string literals, with word
/// boundaries on both sides. A leading `.` in the keyword is matched
/// literally (Swift sub-target calls like `.testTarget`).
pub fn find_keyword(contents: &str, keyword: &str) -> Vec<usize> {
    let bytes = contents.as_bytes();
    let kw = keyword.as_bytes();
    if kw.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut state = LiteralState::default();
    let mut i = 0usize;
    while i < bytes.len() {
        if let Some(next) = state.advance(bytes, i) {
            i = next;
            continue;
        }

        if bytes[i..].starts_with(kw) {
            let prev_is_word = i
                .checked_sub(1)
                .and_then(|idx| bytes.get(idx))
                .is_some_and(|b| is_word_byte(*b));
            let next_is_word = bytes.get(i + kw.len()).is_some_and(|b| is_word_byte(*b));
            if !prev_is_word && !next_is_word {
                out.push(i);
                i += kw.len();
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Strip comments while preserving string literals.
///
/// Handles `# ...` and `// ...` line comments and `/* ... */` block comments,
/// which covers both the Starlark and the Swift-manifest side of the rule
/// vocabulary.
pub fn strip_comments(contents: &str) -> String {
    let bytes = contents.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());

    let mut state = LiteralState::default();
    let mut i = 0usize;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while i < bytes.len() {
        if in_line_comment {
            if bytes[i] == b'\n' {
                in_line_comment = false;
                out.push(b'\n');
            }
            i += 1;
            continue;
        }
        if in_block_comment {
            if bytes[i..].starts_with(b"*/") {
                in_block_comment = false;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }

        if let Some(next) = state.advance(bytes, i) {
            out.extend_from_slice(&bytes[i..next]);
            i = next;
            continue;
        }

        if bytes[i] == b'#' {
            in_line_comment = true;
            i += 1;
            continue;
        }
        if bytes[i..].starts_with(b"//") {
            in_line_comment = true;
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(b"/*") {
            in_block_comment = true;
            i += 2;
            continue;
        }

        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| contents.to_string())
}

/// All string literal contents appearing in `text`, in order.
///
/// Contents are not unescaped; callers trim/normalize as needed.
pub fn quoted_strings(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut state = LiteralState::default();
    let mut i = 0usize;
    let mut literal_start: Option<usize> = None;

    while i < bytes.len() {
        let was_in_literal = state.in_literal();
        if let Some(next) = state.advance(bytes, i) {
            if !was_in_literal && state.in_literal() {
                literal_start = Some(next);
            } else if was_in_literal && !state.in_literal() {
                if let Some(start) = literal_start.take() {
                    // `next` sits just past the closing quote(s).
                    let quote_len = next - i;
                    if start < next - quote_len {
                        out.push(text[start..next - quote_len].to_string());
                    }
                }
            }
            i = next;
            continue;
        }
        i += 1;
    }
    out
}

/// Position of the next `(` after `from`, allowing only whitespace between.
pub fn next_call_open(contents: &str, from: usize) -> Option<usize> {
    let bytes = contents.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    (bytes.get(i) == Some(&b'(')).then_some(i)
}

/// Extract a `key: "value"` / `key = "value"` string argument from a call
/// span.
pub fn keyed_string_arg(args: &str, key: &str) -> Option<String> {
    for start in find_keyword(args, key) {
        let Some(value_start) = skip_key_separator(args, start + key.len()) else {
            continue;
        };
        let rest = &args[value_start..];
        if rest.starts_with('"') || rest.starts_with('\'') {
            if let Some(first) = quoted_strings(rest).into_iter().next() {
                return Some(first);
            }
        }
    }
    None
}

/// Extract the `key: [...]` / `key = [...]` list argument from a call span,
/// returning the bracketed interior.
pub fn keyed_list_arg<'a>(args: &'a str, key: &str) -> Option<&'a str> {
    for start in find_keyword(args, key) {
        let Some(value_start) = skip_key_separator(args, start + key.len()) else {
            continue;
        };
        if args.as_bytes().get(value_start) == Some(&b'[') {
            if let Some((inner, _end)) = extract_balanced(args, value_start) {
                return Some(inner);
            }
        }
    }
    None
}

/// Step over `:` or `=` (and surrounding whitespace) after an argument key.
fn skip_key_separator(args: &str, from: usize) -> Option<usize> {
    let bytes = args.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    match bytes.get(i) {
        Some(b':') | Some(b'=') => i += 1,
        _ => return None,
    }
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    Some(i)
}
