//! Glob-style key patterns (KEYS)
//!
//! Supports `*`, `?`, character classes `[abc]`, ranges `[a-z]`, negated
//! classes `[^a]` and backslash escapes. Matching works on raw bytes.

/// Check whether `text` matches the glob `pattern`
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    // Position to resume from after the last `*`: (pattern index, text index)
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => match match_class(pattern, p, text[t]) {
                    Some((true, next)) => {
                        p = next;
                        t += 1;
                        continue;
                    }
                    Some((false, _)) => {}
                    None => {
                        if text[t] == b'[' {
                            p += 1;
                            t += 1;
                            continue;
                        }
                    }
                },
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        // Mismatch: let the last star swallow one more byte
        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

/// Match one byte against the class starting at `pattern[start] == b'['`.
/// Returns whether it matched and the index just past the closing `]`.
/// An unterminated class is treated as a literal `[`.
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let c = *pattern.get(i)?;
        if c == b']' && !first {
            break;
        }
        first = false;

        let c = if c == b'\\' {
            i += 1;
            *pattern.get(i)?
        } else {
            c
        };

        if pattern.get(i + 1) == Some(&b'-') && pattern.get(i + 2).map_or(false, |&e| e != b']') {
            let end = pattern[i + 2];
            let (lo, hi) = if c <= end { (c, end) } else { (end, c) };
            if (lo..=hi).contains(&byte) {
                matched = true;
            }
            i += 3;
        } else {
            if c == byte {
                matched = true;
            }
            i += 1;
        }
    }

    Some((matched != negate, i + 1))
}
