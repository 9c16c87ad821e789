//! Glob-style key matching with Redis `KEYS`/`SCAN MATCH` semantics.
//!
//! Supported syntax:
//! - `*` any run of characters (including none)
//! - `?` exactly one character
//! - `[abc]`, `[a-z]`, `[^a]` character classes
//! - `\x` matches `x` literally

/// Check whether `key` matches `pattern`.
pub fn matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    match_from(&pattern, &key)
}

fn match_from(pattern: &[char], key: &[char]) -> bool {
    let (mut p, mut k) = (0, 0);
    // Backtrack point of the most recent `*`: (pattern index after it, key index).
    let mut star: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    while p < pattern.len() && pattern[p] == '*' {
                        p += 1;
                    }
                    if p == pattern.len() {
                        return true;
                    }
                    star = Some((p, k));
                    continue;
                }
                '?' => {
                    p += 1;
                    k += 1;
                    continue;
                }
                '[' => match match_class(pattern, p, key[k]) {
                    Some((true, next)) => {
                        p = next;
                        k += 1;
                        continue;
                    }
                    Some((false, _)) => {}
                    None => {
                        if key[k] == '[' {
                            p += 1;
                            k += 1;
                            continue;
                        }
                    }
                },
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == key[k] {
                        p += 2;
                        k += 1;
                        continue;
                    }
                }
                c => {
                    if c == key[k] {
                        p += 1;
                        k += 1;
                        continue;
                    }
                }
            }
        }

        // Mismatch: let the last `*` swallow one more character.
        match star {
            Some((star_p, star_k)) => {
                p = star_p;
                k = star_k + 1;
                star = Some((star_p, star_k + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Match `c` against the class starting at `pattern[open] == '['`.
///
/// Returns `(matched, index after the closing bracket)`, or `None` when the class
/// is unterminated, in which case the caller compares `[` literally.
fn match_class(pattern: &[char], open: usize, c: char) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut hit = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            hit |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            hit |= lo <= c && c <= hi;
            i += 3;
        } else {
            hit |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((hit != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn test_prefix_star() {
        assert!(matches("book::*", "book::7"));
        assert!(matches("book::*", "book::"));
        assert!(!matches("book::*", "author::7"));
        assert!(!matches("book::*", "book:7"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("book::?", "book::7"));
        assert!(!matches("book::?", "book::17"));
    }

    #[test]
    fn test_classes() {
        assert!(matches("h[ae]llo", "hello"));
        assert!(matches("h[ae]llo", "hallo"));
        assert!(!matches("h[ae]llo", "hillo"));
        assert!(matches("h[^e]llo", "hallo"));
        assert!(!matches("h[^e]llo", "hello"));
        assert!(matches("id[0-9]", "id4"));
        assert!(!matches("id[0-9]", "idx"));
    }

    #[test]
    fn test_escape() {
        assert!(matches(r"price\*", "price*"));
        assert!(!matches(r"price\*", "prices"));
    }

    #[test]
    fn test_star_backtracking() {
        assert!(matches("*::7", "book::7"));
        assert!(matches("a*b*c", "axxbyyc"));
        assert!(!matches("a*b*c", "axxbyy"));
        assert!(matches("*", ""));
        assert!(!matches("?", ""));
    }
}
