//! Shell pattern matching.
//!
//! Patterns (`*`, `?`, `[...]`) are translated to anchored regular
//! expressions. Pattern strings use backslash escapes to mark characters
//! that were quoted in the source and must match literally; the expansion
//! pass produces that form.

use std::path::Path;

use crate::error;

/// Returns whether the string contains any unescaped pattern
/// metacharacters.
pub(crate) fn is_pattern(s: &str) -> bool {
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' | '[' => return true,
            _ => (),
        }
    }
    false
}

/// Removes backslash escapes, yielding the literal string a non-matching
/// pattern denotes.
pub(crate) fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn push_literal(c: char, out: &mut String) {
    if "\\.^$|?*+()[]{}".contains(c) {
        out.push('\\');
    }
    out.push(c);
}

/// Translates a shell pattern into an anchored regular expression string.
pub(crate) fn pattern_to_regex_str(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                if i + 1 < chars.len() {
                    push_literal(chars[i + 1], &mut regex);
                    i += 1;
                }
            }
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '[' => {
                // Find the closing bracket; an unterminated class is literal.
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '!' || chars[j] == '^') {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }

                if j >= chars.len() {
                    push_literal('[', &mut regex);
                } else {
                    regex.push('[');
                    let mut k = i + 1;
                    if chars[k] == '!' || chars[k] == '^' {
                        regex.push('^');
                        k += 1;
                    }
                    while k < j {
                        let c = chars[k];
                        if c == '\\' || c == '[' {
                            regex.push('\\');
                        }
                        regex.push(c);
                        k += 1;
                    }
                    regex.push(']');
                    i = j;
                }
            }
            c => push_literal(c, &mut regex),
        }
        i += 1;
    }

    regex.push('$');
    regex
}

/// Returns whether the value matches the shell pattern in full.
pub(crate) fn pattern_matches(pattern: &str, value: &str) -> Result<bool, error::Error> {
    let regex = fancy_regex::Regex::new(&pattern_to_regex_str(pattern))?;
    Ok(regex.is_match(value)?)
}

/// Expands a pathname pattern against the filesystem, resolving relative
/// paths against `base_dir`. Returns `None` when nothing matches (the
/// caller then uses the pattern text literally, as classic shells do).
pub(crate) fn expand_glob(
    base_dir: &Path,
    pattern: &str,
) -> Result<Option<Vec<String>>, error::Error> {
    let absolute = pattern.starts_with('/');
    let components: Vec<&str> = pattern.split('/').filter(|c| !c.is_empty()).collect();

    let mut prefixes: Vec<String> = vec![if absolute {
        "/".to_owned()
    } else {
        String::new()
    }];

    for (idx, component) in components.iter().enumerate() {
        let last = idx == components.len() - 1;
        let mut next_prefixes = vec![];

        if !is_pattern(component) {
            let literal = unescape(component);
            for prefix in &prefixes {
                let candidate = join_path(prefix, &literal);
                let full = resolve(base_dir, &candidate);
                if (last && full.exists()) || (!last && full.is_dir()) {
                    next_prefixes.push(candidate);
                }
            }
        } else {
            let regex = fancy_regex::Regex::new(&pattern_to_regex_str(component))?;
            let match_hidden = component.starts_with('.');

            for prefix in &prefixes {
                let dir = resolve(base_dir, prefix);
                let Ok(entries) = std::fs::read_dir(&dir) else {
                    continue;
                };

                for entry in entries.flatten() {
                    let Ok(name) = entry.file_name().into_string() else {
                        continue;
                    };
                    if name.starts_with('.') && !match_hidden {
                        continue;
                    }
                    if !regex.is_match(&name)? {
                        continue;
                    }
                    if !last && !entry.path().is_dir() {
                        continue;
                    }
                    next_prefixes.push(join_path(prefix, &name));
                }
            }
        }

        prefixes = next_prefixes;
        if prefixes.is_empty() {
            return Ok(None);
        }
    }

    prefixes.sort();
    Ok(Some(prefixes))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else if prefix.ends_with('/') {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}/{name}")
    }
}

fn resolve(base_dir: &Path, path: &str) -> std::path::PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn literal_patterns_match_exactly() {
        assert!(pattern_matches("abc", "abc").unwrap());
        assert!(!pattern_matches("abc", "abcd").unwrap());
    }

    #[test]
    fn star_and_question_wildcards() {
        assert!(pattern_matches("a*c", "abbbc").unwrap());
        assert!(pattern_matches("*", "anything").unwrap());
        assert!(pattern_matches("a?c", "abc").unwrap());
        assert!(!pattern_matches("a?c", "abbc").unwrap());
    }

    #[test]
    fn bracket_expressions() {
        assert!(pattern_matches("[abc]x", "bx").unwrap());
        assert!(!pattern_matches("[abc]x", "dx").unwrap());
        assert!(pattern_matches("[!abc]x", "dx").unwrap());
        assert!(pattern_matches("[a-z]*", "hello").unwrap());
    }

    #[test]
    fn escaped_metacharacters_are_literal() {
        assert!(pattern_matches("a\\*c", "a*c").unwrap());
        assert!(!pattern_matches("a\\*c", "abc").unwrap());
        assert!(!is_pattern("a\\*c"));
        assert!(is_pattern("a*c"));
    }

    #[test]
    fn regex_specials_in_values_do_not_leak() {
        assert!(pattern_matches("a.c", "a.c").unwrap());
        assert!(!pattern_matches("a.c", "abc").unwrap());
        assert!(pattern_matches("x(1)", "x(1)").unwrap());
    }

    #[test]
    fn glob_expansion_finds_sorted_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::write(dir.path().join("c.log"), "").unwrap();
        std::fs::write(dir.path().join(".hidden.txt"), "").unwrap();

        let matches = expand_glob(dir.path(), "*.txt").unwrap().unwrap();
        assert_eq!(matches, vec!["a.txt".to_owned(), "b.txt".to_owned()]);

        assert!(expand_glob(dir.path(), "*.missing").unwrap().is_none());
    }

    #[test]
    fn glob_expansion_descends_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/inner.txt"), "").unwrap();

        let matches = expand_glob(dir.path(), "s*/inner.txt").unwrap().unwrap();
        assert_eq!(matches, vec!["sub/inner.txt".to_owned()]);
    }
}
