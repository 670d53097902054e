use crate::error::QueryError;
use regex::{Regex, RegexBuilder};

// Characters with meaning inside a regex; everything else passes through.
const META: &str = "\\.+*?()|[]{}^$#&-~";

/// Translate a SQL-LIKE pattern into an anchored, case-insensitive
/// regex: `%` → `.*`, `_` → `.`, all other characters literal.
pub(crate) fn like_to_regex(pattern: &str) -> Result<Regex, QueryError> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            c if META.contains(c) => {
                translated.push('\\');
                translated.push(c);
            }
            c => translated.push(c),
        }
    }

    RegexBuilder::new(&format!("^{translated}$"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|source| QueryError::InvalidRegex {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_translate() {
        let re = like_to_regex("a%c_e").unwrap();
        assert!(re.is_match("abbbcde"));
        assert!(re.is_match("acXe"));
        assert!(!re.is_match("acXef"));
    }

    #[test]
    fn matching_is_anchored_and_case_insensitive() {
        let re = like_to_regex("hello%").unwrap();
        assert!(re.is_match("HELLO world"));
        assert!(!re.is_match("say hello"));
    }

    #[test]
    fn metacharacters_are_literal() {
        let re = like_to_regex("a.b(c)%").unwrap();
        assert!(re.is_match("a.b(c) suffix"));
        assert!(!re.is_match("aXb(c)"));
    }
}
