//! Author name handling: name-pair parsing, word re-capitalization and the
//! folded comparison keys used for fingerprints and identity matching.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Collapses whitespace and re-capitalizes words written entirely in upper
/// or lower case. Mixed-case words such as `McDonald` are kept as given.
pub fn normalize_name_words(input: &str) -> String {
    input
        .split_whitespace()
        .map(recapitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn recapitalize_word(word: &str) -> String {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    let uniform = !letters.is_empty()
        && (letters.iter().all(|c| c.is_uppercase()) || letters.iter().all(|c| c.is_lowercase()));
    if !uniform {
        return word.to_string();
    }

    let mut out = String::with_capacity(word.len());
    let mut start_of_part = true;
    for c in word.chars() {
        if c == '-' || c == '\'' || c == '\u{2019}' {
            out.push(c);
            start_of_part = true;
        } else if start_of_part && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            start_of_part = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Splits a free-form name into `(first, last)`.
///
/// `"Last, First"` splits on the first comma; otherwise the last word is the
/// surname. `None` when no surname can be found.
pub fn parse_comma_name(input: &str) -> Option<(String, String)> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (first, last) = match trimmed.split_once(',') {
        Some((last, first)) => (first.trim().to_string(), last.trim().to_string()),
        None => {
            let mut words: Vec<&str> = trimmed.split_whitespace().collect();
            let last = words.pop().unwrap_or_default().to_string();
            (words.join(" "), last)
        }
    };

    if last.is_empty() {
        return None;
    }
    Some((first, last))
}

/// Lowercased, diacritic-free form of `input` for comparisons.
pub fn fold(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Folded words of `input` with punctuation treated as separators.
pub fn folded_words(input: &str) -> Vec<String> {
    fold(input)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comparison key for a surname: folded, letters and digits only.
pub fn surname_key(last: &str) -> String {
    folded_words(last).concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recapitalizes_uniform_case() {
        assert_eq!(normalize_name_words("JOHN   SMITH"), "John Smith");
        assert_eq!(normalize_name_words("jean-pierre"), "Jean-Pierre");
        assert_eq!(normalize_name_words("O'BRIEN"), "O'Brien");
        assert_eq!(normalize_name_words("McDonald"), "McDonald");
        assert_eq!(normalize_name_words(" J. "), "J.");
    }

    #[test]
    fn comma_heuristic() {
        assert_eq!(
            parse_comma_name("Turing, Alan M."),
            Some(("Alan M.".to_string(), "Turing".to_string()))
        );
        assert_eq!(
            parse_comma_name("Alan Mathison Turing"),
            Some(("Alan Mathison".to_string(), "Turing".to_string()))
        );
        assert_eq!(
            parse_comma_name("Arvind"),
            Some((String::new(), "Arvind".to_string()))
        );
        assert_eq!(parse_comma_name("   "), None);
        assert_eq!(parse_comma_name(", Alan"), None);
    }

    #[test]
    fn folding_strips_diacritics() {
        assert_eq!(fold("Erdős"), "erdos");
        assert_eq!(surname_key("Pérez-Reverte"), "perezreverte");
        assert_eq!(folded_words("Deep  Learning: a Review!"), vec!["deep", "learning", "a", "review"]);
    }
}
