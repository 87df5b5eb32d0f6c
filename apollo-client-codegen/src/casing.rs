//! A from-scratch lowerCamelCase conversion for GraphQL enum value names.
//!
//! Written fresh rather than adapted from `juniper_codegen::common::rename`'s
//! `to_camel_case`, which drops trailing underscores and does not
//! special-case digit-run boundaries — both of which need preserving
//! (`BEFORE2023 → before2023`, `_one_two_three_ → _oneTwoThree_`).

#[derive(Clone, Copy, Eq, PartialEq)]
enum CharClass {
    Upper,
    Lower,
    Digit,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_uppercase() {
        CharClass::Upper
    } else {
        CharClass::Lower
    }
}

/// Splits a single underscore-free run into words at digit/letter
/// boundaries and case transitions, keeping digit runs contiguous and
/// splitting an acronym's trailing letter off before a new word
/// (`HTTPServer` → `["HTTP", "Server"]`).
fn split_word_boundaries(run: &str) -> Vec<String> {
    let chars: Vec<char> = run.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let mut words = Vec::new();
    let mut current = String::new();
    current.push(chars[0]);
    for i in 1..chars.len() {
        let prev = classify(chars[i - 1]);
        let cur = classify(chars[i]);
        let is_boundary = match (prev, cur) {
            (CharClass::Lower, CharClass::Upper) => true,
            (CharClass::Digit, CharClass::Upper) | (CharClass::Digit, CharClass::Lower) => true,
            (CharClass::Upper, CharClass::Digit) | (CharClass::Lower, CharClass::Digit) => true,
            (CharClass::Upper, CharClass::Upper) => {
                matches!(chars.get(i + 1), Some(next) if classify(*next) == CharClass::Lower)
            }
            _ => false,
        };
        if is_boundary {
            words.push(std::mem::take(&mut current));
        }
        current.push(chars[i]);
    }
    words.push(current);
    words
}

fn split_words(core: &str) -> Vec<String> {
    core.split('_')
        .filter(|chunk| !chunk.is_empty())
        .flat_map(split_word_boundaries)
        .collect()
}

fn titlecase_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let head: String = first.to_uppercase().collect();
            let tail: String = chars.as_str().to_lowercase();
            format!("{head}{tail}")
        }
        None => String::new(),
    }
}

/// Converts a raw GraphQL enum value name to lowerCamelCase.
///
/// Leading underscores are preserved verbatim; a single trailing underscore
/// is preserved iff the original had one. The first word is lowercased in
/// full (not just its initial letter, so an all-caps run like `UPPERCASE`
/// collapses to `uppercase` rather than `uPPERCASE`); every following word
/// is titlecased. Digit runs never split internally and never trigger a
/// case change of their own.
pub fn to_lower_camel_case(original: &str) -> String {
    if original.is_empty() {
        return String::new();
    }

    let leading_underscores = original.chars().take_while(|&c| c == '_').count();
    let trimmed_end = original.trim_end_matches('_');
    let had_trailing_underscore = trimmed_end.len() < original.len();
    let core_start = leading_underscores.min(trimmed_end.len());
    let core = &trimmed_end[core_start..];

    let words = split_words(core);

    let mut result = String::new();
    result.push_str(&"_".repeat(leading_underscores));
    for (index, word) in words.iter().enumerate() {
        if index == 0 {
            result.push_str(&word.to_lowercase());
        } else {
            result.push_str(&titlecase_word(word));
        }
    }
    if had_trailing_underscore {
        result.push('_');
    }
    result
}
