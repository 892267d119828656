//! Reading a rating back out of model text.
//!
//! The prompt ends right before the rating, so the model's continuation
//! should start with it. Parsing takes the first number (or number word)
//! and maps it onto the engine's `1..=10` scale.

use crate::error::LlmError;
use crate::prompt::{PromptScale, rating_word};

/// First decimal number in `text`, e.g. `"7.5 out of"` → `7.5`.
fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let mut end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    // Accept one fractional part, but not a trailing sentence period.
    if rest[end..].starts_with('.')
        && rest[end + 1..].starts_with(|c: char| c.is_ascii_digit())
    {
        let fraction = &rest[end + 1..];
        end += 1 + fraction
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(fraction.len());
    }
    rest[..end].parse().ok()
}

/// First whole word naming a number from one to ten.
fn first_word(text: &str) -> Option<f64> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| !word.is_empty())
        .find_map(|word| (1..=10).find(|n| rating_word(*n) == Some(word)))
        .map(|n| n as f64)
}

/// Parse the model's answer to a rating on `1..=10`.
///
/// `0-9` answers are shifted up by one. `one-ten` answers are read from
/// words, falling back to digits when the model ignored the instruction.
///
/// # Errors
///
/// `ParseError` carrying the raw text when no in-range rating is found.
pub fn parse_rating(text: &str, scale: PromptScale) -> Result<f64, LlmError> {
    let raw = match scale {
        PromptScale::ZeroNine | PromptScale::OneTen => first_number(text),
        PromptScale::OneTenWords => first_word(text).or_else(|| first_number(text)),
    };
    let (low, high) = match scale {
        PromptScale::ZeroNine => (0.0, 9.0),
        PromptScale::OneTen | PromptScale::OneTenWords => (1.0, 10.0),
    };
    match raw {
        Some(value) if (low..=high).contains(&value) => Ok(value + scale.shift()),
        _ => Err(LlmError::ParseError(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(text: &str, scale: PromptScale) -> f64 {
        parse_rating(text, scale).expect("rating")
    }

    #[test]
    fn one_ten_reads_the_first_number() {
        assert!((ok("8", PromptScale::OneTen) - 8.0).abs() < f64::EPSILON);
        assert!(
            (ok(" 10 on a scale", PromptScale::OneTen) - 10.0).abs() < f64::EPSILON
        );
        assert!((ok("7.5.", PromptScale::OneTen) - 7.5).abs() < f64::EPSILON);
        assert!(
            (ok("6. Because", PromptScale::OneTen) - 6.0).abs() < f64::EPSILON
        );
    }

    #[test]
    fn zero_nine_shifts_up_by_one() {
        assert!((ok("0", PromptScale::ZeroNine) - 1.0).abs() < f64::EPSILON);
        assert!((ok("9", PromptScale::ZeroNine) - 10.0).abs() < f64::EPSILON);
        assert!(parse_rating("10", PromptScale::ZeroNine).is_err());
    }

    #[test]
    fn words_are_read_case_insensitively() {
        assert!(
            (ok("Seven, because", PromptScale::OneTenWords) - 7.0).abs() < f64::EPSILON
        );
        assert!(
            (ok("ten", PromptScale::OneTenWords) - 10.0).abs() < f64::EPSILON
        );
        assert!(
            (ok("4", PromptScale::OneTenWords) - 4.0).abs() < f64::EPSILON
        );
        // "someone" must not match "one".
        assert!(parse_rating("someone", PromptScale::OneTenWords).is_err());
    }

    #[test]
    fn garbage_and_out_of_range_fail_with_raw_text() {
        for (text, scale) in [
            ("I cannot rate this.", PromptScale::OneTen),
            ("0", PromptScale::OneTen),
            ("11", PromptScale::OneTen),
            ("zero", PromptScale::OneTenWords),
        ] {
            match parse_rating(text, scale) {
                Err(LlmError::ParseError(raw)) => assert_eq!(raw, text),
                other => panic!("{text:?} parsed as {other:?}"),
            }
        }
    }
}
