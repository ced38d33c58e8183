//! Output filtering: applied to the synthesized answer, never to retrieved
//! source text. Truncates by an approximate token count, then redacts phone
//! numbers, emails, and 9-digit IDs.

use once_cell::sync::Lazy;
use regex::Regex;

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b0\d{1,2}-?\d{7,8}\b").unwrap());
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{9}\b").unwrap());

/// Approximates a token limit by word count, then redacts in a fixed order — phone, email, ID — since the ID
/// pattern would otherwise also match the digits in an unredacted phone
/// number.
pub fn filter_output(text: &str, max_tokens: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let truncated = if words.len() > max_tokens {
        format!("{}...", words[..max_tokens].join(" "))
    } else {
        text.to_string()
    };

    let redacted = PHONE_PATTERN.replace_all(&truncated, "[PHONE]");
    let redacted = EMAIL_PATTERN.replace_all(&redacted, "[EMAIL]");
    let redacted = ID_PATTERN.replace_all(&redacted, "[ID]");
    redacted.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_at_word_limit() {
        let text = (0..10).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let filtered = filter_output(&text, 5);
        assert_eq!(filtered, "0 1 2 3 4...");
    }

    #[test]
    fn redacts_israeli_phone_number() {
        assert_eq!(filter_output("call 052-1234567 now", 100), "call [PHONE] now");
    }

    #[test]
    fn redacts_email_address() {
        assert_eq!(filter_output("contact jane.doe@example.com please", 100), "contact [EMAIL] please");
    }

    #[test]
    fn redacts_nine_digit_id() {
        assert_eq!(filter_output("id number 123456789 on file", 100), "id number [ID] on file");
    }

    #[test]
    fn leaves_clean_text_untouched() {
        assert_eq!(filter_output("patient improving steadily", 100), "patient improving steadily");
    }
}
