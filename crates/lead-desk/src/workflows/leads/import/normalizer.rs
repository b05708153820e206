/// Strip byte-order marks and zero-width spaces that spreadsheet exports leave behind.
pub(crate) fn clean_text(value: &str) -> String {
    value
        .replace(['\u{feff}', '\u{200b}'], "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Header key used for alias lookup: "First Name", "first_name", and "firstName"
/// all become "firstname".
pub(crate) fn normalize_header(value: &str) -> String {
    clean_text(value)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Ten digit NANP number. A leading country code `1` is dropped.
pub(crate) fn normalize_phone(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed
        .chars()
        .any(|ch| !(ch.is_ascii_digit() || " ()-.+".contains(ch)))
    {
        return None;
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => Some(digits),
        11 if digits.starts_with('1') => Some(digits[1..].to_string()),
        _ => None,
    }
}

/// Lower-cased address with a single `@`, a non-empty local part, and a dotted domain.
pub(crate) fn normalize_email(value: &str) -> Option<String> {
    let email = value.trim().to_ascii_lowercase();
    if email.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return None;
    }

    Some(email)
}

/// Parse a money amount ("$1,299.50", "1299", "-0.5") into cents. At most two
/// decimal places are accepted.
pub(crate) fn parse_cents(value: &str) -> Option<i64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|ch| *ch != '$' && *ch != ',')
        .collect();
    let (negative, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };

    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (unsigned, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|ch| ch.is_ascii_digit())
        || !fraction.chars().all(|ch| ch.is_ascii_digit())
        || fraction.len() > 2
    {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    let cents = whole.checked_mul(100)?.checked_add(fraction)?;
    Some(if negative { -cents } else { cents })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_collapse_to_alphanumeric_keys() {
        assert_eq!(normalize_header("\u{feff}First Name"), "firstname");
        assert_eq!(normalize_header("first_name"), "firstname");
        assert_eq!(normalize_header("firstName"), "firstname");
        assert_eq!(normalize_header(" Total Plan Cost ($) "), "totalplancost");
    }

    #[test]
    fn phone_numbers_normalize_to_ten_digits() {
        assert_eq!(normalize_phone("(515) 555-0134").as_deref(), Some("5155550134"));
        assert_eq!(normalize_phone("+1 515.555.0134").as_deref(), Some("5155550134"));
        assert_eq!(normalize_phone("555-0134"), None);
        assert_eq!(normalize_phone("515-555-01x4"), None);
        assert_eq!(normalize_phone("25155550134"), None);
    }

    #[test]
    fn emails_require_local_part_and_dotted_domain() {
        assert_eq!(
            normalize_email(" Pat.Doe@Example.COM ").as_deref(),
            Some("pat.doe@example.com")
        );
        assert_eq!(normalize_email("pat@localhost"), None);
        assert_eq!(normalize_email("@example.com"), None);
        assert_eq!(normalize_email("pat@@example.com"), None);
        assert_eq!(normalize_email("pat doe@example.com"), None);
        assert_eq!(normalize_email("pat@example..com"), None);
    }

    #[test]
    fn money_parses_into_cents() {
        assert_eq!(parse_cents("$1,299.50"), Some(129_950));
        assert_eq!(parse_cents("1299"), Some(129_900));
        assert_eq!(parse_cents("12.5"), Some(1_250));
        assert_eq!(parse_cents(".99"), Some(99));
        assert_eq!(parse_cents("-3"), Some(-300));
        assert_eq!(parse_cents("12.345"), None);
        assert_eq!(parse_cents("twelve"), None);
        assert_eq!(parse_cents(""), None);
        assert_eq!(parse_cents("$"), None);
    }
}
