/// Rewrites a phone number into the single canonical form used for
/// matching settlement callbacks against pending transactions.
///
/// A leading `0` is replaced with the configured country prefix
/// (`0712345678` -> `254712345678`), a leading `+` is stripped, and any
/// spacing or punctuation between digits is removed. Already-canonical
/// numbers pass through unchanged.
pub fn canonical_phone(raw: &str, country_prefix: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if let Some(rest) = digits.strip_prefix('0') {
        format!("{country_prefix}{rest}")
    } else {
        digits
    }
}
