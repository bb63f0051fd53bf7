/// Parse a display price like `"$0.00001234"` or `"$1,234.56"`.
///
/// Thousands separators and every character other than digits, `.` and `-`
/// are stripped. Unparseable input yields `0.0`.
pub fn parse_price(display: &str) -> f64 {
    let cleaned: String = display
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    parse_leading_float(&cleaned)
}

/// Parse a display percentage change like `"-12.5%"` or `"1,234.56%"`.
/// The literal `"N/A"` maps to `0.0`.
pub fn parse_change(display: &str) -> f64 {
    if display.trim() == "N/A" {
        return 0.0;
    }
    parse_price(display)
}

/// Longest prefix that parses as a float, the way a lenient display-string
/// reader would (`"1.2.3"` → `1.2`, `"5-"` → `5`).
fn parse_leading_float(s: &str) -> f64 {
    let mut end = s.len();
    while end > 0 {
        if let Ok(value) = s[..end].parse::<f64>() {
            return if value.is_finite() { value } else { 0.0 };
        }
        end -= 1;
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices() {
        assert_eq!(parse_price("$0.00001234"), 0.00001234);
        assert_eq!(parse_price("$1,234.56"), 1234.56);
        assert_eq!(parse_price("$12"), 12.0);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("-"), 0.0);
        assert_eq!(parse_price("N/A"), 0.0);
    }

    #[test]
    fn changes() {
        assert_eq!(parse_change("N/A"), 0.0);
        assert_eq!(parse_change("1,234.56%"), 1234.56);
        assert_eq!(parse_change("-12.5%"), -12.5);
        assert_eq!(parse_change("—"), 0.0);
    }

    #[test]
    fn lenient_prefix() {
        assert_eq!(parse_price("1.2.3"), 1.2);
        assert_eq!(parse_price("5-"), 5.0);
    }
}
