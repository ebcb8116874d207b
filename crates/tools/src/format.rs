//! Display formatting for numeric answers.

/// Render an evaluator result for display.
///
/// Percentages are scaled by 100 and shown with one decimal. Whole numbers get
/// thousands separators and no decimal point. Anything else is shown at two
/// decimals with superfluous trailing zeros removed.
pub fn format_response(value: f64, is_percentage: bool) -> String {
    if is_percentage {
        return format!("{:.1}%", value * 100.0);
    }
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 {
        return format_integer(value);
    }
    format_decimal(value)
}

/// Two decimals with thousands separators, trailing zeros and a dangling
/// decimal point stripped: `1234.5` → `1,234.5`, `1200.0` → `1,200`.
pub fn format_decimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{value:.2}");
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        group_thousands(int_part)
    } else {
        format!("{}.{frac}", group_thousands(int_part))
    }
}

/// A whole number with thousands separators. `-0` renders as `0`.
pub fn format_integer(value: f64) -> String {
    if value == 0.0 {
        return "0".into();
    }
    group_thousands(&format!("{value:.0}"))
}

/// Insert `,` every three digits of an optionally signed digit string.
pub fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    out.push_str(sign);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
