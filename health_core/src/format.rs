//! Number formatting for metric values.
//!
//! Display text carries thousands separators (except for weight) and a unit
//! suffix. The numeric value is always recomputed from text, so formatting can
//! never drift from what gets saved.

use crate::MetricField;

/// Strip a raw keystroke buffer down to digits and one decimal point, then
/// regroup it for display while editing.
///
/// The unit suffix is dropped. Applying this to its own output is a no-op.
pub fn normalize_input(field: MetricField, raw: &str) -> String {
    let (int_part, frac_part) = split_numeric(raw);
    if int_part.is_empty() && frac_part.is_none() {
        return String::new();
    }

    let trimmed = int_part.trim_start_matches('0');
    let int_part = if trimmed.is_empty() { "0" } else { trimmed };

    let mut out = if field.is_grouped() {
        group_thousands(int_part)
    } else {
        int_part.to_string()
    };
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

/// Format a saved value for display: grouped number plus unit suffix
pub fn format_for_display(field: MetricField, value: f64) -> String {
    format!("{} {}", format_number(field, value), field.unit())
}

/// Like [`format_for_display`], but empty for an absent value
pub fn format_optional(field: MetricField, value: Option<f64>) -> String {
    value
        .map(|v| format_for_display(field, v))
        .unwrap_or_default()
}

/// Format just the number, without unit suffix
pub fn format_number(field: MetricField, value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let value = value.max(0.0);
    let text = if field.is_integral() {
        format!("{}", value.round() as u64)
    } else {
        format!("{}", value)
    };

    if !field.is_grouped() {
        return text;
    }
    match text.split_once('.') {
        Some((int_part, frac)) => format!("{}.{}", group_thousands(int_part), frac),
        None => group_thousands(&text),
    }
}

/// Parse display or buffer text into the value to save.
///
/// Empty, unparsable and zero inputs all mean "field cleared" and yield `None`.
pub fn parse_value(field: MetricField, text: &str) -> Option<f64> {
    let (int_part, frac_part) = split_numeric(text);
    let mut numeric = int_part;
    if let Some(frac) = frac_part {
        numeric.push('.');
        numeric.push_str(&frac);
    }
    if numeric.is_empty() || numeric == "." {
        return None;
    }

    let value: f64 = numeric.parse().ok()?;
    let value = if field.is_integral() { value.round() } else { value };
    let too_large = field.is_integral() && value > f64::from(u32::MAX);
    if value == 0.0 || !value.is_finite() || too_large {
        None
    } else {
        Some(value)
    }
}

/// Split text into its integer digits and the digits after the first point
fn split_numeric(raw: &str) -> (String, Option<String>) {
    let mut int_part = String::new();
    let mut frac_part: Option<String> = None;

    for c in raw.chars() {
        if c.is_ascii_digit() {
            match frac_part.as_mut() {
                Some(frac) => frac.push(c),
                None => int_part.push(c),
            }
        } else if c == '.' && frac_part.is_none() {
            frac_part = Some(String::new());
        }
    }

    (int_part, frac_part)
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
