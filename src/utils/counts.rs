use serde_json::Value as JsonValue;

const TEN_THOUSAND_MARKER: char = '万';

/// Normalize an engagement count (likes, shares, ...) into a non-negative integer.
///
/// Accepts integers, floats and strings such as `"128"`, `"3.5万"` or `"1.2k"`.
/// Anything unparsable becomes 0.
pub fn normalize_count(value: &JsonValue) -> u64 {
    match value {
        JsonValue::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                float_to_count(f)
            } else {
                0
            }
        }
        JsonValue::String(s) => parse_count_str(s),
        _ => 0,
    }
}

pub fn parse_count_str(raw: &str) -> u64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0;
    }
    if s.contains(TEN_THOUSAND_MARKER) {
        let base = s.replace(TEN_THOUSAND_MARKER, "");
        if let Ok(f) = base.trim().parse::<f64>() {
            return float_to_count(f * 10_000.0);
        }
    }
    leading_number(s)
}

/// First run of ASCII digits in the string, the way the crawler reads interaction counts.
/// Runs too large for `u64` saturate.
fn leading_number(s: &str) -> u64 {
    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u64::MAX)
}

fn float_to_count(f: f64) -> u64 {
    if f.is_finite() && f > 0.0 {
        f.trunc() as u64
    } else {
        0
    }
}
