/// Utility functions for numeric scaling and formatting

/// Divide integers, rounding halves away from zero
///
/// Used to scale raw sensor integers to a fixed number of decimals without
/// going through binary floating point first.
pub fn div_round(numerator: i64, denominator: i64) -> i64 {
    let quotient = (numerator.abs() + denominator / 2) / denominator;
    if numerator < 0 {
        -quotient
    } else {
        quotient
    }
}

/// Round a value to the given number of decimal places, halves away from zero
///
/// A decimal half such as 0.145 is stored as 0.14499999999999999, so after
/// rounding the scaled value the neighbouring half is checked against the
/// input and the result bumped when the input sits on it.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let mut rounded = (value * factor).round();
    if value > 0.0 && (rounded + 0.5) / factor <= value {
        rounded += 1.0;
    } else if value < 0.0 && (rounded - 0.5) / factor >= value {
        rounded -= 1.0;
    }
    rounded / factor
}

/// Format bytes as a lowercase hex string without separators
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
