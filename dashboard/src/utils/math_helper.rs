use alloy::primitives::U256;

use crate::errors::DashboardError;

/// Convert a raw integer amount to `f64` by dividing by `10^precision`.
///
/// Saturates to `f64::MAX` when the quotient does not fit in `u128`.
pub fn divide_by_precision_f64(value: U256, precision: u8) -> f64 {
    let scale = U256::from(10).pow(U256::from(precision));

    let (quotient, remainder) = match (value.checked_div(scale), value.checked_rem(scale)) {
        (Some(q), Some(r)) => (q, r),
        _ => return f64::MAX,
    };

    match (
        u128::try_from(quotient),
        u128::try_from(remainder),
        u128::try_from(scale),
    ) {
        (Ok(q), Ok(r), Ok(s)) => q as f64 + (r as f64 / s as f64),
        _ => f64::MAX,
    }
}

/// Parse a user-entered decimal string into raw units of an asset with the
/// given decimal precision.
///
/// Rejects empty, negative, non-numeric and too-precise input before any
/// network call is made.
pub fn scale_to_raw(input: &str, decimals: u8) -> Result<U256, DashboardError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DashboardError::InvalidAmount("amount is empty".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(DashboardError::InvalidAmount(
            "amount must be non-negative".to_string(),
        ));
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(DashboardError::InvalidAmount(format!(
            "`{}` is not a number",
            input
        )));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(DashboardError::InvalidAmount(format!(
            "`{}` is not a number",
            input
        )));
    }
    if frac.len() > decimals as usize {
        return Err(DashboardError::InvalidAmount(format!(
            "more than {} decimal places",
            decimals
        )));
    }

    let scale = U256::from(10).pow(U256::from(decimals));

    let whole_raw = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10)
            .map_err(|_| DashboardError::InvalidAmount("amount is too large".to_string()))?
    };

    let mut frac_padded = frac.to_string();
    while frac_padded.len() < decimals as usize {
        frac_padded.push('0');
    }
    let frac_raw = if frac_padded.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&frac_padded, 10)
            .map_err(|_| DashboardError::InvalidAmount("amount is too large".to_string()))?
    };

    whole_raw
        .checked_mul(scale)
        .and_then(|scaled| scaled.checked_add(frac_raw))
        .ok_or_else(|| DashboardError::InvalidAmount("amount is too large".to_string()))
}

/// Render a raw integer amount as a decimal string, trimming trailing zeros.
pub fn format_from_raw(raw: U256, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let scale = U256::from(10).pow(U256::from(decimals));
    let whole = raw / scale;
    let frac = raw % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let mut frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}.{}", whole, frac_str)
}
