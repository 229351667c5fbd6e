pub type Amount = u64;

pub const UNIT_DECIMALS: usize = 8;
pub const UNIT_SCALE: u64 = 100_000_000; // 1 unit = 1e8 minimal units

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount {0:?}")]
    Invalid(String),
    #[error("amount {0:?} has more than {max} decimals", max = UNIT_DECIMALS)]
    TooPrecise(String),
    #[error("amount {0:?} does not fit in 64 bits of minimal units")]
    Overflow(String),
}

/// Parses a decimal unit string (`"2"`, `"1.5"`, `"0.00000001"`) into minimal units.
pub fn parse_amount(input: &str) -> Result<Amount, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if frac.len() > UNIT_DECIMALS {
        return Err(AmountError::TooPrecise(s.to_string()));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| AmountError::Overflow(s.to_string()))?
    };
    let mut frac_units: u64 = 0;
    for (idx, b) in frac.bytes().enumerate() {
        let digit = u64::from(b - b'0');
        frac_units += digit * 10u64.pow((UNIT_DECIMALS - 1 - idx) as u32);
    }
    whole
        .checked_mul(UNIT_SCALE)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| AmountError::Overflow(s.to_string()))
}

/// Formats minimal units as a decimal string, always with at least one decimal.
pub fn format_amount(amount: Amount) -> String {
    format_total(u128::from(amount))
}

/// Same as [`format_amount`] for sums across accounts, which may exceed 64 bits.
pub fn format_total(total: u128) -> String {
    let scale = u128::from(UNIT_SCALE);
    let whole = total / scale;
    let frac = total % scale;
    if frac == 0 {
        return format!("{whole}.0");
    }
    let digits = format!("{frac:0width$}", width = UNIT_DECIMALS);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
