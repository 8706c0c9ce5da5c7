use atoi::{FromRadix10Checked, FromRadix10SignedChecked};

/// Convert the text representation of a decimal into an integer representation. The integer
/// representation is not truncating the fraction, but is instead the value of the decimal times 10
/// to the power of scale. E.g. 123.45 of a Decimal with scale 3 is thought of as 123.450 and
/// represented as 123450. This method will regard any non digit character following the integer
/// part as a radix character, with the exception of a `+` or `-` at the beginning of the string.
///
/// `None` is returned if the text is not a decimal, has more significant fractional digits than
/// `scale`, or if the result does not fit into an `i64`.
///
/// This method is robust against representation which do not have trailing zeroes as well as
/// arbitrary radix character.
pub fn decimal_text_to_i64(text: &[u8], scale: usize) -> Option<i64> {
    let text = text.trim_ascii();
    if !text.iter().any(u8::is_ascii_digit) {
        return None;
    }
    // High is now the number before the decimal point
    let (high, num_digits_high) = i64::from_radix_10_signed_checked(text);
    let mut high = high?;
    let (low, num_digits_low) = if num_digits_high == text.len() {
        (0, 0)
    } else {
        let mut fraction = &text[(num_digits_high + 1)..];
        // Trailing zeroes beyond the scale do not carry any information.
        while fraction.len() > scale && fraction.last() == Some(&b'0') {
            fraction = &fraction[..fraction.len() - 1];
        }
        let (low, num_digits_low) = i64::from_radix_10_checked(fraction);
        if num_digits_low != fraction.len() || num_digits_low > scale {
            return None;
        }
        (low?, num_digits_low)
    };
    // Left shift high so it is compatible with low
    for _ in 0..num_digits_low {
        high = high.checked_mul(10)?;
    }
    // We want to increase the absolute of high by low without changing highs sign
    let mut n = if high < 0 || (high == 0 && text[0] == b'-') {
        high.checked_sub(low)?
    } else {
        high.checked_add(low)?
    };
    // Databases may omit trailing zeroes. Shift n further in order to meet scale.
    for _ in 0..(scale - num_digits_low) {
        n = n.checked_mul(10)?;
    }
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::decimal_text_to_i64;

    #[test]
    fn integer_text() {
        assert_eq!(Some(42), decimal_text_to_i64(b"42", 0));
        assert_eq!(Some(-17), decimal_text_to_i64(b"-17", 0));
        assert_eq!(Some(5), decimal_text_to_i64(b"+5", 0));
    }

    /// Some drivers pad fixed size numeric text with blanks.
    #[test]
    fn padded_integer_text() {
        assert_eq!(Some(1), decimal_text_to_i64(b"   1 ", 0));
    }

    #[test]
    fn decimal_is_represented_with_comma_as_radix() {
        assert_eq!(Some(1_000_000), decimal_text_to_i64(b"10,00000", 5));
    }

    #[test]
    fn decimal_with_less_zeroes() {
        assert_eq!(Some(1_000_000), decimal_text_to_i64(b"10.0", 5));
    }

    #[test]
    fn negative_decimal() {
        assert_eq!(Some(-1230), decimal_text_to_i64(b"-1.23", 3));
    }

    #[test]
    fn negative_decimal_small() {
        assert_eq!(Some(-10), decimal_text_to_i64(b"-0.1", 2));
    }

    #[test]
    fn trailing_zero_fraction_fits_scale_zero() {
        assert_eq!(Some(7), decimal_text_to_i64(b"7.000", 0));
        assert_eq!(Some(7), decimal_text_to_i64(b"7.", 0));
    }

    #[test]
    fn fraction_does_not_fit_scale() {
        assert_eq!(None, decimal_text_to_i64(b"7.5", 0));
    }

    #[test]
    fn overflow_is_none() {
        assert_eq!(None, decimal_text_to_i64(b"99999999999999999999", 0));
        assert_eq!(None, decimal_text_to_i64(b"9223372036854775807", 1));
    }

    #[test]
    fn not_a_number() {
        assert_eq!(None, decimal_text_to_i64(b"", 0));
        assert_eq!(None, decimal_text_to_i64(b"-", 0));
        assert_eq!(None, decimal_text_to_i64(b"abc", 0));
        assert_eq!(None, decimal_text_to_i64(b"1.2x", 2));
    }
}
