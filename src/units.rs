//! Human readable capacities, as the NMS API reports them

use std::fmt;

const KIB: f64 = 1024.0;

/// The number of bytes a single unit letter stands for
fn multiplier(unit: char) -> Option<f64> {
    match unit {
        'B' => Some(1.0),
        'K' => Some(KIB),
        'M' => Some(KIB * KIB),
        'G' => Some(KIB * KIB * KIB),
        'T' => Some(KIB * KIB * KIB * KIB),
        _ => None,
    }
}

/// Convert a capacity like `12G` or `1.5T` to bytes
///
/// Multiples are binary. An unknown unit or an unparseable number gives `0`
/// instead of an error: a folder property we can't read counts as empty.
pub fn convert_space(size: &str) -> f64 {
    let unit = match size.chars().last() {
        Some(unit) => unit,
        None => return 0.0,
    };
    let number = &size[..size.len() - unit.len_utf8()];
    if !is_decimal(number) {
        return 0.0;
    }
    match (multiplier(unit), number.parse::<f64>()) {
        (Some(multiplier), Ok(n)) => n * multiplier,
        _ => 0.0,
    }
}

/// Plain digits with at most one decimal point: no signs, exponents or `inf`
pub(crate) fn is_decimal(number: &str) -> bool {
    let mut parts = number.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    match parts.next() {
        Some(fraction) => {
            !(whole.is_empty() && fraction.is_empty()) && all_digits(whole) && all_digits(fraction)
        }
        None => !whole.is_empty() && all_digits(whole),
    }
}

/// A capacity that remembers how the appliance spelled it
///
/// Findings quote the original text (`5G available`) while comparisons use
/// the byte count.
#[derive(Debug, Clone, PartialEq)]
pub struct Capacity {
    text: String,
    bytes: f64,
}

impl Capacity {
    pub fn parse(text: &str) -> Capacity {
        Capacity {
            text: text.to_owned(),
            bytes: convert_space(text),
        }
    }

    pub fn bytes(&self) -> f64 {
        self.bytes
    }

    pub fn kilobytes(&self) -> u64 {
        (self.bytes / KIB) as u64
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_unit_is_a_binary_multiple() {
        let cases = [
            ("2B", 2.0),
            ("2K", 2.0 * 1024.0),
            ("2M", 2.0 * 1_048_576.0),
            ("2G", 2.0 * 1_073_741_824.0),
            ("2T", 2.0 * 1_099_511_627_776.0),
        ];
        for &(text, bytes) in cases.iter() {
            assert_eq!(convert_space(text), bytes, "converting {}", text);
        }
    }

    #[test]
    fn fractions_are_allowed() {
        assert_eq!(convert_space("1.5K"), 1536.0);
    }

    #[test]
    fn malformed_sizes_are_zero() {
        for text in ["", "G", "12", "12X", "12g", "abcG", "1,5G", "12GB", "-1G", "infG", ".G"].iter() {
            assert_eq!(convert_space(text), 0.0, "converting {:?}", text);
        }
    }

    #[test]
    fn capacity_keeps_its_spelling() {
        let cap = Capacity::parse("5G");
        assert_eq!(cap.to_string(), "5G");
        assert_eq!(cap.kilobytes(), 5 * 1024 * 1024);
    }
}
