//! Record keys derived from sequential indices

/// How a record index becomes a store key
///
/// `Decimal` writes `"0"`, `"1"`, ... `"10"`, so store order is not index
/// order past nine records. `ZeroPadded` keeps both orders equal as long as
/// every index fits in `width` digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFormat {
    #[default]
    Decimal,
    ZeroPadded { width: u32 },
}

impl KeyFormat {
    /// Format from a persisted width, 0 meaning `Decimal`
    pub fn from_width(width: u32) -> Self {
        match width {
            0 => KeyFormat::Decimal,
            width => KeyFormat::ZeroPadded { width },
        }
    }

    /// Persisted width, 0 for `Decimal`
    pub fn width(&self) -> u32 {
        match self {
            KeyFormat::Decimal => 0,
            KeyFormat::ZeroPadded { width } => *width,
        }
    }

    /// Store key for an index
    pub fn key(&self, index: u64) -> String {
        match self {
            KeyFormat::Decimal => index.to_string(),
            KeyFormat::ZeroPadded { width } => format!("{:0width$}", index, width = *width as usize),
        }
    }

    /// Whether `index` renders within the configured width
    pub fn fits(&self, index: u64) -> bool {
        match self {
            KeyFormat::Decimal => true,
            KeyFormat::ZeroPadded { width } => index.to_string().len() <= *width as usize,
        }
    }

    /// Index encoded in a key, if the key is in this format
    pub fn parse(&self, key: &[u8]) -> Option<u64> {
        let text = std::str::from_utf8(key).ok()?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match self {
            KeyFormat::Decimal if text.len() > 1 && text.starts_with('0') => None,
            KeyFormat::ZeroPadded { width } if text.len() != *width as usize => None,
            _ => text.parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_keys() {
        let format = KeyFormat::Decimal;
        assert_eq!(format.key(0), "0");
        assert_eq!(format.key(42), "42");
        assert_eq!(format.parse(b"42"), Some(42));
        assert_eq!(format.parse(b"042"), None);
        assert_eq!(format.parse(b"desc1"), None);

        // Lexicographic order diverges from index order
        assert!(format.key(10) < format.key(9));
    }

    #[test]
    fn test_zero_padded_keys() {
        let format = KeyFormat::ZeroPadded { width: 4 };
        assert_eq!(format.key(7), "0007");
        assert!(format.key(10) > format.key(9));
        assert_eq!(format.parse(b"0010"), Some(10));
        assert_eq!(format.parse(b"10"), None);
        assert!(format.fits(9999));
        assert!(!format.fits(10_000));
    }

    #[test]
    fn test_width_round_trip() {
        assert_eq!(KeyFormat::from_width(0), KeyFormat::Decimal);
        assert_eq!(KeyFormat::from_width(6).width(), 6);
        assert_eq!(KeyFormat::default().width(), 0);
    }
}
