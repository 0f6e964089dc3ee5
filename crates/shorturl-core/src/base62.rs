use smol_str::SmolStr;

/// Digits in ascending order. `a` is the zero symbol used for padding.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Every encoded key is at least this long, regardless of the identifier.
pub const MIN_LENGTH: usize = 6;

const BASE: u64 = ALPHABET.len() as u64;

// u64::MAX needs 11 base62 digits.
const MAX_DIGITS: usize = 11;

/// Encodes an identifier as a left-padded base62 string.
///
/// # Examples
///
/// ```
/// use shorturl_core::base62;
///
/// assert_eq!(base62::encode(1), "aaaaab");
/// assert_eq!(base62::encode(62), "aaaaba");
/// ```
pub fn encode(mut id: u64) -> SmolStr {
    let mut buf = [ALPHABET[0]; MAX_DIGITS];
    let mut start = MAX_DIGITS;

    while id > 0 {
        start -= 1;
        buf[start] = ALPHABET[(id % BASE) as usize];
        id /= BASE;
    }

    let start = start.min(MAX_DIGITS - MIN_LENGTH);
    // The buffer only ever holds ASCII alphabet bytes.
    let encoded = std::str::from_utf8(&buf[start..]).unwrap_or_default();
    SmolStr::new(encoded)
}

/// Returns `true` if `key` only contains alphabet symbols.
pub fn is_valid(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric())
}
