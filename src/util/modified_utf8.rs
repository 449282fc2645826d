//! Decoding of the "modified UTF-8" encoding used by `CONSTANT_Utf8_info` structures (§4.4.7).
//!
//! It differs from standard UTF-8 in that the null character is encoded with two bytes, only the
//! one-, two- and three-byte forms are used, and supplementary characters are encoded as
//! surrogate pairs of three-byte forms.

/// Decodes a modified UTF-8 byte string. On failure, returns the offset of the offending byte.
pub fn decode(bytes: &[u8]) -> Result<String, usize> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let x = bytes[i];
        if x == 0 || x >= 0xf0 {
            return Err(i);
        }
        if x & 0x80 == 0 {
            units.push(x as u16);
            i += 1;
        } else if x & 0xe0 == 0xc0 {
            let y = continuation(bytes, i + 1)?;
            units.push((((x & 0x1f) as u16) << 6) | y);
            i += 2;
        } else if x & 0xf0 == 0xe0 {
            let y = continuation(bytes, i + 1)?;
            let z = continuation(bytes, i + 2)?;
            units.push((((x & 0x0f) as u16) << 12) | (y << 6) | z);
            i += 3;
        } else {
            return Err(i);
        }
    }
    String::from_utf16(&units).map_err(|_| bytes.len())
}

fn continuation(bytes: &[u8], i: usize) -> Result<u16, usize> {
    match bytes.get(i) {
        Some(&b) if b & 0xc0 == 0x80 => Ok((b & 0x3f) as u16),
        _ => Err(i),
    }
}

#[cfg(test)]
mod tests {
    use super::decode;

    #[test]
    fn decodes_ascii_and_two_byte_null() {
        assert_eq!(decode(b"java/lang/Object"), Ok(String::from("java/lang/Object")));
        assert_eq!(decode(&[0x41, 0xc0, 0x80, 0x42]), Ok(String::from("A\u{0}B")));
    }

    #[test]
    fn decodes_surrogate_pairs() {
        // U+1F600 as two three-byte surrogates
        let bytes = [0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80];
        assert_eq!(decode(&bytes), Ok(String::from("\u{1F600}")));
    }

    #[test]
    fn rejects_raw_null_and_four_byte_forms() {
        assert_eq!(decode(&[0x41, 0x00]), Err(1));
        assert_eq!(decode(&[0xf0, 0x9f, 0x98, 0x80]), Err(0));
        assert_eq!(decode(&[0xc3]), Err(1));
    }
}
