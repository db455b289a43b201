//! GSM 03.38 default alphabet and 7-bit packing.

/// Escape to the extension table.
pub const ESCAPE: u8 = 0x1B;

#[rustfmt::skip]
const DEFAULT_ALPHABET: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', ' ', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

const EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Character for a default-alphabet code (the high bit is ignored).
pub fn default_char(code: u8) -> char {
    DEFAULT_ALPHABET[(code & 0x7F) as usize]
}

/// Character for an escaped code; unknown extension codes fall back to the
/// default table.
pub fn extension_char(code: u8) -> char {
    EXTENSION
        .iter()
        .find(|(c, _)| *c == code & 0x7F)
        .map(|(_, ch)| *ch)
        .unwrap_or_else(|| default_char(code))
}

/// Septet sequence for one character, or `None` if it is not representable.
pub fn encode_char(ch: char) -> Option<Vec<u8>> {
    // 0x1B is the escape code; its table slot is a placeholder
    let direct = DEFAULT_ALPHABET
        .iter()
        .enumerate()
        .find(|(code, c)| *code != ESCAPE as usize && **c == ch);
    if let Some((code, _)) = direct {
        return Some(vec![code as u8]);
    }
    EXTENSION
        .iter()
        .find(|(_, c)| *c == ch)
        .map(|(code, _)| vec![ESCAPE, *code])
}

/// Decode unpacked (one code per byte) default-alphabet text, stopping at the
/// `0xFF` padding byte.
pub fn decode_unpacked(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0xFF).unwrap_or(data.len());
    decode_septets(&data[..end])
}

/// Decode a sequence of septet codes (already unpacked).
pub fn decode_septets(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied();
    while let Some(code) = iter.next() {
        if code == ESCAPE {
            match iter.next() {
                Some(next) => out.push(extension_char(next)),
                None => out.push(' '),
            }
        } else {
            out.push(default_char(code));
        }
    }
    out
}

/// Unpack `count` septets from 7-bit packed data.
///
/// Septets that would lie beyond the end of `data` are not produced.
pub fn unpack_septets(data: &[u8], count: usize) -> Vec<u8> {
    let mut septets = Vec::with_capacity(count);
    for i in 0..count {
        let bit = i * 7;
        let byte = bit / 8;
        let shift = bit % 8;
        let Some(&low) = data.get(byte) else {
            break;
        };
        let mut value = (low as u16) >> shift;
        if shift > 1 {
            match data.get(byte + 1) {
                Some(&high) => value |= (high as u16) << (8 - shift),
                None => break,
            }
        }
        septets.push((value & 0x7F) as u8);
    }
    septets
}

/// Pack septets into 7-bit packed bytes.
///
/// Returns the packed bytes and the number of spare bits in the last byte.
pub fn pack_septets(septets: &[u8]) -> (Vec<u8>, u8) {
    let total_bits = septets.len() * 7;
    let mut out = vec![0u8; total_bits.div_ceil(8)];
    for (i, septet) in septets.iter().enumerate() {
        let bit = i * 7;
        let byte = bit / 8;
        let shift = bit % 8;
        let value = ((*septet & 0x7F) as u16) << shift;
        out[byte] |= (value & 0xFF) as u8;
        if shift > 1 {
            out[byte + 1] |= (value >> 8) as u8;
        }
    }
    let spare = (out.len() * 8 - total_bits) as u8;
    (out, spare)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpacked_ascii_subset() {
        assert_eq!(decode_unpacked(&[0x41, 0x42, 0x43]), "ABC");
        assert_eq!(decode_unpacked(&[0x41, 0x42, 0xFF, 0x43]), "AB");
    }

    #[test]
    fn test_unpacked_escape_sequence() {
        assert_eq!(decode_unpacked(&[0x31, ESCAPE, 0x65]), "1€");
        // dangling escape at end of field
        assert_eq!(decode_unpacked(&[0x41, ESCAPE]), "A ");
    }

    #[test]
    fn test_pack_known_vector() {
        let (packed, spare) = pack_septets(&[0x41, 0x42, 0x43]);
        assert_eq!(packed, vec![0x41, 0xE1, 0x10]);
        assert_eq!(spare, 3);
        assert_eq!(unpack_septets(&packed, 3), vec![0x41, 0x42, 0x43]);
    }

    #[test]
    fn test_unpack_stops_at_end_of_data() {
        assert_eq!(unpack_septets(&[0x41], 4), vec![0x41]);
    }

    #[test]
    fn test_encode_char() {
        assert_eq!(encode_char('A'), Some(vec![0x41]));
        assert_eq!(encode_char('€'), Some(vec![ESCAPE, 0x65]));
        assert_eq!(encode_char('中'), None);
    }
}
