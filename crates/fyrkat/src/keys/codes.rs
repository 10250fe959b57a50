//! Key code definitions and the digit mapping table

/// Linux input-event code for a physical key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

/// The Return/Enter key, sent once after every successfully typed code.
pub const KEY_ENTER: KeyCode = KeyCode(28);

// Linux puts KEY_1..KEY_9 at 2..10 and KEY_0 at 11, so the table is indexed
// by digit value rather than computed.
const DIGIT_CODES: [KeyCode; 10] = [
    KeyCode(11), // '0'
    KeyCode(2),  // '1'
    KeyCode(3),  // '2'
    KeyCode(4),  // '3'
    KeyCode(5),  // '4'
    KeyCode(6),  // '5'
    KeyCode(7),  // '6'
    KeyCode(8),  // '7'
    KeyCode(9),  // '8'
    KeyCode(10), // '9'
];

/// Maps an input byte to its digit key code.
///
/// Total over all byte values: ASCII '0'..'9' map to the corresponding key,
/// everything else maps to `None` and is rejected later by batch validation.
pub fn digit_code(byte: u8) -> Option<KeyCode> {
    match byte {
        b'0'..=b'9' => Some(DIGIT_CODES[(byte - b'0') as usize]),
        _ => None,
    }
}

/// All key codes the virtual keyboard can emit.
pub fn emittable_codes() -> impl Iterator<Item = KeyCode> {
    DIGIT_CODES.iter().copied().chain(std::iter::once(KEY_ENTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_mapping_table() {
        assert_eq!(digit_code(b'0'), Some(KeyCode(11)));
        assert_eq!(digit_code(b'1'), Some(KeyCode(2)));
        assert_eq!(digit_code(b'9'), Some(KeyCode(10)));
    }

    #[test]
    fn test_non_digits_have_no_mapping() {
        assert_eq!(digit_code(b'a'), None);
        assert_eq!(digit_code(b' '), None);
        assert_eq!(digit_code(b'/'), None); // one below '0'
        assert_eq!(digit_code(b':'), None); // one above '9'
        assert_eq!(digit_code(0x00), None);
        assert_eq!(digit_code(0xFF), None);
    }

    #[test]
    fn test_digit_codes_are_distinct() {
        let mut codes: Vec<u16> = (b'0'..=b'9').map(|b| digit_code(b).unwrap().0).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 10);
        assert!(!codes.contains(&KEY_ENTER.0));
    }

    #[test]
    fn test_emittable_set_covers_digits_and_enter() {
        let codes: Vec<KeyCode> = emittable_codes().collect();
        assert_eq!(codes.len(), 11);
        assert!(codes.contains(&KEY_ENTER));
    }
}
