//! Utility module
//!
//! Packet-id arithmetic shared by the session machine. Ids live in a 15-bit
//! space and wrap, so ordering is only meaningful within half the space.

use crate::core::PACKET_ID_SPACE;

/// Returns the id following `id`, wrapping at the end of the id space
pub fn next_packet_id(id: u16) -> u16 {
    (id + 1) % PACKET_ID_SPACE
}

/// Forward distance from `from` to `to`, in the wrapped id space
pub fn packet_id_distance(from: u16, to: u16) -> u16 {
    (to.wrapping_sub(from)) % PACKET_ID_SPACE
}

/// Whether `id` lies strictly before `reference`, treating ids less than half
/// the space behind `reference` as older.
pub fn is_before(id: u16, reference: u16) -> bool {
    let back = packet_id_distance(id, reference);
    back != 0 && back < PACKET_ID_SPACE / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_wraps() {
        assert_eq!(next_packet_id(1), 2);
        assert_eq!(next_packet_id(0x7FFF), 0);
    }

    #[test]
    fn test_distance_wraps() {
        assert_eq!(packet_id_distance(5, 9), 4);
        assert_eq!(packet_id_distance(0x7FFE, 1), 3);
        assert_eq!(packet_id_distance(3, 3), 0);
    }

    #[test]
    fn test_is_before() {
        assert!(is_before(4, 5));
        assert!(is_before(0x7FFF, 2));
        assert!(!is_before(5, 5));
        assert!(!is_before(6, 5));
        assert!(!is_before(2, 0x7FFF));
    }
}
