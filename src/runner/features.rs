//! Feature bitfield encoding.
//!
//! Bits are numbered from the least significant bit of the **last** byte, and the
//! field is as short as possible (BOLT-9 style): bit 0 is `"01"`, bit 9 is `"0200"`.

use std::collections::BTreeSet;

/// Encodes a set of feature bits as a lowercase hex bitfield.
///
/// # Example
/// ```
/// use peervisor::encode_features;
///
/// assert_eq!(encode_features([]), "");
/// assert_eq!(encode_features([0, 3]), "09");
/// assert_eq!(encode_features([9]), "0200");
/// ```
pub fn encode_features(bits: impl IntoIterator<Item = u32>) -> String {
    let bits: BTreeSet<u32> = bits.into_iter().collect();
    let Some(&highest) = bits.last() else {
        return String::new();
    };

    let len = highest as usize / 8 + 1;
    let mut bytes = vec![0u8; len];
    for bit in bits {
        let idx = len - 1 - bit as usize / 8;
        bytes[idx] |= 1 << (bit % 8);
    }
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_99_sets_top_byte() {
        let hex = encode_features([99]);
        assert_eq!(hex.len(), 26);
        assert_eq!(&hex[..2], "08");
        assert!(hex[2..].chars().all(|c| c == '0'));
    }

    #[test]
    fn test_duplicates_and_order_ignored() {
        assert_eq!(encode_features([7, 1, 7]), encode_features([1, 7]));
        assert_eq!(encode_features([1, 7]), "82");
    }
}
