//! Triple key encoding
//!
//! Each index key is the concatenation of three unsigned 64-bit big-endian
//! dictionary IDs: 24 bytes total. Big-endian keeps lexicographic byte
//! order equal to numeric tuple order, so an 8-byte prefix selects by the
//! leading position and a 16-byte prefix by the leading two.

use crate::{StorageError, StorageResult};

/// Length in bytes of a full triple key
pub const KEY_LEN: usize = 24;
/// Length in bytes of a one-position prefix
pub const PREFIX1_LEN: usize = 8;
/// Length in bytes of a two-position prefix
pub const PREFIX2_LEN: usize = 16;

/// A triple at the persistence layer: three dictionary IDs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct IdTriple {
    /// Subject ID
    pub s: u64,
    /// Predicate ID
    pub p: u64,
    /// Object ID
    pub o: u64,
}

impl IdTriple {
    /// Create a new ID triple
    pub fn new(s: u64, p: u64, o: u64) -> Self {
        Self { s, p, o }
    }
}

impl From<(u64, u64, u64)> for IdTriple {
    fn from((s, p, o): (u64, u64, u64)) -> Self {
        Self { s, p, o }
    }
}

impl From<IdTriple> for (u64, u64, u64) {
    fn from(t: IdTriple) -> Self {
        (t.s, t.p, t.o)
    }
}

fn encode3(a: u64, b: u64, c: u64) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..16].copy_from_slice(&b.to_be_bytes());
    key[16..].copy_from_slice(&c.to_be_bytes());
    key
}

fn decode3(key: &[u8]) -> StorageResult<(u64, u64, u64)> {
    if key.len() != KEY_LEN {
        return Err(StorageError::CorruptKey {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&key[..8]);
    let a = u64::from_be_bytes(buf);
    buf.copy_from_slice(&key[8..16]);
    let b = u64::from_be_bytes(buf);
    buf.copy_from_slice(&key[16..]);
    let c = u64::from_be_bytes(buf);
    Ok((a, b, c))
}

/// Encode for the `spo` column family
pub fn spo_key(t: &IdTriple) -> [u8; KEY_LEN] {
    encode3(t.s, t.p, t.o)
}

/// Encode for the `pos` column family
pub fn pos_key(t: &IdTriple) -> [u8; KEY_LEN] {
    encode3(t.p, t.o, t.s)
}

/// Encode for the `osp` column family
pub fn osp_key(t: &IdTriple) -> [u8; KEY_LEN] {
    encode3(t.o, t.s, t.p)
}

/// Decode an `spo` key back into a triple
pub fn decode_spo_key(key: &[u8]) -> StorageResult<IdTriple> {
    let (s, p, o) = decode3(key)?;
    Ok(IdTriple { s, p, o })
}

/// Decode a `pos` key back into a triple
pub fn decode_pos_key(key: &[u8]) -> StorageResult<IdTriple> {
    let (p, o, s) = decode3(key)?;
    Ok(IdTriple { s, p, o })
}

/// Decode an `osp` key back into a triple
pub fn decode_osp_key(key: &[u8]) -> StorageResult<IdTriple> {
    let (o, s, p) = decode3(key)?;
    Ok(IdTriple { s, p, o })
}

/// 8-byte prefix selecting by the leading key position
pub fn prefix1(a: u64) -> [u8; PREFIX1_LEN] {
    a.to_be_bytes()
}

/// 16-byte prefix selecting by the leading two key positions
pub fn prefix2(a: u64, b: u64) -> [u8; PREFIX2_LEN] {
    let mut prefix = [0u8; PREFIX2_LEN];
    prefix[..8].copy_from_slice(&a.to_be_bytes());
    prefix[8..].copy_from_slice(&b.to_be_bytes());
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip_all_permutations() {
        let t = IdTriple::new(3, 500, u64::MAX);
        assert_eq!(decode_spo_key(&spo_key(&t)).unwrap(), t);
        assert_eq!(decode_pos_key(&pos_key(&t)).unwrap(), t);
        assert_eq!(decode_osp_key(&osp_key(&t)).unwrap(), t);
    }

    #[test]
    fn test_prefixes_are_key_prefixes() {
        let t = IdTriple::new(7, 8, 9);
        let key = spo_key(&t);
        assert!(key.starts_with(&prefix1(7)));
        assert!(key.starts_with(&prefix2(7, 8)));
        assert!(!key.starts_with(&prefix1(8)));
    }

    #[test]
    fn test_short_key_rejected() {
        assert!(decode_spo_key(&[0u8; 23]).is_err());
    }

    proptest! {
        #[test]
        fn prop_key_round_trip(s in any::<u64>(), p in any::<u64>(), o in any::<u64>()) {
            let t = IdTriple::new(s, p, o);
            prop_assert_eq!(decode_spo_key(&spo_key(&t)).unwrap(), t);
        }

        #[test]
        fn prop_key_order_matches_tuple_order(
            a in any::<(u64, u64, u64)>(),
            b in any::<(u64, u64, u64)>(),
        ) {
            let ka = spo_key(&IdTriple::from(a));
            let kb = spo_key(&IdTriple::from(b));
            prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
        }
    }
}
