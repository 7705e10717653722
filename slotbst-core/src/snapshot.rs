use thiserror::Error;

use crate::{
    freelist::{self, Freelist},
    slot::SlotId,
    store::{Node, NodeStore},
    tree::Tree,
    Value, MAX_CAPACITY,
};

/// The current format version of SlotBST snapshots.
const VERSION: u32 = 1;

/// A special sequence of bytes that is used at the beginning of a snapshot for validation.
const MAGIC: u32 = 0x5B57_B057;

/// Magic, version, capacity and root.
const HEADER_LEN: usize = 4 * 4;

/// Value, left and right of one node table entry.
const ENTRY_LEN: usize = 8 + 4 + 4;

type Checksum = u32;

const CHECKSUM_LEN: usize = std::mem::size_of::<Checksum>();

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum ValidationError {
    #[error("the snapshot is invalid")]
    FileInvalid,
    #[error("the snapshot format version is mismatched")]
    VersionMismatched,
    #[error("the snapshot checksum is mismatched")]
    ChecksumMismatched,
    #[error("the snapshot capacity {0} is not supported")]
    CapacityInvalid(u32),
    #[error("slot {0} of the snapshot is out of range")]
    SlotOutOfRange(SlotId),
    #[error("the snapshot root {0} is a free slot")]
    RootFree(SlotId),
    #[error("the snapshot free list is invalid: {0}")]
    FreelistInvalid(#[from] freelist::Error),
}

/// Encodes the complete engine state.
///
/// ```text
/// | magic | version | capacity | root | (value, left, right) x (capacity + 1) |
/// | free count | free slot x free count | crc32 |
/// ```
///
/// Every field is little endian, slots are `u32`, values are `i64`.
pub(crate) fn encode(tree: &Tree) -> Vec<u8> {
    let capacity = tree.capacity();
    let freelist = tree.freelist();
    let len = HEADER_LEN
        + (capacity as usize + 1) * ENTRY_LEN
        + 4
        + freelist.len() * 4
        + CHECKSUM_LEN;

    let mut bytes = Vec::with_capacity(len);
    bytes.extend_from_slice(&MAGIC.to_le_bytes());
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&capacity.to_le_bytes());
    bytes.extend_from_slice(&tree.root().to_le_bytes());

    for raw in 0..=capacity {
        // The store covers every slot up to the capacity.
        let node = tree.node(SlotId::from_raw(raw)).unwrap_or_default();
        bytes.extend_from_slice(&node.value.to_le_bytes());
        bytes.extend_from_slice(&node.left.to_le_bytes());
        bytes.extend_from_slice(&node.right.to_le_bytes());
    }

    bytes.extend_from_slice(&(freelist.len() as u32).to_le_bytes());
    for slot in freelist.iter() {
        bytes.extend_from_slice(&slot.to_le_bytes());
    }

    let checksum = calc_checksum(&bytes);
    bytes.extend_from_slice(&checksum.to_le_bytes());
    bytes
}

/// Decodes and validates a snapshot produced by [`encode`].
pub(crate) fn decode(bytes: &[u8]) -> Result<Tree, ValidationError> {
    let mut reader = Reader { bytes };
    if reader.u32()? != MAGIC {
        return Err(ValidationError::FileInvalid);
    }
    if reader.u32()? != VERSION {
        return Err(ValidationError::VersionMismatched);
    }

    // Validate checksum.
    let Some(body_len) = bytes.len().checked_sub(CHECKSUM_LEN) else {
        return Err(ValidationError::FileInvalid);
    };
    let (body, checksum) = bytes.split_at(body_len);
    let stored = Reader { bytes: checksum }.u32()?;
    if stored != calc_checksum(body) {
        return Err(ValidationError::ChecksumMismatched);
    }

    let mut reader = Reader {
        bytes: &body[8..],
    };
    let capacity = reader.u32()?;
    if capacity == 0 || capacity > MAX_CAPACITY {
        return Err(ValidationError::CapacityInvalid(capacity));
    }
    let check = |slot: SlotId| {
        if slot.raw() > capacity {
            Err(ValidationError::SlotOutOfRange(slot))
        } else {
            Ok(slot)
        }
    };
    let root = check(reader.slot()?)?;

    let mut store = NodeStore::new(capacity);
    for raw in 0..=capacity {
        let value = reader.i64()?;
        let left = check(reader.slot()?)?;
        let right = check(reader.slot()?)?;
        if raw == 0 {
            // The null entry carries nothing.
            continue;
        }
        store
            .set(SlotId::from_raw(raw), Node::new(value, left, right))
            .map_err(|_| ValidationError::SlotOutOfRange(SlotId::from_raw(raw)))?;
    }

    let count = reader.u32()?;
    if count > capacity {
        return Err(ValidationError::FileInvalid);
    }
    let sequence = (0..count)
        .map(|_| reader.slot())
        .collect::<Result<Vec<_>, _>>()?;
    if !reader.bytes.is_empty() {
        return Err(ValidationError::FileInvalid);
    }
    let freelist = Freelist::from_sequence(capacity, sequence)?;

    if freelist.is_free(root) {
        return Err(ValidationError::RootFree(root));
    }
    Ok(Tree::from_parts(store, freelist, root))
}

/// Calculates a checksum of the snapshot using the CRC32 algorithm.
#[inline]
fn calc_checksum(bytes: &[u8]) -> Checksum {
    crc32fast::hash(bytes)
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl Reader<'_> {
    #[inline]
    fn take<const N: usize>(&mut self) -> Result<[u8; N], ValidationError> {
        if self.bytes.len() < N {
            return Err(ValidationError::FileInvalid);
        }
        let (head, tail) = self.bytes.split_at(N);
        self.bytes = tail;
        head.try_into().map_err(|_| ValidationError::FileInvalid)
    }

    #[inline]
    fn u32(&mut self) -> Result<u32, ValidationError> {
        self.take().map(u32::from_le_bytes)
    }

    #[inline]
    fn i64(&mut self) -> Result<Value, ValidationError> {
        self.take().map(Value::from_le_bytes)
    }

    #[inline]
    fn slot(&mut self) -> Result<SlotId, ValidationError> {
        self.take().map(SlotId::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::{calc_checksum, decode, encode, ValidationError, MAGIC, VERSION};
    use crate::{
        freelist,
        tree::{tests::tree_of, DeleteJob, Tree},
    };

    #[test]
    fn test_layout() {
        let tree = tree_of(2, &[7]);
        let bytes = encode(&tree);

        // header + 3 entries + free count + 1 free slot + checksum
        assert_eq!(bytes.len(), 16 + 3 * 16 + 4 + 4 + 4);
        assert_eq!(bytes[0..4], MAGIC.to_le_bytes());
        assert_eq!(bytes[4..8], VERSION.to_le_bytes());
        assert_eq!(bytes[8..12], 2u32.to_le_bytes());
        assert_eq!(bytes[12..16], 1u32.to_le_bytes());
        // Slot 1 holds 7 without children.
        assert_eq!(bytes[32..40], 7i64.to_le_bytes());
        assert_eq!(bytes[40..48], [0; 8]);
        // One free slot: 2.
        assert_eq!(bytes[64..68], 1u32.to_le_bytes());
        assert_eq!(bytes[68..72], 2u32.to_le_bytes());
        assert_eq!(bytes[72..76], calc_checksum(&bytes[..72]).to_le_bytes());
    }

    #[test]
    fn test_decode_restores_state() {
        let mut tree = tree_of(7, &[50, 30, 70, 20, 40]);
        let root = tree.root();
        DeleteJob::new(30, root).run(&mut tree).unwrap();

        let decoded = decode(&encode(&tree)).unwrap();
        assert_eq!(decoded, tree);
        assert_eq!(
            decoded.freelist().iter().collect::<Vec<_>>(),
            tree.freelist().iter().collect::<Vec<_>>()
        );

        let empty = Tree::new(3);
        assert_eq!(decode(&encode(&empty)).unwrap(), empty);
    }

    #[test]
    fn test_decode_rejects() {
        let tree = tree_of(4, &[2, 1, 3]);
        let bytes = encode(&tree);

        assert_eq!(decode(&[]), Err(ValidationError::FileInvalid));
        assert_eq!(decode(&bytes[..6]), Err(ValidationError::FileInvalid));

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] ^= 0xFF;
        assert_eq!(decode(&wrong_magic), Err(ValidationError::FileInvalid));

        let mut wrong_version = bytes.clone();
        wrong_version[4] = 9;
        assert_eq!(decode(&wrong_version), Err(ValidationError::VersionMismatched));

        let mut flipped = bytes.clone();
        flipped[40] ^= 1;
        assert_eq!(decode(&flipped), Err(ValidationError::ChecksumMismatched));

        assert_eq!(
            decode(&bytes[..bytes.len() - 1]),
            Err(ValidationError::ChecksumMismatched)
        );
    }

    #[test]
    fn test_decode_rejects_bad_content() {
        fn resealed(mut bytes: Vec<u8>, patch: impl FnOnce(&mut [u8])) -> Vec<u8> {
            let body_len = bytes.len() - 4;
            patch(&mut bytes[..body_len]);
            let checksum = calc_checksum(&bytes[..body_len]);
            bytes[body_len..].copy_from_slice(&checksum.to_le_bytes());
            bytes
        }

        // capacity 2 with value 7 in slot 1 and free slot 2 at offset 68
        let bytes = encode(&tree_of(2, &[7]));

        let bad_link = resealed(bytes.clone(), |b| b[40..44].copy_from_slice(&9u32.to_le_bytes()));
        assert_eq!(
            decode(&bad_link),
            Err(ValidationError::SlotOutOfRange(9.into()))
        );

        let root_free = resealed(bytes.clone(), |b| b[12..16].copy_from_slice(&2u32.to_le_bytes()));
        assert_eq!(decode(&root_free), Err(ValidationError::RootFree(2.into())));

        let occupied_root = resealed(bytes.clone(), |b| b[68..72].copy_from_slice(&1u32.to_le_bytes()));
        assert_eq!(decode(&occupied_root), Err(ValidationError::RootFree(1.into())));

        // capacity 3 with free slots 2 and 3 at offsets 84 and 88
        let double = resealed(encode(&tree_of(3, &[7])), |b| {
            b[88..92].copy_from_slice(&2u32.to_le_bytes());
        });
        assert_eq!(
            decode(&double),
            Err(ValidationError::FreelistInvalid(freelist::Error::DoubleRelease(
                2.into()
            )))
        );

        let null_free = resealed(bytes, |b| b[68..72].copy_from_slice(&0u32.to_le_bytes()));
        assert_eq!(
            decode(&null_free),
            Err(ValidationError::FreelistInvalid(freelist::Error::Corrupted(
                0.into(),
                2
            )))
        );
    }
}
