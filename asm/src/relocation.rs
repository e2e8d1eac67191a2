use crate::error::Error;
use std::collections::BTreeSet;

/// Word addresses of immediates that hold absolute code addresses.
///
/// Serialized as a big-endian entry count followed by the big-endian
/// entries in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationTable {
    entries: BTreeSet<u16>,
}

impl RelocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the address was already present.
    pub fn add_entry(&mut self, address: u16) -> bool {
        self.entries.insert(address)
    }

    pub fn contains(&self, address: u16) -> bool {
        self.entries.contains(&address)
    }

    /// Add every entry of `other` shifted by `offset`.
    pub fn merge(&mut self, other: &RelocationTable, offset: u16) -> Result<(), Error> {
        let shifted = other
            .entries
            .iter()
            .map(|&e| e.checked_add(offset).ok_or(Error::AddressOutOfRange(e, offset)))
            .collect::<Result<Vec<u16>, Error>>()?;
        self.entries.extend(shifted);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Size of the serialized table in bytes.
    pub fn size_in_bytes(&self) -> usize {
        2 + 2 * self.entries.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let count = u16::try_from(self.entries.len())
            .map_err(|_| Error::RelocationTableOverflow(self.entries.len()))?;
        let mut bytes = Vec::with_capacity(self.size_in_bytes());
        bytes.extend_from_slice(&count.to_be_bytes());
        for entry in &self.entries {
            bytes.extend_from_slice(&entry.to_be_bytes());
        }
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let words: Vec<u16> = bytes
            .chunks(2)
            .map(|c| match c {
                [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
                _ => Err(Error::InvalidRelocationData),
            })
            .collect::<Result<_, _>>()?;
        let (count, entries) = words.split_first().ok_or(Error::InvalidRelocationData)?;
        if entries.len() != *count as usize {
            return Err(Error::InvalidRelocationData);
        }
        Ok(Self {
            entries: entries.iter().copied().collect(),
        })
    }
}

impl FromIterator<u16> for RelocationTable {
    fn from_iter<T: IntoIterator<Item = u16>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_shifts_by_offset() {
        let mut combined = RelocationTable::new();
        let a: RelocationTable = [0x0001, 0x0005].into_iter().collect();
        let b: RelocationTable = [0x0002].into_iter().collect();
        combined.merge(&a, 0x0000).unwrap();
        combined.merge(&b, 0x0100).unwrap();
        assert_eq!(combined.iter().collect::<Vec<_>>(), vec![0x0001, 0x0005, 0x0102]);
    }

    #[test]
    fn merge_overflow_leaves_table_untouched() {
        let mut combined: RelocationTable = [0x0010].into_iter().collect();
        let b: RelocationTable = [0x0001, 0x0020].into_iter().collect();
        let err = combined.merge(&b, 0xFFF0).unwrap_err();
        assert!(matches!(err, Error::AddressOutOfRange(0x0020, 0xFFF0)));
        assert_eq!(combined.len(), 1);
    }

    #[test]
    fn serialized_layout() {
        let table: RelocationTable = [0x0102, 0x0001].into_iter().collect();
        assert_eq!(table.to_bytes().unwrap(), vec![0x00, 0x02, 0x00, 0x01, 0x01, 0x02]);
        assert_eq!(RelocationTable::from_bytes(&table.to_bytes().unwrap()).unwrap(), table);
        assert_eq!(RelocationTable::new().to_bytes().unwrap(), vec![0, 0]);
        assert!(RelocationTable::from_bytes(&[0x00, 0x02, 0x00]).is_err());
    }
}
