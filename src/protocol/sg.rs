//! Scatter/gather packing.
//!
//! On the wire an SG list is two consecutive regions:
//! ```text
//! [count_0][count_1]...[count_n-1][data_0][data_1]...[data_n-1]
//! ```
//! Counts are u32 LE. Addresses never travel; the receiver rebuilds
//! descriptors that borrow the data region of its own copy of the buffer.

use crate::error::{Result, TxnWireError};
use crate::request::{SgFragment, SgList};

use super::wire_format::{get_u32, put_u32, SG_COUNT_SIZE};

/// Size of the SG area of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SgArea {
    /// Fragments before the terminator.
    pub element_count: usize,
    /// Sum of fragment counts.
    pub data_bytes: usize,
}

impl SgArea {
    /// Count table plus data.
    #[inline]
    pub fn size(&self) -> usize {
        self.element_count * SG_COUNT_SIZE + self.data_bytes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }
}

/// Fragments of `list` up to (not including) the terminator.
///
/// Walks the raw entries instead of trusting any cached length. A list with
/// more than `max_fragments` live fragments is treated as unterminated.
pub fn live_fragments<'l, 'a>(
    list: &'l SgList<'a>,
    max_fragments: usize,
) -> Result<&'l [SgFragment<'a>]> {
    let live = live_len(list.entries(), max_fragments)?;
    Ok(&list.entries()[..live])
}

/// Mutable variant of [`live_fragments`].
pub fn live_fragments_mut<'l, 'a>(
    list: &'l mut SgList<'a>,
    max_fragments: usize,
) -> Result<&'l mut [SgFragment<'a>]> {
    let live = live_len(list.entries(), max_fragments)?;
    Ok(&mut list.entries_mut()[..live])
}

fn live_len(entries: &[SgFragment<'_>], max_fragments: usize) -> Result<usize> {
    for (index, fragment) in entries.iter().enumerate() {
        if fragment.is_terminator() {
            return Ok(index);
        }
        if index >= max_fragments {
            return Err(TxnWireError::UnterminatedSgList {
                limit: max_fragments,
            });
        }
    }
    Ok(entries.len())
}

/// Compute the SG area for an optional list.
pub fn measure(list: Option<&SgList<'_>>, max_fragments: usize) -> Result<SgArea> {
    let Some(list) = list else {
        return Ok(SgArea::default());
    };

    let fragments = live_fragments(list, max_fragments)?;
    let mut data_bytes = 0usize;
    for fragment in fragments {
        if fragment.count() > u32::MAX as usize {
            return Err(TxnWireError::Protocol(format!(
                "SG fragment of {} bytes does not fit a u32 count",
                fragment.count()
            )));
        }
        data_bytes = data_bytes.checked_add(fragment.count()).ok_or_else(|| {
            TxnWireError::Protocol("SG data size overflows usize".to_string())
        })?;
    }

    Ok(SgArea {
        element_count: fragments.len(),
        data_bytes,
    })
}

/// Write count table then fragment data into `out`.
///
/// `out` starts at the count table and must be exactly `area.size()` long.
pub fn pack(fragments: &[SgFragment<'_>], area: SgArea, out: &mut [u8]) {
    debug_assert_eq!(out.len(), area.size());
    debug_assert_eq!(fragments.len(), area.element_count);

    let (table, data) = out.split_at_mut(area.element_count * SG_COUNT_SIZE);
    let mut cursor = 0usize;
    for (index, fragment) in fragments.iter().enumerate() {
        put_u32(table, index * SG_COUNT_SIZE, fragment.count() as u32);
        data[cursor..cursor + fragment.count()].copy_from_slice(fragment.data());
        cursor += fragment.count();
    }
}

/// Iterate the counts of an encoded count table.
pub fn counts(table: &[u8]) -> impl Iterator<Item = u32> + '_ {
    table
        .chunks_exact(SG_COUNT_SIZE)
        .map(|chunk| get_u32(chunk, 0))
}

/// Sum a received count table, rejecting zero counts.
///
/// A zero count would be indistinguishable from the terminator.
pub fn data_size(table: &[u8]) -> Result<usize> {
    let mut total = 0usize;
    for (index, count) in counts(table).enumerate() {
        if count == 0 {
            return Err(TxnWireError::Protocol(format!(
                "SG fragment {} has zero length",
                index
            )));
        }
        total = total
            .checked_add(count as usize)
            .ok_or_else(|| TxnWireError::Protocol("SG data size overflows usize".to_string()))?;
    }
    Ok(total)
}

/// One entry of a reconstructed descriptor array.
///
/// The final entry of every array is a terminator: zero count, no data.
#[derive(Debug)]
pub struct SgDescriptor<'w> {
    offset: usize,
    data: Option<&'w mut [u8]>,
}

impl<'w> SgDescriptor<'w> {
    fn terminator() -> Self {
        Self {
            offset: 0,
            data: None,
        }
    }

    /// Fragment byte count; zero for the terminator.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }

    /// Offset of the fragment within the wire buffer; `None` for the terminator.
    #[inline]
    pub fn offset(&self) -> Option<usize> {
        self.data.as_ref().map(|_| self.offset)
    }

    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.data.is_none()
    }

    #[inline]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    #[inline]
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        self.data.as_deref_mut()
    }
}

/// Rebuild a terminated descriptor array over a received SG data region.
///
/// `data_offset` is the position of `data` inside the wire buffer and is
/// only recorded for introspection. The array is allocated fallibly with
/// exactly `n + 1` entries.
pub fn unpack_descriptors<'w>(
    table: &[u8],
    mut data: &'w mut [u8],
    data_offset: usize,
) -> Result<Vec<SgDescriptor<'w>>> {
    let n = table.len() / SG_COUNT_SIZE;
    let entries = n + 1;

    let mut descriptors = Vec::new();
    descriptors.try_reserve_exact(entries).map_err(|_| TxnWireError::AllocationFailed {
        bytes: entries * std::mem::size_of::<SgDescriptor<'_>>(),
    })?;

    let mut cursor = data_offset;
    for count in counts(table) {
        let count = count as usize;
        if count > data.len() {
            return Err(TxnWireError::Protocol(format!(
                "SG fragment of {} bytes overruns the data region",
                count
            )));
        }
        let (fragment, rest) = std::mem::take(&mut data).split_at_mut(count);
        descriptors.push(SgDescriptor {
            offset: cursor,
            data: Some(fragment),
        });
        cursor += count;
        data = rest;
    }
    descriptors.push(SgDescriptor::terminator());

    Ok(descriptors)
}
