// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Bounds checks on packet memory.
//!
//! No byte of a packet is read before one of these checks has shown
//! that the whole header containing it lies within the packet.

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;

/// Is `[off, off + size)` inside a packet ending at `end`?
#[inline]
pub fn accessible(off: usize, size: usize, end: usize) -> bool {
    match off.checked_add(size) {
        Some(lim) => lim <= end,
        None => false,
    }
}

/// Like [`accessible`], but additionally requires at least one byte
/// past the header. This is the check the L4 parsers apply.
#[inline]
pub fn accessible_strict(off: usize, size: usize, end: usize) -> bool {
    match off.checked_add(size) {
        Some(lim) => lim < end,
        None => false,
    }
}

/// A typed view of the header `H` at `off`, if it is [`accessible`].
#[inline]
pub fn header_at<H>(data: &[u8], off: usize) -> Option<&H>
where
    H: FromBytes + Immutable + KnownLayout + Unaligned,
{
    if !accessible(off, size_of::<H>(), data.len()) {
        return None;
    }
    view(data, off)
}

/// A typed view of the header `H` at `off`, if it is
/// [`accessible_strict`].
#[inline]
pub fn header_at_strict<H>(data: &[u8], off: usize) -> Option<&H>
where
    H: FromBytes + Immutable + KnownLayout + Unaligned,
{
    if !accessible_strict(off, size_of::<H>(), data.len()) {
        return None;
    }
    view(data, off)
}

fn view<H>(data: &[u8], off: usize) -> Option<&H>
where
    H: FromBytes + Immutable + KnownLayout + Unaligned,
{
    let tail = data.get(off..)?;
    H::ref_from_prefix(tail).ok().map(|(hdr, _rest)| hdr)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exact_fit() {
        assert!(accessible(14, 20, 34));
        assert!(!accessible(14, 20, 33));
        assert!(!accessible_strict(14, 20, 34));
        assert!(accessible_strict(14, 20, 35));
    }

    #[test]
    fn overflow_is_inaccessible() {
        assert!(!accessible(usize::MAX, 1, usize::MAX));
        assert!(!accessible_strict(usize::MAX - 1, 2, usize::MAX));
    }

    #[test]
    fn typed_view() {
        let data = [1u8, 2, 3, 4, 5];
        let hdr: &[u8; 4] = header_at(&data, 1).unwrap();
        assert_eq!(hdr, &[2, 3, 4, 5]);
        assert!(header_at::<[u8; 4]>(&data, 2).is_none());
        assert!(header_at_strict::<[u8; 4]>(&data, 1).is_none());
        assert_eq!(header_at_strict::<[u8; 4]>(&data, 0), Some(&[1, 2, 3, 4]));
    }
}
