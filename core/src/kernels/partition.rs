//! Splitting strided loops across workers.
//!
//! Worker `thread_id` of `thread_count` handles elements
//! `thread_id, thread_id + thread_count, ...`, advancing every pointer by
//! `thread_count * stride` per step. The partitions of one loop are disjoint
//! and together cover every element exactly once.

use core::iter::StepBy;
use core::ops::Range;

use smallvec::SmallVec;

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub thread_id: usize,
    pub thread_count: usize,
}

impl Partition {
    /// The whole loop on one worker.
    pub const SERIAL: Partition = Partition {
        thread_id: 0,
        thread_count: 1,
    };

    pub fn new(thread_id: usize, thread_count: usize) -> Result<Self> {
        if thread_count == 0 || thread_id >= thread_count {
            return Err(Error::Builder(format!(
                "invalid partition {thread_id} of {thread_count}"
            )));
        }
        Ok(Self {
            thread_id,
            thread_count,
        })
    }

    /// Every partition of a loop split `thread_count` ways.
    pub fn all(thread_count: usize) -> impl Iterator<Item = Partition> {
        let thread_count = thread_count.max(1);
        (0..thread_count).map(move |thread_id| Partition {
            thread_id,
            thread_count,
        })
    }

    /// Element indices of a `count` element loop handled by this partition.
    pub fn indices(self, count: usize) -> StepBy<Range<usize>> {
        (self.thread_id.min(count)..count).step_by(self.thread_count.max(1))
    }
}

/// Calls `f` once per element of this partition with the element's
/// destination and source pointers.
///
/// Pointers are advanced with wrapping arithmetic and only dereferenced by
/// `f`, so this function itself is safe.
pub fn for_each_element<F>(
    dst: *mut u8,
    dst_stride: isize,
    src: &[*const u8],
    src_stride: &[isize],
    count: usize,
    part: Partition,
    mut f: F,
) -> Result<()>
where
    F: FnMut(*mut u8, &[*const u8]) -> Result<()>,
{
    let first = part.thread_id as isize;
    let step = part.thread_count.max(1) as isize;
    let mut d = dst.wrapping_offset(first * dst_stride);
    let mut s: SmallVec<[*const u8; 4]> = src
        .iter()
        .zip(src_stride)
        .map(|(&p, &stride)| p.wrapping_offset(first * stride))
        .collect();
    for _ in part.indices(count) {
        f(d, &s)?;
        d = d.wrapping_offset(step * dst_stride);
        for (p, &stride) in s.iter_mut().zip(src_stride) {
            *p = p.wrapping_offset(step * stride);
        }
    }
    Ok(())
}
