//! Hierarchical kernel frames in one growable buffer.
//!
//! A kernel is a tree of frames laid out in construction order. Each frame is
//! a [`FramePrefix`] (entry points, destructor, type tag) followed by the
//! kernel's own state. Frames refer to their children by byte offset, never
//! by pointer, because appending a child may reallocate the buffer while the
//! parent is still being filled in.

use core::any::{TypeId, type_name};
use core::mem::{align_of, needs_drop, size_of};

use tracing::{debug, trace};

use super::partition::{self, Partition};
use crate::aligned::AlignedBytes;
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;

/// An executable kernel frame.
///
/// Only `single` is required: the default `strided` runs `single` over the
/// elements of its partition, which is the adapter every dispatch path relies
/// on when a kernel has no specialised loop.
pub trait Kernel: Send + Sync + 'static {
    /// Processes one element.
    ///
    /// # Safety
    ///
    /// `dst` and every `src` must point to valid data of the types and arrmeta
    /// the kernel was instantiated for.
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()>;

    /// Processes the elements of `count` selected by `part`.
    ///
    /// # Safety
    ///
    /// As for [`Kernel::single`], for every element reached through the strides.
    #[allow(clippy::too_many_arguments)]
    unsafe fn strided(
        &self,
        frames: &KernelFrames,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
        part: Partition,
    ) -> Result<()> {
        partition::for_each_element(dst, dst_stride, src, src_stride, count, part, |d, s| unsafe {
            self.single(frames, d, s)
        })
    }
}

type SingleFn = unsafe fn(&KernelFrames, usize, *mut u8, &[*const u8]) -> Result<()>;
type StridedFn = unsafe fn(
    &KernelFrames,
    usize,
    *mut u8,
    isize,
    &[*const u8],
    &[isize],
    usize,
    Partition,
) -> Result<()>;
type DestructFn = unsafe fn(*mut u8);

#[repr(C)]
struct FramePrefix {
    single: SingleFn,
    strided: StridedFn,
    destruct: Option<DestructFn>,
    kernel_type: TypeId,
    kernel_name: &'static str,
    data_offset: usize,
}

/// Every frame starts at a multiple of this.
pub const FRAME_ALIGN: usize = AlignedBytes::ALIGN;

static_assertions::const_assert!(align_of::<FramePrefix>() <= FRAME_ALIGN);

const fn data_offset<K>() -> usize {
    size_of::<FramePrefix>().next_multiple_of(align_of::<K>())
}

const fn frame_size<K>() -> usize {
    (data_offset::<K>() + size_of::<K>()).next_multiple_of(FRAME_ALIGN)
}

unsafe fn single_entry<K: Kernel>(
    frames: &KernelFrames,
    offset: usize,
    dst: *mut u8,
    src: &[*const u8],
) -> Result<()> {
    let kernel = unsafe { frames.kernel_ref::<K>(offset) };
    unsafe { kernel.single(frames, dst, src) }
}

#[allow(clippy::too_many_arguments)]
unsafe fn strided_entry<K: Kernel>(
    frames: &KernelFrames,
    offset: usize,
    dst: *mut u8,
    dst_stride: isize,
    src: &[*const u8],
    src_stride: &[isize],
    count: usize,
    part: Partition,
) -> Result<()> {
    let kernel = unsafe { frames.kernel_ref::<K>(offset) };
    unsafe { kernel.strided(frames, dst, dst_stride, src, src_stride, count, part) }
}

unsafe fn destruct_entry<K>(data: *mut u8) {
    unsafe { core::ptr::drop_in_place(data as *mut K) };
}

/// The frame storage shared by [`KernelBuilder`] and [`CompiledKernel`].
///
/// Kernels receive it on every call so they can invoke their children by
/// offset.
pub struct KernelFrames {
    storage: AlignedBytes,
    len: usize,
    offsets: Vec<usize>,
    destructors: Vec<usize>,
}

// SAFETY: every frame holds a `Kernel`, which is `Send + Sync`.
unsafe impl Send for KernelFrames {}
unsafe impl Sync for KernelFrames {}

impl KernelFrames {
    fn new() -> Self {
        Self {
            storage: AlignedBytes::new(),
            len: 0,
            offsets: Vec::new(),
            destructors: Vec::new(),
        }
    }

    /// Offset at which the next frame will be placed.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.offsets.len()
    }

    fn is_frame(&self, offset: usize) -> bool {
        self.offsets.binary_search(&offset).is_ok()
    }

    /// # Safety
    ///
    /// `offset` must be the offset of a constructed frame.
    unsafe fn prefix(&self, offset: usize) -> &FramePrefix {
        debug_assert!(self.is_frame(offset), "no kernel frame at offset {offset}");
        unsafe { &*(self.storage.as_ptr().add(offset) as *const FramePrefix) }
    }

    /// # Safety
    ///
    /// `offset` must be the offset of a constructed frame holding a `K`.
    unsafe fn kernel_ref<K>(&self, offset: usize) -> &K {
        unsafe { &*(self.storage.as_ptr().add(offset + data_offset::<K>()) as *const K) }
    }

    /// Runs the single entry point of the frame at `offset`.
    ///
    /// # Safety
    ///
    /// `offset` must name a frame of this kernel, and the pointers must meet
    /// that frame's [`Kernel::single`] requirements.
    pub unsafe fn single(&self, offset: usize, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let prefix = unsafe { self.prefix(offset) };
        unsafe { (prefix.single)(self, offset, dst, src) }
    }

    /// Runs the strided entry point of the frame at `offset`.
    ///
    /// # Safety
    ///
    /// As for [`KernelFrames::single`], for every element reached.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn strided(
        &self,
        offset: usize,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
        part: Partition,
    ) -> Result<()> {
        let prefix = unsafe { self.prefix(offset) };
        unsafe { (prefix.strided)(self, offset, dst, dst_stride, src, src_stride, count, part) }
    }

    /// Destructs every frame, children (constructed later) first.
    fn reset(&mut self) {
        while let Some(offset) = self.destructors.pop() {
            // SAFETY: recorded when the frame was constructed, popped so it
            // runs once.
            unsafe {
                let (name, destruct, data_offset) = {
                    let prefix = self.prefix(offset);
                    (prefix.kernel_name, prefix.destruct, prefix.data_offset)
                };
                trace!(kernel = name, offset, "destructing kernel frame");
                if let Some(destruct) = destruct {
                    destruct(self.storage.as_mut_ptr().add(offset + data_offset));
                }
            }
        }
        self.offsets.clear();
        self.len = 0;
    }
}

impl Drop for KernelFrames {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Single-threaded builder of a kernel frame tree.
///
/// The first frame appended is the root. A parent that needs a child records
/// `ckb.len()`, appends the child, and patches the offset into itself with
/// [`KernelBuilder::get_mut`].
pub struct KernelBuilder {
    frames: KernelFrames,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            frames: KernelFrames::new(),
        }
    }

    /// Offset at which the next frame will be placed.
    pub fn len(&self) -> usize {
        self.frames.len
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.frame_count()
    }

    /// Appends a frame holding `kernel` and returns its offset.
    pub fn emplace_back<K: Kernel>(&mut self, kernel: K) -> usize {
        const { assert!(align_of::<K>() <= FRAME_ALIGN) };

        let offset = self.frames.len;
        let size = frame_size::<K>();
        self.frames.storage.reserve(offset + size);
        let destruct: Option<DestructFn> = if needs_drop::<K>() {
            Some(destruct_entry::<K>)
        } else {
            None
        };
        let prefix = FramePrefix {
            single: single_entry::<K>,
            strided: strided_entry::<K>,
            destruct,
            kernel_type: TypeId::of::<K>(),
            kernel_name: type_name::<K>(),
            data_offset: data_offset::<K>(),
        };
        // SAFETY: `reserve` made `offset + size` bytes available; `offset` is
        // FRAME_ALIGN aligned and the kernel sits at an offset aligned for `K`.
        unsafe {
            let base = self.frames.storage.as_mut_ptr().add(offset);
            core::ptr::write(base as *mut FramePrefix, prefix);
            core::ptr::write(base.add(data_offset::<K>()) as *mut K, kernel);
        }
        self.frames.len += size;
        self.frames.offsets.push(offset);
        if destruct.is_some() {
            self.frames.destructors.push(offset);
        }
        debug!(kernel = type_name::<K>(), offset, size, "emplaced kernel frame");
        offset
    }

    /// Appends the frame produced by `make`. If `make` fails, every frame
    /// appended so far is destructed before the error is returned.
    pub fn try_emplace_back<K: Kernel, F>(&mut self, make: F) -> Result<usize>
    where
        F: FnOnce() -> Result<K>,
    {
        match make() {
            Ok(kernel) => Ok(self.emplace_back(kernel)),
            Err(e) => {
                debug!(
                    kernel = type_name::<K>(),
                    frames = self.frame_count(),
                    error = %e,
                    "kernel frame construction failed, unwinding builder"
                );
                self.reset();
                Err(e)
            }
        }
    }

    fn check<K: Kernel>(&self, offset: usize) -> Result<()> {
        if !self.frames.is_frame(offset) {
            return Err(Error::Builder(format!("no kernel frame at offset {offset}")));
        }
        // SAFETY: `offset` is a constructed frame.
        let prefix = unsafe { self.frames.prefix(offset) };
        if prefix.kernel_type != TypeId::of::<K>() {
            return Err(Error::Builder(format!(
                "frame at offset {offset} holds {}, not {}",
                prefix.kernel_name,
                type_name::<K>()
            )));
        }
        Ok(())
    }

    pub fn get<K: Kernel>(&self, offset: usize) -> Result<&K> {
        self.check::<K>(offset)?;
        // SAFETY: checked that the frame holds a `K`.
        Ok(unsafe { self.frames.kernel_ref::<K>(offset) })
    }

    pub fn get_mut<K: Kernel>(&mut self, offset: usize) -> Result<&mut K> {
        self.check::<K>(offset)?;
        // SAFETY: checked that the frame holds a `K`; `&mut self` is exclusive.
        Ok(unsafe {
            &mut *(self.frames.storage.as_mut_ptr().add(offset + data_offset::<K>()) as *mut K)
        })
    }

    /// Destructs every frame, leaving the builder empty and reusable.
    pub fn reset(&mut self) {
        self.frames.reset();
    }

    /// Freezes the frames into a kernel rooted at the first frame.
    pub fn finish(self) -> Result<CompiledKernel> {
        if self.frames.is_empty() {
            return Err(Error::Builder("cannot finish an empty kernel builder".to_string()));
        }
        Ok(CompiledKernel {
            frames: self.frames,
        })
    }
}

/// An immutable kernel, callable from several threads at once.
pub struct CompiledKernel {
    frames: KernelFrames,
}

#[derive(Clone, Copy)]
struct SendPtr(usize);

impl CompiledKernel {
    pub fn frame_count(&self) -> usize {
        self.frames.frame_count()
    }

    /// # Safety
    ///
    /// The pointers must refer to data of the types and arrmeta the kernel
    /// was instantiated for.
    pub unsafe fn single(&self, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        unsafe { self.frames.single(0, dst, src) }
    }

    /// # Safety
    ///
    /// As for [`CompiledKernel::single`], for every element reached.
    pub unsafe fn strided(
        &self,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
    ) -> Result<()> {
        unsafe {
            self.frames
                .strided(0, dst, dst_stride, src, src_stride, count, Partition::SERIAL)
        }
    }

    /// Runs one partition of a strided loop.
    ///
    /// # Safety
    ///
    /// As for [`CompiledKernel::strided`]. Concurrent calls must use disjoint
    /// partitions of the same loop.
    pub unsafe fn strided_partition(
        &self,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
        part: Partition,
    ) -> Result<()> {
        unsafe {
            self.frames
                .strided(0, dst, dst_stride, src, src_stride, count, part)
        }
    }

    /// Runs a strided loop with the context's `default_thread_count` workers.
    ///
    /// # Safety
    ///
    /// As for [`CompiledKernel::run_strided_parallel`].
    pub unsafe fn run_strided(
        &self,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
        ectx: &EvalContext,
    ) -> Result<()> {
        unsafe {
            if ectx.default_thread_count <= 1 {
                self.strided(dst, dst_stride, src, src_stride, count)
            } else {
                self.run_strided_parallel(dst, dst_stride, src, src_stride, count, ectx.default_thread_count)
            }
        }
    }

    /// Splits a strided loop across `thread_count` scoped threads.
    ///
    /// # Safety
    ///
    /// As for [`CompiledKernel::strided`]; additionally, distinct elements of
    /// the destination must not overlap.
    pub unsafe fn run_strided_parallel(
        &self,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
        thread_count: usize,
    ) -> Result<()> {
        let dst = SendPtr(dst as usize);
        let src: Vec<SendPtr> = src.iter().map(|&p| SendPtr(p as usize)).collect();
        std::thread::scope(|scope| {
            let workers: Vec<_> = Partition::all(thread_count)
                .map(|part| {
                    let src = &src;
                    scope.spawn(move || {
                        let src: Vec<*const u8> = src.iter().map(|p| p.0 as *const u8).collect();
                        // SAFETY: forwarded from the caller; partitions are disjoint.
                        unsafe {
                            self.strided_partition(
                                dst.0 as *mut u8,
                                dst_stride,
                                &src,
                                src_stride,
                                count,
                                part,
                            )
                        }
                    })
                })
                .collect();
            let mut result = Ok(());
            for worker in workers {
                let outcome = worker
                    .join()
                    .unwrap_or_else(|_| Err(Error::Builder("kernel worker panicked".to_string())));
                if result.is_ok() {
                    result = outcome;
                }
            }
            result
        })
    }
}
