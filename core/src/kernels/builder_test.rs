use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::assignment::PodCopyKernel;
use super::builder::FRAME_ALIGN;
use super::builtin::BuiltinAssignKernel;
use super::*;
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::test_utils::init_test_logging;
use crate::types::TypeId;
use pretty_assertions::assert_eq;

/// Counts how many times it has been dropped.
struct Tracked {
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Kernel for Tracked {
    unsafe fn single(&self, _frames: &KernelFrames, _dst: *mut u8, _src: &[*const u8]) -> Result<()> {
        Ok(())
    }
}

/// Runs its child, then adds one to the `u32` it wrote.
struct AddOne {
    child: usize,
}

impl Kernel for AddOne {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        unsafe {
            frames.single(self.child, dst, src)?;
            *(dst as *mut u32) += 1;
        }
        Ok(())
    }
}

fn build_add_one() -> CompiledKernel {
    let mut ckb = KernelBuilder::new();
    let root = ckb.len();
    ckb.emplace_back(AddOne { child: 0 });
    let child = ckb.len();
    ckb.emplace_back(PodCopyKernel { size: 4 });
    ckb.get_mut::<AddOne>(root).unwrap().child = child;
    ckb.finish().unwrap()
}

#[test]
fn test_frames_are_aligned() {
    let mut ckb = KernelBuilder::new();
    let a = ckb.emplace_back(PodCopyKernel { size: 1 });
    let b = ckb.emplace_back(AddOne { child: a });
    let c = ckb.emplace_back(PodCopyKernel { size: 2 });
    assert_eq!(a, 0);
    assert!(b > a && c > b);
    for offset in [a, b, c] {
        assert_eq!(offset % FRAME_ALIGN, 0);
    }
    assert_eq!(ckb.frame_count(), 3);
    assert_eq!(ckb.len() % FRAME_ALIGN, 0);
}

#[test]
fn test_failed_construction_unwinds_every_frame() {
    init_test_logging();
    let drops = Arc::new(AtomicUsize::new(0));
    let mut ckb = KernelBuilder::new();
    ckb.emplace_back(Tracked { drops: drops.clone() });
    ckb.emplace_back(PodCopyKernel { size: 8 });
    ckb.emplace_back(Tracked { drops: drops.clone() });

    let err = ckb
        .try_emplace_back::<Tracked, _>(|| Err(Error::Builder("no room".to_string())))
        .unwrap_err();
    assert_eq!(err, Error::Builder("no room".to_string()));
    assert_eq!(drops.load(Ordering::SeqCst), 2);
    assert!(ckb.is_empty());
    assert_eq!(ckb.len(), 0);

    // The builder is reusable after unwinding.
    let offset = ckb
        .try_emplace_back(|| Ok(Tracked { drops: drops.clone() }))
        .unwrap();
    assert_eq!(offset, 0);
    drop(ckb);
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[test]
fn test_compiled_kernel_destructs_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let mut ckb = KernelBuilder::new();
    ckb.emplace_back(Tracked { drops: drops.clone() });
    let kernel = ckb.finish().unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(kernel);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_get_checks_offset_and_type() {
    let mut ckb = KernelBuilder::new();
    let offset = ckb.emplace_back(PodCopyKernel { size: 4 });
    assert_eq!(ckb.get::<PodCopyKernel>(offset).unwrap().size, 4);
    assert!(matches!(
        ckb.get_mut::<BuiltinAssignKernel>(offset),
        Err(Error::Builder(_))
    ));
    assert!(matches!(ckb.get::<PodCopyKernel>(offset + 1), Err(Error::Builder(_))));
    assert!(matches!(ckb.get::<PodCopyKernel>(ckb.len()), Err(Error::Builder(_))));
}

#[test]
fn test_finish_rejects_empty_builder() {
    assert!(matches!(KernelBuilder::new().finish(), Err(Error::Builder(_))));
    let mut ckb = KernelBuilder::new();
    ckb.emplace_back(PodCopyKernel { size: 4 });
    ckb.reset();
    assert!(matches!(ckb.finish(), Err(Error::Builder(_))));
}

#[test]
fn test_parent_calls_child_by_offset() {
    let kernel = build_add_one();
    assert_eq!(kernel.frame_count(), 2);
    let src = 41u32;
    let mut dst = 0u32;
    unsafe {
        kernel
            .single(&mut dst as *mut u32 as *mut u8, &[&src as *const u32 as *const u8])
            .unwrap();
    }
    assert_eq!(dst, 42);
}

#[test]
fn test_strided_runs_single_per_element() {
    let kernel = build_add_one();
    let src: Vec<u32> = (0..5).collect();
    let mut dst = vec![0u32; 5];
    unsafe {
        kernel
            .strided(dst.as_mut_ptr() as *mut u8, 4, &[src.as_ptr() as *const u8], &[4], 5)
            .unwrap();
    }
    assert_eq!(dst, vec![1, 2, 3, 4, 5]);

    // A zero source stride repeats the first element.
    unsafe {
        kernel
            .strided(dst.as_mut_ptr() as *mut u8, 4, &[src[3..].as_ptr() as *const u8], &[0], 5)
            .unwrap();
    }
    assert_eq!(dst, vec![4; 5]);
}

#[test]
fn test_parallel_strided_covers_every_element() {
    let mut ckb = KernelBuilder::new();
    ckb.emplace_back(PodCopyKernel { size: 4 });
    let kernel = ckb.finish().unwrap();
    let src: Vec<u32> = (0..1000).collect();
    let mut dst = vec![0u32; 1000];
    unsafe {
        kernel
            .run_strided_parallel(
                dst.as_mut_ptr() as *mut u8,
                4,
                &[src.as_ptr() as *const u8],
                &[4],
                src.len(),
                4,
            )
            .unwrap();
    }
    assert_eq!(dst, src);
}

#[test]
fn test_parallel_strided_reports_errors() {
    let mut ckb = KernelBuilder::new();
    ckb.emplace_back(BuiltinAssignKernel {
        dst: TypeId::Int8,
        src: TypeId::Int32,
        errmode: ErrorMode::Overflow,
    });
    let kernel = ckb.finish().unwrap();
    let mut src: Vec<i32> = (0..100).collect();
    src[57] = 1000;
    let mut dst = vec![0i8; 100];
    let err = unsafe {
        kernel.run_strided_parallel(
            dst.as_mut_ptr() as *mut u8,
            1,
            &[src.as_ptr() as *const u8],
            &[4],
            src.len(),
            3,
        )
    }
    .unwrap_err();
    assert!(matches!(err, Error::Overflow { ref value, .. } if value == "1000"), "{err}");
}

#[test]
fn test_run_strided_uses_context_threads() {
    let mut ckb = KernelBuilder::new();
    ckb.emplace_back(BuiltinAssignKernel {
        dst: TypeId::Float64,
        src: TypeId::Int16,
        errmode: ErrorMode::Fractional,
    });
    let kernel = ckb.finish().unwrap();
    let src: Vec<i16> = (0..50).collect();
    for threads in [1, 3] {
        let ectx = EvalContext::default().with_default_thread_count(threads);
        let mut dst = vec![0f64; 50];
        unsafe {
            kernel
                .run_strided(
                    dst.as_mut_ptr() as *mut u8,
                    8,
                    &[src.as_ptr() as *const u8],
                    &[2],
                    src.len(),
                    &ectx,
                )
                .unwrap();
        }
        assert_eq!(dst, src.iter().map(|&v| v as f64).collect::<Vec<_>>());
    }
}

#[test]
fn test_parallel_strided_with_more_threads_than_elements() {
    let mut ckb = KernelBuilder::new();
    ckb.emplace_back(PodCopyKernel { size: 4 });
    let kernel = ckb.finish().unwrap();
    let src = [7u32, 8, 9];
    let mut dst = [0u32; 4];
    unsafe {
        kernel
            .run_strided_parallel(
                dst.as_mut_ptr() as *mut u8,
                4,
                &[src.as_ptr() as *const u8],
                &[4],
                src.len(),
                8,
            )
            .unwrap();
        kernel
            .run_strided_parallel(
                dst[3..].as_mut_ptr() as *mut u8,
                4,
                &[src.as_ptr() as *const u8],
                &[4],
                0,
                8,
            )
            .unwrap();
    }
    // The workers with no element leave the rest of the buffer alone.
    assert_eq!(dst, [7, 8, 9, 0]);
}
