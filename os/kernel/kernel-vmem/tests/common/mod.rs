#![allow(dead_code)]

use kernel_alloc::arena::FrameArena;
use kernel_alloc::frame_alloc::{BitmapFrameAlloc, FrameAlloc};
use kernel_alloc::phys_mapper::{DirectMapper, PhysMapper};
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
use kernel_vmem::{AddressSpace, Backing, VmConfig, VmSubsystem};

pub const PAGE: u64 = 4096;

pub type Vm = VmSubsystem<&'static BitmapFrameAlloc, DirectMapper>;
pub type Space<'vm> = AddressSpace<'vm, &'static BitmapFrameAlloc, DirectMapper>;

/// A subsystem over a leaked arena of `frames` frames.
pub struct Fixture {
    arena: &'static FrameArena,
    pub vm: Vm,
}

impl Fixture {
    pub fn new(frames: usize) -> Self {
        kernel_sync::context::hosted::install();
        let arena: &'static FrameArena = Box::leak(Box::new(FrameArena::new(frames)));
        // SAFETY: the arena is never freed and only hands out its own frames.
        let vm =
            unsafe { VmSubsystem::new(arena.frame_alloc(), arena.mapper(), VmConfig::default()) };
        Self { arena, vm }
    }

    pub fn frames(&self) -> &BitmapFrameAlloc {
        self.arena.frame_alloc()
    }

    pub fn in_use(&self) -> usize {
        self.frames().in_use()
    }

    pub fn space(&self) -> Space<'_> {
        self.vm.address_space().expect("root table")
    }

    pub fn alloc_frame(&self) -> PhysicalPage {
        self.frames().alloc_frame().expect("arena frame")
    }

    pub fn bytes(&self, frame: PhysicalPage) -> &[u8; 4096] {
        unsafe { self.arena.mapper().frame_bytes(frame) }
    }

    pub fn fill(&self, frame: PhysicalPage, byte: u8) {
        unsafe { self.arena.mapper().frame_bytes_mut(frame).fill(byte) };
    }
}

pub fn va(v: u64) -> VirtualAddress {
    VirtualAddress::new(v)
}

/// Frame behind a backed user page.
pub fn frame_of(space: &Space<'_>, at: u64) -> PhysicalPage {
    space
        .translate_page(va(at))
        .and_then(Backing::frame)
        .expect("backed user page")
}

pub fn shared_frame(space: &Space<'_>, at: u64) -> Option<PhysicalPage> {
    match space.translate_page(va(at)) {
        Some(Backing::Shared { frame, .. }) => Some(frame),
        _ => None,
    }
}
