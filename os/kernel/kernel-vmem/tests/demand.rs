mod common;

use common::{Fixture, PAGE, frame_of, va};
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_vmem::{Backing, FaultKind, PteFlags, VmError};

#[test]
fn deferred_growth_allocates_only_tables() {
    let f = Fixture::new(16);
    let mut space = f.space();
    assert_eq!(space.grow_deferred(0, 3 * PAGE), Ok(3 * PAGE));

    // root + two interior tables, no data frames
    assert_eq!(f.in_use(), 3);
    for page in 0..3 {
        let leaf = space.query(va(page * PAGE)).unwrap();
        assert_eq!(leaf.backing, Backing::Deferred);
        assert_eq!(leaf.perms, PteFlags::USER);
    }
}

#[test]
fn first_touch_maps_a_zeroed_page() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow_deferred(0, PAGE).unwrap();

    space.resolve_fault(va(0x80), FaultKind::Load).unwrap();
    let leaf = space.query(va(0)).unwrap();
    assert!(matches!(leaf.backing, Backing::Private(_)));
    assert_eq!(leaf.perms, PteFlags::USER_RW);
    assert!(f.bytes(frame_of(&space, 0)).iter().all(|&b| b == 0));

    // Backed now: a second access is no longer a fault this subsystem owns.
    assert_eq!(
        space.resolve_fault(va(0x80), FaultKind::Load),
        Err(VmError::NotResolvable(va(0x80)))
    );
    assert_eq!(space.resolve_demand_fault(va(0x80)), Err(VmError::NotDeferred(va(0x80))));
}

#[test]
fn every_access_kind_materializes_a_deferred_page() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow_deferred(0, 3 * PAGE).unwrap();

    let kinds = [FaultKind::InstructionFetch, FaultKind::Load, FaultKind::Store];
    for (page, kind) in (0..3).zip(kinds) {
        space.resolve_fault(va(page * PAGE), kind).unwrap();
        assert!(matches!(space.translate_page(va(page * PAGE)), Some(Backing::Private(_))));
    }
    space.free(3 * PAGE);
    assert_eq!(f.in_use(), 0);
}

#[test]
fn recycled_frames_come_back_zeroed() {
    let f = Fixture::new(16);
    let dirty = f.alloc_frame();
    f.fill(dirty, 0xAA);
    f.frames().free_frame(dirty);

    let mut space = f.space();
    space.grow_deferred(0, PAGE).unwrap();
    space.resolve_demand_fault(va(0)).unwrap();

    let mut buf = [0xFF; 64];
    space.copy_in(&mut buf, va(0)).unwrap();
    assert_eq!(buf, [0; 64]);
}

#[test]
fn out_of_frames_leaves_the_page_reserved() {
    // root + two tables
    let f = Fixture::new(3);
    let mut space = f.space();
    space.grow_deferred(0, PAGE).unwrap();

    assert_eq!(space.resolve_fault(va(0), FaultKind::Store), Err(VmError::OutOfFrames));
    assert_eq!(space.translate_page(va(0)), Some(Backing::Deferred));
}

#[test]
fn deferred_pages_are_never_shared() {
    let f = Fixture::new(16);
    let mut parent = f.space();
    parent.grow_deferred(0, 2 * PAGE).unwrap();

    let mut cow_child = f.space();
    parent.copy_into(&mut cow_child, 2 * PAGE, true).unwrap();
    let mut eager_child = f.space();
    parent.copy_into(&mut eager_child, 2 * PAGE, false).unwrap();

    for space in [&parent, &cow_child, &eager_child] {
        assert_eq!(space.translate_page(va(PAGE)), Some(Backing::Deferred));
    }
    assert!(f.vm.share_counts().is_empty());

    cow_child.resolve_fault(va(PAGE), FaultKind::Store).unwrap();
    assert_eq!(parent.translate_page(va(PAGE)), Some(Backing::Deferred));

    for space in [parent, cow_child, eager_child] {
        space.free(2 * PAGE);
    }
    assert_eq!(f.in_use(), 0);
}

#[test]
fn unmapping_deferred_pages_frees_nothing() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow_deferred(0, 2 * PAGE).unwrap();
    let before = f.in_use();
    assert_eq!(space.shrink(2 * PAGE, 0), 0);
    assert_eq!(f.in_use(), before);
}
