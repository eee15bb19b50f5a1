mod common;

use common::{Fixture, PAGE, va};
use kernel_vmem::{Backing, PteFlags, VmError};

#[test]
fn grow_maps_zeroed_pages_with_extra_permissions() {
    let f = Fixture::new(16);
    let mut space = f.space();
    assert_eq!(space.grow(0, 2 * PAGE, PteFlags::WRITE | PteFlags::EXEC), Ok(2 * PAGE));

    for page in 0..2 {
        let leaf = space.query(va(page * PAGE)).unwrap();
        assert_eq!(
            leaf.perms,
            PteFlags::READ | PteFlags::WRITE | PteFlags::EXEC | PteFlags::USER
        );
        assert!(f.bytes(leaf.backing.frame().unwrap()).iter().all(|&b| b == 0));
    }
}

#[test]
fn unaligned_sizes_round_up() {
    let f = Fixture::new(16);
    let mut space = f.space();
    assert_eq!(space.grow(0, 100, PteFlags::WRITE), Ok(100));
    assert!(space.query(va(0)).is_some());
    assert!(space.query(va(PAGE)).is_none());

    // The rest of page 0 is already mapped.
    assert_eq!(space.grow(100, PAGE + 1, PteFlags::WRITE), Ok(PAGE + 1));
    assert!(space.query(va(PAGE)).is_some());
    assert!(space.query(va(2 * PAGE)).is_none());

    assert_eq!(space.shrink(PAGE + 1, PAGE + 1), PAGE + 1);
    assert_eq!(space.shrink(PAGE + 1, PAGE), PAGE);
    assert!(space.query(va(PAGE)).is_none());
    assert!(space.query(va(0)).is_some());
}

#[test]
fn shrinking_to_a_partial_page_keeps_it() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, 3 * PAGE, PteFlags::WRITE).unwrap();
    let before = f.in_use();

    assert_eq!(space.shrink(3 * PAGE, PAGE + 1), PAGE + 1);
    assert!(space.query(va(PAGE)).is_some());
    assert!(space.query(va(2 * PAGE)).is_none());
    assert_eq!(f.in_use(), before - 1);
}

#[test]
fn no_op_resizes_return_the_old_size() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, PAGE, PteFlags::WRITE).unwrap();
    let before = f.in_use();

    assert_eq!(space.grow(PAGE, 0, PteFlags::WRITE), Ok(PAGE));
    assert_eq!(space.grow_deferred(PAGE, 0), Ok(PAGE));
    assert_eq!(space.shrink(PAGE, 2 * PAGE), PAGE);
    assert_eq!(space.grow(PAGE, PAGE, PteFlags::WRITE), Ok(PAGE));
    assert_eq!(f.in_use(), before);
}

#[test]
fn failed_growth_releases_what_it_added() {
    // root, 2 tables, 2 pages; nothing left for a third page
    let f = Fixture::new(5);
    let mut space = f.space();
    space.grow(0, PAGE, PteFlags::WRITE).unwrap();
    assert_eq!(f.in_use(), 4);

    assert_eq!(space.grow(PAGE, 4 * PAGE, PteFlags::WRITE), Err(VmError::OutOfFrames));
    assert_eq!(f.in_use(), 4);
    assert!(space.query(va(0)).is_some());
    assert!(space.query(va(PAGE)).is_none());
}

#[test]
fn failed_deferred_growth_releases_what_it_added() {
    // root, 2 tables; a second level-0 table does not fit
    let f = Fixture::new(3);
    let mut space = f.space();
    let end_of_first_table = 512 * PAGE;
    assert_eq!(
        space.grow_deferred(end_of_first_table - 2 * PAGE, end_of_first_table + PAGE),
        Err(VmError::OutOfFrames)
    );
    assert_eq!(space.query(va(end_of_first_table - 2 * PAGE)), None);
    assert_eq!(space.query(va(end_of_first_table - PAGE)), None);
}

#[test]
fn free_returns_every_frame() {
    let f = Fixture::new(64);
    let mut space = f.space();
    space.grow(0, 10 * PAGE, PteFlags::WRITE).unwrap();
    space.grow_deferred(10 * PAGE, 20 * PAGE).unwrap();
    space.resolve_demand_fault(va(15 * PAGE)).unwrap();
    assert!(f.in_use() > 0);

    space.free(20 * PAGE);
    assert_eq!(f.in_use(), 0);
}

#[test]
fn free_of_an_empty_space_releases_the_root() {
    let f = Fixture::new(4);
    let space = f.space();
    assert_eq!(f.in_use(), 1);
    space.free(0);
    assert_eq!(f.in_use(), 0);
}

#[test]
#[should_panic(expected = "free_walk")]
fn free_with_pages_left_outside_the_size_is_fatal() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, 2 * PAGE, PteFlags::WRITE).unwrap();
    space.free(PAGE);
}

#[test]
fn deferred_growth_reserves_user_pages() {
    let f = Fixture::new(16);
    let mut space = f.space();
    assert_eq!(space.grow_deferred(0, PAGE / 2), Ok(PAGE / 2));
    assert_eq!(space.translate_page(va(0)), Some(Backing::Deferred));
}
