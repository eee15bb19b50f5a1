mod common;

use common::{Fixture, PAGE, frame_of, shared_frame, va};
use kernel_alloc::frame_alloc::FrameAlloc;
use kernel_vmem::{Backing, PteFlags, VmError};

#[test]
fn bytes_cross_page_boundaries() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, 3 * PAGE, PteFlags::WRITE).unwrap();

    let data: Vec<u8> = (0..=255).cycle().take(5000).collect();
    space.copy_out(va(PAGE - 100), &data).unwrap();

    let mut back = vec![0; data.len()];
    space.copy_in(&mut back, va(PAGE - 100)).unwrap();
    assert_eq!(back, data);
    assert_eq!(f.bytes(frame_of(&space, 0))[PAGE as usize - 100], 0);
    assert_eq!(f.bytes(frame_of(&space, PAGE))[0], 100);
}

#[test]
fn empty_transfers_touch_nothing() {
    let f = Fixture::new(8);
    let mut space = f.space();
    assert_eq!(space.copy_out(va(0), &[]), Ok(()));
    assert_eq!(space.copy_in(&mut [], va(0)), Ok(()));
}

#[test]
fn unmapped_or_kernel_pages_are_rejected() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, 2 * PAGE, PteFlags::WRITE).unwrap();
    space.clear_user(va(PAGE));

    assert_eq!(space.copy_out(va(PAGE), b"x"), Err(VmError::Unmapped(va(PAGE))));
    assert_eq!(
        space.copy_in(&mut [0; 8], va(4 * PAGE)),
        Err(VmError::Unmapped(va(4 * PAGE)))
    );
    // The part before the hidden page was written.
    assert_eq!(space.copy_out(va(PAGE - 2), b"abcd"), Err(VmError::Unmapped(va(PAGE))));
    let mut buf = [0; 2];
    space.copy_in(&mut buf, va(PAGE - 2)).unwrap();
    assert_eq!(&buf, b"ab");
}

#[test]
fn copy_out_never_writes_through_a_shared_frame() {
    let f = Fixture::new(32);
    let mut parent = f.space();
    parent.grow(0, PAGE, PteFlags::WRITE).unwrap();
    parent.copy_out(va(0), b"original").unwrap();
    let mut child = f.space();
    parent.copy_into(&mut child, PAGE, true).unwrap();

    child.copy_out(va(0), b"modified").unwrap();
    assert!(matches!(child.translate_page(va(0)), Some(Backing::Private(_))));

    let mut buf = [0; 8];
    parent.copy_in(&mut buf, va(0)).unwrap();
    assert_eq!(&buf, b"original");
    child.copy_in(&mut buf, va(0)).unwrap();
    assert_eq!(&buf, b"modified");
}

#[test]
fn reads_also_resolve_copy_on_write() {
    let f = Fixture::new(32);
    let mut parent = f.space();
    parent.grow(0, 2 * PAGE, PteFlags::WRITE).unwrap();
    parent.copy_out(va(0), b"both\0").unwrap();
    parent.copy_out(va(PAGE), b"name\0").unwrap();
    let mut child = f.space();
    parent.copy_into(&mut child, 2 * PAGE, true).unwrap();
    let shared = shared_frame(&child, 0).unwrap();
    let before = f.in_use();

    let mut buf = [0; 4];
    child.copy_in(&mut buf, va(0)).unwrap();
    assert_eq!(&buf, b"both");
    assert!(matches!(child.translate_page(va(0)), Some(Backing::Private(_))));
    assert_ne!(frame_of(&child, 0), shared);
    assert_eq!(f.vm.share_counts().count(shared), 1);
    assert_eq!(f.in_use(), before + 1);

    let mut name = [0; 8];
    assert_eq!(child.copy_in_str(&mut name, va(PAGE)), Ok(4));
    assert_eq!(&name[..5], b"name\0");
    assert!(shared_frame(&child, PAGE).is_none());
    assert_eq!(f.in_use(), before + 2);
}

#[test]
fn reads_of_shared_pages_fail_without_frames() {
    let f = Fixture::new(32);
    let mut parent = f.space();
    parent.grow(0, PAGE, PteFlags::WRITE).unwrap();
    let mut child = f.space();
    parent.copy_into(&mut child, PAGE, true).unwrap();
    while f.frames().alloc_frame().is_some() {}

    let mut buf = [0; 4];
    assert_eq!(child.copy_in(&mut buf, va(0)), Err(VmError::OutOfFrames));
    assert!(shared_frame(&child, 0).is_some());
}

#[test]
fn transfers_materialize_deferred_pages() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow_deferred(0, 2 * PAGE).unwrap();

    let mut buf = [0xFF; 16];
    space.copy_in(&mut buf, va(8)).unwrap();
    assert_eq!(buf, [0; 16]);

    space.copy_out(va(PAGE + 8), b"lazy").unwrap();
    assert_eq!(&f.bytes(frame_of(&space, PAGE))[8..12], b"lazy");
}

#[test]
fn strings_stop_at_the_terminator() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, 2 * PAGE, PteFlags::WRITE).unwrap();
    space.copy_out(va(PAGE - 3), b"split\0tail").unwrap();

    let mut buf = [0xFF; 32];
    assert_eq!(space.copy_in_str(&mut buf, va(PAGE - 3)), Ok(5));
    assert_eq!(&buf[..6], b"split\0");
    assert_eq!(buf[6], 0xFF);
}

#[test]
fn the_terminator_must_fit_the_budget() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, PAGE, PteFlags::WRITE).unwrap();
    space.copy_out(va(0), b"abcd\0").unwrap();

    let mut exact = [0; 5];
    assert_eq!(space.copy_in_str(&mut exact, va(0)), Ok(4));
    assert_eq!(&exact, b"abcd\0");

    let mut short = [0; 4];
    assert_eq!(
        space.copy_in_str(&mut short, va(0)),
        Err(VmError::MissingTerminator { max: 4 })
    );
}

#[test]
fn unterminated_strings_fail_at_the_mapping_end() {
    let f = Fixture::new(16);
    let mut space = f.space();
    space.grow(0, PAGE, PteFlags::WRITE).unwrap();
    space.copy_out(va(PAGE - 4), b"abcd").unwrap();

    let mut buf = [0; 64];
    assert_eq!(
        space.copy_in_str(&mut buf, va(PAGE - 4)),
        Err(VmError::Unmapped(va(PAGE)))
    );
}
