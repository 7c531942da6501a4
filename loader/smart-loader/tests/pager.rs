//! Demand paging against an in-memory host.

mod common;

use common::{Fixture, MockHost, addr, range};
use loader_elf::PFlags;
use loader_elf::builder::{ElfImageBuilder, SegmentSpec};
use loader_host::Protection;
use smart_loader::{FaultError, LoaderContext, LoaderError, PageFill, StatsReport};

const TEXT: u64 = 0x0804_8000;

fn open<'h>(fixture: &Fixture, host: &'h MockHost) -> LoaderContext<&'h MockHost> {
    LoaderContext::open(&fixture.path, host, 16).unwrap()
}

fn rw() -> Protection {
    Protection::new().with_read(true).with_write(true)
}

#[test]
fn bytes_past_file_size_are_zero() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(TEXT as u32).load(TEXT as u32, 4096, PFlags::data(), *b"0123456789"),
    );
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    let fill = ctx.pager().resolve(addr(TEXT + 5)).unwrap();
    assert_eq!(
        fill,
        PageFill {
            page: addr(TEXT).page(),
            file_bytes: 10,
            fragmentation: 0,
            protection: rw(),
        }
    );

    let page = host.page(TEXT).unwrap();
    assert_eq!(&page[..10], b"0123456789");
    // The file holds FILLER right after the payload; none of it may leak in.
    assert!(page[10..].iter().all(|&b| b == 0));

    assert_eq!(
        ctx.pager().stats().snapshot(),
        StatsReport {
            faults: 1,
            allocations: 1,
            fragmentation_bytes: 0,
        }
    );
}

#[test]
fn unaligned_segment_start() {
    let data: Vec<u8> = (0..100).collect();
    let vaddr = TEXT + 4000;
    let fixture = Fixture::write(&ElfImageBuilder::new(0).load(
        vaddr as u32,
        100,
        PFlags::read_only(),
        data.clone(),
    ));
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    let first = ctx.pager().resolve(addr(vaddr)).unwrap();
    assert_eq!(first.page.base(), addr(TEXT));
    assert_eq!(first.fragmentation, 4000);
    assert_eq!(first.file_bytes, 96);

    let second = ctx.pager().resolve(addr(TEXT + 0x1002)).unwrap();
    assert_eq!(second.fragmentation, 4096 - 4);

    let page = host.page(TEXT).unwrap();
    assert!(page[..4000].iter().all(|&b| b == 0));
    assert_eq!(&page[4000..], &data[..96]);
    let page = host.page(TEXT + 0x1000).unwrap();
    assert_eq!(&page[..4], &data[96..]);
    assert!(page[4..].iter().all(|&b| b == 0));

    let stats = ctx.pager().stats().snapshot();
    assert_eq!(stats.faults, 2);
    assert_eq!(stats.fragmentation_bytes, 4000 + 4092);
    assert_eq!(host.protection(TEXT), Some(Protection::new().with_read(true)));
}

#[test]
fn page_base_is_the_masked_fault_address() {
    let fixture = Fixture::write(&ElfImageBuilder::new(0).load(
        TEXT as u32,
        0x5000,
        PFlags::data(),
        Vec::new(),
    ));
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    for a in [TEXT + 0x1FFF, TEXT + 0x3000, TEXT + 0x4ABC] {
        let fill = ctx.pager().resolve(addr(a)).unwrap();
        assert_eq!(fill.page.base().as_u64(), a & !0xFFF);
    }
    assert_eq!(host.mapped_pages(), vec![TEXT + 0x1000, TEXT + 0x3000, TEXT + 0x4000]);
}

#[test]
fn fault_outside_every_segment() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(0).load(TEXT as u32, 0x100, PFlags::text(), vec![0xC3; 0x100]),
    );
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    // Same page as the segment, but past its in-memory end.
    let err = ctx.pager().resolve(addr(TEXT + 0x100)).unwrap_err();
    assert_eq!(err, FaultError::SegmentNotFound(addr(TEXT + 0x100)));
    assert_eq!(err.exit_code(), 10);

    assert!(ctx.pager().resolve(addr(0xDEAD_0000)).is_err());
    assert_eq!(ctx.pager().stats().snapshot(), StatsReport::default());
    assert!(host.mapped_pages().is_empty());
}

#[test]
fn repeat_fault_is_a_protection_violation() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(0).load(TEXT as u32, 0x10, PFlags::text(), vec![0x90; 0x10]),
    );
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    ctx.pager().resolve(addr(TEXT)).unwrap();
    let err = ctx.pager().resolve(addr(TEXT + 8)).unwrap_err();
    assert_eq!(
        err,
        FaultError::ProtectionViolation {
            address: addr(TEXT + 8),
            page: addr(TEXT).page(),
            protection: Protection::new().with_read(true).with_execute(true),
        }
    );
    assert_eq!(err.exit_code(), 14);
    assert_eq!(ctx.pager().stats().snapshot().faults, 1);
}

#[test]
fn segments_sharing_a_page() {
    let base = 0x1000_0000u64;
    let fixture = Fixture::write(
        &ElfImageBuilder::new(base as u32)
            .load(base as u32, 0x800, PFlags::text(), vec![0x90; 0x800])
            .load((base + 0x800) as u32, 0x1000, PFlags::data(), vec![0x11; 0x10]),
    );
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    // Faulting in the data half still brings in the text half.
    let fill = ctx.pager().resolve(addr(base + 0x900)).unwrap();
    assert_eq!(fill.fragmentation, 0);
    assert_eq!(fill.file_bytes, 0x810);
    assert_eq!(fill.protection, Protection::all());

    let page = host.page(base).unwrap();
    assert!(page[..0x800].iter().all(|&b| b == 0x90));
    assert!(page[0x800..0x810].iter().all(|&b| b == 0x11));
    assert!(page[0x810..].iter().all(|&b| b == 0));

    let tail = ctx.pager().resolve(addr(base + 0x1000)).unwrap();
    assert_eq!(tail.fragmentation, 0x800);
    assert_eq!(tail.protection, rw());

    // Both segments map to one reservation.
    assert_eq!(ctx.reserved(), &[range(base, base + 0x2000)]);
}

#[test]
fn first_segment_in_file_order_wins_overlaps() {
    let base = 0x2000_0000u64;
    let fixture = Fixture::write(
        &ElfImageBuilder::new(0)
            .load(base as u32, 0x100, PFlags::read_only(), vec![0xAB; 0x100])
            .load((base + 0x80) as u32, 0x100, PFlags::data(), vec![0xCD; 0x100]),
    );
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    ctx.pager().resolve(addr(base + 0xC0)).unwrap();
    let page = host.page(base).unwrap();
    assert!(page[..0x100].iter().all(|&b| b == 0xAB));
    assert!(page[0x100..0x180].iter().all(|&b| b == 0xCD));
}

#[test]
fn runs_are_deterministic() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(0)
            .load(TEXT as u32, 0x2345, PFlags::text(), vec![0x42; 0x2000])
            .load(0x0805_0123, 0x3000, PFlags::data(), vec![7; 0x99]),
    );
    let faults = [0x0805_2000, TEXT + 0x2100, 0x0805_0123, TEXT, 0x0805_1FFF];

    let run = || {
        let host = MockHost::default();
        let ctx = open(&fixture, &host);
        for a in faults {
            ctx.pager().resolve(addr(a)).unwrap();
        }
        let fills: Vec<_> = ctx.pager().journal().entries().collect();
        let pages: Vec<_> = host
            .mapped_pages()
            .into_iter()
            .map(|p| host.page(p).unwrap())
            .collect();
        (ctx.pager().stats().snapshot(), fills, pages)
    };

    let (stats, fills, pages) = run();
    assert_eq!(stats.faults, 5);
    assert_eq!(fills.len(), 5);
    assert_eq!(run(), (stats, fills, pages));
}

#[test]
fn fragmentation_is_the_uncovered_part_of_mapped_pages() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(0)
            .load(0x0804_8010, 0x20, PFlags::text(), Vec::new())
            .load(0x0804_8100, 0x20, PFlags::data(), Vec::new())
            .load(0x0804_9F00, 0x200, PFlags::data(), Vec::new()),
    );
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    ctx.pager().resolve(addr(0x0804_8010)).unwrap();
    ctx.pager().resolve(addr(0x0804_9F00)).unwrap();
    ctx.pager().resolve(addr(0x0804_A000)).unwrap();

    let covered = 0x20 + 0x20 + 0x100 + 0x100;
    assert_eq!(
        ctx.pager().stats().snapshot().fragmentation_bytes,
        3 * 4096 - covered
    );
}

#[test]
fn host_failures_map_to_fault_errors() {
    let fixture = Fixture::write(&ElfImageBuilder::new(0).load(
        TEXT as u32,
        0x2000,
        PFlags::data(),
        vec![1; 0x2000],
    ));
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    host.fail_map.set(true);
    let err = ctx.pager().resolve(addr(TEXT)).unwrap_err();
    assert!(matches!(err, FaultError::Mapping(_)));
    assert_eq!(err.exit_code(), 11);

    host.fail_map.set(false);
    host.fail_protect.set(true);
    let err = ctx.pager().resolve(addr(TEXT)).unwrap_err();
    assert!(matches!(err, FaultError::Permission(_)));
    assert_eq!(err.exit_code(), 13);

    assert_eq!(ctx.pager().stats().snapshot(), StatsReport::default());
}

#[test]
fn truncated_file_is_a_content_read_error() {
    let fixture = Fixture::write(&ElfImageBuilder::new(0).load(
        TEXT as u32,
        0x1000,
        PFlags::data(),
        vec![1; 0x1000],
    ));
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    std::fs::OpenOptions::new()
        .write(true)
        .open(&fixture.path)
        .unwrap()
        .set_len(0x80)
        .unwrap();

    let err = ctx.pager().resolve(addr(TEXT)).unwrap_err();
    assert!(matches!(err, FaultError::ContentRead { len: 0x1000, .. }));
    assert_eq!(err.exit_code(), 12);
}

#[test]
fn bad_magic_fails_before_any_paging() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(TEXT as u32)
            .magic(*b"\x7FELG")
            .load(TEXT as u32, 0x10, PFlags::text(), vec![0; 0x10]),
    );
    let host = MockHost::default();
    let err = LoaderContext::open(&fixture.path, &host, 16).err().unwrap();

    assert!(matches!(err, LoaderError::Format(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(host.reserved().is_empty());
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let host = MockHost::default();
    let err = LoaderContext::open(dir.path().join("absent"), &host, 16)
        .err()
        .unwrap();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn entry_point_must_be_executable() {
    let build = |entry: u32| {
        Fixture::write(
            &ElfImageBuilder::new(entry)
                .load(TEXT as u32, 0x100, PFlags::text(), vec![0xC3; 0x100])
                .load(0x0804_9000, 0x100, PFlags::data(), Vec::new()),
        )
    };
    let host = MockHost::default();

    let ok = build(TEXT as u32 + 0x10);
    assert_eq!(open(&ok, &host).entry_point().unwrap(), addr(TEXT + 0x10));

    for entry in [0, 0x0804_9000, 0x0900_0000] {
        let host = MockHost::default();
        let fixture = build(entry);
        let err = open(&fixture, &host).entry_point().unwrap_err();
        assert!(matches!(err, LoaderError::MissingEntryPoint(_)));
        assert_eq!(err.exit_code(), 5);
    }
}

#[test]
fn foreign_machine_is_rejected() {
    let fixture = Fixture::write(&ElfImageBuilder::new(0).machine(0xBEEF));
    let host = MockHost::default();
    let err = open(&fixture, &host).check_machine().unwrap_err();
    assert!(matches!(err, LoaderError::MachineMismatch { found: 0xBEEF, .. }));
    assert_eq!(err.exit_code(), 6);
}

#[test]
fn reservations_are_released_on_drop() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(0)
            .load(TEXT as u32, 0x1800, PFlags::text(), Vec::new())
            .load(0x0805_0000, 0x10, PFlags::data(), Vec::new()),
    );
    let host = MockHost::default();
    let expected = vec![range(TEXT, TEXT + 0x2000), range(0x0805_0000, 0x0805_1000)];

    let ctx = open(&fixture, &host);
    assert_eq!(ctx.reserved(), expected.as_slice());
    assert_eq!(host.reserved(), expected);
    drop(ctx);
    assert_eq!(host.released(), expected);
}

#[test]
fn occupied_address_range_is_a_setup_error() {
    let fixture = Fixture::write(
        &ElfImageBuilder::new(0)
            .load(TEXT as u32, 0x10, PFlags::text(), Vec::new())
            .load(0x0805_0000, 0x10, PFlags::data(), Vec::new()),
    );
    let host = MockHost::default();
    host.occupy(range(0x0805_0000, 0x0805_1000));

    let err = LoaderContext::open(&fixture.path, &host, 16).err().unwrap();
    assert!(matches!(err, LoaderError::Host(_)));
    assert_eq!(err.exit_code(), 7);
    // The span reserved before the conflict is given back.
    assert_eq!(host.released(), vec![range(TEXT, TEXT + 0x1000)]);
}

#[test]
fn explicit_file_size_override() {
    // A segment whose p_filesz exceeds p_memsz only contributes p_memsz bytes.
    let fixture = Fixture::write(&ElfImageBuilder::new(0).segment(SegmentSpec {
        filesz: Some(0x20),
        ..SegmentSpec::load(TEXT as u32, 0x10, PFlags::data(), vec![5; 0x20])
    }));
    let host = MockHost::default();
    let ctx = open(&fixture, &host);

    let fill = ctx.pager().resolve(addr(TEXT)).unwrap();
    assert_eq!(fill.file_bytes, 0x10);
    let page = host.page(TEXT).unwrap();
    assert!(page[..0x10].iter().all(|&b| b == 5));
    assert!(page[0x10..].iter().all(|&b| b == 0));
}
