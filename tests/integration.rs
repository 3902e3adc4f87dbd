use std::fs;
use std::path::Path;

use tempfile::tempdir;

use salvage::carving::{CarverConfig, carve};
use salvage::extraction::{DirectorySink, recovered_filename};
use salvage::io::{BlockSource, MemorySource};

fn create_test_jpeg(total_len: usize) -> Vec<u8> {
    let mut jpeg = Vec::with_capacity(total_len);

    jpeg.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
    jpeg.extend_from_slice(b"JFIF\x00\x01\x01\x00\x00\x48\x00\x48\x00\x00");

    while jpeg.len() < total_len - 2 {
        let idx = jpeg.len();
        jpeg.push(((idx.wrapping_mul(131).wrapping_add(17)) % 251) as u8);
    }

    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn create_test_disk(size: usize, plants: &[(usize, &[u8])]) -> Vec<u8> {
    let mut disk: Vec<u8> = (0..size)
        .map(|i| ((i.wrapping_mul(97).wrapping_add(13)) % 251) as u8)
        .collect();

    for &(offset, object) in plants {
        disk[offset..offset + object.len()].copy_from_slice(object);
    }

    disk
}

#[test]
fn full_recovery_pipeline() {
    let dir = tempdir().unwrap();
    let disk_path = dir.path().join("disk.img");
    let output_dir = dir.path().join("recovered");

    let a = create_test_jpeg(5000);
    let b = create_test_jpeg(3000);
    let c = create_test_jpeg(8000);
    let plants = [
        (4096usize, a.as_slice()),
        (100_000, b.as_slice()),
        (200_000, c.as_slice()),
    ];
    let disk = create_test_disk(256 * 1024, &plants);
    fs::write(&disk_path, &disk).unwrap();

    let mut source = BlockSource::open(&disk_path, 512).unwrap();
    let mut sink = DirectorySink::create(&output_dir).unwrap();
    let report = carve(&mut source, &mut sink, &CarverConfig::default(), None);

    assert_eq!(report.stats.complete, 3);
    assert_eq!(report.stats.emitted, 3);
    assert_eq!(sink.written().len(), 3);

    for (offset, object) in plants {
        let path = output_dir.join(recovered_filename(offset as u64));
        assert!(path.exists(), "missing {path:?}");
        let recovered = fs::read(&path).unwrap();
        assert_eq!(recovered, object, "bytes differ at offset {offset}");
        assert_eq!(&recovered[..2], &[0xFF, 0xD8]);
        assert_eq!(&recovered[recovered.len() - 2..], &[0xFF, 0xD9]);
    }
}

fn snapshot_outputs(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut entries: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

#[test]
fn reruns_are_idempotent() {
    let dir = tempdir().unwrap();
    let disk_path = dir.path().join("disk.img");
    let output_dir = dir.path().join("recovered");

    let object = create_test_jpeg(4000);
    let disk = create_test_disk(64 * 1024, &[(10_000, object.as_slice())]);
    fs::write(&disk_path, &disk).unwrap();

    let mut source = BlockSource::open(&disk_path, 512).unwrap();
    let mut sink = DirectorySink::create(&output_dir).unwrap();
    carve(&mut source, &mut sink, &CarverConfig::default(), None);
    let first = snapshot_outputs(&output_dir);

    let mut source = BlockSource::open(&disk_path, 512).unwrap();
    let mut sink = DirectorySink::create(&output_dir).unwrap();
    carve(&mut source, &mut sink, &CarverConfig::default(), None);
    let second = snapshot_outputs(&output_dir);

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].0, recovered_filename(10_000));
}

#[test]
fn buffered_and_block_sources_recover_identically() {
    let dir = tempdir().unwrap();
    let disk_path = dir.path().join("disk.img");

    let a = create_test_jpeg(2500);
    let b = create_test_jpeg(6000);
    let disk = create_test_disk(
        128 * 1024,
        &[(777usize, a.as_slice()), (65_000, b.as_slice())],
    );
    fs::write(&disk_path, &disk).unwrap();

    let buffered_out = dir.path().join("buffered");
    let mut source = MemorySource::load(&disk_path).unwrap();
    let mut sink = DirectorySink::create(&buffered_out).unwrap();
    carve(&mut source, &mut sink, &CarverConfig::default(), None);

    let block_out = dir.path().join("block");
    let mut source = BlockSource::open(&disk_path, 512).unwrap();
    let mut sink = DirectorySink::create(&block_out).unwrap();
    carve(&mut source, &mut sink, &CarverConfig::default(), None);

    assert_eq!(snapshot_outputs(&buffered_out), snapshot_outputs(&block_out));
}

#[test]
fn disk_without_signatures_recovers_nothing() {
    let dir = tempdir().unwrap();
    let disk_path = dir.path().join("empty.img");
    let output_dir = dir.path().join("recovered");

    fs::write(&disk_path, vec![0u8; 64 * 1024]).unwrap();

    let mut source = BlockSource::open(&disk_path, 512).unwrap();
    let mut sink = DirectorySink::create(&output_dir).unwrap();
    let report = carve(&mut source, &mut sink, &CarverConfig::default(), None);

    assert_eq!(report.stats.candidates(), 0);
    assert!(sink.written().is_empty());
    assert!(snapshot_outputs(&output_dir).is_empty());
}

#[test]
fn object_at_disk_tail_is_emitted_truncated() {
    let dir = tempdir().unwrap();
    let disk_path = dir.path().join("tail.img");
    let output_dir = dir.path().join("recovered");

    // Start marker at 7000, no end marker before the disk runs out.
    let mut disk = create_test_disk(8192, &[]);
    disk[7000..7004].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    for byte in disk[7004..].iter_mut() {
        *byte = 0x61;
    }
    fs::write(&disk_path, &disk).unwrap();

    let mut source = BlockSource::open(&disk_path, 512).unwrap();
    let mut sink = DirectorySink::create(&output_dir).unwrap();
    let report = carve(&mut source, &mut sink, &CarverConfig::default(), None);

    assert_eq!(report.stats.truncated, 1);
    assert_eq!(report.stats.emitted, 1);

    let recovered = fs::read(output_dir.join(recovered_filename(7000))).unwrap();
    assert_eq!(recovered.len(), 8192 - 7000);
    assert_eq!(&recovered[..4], &[0xFF, 0xD8, 0xFF, 0xE0]);
}
