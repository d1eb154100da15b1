use oxibsdiff::diff::DiffOptions;
use oxibsdiff::io::{diff_file, patch_file};
use oxibsdiff::writer::WriterOptions;
use std::io::{Read, Seek, Write};
use tempfile::NamedTempFile;

const LARGE: u64 = 256 * 1024 * 1024;

#[test]
#[ignore = "large-file test is opt-in due runtime and memory requirements"]
fn large_sparse_file_roundtrip() {
    let mut old = NamedTempFile::new().unwrap();
    let mut new = NamedTempFile::new().unwrap();
    let patch = NamedTempFile::new().unwrap();
    let output = NamedTempFile::new().unwrap();

    // Sparse files with a few deterministic mutations.
    old.as_file_mut().set_len(LARGE).unwrap();
    new.as_file_mut().set_len(LARGE).unwrap();

    old.as_file_mut()
        .seek(std::io::SeekFrom::Start(64 * 1024))
        .unwrap();
    old.as_file_mut().write_all(b"baseline-block").unwrap();

    new.as_file_mut()
        .seek(std::io::SeekFrom::Start(64 * 1024))
        .unwrap();
    new.as_file_mut().write_all(b"mutated-block!").unwrap();
    new.as_file_mut()
        .seek(std::io::SeekFrom::Start(LARGE / 2))
        .unwrap();
    new.as_file_mut().write_all(b"middle-chunk").unwrap();

    let stats = diff_file(
        old.path(),
        new.path(),
        patch.path(),
        &WriterOptions::default(),
        &DiffOptions::default(),
    )
    .unwrap();
    assert!(stats.patch_size > 0);
    assert!(stats.patch_size < LARGE / 100);

    let applied = patch_file(old.path(), patch.path(), output.path()).unwrap();
    assert_eq!(applied.new_size, LARGE);

    let mut out_f = std::fs::File::open(output.path()).unwrap();
    let mut new_f = std::fs::File::open(new.path()).unwrap();
    for off in [0u64, 64 * 1024, LARGE / 2, LARGE - 32] {
        out_f.seek(std::io::SeekFrom::Start(off)).unwrap();
        new_f.seek(std::io::SeekFrom::Start(off)).unwrap();
        let mut ob = [0u8; 32];
        let mut nb = [0u8; 32];
        out_f.read_exact(&mut ob).unwrap();
        new_f.read_exact(&mut nb).unwrap();
        assert_eq!(ob, nb, "mismatch at offset {off}");
    }
}

#[test]
fn edge_case_matrix() {
    let cases: Vec<(&[u8], &[u8])> = vec![
        (b"", b""),
        (b"", b"x"),
        (b"x", b""),
        (b"\0\0\0\0\0", b"\0\0\0\0\0"),
        (b"\0\0\0\0\0", b"\0\0\0\0\x01"),
        (b"\xff\xff\xff", b"\0\0\0\xff"),
    ];

    for (old, new) in cases {
        let delta = oxibsdiff::diff::diff_to_vec(old, new, &WriterOptions::default()).unwrap();
        let patched = oxibsdiff::patch::apply(old, &delta).unwrap();
        assert_eq!(patched, new);
    }
}

#[test]
fn patch_file_matches_in_memory_apply() {
    let dir = tempfile::tempdir().unwrap();
    let mut seed = 1u64;
    let old: Vec<u8> = (0..1 << 20)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            (seed >> 33) as u8
        })
        .collect();
    let mut new = old.clone();
    for i in (0..new.len()).step_by(4096) {
        new[i] = new[i].wrapping_add(1);
    }

    let old_path = dir.path().join("old.bin");
    let new_path = dir.path().join("new.bin");
    let patch_path = dir.path().join("patch.bin");
    let out_path = dir.path().join("out.bin");
    std::fs::write(&old_path, &old).unwrap();
    std::fs::write(&new_path, &new).unwrap();

    let stats = diff_file(
        &old_path,
        &new_path,
        &patch_path,
        &WriterOptions::default(),
        &DiffOptions::default(),
    )
    .unwrap();
    assert!(
        stats.patch_size < stats.new_size,
        "patch should be smaller than the new file"
    );

    let patch = std::fs::read(&patch_path).unwrap();
    let in_memory = oxibsdiff::patch::apply(&old, &patch).unwrap();
    patch_file(&old_path, &patch_path, &out_path).unwrap();
    assert_eq!(std::fs::read(&out_path).unwrap(), in_memory);
    assert_eq!(in_memory, new);
}
