use tempfile::TempDir;

use crate::splitter::{Splitter, SplitterOptions};

fn small_opts(max: u64) -> SplitterOptions {
    SplitterOptions {
        max_file_size: max,
        auto_delete: true,
    }
}

fn read_all(splitter: &Splitter) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 16];
    loop {
        let n = splitter.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn test_reader_observes_write_sequence() {
    let dir = TempDir::new().unwrap();
    let s = Splitter::open(dir.path().join("queue"), small_opts(1_000_000)).unwrap();

    s.write(b"alpha").unwrap();
    s.write(b"beta").unwrap();
    s.write(b"gamma").unwrap();

    assert_eq!(read_all(&s), b"alphabetagamma");
    // Caught up: further reads return zero.
    let mut buf = [0u8; 4];
    assert_eq!(s.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_empty_queue_reads_zero() {
    let dir = TempDir::new().unwrap();
    let s = Splitter::open(dir.path().join("queue"), small_opts(100)).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(s.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_rotation_at_cap() {
    let dir = TempDir::new().unwrap();
    let s = Splitter::open(dir.path().join("queue"), small_opts(10)).unwrap();

    s.write(b"0123456789").unwrap(); // fills file 0
    s.write(b"abcde").unwrap(); // rotates to file 1

    assert!(dir.path().join("queue.0").exists());
    assert!(dir.path().join("queue.1").exists());

    let ((rid, _), (wid, woff)) = s.cursors();
    assert_eq!(rid, 0);
    assert_eq!(wid, 1);
    assert_eq!(woff, 5);

    assert_eq!(read_all(&s), b"0123456789abcde");
}

#[test]
fn test_record_never_spans_files() {
    let dir = TempDir::new().unwrap();
    let s = Splitter::open(dir.path().join("queue"), small_opts(10)).unwrap();

    s.write(b"123456").unwrap();
    // 6 + 8 > 10: the whole record moves to the next file.
    s.write(b"ABCDEFGH").unwrap();

    assert_eq!(std::fs::read(dir.path().join("queue.0")).unwrap(), b"123456");
    assert_eq!(
        std::fs::read(dir.path().join("queue.1")).unwrap(),
        b"ABCDEFGH"
    );
}

#[test]
fn test_drained_files_are_unlinked() {
    let dir = TempDir::new().unwrap();
    let s = Splitter::open(dir.path().join("queue"), small_opts(4)).unwrap();

    s.write(b"aaaa").unwrap();
    s.write(b"bbbb").unwrap();
    s.write(b"cccc").unwrap();
    assert_eq!(read_all(&s), b"aaaabbbbcccc");

    // Files 0 and 1 were fully consumed and a newer file existed.
    assert!(!dir.path().join("queue.0").exists());
    assert!(!dir.path().join("queue.1").exists());
    assert!(dir.path().join("queue.2").exists());
}

#[test]
fn test_interleaved_read_write() {
    let dir = TempDir::new().unwrap();
    let s = Splitter::open(dir.path().join("queue"), small_opts(8)).unwrap();

    let mut buf = [0u8; 64];
    s.write(b"one").unwrap();
    assert_eq!(s.read(&mut buf).unwrap(), 3);
    assert_eq!(&buf[..3], b"one");

    s.write(b"twotwo").unwrap();
    s.write(b"three").unwrap();
    assert_eq!(read_all(&s), b"twotwothree");
}

#[test]
fn test_cursors_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("queue");

    {
        let s = Splitter::open(&base, small_opts(1_000)).unwrap();
        s.write(b"persisted-head").unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(s.read(&mut buf).unwrap(), 10);
        // Drop persists the sidecar.
    }

    let s = Splitter::open(&base, small_opts(1_000)).unwrap();
    let ((rid, roff), (wid, woff)) = s.cursors();
    assert_eq!((rid, roff), (0, 10));
    assert_eq!((wid, woff), (0, 14));
    assert_eq!(read_all(&s), b"head");
}

#[test]
fn test_recovery_without_sidecar() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("queue");

    {
        let s = Splitter::open(&base, small_opts(4)).unwrap();
        s.write(b"aaaa").unwrap();
        s.write(b"bbbb").unwrap();
    }
    std::fs::remove_file(dir.path().join("queue.stats")).unwrap();

    // Lowest surviving id becomes the read head.
    let s = Splitter::open(&base, small_opts(4)).unwrap();
    assert_eq!(read_all(&s), b"aaaabbbb");
}

#[test]
fn test_writes_resume_after_reopen() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("queue");

    {
        let s = Splitter::open(&base, small_opts(1_000)).unwrap();
        s.write(b"first|").unwrap();
    }
    {
        let s = Splitter::open(&base, small_opts(1_000)).unwrap();
        s.write(b"second").unwrap();
        assert_eq!(read_all(&s), b"first|second");
    }
}

#[test]
fn test_seek_read_for_replay() {
    let dir = TempDir::new().unwrap();
    let s = Splitter::open(dir.path().join("queue"), small_opts(1_000)).unwrap();
    s.write(b"0123456789").unwrap();

    assert_eq!(read_all(&s), b"0123456789");
    s.seek_read(0, 4).unwrap();
    assert_eq!(read_all(&s), b"456789");

    assert!(s.seek_read(7, 0).is_err());
}

#[test]
fn test_concurrent_reader_and_writer() {
    let dir = TempDir::new().unwrap();
    let s = std::sync::Arc::new(Splitter::open(dir.path().join("queue"), small_opts(64)).unwrap());

    let writer = {
        let s = std::sync::Arc::clone(&s);
        std::thread::spawn(move || {
            for i in 0..200u8 {
                s.write(&[i]).unwrap();
            }
        })
    };

    let mut seen = Vec::new();
    let mut buf = [0u8; 16];
    while seen.len() < 200 {
        let n = s.read(&mut buf).unwrap();
        if n == 0 {
            std::thread::yield_now();
            continue;
        }
        seen.extend_from_slice(&buf[..n]);
    }
    writer.join().unwrap();

    let expected: Vec<u8> = (0..200u8).collect();
    assert_eq!(seen, expected);
}
