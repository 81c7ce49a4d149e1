use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::{Event as FsEvent, RecommendedWatcher, RecursiveMode, Watcher};

use ctlstore_paths::ChangelogPath;

use crate::entry::Event;
use crate::error::{ChangelogError, Result};

const FALLBACK_POLL: Duration = Duration::from_secs(1);
const CHANNEL_CAPACITY: usize = 1024;

/// One item delivered by a [`TailIterator`] (spec.md 4.10's `Next`).
#[derive(Debug)]
pub enum TailOutcome {
    /// A successfully parsed changelog entry. `out_of_sync` is set when its
    /// sequence does not immediately follow the previously delivered one;
    /// the event is still delivered either way.
    Event { event: Event, out_of_sync: bool },
    /// A non-matching event (from a [`FilteredIterator`]) carried a
    /// sequence gap; surfaced without the event itself.
    Gap,
    /// A line failed to parse as JSON; the reader continues past it.
    ParseError(String),
}

/// A file-watcher-driven reader over a changelog file, tolerant of partial
/// writes and in-place rotation (spec.md 4.10).
pub struct TailIterator {
    rx: Receiver<String>,
    cancel: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    _watcher: RecommendedWatcher,
    previous_seq: Option<i64>,
}

impl TailIterator {
    pub fn start(path: ChangelogPath) -> Result<Self> {
        let path: PathBuf = path.into();
        if !path.exists() {
            std::thread::sleep(Duration::from_secs(1));
            if !path.exists() {
                return Err(ChangelogError::PathNeverAppeared);
            }
        }

        let (fs_tx, fs_rx) = mpsc::channel::<()>();
        let mut watcher: RecommendedWatcher = Watcher::new(
            move |res: notify::Result<FsEvent>| {
                if res.is_ok() {
                    let _ = fs_tx.send(());
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        if let Some(parent) = path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        let (out_tx, out_rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));
        let reader = spawn_reader(path, fs_rx, out_tx, cancel.clone());

        Ok(Self {
            rx: out_rx,
            cancel,
            reader: Some(reader),
            _watcher: watcher,
            previous_seq: None,
        })
    }

    /// Blocks for the next changelog entry. Returns `None` once the reader
    /// thread has exited (e.g. after [`TailIterator::close`]).
    pub fn next(&mut self) -> Option<TailOutcome> {
        let line = self.rx.recv().ok()?;
        Some(match serde_json::from_str::<Event>(&line) {
            Err(e) => TailOutcome::ParseError(e.to_string()),
            Ok(event) => {
                let out_of_sync = matches!(self.previous_seq, Some(prev) if event.sequence != prev + 1);
                self.previous_seq = Some(event.sequence);
                TailOutcome::Event { event, out_of_sync }
            }
        })
    }

    pub fn filtered(self, family: String, table: String) -> FilteredIterator {
        FilteredIterator { inner: self, family, table }
    }

    /// Cancels the reader thread and drops the watcher.
    pub fn close(mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(h) = self.reader.take() {
            let _ = h.join();
        }
    }
}

/// Wraps a [`TailIterator`], skipping events for other `(family, table)`
/// pairs while still surfacing out-of-sync gaps (spec.md 4.10).
pub struct FilteredIterator {
    inner: TailIterator,
    family: String,
    table: String,
}

impl FilteredIterator {
    pub fn next(&mut self) -> Option<TailOutcome> {
        loop {
            return match self.inner.next()? {
                TailOutcome::Event { event, out_of_sync } => {
                    if event.family == self.family && event.table == self.table {
                        Some(TailOutcome::Event { event, out_of_sync })
                    } else if out_of_sync {
                        Some(TailOutcome::Gap)
                    } else {
                        continue;
                    }
                }
                other => Some(other),
            };
        }
    }

    pub fn close(self) {
        self.inner.close()
    }
}

fn spawn_reader(
    path: PathBuf,
    fs_rx: Receiver<()>,
    out_tx: SyncSender<String>,
    cancel: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut file = File::open(&path).ok();
        let mut pos: u64 = 0;
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = [0u8; 8192];

        while !cancel.load(Ordering::Relaxed) {
            let Some(f) = file.as_mut() else {
                if wait_for_signal(&fs_rx).is_err() {
                    return;
                }
                file = File::open(&path).ok();
                pos = 0;
                continue;
            };

            if f.seek(SeekFrom::Start(pos)).is_err() {
                file = None;
                continue;
            }
            let n = match f.read(&mut buf) {
                Ok(n) => n,
                Err(_) => {
                    file = None;
                    continue;
                }
            };

            if n == 0 {
                if wait_for_signal(&fs_rx).is_err() {
                    return;
                }
                if rotated(&path, f) {
                    file = File::open(&path).ok();
                    pos = 0;
                }
                continue;
            }

            pos += n as u64;
            pending.extend_from_slice(&buf[..n]);
            while let Some(nl) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=nl).collect();
                let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
                if out_tx.send(text).is_err() {
                    return;
                }
            }
        }
    })
}

/// Blocks until either a filesystem notification arrives or the 1-second
/// fallback timer fires. Returns `Err(())` only if the notify channel has
/// disconnected (the watcher was dropped).
fn wait_for_signal(fs_rx: &Receiver<()>) -> std::result::Result<(), ()> {
    match fs_rx.recv_timeout(FALLBACK_POLL) {
        Ok(()) | Err(RecvTimeoutError::Timeout) => Ok(()),
        Err(RecvTimeoutError::Disconnected) => Err(()),
    }
}

/// Whether `path` now refers to a different inode than the currently open
/// file — the unlink+create rotation contract of spec.md 4.8.
fn rotated(path: &std::path::Path, open_file: &File) -> bool {
    let (Ok(on_disk), Ok(open)) = (std::fs::metadata(path), open_file.metadata()) else {
        return true;
    };
    on_disk.ino() != open.ino()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn new_path() -> (tempfile::TempDir, ChangelogPath) {
        let dir = tempfile::tempdir().unwrap();
        let path = ctlstore_paths::CtlstoreDataDir::new(dir.path()).changelog();
        std::fs::write(path.as_path(), b"").unwrap();
        (dir, path)
    }

    fn line(seq: i64) -> String {
        serde_json::to_string(&Event {
            seq,
            family: "f".to_owned(),
            table: "t".to_owned(),
            key: vec![],
        })
        .unwrap()
    }

    #[test]
    fn tolerates_a_partial_line_flushed_in_two_writes() {
        let (_dir, path) = new_path();
        let mut iter = TailIterator::start(path.clone()).unwrap();

        let full = line(1);
        let (first_half, second_half) = full.split_at(full.len() / 2);
        let mut f = std::fs::OpenOptions::new().append(true).open(path.as_path()).unwrap();
        write!(f, "{first_half}").unwrap();
        f.flush().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        write!(f, "{second_half}\n").unwrap();
        f.flush().unwrap();

        match iter.next().unwrap() {
            TailOutcome::Event { event, out_of_sync } => {
                assert_eq!(event.seq, 1);
                assert!(!out_of_sync);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        iter.close();
    }

    #[test]
    fn tolerates_in_place_rotation() {
        let (_dir, path) = new_path();
        let mut iter = TailIterator::start(path.clone()).unwrap();

        std::fs::write(path.as_path(), format!("{}\n", line(1))).unwrap();
        assert!(matches!(iter.next().unwrap(), TailOutcome::Event { .. }));

        std::fs::remove_file(path.as_path()).unwrap();
        std::fs::write(path.as_path(), format!("{}\n", line(2))).unwrap();

        match iter.next().unwrap() {
            TailOutcome::Event { event, .. } => assert_eq!(event.seq, 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
        iter.close();
    }

    #[test]
    fn detects_sequence_gap_without_dropping_the_event() {
        let (_dir, path) = new_path();
        let mut iter = TailIterator::start(path.clone()).unwrap();

        std::fs::write(path.as_path(), format!("{}\n{}\n", line(1), line(5))).unwrap();

        assert!(matches!(iter.next().unwrap(), TailOutcome::Event { out_of_sync: false, .. }));
        match iter.next().unwrap() {
            TailOutcome::Event { event, out_of_sync } => {
                assert_eq!(event.seq, 5);
                assert!(out_of_sync);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        iter.close();
    }

    #[test]
    fn malformed_line_yields_parse_error_and_reader_continues() {
        let (_dir, path) = new_path();
        let mut iter = TailIterator::start(path.clone()).unwrap();

        std::fs::write(path.as_path(), format!("not json\n{}\n", line(1))).unwrap();

        assert!(matches!(iter.next().unwrap(), TailOutcome::ParseError(_)));
        assert!(matches!(iter.next().unwrap(), TailOutcome::Event { .. }));
        iter.close();
    }
}
