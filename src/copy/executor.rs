// src/copy/executor.rs

//! Single-file copy with at-most-one concurrent copy per source path.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use filetime::FileTime;
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::engine::{MirrorEvent, Notifier};
use crate::errors::{MirrorError, Result};
use crate::pattern::Pattern;
use crate::transform::{Pipeline, TransformSpec};
use crate::types::{CopyOutcome, MappingEntry};

const CHUNK_SIZE: usize = 64 * 1024;

type InFlightMap = HashMap<PathBuf, watch::Receiver<Option<CopyOutcome>>>;

/// Copies matched files into the destination tree.
///
/// Cheap to clone; clones share the in-flight table, so the de-duplication
/// guarantee holds across every operation of one mirror.
#[derive(Debug, Clone)]
pub struct CopyExecutor {
    pattern: Arc<Pattern>,
    dest_root: PathBuf,
    transforms: TransformSpec,
    update: bool,
    notifier: Notifier,
    in_flight: Arc<Mutex<InFlightMap>>,
}

/// Either we own the copy for this path, or somebody else already does.
enum Claim {
    Owner(watch::Sender<Option<CopyOutcome>>),
    Joined(watch::Receiver<Option<CopyOutcome>>),
}

/// Releases the in-flight token on every exit path, including cancellation.
struct InFlightGuard {
    map: Arc<Mutex<InFlightMap>>,
    key: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(&self.key);
    }
}

impl CopyExecutor {
    pub fn new(pattern: Arc<Pattern>, dest_root: impl Into<PathBuf>, transforms: TransformSpec) -> Self {
        Self {
            pattern,
            dest_root: dest_root.into(),
            transforms,
            update: false,
            notifier: Notifier::disabled(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Skip files whose destination is at least as new as the source.
    pub fn with_update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// A clone that reports to `notifier` but shares the in-flight table.
    pub fn with_notifier(&self, notifier: Notifier) -> Self {
        Self {
            notifier,
            ..self.clone()
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn mapping_for(&self, source: impl Into<PathBuf>) -> MappingEntry {
        MappingEntry::new(&self.pattern, &self.dest_root, source)
    }

    /// Number of copies currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copy one file on the blocking pool.
    ///
    /// If a copy of the same source is already running, this waits for and
    /// returns *its* outcome instead of starting a second one.
    pub async fn copy_one(&self, entry: MappingEntry) -> CopyOutcome {
        let sender = match self.claim(&entry.source) {
            Claim::Joined(rx) => {
                debug!(source = ?entry.source, "copy already in flight; awaiting its outcome");
                return await_outcome(&entry.source, rx).await;
            }
            Claim::Owner(tx) => tx,
        };

        let guard = InFlightGuard {
            map: Arc::clone(&self.in_flight),
            key: entry.source.clone(),
        };

        let this = self.clone();
        let job = entry.clone();
        let outcome = match tokio::task::spawn_blocking(move || this.copy_one_blocking(&job)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(source = ?entry.source, error = %err, "copy task did not complete");
                let error = Arc::new(MirrorError::Interrupted(entry.source.clone()));
                self.notifier.emit(MirrorEvent::Error(Arc::clone(&error)));
                CopyOutcome::Failed(error)
            }
        };

        drop(guard);
        sender.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Copy one file on the current thread. Emits `Copied` / `Error`.
    pub fn copy_one_blocking(&self, entry: &MappingEntry) -> CopyOutcome {
        match copy_file(entry, &self.transforms, self.update) {
            Ok(true) => {
                debug!(%entry, "copied");
                self.notifier.emit(MirrorEvent::Copied(entry.clone()));
                CopyOutcome::Copied
            }
            Ok(false) => {
                debug!(%entry, "destination up to date; skipped");
                CopyOutcome::Skipped
            }
            Err(err) => {
                warn!(%entry, error = %err, "copy failed");
                let error = Arc::new(err);
                self.notifier.emit(MirrorEvent::Error(Arc::clone(&error)));
                CopyOutcome::Failed(error)
            }
        }
    }

    fn claim(&self, source: &Path) -> Claim {
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = map.get(source) {
            return Claim::Joined(rx.clone());
        }
        let (tx, rx) = watch::channel(None);
        map.insert(source.to_path_buf(), rx);
        Claim::Owner(tx)
    }
}

async fn await_outcome(source: &Path, mut rx: watch::Receiver<Option<CopyOutcome>>) -> CopyOutcome {
    let value = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => (*outcome).clone(),
        Err(_) => None,
    };
    value.unwrap_or_else(|| CopyOutcome::Failed(Arc::new(MirrorError::Interrupted(source.to_path_buf()))))
}

/// Copy `entry.source` to `entry.destination` through the transform
/// pipeline. Returns `Ok(false)` when skipped by the update policy.
///
/// Content goes to a temporary file next to the destination which receives
/// the source's permission bits and timestamps before being renamed into
/// place, so a failed copy never leaves a truncated destination behind.
fn copy_file(entry: &MappingEntry, transforms: &TransformSpec, update: bool) -> Result<bool> {
    let src = &entry.source;
    let dst = &entry.destination;

    let meta = fs::metadata(src).map_err(|e| MirrorError::file_io(src, e))?;
    if update && is_up_to_date(&meta, dst) {
        return Ok(false);
    }

    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| MirrorError::file_io(parent, e))?;

    let mut pipeline = transforms.build(src).map_err(|source| MirrorError::Transform {
        path: src.clone(),
        source,
    })?;

    let mut reader = File::open(src).map_err(|e| MirrorError::file_io(src, e))?;
    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| MirrorError::file_io(parent, e))?;

    stream(&mut reader, &mut pipeline, tmp.as_file_mut(), src, dst)?;

    let file = tmp.as_file();
    file.set_permissions(meta.permissions())
        .map_err(|e| MirrorError::file_io(dst, e))?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_handle_times(file, Some(atime), Some(mtime))
        .map_err(|e| MirrorError::file_io(dst, e))?;

    tmp.persist(dst)
        .map_err(|e| MirrorError::file_io(dst, e.error))?;
    Ok(true)
}

fn is_up_to_date(src_meta: &fs::Metadata, dst: &Path) -> bool {
    match fs::metadata(dst) {
        Ok(dst_meta) => {
            FileTime::from_last_modification_time(&dst_meta)
                >= FileTime::from_last_modification_time(src_meta)
        }
        Err(_) => false,
    }
}

fn stream(
    reader: &mut impl Read,
    pipeline: &mut Pipeline,
    writer: &mut impl Write,
    src: &Path,
    dst: &Path,
) -> Result<()> {
    let transform_err = |source: io::Error| MirrorError::Transform {
        path: src.to_path_buf(),
        source,
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(MirrorError::file_io(src, e)),
        };
        let out = pipeline.push(&buf[..n]).map_err(transform_err)?;
        writer
            .write_all(&out)
            .map_err(|e| MirrorError::file_io(dst, e))?;
    }

    let tail = pipeline.finish().map_err(transform_err)?;
    writer
        .write_all(&tail)
        .and_then(|()| writer.flush())
        .map_err(|e| MirrorError::file_io(dst, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{ByteTransformer, PrependStage, TransformStage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        src: PathBuf,
        out: PathBuf,
        pattern: Arc<Pattern>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        fs::create_dir_all(src.join("b")).unwrap();
        fs::write(src.join("a.txt"), "hi").unwrap();
        fs::write(src.join("b/c.txt"), "yo").unwrap();
        let pattern = Arc::new(Pattern::new(&format!("{}/**/*.txt", src.display()), false, &[]).unwrap());
        Fixture {
            _dir: dir,
            src,
            out,
            pattern,
        }
    }

    #[test]
    fn creates_parent_dirs_and_preserves_mtime() {
        let fx = fixture();
        let mtime = FileTime::from_unix_time(1_700_000_000, 0);
        filetime::set_file_mtime(fx.src.join("b/c.txt"), mtime).unwrap();

        let exec = CopyExecutor::new(Arc::clone(&fx.pattern), &fx.out, TransformSpec::default());
        let entry = exec.mapping_for(fx.src.join("b/c.txt"));
        assert!(exec.copy_one_blocking(&entry).is_copied());

        assert_eq!(fs::read_to_string(fx.out.join("b/c.txt")).unwrap(), "yo");
        let meta = fs::metadata(fx.out.join("b/c.txt")).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), mtime);
    }

    #[cfg(unix)]
    #[test]
    fn preserves_permission_bits_and_overwrites_read_only_destinations() {
        use std::os::unix::fs::PermissionsExt;

        let fx = fixture();
        let src = fx.src.join("a.txt");
        fs::set_permissions(&src, fs::Permissions::from_mode(0o444)).unwrap();

        let exec = CopyExecutor::new(Arc::clone(&fx.pattern), &fx.out, TransformSpec::default());
        let entry = exec.mapping_for(&src);
        assert!(exec.copy_one_blocking(&entry).is_copied());
        let mode = fs::metadata(&entry.destination).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o444);

        // A second copy replaces the read-only destination.
        assert!(exec.copy_one_blocking(&entry).is_copied());
    }

    #[test]
    fn update_policy_skips_newer_destinations() {
        let fx = fixture();
        let exec = CopyExecutor::new(Arc::clone(&fx.pattern), &fx.out, TransformSpec::default())
            .with_update(true);
        let entry = exec.mapping_for(fx.src.join("a.txt"));

        assert!(exec.copy_one_blocking(&entry).is_copied());
        fs::write(&entry.destination, "local edit").unwrap();
        filetime::set_file_mtime(&entry.destination, FileTime::from_unix_time(4_000_000_000, 0))
            .unwrap();

        assert!(matches!(exec.copy_one_blocking(&entry), CopyOutcome::Skipped));
        assert_eq!(fs::read_to_string(&entry.destination).unwrap(), "local edit");
    }

    #[test]
    fn missing_source_is_a_per_file_io_failure() {
        let fx = fixture();
        let exec = CopyExecutor::new(Arc::clone(&fx.pattern), &fx.out, TransformSpec::default());
        let entry = exec.mapping_for(fx.src.join("gone.txt"));

        match exec.copy_one_blocking(&entry) {
            CopyOutcome::Failed(err) => {
                assert!(matches!(*err, MirrorError::FileIo { .. }));
                assert!(err.is_per_file());
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!entry.destination.exists());
    }

    #[derive(Debug)]
    struct Exploding;

    impl TransformStage for Exploding {
        fn make_transformer(&self, _source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
            Ok(Box::new(ExplodingT))
        }
    }

    struct ExplodingT;

    impl ByteTransformer for ExplodingT {
        fn transform(&mut self, _chunk: &[u8], _out: &mut Vec<u8>) -> io::Result<()> {
            Err(io::Error::other("boom"))
        }
    }

    #[test]
    fn transform_failure_leaves_no_partial_destination() {
        let fx = fixture();
        let spec = TransformSpec::new(vec![
            Arc::new(PrependStage::new(">")) as Arc<dyn TransformStage>,
            Arc::new(Exploding),
        ]);
        let exec = CopyExecutor::new(Arc::clone(&fx.pattern), &fx.out, spec);
        let entry = exec.mapping_for(fx.src.join("a.txt"));

        match exec.copy_one_blocking(&entry) {
            CopyOutcome::Failed(err) => assert!(matches!(*err, MirrorError::Transform { .. })),
            other => panic!("expected transform failure, got {other:?}"),
        }
        assert!(!entry.destination.exists());
        // Only the destination directory remains; the temp file is gone.
        assert_eq!(fs::read_dir(&fx.out).unwrap().count(), 0);
    }

    /// Counts transformer constructions and stalls each one briefly so
    /// concurrent requests overlap.
    #[derive(Debug, Default)]
    struct SlowCounter {
        built: AtomicUsize,
    }

    impl TransformStage for SlowCounter {
        fn make_transformer(&self, _source: &Path) -> io::Result<Box<dyn ByteTransformer>> {
            self.built.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            Ok(Box::new(PassT))
        }
    }

    struct PassT;

    impl ByteTransformer for PassT {
        fn transform(&mut self, chunk: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
            out.extend_from_slice(chunk);
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_source_share_a_single_copy() {
        let fx = fixture();
        let counter = Arc::new(SlowCounter::default());
        let spec = TransformSpec::new(vec![counter.clone() as Arc<dyn TransformStage>]);
        let exec = CopyExecutor::new(Arc::clone(&fx.pattern), &fx.out, spec);
        let entry = exec.mapping_for(fx.src.join("a.txt"));

        let (first, second) = tokio::join!(exec.copy_one(entry.clone()), exec.copy_one(entry.clone()));

        assert!(first.is_copied());
        assert!(second.is_copied());
        assert_eq!(counter.built.load(Ordering::SeqCst), 1);
        assert_eq!(exec.in_flight_count(), 0);

        // Once released, a new request performs a fresh copy.
        assert!(exec.copy_one(entry).await.is_copied());
        assert_eq!(counter.built.load(Ordering::SeqCst), 2);
    }
}
