//! `<root>/.molecule/staging.json` state store.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;
use tracing::{debug, trace};

use staging_core::{
    application::{ApplicationError, ports::StateStore},
    domain::{PortRange, PortTriple, Slug, StagingEnvironmentRecord, StagingState},
    error::{StagingError, StagingResult},
};

pub const STATE_DIR: &str = ".molecule";
pub const STATE_FILE: &str = "staging.json";
pub const LOCK_FILE: &str = "staging.lock";

/// Distinguishes temp files of concurrent saves within one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Location of the state document: `<root>/.molecule/staging.json` built by
/// string concatenation, so nothing in `project_root` is normalised.
///
/// ```
/// use std::path::Path;
/// use staging_adapters::state_store::state_path;
///
/// assert_eq!(
///     state_path(Path::new("/my/project")),
///     Path::new("/my/project/.molecule/staging.json"),
/// );
/// ```
pub fn state_path(project_root: &Path) -> PathBuf {
    let mut path = project_root.as_os_str().to_os_string();
    path.push(format!("/{STATE_DIR}/{STATE_FILE}"));
    PathBuf::from(path)
}

/// Read the state document; a missing file is the empty state.
pub fn load_state(project_root: &Path) -> StagingResult<StagingState> {
    let path = state_path(project_root);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file yet, starting empty");
            return Ok(StagingState::empty());
        }
        Err(e) => return Err(map_io_error(&path, e, "read")),
    };

    let state: StagingState = serde_json::from_str(&raw).map_err(|e| corrupted(&path, e))?;
    state.validate().map_err(|e| corrupted(&path, e))?;
    trace!(path = %path.display(), environments = state.len(), "Loaded state");
    Ok(state)
}

/// Write the whole document, creating `.molecule/` when needed.
///
/// The JSON goes to a sibling temp file first and is renamed over the
/// target, so readers see either the old or the new document.
pub fn save_state(project_root: &Path, state: &StagingState) -> StagingResult<()> {
    let path = state_path(project_root);
    let dir = project_root.join(STATE_DIR);
    fs::create_dir_all(&dir).map_err(|e| map_io_error(&dir, e, "create directory"))?;

    let mut json = serde_json::to_string_pretty(state).map_err(|e| StagingError::Internal {
        message: format!("failed to serialize state: {e}"),
    })?;
    json.push('\n');

    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = dir.join(format!(".{}.{}.{}.tmp", STATE_FILE, std::process::id(), seq));
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, &path));

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(map_io_error(&path, e, "write"));
    }
    debug!(path = %path.display(), environments = state.len(), "Saved state");
    Ok(())
}

pub fn add_environment(project_root: &Path, record: StagingEnvironmentRecord) -> StagingResult<()> {
    JsonFileStateStore::new(project_root).add_environment(record)
}

/// Idempotent: removing an unknown slug succeeds with `None`.
pub fn remove_environment(
    project_root: &Path,
    slug: &Slug,
) -> StagingResult<Option<StagingEnvironmentRecord>> {
    JsonFileStateStore::new(project_root).remove_environment(slug)
}

pub fn get_environment(
    project_root: &Path,
    slug: &Slug,
) -> StagingResult<Option<StagingEnvironmentRecord>> {
    JsonFileStateStore::new(project_root).get_environment(slug)
}

pub fn list_environments(project_root: &Path) -> StagingResult<Vec<StagingEnvironmentRecord>> {
    JsonFileStateStore::new(project_root).list_environments()
}

pub fn allocate_port(project_root: &Path, range: PortRange) -> StagingResult<PortTriple> {
    JsonFileStateStore::new(project_root).allocate_port(range)
}

/// Production state store rooted at a project directory.
///
/// Every `update` holds an exclusive advisory lock on
/// `.molecule/staging.lock` for the load-modify-save sequence.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    root: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            root: project_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> PathBuf {
        state_path(&self.root)
    }

    fn lock(&self) -> StagingResult<StateLock> {
        let dir = self.root.join(STATE_DIR);
        fs::create_dir_all(&dir).map_err(|e| map_io_error(&dir, e, "create directory"))?;

        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| lock_error(&path, e))?;
        file.lock_exclusive().map_err(|e| lock_error(&path, e))?;
        trace!(path = %path.display(), "Acquired state lock");
        Ok(StateLock { file })
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self) -> StagingResult<StagingState> {
        load_state(&self.root)
    }

    fn save(&self, state: &StagingState) -> StagingResult<()> {
        let _guard = self.lock()?;
        save_state(&self.root, state)
    }

    fn update(
        &self,
        change: &mut dyn FnMut(&mut StagingState) -> StagingResult<()>,
    ) -> StagingResult<()> {
        let _guard = self.lock()?;
        let mut state = load_state(&self.root)?;
        change(&mut state)?;
        save_state(&self.root, &state)
    }
}

/// Released on drop. The lock file itself stays in place.
struct StateLock {
    file: File,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        // Best-effort; the OS drops the lock with the handle anyway.
        let _ = FileExt::unlock(&self.file);
    }
}

fn map_io_error(path: &Path, e: io::Error, operation: &str) -> StagingError {
    ApplicationError::StateIo {
        path: path.to_path_buf(),
        reason: format!("Failed to {}: {}", operation, e),
    }
    .into()
}

fn lock_error(path: &Path, e: io::Error) -> StagingError {
    ApplicationError::LockFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
    .into()
}

fn corrupted(path: &Path, e: impl std::fmt::Display) -> StagingError {
    ApplicationError::StateCorrupted {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
    .into()
}
