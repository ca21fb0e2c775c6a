//! On-disk home of one profile's [`Store`].

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::crypto::secure_random;
use crate::error::{Result, VaultError};
use crate::lock::LockGuard;
use crate::store::Store;

/// The JSON file backing one profile.
///
/// Reads and writes always cover the whole document. Writes go through a
/// sibling temp file that is renamed over the target, so a crash leaves
/// either the previous or the new store behind.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<store>.lock`, next to the store file.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    pub fn lock(&self) -> Result<LockGuard> {
        LockGuard::acquire(self.lock_path())
    }

    /// Reads and parses the store file.
    ///
    /// # Errors
    ///
    /// `VaultError::StoreNotFound` if there is no file, `VaultError::Io` if
    /// it cannot be read and `VaultError::Serialization` if it is not a
    /// store document.
    pub fn load(&self) -> Result<Store> {
        let data = fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::StoreNotFound(self.path.clone()),
            _ => e.into(),
        })?;
        let store: Store = serde_json::from_slice(&data)?;
        tracing::debug!(path = %self.path.display(), entries = store.len(), "store loaded");
        Ok(store)
    }

    /// Writes an empty store unless the file is already there.
    pub fn init_if_missing(&self) -> Result<()> {
        if self.exists() {
            return Ok(());
        }
        tracing::debug!(path = %self.path.display(), "creating empty store");
        self.save(&Store::new())
    }

    /// Writes `store` as indented JSON.
    pub fn save(&self, store: &Store) -> Result<()> {
        self.write_atomic(&serde_json::to_vec_pretty(store)?)?;
        tracing::debug!(path = %self.path.display(), entries = store.len(), "store saved");
        Ok(())
    }

    /// Replaces the file contents with `data`, creating parent directories.
    pub fn write_atomic(&self, data: &[u8]) -> Result<()> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let tmp = self.tmp_path()?;
        if let Err(e) = write_private(&tmp, data).and_then(|()| replace(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        // persist the rename itself
        #[cfg(not(target_os = "windows"))]
        if let Some(dir) = parent {
            File::open(dir)?.sync_all()?;
        }

        Ok(())
    }

    /// `<store file name>.tmp.<16 hex digits>` in the store's directory.
    fn tmp_path(&self) -> Result<PathBuf> {
        let mut suffix = [0u8; 8];
        secure_random(&mut suffix)?;
        let suffix: String = suffix.iter().map(|b| format!("{b:02x}")).collect();

        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(format!(".tmp.{suffix}"));

        Ok(self.path.with_file_name(name))
    }
}

/// Creates `path` (never reusing an existing file), writes and fsyncs it.
/// On Unix the file is readable by the owner only.
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(not(target_os = "windows"))]
fn replace(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to)?;
    Ok(())
}

/// `ReplaceFileW` with write-through; a plain rename when there is nothing
/// to replace yet.
#[cfg(target_os = "windows")]
fn replace(from: &Path, to: &Path) -> Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

    if !to.exists() {
        fs::rename(from, to)?;
        return Ok(());
    }

    let wide = |p: &Path| -> Vec<u16> {
        p.as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    };
    let target = wide(to);
    let replacement = wide(from);

    // SAFETY: both buffers are NUL-terminated UTF-16 and outlive the call;
    // the optional arguments are null.
    let ok = unsafe {
        ReplaceFileW(
            target.as_ptr(),
            replacement.as_ptr(),
            std::ptr::null(),
            REPLACEFILE_WRITE_THROUGH,
            std::ptr::null(),
            std::ptr::null(),
        )
    };
    if ok == 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Entry;
    use tempfile::{TempDir, tempdir};

    fn storage_in_tempdir() -> (TempDir, Storage) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("default.json"));
        (dir, storage)
    }

    fn populated() -> Store {
        let mut store = Store::new();
        store.set_master_password_hash("$argon2id$hash".into());
        store
            .add(Entry {
                unique_id: "A".into(),
                tags: vec!["t".into()],
                ..Entry::default()
            })
            .unwrap();
        store
    }

    #[test]
    fn save_then_load() {
        let (_dir, storage) = storage_in_tempdir();
        storage.save(&populated()).unwrap();
        assert_eq!(storage.load().unwrap(), populated());
    }

    #[test]
    fn load_errors() {
        let (_dir, storage) = storage_in_tempdir();
        assert!(matches!(storage.load(), Err(VaultError::StoreNotFound(p)) if p == storage.path()));

        storage.write_atomic(b"not json").unwrap();
        assert!(matches!(storage.load(), Err(VaultError::Serialization(_))));
    }

    #[test]
    fn store_is_written_as_indented_json() {
        let (_dir, storage) = storage_in_tempdir();
        storage.save(&populated()).unwrap();

        let text = fs::read_to_string(storage.path()).unwrap();
        assert!(text.contains("\n  \"master_password\": \"$argon2id$hash\""));
    }

    #[test]
    fn init_if_missing_never_overwrites() {
        let (_dir, storage) = storage_in_tempdir();
        assert!(!storage.exists());

        storage.init_if_missing().unwrap();
        assert_eq!(storage.load().unwrap(), Store::new());

        storage.save(&populated()).unwrap();
        storage.init_if_missing().unwrap();
        assert_eq!(storage.load().unwrap(), populated());
    }

    #[cfg(unix)]
    #[test]
    fn store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, storage) = storage_in_tempdir();
        storage.init_if_missing().unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn tmp_paths_are_fresh_siblings() {
        let (_dir, storage) = storage_in_tempdir();

        let a = storage.tmp_path().unwrap();
        let b = storage.tmp_path().unwrap();

        assert_eq!(a.parent(), storage.path().parent());
        assert!(a.to_string_lossy().contains("default.json.tmp."));
        assert_ne!(a, b);
    }

    #[test]
    fn write_atomic_replaces_and_cleans_up() {
        let (dir, storage) = storage_in_tempdir();

        storage.write_atomic(b"first").unwrap();
        storage.write_atomic(b"second").unwrap();
        assert_eq!(fs::read(storage.path()).unwrap(), b"second");

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["default.json"]);
    }

    #[cfg(unix)]
    #[test]
    fn failed_write_leaves_no_tmp_file() {
        let (dir, storage) = storage_in_tempdir();
        fs::create_dir(storage.path()).unwrap();
        fs::write(storage.path().join("occupied"), b"x").unwrap();

        assert!(matches!(storage.write_atomic(b"data"), Err(VaultError::Io(_))));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["default.json"]);
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("default.json");

        Storage::new(nested.clone()).save(&Store::new()).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn lock_path_sits_next_to_store() {
        let storage = Storage::new(PathBuf::from("/data/work.json"));
        assert_eq!(storage.lock_path(), PathBuf::from("/data/work.json.lock"));
    }
}
