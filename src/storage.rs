//! File access for encrypted inputs and recovered plaintext.

use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::UnsealError;

/// Extension the backup tool appends to encrypted files.
pub const ENCRYPTED_EXT: &str = "enc";

/// A file on disk that is read whole or replaced atomically.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns the path to the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the entire file into memory.
    ///
    /// # Errors
    ///
    /// Returns [`UnsealError::Io`] if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>, UnsealError> {
        fs::read(&self.path).map_err(|e| UnsealError::io("read", &self.path, e))
    }

    /// Writes data to the file using an atomic replace.
    ///
    /// Data goes to a randomly named sibling first, is synced, then renamed
    /// over the target, and finally the parent directory is synced. After a
    /// crash the target either holds the complete data or is untouched.
    /// On Unix the file is created owner-only (0600).
    ///
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns [`UnsealError::Io`] if any step fails. The temporary file is
    /// removed on failure.
    pub fn save(&self, data: &[u8]) -> Result<(), UnsealError> {
        if let Some(parent) = self.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| UnsealError::io("create directory", parent, e))?;
        }

        let tmp_path = self.random_tmp_path()?;

        if let Err(e) = write_synced(&tmp_path, data) {
            let _ = fs::remove_file(&tmp_path);
            return Err(UnsealError::io("write", &tmp_path, e));
        }

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(UnsealError::io("replace", &self.path, e));
        }

        if let Some(parent) = self.parent() {
            File::open(parent)
                .and_then(|dir| dir.sync_all())
                .map_err(|e| UnsealError::io("sync directory", parent, e))?;
        }

        Ok(())
    }

    /// Deletes the file.
    pub fn remove(&self) -> Result<(), UnsealError> {
        fs::remove_file(&self.path).map_err(|e| UnsealError::io("remove", &self.path, e))
    }

    /// Returns `true` if both storages name the same file once `.`/`..`
    /// components and symlinks are resolved.
    ///
    /// The file itself need not exist; its parent directory must. Paths
    /// that cannot be resolved are treated as distinct.
    pub fn is_same_file(&self, other: &Storage) -> bool {
        match (resolve(&self.path), resolve(&other.path)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn parent(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Generates a unique temporary file path in the same directory.
    ///
    /// Format: `filename.tmp.<randomhex>`
    fn random_tmp_path(&self) -> Result<PathBuf, UnsealError> {
        let mut buf = [0u8; 8];
        fill(&mut buf).map_err(|e| {
            UnsealError::io(
                "name temporary file for",
                &self.path,
                io::Error::other(format!("OS random generator unavailable: {e}")),
            )
        })?;

        let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unsealed".to_string());

        let tmp_name = format!("{}.tmp.{}", file_name, rand_string);

        Ok(self.path.with_file_name(tmp_name))
    }

    /// Atomically replaces the target file with the temporary file.
    ///
    /// `ReplaceFileW` requires an existing target, so a fresh target is
    /// renamed into place instead.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> io::Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        if !self.path.exists() {
            return fs::rename(tmp_path, &self.path);
        }

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// On Unix, `rename()` is atomic when both paths are on the same filesystem.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> io::Result<()> {
        fs::rename(tmp_path, &self.path)
    }
}

fn resolve(path: &Path) -> io::Result<PathBuf> {
    if path.exists() {
        return fs::canonicalize(path);
    }

    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok(fs::canonicalize(parent)?.join(name))
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Derives where the plaintext of `input` goes: the same path without the
/// trailing `.enc`.
///
/// Returns `None` if `input` does not carry the suffix or would be left with
/// an empty file name.
pub fn output_path_for(input: &Path) -> Option<PathBuf> {
    let name = input.file_name()?.to_str()?;
    let stem = name.strip_suffix(ENCRYPTED_EXT)?.strip_suffix('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(input.with_file_name(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    // --------------------------------------------------
    // LOAD TESTS
    // --------------------------------------------------

    #[test]
    fn load_returns_written_data() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("archive.tar.gz"));

        storage.save(b"hello world").unwrap();

        assert_eq!(storage.load().unwrap(), b"hello world");
    }

    #[test]
    fn load_fails_if_file_does_not_exist() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("missing.enc"));

        match storage.load() {
            Err(UnsealError::Io { action, path, .. }) => {
                assert_eq!(action, "read");
                assert_eq!(path, dir.path().join("missing.enc"));
            }
            other => panic!("expected Io, got: {other:?}"),
        }
    }

    // --------------------------------------------------
    // SAVE TESTS
    // --------------------------------------------------

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.tar");
        let storage = Storage::new(path.clone());

        storage.save(b"first").unwrap();
        storage.save(b"second").unwrap();

        assert_eq!(fs::read(path).unwrap(), b"second");
    }

    #[test]
    fn tmp_file_is_removed_after_success() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("archive.tar"));
        storage.save(b"data").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], "archive.tar");
    }

    #[test]
    fn parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("restore").join("decrypted").join("a.tar");

        Storage::new(nested.clone()).save(b"data").unwrap();

        assert!(nested.exists());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.tar");
        Storage::new(path.clone()).save(b"plaintext").unwrap();

        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn tmp_names_are_unique_siblings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.tar");
        let storage = Storage::new(path.clone());

        let a = storage.random_tmp_path().unwrap();
        let b = storage.random_tmp_path().unwrap();

        assert_ne!(a, b);
        assert_ne!(a, path);
        assert_eq!(a.parent(), path.parent());
    }

    #[test]
    fn remove_deletes_file() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("archive.tar.enc"));
        storage.save(b"x").unwrap();

        storage.remove().unwrap();
        assert!(!storage.exists());
    }

    #[test]
    fn dotted_path_is_same_file() {
        let dir = tempdir().unwrap();
        let input = Storage::new(dir.path().join("a.enc"));
        input.save(b"sealed").unwrap();

        let dotted = Storage::new(dir.path().join(".").join("a.enc"));
        let via_parent = Storage::new(dir.path().join("sub").join("..").join("a.enc"));
        fs::create_dir(dir.path().join("sub")).unwrap();

        assert!(input.is_same_file(&dotted));
        assert!(input.is_same_file(&via_parent));
    }

    #[test]
    fn missing_sibling_is_not_same_file() {
        let dir = tempdir().unwrap();
        let input = Storage::new(dir.path().join("a.enc"));
        input.save(b"sealed").unwrap();

        assert!(!input.is_same_file(&Storage::new(dir.path().join("a"))));
        assert!(!input.is_same_file(&Storage::new(dir.path().join("nope").join("a.enc"))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_input_is_same_file() {
        let dir = tempdir().unwrap();
        let input = Storage::new(dir.path().join("a.enc"));
        input.save(b"sealed").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(input.path(), &link).unwrap();

        assert!(input.is_same_file(&Storage::new(link)));
    }

    // --------------------------------------------------
    // OUTPUT PATH TESTS
    // --------------------------------------------------

    #[test]
    fn output_path_strips_enc_suffix() {
        assert_eq!(
            output_path_for(Path::new("/backups/photos.tar.gz.enc")),
            Some(PathBuf::from("/backups/photos.tar.gz"))
        );
        assert_eq!(
            output_path_for(Path::new("part_001.enc")),
            Some(PathBuf::from("part_001"))
        );
    }

    #[test]
    fn output_path_requires_suffix() {
        assert_eq!(output_path_for(Path::new("/backups/photos.tar.gz")), None);
        assert_eq!(output_path_for(Path::new("/backups/photosenc")), None);
        assert_eq!(output_path_for(Path::new("/backups/.enc")), None);
    }
}
