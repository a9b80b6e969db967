use crate::error::Result;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// A reader never observes a half-written config or unit file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Atomically write `data` to `path`, then set its permission bits to `mode`.
pub fn atomic_write_mode(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    atomic_write(path, data)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Copy `src` over `dest` through a sibling tempfile and mark it executable.
///
/// Replacing the file (rather than writing into it) avoids `ETXTBSY` when a
/// previous daemon binary is still running from `dest`.
pub fn install_executable(src: &Path, dest: &Path) -> Result<()> {
    let data = std::fs::read(src)?;
    atomic_write_mode(dest, &data, 0o755)
}

/// True when `path` is a regular file with any execute bit set.
pub fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/sing-box/config.json");
        atomic_write(&path, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_mode_sets_permissions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secret.json");
        atomic_write_mode(&path, b"{}", 0o600).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn install_executable_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("extracted");
        let dest = dir.path().join("bin/sing-box");
        std::fs::write(&src, b"new").unwrap();
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"old").unwrap();

        install_executable(&src, &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
        assert!(is_executable(&dest));
    }

    #[test]
    fn is_executable_false_for_plain_file_and_missing_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, b"x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!is_executable(&path));
        assert!(!is_executable(&dir.path().join("missing")));
    }
}
