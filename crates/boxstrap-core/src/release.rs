use crate::arch::{self, Arch};
use crate::error::{ProvisionError, Result};
use crate::host::Host;
use crate::{io, paths};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Download the pinned release for `arch`, extract the daemon binary and
/// install it at `install_path` with mode 0755.
///
/// All intermediate files live in a `TempDir` that is removed on every
/// return path, success or not.
pub fn install_release(
    host: &dyn Host,
    version: &str,
    arch: Arch,
    install_path: &Path,
) -> Result<PathBuf> {
    let url = arch::release_url(version, arch);
    let workdir = TempDir::new()?;
    let archive = workdir
        .path()
        .join(format!("{}.tar.gz", arch::release_stem(version, arch)));

    tracing::info!(%url, "downloading release");
    host.download(&url, &archive)?;

    let size = std::fs::metadata(&archive).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(ProvisionError::Download {
            url,
            reason: "archive is empty".into(),
        });
    }

    let extracted = extract_binary(&archive, workdir.path()).map_err(|reason| {
        ProvisionError::Download {
            url: url.clone(),
            reason,
        }
    })?;

    io::install_executable(&extracted, install_path)?;
    if !io::is_executable(install_path) {
        return Err(ProvisionError::Download {
            url,
            reason: format!("{} is not executable after install", install_path.display()),
        });
    }

    tracing::info!(path = %install_path.display(), bytes = size, "installed binary");
    Ok(install_path.to_path_buf())
}

/// Find the daemon executable inside a `.tar.gz` and unpack it into `dest_dir`.
///
/// Errors are returned as display strings so the caller can attach the URL.
fn extract_binary(archive: &Path, dest_dir: &Path) -> std::result::Result<PathBuf, String> {
    let file = File::open(archive).map_err(|e| e.to_string())?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    let entries = tar
        .entries()
        .map_err(|e| format!("not a readable tar.gz: {e}"))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| format!("corrupt archive entry: {e}"))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let is_binary = entry
            .path()
            .ok()
            .and_then(|p| p.file_name().map(|n| n == paths::BINARY_NAME))
            .unwrap_or(false);
        if is_binary {
            let out = dest_dir.join(paths::BINARY_NAME);
            entry
                .unpack(&out)
                .map_err(|e| format!("failed to unpack {}: {e}", paths::BINARY_NAME))?;
            return Ok(out);
        }
    }

    Err(format!("archive does not contain `{}`", paths::BINARY_NAME))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};

    /// Build a release-shaped `.tar.gz` holding `files` under `<stem>/`.
    pub(crate) fn build_archive(stem: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{stem}/{name}"), *data)
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn extracts_binary_from_nested_directory() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("r.tar.gz");
        std::fs::write(
            &archive,
            build_archive(
                "sing-box-1.12.0-linux-amd64",
                &[("LICENSE", b"text".as_slice()), ("sing-box", b"\x7fELF".as_slice())],
            ),
        )
        .unwrap();

        let out = extract_binary(&archive, dir.path()).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"\x7fELF");
    }

    #[test]
    fn missing_binary_is_reported() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("r.tar.gz");
        std::fs::write(&archive, build_archive("x", &[("README.md", b"hi".as_slice())])).unwrap();

        let err = extract_binary(&archive, dir.path()).unwrap_err();
        assert!(err.contains("does not contain"));
    }

    #[test]
    fn garbage_is_not_extractable() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("r.tar.gz");
        std::fs::write(&archive, b"<html>rate limited</html>").unwrap();
        assert!(extract_binary(&archive, dir.path()).is_err());
    }
}
