//! CPU architecture detection and release asset naming.

use crate::error::{ProvisionError, Result};
use std::fmt;

/// Architectures with a published `linux-<asset>` release archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Arm64,
    Armv7,
    I386,
    S390x,
}

impl Arch {
    /// Map a `uname -m` identifier onto a supported architecture.
    ///
    /// There is deliberately no fallback asset: an unknown identifier is fatal.
    pub fn from_machine(machine: &str) -> Result<Self> {
        match machine.trim() {
            "x86_64" | "amd64" => Ok(Arch::Amd64),
            "aarch64" | "arm64" => Ok(Arch::Arm64),
            "armv7l" | "armv7" => Ok(Arch::Armv7),
            "i386" | "i686" => Ok(Arch::I386),
            "s390x" => Ok(Arch::S390x),
            other => Err(ProvisionError::UnsupportedArchitecture(other.to_string())),
        }
    }

    /// Suffix used by the vendor's release asset names.
    pub fn asset_name(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::Armv7 => "armv7",
            Arch::I386 => "386",
            Arch::S390x => "s390x",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_name())
    }
}

/// Base name of the release archive and of the directory inside it.
pub fn release_stem(version: &str, arch: Arch) -> String {
    format!("sing-box-{version}-linux-{}", arch.asset_name())
}

/// Version-pinned download URL for the release archive.
pub fn release_url(version: &str, arch: Arch) -> String {
    format!(
        "https://github.com/SagerNet/sing-box/releases/download/v{version}/{}.tar.gz",
        release_stem(version, arch)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_identifier_maps_to_one_asset() {
        let cases = [
            ("x86_64", "amd64"),
            ("amd64", "amd64"),
            ("aarch64", "arm64"),
            ("arm64", "arm64"),
            ("armv7l", "armv7"),
            ("armv7", "armv7"),
            ("i386", "386"),
            ("i686", "386"),
            ("s390x", "s390x"),
        ];
        for (machine, asset) in cases {
            assert_eq!(
                Arch::from_machine(machine).unwrap().asset_name(),
                asset,
                "identifier {machine}"
            );
        }
    }

    #[test]
    fn trailing_newline_from_uname_is_ignored() {
        assert_eq!(Arch::from_machine("x86_64\n").unwrap(), Arch::Amd64);
    }

    #[test]
    fn unknown_identifiers_are_unsupported() {
        for machine in ["riscv64", "mips", "ppc64le", ""] {
            let err = Arch::from_machine(machine).unwrap_err();
            assert!(
                matches!(err, ProvisionError::UnsupportedArchitecture(ref m) if m == machine),
                "identifier {machine:?}"
            );
        }
    }

    #[test]
    fn release_url_is_version_pinned() {
        assert_eq!(
            release_url("1.12.0", Arch::Amd64),
            "https://github.com/SagerNet/sing-box/releases/download/v1.12.0/sing-box-1.12.0-linux-amd64.tar.gz"
        );
    }
}
