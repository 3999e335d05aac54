//! Library version query.

use std::fmt;

const GIT_TAG: &str = env!("IIO_GIT_TAG");

/// Library version with a short build tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// NUL-terminated build tag, at most 7 characters.
    pub tag: [u8; 8],
}

impl Version {
    /// Build tag as text.
    pub fn tag_str(&self) -> &str {
        let end = self.tag.iter().position(|&b| b == 0).unwrap_or(self.tag.len());
        std::str::from_utf8(&self.tag[..end]).unwrap_or("")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} ({})", self.major, self.minor, self.tag_str())
    }
}

fn tag_bytes(tag: &str) -> [u8; 8] {
    let mut out = [0u8; 8];
    let len = tag.len().min(out.len() - 1);
    out[..len].copy_from_slice(&tag.as_bytes()[..len]);
    out
}

/// Version of this library.
pub fn library_version() -> Version {
    Version {
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        tag: tag_bytes(GIT_TAG),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_package() {
        let version = library_version();
        assert_eq!(version.major.to_string(), env!("CARGO_PKG_VERSION_MAJOR"));
        assert_eq!(version.minor.to_string(), env!("CARGO_PKG_VERSION_MINOR"));
        assert_eq!(version.tag[7], 0);
        assert!(!version.tag_str().is_empty());
    }

    #[test]
    fn test_tag_truncated_and_terminated() {
        let tag = tag_bytes("0123456789abcdef");
        assert_eq!(&tag, b"0123456\0");
        assert_eq!(&tag_bytes("abc")[..4], b"abc\0");
    }
}
