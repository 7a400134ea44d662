use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An uploaded executable, as listed by `GET /jars` or `GET /binaries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JarInfo {
    /// Alias the artifact was uploaded under.
    pub name: String,
    pub uploaded_at: DateTime<FixedOffset>,
    /// Only reported by the `/binaries` listing.
    pub binary_type: Option<String>,
}

impl std::fmt::Display for JarInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.uploaded_at.to_rfc3339())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryType {
    Jar,
    Egg,
    Wheel,
}

impl BinaryType {
    pub fn content_type(&self) -> &'static str {
        match self {
            BinaryType::Jar => "application/java-archive",
            BinaryType::Egg => "application/python-egg",
            BinaryType::Wheel => "application/python-wheel",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jar" => Some(BinaryType::Jar),
            "egg" => Some(BinaryType::Egg),
            "whl" => Some(BinaryType::Wheel),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Server-side location of a file uploaded through `POST /data/{prefix}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFile {
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_type_from_path() {
        assert_eq!(BinaryType::from_path(Path::new("/tmp/app.jar")), Some(BinaryType::Jar));
        assert_eq!(BinaryType::from_path(Path::new("lib.EGG")), Some(BinaryType::Egg));
        assert_eq!(BinaryType::from_path(Path::new("pkg.whl")), Some(BinaryType::Wheel));
        assert_eq!(BinaryType::from_path(Path::new("notes.txt")), None);
        assert_eq!(BinaryType::from_path(Path::new("jar")), None);
    }
}
