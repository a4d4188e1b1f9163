//! File output for normalization results.
//!
//! Handles writing reports with optional compression.

use std::path::{Path, PathBuf};

use tabnorm_core::{NormalizeError, Result};

/// Writes a text report, compressing it when requested.
///
/// Compressed output gets a `.zst` suffix appended to `path`. Returns the
/// path actually written.
pub async fn save_report(contents: &str, path: &Path, compress: bool) -> Result<PathBuf> {
    if compress {
        #[cfg(feature = "compression")]
        {
            let mut target = path.as_os_str().to_owned();
            target.push(".zst");
            let target = PathBuf::from(target);
            save_compressed(contents, &target).await?;
            Ok(target)
        }
        #[cfg(not(feature = "compression"))]
        {
            Err(NormalizeError::configuration(
                "Compression not available. Compile with --features compression",
            ))
        }
    } else {
        save_text(contents, path).await?;
        Ok(path.to_path_buf())
    }
}

/// Writes text to a file.
pub async fn save_text(contents: &str, path: &Path) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| NormalizeError::io(format!("Failed to write to {}", path.display()), e))
}

/// Saves zstd-compressed text.
#[cfg(feature = "compression")]
async fn save_compressed(contents: &str, path: &Path) -> Result<()> {
    let compressed = zstd::encode_all(contents.as_bytes(), 3)
        .map_err(|e| NormalizeError::io("Compression failed", e))?;

    tokio::fs::write(path, compressed).await.map_err(|e| {
        NormalizeError::io(
            format!("Failed to write compressed file to {}", path.display()),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_plain_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let written = save_report("{}", &path, false).await.unwrap();
        assert_eq!(written, path);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "{}");
    }

    #[cfg(feature = "compression")]
    #[tokio::test]
    async fn test_save_compressed_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let written = save_report("{\"a\": 1}", &path, true).await.unwrap();
        assert_eq!(written, dir.path().join("report.json.zst"));

        let bytes = std::fs::read(&written).unwrap();
        let decoded = zstd::decode_all(bytes.as_slice()).unwrap();
        assert_eq!(decoded, b"{\"a\": 1}");
    }

    #[cfg(not(feature = "compression"))]
    #[tokio::test]
    async fn test_compression_requires_feature() {
        let dir = tempfile::tempdir().unwrap();
        let error = save_report("{}", &dir.path().join("r.json"), true)
            .await
            .unwrap_err();
        assert!(matches!(error, NormalizeError::Configuration { .. }));
    }
}
