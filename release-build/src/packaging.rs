//! Release archive creation.
//!
//! Wraps one verified artifact into the target's archive format and records
//! the archive's SHA-256 digest. Archives are written to a temporary file in
//! the release directory and renamed into place, so an interrupted run never
//! leaves a truncated archive under the final name and reruns overwrite
//! cleanly.

use crate::error::{ReleaseError, Result};
use crate::naming::ArchiveName;
use crate::packaging_error::PackagingError;
use crate::target::{ArchiveFormat, TargetDescriptor};
use crate::version::ReleaseVersion;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use tempfile::NamedTempFile;

/// Permissions recorded for the artifact inside zip archives.
const ZIP_ENTRY_MODE: u32 = 0o755;

/// xz preset used for tar archives.
const XZ_LEVEL: u32 = 6;

/// A finished release archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    /// The artifact that was packaged.
    pub source_artifact: Utf8PathBuf,
    /// The archive that was written.
    pub output_archive: Utf8PathBuf,
    /// Archive container.
    pub format: ArchiveFormat,
    /// Lowercase hex SHA-256 of the archive.
    pub sha256: String,
}

/// Writes release archives into one output directory.
#[derive(Debug, Clone)]
pub struct Packager {
    output_dir: Utf8PathBuf,
}

impl Packager {
    /// Create a packager writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Return the directory archives are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Return where the archive for `target` will be written.
    #[must_use]
    pub fn archive_path(
        &self,
        target: &TargetDescriptor,
        version: &ReleaseVersion,
        base_name: &str,
    ) -> Utf8PathBuf {
        self.output_dir.join(ArchiveName::new(base_name, version, target).filename())
    }

    /// Package `artifact` for `target`.
    ///
    /// The archive holds the artifact under its own filename and replaces any
    /// archive of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::PackagingFailed`] if the artifact is missing or
    /// the archive cannot be written.
    pub fn package(
        &self,
        artifact: &Utf8Path,
        target: &TargetDescriptor,
        version: &ReleaseVersion,
        base_name: &str,
    ) -> Result<PackageRecord> {
        let archive = self.archive_path(target, version, base_name);
        let sha256 = self
            .write_archive(artifact, target.archive_format, &archive)
            .map_err(|source| ReleaseError::PackagingFailed {
                archive: archive.clone(),
                source,
            })?;
        log::debug!("{target}: wrote {archive} (sha256 {sha256})");

        Ok(PackageRecord {
            source_artifact: artifact.to_owned(),
            output_archive: archive,
            format: target.archive_format,
            sha256,
        })
    }

    fn write_archive(
        &self,
        artifact: &Utf8Path,
        format: ArchiveFormat,
        archive: &Utf8Path,
    ) -> std::result::Result<String, PackagingError> {
        if !artifact.is_file() {
            return Err(PackagingError::MissingArtifact(artifact.to_owned()));
        }
        let entry_name = artifact
            .file_name()
            .ok_or_else(|| PackagingError::InvalidArtifactPath(artifact.to_owned()))?;

        fs::create_dir_all(&self.output_dir)?;
        let staged = NamedTempFile::new_in(&self.output_dir)?;
        let file = staged.reopen()?;
        match format {
            ArchiveFormat::TarXz => write_tar_xz(file, artifact, entry_name)?,
            ArchiveFormat::Zip => write_zip(file, artifact, entry_name)?,
        }
        staged.persist(archive).map_err(|err| err.error)?;

        compute_sha256(archive)
    }
}

/// Compute the lowercase hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns [`PackagingError::Io`] if the file cannot be read.
pub fn compute_sha256(path: &Utf8Path) -> std::result::Result<String, PackagingError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_tar_xz(
    file: fs::File,
    artifact: &Utf8Path,
    entry_name: &str,
) -> std::result::Result<(), PackagingError> {
    let encoder = xz2::write::XzEncoder::new(file, XZ_LEVEL);
    let mut archive = tar::Builder::new(encoder);
    archive.append_path_with_name(artifact, entry_name)?;
    let encoder = archive.into_inner()?;
    encoder.finish()?.sync_all()?;
    Ok(())
}

fn write_zip(
    file: fs::File,
    artifact: &Utf8Path,
    entry_name: &str,
) -> std::result::Result<(), PackagingError> {
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(ZIP_ENTRY_MODE);
    zip.start_file(entry_name, options)?;
    let mut source = fs::File::open(artifact)?;
    io::copy(&mut source, &mut zip)?;
    let mut file = zip.finish()?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
