// 📁 Output - run-dated folders, artifact files, checksum manifest
//
// <root>/<YYMMDD>-<n>/<YYMMDD>_<artifact>
//
// n is the smallest suffix not already taken and files are opened with
// create_new, so an earlier run's output is never overwritten.

use crate::error::EmitError;
use crate::generate::Artifact;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CHECKSUM_FILE_NAME: &str = "checksums.sha256";

/// "240301" for 2024-03-01
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct RunDirectory {
    pub path: PathBuf,
    pub stamp: String,

    /// (file name, sha256) in write order
    written: Vec<(String, String)>,
}

/// Create the next free `<YYMMDD>-<n>` folder below `root`
pub fn create_run_directory(root: &Path, date: NaiveDate) -> Result<RunDirectory, EmitError> {
    fs::create_dir_all(root).map_err(|e| EmitError::unwritable(root, e))?;

    let stamp = date_stamp(date);
    let mut n = 1;
    loop {
        let path = root.join(format!("{}-{}", stamp, n));
        match fs::create_dir(&path) {
            Ok(()) => {
                info!(path = %path.display(), "run directory created");
                return Ok(RunDirectory {
                    path,
                    stamp,
                    written: Vec::new(),
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(EmitError::unwritable(path, e)),
        }
    }
}

impl RunDirectory {
    /// Date-prefixed name for a file in this run
    pub fn file_name(&self, name: &str) -> String {
        format!("{}_{}", self.stamp, name)
    }

    pub fn write(&mut self, artifact: &Artifact) -> Result<PathBuf, EmitError> {
        self.write_bytes(&artifact.file_name, &artifact.bytes)
    }

    pub fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf, EmitError> {
        let file_name = self.file_name(name);
        let path = self.path.join(&file_name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| EmitError::unwritable(&path, e))?;
        file.write_all(bytes).map_err(|e| EmitError::unwritable(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), "artifact written");
        self.written.push((file_name, sha256_hex(bytes)));
        Ok(path)
    }

    /// `<sha256>  <file>` for every file written so far
    pub fn write_checksums(&self) -> Result<PathBuf, EmitError> {
        let manifest: String = self
            .written
            .iter()
            .map(|(name, hash)| format!("{}  {}\n", hash, name))
            .collect();

        let path = self.path.join(CHECKSUM_FILE_NAME);
        fs::write(&path, manifest).map_err(|e| EmitError::unwritable(&path, e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::ArtifactFormat;
    use tempfile::tempdir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_run_directories_never_collide() {
        let root = tempdir().unwrap();

        let first = create_run_directory(root.path(), date()).unwrap();
        let second = create_run_directory(root.path(), date()).unwrap();

        assert!(first.path.ends_with("240301-1"));
        assert!(second.path.ends_with("240301-2"));
    }

    #[test]
    fn test_write_prefixes_and_checksums() {
        let root = tempdir().unwrap();
        let mut run = create_run_directory(root.path(), date()).unwrap();

        let artifact = Artifact {
            format: ArtifactFormat::PanelGenes,
            file_name: "genepanels.tsv".to_string(),
            bytes: b"panel_id\n".to_vec(),
        };
        let path = run.write(&artifact).unwrap();
        assert!(path.ends_with("240301_genepanels.tsv"));

        let manifest = fs::read_to_string(run.write_checksums().unwrap()).unwrap();
        assert_eq!(manifest, format!("{}  240301_genepanels.tsv\n", sha256_hex(b"panel_id\n")));
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let root = tempdir().unwrap();
        let mut run = create_run_directory(root.path(), date()).unwrap();

        run.write_bytes("g2t.tsv", b"first").unwrap();
        let err = run.write_bytes("g2t.tsv", b"second").unwrap_err();

        assert!(matches!(err, EmitError::UnwritableDestination { .. }));
        assert_eq!(fs::read(run.path.join("240301_g2t.tsv")).unwrap(), b"first");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
