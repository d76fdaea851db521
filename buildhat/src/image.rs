//! Firmware assets uploaded to the Build HAT.
//!
//! A bundle is the firmware image plus its detached signature. Both are
//! opaque bytes; the bootloader verifies the signature itself after the
//! upload.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};

/// Firmware file name inside an asset directory.
pub const FIRMWARE_FILE: &str = "firmware.bin";

/// Signature file name inside an asset directory.
pub const SIGNATURE_FILE: &str = "signature.bin";

/// Asset directory used when none is given.
pub const DEFAULT_DIR: &str = "data";

/// Firmware image and signature, loaded fully into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareBundle {
    firmware: Vec<u8>,
    signature: Vec<u8>,
}

impl FirmwareBundle {
    /// Build a bundle from in-memory buffers.
    ///
    /// Empty buffers are rejected; the bootloader would accept a zero-length
    /// `load` and then fail signature verification after reboot.
    pub fn new(firmware: Vec<u8>, signature: Vec<u8>) -> Result<Self> {
        ensure_not_empty(Path::new(FIRMWARE_FILE), &firmware)?;
        ensure_not_empty(Path::new(SIGNATURE_FILE), &signature)?;
        Ok(Self {
            firmware,
            signature,
        })
    }

    /// Load firmware and signature from two explicit paths.
    pub fn from_files<F, S>(firmware: F, signature: S) -> Result<Self>
    where
        F: AsRef<Path>,
        S: AsRef<Path>,
    {
        let firmware_path = firmware.as_ref();
        let signature_path = signature.as_ref();

        let firmware = read_asset(firmware_path)?;
        let signature = read_asset(signature_path)?;
        ensure_not_empty(firmware_path, &firmware)?;
        ensure_not_empty(signature_path, &signature)?;

        Ok(Self {
            firmware,
            signature,
        })
    }

    /// Load `firmware.bin` and `signature.bin` from `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Self::from_files(dir.join(FIRMWARE_FILE), dir.join(SIGNATURE_FILE))
    }

    /// Firmware image bytes.
    pub fn firmware(&self) -> &[u8] {
        &self.firmware
    }

    /// Signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

fn read_asset(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading asset {}", path.display());
    fs::read(path).map_err(|source| Error::AssetRead {
        path: PathBuf::from(path),
        source,
    })
}

fn ensure_not_empty(path: &Path, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::AssetRead {
            path: PathBuf::from(path),
            source: io::Error::new(io::ErrorKind::InvalidData, "asset is empty"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_assets(dir: &Path, firmware: &[u8], signature: &[u8]) {
        fs::write(dir.join(FIRMWARE_FILE), firmware).unwrap();
        fs::write(dir.join(SIGNATURE_FILE), signature).unwrap();
    }

    #[test]
    fn test_from_dir_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path(), &[1, 2, 3, 4], &[0xAA; 64]);

        let bundle = FirmwareBundle::from_dir(dir.path()).unwrap();
        assert_eq!(bundle.firmware(), &[1, 2, 3, 4]);
        assert_eq!(bundle.signature().len(), 64);
    }

    #[test]
    fn test_missing_signature_names_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FIRMWARE_FILE), [1u8]).unwrap();

        let err = FirmwareBundle::from_dir(dir.path()).unwrap_err();
        match err {
            Error::AssetRead { path, source } => {
                assert!(path.ends_with(SIGNATURE_FILE));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_firmware_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path(), &[], &[1]);

        let err = FirmwareBundle::from_dir(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::AssetRead { ref source, .. } if source.kind() == io::ErrorKind::InvalidData
        ));
    }

    #[test]
    fn test_new_rejects_empty_signature() {
        assert!(FirmwareBundle::new(vec![1], Vec::new()).is_err());
        assert!(FirmwareBundle::new(vec![1], vec![2]).is_ok());
    }

    #[test]
    fn test_from_files_accepts_arbitrary_names() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("fw-1.2.bin");
        let sig = dir.path().join("fw-1.2.sig");
        fs::write(&fw, [9u8; 10]).unwrap();
        fs::write(&sig, [8u8; 3]).unwrap();

        let bundle = FirmwareBundle::from_files(&fw, &sig).unwrap();
        assert_eq!(bundle.firmware().len(), 10);
        assert_eq!(bundle.signature(), &[8, 8, 8]);
    }
}
