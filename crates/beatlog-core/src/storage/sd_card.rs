use embedded_sdmmc::{BlockDevice, Mode, TimeSource, VolumeIdx, VolumeManager};

use super::{LOG_FILE_NAME, LOG_HEADER, LogSink, StorageError};
use crate::diagnostic::diagnostic;

/// BPM log stored as a text file in the root directory of a FAT volume.
///
/// Every operation opens the volume, the root directory and the file, writes,
/// and closes all three again. Nothing stays open between calls.
pub struct SdCardLog<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    volume_mgr: VolumeManager<D, T, 4, 4, 1>,
    file_name: &'static str,
}

impl<D, T> SdCardLog<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    /// Create a log writing [`LOG_FILE_NAME`] on the first volume of `device`.
    pub fn new(device: D, time_source: T) -> Self {
        Self::with_file_name(device, time_source, LOG_FILE_NAME)
    }

    /// Create a log writing `file_name` (an 8.3 name) instead.
    pub fn with_file_name(device: D, time_source: T, file_name: &'static str) -> Self {
        Self {
            volume_mgr: VolumeManager::new(device, time_source),
            file_name,
        }
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    /// Appends `parts` to the log file, or does nothing when `only_if_empty`
    /// is set and the file already has content.
    fn append(&self, parts: &[&[u8]], only_if_empty: bool) -> Result<(), StorageError> {
        let unavailable = |e: embedded_sdmmc::Error<D::Error>| {
            StorageError::Unavailable(diagnostic(format_args!("{:?}", e)))
        };
        let write_failed = |e: embedded_sdmmc::Error<D::Error>| {
            StorageError::Write(diagnostic(format_args!("{:?}", e)))
        };

        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(unavailable)?;

        let root_dir = volume0.open_root_dir().map_err(unavailable)?;

        let file = root_dir
            .open_file_in_dir(self.file_name, Mode::ReadWriteCreateOrAppend)
            .map_err(unavailable)?;

        if !only_if_empty || file.length() == 0 {
            for part in parts {
                file.write(part).map_err(write_failed)?;
            }
        }

        // Close explicitly so a failed directory update is reported
        file.close().map_err(write_failed)?;
        root_dir.close().map_err(write_failed)?;
        volume0.close().map_err(write_failed)?;

        Ok(())
    }
}

impl<D, T> LogSink for SdCardLog<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    fn ensure_header(&mut self) -> Result<(), StorageError> {
        self.append(&[LOG_HEADER.as_bytes(), b"\n"], true)
    }

    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        self.append(&[line.as_bytes(), b"\n"], false)
    }
}
