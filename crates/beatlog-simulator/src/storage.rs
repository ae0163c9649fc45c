//! Host log media: a plain text file, or a FAT disk image behind `SdCardLog`

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use beatlog_core::diagnostic::diagnostic;
use beatlog_core::storage::LOG_HEADER;
use beatlog_core::{LogSink, StorageError};
use embedded_sdmmc::{Block, BlockCount, BlockDevice, BlockIdx};

/// BPM log kept in a regular host file.
///
/// Like the card log, the file is opened and closed on every call.
#[derive(Debug, Clone)]
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, StorageError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                StorageError::Unavailable(diagnostic(format_args!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            })
    }
}

fn write_error(e: io::Error) -> StorageError {
    StorageError::Write(diagnostic(format_args!("{}", e)))
}

impl LogSink for FileLog {
    fn ensure_header(&mut self) -> Result<(), StorageError> {
        let mut file = self.open()?;
        let len = file.metadata().map_err(write_error)?.len();
        if len == 0 {
            writeln!(file, "{}", LOG_HEADER).map_err(write_error)?;
            file.sync_data().map_err(write_error)?;
        }
        Ok(())
    }

    fn append_line(&mut self, line: &str) -> Result<(), StorageError> {
        let mut file = self.open()?;
        writeln!(file, "{}", line).map_err(write_error)?;
        file.sync_data().map_err(write_error)
    }
}

/// A disk image file exposed as an SD card block device.
///
/// The image must already hold a FAT16/FAT32 volume (for example one made
/// with `mkfs.vfat`).
pub struct FileBlockDevice {
    file: RefCell<File>,
    blocks: u32,
}

impl FileBlockDevice {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let blocks = u32::try_from(file.metadata()?.len() / Block::LEN as u64)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "image too large"))?;
        Ok(Self {
            file: RefCell::new(file),
            blocks,
        })
    }

    fn seek_to(file: &mut File, idx: BlockIdx) -> io::Result<()> {
        file.seek(SeekFrom::Start(u64::from(idx.0) * Block::LEN as u64))?;
        Ok(())
    }
}

impl BlockDevice for FileBlockDevice {
    type Error = io::Error;

    fn read(&self, blocks: &mut [Block], start_block_idx: BlockIdx) -> io::Result<()> {
        let mut file = self.file.borrow_mut();
        Self::seek_to(&mut file, start_block_idx)?;
        for block in blocks.iter_mut() {
            file.read_exact(&mut block.contents)?;
        }
        Ok(())
    }

    fn write(&self, blocks: &[Block], start_block_idx: BlockIdx) -> io::Result<()> {
        let mut file = self.file.borrow_mut();
        Self::seek_to(&mut file, start_block_idx)?;
        for block in blocks {
            file.write_all(&block.contents)?;
        }
        file.flush()
    }

    fn num_blocks(&self) -> io::Result<BlockCount> {
        Ok(BlockCount(self.blocks))
    }
}
