//! Fixed-capacity table of opened contents.
//!
//! The slot index is the handle the guest sees, so entries never move and the
//! table never grows: its capacity is the firmware's content descriptor pool.

use crate::title::{content_path, Content, TmdReader};
use ios_fs::{Fd, FileSystem, Mode, SeekMode};
use ipc_abi::{FsError, IosError, IosResult, PID_KERNEL};
use std::sync::Arc;

/// One slot of the table. Either fully empty (`Default`) or fully populated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenedContent {
    pub opened: bool,
    pub fd: Option<Fd>,
    pub content: Content,
    pub title_id: u64,
    pub uid: u32,
}

pub struct ContentTable {
    entries: Vec<OpenedContent>,
    fs: Arc<dyn FileSystem>,
}

impl ContentTable {
    pub fn new(capacity: usize, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            entries: vec![OpenedContent::default(); capacity],
            fs,
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|e| e.opened).count()
    }

    pub fn entry(&self, cfd: u32) -> Option<&OpenedContent> {
        self.entries.get(cfd as usize)
    }

    /// Opens content `content_index` of `tmd` on behalf of `uid`.
    ///
    /// Returns the handle (slot index). The table is left untouched on error.
    pub fn open(&mut self, tmd: &dyn TmdReader, content_index: u16, uid: u32) -> IosResult<u32> {
        let title_id = tmd.title_id();
        let content = tmd.content(content_index).ok_or(IosError::InvalidArgument)?;

        let Some(cfd) = self.entries.iter().position(|e| !e.opened) else {
            log::debug!("open_content: table full (title {title_id:016x})");
            return Err(IosError::ResourceExhausted);
        };

        let fd = self
            .fs
            .open_file(PID_KERNEL, 0, &content_path(title_id, &content), Mode::Read)?;

        self.entries[cfd] = OpenedContent {
            opened: true,
            fd: Some(fd),
            content,
            title_id,
            uid,
        };
        log::info!("open_content: title ID {title_id:016x}, UID {uid:#x}, CFD {cfd}");
        Ok(cfd as u32)
    }

    pub fn read(&mut self, cfd: u32, buffer: &mut [u8], uid: u32) -> IosResult<u32> {
        let fd = self.guard(cfd, uid)?;
        Ok(self.fs.read_bytes(fd, buffer)?)
    }

    /// `mode` is the guest's raw seek origin; unknown origins fail like the
    /// filesystem would.
    pub fn seek(&mut self, cfd: u32, offset: u32, mode: u32, uid: u32) -> IosResult<u32> {
        let fd = self.guard(cfd, uid)?;
        let mode = SeekMode::from_u32(mode).ok_or(FsError::Invalid)?;
        Ok(self.fs.seek(fd, offset, mode)?)
    }

    pub fn close(&mut self, cfd: u32, uid: u32) -> IosResult<()> {
        let fd = self.guard(cfd, uid)?;
        self.release(cfd as usize, fd);
        log::info!("close_content: CFD {cfd}");
        Ok(())
    }

    /// Closes every open entry, e.g. after a state load.
    pub fn reset(&mut self) {
        for cfd in 0..self.entries.len() {
            if let Some(fd) = self.entries[cfd].fd {
                self.release(cfd, fd);
            }
        }
    }

    fn release(&mut self, cfd: usize, fd: Fd) {
        if let Err(err) = self.fs.close(fd) {
            log::warn!("close_content: CFD {cfd} backing fd {} failed to close: {err}", fd.0);
        }
        self.entries[cfd] = OpenedContent::default();
    }

    /// Range, then ownership, then opened-state.
    fn guard(&self, cfd: u32, uid: u32) -> IosResult<Fd> {
        let entry = self.entry(cfd).ok_or(IosError::InvalidArgument)?;
        if entry.uid != uid {
            log::debug!("CFD {cfd}: UID {uid:#x} does not own it (owner {:#x})", entry.uid);
            return Err(IosError::AccessDenied);
        }
        match entry.fd {
            Some(fd) if entry.opened => Ok(fd),
            _ => Err(IosError::InvalidState),
        }
    }
}
