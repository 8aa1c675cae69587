//! Filesystem transport backing opened content.
//!
//! Devices never touch host files directly: they open paths through a
//! [`FileSystem`] and keep the returned [`Fd`]. [`NandFs`] is the in-memory
//! NAND used by tools and tests; it has the same finite handle pool as the
//! real filesystem module.

use ipc_abi::FsError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Convenience result alias for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Number of files the NAND filesystem can keep open at once.
pub const MAX_OPEN_FILES: usize = 16;
/// Longest accepted absolute path.
pub const MAX_PATH_LENGTH: usize = 64;

/// Handle to an open file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fd(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
    ReadWrite,
}

impl Mode {
    fn can_read(self) -> bool {
        matches!(self, Mode::Read | Mode::ReadWrite)
    }
}

/// Origin of a seek.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekMode {
    Set = 0,
    Current = 1,
    End = 2,
}

impl SeekMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(SeekMode::Set),
            1 => Some(SeekMode::Current),
            2 => Some(SeekMode::End),
            _ => None,
        }
    }
}

/// Byte-stream storage consumed by devices.
pub trait FileSystem: Send + Sync {
    fn open_file(&self, uid: u32, gid: u16, path: &str, mode: Mode) -> FsResult<Fd>;

    /// Reads into `buf` from the current position; returns the byte count.
    fn read_bytes(&self, fd: Fd, buf: &mut [u8]) -> FsResult<u32>;

    /// Moves the position; returns the new absolute offset.
    fn seek(&self, fd: Fd, offset: u32, mode: SeekMode) -> FsResult<u32>;

    fn close(&self, fd: Fd) -> FsResult<()>;

    /// Reads a whole file without consuming a handle.
    fn read_file(&self, path: &str) -> FsResult<Vec<u8>>;

    /// Creates or replaces a whole file.
    fn write_file(&self, path: &str, bytes: &[u8]) -> FsResult<()>;
}

struct OpenFile {
    data: Arc<[u8]>,
    mode: Mode,
    position: u32,
}

struct NandState {
    files: HashMap<String, Arc<[u8]>>,
    handles: Vec<Option<OpenFile>>,
}

impl NandState {
    fn handle_mut(&mut self, fd: Fd) -> FsResult<&mut OpenFile> {
        self.handles
            .get_mut(fd.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(FsError::Invalid)
    }
}

/// In-memory NAND filesystem.
pub struct NandFs {
    state: Mutex<NandState>,
}

impl NandFs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(NandState {
                files: HashMap::new(),
                handles: (0..MAX_OPEN_FILES).map(|_| None).collect(),
            }),
        }
    }

    /// Number of handles currently in use.
    pub fn open_handles(&self) -> usize {
        self.state.lock().handles.iter().flatten().count()
    }

    fn check_path(path: &str) -> FsResult<()> {
        if !path.starts_with('/') {
            return Err(FsError::Invalid);
        }
        if path.len() > MAX_PATH_LENGTH {
            return Err(FsError::NameTooLong);
        }
        Ok(())
    }
}

impl Default for NandFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for NandFs {
    fn open_file(&self, uid: u32, gid: u16, path: &str, mode: Mode) -> FsResult<Fd> {
        Self::check_path(path)?;
        let mut state = self.state.lock();
        let data = state.files.get(path).cloned().ok_or(FsError::NotFound)?;
        let slot = state
            .handles
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::NoFreeHandle)?;
        state.handles[slot] = Some(OpenFile {
            data,
            mode,
            position: 0,
        });
        log::trace!("fs: open {path} uid={uid:#x} gid={gid:#x} mode={mode:?} fd={slot}");
        Ok(Fd(slot as u32))
    }

    fn read_bytes(&self, fd: Fd, buf: &mut [u8]) -> FsResult<u32> {
        let mut state = self.state.lock();
        let file = state.handle_mut(fd)?;
        if !file.mode.can_read() {
            return Err(FsError::AccessDenied);
        }
        let start = (file.position as usize).min(file.data.len());
        let count = buf.len().min(file.data.len() - start);
        buf[..count].copy_from_slice(&file.data[start..start + count]);
        file.position = (start + count) as u32;
        Ok(count as u32)
    }

    fn seek(&self, fd: Fd, offset: u32, mode: SeekMode) -> FsResult<u32> {
        let mut state = self.state.lock();
        let file = state.handle_mut(fd)?;
        let size = file.data.len() as u64;
        let base = match mode {
            SeekMode::Set => 0,
            SeekMode::Current => u64::from(file.position),
            SeekMode::End => size,
        };
        let target = base + u64::from(offset);
        if target > size {
            return Err(FsError::Invalid);
        }
        file.position = target as u32;
        Ok(file.position)
    }

    fn close(&self, fd: Fd) -> FsResult<()> {
        let mut state = self.state.lock();
        let slot = state
            .handles
            .get_mut(fd.0 as usize)
            .ok_or(FsError::Invalid)?;
        if slot.take().is_none() {
            return Err(FsError::Invalid);
        }
        Ok(())
    }

    fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        Self::check_path(path)?;
        let state = self.state.lock();
        state
            .files
            .get(path)
            .map(|data| data.to_vec())
            .ok_or(FsError::NotFound)
    }

    fn write_file(&self, path: &str, bytes: &[u8]) -> FsResult<()> {
        Self::check_path(path)?;
        self.state
            .lock()
            .files
            .insert(path.to_owned(), Arc::from(bytes));
        Ok(())
    }
}
