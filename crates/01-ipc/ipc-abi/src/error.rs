//! Guest-visible error taxonomy and the signed return codes it maps onto.
//!
//! Nothing in this layer is fatal: every failure becomes a [`ReturnCode`]
//! handed back to the guest, which is expected to cope with it the same way it
//! copes with real hardware failures.

use thiserror::Error;

/// Convenience result alias for operations that fail with an [`IosError`].
pub type IosResult<T, E = IosError> = Result<T, E>;

/// Signed reply codes understood by guest software.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Success = 0,
    IpcEacces = -1,
    IpcEexist = -2,
    IpcEinval = -4,
    IpcEmax = -5,
    IpcEnoent = -6,
    FsEinval = -101,
    FsEaccess = -102,
    FsEcorrupt = -103,
    FsEexist = -105,
    FsEnoent = -106,
    FsEnfile = -107,
    FsEfbig = -108,
    FsEfdexhausted = -109,
    FsEnamelen = -110,
    FsEbusy = -114,
    EsEinval = -1017,
    EsEacces = -1026,
}

impl ReturnCode {
    /// Raw value written into the reply.
    #[inline]
    pub fn raw(self) -> i32 {
        self as i32
    }
}

impl From<ReturnCode> for i32 {
    fn from(code: ReturnCode) -> Self {
        code.raw()
    }
}

/// Errors raised by the filesystem transport backing opened resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("invalid argument")]
    Invalid,
    #[error("access denied")]
    AccessDenied,
    #[error("filesystem corrupted")]
    Corrupt,
    #[error("already exists")]
    AlreadyExists,
    #[error("no such file")]
    NotFound,
    #[error("too many files open")]
    TooManyFilesOpen,
    #[error("file too big")]
    FileTooBig,
    #[error("no free handle")]
    NoFreeHandle,
    #[error("path too long")]
    NameTooLong,
    #[error("resource in use")]
    InUse,
}

impl FsError {
    /// Translates the transport error into the code the guest expects.
    pub fn return_code(self) -> ReturnCode {
        match self {
            FsError::Invalid => ReturnCode::FsEinval,
            FsError::AccessDenied => ReturnCode::FsEaccess,
            FsError::Corrupt => ReturnCode::FsEcorrupt,
            FsError::AlreadyExists => ReturnCode::FsEexist,
            FsError::NotFound => ReturnCode::FsEnoent,
            FsError::TooManyFilesOpen => ReturnCode::FsEnfile,
            FsError::FileTooBig => ReturnCode::FsEfbig,
            FsError::NoFreeHandle => ReturnCode::FsEfdexhausted,
            FsError::NameTooLong => ReturnCode::FsEnamelen,
            FsError::InUse => ReturnCode::FsEbusy,
        }
    }
}

/// Failures surfaced to the guest by HLE devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum IosError {
    /// Malformed request shape, unknown content index or out-of-range handle.
    #[error("invalid argument")]
    InvalidArgument,
    /// Caller identity does not own the resource or title.
    #[error("access denied")]
    AccessDenied,
    /// Operation on a handle that is not open.
    #[error("handle is not open")]
    InvalidState,
    /// Fixed-capacity descriptor table is full.
    #[error("descriptor table exhausted")]
    ResourceExhausted,
    /// No active title or no installed metadata.
    #[error("not found")]
    NotFound,
    /// Error reported by the backing transport.
    #[error("transport: {0}")]
    Fs(#[from] FsError),
}

impl IosError {
    pub fn return_code(self) -> ReturnCode {
        match self {
            IosError::InvalidArgument => ReturnCode::EsEinval,
            IosError::AccessDenied => ReturnCode::EsEacces,
            IosError::InvalidState => ReturnCode::IpcEinval,
            IosError::ResourceExhausted => ReturnCode::FsEfdexhausted,
            IosError::NotFound => ReturnCode::FsEnoent,
            IosError::Fs(err) => err.return_code(),
        }
    }
}
