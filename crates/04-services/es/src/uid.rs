//! Title id to UID assignments, persisted in `/sys/uid.sys`.

use crate::title::SYSTEM_MENU_TITLE_ID;
use ios_fs::FileSystem;
use ipc_abi::{FsError, PID_KERNEL};

pub const UID_SYS_PATH: &str = "/sys/uid.sys";
/// First UID handed out to a title.
pub const FIRST_UID: u32 = 0x1000;

const ENTRY_LEN: usize = 12;

/// UID map loaded from the filesystem.
///
/// Entries are big-endian `(title_id: u64, uid: u32)` records. Assignment is
/// lazy and stable: the first lookup for a title allocates the next UID and
/// every later lookup returns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UidSys {
    entries: Vec<(u64, u32)>,
}

impl UidSys {
    /// Loads the map, seeding it with the system menu when empty.
    pub fn load(fs: &dyn FileSystem) -> Self {
        let mut entries = match fs.read_file(UID_SYS_PATH) {
            Ok(bytes) => decode(&bytes),
            Err(FsError::NotFound) => Vec::new(),
            Err(err) => {
                log::warn!("uid.sys unreadable ({err}); starting from an empty map");
                Vec::new()
            }
        };
        if entries.is_empty() {
            entries.push((SYSTEM_MENU_TITLE_ID, FIRST_UID));
        }
        Self { entries }
    }

    pub fn uid_for_title(&self, title_id: u64) -> Option<u32> {
        self.entries
            .iter()
            .find(|(tid, _)| *tid == title_id)
            .map(|(_, uid)| *uid)
    }

    pub fn title_for_uid(&self, uid: u32) -> Option<u64> {
        self.entries
            .iter()
            .find(|(_, u)| *u == uid)
            .map(|(tid, _)| *tid)
    }

    /// Returns the title's UID, allocating and persisting one on first use.
    ///
    /// Fails with [`FsError::Corrupt`] when the map has no UID left to hand
    /// out. The kernel UID is never assigned to a title.
    pub fn get_or_insert_uid_for_title(
        &mut self,
        fs: &dyn FileSystem,
        title_id: u64,
    ) -> Result<u32, FsError> {
        if let Some(uid) = self.uid_for_title(title_id) {
            return Ok(uid);
        }
        let uid = match self.entries.iter().map(|(_, uid)| *uid).max() {
            None => FIRST_UID,
            Some(max) => max.checked_add(1).ok_or(FsError::Corrupt)?,
        };
        if uid == PID_KERNEL {
            return Err(FsError::Corrupt);
        }
        self.entries.push((title_id, uid));
        if let Err(err) = fs.write_file(UID_SYS_PATH, &encode(&self.entries)) {
            log::error!("failed to persist uid.sys: {err}");
        }
        log::debug!("uid.sys: assigned uid {uid:#x} to title {title_id:016x}");
        Ok(uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode(bytes: &[u8]) -> Vec<(u64, u32)> {
    bytes
        .chunks_exact(ENTRY_LEN)
        .map(|record| {
            let mut tid = [0u8; 8];
            let mut uid = [0u8; 4];
            tid.copy_from_slice(&record[..8]);
            uid.copy_from_slice(&record[8..]);
            (u64::from_be_bytes(tid), u32::from_be_bytes(uid))
        })
        .collect()
}

fn encode(entries: &[(u64, u32)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * ENTRY_LEN);
    for (tid, uid) in entries {
        out.extend_from_slice(&tid.to_be_bytes());
        out.extend_from_slice(&uid.to_be_bytes());
    }
    out
}
