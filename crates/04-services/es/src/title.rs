//! Title metadata consumed by the content device.
//!
//! Parsing and verifying signed metadata is someone else's job; this module
//! only describes the lookups the device needs.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// System menu title id.
pub const SYSTEM_MENU_TITLE_ID: u64 = 0x0000_0001_0000_0002;

/// One content entry of a title.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Content {
    pub id: u32,
    pub index: u16,
    pub content_type: u16,
    pub size: u64,
}

/// Read access to a title's metadata.
pub trait TmdReader: Send + Sync {
    fn title_id(&self) -> u64;

    /// Looks up a content by its index (not its position in the list).
    fn content(&self, index: u16) -> Option<Content>;
}

/// Decoded title metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tmd {
    pub title_id: u64,
    pub contents: Vec<Content>,
}

impl Tmd {
    pub fn new(title_id: u64, contents: Vec<Content>) -> Self {
        Self { title_id, contents }
    }
}

impl TmdReader for Tmd {
    fn title_id(&self) -> u64 {
        self.title_id
    }

    fn content(&self, index: u16) -> Option<Content> {
        self.contents.iter().find(|c| c.index == index).copied()
    }
}

/// NAND path of a content file.
pub fn content_path(title_id: u64, content: &Content) -> String {
    format!(
        "/title/{:08x}/{:08x}/content/{:08x}.app",
        title_id >> 32,
        title_id as u32,
        content.id
    )
}

/// Source of installed title metadata.
pub trait TitleDatabase: Send + Sync {
    fn find_installed_tmd(&self, title_id: u64) -> Option<Arc<dyn TmdReader>>;
}

/// Titles installed in memory.
#[derive(Default)]
pub struct InstalledTitles {
    titles: RwLock<HashMap<u64, Arc<dyn TmdReader>>>,
}

impl InstalledTitles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, tmd: Arc<dyn TmdReader>) {
        self.titles.write().insert(tmd.title_id(), tmd);
    }
}

impl TitleDatabase for InstalledTitles {
    fn find_installed_tmd(&self, title_id: u64) -> Option<Arc<dyn TmdReader>> {
        self.titles.read().get(&title_id).cloned()
    }
}

/// Title currently running on the emulated console.
#[derive(Clone, Default)]
pub struct TitleContext {
    pub active: bool,
    pub tmd: Option<Arc<dyn TmdReader>>,
}

impl TitleContext {
    pub fn launched(tmd: Arc<dyn TmdReader>) -> Self {
        Self {
            active: true,
            tmd: Some(tmd),
        }
    }

    /// Metadata of the active title, if any.
    pub fn active_tmd(&self) -> Option<&Arc<dyn TmdReader>> {
        self.tmd.as_ref().filter(|_| self.active)
    }
}
