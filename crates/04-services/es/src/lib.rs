//! Content access service (`/dev/es`).
//!
//! Guests open installed title contents by index and get back a small integer
//! handle into a fixed-size [`ContentTable`]. Every later read, seek or close
//! must come from the UID that opened the handle.

#![allow(missing_docs)]

mod content_table;
mod device;
mod title;
mod uid;

pub use content_table::{ContentTable, OpenedContent};
pub use device::{ioctlv, EsDevice, DEVICE_NAME, TICKET_VIEW_SIZE};
pub use title::{
    content_path, Content, InstalledTitles, TitleContext, TitleDatabase, Tmd, TmdReader,
    SYSTEM_MENU_TITLE_ID,
};
pub use uid::{UidSys, FIRST_UID, UID_SYS_PATH};

#[cfg(test)]
mod tests;
