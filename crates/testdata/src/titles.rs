use ios_fs::{FileSystem, NandFs};
use once_cell::sync::Lazy;
use serde::Deserialize;
use services_es::{content_path, Content, InstalledTitles, Tmd};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "title")]
    titles: Vec<TitleEntry>,
}

/// Title described in `titles.toml`.
#[derive(Debug, Deserialize)]
pub struct TitleEntry {
    pub name: String,
    pub title_id: u64,
    #[serde(rename = "content")]
    pub contents: Vec<ContentEntry>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct ContentEntry {
    pub id: u32,
    pub index: u16,
    pub size: u32,
    pub fill: u8,
    #[serde(default = "default_content_type")]
    pub content_type: u16,
}

fn default_content_type() -> u16 {
    1
}

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    toml::from_str(include_str!("../titles.toml")).expect("titles.toml is well-formed")
});

/// Every title in the manifest.
pub fn titles() -> &'static [TitleEntry] {
    &MANIFEST.titles
}

/// Looks a title up by its manifest name.
pub fn title(name: &str) -> Option<&'static TitleEntry> {
    titles().iter().find(|t| t.name == name)
}

impl TitleEntry {
    pub fn content(&self, index: u16) -> Option<&ContentEntry> {
        self.contents.iter().find(|c| c.index == index)
    }

    pub fn tmd(&self) -> Tmd {
        Tmd::new(
            self.title_id,
            self.contents.iter().map(ContentEntry::as_content).collect(),
        )
    }
}

impl ContentEntry {
    pub fn as_content(&self) -> Content {
        Content {
            id: self.id,
            index: self.index,
            content_type: self.content_type,
            size: u64::from(self.size),
        }
    }

    /// Synthesised payload of this content.
    pub fn bytes(&self) -> Vec<u8> {
        (0..self.size)
            .map(|i| self.fill.wrapping_add(i as u8))
            .collect()
    }
}

/// NAND and title database populated from the manifest.
pub struct InstalledSystem {
    pub fs: Arc<NandFs>,
    pub titles: Arc<InstalledTitles>,
}

/// Installs every manifest title into a fresh NAND.
pub fn install_all() -> InstalledSystem {
    let fs = Arc::new(NandFs::new());
    let titles = Arc::new(InstalledTitles::new());
    for entry in self::titles() {
        for content in &entry.contents {
            fs.write_file(
                &content_path(entry.title_id, &content.as_content()),
                &content.bytes(),
            )
            .expect("fixture NAND accepts content files");
        }
        titles.install(Arc::new(entry.tmd()));
    }
    InstalledSystem { fs, titles }
}
