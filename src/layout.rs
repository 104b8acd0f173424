//! Installation root layout
//!
//! An installation root holds a server tree and a client tree:
//!
//! ```text
//! <root>/mods/*.jar[.disabled]
//! <root>/minecraft-core-manifests/<fileName>.json
//! <root>/client/mods/*.jar[.disabled]
//! <root>/client/minecraft-core-manifests/<fileName>.json
//! <root>/mods_disabled/*.jar            (legacy, read-only migration source)
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MODS_DIR: &str = "mods";
pub const CLIENT_DIR: &str = "client";
pub const MANIFEST_DIR: &str = "minecraft-core-manifests";
pub const LEGACY_DISABLED_DIR: &str = "mods_disabled";
pub const DISABLED_SUFFIX: &str = ".disabled";
pub const ARCHIVE_EXTENSION: &str = ".jar";

/// One side of an installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Server,
    Client,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Server => Side::Client,
            Side::Client => Side::Server,
        }
    }
}

/// A physical place an archive can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    ServerEnabled,
    ServerDisabled,
    ClientEnabled,
    ClientDisabled,
    /// `<root>/mods_disabled/<fileName>`
    LegacyDisabled,
}

impl Slot {
    /// Order in which slots are probed when looking for a readable archive
    pub const PROBE_ORDER: [Slot; 5] = [
        Slot::ServerEnabled,
        Slot::ServerDisabled,
        Slot::ClientEnabled,
        Slot::ClientDisabled,
        Slot::LegacyDisabled,
    ];

    pub fn side(self) -> Side {
        match self {
            Slot::ServerEnabled | Slot::ServerDisabled | Slot::LegacyDisabled => Side::Server,
            Slot::ClientEnabled | Slot::ClientDisabled => Side::Client,
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Slot::ServerEnabled | Slot::ClientEnabled)
    }

    pub fn enabled(side: Side) -> Slot {
        match side {
            Side::Server => Slot::ServerEnabled,
            Side::Client => Slot::ClientEnabled,
        }
    }

    pub fn disabled(side: Side) -> Slot {
        match side {
            Side::Server => Slot::ServerDisabled,
            Side::Client => Slot::ClientDisabled,
        }
    }

    /// The location this slot contributes to a record's location set
    pub fn location(self) -> Location {
        match self {
            Slot::ServerEnabled => Location::Server,
            Slot::ClientEnabled => Location::Client,
            Slot::ServerDisabled | Slot::ClientDisabled | Slot::LegacyDisabled => {
                Location::Disabled
            }
        }
    }
}

/// Derived placement of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Server,
    Client,
    Disabled,
}

/// Desired placement of one package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ServerOnly,
    ClientOnly,
    Both,
    Disabled,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ServerOnly => "server-only",
            Category::ClientOnly => "client-only",
            Category::Both => "both",
            Category::Disabled => "disabled",
        }
    }

    /// The location set a package must end up with once reconciled
    pub fn implied_locations(&self) -> BTreeSet<Location> {
        match self {
            Category::ServerOnly => BTreeSet::from([Location::Server]),
            Category::ClientOnly => BTreeSet::from([Location::Client]),
            Category::Both => BTreeSet::from([Location::Server, Location::Client]),
            Category::Disabled => BTreeSet::from([Location::Disabled]),
        }
    }

    /// Infer the category from the enabled copies that exist.
    /// Returns `None` when no enabled copy exists.
    pub fn from_enabled(server: bool, client: bool) -> Option<Category> {
        match (server, client) {
            (true, true) => Some(Category::Both),
            (true, false) => Some(Category::ServerOnly),
            (false, true) => Some(Category::ClientOnly),
            (false, false) => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server-only" | "server" => Ok(Category::ServerOnly),
            "client-only" | "client" => Ok(Category::ClientOnly),
            "both" => Ok(Category::Both),
            "disabled" => Ok(Category::Disabled),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Path resolution for one installation root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationLayout {
    root: PathBuf,
}

impl InstallationLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn client_root(&self) -> PathBuf {
        self.root.join(CLIENT_DIR)
    }

    /// Root of one side's tree; the client tree mirrors the server layout
    pub fn side_root(&self, side: Side) -> PathBuf {
        match side {
            Side::Server => self.root.clone(),
            Side::Client => self.client_root(),
        }
    }

    pub fn mods_dir(&self, side: Side) -> PathBuf {
        self.side_root(side).join(MODS_DIR)
    }

    pub fn manifest_dir(&self, side: Side) -> PathBuf {
        self.side_root(side).join(MANIFEST_DIR)
    }

    pub fn legacy_disabled_dir(&self) -> PathBuf {
        self.root.join(LEGACY_DISABLED_DIR)
    }

    /// Physical path of `file_name` (the enabled name) in the given slot
    pub fn archive_path(&self, slot: Slot, file_name: &str) -> PathBuf {
        match slot {
            Slot::ServerEnabled | Slot::ClientEnabled => {
                self.mods_dir(slot.side()).join(file_name)
            }
            Slot::ServerDisabled | Slot::ClientDisabled => self
                .mods_dir(slot.side())
                .join(format!("{file_name}{DISABLED_SUFFIX}")),
            Slot::LegacyDisabled => self.legacy_disabled_dir().join(file_name),
        }
    }

    pub fn sidecar_path(&self, side: Side, file_name: &str) -> PathBuf {
        self.manifest_dir(side).join(format!("{file_name}.json"))
    }

    /// Probe every slot and return the ones holding a regular file
    pub async fn occupied_slots(&self, file_name: &str) -> BTreeSet<Slot> {
        let mut slots = BTreeSet::new();
        for slot in Slot::PROBE_ORDER {
            if is_file(&self.archive_path(slot, file_name)).await {
                slots.insert(slot);
            }
        }
        slots
    }
}

/// Returns true when the path exists and is a regular file
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Parse a directory entry name into its enabled archive name and disabled flag.
/// Returns `None` for entries that are not archives.
pub fn parse_archive_name(entry_name: &str) -> Option<(&str, bool)> {
    if let Some(base) = entry_name.strip_suffix(DISABLED_SUFFIX) {
        base.ends_with(ARCHIVE_EXTENSION).then_some((base, true))
    } else {
        entry_name
            .ends_with(ARCHIVE_EXTENSION)
            .then_some((entry_name, false))
    }
}

/// List the archives directly inside `dir` as `(enabled name, disabled)` pairs,
/// sorted. A missing directory has no archives.
pub async fn list_archives(dir: &Path) -> io::Result<Vec<(String, bool)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut archives = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str()
            && let Some((base, disabled)) = parse_archive_name(name)
        {
            archives.push((base.to_string(), disabled));
        }
    }
    archives.sort();
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("sodium.jar", Some(("sodium.jar", false)))]
    #[case("sodium.jar.disabled", Some(("sodium.jar", true)))]
    #[case("readme.txt", None)]
    #[case("notes.disabled", None)]
    fn parse_archive_name_returns_expected(
        #[case] entry: &str,
        #[case] expected: Option<(&str, bool)>,
    ) {
        assert_eq!(parse_archive_name(entry), expected);
    }

    #[rstest]
    #[case(Slot::ServerEnabled, "/srv/mods/a.jar")]
    #[case(Slot::ServerDisabled, "/srv/mods/a.jar.disabled")]
    #[case(Slot::ClientEnabled, "/srv/client/mods/a.jar")]
    #[case(Slot::ClientDisabled, "/srv/client/mods/a.jar.disabled")]
    #[case(Slot::LegacyDisabled, "/srv/mods_disabled/a.jar")]
    fn archive_path_maps_slots(#[case] slot: Slot, #[case] expected: &str) {
        let layout = InstallationLayout::new("/srv");
        assert_eq!(layout.archive_path(slot, "a.jar"), PathBuf::from(expected));
    }

    #[test]
    fn sidecar_path_is_per_side() {
        let layout = InstallationLayout::new("/srv");
        assert_eq!(
            layout.sidecar_path(Side::Client, "a.jar"),
            PathBuf::from("/srv/client/minecraft-core-manifests/a.jar.json")
        );
    }

    #[rstest]
    #[case("server-only", Ok(Category::ServerOnly))]
    #[case("client-only", Ok(Category::ClientOnly))]
    #[case("both", Ok(Category::Both))]
    #[case("disabled", Ok(Category::Disabled))]
    #[case("everywhere", Err("unknown category: everywhere".to_string()))]
    fn category_from_str(#[case] input: &str, #[case] expected: Result<Category, String>) {
        assert_eq!(input.parse::<Category>(), expected);
    }

    #[test]
    fn category_serializes_as_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Category::ServerOnly).unwrap(),
            "\"server-only\""
        );
    }

    #[tokio::test]
    async fn list_archives_skips_non_archives_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        for name in ["b.jar", "a.jar.disabled", "notes.txt", "c.jar"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let archives = list_archives(dir).await.unwrap();

        assert_eq!(
            archives,
            vec![
                ("a.jar".to_string(), true),
                ("b.jar".to_string(), false),
                ("c.jar".to_string(), false),
            ]
        );
        assert!(list_archives(&dir.join("missing")).await.unwrap().is_empty());
    }
}
