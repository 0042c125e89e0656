//! Working-directory layout.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use std::io;

/// Engine-private directory under the root.
pub const ENGINE_DIR: &str = ".switchyard";
/// Directory holding per-spec lock files.
pub const LOCK_DIR: &str = ".switchyard/locks";
/// Directory holding the human-readable boards.
pub const BOARD_DIR: &str = "specs";

/// Capability handle on the working directory.
#[derive(Debug)]
pub struct Workspace {
    root: Utf8PathBuf,
    dir: Dir,
}

impl Workspace {
    /// Opens `root` and creates the engine's subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the root cannot be opened or a
    /// subdirectory cannot be created.
    pub fn open(root: impl AsRef<Utf8Path>) -> io::Result<Self> {
        let path = root.as_ref();
        let dir = Dir::open_ambient_dir(path, ambient_authority())?;
        for sub in [ENGINE_DIR, LOCK_DIR, BOARD_DIR] {
            dir.create_dir_all(sub)?;
        }
        Ok(Self {
            root: path.to_owned(),
            dir,
        })
    }

    /// Returns the root path.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Opens the engine directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be opened.
    pub fn engine_dir(&self) -> io::Result<Dir> {
        self.dir.open_dir(ENGINE_DIR)
    }

    /// Opens the lock directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be opened.
    pub fn lock_dir(&self) -> io::Result<Dir> {
        self.dir.open_dir(LOCK_DIR)
    }

    /// Opens the board directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the directory cannot be opened.
    pub fn board_dir(&self) -> io::Result<Dir> {
        self.dir.open_dir(BOARD_DIR)
    }
}
