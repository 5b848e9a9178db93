//! File-based belief memory storage.
//!
//! Each collection is a pretty-printed JSON file (`assumptions.json`,
//! `contradictions.json`, ...). A commit writes every collection into a fresh
//! generation directory and then swaps the `CURRENT` pointer file with a
//! temp file + rename. Readers follow the pointer, so they only ever see a
//! complete generation, even if the process dies mid-commit.
//!
//! Layout:
//! ```text
//! <root>/CURRENT            -> "gen-000007"
//! <root>/gen-000006/*.json  (retained previous generation)
//! <root>/gen-000007/*.json
//! ```
//!
//! A root without `CURRENT` but with flat `<collection>.json` files is read
//! as a legacy layout; the first commit migrates it into a generation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::default_storage_dir;
use crate::error::{MnemosyneError, Result};
use crate::storage::{MemoryState, MemoryStore};

/// Collection file stems, in write order.
pub const COLLECTIONS: [&str; 8] = [
    "organizations",
    "narratives",
    "loops",
    "insights",
    "assumptions",
    "contradictions",
    "strategy_changes",
    "overrides",
];

const CURRENT_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "gen-";

/// File-based memory store with atomic generation swaps.
#[derive(Debug, Clone)]
pub struct FileMemoryStore {
    /// Root directory holding `CURRENT` and the generation directories.
    root: PathBuf,
    /// Number of committed generations kept on disk (at least 1).
    retained_generations: usize,
}

impl FileMemoryStore {
    /// Create a store in the default directory (`~/.mnemosyne/memory/`).
    pub fn new() -> Result<Self> {
        let dir = default_storage_dir().ok_or_else(|| {
            MnemosyneError::config("Could not determine storage directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a store rooted at a custom directory.
    pub fn with_dir(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| MnemosyneError::storage(&root, e))?;
        }

        Ok(Self {
            root,
            retained_generations: 2,
        })
    }

    /// Keep `count` committed generations on disk.
    pub fn with_retained_generations(mut self, count: usize) -> Self {
        self.retained_generations = count.max(1);
        self
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    fn generation_name(number: u64) -> String {
        format!("{}{:06}", GENERATION_PREFIX, number)
    }

    fn parse_generation(name: &str) -> Option<u64> {
        name.strip_prefix(GENERATION_PREFIX)?.parse().ok()
    }

    /// Directory of the committed generation, if any.
    pub fn current_generation_dir(&self) -> Result<Option<PathBuf>> {
        let path = self.current_path();
        if !path.exists() {
            return Ok(None);
        }
        let name = fs::read_to_string(&path).map_err(|e| MnemosyneError::storage(&path, e))?;
        let name = name.trim();
        if Self::parse_generation(name).is_none() {
            return Err(MnemosyneError::serde(format!(
                "CURRENT points at invalid generation '{}'",
                name
            )));
        }
        Ok(Some(self.root.join(name)))
    }

    fn current_generation_number(&self) -> Result<u64> {
        Ok(self
            .current_generation_dir()?
            .and_then(|dir| {
                dir.file_name()
                    .and_then(|n| Self::parse_generation(&n.to_string_lossy()))
            })
            .unwrap_or(0))
    }

    fn read_collection<T: DeserializeOwned + Default>(dir: &Path, name: &str) -> Result<T> {
        let path = dir.join(format!("{}.json", name));
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| MnemosyneError::storage(&path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| MnemosyneError::serde(format!("{}: {}", path.display(), e)))
    }

    fn write_collection<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<()> {
        let path = dir.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(value)?;

        let mut file = fs::File::create(&path).map_err(|e| MnemosyneError::storage(&path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| MnemosyneError::storage(&path, e))?;
        file.sync_all()
            .map_err(|e| MnemosyneError::storage(&path, e))?;
        Ok(())
    }

    fn read_state(dir: &Path) -> Result<MemoryState> {
        Ok(MemoryState {
            organizations: Self::read_collection(dir, "organizations")?,
            narratives: Self::read_collection(dir, "narratives")?,
            loops: Self::read_collection(dir, "loops")?,
            insights: Self::read_collection(dir, "insights")?,
            assumptions: Self::read_collection(dir, "assumptions")?,
            contradictions: Self::read_collection(dir, "contradictions")?,
            strategy_changes: Self::read_collection(dir, "strategy_changes")?,
            overrides: Self::read_collection(dir, "overrides")?,
        })
    }

    fn write_state(dir: &Path, state: &MemoryState) -> Result<()> {
        Self::write_collection(dir, "organizations", &state.organizations)?;
        Self::write_collection(dir, "narratives", &state.narratives)?;
        Self::write_collection(dir, "loops", &state.loops)?;
        Self::write_collection(dir, "insights", &state.insights)?;
        Self::write_collection(dir, "assumptions", &state.assumptions)?;
        Self::write_collection(dir, "contradictions", &state.contradictions)?;
        Self::write_collection(dir, "strategy_changes", &state.strategy_changes)?;
        Self::write_collection(dir, "overrides", &state.overrides)?;
        Ok(())
    }

    /// Point `CURRENT` at `name` using temp file + rename.
    fn swap_current(&self, name: &str) -> Result<()> {
        let temp_path = self.root.join(".CURRENT.tmp");
        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| MnemosyneError::storage(&temp_path, e))?;
            file.write_all(name.as_bytes())
                .map_err(|e| MnemosyneError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| MnemosyneError::storage(&temp_path, e))?;
        }

        let current = self.current_path();
        fs::rename(&temp_path, &current).map_err(|e| MnemosyneError::storage(&current, e))
    }

    /// Remove generations older than the retention window. Best-effort.
    fn prune(&self, newest: u64) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(root = %self.root.display(), error = %e, "skipping generation prune");
                return;
            }
        };

        let keep_from = newest.saturating_sub(self.retained_generations as u64 - 1);
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let stale = match Self::parse_generation(&name) {
                Some(number) => number < keep_from,
                // Leftover staging directories from interrupted commits
                None => name.starts_with('.') && name.ends_with(".staging"),
            };
            if stale {
                if let Err(e) = fs::remove_dir_all(entry.path()) {
                    tracing::warn!(path = %entry.path().display(), error = %e, "failed to prune generation");
                }
            }
        }
    }
}

impl MemoryStore for FileMemoryStore {
    fn load(&self) -> Result<MemoryState> {
        match self.current_generation_dir()? {
            Some(dir) => Self::read_state(&dir),
            // No generation yet: legacy flat files, or an empty store
            None => Self::read_state(&self.root),
        }
    }

    fn commit(&self, state: &MemoryState) -> Result<()> {
        let number = self.current_generation_number()? + 1;
        let name = Self::generation_name(number);
        let staging = self.root.join(format!(".{}.staging", name));
        let final_dir = self.root.join(&name);

        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| MnemosyneError::storage(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| MnemosyneError::storage(&staging, e))?;

        if let Err(e) = Self::write_state(&staging, state) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir).map_err(|e| MnemosyneError::storage(&final_dir, e))?;
        }
        fs::rename(&staging, &final_dir).map_err(|e| MnemosyneError::storage(&final_dir, e))?;

        // The commit point: readers switch generations atomically here
        self.swap_current(&name)?;

        self.prune(number);
        Ok(())
    }
}
