use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::identity::Identity;
use crate::palette::{Palette, PaletteId, PalettePatch};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sign in to change palettes")]
    Unauthenticated,
    #[error("palette {0} belongs to someone else")]
    NotOwner(PaletteId),
    #[error("palette {0} no longer exists")]
    NotFound(PaletteId),
    #[error("invalid palette: {0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Persist(#[from] anyhow::Error),
}

impl StoreError {
    /// Authorization failures abort the action with a notice.
    pub fn is_authorization(&self) -> bool {
        matches!(self, StoreError::Unauthenticated | StoreError::NotOwner(_))
    }
}

/// The `palettes` collection.
///
/// Mutations take the caller's identity; the store is where ownership is
/// enforced, so front ends cannot skip the check.
pub trait PaletteStore {
    /// Every palette, newest first.
    fn list(&self) -> Result<Vec<Palette>, StoreError>;

    fn get(&self, id: PaletteId) -> Result<Palette, StoreError>;

    fn create(&mut self, caller: Option<&Identity>, palette: Palette)
    -> Result<PaletteId, StoreError>;

    fn update(
        &mut self,
        caller: Option<&Identity>,
        id: PaletteId,
        patch: PalettePatch,
    ) -> Result<(), StoreError>;

    fn delete(&mut self, caller: Option<&Identity>, id: PaletteId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    /// Insertion order; `list` sorts a copy.
    #[serde(default)]
    palettes: Vec<Palette>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.palettes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.palettes.is_empty()
    }

    fn position(&self, id: PaletteId) -> Result<usize, StoreError> {
        self.palettes
            .iter()
            .position(|p| p.id == Some(id))
            .ok_or(StoreError::NotFound(id))
    }

    fn owned_position(
        &self,
        caller: Option<&Identity>,
        id: PaletteId,
    ) -> Result<usize, StoreError> {
        let caller = caller.ok_or(StoreError::Unauthenticated)?;
        let pos = self.position(id)?;
        if !self.palettes[pos].is_owned_by(&caller.id) {
            tracing::debug!(palette = %id, caller = %caller.id, "rejected: not owner");
            return Err(StoreError::NotOwner(id));
        }
        Ok(pos)
    }
}

fn validate(p: &Palette) -> Result<(), StoreError> {
    if p.name.trim().is_empty() {
        return Err(StoreError::Invalid("name is empty"));
    }
    Ok(())
}

impl PaletteStore for MemoryStore {
    fn list(&self) -> Result<Vec<Palette>, StoreError> {
        let mut out: Vec<Palette> = self.palettes.iter().rev().cloned().collect();
        // Stable sort: equal timestamps keep newest-inserted first.
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    fn get(&self, id: PaletteId) -> Result<Palette, StoreError> {
        let pos = self.position(id)?;
        Ok(self.palettes[pos].clone())
    }

    fn create(
        &mut self,
        caller: Option<&Identity>,
        mut palette: Palette,
    ) -> Result<PaletteId, StoreError> {
        let caller = caller.ok_or(StoreError::Unauthenticated)?;
        validate(&palette)?;

        let id = PaletteId::new_random();
        palette.id = Some(id);
        palette.user_id = Some(caller.id);
        palette.created_at = Some(Utc::now());
        self.palettes.push(palette);

        tracing::info!(palette = %id, owner = %caller.id, "palette created");
        Ok(id)
    }

    fn update(
        &mut self,
        caller: Option<&Identity>,
        id: PaletteId,
        patch: PalettePatch,
    ) -> Result<(), StoreError> {
        let pos = self.owned_position(caller, id)?;

        let mut next = self.palettes[pos].clone();
        patch.apply_to(&mut next);
        validate(&next)?;
        self.palettes[pos] = next;

        tracing::info!(palette = %id, "palette updated");
        Ok(())
    }

    fn delete(&mut self, caller: Option<&Identity>, id: PaletteId) -> Result<(), StoreError> {
        let pos = self.owned_position(caller, id)?;
        self.palettes.remove(pos);

        tracing::info!(palette = %id, "palette deleted");
        Ok(())
    }
}

/// A [`MemoryStore`] written back to a JSON file after every successful change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read palette file {}", path.display()))?;
            serde_json::from_str::<MemoryStore>(&text).context("parse palette json")?
        } else {
            MemoryStore::new()
        };
        tracing::debug!(path = %path.display(), count = inner.len(), "palette store opened");
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, palettes: &MemoryStore) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(palettes).context("serialize palettes to json")?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).context("create palette directory")?;
        }
        fs::write(&self.path, json).context("write palette json file")?;
        Ok(())
    }

    /// Run `change` on a copy, write the copy out, and only then keep it.
    /// A failed write leaves the store exactly as it was.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut next = self.inner.clone();
        let out = change(&mut next)?;
        self.write(&next)?;
        self.inner = next;
        Ok(out)
    }
}

impl PaletteStore for JsonFileStore {
    fn list(&self) -> Result<Vec<Palette>, StoreError> {
        self.inner.list()
    }

    fn get(&self, id: PaletteId) -> Result<Palette, StoreError> {
        self.inner.get(id)
    }

    fn create(
        &mut self,
        caller: Option<&Identity>,
        palette: Palette,
    ) -> Result<PaletteId, StoreError> {
        self.commit(|s| s.create(caller, palette))
    }

    fn update(
        &mut self,
        caller: Option<&Identity>,
        id: PaletteId,
        patch: PalettePatch,
    ) -> Result<(), StoreError> {
        self.commit(|s| s.update(caller, id, patch))
    }

    fn delete(&mut self, caller: Option<&Identity>, id: PaletteId) -> Result<(), StoreError> {
        self.commit(|s| s.delete(caller, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::identity::IdentityId;
    use crate::palette::SLOTS;

    fn who(email: &str) -> Identity {
        Identity {
            id: IdentityId::new_random(),
            email: email.to_string(),
        }
    }

    fn sample(name: &str) -> Palette {
        Palette::new(name, [Color::from_rgb(0xAA, 0, 0); SLOTS])
    }

    #[test]
    fn list_is_newest_first() -> anyhow::Result<()> {
        let a = who("a@x.io");
        let mut store = MemoryStore::new();
        store.create(Some(&a), sample("first"))?;
        store.create(Some(&a), sample("second"))?;
        store.create(Some(&a), sample("third"))?;

        let names: Vec<String> = store.list()?.into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["third", "second", "first"]);
        Ok(())
    }

    #[test]
    fn create_stamps_owner_and_time() -> anyhow::Result<()> {
        let a = who("a@x.io");
        let mut store = MemoryStore::new();
        let id = store.create(Some(&a), sample("mine"))?;

        let p = store.get(id)?;
        assert_eq!(p.id, Some(id));
        assert_eq!(p.user_id, Some(a.id));
        assert!(p.created_at.is_some());
        Ok(())
    }

    #[test]
    fn signed_out_cannot_create() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.create(None, sample("anon")),
            Err(StoreError::Unauthenticated)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn blank_name_is_invalid() {
        let a = who("a@x.io");
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.create(Some(&a), sample("  ")),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn only_owner_may_update() -> anyhow::Result<()> {
        let a = who("a@x.io");
        let b = who("b@x.io");
        let mut store = MemoryStore::new();
        let id = store.create(Some(&a), sample("P"))?;

        let patch = PalettePatch {
            name: Some("Renamed".into()),
            ..Default::default()
        };

        let err = store
            .update(Some(&b), id, patch.clone())
            .expect_err("b is not the owner");
        assert!(err.is_authorization());
        assert_eq!(store.get(id)?.name, "P");

        store.update(Some(&a), id, patch)?;
        assert_eq!(store.get(id)?.name, "Renamed");
        Ok(())
    }

    #[test]
    fn only_owner_may_delete() -> anyhow::Result<()> {
        let a = who("a@x.io");
        let b = who("b@x.io");
        let mut store = MemoryStore::new();
        let id = store.create(Some(&a), sample("P"))?;

        assert!(matches!(store.delete(None, id), Err(StoreError::Unauthenticated)));
        assert!(matches!(store.delete(Some(&b), id), Err(StoreError::NotOwner(_))));
        store.delete(Some(&a), id)?;
        assert!(matches!(store.get(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(Some(&a), id), Err(StoreError::NotFound(_))));
        Ok(())
    }

    #[test]
    fn update_cannot_blank_the_name() -> anyhow::Result<()> {
        let a = who("a@x.io");
        let mut store = MemoryStore::new();
        let id = store.create(Some(&a), sample("P"))?;
        let res = store.update(
            Some(&a),
            id,
            PalettePatch {
                name: Some(String::new()),
                ..Default::default()
            },
        );
        assert!(matches!(res, Err(StoreError::Invalid(_))));
        assert_eq!(store.get(id)?.name, "P");
        Ok(())
    }

    #[test]
    fn json_store_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data").join("palettes.json");
        let a = who("a@x.io");

        let (keep, gone) = {
            let mut store = JsonFileStore::open(&path)?;
            let keep = store.create(Some(&a), sample("keep"))?;
            let gone = store.create(Some(&a), sample("gone"))?;
            store.delete(Some(&a), gone)?;
            (keep, gone)
        };

        let store = JsonFileStore::open(&path)?;
        let all = store.list()?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, Some(keep));
        assert!(matches!(store.get(gone), Err(StoreError::NotFound(_))));

        let text = fs::read_to_string(&path)?;
        assert!(text.contains("\"selectedStates\""));
        assert!(text.contains("\"userId\""));
        Ok(())
    }

    #[test]
    fn failed_write_leaves_store_unchanged() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("palettes.json");
        let a = who("a@x.io");
        let mut store = JsonFileStore::open(&path)?;
        let keep = store.create(Some(&a), sample("keep"))?;

        // A directory where the file should be makes every write fail.
        fs::remove_file(&path)?;
        fs::create_dir(&path)?;

        let err = store.create(Some(&a), sample("ghost")).expect_err("write must fail");
        assert!(matches!(err, StoreError::Persist(_)));
        assert!(store.delete(Some(&a), keep).is_err());
        let rename = PalettePatch {
            name: Some("Renamed".into()),
            ..Default::default()
        };
        assert!(store.update(Some(&a), keep, rename).is_err());

        let names: Vec<String> = store.list()?.into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["keep"]);
        assert_eq!(store.get(keep)?.name, "keep");
        Ok(())
    }

    #[test]
    fn rejected_write_leaves_file_untouched() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("palettes.json");
        let mut store = JsonFileStore::open(&path)?;
        assert!(store.create(None, sample("x")).is_err());
        assert!(!path.exists());
        Ok(())
    }
}
