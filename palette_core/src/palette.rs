use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::color::Color;
use crate::identity::IdentityId;

pub const SLOTS: usize = 5;

/// Store-assigned palette identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaletteId(pub Uuid);

impl PaletteId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PaletteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PaletteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A named set of five colors, as stored in the `palettes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PaletteId>,
    pub name: String,
    pub colors: [Color; SLOTS],
    pub selected_states: [bool; SLOTS],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<IdentityId>,
}

impl Palette {
    pub fn new(name: impl Into<String>, colors: [Color; SLOTS]) -> Self {
        Self {
            id: None,
            name: name.into(),
            colors,
            selected_states: [true; SLOTS],
            created_at: None,
            user_id: None,
        }
    }

    pub fn is_owned_by(&self, who: &IdentityId) -> bool {
        self.user_id.as_ref() == Some(who)
    }

    pub fn hex_labels(&self) -> [String; SLOTS] {
        self.colors.map(|c| c.to_string())
    }
}

/// Partial update: only fields that are `Some` overwrite the stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PalettePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub colors: Option<[Color; SLOTS]>,
    #[serde(default)]
    pub selected_states: Option<[bool; SLOTS]>,
}

impl PalettePatch {
    /// Everything the owner can edit, taken from a finalized palette.
    pub fn from_palette(p: &Palette) -> Self {
        Self {
            name: Some(p.name.clone()),
            colors: Some(p.colors),
            selected_states: Some(p.selected_states),
        }
    }

    pub fn apply_to(&self, target: &mut Palette) {
        if let Some(name) = &self.name {
            target.name = name.clone();
        }
        if let Some(colors) = self.colors {
            target.colors = colors;
        }
        if let Some(states) = self.selected_states {
            target.selected_states = states;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.colors.is_none() && self.selected_states.is_none()
    }
}
