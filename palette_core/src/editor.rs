use chrono::{DateTime, Utc};

use crate::color::{Color, HexEntry};
use crate::identity::IdentityId;
use crate::palette::{Palette, PaletteId, SLOTS};
use crate::picker::{Commit, Picker, PickerGeometry, PickerState};

/// Color every slot of a fresh draft starts with.
pub const PLACEHOLDER: Color = Color::WHITE;

/// How complete a draft must be before it can be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitRule {
    /// Every slot has been explicitly picked.
    #[default]
    AllSlotsSet,
    /// At least one slot differs from the placeholder. Looser than requiring
    /// every slot to be non-white: a palette with some white slots passes.
    NotAllPlaceholder,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("slots {0:?} have no color yet")]
    Incomplete(Vec<usize>),
    #[error("palette has no name")]
    EmptyName,
}

/// The palette being edited. A draft with an `id` came from the store and
/// submits as an update.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub colors: [Color; SLOTS],
    pub selected_states: [bool; SLOTS],
    pub name: String,
    pub id: Option<PaletteId>,
    pub user_id: Option<IdentityId>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            colors: [PLACEHOLDER; SLOTS],
            selected_states: [false; SLOTS],
            name: String::new(),
            id: None,
            user_id: None,
            created_at: None,
        }
    }
}

impl Draft {
    pub fn check(&self, rule: SubmitRule) -> Result<(), Rejection> {
        match rule {
            SubmitRule::AllSlotsSet => {
                let missing: Vec<usize> = self
                    .selected_states
                    .iter()
                    .enumerate()
                    .filter(|(_, set)| !**set)
                    .map(|(i, _)| i)
                    .collect();
                if !missing.is_empty() {
                    return Err(Rejection::Incomplete(missing));
                }
            }
            SubmitRule::NotAllPlaceholder => {
                if self.colors.iter().all(|c| *c == PLACEHOLDER) {
                    return Err(Rejection::Incomplete((0..SLOTS).collect()));
                }
            }
        }

        if self.name.trim().is_empty() {
            return Err(Rejection::EmptyName);
        }
        Ok(())
    }

    fn finalize(&self) -> Palette {
        Palette {
            id: self.id,
            name: self.name.trim().to_string(),
            colors: self.colors,
            selected_states: self.selected_states,
            created_at: self.created_at,
            user_id: self.user_id,
        }
    }
}

/// Holds the draft together with the one picker that edits it.
#[derive(Debug, Clone)]
pub struct PaletteEditor {
    draft: Draft,
    picker: Picker,
    hex: [HexEntry; SLOTS],
    rule: SubmitRule,
}

impl Default for PaletteEditor {
    fn default() -> Self {
        Self::new(PickerGeometry::default())
    }
}

impl PaletteEditor {
    pub fn new(geometry: PickerGeometry) -> Self {
        Self {
            draft: Draft::default(),
            picker: Picker::new(geometry),
            hex: std::array::from_fn(|_| HexEntry::showing(PLACEHOLDER)),
            rule: SubmitRule::default(),
        }
    }

    pub fn with_rule(mut self, rule: SubmitRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    pub fn is_editing_existing(&self) -> bool {
        self.draft.id.is_some()
    }

    /// Out-of-range slots are ignored.
    pub fn update_color(&mut self, index: usize, color: Color) {
        if index >= SLOTS {
            return;
        }
        self.draft.colors[index] = color;
        self.draft.selected_states[index] = true;
        self.hex[index].sync(color);
    }

    pub fn set_name(&mut self, text: impl Into<String>) {
        self.draft.name = text.into();
    }

    pub fn try_submit(&mut self) -> Result<Palette, Rejection> {
        self.draft.check(self.rule)?;
        let palette = self.draft.finalize();
        self.reset();
        Ok(palette)
    }

    /// Start editing a stored palette. Its id and owner carry through to the submission.
    pub fn load(&mut self, palette: &Palette) {
        self.draft = Draft {
            colors: palette.colors,
            selected_states: palette.selected_states,
            name: palette.name.clone(),
            id: palette.id,
            user_id: palette.user_id,
            created_at: palette.created_at,
        };
        self.picker.dismiss();
        self.hex = palette.colors.map(HexEntry::showing);
    }

    pub fn reset(&mut self) {
        self.draft = Draft::default();
        self.picker.dismiss();
        self.hex = std::array::from_fn(|_| HexEntry::showing(PLACEHOLDER));
    }

    pub fn hex_text(&self, index: usize) -> Option<&str> {
        self.hex.get(index).map(HexEntry::text)
    }

    /// Feed a keystroke-level hex edit for `index`. Commits only complete colors.
    pub fn hex_input(&mut self, index: usize, text: &str) -> Option<Color> {
        let color = self.hex.get_mut(index)?.input(text)?;
        self.draft.colors[index] = color;
        self.draft.selected_states[index] = true;
        Some(color)
    }

    pub fn select_swatch(&mut self, index: usize) -> PickerState {
        if index >= SLOTS {
            return self.picker.state();
        }
        let seed = self.draft.selected_states[index].then(|| self.draft.colors[index]);
        self.picker.select_swatch(index, seed)
    }

    pub fn dismiss_picker(&mut self) {
        self.picker.dismiss();
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> Option<Color> {
        let commit = self.picker.pointer_down(x, y);
        self.apply(commit)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<Color> {
        let commit = self.picker.pointer_move(x, y);
        self.apply(commit)
    }

    pub fn pointer_up(&mut self) {
        self.picker.pointer_up();
    }

    pub fn pointer_leave(&mut self) {
        self.picker.pointer_leave();
    }

    pub fn set_hue(&mut self, h: f64) -> Option<Color> {
        let commit = self.picker.set_hue(h);
        self.apply(commit)
    }

    fn apply(&mut self, commit: Option<Commit>) -> Option<Color> {
        let Commit { slot, color } = commit?;
        self.update_color(slot, color);
        Some(color)
    }
}
