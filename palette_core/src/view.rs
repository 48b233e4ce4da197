use crate::color::Color;
use crate::editor::PaletteEditor;
use crate::palette::{Palette, SLOTS};
use crate::picker::PickerState;

/// A palette as a swatch row. Only the editable variant can open a picker,
/// so renderers never deal with a missing color callback.
#[derive(Debug)]
pub enum PaletteView<'a> {
    Editable(&'a mut PaletteEditor),
    ReadOnly(&'a Palette),
}

impl PaletteView<'_> {
    pub fn colors(&self) -> [Color; SLOTS] {
        match self {
            PaletteView::Editable(ed) => ed.draft().colors,
            PaletteView::ReadOnly(p) => p.colors,
        }
    }

    pub fn labels(&self) -> [String; SLOTS] {
        self.colors().map(|c| c.to_string())
    }

    pub fn active_picker(&self) -> Option<usize> {
        match self {
            PaletteView::Editable(ed) => ed.picker().open_slot(),
            PaletteView::ReadOnly(_) => None,
        }
    }

    /// Whether slot `i` should show the "pick a color" marker.
    pub fn shows_add_marker(&self, i: usize) -> bool {
        match self {
            PaletteView::Editable(ed) => !ed.draft().selected_states.get(i).copied().unwrap_or(true),
            PaletteView::ReadOnly(_) => false,
        }
    }

    /// Swatch click. Read-only rows ignore it.
    pub fn select_swatch(&mut self, i: usize) -> PickerState {
        match self {
            PaletteView::Editable(ed) => ed.select_swatch(i),
            PaletteView::ReadOnly(_) => PickerState::Idle,
        }
    }
}
