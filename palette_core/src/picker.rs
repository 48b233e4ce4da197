use serde::{Deserialize, Serialize};

use crate::color::{Color, Hsv, clamp_unit, hsv_to_rgb};

/// Where the picker is in its interaction cycle. The slot index is the
/// palette slot the picker is editing; at most one slot is ever open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickerState {
    #[default]
    Idle,
    Open(usize),
    Dragging(usize),
}

impl PickerState {
    pub fn slot(self) -> Option<usize> {
        match self {
            PickerState::Idle => None,
            PickerState::Open(i) | PickerState::Dragging(i) => Some(i),
        }
    }
}

/// Surface layout: a saturation/value field with a hue strip directly below it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerGeometry {
    pub field_width: f64,
    pub field_height: f64,
    pub strip_height: f64,
}

impl Default for PickerGeometry {
    fn default() -> Self {
        Self {
            field_width: 150.0,
            field_height: 150.0,
            strip_height: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Field,
    HueStrip,
}

impl PickerGeometry {
    pub fn total_height(&self) -> f64 {
        self.field_height + self.strip_height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.field_width).contains(&x) && (0.0..=self.total_height()).contains(&y)
    }

    pub fn region(&self, y: f64) -> Region {
        if y <= self.field_height {
            Region::Field
        } else {
            Region::HueStrip
        }
    }

    /// Map a pointer position to a new HSV. The field drives saturation and
    /// value; the strip drives hue. Whatever the pointer is not over keeps its value.
    pub fn map_pointer(&self, current: Hsv, x: f64, y: f64) -> Hsv {
        let fx = clamp_unit(x / self.field_width);
        match self.region(y) {
            Region::Field => Hsv {
                s: fx,
                v: clamp_unit(1.0 - y / self.field_height),
                ..current
            },
            Region::HueStrip => Hsv { h: fx, ..current },
        }
    }
}

/// A color the picker wants written into a palette slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    pub slot: usize,
    pub color: Color,
}

#[derive(Debug, Clone)]
pub struct Picker {
    state: PickerState,
    hsv: Hsv,
    geometry: PickerGeometry,
}

impl Default for Picker {
    fn default() -> Self {
        Self::new(PickerGeometry::default())
    }
}

impl Picker {
    pub fn new(geometry: PickerGeometry) -> Self {
        Self {
            state: PickerState::Idle,
            hsv: Hsv::default(),
            geometry,
        }
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    pub fn open_slot(&self) -> Option<usize> {
        self.state.slot()
    }

    pub fn hsv(&self) -> Hsv {
        self.hsv
    }

    pub fn geometry(&self) -> PickerGeometry {
        self.geometry
    }

    /// Swatch `slot` was clicked. Clicking the open swatch closes it; any other
    /// swatch takes over. `seed` is the slot's color if it was explicitly set,
    /// so the cursor starts where that color lives.
    pub fn select_swatch(&mut self, slot: usize, seed: Option<Color>) -> PickerState {
        self.state = match self.state.slot() {
            Some(open) if open == slot => PickerState::Idle,
            _ => {
                if let Some(c) = seed {
                    let hsv = c.to_hsv();
                    // Greys carry no hue; keep the strip where the user left it.
                    self.hsv = if hsv.s == 0.0 {
                        Hsv { h: self.hsv.h, ..hsv }
                    } else {
                        hsv
                    };
                }
                PickerState::Open(slot)
            }
        };
        self.state
    }

    /// A click landed somewhere outside the picker surface.
    pub fn dismiss(&mut self) {
        self.state = PickerState::Idle;
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) -> Option<Commit> {
        let PickerState::Open(slot) = self.state else {
            return None;
        };
        if !self.geometry.contains(x, y) {
            return None;
        }
        self.state = PickerState::Dragging(slot);
        self.track(slot, x, y)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<Commit> {
        match self.state {
            PickerState::Dragging(slot) => self.track(slot, x, y),
            _ => None,
        }
    }

    pub fn pointer_up(&mut self) {
        if let PickerState::Dragging(slot) = self.state {
            self.state = PickerState::Open(slot);
        }
    }

    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    /// Set the hue directly. An open slot is recommitted with the current saturation/value.
    pub fn set_hue(&mut self, h: f64) -> Option<Commit> {
        self.hsv = Hsv::new(h, self.hsv.s, self.hsv.v);
        self.commit()
    }

    fn track(&mut self, slot: usize, x: f64, y: f64) -> Option<Commit> {
        self.hsv = self.geometry.map_pointer(self.hsv, x, y);
        Some(Commit {
            slot,
            color: Color::from_hsv(self.hsv),
        })
    }

    fn commit(&self) -> Option<Commit> {
        self.state.slot().map(|slot| Commit {
            slot,
            color: Color::from_hsv(self.hsv),
        })
    }
}

/// Row-major RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Color>,
}

impl Raster {
    pub fn get(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }
}

/// The saturation/value field pixel at (x, y) for a field of `width` x `height`.
pub fn field_pixel(hue: f64, x: f64, y: f64, width: f64, height: f64) -> Color {
    let (r, g, b) = hsv_to_rgb(hue, x / width, 1.0 - y / height);
    Color::from_rgb(r, g, b)
}

pub fn render_field(hue: f64, width: usize, height: usize) -> Raster {
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            pixels.push(field_pixel(hue, x as f64, y as f64, width as f64, height as f64));
        }
    }
    Raster {
        width,
        height,
        pixels,
    }
}

pub const HUE_STOPS: usize = 7;

/// Gradient stops for the hue strip: hues 0, 1/6, ..., 1 at full saturation and value.
pub fn hue_strip_stops() -> [Color; HUE_STOPS] {
    std::array::from_fn(|k| Color::from_hsv(Hsv::new(k as f64 / 6.0, 1.0, 1.0)))
}

/// Linear interpolation between the two stops surrounding `t` (0..=1).
pub fn hue_strip_color(t: f64) -> Color {
    let stops = hue_strip_stops();
    let pos = clamp_unit(t) * (HUE_STOPS - 1) as f64;
    let lo = (pos.floor() as usize).min(HUE_STOPS - 2);
    let frac = pos - lo as f64;

    let (a, b) = (stops[lo], stops[lo + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
    Color::from_rgb(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
}

pub fn render_hue_strip(width: usize, height: usize) -> Raster {
    let row: Vec<Color> = (0..width)
        .map(|x| {
            let t = if width > 1 {
                x as f64 / (width - 1) as f64
            } else {
                0.0
            };
            hue_strip_color(t)
        })
        .collect();

    let mut pixels = Vec::with_capacity(width * height);
    for _ in 0..height {
        pixels.extend_from_slice(&row);
    }
    Raster {
        width,
        height,
        pixels,
    }
}
