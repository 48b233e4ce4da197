use eframe::egui::{self, Color32, Pos2, Rect, Sense, Stroke, TextureHandle, TextureOptions};
use palette_core::picker::{self, Raster};
use palette_core::{PaletteEditor, PickerState};

fn to_image(raster: &Raster) -> egui::ColorImage {
    let bytes: Vec<u8> = raster
        .pixels
        .iter()
        .flat_map(|c| [c.r, c.g, c.b])
        .collect();
    egui::ColorImage::from_rgb([raster.width, raster.height], &bytes)
}

/// Textures for the saturation/value field and the hue strip.
/// The field is re-rendered only when the hue moves.
#[derive(Default)]
pub struct PickerTextures {
    field: Option<(f64, TextureHandle)>,
    strip: Option<TextureHandle>,
}

impl PickerTextures {
    fn field(&mut self, ctx: &egui::Context, hue: f64, w: usize, h: usize) -> &TextureHandle {
        if let Some((cached, tex)) = &mut self.field {
            if *cached != hue {
                tex.set(to_image(&picker::render_field(hue, w, h)), TextureOptions::LINEAR);
                *cached = hue;
            }
        }
        let (_, tex) = self.field.get_or_insert_with(|| {
            let image = to_image(&picker::render_field(hue, w, h));
            (hue, ctx.load_texture("sv-field", image, TextureOptions::LINEAR))
        });
        tex
    }

    fn strip(&mut self, ctx: &egui::Context, w: usize, h: usize) -> &TextureHandle {
        self.strip.get_or_insert_with(|| {
            let image = to_image(&picker::render_hue_strip(w, h));
            ctx.load_texture("hue-strip", image, TextureOptions::LINEAR)
        })
    }
}

/// What happened on the surface this frame.
pub struct SurfaceResponse {
    /// The surface was under a fresh primary press.
    pub pressed_inside: bool,
}

/// Draw the picker for the editor's open slot and route pointer input into it.
pub fn show(
    ui: &mut egui::Ui,
    editor: &mut PaletteEditor,
    textures: &mut PickerTextures,
) -> SurfaceResponse {
    let geometry = editor.picker().geometry();
    let (fw, fh, sh) = (
        geometry.field_width as f32,
        geometry.field_height as f32,
        geometry.strip_height as f32,
    );

    let (rect, response) = ui.allocate_exact_size(egui::vec2(fw, fh + sh), Sense::click_and_drag());
    let field_rect = Rect::from_min_size(rect.min, egui::vec2(fw, fh));
    let strip_rect = Rect::from_min_size(rect.min + egui::vec2(0.0, fh), egui::vec2(fw, sh));

    let (pressed, released, pos) = ui.input(|i| {
        (
            i.pointer.primary_pressed(),
            i.pointer.primary_released(),
            i.pointer.interact_pos(),
        )
    });
    let local = |p: Pos2| ((p.x - rect.min.x) as f64, (p.y - rect.min.y) as f64);

    let pressed_inside = pressed && response.hovered();
    if pressed_inside {
        if let Some(p) = pos {
            let (x, y) = local(p);
            editor.pointer_down(x, y);
        }
    } else if matches!(editor.picker().state(), PickerState::Dragging(_)) {
        match pos {
            Some(p) if rect.contains(p) => {
                let (x, y) = local(p);
                editor.pointer_move(x, y);
            }
            _ => editor.pointer_leave(),
        }
    }
    if released {
        editor.pointer_up();
    }

    let hsv = editor.picker().hsv();
    let ctx = ui.ctx().clone();
    let uv = Rect::from_min_max(Pos2::ZERO, egui::pos2(1.0, 1.0));
    let painter = ui.painter_at(rect);

    let field = textures.field(&ctx, hsv.h, fw as usize, fh as usize);
    painter.image(field.id(), field_rect, uv, Color32::WHITE);
    let strip = textures.strip(&ctx, fw as usize, sh as usize);
    painter.image(strip.id(), strip_rect, uv, Color32::WHITE);

    let cursor = field_rect.min + egui::vec2(hsv.s as f32 * fw, (1.0 - hsv.v as f32) * fh);
    painter.circle_stroke(cursor, 5.0, Stroke::new(2.0, Color32::WHITE));
    painter.circle_stroke(cursor, 6.0, Stroke::new(1.0, Color32::BLACK));

    let hue_x = strip_rect.min.x + hsv.h as f32 * fw;
    painter.vline(hue_x, strip_rect.y_range(), Stroke::new(2.0, Color32::WHITE));

    if response.hovered() || response.dragged() {
        ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
    }

    SurfaceResponse { pressed_inside }
}
