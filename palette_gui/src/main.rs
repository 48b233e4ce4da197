use eframe::egui::{self, Align2, Color32, FontId, Sense, Stroke};
use palette_core::{
    Accounts, Color, Config, FeedEntry, Identity, JsonFileStore, MessagesClient, Outcome,
    PaletteEditor, PaletteView, SLOTS, Session, Studio, Subscription, rating,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;

mod picker_surface;

use picker_surface::PickerTextures;

const SWATCH_HEIGHT: f32 = 120.0;
const FEED_SWATCH_HEIGHT: f32 = 60.0;

fn main() -> eframe::Result<()> {
    let config_path = std::env::args().nth(1);
    let cfg = match Config::load(config_path.as_deref().map(std::path::Path::new)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config: {e:#}");
            Config::default()
        }
    };
    palette_core::configure_logging(&cfg.log_filter);

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Palette Party",
        options,
        Box::new(|_cc| Ok(Box::new(PaletteApp::new(cfg)?))),
    )
}

fn color32(c: Color) -> Color32 {
    Color32::from_rgb(c.r, c.g, c.b)
}

struct PaletteApp {
    cfg: Config,
    studio: Studio<JsonFileStore>,
    session: Session<Accounts>,
    /// Pushed by the session subscription; the UI never polls the provider.
    signed_in: Rc<RefCell<Option<Identity>>>,
    _session_watch: Subscription,

    // UI state
    email: String,
    password: String,
    auth_error: Option<String>,
    textures: PickerTextures,
    rating: Option<rating::Rating>,
    rating_rx: Option<mpsc::Receiver<rating::Rating>>,
}

impl PaletteApp {
    fn new(cfg: Config) -> anyhow::Result<Self> {
        let store = JsonFileStore::open(cfg.palettes_path())?;
        let accounts = Accounts::open(cfg.accounts_path())?;
        let session = Session::new(accounts);

        let signed_in = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&signed_in);
        let watch = session.on_session_change(move |who| {
            *sink.borrow_mut() = who.cloned();
        });

        Ok(Self {
            studio: Studio::new(store, PaletteEditor::new(cfg.picker)),
            cfg,
            session,
            signed_in,
            _session_watch: watch,
            email: String::new(),
            password: String::new(),
            auth_error: None,
            textures: PickerTextures::default(),
            rating: None,
            rating_rx: None,
        })
    }

    fn me(&self) -> Option<Identity> {
        self.signed_in.borrow().clone()
    }

    /// Rating runs off the UI thread; the result is picked up in `poll_rating`.
    fn start_rating(&mut self, ctx: &egui::Context) {
        let colors = self.studio.editor().draft().colors;
        let client = MessagesClient::from_config(&self.cfg.rating);
        let (tx, rx) = mpsc::channel();
        let repaint = ctx.clone();

        std::thread::spawn(move || {
            let score = match (client, tokio::runtime::Builder::new_current_thread().enable_all().build()) {
                (Ok(client), Ok(rt)) => rt.block_on(rating::rate(&client, &colors)),
                (Err(e), _) => {
                    tracing::warn!("{e:#}");
                    rating::Rating::FALLBACK
                }
                (_, Err(e)) => {
                    tracing::warn!(error = %e, "could not start rating runtime");
                    rating::Rating::FALLBACK
                }
            };
            let _ = tx.send(score);
            repaint.request_repaint();
        });

        self.rating = None;
        self.rating_rx = Some(rx);
    }

    fn poll_rating(&mut self) {
        if let Some(rx) = &self.rating_rx {
            if let Ok(score) = rx.try_recv() {
                self.rating = Some(score);
                self.rating_rx = None;
            }
        }
    }

    fn auth_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Palette Party");
            ui.separator();

            match self.me() {
                Some(me) => {
                    ui.label(format!("Signed in as {}", me.email));
                    if ui.button("Sign out").clicked() {
                        self.session.sign_out();
                        self.studio.signed_out();
                    }
                }
                None => {
                    ui.add(egui::TextEdit::singleline(&mut self.email).hint_text("e-mail").desired_width(160.0));
                    ui.add(
                        egui::TextEdit::singleline(&mut self.password)
                            .hint_text("password")
                            .password(true)
                            .desired_width(120.0),
                    );
                    let sign_in = ui.button("Sign in").clicked();
                    let sign_up = ui.button("Sign up").clicked();
                    let result = if sign_in {
                        Some(self.session.sign_in(&self.email, &self.password))
                    } else if sign_up {
                        Some(self.session.sign_up(&self.email, &self.password))
                    } else {
                        None
                    };
                    match result {
                        Some(Ok(_)) => {
                            self.password.clear();
                            self.auth_error = None;
                        }
                        Some(Err(e)) => self.auth_error = Some(e.to_string()),
                        None => {}
                    }
                }
            }
        });

        if let Some(err) = &self.auth_error {
            ui.colored_label(Color32::RED, err);
        }
    }

    /// Returns true if a fresh press landed on a swatch or the picker.
    fn editor_card(&mut self, ui: &mut egui::Ui) -> bool {
        let mut press_claimed = false;
        let pressed = ui.input(|i| i.pointer.primary_pressed());

        let width = ui.available_width().min(640.0);
        let swatch_w = width / SLOTS as f32;

        let mut clicked_slot = None;
        {
            let view = PaletteView::Editable(self.studio.editor_mut());
            ui.horizontal(|ui| {
                ui.spacing_mut().item_spacing.x = 0.0;
                for (i, c) in view.colors().into_iter().enumerate() {
                    let (rect, resp) = ui.allocate_exact_size(egui::vec2(swatch_w, SWATCH_HEIGHT), Sense::click());
                    let painter = ui.painter();
                    painter.rect_filled(rect, 0.0, color32(c));
                    if view.shows_add_marker(i) {
                        painter.text(rect.center(), Align2::CENTER_CENTER, "+", FontId::proportional(32.0), Color32::GRAY);
                    }
                    if view.active_picker() == Some(i) {
                        painter.rect_stroke(rect.shrink(2.0), 0.0, Stroke::new(3.0, Color32::BLACK));
                    }
                    if pressed && resp.hovered() {
                        press_claimed = true;
                    }
                    if resp.clicked() {
                        clicked_slot = Some(i);
                    }
                }
            });
        }
        if let Some(i) = clicked_slot {
            self.studio.editor_mut().select_swatch(i);
        }

        // Hex boxes: every keystroke updates the buffer, only full colors commit.
        ui.horizontal(|ui| {
            for i in 0..SLOTS {
                let mut text = self.studio.editor().hex_text(i).unwrap_or_default().to_string();
                let resp = ui.add(egui::TextEdit::singleline(&mut text).desired_width(swatch_w - 8.0));
                if resp.changed() {
                    self.studio.editor_mut().hex_input(i, &text);
                }
            }
        });

        if self.studio.editor().picker().open_slot().is_some() {
            let surface = picker_surface::show(ui, self.studio.editor_mut(), &mut self.textures);
            press_claimed |= surface.pressed_inside;
        }

        ui.add_space(8.0);
        let mut name = self.studio.editor().draft().name.clone();
        let resp = ui.add(
            egui::TextEdit::singleline(&mut name)
                .hint_text("Name your palette")
                .desired_width(width),
        );
        if resp.changed() {
            self.studio.editor_mut().set_name(name);
        }

        ui.horizontal(|ui| {
            let me = self.me();
            let label = if self.studio.editor().is_editing_existing() { "Update" } else { "Save" };
            if ui.button(label).clicked() {
                if let Outcome::Rejected(r) = self.studio.submit(me.as_ref()) {
                    tracing::debug!("draft not submitted: {r}");
                }
            }
            if self.studio.editor().is_editing_existing() && ui.button("Cancel").clicked() {
                self.studio.cancel_edit();
            }
            if self.rating_rx.is_some() {
                ui.spinner();
            } else if ui.button("Rate").clicked() {
                self.start_rating(ui.ctx());
            }
            if let Some(score) = self.rating {
                ui.label(format!("Rating: {}/3", score.value()));
            }
        });

        press_claimed
    }

    fn feed(&mut self, ui: &mut egui::Ui) {
        let me = self.me();
        let entries: Vec<FeedEntry> = self.studio.feed(me.as_ref());
        if entries.is_empty() {
            ui.label("(no palettes yet)");
            return;
        }

        for entry in entries {
            let Some(id) = entry.palette.id else { continue };
            ui.group(|ui| {
                let view = PaletteView::ReadOnly(&entry.palette);
                let width = ui.available_width().min(640.0);
                ui.horizontal(|ui| {
                    ui.spacing_mut().item_spacing.x = 0.0;
                    for c in view.colors() {
                        let (rect, _) = ui.allocate_exact_size(
                            egui::vec2(width / SLOTS as f32, FEED_SWATCH_HEIGHT),
                            Sense::hover(),
                        );
                        ui.painter().rect_filled(rect, 0.0, color32(c));
                    }
                });
                ui.horizontal(|ui| {
                    for label in view.labels() {
                        ui.add_sized([width / SLOTS as f32 - 4.0, 16.0], egui::Label::new(label));
                    }
                });
                ui.horizontal(|ui| {
                    ui.strong(&entry.palette.name);
                    if entry.can_edit {
                        if ui.small_button("Edit").clicked() {
                            self.studio.begin_edit(me.as_ref(), id);
                        }
                        if ui.small_button("Delete").clicked() {
                            self.studio.delete(me.as_ref(), id);
                        }
                    }
                });
            });
            ui.add_space(6.0);
        }
    }
}

impl eframe::App for PaletteApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_rating();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            self.auth_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                let press_claimed = self.editor_card(ui);

                // A press anywhere else closes the picker.
                let pressed = ui.input(|i| i.pointer.primary_pressed());
                if pressed && !press_claimed {
                    self.studio.editor_mut().dismiss_picker();
                }

                ui.separator();
                ui.heading("Community palettes");
                self.feed(ui);
            });
        });

        if let Some(notice) = self.studio.notice().cloned() {
            egui::Window::new("Notice")
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(notice.to_string());
                    if ui.button("OK").clicked() {
                        self.studio.dismiss_notice();
                    }
                });
        }
    }
}
