pub mod color;
pub mod config;
pub mod editor;
pub mod identity;
pub mod logging;
pub mod palette;
pub mod picker;
pub mod rating;
pub mod store;
pub mod studio;
pub mod view;

pub use color::{Color, ColorParseError, HexEntry, Hsv, hsv_to_rgb, rgb_to_hex, rgb_to_hsv};
pub use config::{Config, RatingConfig};
pub use editor::{Draft, PLACEHOLDER, PaletteEditor, Rejection, SubmitRule};
pub use identity::{Accounts, AuthError, Identity, IdentityId, IdentityProvider, Session, Subscription};
pub use logging::configure_logging;
pub use palette::{Palette, PaletteId, PalettePatch, SLOTS};
pub use picker::{Picker, PickerGeometry, PickerState};
pub use rating::{MessagesClient, Rating, TextGenerator};
pub use store::{JsonFileStore, MemoryStore, PaletteStore, StoreError};
pub use studio::{FeedEntry, Notice, Outcome, Studio};
pub use view::PaletteView;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
