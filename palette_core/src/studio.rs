use std::fmt;

use crate::editor::{PaletteEditor, Rejection};
use crate::identity::Identity;
use crate::palette::{Palette, PaletteId, PalettePatch};
use crate::store::{PaletteStore, StoreError};

/// Something the user has to be told about. Validation problems are not
/// notices; an incomplete draft simply does not submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SignInRequired,
    NotOwner,
    /// The palette was deleted elsewhere; the feed has been refreshed.
    Vanished,
    Failed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SignInRequired => f.write_str("Sign in to save or change palettes."),
            Notice::NotOwner => f.write_str("You can only change your own palettes."),
            Notice::Vanished => f.write_str("That palette no longer exists."),
            Notice::Failed(msg) => write!(f, "Something went wrong: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(PaletteId),
    Updated(PaletteId),
    Deleted(PaletteId),
    Editing(PaletteId),
    Rejected(Rejection),
    Aborted(Notice),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub palette: Palette,
    pub can_edit: bool,
}

/// The editor, the feed, and the store they write to.
#[derive(Debug)]
pub struct Studio<S> {
    store: S,
    editor: PaletteEditor,
    feed: Vec<Palette>,
    notice: Option<Notice>,
}

impl<S: PaletteStore> Studio<S> {
    pub fn new(store: S, editor: PaletteEditor) -> Self {
        let mut studio = Self {
            store,
            editor,
            feed: Vec::new(),
            notice: None,
        };
        studio.refresh();
        studio
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn editor(&self) -> &PaletteEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut PaletteEditor {
        &mut self.editor
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Reload the feed from the store.
    pub fn refresh(&mut self) {
        match self.store.list() {
            Ok(list) => self.feed = list,
            Err(e) => {
                tracing::warn!(error = %e, "feed refresh failed");
                self.notice = Some(Notice::Failed(e.to_string()));
            }
        }
    }

    pub fn feed(&self, viewer: Option<&Identity>) -> Vec<FeedEntry> {
        self.feed
            .iter()
            .map(|p| FeedEntry {
                can_edit: viewer.is_some_and(|v| p.is_owned_by(&v.id)),
                palette: p.clone(),
            })
            .collect()
    }

    /// Validate the draft and create or update it in the store.
    pub fn submit(&mut self, caller: Option<&Identity>) -> Outcome {
        if caller.is_none() {
            return self.abort(Notice::SignInRequired);
        }

        let palette = match self.editor.try_submit() {
            Ok(p) => p,
            Err(r) => return Outcome::Rejected(r),
        };

        let result = match palette.id {
            Some(id) => self
                .store
                .update(caller, id, PalettePatch::from_palette(&palette))
                .map(|()| Outcome::Updated(id)),
            None => self
                .store
                .create(caller, palette.clone())
                .map(Outcome::Created),
        };

        match result {
            Ok(outcome) => {
                self.refresh();
                outcome
            }
            Err(StoreError::NotFound(_)) => self.vanished(),
            Err(e) => {
                // Keep the user's work when the store turns it down.
                self.editor.load(&palette);
                self.fail(e)
            }
        }
    }

    /// Load a stored palette into the editor. Only its owner may do this.
    pub fn begin_edit(&mut self, caller: Option<&Identity>, id: PaletteId) -> Outcome {
        let Some(caller) = caller else {
            return self.abort(Notice::SignInRequired);
        };
        let palette = match self.store.get(id) {
            Ok(p) => p,
            Err(StoreError::NotFound(_)) => return self.vanished(),
            Err(e) => return self.fail(e),
        };
        if !palette.is_owned_by(&caller.id) {
            return self.abort(Notice::NotOwner);
        }

        self.editor.load(&palette);
        Outcome::Editing(id)
    }

    pub fn cancel_edit(&mut self) {
        self.editor.reset();
    }

    pub fn delete(&mut self, caller: Option<&Identity>, id: PaletteId) -> Outcome {
        match self.store.delete(caller, id) {
            Ok(()) => {
                if self.editor.draft().id == Some(id) {
                    self.editor.reset();
                }
                self.refresh();
                Outcome::Deleted(id)
            }
            Err(StoreError::NotFound(_)) => self.vanished(),
            Err(e) => self.fail(e),
        }
    }

    /// Session ended: a draft of someone's stored palette must not linger.
    pub fn signed_out(&mut self) {
        if self.editor.is_editing_existing() {
            self.editor.reset();
        }
        self.editor.dismiss_picker();
    }

    fn abort(&mut self, notice: Notice) -> Outcome {
        self.notice = Some(notice.clone());
        Outcome::Aborted(notice)
    }

    fn vanished(&mut self) -> Outcome {
        self.editor.reset();
        self.refresh();
        self.abort(Notice::Vanished)
    }

    fn fail(&mut self, e: StoreError) -> Outcome {
        let notice = match e {
            StoreError::Unauthenticated => Notice::SignInRequired,
            StoreError::NotOwner(_) => Notice::NotOwner,
            StoreError::NotFound(_) => Notice::Vanished,
            other => {
                tracing::error!(error = %other, "store write failed");
                Notice::Failed(other.to_string())
            }
        };
        self.abort(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::identity::IdentityId;
    use crate::palette::SLOTS;
    use crate::store::MemoryStore;

    fn who(email: &str) -> Identity {
        Identity {
            id: IdentityId::new_random(),
            email: email.to_string(),
        }
    }

    fn fill(studio: &mut Studio<MemoryStore>, name: &str) {
        let ed = studio.editor_mut();
        for i in 0..SLOTS {
            ed.update_color(i, Color::from_rgb(i as u8 * 40, 0, 0));
        }
        ed.set_name(name);
    }

    fn studio() -> Studio<MemoryStore> {
        Studio::new(MemoryStore::new(), PaletteEditor::default())
    }

    #[test]
    fn submit_creates_and_refreshes_feed() {
        let a = who("a@x.io");
        let mut s = studio();
        fill(&mut s, "Embers");

        let Outcome::Created(id) = s.submit(Some(&a)) else {
            panic!("expected create");
        };
        let feed = s.feed(Some(&a));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].palette.id, Some(id));
        assert!(feed[0].can_edit);
        assert!(!s.feed(None)[0].can_edit);
    }

    #[test]
    fn signed_out_submit_is_blocked_and_keeps_draft() {
        let mut s = studio();
        fill(&mut s, "Embers");
        let before = s.editor().draft().clone();

        assert_eq!(s.submit(None), Outcome::Aborted(Notice::SignInRequired));
        assert_eq!(s.editor().draft(), &before);
        assert_eq!(s.notice(), Some(&Notice::SignInRequired));
    }

    #[test]
    fn incomplete_draft_is_rejected_quietly() {
        let a = who("a@x.io");
        let mut s = studio();
        s.editor_mut().set_name("Half done");

        assert!(matches!(s.submit(Some(&a)), Outcome::Rejected(_)));
        assert_eq!(s.notice(), None);
        assert!(s.feed(None).is_empty());
    }

    #[test]
    fn owner_edit_round_trip() {
        let a = who("a@x.io");
        let mut s = studio();
        fill(&mut s, "Before");
        let Outcome::Created(id) = s.submit(Some(&a)) else {
            panic!("expected create");
        };

        assert_eq!(s.begin_edit(Some(&a), id), Outcome::Editing(id));
        s.editor_mut().set_name("After");
        assert_eq!(s.submit(Some(&a)), Outcome::Updated(id));
        assert_eq!(s.feed(None)[0].palette.name, "After");
        assert_eq!(s.feed(None).len(), 1);
    }

    #[test]
    fn stranger_cannot_edit_or_delete() {
        let a = who("a@x.io");
        let b = who("b@x.io");
        let mut s = studio();
        fill(&mut s, "Mine");
        let Outcome::Created(id) = s.submit(Some(&a)) else {
            panic!("expected create");
        };

        assert_eq!(s.begin_edit(Some(&b), id), Outcome::Aborted(Notice::NotOwner));
        assert_eq!(s.delete(Some(&b), id), Outcome::Aborted(Notice::NotOwner));
        assert_eq!(s.feed(None).len(), 1);
    }

    #[test]
    fn palette_deleted_elsewhere_is_reported_and_feed_refreshed() {
        let a = who("a@x.io");
        let mut s = studio();
        fill(&mut s, "Doomed");
        let Outcome::Created(id) = s.submit(Some(&a)) else {
            panic!("expected create");
        };
        assert_eq!(s.begin_edit(Some(&a), id), Outcome::Editing(id));

        // Another client removes it behind our back.
        s.store.delete(Some(&a), id).unwrap();

        assert_eq!(s.submit(Some(&a)), Outcome::Aborted(Notice::Vanished));
        assert!(s.feed(None).is_empty());
        assert!(!s.editor().is_editing_existing());
    }

    #[test]
    fn delete_resets_editor_for_that_palette() {
        let a = who("a@x.io");
        let mut s = studio();
        fill(&mut s, "Short lived");
        let Outcome::Created(id) = s.submit(Some(&a)) else {
            panic!("expected create");
        };
        s.begin_edit(Some(&a), id);

        assert_eq!(s.delete(Some(&a), id), Outcome::Deleted(id));
        assert!(!s.editor().is_editing_existing());
        assert_eq!(s.delete(Some(&a), id), Outcome::Aborted(Notice::Vanished));
    }

    #[test]
    fn sign_out_drops_edit_mode() {
        let a = who("a@x.io");
        let mut s = studio();
        fill(&mut s, "Mine");
        let Outcome::Created(id) = s.submit(Some(&a)) else {
            panic!("expected create");
        };
        s.begin_edit(Some(&a), id);
        s.signed_out();
        assert!(!s.editor().is_editing_existing());
    }
}
