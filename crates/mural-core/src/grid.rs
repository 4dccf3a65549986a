//! Grid pane: the presentation side of the stream.
//!
//! The pane is an in-memory model of the masonry grid. It owns the fragment
//! list, the "new posts" label, and the shield covers; packing itself is the
//! layout engine's problem.

use std::collections::HashMap;

use crate::i18n::{Catalog, MSG_HIDE_SENSITIVE, MSG_SHOW_SENSITIVE};
use crate::markup;
use crate::shield::{MediaKey, ShieldRegistry, ShieldState};
use crate::types::{ContentId, ContentItem};

/// Marker class the server puts on sensitive images.
pub const SENSITIVE_CLASS: &str = "nsfw";

/// One image referenced by a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub src: String,
    pub sensitive: bool,
}

/// A delivered post prepared for the grid.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: ContentId,
    pub markup: String,
    pub media: Vec<MediaRef>,
}

impl Fragment {
    /// Wraps a delivered item, scanning its markup for image references.
    pub fn from_item(item: ContentItem) -> Self {
        let media = markup::scan_images(&item.rendered)
            .into_iter()
            .map(|img| MediaRef {
                sensitive: img.has_class(SENSITIVE_CLASS),
                src: img.src,
            })
            .collect();
        Fragment {
            id: item.id,
            markup: item.rendered,
            media,
        }
    }
}

/// Mutation surface the controller drives. Implementations are expected to
/// be pure effects over their own state; the controller owns all decisions.
pub trait StreamView {
    fn show_new_label(&mut self);
    fn hide_new_label(&mut self);
    fn update_new_count(&mut self, count: usize);
    /// Insert all fragments at the front of the grid in one operation, so
    /// packing recalculation runs once per batch rather than once per item.
    fn insert_batch(&mut self, batch: Vec<Fragment>);
    fn scroll_to_top(&mut self);
}

/// Masonry collaborator. Owns item packing; the pane only signals it.
pub trait LayoutEngine {
    /// New items were added at the front of the grid.
    fn prepended(&mut self, count: usize);
    /// Recompute the packing.
    fn layout(&mut self);
}

/// Instrumenting engine: records every signal it receives. Backs the tests
/// and doubles as a no-op engine for headless use.
#[derive(Debug, Default)]
pub struct CountingLayout {
    pub prepended_batches: Vec<usize>,
    pub layout_runs: usize,
}

impl LayoutEngine for CountingLayout {
    fn prepended(&mut self, count: usize) {
        self.prepended_batches.push(count);
    }

    fn layout(&mut self) {
        self.layout_runs += 1;
    }
}

/// What clicking a cover does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverAction {
    Reveal,
    Reshield,
}

/// Clickable affordance sitting above an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub label: String,
    pub action: CoverAction,
}

pub struct GridPane<L> {
    fragments: Vec<Fragment>,
    label_visible: bool,
    label_count: usize,
    viewport_offset: usize,
    shields: ShieldRegistry,
    covers: HashMap<MediaKey, Cover>,
    layout: L,
    catalog: Catalog,
}

impl<L: LayoutEngine> GridPane<L> {
    pub fn new(layout: L, catalog: Catalog) -> Self {
        GridPane {
            fragments: Vec::new(),
            label_visible: false,
            label_count: 0,
            viewport_offset: 0,
            shields: ShieldRegistry::new(),
            covers: HashMap::new(),
            layout,
            catalog,
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn label_visible(&self) -> bool {
        self.label_visible
    }

    pub fn label_count(&self) -> usize {
        self.label_count
    }

    pub fn viewport_offset(&self) -> usize {
        self.viewport_offset
    }

    pub fn cover(&self, key: &MediaKey) -> Option<&Cover> {
        self.covers.get(key)
    }

    pub fn shield_state(&self, key: &MediaKey) -> Option<ShieldState> {
        self.shields.state(key)
    }

    pub fn layout_engine(&self) -> &L {
        &self.layout
    }

    /// Ask the layout engine for a recalculation. The engine owns
    /// progressive image-load notifications; the pane calls this wherever
    /// the grid contents or cover geometry changed.
    pub fn reflow(&mut self) {
        self.layout.layout();
    }

    /// Cover every sensitive image that has not been through a shield pass
    /// yet. Keyed registration makes repeated passes no-ops.
    pub fn apply_shield(&mut self) {
        for key in self.sensitive_keys() {
            if self.shields.mark_shielded(&key) {
                let label = self.catalog.translate(MSG_SHOW_SENSITIVE);
                self.covers.insert(
                    key,
                    Cover {
                        label,
                        action: CoverAction::Reveal,
                    },
                );
            }
        }
    }

    /// Give every revealed image without a cover a "hide again" affordance.
    pub fn apply_unshield(&mut self) {
        for key in self.sensitive_keys() {
            if self.shields.state(&key) == Some(ShieldState::Revealed)
                && !self.covers.contains_key(&key)
            {
                let label = self.catalog.translate(MSG_HIDE_SENSITIVE);
                self.covers.insert(
                    key,
                    Cover {
                        label,
                        action: CoverAction::Reshield,
                    },
                );
            }
        }
    }

    /// A click on the cover at `key`. Returns true when a transition
    /// happened; clicking where no cover exists is a no-op.
    pub fn click(&mut self, key: &MediaKey) -> bool {
        let Some(cover) = self.covers.get(key) else {
            return false;
        };
        match cover.action {
            CoverAction::Reveal => {
                self.covers.remove(key);
                self.shields.reveal(key);
                self.apply_unshield();
                self.reflow();
            }
            CoverAction::Reshield => {
                self.covers.remove(key);
                self.shields.reshield(key);
                let label = self.catalog.translate(MSG_SHOW_SENSITIVE);
                self.covers.insert(
                    key.clone(),
                    Cover {
                        label,
                        action: CoverAction::Reveal,
                    },
                );
                // Anything else left unmarked gets picked up too.
                self.apply_shield();
                self.reflow();
            }
        }
        true
    }

    fn sensitive_keys(&self) -> Vec<MediaKey> {
        self.fragments
            .iter()
            .flat_map(|fragment| {
                fragment
                    .media
                    .iter()
                    .enumerate()
                    .filter(|(_, media)| media.sensitive)
                    .map(|(index, _)| MediaKey::new(fragment.id.clone(), index))
            })
            .collect()
    }
}

impl<L: LayoutEngine> StreamView for GridPane<L> {
    fn show_new_label(&mut self) {
        self.label_visible = true;
    }

    fn hide_new_label(&mut self) {
        self.label_visible = false;
    }

    fn update_new_count(&mut self, count: usize) {
        self.label_count = count;
    }

    fn insert_batch(&mut self, batch: Vec<Fragment>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        self.fragments.splice(0..0, batch);
        self.layout.prepended(count);
        self.reflow();
        // Fresh content may itself be sensitive.
        self.apply_shield();
    }

    fn scroll_to_top(&mut self) {
        self.viewport_offset = 0;
    }
}
