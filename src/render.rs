//! Terminal rendering of the grid pane.
//!
//! Prints incremental updates as they happen: the "new posts" banner and
//! each freshly inserted fragment. Output is flushed eagerly so piped
//! consumers see lines as soon as they exist.

use std::io::Write;

use mural_core::{Catalog, CoverAction, Fragment, GridPane, LayoutEngine, MediaKey, StreamView};

/// Layout collaborator for the terminal pane. There is no geometry to pack
/// off-screen; the signals are traced so a relayout storm is visible.
#[derive(Debug, Default)]
pub struct TermLayout;

impl LayoutEngine for TermLayout {
    fn prepended(&mut self, count: usize) {
        tracing::debug!("{count} item(s) prepended to the grid");
    }

    fn layout(&mut self) {
        tracing::debug!("masonry relayout");
    }
}

pub struct TermPane {
    pane: GridPane<TermLayout>,
}

impl TermPane {
    pub fn new(catalog: Catalog) -> Self {
        TermPane {
            pane: GridPane::new(TermLayout, catalog),
        }
    }

    pub fn pane(&self) -> &GridPane<TermLayout> {
        &self.pane
    }

    /// A user click on the cover at `key`; reprints the fragment when a
    /// transition happened.
    pub fn click(&mut self, key: &MediaKey) -> bool {
        if !self.pane.click(key) {
            println!("no cover at post {} image {}", key.content, key.image);
            flush();
            return false;
        }
        if let Some(fragment) = self
            .pane
            .fragments()
            .iter()
            .find(|f| f.id == key.content)
            .cloned()
        {
            self.print_fragment(&fragment);
        }
        true
    }

    fn print_banner(&self) {
        let count = self.pane.label_count();
        let noun = if count == 1 { "post" } else { "posts" };
        println!("== {count} new {noun} available, press Enter to load ==");
        flush();
    }

    fn print_fragment(&self, fragment: &Fragment) {
        println!("* post {}", fragment.id);
        for line in fragment.markup.lines() {
            println!("  {line}");
        }
        for (index, media) in fragment.media.iter().enumerate() {
            let key = MediaKey::new(fragment.id.clone(), index);
            match self.pane.cover(&key) {
                Some(cover) if cover.action == CoverAction::Reveal => {
                    println!("  [ {} ]", cover.label);
                }
                Some(cover) => {
                    println!("  (image {}) [ {} ]", media.src, cover.label);
                }
                None => {
                    println!("  (image {})", media.src);
                }
            }
        }
        flush();
    }
}

impl StreamView for TermPane {
    fn show_new_label(&mut self) {
        let newly_visible = !self.pane.label_visible();
        self.pane.show_new_label();
        if newly_visible {
            self.print_banner();
        }
    }

    fn hide_new_label(&mut self) {
        self.pane.hide_new_label();
    }

    fn update_new_count(&mut self, count: usize) {
        let changed = self.pane.label_count() != count;
        self.pane.update_new_count(count);
        if self.pane.label_visible() && changed {
            self.print_banner();
        }
    }

    fn insert_batch(&mut self, batch: Vec<Fragment>) {
        let count = batch.len();
        self.pane.insert_batch(batch);
        // The batch sits at the front of the grid, in batch order.
        let inserted: Vec<Fragment> = self.pane.fragments()[..count].to_vec();
        for fragment in &inserted {
            self.print_fragment(fragment);
        }
    }

    fn scroll_to_top(&mut self) {
        self.pane.scroll_to_top();
    }
}

fn flush() {
    let _ = std::io::stdout().flush();
}
