//! Host page state the overlay sits on top of.

use serde::Serialize;

use crate::config::PageConfig;

/// Navbar style and editor visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageState {
    /// Whether the navbar uses its scrolled style.
    pub navbar_scrolled: bool,
    /// Whether the note editor is open.
    pub editor_open: bool,
    #[serde(skip)]
    threshold: u32,
}

impl PageState {
    /// A freshly loaded page: top of the page, editor closed.
    #[must_use]
    pub fn new(config: &PageConfig) -> Self {
        Self {
            navbar_scrolled: false,
            editor_open: false,
            threshold: config.navbar_scroll_threshold,
        }
    }

    /// Report the vertical scroll offset. Returns whether the navbar style
    /// changed.
    pub fn on_scroll(&mut self, offset: u32) -> bool {
        let scrolled = offset > self.threshold;
        let changed = scrolled != self.navbar_scrolled;
        self.navbar_scrolled = scrolled;
        changed
    }

    /// Open or close the note editor.
    pub fn toggle_editor(&mut self) -> bool {
        self.editor_open = !self.editor_open;
        self.editor_open
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(&PageConfig::default())
    }
}
