// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module browser: the searchable list of registered module types.

/// Browser state
#[derive(Debug, Clone, Default)]
pub struct ModuleBrowser {
    names: Vec<String>,
    filter: String,
    entries: Vec<String>,
    visible: bool,
}

impl ModuleBrowser {
    /// Create a hidden browser over the given type names
    pub fn new(mut names: Vec<String>) -> Self {
        names.sort();
        let entries = names.clone();
        Self {
            names,
            filter: String::new(),
            entries,
            visible: false,
        }
    }

    /// Whether the browser is shown
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    /// Hide the browser
    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Set the case-insensitive search text
    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    /// Recompute the visible entries from the filter
    pub fn update(&mut self) {
        let needle = self.filter.to_lowercase();
        self.entries = self
            .names
            .iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
    }

    /// Entries matching the current filter
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Type name at a visible index
    pub fn entry(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter() {
        let mut browser = ModuleBrowser::new(vec![
            "SHADER".to_string(),
            "MIXER".to_string(),
            "LAYER MIXER".to_string(),
        ]);
        assert_eq!(browser.entries(), ["LAYER MIXER", "MIXER", "SHADER"]);
        browser.set_filter("mix");
        browser.update();
        assert_eq!(browser.entries(), ["LAYER MIXER", "MIXER"]);
        assert_eq!(browser.entry(1), Some("MIXER"));
        assert_eq!(browser.entry(2), None);
    }

    #[test]
    fn test_toggle() {
        let mut browser = ModuleBrowser::default();
        assert!(!browser.is_visible());
        browser.toggle();
        assert!(browser.is_visible());
        browser.hide();
        assert!(!browser.is_visible());
    }
}
