//! Open editor tabs.

/// Name given to fresh tabs.
pub const UNTITLED: &str = "New";

/// One open buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    id: u64,
    pub name: String,
    pub content: String,
    /// Content as last saved; `None` for a tab never saved.
    pub saved: Option<String>,
}

impl Tab {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the tab was never saved under a name.
    pub fn is_new(&self) -> bool {
        self.saved.is_none()
    }

    /// Never saved and empty.
    pub fn is_blank(&self) -> bool {
        self.saved.is_none() && self.content.is_empty()
    }

    pub fn is_unsaved(&self) -> bool {
        self.saved.as_deref() != Some(self.content.as_str())
    }

    /// Name with the unsaved marker.
    pub fn title(&self) -> String {
        if self.is_unsaved() {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Tab list with a selection.
#[derive(Debug, Clone, Default)]
pub struct EditorTabs {
    tabs: Vec<Tab>,
    selected: Option<usize>,
    next_id: u64,
}

impl EditorTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Tab> {
        self.selected.and_then(|idx| self.tabs.get(idx))
    }

    /// Opens a fresh, unnamed tab and selects it.
    pub fn new_tab(&mut self) -> u64 {
        self.push(UNTITLED.to_string(), String::new(), None)
    }

    /// Shows a file: a blank selected tab is reused, otherwise a new tab is
    /// opened.
    pub fn open_file(&mut self, name: &str, content: &str) -> u64 {
        if let Some(idx) = self.selected.filter(|&idx| self.tabs[idx].is_blank()) {
            let tab = &mut self.tabs[idx];
            tab.name = name.to_string();
            tab.content = content.to_string();
            tab.saved = Some(content.to_string());
            return tab.id;
        }
        self.push(name.to_string(), content.to_string(), Some(content.to_string()))
    }

    /// Replaces the selected tab's content.
    pub fn edit(&mut self, content: impl Into<String>) -> bool {
        match self.selected.and_then(|idx| self.tabs.get_mut(idx)) {
            Some(tab) => {
                tab.content = content.into();
                true
            }
            None => false,
        }
    }

    pub fn select(&mut self, idx: usize) -> bool {
        if idx < self.tabs.len() {
            self.selected = Some(idx);
            true
        } else {
            false
        }
    }

    /// Closes tab `idx`; the tab before the previous selection becomes
    /// selected.
    pub fn close(&mut self, idx: usize) -> Option<Tab> {
        if idx >= self.tabs.len() {
            return None;
        }
        let tab = self.tabs.remove(idx);
        self.selected = match (self.tabs.is_empty(), self.selected) {
            (true, _) => None,
            (false, Some(old)) => Some(old.saturating_sub(1).min(self.tabs.len() - 1)),
            (false, None) => Some(0),
        };
        Some(tab)
    }

    /// Records a successful save of tab `id` as `name`.
    pub fn mark_saved(&mut self, id: u64, name: &str, content: &str) -> bool {
        match self.tabs.iter_mut().find(|tab| tab.id == id) {
            Some(tab) => {
                tab.name = name.to_string();
                tab.saved = Some(content.to_string());
                true
            }
            None => false,
        }
    }

    fn push(&mut self, name: String, content: String, saved: Option<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tabs.push(Tab {
            id,
            name,
            content,
            saved,
        });
        self.selected = Some(self.tabs.len() - 1);
        id
    }
}
