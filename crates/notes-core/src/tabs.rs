use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use notes_platform::StorageType;

use crate::filename::default_file_name;
use crate::node::FileNode;
use crate::store::Store;

/// Identity of one tab instance; never reused and not stable across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(Uuid);

impl TabId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

/// One open editing session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabInfo {
    pub id: TabId,
    /// Backing node; absent until an unsaved tab is first saved
    pub file: Option<FileNode>,
    pub content: String,
    pub is_dirty: bool,
    pub is_unsaved: bool,
    pub default_file_name: Option<String>,
    pub cursor_position: Option<CursorPosition>,
}

impl TabInfo {
    /// Name shown for the tab: the file name, or the suggested name
    pub fn title(&self) -> &str {
        match (&self.file, &self.default_file_name) {
            (Some(file), _) => &file.name,
            (None, Some(name)) => name,
            (None, None) => "untitled",
        }
    }

    fn is_bound_to(&self, storage_type: StorageType) -> bool {
        self.file
            .as_ref()
            .map_or(false, |f| f.storage_type() == storage_type)
    }
}

/// Ordered tabs plus the active tab id, published as one value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditorState {
    pub tabs: Vec<TabInfo>,
    pub active_tab_id: Option<TabId>,
}

impl EditorState {
    pub fn active_tab(&self) -> Option<&TabInfo> {
        let id = self.active_tab_id?;
        self.tab(id)
    }

    pub fn tab(&self, id: TabId) -> Option<&TabInfo> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Tabs are keyed by path alone, whichever tree the node came from
    fn tab_for_path(&self, path: &str) -> Option<&TabInfo> {
        self.tabs
            .iter()
            .find(|t| t.file.as_ref().map_or(false, |f| f.path == path))
    }

    fn tab_mut(&mut self, id: TabId) -> Option<&mut TabInfo> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }
}

/// Editing session: the open tabs and which one is active.
///
/// Every method is a pure state transition. Callers run storage work first
/// and only report confirmed results here.
#[derive(Clone, Default)]
pub struct TabManager {
    state: Store<EditorState>,
}

impl TabManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> EditorState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorState> {
        self.state.subscribe()
    }

    pub fn tabs(&self) -> Vec<TabInfo> {
        self.state.with(|s| s.tabs.clone())
    }

    pub fn tab(&self, id: TabId) -> Option<TabInfo> {
        self.state.with(|s| s.tab(id).cloned())
    }

    pub fn active_tab_id(&self) -> Option<TabId> {
        self.state.with(|s| s.active_tab_id)
    }

    pub fn active_tab(&self) -> Option<TabInfo> {
        self.state.with(|s| s.active_tab().cloned())
    }

    /// Tab bound to a node at `path`
    pub fn find_by_path(&self, path: &str) -> Option<TabInfo> {
        self.state.with(|s| s.tab_for_path(path).cloned())
    }

    /// Activate the tab already showing `file`, or append a clean bound tab
    pub fn open_tab(&self, file: FileNode, initial_content: String) -> TabId {
        let mut opened = TabId::new();
        self.state.update(|state| {
            if let Some(existing) = state.tab_for_path(&file.path).map(|t| t.id) {
                debug!("{} already open in {}", file.path, existing);
                state.active_tab_id = Some(existing);
                opened = existing;
                return;
            }

            let id = opened;
            info!("opening {} ({}) in {}", file.path, file.storage_type(), id);
            state.tabs.push(TabInfo {
                id,
                file: Some(file),
                content: initial_content,
                is_dirty: false,
                is_unsaved: false,
                default_file_name: None,
                cursor_position: None,
            });
            state.active_tab_id = Some(id);
        });
        opened
    }

    /// Append and activate an empty document that has no backing file yet
    pub fn create_new_tab(&self) -> TabId {
        let id = TabId::new();
        let name = default_file_name();
        info!("new unsaved tab {} ({})", id, name);
        self.state.update(|state| {
            state.tabs.push(TabInfo {
                id,
                file: None,
                content: String::new(),
                is_dirty: false,
                is_unsaved: true,
                default_file_name: Some(name),
                cursor_position: None,
            });
            state.active_tab_id = Some(id);
        });
        id
    }

    /// Remove a tab. When it was active, the tab that slides into its index
    /// (or the new last tab) becomes active.
    pub fn close_tab(&self, id: TabId) -> bool {
        self.state.update_if(|state| {
            let Some(index) = state.tabs.iter().position(|t| t.id == id) else {
                return false;
            };
            state.tabs.remove(index);
            if state.active_tab_id == Some(id) {
                state.active_tab_id = if state.tabs.is_empty() {
                    None
                } else {
                    let next = index.min(state.tabs.len() - 1);
                    Some(state.tabs[next].id)
                };
            }
            true
        })
    }

    /// Switch activation to an open tab
    pub fn set_active(&self, id: TabId) -> bool {
        self.state.update_if(|state| {
            if state.tab(id).is_none() {
                return false;
            }
            state.active_tab_id = Some(id);
            true
        })
    }

    /// Replace the content. Always marks the tab dirty, even when the text
    /// is unchanged.
    pub fn update_tab_content(&self, id: TabId, content: String) -> bool {
        self.state.update_if(|state| match state.tab_mut(id) {
            Some(tab) => {
                tab.content = content;
                tab.is_dirty = true;
                true
            }
            None => false,
        })
    }

    /// Bind a previously unsaved tab to the file it was saved as
    pub fn update_tab_file(&self, id: TabId, file: FileNode) -> bool {
        self.state.update_if(|state| match state.tab_mut(id) {
            Some(tab) => {
                info!("{} bound to {} ({})", id, file.path, file.storage_type());
                tab.file = Some(file);
                tab.is_dirty = false;
                tab.is_unsaved = false;
                true
            }
            None => false,
        })
    }

    /// Clear the dirty flag after persisting a bound tab
    pub fn mark_tab_saved(&self, id: TabId) -> bool {
        self.state.update_if(|state| match state.tab_mut(id) {
            Some(tab) => {
                tab.is_dirty = false;
                true
            }
            None => false,
        })
    }

    pub fn set_cursor_position(&self, id: TabId, position: CursorPosition) -> bool {
        self.state.update_if(|state| match state.tab_mut(id) {
            Some(tab) => {
                tab.cursor_position = Some(position);
                true
            }
            None => false,
        })
    }

    /// Close every tab bound to a node of `storage_type`. Unsaved tabs stay.
    /// If the active tab goes, the first remaining tab becomes active.
    pub fn close_tabs_by_storage_type(&self, storage_type: StorageType) -> usize {
        let mut closed = 0;
        self.state.update_if(|state| {
            let before = state.tabs.len();
            let active_removed = state
                .active_tab()
                .map_or(false, |t| t.is_bound_to(storage_type));
            state.tabs.retain(|t| !t.is_bound_to(storage_type));
            closed = before - state.tabs.len();
            if closed == 0 {
                return false;
            }
            if active_removed {
                state.active_tab_id = state.tabs.first().map(|t| t.id);
            }
            true
        });
        if closed > 0 {
            info!("closed {} {} tab(s)", closed, storage_type);
        }
        closed
    }

    pub fn close_all_tabs(&self) {
        self.state.set(EditorState::default());
    }
}
