//! Shared data model: the types every layer, the fusion module, and the store pass around.
//!
//! Grounded on spec §3. Kept deliberately flat — these are plain data, not behavior.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed enumeration of semantic roles an [`Element`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Button,
    Link,
    Tab,
    TextField,
    TextArea,
    Checkbox,
    Radio,
    MenuItem,
    StaticText,
    Image,
    Slider,
    Switch,
    List,
    Table,
    Outline,
    Toolbar,
    Dialog,
    Group,
    Other,
}

impl Role {
    /// Maps a raw AX role string (e.g. `"AXButton"`) onto the closed enumeration.
    pub fn from_ax_role(raw: &str) -> Role {
        match raw.trim_start_matches("AX") {
            "Button" => Role::Button,
            "Link" => Role::Link,
            "Tab" | "TabGroup" => Role::Tab,
            "TextField" | "SearchField" => Role::TextField,
            "TextArea" => Role::TextArea,
            "CheckBox" => Role::Checkbox,
            "RadioButton" => Role::Radio,
            "MenuItem" | "MenuBarItem" => Role::MenuItem,
            "StaticText" => Role::StaticText,
            "Image" => Role::Image,
            "Slider" => Role::Slider,
            "SwitchControl" => Role::Switch,
            "List" => Role::List,
            "Table" => Role::Table,
            "Outline" => Role::Outline,
            "Toolbar" => Role::Toolbar,
            "Dialog" | "Sheet" => Role::Dialog,
            "Group" | "ScrollArea" | "SplitGroup" => Role::Group,
            _ => Role::Other,
        }
    }
}

/// Where an [`Element`] came from. Never the same for two layers in one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Tree,
    Ocr,
    Template,
}

/// An opaque, non-serializable handle to a live accessibility object.
///
/// Per spec §3/§9: handles never cross the perceive/act boundary and are never cached.
/// The accessibility adapter is the only thing that constructs or dereferences one.
pub struct ElementHandle(pub(crate) Box<dyn std::any::Any + Send + Sync>);

impl std::fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ElementHandle(..)")
    }
}

/// A perceived UI item.
///
/// Invariant: an element carries either `handle` or `position`, never neither (see
/// [`Element::has_locator`]). Elements from non-tree layers always carry a `source` other
/// than [`SourceTag::Tree`].
#[derive(Debug)]
pub struct Element {
    pub role: Role,
    pub raw_role: String,
    pub label: String,
    pub value: Option<String>,
    pub position: Option<(f64, f64)>,
    pub size: Option<(f64, f64)>,
    pub enabled: bool,
    pub focused: bool,
    pub source: SourceTag,
    pub handle: Option<ElementHandle>,
    /// Label of the immediate enclosing `group`/`toolbar`/`table` container, if any, as seen
    /// during the tree walk. Used by fusion's container-grouped listing (spec §4.3) and the
    /// intent parser's container disambiguator (spec §4.4).
    pub container: Option<String>,
}

impl Element {
    pub fn has_locator(&self) -> bool {
        self.handle.is_some() || self.position.is_some()
    }

    /// The stripped, serializable projection cached by the spatial cache (§4.9): never
    /// includes `handle`, since handles go stale the instant the perceive call returns.
    pub fn to_cached(&self) -> CachedElement {
        CachedElement {
            role: self.role,
            raw_role: self.raw_role.clone(),
            label: self.label.clone(),
            value: self.value.clone(),
            position: self.position,
            size: self.size,
            enabled: self.enabled,
            focused: self.focused,
            source: self.source,
            container: self.container.clone(),
        }
    }
}

/// A handle-free, serializable copy of an [`Element`] — what the spatial cache stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedElement {
    pub role: Role,
    pub raw_role: String,
    pub label: String,
    pub value: Option<String>,
    pub position: Option<(f64, f64)>,
    pub size: Option<(f64, f64)>,
    pub enabled: bool,
    pub focused: bool,
    pub source: SourceTag,
    pub container: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub pid: i32,
    pub name: String,
    pub bundle_id: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowInfo {
    pub app_name: String,
    pub title: String,
    pub pid: i32,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Bounds {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }
}

/// A before/after capture of app state, used to compute diffs (§3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub app_name: String,
    /// role+label+value of the focused element, if any.
    pub focus_key: Option<String>,
    pub windows: Vec<(String, String)>,
    /// element key (role:label) -> (role, label, value, enabled)
    pub elements: BTreeMap<String, (String, String, Option<String>, bool)>,
    pub fingerprint: String,
}

/// An entry in the 50-capacity action journal ring (§3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: f64,
    pub intent_text: String,
    pub app: String,
    pub ok: bool,
    pub elapsed_s: f64,
    pub error: String,
    pub post_diff: String,
}
