//! The canonical `ParsedIntent` sum type (spec §9 "Dynamic dispatch on verbs... replace with
//! a canonical ParsedIntent sum-type"). The dispatcher (`dispatcher.rs`) is an exhaustive
//! match over these variants.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickModifiers {
    pub shift: bool,
    pub cmd: bool,
    pub opt: bool,
    pub ctrl: bool,
    pub double: bool,
    pub triple: bool,
    pub right: bool,
}

/// Spatial/ordinal/container/coordinate disambiguation, resolved before verb dispatch
/// (spec §4.4 step 5).
#[derive(Debug, Clone, PartialEq)]
pub enum Disambiguator {
    None,
    Ordinal { n: i32, role: Option<String> },
    Spatial { direction: SpatialDirection, reference: String },
    Region(ScreenRegion),
    Container { row_match: String },
    ContainerIndex { row_n: usize },
    Coordinate { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialDirection {
    Below,
    Above,
    LeftOf,
    RightOf,
    Near,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenRegion {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrollTarget {
    Plain { direction: ScrollDirection, clicks: u32 },
    InElement { direction: ScrollDirection, clicks: u32, element: String },
    Until { target: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowSlot {
    LeftHalf,
    RightHalf,
    TopHalf,
    BottomHalf,
    Quarter(u8),
    Thirds(u8),
    Center,
    Coordinate(f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowOp {
    Tile { a: String, b: String },
    Move { app: Option<String>, slot: WindowSlot },
    Minimize,
    Restore,
    Maximize,
    Fullscreen,
    Resize { app: Option<String>, spec: ResizeSpec },
    CloseWindow,
    Info,
    ListWindows,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResizeSpec {
    Absolute { w: f64, h: f64 },
    Percent(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowserOp {
    NavigateUrl(String),
    Js(String),
    SwitchTab(String),
    NewTab(Option<String>),
    CloseTab(Option<String>),
    GetConsole,
    GetUrl,
    GetTabs,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOp {
    RecordStart { name: String, kind: RecordKind },
    RecordStop,
    Replay { name: String, kind: RecordKind },
    List(RecordKind),
    Delete { name: String, kind: RecordKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Workflow,
    Route,
}

/// Single-shot literal-phrase shortcuts (spec §4.4 step 2) that need no further parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    SelectAll,
    Copy,
    Paste,
    Undo,
    Redo,
    GetClipboard,
    GetSelection,
    GetTable,
    GetList,
    ListRecipes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedIntent {
    Click {
        target: String,
        role_filter: Option<String>,
        flags: ClickModifiers,
        disambiguator: Disambiguator,
        menu_path: Option<Vec<String>>,
    },
    Type {
        text: String,
        target: Option<String>,
    },
    Press {
        keys: Vec<String>,
    },
    Scroll(ScrollTarget),
    Hover {
        target: String,
    },
    Drag {
        from: String,
        to: String,
    },
    Fill {
        fields: Vec<(String, String)>,
    },
    Wait {
        target: Option<String>,
        timeout: Duration,
        until_disappears: bool,
    },
    Open {
        app: String,
    },
    SwitchTo {
        app: String,
    },
    Menu {
        path: Vec<String>,
    },
    WindowOp(WindowOp),
    NavPath {
        steps: Vec<String>,
    },
    BrowserOp(BrowserOp),
    WorkflowOp(WorkflowOp),
    Shortcut(Shortcut),
    WhereIsApp {
        app: String,
    },
    CloseWindow,
    Chain(Vec<ParsedIntent>),
}

impl ParsedIntent {
    /// Getter intents (spec §4.5/§7: "Getter intents suppress the snapshot-and-verify
    /// overhead" and are formatted without a diff/post-state).
    pub fn is_getter(&self) -> bool {
        matches!(
            self,
            ParsedIntent::Shortcut(
                Shortcut::GetClipboard
                    | Shortcut::GetSelection
                    | Shortcut::GetTable
                    | Shortcut::GetList
                    | Shortcut::ListRecipes
            ) | ParsedIntent::BrowserOp(BrowserOp::GetConsole | BrowserOp::GetUrl | BrowserOp::GetTabs)
                | ParsedIntent::WindowOp(WindowOp::Info | WindowOp::ListWindows)
                | ParsedIntent::WhereIsApp { .. }
                | ParsedIntent::WorkflowOp(WorkflowOp::List(_))
        )
    }

    /// The target-phrase string carried by this intent, if any, used to key label-learning
    /// lookups and the fail-then-success correlation (spec §4.8). `Drag` reports `from` since
    /// that is the element the user actually named as the starting target; variants with no
    /// single named target (menu paths, window ops, shortcuts) return `None`.
    pub fn target(&self) -> Option<&str> {
        match self {
            ParsedIntent::Click { target, .. } => Some(target),
            ParsedIntent::Type { target, .. } => target.as_deref(),
            ParsedIntent::Hover { target } => Some(target),
            ParsedIntent::Drag { from, .. } => Some(from),
            ParsedIntent::Wait { target, .. } => target.as_deref(),
            _ => None,
        }
    }

    /// The canonical verb string, used for label-learning correlation (spec §4.8) and
    /// journal/recipe matching keyed by verb.
    pub fn canonical_verb(&self) -> &'static str {
        match self {
            ParsedIntent::Click { .. } => "click",
            ParsedIntent::Type { .. } => "type",
            ParsedIntent::Press { .. } => "press",
            ParsedIntent::Scroll(_) => "scroll",
            ParsedIntent::Hover { .. } => "hover",
            ParsedIntent::Drag { .. } => "drag",
            ParsedIntent::Fill { .. } => "fill",
            ParsedIntent::Wait { .. } => "wait",
            ParsedIntent::Open { .. } => "open",
            ParsedIntent::SwitchTo { .. } => "switch_to",
            ParsedIntent::Menu { .. } => "menu",
            ParsedIntent::WindowOp(_) => "window",
            ParsedIntent::NavPath { .. } => "navigate_path",
            ParsedIntent::BrowserOp(_) => "browser",
            ParsedIntent::WorkflowOp(_) => "workflow",
            ParsedIntent::Shortcut(_) => "shortcut",
            ParsedIntent::WhereIsApp { .. } => "where_is",
            ParsedIntent::CloseWindow => "close_window",
            ParsedIntent::Chain(_) => "chain",
        }
    }
}
