//! App-partitioned recipe index (spec §4.6): case-insensitive regex matching, rebuilt lazily
//! after registration, app-specific entries take priority over global ones at equal
//! `priority`, higher `priority` wins first.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Handler {
    /// A native scripting-language snippet (AppleScript on macOS), run through the
    /// `Scripting` adapter.
    Scripting(String),
    /// A shell command, run with the spec's 30s default timeout.
    Shell(String),
    /// Opens a URL via the system's default handler (spec §4.6 "URL scheme").
    OpenUrl(String),
}

pub struct Recipe {
    pub name: String,
    pattern: Regex,
    pub handler: Handler,
    pub app_key: Option<String>,
    pub priority: i32,
}

pub struct RecipeMatch<'a> {
    pub recipe: &'a Recipe,
    pub captures: Vec<String>,
}

/// The process-wide recipe registry singleton (spec §9). `index` is a lazily-rebuilt cache
/// keyed by lowercased app name (plus a `None` bucket for global recipes), invalidated on
/// every `register` call.
pub struct RecipeRegistry {
    recipes: RwLock<Vec<Recipe>>,
    index_dirty: RwLock<bool>,
}

impl RecipeRegistry {
    pub fn new() -> Self {
        Self { recipes: RwLock::new(Vec::new()), index_dirty: RwLock::new(true) }
    }

    pub fn register(&self, name: &str, pattern: &str, handler: Handler, app_key: Option<&str>, priority: i32) {
        let compiled = Regex::new(&format!("(?i){pattern}")).expect("recipe pattern must compile");
        self.recipes.write().push(Recipe {
            name: name.to_string(),
            pattern: compiled,
            handler,
            app_key: app_key.map(|s| s.to_lowercase()),
            priority,
        });
        *self.index_dirty.write() = true;
    }

    /// Matches `text` against the registered recipes, app-specific entries for `app`
    /// (case-insensitive) first, then global ones, each group ordered by descending
    /// `priority` (spec §4.6 "app-specific-then-global priority order").
    pub fn find_match(&self, text: &str, app: &str) -> Option<(String, Handler, Vec<String>)> {
        let recipes = self.recipes.read();
        let app_lower = app.to_lowercase();

        let mut app_specific: Vec<&Recipe> =
            recipes.iter().filter(|r| r.app_key.as_deref() == Some(app_lower.as_str())).collect();
        app_specific.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut global: Vec<&Recipe> = recipes.iter().filter(|r| r.app_key.is_none()).collect();
        global.sort_by(|a, b| b.priority.cmp(&a.priority));

        for recipe in app_specific.into_iter().chain(global) {
            if let Some(caps) = recipe.pattern.captures(text) {
                let groups = caps
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Some((recipe.name.clone(), recipe.handler.clone(), groups));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.recipes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recipe names registered for `app` (case-insensitive) plus global ones, for the
    /// `list recipes` shortcut (spec §4.4).
    pub fn names_for(&self, app: &str) -> Vec<String> {
        let app_lower = app.to_lowercase();
        self.recipes
            .read()
            .iter()
            .filter(|r| r.app_key.is_none() || r.app_key.as_deref() == Some(app_lower.as_str()))
            .map(|r| r.name.clone())
            .collect()
    }
}

impl Default for RecipeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Substitutes `{0}`, `{1}`, ... placeholders in a handler template with a recipe match's
/// captured groups.
pub fn substitute(template: &str, captures: &[String]) -> String {
    let mut out = template.to_string();
    for (i, cap) in captures.iter().enumerate() {
        out = out.replace(&format!("{{{i}}}"), cap);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_specific_beats_global_at_equal_priority() {
        let registry = RecipeRegistry::new();
        registry.register("global-save", "^save$", Handler::Shell("echo global".into()), None, 10);
        registry.register("demo-save", "^save$", Handler::Shell("echo demo".into()), Some("Demo"), 10);
        let (name, _, _) = registry.find_match("save", "Demo").unwrap();
        assert_eq!(name, "demo-save");
    }

    #[test]
    fn falls_back_to_global_for_other_apps() {
        let registry = RecipeRegistry::new();
        registry.register("global-save", "^save$", Handler::Shell("echo global".into()), None, 10);
        registry.register("demo-save", "^save$", Handler::Shell("echo demo".into()), Some("Demo"), 10);
        let (name, _, _) = registry.find_match("save", "Other").unwrap();
        assert_eq!(name, "global-save");
    }

    #[test]
    fn captures_are_returned() {
        let registry = RecipeRegistry::new();
        registry.register("set-volume", r"^set volume (?:to )?(\d+)%?$", Handler::Shell("osascript".into()), None, 10);
        let (_, _, caps) = registry.find_match("set volume to 50", "Demo").unwrap();
        assert_eq!(caps, vec!["50".to_string()]);
    }

    #[test]
    fn no_match_returns_none() {
        let registry = RecipeRegistry::new();
        registry.register("set-volume", r"^set volume (\d+)$", Handler::Shell("osascript".into()), None, 10);
        assert!(registry.find_match("click Save", "Demo").is_none());
    }
}
