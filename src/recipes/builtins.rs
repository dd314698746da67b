//! The builtin recipe table (spec §4.6, §10.5), grounded on
//! `original_source/nexus/act/bundles.py`: system controls, mail/calendar/notes/reminders,
//! finder/safari/navigation, app lifecycle, system-settings panes, and notifications. Each
//! registration is a plain data call — adding a recipe never touches the dispatcher.

use super::registry::{Handler, RecipeRegistry};

pub fn register_builtins(registry: &RecipeRegistry) {
    register_system_controls(registry);
    register_productivity_apps(registry);
    register_finder_and_browser(registry);
    register_app_lifecycle(registry);
    register_system_settings(registry);
    register_notifications(registry);
}

fn register_system_controls(registry: &RecipeRegistry) {
    registry.register(
        "set-volume",
        r"^set (?:the )?volume (?:to )?(\d{1,3})%?$",
        Handler::Scripting("set volume output volume {0}".to_string()),
        None,
        10,
    );
    registry.register(
        "mute",
        r"^mute(?: (?:the )?(?:volume|sound|audio))?$",
        Handler::Scripting("set volume with output muted".to_string()),
        None,
        10,
    );
    registry.register(
        "unmute",
        r"^unmute(?: (?:the )?(?:volume|sound|audio))?$",
        Handler::Scripting("set volume without output muted".to_string()),
        None,
        10,
    );
    registry.register(
        "toggle-dark-mode",
        r"^(?:toggle|switch) dark mode$",
        Handler::Scripting(
            "tell application \"System Events\" to tell appearance preferences to set dark mode to not dark mode"
                .to_string(),
        ),
        None,
        10,
    );
    registry.register(
        "lock-screen",
        r"^lock (?:the )?(?:screen|computer|mac)$",
        Handler::Shell("pmset displaysleepnow".to_string()),
        None,
        10,
    );
    registry.register(
        "sleep",
        r"^(?:go to )?sleep$",
        Handler::Shell("pmset sleepnow".to_string()),
        None,
        10,
    );
    registry.register(
        "take-screenshot",
        r"^(?:take (?:a )?)?screenshot$",
        Handler::Shell("screencapture -x /tmp/nexus-screenshot.png".to_string()),
        None,
        10,
    );
    registry.register(
        "battery-status",
        r"^(?:what'?s|check) (?:the )?battery(?: status)?$",
        Handler::Shell("pmset -g batt".to_string()),
        None,
        10,
    );
    registry.register(
        "wifi-status",
        r"^(?:what'?s|check) (?:the )?wi-?fi(?: status)?$",
        Handler::Shell("networksetup -getairportnetwork en0".to_string()),
        None,
        10,
    );
}

fn register_productivity_apps(registry: &RecipeRegistry) {
    registry.register(
        "mail-compose",
        r"^(?:compose|new) (?:an? )?(?:email|mail)(?: to (.+))?$",
        Handler::Scripting("tell application \"Mail\" to make new outgoing message".to_string()),
        Some("Mail"),
        20,
    );
    registry.register(
        "calendar-new-event",
        r"^(?:create|new) (?:an? )?(?:calendar )?event(?: (.+))?$",
        Handler::Scripting("tell application \"Calendar\" to activate".to_string()),
        Some("Calendar"),
        20,
    );
    registry.register(
        "notes-new",
        r"^(?:create|new) (?:a )?note(?: (.+))?$",
        Handler::Scripting("tell application \"Notes\" to make new note".to_string()),
        Some("Notes"),
        20,
    );
    registry.register(
        "reminders-new",
        r"^(?:create|new|add) (?:a )?reminder(?: (?:to )?(.+))?$",
        Handler::Scripting("tell application \"Reminders\" to make new reminder".to_string()),
        Some("Reminders"),
        20,
    );
}

fn register_finder_and_browser(registry: &RecipeRegistry) {
    registry.register(
        "finder-new-window",
        r"^new finder window$",
        Handler::Scripting("tell application \"Finder\" to make new Finder window".to_string()),
        Some("Finder"),
        20,
    );
    registry.register(
        "finder-empty-trash",
        r"^empty (?:the )?trash$",
        Handler::Scripting("tell application \"Finder\" to empty trash".to_string()),
        Some("Finder"),
        20,
    );
    registry.register(
        "safari-new-tab",
        r"^new (?:safari )?tab$",
        Handler::Scripting("tell application \"Safari\" to make new tab at end of tabs of front window".to_string()),
        Some("Safari"),
        20,
    );
    registry.register(
        "open-url",
        r"^(?:open|go to) (https?://\S+)$",
        Handler::OpenUrl("{0}".to_string()),
        None,
        15,
    );
}

fn register_app_lifecycle(registry: &RecipeRegistry) {
    registry.register(
        "quit-app",
        r"^quit (.+)$",
        Handler::Scripting("tell application \"{0}\" to quit".to_string()),
        None,
        15,
    );
    registry.register(
        "force-quit-app",
        r"^force quit (.+)$",
        Handler::Shell("killall -9 \"{0}\"".to_string()),
        None,
        15,
    );
    registry.register(
        "hide-app",
        r"^hide (.+)$",
        Handler::Scripting("tell application \"System Events\" to set visible of process \"{0}\" to false".to_string()),
        None,
        15,
    );
}

fn register_system_settings(registry: &RecipeRegistry) {
    registry.register(
        "open-settings-pane",
        r"^open (?:system )?(?:settings|preferences)(?: (.+))?$",
        Handler::OpenUrl("x-apple.systempreferences:com.apple.{0}".to_string()),
        None,
        10,
    );
}

fn register_notifications(registry: &RecipeRegistry) {
    registry.register(
        "show-notification",
        r#"^(?:show|send) (?:a )?notification(?: (?:saying|that says) )?"?([^"]*)"?$"#,
        Handler::Scripting("display notification \"{0}\" with title \"Nexus\"".to_string()),
        None,
        10,
    );
    registry.register(
        "clear-notifications",
        r"^clear (?:all )?notifications$",
        Handler::Scripting(
            "tell application \"System Events\" to tell process \"NotificationCenter\" to click button \"Clear All\""
                .to_string(),
        ),
        None,
        10,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_registers_without_panicking() {
        let registry = RecipeRegistry::new();
        register_builtins(&registry);
        assert!(registry.len() > 10);
    }

    #[test]
    fn set_volume_matches_and_captures_level() {
        let registry = RecipeRegistry::new();
        register_builtins(&registry);
        let (name, _, caps) = registry.find_match("set volume to 40", "Finder").unwrap();
        assert_eq!(name, "set-volume");
        assert_eq!(caps, vec!["40".to_string()]);
    }

    #[test]
    fn mail_compose_is_app_scoped() {
        let registry = RecipeRegistry::new();
        register_builtins(&registry);
        assert!(registry.find_match("compose email", "Finder").is_none());
        assert!(registry.find_match("compose email", "Mail").is_some());
    }
}
