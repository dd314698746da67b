//! The three perception layers: tree (priority 10), OCR (priority 50, conditional), and
//! dialog-template (priority 60, conditional) — spec §4.2.

use crate::adapters::{Accessibility, Ocr, ScreenCapture, WindowList};
use crate::error::Result;
use crate::model::{Bounds, Element, Role, SourceTag, WindowInfo};
use std::collections::HashMap;

/// A structured table sighted during the tree walk, side-channeled into the pipeline
/// context rather than flattened into the element list (spec §4.2 "side-channels structured
/// tables and lists").
#[derive(Debug, Clone)]
pub struct Table {
    pub label: String,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ListWidget {
    pub label: String,
    pub items: Vec<String>,
}

/// Threaded through the layer chain: each layer may read the prior layer's elements (via the
/// pipeline driver) and append to `tables`/`lists`.
#[derive(Debug, Default)]
pub struct LayerContext {
    pub pid: i32,
    pub window_bounds: Option<Bounds>,
    pub tables: Vec<Table>,
    pub lists: Vec<ListWidget>,
}

#[derive(Debug, Default)]
pub struct LayerOutput {
    pub elements: Vec<Element>,
}

/// Tree layer (priority 10): the accessibility walk. Always runs; never conditional.
pub fn tree_layer(accessibility: &dyn Accessibility, ctx: &mut LayerContext) -> Result<LayerOutput> {
    let elements = accessibility.describe_app(ctx.pid, 500)?;
    Ok(LayerOutput { elements })
}

/// §4.2: the OCR layer runs only when the prior-layer output contains fewer than this many
/// labeled elements.
pub const OCR_MIN_ELEMENTS_THRESHOLD: usize = 5;

pub fn ocr_layer_condition(prior_elements: &[Element]) -> bool {
    prior_elements
        .iter()
        .filter(|e| !e.label.trim().is_empty())
        .count()
        < OCR_MIN_ELEMENTS_THRESHOLD
}

/// OCR layer (priority 50, conditional): runs an OCR pass over the target window's bounds,
/// emitting coordinate-only elements tagged [`SourceTag::Ocr`].
pub fn ocr_layer(
    capture: &dyn ScreenCapture,
    ocr: &dyn Ocr,
    ctx: &LayerContext,
    window: Option<&WindowInfo>,
) -> Result<LayerOutput> {
    let bounds = ctx
        .window_bounds
        .or_else(|| window.map(|w| w.bounds))
        .unwrap_or(Bounds { x: 0.0, y: 0.0, w: 1920.0, h: 1080.0 });

    let image = capture.capture_region(bounds.x as i32, bounds.y as i32, bounds.w as i32, bounds.h as i32)?;
    let detections = ocr.recognize(&image, (bounds.x, bounds.y))?;

    let elements = detections
        .into_iter()
        .map(|d| Element {
            role: Role::StaticText,
            raw_role: "OCRText".to_string(),
            label: d.text,
            value: None,
            position: Some(d.center),
            size: Some((d.bounds.w, d.bounds.h)),
            enabled: true,
            focused: false,
            source: SourceTag::Ocr,
            handle: None,
            container: None,
        })
        .collect();

    Ok(LayerOutput { elements })
}

/// A known system-dialog shape, classified by owning process name and OCR'd button/field
/// text, with relative-coordinate templates scaled to the dialog's bounds (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogClass {
    PlatformUpdateVerifier,
    CodeSigningGate,
    PasswordPrompt,
    FolderPermission,
    NetworkPermission,
    KeychainPrompt,
    SaveChanges,
}

impl DialogClass {
    /// Whether auto-dismiss is permitted for this class when the preference is enabled
    /// (spec §4.7, §8 "unsafe dialog guard").
    pub fn is_safe_to_auto_dismiss(&self) -> bool {
        matches!(self, DialogClass::PlatformUpdateVerifier | DialogClass::FolderPermission)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DialogClass::PlatformUpdateVerifier => "platform-update-verifier",
            DialogClass::CodeSigningGate => "code-signing-gate",
            DialogClass::PasswordPrompt => "password-prompt",
            DialogClass::FolderPermission => "folder-permission",
            DialogClass::NetworkPermission => "network-permission",
            DialogClass::KeychainPrompt => "keychain-prompt",
            DialogClass::SaveChanges => "save-changes",
        }
    }

    /// The button whose relative-coordinate template should be auto-clicked for a safe class
    /// (spec §4.7: "platform update verifier — primary button; folder-permission — OK").
    pub fn safe_button_label(&self) -> Option<&'static str> {
        match self {
            DialogClass::PlatformUpdateVerifier => Some("Continue"),
            DialogClass::FolderPermission => Some("OK"),
            _ => None,
        }
    }
}

/// Classifies a dialog from its owning process name and the OCR'd text found within its
/// bounds. Order matters: more specific patterns are checked first.
pub fn classify_dialog(owner: &str, ocr_text: &str) -> Option<DialogClass> {
    let owner_l = owner.to_lowercase();
    let text_l = ocr_text.to_lowercase();

    if owner_l.contains("securityagent") || text_l.contains("enter your password") {
        if text_l.contains("keychain") {
            return Some(DialogClass::KeychainPrompt);
        }
        return Some(DialogClass::PasswordPrompt);
    }
    if text_l.contains("wants to access") && text_l.contains("network") {
        return Some(DialogClass::NetworkPermission);
    }
    if text_l.contains("wants to access") && (text_l.contains("folder") || text_l.contains("files")) {
        return Some(DialogClass::FolderPermission);
    }
    if text_l.contains("cannot be opened because") || text_l.contains("verify") && text_l.contains("malware")
    {
        return Some(DialogClass::CodeSigningGate);
    }
    if owner_l.contains("softwareupdate") || text_l.contains("software update") {
        return Some(DialogClass::PlatformUpdateVerifier);
    }
    if text_l.contains("do you want to save the changes") {
        return Some(DialogClass::SaveChanges);
    }
    None
}

/// Relative-coordinate template (fraction of dialog bounds) for a button label within a
/// classified dialog, scaled to the dialog's actual bounds at emit time.
fn button_templates(class: DialogClass) -> HashMap<&'static str, (f64, f64, f64, f64)> {
    let mut templates = HashMap::new();
    match class {
        DialogClass::PlatformUpdateVerifier => {
            templates.insert("Continue", (0.7, 0.85, 0.2, 0.1));
        }
        DialogClass::FolderPermission => {
            templates.insert("OK", (0.7, 0.85, 0.2, 0.1));
            templates.insert("Don't Allow", (0.4, 0.85, 0.2, 0.1));
        }
        DialogClass::SaveChanges => {
            templates.insert("Save", (0.35, 0.85, 0.2, 0.1));
            templates.insert("Don't Save", (0.55, 0.85, 0.2, 0.1));
            templates.insert("Cancel", (0.75, 0.85, 0.2, 0.1));
        }
        DialogClass::CodeSigningGate => {
            templates.insert("OK", (0.7, 0.85, 0.2, 0.1));
        }
        DialogClass::PasswordPrompt | DialogClass::KeychainPrompt => {
            templates.insert("Allow", (0.7, 0.85, 0.2, 0.1));
            templates.insert("Deny", (0.4, 0.85, 0.2, 0.1));
        }
        DialogClass::NetworkPermission => {
            templates.insert("OK", (0.7, 0.85, 0.2, 0.1));
        }
    }
    templates
}

/// Template layer (priority 60, conditional on dialog detection): classifies each detected
/// dialog window and emits button/field elements from its relative-coordinate template,
/// scaled to the dialog's bounds.
pub fn template_layer(dialog_windows: &[(WindowInfo, String)]) -> Vec<Element> {
    let mut out = Vec::new();
    for (window, ocr_text) in dialog_windows {
        let Some(class) = classify_dialog(&window.app_name, ocr_text) else { continue };
        for (label, (fx, fy, fw, fh)) in button_templates(class) {
            let x = window.bounds.x + fx * window.bounds.w;
            let y = window.bounds.y + fy * window.bounds.h;
            let w = fw * window.bounds.w;
            let h = fh * window.bounds.h;
            out.push(Element {
                role: Role::Button,
                raw_role: "AXButton".to_string(),
                label: label.to_string(),
                value: None,
                position: Some((x + w / 2.0, y + h / 2.0)),
                size: Some((w, h)),
                enabled: true,
                focused: false,
                source: SourceTag::Template,
                handle: None,
                container: Some(class.label().to_string()),
            });
        }
    }
    out
}

/// Finds which on-screen windows belong to a known system-dialog owner (used to gate
/// the template layer's `condition`), via the window-list adapter (spec §4.1).
pub fn detect_system_dialogs(window_list: &dyn WindowList) -> Result<Vec<WindowInfo>> {
    const DIALOG_OWNERS: &[&str] = &[
        "SecurityAgent",
        "UserNotificationCenter",
        "CoreServicesUIAgent",
        "softwareupdated",
        "universalAccessAuthWarn",
    ];
    let mut found = Vec::new();
    for owner in DIALOG_OWNERS {
        found.extend(window_list.list(Some(owner))?);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_password_prompt() {
        assert_eq!(
            classify_dialog("SecurityAgent", "Enter your password to allow this"),
            Some(DialogClass::PasswordPrompt)
        );
    }

    #[test]
    fn classifies_platform_update_verifier_as_safe() {
        let class = classify_dialog("softwareupdated", "Software Update is verifying...").unwrap();
        assert!(class.is_safe_to_auto_dismiss());
    }

    #[test]
    fn password_prompt_is_never_safe() {
        let class = classify_dialog("SecurityAgent", "Enter your password").unwrap();
        assert!(!class.is_safe_to_auto_dismiss());
    }

    #[test]
    fn ocr_condition_triggers_below_threshold() {
        let elements: Vec<Element> = Vec::new();
        assert!(ocr_layer_condition(&elements));
    }
}
