//! Snapshot capture, layout fingerprint, and diff (spec §4.3, §8).

use crate::model::{Element, Snapshot};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// First 12 hex chars of SHA-256 over sorted `role:label` pairs joined by `|` (spec §6, §9
/// open question resolved in favor of SHA-256 over the source's MD5 truncation).
///
/// §8 fingerprint-stability property: invariant under permutation of the input and under
/// value/position/enabled drift; changes when any (role,label) pair is added/removed/altered.
pub fn fingerprint(elements: &[Element]) -> String {
    let mut pairs: Vec<String> = elements
        .iter()
        .map(|e| format!("{:?}:{}", e.role, e.label))
        .collect();
    pairs.sort();
    let joined = pairs.join("|");
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(digest)[..12].to_string()
}

fn element_key(role: &str, label: &str) -> String {
    format!("{role}:{label}")
}

/// Captures a [`Snapshot`] from a live element set and app/window context (spec §3, §4.3).
pub fn snapshot(
    app_name: &str,
    elements: &[Element],
    windows: &[(String, String)],
) -> Snapshot {
    let mut map = BTreeMap::new();
    let mut focus_key = None;
    for e in elements {
        let role_str = format!("{:?}", e.role);
        let key = element_key(&role_str, &e.label);
        if e.focused {
            focus_key = Some(format!("{key}:{}", e.value.clone().unwrap_or_default()));
        }
        map.insert(key, (role_str, e.label.clone(), e.value.clone(), e.enabled));
    }
    Snapshot {
        app_name: app_name.to_string(),
        focus_key,
        windows: windows.to_vec(),
        elements: map,
        fingerprint: fingerprint(elements),
    }
}

/// Human-readable diff between two snapshots (spec §4.3): added/removed elements grouped by
/// role, value changes on elements present in both, focus change, window-set changes, and
/// the fingerprint (before -> after).
///
/// §8 diff-determinism property: `diff(a, a)` is empty; `diff(a, b)` depends only on the two
/// snapshots, never on element ordering within them (both snapshots store elements in a
/// `BTreeMap`, so iteration order is already canonical).
pub fn diff(before: &Snapshot, after: &Snapshot) -> String {
    let mut lines = Vec::new();

    let mut added_by_role: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut removed_by_role: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (key, (role, label, ..)) in &after.elements {
        if !before.elements.contains_key(key) {
            added_by_role.entry(role.clone()).or_default().push(label.clone());
        }
    }
    for (key, (role, label, ..)) in &before.elements {
        if !after.elements.contains_key(key) {
            removed_by_role.entry(role.clone()).or_default().push(label.clone());
        }
    }

    for (role, labels) in &added_by_role {
        lines.push(format!("+ {role}: {}", labels.join(", ")));
    }
    for (role, labels) in &removed_by_role {
        lines.push(format!("- {role}: {}", labels.join(", ")));
    }

    for (key, (role, label, value_after, _)) in &after.elements {
        if let Some((_, _, value_before, _)) = before.elements.get(key) {
            if value_before != value_after {
                lines.push(format!(
                    "~ {role} {label}: {:?} -> {:?}",
                    value_before.as_deref().unwrap_or(""),
                    value_after.as_deref().unwrap_or("")
                ));
            }
        }
    }

    if before.focus_key != after.focus_key {
        lines.push(format!(
            "focus: {:?} -> {:?}",
            before.focus_key.as_deref().unwrap_or("none"),
            after.focus_key.as_deref().unwrap_or("none")
        ));
    }

    if before.windows != after.windows {
        lines.push(format!(
            "windows: {} -> {}",
            before.windows.len(),
            after.windows.len()
        ));
    }

    if before.fingerprint != after.fingerprint {
        lines.push(format!(
            "layout: {} -> {}",
            before.fingerprint, after.fingerprint
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, SourceTag};

    fn el(role: Role, label: &str, value: Option<&str>, focused: bool) -> Element {
        Element {
            role,
            raw_role: format!("{role:?}"),
            label: label.to_string(),
            value: value.map(str::to_string),
            position: Some((0.0, 0.0)),
            size: None,
            enabled: true,
            focused,
            source: SourceTag::Tree,
            handle: None,
            container: None,
        }
    }

    #[test]
    fn fingerprint_stable_under_permutation() {
        let a = vec![el(Role::Button, "Save", None, false), el(Role::Button, "Cancel", None, false)];
        let b = vec![el(Role::Button, "Cancel", None, false), el(Role::Button, "Save", None, false)];
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_stable_under_value_drift() {
        let a = vec![el(Role::TextField, "Name", Some("Alice"), false)];
        let b = vec![el(Role::TextField, "Name", Some("Bob"), false)];
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_changes_on_new_label() {
        let a = vec![el(Role::Button, "Save", None, false)];
        let b = vec![el(Role::Button, "Save As", None, false)];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_12_hex_chars() {
        let a = vec![el(Role::Button, "Save", None, false)];
        let fp = fingerprint(&a);
        assert_eq!(fp.len(), 12);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn diff_self_is_empty() {
        let elements = vec![el(Role::Button, "Save", None, false)];
        let snap = snapshot("Demo", &elements, &[]);
        assert_eq!(diff(&snap, &snap), "");
    }

    #[test]
    fn diff_reports_added_and_removed() {
        let before = snapshot("Demo", &[el(Role::Button, "Save", None, false)], &[]);
        let after = snapshot("Demo", &[el(Role::Button, "Cancel", None, false)], &[]);
        let d = diff(&before, &after);
        assert!(d.contains("+ Button: Cancel"));
        assert!(d.contains("- Button: Save"));
    }

    #[test]
    fn diff_reports_value_change() {
        let before = snapshot("Demo", &[el(Role::TextField, "Total", Some("0"), false)], &[]);
        let after = snapshot("Demo", &[el(Role::TextField, "Total", Some("5"), false)], &[]);
        let d = diff(&before, &after);
        assert!(d.contains("\"0\" -> \"5\""));
    }

    #[test]
    fn diff_reports_focus_change() {
        let before = snapshot("Demo", &[el(Role::Button, "Save", None, false)], &[]);
        let after = snapshot("Demo", &[el(Role::Button, "Save", None, true)], &[]);
        let d = diff(&before, &after);
        assert!(d.contains("focus:"));
    }
}
