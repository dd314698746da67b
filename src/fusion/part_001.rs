//! Text rendering for `perceive` (spec §4.3, §6 noise filter).

use crate::model::{Element, Role};
use std::collections::BTreeMap;

/// Options threading through to `perceive` (spec §10.4 tool surface): which optional
/// sections to render.
#[derive(Debug, Clone, Default)]
pub struct PerceiveOptions {
    pub trusted: bool,
    pub app_name: String,
    pub window_title: String,
    pub query: Option<String>,
    pub include_menus: bool,
    pub include_diff: bool,
    pub include_screenshot: bool,
    pub include_content: bool,
    pub include_observe: bool,
}

/// §6 noise filter, step 1: drop elements with an empty label whose raw role is static-text
/// or image.
fn is_noise(e: &Element) -> bool {
    e.label.trim().is_empty() && matches!(e.role, Role::StaticText | Role::Image)
}

/// §6 noise filter, step 2: a group element is dropped if its label equals the label of some
/// non-group element in the same listing (wrapper groups that just echo a child's label).
fn is_redundant_group(e: &Element, all: &[&Element]) -> bool {
    e.role == Role::Group
        && all
            .iter()
            .any(|other| other.role != Role::Group && other.label == e.label)
}

/// Renders a noise-filtered, container-grouped element listing (spec §4.3): groups are
/// emitted as headings only when they hold ≥ 2 useful children; ungrouped elements are
/// listed flat under a synthetic "(ungrouped)" bucket, which is never itself titled when it
/// is the only bucket.
pub fn render_element_listing(elements: &[Element]) -> String {
    let refs: Vec<&Element> = elements.iter().collect();
    let kept: Vec<&Element> = refs
        .iter()
        .filter(|e| !is_noise(e) && !is_redundant_group(e, &refs))
        .copied()
        .collect();

    let mut by_container: BTreeMap<String, Vec<&Element>> = BTreeMap::new();
    for e in &kept {
        let key = e.container.clone().unwrap_or_default();
        by_container.entry(key).or_default().push(e);
    }

    let mut lines = Vec::new();
    let multiple_containers = by_container.keys().filter(|k| !k.is_empty()).count() > 0;

    for (container, members) in &by_container {
        if !container.is_empty() && members.len() >= 2 {
            lines.push(format!("[{container}]"));
        } else if !container.is_empty() && multiple_containers {
            // Single-child named container still gets a heading so the child isn't
            // silently folded into the top-level bucket.
            lines.push(format!("[{container}]"));
        }
        for e in members {
            lines.push(render_element_line(e));
        }
    }

    lines.join("\n")
}

fn render_element_line(e: &Element) -> String {
    let mut line = format!("{:?} \"{}\"", e.role, e.label);
    if let Some(value) = &e.value {
        if !value.is_empty() {
            line.push_str(&format!(" = {value:?}"));
        }
    }
    if !e.enabled {
        line.push_str(" [disabled]");
    }
    if e.focused {
        line.push_str(" [focused]");
    }
    if let Some((x, y)) = e.position {
        line.push_str(&format!(" @({x:.0},{y:.0})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceTag;

    fn el(role: Role, label: &str, container: Option<&str>) -> Element {
        Element {
            role,
            raw_role: format!("{role:?}"),
            label: label.to_string(),
            value: None,
            position: Some((10.0, 20.0)),
            size: None,
            enabled: true,
            focused: false,
            source: SourceTag::Tree,
            handle: None,
            container: container.map(str::to_string),
        }
    }

    #[test]
    fn drops_empty_label_static_text() {
        let elements = vec![el(Role::StaticText, "", None), el(Role::Button, "Save", None)];
        let out = render_element_listing(&elements);
        assert!(out.contains("Save"));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn drops_redundant_wrapper_group() {
        let elements = vec![el(Role::Group, "Save", None), el(Role::Button, "Save", None)];
        let out = render_element_listing(&elements);
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("Button"));
    }

    #[test]
    fn groups_with_two_plus_children_get_heading() {
        let elements = vec![
            el(Role::Button, "Save", Some("Toolbar")),
            el(Role::Button, "Cancel", Some("Toolbar")),
        ];
        let out = render_element_listing(&elements);
        assert!(out.starts_with("[Toolbar]"));
    }

    #[test]
    fn ungrouped_elements_have_no_heading_when_alone() {
        let elements = vec![el(Role::Button, "Save", None)];
        let out = render_element_listing(&elements);
        assert!(!out.contains('['));
    }
}
