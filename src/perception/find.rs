//! Element search against the perception cache, falling back to a live accessibility search
//! (spec §4.2 `perception_find`).

use crate::adapters::accessibility::score_candidate;
use crate::adapters::Accessibility;
use crate::error::Result;
use crate::model::{Element, SourceTag};
use crate::session::SpatialCache;

/// Bonus applied to tree-sourced candidates: they carry a richer action surface (AX
/// press/confirm/show-menu) than OCR/template matches, which only support coordinate clicks.
const TREE_SOURCE_BONUS: u32 = 5;

pub struct Scored {
    pub element: Element,
    pub score: u32,
}

/// Searches the perception cache for `pid` first; on a cache miss, falls back to the
/// accessibility adapter's own `find_elements` (spec §4.2).
pub fn perception_find(
    cache: &SpatialCache,
    accessibility: &dyn Accessibility,
    query: &str,
    pid: i32,
    max_elements: usize,
) -> Result<Vec<Scored>> {
    if let Some((cached, _fingerprint)) = cache.get(pid, max_elements) {
        let mut scored: Vec<Scored> = cached
            .into_iter()
            .map(|c| {
                let mut score = score_candidate(query, None, &c.label, c.value.as_deref());
                if score > 0 && c.source == SourceTag::Tree {
                    score += TREE_SOURCE_BONUS;
                }
                Scored {
                    element: Element {
                        role: c.role,
                        raw_role: c.raw_role,
                        label: c.label,
                        value: c.value,
                        position: c.position,
                        size: c.size,
                        enabled: c.enabled,
                        focused: c.focused,
                        source: c.source,
                        handle: None,
                        container: c.container,
                    },
                    score,
                }
            })
            .filter(|s| s.score > 0)
            .collect();
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        return Ok(scored);
    }

    let found = accessibility.find_elements(query, pid)?;
    let mut scored: Vec<Scored> = found
        .into_iter()
        .map(|(element, mut score)| {
            if score > 0 && element.source == SourceTag::Tree {
                score += TREE_SOURCE_BONUS;
            }
            Scored { element, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(scored)
}

/// Closest-label "did you mean" suggestions for a failed `find_target` lookup (spec §7
/// `ElementNotFound.suggestions`), scored the same way as a failed click's fuzzy feedback:
/// bidirectional substring containment, shared-word overlap, partial prefix/suffix matches,
/// with label-length similarity as a tiebreaker. Returns the top `n` labels, best first.
pub fn suggest_labels(query: &str, labels: &[String], n: usize) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let query_words: std::collections::HashSet<&str> = query_lower.split_whitespace().collect();

    let mut scored: Vec<(f64, &String)> = Vec::new();
    for label in labels {
        let label_lower = label.to_lowercase();
        let mut score = 0.0;

        if label_lower.contains(&query_lower) {
            score += 3.0;
        } else if query_lower.contains(&label_lower) {
            score += 2.0;
        }

        let label_words: std::collections::HashSet<&str> = label_lower.split_whitespace().collect();
        let shared = query_words.intersection(&label_words).count();
        if shared > 0 {
            score += shared as f64 * 2.0;
        }

        if score == 0.0 {
            for qw in &query_words {
                for lw in &label_words {
                    if lw.starts_with(qw) || qw.starts_with(lw) {
                        score += 1.0;
                    }
                }
            }
        }

        if score > 0.0 {
            let len_diff = (query.len() as f64 - label.len() as f64).abs();
            score += (1.0 - len_diff / 20.0).max(0.0);
            scored.push((score, label));
        }
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(n).map(|(_, label)| label.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CachedElement, Role};
    use std::time::Duration;

    fn cached(label: &str, source: SourceTag) -> CachedElement {
        CachedElement {
            role: Role::Button,
            raw_role: "AXButton".into(),
            label: label.into(),
            value: None,
            position: Some((0.0, 0.0)),
            size: None,
            enabled: true,
            focused: false,
            source,
            container: None,
        }
    }

    #[test]
    fn tree_sourced_candidate_outranks_equal_score_ocr() {
        let cache = SpatialCache::new(Duration::from_secs(3), 10);
        cache.put(
            1,
            vec![cached("Save", SourceTag::Ocr), cached("Save", SourceTag::Tree)],
            "fp".into(),
            100,
        );
        struct Stub;
        impl Accessibility for Stub {
            fn is_trusted(&self) -> bool { true }
            fn frontmost_app(&self) -> Result<crate::model::AppInfo> { unimplemented!() }
            fn running_apps(&self) -> Result<Vec<crate::model::AppInfo>> { Ok(vec![]) }
            fn windows(&self) -> Result<Vec<crate::model::WindowInfo>> { Ok(vec![]) }
            fn window_title(&self, _pid: i32) -> Result<Option<String>> { Ok(None) }
            fn focused_element(&self, _pid: i32) -> Result<Option<Element>> { Ok(None) }
            fn describe_app(&self, _pid: i32, _max: usize) -> Result<Vec<Element>> { Ok(vec![]) }
            fn find_elements(&self, _q: &str, _pid: i32) -> Result<Vec<(Element, u32)>> { Ok(vec![]) }
            fn menu_bar(&self, _pid: i32) -> Result<Vec<crate::adapters::MenuItem>> { Ok(vec![]) }
            fn find_menu_item(&self, _p: &[String], _pid: i32) -> Result<Option<crate::adapters::MenuItem>> { Ok(None) }
            fn press(&self, _e: &Element) -> Result<()> { Ok(()) }
            fn confirm(&self, _e: &Element) -> Result<()> { Ok(()) }
            fn show_menu(&self, _e: &Element) -> Result<()> { Ok(()) }
            fn set_attribute(&self, _e: &Element, _a: &str, _v: &str) -> Result<()> { Ok(()) }
            fn activate_app(&self, _n: &str) -> Result<()> { Ok(()) }
        }
        let results = perception_find(&cache, &Stub, "save", 1, 100).unwrap();
        assert_eq!(results[0].element.source, SourceTag::Tree);
    }

    #[test]
    fn suggest_labels_ranks_substring_and_word_overlap_above_unrelated() {
        let labels = vec!["Guardar".to_string(), "Cancel".to_string(), "Save As...".to_string()];
        let top = suggest_labels("Save", &labels, 2);
        assert_eq!(top[0], "Save As...");
        assert!(!top.contains(&"Cancel".to_string()));
    }

    #[test]
    fn suggest_labels_empty_for_no_labels() {
        assert!(suggest_labels("Save", &[], 3).is_empty());
    }
}
