//! Action bundles (spec §4.4 step 3): fixed phrases that expand to a short literal chain of
//! steps before verb normalization runs. Matched by regex against the whole (unsplit) step so
//! multi-word bundle triggers like "save as" aren't clipped by the single-word verb lookahead
//! in `parser::normalize_verb`.

use regex::Regex;
use std::sync::OnceLock;

fn bundle_table() -> &'static [(fn(&str) -> Option<Vec<String>>,)] {
    &[
        (save_as,),
        (find_replace,),
        (new_document,),
        (zoom,),
        (print_bundle,),
    ]
}

/// Returns the expanded step chain if `step` matches a known action bundle.
pub fn expand_bundle(step: &str) -> Option<Vec<String>> {
    for (matcher,) in bundle_table() {
        if let Some(expanded) = matcher(step) {
            return Some(expanded);
        }
    }
    None
}

fn save_as(step: &str) -> Option<Vec<String>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"(?i)^save as\s+"?([^"]+?)"?$"#).unwrap());
    let caps = re.captures(step)?;
    let name = caps[1].trim();
    Some(vec![
        "press cmd+shift+s".to_string(),
        format!(r#"wait for "Save As" 5s"#),
        format!(r#"fill Save As={name}"#),
        "press enter".to_string(),
    ])
}

fn find_replace(step: &str) -> Option<Vec<String>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?i)^find\s+"?([^"]+?)"?\s+and replace (?:with|it with)\s+"?([^"]*?)"?$"#).unwrap()
    });
    let caps = re.captures(step)?;
    let find = caps[1].trim();
    let replace = caps[2].trim();
    Some(vec![
        "press cmd+f".to_string(),
        format!(r#"type "{find}""#),
        "press escape".to_string(),
        "press cmd+shift+h".to_string(),
        format!(r#"fill Find={find}, Replace={replace}"#),
        "press enter".to_string(),
    ])
}

fn new_document(step: &str) -> Option<Vec<String>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^new (document|file|window|tab)$").unwrap());
    let caps = re.captures(step)?;
    Some(match &caps[1].to_lowercase()[..] {
        "tab" => vec!["press cmd+t".to_string()],
        "window" => vec!["press cmd+n".to_string()],
        _ => vec!["press cmd+n".to_string()],
    })
}

fn zoom(step: &str) -> Option<Vec<String>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^zoom (in|out|to (\d+)%?|reset)$").unwrap());
    let caps = re.captures(step)?;
    let mode = caps[1].to_lowercase();
    if let Some(pct) = caps.get(2) {
        let n: u32 = pct.as_str().parse().unwrap_or(100);
        let presses = (n / 10).max(1);
        let mut steps = vec!["press cmd+0".to_string()];
        for _ in 0..presses {
            steps.push("press cmd+plus".to_string());
        }
        return Some(steps);
    }
    Some(match mode.as_str() {
        "in" => vec!["press cmd+plus".to_string()],
        "out" => vec!["press cmd+minus".to_string()],
        _ => vec!["press cmd+0".to_string()],
    })
}

fn print_bundle(step: &str) -> Option<Vec<String>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^print$").unwrap());
    re.find(step.trim())?;
    Some(vec!["press cmd+p".to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_as_expands_to_shortcut_and_fill() {
        let steps = expand_bundle(r#"save as "report.txt""#).unwrap();
        assert_eq!(steps.len(), 4);
        assert!(steps[2].contains("report.txt"));
    }

    #[test]
    fn find_replace_expands() {
        let steps = expand_bundle("find foo and replace with bar").unwrap();
        assert!(steps.iter().any(|s| s.contains("Find=foo")));
    }

    #[test]
    fn new_tab_maps_to_cmd_t() {
        let steps = expand_bundle("new tab").unwrap();
        assert_eq!(steps, vec!["press cmd+t".to_string()]);
    }

    #[test]
    fn zoom_to_percentage() {
        let steps = expand_bundle("zoom to 150%").unwrap();
        assert!(steps.len() > 1);
    }

    #[test]
    fn non_bundle_returns_none() {
        assert!(expand_bundle("click Save").is_none());
    }
}
