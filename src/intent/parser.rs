//! Intent parser (spec §4.4): chain split, shortcut recognition, action bundles, verb
//! normalization (multi-word then single-word synonyms, then typo correction), and the
//! disambiguation parsers (ordinal/spatial/container/coordinate) that run before verb
//! dispatch.

use super::bundles::expand_bundle;
use super::types::*;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// Top-level `;` chain split (spec §4.4 step 1). A semicolon inside quotes is not treated as
/// a separator — callers write `fill Name="a; b"` rarely enough that a naive split on bare
/// `;` outside of matching quotes is sufficient here.
pub fn split_chain(input: &str) -> Vec<String> {
    let mut steps = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in input.chars() {
        match c {
            '"' | '\'' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => {
                steps.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        steps.push(current.trim().to_string());
    }
    steps.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Parses a single (already chain-split) step into a [`ParsedIntent`].
pub fn parse_step(step: &str) -> Result<ParsedIntent, String> {
    let trimmed = step.trim();
    if trimmed.is_empty() {
        return Err("empty action".to_string());
    }

    if let Some(shortcut) = recognize_shortcut(trimmed) {
        return Ok(shortcut);
    }

    if let Some(expanded) = expand_bundle(trimmed) {
        // Action bundles resolve to a fixed short chain of steps (spec §4.4 step 3); a
        // single-element chain collapses back into that one intent.
        let mut parsed: Vec<ParsedIntent> = expanded
            .iter()
            .map(|s| parse_step(s))
            .collect::<Result<_, _>>()?;
        return Ok(if parsed.len() == 1 {
            parsed.remove(0)
        } else {
            ParsedIntent::Chain(parsed)
        });
    }

    let (verb, rest) = normalize_verb(trimmed)?;
    parse_verb(&verb, rest.trim())
}

fn recognize_shortcut(step: &str) -> Option<ParsedIntent> {
    let lower = step.to_lowercase();
    Some(match lower.as_str() {
        "select all" => ParsedIntent::Shortcut(Shortcut::SelectAll),
        "copy" => ParsedIntent::Shortcut(Shortcut::Copy),
        "paste" => ParsedIntent::Shortcut(Shortcut::Paste),
        "undo" => ParsedIntent::Shortcut(Shortcut::Undo),
        "redo" => ParsedIntent::Shortcut(Shortcut::Redo),
        "close window" => ParsedIntent::CloseWindow,
        "get clipboard" => ParsedIntent::Shortcut(Shortcut::GetClipboard),
        "get selection" => ParsedIntent::Shortcut(Shortcut::GetSelection),
        "get table" => ParsedIntent::Shortcut(Shortcut::GetTable),
        "get list" => ParsedIntent::Shortcut(Shortcut::GetList),
        "get url" => ParsedIntent::BrowserOp(BrowserOp::GetUrl),
        "get tabs" => ParsedIntent::BrowserOp(BrowserOp::GetTabs),
        "get console" => ParsedIntent::BrowserOp(BrowserOp::GetConsole),
        "list windows" => ParsedIntent::WindowOp(WindowOp::ListWindows),
        "list recipes" => ParsedIntent::Shortcut(Shortcut::ListRecipes),
        "list workflows" => ParsedIntent::WorkflowOp(WorkflowOp::List(RecordKind::Workflow)),
        "list routes" => ParsedIntent::WorkflowOp(WorkflowOp::List(RecordKind::Route)),
        "window info" => ParsedIntent::WindowOp(WindowOp::Info),
        "maximize" => ParsedIntent::WindowOp(WindowOp::Maximize),
        "minimize" => ParsedIntent::WindowOp(WindowOp::Minimize),
        "restore" => ParsedIntent::WindowOp(WindowOp::Restore),
        "fullscreen" => ParsedIntent::WindowOp(WindowOp::Fullscreen),
        "stop recording" | "record stop" => ParsedIntent::WorkflowOp(WorkflowOp::RecordStop),
        _ => {
            if let Some(app) = lower.strip_prefix("where is ").and_then(|s| s.strip_suffix('?')) {
                return Some(ParsedIntent::WhereIsApp { app: app.trim().to_string() });
            }
            if let Some(app) = lower.strip_prefix("where is ") {
                return Some(ParsedIntent::WhereIsApp { app: app.trim().to_string() });
            }
            return None;
        }
    })
}

/// Longest-first multi-word phrase synonyms, then single-word verb synonyms, then
/// edit-distance typo correction against the known-verb set (spec §4.4 step 4). Typo
/// correction is skipped when the intent contains a menu-path marker `>`.
fn normalize_verb(step: &str) -> Result<(String, String), String> {
    const MULTI_WORD: &[(&str, &str)] = &[
        ("click on", "click"),
        ("press on", "click"),
        ("go to", "switch_to"),
        ("switch to", "switch_to"),
        ("look at", "click"),
        ("type in", "type"),
    ];
    let lower = step.to_lowercase();
    for (phrase, canonical) in MULTI_WORD {
        if lower.starts_with(phrase) {
            let rest = step[phrase.len()..].trim_start().to_string();
            return Ok((canonical.to_string(), rest));
        }
    }

    let mut parts = step.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().to_string();

    const SINGLE_WORD: &[(&str, &str)] = &[
        ("tap", "click"), ("hit", "click"), ("select", "click"), ("choose", "click"),
        ("pick", "click"), ("push", "click"), ("touch", "click"),
        ("enter", "type"), ("input", "type"),
        ("launch", "open"), ("start", "open"),
        ("swipe", "scroll"),
        ("browse", "navigate"), ("visit", "navigate"), ("load", "navigate"),
        ("activate", "switch_to"),
    ];
    let first_lower = first.to_lowercase();
    const KNOWN_VERBS: &[&str] = &[
        "click", "type", "press", "scroll", "hover", "drag", "fill", "wait", "open",
        "switch_to", "menu", "navigate", "move", "resize", "tile", "js", "record", "replay",
        "workflow", "via",
    ];
    if KNOWN_VERBS.contains(&first_lower.as_str()) {
        return Ok((first_lower, rest));
    }
    if let Some((_, canonical)) = SINGLE_WORD.iter().find(|(syn, _)| *syn == first_lower) {
        return Ok((canonical.to_string(), rest));
    }

    if step.contains('>') {
        // Menu-path marker present: typo correction is skipped per spec §4.4 step 4.
        return Ok((first_lower, rest));
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in KNOWN_VERBS {
        let sim = similarity(&first_lower, candidate);
        if best.map(|(_, s)| sim > s).unwrap_or(true) {
            best = Some((candidate, sim));
        }
    }
    match best {
        Some((candidate, sim)) if sim >= 0.75 => Ok((candidate.to_string(), rest)),
        _ => Err(format!("unrecognized verb {first:?}")),
    }
}

/// Normalized Levenshtein similarity in `[0,1]`: `1 - edit_distance / max(len_a, len_b)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let dist = levenshtein(a, b) as f64;
    let max_len = a.chars().count().max(b.chars().count()) as f64;
    1.0 - dist / max_len
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn parse_verb(verb: &str, rest: &str) -> Result<ParsedIntent, String> {
    match verb {
        "click" => parse_click(rest),
        "type" => Ok(parse_type(rest)),
        "press" => Ok(ParsedIntent::Press { keys: tokenize_keys(rest) }),
        "scroll" => Ok(ParsedIntent::Scroll(parse_scroll(rest))),
        "hover" => Ok(ParsedIntent::Hover { target: rest.to_string() }),
        "drag" => parse_drag(rest),
        "fill" => Ok(ParsedIntent::Fill { fields: parse_fill(rest) }),
        "wait" => Ok(parse_wait(rest)),
        "open" => Ok(ParsedIntent::Open { app: rest.to_string() }),
        "switch_to" => Ok(ParsedIntent::SwitchTo { app: rest.to_string() }),
        "menu" => Ok(ParsedIntent::Menu { path: parse_menu_path(rest) }),
        "navigate" => parse_navigate_or_browser(rest),
        "move" => parse_window_move(rest),
        "resize" => parse_window_resize(rest),
        "tile" => parse_tile(rest),
        "js" => Ok(ParsedIntent::BrowserOp(BrowserOp::Js(rest.to_string()))),
        "record" | "via" | "workflow" | "replay" => parse_workflow(verb, rest),
        _ => Err(format!("unhandled verb {verb:?}")),
    }
}

fn parse_type(rest: &str) -> ParsedIntent {
    // `type "text" into <target>` / `type "text" in <target>` / bare `type <text>`.
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?is)^["']?(.*?)["']?\s+(?:into|in)\s+(.+)$"#).unwrap()
    });
    if let Some(caps) = re.captures(rest) {
        return ParsedIntent::Type {
            text: caps[1].to_string(),
            target: Some(caps[2].trim().to_string()),
        };
    }
    let text = rest.trim_matches(|c| c == '"' || c == '\'').to_string();
    ParsedIntent::Type { text, target: None }
}

fn tokenize_keys(rest: &str) -> Vec<String> {
    rest.split(|c: char| c == '+' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

fn parse_scroll(rest: &str) -> ScrollTarget {
    static UNTIL_RE: OnceLock<Regex> = OnceLock::new();
    static IN_RE: OnceLock<Regex> = OnceLock::new();
    static DIR_N_RE: OnceLock<Regex> = OnceLock::new();

    let until_re = UNTIL_RE.get_or_init(|| Regex::new(r"(?i)^until\s+(.+?)(\s+appears)?$").unwrap());
    if let Some(caps) = until_re.captures(rest) {
        return ScrollTarget::Until { target: caps[1].trim().to_string() };
    }

    let in_re = IN_RE.get_or_init(|| Regex::new(r"(?i)^(up|down|left|right)\s+in\s+(.+)$").unwrap());
    if let Some(caps) = in_re.captures(rest) {
        return ScrollTarget::InElement {
            direction: parse_scroll_dir(&caps[1]),
            clicks: 3,
            element: caps[2].trim().to_string(),
        };
    }

    let dir_n_re = DIR_N_RE.get_or_init(|| Regex::new(r"(?i)^(up|down|left|right)\s+(\d+)$").unwrap());
    if let Some(caps) = dir_n_re.captures(rest) {
        return ScrollTarget::Plain {
            direction: parse_scroll_dir(&caps[1]),
            clicks: caps[2].parse().unwrap_or(3),
        };
    }

    ScrollTarget::Plain { direction: parse_scroll_dir(rest.trim()), clicks: 3 }
}

fn parse_scroll_dir(s: &str) -> ScrollDirection {
    match s.to_lowercase().as_str() {
        "up" => ScrollDirection::Up,
        "left" => ScrollDirection::Left,
        "right" => ScrollDirection::Right,
        _ => ScrollDirection::Down,
    }
}

fn parse_drag(rest: &str) -> Result<ParsedIntent, String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^(.+?)\s+to\s+(.+)$").unwrap());
    re.captures(rest)
        .map(|c| ParsedIntent::Drag { from: c[1].trim().to_string(), to: c[2].trim().to_string() })
        .ok_or_else(|| "drag requires '<from> to <to>'".to_string())
}

/// Comma-separated `Name=value` pairs with quoted-value tolerance (spec §4.5 `fill`).
fn parse_fill(rest: &str) -> Vec<(String, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"([^=,]+)=("[^"]*"|'[^']*'|[^,]*)"#).unwrap());
    re.captures_iter(rest)
        .map(|c| {
            let key = c[1].trim().to_string();
            let value = c[2].trim().trim_matches(|ch| ch == '"' || ch == '\'').to_string();
            (key, value)
        })
        .collect()
}

fn parse_wait(rest: &str) -> ParsedIntent {
    static FOR_RE: OnceLock<Regex> = OnceLock::new();
    static UNTIL_RE: OnceLock<Regex> = OnceLock::new();
    static SECONDS_RE: OnceLock<Regex> = OnceLock::new();

    let until_re = UNTIL_RE.get_or_init(|| Regex::new(r"(?i)^until\s+(.+?)\s+disappears$").unwrap());
    if let Some(caps) = until_re.captures(rest) {
        return ParsedIntent::Wait {
            target: Some(caps[1].trim().to_string()),
            timeout: Duration::from_secs(10),
            until_disappears: true,
        };
    }

    let for_re = FOR_RE.get_or_init(|| Regex::new(r"(?i)^for\s+(.+?)(?:\s+(\d+)s)?$").unwrap());
    if let Some(caps) = for_re.captures(rest) {
        let timeout = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));
        return ParsedIntent::Wait {
            target: Some(caps[1].trim().to_string()),
            timeout,
            until_disappears: false,
        };
    }

    let seconds_re = SECONDS_RE.get_or_init(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)s?$").unwrap());
    if let Some(caps) = seconds_re.captures(rest.trim()) {
        let secs: f64 = caps[1].parse().unwrap_or(1.0);
        let capped = secs.min(30.0);
        return ParsedIntent::Wait {
            target: None,
            timeout: Duration::from_secs_f64(capped),
            until_disappears: false,
        };
    }

    ParsedIntent::Wait { target: None, timeout: Duration::from_secs(1), until_disappears: false }
}

fn parse_menu_path(rest: &str) -> Vec<String> {
    rest.trim_matches(|c| c == '<' || c == '>')
        .split('>')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_navigate_or_browser(rest: &str) -> Result<ParsedIntent, String> {
    static NAV_PATH_RE: OnceLock<Regex> = OnceLock::new();
    let lower = rest.to_lowercase();
    if let Some(url) = lower.strip_prefix("to ") {
        return Ok(ParsedIntent::BrowserOp(BrowserOp::NavigateUrl(auto_scheme(url.trim()))));
    }
    if rest.contains('>') {
        let re = NAV_PATH_RE.get_or_init(|| Regex::new(r"[<>]").unwrap());
        let steps = re
            .split(rest)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        return Ok(ParsedIntent::NavPath { steps });
    }
    if looks_like_url(rest.trim()) {
        return Ok(ParsedIntent::BrowserOp(BrowserOp::NavigateUrl(auto_scheme(rest.trim()))));
    }
    Ok(ParsedIntent::Open { app: rest.trim().to_string() })
}

fn looks_like_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://") || s.contains('.')
}

fn auto_scheme(s: &str) -> String {
    if s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://") {
        s.to_string()
    } else if std::path::Path::new(s).exists() {
        format!("file://{s}")
    } else {
        format!("https://{s}")
    }
}

fn parse_window_move(rest: &str) -> Result<ParsedIntent, String> {
    static COORD_RE: OnceLock<Regex> = OnceLock::new();
    let coord_re = COORD_RE.get_or_init(|| Regex::new(r"(?i)^(?:(.+?)\s+)?to\s+(-?\d+)[,\s]+(-?\d+)$").unwrap());
    if let Some(caps) = coord_re.captures(rest) {
        let x: f64 = caps[2].parse().unwrap_or(0.0);
        let y: f64 = caps[3].parse().unwrap_or(0.0);
        return Ok(ParsedIntent::WindowOp(WindowOp::Move {
            app: caps.get(1).map(|m| m.as_str().trim().to_string()),
            slot: WindowSlot::Coordinate(x, y),
        }));
    }

    let mut parts: Vec<&str> = rest.split_whitespace().collect();
    let slot_word = parts.pop().unwrap_or_default().to_lowercase();
    let app = if parts.is_empty() { None } else { Some(parts.join(" ")) };
    let slot = match slot_word.as_str() {
        "left" | "left-half" => WindowSlot::LeftHalf,
        "right" | "right-half" => WindowSlot::RightHalf,
        "top" | "top-half" => WindowSlot::TopHalf,
        "bottom" | "bottom-half" => WindowSlot::BottomHalf,
        "center" => WindowSlot::Center,
        "q1" => WindowSlot::Quarter(1),
        "q2" => WindowSlot::Quarter(2),
        "q3" => WindowSlot::Quarter(3),
        "q4" => WindowSlot::Quarter(4),
        _ => return Err(format!("unknown window slot {slot_word:?}")),
    };
    Ok(ParsedIntent::WindowOp(WindowOp::Move { app, slot }))
}

fn parse_window_resize(rest: &str) -> Result<ParsedIntent, String> {
    static WXH_RE: OnceLock<Regex> = OnceLock::new();
    static PCT_RE: OnceLock<Regex> = OnceLock::new();

    let wxh_re = WXH_RE.get_or_init(|| Regex::new(r"(?i)^(?:(.+?)\s+)?to\s+(\d+)x(\d+)$").unwrap());
    if let Some(caps) = wxh_re.captures(rest) {
        return Ok(ParsedIntent::WindowOp(WindowOp::Resize {
            app: caps.get(1).map(|m| m.as_str().trim().to_string()),
            spec: ResizeSpec::Absolute { w: caps[2].parse().unwrap_or(0.0), h: caps[3].parse().unwrap_or(0.0) },
        }));
    }
    let pct_re = PCT_RE.get_or_init(|| Regex::new(r"(?i)^(?:(.+?)\s+)?to\s+(\d+)%$").unwrap());
    if let Some(caps) = pct_re.captures(rest) {
        return Ok(ParsedIntent::WindowOp(WindowOp::Resize {
            app: caps.get(1).map(|m| m.as_str().trim().to_string()),
            spec: ResizeSpec::Percent(caps[2].parse().unwrap_or(100.0)),
        }));
    }
    Err("resize requires 'to WxH' or 'to N%'".to_string())
}

fn parse_tile(rest: &str) -> Result<ParsedIntent, String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^(.+?)\s+and\s+(.+)$").unwrap());
    re.captures(rest)
        .map(|c| ParsedIntent::WindowOp(WindowOp::Tile { a: c[1].trim().to_string(), b: c[2].trim().to_string() }))
        .ok_or_else(|| "tile requires '<A> and <B>'".to_string())
}

fn parse_workflow(verb: &str, rest: &str) -> Result<ParsedIntent, String> {
    let kind = if rest.to_lowercase().contains("route") { RecordKind::Route } else { RecordKind::Workflow };
    match verb {
        "record" => Ok(ParsedIntent::WorkflowOp(WorkflowOp::RecordStart { name: rest.trim().to_string(), kind })),
        "replay" => Ok(ParsedIntent::WorkflowOp(WorkflowOp::Replay { name: rest.trim().to_string(), kind })),
        "workflow" if rest.to_lowercase().starts_with("delete ") => Ok(ParsedIntent::WorkflowOp(WorkflowOp::Delete {
            name: rest[7..].trim().to_string(),
            kind,
        })),
        "via" | "workflow" => Ok(ParsedIntent::WorkflowOp(WorkflowOp::Replay { name: rest.trim().to_string(), kind })),
        _ => Err(format!("unhandled workflow verb {verb:?}")),
    }
}

fn parse_click(rest: &str) -> Result<ParsedIntent, String> {
    let (rest, flags) = extract_modifiers(rest);

    if rest.contains('>') {
        return Ok(ParsedIntent::Click {
            target: rest.to_string(),
            role_filter: None,
            flags,
            disambiguator: Disambiguator::None,
            menu_path: Some(parse_menu_path(&rest)),
        });
    }

    if let Some(d) = parse_coordinate(&rest) {
        return Ok(ParsedIntent::Click {
            target: rest.to_string(),
            role_filter: None,
            flags,
            disambiguator: d,
            menu_path: None,
        });
    }
    if let Some((target, d)) = parse_ordinal(&rest) {
        return Ok(ParsedIntent::Click { target, role_filter: None, flags, disambiguator: d, menu_path: None });
    }
    if let Some((target, d)) = parse_container(&rest) {
        return Ok(ParsedIntent::Click { target, role_filter: None, flags, disambiguator: d, menu_path: None });
    }
    if let Some((target, d)) = parse_spatial(&rest) {
        return Ok(ParsedIntent::Click { target, role_filter: None, flags, disambiguator: d, menu_path: None });
    }

    Ok(ParsedIntent::Click {
        target: rest.to_string(),
        role_filter: None,
        flags,
        disambiguator: Disambiguator::None,
        menu_path: None,
    })
}

fn extract_modifiers(rest: &str) -> (String, ClickModifiers) {
    let mut flags = ClickModifiers::default();
    let mut s = rest.to_string();
    let lower = s.to_lowercase();

    let prefixes: &[(&str, fn(&mut ClickModifiers))] = &[
        ("shift-click ", |f| f.shift = true),
        ("cmd-click ", |f| f.cmd = true),
        ("opt-click ", |f| f.opt = true),
        ("ctrl-click ", |f| f.ctrl = true),
        ("double-click ", |f| f.double = true),
        ("dblclick ", |f| f.double = true),
        ("triple-click ", |f| f.triple = true),
        ("tclick ", |f| f.triple = true),
        ("right-click ", |f| f.right = true),
        ("rclick ", |f| f.right = true),
    ];
    for (prefix, setter) in prefixes {
        if lower.starts_with(prefix) {
            setter(&mut flags);
            s = s[prefix.len()..].to_string();
            return (s, flags);
        }
    }
    (s, flags)
}

fn parse_coordinate(rest: &str) -> Option<Disambiguator> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)^(?:at\s+)?(-?\d+(?:\.\d+)?)[,\s]+(-?\d+(?:\.\d+)?)$").unwrap());
    let caps = re.captures(rest.trim())?;
    Some(Disambiguator::Coordinate {
        x: caps[1].parse().ok()?,
        y: caps[2].parse().ok()?,
    })
}

const ORDINAL_WORDS: &[(&str, i32)] = &[
    ("first", 1), ("second", 2), ("third", 3), ("fourth", 4), ("fifth", 5),
    ("sixth", 6), ("seventh", 7), ("eighth", 8), ("ninth", 9), ("tenth", 10),
];

fn parse_ordinal(rest: &str) -> Option<(String, Disambiguator)> {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    static NUM_RE: OnceLock<Regex> = OnceLock::new();
    static ROLE_N_RE: OnceLock<Regex> = OnceLock::new();

    let lower = rest.to_lowercase();
    if lower.starts_with("the last ") || lower.starts_with("last ") {
        let after = lower.strip_prefix("the last ").or_else(|| lower.strip_prefix("last ")).unwrap();
        let (label, role) = split_label_role(after);
        return Some((label, Disambiguator::Ordinal { n: -1, role }));
    }

    let word_re = WORD_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:the\s+)?(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth)\s+(.+)$").unwrap()
    });
    if let Some(caps) = word_re.captures(rest) {
        let n = ORDINAL_WORDS
            .iter()
            .find(|(w, _)| caps[1].eq_ignore_ascii_case(w))
            .map(|(_, n)| *n)
            .unwrap_or(1);
        let (label, role) = split_label_role(&caps[2]);
        return Some((label, Disambiguator::Ordinal { n, role }));
    }

    let num_re = NUM_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:the\s+)?(\d+)(?:th|st|nd|rd)\s+(.+)$").unwrap()
    });
    if let Some(caps) = num_re.captures(rest) {
        let n: i32 = caps[1].parse().unwrap_or(1);
        let (label, role) = split_label_role(&caps[2]);
        return Some((label, Disambiguator::Ordinal { n, role }));
    }

    let role_n_re = ROLE_N_RE.get_or_init(|| Regex::new(r"(?i)^([a-z ]+?)\s+(\d+)$").unwrap());
    if let Some(caps) = role_n_re.captures(rest) {
        let n: i32 = caps[2].parse().unwrap_or(1);
        return Some((caps[1].trim().to_string(), Disambiguator::Ordinal { n, role: None }));
    }

    None
}

/// Splits a trailing role word (e.g. "save button" -> label="save", role=Some("button")).
fn split_label_role(s: &str) -> (String, Option<String>) {
    const ROLES: &[&str] = &[
        "button", "link", "tab", "field", "checkbox", "radio", "menu item", "image", "slider",
        "switch", "list", "table", "toolbar", "dialog",
    ];
    let trimmed = s.trim();
    for role in ROLES {
        if let Some(label) = trimmed.strip_suffix(role) {
            let label = label.trim();
            if !label.is_empty() {
                return (label.to_string(), Some((*role).to_string()));
            }
        }
    }
    (trimmed.to_string(), None)
}

fn parse_spatial(rest: &str) -> Option<(String, Disambiguator)> {
    static DIR_RE: OnceLock<Regex> = OnceLock::new();
    static REGION_RE: OnceLock<Regex> = OnceLock::new();

    let dir_re = DIR_RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s+(below|above|left of|right of|near)\s+(.+)$").unwrap()
    });
    if let Some(caps) = dir_re.captures(rest) {
        let direction = match caps[2].to_lowercase().as_str() {
            "below" => SpatialDirection::Below,
            "above" => SpatialDirection::Above,
            "left of" => SpatialDirection::LeftOf,
            "right of" => SpatialDirection::RightOf,
            _ => SpatialDirection::Near,
        };
        return Some((
            caps[1].trim().to_string(),
            Disambiguator::Spatial { direction, reference: caps[3].trim().to_string() },
        ));
    }

    let region_re = REGION_RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s+in\s+(?:the\s+)?(top[\s-]left|top[\s-]center|top[\s-]right|middle[\s-]left|center|middle[\s-]right|bottom[\s-]left|bottom[\s-]center|bottom[\s-]right)$").unwrap()
    });
    if let Some(caps) = region_re.captures(rest) {
        let region = match caps[2].to_lowercase().replace('-', " ").as_str() {
            "top left" => ScreenRegion::TopLeft,
            "top center" => ScreenRegion::TopCenter,
            "top right" => ScreenRegion::TopRight,
            "middle left" => ScreenRegion::MiddleLeft,
            "middle right" => ScreenRegion::MiddleRight,
            "bottom left" => ScreenRegion::BottomLeft,
            "bottom center" => ScreenRegion::BottomCenter,
            "bottom right" => ScreenRegion::BottomRight,
            _ => ScreenRegion::Center,
        };
        return Some((caps[1].trim().to_string(), Disambiguator::Region(region)));
    }

    None
}

fn parse_container(rest: &str) -> Option<(String, Disambiguator)> {
    static MATCH_RE: OnceLock<Regex> = OnceLock::new();
    static INDEX_RE: OnceLock<Regex> = OnceLock::new();

    let match_re = MATCH_RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s+in\s+(?:the\s+)?row\s+(?:with|containing|that has|that contains)\s+(.+)$").unwrap()
    });
    if let Some(caps) = match_re.captures(rest) {
        return Some((
            caps[1].trim().to_string(),
            Disambiguator::Container { row_match: caps[2].trim().to_string() },
        ));
    }

    let index_re = INDEX_RE.get_or_init(|| {
        Regex::new(r"(?i)^(.+?)\s+in\s+(?:the\s+)?row\s+(\d+)$").unwrap()
    });
    if let Some(caps) = index_re.captures(rest) {
        let n: usize = caps[2].parse().unwrap_or(1);
        return Some((caps[1].trim().to_string(), Disambiguator::ContainerIndex { row_n: n }));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_splits_on_semicolons() {
        let steps = split_chain("open Calculator; press 2; press +; press 3; press =");
        assert_eq!(steps, vec!["open Calculator", "press 2", "press +", "press 3", "press ="]);
    }

    #[test]
    fn verb_synonyms_normalize_to_click() {
        let parsed = parse_step("tap Save").unwrap();
        assert!(matches!(parsed, ParsedIntent::Click { target, .. } if target == "Save"));
    }

    #[test]
    fn typo_correction_within_cutoff() {
        let (verb, _) = normalize_verb("clikc Save").unwrap();
        assert_eq!(verb, "click");
    }

    #[test]
    fn typo_correction_skipped_with_menu_marker() {
        let (verb, _) = normalize_verb("clikc > File > Save").unwrap();
        assert_eq!(verb, "clikc");
    }

    #[test]
    fn ordinal_second_with_role() {
        let parsed = parse_step("click the 2nd save button").unwrap();
        match parsed {
            ParsedIntent::Click { target, disambiguator: Disambiguator::Ordinal { n, role }, .. } => {
                assert_eq!(target, "save");
                assert_eq!(n, 2);
                assert_eq!(role.as_deref(), Some("button"));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn ordinal_last_with_role() {
        let parsed = parse_step("click the last save button").unwrap();
        match parsed {
            ParsedIntent::Click { disambiguator: Disambiguator::Ordinal { n: -1, .. }, .. } => {}
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn spatial_below_reference() {
        let parsed = parse_step("click Submit below Cancel").unwrap();
        match parsed {
            ParsedIntent::Click { disambiguator: Disambiguator::Spatial { direction, reference }, .. } => {
                assert_eq!(direction, SpatialDirection::Below);
                assert_eq!(reference, "Cancel");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn coordinate_click() {
        let parsed = parse_step("click at 100,200").unwrap();
        match parsed {
            ParsedIntent::Click { disambiguator: Disambiguator::Coordinate { x, y }, .. } => {
                assert_eq!(x, 100.0);
                assert_eq!(y, 200.0);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn fill_parses_comma_separated_pairs() {
        let fields = parse_fill(r#"Name=Alice, Email="alice@example.com""#);
        assert_eq!(fields[0], ("Name".to_string(), "Alice".to_string()));
        assert_eq!(fields[1], ("Email".to_string(), "alice@example.com".to_string()));
    }

    #[test]
    fn fill_via_parse_step() {
        let parsed = parse_step(r#"fill Name=Alice, Email=alice@example.com"#).unwrap();
        match parsed {
            ParsedIntent::Fill { fields } => assert_eq!(fields.len(), 2),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn wait_for_target_with_timeout() {
        let parsed = parse_step("wait for Dialog 5s").unwrap();
        match parsed {
            ParsedIntent::Wait { target, timeout, .. } => {
                assert_eq!(target.as_deref(), Some("Dialog"));
                assert_eq!(timeout, Duration::from_secs(5));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn select_all_shortcut() {
        assert_eq!(parse_step("select all").unwrap(), ParsedIntent::Shortcut(Shortcut::SelectAll));
    }

    #[test]
    fn menu_path_click() {
        let parsed = parse_step("click File > Save").unwrap();
        match parsed {
            ParsedIntent::Click { menu_path: Some(path), .. } => {
                assert_eq!(path, vec!["File".to_string(), "Save".to_string()]);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
