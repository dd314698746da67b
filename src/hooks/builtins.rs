//! Builtin hook handlers (spec §4.7): circuit breaker, auto-dismiss-safe-dialogs, label
//! learning hint injection, journal/learning/workflow-step/navigation-graph recorders, and
//! the `on_error` skill-hint suggester.

use super::context::HookContext;
use super::registry::{Event, HookRegistry};
use crate::config::Config;
use crate::error::NexusError;
use crate::model::JournalEntry;
use crate::session::{ActionJournal, PendingFailures, SpatialCache};
use crate::store::Store;
use std::sync::Arc;

/// Registers every builtin handler against `registry`. Grounded on spec §4.7's fixed handler
/// list — recipes/scripts never extend this set, only the intent dispatcher consults it.
pub fn register_builtins(
    registry: &HookRegistry,
    cache: Arc<SpatialCache>,
    journal: Arc<ActionJournal>,
    store: Arc<Store>,
    config: Arc<Config>,
) {
    let pending_failures = Arc::new(PendingFailures::new(config.label_learning_window()));
    {
        let cache = cache.clone();
        registry.on(
            Event::BeforePerceive,
            10,
            "spatial_cache_read",
            Box::new(move |ctx| {
                let Some(pid) = ctx.pid else { return Ok(()) };
                if let Some((elements, fp)) = cache.get(pid, 500) {
                    ctx.cached_elements = Some(elements);
                    ctx.fingerprint_before = Some(fp);
                }
                Ok(())
            }),
        );
    }

    registry.on(
        Event::AfterPerceive,
        10,
        "dialog_detection",
        Box::new(|ctx| {
            // Dialog classification happens in the perception pipeline's template layer;
            // this hook only surfaces what was already detected into the response context.
            let _ = ctx;
            Ok(())
        }),
    );

    {
        let config = config.clone();
        registry.on(
            Event::AfterPerceive,
            20,
            "auto_dismiss_hint",
            Box::new(move |ctx| {
                if !config.auto_dismiss_safe_dialogs {
                    return Ok(());
                }
                for (_label, class) in &ctx.detected_dialogs {
                    if class.is_safe_to_auto_dismiss() {
                        ctx.skill_hint = class.safe_button_label().map(|b| format!("click {b}"));
                        return Ok(());
                    }
                }
                Ok(())
            }),
        );
    }

    {
        let store = store.clone();
        registry.on(
            Event::AfterPerceive,
            30,
            "label_learning_hint",
            Box::new(move |ctx| {
                let Some(app) = ctx.app.clone() else { return Ok(()) };
                ctx.label_hint = learning_hint_for_app(&store, &app)?;
                Ok(())
            }),
        );
    }

    {
        let journal = journal.clone();
        let config = config.clone();
        registry.on(
            Event::BeforeAct,
            10,
            "circuit_breaker",
            Box::new(move |ctx| {
                let Some(app) = ctx.app.clone() else { return Ok(()) };
                let now = now_s();
                let failures = journal.consecutive_failures_in_app(&app, config.circuit_breaker_window(), now);
                if failures.len() >= config.circuit_breaker_threshold {
                    ctx.short_circuit = Some(format!(
                        "circuit broken: {} consecutive failures in {app}",
                        failures.len()
                    ));
                    return Err(NexusError::CircuitBroken {
                        app: app.clone(),
                        count: failures.len(),
                        recent: failures.iter().map(|f| f.error.clone()).collect(),
                    });
                }
                Ok(())
            }),
        );
    }

    registry.on(
        Event::BeforeAct,
        20,
        "unsafe_dialog_guard",
        Box::new(|ctx| {
            for (_label, class) in ctx.detected_dialogs.clone() {
                if !class.is_safe_to_auto_dismiss() {
                    ctx.short_circuit = Some(format!("unsafe dialog blocking: {}", class.label()));
                    return Err(NexusError::DialogBlocking { classification: class.label().to_string() });
                }
            }
            Ok(())
        }),
    );

    {
        let journal = journal.clone();
        registry.on(
            Event::AfterAct,
            10,
            "journal_recorder",
            Box::new(move |ctx| {
                journal.push(JournalEntry {
                    ts: now_s(),
                    intent_text: ctx.intent_text.clone().unwrap_or_default(),
                    app: ctx.app.clone().unwrap_or_default(),
                    ok: ctx.ok.unwrap_or(false),
                    elapsed_s: ctx.elapsed_s.unwrap_or(0.0),
                    error: ctx.error_message.clone().unwrap_or_default(),
                    post_diff: String::new(),
                });
                Ok(())
            }),
        );
    }

    {
        let store = store.clone();
        registry.on(
            Event::AfterAct,
            20,
            "learning_recorder",
            Box::new(move |ctx| {
                let Some(app) = ctx.app.clone() else { return Ok(()) };
                let Some(verb) = ctx.verb.clone() else { return Ok(()) };
                store.action_record(
                    &app,
                    &verb,
                    ctx.ok.unwrap_or(false),
                    ctx.intent_text.as_deref(),
                    ctx.target.as_deref(),
                    ctx.method.as_deref(),
                    ctx.via_label.as_deref(),
                )?;
                if let Some(method) = ctx.method.clone() {
                    store.method_stat_record(&app, &method, ctx.ok.unwrap_or(false))?;
                }
                Ok(())
            }),
        );
    }

    {
        let store = store.clone();
        let pending_failures = pending_failures.clone();
        registry.on(
            Event::AfterAct,
            25,
            "label_correlation",
            Box::new(move |ctx| {
                let (Some(app), Some(verb), Some(target)) =
                    (ctx.app.clone(), ctx.verb.clone(), ctx.target.clone())
                else {
                    return Ok(());
                };
                let now = now_s();
                if ctx.ok.unwrap_or(false) {
                    if let Some(original) = pending_failures.correlate_success(&app, &verb, &target, now) {
                        store.label_learn(&app, &original, &target.to_lowercase())?;
                    }
                } else {
                    pending_failures.record_failure(&app, &verb, &target, now);
                }
                Ok(())
            }),
        );
    }

    {
        let store = store.clone();
        registry.on(
            Event::AfterAct,
            30,
            "workflow_step_recorder",
            Box::new(move |ctx| {
                let (Some(step), Some(app), Some(verb)) = (ctx.recording_step, ctx.app.clone(), ctx.intent_text.clone()) else {
                    return Ok(());
                };
                let workflow_id = store.workflow_create(&format!("_recording:{app}"), Some(&app))?;
                store.workflow_add_step(workflow_id, step, &verb, ctx.fingerprint_after.clone().as_deref(), 10_000)?;
                Ok(())
            }),
        );
    }

    {
        let store = store.clone();
        registry.on(
            Event::AfterAct,
            40,
            "navigation_graph_recorder",
            Box::new(move |ctx| {
                let (Some(before), Some(after), Some(app), Some(verb)) = (
                    ctx.fingerprint_before.clone(),
                    ctx.fingerprint_after.clone(),
                    ctx.app.clone(),
                    ctx.intent_text.clone(),
                ) else {
                    return Ok(());
                };
                if before == after {
                    return Ok(());
                }
                let now = now_s();
                store.graph_upsert_node(&before, &app, &before, now)?;
                store.graph_upsert_node(&after, &app, &after, now)?;
                store.graph_upsert_edge(&before, &after, &verb, ctx.ok.unwrap_or(false), ctx.elapsed_s.unwrap_or(0.0), now)?;
                Ok(())
            }),
        );
    }

    registry.on(
        Event::OnError,
        10,
        "skill_hint_suggester",
        Box::new(|ctx| {
            if ctx.skill_hint.is_none() {
                ctx.skill_hint = Some("try `list recipes` to see scripted shortcuts for this app".to_string());
            }
            Ok(())
        }),
    );
}

/// Composes the compact "Learned labels: ..." / "Action methods: ..." hint surfaced in
/// `perceive` output, grounded on `learn.py`'s `hints_for_app` (top 5 labels by hits, plus
/// any method with at least 3 samples). Returns `None` when there is nothing to report.
fn learning_hint_for_app(store: &Store, app: &str) -> crate::error::Result<Option<String>> {
    let mut parts = Vec::new();

    let labels = store.label_all_for_app(app)?;
    if !labels.is_empty() {
        let pairs: Vec<String> = labels
            .iter()
            .take(5)
            .map(|e| format!("{} -> {}", e.raw_label, e.learned_label))
            .collect();
        parts.push(format!("Learned labels: {}", pairs.join(", ")));
        if labels.len() > 5 {
            parts.push(format!("  ... and {} more", labels.len() - 5));
        }
    }

    let methods = store.method_stats_for_app(app)?;
    let prefs: Vec<String> = methods
        .iter()
        .filter_map(|(method, ok, fail)| {
            let total = ok + fail;
            if total >= 3 {
                let rate = *ok as f64 / total as f64 * 100.0;
                Some(format!("{method}: {rate:.0}% ({total} actions)"))
            } else {
                None
            }
        })
        .collect();
    if !prefs.is_empty() {
        parts.push(format!("Action methods: {}", prefs.join(", ")));
    }

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("\n")))
    }
}

fn now_s() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn setup() -> (HookRegistry, Arc<SpatialCache>, Arc<ActionJournal>, Arc<Store>) {
        let registry = HookRegistry::new();
        let cache = Arc::new(SpatialCache::default());
        let journal = Arc::new(ActionJournal::default());
        let store = Arc::new(Store::open_in_memory().unwrap());
        let config = Arc::new(Config::default());
        register_builtins(&registry, cache.clone(), journal.clone(), store.clone(), config);
        (registry, cache, journal, store)
    }

    #[test]
    fn circuit_breaker_trips_after_threshold() {
        let (registry, _cache, journal, _store) = setup();
        let now = now_s();
        for i in 0..3 {
            journal.push(JournalEntry {
                ts: now - i as f64,
                intent_text: "click Save".into(),
                app: "Demo".into(),
                ok: false,
                elapsed_s: 0.1,
                error: "not found".into(),
                post_diff: String::new(),
            });
        }
        let mut ctx = HookContext { app: Some("Demo".to_string()), ..Default::default() };
        registry.run(Event::BeforeAct, &mut ctx);
        assert_eq!(registry.recent_errors().len(), 1);
        assert_eq!(registry.recent_errors()[0].hook_name, "circuit_breaker");
    }

    #[test]
    fn journal_recorder_appends_entry() {
        let (registry, _cache, journal, _store) = setup();
        let mut ctx = HookContext {
            app: Some("Demo".to_string()),
            intent_text: Some("click Save".to_string()),
            ok: Some(true),
            elapsed_s: Some(0.2),
            ..Default::default()
        };
        registry.run(Event::AfterAct, &mut ctx);
        assert_eq!(journal.recent().len(), 1);
    }

    #[test]
    fn navigation_graph_recorder_skips_unchanged_fingerprint() {
        let (registry, _cache, _journal, store) = setup();
        let mut ctx = HookContext {
            app: Some("Demo".to_string()),
            intent_text: Some("click Save".to_string()),
            fingerprint_before: Some("abc".to_string()),
            fingerprint_after: Some("abc".to_string()),
            ok: Some(true),
            ..Default::default()
        };
        registry.run(Event::AfterAct, &mut ctx);
        assert!(store.graph_node("abc").unwrap().is_none());
    }

    #[test]
    fn failed_then_successful_click_learns_label() {
        let (registry, _cache, _journal, store) = setup();
        let mut fail_ctx = HookContext {
            app: Some("Demo".to_string()),
            verb: Some("click".to_string()),
            target: Some("Save".to_string()),
            ok: Some(false),
            ..Default::default()
        };
        registry.run(Event::AfterAct, &mut fail_ctx);

        let mut ok_ctx = HookContext {
            app: Some("Demo".to_string()),
            verb: Some("click".to_string()),
            target: Some("Guardar".to_string()),
            ok: Some(true),
            ..Default::default()
        };
        registry.run(Event::AfterAct, &mut ok_ctx);

        assert_eq!(store.label_lookup("Demo", "save").unwrap(), Some("guardar".to_string()));
    }

    #[test]
    fn learning_hint_reports_top_labels_and_method_rates() {
        let (registry, _cache, _journal, store) = setup();
        store.label_learn("Demo", "save", "guardar").unwrap();
        store.method_stat_record("Demo", "ax_find", true).unwrap();
        store.method_stat_record("Demo", "ax_find", true).unwrap();
        store.method_stat_record("Demo", "ax_find", false).unwrap();

        let mut ctx = HookContext { app: Some("Demo".to_string()), ..Default::default() };
        registry.run(Event::AfterPerceive, &mut ctx);

        let hint = ctx.label_hint.unwrap();
        assert!(hint.contains("Learned labels: save -> guardar"));
        assert!(hint.contains("Action methods: ax_find: 67% (3 actions)"));
    }
}
