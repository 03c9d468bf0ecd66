// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the unload and navigation guards.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Value, json};
use understory_model::{Attributes, Model, SetOptions, SyncOptions};
use understory_trackit::{
    DEFAULT_PROMPT, GuardError, GuardEvent, GuardRegistry, History, Navigation, PromptRule,
    TrackedModel, UnsavedConfig, leave_page_message,
};

fn tracked(registry: &GuardRegistry, value: Value, config: UnsavedConfig) -> TrackedModel {
    let mut model =
        TrackedModel::with_registry(Model::new(Attributes::from_json(value)), registry.clone());
    model.set_unsaved_config(config);
    model
}

fn window(rule: impl Into<PromptRule>) -> UnsavedConfig {
    UnsavedConfig::builder().unload_window_prompt(rule).build()
}

fn router(rule: impl Into<PromptRule>) -> UnsavedConfig {
    UnsavedConfig::builder().unload_router_prompt(rule).build()
}

#[test]
fn unload_prompts_only_when_tracking_unsaved_and_enabled() {
    for tracking in [false, true] {
        for unsaved in [false, true] {
            for enabled in [false, true] {
                let registry = GuardRegistry::new();
                let attrs = json!({ "id": 5, "name": "Samuel Beckett" });
                let mut m = tracked(&registry, attrs, window(enabled));
                if tracking {
                    m.start_tracking(None);
                }
                if unsaved {
                    m.set("work", json!("Molloy"), SetOptions::new());
                }

                let expected = (tracking && unsaved && enabled).then(|| DEFAULT_PROMPT.to_owned());
                assert_eq!(
                    registry.before_unload(),
                    Ok(expected),
                    "tracking={tracking} unsaved={unsaved} enabled={enabled}"
                );
            }
        }
    }
}

#[test]
fn unload_clears_after_save() {
    let registry = GuardRegistry::new();
    let mut m = tracked(&registry, json!({ "id": 5 }), window(true));
    m.start_tracking(None);
    m.set("work", json!("Molloy"), SetOptions::new());
    assert!(registry.before_unload().unwrap().is_some());

    let pending = m.save(None, SyncOptions::new());
    m.complete(&pending, Ok(Attributes::new())).unwrap();
    assert_eq!(registry.before_unload(), Ok(None));
}

#[test]
fn prompt_text_precedence() {
    let registry = GuardRegistry::new();
    let config = UnsavedConfig::builder()
        .unload_window_prompt(true)
        .prompt("Configured")
        .build();

    let mut m = tracked(&registry, json!({ "id": 5 }), config);
    m.start_tracking(None);
    m.set("work", json!("Watt"), SetOptions::new());
    assert_eq!(registry.before_unload(), Ok(Some("Configured".into())));

    m.stop_tracking();
    m.start_tracking(Some("Override"));
    m.set("work", json!("Murphy"), SetOptions::new());
    assert_eq!(registry.before_unload(), Ok(Some("Override".into())));
}

#[test]
fn unload_predicate_is_consulted() {
    let registry = GuardRegistry::new();
    let calls = Rc::new(Cell::new(0));
    let answer = Rc::new(Cell::new(false));
    let (c, a) = (calls.clone(), answer.clone());
    let rule = PromptRule::predicate(move |event| {
        assert_eq!(*event, GuardEvent::Unload);
        c.set(c.get() + 1);
        a.get()
    });

    let mut m = tracked(&registry, json!({ "id": 5 }), window(rule));
    m.start_tracking(None);
    assert_eq!(registry.before_unload(), Ok(None));
    assert_eq!(calls.get(), 0);

    m.set("work", json!("Molloy"), SetOptions::new());
    assert_eq!(registry.before_unload(), Ok(None));
    answer.set(true);
    assert_eq!(registry.before_unload(), Ok(Some(DEFAULT_PROMPT.into())));
    assert_eq!(calls.get(), 2);
}

#[test]
fn named_method_rule() {
    let registry = GuardRegistry::new();
    let mut m = tracked(&registry, json!({ "id": 5 }), window("unload"));
    m.start_tracking(None);
    m.set("work", json!("Molloy"), SetOptions::new());

    assert_eq!(
        registry.before_unload(),
        Err(GuardError::UnknownMethod("unload".into()))
    );

    m.define_method("unload", |_| true);
    assert_eq!(registry.before_unload(), Ok(Some(DEFAULT_PROMPT.into())));
    m.define_method("unload", |_| false);
    assert_eq!(registry.before_unload(), Ok(None));
}

#[test]
fn config_from_json_drives_guards() {
    let registry = GuardRegistry::new();
    let config = UnsavedConfig::from_json(&json!({
        "unloadWindowPrompt": true,
        "unloadRouterPrompt": "leaving",
        "prompt": "Drafts will be lost",
    }))
    .unwrap();
    let mut m = tracked(&registry, json!({ "id": 7 }), config);
    m.define_method("leaving", |event| {
        matches!(event, GuardEvent::Navigate { fragment } if *fragment != "drafts")
    });
    m.start_tracking(None);
    m.set("title", json!("untitled"), SetOptions::new());

    assert_eq!(registry.before_unload(), Ok(Some("Drafts will be lost".into())));
    assert_eq!(registry.before_navigate("home"), Ok(Some("Drafts will be lost".into())));
    assert_eq!(registry.before_navigate("drafts"), Ok(None));
}

#[test]
fn router_false_predicate_navigates_without_asking() {
    let registry = GuardRegistry::new();
    let mut history = History::with_registry(registry.clone());
    let mut m = tracked(
        &registry,
        json!({ "id": 6, "name": "Issey Miyake" }),
        router(PromptRule::predicate(|_| false)),
    );
    m.start_tracking(None);
    m.set("work", json!("Final Home"), SetOptions::new());

    let mut asked = 0;
    let mut confirm = |_: &str| {
        asked += 1;
        false
    };
    assert_eq!(history.navigate("#test", &mut confirm), Ok(Navigation::Proceeded));
    assert_eq!(history.fragment(), "test");
    assert_eq!(asked, 0);
}

#[test]
fn router_true_asks_and_decline_cancels() {
    let registry = GuardRegistry::new();
    let mut history = History::with_registry(registry.clone());
    let mut m = tracked(&registry, json!({ "id": 6, "name": "Issey Miyake" }), router(true));
    m.start_tracking(None);
    m.set("work", json!("Final Home"), SetOptions::new());

    let messages = RefCell::new(Vec::new());
    let mut decline = |message: &str| {
        messages.borrow_mut().push(message.to_owned());
        false
    };
    assert_eq!(history.navigate("#test", &mut decline), Ok(Navigation::Cancelled));
    assert_eq!(history.fragment(), "");
    assert_eq!(*messages.borrow(), vec![leave_page_message(DEFAULT_PROMPT)]);

    let mut accept = |_: &str| true;
    assert_eq!(history.navigate("#test", &mut accept), Ok(Navigation::Proceeded));
    assert_eq!(history.fragment(), "test");
    assert_eq!(history.navigate("/test", &mut decline), Ok(Navigation::Unchanged));
}

#[test]
fn router_guard_ignores_unload_rule() {
    let registry = GuardRegistry::new();
    let mut history = History::with_registry(registry.clone());
    let mut m = tracked(&registry, json!({ "id": 6 }), window(true));
    m.start_tracking(None);
    m.set("work", json!("Pleats Please"), SetOptions::new());

    let mut decline = |_: &str| false;
    assert_eq!(history.navigate("elsewhere", &mut decline), Ok(Navigation::Proceeded));
}

#[test]
fn models_coexist_in_one_registry() {
    let registry = GuardRegistry::new();
    let mut clean = tracked(&registry, json!({ "id": 1 }), window(true));
    let mut dirty = tracked(
        &registry,
        json!({ "id": 2 }),
        UnsavedConfig::builder().unload_window_prompt(true).prompt("second").build(),
    );
    clean.start_tracking(Some("first"));
    dirty.start_tracking(None);
    assert_eq!(registry.len(), 2);

    dirty.set("x", json!(1), SetOptions::new());
    assert_eq!(registry.before_unload(), Ok(Some("second".into())));

    clean.set("x", json!(1), SetOptions::new());
    assert_eq!(registry.before_unload(), Ok(Some("first".into())));

    clean.stop_tracking();
    assert_eq!(registry.before_unload(), Ok(Some("second".into())));
    drop(dirty);
    assert!(registry.is_empty());
    assert_eq!(registry.before_unload(), Ok(None));
}

#[test]
fn global_registry_and_history() {
    let mut m = TrackedModel::new(Model::new(Attributes::from_json(json!({ "id": 8 }))));
    m.set_unsaved_config(router(true));
    assert!(m.registry().ptr_eq(&GuardRegistry::global()));

    m.start_tracking(None);
    assert!(GuardRegistry::global().contains(m.cid()));
    m.set("work", json!("Happy Days"), SetOptions::new());

    let mut history = History::new();
    let mut decline = |_: &str| false;
    assert_eq!(history.navigate("#away", &mut decline), Ok(Navigation::Cancelled));

    m.stop_tracking();
    assert!(!GuardRegistry::global().contains(m.cid()));
    assert_eq!(history.navigate("#away", &mut decline), Ok(Navigation::Proceeded));
}

fn both_guards() -> UnsavedConfig {
    UnsavedConfig::builder()
        .unload_window_prompt(true)
        .unload_router_prompt(true)
        .build()
}

/// Asserts that both guards agree with `unsaved_attributes`.
fn assert_guards_match(m: &TrackedModel, history: &mut History) {
    let unsaved = m.unsaved_attributes(None).has_changes();
    let expected = unsaved.then(|| DEFAULT_PROMPT.to_owned());
    assert_eq!(m.registry().before_unload(), Ok(expected.clone()));
    assert_eq!(m.registry().before_navigate("elsewhere"), Ok(expected));

    let target = if history.fragment() == "a" { "b" } else { "a" };
    let mut decline = |_: &str| false;
    let outcome = if unsaved {
        Navigation::Cancelled
    } else {
        Navigation::Proceeded
    };
    assert_eq!(history.navigate(target, &mut decline), Ok(outcome));
}

#[test]
fn guards_quiet_after_restart() {
    let registry = GuardRegistry::new();
    let mut history = History::with_registry(registry.clone());
    let mut m = tracked(&registry, json!({ "id": 3, "work": "Gummo" }), both_guards());
    m.start_tracking(None);
    m.set("work", json!("Julien Donkey-Boy"), SetOptions::new());
    assert_guards_match(&m, &mut history);

    m.restart_tracking();
    assert_eq!(registry.before_unload(), Ok(None));
    assert_guards_match(&m, &mut history);
}

#[test]
fn guards_quiet_after_reset() {
    let registry = GuardRegistry::new();
    let mut history = History::with_registry(registry.clone());
    let mut m = tracked(&registry, json!({ "id": 3, "work": "Spring Breakers" }), both_guards());
    m.start_tracking(None);
    m.set("work", json!("Gummo"), SetOptions::new());
    assert!(registry.before_unload().unwrap().is_some());

    m.reset_attributes();
    assert_eq!(registry.before_unload(), Ok(None));
    assert_guards_match(&m, &mut history);
}

#[test]
fn guards_follow_trackit_silent_writes() {
    let registry = GuardRegistry::new();
    let mut history = History::with_registry(registry.clone());
    let mut m = tracked(&registry, json!({ "id": 1, "a": 1 }), both_guards());
    m.start_tracking(None);

    // A clean key written silently stays clean.
    m.set("b", json!(5), SetOptions::new().trackit_silent());
    assert_eq!(registry.before_unload(), Ok(None));
    assert_guards_match(&m, &mut history);

    // An unsaved key stays unsaved, even when written back silently.
    m.set("a", json!(2), SetOptions::new());
    m.set("a", json!(1), SetOptions::new().trackit_silent());
    assert!(registry.before_unload().unwrap().is_some());
    assert_guards_match(&m, &mut history);

    m.set("a", json!(1), SetOptions::new());
    assert_eq!(registry.before_unload(), Ok(None));
    assert_guards_match(&m, &mut history);
}

#[test]
fn guards_follow_host_silent_writes() {
    let registry = GuardRegistry::new();
    let mut history = History::with_registry(registry.clone());
    let mut m = tracked(&registry, json!({ "id": 1 }), both_guards());
    m.start_tracking(None);

    m.set("draft", json!("x"), SetOptions::new().silent());
    assert!(registry.before_unload().unwrap().is_some());
    assert_guards_match(&m, &mut history);

    m.unset("draft", SetOptions::new().silent());
    assert_guards_match(&m, &mut history);
}
