use super::*;
use crate::ecs::ComponentRef;
use crate::events::EventTarget;

/// Posts `echo` on every update and in answer to `ping`
struct Echo;

impl Named for Echo {
    const NAME: &'static str = "Echo";
}

impl Component for Echo {
    fn type_key(&self) -> TypeKey {
        Self::KEY
    }

    fn update(&mut self, cx: &mut ComponentCx<'_>, _time: f32) {
        cx.post(Event::new("echo", EventTarget::Scene));
    }

    fn on_event(&mut self, cx: &mut ComponentCx<'_>, event: &Event) {
        if event.name() == "ping" {
            cx.post(Event::new("echo", EventTarget::Scene));
        }
    }
}

fn events_in(log: &Mutex<Vec<String>>) -> Vec<String> {
    log.lock()
        .iter()
        .filter(|entry| entry.starts_with("event"))
        .cloned()
        .collect()
}

#[test]
fn test_events_dispatch_oldest_first() {
    let Fixture { scene, .. } = fixture();
    let id = scene.create_entity("listener");
    let (recorder, log) = Recorder::new();
    scene.add(id, recorder);

    for name in ["first", "second", "third"] {
        scene.post_event(Event::new(name, EventTarget::Entity(id)));
    }
    assert_eq!(scene.pending_events(), 3);

    // One event per update by default
    scene.update(0.0);
    assert_eq!(scene.pending_events(), 2);

    assert!(scene.dispatch_last_event());
    assert!(scene.dispatch_last_event());
    assert!(!scene.dispatch_last_event());
    assert_eq!(events_in(&log), ["event first", "event second", "event third"]);
}

#[test]
fn test_component_target_reaches_one_component() {
    let Fixture { scene, .. } = fixture();
    let id = scene.create_entity("target");
    let (recorder, log) = Recorder::new();
    scene.add(id, recorder);
    scene.add(id, Echo);

    scene.post_event(Event::new("other", EventTarget::Component(ComponentRef::new(id, Echo::KEY))));
    scene.post_event(Event::new("mine", EventTarget::Component(ComponentRef::new(id, Recorder::KEY))));
    while scene.dispatch_last_event() {}

    assert_eq!(events_in(&log), ["event mine"]);
}

#[test]
fn test_inactive_components_miss_events() {
    let Fixture { scene, .. } = fixture();
    let id = scene.create_entity("sleeper");
    let (recorder, log) = Recorder::new();
    scene.add(id, recorder);
    assert!(scene.set_active(id, Recorder::KEY, false));
    assert!(!scene.set_active(id, Recorder::KEY, false));

    scene.post_event(Event::new("missed", EventTarget::Scene));
    assert!(scene.dispatch_last_event());

    assert!(scene.set_active(id, Recorder::KEY, true));
    scene.post_event(Event::new("seen", EventTarget::Scene));
    assert!(scene.dispatch_last_event());

    assert_eq!(events_in(&log), ["event seen"]);
}

#[test]
fn test_events_posted_during_update_dispatch_same_tick() {
    let Fixture { scene, .. } = fixture();
    let speaker = scene.create_entity("speaker");
    let hearer = scene.create_entity("hearer");
    scene.add(speaker, Echo);
    let (recorder, log) = Recorder::new();
    scene.add(hearer, recorder);

    scene.update(0.5);
    assert_eq!(*log.lock(), ["update 0.5", "event echo"]);
    assert_eq!(scene.pending_events(), 0);
}

#[test]
fn test_actualize_dispatches_only_queued_events() {
    let Fixture { scene, .. } = fixture();
    let id = scene.create_entity("echo");
    scene.add(id, Echo);

    scene.post_event(Event::new("ping", EventTarget::Scene));
    scene.post_event(Event::new("ping", EventTarget::Scene));
    scene.actualize();

    // Each ping answered with an echo that waits for the next dispatch
    assert_eq!(scene.pending_events(), 2);
}

#[test]
fn test_every_matching_listener_runs() {
    let Fixture { scene, .. } = fixture();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let first = {
        let seen = Arc::clone(&seen);
        scene.listen("hit", move |event: &Event| {
            seen.lock().push(format!("first {}", event.name()));
            true
        })
    };
    {
        let seen = Arc::clone(&seen);
        scene.listen("hit", move |event: &Event| {
            seen.lock().push(format!("second {}", event.name()));
            false
        });
    }
    {
        let seen = Arc::clone(&seen);
        scene.listen("miss", move |_: &Event| {
            seen.lock().push("miss".to_string());
            true
        });
    }

    scene.post_event(Event::new("hit", EventTarget::Scene));
    assert!(scene.dispatch_last_event());
    assert_eq!(*seen.lock(), ["first hit", "second hit"]);

    assert!(scene.unlisten(first));
    assert!(!scene.unlisten(first));
    scene.post_event(Event::new("hit", EventTarget::Scene));
    assert!(scene.dispatch_last_event());
    assert_eq!(*seen.lock(), ["first hit", "second hit", "second hit"]);
}

#[test]
fn test_event_to_removed_entity_is_dropped() {
    let Fixture { scene, .. } = fixture();
    let id = scene.create_entity("gone");
    let (recorder, log) = Recorder::new();
    scene.add(id, recorder);

    scene.post_event(Event::new("late", EventTarget::Entity(id)));
    assert!(scene.remove_entity(id));
    assert!(scene.dispatch_last_event());
    assert!(events_in(&log).is_empty());
}
