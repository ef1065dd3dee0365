use bevy_ecs::prelude::{Component, Entity, World};
use kestrel_events::argument::PersistentArgument;
use kestrel_events::config::ExecutionMode;
use kestrel_events::error::EventError;
use kestrel_events::event::{Event, PersistentCalls};
use kestrel_events::listener::{CallState, Invocation, ListenerStatus, ListenerTarget, PersistentListener};
use kestrel_events::method::MethodId;
use kestrel_events::named_event_value;
use kestrel_events::runtime::{EventModule, EventRuntime, RuntimeBuilder};
use kestrel_events::types::ValueType;
use kestrel_events::value::Value;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Component, Default)]
struct Counter {
    hits: u32,
    last: i32,
    total: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Enemy {
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Boss {
    name: String,
}

named_event_value!(Enemy, "Enemy");
named_event_value!(Boss, "Boss");

type Journal = Arc<Mutex<Vec<String>>>;

struct GameplayModule {
    journal: Journal,
}

impl EventModule for GameplayModule {
    fn name(&self) -> &'static str {
        "gameplay"
    }

    fn register(&self, builder: &mut RuntimeBuilder) -> anyhow::Result<()> {
        builder
            .methods_mut()
            .component::<Counter>("Counter")
            .method("hit", |counter: &mut Counter| counter.hits += 1)
            .method("set_last", |counter: &mut Counter, value: i32| counter.last = value)
            .method("add", |counter: &mut Counter, amount: f32| counter.total += amount)
            .method("refuse", |_counter: &mut Counter, code: i32| -> anyhow::Result<()> {
                anyhow::bail!("refused with code {code}")
            });

        let record = Arc::clone(&self.journal);
        let defeat = Arc::clone(&self.journal);
        let accept = Arc::clone(&self.journal);
        builder
            .methods_mut()
            .static_type("Journal")
            .function("record", move |entry: String| record.lock().expect("journal lock").push(entry))
            .function("defeat", move |enemy: Enemy| {
                defeat.lock().expect("journal lock").push(format!("defeated {}", enemy.name))
            })
            .function("accept", move |value: Value| {
                accept.lock().expect("journal lock").push(format!("accepted {value}"))
            });
        builder.types_mut().declare("Boss", "Enemy");
        Ok(())
    }
}

fn runtime_with_mode(mode: ExecutionMode) -> (EventRuntime, Journal) {
    let journal = Journal::default();
    let module = GameplayModule { journal: Arc::clone(&journal) };
    let runtime = RuntimeBuilder::new().with_mode(mode).with_module(&module).build();
    (runtime, journal)
}

fn runtime() -> (EventRuntime, Journal) {
    runtime_with_mode(ExecutionMode::Runtime)
}

fn counter(name: &str, params: impl IntoIterator<Item = ValueType>) -> MethodId {
    MethodId::new("Counter", name, params)
}

fn journal_method(name: &str, params: impl IntoIterator<Item = ValueType>) -> MethodId {
    MethodId::new("Journal", name, params)
}

fn spawn_counter(world: &mut World) -> Entity {
    world.spawn(Counter::default()).id()
}

fn hits(world: &World, entity: Entity) -> u32 {
    world.get::<Counter>(entity).expect("counter component").hits
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("journal lock").clone()
}

#[test]
fn unknown_method_only_silences_its_own_listener() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut event = Event::<()>::new()
        .with_persistent(PersistentListener::component(entity, counter("hit", [])))
        .with_persistent(PersistentListener::component(entity, counter("explode", [])))
        .with_persistent(PersistentListener::component(entity, counter("hit", [])));

    event.invoke(&runtime, &mut world, ());
    assert_eq!(hits(&world, entity), 2, "first and third listeners fire");

    let statuses: Vec<_> = event.persistent().listeners().iter().map(PersistentListener::status).collect();
    assert_eq!(statuses, vec![ListenerStatus::Ready, ListenerStatus::Inert, ListenerStatus::Ready]);
    let reason = event.persistent().listeners()[1].inert_reason().expect("inert listener keeps its reason");
    assert!(matches!(reason, EventError::UnknownMethod(_)), "got {reason}");

    event.invoke(&runtime, &mut world, ());
    assert_eq!(hits(&world, entity), 4, "inert listener stays out of later invocations");
}

#[test]
fn call_site_index_out_of_range_skips_that_listener() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut event = Event::<(i32,)>::new()
        .with_persistent(
            PersistentListener::component(entity, counter("set_last", [ValueType::I32]))
                .with_argument(PersistentArgument::call_site(0, ValueType::I32)),
        )
        .with_persistent(
            PersistentListener::component(entity, counter("set_last", [ValueType::I32]))
                .with_argument(PersistentArgument::call_site(3, ValueType::I32)),
        )
        .with_persistent(PersistentListener::component(entity, counter("hit", [])));

    event.invoke(&runtime, &mut world, (42,));
    let state = world.get::<Counter>(entity).expect("counter");
    assert_eq!(state.last, 42);
    assert_eq!(state.hits, 1);
    let reason = event.persistent().listeners()[1].inert_reason().expect("second listener is inert");
    assert!(matches!(reason, EventError::ParamIndexOutOfRange { param: 3, available: 1, .. }), "got {reason}");
}

#[test]
fn changing_the_method_reinitializes_the_listener() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut event =
        Event::<()>::new().with_persistent(PersistentListener::component(entity, counter("missing", [])));

    event.invoke(&runtime, &mut world, ());
    assert_eq!(event.persistent().listeners()[0].status(), ListenerStatus::Inert);
    assert_eq!(hits(&world, entity), 0);

    event.persistent_mut().listeners_mut()[0].set_method(Some(counter("hit", [])));
    assert_eq!(event.persistent().listeners()[0].status(), ListenerStatus::Uninitialized);
    event.invoke(&runtime, &mut world, ());
    assert_eq!(event.persistent().listeners()[0].status(), ListenerStatus::Ready);
    assert_eq!(hits(&world, entity), 1);
}

#[test]
fn retargeting_moves_the_call_to_another_entity() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let first = spawn_counter(&mut world);
    let second = spawn_counter(&mut world);
    let mut event = Event::<()>::new().with_persistent(PersistentListener::component(first, counter("hit", [])));

    event.invoke(&runtime, &mut world, ());
    event.persistent_mut().listeners_mut()[0].set_target(ListenerTarget::Component { entity: second });
    event.invoke(&runtime, &mut world, ());
    assert_eq!((hits(&world, first), hits(&world, second)), (1, 1));
}

#[test]
fn call_state_is_matched_against_the_execution_mode() {
    for (mode, expected) in [(ExecutionMode::Editor, 1), (ExecutionMode::Runtime, 2)] {
        let (runtime, _) = runtime_with_mode(mode);
        let mut world = World::new();
        let entity = spawn_counter(&mut world);
        let mut event = Event::<()>::new();
        for state in CallState::ALL {
            let listener = PersistentListener::component(entity, counter("hit", [])).with_call_state(state);
            event.add_persistent(listener);
        }
        event.invoke(&runtime, &mut world, ());
        assert_eq!(hits(&world, entity), expected, "hits in {mode} mode");
    }
}

#[test]
fn turning_a_listener_off_keeps_its_resolution() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut listener = PersistentListener::component(entity, counter("hit", []));

    assert_eq!(listener.invoke(&runtime, &mut world, &[], &[]).expect("invoke"), Invocation::Fired);
    listener.set_call_state(CallState::Off);
    assert_eq!(listener.status(), ListenerStatus::Ready, "call state changes keep the cache");
    assert_eq!(listener.invoke(&runtime, &mut world, &[], &[]).expect("invoke"), Invocation::Disabled);
    assert_eq!(hits(&world, entity), 1);
}

#[test]
fn dynamic_listeners_run_after_persistent_ones_in_order() {
    let (runtime, journal) = runtime();
    let mut world = World::new();
    let mut event = Event::<(String,)>::new().with_persistent(
        PersistentListener::static_call(journal_method("record", [ValueType::String]))
            .with_argument(PersistentArgument::call_site(0, ValueType::String)),
    );
    let first_log = Arc::clone(&journal);
    let first = event.add_listener(move |(text,): &(String,)| {
        first_log.lock().expect("journal lock").push(format!("first saw {text}"))
    });
    let second_log = Arc::clone(&journal);
    event.add_listener(move |(text,): &(String,)| {
        second_log.lock().expect("journal lock").push(format!("second saw {text}"))
    });

    event.invoke(&runtime, &mut world, ("ping".to_string(),));
    assert_eq!(entries(&journal), vec!["ping", "first saw ping", "second saw ping"]);

    assert!(event.remove_listener(first));
    journal.lock().expect("journal lock").clear();
    event.invoke(&runtime, &mut world, ("pong".to_string(),));
    assert_eq!(entries(&journal), vec!["pong", "second saw pong"]);
}

#[test]
fn failing_method_does_not_stop_the_others() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut event = Event::<()>::new()
        .with_persistent(PersistentListener::component(entity, counter("hit", [])))
        .with_persistent(
            PersistentListener::component(entity, counter("refuse", [ValueType::I32]))
                .with_argument(PersistentArgument::constant_of(7i32)),
        )
        .with_persistent(PersistentListener::component(entity, counter("hit", [])));

    event.invoke(&runtime, &mut world, ());
    assert_eq!(hits(&world, entity), 2);
    assert_eq!(
        event.persistent().listeners()[1].status(),
        ListenerStatus::Ready,
        "a failing call is not a resolution failure"
    );

    let mut refuse = event.persistent().listeners()[1].clone();
    let err = refuse.invoke(&runtime, &mut world, &[], &[]).unwrap_err();
    assert!(err.to_string().contains("refused with code 7"), "got {err}");
}

#[test]
fn missing_component_is_reported_per_call() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let bare = world.spawn_empty().id();
    let mut listener = PersistentListener::component(bare, counter("hit", []));
    let err = listener.invoke(&runtime, &mut world, &[], &[]).unwrap_err();
    assert!(matches!(err, EventError::MissingComponent { .. }), "got {err}");
    assert_eq!(listener.status(), ListenerStatus::Ready);
}

#[test]
fn static_methods_need_a_static_target() {
    let (runtime, journal) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut listener = PersistentListener::component(entity, journal_method("record", [ValueType::String]))
        .with_argument(PersistentArgument::constant_of("hello".to_string()));
    assert_eq!(listener.invoke(&runtime, &mut world, &[], &[]).expect("invoke"), Invocation::Inert);
    assert!(matches!(listener.inert_reason(), Some(EventError::TargetKindMismatch { .. })));

    listener.set_target(ListenerTarget::Static);
    assert_eq!(listener.invoke(&runtime, &mut world, &[], &[]).expect("invoke"), Invocation::Fired);
    assert_eq!(entries(&journal), vec!["hello"]);
}

#[test]
fn stored_and_call_site_values_are_widened() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut event = Event::<(u8,)>::new()
        .with_persistent(
            PersistentListener::component(entity, counter("add", [ValueType::F32]))
                .with_argument(PersistentArgument::constant_of(-128i8).targeting(ValueType::F32)),
        )
        .with_persistent(
            PersistentListener::component(entity, counter("set_last", [ValueType::I32]))
                .with_argument(PersistentArgument::call_site(0, ValueType::I32)),
        );

    event.invoke(&runtime, &mut world, (255u8,));
    let state = world.get::<Counter>(entity).expect("counter");
    assert_eq!(state.total, -128.0);
    assert_eq!(state.last, 255);
}

#[test]
fn arguments_without_a_conversion_make_the_listener_inert() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut event = Event::<(f64,)>::new().with_persistent(
        PersistentListener::component(entity, counter("add", [ValueType::F32]))
            .with_argument(PersistentArgument::call_site(0, ValueType::F32)),
    );
    event.invoke(&runtime, &mut world, (1.5,));
    let reason = event.persistent().listeners()[0].inert_reason().expect("f64 does not narrow");
    assert!(matches!(reason, EventError::NoConversion { .. }), "got {reason}");
    assert_eq!(world.get::<Counter>(entity).expect("counter").total, 0.0);
}

#[test]
fn subtype_values_pass_to_parent_parameters() {
    let (runtime, journal) = runtime();
    let mut world = World::new();
    let mut event = Event::<(Boss,)>::new().with_persistent(
        PersistentListener::static_call(journal_method("defeat", [ValueType::named("Enemy")]))
            .with_argument(PersistentArgument::call_site(0, ValueType::named("Enemy"))),
    );
    event.invoke(&runtime, &mut world, (Boss { name: "Warden".into() },));
    assert_eq!(entries(&journal), vec!["defeated Warden"]);
}

#[test]
fn any_parameters_accept_every_value() {
    let (runtime, journal) = runtime();
    let mut world = World::new();
    let mut event = Event::<(f32,)>::new().with_persistent(
        PersistentListener::static_call(journal_method("accept", [ValueType::Any]))
            .with_argument(PersistentArgument::call_site(0, ValueType::Any)),
    );
    event.invoke(&runtime, &mut world, (0.5,));
    assert_eq!(entries(&journal), vec!["accepted 0.5f32"]);
}

#[test]
fn editing_arguments_in_place_reinitializes() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let entity = spawn_counter(&mut world);
    let mut listener = PersistentListener::component(entity, counter("set_last", [ValueType::I32]))
        .with_argument(PersistentArgument::constant_of(1i32));
    listener.invoke(&runtime, &mut world, &[], &[]).expect("invoke");
    assert_eq!(world.get::<Counter>(entity).expect("counter").last, 1);

    listener.arguments_mut()[0] = PersistentArgument::constant_of(9i16).targeting(ValueType::I32);
    assert_eq!(listener.status(), ListenerStatus::Uninitialized);
    listener.invoke(&runtime, &mut world, &[], &[]).expect("invoke");
    assert_eq!(world.get::<Counter>(entity).expect("counter").last, 9);
}

#[test]
#[should_panic(expected = "signature declares")]
fn invoking_with_the_wrong_arity_panics() {
    let (runtime, _) = runtime();
    let mut world = World::new();
    let mut calls = PersistentCalls::default();
    calls.invoke(&runtime, &mut world, &[ValueType::I32], &[]);
}
