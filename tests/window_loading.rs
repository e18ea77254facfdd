use kestrel_ui::catalog::{CatalogPayload, SceneCatalog, SceneRequestLog};
use kestrel_ui::config::UiConfig;
use kestrel_ui::events::UiEvent;
use kestrel_ui::load::{AfterLoad, LoadError, OnLoadError};
use kestrel_ui::window::standard::StandardWindow;
use kestrel_ui::window::{share, LayerId, WindowRc};
use kestrel_ui::UiService;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

const DT: f32 = 1.0 / 60.0;

fn service_with(config: UiConfig, catalog: serde_json::Value) -> (UiService, SceneRequestLog) {
    let catalog = SceneCatalog::from_json_str(&catalog.to_string()).expect("catalog parses");
    let requests = catalog.request_log();
    (UiService::new(config, Box::new(catalog)), requests)
}

fn ticks(service: &mut UiService, count: usize) {
    for _ in 0..count {
        service.update(DT);
    }
}

type Delivered = Rc<RefCell<Vec<WindowRc>>>;
type Failures = Rc<RefCell<Vec<LoadError>>>;

fn collect_loaded(delivered: &Delivered) -> Option<AfterLoad> {
    let delivered = delivered.clone();
    Some(Box::new(move |window: &WindowRc| {
        delivered.borrow_mut().push(window.clone());
        Ok(())
    }))
}

fn collect_errors(failures: &Failures) -> Option<OnLoadError> {
    let failures = failures.clone();
    Some(Box::new(move |err: &LoadError| {
        failures.borrow_mut().push(err.clone());
        Ok(())
    }))
}

fn auth_catalog(load_ticks: u32) -> serde_json::Value {
    json!({
        "scenes": [
            { "name": "auth", "load_ticks": load_ticks, "windows": [ { "name": "login" }, { "name": "signup" } ] }
        ]
    })
}

#[test]
fn show_loads_owning_scene_once() {
    let (mut service, requests) = service_with(UiConfig::default(), auth_catalog(1));
    let id = service.register("login", Some("auth"));
    let shown: Delivered = Rc::default();
    let sink = shown.clone();
    service.show(
        "login",
        Some(Box::new(move |window: &WindowRc| {
            sink.borrow_mut().push(window.clone());
            Ok(())
        })),
    );
    assert_eq!(service.scene_load_calls(), 1);

    ticks(&mut service, 3);
    assert_eq!(requests.count("auth"), 1);
    assert_eq!(shown.borrow().len(), 1);
    let login = &shown.borrow()[0];
    assert!(login.borrow().is_loaded());
    assert!(service.is_visible("login"));
    assert!(service.registry().window(id).handle().refers_to(login));
}

#[test]
fn concurrent_requests_share_one_load() {
    let (mut service, requests) = service_with(UiConfig::default(), auth_catalog(2));
    service.register("login", Some("auth"));
    service.register("signup", Some("auth"));
    let delivered: Delivered = Rc::default();
    service.load_window("login", collect_loaded(&delivered), None);
    service.load_window("signup", collect_loaded(&delivered), None);
    assert_eq!(service.scene_load_calls(), 1);
    assert_eq!(service.pending_requests(), 2);

    ticks(&mut service, 4);
    let names: Vec<String> = delivered.borrow().iter().map(|w| w.borrow().name().to_string()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"login".to_string()) && names.contains(&"signup".to_string()));

    service.load_window("login", collect_loaded(&delivered), None);
    assert_eq!(delivered.borrow().len(), 3, "a loaded window resolves synchronously");
    assert_eq!(requests.count("auth"), 1);
}

#[test]
fn failed_load_reaches_every_waiter_and_allows_retry() {
    let catalog = json!({
        "scenes": [
            {
                "name": "broken",
                "load_ticks": 1,
                "fail_on_load": "boom",
                "windows": [ { "name": "a" }, { "name": "b" } ]
            }
        ]
    });
    let (mut service, requests) = service_with(UiConfig::default(), catalog);
    service.register("a", Some("broken"));
    service.register("b", Some("broken"));
    let failures: Failures = Rc::default();
    service.load_window("a", None, collect_errors(&failures));
    service.load_window("b", None, collect_errors(&failures));

    ticks(&mut service, 3);
    let failures = failures.borrow();
    assert_eq!(failures.len(), 2);
    for err in failures.iter() {
        match err {
            LoadError::SceneLoadFailed { scene, reason, .. } => {
                assert_eq!(scene, "broken");
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(service.scene_load_calls(), 1);

    service.load_window("a", None, None);
    assert_eq!(requests.count("broken"), 2, "a later caller retries the load");
}

#[test]
fn unregistered_window_fails_without_loading() {
    let (mut service, requests) = service_with(UiConfig::default(), auth_catalog(0));
    let failures: Failures = Rc::default();
    service.load_window("nope", None, collect_errors(&failures));
    assert_eq!(*failures.borrow(), vec![LoadError::UnregisteredWindow { window: "nope".into() }]);
    assert!(requests.is_empty());
    assert_eq!(service.pending_events(), 1);
    let events = service.drain_events();
    assert!(matches!(events.as_slice(), [UiEvent::WindowLoadFailed { .. }]));
    assert_eq!(service.pending_events(), 0);
}

#[test]
fn window_missing_from_loaded_scene_is_not_found() {
    let catalog = json!({ "scenes": [ { "name": "auth", "windows": [ { "name": "login" } ] } ] });
    let (mut service, requests) = service_with(UiConfig::default(), catalog);
    service.register("login", Some("auth"));
    service.register("ghost", Some("auth"));
    let failures: Failures = Rc::default();
    service.load_window("ghost", None, collect_errors(&failures));
    ticks(&mut service, 2);
    assert_eq!(
        *failures.borrow(),
        vec![LoadError::WindowNotFound { window: "ghost".into(), scene: "auth".into() }]
    );

    service.load_window("ghost", None, collect_errors(&failures));
    assert_eq!(failures.borrow().len(), 2);
    assert_eq!(requests.count("auth"), 1, "a populated scene is never reloaded");
    assert!(service.window("login").is_some());
}

#[test]
fn loader_refusals_fail_immediately() {
    let catalog = json!({ "scenes": [ { "name": "empty", "no_operation": true } ] });
    let (mut service, _) = service_with(UiConfig::default(), catalog);
    service.register("panel", Some("empty"));
    service.register("orphan", Some("nowhere"));
    let failures: Failures = Rc::default();
    service.load_window("panel", None, collect_errors(&failures));
    service.load_window("orphan", None, collect_errors(&failures));

    let failures = failures.borrow();
    assert_eq!(failures.len(), 2);
    assert!(matches!(&failures[0], LoadError::SceneLoadFailed { scene, .. } if scene == "empty"));
    assert!(matches!(&failures[1], LoadError::SceneLoadFailed { reason, .. } if reason.contains("Unknown scene")));
    let scene = service.registry().lookup_scene("empty").expect("scene entry");
    assert!(!service.registry().scene(scene).is_loading());
}

#[test]
fn scene_timeout_abandons_a_stuck_load() {
    let mut config = UiConfig::default();
    config.loading.scene_timeout_ticks = Some(3);
    let (mut service, _) = service_with(config, auth_catalog(50));
    service.register("login", Some("auth"));
    let failures: Failures = Rc::default();
    service.load_window("login", None, collect_errors(&failures));

    ticks(&mut service, 2);
    assert!(failures.borrow().is_empty());
    ticks(&mut service, 1);
    assert!(matches!(
        failures.borrow().as_slice(),
        [LoadError::SceneLoadFailed { reason, .. }] if reason.contains("timed out")
    ));
}

#[test]
fn destroyed_windows_are_detected() {
    let (mut service, _) = service_with(UiConfig::default(), auth_catalog(0));
    let id = service.register("login", Some("auth"));
    service.load_window("login", None, None);
    ticks(&mut service, 1);
    assert!(service.window("login").is_some());

    let released = service.layers_mut().release("login").expect("login was parented");
    drop(released);
    let handle = service.registry().window(id).handle();
    assert!(handle.is_set());
    assert!(!handle.is_alive());
    assert!(service.window("login").is_none());
    assert!(!service.hide("login"));

    let failures: Failures = Rc::default();
    service.load_window("login", None, collect_errors(&failures));
    assert!(matches!(failures.borrow().as_slice(), [LoadError::WindowNotFound { .. }]));
}

#[test]
fn callback_requests_apply_on_the_next_tick() {
    let (mut service, _) = service_with(UiConfig::default(), auth_catalog(0));
    service.register("login", Some("auth"));
    service.register("signup", Some("auth"));
    let commands = service.commands();
    service.load_window(
        "login",
        Some(Box::new(move |_: &WindowRc| {
            commands.show("signup", None);
            Ok(())
        })),
        None,
    );

    ticks(&mut service, 1);
    assert_eq!(service.commands().len(), 1);
    assert!(!service.is_visible("signup"));
    ticks(&mut service, 1);
    assert!(service.commands().is_empty());
    assert!(service.is_visible("signup"));
}

#[test]
fn out_of_band_payloads_register_their_windows() {
    let (mut service, requests) = service_with(UiConfig::default(), auth_catalog(0));
    let hud = share(StandardWindow::new("hud_bar", LayerId(6)));
    service.resolve_payload(Box::new(CatalogPayload::new("hud", vec![hud.clone()])));

    let live = service.window("hud_bar").expect("delayed registration attaches the window");
    assert!(Rc::ptr_eq(&live, &hud));
    assert!(hud.borrow().is_loaded());
    assert_eq!(hud.borrow().parent(), Some(LayerId(6)));
    let scene = service.registry().lookup_scene("hud").expect("payload name becomes the scene");
    assert!(!service.registry().scene(scene).is_empty());

    service.show("hud_bar", None);
    assert!(service.is_visible("hud_bar"));
    assert!(requests.is_empty());
}

#[test]
fn scene_association_conflict_leaves_the_other_scene_loadable() {
    let catalog = json!({
        "scenes": [
            { "name": "first", "windows": [ { "name": "a" }, { "name": "b" } ] },
            { "name": "second", "windows": [ { "name": "c" } ] }
        ]
    });
    let (mut service, requests) = service_with(UiConfig::default(), catalog);
    service.register("a", Some("first"));
    service.register("b", Some("second"));
    service.register("c", Some("second"));
    service.load_window("a", None, None);
    ticks(&mut service, 1);
    assert!(service.window("b").is_some(), "b arrived with the first payload");

    let delivered: Delivered = Rc::default();
    let failures: Failures = Rc::default();
    service.load_window("c", collect_loaded(&delivered), collect_errors(&failures));
    ticks(&mut service, 2);
    assert!(failures.borrow().is_empty(), "unexpected failures {:?}", failures.borrow());
    assert_eq!(delivered.borrow().len(), 1);
    assert!(service.window("c").is_some());
    assert_eq!(requests.requests(), vec!["first".to_string(), "second".to_string()]);
}
