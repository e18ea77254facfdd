//! Headless run of the UI core against the bundled scene catalog.

use anyhow::Result;

use crate::catalog::SceneCatalog;
use crate::cli::CliOptions;
use crate::config::UiConfig;
use crate::events::UiEvent;
use crate::load::LoadError;
use crate::service::UiService;
use crate::time::Time;
use crate::window::WindowRc;

pub const DEFAULT_CONFIG_PATH: &str = "config/ui.json";
pub const DEFAULT_TICKS: u32 = 240;
const DEFAULT_DT: f32 = 1.0 / 60.0;
/// Ticks a popup stays fully shown before the demo dismisses it.
const POPUP_DWELL_TICKS: u32 = 5;
const INTERRUPT_FRAME: u64 = 8;

pub const DEFAULT_CATALOG: &str = r#"{
    "scenes": [
        { "name": "auth", "load_ticks": 2, "windows": [
            { "name": "login", "translation": [0.0, 0.25, 0.0] },
            { "name": "signup", "unregistered": true }
        ]},
        { "name": "shop", "load_ticks": 1, "windows": [
            { "name": "shop_offer", "layer": 6, "transitions": { "show_secs": 0.05, "hide_secs": 0.05 } }
        ]},
        { "name": "dialogs", "windows": [
            { "name": "confirm", "layer": 6 }
        ]},
        { "name": "notices", "load_ticks": 3, "windows": [
            { "name": "daily_reward", "layer": 6 },
            { "name": "news", "layer": 6 },
            { "name": "promo", "layer": 6 }
        ]},
        { "name": "broken", "fail_on_load": "asset bundle missing", "windows": [
            { "name": "broken_panel" }
        ]}
    ]
}"#;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoReport {
    pub frames: u64,
    pub scene_loads: usize,
    pub scene_requests: Vec<String>,
    pub resolved: Vec<String>,
    pub shown: Vec<String>,
    pub closed: Vec<String>,
    pub discarded: Vec<String>,
    pub load_failures: Vec<LoadError>,
}

impl DemoReport {
    fn record(&mut self, event: &UiEvent) {
        match event {
            UiEvent::WindowResolved { window, .. } => self.resolved.push(window.clone()),
            UiEvent::PopupShown { window } => self.shown.push(window.clone()),
            UiEvent::PopupClosed { window } => self.closed.push(window.clone()),
            UiEvent::PopupDiscarded { window } => self.discarded.push(window.clone()),
            UiEvent::WindowLoadFailed { error } => self.load_failures.push(error.clone()),
            _ => {}
        }
    }
}

pub fn run(options: &CliOptions) -> Result<DemoReport> {
    let mut config = match options.config_path() {
        Some(path) => UiConfig::load(path)?,
        None => UiConfig::load_or_default(DEFAULT_CONFIG_PATH),
    };
    let overrides = options.config_overrides();
    if !overrides.is_empty() {
        log::info!("Applying CLI overrides: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }
    let catalog = match options.catalog_path() {
        Some(path) => SceneCatalog::load(path)?,
        None => SceneCatalog::from_json_str(DEFAULT_CATALOG)?,
    };
    let time = Time::fixed(options.fixed_dt().unwrap_or(DEFAULT_DT));
    Ok(run_with(config, catalog, time, options.ticks().unwrap_or(DEFAULT_TICKS)))
}

pub fn run_with(config: UiConfig, catalog: SceneCatalog, mut time: Time, ticks: u32) -> DemoReport {
    let requests = catalog.request_log();
    let registrations = catalog.registrations();
    let mut service = UiService::new(config, Box::new(catalog));
    for (window, scene) in &registrations {
        service.register(window, Some(scene));
    }

    let commands = service.commands();
    service.show(
        "login",
        Some(Box::new(|window: &WindowRc| {
            log::info!("'{}' is on screen", window.borrow().name());
            Ok(())
        })),
    );
    service.popup(
        "shop_offer",
        None,
        Some(Box::new(move |_: &WindowRc| {
            commands.queue_popup("news", None, None, 0);
            Ok(())
        })),
    );
    service.queue_popup_with_priority("daily_reward", None, None, 1);
    let promo = service.queue_popup_with_priority("promo", None, None, 0);
    service.invalidate_popup(promo);
    service.load_window(
        "broken_panel",
        None,
        Some(Box::new(|err: &LoadError| {
            log::warn!("Panel unavailable: {err}");
            Ok(())
        })),
    );
    service.load_window("ghost", None, None);

    let mut report = DemoReport::default();
    let mut dwell: Option<(String, u32)> = None;
    for _ in 0..ticks {
        time.tick();
        service.update(time.delta_seconds());
        for event in service.drain_events() {
            log::info!("[frame {}] {event}", service.frame());
            report.record(&event);
        }

        if service.frame() == INTERRUPT_FRAME {
            service.popup("confirm", None, None);
        }

        let Some(top) = service.popups().top_window_name().map(str::to_string) else {
            dwell = None;
            continue;
        };
        let ready = service.window(&top).is_some_and(|window| window.borrow().is_ready());
        if !ready {
            continue;
        }
        if !dwell.as_ref().is_some_and(|(name, _)| *name == top) {
            dwell = Some((top.clone(), 0));
        }
        let count = dwell.as_mut().map_or(1, |(_, count)| {
            *count += 1;
            *count
        });
        if count >= POPUP_DWELL_TICKS {
            log::debug!("Dismissing popup '{top}'");
            service.hide(&top);
            dwell = None;
        }
    }

    report.frames = service.frame();
    report.scene_loads = service.scene_load_calls();
    report.scene_requests = requests.requests();
    report
}
