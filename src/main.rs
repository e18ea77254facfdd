use kestrel_ui::cli::CliOptions;
use kestrel_ui::demo;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = match CliOptions::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            log::error!("[cli] {err}");
            std::process::exit(2);
        }
    };
    match demo::run(&options) {
        Ok(report) => log::info!(
            "Ran {} frames: {} scene loads, {} popups shown, {} closed, {} load failures",
            report.frames,
            report.scene_loads,
            report.shown.len(),
            report.closed.len(),
            report.load_failures.len()
        ),
        Err(err) => {
            log::error!("Application error: {err:?}");
            std::process::exit(1);
        }
    }
}
