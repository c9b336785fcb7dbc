use holo_xr::config::ProgramConfig;
use std::env;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        log::error!("[xr] {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match env::args().nth(1) {
        Some(path) => ProgramConfig::load(path)?,
        None => ProgramConfig::default(),
    };
    holo_xr::run(config)?;
    Ok(())
}
