pub mod config;
pub mod engine;
pub mod remote;
pub mod render;
pub mod vr;

use config::ProgramConfig;
use engine::XrProgram;
use remote::ScriptedRemoteBackend;
use render::NullGraphicsPlugin;
use vr::{SimulatedRuntime, XrResult};

/// Frames the headless session renders before the simulated user leaves.
pub const HEADLESS_FRAME_COUNT: u64 = 600;

/// Runs one complete session against the in-process runtime and the recording graphics plugin.
///
/// Hosts that own a D3D11 device construct an [`XrProgram`] over `vr::openxr::OpenXrRuntime`
/// and their own [`render::GraphicsPlugin`] instead.
pub fn run(config: ProgramConfig) -> XrResult<()> {
    let mut runtime = SimulatedRuntime::new();
    runtime.schedule_user_exit(HEADLESS_FRAME_COUNT);

    let mut program = XrProgram::new(config, runtime, NullGraphicsPlugin::new());
    if program.config().remote.is_some() {
        program = program.with_remote_backend(Box::new(ScriptedRemoteBackend::new()));
    }
    program.run()?;

    log::info!(
        "[xr] headless session submitted {} frames, {} holograms",
        program.runtime().submitted_frames().len(),
        program.holograms().len()
    );
    Ok(())
}
