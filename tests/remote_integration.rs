use holo_xr::config::{ProgramConfig, RemoteConfig};
use holo_xr::engine::XrProgram;
use holo_xr::remote::{
    CameraSettings, ConnectionStatus, MODEL_ROOT_POSITION, RemoteAccount, RemoteCommand,
    ScriptedRemoteBackend,
};
use holo_xr::render::NullGraphicsPlugin;
use holo_xr::vr::{ReferenceSpaceType, SimulatedRuntime};

fn remote_config() -> ProgramConfig {
    ProgramConfig {
        idle_throttle_ms: 1,
        remote: Some(RemoteConfig {
            status_poll_delay_ms: 0,
            ..RemoteConfig::default()
        }),
        ..ProgramConfig::default()
    }
}

fn program_with(
    backend: ScriptedRemoteBackend,
    frames: u64,
) -> XrProgram<SimulatedRuntime, NullGraphicsPlugin> {
    program_with_config(remote_config(), backend, frames)
}

fn program_with_config(
    config: ProgramConfig,
    backend: ScriptedRemoteBackend,
    frames: u64,
) -> XrProgram<SimulatedRuntime, NullGraphicsPlugin> {
    let mut runtime = SimulatedRuntime::new();
    runtime.schedule_user_exit(frames);
    XrProgram::new(config, runtime, NullGraphicsPlugin::new())
        .with_remote_backend(Box::new(backend))
}

fn with_remote(edit: impl FnOnce(&mut RemoteConfig)) -> ProgramConfig {
    let mut config = remote_config();
    if let Some(remote) = config.remote.as_mut() {
        edit(remote);
    }
    config
}

#[test]
fn session_connects_and_loads_the_model() {
    let backend = ScriptedRemoteBackend::new();
    let journal = backend.journal();
    let mut program = program_with(backend, 40);
    program.run().expect("run");

    let remote = program.remote().expect("remote rendering");
    assert_eq!(remote.state().status(), ConnectionStatus::Connected);
    assert!(remote.state().model_loaded());
    assert_eq!(remote.status_lines(), None);

    let app_space = program.spaces().expect("spaces").app_space;
    {
        let journal = journal.lock().expect("journal");
        assert!(matches!(
            journal.commands.first(),
            Some(RemoteCommand::CreateSession { lease_minutes: 10, .. })
        ));
        assert!(journal.commands.contains(&RemoteCommand::Connect));
        assert_eq!(journal.model_root, Some(MODEL_ROOT_POSITION));
        assert_eq!(journal.app_space_updates, vec![app_space]);
        assert_eq!(
            journal.camera,
            Some(CameraSettings {
                near: 0.1,
                far: 20.0,
                inverse_depth: true,
                depth_enabled: true,
            })
        );
        assert!(journal.blits > 0);
        assert!(journal.overlay_pose.is_some());
        assert_eq!(
            journal.overlay_draws.first().map(|lines| lines[0].as_str()),
            Some("Starting session...")
        );
        assert!(!journal.disconnected);
    }

    assert!(program.graphics().views().iter().all(|view| view.composited));

    drop(program);
    assert!(journal.lock().expect("journal").disconnected);
}

#[test]
fn status_overlay_space_sits_in_front_of_the_viewer() {
    let mut program = program_with(ScriptedRemoteBackend::new(), 2);
    program.run().expect("run");

    let spaces = program.spaces().expect("spaces");
    assert_eq!(spaces.app_space_type, ReferenceSpaceType::Unbounded);
    assert!(spaces.status_space.is_some());
}

#[test]
fn failed_session_creation_is_reported_on_the_overlay() {
    let backend = ScriptedRemoteBackend::new().with_session_result(Err("quota exceeded".to_string()));
    let journal = backend.journal();
    let mut program = program_with(backend, 10);
    program.run().expect("run");

    let remote = program.remote().expect("remote rendering");
    assert_eq!(remote.state().status(), ConnectionStatus::ConnectionFailed);
    assert_eq!(
        remote.status_lines(),
        Some(
            &[
                "Failed to connect".to_string(),
                "Error: quota exceeded".to_string()
            ][..]
        )
    );

    let journal = journal.lock().expect("journal");
    assert_eq!(journal.blits, 0);
    assert!(journal.app_space_updates.is_empty());
    assert_eq!(journal.camera, None);
}

#[test]
fn remote_block_without_backend_renders_locally() {
    let mut runtime = SimulatedRuntime::new();
    runtime.schedule_user_exit(3);
    let mut program = XrProgram::new(remote_config(), runtime, NullGraphicsPlugin::new());
    program.run().expect("run");

    assert!(program.remote().is_none());
    assert!(program.graphics().views().iter().all(|view| !view.composited));
}

#[test]
fn account_settings_reach_the_backend() {
    let config = with_remote(|remote| {
        remote.account_id = "0a1b2c".to_string();
        remote.account_key = "secret-key".to_string();
        remote.remote_rendering_domain = "eastus.mixedreality.azure.com".to_string();
        remote.account_domain = "eastus2.mixedreality.azure.com".to_string();
    });
    let backend = ScriptedRemoteBackend::new();
    let journal = backend.journal();
    let mut program = program_with_config(config, backend, 3);
    program.run().expect("run");

    let journal = journal.lock().expect("journal");
    let Some(RemoteCommand::CreateSession { account, .. }) = journal.commands.first() else {
        panic!("unexpected first command: {:?}", journal.commands.first());
    };
    assert_eq!(
        account,
        &RemoteAccount {
            account_id: "0a1b2c".to_string(),
            account_key: "secret-key".to_string(),
            remote_rendering_domain: "eastus.mixedreality.azure.com".to_string(),
            account_domain: "eastus2.mixedreality.azure.com".to_string(),
        }
    );
}

#[test]
fn existing_session_is_opened_connected_and_loaded() {
    let config = with_remote(|remote| {
        remote.account_id = "0a1b2c".to_string();
        remote.session_id = Some("existing-session".to_string());
    });
    let backend = ScriptedRemoteBackend::new();
    let journal = backend.journal();
    let mut program = program_with_config(config, backend, 40);
    program.run().expect("run");

    let remote = program.remote().expect("remote rendering");
    assert_eq!(remote.state().session_id(), Some("existing-session"));
    assert_eq!(remote.state().status(), ConnectionStatus::Connected);
    assert!(remote.state().model_loaded());

    let journal = journal.lock().expect("journal");
    match journal.commands.first() {
        Some(RemoteCommand::OpenSession {
            account,
            session_id,
        }) => {
            assert_eq!(session_id, "existing-session");
            assert_eq!(account.account_id, "0a1b2c");
        }
        other => panic!("unexpected first command: {other:?}"),
    }
    assert!(
        !journal
            .commands
            .iter()
            .any(|command| matches!(command, RemoteCommand::CreateSession { .. }))
    );
    assert!(journal.commands.contains(&RemoteCommand::QueryProperties {
        session_id: "existing-session".to_string()
    }));
    assert!(journal.commands.contains(&RemoteCommand::Connect));
    assert!(journal.commands.contains(&RemoteCommand::LoadModel {
        uri: "builtin://Engine".to_string()
    }));
    assert_eq!(journal.model_root, Some(MODEL_ROOT_POSITION));
    assert!(journal.blits > 0);
}
