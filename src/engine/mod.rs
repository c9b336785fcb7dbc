pub mod events;
pub mod frame;
pub mod input;
pub mod swapchain;

use self::events::{Effect, transition};
use self::frame::DemoCubes;
use self::input::{Hologram, Placement, poll_actions};
use self::swapchain::{RenderResources, create_swapchains};
use crate::config::ProgramConfig;
use crate::remote::{RemoteRendering, RemoteRenderingBackend};
use crate::render::{Cube, GraphicsPlugin};
use crate::vr::{
    ActionLayout, EnvironmentBlendMode, FeatureLevel, FormFactor, KHR_COMPOSITION_LAYER_DEPTH,
    KHR_D3D11_ENABLE, MSFT_SPATIAL_ANCHOR, MSFT_UNBOUNDED_REFERENCE_SPACE, PerHand, Pose,
    ReferenceSpaceType, SessionState, SpaceId, SystemId, XrError, XrEvent, XrResult, XrRuntime,
};
use glam::Vec3;
use std::thread;
use std::time::Instant;

/// Optional runtime capabilities enabled on the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionalExtensions {
    pub depth_layer: bool,
    pub unbounded_space: bool,
    pub spatial_anchor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSpaces {
    pub app_space: SpaceId,
    pub app_space_type: ReferenceSpaceType,
    pub hand_spaces: PerHand<SpaceId>,
    pub hand_cubes: PerHand<Cube>,
    /// View-locked space the remote status overlay follows.
    pub status_space: Option<SpaceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct LoopControl {
    exit: bool,
    restart: bool,
}

/// Owns the whole XR application: instance, system, session, spaces, swapchains and scene.
pub struct XrProgram<R: XrRuntime, G: GraphicsPlugin> {
    config: ProgramConfig,
    runtime: R,
    graphics: G,
    remote_backend: Option<Box<dyn RemoteRenderingBackend>>,
    remote: Option<RemoteRendering>,
    instance_created: bool,
    extensions: OptionalExtensions,
    system: Option<SystemId>,
    blend_mode: Option<EnvironmentBlendMode>,
    session_created: bool,
    spaces: Option<SessionSpaces>,
    render_resources: Option<RenderResources>,
    holograms: Vec<Hologram>,
    demo_cubes: DemoCubes,
    session_state: SessionState,
    session_running: bool,
    started_at: Instant,
}

impl<R: XrRuntime, G: GraphicsPlugin> XrProgram<R, G> {
    pub fn new(config: ProgramConfig, runtime: R, graphics: G) -> Self {
        Self {
            config,
            runtime,
            graphics,
            remote_backend: None,
            remote: None,
            instance_created: false,
            extensions: OptionalExtensions::default(),
            system: None,
            blend_mode: None,
            session_created: false,
            spaces: None,
            render_resources: None,
            holograms: Vec::new(),
            demo_cubes: DemoCubes::Uninitialized,
            session_state: SessionState::Unknown,
            session_running: false,
            started_at: Instant::now(),
        }
    }

    /// Enables remote rendering when the config carries a `remote` block.
    pub fn with_remote_backend(mut self, backend: Box<dyn RemoteRenderingBackend>) -> Self {
        self.remote_backend = Some(backend);
        self
    }

    /// Blocks until the session exits without a pending restart.
    pub fn run(&mut self) -> XrResult<()> {
        log::info!(
            "[xr] starting {} on {} with {}",
            self.config.application_name,
            self.runtime.label(),
            self.graphics.label()
        );
        self.create_instance()?;
        self.create_actions()?;
        self.start_remote();

        loop {
            self.initialize_system()?;
            self.initialize_session()?;

            let control = loop {
                let control = self.process_events()?;
                if control.exit {
                    break control;
                }

                if self.session_running {
                    self.poll_actions()?;
                    self.update_remote();
                    self.render_frame()?;
                } else {
                    thread::sleep(self.config.idle_throttle());
                }
            };

            if !control.restart {
                break;
            }
            log::warn!("[session] session lost, restarting");
            self.prepare_session_restart();
        }

        log::info!("[xr] exiting");
        Ok(())
    }

    pub fn create_instance(&mut self) -> XrResult<()> {
        if self.instance_created {
            return Err(XrError::call_order("instance already created"));
        }
        let available = self.runtime.available_extensions()?;
        let supported = |name: &str| available.iter().any(|ext| ext == name);

        if !supported(KHR_D3D11_ENABLE) {
            return Err(XrError::MissingExtension(KHR_D3D11_ENABLE));
        }
        let mut enabled = vec![KHR_D3D11_ENABLE];
        let mut enable_optional = |name: &'static str| {
            let on = supported(name);
            if on {
                enabled.push(name);
            }
            on
        };
        self.extensions = OptionalExtensions {
            depth_layer: enable_optional(KHR_COMPOSITION_LAYER_DEPTH),
            unbounded_space: enable_optional(MSFT_UNBOUNDED_REFERENCE_SPACE),
            spatial_anchor: enable_optional(MSFT_SPATIAL_ANCHOR),
        };

        self.runtime
            .create_instance(&self.config.application_name, &enabled)?;
        self.instance_created = true;
        log::info!("[xr] instance created with {enabled:?}");
        Ok(())
    }

    pub fn create_actions(&mut self) -> XrResult<()> {
        let layout = ActionLayout::placement();
        self.runtime.create_actions(&layout)?;
        log::debug!(
            "[input] action set {} with {} bindings",
            layout.action_set_name,
            layout.bindings.len()
        );
        Ok(())
    }

    /// Waits for a headset, then fixes the blend mode.
    pub fn initialize_system(&mut self) -> XrResult<()> {
        let system = loop {
            match self.runtime.system(FormFactor::HeadMountedDisplay) {
                Ok(system) => break system,
                Err(XrError::FormFactorUnavailable) => {
                    log::warn!("[xr] no headset available, retrying");
                    thread::sleep(self.config.system_retry_interval());
                }
                Err(err) => return Err(err),
            }
        };

        let blend_mode = self
            .runtime
            .environment_blend_modes(system)?
            .first()
            .copied()
            .ok_or_else(|| {
                XrError::runtime("xrEnumerateEnvironmentBlendModes", "no blend modes reported")
            })?;

        log::info!("[xr] system {system:?} with {blend_mode:?} blending");
        self.system = Some(system);
        self.blend_mode = Some(blend_mode);
        Ok(())
    }

    pub fn initialize_session(&mut self) -> XrResult<()> {
        if self.session_created {
            return Err(XrError::call_order("session already created"));
        }
        let system = self
            .system
            .ok_or_else(|| XrError::call_order("session before system"))?;

        let requirements = self.runtime.graphics_requirements(system)?;
        let feature_levels = FeatureLevel::PREFERENCE_ORDER
            .into_iter()
            .filter(|level| *level >= requirements.min_feature_level)
            .collect::<Vec<_>>();
        if feature_levels.is_empty() {
            return Err(XrError::UnsupportedFeatureLevel(
                requirements.min_feature_level,
            ));
        }

        let device = self
            .graphics
            .initialize_device(requirements.adapter_luid, &feature_levels)?;
        self.runtime.create_session(system, device)?;
        self.session_created = true;

        self.create_spaces()?;
        self.render_resources = Some(create_swapchains(
            &mut self.runtime,
            system,
            self.graphics.supported_color_formats(),
            self.graphics.supported_depth_formats(),
        )?);
        Ok(())
    }

    pub fn create_spaces(&mut self) -> XrResult<()> {
        let app_space_type = if self.extensions.unbounded_space {
            ReferenceSpaceType::Unbounded
        } else {
            ReferenceSpaceType::Local
        };
        let app_space = self
            .runtime
            .create_reference_space(app_space_type, Pose::IDENTITY)?;

        let status_space = match &self.config.remote {
            Some(remote) => Some(self.runtime.create_reference_space(
                ReferenceSpaceType::View,
                Pose::translation(Vec3::new(0.0, 0.0, -remote.overlay_distance)),
            )?),
            None => None,
        };

        let runtime = &mut self.runtime;
        let hand_spaces = PerHand::try_from_fn(|side| runtime.create_hand_space(side))?;
        let hand_scale = self.config.hand_cube_scale;
        let hand_cubes = PerHand::from_fn(|side| Cube::new(hand_spaces[side], hand_scale));

        log::debug!("[session] app space {app_space_type:?}");
        self.spaces = Some(SessionSpaces {
            app_space,
            app_space_type,
            hand_spaces,
            hand_cubes,
            status_space,
        });
        Ok(())
    }

    /// Releases everything tied to the current session and forgets the system.
    pub fn prepare_session_restart(&mut self) {
        self.demo_cubes = DemoCubes::Uninitialized;
        for hologram in self.holograms.drain(..) {
            hologram.destroy(&mut self.runtime);
        }
        if let Some(resources) = self.render_resources.take() {
            resources.destroy(&mut self.runtime);
        }
        if let Some(spaces) = self.spaces.take() {
            for (_, space) in spaces.hand_spaces.iter() {
                self.runtime.destroy_space(*space);
            }
            if let Some(status_space) = spaces.status_space {
                self.runtime.destroy_space(status_space);
            }
            self.runtime.destroy_space(spaces.app_space);
        }
        if std::mem::take(&mut self.session_created) {
            self.runtime.destroy_session();
        }
        self.session_running = false;
        self.session_state = SessionState::Unknown;
        self.system = None;
    }

    pub fn is_session_focused(&self) -> bool {
        self.session_state.is_focused()
    }

    pub fn is_session_running(&self) -> bool {
        self.session_running
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn system(&self) -> Option<SystemId> {
        self.system
    }

    pub fn blend_mode(&self) -> Option<EnvironmentBlendMode> {
        self.blend_mode
    }

    pub fn extensions(&self) -> OptionalExtensions {
        self.extensions
    }

    pub fn spaces(&self) -> Option<&SessionSpaces> {
        self.spaces.as_ref()
    }

    pub fn render_resources(&self) -> Option<&RenderResources> {
        self.render_resources.as_ref()
    }

    pub fn holograms(&self) -> &[Hologram] {
        &self.holograms
    }

    pub fn demo_cubes(&self) -> DemoCubes {
        self.demo_cubes
    }

    pub fn remote(&self) -> Option<&RemoteRendering> {
        self.remote.as_ref()
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn graphics(&self) -> &G {
        &self.graphics
    }

    fn process_events(&mut self) -> XrResult<LoopControl> {
        let mut control = LoopControl::default();
        while let Some(event) = self.runtime.poll_event()? {
            match &event {
                XrEvent::EventsLost { count } => {
                    log::warn!("[session] {count} events lost");
                }
                XrEvent::SessionStateChanged { state, time } => {
                    log::info!(
                        "[session] {:?} -> {state:?} at {time}",
                        self.session_state
                    );
                }
                other => log::debug!("[session] ignoring {}", other.label()),
            }

            let next = transition(self.session_state, &event);
            self.session_state = next.state;
            match next.effect {
                Effect::None => {}
                Effect::BeginSession => {
                    self.runtime.begin_session()?;
                    self.session_running = true;
                }
                Effect::EndSession => {
                    self.session_running = false;
                    self.runtime.end_session()?;
                }
                Effect::Exit { restart } => {
                    control = LoopControl {
                        exit: true,
                        restart,
                    };
                }
                Effect::InstanceLost => {
                    log::warn!("[xr] instance loss pending");
                    return Ok(LoopControl {
                        exit: true,
                        restart: false,
                    });
                }
            }
        }
        Ok(control)
    }

    fn poll_actions(&mut self) -> XrResult<()> {
        let spaces = self
            .spaces
            .as_ref()
            .ok_or_else(|| XrError::call_order("actions polled before space creation"))?;
        let placement = Placement {
            app_space: spaces.app_space,
            app_space_type: spaces.app_space_type,
            spatial_anchors: self.extensions.spatial_anchor,
            hologram_scale: self.config.hologram_scale,
            haptic_amplitude: self.config.haptic_amplitude,
        };
        let hand_spaces = spaces.hand_spaces;
        let outcome = poll_actions(
            &mut self.runtime,
            &placement,
            &hand_spaces,
            &mut self.holograms,
        )?;
        if outcome.placed > 0 {
            log::info!(
                "[input] placed {} hologram(s), {} total",
                outcome.placed,
                self.holograms.len()
            );
        }
        Ok(())
    }

    fn start_remote(&mut self) {
        let Some(remote_config) = self.config.remote.clone() else {
            return;
        };
        match self.remote_backend.take() {
            Some(backend) => {
                self.remote = Some(RemoteRendering::start(
                    &remote_config,
                    backend,
                    self.started_at.elapsed(),
                ));
            }
            None => log::warn!("[remote] remote block configured but no backend available"),
        }
    }

    fn update_remote(&mut self) {
        let (Some(remote), Some(spaces)) = (self.remote.as_mut(), self.spaces.as_ref()) else {
            return;
        };
        remote.update(
            self.started_at.elapsed(),
            spaces.app_space,
            self.config.depth_range(),
        );
    }
}

impl<R: XrRuntime, G: GraphicsPlugin> Drop for XrProgram<R, G> {
    fn drop(&mut self) {
        self.prepare_session_restart();
    }
}
