//! Deterministic in-process XR runtime.
//!
//! Behaves like a single-headset runtime driven by a frame counter: session state changes are
//! queued as events, button presses and tracking changes can be scripted against frame numbers,
//! and every haptic pulse and submitted frame is recorded for inspection.

use super::math::{pose_inverse, pose_multiply};
use super::{
    ActionLayout, AdapterLuid, AnchorId, BoolAction, BooleanActionState, DeviceHandle,
    EnvironmentBlendMode, FeatureLevel, Fov, FormFactor, FrameEnd, FrameState, GraphicsRequirements,
    HapticPulse, INFINITE_DURATION, ImageCycle, KHR_COMPOSITION_LAYER_DEPTH, KHR_D3D11_ENABLE,
    MSFT_SPATIAL_ANCHOR, MSFT_UNBOUNDED_REFERENCE_SPACE, PerHand, Pose, ProjectionLayer,
    ReferenceSpaceType, STEREO_VIEW_COUNT, SessionState, Side, SpaceId, SpaceLocation,
    SwapchainCreateInfo, SwapchainId, SystemId, TextureHandle, View, ViewConfigurationView,
    ViewState, XrDuration, XrError, XrEvent, XrResult, XrRuntime, XrTime,
};
use crate::render::dxgi;
use glam::Vec3;
use slotmap::SlotMap;
use std::collections::VecDeque;

const FRAME_PERIOD: XrDuration = 11_111_111;
const IMAGES_PER_SWAPCHAIN: u32 = 3;
const HALF_IPD: f32 = 0.032;

#[derive(Debug, Clone, Copy)]
enum SimSpace {
    Reference(Pose),
    Hand(Side),
    Anchor(AnchorId),
}

#[derive(Debug)]
struct SimSwapchain {
    info: SwapchainCreateInfo,
    images: Vec<TextureHandle>,
    cycle: ImageCycle,
}

#[derive(Debug, Clone)]
enum Scripted {
    Event(XrEvent),
    Button {
        side: Side,
        action: BoolAction,
        pressed: bool,
    },
    HandPose {
        side: Side,
        pose: Option<Pose>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ButtonStates {
    place: BooleanActionState,
    exit: BooleanActionState,
}

impl ButtonStates {
    fn get_mut(&mut self, action: BoolAction) -> &mut BooleanActionState {
        match action {
            BoolAction::Place => &mut self.place,
            BoolAction::Exit => &mut self.exit,
        }
    }
}

/// A frame handed to `end_frame`, as the compositor would have received it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedFrame {
    pub frame_index: u64,
    pub display_time: XrTime,
    pub blend_mode: EnvironmentBlendMode,
    pub layers: Vec<ProjectionLayer>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedHaptic {
    pub side: Side,
    pub pulse: HapticPulse,
    pub frame_index: u64,
}

pub struct SimulatedRuntime {
    available_extensions: Vec<String>,
    enabled_extensions: Vec<&'static str>,
    instance_created: bool,
    action_layout: Option<ActionLayout>,
    blend_modes: Vec<EnvironmentBlendMode>,
    requirements: GraphicsRequirements,
    view_configuration: Vec<ViewConfigurationView>,
    swapchain_formats: Vec<i64>,
    form_factor_failures: u32,
    system_requests: u32,
    system: Option<SystemId>,
    session_device: Option<DeviceHandle>,
    sessions_created: u32,
    session_state: SessionState,
    running: bool,
    spaces: SlotMap<SpaceId, SimSpace>,
    anchors: SlotMap<AnchorId, Pose>,
    swapchains: SlotMap<SwapchainId, SimSwapchain>,
    next_texture: usize,
    events: VecDeque<XrEvent>,
    script: Vec<(u64, Scripted)>,
    hand_poses: PerHand<Option<Pose>>,
    buttons: PerHand<ButtonStates>,
    pending_buttons: Vec<(Side, BoolAction, bool)>,
    fail_next_anchor: bool,
    view_state_valid: bool,
    time: XrTime,
    frame_index: u64,
    frame_waited: bool,
    frame_begun: bool,
    haptics: Vec<RecordedHaptic>,
    submitted: Vec<SubmittedFrame>,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        let view = ViewConfigurationView {
            recommended_image_rect_width: 1440,
            max_image_rect_width: 2048,
            recommended_image_rect_height: 936,
            max_image_rect_height: 2048,
            recommended_swapchain_sample_count: 1,
            max_swapchain_sample_count: 4,
        };
        Self {
            available_extensions: [
                KHR_D3D11_ENABLE,
                KHR_COMPOSITION_LAYER_DEPTH,
                MSFT_UNBOUNDED_REFERENCE_SPACE,
                MSFT_SPATIAL_ANCHOR,
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
            enabled_extensions: Vec::new(),
            instance_created: false,
            action_layout: None,
            blend_modes: vec![EnvironmentBlendMode::Additive],
            requirements: GraphicsRequirements {
                adapter_luid: AdapterLuid {
                    low_part: 0x1234,
                    high_part: 0,
                },
                min_feature_level: FeatureLevel::LEVEL_11_0,
            },
            view_configuration: vec![view; STEREO_VIEW_COUNT],
            swapchain_formats: vec![
                dxgi::R8G8B8A8_UNORM_SRGB,
                dxgi::B8G8R8A8_UNORM_SRGB,
                dxgi::D32_FLOAT,
                dxgi::D16_UNORM,
            ],
            form_factor_failures: 0,
            system_requests: 0,
            system: None,
            session_device: None,
            sessions_created: 0,
            session_state: SessionState::Unknown,
            running: false,
            spaces: SlotMap::with_key(),
            anchors: SlotMap::with_key(),
            swapchains: SlotMap::with_key(),
            next_texture: 1,
            events: VecDeque::new(),
            script: Vec::new(),
            hand_poses: PerHand::new(
                Some(Pose::translation(Vec3::new(-0.2, -0.3, -0.4))),
                Some(Pose::translation(Vec3::new(0.2, -0.3, -0.4))),
            ),
            buttons: PerHand::default(),
            pending_buttons: Vec::new(),
            fail_next_anchor: false,
            view_state_valid: true,
            time: 1_000_000_000,
            frame_index: 0,
            frame_waited: false,
            frame_begun: false,
            haptics: Vec::new(),
            submitted: Vec::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.available_extensions = extensions.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_blend_modes(mut self, modes: Vec<EnvironmentBlendMode>) -> Self {
        self.blend_modes = modes;
        self
    }

    pub fn with_min_feature_level(mut self, level: FeatureLevel) -> Self {
        self.requirements.min_feature_level = level;
        self
    }

    pub fn with_view_configuration(mut self, views: Vec<ViewConfigurationView>) -> Self {
        self.view_configuration = views;
        self
    }

    pub fn with_swapchain_formats(mut self, formats: Vec<i64>) -> Self {
        self.swapchain_formats = formats;
        self
    }

    /// The next `count` system queries report that no headset is attached.
    pub fn with_form_factor_failures(mut self, count: u32) -> Self {
        self.form_factor_failures = count;
        self
    }

    pub fn fail_next_anchor(&mut self) {
        self.fail_next_anchor = true;
    }

    pub fn set_view_state_valid(&mut self, valid: bool) {
        self.view_state_valid = valid;
    }

    /// `None` means the hand is not tracked.
    pub fn set_hand_pose(&mut self, side: Side, pose: Option<Pose>) {
        self.hand_poses[side] = pose;
    }

    /// Queues a button change that becomes visible at the next `sync_actions`.
    pub fn set_button(&mut self, side: Side, action: BoolAction, pressed: bool) {
        self.pending_buttons.push((side, action, pressed));
    }

    /// Delivers `event` once `frame` frames have been waited on.
    pub fn schedule_event(&mut self, frame: u64, event: XrEvent) {
        self.script.push((frame, Scripted::Event(event)));
    }

    pub fn schedule_button(&mut self, frame: u64, side: Side, action: BoolAction, pressed: bool) {
        self.script.push((
            frame,
            Scripted::Button {
                side,
                action,
                pressed,
            },
        ));
    }

    pub fn schedule_hand_pose(&mut self, frame: u64, side: Side, pose: Option<Pose>) {
        self.script.push((frame, Scripted::HandPose { side, pose }));
    }

    /// Simulates the user closing the app from the system shell at `frame`.
    pub fn schedule_user_exit(&mut self, frame: u64) {
        self.schedule_event(
            frame,
            XrEvent::SessionStateChanged {
                state: SessionState::Stopping,
                time: 0,
            },
        );
    }

    pub fn enabled_extensions(&self) -> &[&'static str] {
        &self.enabled_extensions
    }

    pub fn system_requests(&self) -> u32 {
        self.system_requests
    }

    pub fn sessions_created(&self) -> u32 {
        self.sessions_created
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn live_space_count(&self) -> usize {
        self.spaces.len()
    }

    pub fn live_anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn live_swapchain_count(&self) -> usize {
        self.swapchains.len()
    }

    pub fn swapchain_infos(&self) -> Vec<SwapchainCreateInfo> {
        self.swapchains.values().map(|chain| chain.info).collect()
    }

    pub fn haptics(&self) -> &[RecordedHaptic] {
        &self.haptics
    }

    pub fn submitted_frames(&self) -> &[SubmittedFrame] {
        &self.submitted
    }

    fn require_instance(&self, call: &'static str) -> XrResult<()> {
        if self.instance_created {
            Ok(())
        } else {
            Err(XrError::call_order(format!("{call} before instance creation")))
        }
    }

    fn require_session(&self, call: &'static str) -> XrResult<()> {
        if self.session_device.is_some() {
            Ok(())
        } else {
            Err(XrError::call_order(format!("{call} without a session")))
        }
    }

    fn is_enabled(&self, extension: &str) -> bool {
        self.enabled_extensions.contains(&extension)
    }

    fn queue_state(&mut self, state: SessionState) {
        self.session_state = state;
        self.events.push_back(XrEvent::SessionStateChanged {
            state,
            time: self.time,
        });
    }

    fn deliver_due_script(&mut self) {
        let frame_index = self.frame_index;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.script)
            .into_iter()
            .partition(|(frame, _)| *frame <= frame_index);
        self.script = pending;

        for (_, item) in due {
            match item {
                Scripted::Event(XrEvent::SessionStateChanged { state, .. }) => {
                    self.queue_state(state)
                }
                Scripted::Event(event) => self.events.push_back(event),
                Scripted::Button {
                    side,
                    action,
                    pressed,
                } => self.pending_buttons.push((side, action, pressed)),
                Scripted::HandPose { side, pose } => self.hand_poses[side] = pose,
            }
        }
    }

    fn world_pose(&self, space: SpaceId) -> XrResult<Option<Pose>> {
        match self.spaces.get(space) {
            Some(SimSpace::Reference(pose)) => Ok(Some(*pose)),
            Some(SimSpace::Hand(side)) => Ok(self.hand_poses[*side]),
            Some(SimSpace::Anchor(anchor)) => self
                .anchors
                .get(*anchor)
                .copied()
                .map(Some)
                .ok_or_else(|| XrError::runtime("xrLocateSpace", "XR_ERROR_HANDLE_INVALID")),
            None => Err(XrError::runtime("xrLocateSpace", "XR_ERROR_HANDLE_INVALID")),
        }
    }

    fn swapchain_mut(&mut self, swapchain: SwapchainId) -> XrResult<&mut SimSwapchain> {
        self.swapchains
            .get_mut(swapchain)
            .ok_or_else(|| XrError::runtime("swapchain", "XR_ERROR_HANDLE_INVALID"))
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl XrRuntime for SimulatedRuntime {
    fn label(&self) -> &'static str {
        "Simulated XR Runtime"
    }

    fn available_extensions(&mut self) -> XrResult<Vec<String>> {
        Ok(self.available_extensions.clone())
    }

    fn create_instance(&mut self, application_name: &str, extensions: &[&'static str]) -> XrResult<()> {
        if self.instance_created {
            return Err(XrError::call_order("instance already created"));
        }
        if let Some(missing) = extensions
            .iter()
            .find(|name| !self.available_extensions.iter().any(|available| available == *name))
        {
            return Err(XrError::runtime(
                "xrCreateInstance",
                format!("XR_ERROR_EXTENSION_NOT_PRESENT ({missing})"),
            ));
        }
        log::debug!("[xr] simulated instance for {application_name}");
        self.enabled_extensions = extensions.to_vec();
        self.instance_created = true;
        Ok(())
    }

    fn create_actions(&mut self, layout: &ActionLayout) -> XrResult<()> {
        self.require_instance("xrCreateActionSet")?;
        self.action_layout = Some(layout.clone());
        Ok(())
    }

    fn system(&mut self, form_factor: FormFactor) -> XrResult<SystemId> {
        self.require_instance("xrGetSystem")?;
        self.system_requests += 1;
        if form_factor != FormFactor::HeadMountedDisplay || self.form_factor_failures > 0 {
            self.form_factor_failures = self.form_factor_failures.saturating_sub(1);
            return Err(XrError::FormFactorUnavailable);
        }
        let system = SystemId(1);
        self.system = Some(system);
        Ok(system)
    }

    fn environment_blend_modes(&mut self, system: SystemId) -> XrResult<Vec<EnvironmentBlendMode>> {
        if self.system != Some(system) {
            return Err(XrError::runtime(
                "xrEnumerateEnvironmentBlendModes",
                "XR_ERROR_SYSTEM_INVALID",
            ));
        }
        Ok(self.blend_modes.clone())
    }

    fn graphics_requirements(&mut self, system: SystemId) -> XrResult<GraphicsRequirements> {
        if self.system != Some(system) {
            return Err(XrError::runtime(
                "xrGetD3D11GraphicsRequirementsKHR",
                "XR_ERROR_SYSTEM_INVALID",
            ));
        }
        Ok(self.requirements)
    }

    fn view_configuration_views(&mut self, system: SystemId) -> XrResult<Vec<ViewConfigurationView>> {
        if self.system != Some(system) {
            return Err(XrError::runtime(
                "xrEnumerateViewConfigurationViews",
                "XR_ERROR_SYSTEM_INVALID",
            ));
        }
        Ok(self.view_configuration.clone())
    }

    fn create_session(&mut self, system: SystemId, device: DeviceHandle) -> XrResult<()> {
        self.require_instance("xrCreateSession")?;
        if self.system != Some(system) {
            return Err(XrError::runtime("xrCreateSession", "XR_ERROR_SYSTEM_INVALID"));
        }
        if self.session_device.is_some() {
            return Err(XrError::call_order("session already exists"));
        }
        if self.action_layout.is_none() {
            return Err(XrError::call_order("action set must exist before attaching"));
        }
        self.session_device = Some(device);
        self.sessions_created += 1;
        self.queue_state(SessionState::Idle);
        self.queue_state(SessionState::Ready);
        Ok(())
    }

    fn destroy_session(&mut self) {
        self.session_device = None;
        self.running = false;
        self.session_state = SessionState::Unknown;
        self.spaces.clear();
        self.anchors.clear();
        self.swapchains.clear();
        self.events
            .retain(|event| !matches!(event, XrEvent::SessionStateChanged { .. }));
        self.system = None;
        self.frame_waited = false;
        self.frame_begun = false;
    }

    fn begin_session(&mut self) -> XrResult<()> {
        self.require_session("xrBeginSession")?;
        if self.session_state != SessionState::Ready || self.running {
            return Err(XrError::runtime("xrBeginSession", "XR_ERROR_SESSION_NOT_READY"));
        }
        self.running = true;
        self.queue_state(SessionState::Synchronized);
        self.queue_state(SessionState::Visible);
        self.queue_state(SessionState::Focused);
        Ok(())
    }

    fn end_session(&mut self) -> XrResult<()> {
        self.require_session("xrEndSession")?;
        if !self.running {
            return Err(XrError::SessionNotRunning);
        }
        if self.session_state != SessionState::Stopping {
            return Err(XrError::runtime("xrEndSession", "XR_ERROR_SESSION_NOT_STOPPING"));
        }
        self.running = false;
        self.queue_state(SessionState::Idle);
        self.queue_state(SessionState::Exiting);
        Ok(())
    }

    fn request_exit_session(&mut self) -> XrResult<()> {
        self.require_session("xrRequestExitSession")?;
        if !self.running {
            return Err(XrError::SessionNotRunning);
        }
        self.queue_state(SessionState::Stopping);
        Ok(())
    }

    fn create_reference_space(&mut self, ty: ReferenceSpaceType, pose: Pose) -> XrResult<SpaceId> {
        self.require_session("xrCreateReferenceSpace")?;
        if ty == ReferenceSpaceType::Unbounded && !self.is_enabled(MSFT_UNBOUNDED_REFERENCE_SPACE) {
            return Err(XrError::runtime(
                "xrCreateReferenceSpace",
                "XR_ERROR_REFERENCE_SPACE_UNSUPPORTED",
            ));
        }
        Ok(self.spaces.insert(SimSpace::Reference(pose)))
    }

    fn create_hand_space(&mut self, side: Side) -> XrResult<SpaceId> {
        self.require_session("xrCreateActionSpace")?;
        Ok(self.spaces.insert(SimSpace::Hand(side)))
    }

    fn create_spatial_anchor(&mut self, base: SpaceId, pose: Pose, _time: XrTime) -> XrResult<AnchorId> {
        self.require_session("xrCreateSpatialAnchorMSFT")?;
        if !self.is_enabled(MSFT_SPATIAL_ANCHOR) {
            return Err(XrError::runtime(
                "xrCreateSpatialAnchorMSFT",
                "XR_ERROR_FUNCTION_UNSUPPORTED",
            ));
        }
        if std::mem::take(&mut self.fail_next_anchor) {
            return Err(XrError::SpatialAnchorCreationFailed);
        }
        let base_pose = self
            .world_pose(base)?
            .ok_or(XrError::SpatialAnchorCreationFailed)?;
        Ok(self.anchors.insert(pose_multiply(&pose, &base_pose)))
    }

    fn create_anchor_space(&mut self, anchor: AnchorId) -> XrResult<SpaceId> {
        self.require_session("xrCreateSpatialAnchorSpaceMSFT")?;
        if !self.anchors.contains_key(anchor) {
            return Err(XrError::runtime(
                "xrCreateSpatialAnchorSpaceMSFT",
                "XR_ERROR_HANDLE_INVALID",
            ));
        }
        Ok(self.spaces.insert(SimSpace::Anchor(anchor)))
    }

    fn destroy_anchor(&mut self, anchor: AnchorId) {
        self.anchors.remove(anchor);
    }

    fn destroy_space(&mut self, space: SpaceId) {
        self.spaces.remove(space);
    }

    fn locate_space(&mut self, space: SpaceId, base: SpaceId, _time: XrTime) -> XrResult<SpaceLocation> {
        let (Some(space_pose), Some(base_pose)) = (self.world_pose(space)?, self.world_pose(base)?)
        else {
            return Ok(SpaceLocation::invalid());
        };
        Ok(SpaceLocation::tracked(pose_multiply(
            &space_pose,
            &pose_inverse(&base_pose),
        )))
    }

    fn swapchain_formats(&mut self) -> XrResult<Vec<i64>> {
        self.require_session("xrEnumerateSwapchainFormats")?;
        Ok(self.swapchain_formats.clone())
    }

    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> XrResult<SwapchainId> {
        self.require_session("xrCreateSwapchain")?;
        if !self.swapchain_formats.contains(&info.format) {
            return Err(XrError::runtime(
                "xrCreateSwapchain",
                "XR_ERROR_SWAPCHAIN_FORMAT_UNSUPPORTED",
            ));
        }
        let images = (0..IMAGES_PER_SWAPCHAIN)
            .map(|offset| TextureHandle(self.next_texture + offset as usize))
            .collect();
        self.next_texture += IMAGES_PER_SWAPCHAIN as usize;
        Ok(self.swapchains.insert(SimSwapchain {
            info: *info,
            images,
            cycle: ImageCycle::new(IMAGES_PER_SWAPCHAIN),
        }))
    }

    fn swapchain_images(&mut self, swapchain: SwapchainId) -> XrResult<Vec<TextureHandle>> {
        Ok(self.swapchain_mut(swapchain)?.images.clone())
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) {
        self.swapchains.remove(swapchain);
    }

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainId) -> XrResult<u32> {
        self.swapchain_mut(swapchain)?.cycle.acquire()
    }

    fn wait_swapchain_image(&mut self, swapchain: SwapchainId, timeout: XrDuration) -> XrResult<()> {
        if timeout != INFINITE_DURATION {
            log::debug!("[swapchain] simulated wait ignores finite timeout {timeout}");
        }
        self.swapchain_mut(swapchain)?.cycle.wait().map(|_| ())
    }

    fn release_swapchain_image(&mut self, swapchain: SwapchainId) -> XrResult<()> {
        self.swapchain_mut(swapchain)?.cycle.release().map(|_| ())
    }

    fn poll_event(&mut self) -> XrResult<Option<XrEvent>> {
        self.require_instance("xrPollEvent")?;
        self.deliver_due_script();
        Ok(self.events.pop_front())
    }

    fn sync_actions(&mut self) -> XrResult<()> {
        self.require_session("xrSyncActions")?;
        if self.action_layout.is_none() {
            return Err(XrError::runtime("xrSyncActions", "XR_ERROR_ACTIONSET_NOT_ATTACHED"));
        }
        for (_, states) in self.buttons.iter_mut() {
            states.place.changed_since_last_sync = false;
            states.exit.changed_since_last_sync = false;
            states.place.is_active = true;
            states.exit.is_active = true;
        }
        for (side, action, pressed) in std::mem::take(&mut self.pending_buttons) {
            let state = self.buttons[side].get_mut(action);
            if state.current_state != pressed {
                state.current_state = pressed;
                state.changed_since_last_sync = true;
                state.last_change_time = self.time;
            }
        }
        Ok(())
    }

    fn boolean_action_state(&mut self, action: BoolAction, side: Side) -> XrResult<BooleanActionState> {
        self.require_session("xrGetActionStateBoolean")?;
        Ok(*self.buttons[side].get_mut(action))
    }

    fn apply_haptic_feedback(&mut self, side: Side, pulse: HapticPulse) -> XrResult<()> {
        self.require_session("xrApplyHapticFeedback")?;
        self.haptics.push(RecordedHaptic {
            side,
            pulse,
            frame_index: self.frame_index,
        });
        Ok(())
    }

    fn wait_frame(&mut self) -> XrResult<FrameState> {
        self.require_session("xrWaitFrame")?;
        if !self.running {
            return Err(XrError::SessionNotRunning);
        }
        self.frame_index += 1;
        self.time += FRAME_PERIOD;
        self.frame_waited = true;
        Ok(FrameState {
            predicted_display_time: self.time,
            predicted_display_period: FRAME_PERIOD,
            should_render: matches!(
                self.session_state,
                SessionState::Visible | SessionState::Focused
            ),
        })
    }

    fn begin_frame(&mut self) -> XrResult<()> {
        if !std::mem::take(&mut self.frame_waited) {
            return Err(XrError::call_order("xrBeginFrame without xrWaitFrame"));
        }
        self.frame_begun = true;
        Ok(())
    }

    fn locate_views(&mut self, _display_time: XrTime, space: SpaceId) -> XrResult<(ViewState, Vec<View>)> {
        self.require_session("xrLocateViews")?;
        let base_pose = self
            .world_pose(space)?
            .ok_or_else(|| XrError::runtime("xrLocateViews", "XR_ERROR_HANDLE_INVALID"))?;
        let to_base = pose_inverse(&base_pose);
        let views = [-HALF_IPD, HALF_IPD]
            .into_iter()
            .map(|offset| View {
                pose: pose_multiply(&Pose::translation(Vec3::new(offset, 0.0, 0.0)), &to_base),
                fov: Fov {
                    angle_left: -0.75,
                    angle_right: 0.7,
                    angle_up: 0.6,
                    angle_down: -0.65,
                },
            })
            .collect();
        let state = ViewState {
            position_valid: self.view_state_valid,
            orientation_valid: self.view_state_valid,
        };
        Ok((state, views))
    }

    fn end_frame(&mut self, frame: FrameEnd<'_>) -> XrResult<()> {
        if !std::mem::take(&mut self.frame_begun) {
            return Err(XrError::call_order("xrEndFrame without xrBeginFrame"));
        }
        if let Some(chain) = self
            .swapchains
            .values()
            .find(|chain| chain.cycle.outstanding().is_some())
        {
            return Err(XrError::call_order(format!(
                "xrEndFrame with image {:?} still acquired",
                chain.cycle.outstanding()
            )));
        }
        self.submitted.push(SubmittedFrame {
            frame_index: self.frame_index,
            display_time: frame.display_time,
            blend_mode: frame.blend_mode,
            layers: frame.layers.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vr::SwapchainUsage;

    fn started_runtime() -> SimulatedRuntime {
        let mut runtime = SimulatedRuntime::new();
        runtime
            .create_instance("sim-test", &[KHR_D3D11_ENABLE, MSFT_SPATIAL_ANCHOR])
            .expect("instance");
        runtime
            .create_actions(&ActionLayout::placement())
            .expect("actions");
        let system = runtime.system(FormFactor::HeadMountedDisplay).expect("system");
        runtime
            .create_session(system, DeviceHandle(1))
            .expect("session");
        runtime
    }

    fn drain_states(runtime: &mut SimulatedRuntime) -> Vec<SessionState> {
        let mut states = Vec::new();
        while let Some(event) = runtime.poll_event().expect("poll") {
            if let XrEvent::SessionStateChanged { state, .. } = event {
                states.push(state);
            }
        }
        states
    }

    #[test]
    fn session_lifecycle_emits_state_events() {
        let mut runtime = started_runtime();
        assert_eq!(
            drain_states(&mut runtime),
            vec![SessionState::Idle, SessionState::Ready]
        );

        runtime.begin_session().expect("begin");
        assert_eq!(
            drain_states(&mut runtime),
            vec![
                SessionState::Synchronized,
                SessionState::Visible,
                SessionState::Focused
            ]
        );

        runtime.request_exit_session().expect("exit");
        assert_eq!(drain_states(&mut runtime), vec![SessionState::Stopping]);
        runtime.end_session().expect("end");
        assert_eq!(
            drain_states(&mut runtime),
            vec![SessionState::Idle, SessionState::Exiting]
        );
    }

    #[test]
    fn form_factor_failures_are_counted_down() {
        let mut runtime = SimulatedRuntime::new().with_form_factor_failures(2);
        runtime
            .create_instance("sim-test", &[KHR_D3D11_ENABLE])
            .expect("instance");

        for _ in 0..2 {
            match runtime.system(FormFactor::HeadMountedDisplay) {
                Err(XrError::FormFactorUnavailable) => {}
                other => panic!("unexpected system result: {other:?}"),
            }
        }
        assert!(runtime.system(FormFactor::HeadMountedDisplay).is_ok());
        assert_eq!(runtime.system_requests(), 3);
    }

    #[test]
    fn hand_space_is_located_relative_to_base() {
        let mut runtime = started_runtime();
        let app = runtime
            .create_reference_space(ReferenceSpaceType::Local, Pose::IDENTITY)
            .expect("app space");
        let hand = runtime.create_hand_space(Side::Left).expect("hand space");

        runtime.set_hand_pose(Side::Left, Some(Pose::translation(Vec3::new(0.1, 0.2, -0.3))));
        let location = runtime.locate_space(hand, app, 0).expect("locate");
        assert!(location.is_pose_valid());
        assert!((location.pose.position - Vec3::new(0.1, 0.2, -0.3)).length() < 1e-6);

        runtime.set_hand_pose(Side::Left, None);
        let location = runtime.locate_space(hand, app, 0).expect("locate");
        assert!(!location.is_pose_valid());
    }

    #[test]
    fn anchor_failure_is_one_shot() {
        let mut runtime = started_runtime();
        let app = runtime
            .create_reference_space(ReferenceSpaceType::Local, Pose::IDENTITY)
            .expect("app space");

        runtime.fail_next_anchor();
        assert!(matches!(
            runtime.create_spatial_anchor(app, Pose::IDENTITY, 0),
            Err(XrError::SpatialAnchorCreationFailed)
        ));
        assert!(runtime.create_spatial_anchor(app, Pose::IDENTITY, 0).is_ok());
    }

    #[test]
    fn button_changes_surface_on_sync() {
        let mut runtime = started_runtime();
        runtime.set_button(Side::Right, BoolAction::Place, true);

        let before = runtime
            .boolean_action_state(BoolAction::Place, Side::Right)
            .expect("state");
        assert!(!before.current_state);

        runtime.sync_actions().expect("sync");
        let pressed = runtime
            .boolean_action_state(BoolAction::Place, Side::Right)
            .expect("state");
        assert!(pressed.pressed());

        runtime.sync_actions().expect("sync");
        let held = runtime
            .boolean_action_state(BoolAction::Place, Side::Right)
            .expect("state");
        assert!(held.current_state);
        assert!(!held.changed_since_last_sync);
    }

    #[test]
    fn end_frame_rejects_outstanding_images() {
        let mut runtime = started_runtime();
        drain_states(&mut runtime);
        runtime.begin_session().expect("begin");
        let chain = runtime
            .create_swapchain(&SwapchainCreateInfo {
                format: dxgi::R8G8B8A8_UNORM_SRGB,
                width: 16,
                height: 16,
                array_size: 2,
                sample_count: 1,
                mip_count: 1,
                face_count: 1,
                usage: SwapchainUsage::Color,
            })
            .expect("swapchain");

        runtime.wait_frame().expect("wait");
        runtime.begin_frame().expect("begin frame");
        runtime.acquire_swapchain_image(chain).expect("acquire");
        let result = runtime.end_frame(FrameEnd {
            display_time: 0,
            blend_mode: EnvironmentBlendMode::Additive,
            layers: &[],
        });
        assert!(matches!(result, Err(XrError::CallOrder(_))));
    }
}
