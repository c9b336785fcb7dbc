pub mod image_cycle;
pub mod math;
#[cfg(all(feature = "vr-openxr", windows))]
pub mod openxr;
pub mod simulated;

use crate::render::RenderError;
use glam::{Quat, Vec3};
use slotmap::new_key_type;
use std::fmt;
use std::ops::{Index, IndexMut};
use thiserror::Error;

pub use image_cycle::ImageCycle;
pub use simulated::SimulatedRuntime;

/// Runtime timestamps, in nanoseconds on the runtime's clock.
pub type XrTime = i64;
/// Runtime durations, in nanoseconds.
pub type XrDuration = i64;

pub const INFINITE_DURATION: XrDuration = i64::MAX;
pub const MIN_HAPTIC_DURATION: XrDuration = -1;
pub const FREQUENCY_UNSPECIFIED: f32 = 0.0;

pub const KHR_D3D11_ENABLE: &str = "XR_KHR_D3D11_enable";
pub const KHR_COMPOSITION_LAYER_DEPTH: &str = "XR_KHR_composition_layer_depth";
pub const MSFT_UNBOUNDED_REFERENCE_SPACE: &str = "XR_MSFT_unbounded_reference_space";
pub const MSFT_SPATIAL_ANCHOR: &str = "XR_MSFT_spatial_anchor";

/// PRIMARY_STEREO always reports two views.
pub const STEREO_VIEW_COUNT: usize = 2;

new_key_type! {
    pub struct SpaceId;
    pub struct SwapchainId;
    pub struct AnchorId;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn translation(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Fov {
    pub fn symmetric(half_angle: f32) -> Self {
        Self {
            angle_left: -half_angle,
            angle_right: half_angle,
            angle_up: half_angle,
            angle_down: -half_angle,
        }
    }
}

/// Depth range handed to projection matrices and depth layers. `near > far` means reversed-Z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearFar {
    pub near: f32,
    pub far: f32,
}

impl NearFar {
    pub fn is_reversed(&self) -> bool {
        self.near > self.far
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFactor {
    HeadMountedDisplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentBlendMode {
    Opaque,
    Additive,
    AlphaBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSpaceType {
    View,
    Local,
    Stage,
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    pub fn is_focused(self) -> bool {
        matches!(self, SessionState::Focused)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XrEvent {
    InstanceLossPending { loss_time: XrTime },
    SessionStateChanged { state: SessionState, time: XrTime },
    EventsLost { count: u32 },
    ReferenceSpaceChangePending,
    InteractionProfileChanged,
    Unhandled(&'static str),
}

impl XrEvent {
    pub fn label(&self) -> &'static str {
        match self {
            XrEvent::InstanceLossPending { .. } => "instance_loss_pending",
            XrEvent::SessionStateChanged { .. } => "session_state_changed",
            XrEvent::EventsLost { .. } => "events_lost",
            XrEvent::ReferenceSpaceChangePending => "reference_space_change_pending",
            XrEvent::InteractionProfileChanged => "interaction_profile_changed",
            XrEvent::Unhandled(label) => label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceLocation {
    pub pose: Pose,
    pub position_valid: bool,
    pub orientation_valid: bool,
    pub position_tracked: bool,
    pub orientation_tracked: bool,
}

impl SpaceLocation {
    pub fn tracked(pose: Pose) -> Self {
        Self {
            pose,
            position_valid: true,
            orientation_valid: true,
            position_tracked: true,
            orientation_tracked: true,
        }
    }

    pub fn invalid() -> Self {
        Self {
            pose: Pose::IDENTITY,
            position_valid: false,
            orientation_valid: false,
            position_tracked: false,
            orientation_tracked: false,
        }
    }

    /// A pose is usable once both its position and orientation are valid, tracked or not.
    pub fn is_pose_valid(&self) -> bool {
        self.position_valid && self.orientation_valid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewState {
    pub position_valid: bool,
    pub orientation_valid: bool,
}

impl ViewState {
    pub fn is_pose_valid(&self) -> bool {
        self.position_valid && self.orientation_valid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct View {
    pub pose: Pose,
    pub fov: Fov,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewConfigurationView {
    pub recommended_image_rect_width: u32,
    pub max_image_rect_width: u32,
    pub recommended_image_rect_height: u32,
    pub max_image_rect_height: u32,
    pub recommended_swapchain_sample_count: u32,
    pub max_swapchain_sample_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameState {
    pub predicted_display_time: XrTime,
    pub predicted_display_period: XrDuration,
    pub should_render: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BooleanActionState {
    pub current_state: bool,
    pub changed_since_last_sync: bool,
    pub last_change_time: XrTime,
    pub is_active: bool,
}

impl BooleanActionState {
    pub fn pressed(&self) -> bool {
        self.is_active && self.changed_since_last_sync && self.current_state
    }

    pub fn released(&self) -> bool {
        self.is_active && self.changed_since_last_sync && !self.current_state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn subaction_path(self) -> &'static str {
        match self {
            Side::Left => "/user/hand/left",
            Side::Right => "/user/hand/right",
        }
    }
}

/// Exactly one value per hand.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerHand<T> {
    pub left: T,
    pub right: T,
}

impl<T> PerHand<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn from_fn(mut build: impl FnMut(Side) -> T) -> Self {
        Self {
            left: build(Side::Left),
            right: build(Side::Right),
        }
    }

    pub fn try_from_fn<E>(mut build: impl FnMut(Side) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            left: build(Side::Left)?,
            right: build(Side::Right)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Side, &T)> {
        [(Side::Left, &self.left), (Side::Right, &self.right)].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Side, &mut T)> {
        [(Side::Left, &mut self.left), (Side::Right, &mut self.right)].into_iter()
    }
}

impl<T> Index<Side> for PerHand<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

impl<T> IndexMut<Side> for PerHand<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// D3D feature level, ordered so that newer levels compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureLevel(pub u32);

impl FeatureLevel {
    pub const LEVEL_10_0: FeatureLevel = FeatureLevel(0xa000);
    pub const LEVEL_10_1: FeatureLevel = FeatureLevel(0xa100);
    pub const LEVEL_11_0: FeatureLevel = FeatureLevel(0xb000);
    pub const LEVEL_11_1: FeatureLevel = FeatureLevel(0xb100);
    pub const LEVEL_12_0: FeatureLevel = FeatureLevel(0xc000);
    pub const LEVEL_12_1: FeatureLevel = FeatureLevel(0xc100);

    pub const PREFERENCE_ORDER: [FeatureLevel; 6] = [
        FeatureLevel::LEVEL_12_1,
        FeatureLevel::LEVEL_12_0,
        FeatureLevel::LEVEL_11_1,
        FeatureLevel::LEVEL_11_0,
        FeatureLevel::LEVEL_10_1,
        FeatureLevel::LEVEL_10_0,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterLuid {
    pub low_part: u32,
    pub high_part: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsRequirements {
    pub adapter_luid: AdapterLuid,
    pub min_feature_level: FeatureLevel,
}

/// Raw graphics device pointer (`ID3D11Device*`) passed through the runtime untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

/// Raw swapchain texture pointer (`ID3D11Texture2D*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub usize);

/// Raw immediate context pointer handed to the remote compositor mid-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceContextHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainUsage {
    Color,
    DepthStencil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainCreateInfo {
    pub format: i64,
    pub width: u32,
    pub height: u32,
    pub array_size: u32,
    pub sample_count: u32,
    pub mip_count: u32,
    pub face_count: u32,
    pub usage: SwapchainUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect2Di {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapchainSubImage {
    pub swapchain: SwapchainId,
    pub image_rect: Rect2Di,
    pub image_array_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthInfo {
    pub sub_image: SwapchainSubImage,
    pub min_depth: f32,
    pub max_depth: f32,
    pub near_z: f32,
    pub far_z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionView {
    pub pose: Pose,
    pub fov: Fov,
    pub sub_image: SwapchainSubImage,
    pub depth: Option<DepthInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionLayer {
    pub space: SpaceId,
    pub blend_texture_source_alpha: bool,
    pub views: Vec<ProjectionView>,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameEnd<'a> {
    pub display_time: XrTime,
    pub blend_mode: EnvironmentBlendMode,
    pub layers: &'a [ProjectionLayer],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Place,
    HandPose,
    Vibrate,
    Exit,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Place => "place_hologram",
            ActionKind::HandPose => "hand_pose",
            ActionKind::Vibrate => "vibrate",
            ActionKind::Exit => "exit_session",
        }
    }

    pub fn localized_name(self) -> &'static str {
        match self {
            ActionKind::Place => "Place Hologram",
            ActionKind::HandPose => "Hand Pose",
            ActionKind::Vibrate => "Vibrate",
            ActionKind::Exit => "Exit session",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolAction {
    Place,
    Exit,
}

impl BoolAction {
    pub fn kind(self) -> ActionKind {
        match self {
            BoolAction::Place => ActionKind::Place,
            BoolAction::Exit => ActionKind::Exit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBinding {
    pub action: ActionKind,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLayout {
    pub action_set_name: String,
    pub localized_action_set_name: String,
    pub interaction_profile: String,
    pub actions: Vec<ActionKind>,
    pub bindings: Vec<ActionBinding>,
}

impl ActionLayout {
    pub fn bindings_for(&self, action: ActionKind) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(move |binding| binding.action == action)
            .map(|binding| binding.path.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticPulse {
    pub amplitude: f32,
    pub duration: XrDuration,
    pub frequency: f32,
}

impl HapticPulse {
    pub fn short(amplitude: f32) -> Self {
        Self {
            amplitude,
            duration: MIN_HAPTIC_DURATION,
            frequency: FREQUENCY_UNSPECIFIED,
        }
    }
}

#[derive(Debug, Error)]
pub enum XrError {
    #[error("OpenXR loader unavailable: {0}")]
    Loader(String),
    #[error("required extension {0} is not supported by the runtime")]
    MissingExtension(&'static str),
    #[error("no headset detected (form factor unavailable)")]
    FormFactorUnavailable,
    #[error("spatial anchor could not be created")]
    SpatialAnchorCreationFailed,
    #[error("session is not running")]
    SessionNotRunning,
    #[error("no feature level satisfies the runtime minimum {0:?}")]
    UnsupportedFeatureLevel(FeatureLevel),
    #[error("no runtime swapchain format is supported")]
    NoSupportedSwapchainFormat,
    #[error("incompatible view configuration: {0}")]
    IncompatibleViews(String),
    #[error("call order violated: {0}")]
    CallOrder(String),
    #[error("{call} failed: {code}")]
    Runtime { call: &'static str, code: String },
    #[error("graphics plugin failure: {0}")]
    Graphics(#[from] RenderError),
}

impl XrError {
    pub fn call_order(reason: impl Into<String>) -> Self {
        XrError::CallOrder(reason.into())
    }

    pub fn runtime(call: &'static str, code: impl fmt::Display) -> Self {
        XrError::Runtime {
            call,
            code: code.to_string(),
        }
    }
}

pub type XrResult<T> = Result<T, XrError>;

/// The XR runtime surface the application loop drives.
///
/// A runtime owns at most one instance and one session at a time; every space, anchor and
/// swapchain key it hands out belongs to the current session and is invalidated by
/// [`XrRuntime::destroy_session`]. The view configuration is always PRIMARY_STEREO.
pub trait XrRuntime {
    fn label(&self) -> &'static str;

    fn available_extensions(&mut self) -> XrResult<Vec<String>>;
    fn create_instance(&mut self, application_name: &str, extensions: &[&'static str]) -> XrResult<()>;
    fn create_actions(&mut self, layout: &ActionLayout) -> XrResult<()>;

    fn system(&mut self, form_factor: FormFactor) -> XrResult<SystemId>;
    fn environment_blend_modes(&mut self, system: SystemId) -> XrResult<Vec<EnvironmentBlendMode>>;
    fn graphics_requirements(&mut self, system: SystemId) -> XrResult<GraphicsRequirements>;
    fn view_configuration_views(&mut self, system: SystemId) -> XrResult<Vec<ViewConfigurationView>>;

    /// Creates the session bound to `device` and attaches the action set.
    fn create_session(&mut self, system: SystemId, device: DeviceHandle) -> XrResult<()>;
    fn destroy_session(&mut self);
    fn begin_session(&mut self) -> XrResult<()>;
    fn end_session(&mut self) -> XrResult<()>;
    fn request_exit_session(&mut self) -> XrResult<()>;

    fn create_reference_space(&mut self, ty: ReferenceSpaceType, pose: Pose) -> XrResult<SpaceId>;
    fn create_hand_space(&mut self, side: Side) -> XrResult<SpaceId>;
    fn create_spatial_anchor(&mut self, base: SpaceId, pose: Pose, time: XrTime) -> XrResult<AnchorId>;
    fn create_anchor_space(&mut self, anchor: AnchorId) -> XrResult<SpaceId>;
    fn destroy_anchor(&mut self, anchor: AnchorId);
    fn destroy_space(&mut self, space: SpaceId);
    fn locate_space(&mut self, space: SpaceId, base: SpaceId, time: XrTime) -> XrResult<SpaceLocation>;

    fn swapchain_formats(&mut self) -> XrResult<Vec<i64>>;
    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> XrResult<SwapchainId>;
    fn swapchain_images(&mut self, swapchain: SwapchainId) -> XrResult<Vec<TextureHandle>>;
    fn destroy_swapchain(&mut self, swapchain: SwapchainId);
    fn acquire_swapchain_image(&mut self, swapchain: SwapchainId) -> XrResult<u32>;
    fn wait_swapchain_image(&mut self, swapchain: SwapchainId, timeout: XrDuration) -> XrResult<()>;
    fn release_swapchain_image(&mut self, swapchain: SwapchainId) -> XrResult<()>;

    fn poll_event(&mut self) -> XrResult<Option<XrEvent>>;

    fn sync_actions(&mut self) -> XrResult<()>;
    fn boolean_action_state(&mut self, action: BoolAction, side: Side) -> XrResult<BooleanActionState>;
    fn apply_haptic_feedback(&mut self, side: Side, pulse: HapticPulse) -> XrResult<()>;

    fn wait_frame(&mut self) -> XrResult<FrameState>;
    fn begin_frame(&mut self) -> XrResult<()>;
    fn locate_views(&mut self, display_time: XrTime, space: SpaceId) -> XrResult<(ViewState, Vec<View>)>;
    fn end_frame(&mut self, frame: FrameEnd<'_>) -> XrResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_hand_indexes_by_side() {
        let mut hands = PerHand::new(1, 2);
        hands[Side::Right] += 10;
        assert_eq!(hands[Side::Left], 1);
        assert_eq!(hands[Side::Right], 12);

        let sides = hands.iter().map(|(side, _)| side).collect::<Vec<_>>();
        assert_eq!(sides, vec![Side::Left, Side::Right]);
    }

    #[test]
    fn feature_levels_order_newest_first() {
        let mut sorted = FeatureLevel::PREFERENCE_ORDER.to_vec();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sorted, FeatureLevel::PREFERENCE_ORDER.to_vec());
    }

    #[test]
    fn action_edges_require_active_and_changed() {
        let pressed = BooleanActionState {
            current_state: true,
            changed_since_last_sync: true,
            last_change_time: 7,
            is_active: true,
        };
        assert!(pressed.pressed());
        assert!(!pressed.released());

        let held = BooleanActionState {
            changed_since_last_sync: false,
            ..pressed
        };
        assert!(!held.pressed());

        let inactive = BooleanActionState {
            is_active: false,
            ..pressed
        };
        assert!(!inactive.pressed());

        let released = BooleanActionState {
            current_state: false,
            ..pressed
        };
        assert!(released.released());
    }

    #[test]
    fn location_validity_ignores_tracking_bits() {
        let mut location = SpaceLocation::tracked(Pose::IDENTITY);
        location.position_tracked = false;
        assert!(location.is_pose_valid());
        location.orientation_valid = false;
        assert!(!location.is_pose_valid());
        assert!(!SpaceLocation::invalid().is_pose_valid());
    }
}
