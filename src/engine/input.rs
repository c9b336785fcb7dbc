use crate::render::Cube;
use crate::vr::{
    ActionBinding, ActionKind, ActionLayout, AnchorId, BoolAction, HapticPulse, PerHand, Pose,
    ReferenceSpaceType, Side, SpaceId, XrError, XrResult, XrRuntime, XrTime,
};

const SIMPLE_CONTROLLER: &str = "/interaction_profiles/khr/simple_controller";

impl ActionLayout {
    /// The hologram placement action set bound to the KHR simple controller.
    pub fn placement() -> Self {
        let bind = |action: ActionKind, component: &'static str| {
            Side::BOTH.into_iter().map(move |side| ActionBinding {
                action,
                path: format!("{}/{component}", side.subaction_path()),
            })
        };
        let bindings = bind(ActionKind::Place, "input/select/click")
            .chain(bind(ActionKind::HandPose, "input/grip/pose"))
            .chain(bind(ActionKind::Vibrate, "output/haptic"))
            .chain(bind(ActionKind::Exit, "input/menu/click"))
            .collect();

        Self {
            action_set_name: "place_hologram_action_set".to_string(),
            localized_action_set_name: "Placement".to_string(),
            interaction_profile: SIMPLE_CONTROLLER.to_string(),
            actions: vec![
                ActionKind::Place,
                ActionKind::HandPose,
                ActionKind::Vibrate,
                ActionKind::Exit,
            ],
            bindings,
        }
    }
}

/// A placed cube together with the anchor keeping it in place, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hologram {
    pub cube: Cube,
    pub anchor: Option<AnchorId>,
}

impl Hologram {
    pub fn destroy<R: XrRuntime + ?Sized>(self, runtime: &mut R) {
        runtime.destroy_space(self.cube.space);
        if let Some(anchor) = self.anchor {
            runtime.destroy_anchor(anchor);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub app_space: SpaceId,
    pub app_space_type: ReferenceSpaceType,
    pub spatial_anchors: bool,
    pub hologram_scale: f32,
    pub haptic_amplitude: f32,
}

/// Anchors a new hologram at `pose` (in app space) as of `time`.
///
/// Returns `Ok(None)` when the runtime could not create the anchor.
pub fn create_hologram<R: XrRuntime + ?Sized>(
    runtime: &mut R,
    placement: &Placement,
    pose: Pose,
    time: XrTime,
) -> XrResult<Option<Hologram>> {
    if placement.spatial_anchors {
        let anchor = match runtime.create_spatial_anchor(placement.app_space, pose, time) {
            Ok(anchor) => anchor,
            Err(XrError::SpatialAnchorCreationFailed) => {
                log::warn!("[input] anchor creation failed, hologram not placed");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let space = runtime.create_anchor_space(anchor)?;
        return Ok(Some(Hologram {
            cube: Cube::new(space, placement.hologram_scale),
            anchor: Some(anchor),
        }));
    }

    let space = runtime.create_reference_space(placement.app_space_type, pose)?;
    Ok(Some(Hologram {
        cube: Cube::new(space, placement.hologram_scale),
        anchor: None,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionOutcome {
    pub placed: usize,
    pub exit_requested: bool,
}

pub fn poll_actions<R: XrRuntime + ?Sized>(
    runtime: &mut R,
    placement: &Placement,
    hand_spaces: &PerHand<SpaceId>,
    holograms: &mut Vec<Hologram>,
) -> XrResult<ActionOutcome> {
    runtime.sync_actions()?;
    let pulse = HapticPulse::short(placement.haptic_amplitude);
    let mut outcome = ActionOutcome::default();

    for side in Side::BOTH {
        let place = runtime.boolean_action_state(BoolAction::Place, side)?;
        if place.pressed() {
            let location =
                runtime.locate_space(hand_spaces[side], placement.app_space, place.last_change_time)?;
            if location.is_pose_valid() {
                if let Some(hologram) =
                    create_hologram(runtime, placement, location.pose, place.last_change_time)?
                {
                    holograms.push(hologram);
                    outcome.placed += 1;
                }
            } else {
                log::debug!("[input] {side:?} hand not tracked, skipping placement");
            }
            runtime.apply_haptic_feedback(side, pulse)?;
        }

        let exit = runtime.boolean_action_state(BoolAction::Exit, side)?;
        if exit.released() {
            log::info!("[input] exit requested from {side:?} hand");
            runtime.request_exit_session()?;
            runtime.apply_haptic_feedback(side, pulse)?;
            outcome.exit_requested = true;
        }
    }

    Ok(outcome)
}
