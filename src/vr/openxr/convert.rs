use crate::vr::{
    BooleanActionState, EnvironmentBlendMode, Fov, FrameState, Pose, ReferenceSpaceType, Rect2Di,
    SessionState, SpaceLocation, View, ViewConfigurationView, ViewState, XrError, XrEvent,
};
use glam::{Quat, Vec3};
use openxr as xr;

/// Maps a failed call onto the error taxonomy, keeping the recoverable codes distinguishable.
pub fn failure(call: &'static str) -> impl FnOnce(xr::sys::Result) -> XrError {
    move |code| match code {
        xr::sys::Result::ERROR_FORM_FACTOR_UNAVAILABLE => XrError::FormFactorUnavailable,
        xr::sys::Result::ERROR_SESSION_NOT_RUNNING => XrError::SessionNotRunning,
        xr::sys::Result::ERROR_CREATE_SPATIAL_ANCHOR_FAILED_MSFT => {
            XrError::SpatialAnchorCreationFailed
        }
        code => XrError::runtime(call, format!("{code:?}")),
    }
}

pub fn check(call: &'static str, code: xr::sys::Result) -> Result<(), XrError> {
    if code.into_raw() < 0 {
        Err(failure(call)(code))
    } else {
        Ok(())
    }
}

pub fn pose_to_xr(pose: &Pose) -> xr::Posef {
    xr::Posef {
        orientation: xr::Quaternionf {
            x: pose.orientation.x,
            y: pose.orientation.y,
            z: pose.orientation.z,
            w: pose.orientation.w,
        },
        position: xr::Vector3f {
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
        },
    }
}

pub fn pose_from_xr(pose: &xr::Posef) -> Pose {
    Pose::new(
        Vec3::new(pose.position.x, pose.position.y, pose.position.z),
        Quat::from_xyzw(
            pose.orientation.x,
            pose.orientation.y,
            pose.orientation.z,
            pose.orientation.w,
        ),
    )
}

pub fn fov_to_xr(fov: &Fov) -> xr::Fovf {
    xr::Fovf {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

pub fn fov_from_xr(fov: &xr::Fovf) -> Fov {
    Fov {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

pub fn rect_to_xr(rect: &Rect2Di) -> xr::Rect2Di {
    xr::Rect2Di {
        offset: xr::Offset2Di {
            x: rect.x,
            y: rect.y,
        },
        extent: xr::Extent2Di {
            width: rect.width,
            height: rect.height,
        },
    }
}

pub fn reference_space_type(ty: ReferenceSpaceType) -> xr::ReferenceSpaceType {
    match ty {
        ReferenceSpaceType::View => xr::ReferenceSpaceType::VIEW,
        ReferenceSpaceType::Local => xr::ReferenceSpaceType::LOCAL,
        ReferenceSpaceType::Stage => xr::ReferenceSpaceType::STAGE,
        ReferenceSpaceType::Unbounded => xr::ReferenceSpaceType::UNBOUNDED_MSFT,
    }
}

pub fn blend_mode_from_xr(mode: xr::EnvironmentBlendMode) -> Option<EnvironmentBlendMode> {
    match mode {
        xr::EnvironmentBlendMode::OPAQUE => Some(EnvironmentBlendMode::Opaque),
        xr::EnvironmentBlendMode::ADDITIVE => Some(EnvironmentBlendMode::Additive),
        xr::EnvironmentBlendMode::ALPHA_BLEND => Some(EnvironmentBlendMode::AlphaBlend),
        _ => None,
    }
}

pub fn blend_mode_to_xr(mode: EnvironmentBlendMode) -> xr::EnvironmentBlendMode {
    match mode {
        EnvironmentBlendMode::Opaque => xr::EnvironmentBlendMode::OPAQUE,
        EnvironmentBlendMode::Additive => xr::EnvironmentBlendMode::ADDITIVE,
        EnvironmentBlendMode::AlphaBlend => xr::EnvironmentBlendMode::ALPHA_BLEND,
    }
}

pub fn session_state_from_xr(state: xr::SessionState) -> SessionState {
    match state {
        xr::SessionState::IDLE => SessionState::Idle,
        xr::SessionState::READY => SessionState::Ready,
        xr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        xr::SessionState::VISIBLE => SessionState::Visible,
        xr::SessionState::FOCUSED => SessionState::Focused,
        xr::SessionState::STOPPING => SessionState::Stopping,
        xr::SessionState::LOSS_PENDING => SessionState::LossPending,
        xr::SessionState::EXITING => SessionState::Exiting,
        _ => SessionState::Unknown,
    }
}

pub fn event_from_xr(event: xr::Event<'_>) -> XrEvent {
    match event {
        xr::Event::InstanceLossPending(lost) => XrEvent::InstanceLossPending {
            loss_time: lost.loss_time().as_nanos(),
        },
        xr::Event::SessionStateChanged(changed) => XrEvent::SessionStateChanged {
            state: session_state_from_xr(changed.state()),
            time: changed.time().as_nanos(),
        },
        xr::Event::EventsLost(lost) => XrEvent::EventsLost {
            count: lost.lost_event_count(),
        },
        xr::Event::ReferenceSpaceChangePending(_) => XrEvent::ReferenceSpaceChangePending,
        xr::Event::InteractionProfileChanged(_) => XrEvent::InteractionProfileChanged,
        _ => XrEvent::Unhandled("unrecognized"),
    }
}

pub fn location_from_xr(location: &xr::SpaceLocation) -> SpaceLocation {
    let flags = location.location_flags;
    SpaceLocation {
        pose: pose_from_xr(&location.pose),
        position_valid: flags.contains(xr::SpaceLocationFlags::POSITION_VALID),
        orientation_valid: flags.contains(xr::SpaceLocationFlags::ORIENTATION_VALID),
        position_tracked: flags.contains(xr::SpaceLocationFlags::POSITION_TRACKED),
        orientation_tracked: flags.contains(xr::SpaceLocationFlags::ORIENTATION_TRACKED),
    }
}

pub fn view_state_from_xr(flags: xr::ViewStateFlags) -> ViewState {
    ViewState {
        position_valid: flags.contains(xr::ViewStateFlags::POSITION_VALID),
        orientation_valid: flags.contains(xr::ViewStateFlags::ORIENTATION_VALID),
    }
}

pub fn view_from_xr(view: &xr::View) -> View {
    View {
        pose: pose_from_xr(&view.pose),
        fov: fov_from_xr(&view.fov),
    }
}

pub fn view_configuration_from_xr(view: &xr::ViewConfigurationView) -> ViewConfigurationView {
    ViewConfigurationView {
        recommended_image_rect_width: view.recommended_image_rect_width,
        max_image_rect_width: view.max_image_rect_width,
        recommended_image_rect_height: view.recommended_image_rect_height,
        max_image_rect_height: view.max_image_rect_height,
        recommended_swapchain_sample_count: view.recommended_swapchain_sample_count,
        max_swapchain_sample_count: view.max_swapchain_sample_count,
    }
}

pub fn frame_state_from_xr(state: &xr::FrameState) -> FrameState {
    FrameState {
        predicted_display_time: state.predicted_display_time.as_nanos(),
        predicted_display_period: state.predicted_display_period.as_nanos(),
        should_render: state.should_render,
    }
}

pub fn boolean_state_from_xr(state: &xr::ActionState<bool>) -> BooleanActionState {
    BooleanActionState {
        current_state: state.current_state,
        changed_since_last_sync: state.changed_since_last_sync,
        last_change_time: state.last_change_time.as_nanos(),
        is_active: state.is_active,
    }
}
