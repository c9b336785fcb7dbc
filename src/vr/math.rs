use super::{Fov, NearFar, Pose};
use glam::{Mat4, Quat, Vec3, Vec4};

/// Expresses `a` (relative to frame `b`) in the frame `b` is relative to.
pub fn pose_multiply(a: &Pose, b: &Pose) -> Pose {
    Pose {
        orientation: b.orientation * a.orientation,
        position: b.orientation * a.position + b.position,
    }
}

pub fn pose_inverse(pose: &Pose) -> Pose {
    let orientation = pose.orientation.inverse();
    Pose {
        orientation,
        position: orientation * -pose.position,
    }
}

pub fn quat_from_axis_angle(axis: Vec3, angle: f32) -> Quat {
    Quat::from_axis_angle(axis.normalize_or_zero(), angle)
}

pub fn model_matrix(pose: &Pose, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, pose.orientation, pose.position)
}

pub fn view_matrix(pose: &Pose) -> Mat4 {
    Mat4::from_rotation_translation(pose.orientation, pose.position).inverse()
}

/// Off-center right-handed perspective projection into a 0..1 depth range.
///
/// Passing `near > far` yields a reversed-Z projection: the near plane maps to depth 0 and the
/// far plane to depth 1 either way, so reversed ranges put distant geometry at 0.
pub fn projection_fov(fov: &Fov, range: NearFar) -> Mat4 {
    let NearFar { near, far } = range;
    let left = near * fov.angle_left.tan();
    let right = near * fov.angle_right.tan();
    let top = near * fov.angle_up.tan();
    let bottom = near * fov.angle_down.tan();

    let reciprocal_width = 1.0 / (right - left);
    let reciprocal_height = 1.0 / (top - bottom);
    let depth_scale = far / (near - far);

    Mat4::from_cols(
        Vec4::new(2.0 * near * reciprocal_width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near * reciprocal_height, 0.0, 0.0),
        Vec4::new(
            (left + right) * reciprocal_width,
            (top + bottom) * reciprocal_height,
            depth_scale,
            -1.0,
        ),
        Vec4::new(0.0, 0.0, depth_scale * near, 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_vec_near(actual: Vec3, expected: Vec3) {
        assert!(
            (actual - expected).length() < 1e-5,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn multiply_applies_offset_in_base_frame() {
        let offset = Pose::translation(Vec3::new(0.0, 0.0, -1.0));
        let base = Pose::new(
            Vec3::new(1.0, 0.0, 0.0),
            quat_from_axis_angle(Vec3::Y, FRAC_PI_2),
        );

        let composed = pose_multiply(&offset, &base);
        assert_vec_near(composed.position, Vec3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn inverse_cancels_pose() {
        let pose = Pose::new(
            Vec3::new(0.3, -1.2, 4.0),
            quat_from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7),
        );
        let identity = pose_multiply(&pose, &pose_inverse(&pose));
        assert_vec_near(identity.position, Vec3::ZERO);
        assert!(identity.orientation.angle_between(Quat::IDENTITY) < 1e-4);
    }

    #[test]
    fn reversed_projection_maps_near_plane_to_zero_depth() {
        let fov = Fov::symmetric(0.8);
        let range = NearFar {
            near: 20.0,
            far: 0.1,
        };
        let projection = projection_fov(&fov, range);

        let at_near = projection * Vec4::new(0.0, 0.0, -20.0, 1.0);
        let at_far = projection * Vec4::new(0.0, 0.0, -0.1, 1.0);
        assert!((at_near.z / at_near.w).abs() < 1e-5);
        assert!((at_far.z / at_far.w - 1.0).abs() < 1e-4);
    }
}
