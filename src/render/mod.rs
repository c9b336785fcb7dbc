use crate::vr::math::{model_matrix, projection_fov, view_matrix};
use crate::vr::{
    AdapterLuid, DeviceContextHandle, DeviceHandle, FeatureLevel, Fov, NearFar, Pose, Rect2Di,
    SpaceId, TextureHandle,
};
use glam::{Mat4, Vec3};
use thiserror::Error;

/// DXGI format codes exchanged with the runtime as swapchain formats.
pub mod dxgi {
    pub const R8G8B8A8_UNORM: i64 = 28;
    pub const R8G8B8A8_UNORM_SRGB: i64 = 29;
    pub const B8G8R8A8_UNORM: i64 = 87;
    pub const B8G8R8A8_UNORM_SRGB: i64 = 91;
    pub const D32_FLOAT: i64 = 40;
    pub const D24_UNORM_S8_UINT: i64 = 45;
    pub const D16_UNORM: i64 = 55;
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("graphics device creation failed: {0}")]
    DeviceCreation(String),
    #[error("invalid render request: {0}")]
    InvalidRequest(&'static str),
    #[error("remote compositor failure: {0}")]
    Compositor(String),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// A cube to draw this frame, resolved into app space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cube {
    pub space: SpaceId,
    /// Offset applied inside `space` before locating it.
    pub pose_in_space: Option<Pose>,
    pub scale: Vec3,
    /// Recomputed every frame; `None` while the space cannot be located.
    pub pose: Option<Pose>,
}

impl Cube {
    pub fn new(space: SpaceId, scale: f32) -> Self {
        Self {
            space,
            pose_in_space: None,
            scale: Vec3::splat(scale),
            pose: None,
        }
    }

    pub fn with_pose_in_space(mut self, pose: Pose) -> Self {
        self.pose_in_space = Some(pose);
        self
    }
    /// World transform for this frame, once the cube has been located.
    pub fn model_matrix(&self) -> Option<Mat4> {
        self.pose.map(|pose| model_matrix(&pose, self.scale))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewProjection {
    pub pose: Pose,
    pub fov: Fov,
    pub near_far: NearFar,
}

impl ViewProjection {
    pub fn view(&self) -> Mat4 {
        view_matrix(&self.pose)
    }

    pub fn projection(&self) -> Mat4 {
        projection_fov(&self.fov, self.near_far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Everything the device needs to draw one stereo layer into a texture-array swapchain image.
#[derive(Debug, Clone, Copy)]
pub struct RenderViewRequest<'a> {
    pub image_rect: Rect2Di,
    pub clear_color: [f32; 4],
    pub view_projections: &'a [ViewProjection],
    pub color_format: i64,
    pub color_texture: TextureHandle,
    pub depth_format: i64,
    pub depth_texture: TextureHandle,
    pub cubes: &'a [Cube],
}

/// Hook invoked after the render targets are bound and cleared, before local geometry is drawn.
pub trait RemoteCompositor {
    fn composite(&mut self, context: DeviceContextHandle) -> RenderResult<()>;
}

pub trait GraphicsPlugin {
    fn label(&self) -> &'static str;

    /// Creates the device on the adapter identified by `adapter_luid`, trying `feature_levels`
    /// in order.
    fn initialize_device(
        &mut self,
        adapter_luid: AdapterLuid,
        feature_levels: &[FeatureLevel],
    ) -> RenderResult<DeviceHandle>;

    /// Color formats the renderer can target, most preferred first.
    fn supported_color_formats(&self) -> &[i64];
    fn supported_depth_formats(&self) -> &[i64];

    fn render_view(
        &mut self,
        request: &RenderViewRequest<'_>,
        compositor: Option<&mut dyn RemoteCompositor>,
    ) -> RenderResult<()>;
}

const COLOR_FORMATS: [i64; 4] = [
    dxgi::R8G8B8A8_UNORM_SRGB,
    dxgi::B8G8R8A8_UNORM_SRGB,
    dxgi::R8G8B8A8_UNORM,
    dxgi::B8G8R8A8_UNORM,
];
const DEPTH_FORMATS: [i64; 3] = [
    dxgi::D32_FLOAT,
    dxgi::D24_UNORM_S8_UINT,
    dxgi::D16_UNORM,
];

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedView {
    pub image_rect: Rect2Di,
    pub clear_color: [f32; 4],
    pub view_count: usize,
    pub color_texture: TextureHandle,
    pub depth_texture: TextureHandle,
    pub cubes: Vec<Cube>,
    /// One per array slice, in slice order.
    pub view_projections: Vec<Mat4>,
    pub cube_models: Vec<Mat4>,
    pub composited: bool,
}

/// Device-less plugin that validates and records every request.
#[derive(Debug, Default)]
pub struct NullGraphicsPlugin {
    device: Option<(AdapterLuid, FeatureLevel)>,
    color_formats: Option<Vec<i64>>,
    views: Vec<RecordedView>,
}

impl NullGraphicsPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color_formats(mut self, formats: Vec<i64>) -> Self {
        self.color_formats = Some(formats);
        self
    }

    pub fn feature_level(&self) -> Option<FeatureLevel> {
        self.device.map(|(_, level)| level)
    }

    pub fn views(&self) -> &[RecordedView] {
        &self.views
    }
}

impl GraphicsPlugin for NullGraphicsPlugin {
    fn label(&self) -> &'static str {
        "Null Graphics Plugin"
    }

    fn initialize_device(
        &mut self,
        adapter_luid: AdapterLuid,
        feature_levels: &[FeatureLevel],
    ) -> RenderResult<DeviceHandle> {
        let level = feature_levels.first().copied().ok_or_else(|| {
            RenderError::DeviceCreation("no feature level requested".to_string())
        })?;
        log::info!(
            "[render] null device on adapter {:#x}:{:#x} at feature level {:#x}",
            adapter_luid.high_part,
            adapter_luid.low_part,
            level.0
        );
        self.device = Some((adapter_luid, level));
        Ok(DeviceHandle(0xd3d11))
    }

    fn supported_color_formats(&self) -> &[i64] {
        self.color_formats.as_deref().unwrap_or(&COLOR_FORMATS)
    }

    fn supported_depth_formats(&self) -> &[i64] {
        &DEPTH_FORMATS
    }

    fn render_view(
        &mut self,
        request: &RenderViewRequest<'_>,
        compositor: Option<&mut dyn RemoteCompositor>,
    ) -> RenderResult<()> {
        if self.device.is_none() {
            return Err(RenderError::InvalidRequest("device not initialized"));
        }
        if request.image_rect.width <= 0 || request.image_rect.height <= 0 {
            return Err(RenderError::InvalidRequest("empty image rect"));
        }
        if request.view_projections.is_empty() {
            return Err(RenderError::InvalidRequest("no views to render"));
        }

        let cube_models = request
            .cubes
            .iter()
            .map(|cube| {
                cube.model_matrix()
                    .ok_or(RenderError::InvalidRequest("cube submitted without a pose"))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let composited = match compositor {
            Some(compositor) => {
                compositor.composite(DeviceContextHandle(0xc0))?;
                true
            }
            None => false,
        };

        self.views.push(RecordedView {
            image_rect: request.image_rect,
            clear_color: request.clear_color,
            view_count: request.view_projections.len(),
            color_texture: request.color_texture,
            depth_texture: request.depth_texture,
            cubes: request.cubes.to_vec(),
            view_projections: request
                .view_projections
                .iter()
                .map(ViewProjection::view_projection)
                .collect(),
            cube_models,
            composited,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    struct CountingCompositor {
        calls: usize,
    }

    impl RemoteCompositor for CountingCompositor {
        fn composite(&mut self, _context: DeviceContextHandle) -> RenderResult<()> {
            self.calls += 1;
            Ok(())
        }
    }

    fn request<'a>(views: &'a [ViewProjection], cubes: &'a [Cube]) -> RenderViewRequest<'a> {
        RenderViewRequest {
            image_rect: Rect2Di {
                x: 0,
                y: 0,
                width: 64,
                height: 32,
            },
            clear_color: [0.0; 4],
            view_projections: views,
            color_format: dxgi::R8G8B8A8_UNORM_SRGB,
            color_texture: TextureHandle(1),
            depth_format: dxgi::D32_FLOAT,
            depth_texture: TextureHandle(2),
            cubes,
        }
    }

    #[test]
    fn render_requires_initialized_device() {
        let mut plugin = NullGraphicsPlugin::new();
        let views = [ViewProjection {
            pose: Pose::IDENTITY,
            fov: Fov::symmetric(0.7),
            near_far: NearFar {
                near: 20.0,
                far: 0.1,
            },
        }];

        let err = plugin
            .render_view(&request(&views, &[]), None)
            .expect_err("device missing");
        assert!(matches!(err, RenderError::InvalidRequest(_)));

        plugin
            .initialize_device(AdapterLuid::default(), &[FeatureLevel::LEVEL_11_0])
            .expect("device");
        assert_eq!(plugin.feature_level(), Some(FeatureLevel::LEVEL_11_0));
        plugin
            .render_view(&request(&views, &[]), None)
            .expect("render");
        assert_eq!(plugin.views().len(), 1);
        assert!(!plugin.views()[0].composited);
    }

    #[test]
    fn compositor_runs_once_per_view_request() {
        let mut spaces = SlotMap::<SpaceId, ()>::with_key();
        let mut cube = Cube::new(spaces.insert(()), 0.1);
        cube.pose = Some(Pose::IDENTITY);
        let views = [ViewProjection {
            pose: Pose::IDENTITY,
            fov: Fov::symmetric(0.7),
            near_far: NearFar {
                near: 0.1,
                far: 20.0,
            },
        }; 2];

        let mut plugin = NullGraphicsPlugin::new();
        plugin
            .initialize_device(AdapterLuid::default(), &[FeatureLevel::LEVEL_12_1])
            .expect("device");
        let mut compositor = CountingCompositor { calls: 0 };
        plugin
            .render_view(&request(&views, &[cube]), Some(&mut compositor))
            .expect("render");

        assert_eq!(compositor.calls, 1);
        let recorded = &plugin.views()[0];
        assert!(recorded.composited);
        assert_eq!(recorded.view_count, 2);
        assert_eq!(recorded.cubes, vec![cube]);
    }

    #[test]
    fn device_creation_needs_a_feature_level() {
        let mut plugin = NullGraphicsPlugin::new();
        assert!(matches!(
            plugin.initialize_device(AdapterLuid::default(), &[]),
            Err(RenderError::DeviceCreation(_))
        ));
    }

    #[test]
    fn recorded_matrices_place_cube_in_front_of_the_viewer() {
        let mut spaces = SlotMap::<SpaceId, ()>::with_key();
        let mut cube = Cube::new(spaces.insert(()), 0.1);
        cube.pose = Some(Pose::translation(Vec3::new(0.0, 0.0, -2.0)));
        let views = [ViewProjection {
            pose: Pose::IDENTITY,
            fov: Fov::symmetric(0.7),
            near_far: NearFar {
                near: 20.0,
                far: 0.1,
            },
        }];

        let mut plugin = NullGraphicsPlugin::new();
        plugin
            .initialize_device(AdapterLuid::default(), &[FeatureLevel::LEVEL_11_1])
            .expect("device");
        plugin
            .render_view(&request(&views, &[cube]), None)
            .expect("render");

        let recorded = &plugin.views()[0];
        assert_eq!(recorded.view_projections.len(), 1);
        let model = recorded.cube_models[0];
        assert!((model.w_axis.truncate() - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-6);
        assert!((model.x_axis.truncate().length() - 0.1).abs() < 1e-6);

        let clip = recorded.view_projections[0] * model * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn unlocated_cube_is_rejected() {
        let mut spaces = SlotMap::<SpaceId, ()>::with_key();
        let cube = Cube::new(spaces.insert(()), 0.1);
        let views = [ViewProjection {
            pose: Pose::IDENTITY,
            fov: Fov::symmetric(0.7),
            near_far: NearFar {
                near: 20.0,
                far: 0.1,
            },
        }];

        let mut plugin = NullGraphicsPlugin::new();
        plugin
            .initialize_device(AdapterLuid::default(), &[FeatureLevel::LEVEL_11_1])
            .expect("device");
        assert!(matches!(
            plugin.render_view(&request(&views, &[cube]), None),
            Err(RenderError::InvalidRequest(_))
        ));
        assert!(plugin.views().is_empty());
    }
}
