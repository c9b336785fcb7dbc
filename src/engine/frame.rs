use super::XrProgram;
use super::input::Hologram;
use crate::config::DemoCubeConfig;
use crate::render::{Cube, GraphicsPlugin, RemoteCompositor, RenderViewRequest, ViewProjection};
use crate::vr::math::{pose_multiply, quat_from_axis_angle};
use crate::vr::{
    DepthInfo, EnvironmentBlendMode, FrameEnd, PerHand, Pose, ProjectionLayer, ProjectionView,
    Rect2Di, ReferenceSpaceType, SpaceId, SwapchainSubImage, XrError, XrResult, XrRuntime, XrTime,
};
use glam::Vec3;

pub const OPAQUE_CLEAR_COLOR: [f32; 4] = [0.184313729, 0.309803933, 0.309803933, 1.0];
pub const TRANSPARENT_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

pub fn clear_color(blend_mode: EnvironmentBlendMode) -> [f32; 4] {
    match blend_mode {
        EnvironmentBlendMode::Opaque => OPAQUE_CLEAR_COLOR,
        EnvironmentBlendMode::Additive | EnvironmentBlendMode::AlphaBlend => {
            TRANSPARENT_CLEAR_COLOR
        }
    }
}

/// The startup cube pair: a static cube with a smaller one orbiting it.
///
/// Both entries are indices into the hologram list, which only grows until the next restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemoCubes {
    #[default]
    Uninitialized,
    Ready {
        main: usize,
        spinning: usize,
        start_time: XrTime,
    },
}

impl DemoCubes {
    pub fn advance<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        holograms: &mut Vec<Hologram>,
        config: &DemoCubeConfig,
        time: XrTime,
        focused: bool,
    ) -> XrResult<()> {
        if let DemoCubes::Uninitialized = self {
            let in_front = Pose::translation(Vec3::new(0.0, 0.0, -config.distance));
            let main_space = runtime.create_reference_space(ReferenceSpaceType::Local, in_front)?;
            holograms.push(Hologram {
                cube: Cube::new(main_space, config.main_scale),
                anchor: None,
            });
            let main = holograms.len() - 1;

            let spinning_space = runtime.create_reference_space(ReferenceSpaceType::Local, in_front)?;
            holograms.push(Hologram {
                cube: Cube::new(spinning_space, config.spinning_scale),
                anchor: None,
            });
            let spinning = holograms.len() - 1;

            *self = DemoCubes::Ready {
                main,
                spinning,
                start_time: time,
            };
        }

        let DemoCubes::Ready {
            spinning,
            start_time,
            ..
        } = *self
        else {
            return Ok(());
        };
        if !focused {
            return Ok(());
        }

        let seconds = (time - start_time) as f64 / 1e9;
        let angle = config.angular_velocity * seconds as f32;
        let orbit = Pose::new(
            Vec3::new(
                config.orbit_radius * angle.sin(),
                0.0,
                config.orbit_radius * angle.cos(),
            ),
            quat_from_axis_angle(Vec3::Y, angle),
        );
        let cube = holograms.get_mut(spinning).ok_or_else(|| {
            XrError::call_order(format!("spinning cube index {spinning} out of range"))
        })?;
        cube.cube.pose_in_space = Some(orbit);
        Ok(())
    }
}

/// Locates `cube` in app space, returning whether it is visible this frame.
pub fn resolve_cube<R: XrRuntime + ?Sized>(
    runtime: &mut R,
    cube: &mut Cube,
    app_space: SpaceId,
    time: XrTime,
) -> XrResult<bool> {
    let location = runtime.locate_space(cube.space, app_space, time)?;
    if !location.is_pose_valid() {
        cube.pose = None;
        return Ok(false);
    }
    cube.pose = Some(match &cube.pose_in_space {
        Some(offset) => pose_multiply(offset, &location.pose),
        None => location.pose,
    });
    Ok(true)
}

impl<R: XrRuntime, G: GraphicsPlugin> XrProgram<R, G> {
    pub(super) fn render_frame(&mut self) -> XrResult<()> {
        let frame_state = self.runtime.wait_frame()?;
        self.runtime.begin_frame()?;

        let mut layers = Vec::new();
        if frame_state.should_render {
            if let Some(layer) = self.render_layer(frame_state.predicted_display_time)? {
                layers.push(layer);
            }
        }

        let blend_mode = self
            .blend_mode
            .ok_or_else(|| XrError::call_order("frame submitted before system initialization"))?;
        self.runtime.end_frame(FrameEnd {
            display_time: frame_state.predicted_display_time,
            blend_mode,
            layers: &layers,
        })
    }

    fn render_layer(&mut self, time: XrTime) -> XrResult<Option<ProjectionLayer>> {
        let spaces = self
            .spaces
            .as_ref()
            .ok_or_else(|| XrError::call_order("render before space creation"))?;
        let app_space = spaces.app_space;
        let status_space = spaces.status_space;

        let (view_state, views) = self.runtime.locate_views(time, app_space)?;
        let resources = self
            .render_resources
            .as_ref()
            .ok_or_else(|| XrError::call_order("render before swapchain creation"))?;
        if views.len() != resources.view_count()
            || views.len() != resources.color.array_size as usize
            || views.len() != resources.depth.array_size as usize
        {
            return Err(XrError::IncompatibleViews(format!(
                "located {} views for {} swapchain slices",
                views.len(),
                resources.color.array_size
            )));
        }
        if !view_state.is_pose_valid() {
            log::debug!("[frame] view pose invalid, submitting no layers");
            return Ok(None);
        }

        let focused = self.session_state.is_focused();
        self.demo_cubes.advance(
            &mut self.runtime,
            &mut self.holograms,
            &self.config.demo,
            time,
            focused,
        )?;
        let hand_cubes = self.spaces.as_mut().map(|spaces| &mut spaces.hand_cubes);
        let cubes = visible_cubes(
            &mut self.runtime,
            hand_cubes,
            &mut self.holograms,
            app_space,
            time,
        )?;

        if let (Some(remote), Some(status_space)) = (self.remote.as_mut(), status_space) {
            let location = self.runtime.locate_space(status_space, app_space, time)?;
            if location.is_pose_valid() {
                remote.position_status_overlay(location.pose);
            }
        }

        let color_texture = resources.color.acquire_and_wait(&mut self.runtime)?;
        let depth_texture = resources.depth.acquire_and_wait(&mut self.runtime)?;

        let near_far = self.config.depth_range();
        let image_rect = Rect2Di {
            x: 0,
            y: 0,
            width: resources.color.width as i32,
            height: resources.color.height as i32,
        };
        let blend_mode = self
            .blend_mode
            .ok_or_else(|| XrError::call_order("render before system initialization"))?;

        let view_projections = views
            .iter()
            .map(|view| ViewProjection {
                pose: view.pose,
                fov: view.fov,
                near_far,
            })
            .collect::<Vec<_>>();
        let projection_views = views
            .iter()
            .enumerate()
            .map(|(index, view)| ProjectionView {
                pose: view.pose,
                fov: view.fov,
                sub_image: SwapchainSubImage {
                    swapchain: resources.color.handle,
                    image_rect,
                    image_array_index: index as u32,
                },
                depth: self.extensions.depth_layer.then(|| DepthInfo {
                    sub_image: SwapchainSubImage {
                        swapchain: resources.depth.handle,
                        image_rect,
                        image_array_index: index as u32,
                    },
                    min_depth: 0.0,
                    max_depth: 1.0,
                    near_z: near_far.near,
                    far_z: near_far.far,
                }),
            })
            .collect::<Vec<_>>();

        let request = RenderViewRequest {
            image_rect,
            clear_color: clear_color(blend_mode),
            view_projections: &view_projections,
            color_format: resources.color.format,
            color_texture,
            depth_format: resources.depth.format,
            depth_texture,
            cubes: &cubes,
        };
        let compositor = self
            .remote
            .as_mut()
            .map(|remote| remote as &mut dyn RemoteCompositor);
        self.graphics.render_view(&request, compositor)?;

        self.runtime.release_swapchain_image(resources.color.handle)?;
        self.runtime.release_swapchain_image(resources.depth.handle)?;

        Ok(Some(ProjectionLayer {
            space: app_space,
            blend_texture_source_alpha: true,
            views: projection_views,
        }))
    }
}

/// Hand cubes first, then holograms in placement order.
fn visible_cubes<R: XrRuntime + ?Sized>(
    runtime: &mut R,
    hand_cubes: Option<&mut PerHand<Cube>>,
    holograms: &mut [Hologram],
    app_space: SpaceId,
    time: XrTime,
) -> XrResult<Vec<Cube>> {
    let mut visible = Vec::new();
    if let Some(hand_cubes) = hand_cubes {
        for (_, cube) in hand_cubes.iter_mut() {
            if resolve_cube(runtime, cube, app_space, time)? {
                visible.push(*cube);
            }
        }
    }
    for hologram in holograms {
        if resolve_cube(runtime, &mut hologram.cube, app_space, time)? {
            visible.push(hologram.cube);
        }
    }
    Ok(visible)
}
