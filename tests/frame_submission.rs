use holo_xr::config::ProgramConfig;
use holo_xr::engine::XrProgram;
use holo_xr::engine::frame::{OPAQUE_CLEAR_COLOR, TRANSPARENT_CLEAR_COLOR};
use holo_xr::render::{NullGraphicsPlugin, dxgi};
use holo_xr::vr::{
    EnvironmentBlendMode, KHR_D3D11_ENABLE, MSFT_SPATIAL_ANCHOR, SimulatedRuntime,
    SwapchainUsage, XrError,
};

fn run_frames(
    mut runtime: SimulatedRuntime,
    graphics: NullGraphicsPlugin,
    frames: u64,
) -> XrProgram<SimulatedRuntime, NullGraphicsPlugin> {
    runtime.schedule_user_exit(frames);
    let config = ProgramConfig {
        idle_throttle_ms: 1,
        ..ProgramConfig::default()
    };
    let mut program = XrProgram::new(config, runtime, graphics);
    program.run().expect("run");
    program
}

#[test]
fn projection_layer_carries_both_views_with_depth() {
    let program = run_frames(SimulatedRuntime::new(), NullGraphicsPlugin::new(), 3);
    let resources = program.render_resources().expect("swapchains");

    for frame in program.runtime().submitted_frames() {
        assert_eq!(frame.blend_mode, EnvironmentBlendMode::Additive);
        assert_eq!(frame.layers.len(), 1);
        let layer = &frame.layers[0];
        assert!(layer.blend_texture_source_alpha);
        assert_eq!(layer.space, program.spaces().expect("spaces").app_space);
        assert_eq!(layer.views.len(), 2);

        for (index, view) in layer.views.iter().enumerate() {
            assert_eq!(view.sub_image.swapchain, resources.color.handle);
            assert_eq!(view.sub_image.image_array_index, index as u32);
            assert_eq!(view.sub_image.image_rect.width, 1440);
            assert_eq!(view.sub_image.image_rect.height, 936);

            let depth = view.depth.expect("depth info chained");
            assert_eq!(depth.sub_image.swapchain, resources.depth.handle);
            assert_eq!(depth.sub_image.image_array_index, index as u32);
            assert_eq!((depth.min_depth, depth.max_depth), (0.0, 1.0));
            assert_eq!((depth.near_z, depth.far_z), (20.0, 0.1));
        }
    }
}

#[test]
fn depth_info_is_omitted_without_the_extension() {
    let runtime = SimulatedRuntime::new().with_extensions(&[KHR_D3D11_ENABLE, MSFT_SPATIAL_ANCHOR]);
    let program = run_frames(runtime, NullGraphicsPlugin::new(), 2);

    let frame = program.runtime().submitted_frames().last().expect("frame");
    assert!(frame.layers[0].views.iter().all(|view| view.depth.is_none()));
}

#[test]
fn clear_color_follows_blend_mode() {
    let runtime = SimulatedRuntime::new().with_blend_modes(vec![EnvironmentBlendMode::Opaque]);
    let program = run_frames(runtime, NullGraphicsPlugin::new(), 2);
    assert!(
        program
            .graphics()
            .views()
            .iter()
            .all(|view| view.clear_color == OPAQUE_CLEAR_COLOR)
    );
    assert_eq!(
        program.runtime().submitted_frames()[0].blend_mode,
        EnvironmentBlendMode::Opaque
    );

    let program = run_frames(SimulatedRuntime::new(), NullGraphicsPlugin::new(), 2);
    assert_eq!(program.graphics().views()[0].clear_color, TRANSPARENT_CLEAR_COLOR);
}

#[test]
fn invalid_view_pose_submits_an_empty_frame() {
    let mut runtime = SimulatedRuntime::new();
    runtime.set_view_state_valid(false);
    let program = run_frames(runtime, NullGraphicsPlugin::new(), 4);

    let frames = program.runtime().submitted_frames();
    assert_eq!(frames.len(), 4);
    assert!(frames.iter().all(|frame| frame.layers.is_empty()));
    assert!(program.graphics().views().is_empty());
    assert!(program.holograms().is_empty(), "demo cubes wait for a valid view");
}

#[test]
fn swapchains_are_stereo_texture_arrays() {
    let program = run_frames(SimulatedRuntime::new(), NullGraphicsPlugin::new(), 1);
    let infos = program.runtime().swapchain_infos();
    assert_eq!(infos.len(), 2);

    let color = infos
        .iter()
        .find(|info| info.usage == SwapchainUsage::Color)
        .expect("color swapchain");
    assert_eq!(color.format, dxgi::R8G8B8A8_UNORM_SRGB);
    assert_eq!((color.width, color.height), (1440, 936));
    assert_eq!(color.array_size, 2);
    assert_eq!((color.mip_count, color.face_count, color.sample_count), (1, 1, 1));

    let depth = infos
        .iter()
        .find(|info| info.usage == SwapchainUsage::DepthStencil)
        .expect("depth swapchain");
    assert_eq!(depth.format, dxgi::D32_FLOAT);
    assert_eq!(depth.array_size, 2);
}

#[test]
fn each_frame_renders_into_a_fresh_image() {
    let program = run_frames(SimulatedRuntime::new(), NullGraphicsPlugin::new(), 4);
    let textures = program
        .graphics()
        .views()
        .iter()
        .map(|view| view.color_texture)
        .collect::<Vec<_>>();
    assert_eq!(textures.len(), 4);
    assert_ne!(textures[0], textures[1]);
    assert_eq!(textures[0], textures[3], "three images cycle");
}

#[test]
fn unsupported_color_formats_fail_the_session() {
    let graphics = NullGraphicsPlugin::new().with_color_formats(vec![dxgi::R8G8B8A8_UNORM]);
    let mut runtime = SimulatedRuntime::new();
    runtime.schedule_user_exit(1);
    let mut program = XrProgram::new(ProgramConfig::default(), runtime, graphics);

    match program.run() {
        Err(XrError::NoSupportedSwapchainFormat) => {}
        other => panic!("unexpected run result: {other:?}"),
    }
}

#[test]
fn demo_cube_spins_while_focused() {
    let program = run_frames(SimulatedRuntime::new(), NullGraphicsPlugin::new(), 10);
    let holograms = program.holograms();
    assert_eq!(holograms.len(), 2);
    assert_eq!(holograms[0].cube.pose_in_space, None);
    let orbit = holograms[1].cube.pose_in_space.expect("spinning offset");
    assert!((orbit.position.length() - 0.5).abs() < 1e-4);

    let last = program.graphics().views().last().expect("rendered view");
    assert_eq!(last.view_projections.len(), 2);
    assert_eq!(last.cube_models.len(), last.cubes.len());
}
