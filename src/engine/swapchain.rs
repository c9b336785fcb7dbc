use crate::vr::{
    INFINITE_DURATION, STEREO_VIEW_COUNT, SwapchainCreateInfo, SwapchainId, SwapchainUsage,
    SystemId, TextureHandle, ViewConfigurationView, XrError, XrResult, XrRuntime,
};

/// Picks the first runtime-preferred format the application can also render to.
pub fn select_swapchain_pixel_format(runtime_preferred: &[i64], app_supported: &[i64]) -> XrResult<i64> {
    runtime_preferred
        .iter()
        .copied()
        .find(|format| app_supported.contains(format))
        .ok_or(XrError::NoSupportedSwapchainFormat)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Swapchain {
    pub handle: SwapchainId,
    pub format: i64,
    pub width: u32,
    pub height: u32,
    pub array_size: u32,
    pub images: Vec<TextureHandle>,
}

impl Swapchain {
    /// Acquires and waits for the next image, returning its texture.
    pub fn acquire_and_wait<R: XrRuntime + ?Sized>(&self, runtime: &mut R) -> XrResult<TextureHandle> {
        let index = runtime.acquire_swapchain_image(self.handle)?;
        runtime.wait_swapchain_image(self.handle, INFINITE_DURATION)?;
        self.images.get(index as usize).copied().ok_or_else(|| {
            XrError::runtime("xrAcquireSwapchainImage", format!("image index {index} out of range"))
        })
    }
}

/// Color and depth texture-array swapchains, one array slice per view.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResources {
    pub config_views: Vec<ViewConfigurationView>,
    pub color: Swapchain,
    pub depth: Swapchain,
}

impl RenderResources {
    pub fn view_count(&self) -> usize {
        self.config_views.len()
    }

    pub fn destroy<R: XrRuntime + ?Sized>(self, runtime: &mut R) {
        runtime.destroy_swapchain(self.color.handle);
        runtime.destroy_swapchain(self.depth.handle);
    }
}

pub fn create_swapchains<R: XrRuntime + ?Sized>(
    runtime: &mut R,
    system: SystemId,
    color_formats: &[i64],
    depth_formats: &[i64],
) -> XrResult<RenderResources> {
    let config_views = runtime.view_configuration_views(system)?;
    if config_views.len() != STEREO_VIEW_COUNT {
        return Err(XrError::IncompatibleViews(format!(
            "expected {STEREO_VIEW_COUNT} views, runtime reported {}",
            config_views.len()
        )));
    }
    let first = config_views[0];
    if config_views.iter().any(|view| {
        view.recommended_image_rect_width != first.recommended_image_rect_width
            || view.recommended_image_rect_height != first.recommended_image_rect_height
            || view.recommended_swapchain_sample_count != first.recommended_swapchain_sample_count
    }) {
        return Err(XrError::IncompatibleViews(
            "views disagree on recommended size or sample count".to_string(),
        ));
    }

    let runtime_formats = runtime.swapchain_formats()?;
    let color_format = select_swapchain_pixel_format(&runtime_formats, color_formats)?;
    let depth_format = select_swapchain_pixel_format(&runtime_formats, depth_formats)?;

    let mut create = |format: i64, usage: SwapchainUsage| -> XrResult<Swapchain> {
        let info = SwapchainCreateInfo {
            format,
            width: first.recommended_image_rect_width,
            height: first.recommended_image_rect_height,
            array_size: config_views.len() as u32,
            sample_count: first.recommended_swapchain_sample_count,
            mip_count: 1,
            face_count: 1,
            usage,
        };
        let handle = runtime.create_swapchain(&info)?;
        let images = runtime.swapchain_images(handle)?;
        Ok(Swapchain {
            handle,
            format,
            width: info.width,
            height: info.height,
            array_size: info.array_size,
            images,
        })
    };

    let color = create(color_format, SwapchainUsage::Color)?;
    let depth = create(depth_format, SwapchainUsage::DepthStencil)?;
    log::info!(
        "[swapchain] {}x{} x{} color {color_format} depth {depth_format}",
        color.width,
        color.height,
        color.array_size
    );

    Ok(RenderResources {
        config_views,
        color,
        depth,
    })
}
