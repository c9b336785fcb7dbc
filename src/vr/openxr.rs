mod convert;

use self::convert::{
    blend_mode_from_xr, blend_mode_to_xr, boolean_state_from_xr, check, event_from_xr, failure,
    fov_to_xr, frame_state_from_xr, location_from_xr, pose_to_xr, rect_to_xr,
    reference_space_type, view_configuration_from_xr, view_from_xr, view_state_from_xr,
};
use crate::vr::{
    ActionKind, ActionLayout, AdapterLuid, AnchorId, BoolAction, BooleanActionState, DeviceHandle,
    EnvironmentBlendMode, FeatureLevel, FormFactor, FrameEnd, FrameState, GraphicsRequirements,
    HapticPulse, KHR_COMPOSITION_LAYER_DEPTH, KHR_D3D11_ENABLE, MSFT_SPATIAL_ANCHOR,
    MSFT_UNBOUNDED_REFERENCE_SPACE, PerHand, Pose, ReferenceSpaceType, Side, SpaceId,
    SpaceLocation, SwapchainCreateInfo, SwapchainId, SwapchainSubImage, SwapchainUsage, SystemId,
    TextureHandle, View, ViewConfigurationView, ViewState, XrDuration, XrError, XrEvent, XrResult,
    XrRuntime, XrTime,
};
use openxr as xr;
use slotmap::SlotMap;
use std::ptr;

const VIEW_TYPE: xr::ViewConfigurationType = xr::ViewConfigurationType::PRIMARY_STEREO;

struct Actions {
    set: xr::ActionSet,
    place: xr::Action<bool>,
    exit: xr::Action<bool>,
    hand_pose: xr::Action<xr::Posef>,
    vibrate: xr::Action<xr::Haptic>,
    hands: PerHand<xr::Path>,
}

impl Actions {
    fn boolean(&self, action: BoolAction) -> &xr::Action<bool> {
        match action {
            BoolAction::Place => &self.place,
            BoolAction::Exit => &self.exit,
        }
    }
}

struct SessionHandles {
    session: xr::Session<xr::D3D11>,
    waiter: xr::FrameWaiter,
    stream: xr::FrameStream<xr::D3D11>,
}

/// Runtime backed by the system OpenXR loader, bound to D3D11.
pub struct OpenXrRuntime {
    entry: xr::Entry,
    instance: Option<xr::Instance>,
    system: Option<xr::SystemId>,
    actions: Option<Actions>,
    session: Option<SessionHandles>,
    spaces: SlotMap<SpaceId, xr::Space>,
    anchors: SlotMap<AnchorId, xr::sys::SpatialAnchorMSFT>,
    swapchains: SlotMap<SwapchainId, xr::Swapchain<xr::D3D11>>,
    event_buffer: xr::EventDataBuffer,
}

impl OpenXrRuntime {
    pub fn load() -> XrResult<Self> {
        let entry = unsafe { xr::Entry::load() }.map_err(|err| XrError::Loader(err.to_string()))?;
        Ok(Self {
            entry,
            instance: None,
            system: None,
            actions: None,
            session: None,
            spaces: SlotMap::with_key(),
            anchors: SlotMap::with_key(),
            swapchains: SlotMap::with_key(),
            event_buffer: xr::EventDataBuffer::new(),
        })
    }

    fn instance(&self, call: &'static str) -> XrResult<&xr::Instance> {
        self.instance
            .as_ref()
            .ok_or_else(|| XrError::call_order(format!("{call} before instance creation")))
    }

    fn session(&self, call: &'static str) -> XrResult<&SessionHandles> {
        self.session
            .as_ref()
            .ok_or_else(|| XrError::call_order(format!("{call} without a session")))
    }

    fn session_mut(&mut self, call: &'static str) -> XrResult<&mut SessionHandles> {
        self.session
            .as_mut()
            .ok_or_else(|| XrError::call_order(format!("{call} without a session")))
    }

    fn actions(&self, call: &'static str) -> XrResult<&Actions> {
        self.actions
            .as_ref()
            .ok_or_else(|| XrError::call_order(format!("{call} before action creation")))
    }

    fn space(&self, id: SpaceId) -> XrResult<&xr::Space> {
        self.spaces
            .get(id)
            .ok_or_else(|| XrError::call_order(format!("unknown space {id:?}")))
    }

    fn swapchain(&mut self, id: SwapchainId) -> XrResult<&mut xr::Swapchain<xr::D3D11>> {
        self.swapchains
            .get_mut(id)
            .ok_or_else(|| XrError::call_order(format!("unknown swapchain {id:?}")))
    }

    fn raw_swapchain(&self, id: SwapchainId) -> XrResult<xr::sys::Swapchain> {
        self.swapchains
            .get(id)
            .map(|swapchain| swapchain.as_raw())
            .ok_or_else(|| XrError::call_order(format!("unknown swapchain {id:?}")))
    }

    fn check_system(&self, system: SystemId) -> XrResult<xr::SystemId> {
        match self.system {
            Some(current) if current.into_raw() == system.0 => Ok(current),
            _ => Err(XrError::runtime("xrGetSystem", "XR_ERROR_SYSTEM_INVALID")),
        }
    }

    fn spatial_anchor_ext(&self) -> XrResult<&xr::raw::SpatialAnchorMSFT> {
        self.instance("xrCreateSpatialAnchorMSFT")?
            .exts()
            .msft_spatial_anchor
            .as_ref()
            .ok_or(XrError::MissingExtension(MSFT_SPATIAL_ANCHOR))
    }

    fn raw_sub_image(&self, sub_image: &SwapchainSubImage) -> XrResult<xr::sys::SwapchainSubImage> {
        Ok(xr::sys::SwapchainSubImage {
            swapchain: self.raw_swapchain(sub_image.swapchain)?,
            image_rect: rect_to_xr(&sub_image.image_rect),
            image_array_index: sub_image.image_array_index,
        })
    }
}

impl XrRuntime for OpenXrRuntime {
    fn label(&self) -> &'static str {
        "OpenXR"
    }

    fn available_extensions(&mut self) -> XrResult<Vec<String>> {
        let available = self
            .entry
            .enumerate_extensions()
            .map_err(failure("xrEnumerateInstanceExtensionProperties"))?;
        let known = [
            (KHR_D3D11_ENABLE, available.khr_d3d11_enable),
            (KHR_COMPOSITION_LAYER_DEPTH, available.khr_composition_layer_depth),
            (MSFT_UNBOUNDED_REFERENCE_SPACE, available.msft_unbounded_reference_space),
            (MSFT_SPATIAL_ANCHOR, available.msft_spatial_anchor),
        ];
        Ok(known
            .into_iter()
            .filter(|(_, supported)| *supported)
            .map(|(name, _)| name.to_string())
            .chain(available.other)
            .collect())
    }

    fn create_instance(&mut self, application_name: &str, extensions: &[&'static str]) -> XrResult<()> {
        if self.instance.is_some() {
            return Err(XrError::call_order("instance already created"));
        }
        let mut enabled = xr::ExtensionSet::default();
        for name in extensions {
            match *name {
                KHR_D3D11_ENABLE => enabled.khr_d3d11_enable = true,
                KHR_COMPOSITION_LAYER_DEPTH => enabled.khr_composition_layer_depth = true,
                MSFT_UNBOUNDED_REFERENCE_SPACE => enabled.msft_unbounded_reference_space = true,
                MSFT_SPATIAL_ANCHOR => enabled.msft_spatial_anchor = true,
                other => enabled.other.push(other.to_string()),
            }
        }

        let instance = self
            .entry
            .create_instance(
                &xr::ApplicationInfo {
                    application_name,
                    application_version: 1,
                    engine_name: "holo_xr",
                    engine_version: 1,
                    api_version: xr::Version::new(1, 0, 0),
                },
                &enabled,
                &[],
            )
            .map_err(failure("xrCreateInstance"))?;

        if let Ok(properties) = instance.properties() {
            log::info!(
                "[xr] runtime {} {}",
                properties.runtime_name,
                properties.runtime_version
            );
        }
        self.instance = Some(instance);
        Ok(())
    }

    fn create_actions(&mut self, layout: &ActionLayout) -> XrResult<()> {
        let instance = self.instance("xrCreateActionSet")?;
        let path = |text: &str| instance.string_to_path(text).map_err(failure("xrStringToPath"));
        let hands = PerHand::try_from_fn(|side| path(side.subaction_path()))?;
        let subactions = [hands.left, hands.right];

        let set = instance
            .create_action_set(
                &layout.action_set_name,
                &layout.localized_action_set_name,
                0,
            )
            .map_err(failure("xrCreateActionSet"))?;
        let missing = |kind: ActionKind| {
            XrError::call_order(format!("action layout has no {} action", kind.name()))
        };
        for kind in [
            ActionKind::Place,
            ActionKind::HandPose,
            ActionKind::Vibrate,
            ActionKind::Exit,
        ] {
            if !layout.actions.contains(&kind) {
                return Err(missing(kind));
            }
        }

        let place = set
            .create_action::<bool>(
                ActionKind::Place.name(),
                ActionKind::Place.localized_name(),
                &subactions,
            )
            .map_err(failure("xrCreateAction"))?;
        let exit = set
            .create_action::<bool>(
                ActionKind::Exit.name(),
                ActionKind::Exit.localized_name(),
                &subactions,
            )
            .map_err(failure("xrCreateAction"))?;
        let hand_pose = set
            .create_action::<xr::Posef>(
                ActionKind::HandPose.name(),
                ActionKind::HandPose.localized_name(),
                &subactions,
            )
            .map_err(failure("xrCreateAction"))?;
        let vibrate = set
            .create_action::<xr::Haptic>(
                ActionKind::Vibrate.name(),
                ActionKind::Vibrate.localized_name(),
                &subactions,
            )
            .map_err(failure("xrCreateAction"))?;

        let mut binding_paths = Vec::with_capacity(layout.bindings.len());
        for binding in &layout.bindings {
            binding_paths.push((binding.action, path(&binding.path)?));
        }
        let bindings = binding_paths
            .iter()
            .map(|(kind, path)| match kind {
                ActionKind::Place => xr::Binding::new(&place, *path),
                ActionKind::Exit => xr::Binding::new(&exit, *path),
                ActionKind::HandPose => xr::Binding::new(&hand_pose, *path),
                ActionKind::Vibrate => xr::Binding::new(&vibrate, *path),
            })
            .collect::<Vec<_>>();
        instance
            .suggest_interaction_profile_bindings(path(&layout.interaction_profile)?, &bindings)
            .map_err(failure("xrSuggestInteractionProfileBindings"))?;

        self.actions = Some(Actions {
            set,
            place,
            exit,
            hand_pose,
            vibrate,
            hands,
        });
        Ok(())
    }

    fn system(&mut self, form_factor: FormFactor) -> XrResult<SystemId> {
        let form_factor = match form_factor {
            FormFactor::HeadMountedDisplay => xr::FormFactor::HEAD_MOUNTED_DISPLAY,
        };
        let system = self
            .instance("xrGetSystem")?
            .system(form_factor)
            .map_err(failure("xrGetSystem"))?;
        self.system = Some(system);
        Ok(SystemId(system.into_raw()))
    }

    fn environment_blend_modes(&mut self, system: SystemId) -> XrResult<Vec<EnvironmentBlendMode>> {
        let system = self.check_system(system)?;
        let modes = self
            .instance("xrEnumerateEnvironmentBlendModes")?
            .enumerate_environment_blend_modes(system, VIEW_TYPE)
            .map_err(failure("xrEnumerateEnvironmentBlendModes"))?;
        Ok(modes.into_iter().filter_map(blend_mode_from_xr).collect())
    }

    fn graphics_requirements(&mut self, system: SystemId) -> XrResult<GraphicsRequirements> {
        let system = self.check_system(system)?;
        let requirements = self
            .instance("xrGetD3D11GraphicsRequirementsKHR")?
            .graphics_requirements::<xr::D3D11>(system)
            .map_err(failure("xrGetD3D11GraphicsRequirementsKHR"))?;
        Ok(GraphicsRequirements {
            adapter_luid: AdapterLuid {
                low_part: requirements.adapter_luid.LowPart as u32,
                high_part: requirements.adapter_luid.HighPart as i32,
            },
            min_feature_level: FeatureLevel(requirements.min_feature_level as u32),
        })
    }

    fn view_configuration_views(&mut self, system: SystemId) -> XrResult<Vec<ViewConfigurationView>> {
        let system = self.check_system(system)?;
        let views = self
            .instance("xrEnumerateViewConfigurationViews")?
            .enumerate_view_configuration_views(system, VIEW_TYPE)
            .map_err(failure("xrEnumerateViewConfigurationViews"))?;
        Ok(views.iter().map(view_configuration_from_xr).collect())
    }

    fn create_session(&mut self, system: SystemId, device: DeviceHandle) -> XrResult<()> {
        if self.session.is_some() {
            return Err(XrError::call_order("session already exists"));
        }
        let system = self.check_system(system)?;
        let instance = self.instance("xrCreateSession")?;
        let (session, waiter, stream) = unsafe {
            instance.create_session::<xr::D3D11>(
                system,
                &xr::d3d::SessionCreateInfoD3D11 {
                    device: device.0 as *mut _,
                },
            )
        }
        .map_err(failure("xrCreateSession"))?;

        let actions = self.actions("xrAttachSessionActionSets")?;
        session
            .attach_action_sets(&[&actions.set])
            .map_err(failure("xrAttachSessionActionSets"))?;

        self.session = Some(SessionHandles {
            session,
            waiter,
            stream,
        });
        Ok(())
    }

    fn destroy_session(&mut self) {
        self.swapchains.clear();
        let anchors = self.anchors.drain().map(|(_, anchor)| anchor).collect::<Vec<_>>();
        if let Ok(ext) = self.spatial_anchor_ext() {
            for anchor in anchors {
                unsafe { (ext.destroy_spatial_anchor)(anchor) };
            }
        }
        self.spaces.clear();
        self.session = None;
        self.system = None;
    }

    fn begin_session(&mut self) -> XrResult<()> {
        self.session("xrBeginSession")?
            .session
            .begin(VIEW_TYPE)
            .map_err(failure("xrBeginSession"))?;
        Ok(())
    }

    fn end_session(&mut self) -> XrResult<()> {
        self.session("xrEndSession")?
            .session
            .end()
            .map_err(failure("xrEndSession"))?;
        Ok(())
    }

    fn request_exit_session(&mut self) -> XrResult<()> {
        self.session("xrRequestExitSession")?
            .session
            .request_exit()
            .map_err(failure("xrRequestExitSession"))
    }

    fn create_reference_space(&mut self, ty: ReferenceSpaceType, pose: Pose) -> XrResult<SpaceId> {
        let space = self
            .session("xrCreateReferenceSpace")?
            .session
            .create_reference_space(reference_space_type(ty), pose_to_xr(&pose))
            .map_err(failure("xrCreateReferenceSpace"))?;
        Ok(self.spaces.insert(space))
    }

    fn create_hand_space(&mut self, side: Side) -> XrResult<SpaceId> {
        let session = self.session("xrCreateActionSpace")?.session.clone();
        let actions = self.actions("xrCreateActionSpace")?;
        let space = actions
            .hand_pose
            .create_space(session, actions.hands[side], xr::Posef::IDENTITY)
            .map_err(failure("xrCreateActionSpace"))?;
        Ok(self.spaces.insert(space))
    }

    fn create_spatial_anchor(&mut self, base: SpaceId, pose: Pose, time: XrTime) -> XrResult<AnchorId> {
        let session = self.session("xrCreateSpatialAnchorMSFT")?.session.as_raw();
        let info = xr::sys::SpatialAnchorCreateInfoMSFT {
            ty: xr::sys::SpatialAnchorCreateInfoMSFT::TYPE,
            next: ptr::null(),
            space: self.space(base)?.as_raw(),
            pose: pose_to_xr(&pose),
            time: xr::Time::from_nanos(time),
        };
        let mut anchor = xr::sys::SpatialAnchorMSFT::NULL;
        let ext = self.spatial_anchor_ext()?;
        check("xrCreateSpatialAnchorMSFT", unsafe {
            (ext.create_spatial_anchor)(session, &info, &mut anchor)
        })?;
        Ok(self.anchors.insert(anchor))
    }

    fn create_anchor_space(&mut self, anchor: AnchorId) -> XrResult<SpaceId> {
        let session = self.session("xrCreateSpatialAnchorSpaceMSFT")?.session.clone();
        let anchor = *self
            .anchors
            .get(anchor)
            .ok_or_else(|| XrError::call_order(format!("unknown anchor {anchor:?}")))?;
        let info = xr::sys::SpatialAnchorSpaceCreateInfoMSFT {
            ty: xr::sys::SpatialAnchorSpaceCreateInfoMSFT::TYPE,
            next: ptr::null(),
            anchor,
            pose_in_anchor_space: xr::Posef::IDENTITY,
        };
        let mut raw = xr::sys::Space::NULL;
        let ext = self.spatial_anchor_ext()?;
        check("xrCreateSpatialAnchorSpaceMSFT", unsafe {
            (ext.create_spatial_anchor_space)(session.as_raw(), &info, &mut raw)
        })?;
        let space = unsafe { xr::Space::reference_from_raw(session, raw) };
        Ok(self.spaces.insert(space))
    }

    fn destroy_anchor(&mut self, anchor: AnchorId) {
        let Some(anchor) = self.anchors.remove(anchor) else {
            return;
        };
        if let Ok(ext) = self.spatial_anchor_ext() {
            unsafe { (ext.destroy_spatial_anchor)(anchor) };
        }
    }

    fn destroy_space(&mut self, space: SpaceId) {
        self.spaces.remove(space);
    }

    fn locate_space(&mut self, space: SpaceId, base: SpaceId, time: XrTime) -> XrResult<SpaceLocation> {
        let location = self
            .space(space)?
            .locate(self.space(base)?, xr::Time::from_nanos(time))
            .map_err(failure("xrLocateSpace"))?;
        Ok(location_from_xr(&location))
    }

    fn swapchain_formats(&mut self) -> XrResult<Vec<i64>> {
        let formats = self
            .session("xrEnumerateSwapchainFormats")?
            .session
            .enumerate_swapchain_formats()
            .map_err(failure("xrEnumerateSwapchainFormats"))?;
        Ok(formats.into_iter().map(i64::from).collect())
    }

    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> XrResult<SwapchainId> {
        let usage_flags = match info.usage {
            SwapchainUsage::Color => {
                xr::SwapchainUsageFlags::SAMPLED | xr::SwapchainUsageFlags::COLOR_ATTACHMENT
            }
            SwapchainUsage::DepthStencil => {
                xr::SwapchainUsageFlags::SAMPLED
                    | xr::SwapchainUsageFlags::DEPTH_STENCIL_ATTACHMENT
            }
        };
        let format = u32::try_from(info.format).map_err(|_| {
            XrError::runtime("xrCreateSwapchain", format!("format {} out of range", info.format))
        })?;
        let swapchain = self
            .session("xrCreateSwapchain")?
            .session
            .create_swapchain(&xr::SwapchainCreateInfo {
                create_flags: xr::SwapchainCreateFlags::EMPTY,
                usage_flags,
                format,
                sample_count: info.sample_count,
                width: info.width,
                height: info.height,
                face_count: info.face_count,
                array_size: info.array_size,
                mip_count: info.mip_count,
            })
            .map_err(failure("xrCreateSwapchain"))?;
        Ok(self.swapchains.insert(swapchain))
    }

    fn swapchain_images(&mut self, swapchain: SwapchainId) -> XrResult<Vec<TextureHandle>> {
        let images = self
            .swapchain(swapchain)?
            .enumerate_images()
            .map_err(failure("xrEnumerateSwapchainImages"))?;
        Ok(images
            .into_iter()
            .map(|texture| TextureHandle(texture as usize))
            .collect())
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) {
        self.swapchains.remove(swapchain);
    }

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainId) -> XrResult<u32> {
        self.swapchain(swapchain)?
            .acquire_image()
            .map_err(failure("xrAcquireSwapchainImage"))
    }

    fn wait_swapchain_image(&mut self, swapchain: SwapchainId, timeout: XrDuration) -> XrResult<()> {
        self.swapchain(swapchain)?
            .wait_image(xr::Duration::from_nanos(timeout))
            .map_err(failure("xrWaitSwapchainImage"))
    }

    fn release_swapchain_image(&mut self, swapchain: SwapchainId) -> XrResult<()> {
        self.swapchain(swapchain)?
            .release_image()
            .map_err(failure("xrReleaseSwapchainImage"))
    }

    fn poll_event(&mut self) -> XrResult<Option<XrEvent>> {
        let instance = self
            .instance
            .as_ref()
            .ok_or_else(|| XrError::call_order("xrPollEvent before instance creation"))?;
        let event = instance
            .poll_event(&mut self.event_buffer)
            .map_err(failure("xrPollEvent"))?;
        Ok(event.map(event_from_xr))
    }

    fn sync_actions(&mut self) -> XrResult<()> {
        let actions = self.actions("xrSyncActions")?;
        self.session("xrSyncActions")?
            .session
            .sync_actions(&[xr::ActiveActionSet::new(&actions.set)])
            .map_err(failure("xrSyncActions"))
    }

    fn boolean_action_state(&mut self, action: BoolAction, side: Side) -> XrResult<BooleanActionState> {
        let actions = self.actions("xrGetActionStateBoolean")?;
        let session = &self.session("xrGetActionStateBoolean")?.session;
        let state = actions
            .boolean(action)
            .state(session, actions.hands[side])
            .map_err(failure("xrGetActionStateBoolean"))?;
        Ok(boolean_state_from_xr(&state))
    }

    fn apply_haptic_feedback(&mut self, side: Side, pulse: HapticPulse) -> XrResult<()> {
        let actions = self.actions("xrApplyHapticFeedback")?;
        let session = &self.session("xrApplyHapticFeedback")?.session;
        let vibration = xr::HapticVibration::new()
            .amplitude(pulse.amplitude)
            .duration(xr::Duration::from_nanos(pulse.duration))
            .frequency(pulse.frequency);
        actions
            .vibrate
            .apply_feedback(session, actions.hands[side], &vibration)
            .map_err(failure("xrApplyHapticFeedback"))
    }

    fn wait_frame(&mut self) -> XrResult<FrameState> {
        let state = self
            .session_mut("xrWaitFrame")?
            .waiter
            .wait()
            .map_err(failure("xrWaitFrame"))?;
        Ok(frame_state_from_xr(&state))
    }

    fn begin_frame(&mut self) -> XrResult<()> {
        self.session_mut("xrBeginFrame")?
            .stream
            .begin()
            .map_err(failure("xrBeginFrame"))?;
        Ok(())
    }

    fn locate_views(&mut self, display_time: XrTime, space: SpaceId) -> XrResult<(ViewState, Vec<View>)> {
        let (flags, views) = self
            .session("xrLocateViews")?
            .session
            .locate_views(VIEW_TYPE, xr::Time::from_nanos(display_time), self.space(space)?)
            .map_err(failure("xrLocateViews"))?;
        Ok((
            view_state_from_xr(flags),
            views.iter().map(view_from_xr).collect(),
        ))
    }

    fn end_frame(&mut self, frame: FrameEnd<'_>) -> XrResult<()> {
        // Depth infos are chained through `next`, so every raw struct lives until xrEndFrame returns.
        let mut depth_infos = Vec::new();
        for layer in frame.layers {
            for view in &layer.views {
                depth_infos.push(match &view.depth {
                    Some(depth) => Some(xr::sys::CompositionLayerDepthInfoKHR {
                        ty: xr::sys::CompositionLayerDepthInfoKHR::TYPE,
                        next: ptr::null(),
                        sub_image: self.raw_sub_image(&depth.sub_image)?,
                        min_depth: depth.min_depth,
                        max_depth: depth.max_depth,
                        near_z: depth.near_z,
                        far_z: depth.far_z,
                    }),
                    None => None,
                });
            }
        }

        let mut projection_views = Vec::with_capacity(depth_infos.len());
        let mut depth_iter = depth_infos.iter();
        for layer in frame.layers {
            let mut views = Vec::with_capacity(layer.views.len());
            for view in &layer.views {
                let next = match depth_iter.next() {
                    Some(Some(depth)) => depth as *const _ as *const _,
                    _ => ptr::null(),
                };
                views.push(xr::sys::CompositionLayerProjectionView {
                    ty: xr::sys::CompositionLayerProjectionView::TYPE,
                    next,
                    pose: pose_to_xr(&view.pose),
                    fov: fov_to_xr(&view.fov),
                    sub_image: self.raw_sub_image(&view.sub_image)?,
                });
            }
            projection_views.push(views);
        }

        let mut projections = Vec::with_capacity(frame.layers.len());
        for (layer, views) in frame.layers.iter().zip(&projection_views) {
            let layer_flags = if layer.blend_texture_source_alpha {
                xr::CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA
            } else {
                xr::CompositionLayerFlags::EMPTY
            };
            projections.push(xr::sys::CompositionLayerProjection {
                ty: xr::sys::CompositionLayerProjection::TYPE,
                next: ptr::null(),
                layer_flags,
                space: self.space(layer.space)?.as_raw(),
                view_count: views.len() as u32,
                views: views.as_ptr(),
            });
        }
        let headers = projections
            .iter()
            .map(|projection| projection as *const _ as *const xr::sys::CompositionLayerBaseHeader)
            .collect::<Vec<_>>();

        let info = xr::sys::FrameEndInfo {
            ty: xr::sys::FrameEndInfo::TYPE,
            next: ptr::null(),
            display_time: xr::Time::from_nanos(frame.display_time),
            environment_blend_mode: blend_mode_to_xr(frame.blend_mode),
            layer_count: headers.len() as u32,
            layers: headers.as_ptr(),
        };
        let instance = self.instance("xrEndFrame")?;
        let session = self.session("xrEndFrame")?.session.as_raw();
        check("xrEndFrame", unsafe {
            (instance.fp().end_frame)(session, &info)
        })
    }
}

impl Drop for OpenXrRuntime {
    fn drop(&mut self) {
        self.destroy_session();
        self.actions = None;
    }
}
