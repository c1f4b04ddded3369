// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr, CString};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use lantern_render::{GpuDevice, RenderResult, RenderSize};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info, trace, warn};

use crate::swapchain::VkSwapchain;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VsyncMode {
    Fifo,    // Target monitor refresh rate
    Mailbox, // Smart Vsync, fps uncapped
}

#[derive(Clone, Copy, Debug)]
pub struct PresentPreference {
    pub vsync: bool,
    pub mode: VsyncMode,
}

impl Default for PresentPreference {
    fn default() -> Self {
        Self {
            vsync: true,
            mode: VsyncMode::Mailbox,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeviceOptions {
    pub app_name: String,
    pub validation: bool,
    pub present: PresentPreference,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            app_name: "lantern".to_owned(),
            validation: cfg!(debug_assertions),
            present: PresentPreference::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Instance, surface, logical device, queues and the long-lived command
/// pool. Everything else holds an `Arc` to this, so it is destroyed last.
pub struct DeviceContext {
    _entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    device: ash::Device,
    families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    command_pool: vk::CommandPool,

    swapchain_loader: swapchain::Device,
    present: PresentPreference,
}

// STRICT TEARDOWN ORDER:
// - device_wait_idle()
// - Destroy command pool BEFORE device
// - Destroy device, THEN surface, THEN debug messenger; instance last.
impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(debug) = self.debug.take() {
                debug
                    .loader
                    .destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let p_message = unsafe { (*data).p_message };
    if p_message.is_null() {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr(p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(?types, "[vk] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(?types, "[vk] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(?types, "[vk] {msg}");
    } else {
        trace!(?types, "[vk] {msg}");
    }
    vk::FALSE
}

unsafe fn validation_available(entry: &Entry) -> bool {
    let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
    layers
        .iter()
        .any(|l| unsafe { CStr::from_ptr(l.layer_name.as_ptr()) } == VALIDATION_LAYER)
}

unsafe fn create_instance(
    entry: &Entry,
    display: raw_window_handle::RawDisplayHandle,
    app_name: &CStr,
    validation: bool,
) -> Result<Instance> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: 0,
        p_engine_name: c"lantern".as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?
        .to_vec();
    if validation {
        extensions.push(debug_utils::NAME.as_ptr());
    }
    let layers = [VALIDATION_LAYER.as_ptr()];
    let (enabled_layer_count, pp_enabled_layer_names) = if validation {
        (layers.len() as u32, layers.as_ptr())
    } else {
        (0, std::ptr::null())
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count,
        pp_enabled_layer_names,
        ..Default::default()
    };

    Ok(unsafe { entry.create_instance(&create_info, None) }.context("create_instance")?)
}

unsafe fn create_debug_messenger(entry: &Entry, instance: &Instance) -> Result<DebugMessenger> {
    let loader = debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
        .context("create_debug_utils_messenger")?;
    Ok(DebugMessenger { loader, messenger })
}

unsafe fn find_queue_families(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Option<QueueFamilies> {
    let qprops = unsafe { instance.get_physical_device_queue_family_properties(phys) };
    let mut graphics = None;
    let mut present = None;
    for (i, q) in qprops.iter().enumerate() {
        let i = i as u32;
        let can_present = unsafe { surface_loader.get_physical_device_surface_support(phys, i, surface) }
            .unwrap_or(false);
        let can_draw = q.queue_count > 0 && q.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        // a family that does both wins outright
        if can_draw && can_present {
            return Some(QueueFamilies {
                graphics: i,
                present: i,
            });
        }
        if can_draw && graphics.is_none() {
            graphics = Some(i);
        }
        if can_present && present.is_none() {
            present = Some(i);
        }
    }
    Some(QueueFamilies {
        graphics: graphics?,
        present: present?,
    })
}

unsafe fn supports_swapchain(instance: &Instance, phys: vk::PhysicalDevice) -> bool {
    let exts = unsafe { instance.enumerate_device_extension_properties(phys) }.unwrap_or_default();
    exts.iter()
        .any(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) } == swapchain::NAME)
}

unsafe fn query_surface_support(
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Result<SurfaceSupport> {
    unsafe {
        Ok(SurfaceSupport {
            capabilities: surface_loader
                .get_physical_device_surface_capabilities(phys, surface)
                .context("get_physical_device_surface_capabilities")?,
            formats: surface_loader
                .get_physical_device_surface_formats(phys, surface)
                .context("get_physical_device_surface_formats")?,
            present_modes: surface_loader
                .get_physical_device_surface_present_modes(phys, surface)
                .context("get_physical_device_surface_present_modes")?,
        })
    }
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
    let candidates = unsafe { instance.enumerate_physical_devices() }
        .context("enumerate_physical_devices")?;
    for phys in candidates {
        let Some(families) = (unsafe { find_queue_families(instance, surface_loader, surface, phys) })
        else {
            continue;
        };
        if !unsafe { supports_swapchain(instance, phys) } {
            continue;
        }
        let adequate = unsafe { query_surface_support(surface_loader, surface, phys) }
            .map(|s| !s.formats.is_empty() && !s.present_modes.is_empty())
            .unwrap_or(false);
        if adequate {
            return Ok((phys, families));
        }
    }
    Err(anyhow!("no suitable physical device/queue family"))
}

impl DeviceContext {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        options: &DeviceOptions,
    ) -> Result<Self> {
        unsafe { Self::build(window, display, options) }
    }

    // STRICT ORDER:
    // 1) Create VkInstance (enables platform WSI + debug ext)
    // 2) Create VkSurfaceKHR FROM THIS INSTANCE
    // 3) Query physical devices/queues AGAINST THIS SURFACE (present support)
    // 4) Create VkDevice with one queue per distinct family
    unsafe fn build(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        options: &DeviceOptions,
    ) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let entry = Entry::linked();
        let validation = options.validation && {
            let available = unsafe { validation_available(&entry) };
            if !available {
                warn!("validation requested but VK_LAYER_KHRONOS_validation is not installed");
            }
            available
        };
        let app_name = CString::new(options.app_name.as_str()).context("application name")?;
        let instance = unsafe { create_instance(&entry, dh, &app_name, validation) }?;

        let debug = if validation {
            Some(unsafe { create_debug_messenger(&entry, &instance) }?)
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = unsafe { ash_window::create_surface(&entry, &instance, dh, wh, None) }
            .context("ash_window::create_surface")?;

        let (phys, families) = unsafe { pick_physical_device(&instance, &surface_loader, surface) }?;
        let properties = unsafe { instance.get_physical_device_properties(phys) };
        let supported = unsafe { instance.get_physical_device_features(phys) };

        let priorities = [1.0_f32];
        let mut unique = vec![families.graphics];
        if !families.is_shared() {
            unique.push(families.present);
        }
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique
            .iter()
            .map(|&family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        let features = vk::PhysicalDeviceFeatures {
            sampler_anisotropy: supported.sampler_anisotropy,
            ..Default::default()
        };
        let device_exts = [swapchain::NAME.as_ptr()];
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };
        let device = unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")?;
        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };

        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: families.graphics,
            flags: vk::CommandPoolCreateFlags::TRANSIENT
                | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            ..Default::default()
        };
        let command_pool =
            unsafe { device.create_command_pool(&pool_info, None) }.context("create_command_pool")?;

        let swapchain_loader = swapchain::Device::new(&instance, &device);

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        info!(
            "vk device: {} (graphics family {}, present family {}, validation={})",
            name.to_string_lossy(),
            families.graphics,
            families.present,
            validation
        );

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
            phys,
            properties,
            features,
            device,
            families,
            graphics_queue,
            present_queue,
            command_pool,
            swapchain_loader,
            present: options.present,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    pub fn enabled_features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn present_preference(&self) -> PresentPreference {
        self.present
    }

    pub fn surface_support(&self) -> Result<SurfaceSupport> {
        unsafe { query_surface_support(&self.surface_loader, self.surface, self.phys) }
    }

    pub fn find_memory_type(&self, type_bits: u32, required: vk::MemoryPropertyFlags) -> Result<u32> {
        let mem = unsafe { self.instance.get_physical_device_memory_properties(self.phys) };
        (0..mem.memory_type_count)
            .find(|&i| {
                (type_bits & (1 << i)) != 0
                    && mem.memory_types[i as usize].property_flags.contains(required)
            })
            .ok_or_else(|| anyhow!("no memory type with {required:?} in mask {type_bits:#x}"))
    }

    fn memory_type_flags(&self, index: u32) -> vk::MemoryPropertyFlags {
        let mem = unsafe { self.instance.get_physical_device_memory_properties(self.phys) };
        mem.memory_types[index as usize].property_flags
    }

    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|&fmt| {
                let props = unsafe {
                    self.instance
                        .get_physical_device_format_properties(self.phys, fmt)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    _ => props.optimal_tiling_features.contains(features),
                }
            })
            .ok_or_else(|| anyhow!("none of {candidates:?} supports {features:?}"))
    }

    /// Prefer 32f, then 24+S8, then 32f+S8, then 16.
    pub fn depth_format(&self) -> Result<vk::Format> {
        self.find_supported_format(
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D24_UNORM_S8_UINT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D16_UNORM,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
    }

    /// Creates a buffer and binds fresh memory to it. Also returns the
    /// property flags of the memory type actually chosen.
    pub(crate) fn allocate_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        props: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory, vk::MemoryPropertyFlags)> {
        let bci = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe {
            let buffer = self.device.create_buffer(&bci, None).context("create_buffer")?;
            let req = self.device.get_buffer_memory_requirements(buffer);
            let mem_type = match self.find_memory_type(req.memory_type_bits, props) {
                Ok(t) => t,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };
            let mai = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: mem_type,
                ..Default::default()
            };
            let memory = match self.device.allocate_memory(&mai, None) {
                Ok(m) => m,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(anyhow!("allocate_memory (buffer): {e:?}"));
                }
            };
            self.device
                .bind_buffer_memory(buffer, memory, 0)
                .context("bind_buffer_memory")?;
            Ok((buffer, memory, self.memory_type_flags(mem_type)))
        }
    }

    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        props: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let (buffer, memory, _) = self.allocate_buffer(size, usage, props)?;
        Ok((buffer, memory))
    }

    pub fn create_image_with_info(
        &self,
        info: &vk::ImageCreateInfo,
        props: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Image, vk::DeviceMemory)> {
        unsafe {
            let image = self.device.create_image(info, None).context("create_image")?;
            let req = self.device.get_image_memory_requirements(image);
            let mem_type = match self.find_memory_type(req.memory_type_bits, props) {
                Ok(t) => t,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    return Err(e);
                }
            };
            let alloc = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: mem_type,
                ..Default::default()
            };
            let memory = match self.device.allocate_memory(&alloc, None) {
                Ok(m) => m,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    return Err(anyhow!("allocate_memory (image): {e:?}"));
                }
            };
            self.device
                .bind_image_memory(image, memory, 0)
                .context("bind_image_memory")?;
            Ok((image, memory))
        }
    }

    pub fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView> {
        let view_ci = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        Ok(unsafe { self.device.create_image_view(&view_ci, None) }.context("create_image_view")?)
    }

    /// One-shot command buffer for uploads and layout transitions.
    pub fn begin_single_time_commands(&self) -> Result<vk::CommandBuffer> {
        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe {
            let cmd = self
                .device
                .allocate_command_buffers(&ai)
                .context("allocate_command_buffers (one-shot)")?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("driver returned no command buffer"))?;
            self.device
                .begin_command_buffer(cmd, &bi)
                .context("begin_command_buffer (one-shot)")?;
            Ok(cmd)
        }
    }

    /// Submits, waits for the graphics queue to drain, then frees `cmd`.
    pub fn end_single_time_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let si = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            ..Default::default()
        };
        unsafe {
            let result = self
                .device
                .end_command_buffer(cmd)
                .and_then(|_| {
                    self.device.queue_submit(
                        self.graphics_queue,
                        std::slice::from_ref(&si),
                        vk::Fence::null(),
                    )
                })
                .and_then(|_| self.device.queue_wait_idle(self.graphics_queue));
            self.device
                .free_command_buffers(self.command_pool, std::slice::from_ref(&cmd));
            result.context("one-shot submit")?;
        }
        Ok(())
    }

    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) -> Result<()> {
        let cmd = self.begin_single_time_commands()?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(cmd, src, dst, std::slice::from_ref(&region))
        };
        self.end_single_time_commands(cmd)
    }

    pub fn copy_buffer_to_image(
        &self,
        buffer: vk::Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
        layer_count: u32,
    ) -> Result<()> {
        let cmd = self.begin_single_time_commands()?;
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
            )
        };
        self.end_single_time_commands(cmd)
    }

    /// Handles the two transitions a sampled texture goes through.
    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> Result<()> {
        let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            _ => return Err(anyhow!("unsupported layout transition {old_layout:?} -> {new_layout:?}")),
        };

        let barrier = vk::ImageMemoryBarrier {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
            src_access_mask: src_access,
            dst_access_mask: dst_access,
            old_layout,
            new_layout,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };

        let cmd = self.begin_single_time_commands()?;
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            )
        };
        self.end_single_time_commands(cmd)
    }
}

impl GpuDevice for DeviceContext {
    type CommandBuffer = vk::CommandBuffer;
    type Surface = VkSwapchain;

    fn create_surface(
        device: &Arc<Self>,
        extent: RenderSize,
        previous: Option<&VkSwapchain>,
    ) -> RenderResult<VkSwapchain> {
        Ok(VkSwapchain::new(device.clone(), extent, previous)?)
    }

    fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle() }.context("device_wait_idle")?;
        Ok(())
    }

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        Ok(unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .context("allocate_command_buffers")?)
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        if !buffers.is_empty() {
            unsafe { self.device.free_command_buffers(self.command_pool, buffers) };
        }
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(cmd, &begin) }.context("begin_command_buffer")?;
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }.context("end_command_buffer")?;
        Ok(())
    }

    fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        surface: &VkSwapchain,
        image_index: u32,
        clear_color: [f32; 4],
    ) {
        let clears = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: surface.render_pass(),
            framebuffer: surface.framebuffer(image_index),
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: surface.vk_extent(),
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE)
        };
    }

    fn set_viewport_and_scissor(&self, cmd: vk::CommandBuffer, extent: RenderSize) {
        let vp = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let sc = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: extent.width,
                height: extent.height,
            },
        };
        unsafe {
            self.device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&vp));
            self.device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&sc));
        }
    }

    fn end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) };
    }
}
