//! Vulkan context management
//!
//! Instance, physical device selection and logical device creation. The
//! pieces other modules need are bundled into [`DeviceContext`], which is
//! cloned into every resource wrapper instead of handing out the context.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use thiserror::Error;

use crate::core::config::ApplicationConfig;
use crate::render::vulkan::swapchain::SwapchainSupport;
use crate::render::vulkan::window::{Window, WindowError};

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };
const ENGINE_NAME: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"Glacier\0") };

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A frame-loop call returned a result outside the handled set
    #[error("{operation} failed: {result:?}")]
    Call {
        /// Name of the failing operation
        operation: &'static str,
        /// Result code returned by the driver
        result: vk::Result,
    },

    /// The surface reports no formats or no present modes
    #[error("Surface unsupported: {0}")]
    SurfaceUnsupported(String),

    /// No physical device passed the suitability checks
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A frame was submitted without any recorded commands
    #[error("No command buffer was recorded for this frame")]
    MissingCommandBuffer,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Shader module could not be loaded or created
    #[error("Shader error: {0}")]
    Shader(String),

    /// Window system failure
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, optionally with validation layers
    pub fn new(window: &Window, config: &ApplicationConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name = CString::new(config.name.as_str())
            .map_err(|_| VulkanError::InitializationFailed("Application name contains a NUL byte".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(config.packed_version())
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window.required_instance_extensions()?;
        let mut cstr_extensions = required_extensions
            .into_iter()
            .map(|ext| {
                CString::new(ext)
                    .map_err(|_| VulkanError::InitializationFailed("Invalid extension name".to_string()))
            })
            .collect::<VulkanResult<Vec<CString>>>()?;

        let validation = config.validation_enabled() && Self::validation_layer_available(&entry);
        if config.validation_enabled() && !validation {
            log::warn!("Validation requested but {} is not installed", VALIDATION_LAYER.to_string_lossy());
        }
        if validation {
            cstr_extensions.push(DebugUtils::name().to_owned());
        }

        let extensions: Vec<*const std::os::raw::c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layers: Vec<*const std::os::raw::c_char> = if validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(VulkanError::Api)?;

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!("Created Vulkan instance (validation: {})", validation);

        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        entry
            .enumerate_instance_layer_properties()
            .map(|layers| {
                layers
                    .iter()
                    .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER)
            })
            .unwrap_or(false)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }.map_err(VulkanError::Api)
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if let Some(level) = severity_level(message_severity) {
        log::log!(level, "[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Log level for a validation message; INFO messages are dropped
fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Option<log::Level> {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Some(log::Level::Error)
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Some(log::Level::Warn)
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE) {
        Some(log::Level::Trace)
    } else {
        None
    }
}

/// Queue family indices used by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Family used for graphics submission
    pub graphics: u32,
    /// Family used for presentation
    pub present: u32,
}

impl QueueFamilies {
    /// Whether graphics and presentation share one family
    pub const fn is_unified(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.is_unified() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Pick the first graphics family and the first presenting family
    ///
    /// `supports_present` is queried per family index.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> VulkanResult<bool>,
    ) -> VulkanResult<Option<Self>> {
        let mut graphics = None;
        let mut present = None;

        for (index, family) in (0u32..).zip(families.iter()) {
            if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }
            if present.is_none() && supports_present(index)? {
                present = Some(index);
            }
            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        Ok(graphics.zip(present).map(|(graphics, present)| Self { graphics, present }))
    }
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue families used for rendering and presentation
    pub queue_families: QueueFamilies,
}

impl PhysicalDeviceInfo {
    /// Select the first device that can render to and present on `surface`
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;

        for device in devices {
            if let Some(info) = Self::evaluate_device(instance, device, surface, surface_loader)? {
                log::info!("Selected GPU: {}", info.name());
                return Ok(info);
            }
        }

        Err(VulkanError::NoSuitableDevice)
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families = QueueFamilies::find(&families, |index| {
            unsafe { surface_loader.get_physical_device_surface_support(device, index, surface) }
                .map_err(VulkanError::Api)
        })?;
        let Some(queue_families) = queue_families else {
            log::debug!("Skipping {}: missing graphics or present queue family", name);
            return Ok(None);
        };

        let extensions =
            unsafe { instance.enumerate_device_extension_properties(device) }.map_err(VulkanError::Api)?;
        if !has_extension(&extensions, SwapchainLoader::name()) {
            log::debug!("Skipping {}: no swapchain extension", name);
            return Ok(None);
        }

        let support = SwapchainSupport::query(surface_loader, device, surface)?;
        if !support.is_adequate() {
            log::debug!("Skipping {}: surface reports no formats or present modes", name);
            return Ok(None);
        }

        Ok(Some(Self {
            device,
            properties,
            queue_families,
        }))
    }

    /// Human-readable device name
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create a logical device with one queue per unique family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device.queue_families;
        let unique_families: HashSet<u32> = families.unique().into_iter().collect();

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device.device, &create_info, None) }
            .map_err(VulkanError::Api)?;

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Created logical device (graphics family {}, present family {})",
            families.graphics,
            families.present
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("device_wait_idle failed during device teardown: {:?}", e);
            }
            self.device.destroy_device(None);
        }
    }
}

/// Whether `wanted` is among the reported device extensions
fn has_extension(extensions: &[vk::ExtensionProperties], wanted: &CStr) -> bool {
    extensions.iter().any(|available| {
        let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
        name == wanted
    })
}

/// Narrow capability handle given to everything that creates GPU objects
///
/// Cloning is cheap: the function tables are shared and the handles are
/// plain integers. A `DeviceContext` must not outlive the [`VulkanContext`]
/// it came from.
#[derive(Clone)]
pub struct DeviceContext {
    device: Device,
    instance: Instance,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    swapchain_loader: SwapchainLoader,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilies,
}

impl DeviceContext {
    /// Logical device
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// Instance the device was created from
    pub const fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Physical device backing the logical device
    pub const fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Presentation surface
    pub const fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub const fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Swapchain extension loader
    pub const fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.swapchain_loader
    }

    /// Graphics queue
    pub const fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Presentation queue
    pub const fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Queue family indices
    pub const fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(|result| VulkanError::Call {
            operation: "device wait idle",
            result,
        })
    }

    /// Find a memory type index matching `type_filter` with all of `properties`
    pub fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        let memory_properties = unsafe { self.instance.get_physical_device_memory_properties(self.physical_device) };
        find_memory_type_index(&memory_properties, type_filter, properties)
    }
}

/// Find memory type with required properties
pub(crate) fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count as usize;
    (0u32..)
        .zip(memory_properties.memory_types.iter().take(count))
        .find(|(index, memory_type)| {
            type_filter & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(index, _)| index)
        .ok_or(VulkanError::NoSuitableMemoryType)
}

/// Owns the instance, surface and logical device
pub struct VulkanContext {
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    physical_device: PhysicalDeviceInfo,
    // Dropped by hand so the device goes before the surface.
    device: ManuallyDrop<LogicalDevice>,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create the instance, surface and device for `window`
    pub fn new(window: &Window, config: &ApplicationConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, config)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window.create_surface(instance.instance.handle())?;

        let physical_device = match PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader) {
            Ok(info) => info,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        let device = match LogicalDevice::new(&instance.instance, &physical_device) {
            Ok(device) => device,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        Ok(Self {
            surface,
            surface_loader,
            physical_device,
            device: ManuallyDrop::new(device),
            instance,
        })
    }

    /// Capability handle for resource constructors
    pub fn device_context(&self) -> DeviceContext {
        DeviceContext {
            device: self.device.device.clone(),
            instance: self.instance.instance.clone(),
            physical_device: self.physical_device.device,
            surface: self.surface,
            surface_loader: self.surface_loader.clone(),
            swapchain_loader: self.device.swapchain_loader.clone(),
            graphics_queue: self.device.graphics_queue,
            present_queue: self.device.present_queue,
            queue_families: self.physical_device.queue_families,
        }
    }

    /// Selected physical device
    pub const fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device.device_wait_idle() {
                log::warn!("device_wait_idle failed during context teardown: {:?}", e);
            }
            ManuallyDrop::drop(&mut self.device);
            // `instance` drops last, in field order.
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_unified_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let found = QueueFamilies::find(&families, |_| Ok(true)).unwrap().unwrap();
        assert_eq!(found, QueueFamilies { graphics: 0, present: 0 });
        assert!(found.is_unified());
        assert_eq!(found.unique(), vec![0]);
    }

    #[test]
    fn test_split_families() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let found = QueueFamilies::find(&families, |index| Ok(index == 1)).unwrap().unwrap();
        assert_eq!(found, QueueFamilies { graphics: 0, present: 1 });
        assert_eq!(found.unique(), vec![0, 1]);
    }

    #[test]
    fn test_missing_present_family() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(QueueFamilies::find(&families, |_| Ok(false)).unwrap().is_none());
    }

    #[test]
    fn test_present_query_error_propagates() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = QueueFamilies::find(&families, |_| Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR)));
        assert!(matches!(result, Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))));
    }

    #[test]
    fn test_find_memory_type_index() {
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        properties.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        properties.memory_types[2].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        assert_eq!(find_memory_type_index(&properties, 0b111, host).unwrap(), 2);
        assert_eq!(
            find_memory_type_index(&properties, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert!(matches!(
            find_memory_type_index(&properties, 0b011, host),
            Err(VulkanError::NoSuitableMemoryType)
        ));
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut properties = vk::ExtensionProperties::default();
        for (dst, &src) in properties.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as std::os::raw::c_char;
        }
        properties
    }

    #[test]
    fn test_swapchain_extension_lookup() {
        let debug = extension(DebugUtils::name());
        let swapchain = extension(SwapchainLoader::name());

        assert!(has_extension(&[debug, swapchain], SwapchainLoader::name()));
        assert!(!has_extension(&[debug], SwapchainLoader::name()));
        assert!(!has_extension(&[], SwapchainLoader::name()));
    }

    #[test]
    fn test_severity_mapping() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;
        assert_eq!(severity_level(Severity::ERROR), Some(log::Level::Error));
        assert_eq!(severity_level(Severity::WARNING), Some(log::Level::Warn));
        assert_eq!(severity_level(Severity::VERBOSE), Some(log::Level::Trace));
        assert_eq!(severity_level(Severity::INFO), None);
    }
}
