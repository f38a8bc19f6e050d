//! Swapchain management
//!
//! [`Swapchain`] is built and torn down as one unit: the image chain, one
//! view per image, the presentation render pass and one framebuffer per view.
//! The selection rules that decide its shape are free functions over plain
//! Vulkan value types so they can be checked without a device.

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device};

use crate::render::vulkan::{
    DeviceContext, Framebuffer, FramebufferHandle, ImageHandle, ImageViewHandle, QueueFamilies, RenderPass,
    RenderPassHandle, SwapchainHandle, VulkanError, VulkanResult,
};

/// What a surface supports on a given physical device
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    /// Image count and extent limits, current extent and transforms
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Query the surface capabilities for `physical_device`
    pub fn query(
        surface_loader: &Surface,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(physical_device, surface)
                    .map_err(VulkanError::Api)?,
                formats: surface_loader
                    .get_physical_device_surface_formats(physical_device, surface)
                    .map_err(VulkanError::Api)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)
                    .map_err(VulkanError::Api)?,
            })
        }
    }

    /// At least one format and one present mode are reported
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Prefer 8-bit BGRA sRGB in the nonlinear sRGB color space, else the first format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

/// Pick a present mode for the vsync preference
///
/// Without vsync IMMEDIATE is preferred, with vsync MAILBOX. FIFO is the
/// fallback in both cases since every implementation must support it.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    let preferred = if vsync {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::IMMEDIATE
    };

    if present_modes.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Use the surface's current extent unless it is the `u32::MAX` sentinel
///
/// In that case the drawable size in physical pixels is used, clamped to the
/// surface's supported range.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, drawable_size: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = drawable_size;
    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width.max(capabilities.min_image_extent.width),
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height.max(capabilities.min_image_extent.height),
        ),
    }
}

/// One more than the minimum, capped by a nonzero maximum
pub const fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && desired > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        desired
    }
}

/// Concurrent sharing across both families when they differ, exclusive otherwise
pub fn choose_sharing_mode(families: QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.is_unified() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, families.unique())
    }
}

/// The resolved shape of a swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainSettings {
    /// Image format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image size in pixels
    pub extent: vk::Extent2D,
    /// Requested number of images
    pub image_count: u32,
}

impl SwapchainSettings {
    /// Apply the selection rules to a support query
    pub fn select(support: &SwapchainSupport, drawable_size: (u32, u32), vsync: bool) -> VulkanResult<Self> {
        if support.present_modes.is_empty() {
            return Err(VulkanError::SurfaceUnsupported("no present modes reported".to_string()));
        }
        let surface_format = choose_surface_format(&support.formats)
            .ok_or_else(|| VulkanError::SurfaceUnsupported("no surface formats reported".to_string()))?;

        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(&support.present_modes, vsync),
            extent: choose_extent(&support.capabilities, drawable_size),
            image_count: choose_image_count(&support.capabilities),
        })
    }
}

/// Raw swapchain object; destroyed after everything built on top of it
struct SwapchainObject {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
}

impl Drop for SwapchainObject {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Image view wrapper with RAII cleanup
struct ImageView {
    device: Device,
    view: vk::ImageView,
}

impl ImageView {
    fn new(context: &DeviceContext, image: vk::Image, format: vk::Format) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { context.device().create_image_view(&create_info, None) }.map_err(VulkanError::Api)?;

        Ok(Self {
            device: context.device().clone(),
            view,
        })
    }

    const fn handle(&self) -> ImageViewHandle {
        ImageViewHandle::new(self.view)
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

/// The presentable image chain and every render target derived from it
///
/// Dropping waits for the device to go idle, then frees framebuffers, image
/// views, the render pass and the swapchain, in that order. A half-built
/// swapchain frees whatever it had created, since every piece is owned.
pub struct Swapchain {
    // Field order is destruction order.
    framebuffers: Vec<Framebuffer>,
    image_views: Vec<ImageView>,
    render_pass: RenderPass,
    chain: SwapchainObject,
    device: Device,
    images: Vec<ImageHandle>,
    settings: SwapchainSettings,
}

impl Swapchain {
    /// Build a swapchain for the current surface state
    ///
    /// `old` is handed to the driver as `oldSwapchain` so resources can be
    /// reused; it stays valid until the caller drops it.
    pub fn new(
        context: &DeviceContext,
        drawable_size: (u32, u32),
        vsync: bool,
        old: Option<&Self>,
    ) -> VulkanResult<Self> {
        let support =
            SwapchainSupport::query(context.surface_loader(), context.physical_device(), context.surface())?;
        let settings = SwapchainSettings::select(&support, drawable_size, vsync)?;
        let (sharing_mode, queue_family_indices) = choose_sharing_mode(context.queue_families());

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface())
            .min_image_count(settings.image_count)
            .image_format(settings.surface_format.format)
            .image_color_space(settings.surface_format.color_space)
            .image_extent(settings.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(settings.present_mode)
            .clipped(true)
            .old_swapchain(old.map_or_else(vk::SwapchainKHR::null, |old| old.chain.swapchain));

        let loader = context.swapchain_loader().clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }.map_err(VulkanError::Api)?;
        let chain = SwapchainObject { loader, swapchain };

        let raw_images = unsafe { chain.loader.get_swapchain_images(chain.swapchain) }.map_err(VulkanError::Api)?;

        let image_views = raw_images
            .iter()
            .map(|&image| ImageView::new(context, image, settings.surface_format.format))
            .collect::<VulkanResult<Vec<_>>>()?;

        let render_pass = RenderPass::new_presentation_pass(context, settings.surface_format.format)?;

        let framebuffers = image_views
            .iter()
            .map(|view| Framebuffer::new(context, render_pass.handle(), &[view.handle()], settings.extent))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!(
            "Created swapchain: {}x{}, {:?}/{:?}, {:?}, {} images",
            settings.extent.width,
            settings.extent.height,
            settings.surface_format.format,
            settings.surface_format.color_space,
            settings.present_mode,
            raw_images.len()
        );

        Ok(Self {
            framebuffers,
            image_views,
            render_pass,
            chain,
            device: context.device().clone(),
            images: raw_images.into_iter().map(ImageHandle::new).collect(),
            settings,
        })
    }

    /// Swapchain handle
    pub const fn handle(&self) -> SwapchainHandle {
        SwapchainHandle::new(self.chain.swapchain)
    }

    /// Resolved format, present mode, extent and requested image count
    pub const fn settings(&self) -> &SwapchainSettings {
        &self.settings
    }

    /// Chosen surface format
    pub const fn format(&self) -> vk::SurfaceFormatKHR {
        self.settings.surface_format
    }

    /// Chosen image extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.settings.extent
    }

    /// Chosen presentation mode
    pub const fn present_mode(&self) -> vk::PresentModeKHR {
        self.settings.present_mode
    }

    /// Number of images the driver actually created
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Presentable images, indexed by acquired image index
    pub fn images(&self) -> &[ImageHandle] {
        &self.images
    }

    /// View for image `index`
    pub fn image_view(&self, index: usize) -> Option<ImageViewHandle> {
        self.image_views.get(index).map(ImageView::handle)
    }

    /// The presentation render pass
    pub const fn render_pass(&self) -> RenderPassHandle {
        self.render_pass.handle()
    }

    /// Framebuffer for image `index`
    pub fn framebuffer(&self, index: usize) -> Option<FramebufferHandle> {
        self.framebuffers.get(index).map(Framebuffer::handle)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            log::warn!("device_wait_idle failed before swapchain teardown: {:?}", e);
        }
        log::debug!(
            "Destroying swapchain ({}x{})",
            self.settings.extent.width,
            self.settings.extent.height
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: 800, height: 600 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    fn srgb() -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn unorm() -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn test_unbounded_max_selects_min_plus_one() {
        assert_eq!(choose_image_count(&capabilities(2, 0)), 3);
    }

    #[test]
    fn test_image_count_clamped_to_max() {
        assert_eq!(choose_image_count(&capabilities(2, 2)), 2);
        assert_eq!(choose_image_count(&capabilities(2, 8)), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3)), 3);
    }

    #[test]
    fn test_vsync_with_only_fifo_selects_fifo() {
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_present_mode_preferences() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&all, true), vk::PresentModeKHR::MAILBOX);
        assert_eq!(choose_present_mode(&all, false), vk::PresentModeKHR::IMMEDIATE);

        let no_immediate = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&no_immediate, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_format_prefers_srgb() {
        assert_eq!(choose_surface_format(&[unorm(), srgb()]), Some(srgb()));
        assert_eq!(choose_surface_format(&[unorm()]), Some(unorm()));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_srgb_format_needs_matching_color_space() {
        let wrong_space = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        assert_eq!(choose_surface_format(&[unorm(), wrong_space]), Some(unorm()));
    }

    #[test]
    fn test_extent_uses_current_extent() {
        let caps = capabilities(2, 0);
        assert_eq!(choose_extent(&caps, (1920, 1080)), vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn test_extent_falls_back_to_drawable_size() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert_eq!(choose_extent(&caps, (1280, 720)), vk::Extent2D { width: 1280, height: 720 });
        assert_eq!(choose_extent(&caps, (8000, 720)), vk::Extent2D { width: 4096, height: 720 });
    }

    #[test]
    fn test_sharing_mode() {
        let (mode, indices) = choose_sharing_mode(QueueFamilies { graphics: 0, present: 0 });
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());

        let (mode, indices) = choose_sharing_mode(QueueFamilies { graphics: 0, present: 2 });
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_select_rejects_empty_support() {
        let mut support = SwapchainSupport {
            capabilities: capabilities(2, 0),
            formats: vec![srgb()],
            present_modes: Vec::new(),
        };
        assert!(!support.is_adequate());
        assert!(matches!(
            SwapchainSettings::select(&support, (800, 600), true),
            Err(VulkanError::SurfaceUnsupported(_))
        ));

        support.present_modes.push(vk::PresentModeKHR::FIFO);
        support.formats.clear();
        assert!(matches!(
            SwapchainSettings::select(&support, (800, 600), true),
            Err(VulkanError::SurfaceUnsupported(_))
        ));
    }

    #[test]
    fn test_select_combines_rules() {
        let support = SwapchainSupport {
            capabilities: capabilities(2, 0),
            formats: vec![unorm(), srgb()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let settings = SwapchainSettings::select(&support, (800, 600), true).unwrap();
        assert_eq!(settings.surface_format, srgb());
        assert_eq!(settings.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(settings.extent, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(settings.image_count, 3);
    }
}
