/// HeadlessContext - instance and logical device without a surface
///
/// Used by GPU integration tests. Every object created through the device
/// must be dropped before the context.

use std::sync::Arc;
use ash::vk;
use ember_renderer::ember::{Error, Result, RendererConfig};
use ember_renderer::ember::device::GraphicsDevice;
use ember_renderer::{engine_error, engine_info};

use crate::vulkan_device::VulkanDevice;
use crate::vulkan_format::vk_error;

pub struct HeadlessContext {
    _entry: ash::Entry,
    instance: ash::Instance,
    device: ash::Device,
    graphics: Arc<VulkanDevice>,
}

impl HeadlessContext {
    pub fn new(config: &RendererConfig) -> Result<Self> {
        config.validate()?;

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("ember::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_info = vk::ApplicationInfo::default()
                .application_name(c"Ember Headless")
                .application_version(vk::make_api_version(0, 0, 1, 0))
                .engine_name(c"Ember")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_0);
            let instance_info = vk::InstanceCreateInfo::default().application_info(&app_info);
            let instance = entry.create_instance(&instance_info, None).map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            match Self::create_device(&instance, config) {
                Ok((device, physical_device, queue_family, anisotropy)) => {
                    let graphics = Arc::new(VulkanDevice::new(
                        &instance,
                        &device,
                        physical_device,
                        queue_family,
                        anisotropy,
                    ));
                    engine_info!("ember::vulkan", "Headless context ready (queue family {})", queue_family);
                    Ok(Self { _entry: entry, instance, device, graphics })
                }
                Err(e) => {
                    instance.destroy_instance(None);
                    Err(e)
                }
            }
        }
    }

    /// First physical device with a graphics queue
    unsafe fn create_device(
        instance: &ash::Instance,
        config: &RendererConfig,
    ) -> Result<(ash::Device, vk::PhysicalDevice, u32, bool)> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| vk_error("vkEnumeratePhysicalDevices", e))?;

        let (physical_device, queue_family) = physical_devices
            .into_iter()
            .find_map(|physical_device| {
                instance
                    .get_physical_device_queue_family_properties(physical_device)
                    .iter()
                    .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    .map(|index| (physical_device, index as u32))
            })
            .ok_or_else(|| {
                engine_error!("ember::vulkan", "No Vulkan device with a graphics queue found");
                Error::InitializationFailed("No Vulkan device with a graphics queue found".to_string())
            })?;

        let supported = instance.get_physical_device_features(physical_device);
        let anisotropy = config.enable_anisotropy && supported.sampler_anisotropy == vk::TRUE;

        let priorities = [1.0];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities);
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy);
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_info))
            .enabled_features(&features);

        let device = instance
            .create_device(physical_device, &device_info, None)
            .map_err(|e| {
                engine_error!("ember::vulkan", "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })?;
        Ok((device, physical_device, queue_family, anisotropy))
    }

    pub fn device(&self) -> Arc<dyn GraphicsDevice> {
        self.graphics.clone()
    }

    pub fn vulkan_device(&self) -> &VulkanDevice {
        &self.graphics
    }
}

impl Drop for HeadlessContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
