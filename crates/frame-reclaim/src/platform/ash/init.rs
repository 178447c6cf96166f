use crate::platform::ash::AshCreateInfo;
use anyhow::anyhow;
use ash::Entry;
use ash::ext::debug_utils;
use ash::vk::{
	ApplicationInfo, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
	DebugUtilsMessengerCallbackDataEXT, DebugUtilsMessengerCreateInfoEXT, DeviceCreateInfo, DeviceQueueCreateInfo,
	InstanceCreateInfo, PhysicalDeviceType, QueueFlags,
};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationSizes, AllocatorDebugSettings};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::ffi::{CStr, c_void};

pub const LAYER_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct AppConfig<'a> {
	pub name: &'a CStr,
	pub version: u32,
}

impl Default for AppConfig<'_> {
	fn default() -> Self {
		Self {
			name: c"Unknown App",
			version: 0,
		}
	}
}

#[derive(Default)]
pub struct AshInitCreateInfo<'a> {
	pub app: AppConfig<'a>,
	/// Enables the khronos validation layer, which must be installed.
	pub validation: bool,
	pub instance_extensions: &'a [&'a CStr],
	pub extensions: &'a [&'a CStr],
	pub debug_callback: Option<&'a DebugUtilsMessengerCreateInfoEXT<'a>>,
}

/// Creates an [`AshCreateInfo`] with any GPU (preferring dedicated) and a single graphics queue. Enough to allocate and
/// retire resources, in small demos or tests.
///
/// If any of the steps were to fail during initialization, this method currently does not clean up after itself
/// correctly. It will only destroy itself correctly if the entire initialization succeeds.
pub fn ash_init(create_info: AshInitCreateInfo) -> anyhow::Result<AshCreateInfo> {
	unsafe {
		let entry = Entry::load()?;

		let instance = {
			let mut layers = SmallVec::<[_; 1]>::new();
			if create_info.validation {
				layers.push(LAYER_VALIDATION.as_ptr());
			}

			let extensions = create_info
				.instance_extensions
				.iter()
				.copied()
				.chain([debug_utils::NAME])
				.map(|c| c.as_ptr())
				.collect::<SmallVec<[_; 3]>>();

			entry.create_instance(
				&InstanceCreateInfo::default()
					.application_info(
						&ApplicationInfo::default()
							.application_name(create_info.app.name)
							.application_version(create_info.app.version)
							.engine_name(c"frame-reclaim")
							.engine_version(1)
							.api_version(ash::vk::make_api_version(0, 1, 2, 0)),
					)
					.enabled_extension_names(&extensions)
					.enabled_layer_names(&layers),
				None,
			)?
		};

		let debug_instance = debug_utils::Instance::new(&entry, &instance);
		let debug_messager = {
			let default_callback = DebugUtilsMessengerCreateInfoEXT::default()
				.message_severity(
					DebugUtilsMessageSeverityFlagsEXT::ERROR
						| DebugUtilsMessageSeverityFlagsEXT::WARNING
						| DebugUtilsMessageSeverityFlagsEXT::INFO,
				)
				.message_type(
					DebugUtilsMessageTypeFlagsEXT::GENERAL
						| DebugUtilsMessageTypeFlagsEXT::VALIDATION
						| DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
				)
				.pfn_user_callback(Some(default_debug_callback));
			debug_instance
				.create_debug_utils_messenger(create_info.debug_callback.unwrap_or(&default_callback), None)?
		};

		let physical_device = {
			instance
				.enumerate_physical_devices()?
				.into_iter()
				.min_by_key(|phy| match instance.get_physical_device_properties(*phy).device_type {
					PhysicalDeviceType::DISCRETE_GPU => 1,
					PhysicalDeviceType::VIRTUAL_GPU => 2,
					PhysicalDeviceType::INTEGRATED_GPU => 3,
					PhysicalDeviceType::CPU => 4,
					_ => 5,
				})
				.ok_or(anyhow!("No physical devices available"))?
		};

		let queue_family_index = {
			instance
				.get_physical_device_queue_family_properties(physical_device)
				.into_iter()
				.enumerate()
				.find(|(_, prop)| prop.queue_flags.contains(QueueFlags::GRAPHICS))
				.ok_or(anyhow!("No graphics queues on physical device available"))?
				.0 as u32
		};

		let device = {
			let extensions = create_info.extensions.iter().map(|x| x.as_ptr()).collect::<Vec<_>>();
			instance.create_device(
				physical_device,
				&DeviceCreateInfo::default()
					.enabled_extension_names(&extensions)
					.queue_create_infos(&[DeviceQueueCreateInfo::default()
						.queue_family_index(queue_family_index)
						.queue_priorities(&[1.])]),
				None,
			)?
		};

		let queue = device.get_device_queue(queue_family_index, 0);
		let memory_allocator = Allocator::new(&AllocatorCreateDesc {
			instance: instance.clone(),
			device: device.clone(),
			physical_device,
			debug_settings: AllocatorDebugSettings::default(),
			buffer_device_address: false,
			allocation_sizes: AllocationSizes::default(),
		})?;

		let debug_utils = Some(debug_utils::Device::new(&instance, &device));

		Ok(AshCreateInfo {
			entry,
			instance,
			physical_device,
			device,
			queue_family_index,
			queue: Mutex::new(queue),
			memory_allocator: Some(Mutex::new(memory_allocator)),
			debug_utils,
			destroy: Some(Box::new(move |create_info| {
				let instance = &create_info.instance;
				let device = &create_info.device;

				create_info.debug_utils = None;
				drop(create_info.memory_allocator.take());
				device.destroy_device(None);
				debug_instance.destroy_debug_utils_messenger(debug_messager, None);
				instance.destroy_instance(None);
			})),
		})
	}
}

unsafe extern "system" fn default_debug_callback(
	message_severity: DebugUtilsMessageSeverityFlagsEXT,
	message_type: DebugUtilsMessageTypeFlagsEXT,
	callback_data: *const DebugUtilsMessengerCallbackDataEXT<'_>,
	_p_user_data: *mut c_void,
) -> Bool32 {
	unsafe {
		let callback_data = *callback_data;
		let message_id_number = callback_data.message_id_number;
		let message_id_name = callback_data
			.message_id_name_as_c_str()
			.map_or(Cow::Borrowed(""), CStr::to_string_lossy);
		let message = callback_data
			.message_as_c_str()
			.map_or(Cow::Borrowed("No message"), CStr::to_string_lossy);

		let level = if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
			log::Level::Error
		} else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
			log::Level::Warn
		} else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::INFO) {
			log::Level::Info
		} else {
			log::Level::Debug
		};
		log::log!(
			level,
			"{message_type:?} [{message_id_name} ({message_id_number:#x})]: {message}"
		);

		false.into()
	}
}
