mod convert;
pub mod init;
mod resources;

pub use convert::*;
pub use resources::*;

use crate::platform::{BufferCreateInfo, ReclaimPlatform};
use ash::ext::debug_utils;
use ash::prelude::VkResult;
use ash::vk::{DebugUtilsObjectNameInfoEXT, Handle, SharingMode};
use gpu_allocator::AllocationError;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator};
use parking_lot::lock_api::MutexGuard;
use parking_lot::{Mutex, RawMutex};
use static_assertions::assert_impl_all;
use std::ffi::CString;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;
use thiserror::Error;

/// The vulkan platform. Cheap to clone, every resource created from it keeps the device alive.
#[derive(Clone)]
pub struct Ash(Arc<AshCreateInfo>);
assert_impl_all!(Ash: Send, Sync);

impl Ash {
	pub fn new(create_info: AshCreateInfo) -> Self {
		Self(Arc::new(create_info))
	}

	pub unsafe fn set_debug_object_name(&self, handle: impl Handle, name: &str) -> VkResult<()> {
		unsafe {
			if let Some(debug_marker) = self.debug_utils.as_ref() {
				// names with interior nul bytes stay unnamed
				if let Ok(name) = CString::new(name) {
					debug_marker.set_debug_utils_object_name(
						&DebugUtilsObjectNameInfoEXT::default()
							.object_handle(handle)
							.object_name(&name),
					)?;
				}
			}
			Ok(())
		}
	}
}

impl Deref for Ash {
	type Target = AshCreateInfo;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

pub struct AshCreateInfo {
	pub entry: ash::Entry,
	pub instance: ash::Instance,
	pub physical_device: ash::vk::PhysicalDevice,
	pub device: ash::Device,
	pub memory_allocator: Option<Mutex<Allocator>>,
	pub queue_family_index: u32,
	pub queue: Mutex<ash::vk::Queue>,
	pub debug_utils: Option<debug_utils::Device>,
	pub destroy: Option<AshDestroyFn>,
}

pub type AshDestroyFn = Box<dyn FnOnce(&mut AshCreateInfo) + Send + Sync>;

impl AshCreateInfo {
	pub fn memory_allocator(&self) -> MutexGuard<'_, RawMutex, Allocator> {
		self.memory_allocator
			.as_ref()
			.expect("memory allocator is only taken on destruction")
			.lock()
	}
}

impl Drop for AshCreateInfo {
	fn drop(&mut self) {
		if let Some(destroy) = self.destroy.take() {
			destroy(self);
		}
	}
}

#[derive(Error)]
pub enum AshAllocationError {
	#[error("VkResult: {0}")]
	Vk(#[from] ash::vk::Result),
	#[error("gpu-allocator Error: {0}")]
	Allocation(#[from] AllocationError),
	#[error("Buffer memory is not host visible and can not be mapped")]
	NotHostVisible,
}

impl core::fmt::Debug for AshAllocationError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}

unsafe impl ReclaimPlatform for Ash {
	type Buffer = AshBuffer;
	type BufferHandle = ash::vk::Buffer;
	type Image = AshImage;
	type ImageView = AshImageView;
	type Sampler = AshSampler;
	type Pipeline = AshPipeline;
	type PipelineLayout = AshPipelineLayout;
	type AllocationError = AshAllocationError;

	fn alloc_buffer(&self, create_info: &BufferCreateInfo, size: u64) -> Result<Self::Buffer, Self::AllocationError> {
		unsafe {
			let buffer = self.device.create_buffer(
				&ash::vk::BufferCreateInfo::default()
					.usage(create_info.usage.to_ash_buffer_usage_flags())
					.size(size)
					.sharing_mode(SharingMode::EXCLUSIVE),
				None,
			)?;
			// from here on, dropping the AshBuffer on error destroys the vk buffer
			let mut buffer = AshBuffer::from_raw(self, buffer, None);
			self.set_debug_object_name(buffer.buffer, create_info.name)?;
			let requirements = self.device.get_buffer_memory_requirements(buffer.buffer);
			let allocation = self.memory_allocator().allocate(&AllocationCreateDesc {
				requirements,
				name: create_info.name,
				location: create_info.usage.to_gpu_allocator_memory_location(),
				allocation_scheme: AllocationScheme::GpuAllocatorManaged,
				linear: true,
			})?;
			let allocation = buffer.allocation.insert(allocation);
			self.device
				.bind_buffer_memory(buffer.buffer, allocation.memory(), allocation.offset())?;
			Ok(buffer)
		}
	}

	#[inline]
	fn buffer_handle(buffer: &Self::Buffer) -> Self::BufferHandle {
		buffer.buffer
	}

	/// Host visible memory allocated by gpu-allocator is persistently mapped, so this just returns its pointer.
	unsafe fn map_buffer(&self, buffer: &mut Self::Buffer) -> Result<NonNull<u8>, Self::AllocationError> {
		buffer
			.allocation
			.as_ref()
			.and_then(|allocation| allocation.mapped_ptr())
			.map(NonNull::cast::<u8>)
			.ok_or(AshAllocationError::NotHostVisible)
	}

	/// `CpuToGpu` memory is host coherent and stays mapped until it is freed.
	unsafe fn unmap_buffer(&self, _buffer: &mut Self::Buffer) {}
}
