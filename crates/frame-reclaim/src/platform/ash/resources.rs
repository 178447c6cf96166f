use crate::impl_deferred_resources;
use crate::platform::ash::{Ash, AshAllocationError};
use ash::prelude::VkResult;
use ash::vk::{ImageCreateInfo, ImageViewCreateInfo, PipelineLayoutCreateInfo, SamplerCreateInfo};
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use std::fmt::{Debug, Formatter};

fn free_allocation(ash: &Ash, allocation: Option<Allocation>) {
	if let Some(allocation) = allocation {
		if let Err(e) = ash.memory_allocator().free(allocation) {
			log::error!("failed to free gpu-allocator allocation: {}", e);
		}
	}
}

pub struct AshBuffer {
	ash: Ash,
	pub buffer: ash::vk::Buffer,
	pub allocation: Option<Allocation>,
}

impl AshBuffer {
	/// Take ownership of a buffer and its memory.
	///
	/// # Safety
	/// `buffer` must have been created on the device of `ash` and `allocation` must be allocated by its allocator.
	pub unsafe fn from_raw(ash: &Ash, buffer: ash::vk::Buffer, allocation: Option<Allocation>) -> Self {
		Self {
			ash: ash.clone(),
			buffer,
			allocation,
		}
	}
}

impl Debug for AshBuffer {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AshBuffer").field("buffer", &self.buffer).finish()
	}
}

impl Drop for AshBuffer {
	fn drop(&mut self) {
		free_allocation(&self.ash, self.allocation.take());
		unsafe { self.ash.device.destroy_buffer(self.buffer, None) };
	}
}

pub struct AshImage {
	ash: Ash,
	pub image: ash::vk::Image,
	pub allocation: Option<Allocation>,
}

impl AshImage {
	/// Take ownership of an image and its memory.
	///
	/// # Safety
	/// `image` must have been created on the device of `ash` and `allocation` must be allocated by its allocator.
	pub unsafe fn from_raw(ash: &Ash, image: ash::vk::Image, allocation: Option<Allocation>) -> Self {
		Self {
			ash: ash.clone(),
			image,
			allocation,
		}
	}
}

impl Debug for AshImage {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AshImage").field("image", &self.image).finish()
	}
}

impl Drop for AshImage {
	fn drop(&mut self) {
		free_allocation(&self.ash, self.allocation.take());
		unsafe { self.ash.device.destroy_image(self.image, None) };
	}
}

macro_rules! ash_handle_resource {
	($($name:ident($handle:ty) => $destroy:ident),* $(,)?) => {
		$(
			pub struct $name {
				ash: Ash,
				handle: $handle,
			}

			impl $name {
				/// Take ownership of a vulkan handle, it is destroyed when this is dropped.
				///
				/// # Safety
				/// `handle` must have been created on the device of `ash` and not be destroyed by anything else.
				pub unsafe fn from_raw(ash: &Ash, handle: $handle) -> Self {
					Self {
						ash: ash.clone(),
						handle,
					}
				}

				#[inline]
				pub fn handle(&self) -> $handle {
					self.handle
				}
			}

			impl Debug for $name {
				fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
					f.debug_tuple(stringify!($name)).field(&self.handle).finish()
				}
			}

			impl Drop for $name {
				fn drop(&mut self) {
					unsafe { self.ash.device.$destroy(self.handle, None) };
				}
			}
		)*
	};
}

ash_handle_resource!(
	AshImageView(ash::vk::ImageView) => destroy_image_view,
	AshSampler(ash::vk::Sampler) => destroy_sampler,
	AshPipeline(ash::vk::Pipeline) => destroy_pipeline,
	AshPipelineLayout(ash::vk::PipelineLayout) => destroy_pipeline_layout,
);

impl_deferred_resources!(Ash {
	AshBuffer => buffers,
	AshImage => images,
	AshImageView => image_views,
	AshSampler => samplers,
	AshPipeline => pipelines,
	AshPipelineLayout => pipeline_layouts,
});

impl Ash {
	pub fn create_image(
		&self,
		create_info: &ImageCreateInfo,
		name: &str,
		location: MemoryLocation,
	) -> Result<AshImage, AshAllocationError> {
		unsafe {
			let image = self.device.create_image(create_info, None)?;
			let mut image = AshImage::from_raw(self, image, None);
			self.set_debug_object_name(image.image, name)?;
			let requirements = self.device.get_image_memory_requirements(image.image);
			let allocation = self.memory_allocator().allocate(&AllocationCreateDesc {
				requirements,
				name,
				location,
				allocation_scheme: AllocationScheme::GpuAllocatorManaged,
				linear: create_info.tiling == ash::vk::ImageTiling::LINEAR,
			})?;
			let allocation = image.allocation.insert(allocation);
			self.device
				.bind_image_memory(image.image, allocation.memory(), allocation.offset())?;
			Ok(image)
		}
	}

	pub fn create_image_view(&self, create_info: &ImageViewCreateInfo, name: &str) -> VkResult<AshImageView> {
		unsafe {
			let image_view = AshImageView::from_raw(self, self.device.create_image_view(create_info, None)?);
			self.set_debug_object_name(image_view.handle(), name)?;
			Ok(image_view)
		}
	}

	pub fn create_sampler(&self, create_info: &SamplerCreateInfo, name: &str) -> VkResult<AshSampler> {
		unsafe {
			let sampler = AshSampler::from_raw(self, self.device.create_sampler(create_info, None)?);
			self.set_debug_object_name(sampler.handle(), name)?;
			Ok(sampler)
		}
	}

	pub fn create_pipeline_layout(
		&self,
		create_info: &PipelineLayoutCreateInfo,
		name: &str,
	) -> VkResult<AshPipelineLayout> {
		unsafe {
			let layout = AshPipelineLayout::from_raw(self, self.device.create_pipeline_layout(create_info, None)?);
			self.set_debug_object_name(layout.handle(), name)?;
			Ok(layout)
		}
	}
}
