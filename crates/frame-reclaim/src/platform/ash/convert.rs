use crate::platform::BufferUsage;
use ash::vk::BufferUsageFlags;
use gpu_allocator::MemoryLocation;

impl BufferUsage {
	pub fn to_ash_buffer_usage_flags(&self) -> BufferUsageFlags {
		let mut out = BufferUsageFlags::empty();
		for (usage, flags) in [
			(BufferUsage::TRANSFER_SRC, BufferUsageFlags::TRANSFER_SRC),
			(BufferUsage::TRANSFER_DST, BufferUsageFlags::TRANSFER_DST),
			(BufferUsage::UNIFORM_BUFFER, BufferUsageFlags::UNIFORM_BUFFER),
			(BufferUsage::STORAGE_BUFFER, BufferUsageFlags::STORAGE_BUFFER),
			(BufferUsage::INDEX_BUFFER, BufferUsageFlags::INDEX_BUFFER),
			(BufferUsage::VERTEX_BUFFER, BufferUsageFlags::VERTEX_BUFFER),
			(BufferUsage::INDIRECT_BUFFER, BufferUsageFlags::INDIRECT_BUFFER),
		] {
			if self.contains(usage) {
				out |= flags;
			}
		}
		// empty flags are invalid in vulkan, reachable by a buffer that is only host mappable
		if out.is_empty() {
			BufferUsageFlags::TRANSFER_SRC
		} else {
			out
		}
	}

	pub fn to_gpu_allocator_memory_location(&self) -> MemoryLocation {
		if self.contains(BufferUsage::MAP_WRITE) {
			MemoryLocation::CpuToGpu
		} else if self.contains(BufferUsage::MAP_READ) {
			MemoryLocation::GpuToCpu
		} else {
			MemoryLocation::GpuOnly
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	/// [`BufferUsage`] bits that exist in vulkan equal ash's [`BufferUsageFlags`]
	#[test]
	fn test_buffer_usage_to_ash_same_bits() {
		for usage in [
			BufferUsage::TRANSFER_SRC,
			BufferUsage::TRANSFER_DST,
			BufferUsage::UNIFORM_BUFFER,
			BufferUsage::STORAGE_BUFFER,
			BufferUsage::INDEX_BUFFER,
			BufferUsage::VERTEX_BUFFER,
			BufferUsage::INDIRECT_BUFFER,
		] {
			assert_eq!(
				Some(usage),
				BufferUsage::from_bits(usage.to_ash_buffer_usage_flags().as_raw() as u64)
			)
		}
	}

	#[test]
	fn test_staging_is_host_visible() {
		assert_eq!(
			BufferUsage::STAGING.to_ash_buffer_usage_flags(),
			BufferUsageFlags::TRANSFER_SRC
		);
		assert_eq!(
			BufferUsage::STAGING.to_gpu_allocator_memory_location(),
			MemoryLocation::CpuToGpu
		);
		assert_eq!(
			BufferUsage::MAP_WRITE.to_ash_buffer_usage_flags(),
			BufferUsageFlags::TRANSFER_SRC
		);
	}
}
