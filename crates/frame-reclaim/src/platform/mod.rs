#[cfg(feature = "ash")]
pub mod ash;
pub mod headless;

use crate::deleter::DeferredResource;
use std::error::Error;
use std::fmt::Debug;
use std::ptr::NonNull;

/// Internal interface for the GPU API the reclaimer and staging pool run on, may change at any time!
///
/// # Safety
/// A pointer returned by [`Self::map_buffer`] must be valid for writes of the full size the buffer was allocated
/// with, until [`Self::unmap_buffer`] is called or the buffer is dropped.
pub unsafe trait ReclaimPlatform: Sized + 'static {
	type Buffer: DeferredResource<Self>;
	type BufferHandle: Copy + Eq + Debug + 'static;
	type Image: DeferredResource<Self>;
	type ImageView: DeferredResource<Self>;
	type Sampler: DeferredResource<Self>;
	type Pipeline: DeferredResource<Self>;
	type PipelineLayout: DeferredResource<Self>;
	type AllocationError: 'static + Error + Send + Sync;

	fn alloc_buffer(&self, create_info: &BufferCreateInfo, size: u64) -> Result<Self::Buffer, Self::AllocationError>;

	fn buffer_handle(buffer: &Self::Buffer) -> Self::BufferHandle;

	/// Map the buffer into host memory and return the base pointer of the mapping.
	///
	/// # Safety
	/// The buffer must have been allocated with [`BufferUsage::MAP_WRITE`] and must not currently be mapped.
	unsafe fn map_buffer(&self, buffer: &mut Self::Buffer) -> Result<NonNull<u8>, Self::AllocationError>;

	/// # Safety
	/// The buffer must be mapped. Any pointer previously returned by [`Self::map_buffer`] is invalidated.
	unsafe fn unmap_buffer(&self, buffer: &mut Self::Buffer);
}

bitflags::bitflags! {
	/// Buffer usage specify how you may use a buffer.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct BufferUsage: u64 {
		/// Can be used as a source of transfer operations
		const TRANSFER_SRC = 0b1;
		/// Can be used as a destination of transfer operations
		const TRANSFER_DST = 0b10;
		/// Allows a buffer to be mapped into host memory. The mapping will optimize for reading from the device.
		const MAP_READ = 0b100;
		/// Allows a buffer to be mapped into host memory. The mapping will optimize for writing to the device.
		const MAP_WRITE = 0b1000;
		/// Can be used as uniform buffer
		const UNIFORM_BUFFER = 0b1_0000;
		/// Can be used as storage buffer
		const STORAGE_BUFFER = 0b10_0000;
		/// Can be used as source of fixed-function index fetch (index buffer)
		const INDEX_BUFFER = 0b100_0000;
		/// Can be used as source of fixed-function vertex fetch (VBO)
		const VERTEX_BUFFER = 0b1000_0000;
		/// Can be the source of indirect parameters (e.g. indirect buffer, parameter buffer)
		const INDIRECT_BUFFER = 0b1_0000_0000;
	}
}

impl BufferUsage {
	/// Usage of every staging buffer: written by the host, read by transfer commands.
	pub const STAGING: BufferUsage = BufferUsage::TRANSFER_SRC.union(BufferUsage::MAP_WRITE);

	#[inline]
	pub fn is_mappable(&self) -> bool {
		self.intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE)
	}
}

#[derive(Copy, Clone, Debug, Default)]
pub struct BufferCreateInfo<'a> {
	/// Buffer usage specify how you may use a buffer.
	pub usage: BufferUsage,
	/// Name of the buffer, for tracking and debugging purposes
	pub name: &'a str,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_staging_usage_is_mappable() {
		assert!(BufferUsage::STAGING.is_mappable());
		assert!(BufferUsage::STAGING.contains(BufferUsage::TRANSFER_SRC));
		assert!(!BufferUsage::VERTEX_BUFFER.is_mappable());
	}
}
