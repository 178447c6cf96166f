use crate::platform::{BufferCreateInfo, BufferUsage, ReclaimPlatform};
use crate::staging::StagingError;
use presser::Slab;
use std::ptr::NonNull;

/// A region handed out by [`StagingBin::stage`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct StagingAllocation {
	pub offset: u64,
	pub size: u64,
}

impl StagingAllocation {
	#[inline]
	pub fn end(&self) -> u64 {
		self.offset + self.size
	}
}

/// The host mapping of a staging buffer.
///
/// # Safety
/// `ptr` must be valid for reads and writes of `size` bytes for as long as this slab exists.
#[derive(Debug)]
pub struct MappedSlab {
	ptr: NonNull<u8>,
	size: usize,
}

unsafe impl Slab for MappedSlab {
	fn base_ptr(&self) -> *const u8 {
		self.ptr.as_ptr()
	}

	fn base_ptr_mut(&mut self) -> *mut u8 {
		self.ptr.as_ptr()
	}

	fn size(&self) -> usize {
		self.size
	}
}

/// A single upload buffer, bump allocated from the front. Its cursor only ever resets as a whole with [`Self::clear`].
pub struct StagingBin<P: ReclaimPlatform> {
	buffer: P::Buffer,
	capacity: u64,
	frame_index: u32,
	mapped: Option<MappedSlab>,
	allocations: Vec<StagingAllocation>,
}

impl<P: ReclaimPlatform> StagingBin<P> {
	pub fn new(platform: &P, name: &str, capacity: u64, frame_index: u32) -> Result<Self, P::AllocationError> {
		let buffer = platform.alloc_buffer(
			&BufferCreateInfo {
				usage: BufferUsage::STAGING,
				name,
			},
			capacity,
		)?;
		Ok(Self {
			buffer,
			capacity,
			frame_index,
			mapped: None,
			allocations: Vec::new(),
		})
	}

	#[inline]
	pub fn buffer(&self) -> &P::Buffer {
		&self.buffer
	}

	#[inline]
	pub fn handle(&self) -> P::BufferHandle {
		P::buffer_handle(&self.buffer)
	}

	#[inline]
	pub fn capacity(&self) -> u64 {
		self.capacity
	}

	/// The frame index this bin was created for. Only stages of that frame index use it.
	#[inline]
	pub fn frame_index(&self) -> u32 {
		self.frame_index
	}

	#[inline]
	pub fn is_mapped(&self) -> bool {
		self.mapped.is_some()
	}

	/// The mapped memory of this bin, if it is currently mapped.
	pub fn mapped(&self) -> Option<&[u8]> {
		self.mapped
			.as_ref()
			// Safety: MappedSlab guarantees the pointer is valid for its full size
			.map(|slab| unsafe { std::slice::from_raw_parts(slab.base_ptr(), slab.size()) })
	}

	/// Allocations since the last [`Self::clear`], in order of allocation.
	#[inline]
	pub fn allocations(&self) -> &[StagingAllocation] {
		&self.allocations
	}

	/// Offset of the next allocation.
	#[inline]
	pub fn cursor(&self) -> u64 {
		self.allocations.last().map_or(0, StagingAllocation::end)
	}

	#[inline]
	pub fn remaining(&self) -> u64 {
		self.capacity - self.cursor()
	}

	#[inline]
	pub fn can_accommodate(&self, size: u64) -> bool {
		size <= self.remaining()
	}

	/// Reserve the next `size` bytes.
	///
	/// # Panics
	/// If there are less than `size` bytes remaining.
	pub fn allocate(&mut self, size: u64) -> StagingAllocation {
		assert!(
			self.can_accommodate(size),
			"staging allocation of {} bytes exceeds the {} remaining bytes",
			size,
			self.remaining()
		);
		let allocation = StagingAllocation {
			offset: self.cursor(),
			size,
		};
		self.allocations.push(allocation);
		allocation
	}

	/// Map this bin, reserve space for `data` and copy it over. Returns the offset `data` was written to.
	pub fn stage(&mut self, platform: &P, data: &[u8]) -> Result<u64, StagingError<P>> {
		self.map(platform).map_err(StagingError::Platform)?;
		let allocation = self.allocate(data.len() as u64);
		if let Some(slab) = self.mapped.as_mut() {
			if !data.is_empty() {
				let record = presser::copy_from_slice_to_offset(data, slab, allocation.offset as usize)
					.map_err(StagingError::Copy)?;
				assert_eq!(
					record.copy_start_offset, allocation.offset as usize,
					"presser must not add padding"
				);
			}
		}
		Ok(allocation.offset)
	}

	/// Forget all allocations, so the whole capacity may be reused.
	pub fn clear(&mut self) {
		self.allocations.clear();
	}

	/// Map this bin if it isn't mapped yet.
	pub fn map(&mut self, platform: &P) -> Result<&mut MappedSlab, P::AllocationError> {
		let slab = match self.mapped.take() {
			Some(slab) => slab,
			None => {
				// Safety: staging buffers are allocated MAP_WRITE and we just checked that it isn't mapped
				let ptr = unsafe { platform.map_buffer(&mut self.buffer)? };
				MappedSlab {
					ptr,
					size: self.capacity as usize,
				}
			}
		};
		Ok(self.mapped.insert(slab))
	}

	pub fn unmap(&mut self, platform: &P) {
		if self.mapped.take().is_some() {
			// Safety: the slab referencing the mapping was just dropped
			unsafe { platform.unmap_buffer(&mut self.buffer) };
		}
	}

	/// Take the buffer out of this bin, to hand it to a [`ResourceDeleter`](crate::deleter::ResourceDeleter).
	///
	/// # Panics
	/// If the bin is still mapped.
	pub fn into_buffer(self) -> P::Buffer {
		assert!(!self.is_mapped(), "a staging bin must be unmapped before it is retired");
		self.buffer
	}
}
