use crate::deleter::SharedResourceDeleter;
use crate::platform::ReclaimPlatform;
use crate::staging::{StagingBin, StagingBufferPoolCreateInfo, StagingError};

/// Hands out host writable regions of upload buffers. Each frame index owns its own [`StagingBin`]s, which are reused
/// once that frame index is confirmed complete on the GPU. Bins are never destroyed directly, they are always retired
/// through the shared [`ResourceDeleter`](crate::deleter::ResourceDeleter).
///
/// A frame using the pool looks like this:
/// 1. [`Self::deref_frame_index`] with the frame index whose previous work has completed
/// 2. any number of [`Self::stage`]
/// 3. [`Self::flush`], before the staged regions are referenced by submitted commands
/// 4. [`Self::move_to_next_frame`]
pub struct StagingBufferPool<P: ReclaimPlatform> {
	platform: P,
	deleter: SharedResourceDeleter<P>,
	name: String,
	bins_per_frame: usize,
	bin_size: u64,
	frames_in_flight: u32,
	frame_index: u32,
	bins: Vec<StagingBin<P>>,
	last_bin: Option<usize>,
}

impl<P: ReclaimPlatform> StagingBufferPool<P> {
	pub fn new(platform: P, deleter: SharedResourceDeleter<P>, create_info: &StagingBufferPoolCreateInfo) -> Self {
		assert!(create_info.bins_per_frame >= 1, "must retain at least one bin per frame");
		assert!(create_info.bin_size > 0, "staging bins must not be empty");
		let frames_in_flight = deleter.borrow().frames_in_flight();
		Self {
			platform,
			deleter,
			name: create_info.name.to_string(),
			bins_per_frame: create_info.bins_per_frame,
			bin_size: create_info.bin_size,
			frames_in_flight,
			frame_index: 0,
			bins: Vec::new(),
			last_bin: None,
		}
	}

	#[inline]
	pub fn platform(&self) -> &P {
		&self.platform
	}

	#[inline]
	pub fn deleter(&self) -> &SharedResourceDeleter<P> {
		&self.deleter
	}

	#[inline]
	pub fn bins(&self) -> &[StagingBin<P>] {
		&self.bins
	}

	/// The frame index stages are currently allocated for.
	#[inline]
	pub fn frame_index(&self) -> u32 {
		self.frame_index
	}

	#[inline]
	pub fn bins_per_frame(&self) -> usize {
		self.bins_per_frame
	}

	#[inline]
	pub fn bin_size(&self) -> u64 {
		self.bin_size
	}

	pub fn is_mapped(&self) -> bool {
		self.bins.iter().any(StagingBin::is_mapped)
	}

	/// Copy `data` into a staging buffer. Returns the offset and buffer it was written to.
	pub fn stage(&mut self, data: &[u8]) -> Result<(u64, P::BufferHandle), StagingError<P>> {
		profiling::function_scope!();
		let index = self.find_bin(data.len() as u64)?;
		let bin = &mut self.bins[index];
		let offset = bin.stage(&self.platform, data)?;
		self.last_bin = Some(index);
		Ok((offset, bin.handle()))
	}

	pub fn stage_slice<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<(u64, P::BufferHandle), StagingError<P>> {
		self.stage(bytemuck::cast_slice(data))
	}

	fn find_bin(&mut self, size: u64) -> Result<usize, StagingError<P>> {
		if let Some(last) = self.last_bin.take() {
			if self.bins[last].can_accommodate(size) {
				return Ok(last);
			}
			self.bins[last].unmap(&self.platform);
		}

		let frame_index = self.frame_index;
		if let Some(index) = self
			.bins
			.iter()
			.rposition(|bin| bin.frame_index() == frame_index && bin.can_accommodate(size))
		{
			return Ok(index);
		}

		let capacity = u64::max(self.bin_size, size);
		let bin = StagingBin::new(&self.platform, &self.name, capacity, frame_index).map_err(StagingError::Platform)?;
		log::trace!(
			"created staging bin of {} bytes for frame index {}, {} bins total",
			capacity,
			frame_index,
			self.bins.len() + 1
		);
		self.bins.push(bin);
		Ok(self.bins.len() - 1)
	}

	/// Unmap all bins. Must be called after the last [`Self::stage`] of a frame, before the staging buffers are used
	/// by the GPU.
	pub fn flush(&mut self) {
		for bin in &mut self.bins {
			bin.unmap(&self.platform);
		}
		self.last_bin = None;
	}

	/// Reset the bins of the current frame index for reuse. Only the newest [`Self::bins_per_frame`] are kept, any
	/// older ones are retired to the [`ResourceDeleter`](crate::deleter::ResourceDeleter).
	///
	/// # Panics
	/// If any bin is still mapped, call [`Self::flush`] first.
	pub fn move_to_next_frame(&mut self) {
		profiling::function_scope!();
		assert!(
			!self.is_mapped(),
			"StagingBufferPool must be flushed before moving to the next frame"
		);

		let frame_index = self.frame_index;
		let mut kept = 0;
		let mut retired = Vec::new();
		for index in (0..self.bins.len()).rev() {
			if self.bins[index].frame_index() != frame_index {
				continue;
			}
			if kept < self.bins_per_frame {
				self.bins[index].clear();
				kept += 1;
			} else {
				retired.push(self.bins.remove(index));
			}
		}

		if !retired.is_empty() {
			log::debug!(
				"retiring {} excess staging bins of frame index {}",
				retired.len(),
				frame_index
			);
			let mut deleter = self.deleter.borrow_mut();
			for bin in retired.into_iter().rev() {
				deleter.delete_later(bin.into_buffer());
			}
		}
	}

	/// The GPU has finished all work previously submitted with `frame_index`, its bins may be reused. Following stages
	/// allocate from bins of `frame_index`.
	///
	/// # Panics
	/// If `frame_index` is not smaller than the deleter's frames in flight, or if any bin is still mapped.
	pub fn deref_frame_index(&mut self, frame_index: u32) {
		assert!(
			frame_index < self.frames_in_flight,
			"frame index {} out of range for {} frames in flight",
			frame_index,
			self.frames_in_flight
		);
		assert!(
			!self.is_mapped(),
			"StagingBufferPool must be flushed before switching frame index"
		);
		self.frame_index = frame_index;
		self.last_bin = None;
	}

	/// Flush and retire all bins to the [`ResourceDeleter`](crate::deleter::ResourceDeleter).
	pub fn cleanup(&mut self) {
		self.flush();
		if self.bins.is_empty() {
			return;
		}
		log::debug!("retiring all {} staging bins", self.bins.len());
		let mut deleter = self.deleter.borrow_mut();
		for bin in self.bins.drain(..) {
			deleter.delete_later(bin.into_buffer());
		}
	}
}

impl<P: ReclaimPlatform> Drop for StagingBufferPool<P> {
	fn drop(&mut self) {
		self.cleanup();
	}
}
