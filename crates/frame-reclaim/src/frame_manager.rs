use crate::deleter::{DeferredResource, ResourceDeleter, SharedResourceDeleter};
use crate::platform::ReclaimPlatform;
use crate::staging::{StagingBufferPool, StagingBufferPoolCreateInfo, StagingError};

/// Drives a [`ResourceDeleter`] and a [`StagingBufferPool`] in lock-step, one call per frame.
pub struct FrameManager<P: ReclaimPlatform> {
	deleter: SharedResourceDeleter<P>,
	pool: StagingBufferPool<P>,
	frame_id_mod: u32,
}

impl<P: ReclaimPlatform> FrameManager<P> {
	pub fn new(platform: P, frames_in_flight: u32, create_info: &StagingBufferPoolCreateInfo) -> Self {
		let deleter = ResourceDeleter::new_shared(frames_in_flight);
		let pool = StagingBufferPool::new(platform, deleter.clone(), create_info);
		Self {
			deleter,
			pool,
			frame_id_mod: frames_in_flight - 1,
		}
	}

	#[inline]
	pub fn frames_in_flight(&self) -> u32 {
		self.deleter.borrow().frames_in_flight()
	}

	#[inline]
	pub fn deleter(&self) -> &SharedResourceDeleter<P> {
		&self.deleter
	}

	#[inline]
	pub fn pool(&self) -> &StagingBufferPool<P> {
		&self.pool
	}

	/// Starts work on a new frame.
	///
	/// `wait` is called with the frame index about to be reused and must block until the GPU has finished the last
	/// frame submitted with that index, usually by waiting on a fence. Afterward, all resources and staging buffers no
	/// longer referenced by any frame in flight are reclaimed, and `record` is called with the new [`Frame`].
	///
	/// If `wait` fails, its error is returned and nothing changes, the same frame index is waited upon again by the next
	/// call. Once `wait` succeeded the frame index is consumed: if `record` fails, the pool is still flushed and both the
	/// pool and the deleter move to the next frame, discarding anything staged by the failed frame, before the error is
	/// returned.
	pub fn new_frame<W, R, T, E>(&mut self, wait: W, record: R) -> Result<T, E>
	where
		W: FnOnce(u32) -> Result<(), E>,
		R: FnOnce(&mut Frame<'_, P>) -> Result<T, E>,
	{
		profiling::function_scope!();
		let frame_index = (self.frame_id_mod + 1) % self.frames_in_flight();
		{
			profiling::scope!("wait for GPU");
			wait(frame_index)?;
		}
		self.frame_id_mod = frame_index;

		{
			profiling::scope!("cleanup GPU resources");
			self.deleter.borrow_mut().deref_frame_index(frame_index);
			self.pool.deref_frame_index(frame_index);
		}

		let result = record(&mut Frame {
			frame_index,
			pool: &mut self.pool,
			deleter: &self.deleter,
		});
		self.pool.flush();
		self.pool.move_to_next_frame();
		self.deleter.borrow_mut().move_to_next_frame();
		result
	}
}

pub struct Frame<'a, P: ReclaimPlatform> {
	frame_index: u32,
	pool: &'a mut StagingBufferPool<P>,
	deleter: &'a SharedResourceDeleter<P>,
}

impl<P: ReclaimPlatform> Frame<'_, P> {
	#[inline]
	pub fn frame_index(&self) -> u32 {
		self.frame_index
	}

	#[inline]
	pub fn frame_number(&self) -> u64 {
		self.deleter.borrow().frame_number()
	}

	pub fn stage(&mut self, data: &[u8]) -> Result<(u64, P::BufferHandle), StagingError<P>> {
		self.pool.stage(data)
	}

	pub fn stage_slice<T: bytemuck::Pod>(&mut self, data: &[T]) -> Result<(u64, P::BufferHandle), StagingError<P>> {
		self.pool.stage_slice(data)
	}

	pub fn delete_later<R: DeferredResource<P>>(&self, resource: R) {
		self.deleter.borrow_mut().delete_later(resource);
	}
}
