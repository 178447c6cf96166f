//! Deferred destruction of GPU resources. A resource handed to [`ResourceDeleter::delete_later`] may still be in use
//! by frames in flight, so it is parked in the [`FrameBin`] of the current frame. The bin is destroyed once every
//! frame index has reported completion via [`ResourceDeleter::deref_frame_index`].

mod frame_bin;
mod resources;

pub use frame_bin::*;
pub use resources::*;

use crate::platform::ReclaimPlatform;
use std::cell::RefCell;
use std::rc::Rc;

/// A [`ResourceDeleter`] shared between the frame loop and a [`StagingBufferPool`].
///
/// [`StagingBufferPool`]: crate::staging::StagingBufferPool
pub type SharedResourceDeleter<P> = Rc<RefCell<ResourceDeleter<P>>>;

pub struct ResourceDeleter<P: ReclaimPlatform> {
	frames_in_flight: u32,
	frame_number: u64,
	frame_bins: Vec<FrameBin<P>>,
}

impl<P: ReclaimPlatform> ResourceDeleter<P> {
	/// # Panics
	/// If `frames_in_flight` is 0 or larger than [`MAX_TRACKED_FRAMES`].
	pub fn new(frames_in_flight: u32) -> Self {
		assert!(frames_in_flight >= 1, "at least one frame must be in flight");
		assert!(
			frames_in_flight <= MAX_TRACKED_FRAMES,
			"at most {} frames may be in flight",
			MAX_TRACKED_FRAMES
		);
		Self {
			frames_in_flight,
			frame_number: 0,
			frame_bins: Vec::new(),
		}
	}

	pub fn new_shared(frames_in_flight: u32) -> SharedResourceDeleter<P> {
		Rc::new(RefCell::new(Self::new(frames_in_flight)))
	}

	#[inline]
	pub fn frames_in_flight(&self) -> u32 {
		self.frames_in_flight
	}

	/// The current frame number. Increases by one with each [`Self::move_to_next_frame`].
	#[inline]
	pub fn frame_number(&self) -> u64 {
		self.frame_number
	}

	/// All bins still waiting on some frame index, oldest first.
	#[inline]
	pub fn frame_bins(&self) -> &[FrameBin<P>] {
		&self.frame_bins
	}

	/// Take ownership of `resource` and destroy it once all frames that may still reference it have completed.
	pub fn delete_later<R: DeferredResource<P>>(&mut self, resource: R) {
		self.bin().push(resource);
	}

	pub fn move_to_next_frame(&mut self) {
		self.frame_number += 1;
	}

	/// The GPU has finished all work previously submitted with `frame_index`. Clears that reference on every bin and
	/// destroys the bins no frame refers to anymore.
	///
	/// # Panics
	/// If `frame_index` is not smaller than [`Self::frames_in_flight`].
	pub fn deref_frame_index(&mut self, frame_index: u32) {
		profiling::function_scope!();
		assert!(
			frame_index < self.frames_in_flight,
			"frame index {} out of range for {} frames in flight",
			frame_index,
			self.frames_in_flight
		);

		self.frame_bins.retain_mut(|bin| {
			bin.deref_frame_index(frame_index);
			if bin.can_be_destroyed() {
				log::debug!(
					"reclaiming {} resources retired in frame {}",
					bin.resources().len(),
					bin.frame_number()
				);
				bin.release();
				false
			} else {
				true
			}
		});
	}

	/// Destroy all resources immediately, regardless of which frames may still reference them. Only call this once the
	/// device is idle.
	pub fn delete_all(&mut self) {
		if !self.frame_bins.is_empty() {
			log::debug!("deleting all {} frame bins", self.frame_bins.len());
		}
		for bin in &mut self.frame_bins {
			bin.release();
		}
		self.frame_bins.clear();
	}

	fn bin(&mut self) -> &mut FrameBin<P> {
		let frame_number = self.frame_number;
		let needs_new = self.frame_bins.last().map_or(true, |bin| bin.frame_number() != frame_number);
		if needs_new {
			self.frame_bins.push(FrameBin::new(frame_number, self.frames_in_flight));
		}
		let last = self.frame_bins.len() - 1;
		&mut self.frame_bins[last]
	}
}

impl<P: ReclaimPlatform> Drop for ResourceDeleter<P> {
	fn drop(&mut self) {
		self.delete_all();
	}
}
