use crate::deleter::{DeferredResource, FrameResources};
use crate::platform::ReclaimPlatform;

/// The most frames in flight a [`FrameBin`] can track, one bit each.
pub const MAX_TRACKED_FRAMES: u32 = u64::BITS;

/// The resources retired during one frame, together with one reference bit per frame in flight. Bit `i` stays set
/// until frame index `i` has been confirmed complete on the GPU. Once all bits are cleared the bin may be destroyed.
pub struct FrameBin<P: ReclaimPlatform> {
	frame_number: u64,
	frame_references: u64,
	resources: FrameResources<P>,
}

impl<P: ReclaimPlatform> FrameBin<P> {
	/// # Panics
	/// If `frames_in_flight` is 0 or larger than [`MAX_TRACKED_FRAMES`].
	pub fn new(frame_number: u64, frames_in_flight: u32) -> Self {
		assert!(
			(1..=MAX_TRACKED_FRAMES).contains(&frames_in_flight),
			"{} frames in flight not within 1..={}",
			frames_in_flight,
			MAX_TRACKED_FRAMES
		);
		Self {
			frame_number,
			frame_references: u64::MAX >> (u64::BITS - frames_in_flight),
			resources: FrameResources::new(),
		}
	}

	#[inline]
	pub fn frame_number(&self) -> u64 {
		self.frame_number
	}

	#[inline]
	pub fn frame_references(&self) -> u64 {
		self.frame_references
	}

	#[inline]
	pub fn is_referenced(&self, frame_index: u32) -> bool {
		frame_index < MAX_TRACKED_FRAMES && self.frame_references & (1 << frame_index) != 0
	}

	#[inline]
	pub fn resources(&self) -> &FrameResources<P> {
		&self.resources
	}

	#[inline]
	pub fn can_be_destroyed(&self) -> bool {
		self.frame_references == 0
	}

	pub(crate) fn push<R: DeferredResource<P>>(&mut self, resource: R) {
		self.resources.push(resource);
	}

	pub(crate) fn deref_frame_index(&mut self, frame_index: u32) {
		self.frame_references &= !(1 << frame_index);
	}

	pub(crate) fn release(&mut self) {
		self.resources.release();
	}
}
