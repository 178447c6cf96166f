//! Bump allocated upload buffers, reused per frame in flight and retired through a [`ResourceDeleter`].
//!
//! [`ResourceDeleter`]: crate::deleter::ResourceDeleter

mod bin;
mod pool;

pub use bin::*;
pub use pool::*;

use crate::platform::ReclaimPlatform;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

/// Default capacity of a [`StagingBin`], 2 MiB.
pub const DEFAULT_STAGING_BIN_SIZE: u64 = 2 * 1024 * 1024;

#[derive(Copy, Clone, Debug)]
pub struct StagingBufferPoolCreateInfo<'a> {
	/// How many bins each frame index retains across frames. Bins beyond that are retired.
	pub bins_per_frame: usize,
	/// Capacity of newly created bins. A payload larger than this gets a bin of exactly its size.
	pub bin_size: u64,
	/// Name of the staging buffers, for tracking and debugging purposes
	pub name: &'a str,
}

impl Default for StagingBufferPoolCreateInfo<'_> {
	fn default() -> Self {
		Self {
			bins_per_frame: 1,
			bin_size: DEFAULT_STAGING_BIN_SIZE,
			name: "StagingBufferPool",
		}
	}
}

#[derive(Error)]
pub enum StagingError<P: ReclaimPlatform> {
	#[error("Platform Error: {0}")]
	Platform(#[source] P::AllocationError),
	#[error("Copy Error: {0:?}")]
	Copy(presser::CopyError),
}

impl<P: ReclaimPlatform> Debug for StagingError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self, f)
	}
}
