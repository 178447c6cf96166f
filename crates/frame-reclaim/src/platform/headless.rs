//! A platform without any GPU behind it. Buffers are backed by host memory and every object records its destruction,
//! so the frame pacing of the deleter and staging pool can be observed without a device.

use crate::impl_deferred_resources;
use crate::platform::{BufferCreateInfo, BufferUsage, ReclaimPlatform};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct HeadlessHandle(pub u64);

#[derive(Clone, Default)]
pub struct Headless {
	state: Arc<HeadlessState>,
}

#[derive(Default)]
struct HeadlessState {
	next_handle: AtomicU64,
	allocated_bytes: AtomicU64,
	memory_budget: Option<u64>,
	ledger: Mutex<HeadlessLedger>,
}

#[derive(Default)]
struct HeadlessLedger {
	live: HashSet<HeadlessHandle>,
	destroyed: Vec<HeadlessHandle>,
}

impl HeadlessState {
	fn create(&self) -> HeadlessHandle {
		let handle = HeadlessHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
		self.ledger.lock().live.insert(handle);
		handle
	}

	fn destroy(&self, handle: HeadlessHandle) {
		let mut ledger = self.ledger.lock();
		let was_live = ledger.live.remove(&handle);
		assert!(was_live, "{:?} destroyed twice", handle);
		ledger.destroyed.push(handle);
		log::trace!("destroyed {:?}", handle);
	}
}

impl Headless {
	pub fn new() -> Self {
		Self::default()
	}

	/// Buffer allocations fail with [`HeadlessAllocationError::OutOfDeviceMemory`] once more than `bytes` would be
	/// allocated at the same time.
	pub fn with_memory_budget(bytes: u64) -> Self {
		Self {
			state: Arc::new(HeadlessState {
				memory_budget: Some(bytes),
				..HeadlessState::default()
			}),
		}
	}

	/// Every object destroyed so far, in order of destruction.
	pub fn destroyed(&self) -> Vec<HeadlessHandle> {
		self.state.ledger.lock().destroyed.clone()
	}

	/// Count of objects created but not yet destroyed.
	pub fn live_resources(&self) -> usize {
		self.state.ledger.lock().live.len()
	}

	pub fn is_alive(&self, handle: HeadlessHandle) -> bool {
		self.state.ledger.lock().live.contains(&handle)
	}

	/// Sum of the sizes of all buffers currently alive.
	pub fn allocated_bytes(&self) -> u64 {
		self.state.allocated_bytes.load(Ordering::Relaxed)
	}

	pub fn create_image(&self) -> HeadlessImage {
		HeadlessImage::new(&self.state)
	}

	pub fn create_image_view(&self) -> HeadlessImageView {
		HeadlessImageView::new(&self.state)
	}

	pub fn create_sampler(&self) -> HeadlessSampler {
		HeadlessSampler::new(&self.state)
	}

	pub fn create_pipeline(&self) -> HeadlessPipeline {
		HeadlessPipeline::new(&self.state)
	}

	pub fn create_pipeline_layout(&self) -> HeadlessPipelineLayout {
		HeadlessPipelineLayout::new(&self.state)
	}
}

impl Debug for Headless {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Headless")
			.field("live_resources", &self.live_resources())
			.field("allocated_bytes", &self.allocated_bytes())
			.finish()
	}
}

pub struct HeadlessBuffer {
	handle: HeadlessHandle,
	state: Arc<HeadlessState>,
	memory: Box<[u8]>,
	usage: BufferUsage,
	name: String,
	mapped: bool,
}

impl HeadlessBuffer {
	#[inline]
	pub fn handle(&self) -> HeadlessHandle {
		self.handle
	}

	#[inline]
	pub fn size(&self) -> u64 {
		self.memory.len() as u64
	}

	#[inline]
	pub fn usage(&self) -> BufferUsage {
		self.usage
	}

	#[inline]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[inline]
	pub fn is_mapped(&self) -> bool {
		self.mapped
	}

	/// The bytes a transfer command reading this buffer would observe.
	#[inline]
	pub fn contents(&self) -> &[u8] {
		&self.memory
	}
}

impl Debug for HeadlessBuffer {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HeadlessBuffer")
			.field("handle", &self.handle)
			.field("name", &self.name)
			.field("size", &self.memory.len())
			.field("mapped", &self.mapped)
			.finish()
	}
}

impl Drop for HeadlessBuffer {
	fn drop(&mut self) {
		self.state.allocated_bytes.fetch_sub(self.size(), Ordering::Relaxed);
		self.state.destroy(self.handle);
	}
}

macro_rules! headless_object {
	($($name:ident),* $(,)?) => {
		$(
			pub struct $name {
				handle: HeadlessHandle,
				state: Arc<HeadlessState>,
			}

			impl $name {
				fn new(state: &Arc<HeadlessState>) -> Self {
					Self {
						handle: state.create(),
						state: state.clone(),
					}
				}

				#[inline]
				pub fn handle(&self) -> HeadlessHandle {
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
					self.state.destroy(self.handle);
				}
			}
		)*
	};
}

headless_object!(
	HeadlessImage,
	HeadlessImageView,
	HeadlessSampler,
	HeadlessPipeline,
	HeadlessPipelineLayout,
);

impl_deferred_resources!(Headless {
	HeadlessBuffer => buffers,
	HeadlessImage => images,
	HeadlessImageView => image_views,
	HeadlessSampler => samplers,
	HeadlessPipeline => pipelines,
	HeadlessPipelineLayout => pipeline_layouts,
});

#[derive(Error)]
pub enum HeadlessAllocationError {
	#[error("out of device memory: requested {requested} bytes with only {available} bytes available")]
	OutOfDeviceMemory { requested: u64, available: u64 },
	#[error("buffer {name:?} with usage {usage:?} is not mappable")]
	NotMappable { name: String, usage: BufferUsage },
}

impl core::fmt::Debug for HeadlessAllocationError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}

unsafe impl ReclaimPlatform for Headless {
	type Buffer = HeadlessBuffer;
	type BufferHandle = HeadlessHandle;
	type Image = HeadlessImage;
	type ImageView = HeadlessImageView;
	type Sampler = HeadlessSampler;
	type Pipeline = HeadlessPipeline;
	type PipelineLayout = HeadlessPipelineLayout;
	type AllocationError = HeadlessAllocationError;

	fn alloc_buffer(&self, create_info: &BufferCreateInfo, size: u64) -> Result<Self::Buffer, Self::AllocationError> {
		let state = &self.state;
		let reserved = state.allocated_bytes.fetch_add(size, Ordering::Relaxed);
		if let Some(budget) = state.memory_budget {
			if reserved.saturating_add(size) > budget {
				state.allocated_bytes.fetch_sub(size, Ordering::Relaxed);
				return Err(HeadlessAllocationError::OutOfDeviceMemory {
					requested: size,
					available: budget.saturating_sub(reserved),
				});
			}
		}

		let buffer = HeadlessBuffer {
			handle: state.create(),
			state: state.clone(),
			memory: vec![0; size as usize].into_boxed_slice(),
			usage: create_info.usage,
			name: create_info.name.to_string(),
			mapped: false,
		};
		log::trace!("allocated {:?}", buffer);
		Ok(buffer)
	}

	#[inline]
	fn buffer_handle(buffer: &Self::Buffer) -> Self::BufferHandle {
		buffer.handle
	}

	unsafe fn map_buffer(&self, buffer: &mut Self::Buffer) -> Result<NonNull<u8>, Self::AllocationError> {
		if !buffer.usage.is_mappable() {
			return Err(HeadlessAllocationError::NotMappable {
				name: buffer.name.clone(),
				usage: buffer.usage,
			});
		}
		debug_assert!(!buffer.mapped, "{:?} is already mapped", buffer);
		buffer.mapped = true;
		Ok(NonNull::from(&mut *buffer.memory).cast::<u8>())
	}

	unsafe fn unmap_buffer(&self, buffer: &mut Self::Buffer) {
		debug_assert!(buffer.mapped, "{:?} is not mapped", buffer);
		buffer.mapped = false;
	}
}
