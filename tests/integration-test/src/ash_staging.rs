#![cfg(test)]

use crate::init_logger;
use ash::vk::{
	BufferCopy, CommandBuffer, CommandBufferAllocateInfo, CommandBufferBeginInfo, CommandBufferLevel,
	CommandBufferUsageFlags, CommandPool, CommandPoolCreateFlags, CommandPoolCreateInfo, Extent3D, Fence,
	FenceCreateFlags, FenceCreateInfo, Format, ImageAspectFlags, ImageCreateInfo, ImageLayout, ImageSubresourceRange,
	ImageTiling, ImageType, ImageUsageFlags, ImageViewCreateInfo, ImageViewType, PipelineLayoutCreateInfo,
	SampleCountFlags, SamplerCreateInfo, SharingMode, SubmitInfo,
};
use frame_reclaim::frame_manager::FrameManager;
use frame_reclaim::platform::ash::{Ash, AshImage, AshImageView};
use frame_reclaim::platform::ash::init::{AshInitCreateInfo, ash_init};
use frame_reclaim::platform::{BufferCreateInfo, BufferUsage, ReclaimPlatform};
use frame_reclaim::staging::StagingBufferPoolCreateInfo;
use gpu_allocator::MemoryLocation;

const FRAMES_IN_FLIGHT: u32 = 2;
const FRAME_COUNT: u64 = 8;
const UPLOAD_SIZE: u64 = 64;

/// One command buffer and fence per frame index.
struct FrameSync {
	pool: CommandPool,
	command_buffers: Vec<CommandBuffer>,
	fences: Vec<Fence>,
}

impl FrameSync {
	unsafe fn new(ash: &Ash) -> anyhow::Result<Self> {
		unsafe {
			let pool = ash.device.create_command_pool(
				&CommandPoolCreateInfo::default()
					.queue_family_index(ash.queue_family_index)
					.flags(CommandPoolCreateFlags::RESET_COMMAND_BUFFER),
				None,
			)?;
			let command_buffers = ash.device.allocate_command_buffers(
				&CommandBufferAllocateInfo::default()
					.command_pool(pool)
					.level(CommandBufferLevel::PRIMARY)
					.command_buffer_count(FRAMES_IN_FLIGHT),
			)?;
			let fences = (0..FRAMES_IN_FLIGHT)
				.map(|_| {
					ash.device
						.create_fence(&FenceCreateInfo::default().flags(FenceCreateFlags::SIGNALED), None)
				})
				.collect::<Result<Vec<_>, _>>()?;
			Ok(Self {
				pool,
				command_buffers,
				fences,
			})
		}
	}

	unsafe fn wait(&self, ash: &Ash, frame_index: u32) -> anyhow::Result<()> {
		unsafe {
			let fence = self.fences[frame_index as usize];
			ash.device.wait_for_fences(&[fence], true, u64::MAX)?;
			ash.device.reset_fences(&[fence])?;
			Ok(())
		}
	}

	unsafe fn destroy(self, ash: &Ash) {
		unsafe {
			for fence in self.fences {
				ash.device.destroy_fence(fence, None);
			}
			ash.device.destroy_command_pool(self.pool, None);
		}
	}
}

/// A small sampled image and a view of it, as a frame might use for a transient render target.
fn create_texture(ash: &Ash) -> anyhow::Result<(AshImage, AshImageView)> {
	let format = Format::R8G8B8A8_UNORM;
	let image = ash.create_image(
		&ImageCreateInfo::default()
			.image_type(ImageType::TYPE_2D)
			.format(format)
			.extent(Extent3D {
				width: 16,
				height: 16,
				depth: 1,
			})
			.mip_levels(1)
			.array_layers(1)
			.samples(SampleCountFlags::TYPE_1)
			.tiling(ImageTiling::OPTIMAL)
			.usage(ImageUsageFlags::SAMPLED | ImageUsageFlags::TRANSFER_DST)
			.sharing_mode(SharingMode::EXCLUSIVE)
			.initial_layout(ImageLayout::UNDEFINED),
		"per frame image",
		MemoryLocation::GpuOnly,
	)?;
	let view = ash.create_image_view(
		&ImageViewCreateInfo::default()
			.image(image.image)
			.view_type(ImageViewType::TYPE_2D)
			.format(format)
			.subresource_range(
				ImageSubresourceRange::default()
					.aspect_mask(ImageAspectFlags::COLOR)
					.level_count(1)
					.layer_count(1),
			),
		"per frame image view",
	)?;
	Ok((image, view))
}

#[test]
fn test_ash_staging_upload() -> anyhow::Result<()> {
	init_logger();
	let create_info = match ash_init(AshInitCreateInfo::default()) {
		Ok(create_info) => create_info,
		Err(e) => {
			log::warn!("skipping, no vulkan device available: {}", e);
			return Ok(());
		}
	};
	let ash = Ash::new(create_info);

	unsafe {
		let sync = FrameSync::new(&ash)?;
		let readback = ash.alloc_buffer(
			&BufferCreateInfo {
				usage: BufferUsage::MAP_READ | BufferUsage::TRANSFER_DST,
				name: "readback",
			},
			UPLOAD_SIZE * FRAME_COUNT,
		)?;

		let mut manager = FrameManager::new(
			ash.clone(),
			FRAMES_IN_FLIGHT,
			&StagingBufferPoolCreateInfo {
				bin_size: 256,
				..StagingBufferPoolCreateInfo::default()
			},
		);

		for frame in 0..FRAME_COUNT {
			manager.new_frame(
				|frame_index| sync.wait(&ash, frame_index),
				|f| -> anyhow::Result<()> {
					let data = vec![frame as u8 + 1; UPLOAD_SIZE as usize];
					let (offset, staging) = f.stage(&data)?;
					f.delete_later(ash.create_sampler(&SamplerCreateInfo::default(), "per frame sampler")?);
					f.delete_later(
						ash.create_pipeline_layout(&PipelineLayoutCreateInfo::default(), "per frame pipeline layout")?,
					);
					let (image, view) = create_texture(&ash)?;
					f.delete_later(view);
					f.delete_later(image);

					let cmd = sync.command_buffers[f.frame_index() as usize];
					ash.device.begin_command_buffer(
						cmd,
						&CommandBufferBeginInfo::default().flags(CommandBufferUsageFlags::ONE_TIME_SUBMIT),
					)?;
					ash.device.cmd_copy_buffer(
						cmd,
						staging,
						readback.buffer,
						&[BufferCopy {
							src_offset: offset,
							dst_offset: frame * UPLOAD_SIZE,
							size: UPLOAD_SIZE,
						}],
					);
					ash.device.end_command_buffer(cmd)?;
					ash.device.queue_submit(
						*ash.queue.lock(),
						&[SubmitInfo::default().command_buffers(&[cmd])],
						sync.fences[f.frame_index() as usize],
					)?;
					Ok(())
				},
			)?;
		}

		ash.device.device_wait_idle()?;
		let contents = readback
			.allocation
			.as_ref()
			.and_then(|allocation| allocation.mapped_slice())
			.ok_or(anyhow::anyhow!("readback buffer is not host visible"))?;
		for frame in 0..FRAME_COUNT {
			let start = (frame * UPLOAD_SIZE) as usize;
			assert!(contents[start..start + UPLOAD_SIZE as usize]
				.iter()
				.all(|b| *b == frame as u8 + 1));
		}

		drop(manager);
		drop(readback);
		sync.destroy(&ash);
	}
	Ok(())
}
