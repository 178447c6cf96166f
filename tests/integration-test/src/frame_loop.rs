#![cfg(test)]

use crate::init_logger;
use frame_reclaim::frame_manager::FrameManager;
use frame_reclaim::platform::headless::{Headless, HeadlessHandle};
use frame_reclaim::platform::{BufferCreateInfo, BufferUsage, ReclaimPlatform};
use frame_reclaim::staging::StagingBufferPoolCreateInfo;
use std::collections::HashMap;

/// Everything the GPU would still read while executing a frame.
#[derive(Default)]
struct SubmittedFrame {
	staging: Vec<HeadlessHandle>,
	retired: Vec<HeadlessHandle>,
}

/// Stands in for a GPU that lags behind the CPU by all frames in flight: the work of a frame index only "executes"
/// once its fence is waited upon.
struct SimulatedGpu {
	headless: Headless,
	in_flight: HashMap<u32, SubmittedFrame>,
	executed_frames: usize,
}

impl SimulatedGpu {
	fn new(headless: &Headless) -> Self {
		Self {
			headless: headless.clone(),
			in_flight: HashMap::new(),
			executed_frames: 0,
		}
	}

	fn wait(&mut self, frame_index: u32) -> anyhow::Result<()> {
		if let Some(frame) = self.in_flight.remove(&frame_index) {
			for handle in frame.staging.iter().chain(frame.retired.iter()) {
				anyhow::ensure!(
					self.headless.is_alive(*handle),
					"{:?} destroyed while frame index {} was still executing",
					handle,
					frame_index
				);
			}
			self.executed_frames += 1;
		}
		Ok(())
	}

	fn submit(&mut self, frame_index: u32, frame: SubmittedFrame) {
		let prev = self.in_flight.insert(frame_index, frame);
		assert!(prev.is_none(), "frame index {} submitted twice", frame_index);
	}
}

fn run_frames(frames_in_flight: u32, bins_per_frame: usize, frame_count: usize) -> anyhow::Result<()> {
	let headless = Headless::new();
	let bin_size = 4096;
	let mut manager = FrameManager::new(
		headless.clone(),
		frames_in_flight,
		&StagingBufferPoolCreateInfo {
			bins_per_frame,
			bin_size,
			name: "frame loop staging",
		},
	);
	let mut gpu = SimulatedGpu::new(&headless);
	let mut retired_at = Vec::new();

	for frame in 0..frame_count {
		let submitted = manager.new_frame(
			|frame_index| gpu.wait(frame_index),
			|f| -> anyhow::Result<(u32, SubmittedFrame)> {
				let mut submitted = SubmittedFrame::default();

				// a varying amount of uploads, sometimes larger than a bin
				let uploads = 1 + frame % 5;
				for upload in 0..uploads {
					let size = match (frame + upload) % 7 {
						0 => 0,
						6 => bin_size as usize + 100,
						n => n * 700,
					};
					let data = vec![frame as u8; size];
					let (_, handle) = f.stage(&data)?;
					submitted.staging.push(handle);
				}

				// a resource that was used by this frame and is no longer needed afterward
				let buffer = headless.alloc_buffer(
					&BufferCreateInfo {
						usage: BufferUsage::UNIFORM_BUFFER,
						name: "per frame uniforms",
					},
					256,
				)?;
				submitted.retired.push(buffer.handle());
				f.delete_later(buffer);
				f.delete_later(headless.create_image_view());
				Ok((f.frame_index(), submitted))
			},
		)?;

		let (frame_index, submitted) = submitted;
		retired_at.push(submitted.retired[0]);
		gpu.submit(frame_index, submitted);

		// the active frame index was just trimmed, the others during their own frames
		for index in 0..frames_in_flight {
			let bins = manager
				.pool()
				.bins()
				.iter()
				.filter(|bin| bin.frame_index() == index)
				.count();
			anyhow::ensure!(
				bins <= bins_per_frame,
				"frame index {} retains {} bins",
				index,
				bins
			);
		}

		// everything retired at least frames_in_flight frames ago is gone
		if frame >= frames_in_flight as usize {
			let old = retired_at[frame - frames_in_flight as usize];
			anyhow::ensure!(!headless.is_alive(old), "{:?} outlived all frames in flight", old);
		}
	}

	assert_eq!(gpu.executed_frames, frame_count - frames_in_flight as usize);
	let deleter = manager.deleter().borrow();
	assert!(deleter.frame_bins().len() <= frames_in_flight as usize);
	Ok(())
}

#[test]
fn test_single_frame_in_flight() -> anyhow::Result<()> {
	init_logger();
	run_frames(1, 1, 20)
}

#[test]
fn test_double_buffered() -> anyhow::Result<()> {
	init_logger();
	run_frames(2, 1, 50)
}

#[test]
fn test_triple_buffered_multiple_bins() -> anyhow::Result<()> {
	init_logger();
	run_frames(3, 2, 50)
}

#[test]
fn test_teardown_destroys_everything() -> anyhow::Result<()> {
	init_logger();
	let headless = Headless::new();
	{
		let mut manager = FrameManager::new(headless.clone(), 2, &StagingBufferPoolCreateInfo::default());
		for _ in 0..5 {
			manager.new_frame(
				|_| anyhow::Ok(()),
				|f| -> anyhow::Result<()> {
					f.stage(&[1, 2, 3])?;
					f.delete_later(headless.create_sampler());
					Ok(())
				},
			)?;
		}
		assert!(headless.live_resources() > 0);
	}
	assert_eq!(headless.live_resources(), 0);
	assert_eq!(headless.allocated_bytes(), 0);
	Ok(())
}
