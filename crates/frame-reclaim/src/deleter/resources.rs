use crate::platform::ReclaimPlatform;

/// A GPU object that a [`ResourceDeleter`] can take ownership of. Maps the type to its typed sequence inside
/// [`FrameResources`], so a bin can hold every resource kind of a platform side by side.
///
/// Implement it with [`impl_deferred_resources!`] for the resource types of a [`ReclaimPlatform`].
///
/// [`ResourceDeleter`]: crate::deleter::ResourceDeleter
pub trait DeferredResource<P: ReclaimPlatform>: Sized + 'static {
	fn resources(resources: &FrameResources<P>) -> &Vec<Self>;

	fn resources_mut(resources: &mut FrameResources<P>) -> &mut Vec<Self>;
}

/// All resources retired during a single frame, one sequence per resource kind.
pub struct FrameResources<P: ReclaimPlatform> {
	pub pipelines: Vec<P::Pipeline>,
	pub pipeline_layouts: Vec<P::PipelineLayout>,
	pub samplers: Vec<P::Sampler>,
	pub image_views: Vec<P::ImageView>,
	pub images: Vec<P::Image>,
	pub buffers: Vec<P::Buffer>,
}

impl<P: ReclaimPlatform> FrameResources<P> {
	pub fn new() -> Self {
		Self {
			pipelines: Vec::new(),
			pipeline_layouts: Vec::new(),
			samplers: Vec::new(),
			image_views: Vec::new(),
			images: Vec::new(),
			buffers: Vec::new(),
		}
	}

	#[inline]
	pub fn get<R: DeferredResource<P>>(&self) -> &[R] {
		R::resources(self)
	}

	#[inline]
	pub fn push<R: DeferredResource<P>>(&mut self, resource: R) {
		R::resources_mut(self).push(resource);
	}

	pub fn len(&self) -> usize {
		self.pipelines.len()
			+ self.pipeline_layouts.len()
			+ self.samplers.len()
			+ self.image_views.len()
			+ self.images.len()
			+ self.buffers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Drops every contained resource. Users of a resource are destroyed before the resource backing them:
	/// pipelines before their layouts, views before their images, and buffers last.
	pub fn release(&mut self) {
		self.pipelines.clear();
		self.pipeline_layouts.clear();
		self.samplers.clear();
		self.image_views.clear();
		self.images.clear();
		self.buffers.clear();
	}
}

impl<P: ReclaimPlatform> Default for FrameResources<P> {
	fn default() -> Self {
		Self::new()
	}
}

impl<P: ReclaimPlatform> Drop for FrameResources<P> {
	fn drop(&mut self) {
		self.release();
	}
}

/// Implements [`DeferredResource`] for the resource types of a platform:
/// ```ignore
/// impl_deferred_resources!(MyPlatform {
/// 	MyBuffer => buffers,
/// 	MyImage => images,
/// });
/// ```
#[macro_export]
macro_rules! impl_deferred_resources {
	($platform:ty { $($resource:ty => $field:ident),* $(,)? }) => {
		$(
			impl $crate::deleter::DeferredResource<$platform> for $resource {
				#[inline]
				fn resources(resources: &$crate::deleter::FrameResources<$platform>) -> &Vec<Self> {
					&resources.$field
				}

				#[inline]
				fn resources_mut(resources: &mut $crate::deleter::FrameResources<$platform>) -> &mut Vec<Self> {
					&mut resources.$field
				}
			}
		)*
	};
}
