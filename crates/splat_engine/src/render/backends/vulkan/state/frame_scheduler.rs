//! Frame-in-flight scheduling
//!
//! The acquire → record → submit → present loop, independent of Vulkan so it
//! can be driven by a mock in tests. Two hazards are tracked:
//!
//! - a slot's command buffer is never re-recorded before the slot's fence signals
//! - a swapchain image is never submitted to while the fence of the frame that
//!   last rendered to it is still pending
//!
//! Swapchain invalidation is an outcome, not an error: it routes the loop into
//! [`FrameBackend::recreate`] and the frame counts as handled.

/// Result of asking the swapchain for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Rendering may proceed; a suboptimal swapchain is tolerated until present
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    pub fn needs_recreation(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// What happened during one [`FrameScheduler::run_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Frame submitted and presented
    Presented,
    /// Frame presented, then the swapchain was recreated
    PresentedAndRecreated,
    /// Acquire reported out-of-date; nothing was recorded
    Recreated,
}

/// GPU operations the frame loop drives
pub trait FrameBackend {
    type Fence: Copy + PartialEq;
    type Error;

    /// Number of swapchain images
    fn image_count(&self) -> usize;

    /// Fence guarding frame slot `slot`
    fn slot_fence(&self, slot: usize) -> Self::Fence;

    fn wait_for_fence(&mut self, fence: Self::Fence) -> Result<(), Self::Error>;

    fn reset_fence(&mut self, fence: Self::Fence) -> Result<(), Self::Error>;

    /// Acquire an image, signalling the slot's image-available semaphore
    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome, Self::Error>;

    /// Record the slot's command buffer for `image_index`
    fn record(&mut self, slot: usize, image_index: u32) -> Result<(), Self::Error>;

    /// Submit the slot's command buffer, signalling the slot fence on completion
    fn submit(&mut self, slot: usize, image_index: u32) -> Result<(), Self::Error>;

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome, Self::Error>;

    /// Rebuild every extent-dependent resource
    fn recreate(&mut self) -> Result<(), Self::Error>;
}

/// Frame slot rotation plus the per-image fence ownership table
#[derive(Debug)]
pub struct FrameScheduler<F> {
    current_frame: usize,
    max_frames_in_flight: usize,
    /// Fence of the last frame that rendered to each swapchain image
    images_in_flight: Vec<Option<F>>,
}

impl<F: Copy + PartialEq> FrameScheduler<F> {
    pub fn new(max_frames_in_flight: usize, image_count: usize) -> Self {
        Self {
            current_frame: 0,
            max_frames_in_flight: max_frames_in_flight.max(1),
            images_in_flight: vec![None; image_count],
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn max_frames_in_flight(&self) -> usize {
        self.max_frames_in_flight
    }

    /// Run one iteration of the frame loop
    pub fn run_frame<B>(&mut self, backend: &mut B) -> Result<FrameStatus, B::Error>
    where
        B: FrameBackend<Fence = F>,
    {
        let slot = self.current_frame;
        let slot_fence = backend.slot_fence(slot);

        // Bounds the CPU to `max_frames_in_flight` frames ahead of the GPU
        backend.wait_for_fence(slot_fence)?;

        let image_index = match backend.acquire_next_image(slot)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    log::debug!("Acquired suboptimal image {}", image_index);
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire");
                self.recreate(backend)?;
                return Ok(FrameStatus::Recreated);
            }
        };
        log::trace!("Frame slot {} rendering to image {}", slot, image_index);

        backend.record(slot, image_index)?;

        let image = image_index as usize;
        if image >= self.images_in_flight.len() {
            self.images_in_flight.resize(image + 1, None);
        }
        if let Some(previous) = self.images_in_flight[image] {
            if previous != slot_fence {
                backend.wait_for_fence(previous)?;
            }
        }
        self.images_in_flight[image] = Some(slot_fence);

        backend.reset_fence(slot_fence)?;
        backend.submit(slot, image_index)?;
        let presented = backend.present(slot, image_index)?;

        self.current_frame = (self.current_frame + 1) % self.max_frames_in_flight;

        if presented.needs_recreation() {
            log::debug!("Present reported {:?}", presented);
            self.recreate(backend)?;
            return Ok(FrameStatus::PresentedAndRecreated);
        }
        Ok(FrameStatus::Presented)
    }

    /// Recreate backend resources and forget image ownership
    pub fn recreate<B>(&mut self, backend: &mut B) -> Result<(), B::Error>
    where
        B: FrameBackend<Fence = F>,
    {
        backend.recreate()?;
        self.images_in_flight = vec![None; backend.image_count()];
        Ok(())
    }
}
