//! The acquire, record, submit and present cycle over K frame slots

use crate::core::config::MAX_FRAMES_IN_FLIGHT;
use crate::render::frame::{AcquireOutcome, PresentationEngine, PresentationResult};
use crate::render::vulkan::{FrameSlot, VulkanError, VulkanResult};
use crate::render::window::PresentationSurface;

/// Bounds CPU race-ahead to K frames and rebuilds the swapchain on demand
///
/// Each slot owns an image-available semaphore, a render-finished semaphore
/// and a fence. The scheduler also remembers which slot last claimed each
/// swapchain image so a slot never records against an image that another
/// slot's unfinished work still targets.
pub struct FrameScheduler<E: PresentationEngine> {
    // Slots are destroyed before the engine.
    slots: Vec<FrameSlot<E::Semaphore, E::Fence>>,
    images_in_flight: Vec<Option<usize>>,
    current_frame: usize,
    suboptimal: bool,
    engine: E,
}

impl<E: PresentationEngine> FrameScheduler<E> {
    /// Create `frames_in_flight` slots with signaled fences
    pub fn new(engine: E, frames_in_flight: usize) -> VulkanResult<Self> {
        if frames_in_flight == 0 || frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "frames in flight must be between 1 and {}, got {}",
                    MAX_FRAMES_IN_FLIGHT, frames_in_flight
                ),
            });
        }

        let slots = (0..frames_in_flight)
            .map(|_| {
                Ok(FrameSlot {
                    image_available: engine.create_semaphore()?,
                    render_finished: engine.create_semaphore()?,
                    in_flight: engine.create_fence(true)?,
                })
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!(
            "Frame scheduler ready: {} frames in flight over {} images",
            frames_in_flight,
            engine.image_count()
        );

        Ok(Self {
            slots,
            images_in_flight: vec![None; engine.image_count()],
            current_frame: 0,
            suboptimal: false,
            engine,
        })
    }

    /// Run one frame, calling `render` to record it
    ///
    /// `SurfaceOutOfDate` from acquisition returns before `render` is called
    /// and before any fence is touched. `SurfaceOutOfDate` from presentation
    /// returns after submission. In both cases the current slot is kept and
    /// the caller is expected to [`rebuild`](Self::rebuild).
    pub fn run_frame<Err, F>(&mut self, render: F) -> Result<PresentationResult, Err>
    where
        F: FnOnce(&mut E::Frame) -> Result<(), Err>,
        Err: From<VulkanError>,
    {
        let slot_index = self.current_frame;
        let slot = &self.slots[slot_index];

        self.engine.wait_for_fence(&slot.in_flight)?;

        let (image_index, acquire_suboptimal) = match self.engine.acquire_next_image(&slot.image_available)? {
            AcquireOutcome::Acquired { index, suboptimal } => (index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::warn!("Swapchain out of date");
                return Ok(PresentationResult::SurfaceOutOfDate);
            }
        };

        if acquire_suboptimal {
            track_suboptimal(&mut self.suboptimal, true);
        }

        let image = image_index as usize;
        if image >= self.images_in_flight.len() {
            self.images_in_flight.resize(image + 1, None);
        }
        if let Some(owner) = self.images_in_flight[image] {
            if owner != slot_index {
                self.engine.wait_for_fence(&self.slots[owner].in_flight)?;
            }
        }
        self.images_in_flight[image] = Some(slot_index);

        let frame = self.engine.begin_frame(slot_index, image_index)?;
        render(frame)?;

        self.engine.reset_fence(&slot.in_flight)?;
        self.engine.submit(
            slot_index,
            image_index,
            &slot.image_available,
            &slot.render_finished,
            &slot.in_flight,
        )?;

        let result = self.engine.present(image_index, &slot.render_finished)?;
        if result == PresentationResult::SurfaceOutOfDate {
            log::warn!("Swapchain out of date");
            return Ok(result);
        }

        self.current_frame = (self.current_frame + 1) % self.slots.len();

        let suboptimal = acquire_suboptimal || result == PresentationResult::Suboptimal;
        track_suboptimal(&mut self.suboptimal, suboptimal);
        if suboptimal {
            Ok(PresentationResult::Suboptimal)
        } else {
            Ok(PresentationResult::Success)
        }
    }

    /// Replace the swapchain after it went out of date or the surface resized
    ///
    /// Blocks on window events while the drawable area is empty. Returns
    /// without rebuilding if the window closes during that stall. The
    /// current slot index is kept; semaphores are recreated and the image
    /// claims are cleared.
    pub fn rebuild<S: PresentationSurface + ?Sized>(&mut self, surface: &mut S) -> VulkanResult<()> {
        while surface.is_minimized() {
            if !surface.is_open() {
                log::debug!("Window closed while minimized, skipping swapchain rebuild");
                return Ok(());
            }
            surface.wait_events();
        }
        let drawable_size = surface.drawable_size();

        self.engine.wait_idle()?;
        self.engine.rebuild(drawable_size)?;

        for slot in &mut self.slots {
            slot.image_available = self.engine.create_semaphore()?;
            slot.render_finished = self.engine.create_semaphore()?;
        }
        self.images_in_flight = vec![None; self.engine.image_count()];
        self.suboptimal = false;

        log::debug!(
            "Rebuilt swapchain for {}x{} drawable area",
            drawable_size.0,
            drawable_size.1
        );
        Ok(())
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.engine.wait_idle()
    }

    /// Slot the next frame will use
    pub const fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Whether the last acquired or presented image was suboptimal
    pub const fn is_suboptimal(&self) -> bool {
        self.suboptimal
    }

    /// Slot that last claimed swapchain image `image_index`
    pub fn image_owner(&self, image_index: u32) -> Option<usize> {
        self.images_in_flight.get(image_index as usize).copied().flatten()
    }

    /// The presentation engine
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// The presentation engine, mutably
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

/// Log only when the swapchain enters or leaves the suboptimal state
fn track_suboptimal(state: &mut bool, suboptimal: bool) {
    if suboptimal == *state {
        return;
    }
    if suboptimal {
        log::warn!("Swapchain is suboptimal for the surface");
    } else {
        log::info!("Swapchain is optimal again");
    }
    *state = suboptimal;
}

impl<E: PresentationEngine> Drop for FrameScheduler<E> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.wait_idle() {
            log::warn!("wait_idle failed before frame scheduler teardown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vulkan::swapchain::{SwapchainSettings, SwapchainSupport};
    use ash::vk;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        WaitFence(usize),
        ResetFence(usize),
        Acquire { semaphore: u64 },
        Record { slot: usize, image: u32 },
        Submit { slot: usize, image: u32, fence: usize },
        Present(u32),
        WaitIdle,
        WaitEvents,
        Rebuild((u32, u32)),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct MockSemaphore {
        id: u64,
    }

    struct MockFence {
        id: usize,
        signaled: Rc<Cell<bool>>,
    }

    struct MockFrame {
        log: Log,
        slot: usize,
        image: u32,
        framebuffer: u64,
        render_pass: u64,
        recorded: bool,
    }

    impl MockFrame {
        fn record(&mut self) {
            self.log.borrow_mut().push(Event::Record {
                slot: self.slot,
                image: self.image,
            });
            self.recorded = true;
        }
    }

    /// Fences only signal when the CPU waits on them, so outstanding work
    /// stays outstanding for as long as possible.
    struct MockEngine {
        log: Log,
        fences: RefCell<Vec<Rc<Cell<bool>>>>,
        next_semaphore: Cell<u64>,
        generation: u64,
        next_image: u32,
        acquire_script: VecDeque<AcquireOutcome>,
        present_script: VecDeque<PresentationResult>,
        // operation name -> fail the next call to it
        failures: Vec<&'static str>,
        support: SwapchainSupport,
        vsync: bool,
        settings: SwapchainSettings,
        frame: MockFrame,
        // fence id -> image its unfinished work targets
        claims: HashMap<usize, u32>,
        max_outstanding: usize,
        image_conflicts: usize,
    }

    impl MockEngine {
        fn new(log: &Log, min_images: u32) -> Self {
            let support = SwapchainSupport {
                capabilities: vk::SurfaceCapabilitiesKHR {
                    min_image_count: min_images,
                    max_image_count: min_images,
                    current_extent: vk::Extent2D {
                        width: u32::MAX,
                        height: u32::MAX,
                    },
                    min_image_extent: vk::Extent2D { width: 1, height: 1 },
                    max_image_extent: vk::Extent2D {
                        width: 4096,
                        height: 4096,
                    },
                    ..Default::default()
                },
                formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            };
            let settings = SwapchainSettings::select(&support, (800, 600), true).unwrap();

            Self {
                log: Rc::clone(log),
                fences: RefCell::new(Vec::new()),
                next_semaphore: Cell::new(0),
                generation: 1,
                next_image: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                failures: Vec::new(),
                support,
                vsync: true,
                settings,
                frame: MockFrame {
                    log: Rc::clone(log),
                    slot: 0,
                    image: 0,
                    framebuffer: 0,
                    render_pass: 0,
                    recorded: false,
                },
                claims: HashMap::new(),
                max_outstanding: 0,
                image_conflicts: 0,
            }
        }

        fn push(&self, event: Event) {
            self.log.borrow_mut().push(event);
        }

        fn fail(&mut self, operation: &'static str) -> VulkanResult<()> {
            match self.failures.iter().position(|&op| op == operation) {
                Some(index) => {
                    self.failures.remove(index);
                    Err(VulkanError::Call {
                        operation,
                        result: vk::Result::ERROR_DEVICE_LOST,
                    })
                }
                None => Ok(()),
            }
        }

        fn outstanding(&self) -> usize {
            self.fences.borrow().iter().filter(|fence| !fence.get()).count()
        }
    }

    impl PresentationEngine for MockEngine {
        type Semaphore = MockSemaphore;
        type Fence = MockFence;
        type Frame = MockFrame;

        fn create_semaphore(&self) -> VulkanResult<MockSemaphore> {
            let id = self.next_semaphore.get();
            self.next_semaphore.set(id + 1);
            Ok(MockSemaphore { id })
        }

        fn create_fence(&self, signaled: bool) -> VulkanResult<MockFence> {
            let state = Rc::new(Cell::new(signaled));
            let mut fences = self.fences.borrow_mut();
            fences.push(Rc::clone(&state));
            Ok(MockFence {
                id: fences.len() - 1,
                signaled: state,
            })
        }

        fn wait_for_fence(&self, fence: &MockFence) -> VulkanResult<()> {
            self.push(Event::WaitFence(fence.id));
            fence.signaled.set(true);
            Ok(())
        }

        fn reset_fence(&self, fence: &MockFence) -> VulkanResult<()> {
            self.push(Event::ResetFence(fence.id));
            fence.signaled.set(false);
            Ok(())
        }

        fn image_count(&self) -> usize {
            self.settings.image_count as usize
        }

        fn acquire_next_image(&mut self, signal: &MockSemaphore) -> VulkanResult<AcquireOutcome> {
            self.push(Event::Acquire { semaphore: signal.id });
            self.fail("acquire next image")?;
            if let Some(outcome) = self.acquire_script.pop_front() {
                return Ok(outcome);
            }
            let index = self.next_image;
            self.next_image = (self.next_image + 1) % self.settings.image_count;
            Ok(AcquireOutcome::Acquired {
                index,
                suboptimal: false,
            })
        }

        fn begin_frame(&mut self, slot: usize, image_index: u32) -> VulkanResult<&mut MockFrame> {
            self.frame.slot = slot;
            self.frame.image = image_index;
            self.frame.framebuffer = self.generation * 100 + u64::from(image_index);
            self.frame.render_pass = self.generation;
            self.frame.recorded = false;
            Ok(&mut self.frame)
        }

        fn submit(
            &mut self,
            slot: usize,
            image_index: u32,
            _wait: &MockSemaphore,
            _signal: &MockSemaphore,
            fence: &MockFence,
        ) -> VulkanResult<()> {
            if !self.frame.recorded {
                return Err(VulkanError::MissingCommandBuffer);
            }
            self.fail("queue submit")?;
            assert!(!fence.signaled.get(), "submitted with a signaled fence");

            let fences = self.fences.borrow();
            let conflicts = self
                .claims
                .iter()
                .filter(|&(&id, &image)| id != fence.id && image == image_index && !fences[id].get())
                .count();
            drop(fences);
            self.image_conflicts += conflicts;
            self.claims.insert(fence.id, image_index);
            self.max_outstanding = self.max_outstanding.max(self.outstanding());

            self.push(Event::Submit {
                slot,
                image: image_index,
                fence: fence.id,
            });
            Ok(())
        }

        fn present(&mut self, image_index: u32, _wait: &MockSemaphore) -> VulkanResult<PresentationResult> {
            self.push(Event::Present(image_index));
            self.fail("queue present")?;
            Ok(self.present_script.pop_front().unwrap_or(PresentationResult::Success))
        }

        fn wait_idle(&self) -> VulkanResult<()> {
            self.push(Event::WaitIdle);
            for fence in self.fences.borrow().iter() {
                fence.set(true);
            }
            Ok(())
        }

        fn rebuild(&mut self, drawable_size: (u32, u32)) -> VulkanResult<()> {
            self.push(Event::Rebuild(drawable_size));
            self.settings = SwapchainSettings::select(&self.support, drawable_size, self.vsync)?;
            self.generation += 1;
            self.next_image = 0;
            self.claims.clear();
            Ok(())
        }
    }

    struct MockSurface {
        log: Log,
        open: bool,
        size: (u32, u32),
        pending_sizes: VecDeque<(u32, u32)>,
    }

    impl MockSurface {
        fn new(log: &Log, size: (u32, u32)) -> Self {
            Self {
                log: Rc::clone(log),
                open: true,
                size,
                pending_sizes: VecDeque::new(),
            }
        }
    }

    impl PresentationSurface for MockSurface {
        fn is_open(&self) -> bool {
            self.open
        }

        fn drawable_size(&self) -> (u32, u32) {
            self.size
        }

        fn poll_events(&mut self) {}

        fn wait_events(&mut self) {
            self.log.borrow_mut().push(Event::WaitEvents);
            match self.pending_sizes.pop_front() {
                Some(size) => self.size = size,
                None => self.open = false,
            }
        }
    }

    fn scheduler(log: &Log, min_images: u32, frames_in_flight: usize) -> FrameScheduler<MockEngine> {
        FrameScheduler::new(MockEngine::new(log, min_images), frames_in_flight).unwrap()
    }

    fn record(frame: &mut MockFrame) -> VulkanResult<()> {
        frame.record();
        Ok(())
    }

    #[test]
    fn test_slots_rotate_on_success() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);

        assert_eq!(scheduler.run_frame(record).unwrap(), PresentationResult::Success);
        assert_eq!(scheduler.current_frame(), 1);
        assert_eq!(scheduler.run_frame(record).unwrap(), PresentationResult::Success);
        assert_eq!(scheduler.current_frame(), 0);
    }

    #[test]
    fn test_frame_steps_in_order() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        log.borrow_mut().clear();

        scheduler.run_frame(record).unwrap();

        let events = log.borrow().clone();
        assert_eq!(events[0], Event::WaitFence(0));
        assert!(matches!(events[1], Event::Acquire { .. }));
        assert_eq!(events[2], Event::Record { slot: 0, image: 0 });
        assert_eq!(events[3], Event::ResetFence(0));
        assert_eq!(
            events[4],
            Event::Submit {
                slot: 0,
                image: 0,
                fence: 0
            }
        );
        assert_eq!(events[5], Event::Present(0));
    }

    #[test]
    fn test_out_of_date_acquire_rebuilds_without_advancing() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        let mut surface = MockSurface::new(&log, (800, 600));
        let mut last_target = (0, 0);

        for _ in 0..4 {
            let result = scheduler.run_frame(|frame: &mut MockFrame| {
                last_target = (frame.framebuffer, frame.render_pass);
                record(frame)
            });
            assert_eq!(result.unwrap(), PresentationResult::Success);
        }

        let frame_before = scheduler.current_frame();
        scheduler.engine_mut().acquire_script.push_back(AcquireOutcome::OutOfDate);
        log.borrow_mut().clear();

        let mut called = false;
        let result = scheduler.run_frame(|frame: &mut MockFrame| {
            called = true;
            record(frame)
        });
        assert_eq!(result.unwrap(), PresentationResult::SurfaceOutOfDate);
        assert!(!called);
        assert_eq!(scheduler.current_frame(), frame_before);
        assert!(log
            .borrow()
            .iter()
            .all(|event| matches!(event, Event::WaitFence(_) | Event::Acquire { .. })));

        scheduler.rebuild(&mut surface).unwrap();
        assert_eq!(scheduler.current_frame(), frame_before);

        let mut rebuilt_target = (0, 0);
        scheduler
            .run_frame(|frame: &mut MockFrame| {
                rebuilt_target = (frame.framebuffer, frame.render_pass);
                record(frame)
            })
            .unwrap();
        assert_ne!(rebuilt_target.0, last_target.0);
        assert_ne!(rebuilt_target.1, last_target.1);
    }

    #[test]
    fn test_same_image_waits_for_previous_slot() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        for _ in 0..2 {
            scheduler.engine_mut().acquire_script.push_back(AcquireOutcome::Acquired {
                index: 0,
                suboptimal: false,
            });
        }

        scheduler.run_frame(record).unwrap();
        log.borrow_mut().clear();
        scheduler.run_frame(record).unwrap();

        let events = log.borrow().clone();
        let wait_first = events.iter().position(|e| *e == Event::WaitFence(0));
        let record_second = events.iter().position(|e| *e == Event::Record { slot: 1, image: 0 });
        assert!(wait_first.is_some());
        assert!(record_second.is_some());
        assert!(wait_first < record_second);
        assert_eq!(scheduler.image_owner(0), Some(1));
        assert_eq!(scheduler.engine().image_conflicts, 0);
    }

    #[test]
    fn test_outstanding_frames_bounded() {
        for frames_in_flight in 2..=4 {
            let log = Log::default();
            let mut scheduler = scheduler(&log, 3, frames_in_flight);
            for _ in 0..32 {
                scheduler.run_frame(record).unwrap();
                assert!(scheduler.engine().outstanding() <= frames_in_flight);
            }
            // three images cap how many slots can hold unfinished work
            assert_eq!(scheduler.engine().max_outstanding, frames_in_flight.min(3));
        }
    }

    #[test]
    fn test_image_never_claimed_by_two_unfinished_slots() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 3);
        for index in [0, 1, 1, 0, 2, 2, 1, 0, 0, 2, 1, 1] {
            scheduler.engine_mut().acquire_script.push_back(AcquireOutcome::Acquired {
                index,
                suboptimal: false,
            });
        }

        for _ in 0..12 {
            scheduler.run_frame(record).unwrap();
        }
        assert_eq!(scheduler.engine().image_conflicts, 0);
    }

    #[test]
    fn test_rebuild_twice_is_idempotent() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        let mut surface = MockSurface::new(&log, (1024, 768));

        scheduler.rebuild(&mut surface).unwrap();
        let first = scheduler.engine().settings;
        scheduler.rebuild(&mut surface).unwrap();
        let second = scheduler.engine().settings;

        assert_eq!(first.extent, second.extent);
        assert_eq!(first.surface_format, second.surface_format);
        assert_eq!(first.extent, vk::Extent2D { width: 1024, height: 768 });
    }

    #[test]
    fn test_minimized_window_stalls_before_rebuild() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        let mut surface = MockSurface::new(&log, (0, 0));
        surface.pending_sizes.extend([(0, 600), (800, 600)]);
        log.borrow_mut().clear();

        scheduler.rebuild(&mut surface).unwrap();

        let events = log.borrow().clone();
        assert_eq!(
            &events[..4],
            &[
                Event::WaitEvents,
                Event::WaitEvents,
                Event::WaitIdle,
                Event::Rebuild((800, 600))
            ]
        );
    }

    #[test]
    fn test_window_closed_while_minimized_skips_rebuild() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        let mut surface = MockSurface::new(&log, (0, 0));
        log.borrow_mut().clear();

        scheduler.rebuild(&mut surface).unwrap();

        assert_eq!(log.borrow().as_slice(), &[Event::WaitEvents]);
    }

    #[test]
    fn test_rebuild_recreates_semaphores_and_clears_claims() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        let mut surface = MockSurface::new(&log, (800, 600));

        let before: Vec<u64> = scheduler.slots.iter().map(|slot| slot.image_available.id).collect();
        scheduler.run_frame(record).unwrap();
        assert_eq!(scheduler.image_owner(0), Some(0));

        scheduler.rebuild(&mut surface).unwrap();

        let after: Vec<u64> = scheduler.slots.iter().map(|slot| slot.image_available.id).collect();
        assert!(before.iter().all(|id| !after.contains(id)));
        assert_eq!(scheduler.image_owner(0), None);
        assert_eq!(
            scheduler.slots.iter().map(|slot| slot.in_flight.id).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_missing_command_buffer_is_fatal() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);

        let result = scheduler.run_frame(|_: &mut MockFrame| Ok::<(), VulkanError>(()));
        assert!(matches!(result, Err(VulkanError::MissingCommandBuffer)));
        assert_eq!(scheduler.current_frame(), 0);
    }

    #[test]
    fn test_render_error_propagates() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);

        let result = scheduler.run_frame(|_: &mut MockFrame| Err(VulkanError::Shader("broken".to_string())));
        assert!(matches!(result, Err(VulkanError::Shader(_))));
        assert!(!log.borrow().iter().any(|event| matches!(event, Event::Submit { .. })));
    }

    #[test]
    fn test_suboptimal_is_not_an_error() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        scheduler.engine_mut().acquire_script.push_back(AcquireOutcome::Acquired {
            index: 0,
            suboptimal: true,
        });

        assert_eq!(scheduler.run_frame(record).unwrap(), PresentationResult::Suboptimal);
        assert!(scheduler.is_suboptimal());
        assert_eq!(scheduler.current_frame(), 1);

        assert_eq!(scheduler.run_frame(record).unwrap(), PresentationResult::Success);
        assert!(!scheduler.is_suboptimal());
    }

    #[test]
    fn test_suboptimal_present_is_tracked() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        scheduler.engine_mut().present_script.push_back(PresentationResult::Suboptimal);

        assert_eq!(scheduler.run_frame(record).unwrap(), PresentationResult::Suboptimal);
        assert!(scheduler.is_suboptimal());
        assert_eq!(scheduler.current_frame(), 1);

        assert_eq!(scheduler.run_frame(record).unwrap(), PresentationResult::Success);
        assert!(!scheduler.is_suboptimal());
    }

    #[test]
    fn test_failed_acquire_is_fatal() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        scheduler.run_frame(record).unwrap();
        scheduler.engine_mut().failures.push("acquire next image");

        let mut called = false;
        let result = scheduler.run_frame(|frame: &mut MockFrame| {
            called = true;
            record(frame)
        });

        assert!(matches!(
            result,
            Err(VulkanError::Call {
                operation: "acquire next image",
                ..
            })
        ));
        assert!(!called);
        assert_eq!(scheduler.current_frame(), 1);
    }

    #[test]
    fn test_failed_submit_is_fatal_and_skips_present() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        scheduler.engine_mut().failures.push("queue submit");
        log.borrow_mut().clear();

        let result = scheduler.run_frame(record);

        assert!(matches!(
            result,
            Err(VulkanError::Call {
                operation: "queue submit",
                ..
            })
        ));
        assert_eq!(scheduler.current_frame(), 0);
        assert!(!log.borrow().iter().any(|event| matches!(event, Event::Present(_))));
    }

    #[test]
    fn test_failed_present_is_fatal() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        scheduler.engine_mut().failures.push("queue present");

        let result = scheduler.run_frame(record);

        assert!(matches!(
            result,
            Err(VulkanError::Call {
                operation: "queue present",
                ..
            })
        ));
        assert_eq!(scheduler.current_frame(), 0);
        assert!(log.borrow().iter().any(|event| matches!(event, Event::Submit { .. })));
    }

    #[test]
    fn test_out_of_date_present_keeps_slot() {
        let log = Log::default();
        let mut scheduler = scheduler(&log, 2, 2);
        scheduler
            .engine_mut()
            .present_script
            .push_back(PresentationResult::SurfaceOutOfDate);

        assert_eq!(scheduler.run_frame(record).unwrap(), PresentationResult::SurfaceOutOfDate);
        assert_eq!(scheduler.current_frame(), 0);
        assert!(log.borrow().iter().any(|event| matches!(event, Event::Submit { .. })));
    }

    #[test]
    fn test_rejects_bad_frame_count() {
        let log = Log::default();
        assert!(FrameScheduler::new(MockEngine::new(&log, 2), 0).is_err());
        assert!(FrameScheduler::new(MockEngine::new(&log, 2), MAX_FRAMES_IN_FLIGHT + 1).is_err());
    }
}
