//! Frame synchronization primitives.

use crate::error::Result;
use ash::vk;

/// Number of frames the CPU may have submitted without waiting for the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Create a semaphore.
pub fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
    Ok(semaphore)
}

/// Create a fence, optionally already signaled.
pub fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = unsafe { device.create_fence(&create_info, None)? };
    Ok(fence)
}

/// Block until a fence is signaled.
pub fn wait_for_fence(device: &ash::Device, fence: vk::Fence, timeout_ns: u64) -> Result<()> {
    unsafe { device.wait_for_fences(&[fence], true, timeout_ns)? };
    Ok(())
}

/// Reset a fence to the unsignaled state.
pub fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.reset_fences(&[fence])? };
    Ok(())
}

/// Synchronization primitives for one in-flight frame slot.
pub struct FrameSync {
    /// Signaled when the presentation engine releases the acquired image.
    pub image_available: vk::Semaphore,
    /// Signaled when rendering commands for this slot finish.
    pub render_finished: vk::Semaphore,
    /// Signaled when the command buffer submitted under this slot completes.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create the slot's primitives. The fence starts signaled so the first
    /// wait on a fresh slot falls through.
    pub fn new(device: &ash::Device) -> Result<Self> {
        Ok(Self {
            image_available: create_semaphore(device)?,
            render_finished: create_semaphore(device)?,
            in_flight: create_fence(device, true)?,
        })
    }

    /// Wait until this slot's previous submission completes.
    pub fn wait(&self, device: &ash::Device) -> Result<()> {
        wait_for_fence(device, self.in_flight, u64::MAX)
    }

    /// Reset the fence so the next submission can signal it.
    pub fn reset(&self, device: &ash::Device) -> Result<()> {
        reset_fence(device, self.in_flight)
    }

    /// Destroy the slot's primitives.
    ///
    /// # Safety
    /// The primitives must not be in use by the GPU.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_semaphore(self.image_available, None);
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_fence(self.in_flight, None);
    }
}

/// Bounded ring of in-flight frame slots.
///
/// The cursor advances modulo the slot count, so with two slots the draw loop
/// alternates 0, 1, 0, 1, ... and a slot is only reused once its fence wait
/// proves the GPU is done with it.
pub struct FrameRing {
    slots: Vec<FrameSync>,
    cursor: usize,
}

impl FrameRing {
    /// Create a ring with the given number of in-flight slots.
    pub fn new(device: &ash::Device, frames_in_flight: usize) -> Result<Self> {
        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            slots.push(FrameSync::new(device)?);
        }

        Ok(Self { slots, cursor: 0 })
    }

    /// Get the current slot's primitives.
    pub fn current(&self) -> &FrameSync {
        &self.slots[self.cursor]
    }

    /// Get the current slot index.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of slots in the ring.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Advance to the next slot, wrapping at the ring size.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Destroy all slots.
    ///
    /// # Safety
    /// No slot may be in use by the GPU.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for slot in &self.slots {
            slot.destroy(device);
        }
    }
}

/// Per-swapchain-image fence bookkeeping.
///
/// The frame ring's fence only proves the slot's own previous submission
/// finished; the presentation engine may hand out the same image on two
/// consecutive acquires (MAILBOX does this under load). This tracks which
/// fence guards the last submission against each image so that work is never
/// resubmitted for an image still in flight.
pub struct ImageFences {
    fences: Vec<vk::Fence>,
}

impl ImageFences {
    /// Create a tracker with no image in flight.
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Record `fence` as guarding `image_index`, returning the fence of the
    /// previous submission against that image if one is still tracked. The
    /// caller must wait on the returned fence before submitting.
    pub fn replace(&mut self, image_index: usize, fence: vk::Fence) -> Option<vk::Fence> {
        let previous = self.fences[image_index];
        self.fences[image_index] = fence;
        (previous != vk::Fence::null()).then_some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    // Cursor arithmetic only; no device needed.
    fn ring_with_slots(count: usize) -> FrameRing {
        let slots = (0..count)
            .map(|_| FrameSync {
                image_available: vk::Semaphore::null(),
                render_finished: vk::Semaphore::null(),
                in_flight: vk::Fence::null(),
            })
            .collect();
        FrameRing { slots, cursor: 0 }
    }

    #[test]
    fn two_slot_ring_alternates() {
        let mut ring = ring_with_slots(MAX_FRAMES_IN_FLIGHT);

        let mut observed = Vec::new();
        for _ in 0..6 {
            observed.push(ring.cursor());
            ring.advance();
        }

        assert_eq!(observed, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn cursor_wraps_at_ring_size() {
        let mut ring = ring_with_slots(3);
        for _ in 0..3 {
            ring.advance();
        }
        assert_eq!(ring.cursor(), 0);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn fresh_image_has_no_pending_fence() {
        let mut fences = ImageFences::new(3);
        assert_eq!(fences.replace(0, vk::Fence::from_raw(1)), None);
    }

    #[test]
    fn reacquired_image_yields_its_pending_fence() {
        // Same image handed out on two consecutive acquires: the second
        // caller must wait on the first submission's fence.
        let mut fences = ImageFences::new(3);
        let slot_a = vk::Fence::from_raw(1);
        let slot_b = vk::Fence::from_raw(2);

        assert_eq!(fences.replace(1, slot_a), None);
        assert_eq!(fences.replace(1, slot_b), Some(slot_a));
        assert_eq!(fences.replace(1, slot_a), Some(slot_b));
    }

    #[test]
    fn images_are_tracked_independently() {
        let mut fences = ImageFences::new(2);
        let slot_a = vk::Fence::from_raw(1);
        let slot_b = vk::Fence::from_raw(2);

        assert_eq!(fences.replace(0, slot_a), None);
        assert_eq!(fences.replace(1, slot_b), None);
        assert_eq!(fences.replace(0, slot_b), Some(slot_a));
    }
}
