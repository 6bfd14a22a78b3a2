// SPDX-License-Identifier: Apache-2.0

//! Frame rotation between the DMA interrupt and the polling loop.
//!
//! Three frames circulate: one is being filled by DMA, one is held by the polling loop as the
//! current [`Snapshot`](crate::driver::Snapshot), and the third sits in the [`FramePool`] either
//! as the newest completed frame or as a spare.

/// Largest frame, in samples, the DMA buffers can hold
pub const FRAME_CAPACITY: usize = 256;

/// Storage for the three rotating DMA frames
pub type FrameStorage = [[u16; FRAME_CAPACITY]; 3];

/// One frame, trimmed to the configured length
pub type Frame = &'static mut [u16];

/// Slots shared between the DMA interrupt and the polling loop.
///
/// Generic over the frame handle so the rotation can be exercised off-target.
#[derive(Debug)]
pub struct FramePool<B> {
    /// Newest completed frame, not yet taken by the polling loop
    latest: Option<B>,
    /// Frame free for the next DMA transfer
    spare: Option<B>,
    /// Completed frames overwritten before the polling loop took them
    discarded: u32,
    /// Completions where no free frame was available, so nothing was published
    overruns: u32,
}

impl<B> FramePool<B> {
    /// Empty pool, used for the static before acquisition starts
    pub const fn new() -> Self {
        Self {
            latest: None,
            spare: None,
            discarded: 0,
            overruns: 0,
        }
    }

    /// Pool holding one spare frame
    pub fn with_spare(spare: B) -> Self {
        Self {
            spare: Some(spare),
            ..Self::new()
        }
    }

    /// Publish a completed frame and return the frame DMA should fill next.
    ///
    /// The spare frame is preferred. Otherwise the unread previous frame is recycled (its data is
    /// dropped). If neither is available, `finished` itself is handed back and nothing is
    /// published.
    pub fn publish(&mut self, finished: B) -> B {
        let next = match self.spare.take() {
            Some(spare) => Some(spare),
            None => {
                let stale = self.latest.take();
                if stale.is_some() {
                    self.discarded = self.discarded.wrapping_add(1);
                }
                stale
            }
        };

        match next {
            Some(next) => {
                self.latest = Some(finished);
                next
            }
            None => {
                self.overruns = self.overruns.wrapping_add(1);
                finished
            }
        }
    }

    /// Move the newest frame into `held`, returning the previously held frame to the spare slot.
    ///
    /// Returns false, leaving `held` untouched, if nothing new was published.
    pub fn take_latest(&mut self, held: &mut Option<B>) -> bool {
        match self.latest.take() {
            Some(fresh) => {
                if let Some(stale) = held.replace(fresh) {
                    self.spare = Some(stale);
                }
                true
            }
            None => false,
        }
    }

    /// Whether a completed frame is waiting
    pub fn has_latest(&self) -> bool {
        self.latest.is_some()
    }

    /// Completed frames that were overwritten unread
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Completions that could not be published
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

impl<B> Default for FramePool<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frames are identified by a number: DMA fills 0, 1 is spare, 2 is held by the loop
    fn started() -> (FramePool<u8>, u8, Option<u8>) {
        (FramePool::with_spare(1), 0, Some(2))
    }

    #[test]
    fn publish_uses_spare_first() {
        let (mut pool, dma, _held) = started();
        let next = pool.publish(dma);
        assert_eq!(next, 1);
        assert!(pool.has_latest());
        assert_eq!(pool.discarded(), 0);
    }

    #[test]
    fn loop_takes_newest_and_returns_old_frame() {
        let (mut pool, dma, mut held) = started();
        let dma = pool.publish(dma);

        assert!(pool.take_latest(&mut held));
        assert_eq!(held, Some(0));
        assert!(!pool.has_latest());

        // The previously held frame is now the spare
        assert_eq!(pool.publish(dma), 2);
        assert!(pool.take_latest(&mut held));
        assert_eq!(held, Some(1));
    }

    #[test]
    fn unread_frame_is_recycled_when_loop_falls_behind() {
        let (mut pool, dma, mut held) = started();
        let dma = pool.publish(dma); // latest 0, DMA 1
        let dma = pool.publish(dma); // latest 1, DMA 0 (recycled)
        assert_eq!(dma, 0);
        assert_eq!(pool.discarded(), 1);

        assert!(pool.take_latest(&mut held));
        assert_eq!(held, Some(1));
    }

    #[test]
    fn nothing_to_take_leaves_held_frame() {
        let (mut pool, _dma, mut held) = started();
        assert!(!pool.take_latest(&mut held));
        assert_eq!(held, Some(2));
    }

    #[test]
    fn overrun_hands_back_finished_frame() {
        let mut pool: FramePool<u8> = FramePool::new();
        assert_eq!(pool.publish(7), 7);
        assert_eq!(pool.overruns(), 1);
        assert!(!pool.has_latest());
    }
}
