// SPDX-License-Identifier: Apache-2.0

//! Interrupt handlers, plus the statics they share with the main loop.

use crate::signal::CompletionSignal;

/// Completion handoff from `DMA_IRQ_0` to the polling loop
pub static COMPLETION: CompletionSignal = CompletionSignal::new();

#[cfg(feature = "rp2040")]
pub(crate) use board::{ACTIVE_TRANSFER, FRAMES, ON_COMPLETE};

#[cfg(feature = "rp2040")]
mod board {
    use core::cell::{Cell, RefCell};

    use critical_section::Mutex;
    use rp2040_hal::{
        adc::DmaReadTarget,
        dma::{single_buffer, Channel, SingleChannel, CH0},
        pac::interrupt,
    };

    use crate::{
        buffer::{Frame, FramePool},
        signal::CompletionSignal,
    };

    /// DMA transfer currently filling a frame from the ADC FIFO
    pub(crate) type FrameTransfer =
        single_buffer::Transfer<Channel<CH0>, DmaReadTarget<u16>, Frame>;

    /// Transfer in flight, owned by `DMA_IRQ_0` once acquisition starts
    pub(crate) static ACTIVE_TRANSFER: Mutex<RefCell<Option<FrameTransfer>>> =
        Mutex::new(RefCell::new(None));
    /// Completed and spare frames
    pub(crate) static FRAMES: Mutex<RefCell<FramePool<Frame>>> =
        Mutex::new(RefCell::new(FramePool::new()));
    /// Completion callback registered by the driver
    pub(crate) static ON_COMPLETE: Mutex<Cell<Option<&'static CompletionSignal>>> =
        Mutex::new(Cell::new(None));

    /// A frame finished: publish it, restart DMA on the next free frame, then signal completion.
    #[interrupt]
    fn DMA_IRQ_0() {
        critical_section::with(|cs| {
            let mut active = ACTIVE_TRANSFER.borrow_ref_mut(cs);
            let Some(transfer) = active.take() else {
                return;
            };
            if !transfer.is_done() {
                *active = Some(transfer);
                return;
            }

            let (mut channel, fifo, finished) = transfer.wait();
            channel.check_irq0();
            let next = FRAMES.borrow_ref_mut(cs).publish(finished);
            *active = Some(single_buffer::Config::new(channel, fifo, next).start());

            if let Some(signal) = ON_COMPLETE.borrow(cs).get() {
                signal.signal();
            }
        });
    }
}
