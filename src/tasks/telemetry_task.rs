use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH4, UART4};
use embassy_stm32::usart::UartTx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};

use multirotor_fc::drivers::crsf::Frame;
use multirotor_fc::drivers::telemetry::FrameSink;
use multirotor_fc::{Error, Result};

pub const TELEMETRY_QUEUE: usize = 4;

pub type FrameSender = Sender<'static, CriticalSectionRawMutex, Frame, TELEMETRY_QUEUE>;
pub type FrameReceiver = Receiver<'static, CriticalSectionRawMutex, Frame, TELEMETRY_QUEUE>;

/// Drains queued CRSF frames to UART4 TX.
#[task]
pub async fn telemetry_task(mut uart_tx: UartTx<'static, UART4, DMA1_CH4>, frames: FrameReceiver) {
    loop {
        let frame = frames.receive().await;
        if uart_tx.write(&frame).await.is_err() {
            defmt::debug!("crsf tx error");
        }
    }
}

/// Controller-side queue handle. Never blocks: a full queue drops the frame.
pub struct ChannelSink {
    tx: FrameSender,
}

impl ChannelSink {
    pub fn new(tx: FrameSender) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn try_send(&mut self, frame: &[u8]) -> Result<()> {
        let frame = Frame::from_slice(frame).map_err(|_| Error::BufferFull)?;
        self.tx.try_send(frame).map_err(|_| Error::BufferFull)
    }
}
