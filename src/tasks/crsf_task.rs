use core::sync::atomic::{AtomicBool, Ordering};

use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH2, UART4};
use embassy_stm32::usart::UartRx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use multirotor_fc::drivers::crsf::{CrsfParser, RcChannels};
use multirotor_fc::drivers::receiver::RcLink;

/// Newest channel frame. Each frame overwrites the one before it.
pub static RC_CHANNELS: Signal<CriticalSectionRawMutex, RcChannels> = Signal::new();

/// Failsafe flag from the last link statistics frame.
pub static LINK_FAILSAFE: AtomicBool = AtomicBool::new(false);

/// CRSF/ELRS input: parses UART4 RX, publishes channels and link state.
#[task]
pub async fn crsf_task(mut uart_rx: UartRx<'static, UART4, DMA1_CH2>) {
    let mut parser = CrsfParser::new();
    let mut buf = [0u8; 64];

    loop {
        match uart_rx.read_until_idle(&mut buf).await {
            Ok(n) => {
                let latest = parser.push_bytes(&buf[..n]);
                if let Some(stats) = latest.link {
                    LINK_FAILSAFE.store(stats.failsafe(), Ordering::Relaxed);
                }
                if let Some(rc) = latest.channels {
                    RC_CHANNELS.signal(rc);
                }
            }
            Err(_) => defmt::debug!("crsf rx error"),
        }
    }
}

/// Controller-side view of the CRSF task, polled by the pilot-command loop.
pub struct CrsfLink;

impl RcLink for CrsfLink {
    fn poll(&mut self) -> Option<RcChannels> {
        RC_CHANNELS.try_take()
    }

    fn failsafe(&self) -> bool {
        LINK_FAILSAFE.load(Ordering::Relaxed)
    }
}
