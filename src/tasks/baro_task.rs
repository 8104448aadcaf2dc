use embassy_executor::task;
use embassy_stm32::i2c::I2c;
use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH7, I2C1};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

use crate::baro::Spl06;

/// Latest pressure in Pa. Taken by the board on the altitude pass.
pub static PRESSURE: Signal<CriticalSectionRawMutex, f32> = Signal::new();

/// Barometer task: SPL06 at 20 Hz.
#[task]
pub async fn baro_task(mut i2c: I2c<'static, I2C1, DMA1_CH7, DMA1_CH0>) {
    let mut baro = Spl06::new();
    match baro.init(&mut i2c).await {
        Ok(id) => defmt::info!("baro id {:#x}", id),
        Err(_) => {
            // altitude hold keeps flying on its last estimate
            defmt::warn!("baro init failed");
            return;
        }
    }

    let mut ticker = Ticker::every(Duration::from_hz(20));
    loop {
        ticker.next().await;
        if let Ok(pressure) = baro.read_pressure(&mut i2c).await {
            PRESSURE.signal(pressure);
        }
    }
}
