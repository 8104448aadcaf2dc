#![no_std]
#![no_main]

mod baro;
mod board;
mod esc;
mod imu;
mod tasks;

use embassy_executor::Spawner;
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use {defmt_rtt as _, panic_probe as _};

use multirotor_fc::config::{Model, OrchestratorConfig};
use multirotor_fc::drivers::altitude::BaroAltitudeHold;
use multirotor_fc::drivers::crsf::Frame;
use multirotor_fc::drivers::mixer::QuadXMixer;
use multirotor_fc::drivers::pid::PidStabilizer;
use multirotor_fc::drivers::receiver::RcReceiver;
use multirotor_fc::drivers::telemetry::CrsfTelemetry;
use multirotor_fc::FlightController;

use crate::board::Stm32Board;
use crate::esc::{AtomicEscs, Dshot300};
use crate::imu::Icm42688;
use crate::tasks::crsf_task::CrsfLink;
use crate::tasks::telemetry_task::{ChannelSink, TELEMETRY_QUEUE};

// ── Inter-task channels ───────────────────────────────────────────────────────
static TELEMETRY_CHAN: Channel<CriticalSectionRawMutex, Frame, TELEMETRY_QUEUE> = Channel::new();

bind_interrupts!(struct Irqs {
    I2C1_EV => embassy_stm32::i2c::EventInterruptHandler<peripherals::I2C1>;
    I2C1_ER => embassy_stm32::i2c::ErrorInterruptHandler<peripherals::I2C1>;
    UART4   => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Clocks (168 MHz PLL)
    let p = board::init_clocks();

    // 2. SPI1 @ 10 MHz, ICM-42688 (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = TimeHertz(10_000_000);
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_config);
    let cs_gyro = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let imu = Icm42688::new(spi, cs_gyro);

    let led = Output::new(p.PC13.degrade(), Level::Low, Speed::Low);

    // 3. I2C1 @ 400 kHz, SPL06 (SCL=PB8, SDA=PB9)
    let i2c = I2c::new(
        p.I2C1,
        p.PB8,
        p.PB9,
        Irqs,
        p.DMA1_CH7,
        p.DMA1_CH0,
        TimeHertz(400_000),
        Default::default(),
    );
    spawner.spawn(tasks::baro_task::baro_task(i2c)).unwrap();

    // 4. ESCs on the MOTOR1..4 pads, stopped until the mixer says otherwise
    let escs = [
        Dshot300::new(p.PB0.degrade()),
        Dshot300::new(p.PB1.degrade()),
        Dshot300::new(p.PA3.degrade()),
        Dshot300::new(p.PA2.degrade()),
    ];
    spawner.spawn(esc::dshot_task(escs)).unwrap();

    // 5. CRSF/ELRS UART4 @ 420000 (TX=PA0, RX=PA1)
    let mut crsf_config = UsartConfig::default();
    crsf_config.baudrate = 420_000;
    let crsf_uart = Uart::new(p.UART4, p.PA1, p.PA0, Irqs, p.DMA1_CH4, p.DMA1_CH2, crsf_config).unwrap();
    let (crsf_uart_tx, crsf_uart_rx) = crsf_uart.split();

    spawner
        .spawn(tasks::crsf_task::crsf_task(crsf_uart_rx))
        .unwrap();
    spawner
        .spawn(tasks::telemetry_task::telemetry_task(crsf_uart_tx, TELEMETRY_CHAN.receiver()))
        .unwrap();

    // 6. Flight controller; runs the boot sequence and blocks until the IMU is calibrated
    let model = Model::default();
    let fc = FlightController::new(
        Stm32Board::new(imu, led),
        RcReceiver::new(CrsfLink),
        PidStabilizer::new(&model),
        QuadXMixer::new(AtomicEscs),
        BaroAltitudeHold::new(&model),
        CrsfTelemetry::new(ChannelSink::new(TELEMETRY_CHAN.sender())),
        &OrchestratorConfig::default(),
        &model,
    );
    let mut fc = match fc {
        Ok(fc) => fc,
        Err(e) => defmt::panic!("flight controller init failed: {}", e),
    };

    // 7. Main loop; yields so the UART and DShot tasks get their turn
    loop {
        fc.update();
        embassy_futures::yield_now().await;
    }
}
