//! STM32F405 board support: clock tree, IMU fusion, LED and barometer mailbox.

use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::peripherals::SPI1;
use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;
use embassy_time::{block_for, Duration, Instant};

use multirotor_fc::drivers::ahrs::{Mahony, Vec3};
use multirotor_fc::hal::Board;
use multirotor_fc::state::{AngularRates, ImuSample};
use multirotor_fc::{Error, Result};

use crate::imu::{Icm42688, ACCEL_LSB_PER_G, GYRO_LSB_PER_DPS, WHO_AM_I};
use crate::tasks::baro_task::PRESSURE;

const GYRO_CALIB_SAMPLES: usize = 100;

/// 168 MHz SYSCLK from the 8 MHz crystal.
pub fn init_clocks() -> embassy_stm32::Peripherals {
    let mut config = Config::default();
    config.rcc.hse = Some(Hse {
        freq: TimeHertz(8_000_000),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL168,
        divp: Some(PllPDiv::DIV2),
        divq: Some(PllQDiv::DIV7),
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV4;
    config.rcc.apb2_pre = APBPrescaler::DIV2;

    embassy_stm32::init(config)
}

pub struct Stm32Board {
    imu: Icm42688<'static, SPI1>,
    led: Output<'static, AnyPin>,
    ahrs: Mahony,
    gyro_bias: [f32; 3],
    last_sample: Option<Instant>,
}

impl Stm32Board {
    pub fn new(imu: Icm42688<'static, SPI1>, led: Output<'static, AnyPin>) -> Self {
        Self {
            imu,
            led,
            ahrs: Mahony::default(),
            gyro_bias: [0.0; 3],
            last_sample: None,
        }
    }

    /// Averages the gyro at rest. Samples that fail to read are skipped.
    fn calibrate_gyro(&mut self) -> Result<()> {
        let mut sum = [0.0f32; 3];
        let mut count = 0u32;
        for _ in 0..GYRO_CALIB_SAMPLES {
            if let Ok((_, gyro)) = self.imu.read_all() {
                for (s, g) in sum.iter_mut().zip(gyro) {
                    *s += g as f32;
                }
                count += 1;
            }
            block_for(Duration::from_millis(10));
        }
        if count == 0 {
            return Err(Error::ImuInit);
        }
        for (bias, s) in self.gyro_bias.iter_mut().zip(sum) {
            *bias = s / count as f32;
        }
        defmt::info!("gyro bias {} from {} samples", self.gyro_bias, count);
        Ok(())
    }
}

impl Board for Stm32Board {
    fn init_hardware(&mut self) -> Result<()> {
        let id = self.imu.init().map_err(|_| Error::ImuInit)?;
        if id != WHO_AM_I {
            defmt::warn!("unexpected IMU id {:#x}", id);
        }
        self.calibrate_gyro()
    }

    fn delay_ms(&mut self, ms: u32) {
        block_for(Duration::from_millis(ms as u64));
    }

    fn micros(&mut self) -> u32 {
        Instant::now().as_micros() as u32
    }

    fn set_led(&mut self, on: bool) {
        if on {
            self.led.set_high();
        } else {
            self.led.set_low();
        }
    }

    fn read_imu(&mut self) -> Result<ImuSample> {
        let (accel, gyro) = self.imu.read_all().map_err(|_| Error::ImuRead)?;

        let now = Instant::now();
        let dt = self
            .last_sample
            .map(|last| (now - last).as_micros() as f32 * 1e-6)
            .unwrap_or(0.0)
            .clamp(0.0, 0.02);
        self.last_sample = Some(now);

        let rate = |axis: usize| ((gyro[axis] as f32 - self.gyro_bias[axis]) / GYRO_LSB_PER_DPS).to_radians();
        let rates = AngularRates {
            roll: rate(0),
            pitch: rate(1),
            yaw: rate(2),
        };
        let g = |axis: usize| accel[axis] as f32 / ACCEL_LSB_PER_G;

        self.ahrs.update(
            dt,
            Vec3::new(rates.roll, rates.pitch, rates.yaw),
            Vec3::new(g(0), g(1), g(2)),
        );

        Ok(ImuSample {
            orientation: self.ahrs.euler(),
            rates,
        })
    }

    fn read_barometer(&mut self) -> Option<f32> {
        PRESSURE.try_take()
    }
}
