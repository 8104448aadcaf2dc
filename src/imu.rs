use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Error, Instance, Spi};
use embassy_time::{block_for, Duration};

const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_ACCEL_DATA_X1: u8 = 0x1F;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_WHO_AM_I: u8 = 0x75;

pub const WHO_AM_I: u8 = 0x47;

/// Reset-default full scales: ±2000 dps and ±16 g.
pub const GYRO_LSB_PER_DPS: f32 = 16.4;
pub const ACCEL_LSB_PER_G: f32 = 2048.0;

/// Raw accel and gyro counts, body frame.
pub type RawSample = ([i16; 3], [i16; 3]);

/// ICM-42688-P on SPI, polled from the stabilization loop.
pub struct Icm42688<'d, T: Instance> {
    spi: Spi<'d, T, NoDma, NoDma>,
    cs: Output<'d, AnyPin>,
}

impl<'d, T: Instance> Icm42688<'d, T> {
    pub fn new(spi: Spi<'d, T, NoDma, NoDma>, cs: Output<'d, AnyPin>) -> Self {
        Self { spi, cs }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.cs.set_low();
        let res = self.spi.blocking_write(&[reg & 0x7F, value]);
        self.cs.set_high();
        res
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Error> {
        let tx = [reg | 0x80, 0x00];
        let mut rx = [0u8; 2];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();

        res?;
        Ok(rx[1])
    }

    /// Soft reset, then gyro and accel in low-noise mode. Returns WHO_AM_I.
    pub fn init(&mut self) -> Result<u8, Error> {
        self.write_reg(REG_DEVICE_CONFIG, 0x01)?;
        block_for(Duration::from_millis(10));

        let id = self.read_reg(REG_WHO_AM_I)?;

        self.write_reg(REG_PWR_MGMT0, 0x0F)?;
        // gyro needs 45 ms after leaving sleep
        block_for(Duration::from_millis(50));

        Ok(id)
    }

    pub fn read_all(&mut self) -> Result<RawSample, Error> {
        let mut tx = [0u8; 13];
        tx[0] = REG_ACCEL_DATA_X1 | 0x80;
        let mut rx = [0u8; 13];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res?;

        let word = |i: usize| i16::from_be_bytes([rx[i], rx[i + 1]]);
        Ok(([word(1), word(3), word(5)], [word(7), word(9), word(11)]))
    }
}
