use embassy_stm32::i2c::{Error, I2c, Instance, RxDma, TxDma};
use embassy_time::{Duration, Timer};

const ADDR: u8 = 0x76;

const REG_PSR_B2: u8 = 0x00;
const REG_TMP_B2: u8 = 0x03;
const REG_PRS_CFG: u8 = 0x06;
const REG_TMP_CFG: u8 = 0x07;
const REG_MEAS_CFG: u8 = 0x08;
const REG_RESET: u8 = 0x0C;
const REG_ID: u8 = 0x0D;
const REG_COEF: u8 = 0x10;

/// Compensation scale for 8x oversampling.
const SCALE_8X: f32 = 7_864_320.0;

#[derive(Default, Debug, Clone, Copy)]
struct Coeffs {
    c00: i32,
    c10: i32,
    c01: i16,
    c11: i16,
    c20: i16,
    c21: i16,
    c30: i16,
}

/// Sign-extends the low `bits` of `raw`.
fn sign_extend(raw: i32, bits: u32) -> i32 {
    let shift = 32 - bits;
    (raw << shift) >> shift
}

/// SPL06-001 barometer.
pub struct Spl06 {
    coeffs: Coeffs,
}

impl Spl06 {
    pub fn new() -> Self {
        Self {
            coeffs: Coeffs::default(),
        }
    }

    /// Reset, load calibration, continuous pressure and temperature at 16 Hz, 8x oversampling.
    pub async fn init<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<u8, Error> {
        i2c.blocking_write(ADDR, &[REG_RESET, 0x09])?;
        Timer::after(Duration::from_millis(50)).await;

        let mut id = [0u8; 1];
        i2c.blocking_write_read(ADDR, &[REG_ID], &mut id)?;

        self.read_coeffs(i2c)?;

        i2c.blocking_write(ADDR, &[REG_PRS_CFG, 0x43])?;
        // external sensor, 8x
        i2c.blocking_write(ADDR, &[REG_TMP_CFG, 0x83])?;
        i2c.blocking_write(ADDR, &[REG_MEAS_CFG, 0x07])?;
        Timer::after(Duration::from_millis(50)).await;

        Ok(id[0])
    }

    fn read_24<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
        reg: u8,
    ) -> Result<i32, Error> {
        let mut buf = [0u8; 3];
        i2c.blocking_write_read(ADDR, &[reg], &mut buf)?;
        let raw = (buf[0] as i32) << 16 | (buf[1] as i32) << 8 | buf[2] as i32;
        Ok(sign_extend(raw, 24))
    }

    fn read_coeffs<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<(), Error> {
        // c0 and c1 (temperature) occupy bytes 0..3 and are not needed
        let mut b = [0u8; 18];
        i2c.blocking_write_read(ADDR, &[REG_COEF], &mut b)?;
        let b = b.map(|x| x as i32);
        let be16 = |i: usize| i16::from_be_bytes([b[i] as u8, b[i + 1] as u8]);

        self.coeffs = Coeffs {
            c00: sign_extend(b[3] << 12 | b[4] << 4 | b[5] >> 4, 20),
            c10: sign_extend((b[5] & 0x0F) << 16 | b[6] << 8 | b[7], 20),
            c01: be16(8),
            c11: be16(10),
            c20: be16(12),
            c21: be16(14),
            c30: be16(16),
        };
        Ok(())
    }

    /// Compensated pressure in Pa.
    pub async fn read_pressure<T: Instance, Tx: TxDma<T>, Rx: RxDma<T>>(
        &mut self,
        i2c: &mut I2c<'_, T, Tx, Rx>,
    ) -> Result<f32, Error> {
        let p_sc = self.read_24(i2c, REG_PSR_B2)? as f32 / SCALE_8X;
        let t_sc = self.read_24(i2c, REG_TMP_B2)? as f32 / SCALE_8X;

        let c = &self.coeffs;
        Ok(c.c00 as f32
            + p_sc * (c.c10 as f32 + p_sc * (c.c20 as f32 + p_sc * c.c30 as f32))
            + t_sc * c.c01 as f32
            + t_sc * p_sc * (c.c11 as f32 + p_sc * c.c21 as f32))
    }
}
