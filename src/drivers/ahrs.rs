use micromath::F32Ext;

use crate::state::Orientation;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

/// Body-frame vector, gyro in rad/s or accel in any consistent unit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Mahony complementary filter, gyro + accelerometer.
pub struct Mahony {
    kp: f32,
    ki: f32,
    // integral feedback
    ix: f32,
    iy: f32,
    iz: f32,
    q: Quaternion,
}

impl Default for Mahony {
    fn default() -> Self {
        Self::new(2.0, 0.005)
    }
}

impl Mahony {
    pub fn new(kp: f32, ki: f32) -> Self {
        Self {
            kp,
            ki,
            ix: 0.0,
            iy: 0.0,
            iz: 0.0,
            q: Quaternion::default(),
        }
    }

    pub fn quaternion(&self) -> Quaternion {
        self.q
    }

    pub fn reset(&mut self) {
        self.q = Quaternion::default();
        self.ix = 0.0;
        self.iy = 0.0;
        self.iz = 0.0;
    }

    /// One filter step. A zero accelerometer vector leaves the estimate untouched.
    pub fn update(&mut self, dt: f32, gyro: Vec3, accel: Vec3) {
        let Quaternion { w: q0, x: q1, y: q2, z: q3 } = self.q;

        let norm_sq = accel.x * accel.x + accel.y * accel.y + accel.z * accel.z;
        if norm_sq == 0.0 {
            return;
        }
        let inv = norm_sq.sqrt().recip();
        let (ax, ay, az) = (accel.x * inv, accel.y * inv, accel.z * inv);

        // Gravity as seen from the current estimate, halved
        let vx = q1 * q3 - q0 * q2;
        let vy = q0 * q1 + q2 * q3;
        let vz = q0 * q0 - 0.5 + q3 * q3;

        let ex = ay * vz - az * vy;
        let ey = az * vx - ax * vz;
        let ez = ax * vy - ay * vx;

        if self.ki > 0.0 {
            self.ix += self.ki * ex * dt;
            self.iy += self.ki * ey * dt;
            self.iz += self.ki * ez * dt;
        } else {
            self.ix = 0.0;
            self.iy = 0.0;
            self.iz = 0.0;
        }

        let half_dt = 0.5 * dt;
        let gx = (gyro.x + self.kp * ex + self.ix) * half_dt;
        let gy = (gyro.y + self.kp * ey + self.iy) * half_dt;
        let gz = (gyro.z + self.kp * ez + self.iz) * half_dt;

        let w = q0 - q1 * gx - q2 * gy - q3 * gz;
        let x = q1 + q0 * gx + q2 * gz - q3 * gy;
        let y = q2 + q0 * gy - q1 * gz + q3 * gx;
        let z = q3 + q0 * gz + q1 * gy - q2 * gx;

        let inv = (w * w + x * x + y * y + z * z).sqrt().recip();
        self.q = Quaternion {
            w: w * inv,
            x: x * inv,
            y: y * inv,
            z: z * inv,
        };
    }

    /// Roll, pitch and yaw in radians; yaw in [-π, π].
    pub fn euler(&self) -> Orientation {
        let Quaternion { w, x, y, z } = self.q;

        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));

        let sinp = 2.0 * (w * y - z * x);
        let pitch = if sinp.abs() >= 1.0 {
            core::f32::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

        Orientation { roll, pitch, yaw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.0035;

    fn settle(filter: &mut Mahony, accel: Vec3, steps: usize) {
        for _ in 0..steps {
            filter.update(DT, Vec3::default(), accel);
        }
    }

    #[test]
    fn flat_and_still_stays_level() {
        let mut filter = Mahony::default();
        settle(&mut filter, Vec3::new(0.0, 0.0, 1.0), 500);
        let o = filter.euler();
        assert!(o.roll.abs() < 1e-2);
        assert!(o.pitch.abs() < 1e-2);
        assert!(o.yaw.abs() < 1e-2);
    }

    #[test]
    fn converges_to_gravity_roll() {
        // 30° roll: gravity leans into +y in the body frame
        let angle = 30.0f32.to_radians();
        let accel = Vec3::new(0.0, angle.sin(), angle.cos());
        let mut filter = Mahony::new(5.0, 0.0);
        settle(&mut filter, accel, 3000);
        let o = filter.euler();
        assert!((o.roll - angle).abs() < 0.02, "roll {}", o.roll);
        assert!(o.pitch.abs() < 0.02);
    }

    #[test]
    fn zero_accel_is_ignored() {
        let mut filter = Mahony::default();
        filter.update(DT, Vec3::new(1.0, 1.0, 1.0), Vec3::default());
        assert_eq!(filter.quaternion(), Quaternion::default());
    }

    #[test]
    fn yaw_rate_integrates_heading() {
        let mut filter = Mahony::new(0.0, 0.0);
        // 1 rad/s for 0.5 s
        for _ in 0..500 {
            filter.update(0.001, Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0));
        }
        let yaw = filter.euler().yaw;
        assert!((yaw - 0.5).abs() < 0.02, "yaw {}", yaw);
    }
}
