pub mod ahrs;
pub mod altitude;
pub mod crsf;
pub mod dshot;
pub mod mixer;
pub mod pid;
pub mod receiver;
pub mod telemetry;
