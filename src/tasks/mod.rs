pub mod baro_task;
pub mod crsf_task;
pub mod telemetry_task;
