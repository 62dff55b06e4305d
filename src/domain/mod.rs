// Domain layer - Devices, payloads, metrics and sparkline buffers
pub mod coercion;
pub mod device;
pub mod metric;
pub mod series;
pub mod stats;
pub mod view;
