//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_result_sink;
pub mod file_config_adapter;
pub mod memory_result_sink;
pub mod retrying_data_port;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
