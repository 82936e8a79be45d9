// 导出模块
pub mod config;
pub mod error;
pub mod indicator;
pub mod mac;
pub mod peer;
pub mod sequencer;
pub mod tcp_client;
pub mod tcp_server;
#[cfg(target_os = "espidf")]
pub mod wifi;

// 重新导出一些公共接口，使它们可以直接从 crate 根访问
pub use mac::MacAddress;
pub use sequencer::{ConnectionOutcome, ConnectionSequencer, StationEvent, StationRadio};
