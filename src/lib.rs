//! Address Butler - 基于 xpub 的比特币收款地址签发服务
//!
//! 只持有扩展公钥：零私钥、零助记词。每个索引只签发一次。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode, ButlerError};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        config::Config,
        domain::{DerivationPath, HdAddressDeriver, Network, NetworkParams, ReceivingAddress},
        error::{AppError, AppErrorCode, ButlerError},
        service::{AddressService, IndexAllocator},
    };
}
