//! Domain 模块
//!
//! 网络参数、派生路径解析与公钥派生，均为无状态纯逻辑

pub mod derivation;
pub mod derivation_path;
pub mod network;

// 重新导出常用类型
pub use derivation::{DerivationError, HdAddressDeriver, ReceivingAddress};
pub use derivation_path::{DerivationPath, DerivationStep, PathError};
pub use network::{Network, NetworkError, NetworkParams};
