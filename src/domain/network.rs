//! 比特币网络参数
//!
//! 网络名称 → rust-bitcoin 网络类型（决定地址版本字节）。未知名称直接报错，不做默认降级。
//!
//! P2SH 版本字节：主网 0x05，测试网 / 回归测试网 0xc4。

use std::{fmt, str::FromStr};

use bitcoin::NetworkKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("Unrecognized network '{0}', expected one of: mainnet, testnet, regtest")]
    Unrecognized(String),
}

/// 支持的网络
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Regtest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    pub fn params(&self) -> NetworkParams {
        NetworkParams { network: *self }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = NetworkError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(NetworkError::Unrecognized(other.to_string())),
        }
    }
}

/// 地址编码所需的网络参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub network: Network,
}

impl NetworkParams {
    /// 按名称解析网络参数
    pub fn resolve(name: &str) -> Result<Self, NetworkError> {
        Ok(name.parse::<Network>()?.params())
    }

    /// 对应的 rust-bitcoin 网络类型
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self.network {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }

    /// 测试网与回归测试网共用版本字节
    pub fn network_kind(&self) -> NetworkKind {
        NetworkKind::from(self.bitcoin_network())
    }
}
