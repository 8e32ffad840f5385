//! 地址索引分配器
//!
//! 每个钱包一个单调递增的计数器，存放在外部对象存储中（十进制字符串）。
//! 分配流程：读取 → 派生 → 条件写回 `index + 1`。
//! 条件写失败说明该索引已被其他请求占用，整个流程重试；
//! 不使用无条件的“读后写”，同一索引不会被两次成功派生使用。

use std::{sync::Arc, time::Duration};

use rand::Rng;

use crate::{
    config::AllocatorConfig,
    error::ButlerError,
    infrastructure::object_store::{ObjectStore, StoreError},
};

/// 计数器首次创建时的值
pub const INITIAL_INDEX: u64 = 0;

/// 引导阶段（建容器 / 建计数器）最多尝试次数
const BOOTSTRAP_ATTEMPTS: usize = 3;

/// 条件写冲突的重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    /// 指数退避 + 随机抖动，上限 backoff_max
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.backoff_base.as_millis() as u64;
        let max_ms = self.backoff_max.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(6)).min(max_ms);
        let jitter_ms = rand::thread_rng().gen_range(0..=exp_ms / 2);
        Duration::from_millis(exp_ms.saturating_add(jitter_ms).min(max_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(500),
        }
    }
}

impl From<&AllocatorConfig> for RetryPolicy {
    fn from(config: &AllocatorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
        }
    }
}

/// 已读取但尚未提交的索引
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub wallet_id: String,
    pub index: u64,
    /// 读取时的原始内容，提交时作为条件写的期望值
    observed: String,
}

/// 一次成功分配的结果
#[derive(Debug, Clone)]
pub struct Allocation<T> {
    pub index: u64,
    pub value: T,
    pub attempts: u32,
}

pub struct IndexAllocator {
    store: Arc<dyn ObjectStore>,
    container: String,
    policy: RetryPolicy,
}

impl IndexAllocator {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            store,
            container: container.into(),
            policy,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// 读取下一个可用索引
    ///
    /// 计数器不存在时以 0 创建（仅当仍不存在时写入），容器不存在时先建容器。
    pub async fn next_index(&self, wallet_id: &str) -> Result<Reservation, ButlerError> {
        for _ in 0..BOOTSTRAP_ATTEMPTS {
            match self.store.get(&self.container, wallet_id).await {
                Ok(content) => return parse_reservation(wallet_id, content),
                Err(StoreError::NoSuchContainer(_)) => {
                    self.ensure_container().await?;
                }
                Err(StoreError::NoSuchKey { .. }) => {
                    let initial = INITIAL_INDEX.to_string();
                    let created = self
                        .store
                        .put_if(&self.container, wallet_id, None, &initial)
                        .await?;

                    if created {
                        tracing::info!(
                            wallet_id = %wallet_id,
                            container = %self.container,
                            "Initialized address index"
                        );
                        return Ok(Reservation {
                            wallet_id: wallet_id.to_string(),
                            index: INITIAL_INDEX,
                            observed: initial,
                        });
                    }
                    // 并发请求先一步创建了计数器，重新读取
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Backend(format!(
            "index for wallet '{}' could not be initialized after {} attempts",
            wallet_id, BOOTSTRAP_ATTEMPTS
        ))
        .into())
    }

    /// 提交 `index + 1`
    ///
    /// 返回 `Ok(false)` 表示计数器已被其他请求推进，本次预留作废。
    pub async fn commit(&self, reservation: &Reservation) -> Result<bool, ButlerError> {
        let next = reservation
            .index
            .checked_add(1)
            .ok_or_else(|| ButlerError::CorruptIndex {
                wallet_id: reservation.wallet_id.clone(),
                content: reservation.observed.clone(),
            })?;

        let committed = self
            .store
            .put_if(
                &self.container,
                &reservation.wallet_id,
                Some(&reservation.observed),
                &next.to_string(),
            )
            .await?;

        Ok(committed)
    }

    /// 完整的 分配 → 派生 → 提交 流程，冲突时有限重试
    ///
    /// `derive` 返回错误时立即中止，不提交。
    pub async fn allocate_with<T, F>(
        &self,
        wallet_id: &str,
        mut derive: F,
    ) -> Result<Allocation<T>, ButlerError>
    where
        F: FnMut(u64) -> Result<T, ButlerError>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let reservation = self.next_index(wallet_id).await?;
            let value = derive(reservation.index)?;

            if self.commit(&reservation).await? {
                tracing::debug!(
                    wallet_id = %wallet_id,
                    index = reservation.index,
                    attempt = attempt,
                    "Committed address index"
                );
                return Ok(Allocation {
                    index: reservation.index,
                    value,
                    attempts: attempt,
                });
            }

            tracing::warn!(
                wallet_id = %wallet_id,
                index = reservation.index,
                attempt = attempt,
                "Address index taken by a concurrent request, retrying"
            );

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        Err(ButlerError::AllocationConflict {
            wallet_id: wallet_id.to_string(),
            attempts: max_attempts,
        })
    }

    async fn ensure_container(&self) -> Result<(), ButlerError> {
        match self.store.create_container(&self.container).await {
            Ok(()) | Err(StoreError::ContainerAlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_reservation(wallet_id: &str, content: String) -> Result<Reservation, ButlerError> {
    match content.trim().parse::<u64>() {
        Ok(index) => Ok(Reservation {
            wallet_id: wallet_id.to_string(),
            index,
            observed: content,
        }),
        Err(_) => Err(ButlerError::CorruptIndex {
            wallet_id: wallet_id.to_string(),
            content,
        }),
    }
}
