//! 对象存储抽象
//!
//! 索引计数器按 (container, key) 存放十进制字符串。
//! - `RedisObjectStore`：生产实现，条件写通过 Lua 脚本保证原子性
//! - `MemoryObjectStore`：本地开发与测试

use std::collections::HashMap;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("The specified container does not exist: {0}")]
    NoSuchContainer(String),
    #[error("The specified key does not exist: {container}/{key}")]
    NoSuchKey { container: String, key: String },
    #[error("The specified container already exists: {0}")]
    ContainerAlreadyExists(String),
    #[error("Object store backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 读取对象内容
    async fn get(&self, container: &str, key: &str) -> Result<String, StoreError>;

    /// 无条件写入
    async fn put(&self, container: &str, key: &str, content: &str) -> Result<(), StoreError>;

    /// 条件写入
    ///
    /// - `expected = None`：仅当 key 不存在时写入
    /// - `expected = Some(v)`：仅当当前内容等于 `v` 时写入
    ///
    /// 返回 `Ok(false)` 表示条件不满足（被其他写者抢先）。
    async fn put_if(
        &self,
        container: &str,
        key: &str,
        expected: Option<&str>,
        content: &str,
    ) -> Result<bool, StoreError>;

    async fn create_container(&self, container: &str) -> Result<(), StoreError>;

    /// 健康检查
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============ Redis 实现 ============

/// 条件写脚本
/// 返回：1 写入成功，0 条件不满足，-1 容器不存在
const PUT_IF_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 0 then
        return -1
    end
    local current = redis.call("GET", KEYS[2])
    if ARGV[1] == "absent" then
        if current then
            return 0
        end
    elseif current ~= ARGV[2] then
        return 0
    end
    redis.call("SET", KEYS[2], ARGV[3])
    return 1
"#;

/// 无条件写脚本（仍要求容器存在）
const PUT_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 0 then
        return -1
    end
    redis.call("SET", KEYS[2], ARGV[1])
    return 1
"#;

#[derive(Clone)]
pub struct RedisObjectStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisObjectStore {
    /// - `redis_url`: redis://host:port
    /// - `prefix`: 所有键的命名空间前缀
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn container_key(&self, container: &str) -> String {
        format!("{}:container:{}", self.prefix, container)
    }

    fn object_key(&self, container: &str, key: &str) -> String {
        format!("{}:object:{}:{}", self.prefix, container, key)
    }
}

#[async_trait]
impl ObjectStore for RedisObjectStore {
    async fn get(&self, container: &str, key: &str) -> Result<String, StoreError> {
        let mut conn = self.conn.clone();

        let (container_exists, value): (bool, Option<String>) = redis::pipe()
            .atomic()
            .cmd("EXISTS")
            .arg(self.container_key(container))
            .cmd("GET")
            .arg(self.object_key(container, key))
            .query_async(&mut conn)
            .await?;

        if !container_exists {
            return Err(StoreError::NoSuchContainer(container.to_string()));
        }

        value.ok_or_else(|| StoreError::NoSuchKey {
            container: container.to_string(),
            key: key.to_string(),
        })
    }

    async fn put(&self, container: &str, key: &str, content: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();

        let result: i32 = redis::Script::new(PUT_SCRIPT)
            .key(self.container_key(container))
            .key(self.object_key(container, key))
            .arg(content)
            .invoke_async(&mut conn)
            .await?;

        if result < 0 {
            return Err(StoreError::NoSuchContainer(container.to_string()));
        }
        Ok(())
    }

    async fn put_if(
        &self,
        container: &str,
        key: &str,
        expected: Option<&str>,
        content: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();

        let (mode, expected) = match expected {
            Some(value) => ("match", value),
            None => ("absent", ""),
        };

        let result: i32 = redis::Script::new(PUT_IF_SCRIPT)
            .key(self.container_key(container))
            .key(self.object_key(container, key))
            .arg(mode)
            .arg(expected)
            .arg(content)
            .invoke_async(&mut conn)
            .await?;

        match result {
            1 => Ok(true),
            0 => Ok(false),
            _ => Err(StoreError::NoSuchContainer(container.to_string())),
        }
    }

    async fn create_container(&self, container: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();

        // SET NX：仅当容器不存在时创建
        let created: Option<String> = redis::cmd("SET")
            .arg(self.container_key(container))
            .arg("1")
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        if created.is_none() {
            return Err(StoreError::ContainerAlreadyExists(container.to_string()));
        }

        tracing::info!(container = %container, "Created object store container");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

// ============ 内存实现 ============

#[derive(Default)]
pub struct MemoryObjectStore {
    containers: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, container: &str, key: &str) -> Result<String, StoreError> {
        let containers = self.containers.read().await;
        let objects = containers
            .get(container)
            .ok_or_else(|| StoreError::NoSuchContainer(container.to_string()))?;

        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchKey {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    async fn put(&self, container: &str, key: &str, content: &str) -> Result<(), StoreError> {
        let mut containers = self.containers.write().await;
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::NoSuchContainer(container.to_string()))?;

        objects.insert(key.to_string(), content.to_string());
        Ok(())
    }

    async fn put_if(
        &self,
        container: &str,
        key: &str,
        expected: Option<&str>,
        content: &str,
    ) -> Result<bool, StoreError> {
        let mut containers = self.containers.write().await;
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StoreError::NoSuchContainer(container.to_string()))?;

        if objects.get(key).map(String::as_str) != expected {
            return Ok(false);
        }

        objects.insert(key.to_string(), content.to_string());
        Ok(true)
    }

    async fn create_container(&self, container: &str) -> Result<(), StoreError> {
        let mut containers = self.containers.write().await;
        if containers.contains_key(container) {
            return Err(StoreError::ContainerAlreadyExists(container.to_string()));
        }
        containers.insert(container.to_string(), HashMap::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_container_and_key() {
        let store = MemoryObjectStore::new();

        assert_eq!(
            store.get("bucket", "index").await,
            Err(StoreError::NoSuchContainer("bucket".into()))
        );

        store.create_container("bucket").await.unwrap();
        assert_eq!(
            store.get("bucket", "index").await,
            Err(StoreError::NoSuchKey {
                container: "bucket".into(),
                key: "index".into(),
            })
        );

        assert_eq!(
            store.create_container("bucket").await,
            Err(StoreError::ContainerAlreadyExists("bucket".into()))
        );
    }

    #[tokio::test]
    async fn test_put_requires_container() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.put("bucket", "index", "0").await,
            Err(StoreError::NoSuchContainer(_))
        ));
        assert!(matches!(
            store.put_if("bucket", "index", None, "0").await,
            Err(StoreError::NoSuchContainer(_))
        ));
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let store = MemoryObjectStore::new();
        store.create_container("bucket").await.unwrap();

        // 仅当不存在时创建
        assert!(store.put_if("bucket", "index", None, "0").await.unwrap());
        assert!(!store.put_if("bucket", "index", None, "0").await.unwrap());

        // 比较并交换
        assert!(!store
            .put_if("bucket", "index", Some("5"), "6")
            .await
            .unwrap());
        assert!(store
            .put_if("bucket", "index", Some("0"), "1")
            .await
            .unwrap());
        assert_eq!(store.get("bucket", "index").await.unwrap(), "1");

        store.put("bucket", "index", "7").await.unwrap();
        assert_eq!(store.get("bucket", "index").await.unwrap(), "7");
    }

    #[tokio::test]
    #[ignore] // 需要Redis实例
    async fn test_redis_conditional_put() {
        let prefix = format!("butler-test:{}", uuid::Uuid::new_v4());
        let store = RedisObjectStore::new("redis://127.0.0.1:6379", &prefix)
            .await
            .unwrap();

        assert!(matches!(
            store.get("bucket", "index").await,
            Err(StoreError::NoSuchContainer(_))
        ));

        store.create_container("bucket").await.unwrap();
        assert!(matches!(
            store.create_container("bucket").await,
            Err(StoreError::ContainerAlreadyExists(_))
        ));

        assert!(store.put_if("bucket", "index", None, "0").await.unwrap());
        assert!(!store.put_if("bucket", "index", None, "0").await.unwrap());
        assert!(store
            .put_if("bucket", "index", Some("0"), "1")
            .await
            .unwrap());
        assert!(!store
            .put_if("bucket", "index", Some("0"), "1")
            .await
            .unwrap());
        assert_eq!(store.get("bucket", "index").await.unwrap(), "1");
        store.ping().await.unwrap();
    }
}
