use async_trait::async_trait;
use redis::{Cmd, FromRedisValue};
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// Valkey/Redis-backed cache client.
///
/// Every command runs on a clone of the shared `ConnectionManager`, which multiplexes
/// onto one reconnecting connection.
#[derive(Clone, Debug)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }

    async fn run<T: FromRedisValue + Send>(&self, cmd: &Cmd) -> CacheResult<T> {
        let mut conn = self.manager.clone();
        cmd.query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn ping(&self) -> CacheResult<()> {
        let _: String = self.run(&redis::cmd("PING")).await?;
        Ok(())
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        self.run(redis::cmd("GET").arg(key)).await
    }

    async fn take_string(&self, key: &str) -> CacheResult<Option<String>> {
        // GETDEL (Valkey / Redis >= 6.2): read and remove in one step, so two concurrent
        // callers can never both observe the value.
        self.run(redis::cmd("GETDEL").arg(key)).await
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        // EX takes whole seconds; clamp to at least 1.
        let ttl_seconds: u64 = ttl.as_secs().max(1);

        // `OK` when set, Nil when the key already exists.
        let resp: Option<String> = self
            .run(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_seconds),
            )
            .await?;

        Ok(resp.is_some())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        self.run(redis::cmd("DEL").arg(key)).await
    }
}
