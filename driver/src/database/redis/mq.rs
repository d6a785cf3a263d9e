use crate::database::RedisDatabase;
use crate::error::ConvertError;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{redis, Connection};
use error_stack::{Report, ResultExt};
use kernel::interface::database::DatabaseConnection;
use kernel::interface::job::{
    AsyncWork, DestructQueueInfo, ErrorOperation, ErroredInfo, PendingUpdate, PendingUpdateQueue,
    QueueConfig, QueueInfo,
};
use kernel::KernelError;
use redis::streams::StreamReadOptions;
use redis::{RedisResult, Value};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::from_utf8;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use uuid::Uuid;

const QUEUE_NAME: &str = "pending_update";

#[derive(Debug)]
struct QueueData<T> {
    id: String,
    delivered_count: i64,
    info: QueueInfo<T>,
}

type WorkerProcess = Arc<dyn Fn(PendingUpdate) -> AsyncWork + Send + Sync>;

/// Pending updates on a Redis stream with one consumer group. Entries a worker did not
/// acknowledge are claimed again once idle for `retry_idle`; after `max_retry` deliveries
/// they move to the failed hash.
#[derive(Clone)]
pub struct RedisPendingUpdateQueue {
    db: RedisDatabase,
    name: String,
}

impl RedisPendingUpdateQueue {
    pub fn new(db: RedisDatabase) -> Self {
        Self::with_name(db, QUEUE_NAME)
    }

    pub fn with_name(db: RedisDatabase, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }

    pub fn start_workers<F>(&self, config: QueueConfig, process: F)
    where
        F: 'static + Fn(PendingUpdate) -> AsyncWork + Send + Sync,
    {
        let process: WorkerProcess = Arc::new(process);
        for _ in 0..*config.worker_count() {
            let db = self.db.clone();
            let name = self.name.clone();
            let config = config.clone();
            let process = Arc::clone(&process);
            tokio::spawn(async move {
                Self::listen(db, name, config, process).await;
            });
        }
    }

    #[tracing::instrument(skip(db, config, process))]
    async fn listen(db: RedisDatabase, name: String, config: QueueConfig, process: WorkerProcess) {
        let member_name = format!("consumer:{}", Uuid::new_v4());
        let idle_millis = u64::try_from(config.retry_idle().as_millis()).unwrap_or(u64::MAX);
        loop {
            let QueueData {
                id,
                delivered_count,
                info,
            } = {
                let mut con = match db.acquire().await {
                    Ok(con) => con,
                    Err(report) => {
                        error!("{report:?}");
                        sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                let mut result = RedisJobInternal::pop_pending::<PendingUpdate>(
                    &mut con,
                    &name,
                    &member_name,
                    idle_millis,
                )
                .await;
                if result.is_err() || result.as_ref().is_ok_and(Option::is_none) {
                    result = RedisJobInternal::pop_to_process(&mut con, &name, &member_name).await;
                }
                match result {
                    Ok(Some(data)) => data,
                    Ok(None) => continue,
                    Err(report) => {
                        error!("{report:?}");
                        sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                }
            };
            debug!("Processing Id: {id}, TryCount: {delivered_count}");
            let DestructQueueInfo { id: uuid, data } = info.into_destruct();
            let result = process(data.clone()).await;

            let mut con = match db.acquire().await {
                Ok(con) => con,
                Err(report) => {
                    error!("{report:?}");
                    continue;
                }
            };
            if let Err(report) = result {
                let exhausted = delivered_count >= *config.max_retry();
                let delayed = matches!(report.current_context(), ErrorOperation::Delay);
                if delayed && !exhausted {
                    // Left unacknowledged so a worker claims it again after the idle time.
                    warn!("Delayed Id: {id}, TryCount: {delivered_count}, Report: {report:?}");
                    continue;
                }
                let trace = format!("{:?}", report.attach_printable("Pending update gave up"));
                if let Err(report) =
                    RedisJobInternal::push_failed_info(&mut con, &name, trace, uuid, data).await
                {
                    error!("{report:?}");
                }
                error!("Failed Id: {id}, TryCount: {delivered_count}");
            } else {
                debug!("Done Id: {id}, TryCount: {delivered_count}");
            }
            if let Err(report) = RedisJobInternal::mark_done(&mut con, &name, &id).await {
                error!("{report:?}");
            }
        }
    }
}

#[async_trait::async_trait]
impl PendingUpdateQueue for RedisPendingUpdateQueue {
    async fn enqueue(&self, update: &PendingUpdate) -> error_stack::Result<(), KernelError> {
        let mut con = self.db.acquire().await?;
        let info = QueueInfo::from(update.clone());
        RedisJobInternal::insert_waiting(&mut con, &self.name, &info).await
    }

    async fn queued_len(&self) -> error_stack::Result<usize, KernelError> {
        let mut con = self.db.acquire().await?;
        RedisJobInternal::get_wait_len(&mut con, &self.name)
            .await
            .and_then(|size| usize::try_from(size).change_context_lazy(|| KernelError::Internal))
    }

    async fn failed(
        &self,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<PendingUpdate>>, KernelError> {
        let mut con = self.db.acquire().await?;
        RedisJobInternal::get_info_from_hash(&mut con, &failed(&self.name), size, offset).await
    }

    async fn failed_len(&self) -> error_stack::Result<usize, KernelError> {
        let mut con = self.db.acquire().await?;
        RedisJobInternal::get_failed_len(&mut con, &self.name)
            .await
            .and_then(|size| usize::try_from(size).change_context_lazy(|| KernelError::Internal))
    }
}

const QUEUE_FIELD: &str = "info";

fn group(name: &str) -> String {
    format!("g:{name}")
}

fn failed(name: &str) -> String {
    format!("failed:{name}")
}

fn parse_error(value: impl Debug) -> Report<KernelError> {
    Report::new(KernelError::Internal)
        .attach_printable(format!("Failed to parse received data. {value:?}"))
}

fn int_reply(value: Value, target: &str) -> error_stack::Result<i64, KernelError> {
    if let Value::Int(size) = value {
        Ok(size)
    } else {
        Err(Report::new(KernelError::Internal)
            .attach_printable(format!("Failed to get size. target: {target}")))
    }
}

pub(in crate::database) struct RedisJobInternal;

impl RedisJobInternal {
    async fn create_group(con: &mut Connection, name: &str) -> RedisResult<Value> {
        con.xgroup_create_mkstream(name, &group(name), 0).await
    }

    async fn insert_waiting<T: Serialize>(
        con: &mut Connection,
        name: &str,
        info: &QueueInfo<T>,
    ) -> error_stack::Result<(), KernelError> {
        // BUSYGROUP once the group exists
        let _ = Self::create_group(con, name).await;
        let serialize = serde_json::to_string(info).convert_error()?;
        con.xadd(name, "*", &[(QUEUE_FIELD, &serialize)])
            .await
            .convert_error()
    }

    async fn pop_to_process<T>(
        con: &mut Connection,
        name: &str,
        member: &str,
    ) -> error_stack::Result<Option<QueueData<T>>, KernelError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let options = StreamReadOptions::default()
            .block(1000)
            .count(1)
            .group(group(name), member);
        let result: Value = con
            .xread_options(&[name], &[">"], &options)
            .await
            .convert_error()?;
        let bulk = match result {
            Value::Bulk(bulk) => bulk,
            Value::Nil => return Ok(None),
            _ => return Err(parse_error(result)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Data(_name), Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let (id, bulk) = match bulk.as_slice() {
            [Value::Data(id), Value::Bulk(bulk)] => (id, bulk),
            _ => return Err(parse_error(bulk)),
        };
        let data = match bulk.as_slice() {
            [Value::Data(_field), Value::Data(data)] => data,
            _ => return Err(parse_error(bulk)),
        };
        Ok(Some(QueueData {
            id: from_utf8(id)
                .change_context_lazy(|| KernelError::Internal)?
                .to_string(),
            delivered_count: 1,
            info: serde_json::from_slice(data).convert_error()?,
        }))
    }

    async fn mark_done(
        con: &mut Connection,
        name: &str,
        id: &str,
    ) -> error_stack::Result<(), KernelError> {
        let _: i64 = con.xack(name, &group(name), &[id]).await.convert_error()?;
        con.xdel(name, &[id]).await.convert_error()
    }

    /// Claims the oldest entry another consumer left unacknowledged for `idle_millis`.
    async fn pop_pending<T>(
        con: &mut Connection,
        name: &str,
        own_member: &str,
        idle_millis: u64,
    ) -> error_stack::Result<Option<QueueData<T>>, KernelError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let _ = Self::create_group(con, name).await;
        let group = group(name);
        let value: Value = redis::cmd("XPENDING")
            .arg(name)
            .arg(&group)
            .arg("IDLE")
            .arg(idle_millis)
            .arg("-")
            .arg("+")
            .arg(1)
            .query_async(con)
            .await
            .convert_error()?;

        let bulk = match value {
            Value::Bulk(bulk) => bulk,
            _ => return Err(parse_error(value)),
        };
        if bulk.is_empty() {
            return Ok(None);
        }
        let bulk = match bulk.as_slice() {
            [Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        let (id, count) = match bulk.as_slice() {
            [Value::Data(id), Value::Data(_original_owner), _idle, Value::Int(count)] => (
                from_utf8(id)
                    .change_context_lazy(|| KernelError::Internal)?
                    .to_string(),
                *count,
            ),
            _ => return Err(parse_error(bulk)),
        };

        let result: Value = con
            .xclaim(name, &group, own_member, idle_millis, &[&id])
            .await
            .convert_error()?;

        let bulk = match result {
            Value::Bulk(bulk) => bulk,
            _ => return Err(parse_error(result)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Bulk(bulk)] => bulk,
            // Claimed by another worker in between
            [] => return Ok(None),
            _ => return Err(parse_error(bulk)),
        };
        let bulk = match bulk.as_slice() {
            [Value::Data(_id), Value::Bulk(bulk)] => bulk,
            _ => return Err(parse_error(bulk)),
        };
        match bulk.as_slice() {
            [Value::Data(_field), Value::Data(data)] => {
                let info: QueueInfo<T> = serde_json::from_slice(data).convert_error()?;
                // XCLAIM counts this delivery too
                Ok(Some(QueueData {
                    id,
                    delivered_count: count + 1,
                    info,
                }))
            }
            _ => Err(parse_error(bulk)),
        }
    }

    async fn push_failed_info<T: Serialize>(
        con: &mut Connection,
        name: &str,
        stack_trace: String,
        uuid: Uuid,
        data: T,
    ) -> error_stack::Result<(), KernelError> {
        let raw_uuid = uuid.to_string();
        let data = ErroredInfo::new(uuid, data, stack_trace);
        let raw = serde_json::to_string(&data).convert_error()?;
        con.hset(&failed(name), &raw_uuid, &raw)
            .await
            .convert_error()
    }

    async fn get_failed_len(
        con: &mut Connection,
        name: &str,
    ) -> error_stack::Result<i64, KernelError> {
        let failed = failed(name);
        let result: Value = con.hlen(&failed).await.convert_error()?;
        int_reply(result, &failed)
    }

    async fn get_wait_len(
        con: &mut Connection,
        name: &str,
    ) -> error_stack::Result<i64, KernelError> {
        let result: Value = con.xlen(name).await.convert_error()?;
        int_reply(result, name)
    }

    async fn get_info_from_hash<T: for<'de> Deserialize<'de>>(
        con: &mut Connection,
        name: &str,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<T>, KernelError> {
        if size <= 0 {
            return Ok(vec![]);
        }
        let offset = usize::try_from(offset.max(0)).change_context_lazy(|| KernelError::Internal)?;
        let size = usize::try_from(size).change_context_lazy(|| KernelError::Internal)?;
        // Field order in a hash is unstable, so page over the sorted ids
        let mut ids: Vec<String> = con.hkeys(name).await.convert_error()?;
        ids.sort_unstable();
        let page = ids.into_iter().skip(offset).take(size).collect::<Vec<_>>();
        if page.is_empty() {
            return Ok(vec![]);
        }
        let values: Vec<Option<Vec<u8>>> = redis::cmd("HMGET")
            .arg(name)
            .arg(&page)
            .query_async(con)
            .await
            .convert_error()?;
        // An entry may be removed between the two reads
        values
            .into_iter()
            .flatten()
            .map(|data| serde_json::from_slice(&data).convert_error())
            .collect()
    }
}
