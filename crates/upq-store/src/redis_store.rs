//! Redis-backed store
//!
//! Multi-key operations run as Lua scripts so each one executes without
//! interleaving on the server. Scripts are sent by hash and reloaded on
//! `NOSCRIPT`. Write scripts check key types before their first write, so
//! the type errors a script could hit midway are raised while nothing has
//! been written yet.

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::keys::KeySpace;
use crate::store::{
    decode_entry, decode_flags_lossy, decode_flags_strict, decode_plots, ChunkUpdate,
    ClaimedChunk, NotificationStore,
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::BTreeSet;
use upq_types::{ChunkId, ChunkKey, PlotId, UpdateFlagSet};

/// Fails before any write unless the queue is a list (or absent) and the
/// pending key is a set (or absent). Once the guard passes the remaining
/// commands cannot fail on type errors; Redis does not roll back a script
/// that errors partway, so an out-of-memory abort can still leave earlier
/// writes in place.
const TYPE_GUARD: &str = r"
local function expect_type(key, wanted)
    local t = redis.call('TYPE', key)['ok']
    if t ~= 'none' and t ~= wanted then
        return redis.error_reply('WRONGTYPE ' .. key .. ' holds ' .. t .. ', expected ' .. wanted)
    end
end
";

/// KEYS: queue, pending set, flag keys...
/// ARGV: chunk entry, plot count, plot ids..., flag values (aligned with KEYS[3..])
///
/// The queue entry is pushed last so a consumer never pops a chunk whose
/// pending plots are not written yet.
const COMMIT_BODY: &str = r"
local bad = expect_type(KEYS[1], 'list') or expect_type(KEYS[2], 'set')
if bad then
    return bad
end
local nplots = tonumber(ARGV[2])
if nplots > 0 then
    redis.call('SADD', KEYS[2], unpack(ARGV, 3, 2 + nplots))
end
for i = 3, #KEYS do
    redis.call('SET', KEYS[i], ARGV[i + nplots])
end
redis.call('LPUSH', KEYS[1], ARGV[1])
return nplots
";

/// KEYS: queue, pending set. ARGV: chunk entry, plot ids...
///
/// Enqueues only when the pending set did not exist and gained members, so
/// a chunk that is still waiting in the queue is not queued again.
const COALESCE_BODY: &str = r"
local bad = expect_type(KEYS[1], 'list') or expect_type(KEYS[2], 'set')
if bad then
    return bad
end
local existed = redis.call('EXISTS', KEYS[2])
local added = redis.call('SADD', KEYS[2], unpack(ARGV, 2))
if existed == 0 and added > 0 then
    redis.call('LPUSH', KEYS[1], ARGV[1])
    return 1
end
return 0
";

/// KEYS: queue. ARGV: pending-set prefix.
const CLAIM_SCRIPT: &str = r"
local entry = redis.call('RPOP', KEYS[1])
if not entry then
    return nil
end
local set_key = ARGV[1] .. entry
local plots = redis.call('SMEMBERS', set_key)
redis.call('DEL', set_key)
return {entry, unpack(plots)}
";

/// KEYS: flag keys.
const TAKE_FLAGS_SCRIPT: &str = r"
if #KEYS == 0 then
    return {}
end
local vals = redis.call('MGET', unpack(KEYS))
redis.call('DEL', unpack(KEYS))
return vals
";

/// Store talking to a Redis server
///
/// Cloning is cheap; clones share the multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    keys: KeySpace,
    commit_script: Script,
    coalesce_script: Script,
    claim_script: Script,
    take_flags_script: Script,
}

impl RedisStore {
    /// Connect using `config`
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`](crate::StoreError::Unavailable) if
    /// the server cannot be reached
    pub async fn connect(config: &StoreConfig, keys: KeySpace) -> StoreResult<Self> {
        tracing::info!(host = %config.host, port = config.port, db = config.database_index, "connecting to redis");
        let client = redis::Client::open(config.connection_info())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_connection(conn, keys))
    }

    /// Wrap an existing connection manager
    #[must_use]
    pub fn from_connection(conn: ConnectionManager, keys: KeySpace) -> Self {
        Self {
            conn,
            keys,
            commit_script: Script::new(&format!("{TYPE_GUARD}{COMMIT_BODY}")),
            coalesce_script: Script::new(&format!("{TYPE_GUARD}{COALESCE_BODY}")),
            claim_script: Script::new(CLAIM_SCRIPT),
            take_flags_script: Script::new(TAKE_FLAGS_SCRIPT),
        }
    }

    fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

/// KEYS and ARGV for the commit script
pub(crate) fn commit_layout(keys: &KeySpace, update: &ChunkUpdate) -> (Vec<String>, Vec<String>) {
    let mut script_keys = vec![
        keys.queue_key().to_string(),
        keys.pending_key(update.chunk),
    ];
    script_keys.extend(update.flags.iter().map(|(plot, _)| keys.flags_key(*plot)));

    let mut args = vec![keys.chunk_entry(update.chunk), update.plots.len().to_string()];
    args.extend(update.plots.iter().map(ToString::to_string));
    args.extend(update.flags.iter().map(|(_, flags)| flags.serialize()));
    (script_keys, args)
}

/// KEYS and ARGV for the coalescing script
pub(crate) fn coalesce_layout(
    keys: &KeySpace,
    chunk: ChunkId,
    plots: &[PlotId],
) -> (Vec<String>, Vec<String>) {
    let script_keys = vec![keys.queue_key().to_string(), keys.pending_key(chunk)];
    let mut args = vec![keys.chunk_entry(chunk)];
    args.extend(plots.iter().map(ToString::to_string));
    (script_keys, args)
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NotificationStore for RedisStore {
    fn key_space(&self) -> &KeySpace {
        &self.keys
    }

    async fn enqueue_chunk(&self, chunk: ChunkId) -> StoreResult<()> {
        let mut conn = self.connection();
        conn.lpush::<_, _, ()>(self.keys.queue_key(), self.keys.chunk_entry(chunk))
            .await?;
        Ok(())
    }

    async fn mark_plots_pending(&self, chunk: ChunkId, plots: &[PlotId]) -> StoreResult<()> {
        if plots.is_empty() {
            return Ok(());
        }
        let members: Vec<String> = plots.iter().map(ToString::to_string).collect();
        let mut conn = self.connection();
        conn.sadd::<_, _, ()>(self.keys.pending_key(chunk), members)
            .await?;
        Ok(())
    }

    async fn set_plot_flags(&self, plot: PlotId, flags: UpdateFlagSet) -> StoreResult<()> {
        let mut conn = self.connection();
        conn.set::<_, _, ()>(self.keys.flags_key(plot), flags.serialize())
            .await?;
        Ok(())
    }

    async fn commit(&self, update: &ChunkUpdate) -> StoreResult<()> {
        let (keys, args) = commit_layout(&self.keys, update);
        let mut invocation = self.commit_script.prepare_invoke();
        for key in &keys {
            invocation.key(key);
        }
        for arg in &args {
            invocation.arg(arg);
        }

        let mut conn = self.connection();
        let _: i64 = invocation.invoke_async(&mut conn).await?;
        tracing::debug!(
            chunk = %update.chunk,
            plots = update.plots.len(),
            flags = update.flags.len(),
            "committed chunk update"
        );
        Ok(())
    }

    async fn commit_coalesced(&self, chunk: ChunkId, plots: &[PlotId]) -> StoreResult<bool> {
        if plots.is_empty() {
            return Ok(false);
        }
        let (keys, args) = coalesce_layout(&self.keys, chunk, plots);
        let mut invocation = self.coalesce_script.prepare_invoke();
        for key in &keys {
            invocation.key(key);
        }
        for arg in &args {
            invocation.arg(arg);
        }

        let mut conn = self.connection();
        let enqueued: i64 = invocation.invoke_async(&mut conn).await?;
        tracing::debug!(%chunk, plots = plots.len(), enqueued = enqueued == 1, "coalesced chunk update");
        Ok(enqueued == 1)
    }

    async fn queue_len(&self) -> StoreResult<usize> {
        let mut conn = self.connection();
        Ok(conn.llen(self.keys.queue_key()).await?)
    }

    async fn queued_chunks(&self) -> StoreResult<Vec<ChunkKey>> {
        let mut conn = self.connection();
        let entries: Vec<String> = conn.lrange(self.keys.queue_key(), 0, -1).await?;
        entries
            .iter()
            .rev()
            .map(|entry| decode_entry(&self.keys, entry))
            .collect()
    }

    async fn pending_plots(&self, chunk: ChunkId) -> StoreResult<BTreeSet<PlotId>> {
        let key = self.keys.pending_key(chunk);
        let mut conn = self.connection();
        let members: Vec<String> = conn.smembers(&key).await?;
        decode_plots(&key, members)
    }

    async fn plot_flags(&self, plot: PlotId) -> StoreResult<Option<UpdateFlagSet>> {
        let key = self.keys.flags_key(plot);
        let mut conn = self.connection();
        let raw: Option<String> = conn.get(&key).await?;
        raw.map(|raw| decode_flags_strict(&key, &raw)).transpose()
    }

    async fn claim_next(&self) -> StoreResult<Option<ClaimedChunk>> {
        let mut conn = self.connection();
        let reply: Option<Vec<String>> = self
            .claim_script
            .key(self.keys.queue_key())
            .arg(crate::keys::PENDING_PREFIX)
            .invoke_async(&mut conn)
            .await?;

        let Some(mut values) = reply.filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let plots = values.split_off(1);
        let entry = &values[0];
        let key = decode_entry(&self.keys, entry)?;
        let plots = decode_plots(&self.keys.pending_key_for_entry(entry), plots)?;
        Ok(Some(ClaimedChunk { key, plots }))
    }

    async fn take_plot_flags(&self, plots: &[PlotId]) -> StoreResult<Vec<(PlotId, UpdateFlagSet)>> {
        if plots.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = plots.iter().map(|p| self.keys.flags_key(*p)).collect();
        let mut invocation = self.take_flags_script.prepare_invoke();
        for key in &keys {
            invocation.key(key);
        }

        let mut conn = self.connection();
        let values: Vec<Option<String>> = invocation.invoke_async(&mut conn).await?;
        Ok(plots
            .iter()
            .zip(keys.iter().zip(values))
            .filter_map(|(plot, (key, raw))| raw.map(|raw| (*plot, decode_flags_lossy(key, &raw))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upq_types::UpdateFlag;

    /// Flag key/value pairs as the commit script reads them: KEYS[i] gets
    /// ARGV[i + nplots], both 1-based
    fn script_flag_pairs(keys: &[String], args: &[String]) -> Vec<(String, String)> {
        let nplots: usize = args[1].parse().unwrap();
        (3..=keys.len())
            .map(|i| (keys[i - 1].clone(), args[i + nplots - 1].clone()))
            .collect()
    }

    #[test]
    fn commit_layout_with_plots_and_flags() {
        let keys = KeySpace::default();
        let update = ChunkUpdate::new(ChunkId::new(0x1d23))
            .with_plots([PlotId::new(1), PlotId::new(2), PlotId::new(3)])
            .with_flags(PlotId::new(2), UpdateFlag::DefaultBuild.into())
            .with_flags(
                PlotId::new(3),
                UpdateFlagSet::new()
                    .with(UpdateFlag::MetadataOnly)
                    .with(UpdateFlag::NoImageUpdate),
            );

        let (script_keys, args) = commit_layout(&keys, &update);
        assert_eq!(
            script_keys,
            vec!["up:q:0", "up:nu:l2_1d23", "up:nu:f:2", "up:nu:f:3"]
        );
        assert_eq!(args, vec!["l2_1d23", "3", "1", "2", "3", "sdb", "mfo niu"]);

        // SADD reads ARGV[3 .. 2 + nplots]
        assert_eq!(&args[2..5], &["1", "2", "3"]);
        assert_eq!(
            script_flag_pairs(&script_keys, &args),
            vec![
                ("up:nu:f:2".to_string(), "sdb".to_string()),
                ("up:nu:f:3".to_string(), "mfo niu".to_string()),
            ]
        );
    }

    #[test]
    fn commit_layout_flags_without_plot_offset() {
        let keys = KeySpace::default();
        let update = ChunkUpdate::new(ChunkId::new(7))
            .with_flags(PlotId::new(0xa), UpdateFlag::DefaultJson.into());

        let (script_keys, args) = commit_layout(&keys, &update);
        assert_eq!(args, vec!["l2_7", "0", "sdj"]);
        assert_eq!(
            script_flag_pairs(&script_keys, &args),
            vec![("up:nu:f:a".to_string(), "sdj".to_string())]
        );
    }

    #[test]
    fn commit_layout_plots_only() {
        let keys = KeySpace::default();
        let update = ChunkUpdate::new(ChunkId::new(0)).with_plots([PlotId::new(1)]);

        let (script_keys, args) = commit_layout(&keys, &update);
        assert_eq!(script_keys, vec!["up:q:0", "up:nu:l2_0"]);
        assert_eq!(args, vec!["l2_0", "1", "1"]);
        assert!(script_flag_pairs(&script_keys, &args).is_empty());
    }

    #[test]
    fn coalesce_layout_lists_plots_after_entry() {
        let keys = KeySpace::default();
        let (script_keys, args) =
            coalesce_layout(&keys, ChunkId::new(0xff), &[PlotId::new(1), PlotId::new(0x10)]);
        assert_eq!(script_keys, vec!["up:q:0", "up:nu:l2_ff"]);
        assert_eq!(args, vec!["l2_ff", "1", "10"]);
    }

    #[test]
    fn writes_happen_after_type_guard() {
        for body in [COMMIT_BODY, COALESCE_BODY] {
            let guard = body.find("expect_type").unwrap();
            let first_write = body.find("SADD").unwrap();
            assert!(guard < first_write);
        }
        assert!(TYPE_GUARD.contains("'TYPE'"));
    }

    #[test]
    fn commit_pushes_queue_entry_last() {
        let lpush = COMMIT_BODY.find("LPUSH").unwrap();
        let sadd = COMMIT_BODY.find("SADD").unwrap();
        let set = COMMIT_BODY.find("'SET'").unwrap();
        assert!(sadd < lpush && set < lpush);
    }

    #[test]
    fn coalesce_pushes_only_for_new_sets() {
        let exists = COALESCE_BODY.find("EXISTS").unwrap();
        let lpush = COALESCE_BODY.find("LPUSH").unwrap();
        assert!(exists < lpush);
        assert!(COALESCE_BODY.contains("existed == 0 and added > 0"));
    }
}
