use std::sync::Arc;
use std::time::Duration;

use crate::bus::Bus;
use crate::error::BusError;

/// Build logs live 7 days — long enough to diagnose a failed build, short
/// enough that a busy repo doesn't accumulate logs forever.
const LOG_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// 3-byte tag prefixed to every line published on a log channel. The stored
/// key never carries this tag; only live subscribers need to tell a log line
/// apart from the `END` sentinel.
const LOG_TAG: &[u8] = b"LOG";

/// The literal sentinel published (untagged) when a build's log is done.
pub const END_SENTINEL: &[u8] = b"END";

fn log_key(pkgbase: &str, timestamp: i64) -> String {
    format!("build-logs:{pkgbase}:{timestamp}")
}

fn log_channel(pkgbase: &str, timestamp: i64) -> String {
    format!("build-logs.{pkgbase}.{timestamp}")
}

fn default_key(pkgbase: &str) -> String {
    format!("build-logs:{pkgbase}:default")
}

/// Producer handle for a single build's log, bound to `(pkgbase,
/// timestamp)`. Builders hold one of these for the lifetime of a build.
pub struct BuildLog {
    bus: Arc<dyn Bus>,
    pkgbase: String,
    timestamp: i64,
}

impl BuildLog {
    pub fn new(bus: Arc<dyn Bus>, pkgbase: impl Into<String>, timestamp: i64) -> Self {
        Self {
            bus,
            pkgbase: pkgbase.into(),
            timestamp,
        }
    }

    /// Append raw bytes to the stored log and fan them out to live
    /// subscribers in one round trip. The channel payload carries the `LOG`
    /// tag; the stored key does not.
    pub async fn append(&self, bytes: &[u8]) -> Result<(), BusError> {
        let mut tagged = Vec::with_capacity(LOG_TAG.len() + bytes.len());
        tagged.extend_from_slice(LOG_TAG);
        tagged.extend_from_slice(bytes);

        self.bus
            .append_publish_expire(
                &log_key(&self.pkgbase, self.timestamp),
                bytes,
                &log_channel(&self.pkgbase, self.timestamp),
                &tagged,
                LOG_TTL,
            )
            .await
    }

    /// Convenience wrapper for line-oriented output; appends a trailing `\n`.
    pub async fn append_line(&self, line: &str) -> Result<(), BusError> {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.append(&bytes).await
    }

    /// Record this build as the pkgbase's default (most recent) log, so a
    /// client asking for `/api/logs/:pkgbase` without a timestamp lands here.
    pub async fn set_default(&self) -> Result<(), BusError> {
        self.bus
            .set_ex(
                &default_key(&self.pkgbase),
                self.timestamp.to_string().as_bytes(),
                LOG_TTL,
            )
            .await
    }

    /// Signal that no further lines will be appended. Consumers treat the
    /// untagged `END` sentinel as a close signal, not as log content.
    pub async fn end_log(&self) -> Result<(), BusError> {
        self.bus
            .publish(&log_channel(&self.pkgbase, self.timestamp), END_SENTINEL)
            .await
    }
}

/// Resolve the `default` pointer for a pkgbase to a concrete timestamp, for
/// the no-timestamp log endpoint.
pub async fn resolve_default_timestamp(bus: &dyn Bus, pkgbase: &str) -> Result<Option<i64>, BusError> {
    match bus.get(&default_key(pkgbase)).await? {
        Some(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            Ok(text.parse::<i64>().ok())
        }
        None => Ok(None),
    }
}

/// One item yielded by [`stream_log`]: either a chunk of log content or the
/// end-of-stream signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Chunk(Vec<u8>),
    End,
}

/// Read a build log: subscribe to the channel *before* reading the stored
/// prefix, so nothing published between
/// those two steps is lost, then yield the prefix followed by live messages
/// with their tag stripped. After `END`, callers should keep listening for
/// up to a second in case trailing lines were still in flight.
pub async fn read_log_prefix(
    bus: &dyn Bus,
    pkgbase: &str,
    timestamp: i64,
) -> Result<Vec<u8>, BusError> {
    Ok(bus.get(&log_key(pkgbase, timestamp)).await?.unwrap_or_default())
}

pub fn channel_for(pkgbase: &str, timestamp: i64) -> String {
    log_channel(pkgbase, timestamp)
}

/// Strip the live-channel tag from a raw pub/sub message, classifying it as
/// a content chunk or the end sentinel.
pub fn classify_message(raw: &[u8]) -> LogEvent {
    if raw == END_SENTINEL {
        LogEvent::End
    } else if raw.len() >= LOG_TAG.len() && &raw[..LOG_TAG.len()] == LOG_TAG {
        LogEvent::Chunk(raw[LOG_TAG.len()..].to_vec())
    } else {
        LogEvent::Chunk(raw.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_bus::FakeBus;

    #[tokio::test]
    async fn append_then_read_prefix_round_trips() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let log = BuildLog::new(bus.clone(), "my-pkg", 1000);
        log.append_line("building...").await.unwrap();
        log.append_line("done").await.unwrap();

        let prefix = read_log_prefix(&*bus, "my-pkg", 1000).await.unwrap();
        assert_eq!(prefix, b"building...\ndone\n");
    }

    #[tokio::test]
    async fn subscribe_before_append_misses_nothing() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let mut sub = bus.subscribe(&channel_for("my-pkg", 1000)).await.unwrap();
        let log = BuildLog::new(bus.clone(), "my-pkg", 1000);
        log.append_line("hello").await.unwrap();
        log.end_log().await.unwrap();

        let first = classify_message(&sub.recv().await.unwrap());
        assert_eq!(first, LogEvent::Chunk(b"hello\n".to_vec()));
        let second = classify_message(&sub.recv().await.unwrap());
        assert_eq!(second, LogEvent::End);
    }

    #[tokio::test]
    async fn set_default_then_resolve() {
        let bus: Arc<dyn Bus> = Arc::new(FakeBus::new());
        let log = BuildLog::new(bus.clone(), "my-pkg", 4242);
        log.set_default().await.unwrap();
        let resolved = resolve_default_timestamp(&*bus, "my-pkg").await.unwrap();
        assert_eq!(resolved, Some(4242));
    }

    #[test]
    fn classify_end_sentinel_not_mistaken_for_tagged_content() {
        assert_eq!(classify_message(END_SENTINEL), LogEvent::End);
        assert_eq!(
            classify_message(b"LOGhi"),
            LogEvent::Chunk(b"hi".to_vec())
        );
    }
}
