//! Event ingestion
//!
//! Bridges an external producer to the hub: each line of the input is one
//! JSON-encoded `LocationEvent`. Blank lines are skipped; lines that do not
//! parse (invalid UTF-8, events without `data`) are logged and skipped so
//! one bad record never stalls the feed. A broken hub invariant ends ingestion with
//! the hub's error.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::hub::{BroadcastHub, LocationEvent};
use crate::utils::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub published: usize,
    pub skipped: usize,
}

pub async fn ingest_lines<R>(reader: R, hub: &BroadcastHub, topic: &str) -> Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = reader;
    let mut buf = Vec::new();
    let mut stats = IngestStats::default();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let event: LocationEvent = match serde_json::from_slice(line) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    line = line_no,
                    error = %err,
                    input = %String::from_utf8_lossy(&line[..line.len().min(100)]),
                    "skipping malformed location event"
                );
                stats.skipped += 1;
                continue;
            }
        };

        hub.publish(topic, event)?;
        stats.published += 1;
    }

    info!(published = stats.published, skipped = stats.skipped, "event input closed");
    Ok(stats)
}
