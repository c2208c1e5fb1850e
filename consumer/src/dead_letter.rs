use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Arc,
};

use ais_core::{PositionInbound, PositionReport};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, instrument, warn};

use crate::error::Result;

/// A batch the writer gave up on, kept for manual inspection and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub failed_at: DateTime<Utc>,
    pub attempts: usize,
    pub error: String,
    pub reports: Vec<PositionReport>,
}

/// The most recent dead letters in memory, optionally appended to a JSON lines file.
#[derive(Debug, Clone)]
pub struct DeadLetterQueue {
    recent: Arc<Mutex<VecDeque<DeadLetter>>>,
    capacity: usize,
    path: Option<PathBuf>,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize, path: Option<PathBuf>) -> DeadLetterQueue {
        DeadLetterQueue {
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            path,
        }
    }

    /// Stores `letter`, evicting the oldest in-memory letter when full. Failing to append to
    /// the file is logged, the letter is still kept in memory.
    #[instrument(skip_all, fields(app.num_reports = letter.reports.len()))]
    pub async fn push(&self, letter: DeadLetter) {
        if let Some(path) = &self.path {
            if let Err(e) = append(path, &letter).await {
                error!(
                    "failed to write dead letter to '{}': {}",
                    path.display(),
                    snafu::Report::from_error(e)
                );
            }
        }

        let mut recent = self.recent.lock();
        if self.capacity == 0 {
            return;
        }
        while recent.len() >= self.capacity {
            recent.pop_front();
        }
        recent.push_back(letter);
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.recent.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.recent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.lock().is_empty()
    }

    /// Reads every letter from a dead letter file, for replaying into the store.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Vec<DeadLetter>> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut letters = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            letters.push(serde_json::from_str(&line).map_err(std::io::Error::other)?);
        }

        Ok(letters)
    }

    /// Re-inserts every batch of the dead letter file into `store`, returning the number of
    /// reports stored. Batches that fail again stay in the file, the file is removed once it is
    /// empty. Must not run concurrently with `push`.
    #[instrument(skip_all)]
    pub async fn replay(&self, store: &dyn PositionInbound) -> Result<usize> {
        let Some(path) = &self.path else {
            return Ok(0);
        };
        if !tokio::fs::try_exists(path).await? {
            return Ok(0);
        }

        let letters = DeadLetterQueue::load_file(path).await?;
        let mut remaining = Vec::new();
        let mut replayed = 0;

        for letter in letters {
            match store.add_positions(&letter.reports).await {
                Ok(_) => replayed += letter.reports.len(),
                Err(e) => {
                    warn!(
                        "failed to replay dead letter from {}: {}",
                        letter.failed_at,
                        snafu::Report::from_error(e)
                    );
                    remaining.push(letter);
                }
            }
        }

        if remaining.is_empty() {
            tokio::fs::remove_file(path).await?;
        } else {
            let mut contents = Vec::new();
            for letter in &remaining {
                serde_json::to_writer(&mut contents, letter).map_err(std::io::Error::other)?;
                contents.push(b'\n');
            }
            tokio::fs::write(path, contents).await?;
        }

        info!(
            "replayed {replayed} dead-lettered reports from '{}', {} batches left",
            path.display(),
            remaining.len()
        );
        Ok(replayed)
    }
}

async fn append(path: &Path, letter: &DeadLetter) -> Result<()> {
    let mut line = serde_json::to_vec(letter).map_err(std::io::Error::other)?;
    line.push(b'\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}
