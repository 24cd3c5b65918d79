//! JSONL batch writer - appends every batch as one line to a per-kind file

use super::messages::WriteBatch;
use super::{BatchSink, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const BATCH_KINDS: [&str; 3] = ["candles", "windows", "vectors"];

pub struct JsonlBatchWriter {
    writers: HashMap<&'static str, BufWriter<std::fs::File>>,
    last_flush: Instant,
}

impl JsonlBatchWriter {
    /// Open `candles.jsonl`, `windows.jsonl` and `vectors.jsonl` under `base_path` for appending
    pub fn new(base_path: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&base_path)?;
        let mut writers = HashMap::new();

        for kind in BATCH_KINDS {
            let file_path = base_path.join(format!("{}.jsonl", kind));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)?;

            log::info!("📝 Writing {} batches to: {}", kind, file_path.display());
            writers.insert(kind, BufWriter::new(file));
        }

        Ok(Self {
            writers,
            last_flush: Instant::now(),
        })
    }

    pub fn write_batch(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        let writer = self.writers.get_mut(batch.kind()).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Writer not found")
        })?;

        let json = batch.encode()?;
        writeln!(writer, "{}", json)?;

        // Flush every 5 seconds
        if self.last_flush.elapsed() > Duration::from_secs(5) {
            self.flush_all()?;
            self.last_flush = Instant::now();
        }

        Ok(())
    }

    pub fn flush_all(&mut self) -> std::io::Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for JsonlBatchWriter {
    fn drop(&mut self) {
        let _ = self.flush_all();
    }
}

#[async_trait]
impl BatchSink for JsonlBatchWriter {
    async fn publish(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.write_batch(batch)
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        self.flush_all()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
