use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use urban_vision::{AnalysisRecord, AnalysisSink, SinkError};

/// Appends one JSON object per record to a file.
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AnalysisSink for JsonLinesSink {
    async fn persist(&self, record: AnalysisRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        // One write per record so concurrent readers never see half a line.
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use urban_vision::{AnalysisOptions, FrameView, SceneAnalyzer};

    fn record(tick: u64) -> AnalysisRecord {
        let image = RgbImage::from_pixel(160, 120, Rgb([135, 180, 220]));
        AnalysisRecord {
            tick,
            produced_at_ms: 1_700_000_000_000 + tick,
            processing_ms: 3,
            components: SceneAnalyzer::default().analyze(&FrameView::from_rgb_image(&image), &AnalysisOptions::default()),
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        let sink = JsonLinesSink::open(&path).await.unwrap();
        assert_eq!(sink.path(), path.as_path());
        sink.persist(record(1)).await.unwrap();
        sink.persist(record(2)).await.unwrap();
        drop(sink);

        // Reopening appends instead of truncating.
        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.persist(record(3)).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<AnalysisRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].components.summary, record(3).components.summary);
        assert_eq!(records.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
