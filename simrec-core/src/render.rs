//! Render sinks for `SimulationEngine::render`.
//!
//! - `NoopSink`:  discards every frame
//! - `HumanSink`: one readable line per frame on stdout
//! - `CsvSink`:   appends one row per frame, writing the header on file creation

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::types::{ItemId, User};

/// The episode state shown by one `render` call.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    /// Current user.
    pub user: &'a User,
    /// `(action, rating)` pairs of the episode so far.
    pub interactions: &'a [(usize, f64)],
    /// Watched `(action, item, rating)` of the latest step, if any.
    pub latest: Option<(usize, &'a ItemId, f64)>,
}

/// Destination of rendered frames.
pub trait RenderSink: fmt::Debug + Send {
    /// Emit one frame.
    ///
    /// # Errors
    /// I/O or encoding failures of the sink.
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()>;
}

/// Build the sink described by `config`.
#[must_use]
pub fn build(config: &RenderConfig) -> Box<dyn RenderSink> {
    match config {
        RenderConfig::None => Box::new(NoopSink),
        RenderConfig::Human => Box::new(HumanSink),
        RenderConfig::Csv { path } => Box::new(CsvSink::new(path.clone())),
    }
}

/// Sink that discards all frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl RenderSink for NoopSink {
    fn render(&mut self, _frame: &RenderFrame<'_>) -> Result<()> {
        Ok(())
    }
}

/// Prints a one-line summary of each frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct HumanSink;

/// The line `HumanSink` prints for `frame`.
#[must_use]
pub fn human_line(frame: &RenderFrame<'_>) -> String {
    let earlier = match frame.interactions.split_last() {
        Some((_, rest)) if frame.latest.is_some() => rest,
        _ => frame.interactions,
    };
    let mut line = format!(
        "User: {}, List of interacted items: {earlier:?}",
        frame.user.name
    );
    if let Some((_, item_id, rating)) = frame.latest {
        line.push_str(&format!(" Item proposed: {item_id}, User reward: {rating}"));
    }
    line
}

impl RenderSink for HumanSink {
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", human_line(frame))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    user_id: u32,
    user_name: &'a str,
    time: usize,
    action: usize,
    item_id: &'a str,
    rating: f64,
}

/// Appends `user_id,user_name,time,action,item_id,rating` rows to a file.
///
/// Frames without a completed step are skipped.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    /// Sink writing to `path`; nothing is created until the first row.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl RenderSink for CsvSink {
    fn render(&mut self, frame: &RenderFrame<'_>) -> Result<()> {
        let Some((action, item_id, rating)) = frame.latest else {
            return Ok(());
        };

        let exists = self.path.exists();
        if !exists {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(!exists)
            .from_writer(file);
        writer.serialize(CsvRow {
            user_id: frame.user.id.0,
            user_name: &frame.user.name,
            time: frame.interactions.len(),
            action,
            item_id: item_id.as_str(),
            rating,
        })?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gender, UserId};

    fn user() -> User {
        let mut user = User::new("Smith, Jo", Gender::Female, 40, "Enjoys thrillers.");
        user.id = UserId(3);
        user
    }

    #[test]
    fn csv_writes_header_once_and_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("render").join("run.csv");
        let mut sink = CsvSink::new(path.clone());
        let user = user();
        let item = ItemId::from(862_u64);

        sink.render(&RenderFrame {
            user: &user,
            interactions: &[(4, 8.0)],
            latest: Some((4, &item, 8.0)),
        })
        .expect("first row");
        sink.render(&RenderFrame {
            user: &user,
            interactions: &[(4, 8.0), (4, 1.0)],
            latest: Some((4, &item, 1.0)),
        })
        .expect("second row");

        let content = fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "user_id,user_name,time,action,item_id,rating",
                "3,\"Smith, Jo\",1,4,862,8.0",
                "3,\"Smith, Jo\",2,4,862,1.0",
            ]
        );
    }

    #[test]
    fn csv_skips_frames_without_a_step() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("run.csv");
        let user = user();
        CsvSink::new(path.clone())
            .render(&RenderFrame {
                user: &user,
                interactions: &[],
                latest: None,
            })
            .expect("noop");
        assert!(!path.exists());
    }

    #[test]
    fn human_line_separates_latest_step() {
        let user = user();
        let item = ItemId::from(12_u64);
        let line = human_line(&RenderFrame {
            user: &user,
            interactions: &[(1, 7.0), (2, 9.0)],
            latest: Some((2, &item, 9.0)),
        });
        assert_eq!(
            line,
            "User: Smith, Jo, List of interacted items: [(1, 7.0)] Item proposed: 12, User reward: 9"
        );
    }
}
