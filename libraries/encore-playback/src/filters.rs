//! Audio filter chain and the external transcoder
//!
//! Filters are ffmpeg filter-graph fragments applied in order; the combined
//! chain runs in an external ffmpeg process that the session pipes its
//! source stream through. At most one transcoder process is alive per
//! session: replacing the chain tears the previous process down first.

use crate::error::{PlayerError, Result};
use encore_core::{AudioFilter, AudioStream, StreamInfo, StreamKind};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::debug;

/// Output sample rate expected by the voice sink
const OUTPUT_SAMPLE_RATE: u32 = 48_000;

/// Output channel count expected by the voice sink
const OUTPUT_CHANNELS: u32 = 2;

/// Handle to a live transcoder process
///
/// Killing is idempotent; the process is also killed when the handle is
/// dropped so replacement and session destruction cannot leak children.
struct Transcoder {
    child: Child,
}

impl Transcoder {
    fn kill(&mut self) {
        let _ = self.child.start_kill();
    }
}

impl Drop for Transcoder {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Ordered list of active filters plus the owned transcoder process
pub struct FilterManager {
    active: Mutex<Vec<AudioFilter>>,
    transcoder: Mutex<Option<Transcoder>>,
    program: String,
}

impl FilterManager {
    /// Create a manager with no active filters
    ///
    /// `program` is the transcoder binary to invoke, normally `ffmpeg`
    /// resolved from `PATH`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            active: Mutex::new(Vec::new()),
            transcoder: Mutex::new(None),
            program: program.into(),
        }
    }

    /// Append a filter to the chain
    ///
    /// Returns `false` without modifying the chain when a filter of the
    /// same name is already active.
    pub fn apply_filter(&self, filter: AudioFilter) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.iter().any(|f| f.name == filter.name) {
            return false;
        }
        active.push(filter);
        true
    }

    /// Append several filters; returns how many were newly applied
    pub fn apply_filters(&self, filters: impl IntoIterator<Item = AudioFilter>) -> usize {
        filters
            .into_iter()
            .filter(|f| self.apply_filter(f.clone()))
            .count()
    }

    /// Remove a filter by name; returns whether one was removed
    pub fn remove_filter(&self, name: &str) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let before = active.len();
        active.retain(|f| f.name != name);
        active.len() != before
    }

    /// Remove every active filter; returns how many were removed
    pub fn clear_all(&self) -> usize {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let removed = active.len();
        active.clear();
        removed
    }

    /// Snapshot of the active filters, in application order
    pub fn active_filters(&self) -> Vec<AudioFilter> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether any filter is active
    pub fn has_filters(&self) -> bool {
        !self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// Combined filter-graph string: comma-join of fragments in order
    pub fn filter_string(&self) -> Option<String> {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.is_empty() {
            None
        } else {
            Some(
                active
                    .iter()
                    .map(|f| f.value.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            )
        }
    }

    /// Pipe a source stream through the transcoder, seeking to `position`
    /// and applying the active filter chain
    ///
    /// The seek offset is independent of the filter list, so callers can
    /// rebuild with "same filters, new offset" or "new filters, same
    /// offset". Any previously spawned transcoder for this session is torn
    /// down before the new process starts.
    pub fn apply_and_seek(&self, source: StreamInfo, position: Duration) -> Result<StreamInfo> {
        self.shutdown();

        let args = build_transcode_args(position, self.filter_string().as_deref());
        debug!(?args, "spawning transcoder");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                PlayerError::Transcoder(format!("failed to spawn {}: {err}", self.program))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlayerError::Transcoder("transcoder stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::Transcoder("transcoder stdout unavailable".to_string()))?;

        // Pump the source stream into the child; closing stdin on EOF lets
        // ffmpeg flush its output and exit
        let mut reader = source.stream;
        tokio::spawn(async move {
            if let Err(err) = tokio::io::copy(&mut reader, &mut stdin).await {
                debug!(%err, "transcoder input pump ended");
            }
            drop(stdin);
        });

        let mut slot = self.transcoder.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Transcoder { child });

        Ok(StreamInfo::new(
            AudioStream::new(stdout),
            StreamKind::Arbitrary,
        ))
    }

    /// Kill the live transcoder process, if any
    pub fn shutdown(&self) {
        let mut slot = self.transcoder.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut transcoder) = slot.take() {
            transcoder.kill();
        }
    }
}

impl Default for FilterManager {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Drop for FilterManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build the ffmpeg argument list for one transcoder invocation
///
/// Probe latency is disabled, the optional seek lands before the input so
/// ffmpeg skips ahead in the source, and output is forced to the sink's
/// raw format, sample rate, and channel count.
fn build_transcode_args(position: Duration, filters: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-analyzeduration".to_string(),
        "0".to_string(),
        "-loglevel".to_string(),
        "0".to_string(),
    ];

    if !position.is_zero() {
        args.push("-ss".to_string());
        args.push(format!("{:.3}", position.as_secs_f64()));
    }

    args.push("-i".to_string());
    args.push("pipe:0".to_string());

    if let Some(filters) = filters {
        args.push("-af".to_string());
        args.push(filters.to_string());
    }

    args.extend([
        "-f".to_string(),
        "s16le".to_string(),
        "-ar".to_string(),
        OUTPUT_SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        OUTPUT_CHANNELS.to_string(),
        "pipe:1".to_string(),
    ]);

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> FilterManager {
        FilterManager::default()
    }

    fn bassboost() -> AudioFilter {
        AudioFilter::by_name("bassboost").unwrap()
    }

    fn nightcore() -> AudioFilter {
        AudioFilter::by_name("nightcore").unwrap()
    }

    #[test]
    fn apply_filter_once() {
        let manager = manager();

        assert!(manager.apply_filter(bassboost()));
        assert_eq!(manager.active_filters().len(), 1);

        // Same name again is a no-op returning failure
        assert!(!manager.apply_filter(bassboost()));
        assert_eq!(manager.active_filters().len(), 1);
    }

    #[test]
    fn filter_string_joins_in_order() {
        let manager = manager();
        assert!(manager.filter_string().is_none());

        manager.apply_filter(bassboost());
        manager.apply_filter(nightcore());

        let combined = manager.filter_string().unwrap();
        assert_eq!(
            combined,
            format!("{},{}", bassboost().value, nightcore().value)
        );
    }

    #[test]
    fn remove_and_clear() {
        let manager = manager();
        manager.apply_filter(bassboost());
        manager.apply_filter(nightcore());

        assert!(manager.remove_filter("bassboost"));
        assert!(!manager.remove_filter("bassboost"));
        assert_eq!(manager.active_filters()[0].name, "nightcore");

        manager.apply_filter(bassboost());
        assert_eq!(manager.clear_all(), 2);
        assert!(!manager.has_filters());
    }

    #[test]
    fn apply_filters_counts_new_only() {
        let manager = manager();
        manager.apply_filter(bassboost());

        let applied = manager.apply_filters(vec![bassboost(), nightcore()]);
        assert_eq!(applied, 1);
        assert_eq!(manager.active_filters().len(), 2);
    }

    #[test]
    fn transcode_args_without_seek_or_filters() {
        let args = build_transcode_args(Duration::ZERO, None);
        assert_eq!(
            args,
            vec![
                "-analyzeduration",
                "0",
                "-loglevel",
                "0",
                "-i",
                "pipe:0",
                "-f",
                "s16le",
                "-ar",
                "48000",
                "-ac",
                "2",
                "pipe:1",
            ]
        );
    }

    #[test]
    fn transcode_args_with_seek_and_filters() {
        let args = build_transcode_args(Duration::from_millis(93_500), Some("bass=g=10"));

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "93.500");

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input, "seek must precede the input argument");

        let af = args.iter().position(|a| a == "-af").unwrap();
        assert_eq!(args[af + 1], "bass=g=10");
        assert!(af > input);
    }
}
