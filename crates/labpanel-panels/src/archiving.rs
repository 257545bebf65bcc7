//! Archiving viewer.
//!
//! Lists the archived attributes grouped by device and extracts the history
//! of the selected ones over a time range. Extraction retries a failing
//! attribute after a pause, then skips it and goes on with the others.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use labpanel_analysis::{smooth, WindowKind};
use labpanel_core::attribute::AttrValue;
use labpanel_core::bus::{DeviceBus, DeviceProxy};
use labpanel_core::config::{ArchivingSettings, DeviceNames};
use labpanel_core::error::{BusError, UserError};

use crate::common::connect_critical;

/// Date format expected by `ExtractBetweenDates`.
pub const ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Minute steps of a span.
pub const SPAN_MINUTES: [u32; 4] = [0, 15, 30, 45];

/// Length of a time range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub days: u32,
    pub hours: u32,
    minutes: u32,
}

impl Span {
    /// `minutes` must be one of [`SPAN_MINUTES`].
    pub fn new(days: u32, hours: u32, minutes: u32) -> Result<Self, UserError> {
        if !SPAN_MINUTES.contains(&minutes) {
            return Err(UserError::new(
                "Bad value",
                format!("Span minutes must be one of {:?}", SPAN_MINUTES),
            ));
        }
        Ok(Self { days, hours, minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.days))
            + TimeDelta::hours(i64::from(self.hours))
            + TimeDelta::minutes(i64::from(self.minutes))
    }
}

/// How the extraction interval is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    /// `end == None` means now.
    BeginEnd {
        begin: NaiveDateTime,
        end: Option<NaiveDateTime>,
    },
    BeginSpan {
        begin: NaiveDateTime,
        span: Span,
    },
    LastSpan(Span),
}

impl TimeRange {
    /// Start and end of the range, given the current local time.
    pub fn resolve(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        match *self {
            TimeRange::BeginEnd { begin, end } => (begin, end.unwrap_or(now)),
            TimeRange::BeginSpan { begin, span } => (begin, begin + span.duration()),
            TimeRange::LastSpan(span) => (now - span.duration(), now),
        }
    }
}

/// One node of the attribute tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceGroup {
    pub device: String,
    /// Full attribute names.
    pub attributes: Vec<String>,
}

/// Group full attribute names by device, both sorted.
pub fn group_by_device(attributes: &[String]) -> Vec<DeviceGroup> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for attr in attributes {
        let device = attr.rsplit_once('/').map_or("", |(dev, _)| dev);
        groups.entry(device.to_string()).or_default().push(attr.clone());
    }
    groups
        .into_iter()
        .map(|(device, mut attributes)| {
            attributes.sort();
            DeviceGroup { device, attributes }
        })
        .collect()
}

/// History of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub attribute: String,
    /// Unix timestamps.
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

/// Retry policy of the extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl From<&ArchivingSettings> for RetryPolicy {
    fn from(settings: &ArchivingSettings) -> Self {
        Self {
            attempts: settings.attempts.max(1),
            delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }
}

fn extract_one(
    extractor: &dyn DeviceProxy,
    attribute: &str,
    start: &str,
    end: &str,
) -> Result<Option<Series>, BusError> {
    let argument = AttrValue::StrArray(vec![attribute.to_string(), start.to_string(), end.to_string()]);
    let reply = extractor.command("ExtractBetweenDates", Some(argument))?;
    let AttrValue::DoubleStringArray { doubles, strings } = reply else {
        return Ok(None);
    };
    if doubles.is_empty() {
        return Ok(None);
    }
    let values = strings
        .iter()
        .map(|s| {
            s.trim().parse::<f64>().unwrap_or_else(|_| {
                tracing::warn!(attribute, value = %s, "Unparsable archived value");
                f64::NAN
            })
        })
        .collect();
    Ok(Some(Series {
        attribute: attribute.to_string(),
        times: doubles,
        values,
    }))
}

/// Extract every attribute over `[start, end]`. Attributes without data, or
/// failing every attempt, produce no series.
pub fn extract(
    extractor: &dyn DeviceProxy,
    attributes: &[String],
    start: NaiveDateTime,
    end: NaiveDateTime,
    policy: RetryPolicy,
) -> Vec<Series> {
    let start = start.format(ARCHIVE_TIME_FORMAT).to_string();
    let end = end.format(ARCHIVE_TIME_FORMAT).to_string();
    tracing::info!(%start, %end, count = attributes.len(), "Extracting archived data");

    let mut series = Vec::new();
    for (i, attribute) in attributes.iter().enumerate() {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match extract_one(extractor, attribute, &start, &end) {
                Ok(Some(s)) => {
                    tracing::info!(index = i, attribute = %attribute, points = s.times.len(), "Fetched");
                    series.push(s);
                    break;
                }
                Ok(None) => {
                    tracing::info!(index = i, attribute = %attribute, "No data");
                    break;
                }
                Err(e) => {
                    tracing::warn!(attribute = %attribute, attempt, error = %e, "Extraction failed");
                    std::thread::sleep(policy.delay);
                    if attempt >= policy.attempts {
                        tracing::error!(attribute = %attribute, "Fetch failed, skipping");
                        break;
                    }
                }
            }
        }
    }
    series
}

/// Extraction running on a worker thread.
#[derive(Debug)]
pub struct ExtractionJob {
    handle: Option<JoinHandle<Vec<Series>>>,
}

impl ExtractionJob {
    pub fn spawn(
        extractor: Arc<dyn DeviceProxy>,
        attributes: Vec<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        policy: RetryPolicy,
    ) -> std::io::Result<Self> {
        let handle = std::thread::Builder::new()
            .name("archive-extract".into())
            .spawn(move || extract(extractor.as_ref(), &attributes, start, end, policy))?;
        Ok(Self { handle: Some(handle) })
    }

    /// Result of a finished job. Returns `None` while it is running, and once
    /// the result has been taken.
    pub fn poll(&mut self) -> Option<Vec<Series>> {
        if !self.handle.as_ref()?.is_finished() {
            return None;
        }
        self.join()
    }

    /// Wait for the job.
    pub fn join(&mut self) -> Option<Vec<Series>> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(series) => Some(series),
            Err(_) => {
                tracing::error!("Extraction thread panicked");
                Some(Vec::new())
            }
        }
    }
}

/// Archiving viewer controller.
pub struct ArchivingPanel {
    extractor: Arc<dyn DeviceProxy>,
    policy: RetryPolicy,
    /// Archived attributes by device.
    pub tree: Vec<DeviceGroup>,
    selected: BTreeSet<String>,
    pub range: TimeRange,
    series: Vec<Series>,
    smoothing: Option<usize>,
    window_len: usize,
    job: Option<ExtractionJob>,
}

impl ArchivingPanel {
    pub fn open(
        bus: Arc<dyn DeviceBus>,
        names: &DeviceNames,
        settings: &ArchivingSettings,
        now: NaiveDateTime,
    ) -> Result<Self, UserError> {
        let extractor = connect_critical(bus.as_ref(), &names.archive_extractor, "HDB extractor is not available")
            .map_err(|e| UserError::new("Extractor not available", e.message))?;
        let mut panel = Self {
            extractor,
            policy: RetryPolicy::from(settings),
            tree: Vec::new(),
            selected: BTreeSet::new(),
            range: TimeRange::BeginEnd {
                begin: now - TimeDelta::hours(1),
                end: Some(now),
            },
            series: Vec::new(),
            smoothing: None,
            window_len: settings.smoothing_window,
            job: None,
        };
        panel.reload_attributes();
        Ok(panel)
    }

    /// Read the archived attribute list again.
    pub fn reload_attributes(&mut self) {
        match self.extractor.command("GetAttNameAll", None) {
            Ok(AttrValue::StrArray(names)) => self.tree = group_by_device(&names),
            Ok(other) => tracing::warn!(reply = ?other, "Unexpected attribute list"),
            Err(e) => tracing::error!(error = %e, "Failed to list archived attributes"),
        }
    }

    pub fn set_selected(&mut self, attribute: &str, selected: bool) {
        if selected {
            self.selected.insert(attribute.to_string());
        } else {
            self.selected.remove(attribute);
        }
    }

    /// Select or clear every attribute of a device.
    pub fn set_device_selected(&mut self, device: &str, selected: bool) {
        let attributes: Vec<String> = self
            .tree
            .iter()
            .filter(|g| g.device == device)
            .flat_map(|g| g.attributes.iter().cloned())
            .collect();
        for attr in attributes {
            self.set_selected(&attr, selected);
        }
    }

    pub fn is_selected(&self, attribute: &str) -> bool {
        self.selected.contains(attribute)
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    /// Extract the selected attributes on the calling thread.
    pub fn refresh_blocking(&mut self, now: NaiveDateTime) {
        let (start, end) = self.range.resolve(now);
        let attributes: Vec<String> = self.selected.iter().cloned().collect();
        self.series = extract(self.extractor.as_ref(), &attributes, start, end, self.policy);
    }

    /// Start extracting the selected attributes in the background.
    pub fn start_refresh(&mut self, now: NaiveDateTime) -> Result<(), UserError> {
        if self.is_busy() {
            return Ok(());
        }
        let (start, end) = self.range.resolve(now);
        let attributes = self.selected.iter().cloned().collect();
        let job = ExtractionJob::spawn(Arc::clone(&self.extractor), attributes, start, end, self.policy)
            .map_err(|e| UserError::new("Extraction failed", e.to_string()))?;
        self.job = Some(job);
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    /// Collect the result of a finished background extraction. Returns true
    /// when new data arrived.
    pub fn poll(&mut self) -> bool {
        let Some(series) = self.job.as_mut().and_then(ExtractionJob::poll) else {
            return false;
        };
        self.job = None;
        self.series = series;
        true
    }

    /// Extracted series, unsmoothed.
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn smoothing(&self) -> Option<usize> {
        self.smoothing
    }

    /// Enable smoothing with the last window length, or disable it.
    pub fn enable_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled.then_some(self.window_len);
    }

    /// Window length typed by the user. Unparsable text falls back to 11.
    pub fn set_window_length(&mut self, text: &str) {
        self.window_len = text.trim().parse().unwrap_or(11);
        if self.smoothing.is_some() {
            self.smoothing = Some(self.window_len);
        }
    }

    /// Values to plot for series `index`. A series that cannot be smoothed
    /// is shown raw.
    pub fn displayed(&self, index: usize) -> Option<Vec<f64>> {
        let series = self.series.get(index)?;
        let Some(len) = self.smoothing else {
            return Some(series.values.clone());
        };
        Some(
            smooth(&series.values, len, WindowKind::Hanning).unwrap_or_else(|e| {
                tracing::debug!(attribute = %series.attribute, error = %e, "Smoothing skipped");
                series.values.clone()
            }),
        )
    }
}
