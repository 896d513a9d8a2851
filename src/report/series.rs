//! Per-monitor grouping of stored samples.

use crate::db::{MetricSample, SampleFilter};

use std::collections::BTreeMap;

/// Stored samples grouped by monitor URL, each group in time order.
///
/// Every query is a pure function of the samples and a [`SampleFilter`].
#[derive(Debug, Default, Clone)]
pub struct SeriesAggregator {
    groups: BTreeMap<String, Vec<MetricSample>>,
}

/// The filtered samples of one monitor.
pub(crate) struct MonitorSeries<'a> {
    pub url: &'a str,
    pub samples: Vec<&'a MetricSample>,
}

impl<'a> MonitorSeries<'a> {
    /// Display label: the name on the most recent sample.
    pub fn name(&self) -> &'a str {
        self.samples
            .last()
            .map(|s| s.monitor_name.as_str())
            .unwrap_or(self.url)
    }
}

impl SeriesAggregator {
    pub fn new(samples: impl IntoIterator<Item = MetricSample>) -> Self {
        let mut groups: BTreeMap<String, Vec<MetricSample>> = BTreeMap::new();
        for sample in samples {
            groups.entry(sample.monitor_url.clone()).or_default().push(sample);
        }
        for samples in groups.values_mut() {
            samples.sort_by(|a, b| a.fetched_at.cmp(&b.fetched_at).then(a.id.cmp(&b.id)));
        }
        Self { groups }
    }

    /// Monitors with at least one sample matching `filter`, ordered by URL.
    pub(crate) fn monitors<'a>(
        &'a self,
        filter: &'a SampleFilter,
    ) -> impl Iterator<Item = MonitorSeries<'a>> + 'a {
        self.groups
            .iter()
            .filter(move |(url, _)| filter.monitor_url.as_deref().map_or(true, |f| f == url.as_str()))
            .filter_map(move |(url, samples)| {
                let samples: Vec<_> = samples.iter().filter(|s| filter.matches(s)).collect();
                if samples.is_empty() {
                    None
                } else {
                    Some(MonitorSeries { url, samples })
                }
            })
    }

    /// Every sample matching `filter`.
    pub(crate) fn samples<'a>(
        &'a self,
        filter: &'a SampleFilter,
    ) -> impl Iterator<Item = &'a MetricSample> + 'a {
        self.groups
            .values()
            .flat_map(|samples| samples.iter())
            .filter(move |s| filter.matches(s))
    }
}
