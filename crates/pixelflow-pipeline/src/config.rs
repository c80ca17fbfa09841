use std::time::Duration;

/// Configuration for the pipeline coordinator.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use pixelflow_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default().with_histogram_interval(Duration::from_secs(1));
/// assert_eq!(config.device_index, 0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Minimum time between histogram refreshes while capturing.
    pub histogram_interval: Duration,
    /// Index of the capture device to open.
    pub device_index: u32,
    /// How long the consumer waits for a frame before checking in again.
    pub poll_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            histogram_interval: Duration::from_secs(5),
            device_index: 0,
            poll_timeout: Duration::from_millis(100),
        }
    }
}

impl PipelineConfig {
    /// Set the histogram refresh interval.
    pub fn with_histogram_interval(mut self, interval: Duration) -> Self {
        self.histogram_interval = interval;
        self
    }

    /// Set the capture device index.
    pub fn with_device_index(mut self, index: u32) -> Self {
        self.device_index = index;
        self
    }

    /// Set the consumer poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}
