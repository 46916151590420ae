use crate::fusion::DataChange;

/// Port for observers of fused data.
///
/// Called synchronously after each import completes.
pub trait DataChangeListener: Send + Sync {
    /// Receive a change notification
    fn on_data_changed(&self, change: &DataChange);
}

/// Listener that records every change at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl DataChangeListener for LoggingListener {
    fn on_data_changed(&self, change: &DataChange) {
        tracing::debug!(?change, "Fused data changed");
    }
}
