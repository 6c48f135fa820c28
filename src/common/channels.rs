//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

use crate::notify::Notification;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 256;

/// Create a new notification channel with the default buffer size
pub fn create_notification_channel() -> (mpsc::Sender<Notification>, mpsc::Receiver<Notification>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new notification channel with a custom buffer size
pub fn create_notification_channel_with_size(
    size: usize,
) -> (mpsc::Sender<Notification>, mpsc::Receiver<Notification>) {
    mpsc::channel(size.max(1))
}
