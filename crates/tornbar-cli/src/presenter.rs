use tornbar_core::{Notification, NotificationPresenter};

/// Prints notifications to stdout and the log
pub struct LogPresenter;

impl NotificationPresenter for LogPresenter {
    fn present(&self, notification: &Notification) {
        tracing::info!(
            sound = %notification.sound,
            "{}: {}",
            notification.title,
            notification.body
        );
        // Terminal bell stands in for the alert sound
        let bell = if notification.sound.is_silent() { "" } else { "\x07" };
        println!(
            "{}[{}] {} - {}\n    {}",
            bell,
            chrono::Local::now().format("%H:%M:%S"),
            notification.title,
            notification.body,
            notification.category.url()
        );
    }
}
