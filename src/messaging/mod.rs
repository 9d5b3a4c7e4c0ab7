// Messaging - queues between the control thread and the audio context

pub mod channels;
pub mod command;
pub mod notification;

pub use command::{Command, PlanUpdate, TriggerNotification};
pub use notification::{Notification, NotificationCategory, NotificationLevel};
