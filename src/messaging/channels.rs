// Lock-free communication channels

use crate::messaging::command::{Command, PlanUpdate, TriggerNotification};
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};
use std::sync::{Arc, Mutex};

pub type CommandProducer = ringbuf::HeapProd<Command>;
pub type CommandConsumer = ringbuf::HeapCons<Command>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<Command>::new(capacity);
    rb.split()
}

/// Retired plans coming back from the audio context, released on the control thread
pub type GarbageProducer = ringbuf::HeapProd<Box<PlanUpdate>>;
pub type GarbageConsumer = ringbuf::HeapCons<Box<PlanUpdate>>;

pub fn create_garbage_channel(capacity: usize) -> (GarbageProducer, GarbageConsumer) {
    let rb = HeapRb::<Box<PlanUpdate>>::new(capacity);
    rb.split()
}

pub type TriggerProducer = ringbuf::HeapProd<TriggerNotification>;
pub type TriggerConsumer = ringbuf::HeapCons<TriggerNotification>;

pub fn create_trigger_channel(capacity: usize) -> (TriggerProducer, TriggerConsumer) {
    let rb = HeapRb::<TriggerNotification>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

/// Several non-real-time contexts report through the same producer
pub type SharedNotificationProducer = Arc<Mutex<NotificationProducer>>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Push without blocking; the notice is dropped if the lock is busy or the queue full
pub fn try_notify(notifications: &SharedNotificationProducer, notification: Notification) {
    if let Ok(mut tx) = notifications.try_lock() {
        let _ = ringbuf::traits::Producer::try_push(&mut *tx, notification);
    }
}
