use std::sync::{Mutex, MutexGuard, PoisonError};

/// Single-slot, last-value-wins handoff between one producer and one consumer.
///
/// The lock is held only to swap the slot, never across I/O or decoding. A
/// poisoned lock is recovered: the slot holds a plain value that a panicking
/// holder cannot leave half-written.
#[derive(Debug)]
pub struct LatestCell<T> {
    slot: Mutex<Option<T>>,
}

impl<T> LatestCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store `value`, replacing any unread one. Returns true if an unread
    /// value was dropped.
    pub fn publish(&self, value: T) -> bool {
        self.lock().replace(value).is_some()
    }

    /// Remove and return the current value.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for LatestCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn publish_then_take() {
        let cell = LatestCell::new();
        assert!(!cell.publish(7));
        assert_eq!(cell.take(), Some(7));
        assert_eq!(cell.take(), None);
    }

    #[test]
    fn last_publish_wins() {
        let cell = LatestCell::new();
        cell.publish("first");
        assert!(cell.publish("second"), "unread value should be reported");
        assert_eq!(cell.take(), Some("second"));
        assert_eq!(cell.take(), None);
        assert!(!cell.publish("third"), "slot should be empty after take");
    }

    #[test]
    fn survives_poisoned_lock() {
        let cell = Arc::new(LatestCell::new());
        cell.publish(1u32);

        let poisoner = Arc::clone(&cell);
        let result = thread::spawn(move || {
            let _guard = poisoner.slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();
        assert!(result.is_err());

        assert_eq!(cell.take(), Some(1));
        cell.publish(2);
        assert_eq!(cell.take(), Some(2));
    }

    #[test]
    fn consumer_sees_values_in_publish_order() {
        let cell = Arc::new(LatestCell::new());
        let producer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for i in 0..10_000u32 {
                    cell.publish(i);
                }
            })
        };

        let mut last = None;
        loop {
            if let Some(v) = cell.take() {
                if let Some(prev) = last {
                    assert!(v > prev, "values must arrive in publish order");
                }
                last = Some(v);
                if v == 9_999 {
                    break;
                }
            }
            thread::yield_now();
        }
        producer.join().expect("producer thread should finish");
    }
}
