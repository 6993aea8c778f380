use std::fmt::Debug;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// A reactive value owned by a mixer entity.
///
/// Only the crate (on behalf of a backend) may change the value; applications
/// read it synchronously with [`Property::get`] or follow it with
/// [`Property::watch`].
#[derive(Clone)]
pub struct Property<T: Clone + Send + Sync + 'static> {
    tx: watch::Sender<T>,
}

impl<T: Clone + Send + Sync + 'static> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Store a new value and wake all watchers.
    ///
    /// Returns `false` when the value was already current, in which case
    /// nobody is notified.
    pub(crate) fn set(&self, new_value: T) -> bool
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current != new_value {
                *current = new_value;
                true
            } else {
                false
            }
        })
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Watch for changes to this property.
    ///
    /// The stream yields the current value first, then every later change.
    pub fn watch(&self) -> WatchStream<T> {
        WatchStream::new(self.tx.subscribe())
    }
}

impl<T: Clone + Send + Sync + Debug + 'static> Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[test]
    fn set_reports_whether_value_changed() {
        let property = Property::new(false);

        assert!(property.set(true));
        assert!(!property.set(true));
        assert!(property.get());
    }

    #[tokio::test]
    async fn watch_yields_current_value_first() {
        let property = Property::new(0.25_f32);
        let mut stream = property.watch();

        assert_eq!(stream.next().await, Some(0.25));

        property.set(-0.5);
        assert_eq!(stream.next().await, Some(-0.5));
    }
}
