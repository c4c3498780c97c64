// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Handle returned when registering a callback, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// A subscriber callback. Returning an error marks the delivery as failed.
pub type Observer<E> = Box<dyn FnMut(&E) -> anyhow::Result<()>>;

/// An ordered list of subscribers owned by the publishing component.
///
/// Delivery is synchronous and in registration order. Each callback is
/// isolated: an `Err` return or a panic is logged and the remaining
/// callbacks still run.
pub struct ObserverList<E> {
    label: &'static str,
    entries: Vec<(ObserverId, Observer<E>)>,
    next_id: u64,
}

impl<E> ObserverList<E> {
    /// Creates an empty list. `label` prefixes every log line it emits.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a callback and returns its handle.
    pub fn subscribe(&mut self, callback: Observer<E>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        log::debug!("{}: subscribed observer {:?}", self.label, id);
        id
    }

    /// Removes a callback. Returns `false` if the handle is unknown.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Drops every callback.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delivers `event` to every callback and returns how many failed.
    pub fn notify(&mut self, event: &E) -> usize {
        let mut failures = 0;
        for (id, callback) in self.entries.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    log::warn!("{}: observer {:?} failed: {:#}", self.label, id, e);
                }
                Err(payload) => {
                    failures += 1;
                    log::warn!(
                        "{}: observer {:?} panicked: {}",
                        self.label,
                        id,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        failures
    }
}

impl<E> fmt::Debug for ObserverList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("label", &self.label)
            .field("observers", &self.entries.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn delivers_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut list = ObserverList::<u32>::new("test");
        for tag in ["a", "b"] {
            let seen = seen.clone();
            list.subscribe(Box::new(move |v| {
                seen.borrow_mut().push(format!("{tag}{v}"));
                Ok(())
            }));
        }
        assert_eq!(list.notify(&7), 0);
        assert_eq!(*seen.borrow(), vec!["a7".to_string(), "b7".to_string()]);
    }

    #[test]
    fn failing_observers_do_not_block_others() {
        let hits = Rc::new(RefCell::new(0));
        let mut list = ObserverList::<()>::new("test");
        list.subscribe(Box::new(|_| anyhow::bail!("boom")));
        list.subscribe(Box::new(|_| panic!("kaboom")));
        let counter = hits.clone();
        list.subscribe(Box::new(move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        }));

        assert_eq!(list.notify(&()), 2);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_observer() {
        let mut list = ObserverList::<()>::new("test");
        let a = list.subscribe(Box::new(|_| Ok(())));
        let _b = list.subscribe(Box::new(|_| Ok(())));
        assert!(list.unsubscribe(a));
        assert!(!list.unsubscribe(a));
        assert_eq!(list.len(), 1);
    }
}
