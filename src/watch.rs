//! Selector-scoped observation: a value-diffing binding layered on the raw
//! subscription bus.

use std::sync::Mutex;

use crate::state::State;
use crate::store::{Store, SubscriptionId};

impl<S: State> Store<S> {
    /// Observe a derived value instead of the whole state.
    ///
    /// The raw subscription bus fires on every commit regardless of what a
    /// selector looks at; this wrapper caches the last selected value and
    /// invokes `on_change` only when the newly selected value differs
    /// (`PartialEq`). Equality of the selected value is the only skip
    /// criterion — the store itself never dedups commits.
    ///
    /// The returned id unsubscribes the watcher like any other listener.
    pub fn watch<V, Sel, F>(&self, selector: Sel, on_change: F) -> SubscriptionId
    where
        V: PartialEq + Send + 'static,
        Sel: Fn(&S) -> V + Send + Sync + 'static,
        F: Fn(&V) + Send + Sync + 'static,
    {
        let last = Mutex::new(selector(&self.get()));
        let weak = self.weak_inner();
        self.subscribe(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let Some(state) = inner.current() else {
                return;
            };
            let next = selector(&state);
            let mut last = last.lock().expect("watch cache lock poisoned");
            if *last != next {
                *last = next;
                on_change(&*last);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Prefs {
        count: u32,
        theme: String,
    }

    #[derive(Debug, Default)]
    struct PrefsPatch {
        count: Option<u32>,
        theme: Option<String>,
    }

    impl State for Prefs {
        type Patch = PrefsPatch;

        fn merge(&self, patch: PrefsPatch) -> Self {
            Prefs {
                count: patch.count.unwrap_or(self.count),
                theme: patch.theme.unwrap_or_else(|| self.theme.clone()),
            }
        }
    }

    fn prefs_store() -> Store<Prefs> {
        Store::new(|_set, _get| Prefs {
            count: 0,
            theme: "dark".to_string(),
        })
        .unwrap()
    }

    fn count_patch(count: u32) -> PrefsPatch {
        PrefsPatch {
            count: Some(count),
            ..PrefsPatch::default()
        }
    }

    fn theme_patch(theme: &str) -> PrefsPatch {
        PrefsPatch {
            theme: Some(theme.to_string()),
            ..PrefsPatch::default()
        }
    }

    #[test]
    fn watch_fires_when_the_selected_value_changes() {
        let store = prefs_store();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        store.watch(|p: &Prefs| p.count, move |count| {
            s.lock().unwrap().push(*count);
        });

        store.set(count_patch(1)).unwrap();
        store.set(count_patch(2)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn watch_skips_commits_that_leave_the_value_equal() {
        let store = prefs_store();
        let fired = Arc::new(AtomicU64::new(0));
        let f = fired.clone();
        store.watch(|p: &Prefs| p.count, move |_| {
            f.fetch_add(1, Ordering::Relaxed);
        });

        store.set(theme_patch("light")).unwrap();
        store.set(theme_patch("dark")).unwrap();
        store.set(count_patch(0)).unwrap(); // value-equal to the default
        assert_eq!(fired.load(Ordering::Relaxed), 0);

        store.set(count_patch(1)).unwrap();
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn raw_subscriber_still_fires_on_every_commit() {
        let store = prefs_store();
        let raw = Arc::new(AtomicU64::new(0));
        let watched = Arc::new(AtomicU64::new(0));
        let r = raw.clone();
        let w = watched.clone();

        store.subscribe(move || {
            r.fetch_add(1, Ordering::Relaxed);
        });
        store.watch(|p: &Prefs| p.count, move |_| {
            w.fetch_add(1, Ordering::Relaxed);
        });

        store.set(theme_patch("light")).unwrap();
        store.set(count_patch(5)).unwrap();

        assert_eq!(raw.load(Ordering::Relaxed), 2);
        assert_eq!(watched.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn watcher_unsubscribes_like_any_listener() {
        let store = prefs_store();
        let fired = Arc::new(AtomicU64::new(0));
        let f = fired.clone();
        let id = store.watch(|p: &Prefs| p.count, move |_| {
            f.fetch_add(1, Ordering::Relaxed);
        });

        store.set(count_patch(1)).unwrap();
        assert_eq!(fired.load(Ordering::Relaxed), 1);

        store.unsubscribe(id);
        store.set(count_patch(2)).unwrap();
        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn watch_receives_the_new_value() {
        let store = prefs_store();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let s = seen.clone();
        store.watch(
            |p: &Prefs| p.theme.clone(),
            move |theme: &String| {
                *s.lock().unwrap() = Some(theme.clone());
            },
        );

        store.set(theme_patch("light")).unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("light"));
    }
}
