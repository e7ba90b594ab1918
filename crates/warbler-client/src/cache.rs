//! Read cache keyed by endpoint URL, with reconciling optimistic edits.
//!
//! Each entry keeps the last value the server vouched for (`base`) and an
//! ordered list of pending optimistic edits. What views see is `base` with
//! every pending edit replayed on top. That gives three outcomes for an
//! edit:
//!
//! * **confirm**: the edit is dropped and the server's authoritative fields
//!   are written into `base`, so the view converges on server truth. An
//!   answer for an edit older than one already confirmed is not written;
//! * **reject**: the edit is dropped and nothing else changes, so the view
//!   falls back to the pre-mutation snapshot (plus any other edits still
//!   pending);
//! * **refetch** (`insert`): `base` is replaced and pending edits are
//!   replayed on the fresh value.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Tag for one optimistic mutation. A single mutation may touch several
/// cache entries under the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(Uuid);

impl MutationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Transform<V> = Box<dyn Fn(&V) -> V + Send + Sync>;

struct PendingEdit<V> {
    id: MutationId,
    seq: u64,
    apply: Transform<V>,
}

struct Entry<V> {
    base: V,
    pending: Vec<PendingEdit<V>>,
    view: V,
    stale: bool,
    /// Sequence number of the newest edit whose answer reached `base`.
    settled_seq: u64,
}

impl<V: Clone> Entry<V> {
    fn new(value: V) -> Self {
        Self {
            view: value.clone(),
            base: value,
            pending: Vec::new(),
            stale: false,
            settled_seq: 0,
        }
    }

    fn rebuild(&mut self) {
        self.view = self
            .pending
            .iter()
            .fold(self.base.clone(), |value, edit| (edit.apply)(&value));
    }

    fn take_pending(&mut self, id: MutationId) -> Option<u64> {
        let pos = self.pending.iter().position(|edit| edit.id == id)?;
        Some(self.pending.remove(pos).seq)
    }
}

pub struct QueryCache<V> {
    entries: HashMap<String, Entry<V>>,
    events: broadcast::Sender<String>,
    next_seq: u64,
}

impl<V: Clone> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> QueryCache<V> {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self::with_events(events)
    }

    /// Share one change feed between several caches.
    pub fn with_events(events: broadcast::Sender<String>) -> Self {
        Self {
            entries: HashMap::new(),
            events,
            next_seq: 0,
        }
    }

    /// Receive the key of every entry whose rendered value changed.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.events.subscribe()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.view)
    }

    /// The last server-confirmed value, without pending edits.
    pub fn confirmed(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.base)
    }

    /// True once an optimistic edit has been applied since the last fetch.
    pub fn is_stale(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.stale)
    }

    pub fn pending_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, |entry| entry.pending.len())
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Store a freshly fetched server response. Edits still in flight are
    /// replayed on top of it.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.base = value;
                entry.stale = false;
                entry.rebuild();
            }
            None => {
                self.entries.insert(key.clone(), Entry::new(value));
            }
        }
        self.notify(&key);
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.notify(key);
        Some(entry.view)
    }

    /// Rewrite the cached value with `transform` right away, tagged with a
    /// fresh mutation id. Returns `None` (and changes nothing) if `key` has
    /// never been fetched.
    pub fn apply_optimistic<F>(&mut self, key: &str, transform: F) -> Option<MutationId>
    where
        F: Fn(&V) -> V + Send + Sync + 'static,
    {
        let id = MutationId::new();
        self.apply_optimistic_as(id, key, transform).then_some(id)
    }

    /// Same as [`apply_optimistic`](Self::apply_optimistic) under a caller-chosen id.
    pub fn apply_optimistic_as<F>(&mut self, id: MutationId, key: &str, transform: F) -> bool
    where
        F: Fn(&V) -> V + Send + Sync + 'static,
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        self.next_seq += 1;
        entry.view = transform(&entry.view);
        entry.pending.push(PendingEdit {
            id,
            seq: self.next_seq,
            apply: Box::new(transform),
        });
        entry.stale = true;

        debug!("Optimistic edit {} applied to {}", id, key);
        self.notify(key);
        true
    }

    /// The server accepted mutation `id`: drop its optimistic edit and write
    /// the authoritative result into the confirmed value. Answers are applied
    /// in the order the edits were made; a late answer for an older edit is
    /// dropped without touching `base`.
    pub fn confirm<R>(&mut self, key: &str, id: MutationId, reconcile: R) -> bool
    where
        R: FnOnce(&mut V),
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let Some(seq) = entry.take_pending(id) else {
            return false;
        };

        if seq > entry.settled_seq {
            reconcile(&mut entry.base);
            entry.settled_seq = seq;
            debug!("Optimistic edit {} confirmed on {}", id, key);
        } else {
            debug!("Optimistic edit {} confirmed out of order on {}, answer ignored", id, key);
        }
        entry.rebuild();

        self.notify(key);
        true
    }

    /// The server refused mutation `id`: drop its optimistic edit.
    pub fn reject(&mut self, key: &str, id: MutationId) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.take_pending(id).is_none() {
            return false;
        }

        entry.rebuild();

        debug!("Optimistic edit {} rolled back on {}", id, key);
        self.notify(key);
        true
    }

    /// Confirm `id` on every entry it touched.
    pub fn confirm_all<R>(&mut self, id: MutationId, reconcile: R) -> usize
    where
        R: Fn(&mut V),
    {
        self.keys_with(id)
            .into_iter()
            .filter(|key| self.confirm(key, id, &reconcile))
            .count()
    }

    /// Reject `id` on every entry it touched.
    pub fn reject_all(&mut self, id: MutationId) -> usize {
        self.keys_with(id)
            .into_iter()
            .filter(|key| self.reject(key, id))
            .count()
    }

    /// Apply a server-confirmed change that had no optimistic counterpart
    /// (e.g. a newly created tweet).
    pub fn patch<R>(&mut self, key: &str, update: R) -> bool
    where
        R: FnOnce(&mut V),
    {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        update(&mut entry.base);
        entry.rebuild();
        self.notify(key);
        true
    }

    fn keys_with(&self, id: MutationId) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.pending.iter().any(|edit| edit.id == id))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn notify(&self, key: &str) {
        // No subscribers is fine.
        let _ = self.events.send(key.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Post {
        liked: bool,
        likes: i64,
    }

    fn toggle(p: &Post) -> Post {
        Post {
            liked: !p.liked,
            likes: if p.liked { p.likes - 1 } else { p.likes + 1 },
        }
    }

    fn cache_with(post: Post) -> QueryCache<Post> {
        let mut cache = QueryCache::new();
        cache.insert("/post", post);
        cache
    }

    #[test]
    fn optimistic_edit_is_visible_immediately() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });

        let id = cache.apply_optimistic("/post", toggle);
        assert!(id.is_some());
        assert_eq!(cache.get("/post"), Some(&Post { liked: true, likes: 3 }));
        assert_eq!(cache.confirmed("/post"), Some(&Post { liked: false, likes: 2 }));
        assert!(cache.is_stale("/post"));
        assert_eq!(cache.pending_count("/post"), 1);
    }

    #[test]
    fn missing_key_is_left_alone() {
        let mut cache: QueryCache<Post> = QueryCache::new();
        assert_eq!(cache.apply_optimistic("/nothing", toggle), None);
        assert!(cache.get("/nothing").is_none());
    }

    #[test]
    fn rejection_restores_the_snapshot() {
        let original = Post { liked: false, likes: 2 };
        let mut cache = cache_with(original.clone());

        let id = cache.apply_optimistic("/post", toggle).unwrap();
        assert!(cache.reject("/post", id));

        assert_eq!(cache.get("/post"), Some(&original));
        assert_eq!(cache.pending_count("/post"), 0);
    }

    #[test]
    fn confirmation_adopts_server_fields() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });

        let id = cache.apply_optimistic("/post", toggle).unwrap();
        // Someone else liked it meanwhile: the server's count wins.
        assert!(cache.confirm("/post", id, |p| {
            p.liked = true;
            p.likes = 5;
        }));

        assert_eq!(cache.get("/post"), Some(&Post { liked: true, likes: 5 }));
        assert_eq!(cache.confirmed("/post"), cache.get("/post"));
    }

    #[test]
    fn rejecting_one_of_two_edits_keeps_the_other() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });

        let first = cache.apply_optimistic("/post", toggle).unwrap();
        let second = cache
            .apply_optimistic("/post", |p: &Post| Post { likes: p.likes + 10, ..p.clone() })
            .unwrap();
        assert_eq!(cache.get("/post"), Some(&Post { liked: true, likes: 13 }));

        cache.reject("/post", first);
        assert_eq!(cache.get("/post"), Some(&Post { liked: false, likes: 12 }));

        cache.reject("/post", second);
        assert_eq!(cache.get("/post"), Some(&Post { liked: false, likes: 2 }));
    }

    #[test]
    fn refetch_replays_pending_edits() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });
        cache.apply_optimistic("/post", toggle).unwrap();

        cache.insert("/post", Post { liked: false, likes: 7 });
        assert_eq!(cache.get("/post"), Some(&Post { liked: true, likes: 8 }));
        assert!(!cache.is_stale("/post"));
    }

    #[test]
    fn one_id_spans_several_entries() {
        let mut cache = QueryCache::new();
        cache.insert("/a", Post { liked: false, likes: 0 });
        cache.insert("/b", Post { liked: false, likes: 0 });

        let id = MutationId::new();
        assert!(cache.apply_optimistic_as(id, "/a", toggle));
        assert!(cache.apply_optimistic_as(id, "/b", toggle));
        assert!(!cache.apply_optimistic_as(id, "/c", toggle));

        assert_eq!(cache.reject_all(id), 2);
        assert_eq!(cache.get("/a"), Some(&Post { liked: false, likes: 0 }));
        assert_eq!(cache.get("/b"), Some(&Post { liked: false, likes: 0 }));

        // Already settled: nothing left to confirm.
        assert_eq!(cache.confirm_all(id, |_| {}), 0);
    }

    #[test]
    fn late_answer_for_an_older_edit_is_ignored() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });

        let first = cache.apply_optimistic("/post", toggle).unwrap();
        let second = cache.apply_optimistic("/post", toggle).unwrap();

        // The second toggle's answer arrives first.
        assert!(cache.confirm("/post", second, |p| {
            p.liked = false;
            p.likes = 2;
        }));
        assert!(cache.confirm("/post", first, |p| {
            p.liked = true;
            p.likes = 3;
        }));

        assert_eq!(cache.get("/post"), Some(&Post { liked: false, likes: 2 }));
        assert_eq!(cache.pending_count("/post"), 0);
    }

    #[test]
    fn in_order_answers_all_apply() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });

        let first = cache.apply_optimistic("/post", toggle).unwrap();
        let second = cache.apply_optimistic("/post", toggle).unwrap();

        cache.confirm("/post", first, |p| {
            p.liked = true;
            p.likes = 3;
        });
        assert_eq!(cache.get("/post"), Some(&Post { liked: false, likes: 2 }));

        cache.confirm("/post", second, |p| {
            p.liked = false;
            p.likes = 4;
        });
        assert_eq!(cache.get("/post"), Some(&Post { liked: false, likes: 4 }));
    }

    #[test]
    fn settling_an_unknown_id_is_a_no_op() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });
        assert!(!cache.reject("/post", MutationId::new()));
        assert!(!cache.confirm("/post", MutationId::new(), |p| p.likes = 99));
        assert_eq!(cache.get("/post"), Some(&Post { liked: false, likes: 2 }));
    }

    #[test]
    fn subscribers_hear_about_changes() {
        let mut cache = cache_with(Post { liked: false, likes: 2 });
        let mut rx = cache.subscribe();

        let id = cache.apply_optimistic("/post", toggle).unwrap();
        cache.reject("/post", id);

        assert_eq!(rx.try_recv().unwrap(), "/post");
        assert_eq!(rx.try_recv().unwrap(), "/post");
        assert!(rx.try_recv().is_err());
    }
}
