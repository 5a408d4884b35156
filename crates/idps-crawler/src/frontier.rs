use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::FrontierEmpty;

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

/// URLs left to fetch during one run, in insertion order, and the ones already fetched.
///
/// Both sets live behind a single lock so that a URL is never queued again once visited, whichever
/// worker merges it. Visited only grows.
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<Inner>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Merges the initial URLs, returns how many were new.
    pub fn seed<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        self.merge(urls)
    }

    /// Queues the URLs that are neither queued nor visited, returns how many were new.
    pub fn merge<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut inner = self.lock();
        let mut added = 0;
        for url in urls {
            if !inner.visited.contains(&url) && inner.queued.insert(url.clone()) {
                inner.queue.push_back(url);
                added += 1;
            }
        }
        added
    }

    /// Removes the oldest queued URL.
    pub fn pop(&self) -> Result<String, FrontierEmpty> {
        let mut inner = self.lock();
        let url = inner.queue.pop_front().ok_or(FrontierEmpty)?;
        inner.queued.remove(&url);
        Ok(url)
    }

    /// Returns `false` when the URL was already visited.
    pub fn mark_visited(&self, url: &str) -> bool {
        let mut inner = self.lock();
        if inner.queued.remove(url) {
            inner.queue.retain(|u| u != url);
        }
        inner.visited.insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.lock().visited.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queued.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().queued.len()
    }

    pub fn visited(&self) -> usize {
        self.lock().visited.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn urls(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn seed_dedups() {
        let frontier = Frontier::new();

        assert_eq!(2, frontier.seed(urls(&["a", "b", "a"])));
        assert_eq!(2, frontier.len());
    }

    #[test]
    fn pop_until_empty() {
        let frontier = Frontier::new();
        frontier.seed(urls(&["a", "b"]));

        let popped = vec![frontier.pop().unwrap(), frontier.pop().unwrap()];
        assert_eq!(urls(&["a", "b"]), popped);
        assert_eq!(Err(FrontierEmpty), frontier.pop());
        assert!(frontier.is_empty());
    }

    #[test]
    fn merge_drops_visited_and_queued() {
        let frontier = Frontier::new();
        frontier.seed(urls(&["a"]));
        let url = frontier.pop().unwrap();
        assert!(frontier.mark_visited(&url));

        assert_eq!(1, frontier.merge(urls(&["a", "b", "b"])));
        assert_eq!(0, frontier.merge(urls(&["b"])));
        assert_eq!(Ok("b".to_string()), frontier.pop());
    }

    #[test]
    fn visiting_a_queued_url_dequeues_it() {
        let frontier = Frontier::new();
        frontier.seed(urls(&["a", "b"]));

        assert!(frontier.mark_visited("b"));
        assert_eq!(1, frontier.len());
        assert_eq!(Ok("a".to_string()), frontier.pop());
        assert_eq!(Err(FrontierEmpty), frontier.pop());
    }

    #[test]
    fn mark_visited_once() {
        let frontier = Frontier::new();

        assert!(frontier.mark_visited("a"));
        assert!(!frontier.mark_visited("a"));
        assert!(frontier.is_visited("a"));
        assert_eq!(1, frontier.visited());
    }

    #[test]
    fn concurrent_workers_visit_each_url_once() {
        let frontier = Arc::new(Frontier::new());
        frontier.seed((0..500).map(|i| format!("https://x/{i}")));

        let workers = (0..4)
            .map(|_| {
                let frontier = frontier.clone();
                thread::spawn(move || {
                    let mut owned = vec![];
                    while let Ok(url) = frontier.pop() {
                        if frontier.mark_visited(&url) {
                            if !url.ends_with("/next") {
                                frontier.merge([url.clone(), format!("{url}/next")]);
                            }
                            owned.push(url);
                        }
                    }
                    owned
                })
            })
            .collect::<Vec<_>>();

        let mut all = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect::<Vec<_>>();
        let total = all.len();
        all.sort();
        all.dedup();

        assert_eq!(total, all.len());
        assert_eq!(frontier.visited(), total);
    }
}
