//! Order-preserving collections with named predicate filters.
//!
//! Each element type declares a static table mapping its filter enum to a
//! predicate. `select` returns the matching elements in their original order
//! and never mutates the collection.

use std::ops::Deref;

/// One row of a predicate table.
pub struct FilterEntry<T: 'static, F: 'static> {
    pub filter: F,
    pub name: &'static str,
    pub predicate: fn(&T) -> bool,
}

/// Types that can be filtered by a declared predicate set.
pub trait Filterable: Sized + 'static {
    /// The set of declared predicates.
    type Filter: Copy + PartialEq + std::fmt::Debug + 'static;

    /// Static predicate table, one entry per filter.
    fn filters() -> &'static [FilterEntry<Self, Self::Filter>];

    /// Evaluate a filter against this value.
    fn matches(&self, filter: Self::Filter) -> bool {
        Self::filters()
            .iter()
            .find(|entry| entry.filter == filter)
            .is_some_and(|entry| (entry.predicate)(self))
    }
}

/// Value-typed filters for jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobFilter {
    BatchesFinished,
    Finished,
    Failed,
    Aborted,
    Closed,
    Open,
    CanCreateBatches,
    Successful,
}

/// Value-typed filters for batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchFilter {
    InProgress,
    Queued,
    Completed,
    Failed,
    NotProcessed,
    Finished,
    Successful,
}

/// Value-typed filters for result records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFilter {
    Error,
    Created,
    Successful,
    Updated,
}

/// An ordered collection of jobs, batches, or result records.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Filterable> Collection<T> {
    /// Elements matching `filter`, in collection order.
    pub fn select(&self, filter: T::Filter) -> Vec<&T> {
        self.items.iter().filter(|item| item.matches(filter)).collect()
    }

    /// Number of elements matching `filter`.
    pub fn count(&self, filter: T::Filter) -> usize {
        self.items.iter().filter(|item| item.matches(filter)).count()
    }

    /// Like [`select`](Collection::select) with the predicate given by name
    /// (`"can_create_batches"`). Returns `None` for an unknown name.
    pub fn select_named(&self, name: &str) -> Option<Vec<&T>> {
        let entry = T::filters()
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))?;
        Some(
            self.items
                .iter()
                .filter(|item| (entry.predicate)(item))
                .collect(),
        )
    }
}

impl<T> Deref for Collection<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> Extend<T> for Collection<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
