//! Document store: the immutable state tree, path-based mutation, change
//! subscriptions and bounded undo/redo.
//!
//! The root holds the persisted presentation plus the editor's transient
//! UI state (`activeSlideId`, `selectedElementIds`). Every write produces a
//! new root; a value obtained from an earlier [`DocumentStore::get`] is
//! never modified afterwards.

mod history;
pub mod path;
mod value;

pub use history::History;
pub use path::{Segment, StatePath, StyleField, paths};
pub use value::StateValue;

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::document::{ElementId, Presentation, SlideId};

/// Errors from path access and typed decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("invalid path: `{0}`")]
    InvalidPath(String),
    #[error("cannot write through a {found} at `{path}`")]
    PathConflict { path: String, found: &'static str },
    #[error("index {index} out of bounds at `{path}` (length {len})")]
    IndexOutOfBounds { path: String, index: usize, len: usize },
    #[error("no value at `{0}`")]
    Missing(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Options for [`DocumentStore::set`] and [`DocumentStore::batch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Do not notify subscribers.
    pub silent: bool,
    /// Do not record an undo entry.
    pub skip_history: bool,
}

impl SetOptions {
    /// Record nothing in history (transient UI state).
    pub fn transient() -> Self {
        Self {
            silent: false,
            skip_history: true,
        }
    }
}

/// What a subscriber sees.
#[derive(Debug)]
pub struct Change<'a> {
    /// The subscribed path.
    pub path: &'a StatePath,
    pub new_value: Option<&'a StateValue>,
    pub old_value: Option<&'a StateValue>,
}

/// Error type subscribers may return.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber callback.
pub type Callback = Box<dyn FnMut(&Change<'_>) -> Result<(), SubscriberError>>;

/// Handle returned by [`DocumentStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Subscriber {
    path: StatePath,
    callback: Callback,
}

/// An open gesture-style transaction.
struct Transaction {
    base: StateValue,
    saved_redo: Vec<StateValue>,
    evicted: Option<StateValue>,
}

/// The document store.
pub struct DocumentStore {
    root: StateValue,
    history: History,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_subscription: u64,
    transaction: Option<Transaction>,
}

impl DocumentStore {
    /// Create a store holding `presentation`, with its first slide active.
    pub fn new(presentation: &Presentation, max_undo: usize) -> StoreResult<Self> {
        let mut store = Self {
            root: StateValue::Null,
            history: History::new(max_undo),
            subscribers: BTreeMap::new(),
            next_subscription: 0,
            transaction: None,
        };
        store.root = Self::initial_root(presentation)?;
        Ok(store)
    }

    fn initial_root(presentation: &Presentation) -> StoreResult<StateValue> {
        let mut root = StateValue::map();
        root.set(&paths::presentation(), StateValue::from_serialize(presentation)?)?;
        let active = presentation.slides.first().map(|s| s.id.clone());
        root.set(&paths::active_slide_id(), active.into())?;
        root.set(&paths::selected_element_ids(), StateValue::from(Vec::<String>::new()))?;
        Ok(root)
    }

    /// Replace the whole document (e.g. after loading). Clears history.
    pub fn reset(&mut self, presentation: &Presentation) -> StoreResult<()> {
        let next = Self::initial_root(presentation)?;
        let previous = std::mem::replace(&mut self.root, next);
        self.history.clear();
        self.transaction = None;
        self.notify(&previous, &[StatePath::root()]);
        Ok(())
    }

    /// The whole state tree.
    pub fn root(&self) -> &StateValue {
        &self.root
    }

    /// Value at `path`; `None` when any step does not resolve.
    pub fn get(&self, path: &StatePath) -> Option<&StateValue> {
        self.root.get(path)
    }

    /// Typed read at `path`.
    pub fn get_typed<T: DeserializeOwned>(&self, path: &StatePath) -> StoreResult<T> {
        self.get(path)
            .ok_or_else(|| StoreError::Missing(path.to_string()))?
            .to_typed()
    }

    /// Write `value` at `path`.
    pub fn set(&mut self, path: &StatePath, value: impl Into<StateValue>, options: SetOptions) -> StoreResult<()> {
        let mut next = self.root.clone();
        next.set(path, value.into())?;
        self.apply(next, std::slice::from_ref(path), options);
        Ok(())
    }

    /// Serialize `value` and write it at `path`.
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        path: &StatePath,
        value: &T,
        options: SetOptions,
    ) -> StoreResult<()> {
        self.set(path, StateValue::from_serialize(value)?, options)
    }

    /// Apply several writes as one step: one history entry, and each
    /// subscriber notified at most once after every write has landed.
    /// If any write fails, none is applied.
    pub fn batch<I>(&mut self, updates: I, options: SetOptions) -> StoreResult<()>
    where
        I: IntoIterator<Item = (StatePath, StateValue)>,
    {
        let mut next = self.root.clone();
        let mut touched = Vec::new();
        for (path, value) in updates {
            next.set(&path, value)?;
            touched.push(path);
        }
        if touched.is_empty() {
            return Ok(());
        }
        self.apply(next, &touched, options);
        Ok(())
    }

    fn apply(&mut self, next: StateValue, touched: &[StatePath], options: SetOptions) {
        let previous = std::mem::replace(&mut self.root, next);
        if !options.skip_history && self.transaction.is_none() {
            self.history.push(previous.clone());
        }
        if !options.silent {
            self.notify(&previous, touched);
        }
    }

    /// Register a callback for changes at `path` or below it.
    pub fn subscribe<F>(&mut self, path: StatePath, callback: F) -> SubscriptionId
    where
        F: FnMut(&Change<'_>) -> Result<(), SubscriberError> + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.insert(
            id,
            Subscriber {
                path,
                callback: Box::new(callback),
            },
        );
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Notify every subscriber affected by writes at `touched`.
    ///
    /// A subscriber fires when a write hit its path or a descendant, or when
    /// a write above it replaced its value.
    fn notify(&mut self, previous: &StateValue, touched: &[StatePath]) {
        let root = &self.root;
        for (id, subscriber) in self.subscribers.iter_mut() {
            let sub_path = &subscriber.path;
            let old_value = previous.get(sub_path);
            let new_value = root.get(sub_path);
            let affected = touched.iter().any(|written| {
                sub_path.is_prefix_of(written)
                    || (written.is_prefix_of(sub_path) && !same_opt(old_value, new_value))
            });
            if !affected {
                continue;
            }

            let change = Change {
                path: sub_path,
                new_value,
                old_value,
            };
            let callback = subscriber.callback.as_mut();
            match catch_unwind(AssertUnwindSafe(|| callback(&change))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => log::error!("Subscriber {:?} on `{}` failed: {}", id, sub_path, err),
                Err(_) => log::error!("Subscriber {:?} on `{}` panicked", id, sub_path),
            }
        }
    }

    /// Restore the previous snapshot. Returns false if there is none.
    pub fn undo(&mut self) -> bool {
        if self.transaction.is_some() {
            log::warn!("Undo ignored while a transaction is open");
            return false;
        }
        let Some(previous) = self.history.undo(self.root.clone()) else {
            return false;
        };
        let current = std::mem::replace(&mut self.root, previous);
        self.notify(&current, &[StatePath::root()]);
        true
    }

    /// Re-apply the last undone snapshot. Returns false if there is none.
    pub fn redo(&mut self) -> bool {
        if self.transaction.is_some() {
            log::warn!("Redo ignored while a transaction is open");
            return false;
        }
        let Some(next) = self.history.redo(self.root.clone()) else {
            return false;
        };
        let current = std::mem::replace(&mut self.root, next);
        self.notify(&current, &[StatePath::root()]);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Open a transaction: saves one history entry now, and suppresses
    /// history for writes until it is committed or rolled back.
    /// Returns false if one is already open.
    pub fn begin_transaction(&mut self) -> bool {
        if self.transaction.is_some() {
            return false;
        }
        let saved_redo = self.history.take_redo();
        let evicted = self.history.push(self.root.clone());
        self.transaction = Some(Transaction {
            base: self.root.clone(),
            saved_redo,
            evicted,
        });
        true
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Close the transaction, keeping its writes. If the state is
    /// deep-equal to where it started, the history entry is dropped and
    /// the redo stack restored. Returns whether anything changed.
    pub fn commit_transaction(&mut self) -> bool {
        let Some(tx) = self.transaction.take() else {
            return false;
        };
        if self.root == tx.base {
            self.drop_transaction_entry(tx);
            return false;
        }
        true
    }

    /// Close the transaction, restoring the state it started from.
    pub fn rollback_transaction(&mut self) {
        let Some(mut tx) = self.transaction.take() else {
            return;
        };
        let base = std::mem::take(&mut tx.base);
        let current = std::mem::replace(&mut self.root, base);
        self.drop_transaction_entry(tx);
        if !current.same(&self.root) {
            self.notify(&current, &[StatePath::root()]);
        }
    }

    fn drop_transaction_entry(&mut self, tx: Transaction) {
        self.history.discard_newest();
        if let Some(evicted) = tx.evicted {
            self.history.restore_oldest(evicted);
        }
        self.history.restore_redo(tx.saved_redo);
    }

    /// Decode the presentation.
    pub fn presentation(&self) -> StoreResult<Presentation> {
        self.get_typed(&paths::presentation())
    }

    pub fn active_slide_id(&self) -> Option<SlideId> {
        self.get(&paths::active_slide_id())
            .and_then(StateValue::as_str)
            .map(str::to_string)
    }

    /// Currently selected element ids, in selection order.
    pub fn selected_ids(&self) -> Vec<ElementId> {
        self.get(&paths::selected_element_ids())
            .and_then(StateValue::as_list)
            .map(|ids| ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// Replace the selection. Selection is UI state and never enters history.
    pub fn set_selection(&mut self, ids: Vec<ElementId>) -> StoreResult<()> {
        if ids == self.selected_ids() {
            return Ok(());
        }
        self.set(&paths::selected_element_ids(), ids, SetOptions::transient())
    }

    pub fn set_active_slide(&mut self, id: &str) -> StoreResult<()> {
        self.batch(
            [
                (paths::active_slide_id(), StateValue::from(id)),
                (paths::selected_element_ids(), StateValue::from(Vec::<String>::new())),
            ],
            SetOptions::transient(),
        )
    }
}

fn same_opt(a: Option<&StateValue>, b: Option<&StateValue>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same(b),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn store() -> DocumentStore {
        DocumentStore::new(&Presentation::default(), 100).unwrap()
    }

    fn counter(store: &mut DocumentStore, path: &str) -> Rc<RefCell<usize>> {
        let count = Rc::new(RefCell::new(0));
        let seen = count.clone();
        store.subscribe(StatePath::parse(path).unwrap(), move |_| {
            *seen.borrow_mut() += 1;
            Ok(())
        });
        count
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = store();
        assert!(store.get(&StatePath::parse("presentation.nope.deeper").unwrap()).is_none());
        assert!(store.get(&paths::presentation()).is_some());
    }

    #[test]
    fn test_previous_snapshot_unchanged() {
        let mut store = store();
        let before = store.root().clone();
        store
            .set(&StatePath::parse("presentation.settings.width").unwrap(), 999.0, SetOptions::default())
            .unwrap();
        assert_eq!(
            before.get(&StatePath::parse("presentation.settings.width").unwrap()),
            Some(&StateValue::Number(1280.0))
        );
    }

    #[test]
    fn test_set_notifies_path_and_ancestors() {
        let mut store = store();
        let exact = counter(&mut store, "presentation.settings.width");
        let parent = counter(&mut store, "presentation.settings");
        let root = counter(&mut store, "");
        let sibling = counter(&mut store, "presentation.slides");

        store
            .set(&StatePath::parse("presentation.settings.width").unwrap(), 640.0, SetOptions::default())
            .unwrap();

        assert_eq!(*exact.borrow(), 1);
        assert_eq!(*parent.borrow(), 1);
        assert_eq!(*root.borrow(), 1);
        assert_eq!(*sibling.borrow(), 0);
    }

    #[test]
    fn test_silent_set() {
        let mut store = store();
        let root = counter(&mut store, "");
        store
            .set(
                &StatePath::parse("presentation.settings.width").unwrap(),
                640.0,
                SetOptions {
                    silent: true,
                    skip_history: false,
                },
            )
            .unwrap();
        assert_eq!(*root.borrow(), 0);
        assert!(store.can_undo());
    }

    #[test]
    fn test_batch_notifies_each_once() {
        let mut store = store();
        let a = counter(&mut store, "presentation.settings.width");
        let b = counter(&mut store, "presentation.settings.height");
        let parent = counter(&mut store, "presentation.settings");

        store
            .batch(
                [
                    (StatePath::parse("presentation.settings.width").unwrap(), 1.0.into()),
                    (StatePath::parse("presentation.settings.height").unwrap(), 2.0.into()),
                ],
                SetOptions::default(),
            )
            .unwrap();

        assert_eq!(*a.borrow(), 1);
        assert_eq!(*b.borrow(), 1);
        assert_eq!(*parent.borrow(), 1);
        assert_eq!(store.history().undo_len(), 1);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut store = store();
        let before = store.root().clone();
        let result = store.batch(
            [
                (StatePath::parse("presentation.settings.width").unwrap(), 1.0.into()),
                (StatePath::parse("presentation.settings.width.deeper").unwrap(), 2.0.into()),
            ],
            SetOptions::default(),
        );
        assert!(result.is_err());
        assert_eq!(store.root(), &before);
        assert!(!store.can_undo());
    }

    #[test]
    fn test_subscriber_sees_whole_batch() {
        let mut store = store();
        let observed = Rc::new(RefCell::new(None));
        let slot = observed.clone();
        store.subscribe(StatePath::parse("presentation.settings").unwrap(), move |change| {
            *slot.borrow_mut() = change.new_value.cloned();
            Ok(())
        });
        store
            .batch(
                [
                    (StatePath::parse("presentation.settings.width").unwrap(), 1.0.into()),
                    (StatePath::parse("presentation.settings.height").unwrap(), 2.0.into()),
                ],
                SetOptions::default(),
            )
            .unwrap();
        let settings = observed.borrow().clone().unwrap();
        assert_eq!(settings.get(&StatePath::parse("width").unwrap()), Some(&StateValue::Number(1.0)));
        assert_eq!(settings.get(&StatePath::parse("height").unwrap()), Some(&StateValue::Number(2.0)));
    }

    #[test]
    fn test_descendant_subscriber_on_ancestor_write() {
        let mut store = store();
        let width = counter(&mut store, "presentation.settings.width");
        let slides = counter(&mut store, "presentation.slides");
        let mut presentation = store.presentation().unwrap();
        presentation.settings.width = 800.0;
        store
            .set_serialized(&paths::presentation(), &presentation, SetOptions::default())
            .unwrap();
        assert_eq!(*width.borrow(), 1);
        // Unchanged branch keeps its identity.
        assert_eq!(*slides.borrow(), 0);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let mut store = store();
        store.subscribe(StatePath::root(), |_| Err("boom".into()));
        store.subscribe(StatePath::root(), |_| panic!("subscriber panic"));
        let after = counter(&mut store, "");
        store
            .set(&StatePath::parse("presentation.settings.width").unwrap(), 1.0, SetOptions::default())
            .unwrap();
        assert_eq!(*after.borrow(), 1);
        assert_eq!(store.get_typed::<f64>(&StatePath::parse("presentation.settings.width").unwrap()).unwrap(), 1.0);
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = store();
        let count = Rc::new(RefCell::new(0));
        let seen = count.clone();
        let id = store.subscribe(StatePath::root(), move |_| {
            *seen.borrow_mut() += 1;
            Ok(())
        });
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store
            .set(&StatePath::parse("presentation.settings.width").unwrap(), 1.0, SetOptions::default())
            .unwrap();
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_undo_redo_idempotent() {
        let mut store = store();
        let width = StatePath::parse("presentation.settings.width").unwrap();
        for i in 0..5 {
            store.set(&width, i as f64, SetOptions::default()).unwrap();
        }
        assert!(store.undo());
        let after_undo = store.root().clone();
        assert!(store.undo());
        assert!(store.redo());
        assert_eq!(store.root(), &after_undo);
    }

    #[test]
    fn test_bounded_history() {
        let mut store = DocumentStore::new(&Presentation::default(), 10).unwrap();
        let width = StatePath::parse("presentation.settings.width").unwrap();
        for i in 0..25 {
            store.set(&width, i as f64, SetOptions::default()).unwrap();
        }
        let mut undos = 0;
        while store.undo() {
            undos += 1;
        }
        assert_eq!(undos, 10);
        assert_eq!(store.get_typed::<f64>(&width).unwrap(), 14.0);
    }

    #[test]
    fn test_new_write_clears_redo() {
        let mut store = store();
        let width = StatePath::parse("presentation.settings.width").unwrap();
        store.set(&width, 1.0, SetOptions::default()).unwrap();
        store.undo();
        assert!(store.can_redo());
        store.set(&width, 2.0, SetOptions::default()).unwrap();
        assert!(!store.can_redo());
        assert!(!store.redo());
    }

    #[test]
    fn test_skip_history_keeps_redo() {
        let mut store = store();
        let width = StatePath::parse("presentation.settings.width").unwrap();
        store.set(&width, 1.0, SetOptions::default()).unwrap();
        store.undo();
        store.set_selection(vec!["x".into()]).unwrap();
        assert!(store.can_redo());
    }

    #[test]
    fn test_transaction_single_entry() {
        let mut store = store();
        let width = StatePath::parse("presentation.settings.width").unwrap();
        assert!(store.begin_transaction());
        assert!(!store.begin_transaction());
        store.set(&width, 1.0, SetOptions::default()).unwrap();
        store.set(&width, 2.0, SetOptions::default()).unwrap();
        assert!(store.commit_transaction());
        assert_eq!(store.history().undo_len(), 1);
        assert!(store.undo());
        assert_eq!(store.get_typed::<f64>(&width).unwrap(), 1280.0);
    }

    #[test]
    fn test_noop_transaction_drops_entry() {
        let mut store = store();
        let width = StatePath::parse("presentation.settings.width").unwrap();
        store.set(&width, 5.0, SetOptions::default()).unwrap();
        store.undo();
        store.begin_transaction();
        store.set(&width, 1280.0, SetOptions::default()).unwrap();
        assert!(!store.commit_transaction());
        assert!(!store.can_undo());
        assert!(store.can_redo());
    }

    #[test]
    fn test_rollback_restores_base() {
        let mut store = store();
        let width = StatePath::parse("presentation.settings.width").unwrap();
        let observed = counter(&mut store, "presentation.settings.width");
        store.begin_transaction();
        store.set(&width, 3.0, SetOptions::default()).unwrap();
        store.rollback_transaction();
        assert_eq!(store.get_typed::<f64>(&width).unwrap(), 1280.0);
        assert!(!store.can_undo());
        // Once for the write, once for the rollback.
        assert_eq!(*observed.borrow(), 2);
    }
}
