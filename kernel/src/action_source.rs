//! Re-iterable, streaming sequences of log actions.
//!
//! A commit may carry far more file actions than fit in memory, and the commit path traverses its
//! actions more than once (once to recompute the row id high water mark, once to write the commit
//! file). An [`ActionSource`] therefore hands out a fresh lazy traversal on every call to
//! [`ActionSource::actions`] instead of being a one-shot iterator.
//!
//! Resources are tied to ownership: a traversal owns whatever it reads from (e.g. an open file)
//! and releases it exactly once when dropped, whether it ran to completion, was abandoned early or
//! failed. A source owns its backing storage and releases it when the source is dropped.

use std::fs::File;
use std::io::BufReader;
use std::iter;
use std::path::PathBuf;

use tracing::debug;

use crate::actions::{Action, Add, Remove};
use crate::{DeltaResult, Error};

/// Type alias for a lazy traversal over a sequence of [`Action`]s.
pub type ActionIterator<'a> = Box<dyn Iterator<Item = DeltaResult<Action>> + Send + 'a>;

/// A sequence of log actions that can be traversed any number of times.
///
/// Each call to [`ActionSource::actions`] must yield the same logical sequence.
pub trait ActionSource: Send + Sync {
    /// Start a new traversal over the actions in this source.
    fn actions(&self) -> DeltaResult<ActionIterator<'_>>;
}

impl<S: ActionSource + ?Sized> ActionSource for &S {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        (**self).actions()
    }
}

impl<S: ActionSource + ?Sized> ActionSource for Box<S> {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        (**self).actions()
    }
}

impl ActionSource for Vec<Action> {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}

impl ActionSource for Vec<Add> {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        Ok(Box::new(self.iter().cloned().map(|add| Ok(Action::Add(add)))))
    }
}

impl ActionSource for Vec<Remove> {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        Ok(Box::new(
            self.iter().cloned().map(|remove| Ok(Action::Remove(remove))),
        ))
    }
}

/// Concatenation of several sources, traversed in order.
#[derive(Default)]
pub struct ChainedActionSource {
    sources: Vec<Box<dyn ActionSource>>,
}

impl ChainedActionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: Box<dyn ActionSource>) {
        self.sources.push(source);
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for ChainedActionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainedActionSource")
            .field("num_sources", &self.sources.len())
            .finish()
    }
}

impl ActionSource for ChainedActionSource {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        // each source is opened only once the previous one is exhausted
        let actions = self
            .sources
            .iter()
            .flat_map(|source| -> ActionIterator<'_> {
                match source.actions() {
                    Ok(actions) => actions,
                    Err(err) => Box::new(iter::once(Err(err))),
                }
            });
        Ok(Box::new(actions))
    }
}

/// Actions stored as newline-delimited JSON in a local file, one action per line, the same
/// encoding as a commit file. Every traversal reopens the file; the handle is closed when the
/// traversal is dropped.
#[derive(Debug, Clone)]
pub struct JsonActionSource {
    path: PathBuf,
}

impl JsonActionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ActionSource for JsonActionSource {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        debug!("Opening action file {}", self.path.display());
        let reader = BufReader::new(File::open(&self.path)?);
        let actions = serde_json::Deserializer::from_reader(reader)
            .into_iter::<Action>()
            .map(|action| action.map_err(Error::from));
        Ok(Box::new(actions))
    }
}

/// A source backed by a closure that opens a new traversal on every call.
pub struct FnActionSource<F> {
    open: F,
}

impl<F> FnActionSource<F>
where
    F: Fn() -> DeltaResult<ActionIterator<'static>> + Send + Sync,
{
    pub fn new(open: F) -> Self {
        Self { open }
    }
}

impl<F> ActionSource for FnActionSource<F>
where
    F: Fn() -> DeltaResult<ActionIterator<'static>> + Send + Sync,
{
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        (self.open)()
    }
}
