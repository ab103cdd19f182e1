//! Row tracking write path: default row id assignment for newly added files and maintenance of the
//! table's row id high water mark.
//!
//! A commit runs two passes over its data actions:
//! 1. [`RowTrackingActions`] lazily fills in `baseRowId` and `defaultRowCommitVersion` on every
//!    [`Add`] that lacks them, handing out contiguous id ranges starting right after the high
//!    water mark of the read snapshot.
//! 2. [`update_row_id_high_water_mark`] traverses the same transformed actions again and produces
//!    the `delta.rowTracking` domain metadata update, if the high water mark moved.
//!
//! Both passes see the same transformed sequence: the recompute pass only accepts a
//! [`RowTrackingActions`], never the raw source.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action_source::{ActionIterator, ActionSource};
use crate::actions::domain_metadata::{private, MetadataDomain};
use crate::actions::{Action, Add, DomainMetadata};
use crate::{DeltaResult, Error, Snapshot, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowTrackingDomainMetadata {
    // NB: The Delta protocol does not rule out negative high water marks
    row_id_high_water_mark: i64,
}

impl RowTrackingDomainMetadata {
    /// High water mark of a table that never allocated a row id.
    pub const MISSING_HIGH_WATER_MARK: i64 = -1;

    pub fn new(row_id_high_water_mark: i64) -> Self {
        RowTrackingDomainMetadata {
            row_id_high_water_mark,
        }
    }

    pub fn row_id_high_water_mark(&self) -> i64 {
        self.row_id_high_water_mark
    }

    /// Retrieves the row ID high water mark from the [`Snapshot`]'s row tracking domain metadata.
    ///
    /// Returns `Ok(None)` if the table never persisted a high water mark, and an error if the
    /// persisted configuration cannot be decoded.
    pub fn get_high_water_mark(snapshot: &Snapshot) -> DeltaResult<Option<i64>> {
        Ok(Self::from_snapshot(snapshot)?.map(|metadata| metadata.row_id_high_water_mark))
    }
}

impl private::Sealed for RowTrackingDomainMetadata {}

impl MetadataDomain for RowTrackingDomainMetadata {
    const DOMAIN_NAME: &'static str = "delta.rowTracking";
}

/// The row id high water mark of `snapshot`, or
/// [`RowTrackingDomainMetadata::MISSING_HIGH_WATER_MARK`] if none was ever written.
pub fn read_row_id_high_water_mark(snapshot: &Snapshot) -> DeltaResult<i64> {
    let high_water_mark = RowTrackingDomainMetadata::get_high_water_mark(snapshot)?
        .unwrap_or(RowTrackingDomainMetadata::MISSING_HIGH_WATER_MARK);
    debug!(
        version = snapshot.version(),
        high_water_mark, "Read row id high water mark"
    );
    Ok(high_water_mark)
}

/// Assigns base row ids and default row commit versions to [`Add`] actions, one action at a time.
///
/// The assigner owns the running row id counter of a single traversal: every add that lacks a
/// base row id takes the next `numRecords` ids in order. Results depend on the order in which
/// actions are passed to [`RowIdAssigner::assign`], so an assigner is single-use and must be
/// driven by exactly one consumer. Never share one between traversals; create a fresh assigner
/// (seeded with the same high water mark) for each pass instead.
#[derive(Debug)]
pub struct RowIdAssigner {
    next_row_id: i64,
    commit_version: i64,
    num_assigned: usize,
}

impl RowIdAssigner {
    /// Create an assigner whose first id is `high_water_mark + 1`.
    pub fn try_new(high_water_mark: i64, commit_version: i64) -> DeltaResult<Self> {
        let next_row_id = high_water_mark
            .checked_add(1)
            .ok_or_else(|| Error::overflow("Row id high water mark is at its maximum"))?;
        Ok(Self {
            next_row_id,
            commit_version,
            num_assigned: 0,
        })
    }

    /// Process the next action. Anything other than an [`Add`] is returned untouched.
    pub fn assign(&mut self, action: Action) -> DeltaResult<Action> {
        match action {
            Action::Add(add) => Ok(Action::Add(self.assign_add(add)?)),
            action => Ok(action),
        }
    }

    fn assign_add(&mut self, mut add: Add) -> DeltaResult<Add> {
        if add.base_row_id.is_none() {
            let num_records = add.required_num_records()?;
            add.base_row_id = Some(self.next_row_id);
            self.next_row_id = self.next_row_id.checked_add(num_records).ok_or_else(|| {
                Error::overflow(format!("Row id range of {} exceeds i64", add.path))
            })?;
            self.num_assigned += 1;
        }
        if add.default_row_commit_version.is_none() {
            add.default_row_commit_version = Some(self.commit_version);
        }
        Ok(add)
    }

    /// The highest row id handed out so far, or the seed high water mark if none was.
    pub fn high_water_mark(&self) -> i64 {
        self.next_row_id - 1
    }

    /// Number of adds that received a base row id.
    pub fn num_assigned(&self) -> usize {
        self.num_assigned
    }
}

/// One traversal of a [`RowTrackingActions`]. Stops for good after the first error, releasing the
/// underlying traversal right away.
pub struct AssignRowIds<'a> {
    actions: Option<ActionIterator<'a>>,
    assigner: RowIdAssigner,
}

impl<'a> AssignRowIds<'a> {
    fn new(actions: ActionIterator<'a>, assigner: RowIdAssigner) -> Self {
        Self {
            actions: Some(actions),
            assigner,
        }
    }
}

impl Iterator for AssignRowIds<'_> {
    type Item = DeltaResult<Action>;

    fn next(&mut self) -> Option<Self::Item> {
        let actions = self.actions.as_mut()?;
        let Some(action) = actions.next() else {
            self.actions = None;
            debug!(
                num_assigned = self.assigner.num_assigned(),
                high_water_mark = self.assigner.high_water_mark(),
                "Finished assigning row ids"
            );
            return None;
        };
        let result = action.and_then(|action| self.assigner.assign(action));
        if result.is_err() {
            self.actions = None;
        }
        Some(result)
    }
}

/// An [`ActionSource`] whose traversals carry row tracking fields on every [`Add`].
///
/// Owns the wrapped source. The high water mark is read from the snapshot once, when the wrapper
/// is created, and seeds every traversal. When row tracking is not supported, traversals are the
/// wrapped source's own traversals.
pub struct RowTrackingActions<S> {
    source: S,
    row_tracking_supported: bool,
    high_water_mark: i64,
    commit_version: i64,
}

impl<S: ActionSource> RowTrackingActions<S> {
    pub fn try_new(
        row_tracking_supported: bool,
        snapshot: &Snapshot,
        commit_version: Version,
        source: S,
    ) -> DeltaResult<Self> {
        let commit_version = i64::try_from(commit_version)?;
        let high_water_mark = if row_tracking_supported {
            read_row_id_high_water_mark(snapshot)?
        } else {
            debug!("Row tracking not supported, passing actions through");
            RowTrackingDomainMetadata::MISSING_HIGH_WATER_MARK
        };
        Ok(Self {
            source,
            row_tracking_supported,
            high_water_mark,
            commit_version,
        })
    }

    pub fn row_tracking_supported(&self) -> bool {
        self.row_tracking_supported
    }

    /// The high water mark of the read snapshot.
    pub fn high_water_mark(&self) -> i64 {
        self.high_water_mark
    }

    pub fn commit_version(&self) -> i64 {
        self.commit_version
    }

    /// Unwrap the original source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ActionSource> ActionSource for RowTrackingActions<S> {
    fn actions(&self) -> DeltaResult<ActionIterator<'_>> {
        let actions = self.source.actions()?;
        if !self.row_tracking_supported {
            return Ok(actions);
        }
        let assigner = RowIdAssigner::try_new(self.high_water_mark, self.commit_version)?;
        Ok(Box::new(AssignRowIds::new(actions, assigner)))
    }
}

impl<S> std::fmt::Debug for RowTrackingActions<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowTrackingActions")
            .field("row_tracking_supported", &self.row_tracking_supported)
            .field("high_water_mark", &self.high_water_mark)
            .field("commit_version", &self.commit_version)
            .finish()
    }
}

/// Wrap `source` so that every [`Add`] it yields carries a base row id and a default row commit
/// version. When `row_tracking_supported` is false the actions pass through unchanged.
pub fn assign_base_row_id_and_default_row_commit_version<S: ActionSource>(
    row_tracking_supported: bool,
    snapshot: &Snapshot,
    commit_version: Version,
    source: S,
) -> DeltaResult<RowTrackingActions<S>> {
    RowTrackingActions::try_new(row_tracking_supported, snapshot, commit_version, source)
}

/// Compute the high water mark after committing `actions` and return the domain metadata action
/// that persists it, or `None` if it did not change.
///
/// Every [`Add`] contributes its `numRecords`, including adds whose base row id was already set
/// before this commit, so each add must carry the statistic.
pub fn update_row_id_high_water_mark<S: ActionSource>(
    actions: &RowTrackingActions<S>,
) -> DeltaResult<Option<DomainMetadata>> {
    if !actions.row_tracking_supported() {
        return Ok(None);
    }
    let previous = actions.high_water_mark();
    let mut high_water_mark = previous;
    for action in actions.actions()? {
        if let Action::Add(add) = action? {
            high_water_mark = high_water_mark
                .checked_add(add.required_num_records()?)
                .ok_or_else(|| Error::overflow("Row id high water mark exceeds i64"))?;
        }
    }

    if high_water_mark == previous {
        debug!(high_water_mark, "Row id high water mark unchanged");
        return Ok(None);
    }
    info!(previous, high_water_mark, "Updating row id high water mark");
    Ok(Some(
        RowTrackingDomainMetadata::new(high_water_mark).to_domain_metadata()?,
    ))
}
