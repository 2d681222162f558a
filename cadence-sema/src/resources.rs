#![forbid(unsafe_code)]

use std::fmt;

use cadence_ast::Span;
use indexmap::IndexMap;

use crate::scope::BindingId;

/// How a resource binding lost ownership of its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidationKind {
    /// Moved into another binding, container slot or composite field.
    Move,
    /// Consumed by `destroy`.
    Destroy,
    /// Moved into a function argument.
    PassedToFunction,
    /// Moved out of the function by `return`.
    Returned,
}

impl InvalidationKind {
    pub fn display(&self) -> &'static str {
        match self {
            InvalidationKind::Move => "moved",
            InvalidationKind::Destroy => "destroyed",
            InvalidationKind::PassedToFunction => "passed",
            InvalidationKind::Returned => "returned",
        }
    }
}

impl fmt::Display for InvalidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Invalidation {
    pub kind: InvalidationKind,
    /// Location of the move or destroy.
    pub span: Span,
}

/// Ownership state of one resource binding.
///
/// A binding starts `Valid` when declared with a resource value and
/// becomes `Invalidated` the first time the value is moved away. Where
/// control flow joins, a binding invalidated on only some of the incoming
/// paths is `MaybeInvalidated`: it can no longer be read, and it still
/// has to be consumed before the scope ends.
/// Assigning a fresh resource into an invalidated binding makes it
/// `Valid` again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    /// The binding still owns its resource.
    Valid,

    /// The resource left the binding on every path. Any further read is
    /// an error.
    Invalidated(Invalidation),

    /// The resource left the binding on some paths only.
    MaybeInvalidated(Invalidation),
}

impl ResourceState {
    pub fn is_valid(&self) -> bool {
        matches!(self, ResourceState::Valid)
    }

    /// The binding may still own its resource on some path.
    pub fn may_own(&self) -> bool {
        !matches!(self, ResourceState::Invalidated(_))
    }

    pub fn invalidation(&self) -> Option<Invalidation> {
        match self {
            ResourceState::Valid => None,
            ResourceState::Invalidated(i) | ResourceState::MaybeInvalidated(i) => Some(*i),
        }
    }

    /// State after two control-flow paths meet.
    pub fn join(self, other: ResourceState) -> ResourceState {
        match (self, other) {
            (ResourceState::Valid, ResourceState::Valid) => ResourceState::Valid,
            (ResourceState::Invalidated(i), ResourceState::Invalidated(_)) => {
                ResourceState::Invalidated(i)
            }
            (ResourceState::Invalidated(i) | ResourceState::MaybeInvalidated(i), _)
            | (
                ResourceState::Valid,
                ResourceState::Invalidated(i) | ResourceState::MaybeInvalidated(i),
            ) => ResourceState::MaybeInvalidated(i),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedResource {
    pub name: String,
    pub state: ResourceState,
}

/// Per-function record of resource bindings and their states.
///
/// The tracker is cloned at every branch point. Each branch mutates its
/// own copy and the copies are merged when control flow rejoins, so the
/// state after an `if` accounts for every path that can reach it.
///
/// Example:
/// ```text
/// let r <- create R()
/// if c { destroy r }     // r: MaybeInvalidated after the `if`
/// r.id                   // error: r may have been destroyed
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceTracker {
    bindings: IndexMap<BindingId, TrackedResource>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a binding that now owns a resource.
    pub fn track(&mut self, binding: BindingId, name: &str) {
        self.bindings.insert(
            binding,
            TrackedResource {
                name: name.to_string(),
                state: ResourceState::Valid,
            },
        );
    }

    pub fn state(&self, binding: BindingId) -> Option<ResourceState> {
        self.bindings.get(&binding).map(|b| b.state)
    }

    /// Mark the binding as no longer owning its resource.
    ///
    /// Returns the earlier invalidation if the binding was already
    /// invalidated on some path; the first invalidation is kept and the
    /// binding counts as invalidated on every path from here on.
    pub fn record_invalidation(
        &mut self,
        binding: BindingId,
        kind: InvalidationKind,
        span: Span,
    ) -> Option<Invalidation> {
        let entry = self.bindings.get_mut(&binding)?;
        match entry.state {
            ResourceState::Invalidated(previous) => Some(previous),
            ResourceState::MaybeInvalidated(previous) => {
                entry.state = ResourceState::Invalidated(previous);
                Some(previous)
            }
            ResourceState::Valid => {
                tracing::trace!(name = %entry.name, %kind, "resource invalidated");
                entry.state = ResourceState::Invalidated(Invalidation { kind, span });
                None
            }
        }
    }

    /// A fresh resource was assigned into the binding.
    pub fn revalidate(&mut self, binding: BindingId) {
        if let Some(entry) = self.bindings.get_mut(&binding) {
            entry.state = ResourceState::Valid;
        }
    }

    /// A binding whose loss was already reported on some path counts as
    /// consumed on every path.
    pub fn settle(&mut self, binding: BindingId) {
        let Some(entry) = self.bindings.get_mut(&binding) else {
            return;
        };
        if let Some(invalidation) = entry.state.invalidation() {
            entry.state = ResourceState::Invalidated(invalidation);
        }
    }

    /// Reading the binding is allowed unless its resource was invalidated
    /// on some path.
    pub fn check_use(&self, binding: BindingId) -> Result<(), Invalidation> {
        match self.state(binding).and_then(|s| s.invalidation()) {
            Some(invalidation) => Err(invalidation),
            None => Ok(()),
        }
    }

    /// Join the state of another control-flow path into this one.
    pub fn merge(&mut self, other: &ResourceTracker) {
        for (binding, theirs) in &other.bindings {
            match self.bindings.get_mut(binding) {
                Some(ours) => ours.state = ours.state.join(theirs.state),
                None => {
                    self.bindings.insert(*binding, theirs.clone());
                }
            }
        }
    }

    /// Bindings among `candidates` that still own their resource on at
    /// least one path.
    pub fn unconsumed(&self, candidates: impl IntoIterator<Item = BindingId>) -> Vec<BindingId> {
        candidates
            .into_iter()
            .filter(|b| self.state(*b).is_some_and(|s| s.may_own()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BindingId, &TrackedResource)> {
        self.bindings.iter().map(|(b, r)| (*b, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_ast::span;

    fn binding(n: u32) -> BindingId {
        BindingId::from_raw(n)
    }

    #[test]
    fn use_after_move_is_reported_with_the_move_site() {
        let mut tracker = ResourceTracker::new();
        tracker.track(binding(0), "r");
        assert!(tracker.check_use(binding(0)).is_ok());

        assert_eq!(
            tracker.record_invalidation(binding(0), InvalidationKind::Move, span(10, 2)),
            None
        );
        let err = tracker.check_use(binding(0)).unwrap_err();
        assert_eq!(err.kind, InvalidationKind::Move);
        assert_eq!(err.span, span(10, 2));

        // second invalidation keeps the first site
        let previous =
            tracker.record_invalidation(binding(0), InvalidationKind::Destroy, span(20, 1));
        assert_eq!(previous.map(|p| p.span), Some(span(10, 2)));
    }

    #[test]
    fn merge_keeps_one_sided_invalidations_owned() {
        let mut then_branch = ResourceTracker::new();
        then_branch.track(binding(0), "a");
        then_branch.track(binding(1), "b");
        then_branch.track(binding(2), "c");
        let mut else_branch = then_branch.clone();

        then_branch.record_invalidation(binding(0), InvalidationKind::Destroy, span(0, 1));
        then_branch.record_invalidation(binding(2), InvalidationKind::Destroy, span(8, 1));
        else_branch.record_invalidation(binding(1), InvalidationKind::Move, span(5, 1));
        else_branch.record_invalidation(binding(2), InvalidationKind::Move, span(12, 1));

        then_branch.merge(&else_branch);
        assert!(then_branch.check_use(binding(0)).is_err());
        assert!(then_branch.check_use(binding(1)).is_err());
        assert_eq!(
            then_branch.state(binding(1)),
            Some(ResourceState::MaybeInvalidated(Invalidation {
                kind: InvalidationKind::Move,
                span: span(5, 1),
            }))
        );
        assert_eq!(
            then_branch.unconsumed([binding(0), binding(1), binding(2)]),
            vec![binding(0), binding(1)]
        );

        // moving a maybe-invalidated binding again reports the first site
        let previous =
            then_branch.record_invalidation(binding(0), InvalidationKind::Move, span(30, 1));
        assert_eq!(previous.map(|p| p.span), Some(span(0, 1)));
        assert_eq!(then_branch.unconsumed([binding(0)]), Vec::new());

        then_branch.settle(binding(1));
        assert!(then_branch.unconsumed([binding(1)]).is_empty());
    }

    #[test]
    fn revalidated_bindings_count_as_unconsumed() {
        let mut tracker = ResourceTracker::new();
        tracker.track(binding(3), "r");
        tracker.record_invalidation(binding(3), InvalidationKind::Returned, span(0, 1));
        assert!(tracker.unconsumed([binding(3)]).is_empty());
        tracker.revalidate(binding(3));
        assert_eq!(tracker.unconsumed([binding(3), binding(4)]), vec![binding(3)]);
    }
}
