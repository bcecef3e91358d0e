use crate::{Error, Result};

/// Where a definition is in its resolve pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveState {
    /// Not visited yet
    #[default]
    Unresolved,
    /// Resolution in progress; re-entering means a cycle
    Resolving,
    /// Resolution finished (successfully or not)
    Resolved,
}

/// Resolve/define state machine of one definition node.
///
/// `Unresolved -> Resolving -> Resolved`, plus a separate `defined` flag that may only be set
/// once the node is resolved. Re-entering `Resolving` is the only cycle condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    state: ResolveState,
    defined: bool,
    failed: bool,
}

impl Lifecycle {
    /// Current resolve state.
    #[must_use]
    pub fn state(&self) -> ResolveState {
        self.state
    }

    /// Checks whether the resolve pass finished.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state == ResolveState::Resolved
    }

    /// Checks whether the define pass ran.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// Checks whether resolution failed; failed nodes are never defined or emitted.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Enters the resolve pass.
    ///
    /// Returns `false` if the node is already resolved and nothing needs to be done.
    ///
    /// # Errors
    /// Returns [`crate::Error::CircularDefinition`] naming `name` if the node is already
    /// resolving.
    pub fn begin_resolve(&mut self, name: &str) -> Result<bool> {
        match self.state {
            ResolveState::Unresolved => {
                self.state = ResolveState::Resolving;
                Ok(true)
            }
            ResolveState::Resolving => Err(Error::CircularDefinition(name.to_string())),
            ResolveState::Resolved => Ok(false),
        }
    }

    /// Leaves the resolve pass successfully.
    pub fn finish_resolve(&mut self) {
        self.state = ResolveState::Resolved;
    }

    /// Leaves the resolve pass with a failure.
    pub fn fail(&mut self) {
        self.state = ResolveState::Resolved;
        self.failed = true;
    }

    /// Marks the define pass as done.
    ///
    /// # Errors
    /// Returns an error if the node is not resolved yet, has failed, or was already defined.
    pub fn mark_defined(&mut self, name: &str) -> Result<()> {
        if self.state != ResolveState::Resolved {
            return Err(malformed_error!("{} defined before it was resolved", name));
        }
        if self.failed {
            return Err(malformed_error!("{} failed to resolve", name));
        }
        if self.defined {
            return Err(malformed_error!("{} defined twice", name));
        }
        self.defined = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut lifecycle = Lifecycle::default();
        assert_eq!(lifecycle.state(), ResolveState::Unresolved);
        assert!(lifecycle.mark_defined("A").is_err());

        assert_eq!(lifecycle.begin_resolve("A"), Ok(true));
        assert_eq!(
            lifecycle.begin_resolve("A"),
            Err(Error::CircularDefinition("A".to_string()))
        );
        lifecycle.finish_resolve();
        assert_eq!(lifecycle.begin_resolve("A"), Ok(false));

        lifecycle.mark_defined("A").unwrap();
        assert!(lifecycle.is_defined());
        assert!(lifecycle.mark_defined("A").is_err());
    }

    #[test]
    fn test_failed_nodes_are_not_defined() {
        let mut lifecycle = Lifecycle::default();
        lifecycle.begin_resolve("A").unwrap();
        lifecycle.fail();
        assert!(lifecycle.is_resolved());
        assert!(lifecycle.has_failed());
        assert!(lifecycle.mark_defined("A").is_err());
    }
}
