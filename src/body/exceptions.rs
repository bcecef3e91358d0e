use crate::{body::LabelHandle, references::TypeRefId, Error, Result};

/// What a handler clause does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// `catch T`
    Catch(TypeRefId),
    /// `filter` with the label of the filter code
    Filter(LabelHandle),
    /// `finally`
    Finally,
    /// `fault`
    Fault,
}

/// One handler attached to a protected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerClause {
    /// Clause kind
    pub kind: HandlerKind,
    /// First instruction of the handler
    pub handler_start: LabelHandle,
    /// First instruction after the handler
    pub handler_end: LabelHandle,
}

/// A protected region with its ordered handler clauses.
///
/// Each label is resolved independently: a clause shares label identity with the protected
/// region only when the input names the same label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryBlock {
    /// First protected instruction
    pub try_start: LabelHandle,
    /// First instruction after the protected range
    pub try_end: LabelHandle,
    /// Handlers in declaration order
    pub clauses: Vec<HandlerClause>,
}

#[derive(Debug, Clone)]
struct OpenTry {
    try_start: LabelHandle,
    try_end: Option<LabelHandle>,
    filter_start: Option<LabelHandle>,
    handler: Option<(HandlerKind, LabelHandle)>,
    clauses: Vec<HandlerClause>,
}

/// Collects the exception regions of one method body.
///
/// Regions are either added whole ([`ExceptionRegions::add`]) or built with the scoped
/// `begin_*`/`end_*` calls that mirror `.try { } catch T { }` blocks. Scoped blocks are
/// recorded when they close, so inner blocks precede the blocks that enclose them.
#[derive(Debug, Clone, Default)]
pub struct ExceptionRegions {
    blocks: Vec<TryBlock>,
    open: Vec<OpenTry>,
}

impl ExceptionRegions {
    /// Creates an empty region list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fully labelled region.
    pub fn add(&mut self, block: TryBlock) {
        self.blocks.push(block);
    }

    /// Completed regions in the order they were closed or added.
    #[must_use]
    pub fn blocks(&self) -> &[TryBlock] {
        &self.blocks
    }

    /// Checks whether a scoped block is still open.
    #[must_use]
    pub fn has_open(&self) -> bool {
        !self.open.is_empty()
    }

    /// Opens a protected region starting at `start`.
    pub fn begin_try(&mut self, start: LabelHandle) {
        self.open.push(OpenTry {
            try_start: start,
            try_end: None,
            filter_start: None,
            handler: None,
            clauses: Vec::new(),
        });
    }

    /// Closes the protected range of the innermost open region at `end`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBody`] if no region is open or its range was
    /// already closed.
    pub fn end_try(&mut self, end: LabelHandle) -> Result<()> {
        let open = self.innermost("end of try")?;
        if open.try_end.is_some() {
            return Err(Error::MalformedBody("try range closed twice".to_string()));
        }
        open.try_end = Some(end);
        Ok(())
    }

    /// Opens a `catch` handler.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBody`] if there is no closed try range to attach to
    /// or another handler is still open.
    pub fn begin_catch(&mut self, exception: TypeRefId, start: LabelHandle) -> Result<()> {
        self.begin_handler(HandlerKind::Catch(exception), start)
    }

    /// Opens the filter code of a `filter` clause.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBody`] under the same conditions as
    /// [`Self::begin_catch`].
    pub fn begin_filter(&mut self, start: LabelHandle) -> Result<()> {
        let open = self.ready_for_handler()?;
        open.filter_start = Some(start);
        Ok(())
    }

    /// Opens the handler code following a filter.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBody`] if no filter was opened.
    pub fn begin_filter_handler(&mut self, start: LabelHandle) -> Result<()> {
        let open = self.innermost("filter handler")?;
        let Some(filter) = open.filter_start.take() else {
            return Err(Error::MalformedBody(
                "filter handler without filter".to_string(),
            ));
        };
        open.handler = Some((HandlerKind::Filter(filter), start));
        Ok(())
    }

    /// Opens a `finally` handler.
    ///
    /// # Errors
    /// See [`Self::begin_catch`].
    pub fn begin_finally(&mut self, start: LabelHandle) -> Result<()> {
        self.begin_handler(HandlerKind::Finally, start)
    }

    /// Opens a `fault` handler.
    ///
    /// # Errors
    /// See [`Self::begin_catch`].
    pub fn begin_fault(&mut self, start: LabelHandle) -> Result<()> {
        self.begin_handler(HandlerKind::Fault, start)
    }

    /// Closes the open handler of the innermost region at `end`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBody`] if no handler is open.
    pub fn end_handler(&mut self, end: LabelHandle) -> Result<()> {
        let open = self.innermost("end of handler")?;
        let Some((kind, handler_start)) = open.handler.take() else {
            return Err(Error::MalformedBody("end of handler without handler".to_string()));
        };
        open.clauses.push(HandlerClause {
            kind,
            handler_start,
            handler_end: end,
        });
        Ok(())
    }

    /// Closes the innermost region after its last handler.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedBody`] if the region has no handler, a handler is
    /// still open, or no region is open.
    pub fn close_try(&mut self) -> Result<()> {
        let open = self.innermost("close of try block")?;
        let Some(try_end) = open.try_end else {
            return Err(Error::MalformedBody("try block without end".to_string()));
        };
        if open.handler.is_some() || open.filter_start.is_some() {
            return Err(Error::MalformedBody("unterminated handler".to_string()));
        }
        if open.clauses.is_empty() {
            return Err(Error::MalformedBody("try block without handler".to_string()));
        }

        let try_start = open.try_start;
        let clauses = std::mem::take(&mut open.clauses);
        self.open.pop();
        self.blocks.push(TryBlock {
            try_start,
            try_end,
            clauses,
        });
        Ok(())
    }

    fn begin_handler(&mut self, kind: HandlerKind, start: LabelHandle) -> Result<()> {
        let open = self.ready_for_handler()?;
        open.handler = Some((kind, start));
        Ok(())
    }

    fn ready_for_handler(&mut self) -> Result<&mut OpenTry> {
        let open = self.innermost("handler")?;
        if open.try_end.is_none() {
            return Err(Error::MalformedBody("handler inside open try range".to_string()));
        }
        if open.handler.is_some() || open.filter_start.is_some() {
            return Err(Error::MalformedBody("nested handler start".to_string()));
        }
        Ok(open)
    }

    fn innermost(&mut self, what: &str) -> Result<&mut OpenTry> {
        self.open
            .last_mut()
            .ok_or_else(|| Error::MalformedBody(format!("{what} without try block")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{LabelKey, LabelTable};
    use crate::references::TypeReferences;

    #[test]
    fn test_scoped_try_catch_finally() {
        let mut labels = LabelTable::new();
        let mut types = TypeReferences::new();
        let exception = types.local("MyException");
        let at = |labels: &mut LabelTable, index| labels.reference(LabelKey::Position(index));

        let mut regions = ExceptionRegions::new();
        regions.begin_try(at(&mut labels, 0));
        regions.end_try(at(&mut labels, 2)).unwrap();
        regions.begin_catch(exception, at(&mut labels, 2)).unwrap();
        regions.end_handler(at(&mut labels, 4)).unwrap();
        regions.begin_finally(at(&mut labels, 4)).unwrap();
        regions.end_handler(at(&mut labels, 5)).unwrap();
        regions.close_try().unwrap();

        assert!(!regions.has_open());
        let block = &regions.blocks()[0];
        assert_eq!(block.clauses.len(), 2);
        assert_eq!(block.clauses[0].kind, HandlerKind::Catch(exception));
        assert_eq!(block.clauses[1].kind, HandlerKind::Finally);
        assert_eq!(block.clauses[0].handler_end, block.clauses[1].handler_start);
    }

    #[test]
    fn test_filter_clause() {
        let mut labels = LabelTable::new();
        let mut regions = ExceptionRegions::new();
        let filter = labels.reference(LabelKey::Name("F".into()));

        regions.begin_try(labels.reference(LabelKey::Position(0)));
        regions.end_try(labels.reference(LabelKey::Position(1))).unwrap();
        regions.begin_filter(filter).unwrap();
        regions
            .begin_filter_handler(labels.reference(LabelKey::Position(3)))
            .unwrap();
        regions
            .end_handler(labels.reference(LabelKey::Position(4)))
            .unwrap();
        regions.close_try().unwrap();

        assert_eq!(regions.blocks()[0].clauses[0].kind, HandlerKind::Filter(filter));
    }

    #[test]
    fn test_nested_blocks_close_inner_first() {
        let mut labels = LabelTable::new();
        let mut regions = ExceptionRegions::new();
        let outer_start = labels.reference(LabelKey::Name("outer".into()));
        let inner_start = labels.reference(LabelKey::Name("inner".into()));
        let mut at = |index| labels.reference(LabelKey::Position(index));

        regions.begin_try(outer_start);
        regions.begin_try(inner_start);
        regions.end_try(at(1)).unwrap();
        regions.begin_fault(at(1)).unwrap();
        regions.end_handler(at(2)).unwrap();
        regions.close_try().unwrap();
        regions.end_try(at(3)).unwrap();
        regions.begin_finally(at(3)).unwrap();
        regions.end_handler(at(4)).unwrap();
        regions.close_try().unwrap();

        assert_eq!(regions.blocks()[0].try_start, inner_start);
        assert_eq!(regions.blocks()[1].try_start, outer_start);
    }

    #[test]
    fn test_misuse_is_malformed() {
        let mut labels = LabelTable::new();
        let mut regions = ExceptionRegions::new();
        let start = labels.reference(LabelKey::Position(0));

        assert!(matches!(regions.end_try(start), Err(Error::MalformedBody(_))));
        regions.begin_try(start);
        assert!(matches!(regions.begin_finally(start), Err(Error::MalformedBody(_))));
        regions.end_try(start).unwrap();
        assert!(matches!(regions.close_try(), Err(Error::MalformedBody(_))));
        assert!(regions.has_open());
    }
}
