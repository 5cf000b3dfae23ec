//! Unit registration and typed/tagged lookup.
//!
//! Every registered unit is indexed by its concrete type (via an `Any`
//! token) and an integer tag (0 unless given). Lookup must resolve to
//! exactly one entry; zero or multiple matches is fatal. Lookups are only
//! legal from the connect phase onward, once all registrations are in.

use super::{Phase, Pipeline};
use crate::error::{Error, Result};
use crate::node::{Algorithm, Handle, Node};
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::rc::Rc;

/// A registered algorithm: concrete-type token, tag, shared instance.
pub(crate) struct AlgEntry {
    pub tag: i32,
    pub is_reader: bool,
    /// The same allocation as `alg`, kept as `Any` for typed downcasts.
    pub any: Rc<dyn Any>,
    pub alg: Rc<RefCell<dyn Algorithm>>,
}

/// A registered tool: like an algorithm entry, minus the tick-loop role.
pub(crate) struct ToolEntry {
    pub tag: i32,
    pub any: Rc<dyn Any>,
    pub node: Rc<RefCell<dyn Node>>,
}

enum Matcher<'a, T> {
    Tag(i32),
    Pred(&'a dyn Fn(&T) -> bool),
}

/// Scan entries for the unique unit of type `T` satisfying the matcher.
fn unique_match<'e, T: 'static>(
    entries: impl Iterator<Item = (i32, &'e Rc<dyn Any>)>,
    matcher: Matcher<'_, T>,
) -> Result<Handle<T>> {
    let mut found: Option<Rc<RefCell<T>>> = None;

    for (tag, any) in entries {
        let Ok(cell) = Rc::clone(any).downcast::<RefCell<T>>() else {
            continue;
        };
        let hit = match &matcher {
            Matcher::Tag(t) => tag == *t,
            // A unit that is currently borrowed for its own connect step
            // cannot be predicate-matched; a unit never depends on itself.
            Matcher::Pred(pred) => match cell.try_borrow() {
                Ok(unit) => pred(&unit),
                Err(_) => false,
            },
        };
        if hit {
            if found.is_some() {
                return Err(Error::LookupAmbiguous(type_name::<T>()));
            }
            found = Some(cell);
        }
    }

    found
        .map(Handle::new)
        .ok_or(Error::LookupNotFound(type_name::<T>()))
}

impl Pipeline {
    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register an algorithm with the default tag (0).
    ///
    /// Returns a handle usable for further configuration before startup.
    pub fn add_alg<A: Algorithm + 'static>(&mut self, alg: A) -> Handle<A> {
        self.add_alg_tagged(0, alg)
    }

    /// Register an algorithm under an explicit tag, disambiguating
    /// multiple instances of the same concrete type.
    pub fn add_alg_tagged<A: Algorithm + 'static>(&mut self, tag: i32, alg: A) -> Handle<A> {
        assert!(
            self.phase == Phase::Register,
            "units must be registered before startup"
        );
        let rc = Rc::new(RefCell::new(alg));
        let is_reader = rc.borrow().is_reader();
        if is_reader {
            self.running_readers.insert(self.algs.len());
        }
        tracing::debug!(
            unit = type_name::<A>(),
            tag,
            is_reader,
            "registered algorithm"
        );
        self.algs.push(AlgEntry {
            tag,
            is_reader,
            any: Rc::clone(&rc) as Rc<dyn Any>,
            alg: Rc::clone(&rc) as Rc<RefCell<dyn Algorithm>>,
        });
        Handle::new(rc)
    }

    /// Register a tool with the default tag (0).
    pub fn add_tool<T: Node + 'static>(&mut self, tool: T) -> Handle<T> {
        self.add_tool_tagged(0, tool)
    }

    /// Register a tool under an explicit tag.
    pub fn add_tool_tagged<T: Node + 'static>(&mut self, tag: i32, tool: T) -> Handle<T> {
        assert!(
            self.phase == Phase::Register,
            "units must be registered before startup"
        );
        let rc = Rc::new(RefCell::new(tool));
        tracing::debug!(unit = type_name::<T>(), tag, "registered tool");
        self.tools.push(ToolEntry {
            tag,
            any: Rc::clone(&rc) as Rc<dyn Any>,
            node: Rc::clone(&rc) as Rc<RefCell<dyn Node>>,
        });
        Handle::new(rc)
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    fn check_lookup_phase(&self) -> Result<()> {
        if self.phase < Phase::Connect {
            return Err(Error::LookupBeforeConnect);
        }
        Ok(())
    }

    /// Look up the unique untagged algorithm of type `A`.
    pub fn alg<A: 'static>(&self) -> Result<Handle<A>> {
        self.alg_tagged(0)
    }

    /// Look up the unique algorithm of type `A` registered under `tag`.
    pub fn alg_tagged<A: 'static>(&self, tag: i32) -> Result<Handle<A>> {
        self.check_lookup_phase()?;
        unique_match(
            self.algs.iter().map(|e| (e.tag, &e.any)),
            Matcher::<A>::Tag(tag),
        )
    }

    /// Look up the unique algorithm of type `A` matching a predicate.
    pub fn alg_matching<A: 'static>(&self, pred: impl Fn(&A) -> bool) -> Result<Handle<A>> {
        self.check_lookup_phase()?;
        unique_match(
            self.algs.iter().map(|e| (e.tag, &e.any)),
            Matcher::Pred(&pred),
        )
    }

    /// Look up the unique untagged tool of type `T`.
    pub fn tool<T: 'static>(&self) -> Result<Handle<T>> {
        self.tool_tagged(0)
    }

    /// Look up the unique tool of type `T` registered under `tag`.
    pub fn tool_tagged<T: 'static>(&self, tag: i32) -> Result<Handle<T>> {
        self.check_lookup_phase()?;
        unique_match(
            self.tools.iter().map(|e| (e.tag, &e.any)),
            Matcher::<T>::Tag(tag),
        )
    }

    /// Look up the unique tool of type `T` matching a predicate.
    pub fn tool_matching<T: 'static>(&self, pred: impl Fn(&T) -> bool) -> Result<Handle<T>> {
        self.check_lookup_phase()?;
        unique_match(
            self.tools.iter().map(|e| (e.tag, &e.any)),
            Matcher::Pred(&pred),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullAlg;
    impl Node for NullAlg {}
    impl Algorithm for NullAlg {}

    struct OtherAlg;
    impl Node for OtherAlg {}
    impl Algorithm for OtherAlg {}

    struct CountTool {
        n: u32,
    }
    impl Node for CountTool {}

    fn connected(mut pipe: Pipeline) -> Pipeline {
        pipe.phase = Phase::Connect;
        pipe
    }

    #[test]
    fn test_lookup_unique() {
        let mut pipe = Pipeline::new();
        pipe.add_alg(NullAlg);
        pipe.add_alg(OtherAlg);
        let pipe = connected(pipe);

        assert!(pipe.alg::<NullAlg>().is_ok());
        assert!(pipe.alg::<OtherAlg>().is_ok());
    }

    #[test]
    fn test_lookup_not_found() {
        let mut pipe = Pipeline::new();
        pipe.add_alg(NullAlg);
        let pipe = connected(pipe);

        assert!(matches!(
            pipe.alg::<OtherAlg>(),
            Err(Error::LookupNotFound(_))
        ));
    }

    #[test]
    fn test_lookup_ambiguous() {
        // Scenario: two untagged instances of the same type.
        let mut pipe = Pipeline::new();
        pipe.add_alg(NullAlg);
        pipe.add_alg(NullAlg);
        let pipe = connected(pipe);

        assert!(matches!(
            pipe.alg::<NullAlg>(),
            Err(Error::LookupAmbiguous(_))
        ));
    }

    #[test]
    fn test_tagged_lookup_disambiguates() {
        let mut pipe = Pipeline::new();
        let a = pipe.add_alg_tagged(1, CountingAlg { n: 10 });
        let b = pipe.add_alg_tagged(2, CountingAlg { n: 20 });
        let pipe = connected(pipe);

        let one = pipe.alg_tagged::<CountingAlg>(1).unwrap();
        let two = pipe.alg_tagged::<CountingAlg>(2).unwrap();
        assert_eq!(one.borrow().n, 10);
        assert_eq!(two.borrow().n, 20);
        drop((a, b));
    }

    struct CountingAlg {
        n: u32,
    }
    impl Node for CountingAlg {}
    impl Algorithm for CountingAlg {}

    #[test]
    fn test_predicate_lookup() {
        let mut pipe = Pipeline::new();
        pipe.add_alg_tagged(1, CountingAlg { n: 10 });
        pipe.add_alg_tagged(2, CountingAlg { n: 20 });
        let pipe = connected(pipe);

        let hit = pipe.alg_matching::<CountingAlg>(|a| a.n == 20).unwrap();
        assert_eq!(hit.borrow().n, 20);

        assert!(matches!(
            pipe.alg_matching::<CountingAlg>(|_| true),
            Err(Error::LookupAmbiguous(_))
        ));
    }

    #[test]
    fn test_lookup_before_connect_fails() {
        let mut pipe = Pipeline::new();
        pipe.add_alg(NullAlg);

        assert!(matches!(
            pipe.alg::<NullAlg>(),
            Err(Error::LookupBeforeConnect)
        ));
    }

    #[test]
    fn test_tool_lookup() {
        let mut pipe = Pipeline::new();
        pipe.add_tool(CountTool { n: 5 });
        let pipe = connected(pipe);

        let t = pipe.tool::<CountTool>().unwrap();
        assert_eq!(t.borrow().n, 5);
        assert!(matches!(
            pipe.tool::<crate::clock::Clock>(),
            Err(Error::LookupNotFound(_))
        ));
    }
}
