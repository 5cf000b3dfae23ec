//! Two-phase startup, the tick loop, and run finalization.
//!
//! A run is: `load` every algorithm, `connect` every unit, then tick
//! until the running-reader set empties, then `finalize`. Within a tick
//! the primary pass honors `SkipToNext`/`EndOfFile` semantics and the
//! post pass covers exactly the units that executed their primary step.

use super::{Phase, Pipeline};
use crate::error::{Error, Result};
use crate::node::Status;
use crate::storage::OutputFile;
use std::path::{Path, PathBuf};
use std::rc::Rc;

impl Pipeline {
    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Number of named inputs for this run.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Path of input `i`.
    pub fn input_path(&self, i: usize) -> &Path {
        &self.inputs[i]
    }

    /// Queue an input-source-change notification.
    ///
    /// Safe to call from within a unit's step; the notification fans out
    /// to every registered unit's `file_changed` hook before the next
    /// unit runs.
    pub fn notify_file_changed(&self, index: usize) {
        self.file_changes.borrow_mut().push(index);
    }

    fn dispatch_file_changes(&self) {
        loop {
            let pending = self.file_changes.take();
            if pending.is_empty() {
                return;
            }
            for index in pending {
                tracing::debug!(index, "input source changed");
                for entry in &self.algs {
                    entry.alg.borrow_mut().file_changed(index);
                }
                for entry in &self.tools {
                    entry.node.borrow_mut().file_changed(index);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    /// Open a named output artifact.
    ///
    /// Opening the same name twice is fatal unless `reopen` is set, in
    /// which case the old handle is replaced.
    pub fn open_output(
        &self,
        name: &str,
        path: impl Into<PathBuf>,
        reopen: bool,
    ) -> Result<OutputFile> {
        let mut outputs = self.outputs.borrow_mut();
        if outputs.contains_key(name) && !reopen {
            return Err(Error::OutputAlreadyOpen(name.to_string()));
        }
        let file = OutputFile::new(name, path);
        outputs.insert(name.to_string(), file.clone());
        Ok(file)
    }

    /// Retrieve a previously opened output by name.
    pub fn output(&self, name: &str) -> Result<OutputFile> {
        self.outputs
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::OutputNotOpen(name.to_string()))
    }

    /// Retrieve the default output.
    pub fn default_output(&self) -> Result<OutputFile> {
        self.output(Self::DEFAULT_OUTPUT)
    }

    /// The output made current at finalization, if any.
    pub fn current_output(&self) -> Option<OutputFile> {
        let name = self.current_output.borrow().clone()?;
        self.output(&name).ok()
    }

    // ------------------------------------------------------------------
    // Run
    // ------------------------------------------------------------------

    /// Run the pipeline over the given inputs.
    ///
    /// Two-phase startup (load, then connect), the tick loop until every
    /// reader is exhausted, then finalization. Fatal wiring errors abort
    /// immediately; `SkipToNext`/`EndOfFile` are normal per-tick flow.
    pub fn run(&mut self, inputs: Vec<PathBuf>) -> Result<()> {
        self.inputs = inputs;

        self.phase = Phase::Load;
        tracing::debug!(inputs = self.inputs.len(), "load phase");
        for i in 0..self.algs.len() {
            let rc = Rc::clone(&self.algs[i].alg);
            rc.borrow_mut().load(&self.inputs)?;
        }

        self.phase = Phase::Connect;
        tracing::debug!("connect phase");
        for i in 0..self.algs.len() {
            let rc = Rc::clone(&self.algs[i].alg);
            rc.borrow_mut().connect(self)?;
        }
        for i in 0..self.tools.len() {
            let rc = Rc::clone(&self.tools[i].node);
            rc.borrow_mut().connect(self)?;
        }

        self.phase = Phase::Run;
        let mut ticks: u64 = 0;
        loop {
            ticks += 1;
            if self.tick()? {
                break;
            }
        }
        tracing::debug!(ticks, "all readers exhausted");

        self.phase = Phase::Finalize;
        if self.outputs.borrow().contains_key(Self::DEFAULT_OUTPUT) {
            *self.current_output.borrow_mut() = Some(Self::DEFAULT_OUTPUT.to_string());
        }
        for i in 0..self.algs.len() {
            let rc = Rc::clone(&self.algs[i].alg);
            rc.borrow_mut().finalize(self)?;
        }
        Ok(())
    }

    fn done_reader(&self, index: usize) -> bool {
        self.algs[index].is_reader && !self.running_readers.contains(&index)
    }

    /// One scheduler tick. Returns true when the run is over.
    fn tick(&mut self) -> Result<bool> {
        let mut last_executed = None;
        let mut exhausted = Vec::new();

        // Primary pass, in registration order.
        for i in 0..self.algs.len() {
            if self.done_reader(i) {
                continue;
            }
            last_executed = Some(i);

            let rc = Rc::clone(&self.algs[i].alg);
            let status = rc.borrow_mut().execute(self)?;
            self.dispatch_file_changes();

            match status {
                Status::Continue => {}
                Status::SkipToNext => {
                    tracing::trace!(unit = i, "tick aborted");
                    break;
                }
                Status::EndOfFile => {
                    tracing::debug!(unit = i, "reader exhausted");
                    exhausted.push(i);
                }
            }
        }

        // Post pass over the executed prefix only.
        if let Some(last) = last_executed {
            for i in 0..=last {
                if self.done_reader(i) {
                    continue;
                }
                let rc = Rc::clone(&self.algs[i].alg);
                rc.borrow_mut().post_execute();
            }
        }

        for i in exhausted {
            self.running_readers.remove(&i);
        }
        Ok(self.running_readers.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Algorithm, Node};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Plays back a scripted sequence of statuses and logs its calls.
    struct Scripted {
        name: &'static str,
        script: VecDeque<Status>,
        reader: bool,
        log: Log,
    }

    impl Scripted {
        fn new(name: &'static str, reader: bool, script: &[Status], log: &Log) -> Self {
            Self {
                name,
                script: script.iter().copied().collect(),
                reader,
                log: Rc::clone(log),
            }
        }
    }

    impl Node for Scripted {
        fn file_changed(&mut self, index: usize) {
            self.log.borrow_mut().push(format!("{}.file{index}", self.name));
        }
    }

    impl Algorithm for Scripted {
        fn execute(&mut self, _pipe: &Pipeline) -> Result<Status> {
            self.log.borrow_mut().push(format!("{}.exec", self.name));
            Ok(self.script.pop_front().unwrap_or(if self.reader {
                Status::EndOfFile
            } else {
                Status::Continue
            }))
        }

        fn post_execute(&mut self) {
            self.log.borrow_mut().push(format!("{}.post", self.name));
        }

        fn finalize(&mut self, _pipe: &Pipeline) -> Result<()> {
            self.log.borrow_mut().push(format!("{}.fini", self.name));
            Ok(())
        }

        fn is_reader(&self) -> bool {
            self.reader
        }
    }

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_skip_to_next_aborts_tick() {
        use Status::*;
        let log = log();
        let mut pipe = Pipeline::new();
        // Reader runs 1 tick then EOF; the veto fires on tick 1.
        pipe.add_alg(Scripted::new("r", true, &[Continue], &log));
        pipe.add_alg(Scripted::new("veto", false, &[SkipToNext, Continue], &log));
        pipe.add_alg(Scripted::new("tail", false, &[], &log));

        pipe.run(vec![]).unwrap();

        assert_eq!(
            entries(&log),
            vec![
                // Tick 1: veto aborts; tail never runs; post for prefix only.
                "r.exec", "veto.exec", "r.post", "veto.post",
                // Tick 2: reader EOF; rest of tick still runs.
                "r.exec", "veto.exec", "tail.exec", "r.post", "veto.post", "tail.post",
                "r.fini", "veto.fini", "tail.fini",
            ]
        );
    }

    #[test]
    fn test_eof_does_not_abort_tick() {
        use Status::*;
        let log = log();
        let mut pipe = Pipeline::new();
        pipe.add_alg(Scripted::new("r", true, &[], &log));
        pipe.add_alg(Scripted::new("a", false, &[], &log));

        pipe.run(vec![]).unwrap();

        // Single tick: reader returns EOF immediately, downstream unit
        // still executes, both get the post pass, then the loop ends.
        assert_eq!(
            entries(&log),
            vec!["r.exec", "a.exec", "r.post", "a.post", "r.fini", "a.fini"]
        );
    }

    #[test]
    fn test_exhausted_reader_skipped_in_later_ticks() {
        use Status::*;
        let log = log();
        let mut pipe = Pipeline::new();
        pipe.add_alg(Scripted::new("short", true, &[], &log));
        pipe.add_alg(Scripted::new("long", true, &[Continue], &log));

        pipe.run(vec![]).unwrap();

        assert_eq!(
            entries(&log),
            vec![
                "short.exec", "long.exec", "short.post", "long.post",
                // Tick 2: only the long reader is still live.
                "long.exec", "long.post",
                "short.fini", "long.fini",
            ]
        );
    }

    #[test]
    fn test_terminates_when_all_readers_done() {
        use Status::*;
        let log = log();
        let mut pipe = Pipeline::new();
        pipe.add_alg(Scripted::new("r1", true, &[Continue, Continue], &log));
        pipe.add_alg(Scripted::new("r2", true, &[Continue], &log));

        pipe.run(vec![]).unwrap();

        let execs = entries(&log)
            .iter()
            .filter(|e| e.ends_with(".exec"))
            .count();
        // r1 executes 3 ticks (EOF on 3rd), r2 executes 2 (EOF on 2nd).
        assert_eq!(execs, 5);
    }

    #[test]
    fn test_no_readers_runs_single_tick() {
        let log = log();
        let mut pipe = Pipeline::new();
        pipe.add_alg(Scripted::new("a", false, &[], &log));

        pipe.run(vec![]).unwrap();
        assert_eq!(entries(&log), vec!["a.exec", "a.post", "a.fini"]);
    }

    #[test]
    fn test_open_output_duplicate() {
        // Scenario: duplicate open is fatal without reopen; with reopen
        // the handle is replaced.
        let pipe = Pipeline::new();
        let first = pipe.open_output("X", "/tmp/x.dat", false).unwrap();
        assert!(matches!(
            pipe.open_output("X", "/tmp/x.dat", false),
            Err(Error::OutputAlreadyOpen(_))
        ));

        let second = pipe.open_output("X", "/tmp/x2.dat", true).unwrap();
        assert!(!first.same_handle(&second));
        assert!(pipe.output("X").unwrap().same_handle(&second));
    }

    #[test]
    fn test_default_output_made_current() {
        let log = log();
        let mut pipe = Pipeline::new();
        pipe.add_alg(Scripted::new("a", false, &[], &log));
        pipe.open_output(Pipeline::DEFAULT_OUTPUT, "/tmp/out.dat", false)
            .unwrap();

        assert!(pipe.current_output().is_none());
        pipe.run(vec![]).unwrap();

        let current = pipe.current_output().unwrap();
        assert!(current.same_handle(&pipe.default_output().unwrap()));
    }

    #[test]
    fn test_file_change_fanout() {
        struct Notifier {
            log: Log,
            fired: bool,
        }
        impl Node for Notifier {
            fn file_changed(&mut self, index: usize) {
                self.log.borrow_mut().push(format!("n.file{index}"));
            }
        }
        impl Algorithm for Notifier {
            fn execute(&mut self, pipe: &Pipeline) -> Result<Status> {
                if self.fired {
                    return Ok(Status::EndOfFile);
                }
                self.fired = true;
                pipe.notify_file_changed(2);
                Ok(Status::Continue)
            }
            fn is_reader(&self) -> bool {
                true
            }
        }

        let log = log();
        let mut pipe = Pipeline::new();
        pipe.add_alg(Notifier {
            log: Rc::clone(&log),
            fired: false,
        });
        pipe.add_alg(Scripted::new("a", false, &[], &log));

        pipe.run(vec![]).unwrap();

        let all = entries(&log);
        assert!(all.contains(&"n.file2".to_string()));
        assert!(all.contains(&"a.file2".to_string()));
        // The downstream unit hears about the change before it executes.
        let pos_notify = all.iter().position(|e| e == "a.file2").unwrap();
        let pos_exec = all.iter().position(|e| e == "a.exec").unwrap();
        assert!(pos_notify < pos_exec);
    }

    #[test]
    fn test_input_accessors() {
        let log = log();
        let mut pipe = Pipeline::new();
        pipe.add_alg(Scripted::new("a", false, &[], &log));
        pipe.run(vec![PathBuf::from("/data/a.dat"), PathBuf::from("/data/b.dat")])
            .unwrap();

        assert_eq!(pipe.input_count(), 2);
        assert_eq!(pipe.input_path(1), Path::new("/data/b.dat"));
    }
}
