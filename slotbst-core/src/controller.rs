use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    slot::SlotId,
    store::Node,
    tree::{DeleteJob, DeletePhase, InsertJob, Progress, Tree, Walker},
    ErrorCode, Result, Value,
};

/// A command the engine accepts from its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stores a pre-built node verbatim in the next free slot.
    Construct(Node),
    Insert(Value),
    Find(Value),
    Delete(Value),
}

/// The outcome of a completed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Constructed(SlotId),
    Inserted(SlotId),
    Found(SlotId),
    /// The value of a find or delete is not in the tree.
    NotFound,
    /// The node was removed, its slot went back to the free list.
    Deleted(SlotId),
}

/// The state of the command controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Constructing,
    Inserting,
    Finding,
    Deleting(DeletePhase),
}

#[derive(Error, Debug)]
#[error("a command is already in flight")]
pub(crate) struct Busy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Idle,
    Constructing(Node),
    Inserting(InsertJob),
    Finding(Walker),
    Deleting(DeleteJob),
}

/// Sequences the tree algorithms for one command at a time.
///
/// A command is accepted only while idle and then advanced by [`Controller::step`], one
/// discrete step per call, until it reaches its terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Controller {
    job: Job,
}

impl Controller {
    #[inline]
    pub(crate) fn new() -> Self {
        Self { job: Job::Idle }
    }

    pub(crate) fn state(&self) -> State {
        match &self.job {
            Job::Idle => State::Idle,
            Job::Constructing(_) => State::Constructing,
            Job::Inserting(_) => State::Inserting,
            Job::Finding(_) => State::Finding,
            Job::Deleting(job) => State::Deleting(job.phase()),
        }
    }

    #[inline]
    pub(crate) fn is_busy(&self) -> bool {
        !matches!(self.job, Job::Idle)
    }

    /// Accepts `command` if no other command is in flight, otherwise ignores it.
    ///
    /// The walk of the command starts from `root`.
    pub(crate) fn submit(&mut self, command: Command, root: SlotId) -> bool {
        if self.is_busy() {
            warn!(?command, state = ?self.state(), "command ignored, controller is busy");
            return false;
        }

        debug!(?command, "command accepted");
        self.job = match command {
            Command::Construct(node) => Job::Constructing(node),
            Command::Insert(value) => Job::Inserting(InsertJob::new(value, root)),
            Command::Find(value) => Job::Finding(Walker::new(value, root)),
            Command::Delete(value) => Job::Deleting(DeleteJob::new(value, root)),
        };
        true
    }

    /// Advances the command in flight by one step.
    ///
    /// Returns the outcome once the command terminates, and `None` while it is still
    /// running or when there is nothing to do. The controller is idle again after any
    /// outcome, failures included.
    pub(crate) fn step(&mut self, tree: &mut Tree) -> Option<Result<Response>> {
        let progress = match &mut self.job {
            Job::Idle => return None,
            Job::Constructing(node) => tree
                .construct(*node)
                .map(|slot| Progress::Done(Response::Constructed(slot))),
            Job::Inserting(job) => job.step(tree).map(|progress| match progress {
                Progress::Continue(()) => Progress::Continue(()),
                Progress::Done(slot) => Progress::Done(Response::Inserted(slot)),
            }),
            Job::Finding(walker) => walker.step(tree).map(|progress| match progress {
                Progress::Continue(_) => Progress::Continue(()),
                Progress::Done(walk) => {
                    Progress::Done(walk.found().map_or(Response::NotFound, Response::Found))
                }
            }),
            Job::Deleting(job) => job.step(tree).map(|progress| match progress {
                Progress::Continue(_) => Progress::Continue(()),
                Progress::Done(Some(slot)) => Progress::Done(Response::Deleted(slot)),
                Progress::Done(None) => Progress::Done(Response::NotFound),
            }),
        };

        match progress {
            Ok(Progress::Continue(())) => None,
            Ok(Progress::Done(response)) => {
                self.job = Job::Idle;
                debug!(?response, "command finished");
                Some(Ok(response))
            }
            Err(err) => {
                self.job = Job::Idle;
                if err.code() == ErrorCode::EngineCorrupted {
                    warn!(error = %err, "command failed");
                } else {
                    debug!(error = %err, "command failed");
                }
                Some(Err(err))
            }
        }
    }

    /// Steps the command in flight until it terminates.
    pub(crate) fn finish(&mut self, tree: &mut Tree) -> Option<Result<Response>> {
        while self.is_busy() {
            if let Some(outcome) = self.step(tree) {
                return Some(outcome);
            }
        }
        None
    }
}

impl Default for Controller {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, Controller, Response, State};
    use crate::{
        error::ErrorCode,
        slot::SlotId,
        store::Node,
        tree::{tests::tree_of, DeletePhase, Tree},
    };

    #[test]
    fn test_find_steps() {
        let mut tree = tree_of(7, &[50, 30, 70, 20, 40]);
        let mut controller = Controller::new();
        assert_eq!(controller.state(), State::Idle);
        assert!(controller.step(&mut tree).is_none());

        assert!(controller.submit(Command::Find(40), tree.root()));
        assert_eq!(controller.state(), State::Finding);

        // 50, 30, then 40 matches.
        assert!(controller.step(&mut tree).is_none());
        assert!(controller.step(&mut tree).is_none());
        assert_eq!(
            controller.step(&mut tree).map(|r| r.unwrap()),
            Some(Response::Found(5.into()))
        );
        assert_eq!(controller.state(), State::Idle);
    }

    #[test]
    fn test_ignored_while_busy() {
        let mut tree = tree_of(7, &[50, 30, 70]);
        let mut controller = Controller::new();

        assert!(controller.submit(Command::Delete(30), tree.root()));
        assert!(!controller.submit(Command::Insert(10), tree.root()));
        assert_eq!(controller.state(), State::Deleting(DeletePhase::Locate));

        assert_eq!(
            controller.finish(&mut tree).map(|r| r.unwrap()),
            Some(Response::Deleted(2.into()))
        );
        // The ignored insert never ran.
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.search(10).unwrap().found(), None);
    }

    #[test]
    fn test_delete_phases() {
        let mut tree = tree_of(7, &[50, 30, 70, 20, 40]);
        let mut controller = Controller::new();
        controller.submit(Command::Delete(50), tree.root());

        // The root matches on the first step.
        assert!(controller.step(&mut tree).is_none());
        assert_eq!(controller.state(), State::Deleting(DeletePhase::Classify));
        assert!(controller.step(&mut tree).is_none());
        assert_eq!(controller.state(), State::Deleting(DeletePhase::TwoChildren));
        assert_eq!(
            controller.step(&mut tree).map(|r| r.unwrap()),
            Some(Response::Deleted(1.into()))
        );
        assert_eq!(tree.root(), 3.into());
        assert_eq!(tree.node(3.into()).unwrap(), Node::new(70, 2.into(), SlotId::NULL));
    }

    #[test]
    fn test_construct_and_failure() {
        let mut tree = Tree::new(1);
        let mut controller = Controller::new();

        controller.submit(Command::Construct(Node::leaf(3)), tree.root());
        assert_eq!(controller.state(), State::Constructing);
        assert_eq!(
            controller.step(&mut tree).map(|r| r.unwrap()),
            Some(Response::Constructed(1.into()))
        );

        controller.submit(Command::Insert(4), tree.root());
        let err = controller.finish(&mut tree).unwrap().unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfCapacity);
        assert_eq!(controller.state(), State::Idle);

        controller.submit(Command::Find(9), tree.root());
        assert_eq!(
            controller.finish(&mut tree).map(|r| r.unwrap()),
            Some(Response::NotFound)
        );
    }
}
