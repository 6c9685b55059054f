//! `TaskQueue` — the seam to whatever durable queue dispatches tasks to
//! workers (spec.md §6: "progression, minimize, regression, analyze, each
//! carrying (testcaseId, jobType). Delivery is at-least-once. Delayed
//! retries specify an absolute wait time"). Only an in-memory reference
//! implementation lives here; a real queue backend is a Non-goal.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Progression,
    Minimize,
    Regression,
    Analyze,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    pub testcase_id: u64,
    pub job_type: String,
    pub not_before: Option<SystemTime>,
}

pub trait TaskQueue {
    fn enqueue(&self, task: Task) -> Result<()>;

    fn enqueue_delayed(&self, task: Task, at: SystemTime) -> Result<()>;

    /// Pop the next task whose `not_before` (if any) has elapsed, per the
    /// at-least-once delivery contract: a task that's popped but never
    /// acked should be re-enqueued by the caller, not silently dropped.
    fn dequeue_ready(&self, now: SystemTime) -> Option<Task>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        InMemoryTaskQueue { tasks: Mutex::new(VecDeque::new()) }
    }
}

impl TaskQueue for InMemoryTaskQueue {
    fn enqueue(&self, task: Task) -> Result<()> {
        self.tasks.lock().unwrap().push_back(task);
        Ok(())
    }

    fn enqueue_delayed(&self, mut task: Task, at: SystemTime) -> Result<()> {
        task.not_before = Some(at);
        self.tasks.lock().unwrap().push_back(task);
        Ok(())
    }

    fn dequeue_ready(&self, now: SystemTime) -> Option<Task> {
        let mut tasks = self.tasks.lock().unwrap();
        let index = tasks.iter().position(|t| t.not_before.map(|nb| nb <= now).unwrap_or(true))?;
        tasks.remove(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn task(kind: TaskKind, id: u64) -> Task {
        Task { kind, testcase_id: id, job_type: "job".to_string(), not_before: None }
    }

    #[test]
    fn ready_tasks_are_delivered_immediately() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(task(TaskKind::Progression, 1)).unwrap();

        let popped = queue.dequeue_ready(SystemTime::now()).unwrap();
        assert_eq!(popped.testcase_id, 1);
        assert!(queue.dequeue_ready(SystemTime::now()).is_none());
    }

    #[test]
    fn delayed_tasks_are_not_delivered_before_their_time() {
        let queue = InMemoryTaskQueue::new();
        let future = SystemTime::now() + Duration::from_secs(3600);
        queue.enqueue_delayed(task(TaskKind::Minimize, 2), future).unwrap();

        assert!(queue.dequeue_ready(SystemTime::now()).is_none());
        assert!(queue.dequeue_ready(future + Duration::from_secs(1)).is_some());
    }

    #[test]
    fn at_least_once_requires_caller_to_reenqueue_on_failed_ack() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(task(TaskKind::Regression, 3)).unwrap();

        let popped = queue.dequeue_ready(SystemTime::now()).unwrap();
        // Simulate a worker crash before ack: caller re-enqueues.
        queue.enqueue(popped).unwrap();

        assert!(queue.dequeue_ready(SystemTime::now()).is_some());
    }
}
