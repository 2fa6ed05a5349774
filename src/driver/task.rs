//! Tasks, completion handles and the FIFO task queue.
//!
//! Queued tasks live in a generation-checked arena; the FIFO order is a
//! deque of ids into it. Removing a task (cancellation) frees its slot and
//! leaves a stale id behind, which `pop_front` skips.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use super::row::QueryResult;
use crate::error::{OraError, OraResult};
use crate::protocol::{LobRequest, LobResult, StatementRequest};

/// One-shot completion handle.
///
/// Resolves exactly once: `succeed`, `fail`, or `ConnectionClosed` on drop.
#[derive(Debug)]
pub struct Completion<T> {
    sender: Option<oneshot::Sender<OraResult<T>>>,
}

impl<T> Completion<T> {
    pub fn new() -> (Self, oneshot::Receiver<OraResult<T>>) {
        let (tx, rx) = oneshot::channel();
        (Self { sender: Some(tx) }, rx)
    }

    pub fn succeed(mut self, value: T) {
        self.send(Ok(value));
    }

    pub fn fail(mut self, error: OraError) {
        self.send(Err(error));
    }

    /// The receiving side went away, nobody waits for the result.
    pub fn is_abandoned(&self) -> bool {
        self.sender.as_ref().is_none_or(|tx| tx.is_closed())
    }

    fn send(&mut self, result: OraResult<T>) {
        if let Some(tx) = self.sender.take() {
            let _ = tx.send(result);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        self.send(Err(OraError::ConnectionClosed));
    }
}

/// A unit of client work.
#[derive(Debug)]
pub enum Task {
    /// Collapsed pings share one round trip.
    Ping(Vec<Completion<()>>),
    Statement {
        request: StatementRequest,
        completion: Completion<QueryResult>,
    },
    Lob {
        request: LobRequest,
        completion: Completion<LobResult>,
    },
    /// Logoff, then close the transport.
    Close(Completion<()>),
}

impl Task {
    pub fn ping() -> (Self, oneshot::Receiver<OraResult<()>>) {
        let (completion, rx) = Completion::new();
        (Task::Ping(vec![completion]), rx)
    }

    pub fn statement(
        request: StatementRequest,
    ) -> (Self, oneshot::Receiver<OraResult<QueryResult>>) {
        let (completion, rx) = Completion::new();
        (Task::Statement { request, completion }, rx)
    }

    pub fn lob(request: LobRequest) -> (Self, oneshot::Receiver<OraResult<LobResult>>) {
        let (completion, rx) = Completion::new();
        (Task::Lob { request, completion }, rx)
    }

    pub fn close() -> (Self, oneshot::Receiver<OraResult<()>>) {
        let (completion, rx) = Completion::new();
        (Task::Close(completion), rx)
    }

    pub fn is_ping(&self) -> bool {
        matches!(self, Task::Ping(_))
    }

    /// Every waiter of this task has gone away.
    pub fn is_abandoned(&self) -> bool {
        match self {
            Task::Ping(handles) => handles.iter().all(Completion::is_abandoned),
            Task::Statement { completion, .. } => completion.is_abandoned(),
            Task::Lob { completion, .. } => completion.is_abandoned(),
            Task::Close(completion) => completion.is_abandoned(),
        }
    }

    /// Resolve every handle of this task with `error`.
    pub fn fail(self, error: OraError) {
        match self {
            Task::Ping(handles) => {
                for handle in handles {
                    handle.fail(error.clone());
                }
            }
            Task::Statement { completion, .. } => completion.fail(error),
            Task::Lob { completion, .. } => completion.fail(error),
            Task::Close(completion) => completion.fail(error),
        }
    }

    /// Merge another ping's waiters into this one; hands them back if this is no ping.
    pub(crate) fn absorb_ping(
        &mut self,
        mut handles: Vec<Completion<()>>,
    ) -> Result<(), Vec<Completion<()>>> {
        match self {
            Task::Ping(existing) => {
                existing.append(&mut handles);
                Ok(())
            }
            _ => Err(handles),
        }
    }
}

/// Stable handle to a queued task, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    task: Option<Task>,
}

/// FIFO of tasks waiting for the in-flight slot.
#[derive(Debug, Default)]
pub struct TaskQueue {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: VecDeque<TaskId>,
    len: usize,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) -> TaskId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.task = Some(task);
        let id = TaskId {
            index,
            generation: slot.generation,
        };
        self.order.push_back(id);
        self.len += 1;
        id
    }

    /// Take the task out of its slot, freeing the slot for reuse.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let task = slot.task.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(task)
    }

    pub fn pop_front(&mut self) -> Option<(TaskId, Task)> {
        while let Some(id) = self.order.pop_front() {
            if let Some(task) = self.remove(id) {
                return Some((id, task));
            }
        }
        None
    }

    /// The task is still waiting in its slot.
    pub fn contains(&self, id: TaskId) -> bool {
        self.slots.get(id.index as usize).is_some_and(|slot| {
            slot.generation == id.generation && slot.task.is_some()
        })
    }

    /// First queued ping, if any.
    pub fn queued_ping_mut(&mut self) -> Option<&mut Task> {
        let slots = &mut self.slots;
        let id = self.order.iter().copied().find(|id| {
            slots.get(id.index as usize).is_some_and(|slot| {
                slot.generation == id.generation && slot.task.as_ref().is_some_and(Task::is_ping)
            })
        })?;
        slots[id.index as usize].task.as_mut()
    }

    /// Remove every task, in submission order.
    pub fn drain(&mut self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.len);
        while let Some((_, task)) = self.pop_front() {
            tasks.push(task);
        }
        tasks
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ExecuteOptions;
    use pretty_assertions::assert_eq;

    fn statement(sql: &str) -> (Task, oneshot::Receiver<OraResult<QueryResult>>) {
        Task::statement(StatementRequest::new(sql, vec![], ExecuteOptions::default()))
    }

    fn sql_of(task: &Task) -> &str {
        match task {
            Task::Statement { request, .. } => &request.sql,
            _ => "",
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = TaskQueue::new();
        let (a, _ra) = statement("a");
        let (b, _rb) = statement("b");
        queue.push(a);
        queue.push(b);
        assert_eq!(queue.len(), 2);
        assert_eq!(sql_of(&queue.pop_front().unwrap().1), "a");
        assert_eq!(sql_of(&queue.pop_front().unwrap().1), "b");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_removed_id_is_skipped_and_stale() {
        let mut queue = TaskQueue::new();
        let (a, _ra) = statement("a");
        let (b, _rb) = statement("b");
        let id_a = queue.push(a);
        queue.push(b);
        assert!(queue.contains(id_a));
        assert!(queue.remove(id_a).is_some());
        assert!(queue.remove(id_a).is_none());
        assert!(!queue.contains(id_a));

        let (c, _rc) = statement("c");
        let id_c = queue.push(c);
        assert_eq!(id_c.index, id_a.index);
        assert_ne!(id_c, id_a);
        assert!(queue.remove(id_a).is_none());
        assert!(queue.contains(id_c));
        assert!(!queue.contains(id_a));

        assert_eq!(sql_of(&queue.pop_front().unwrap().1), "b");
        assert_eq!(sql_of(&queue.pop_front().unwrap().1), "c");
    }

    #[tokio::test]
    async fn test_dropped_completion_reports_closed() {
        let (task, rx) = statement("a");
        drop(task);
        assert!(matches!(rx.await.unwrap(), Err(OraError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_fail_resolves_every_ping_waiter() {
        let (mut ping, rx1) = Task::ping();
        let (completion, rx2) = Completion::new();
        assert!(ping.absorb_ping(vec![completion]).is_ok());
        ping.fail(OraError::Cancelled);
        assert!(matches!(rx1.await.unwrap(), Err(OraError::Cancelled)));
        assert!(matches!(rx2.await.unwrap(), Err(OraError::Cancelled)));
    }

    #[test]
    fn test_abandoned_when_receiver_dropped() {
        let (task, rx) = statement("a");
        assert!(!task.is_abandoned());
        drop(rx);
        assert!(task.is_abandoned());
    }
}
