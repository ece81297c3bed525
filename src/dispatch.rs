use ahash::HashMap;
use crossbeam::channel::{Receiver, Sender};

use crate::member::MemberId;

/// The sending half of a member inbox, as stored in the group registry.
pub(crate) struct Registration<T> {
    pub id: MemberId,
    pub inbox: Sender<T>,
}

impl<T> Clone for Registration<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inbox: self.inbox.clone(),
        }
    }
}

/// Hands values over to the delivery workers of the members.
///
/// Every member gets exactly one worker thread that moves values from an
/// unbounded queue into the member inbox. The dispatch loop therefore never
/// blocks on a slow member, and every member receives its values in dispatch
/// order.
pub(crate) struct Dispatcher<T> {
    thread_name: String,
    // `None` marks members whose inbox was dropped.
    workers: HashMap<MemberId, Option<Sender<T>>>,
}

impl<T: Send + 'static> Dispatcher<T> {
    pub fn new(thread_name: String) -> Self {
        Self {
            thread_name,
            workers: HashMap::default(),
        }
    }

    /// Queues a clone of `value` for each of the `members`.
    pub fn dispatch(&mut self, value: T, members: &[Registration<T>])
    where
        T: Clone,
    {
        tracing::trace!(members = members.len(), "dispatching value");

        for member in members {
            let Some(queue) = self.queue(member) else {
                continue;
            };

            if queue.send(value.clone()).is_ok() {
                tracing::trace!(member = %member.id, "queued value");
            } else {
                // The worker only stops once every handle to the inbox is gone,
                // nobody can read from this member anymore.
                tracing::debug!(member = %member.id, "member inbox was dropped");
                self.workers.insert(member.id, None);
            }
        }
    }

    /// Returns the queue of the delivery worker for `member`, starting the
    /// worker if necessary.
    ///
    /// Returns `None` if the member is gone or the worker could not be started.
    fn queue(&mut self, member: &Registration<T>) -> Option<&Sender<T>> {
        if !self.workers.contains_key(&member.id) {
            match spawn_worker(&self.thread_name, member) {
                Ok(queue) => {
                    self.workers.insert(member.id, Some(queue));
                }
                Err(err) => {
                    tracing::error!(member = %member.id, %err, "failed to start delivery worker");
                    return None;
                }
            }
        }
        self.workers.get(&member.id).and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub fn worker_count(&self) -> usize {
        self.workers.values().filter(|queue| queue.is_some()).count()
    }
}

fn spawn_worker<T: Send + 'static>(
    thread_name: &str,
    member: &Registration<T>,
) -> std::io::Result<Sender<T>> {
    let (queue, pending) = crossbeam::channel::unbounded();
    let id = member.id;
    let inbox = member.inbox.clone();

    std::thread::Builder::new()
        .name(format!("{}-delivery-{}", thread_name, id.index()))
        .spawn(move || deliver(id, pending, inbox))?;

    tracing::debug!(member = %id, "started delivery worker");
    Ok(queue)
}

fn deliver<T>(id: MemberId, pending: Receiver<T>, inbox: Sender<T>) {
    for value in pending.iter() {
        if inbox.send(value).is_err() {
            break;
        }
    }
    tracing::debug!(member = %id, "delivery worker stopped");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::*;

    fn registration(index: usize) -> (Registration<u32>, Receiver<u32>) {
        let (inbox, receiver) = crossbeam::channel::bounded(0);
        let id = MemberId::new(0, index);
        (Registration { id, inbox }, receiver)
    }

    #[test]
    fn one_worker_per_member() -> Result<()> {
        init_logger();

        let (first, first_inbox) = registration(0);
        let (second, second_inbox) = registration(1);
        let members = [first, second];

        let mut dispatcher = Dispatcher::new("dispatch-test".into());
        for value in 0..10 {
            dispatcher.dispatch(value, &members);
        }
        assert_eq!(dispatcher.worker_count(), 2);

        for expected in 0..10 {
            assert_eq!(second_inbox.recv_timeout(TIMEOUT)?, expected);
        }
        for expected in 0..10 {
            assert_eq!(first_inbox.recv_timeout(TIMEOUT)?, expected);
        }
        Ok(())
    }

    #[test]
    fn dropped_inbox_stops_the_worker() -> Result<()> {
        init_logger();

        let (member, inbox) = registration(0);
        let members = [member];
        let mut dispatcher = Dispatcher::new("dispatch-test".into());

        dispatcher.dispatch(1, &members);
        assert_eq!(inbox.recv_timeout(TIMEOUT)?, 1);
        drop(inbox);

        // The worker notices the dropped inbox on its next delivery, after that
        // the member is never served again.
        let mut value = 2;
        while dispatcher.worker_count() > 0 {
            dispatcher.dispatch(value, &members);
            value += 1;
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        dispatcher.dispatch(value, &members);
        assert_eq!(dispatcher.worker_count(), 0);
        Ok(())
    }
}
