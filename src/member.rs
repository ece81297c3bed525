//! Members receive the values broadcasted by their group.
//!
//! A [`Member`] is created by [`Group::join`](crate::Group::join) and owns a
//! private inbox. The inbox is only written to by the delivery worker of the
//! group and only read through the member handle. Cloning a member clones the
//! handle, not the inbox: clones compete for the same values.

use std::{fmt, time::Duration};

use crossbeam::channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::group::GroupId;

/// Identifies a member within the process.
///
/// The index is the position of the member in the join order of its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId {
    group: GroupId,
    index: usize,
}

impl MemberId {
    pub(crate) fn new(group: GroupId, index: usize) -> Self {
        Self { group, index }
    }

    /// Returns the id of the group the member belongs to.
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Returns the position of the member in the join order of its group.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.index)
    }
}

/// Indicates an error while reading from a member inbox.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// No value arrived within the timeout.
    #[error("Timed out waiting for a value")]
    Timeout,

    /// No value is currently available.
    #[error("No value available")]
    Empty,

    /// The group is gone and every value delivered to this member was read.
    #[error("Group disconnected")]
    Disconnected,
}

impl From<RecvTimeoutError> for ReadError {
    fn from(err: RecvTimeoutError) -> Self {
        match err {
            RecvTimeoutError::Timeout => Self::Timeout,
            RecvTimeoutError::Disconnected => Self::Disconnected,
        }
    }
}

impl From<TryRecvError> for ReadError {
    fn from(err: TryRecvError) -> Self {
        match err {
            TryRecvError::Empty => Self::Empty,
            TryRecvError::Disconnected => Self::Disconnected,
        }
    }
}

/// A handle to a member of a [`Group`](crate::Group).
pub struct Member<T> {
    id: MemberId,
    inbox: Receiver<T>,
}

impl<T> Member<T> {
    pub(crate) fn new(id: MemberId, inbox: Receiver<T>) -> Self {
        Self { id, inbox }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    /// Returns the id of the group this member joined.
    pub fn group_id(&self) -> GroupId {
        self.id.group
    }

    /// Reads the next value.
    ///
    /// This method blocks until a value is delivered to this member. Values
    /// are returned in the order the dispatch loop accepted them. It only
    /// fails once the group has been dropped and nothing is left to read.
    pub fn read(&self) -> Result<T, ReadError> {
        self.inbox.recv().map_err(|_| ReadError::Disconnected)
    }

    /// Reads the next value, giving up after `timeout`.
    pub fn read_timeout(&self, timeout: Duration) -> Result<T, ReadError> {
        Ok(self.inbox.recv_timeout(timeout)?)
    }

    /// Reads a value if one is ready to be handed over right now.
    ///
    /// With the default inbox capacity of zero, a value is only ready while
    /// the delivery worker of this member is blocked handing it over.
    pub fn try_read(&self) -> Result<T, ReadError> {
        Ok(self.inbox.try_recv()?)
    }

    /// Returns the inbox of this member.
    ///
    /// This allows waiting on the inbox together with other channels, e.g.
    /// using [`crossbeam::select!`].
    pub fn receiver(&self) -> &Receiver<T> {
        &self.inbox
    }
}

impl<T> Clone for Member<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inbox: self.inbox.clone(),
        }
    }
}

impl<T> PartialEq for Member<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Member<T> {}

impl<T> fmt::Debug for Member<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Member").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use crate::test::*;
    use crate::{Group, ReadError};

    #[test]
    fn read_without_send_times_out() -> Result<()> {
        init_logger();

        let group = Group::<u32>::new();
        let member = group.join();

        thread::scope(|s| {
            s.spawn(|| group.broadcast());
            assert_eq!(member.read_timeout(HAZARD_TIMEOUT), Err(ReadError::Timeout));
            assert_eq!(member.try_read(), Err(ReadError::Empty));
            group.quit();
        });

        Ok(())
    }

    #[test]
    fn read_after_group_dropped_is_disconnected() -> Result<()> {
        init_logger();

        let group = Group::<u32>::new();
        let member = group.join();
        drop(group);

        assert_eq!(member.read(), Err(ReadError::Disconnected));
        Ok(())
    }

    #[test]
    fn pending_values_survive_the_group() -> Result<()> {
        init_logger();

        let group = Group::new();
        let member = group.join();

        thread::scope(|s| {
            s.spawn(|| group.broadcast());
            group.send(1u32);
            group.send(2u32);
            group.quit();
        });
        drop(group);

        assert_eq!(member.read_timeout(TIMEOUT)?, 1);
        assert_eq!(member.read_timeout(TIMEOUT)?, 2);
        assert_eq!(member.read_timeout(TIMEOUT), Err(ReadError::Disconnected));
        Ok(())
    }

    #[test]
    fn receiver_can_be_selected() -> Result<()> {
        init_logger();

        let group = Group::new();
        let first = group.join();
        let second = group.join();

        thread::scope(|s| {
            s.spawn(|| group.broadcast());
            group.send("hello");

            for _ in 0..2 {
                crossbeam::select! {
                    recv(first.receiver()) -> value => assert_eq!(value, Ok("hello")),
                    recv(second.receiver()) -> value => assert_eq!(value, Ok("hello")),
                    default(TIMEOUT) => panic!("no member received the value"),
                }
            }

            group.quit();
        });

        Ok(())
    }

    #[test]
    fn member_identity() {
        let group = Group::<()>::new();
        let first = group.join();
        let second = group.join();

        assert_eq!(first.group_id(), group.id());
        assert_eq!(first.id().index(), 0);
        assert_eq!(second.id().index(), 1);
        assert_eq!(first.clone(), first);
        assert_ne!(first, second);
        assert_eq!(second.id().to_string(), format!("{}:1", group.id()));
    }
}
