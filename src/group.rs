//! Groups accept values and broadcast them to their members.
//!
//! A [`Group`] owns the member registry and the dispatch loop. Values are
//! handed to the dispatch loop with [`Group::send`], which fans every value out
//! to the members that joined before the loop accepted it.
//!
//! # Example
//! ```
//! use multicast::Group;
//! use std::sync::Arc;
//!
//! let group = Arc::new(Group::new());
//! let alice = group.join();
//! let bob = group.join();
//!
//! let dispatcher = group.spawn_broadcast()?;
//! group.send(String::from("x"));
//!
//! // Both members get their own copy of the value.
//! assert_eq!(alice.read()?, "x");
//! assert_eq!(bob.read()?, "x");
//!
//! group.quit();
//! dispatcher.join().unwrap();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam::{
    channel::{Receiver, Sender},
    select,
};

use crate::{
    dispatch::{Dispatcher, Registration},
    member::{Member, MemberId},
};

/// The identifier of a group.
///
/// Ids are unique within the process.
pub type GroupId = u64;

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(0);

/// An opaque payload of any type.
///
/// Cloning a payload only clones the reference, so all members of a group
/// share the same value.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Indicates an error within the group configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The thread name is empty.
    #[error("Thread name must not be empty")]
    ThreadNameEmpty,

    /// The thread name contains a nul byte, which threads cannot be named with.
    #[error("Thread name must not contain nul bytes")]
    ThreadNameContainsNul,
}

/// Additional configuration for a group.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// The number of values that can wait in a member inbox.
    ///
    /// With a capacity of zero, every delivery is a rendezvous with a read of
    /// the member. Values are queued for each member regardless of this
    /// setting, a slow member never blocks the group.
    ///
    /// The default is 0.
    pub inbox_capacity: usize,

    /// The name of the dispatch thread started by [`Group::spawn_broadcast`].
    ///
    /// Delivery worker threads are named `{thread_name}-delivery-{index}`.
    ///
    /// The default is `multicast`.
    pub thread_name: String,
}

impl GroupConfig {
    /// Validates the configuration.
    ///
    /// See [`GroupConfig`] and [`ConfigError`] for details.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_name.is_empty() {
            return Err(ConfigError::ThreadNameEmpty);
        }

        if self.thread_name.contains('\0') {
            return Err(ConfigError::ThreadNameContainsNul);
        }
        Ok(())
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 0,
            thread_name: "multicast".into(),
        }
    }
}

/// The dispatch loop did not accept the value in time.
///
/// The value that could not be sent is returned.
#[derive(thiserror::Error)]
#[error("Timed out waiting for the dispatch loop to accept the value")]
pub struct SendTimeoutError<T>(pub T);

impl<T> SendTimeoutError<T> {
    /// Returns the value that could not be sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SendTimeoutError(..)")
    }
}

/// The dispatch loop did not accept the quit signal in time.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Timed out waiting for the dispatch loop to quit")]
pub struct QuitTimeoutError;

/// A broadcast group.
///
/// See the [module documentation](self) for details.
pub struct Group<T = Payload> {
    id: GroupId,
    config: GroupConfig,
    inbound: (Sender<T>, Receiver<T>),
    quit: (Sender<()>, Receiver<()>),
    members: Mutex<Vec<Registration<T>>>,
    dispatcher: Mutex<Dispatcher<T>>,
}

impl<T: Clone + Send + 'static> Group<T> {
    /// Creates a group without members using the default configuration.
    pub fn new() -> Self {
        Self::with_validated_config(GroupConfig::default())
    }

    /// Creates a group without members.
    pub fn with_config(config: GroupConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_validated_config(config))
    }

    fn with_validated_config(config: GroupConfig) -> Self {
        Self {
            id: NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed),
            inbound: crossbeam::channel::bounded(0),
            quit: crossbeam::channel::bounded(0),
            members: Mutex::new(Vec::new()),
            dispatcher: Mutex::new(Dispatcher::new(config.thread_name.clone())),
            config,
        }
    }

    /// Returns the group id.
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    // The registry is append-only, a panic while holding the lock cannot leave
    // it in an inconsistent state.
    fn registry(&self) -> MutexGuard<Vec<Registration<T>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a new member to the group.
    ///
    /// The member receives every value the dispatch loop accepts from now on.
    pub fn join(&self) -> Member<T> {
        let (inbox, receiver) = crossbeam::channel::bounded(self.config.inbox_capacity);

        let mut members = self.registry();
        let id = MemberId::new(self.id, members.len());
        members.push(Registration { id, inbox });
        drop(members);

        tracing::trace!(member = %id, "member joined");
        Member::new(id, receiver)
    }

    /// Returns the members of the group.
    ///
    /// The result is a copy of the membership at the time of the call and is
    /// not affected by later joins.
    pub fn members(&self) -> Vec<MemberId> {
        self.registry().iter().map(|member| member.id).collect()
    }

    /// Returns the number of members in the group.
    pub fn member_count(&self) -> usize {
        self.registry().len()
    }

    /// Sends a value to all members.
    ///
    /// This method blocks until the dispatch loop accepts the value. It does
    /// not wait for the members to read it. If the dispatch loop is not
    /// running, this method blocks until it is started and forever otherwise.
    pub fn send(&self, value: T) {
        if self.inbound.0.send(value).is_err() {
            // The group holds the receiver itself, the channel cannot be disconnected.
            unreachable!();
        }
    }

    /// Sends a value to all members, giving up after `timeout`.
    pub fn send_timeout(&self, value: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
        self.inbound
            .0
            .send_timeout(value, timeout)
            .map_err(|err| SendTimeoutError(err.into_inner()))
    }

    /// Runs the dispatch loop.
    ///
    /// This method blocks until [`quit`](Self::quit) is called. Every accepted
    /// value is handed to the members that were part of the group at that
    /// time. A member that does not read never blocks this loop or the other
    /// members.
    ///
    /// Only one dispatch loop runs at a time. Calling this method while
    /// another thread runs the loop blocks until that loop quits.
    #[tracing::instrument(skip(self), fields(group = self.id))]
    pub fn broadcast(&self) {
        let mut dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("dispatch loop started");

        loop {
            select! {
                recv(self.inbound.1) -> value => {
                    let Ok(value) = value else {
                        unreachable!("the group holds the sender itself");
                    };
                    let members = self.registry().clone();
                    dispatcher.dispatch(value, &members);
                }
                recv(self.quit.1) -> _ => {
                    tracing::debug!("dispatch loop stopped");
                    return;
                }
            }
        }
    }

    /// Starts the dispatch loop on a new thread.
    ///
    /// The thread is named after [`GroupConfig::thread_name`] and stops once
    /// [`quit`](Self::quit) is called.
    pub fn spawn_broadcast(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let group = self.clone();
        std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || group.broadcast())
    }

    /// Stops the dispatch loop.
    ///
    /// This method blocks until the dispatch loop picks up the signal. Values
    /// that were already accepted are still delivered. Members stay in the
    /// group and can still read, but new values are not accepted until the
    /// dispatch loop is started again.
    pub fn quit(&self) {
        if self.quit.0.send(()).is_err() {
            // The group holds the receiver itself, the channel cannot be disconnected.
            unreachable!();
        }
    }

    /// Stops the dispatch loop, giving up after `timeout`.
    pub fn quit_timeout(&self, timeout: Duration) -> Result<(), QuitTimeoutError> {
        self.quit
            .0
            .send_timeout((), timeout)
            .map_err(|_| QuitTimeoutError)
    }
}

impl<T: Clone + Send + 'static> Default for Group<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Group<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
