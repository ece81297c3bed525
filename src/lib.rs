//! In-process broadcast groups.
//!
//! A [`Group`] accepts values through [`Group::send`] and fans every value out
//! to all of its currently joined [members](Member). Each member owns a private
//! inbox and reads the values at its own pace using [`Member::read`]. This is
//! the single-process analogue of a publish/subscribe topic with one publish
//! path and many independent subscriber queues.
//!
//! # Dispatch loop
//! Values are only distributed while the dispatch loop of the group is running.
//! The loop is started with [`Group::broadcast`] (which blocks the calling
//! thread) or [`Group::spawn_broadcast`] and stopped with [`Group::quit`].
//!
//! Sending is a rendezvous with the dispatch loop: [`Group::send`] returns once
//! the loop has accepted the value, not once members have read it. A member
//! that does not read never delays the other members or the next send.
//!
//! # Ordering
//! Every member observes the values it receives in the order they were
//! accepted by the dispatch loop. There is no ordering between members. A
//! member receives a value if it joined before the dispatch loop accepted it.
//!
//! # Example
//! ```
//! use multicast::Group;
//!
//! let group = Group::new();
//! let member = group.join();
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| group.broadcast());
//!
//!     group.send("ping");
//!     assert_eq!(member.read()?, "ping");
//!
//!     group.quit();
//!     Ok::<(), multicast::ReadError>(())
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Important Notes
//! <div class="warning">
//! All blocking operations wait forever if their counterpart never shows up:
//! <code>send</code> and <code>quit</code> without a running dispatch loop, and
//! <code>read</code> without a value. Use the <code>*_timeout</code> variants
//! if the caller cannot guarantee the counterpart.
//! </div>

pub(crate) mod dispatch;
#[cfg(test)]
pub(crate) mod test;

pub mod group;
pub mod member;

pub use group::{
    ConfigError, Group, GroupConfig, GroupId, Payload, QuitTimeoutError, SendTimeoutError,
};
pub use member::{Member, MemberId, ReadError};
