//! The virtual filesystem layer: one tree, many backends.
//!
//! Every absolute [`VfsPath`] names its owning backend in its first segment.
//! The [`Router`] turns that segment into a [`Provider`] and hands it the rest
//! of the path, so backends only ever see paths relative to their own root.
//!
//! # Providers
//! [`Provider`] is the capability set every backend implements. There are four
//! of them, wrapped behind [`ProviderInstance`]:
//!
//! - [`SessionStore`], the in-process tree named after the session.
//! - [`RemoteProvider`], which forwards every call to a server through the
//!   broker [`Transport`](crate::transport::Transport).
//! - [`StubProvider`], a read-only placeholder for a profile that is known but
//!   not mounted.
//! - [`HomeProvider`], synthesized for the empty path, listing the session
//!   root and one node per known profile.
//!
//! # Magnet folders
//! A folder `N` next to a file `N.magnet` is a magnet folder. Listings hide the
//! sidecar and flag the folder; renames and removals carry the sidecar along.

mod error;
mod home;
mod node;
mod provider;
mod remote;
mod router;
mod session;
mod stub;

pub use error::*;
pub use home::*;
pub use node::*;
pub use provider::*;
pub use remote::*;
pub use router::*;
pub use session::*;
pub use stub::*;
