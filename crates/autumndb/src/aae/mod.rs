//! Active Anti-Entropy replicator (component J).
//!
//! Two sub-roles run concurrently on every node: the [`originator`] pushes
//! changes out on local `CREATE_DOC`/`UPDATE_DOC` events, and the
//! [`answerer`] answers incoming snapshot checks and document pushes from
//! peers. Both go through [`crate::collection::Collection`]'s locked entry
//! points rather than touching the filesystem directly, so the per-collection
//! mutex (§5) is never bypassed.

pub mod answerer;
pub mod originator;

pub use answerer::AaeAnswerer;
pub use originator::AaeOriginator;
