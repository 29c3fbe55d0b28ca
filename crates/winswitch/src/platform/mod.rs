/*!
Platform boundary.

- `traits.rs` - the [`WindowDirectory`] contract, [`Subscription`], [`Notifier`]
- `memory.rs` - scriptable in-memory directory
*/

pub mod memory;
mod traits;

pub use traits::{Notifier, Subscription, WindowDirectory};
