/*!
Winswitch - window registry and synchronization engine for a task switcher

Keeps an ordered, always-current list of every switchable window across all
running applications and desktops, plus a focus cursor a keyboard-driven UI
cycles through. OS access goes through a [`WindowDirectory`] backend;
[`platform::memory::MemoryDirectory`] is a scriptable in-memory one.

```ignore
use winswitch::{Intent, Switcher};

// Engine starts immediately and fills the registry in the background
let switcher = Switcher::builder()
    .exclude_pid(std::process::id())
    .build(directory)?;

// Shortcut listener feeds intents
switcher.intent(Intent::CycleNext)?;
switcher.intent(Intent::CommitFocus)?;

// UI re-reads the snapshot on every Changed event
let mut events = switcher.subscribe();
while let Ok(event) = events.recv().await {
    if let Event::Changed { .. } = event {
        render(&switcher.snapshot());
    }
}

// Stops when the last clone is dropped
drop(switcher);
```
*/

mod core;
pub mod platform;

mod types;
pub use types::*;

pub use crate::core::{AppsToShow, SpacesToShow, Switcher, SwitcherBuilder, SwitcherConfig};
pub use crate::platform::{Notifier, Subscription, WindowDirectory};
