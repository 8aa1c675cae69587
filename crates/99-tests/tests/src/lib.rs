//! Cross-crate scenarios driving the kernel the way a guest would.

#[cfg(test)]
mod content_e2e;

#[cfg(test)]
mod hotplug_e2e;
