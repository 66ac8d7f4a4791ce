//! Auxiliary periodic probes (spec §4.5 "System probes" / "Network &
//! stream probes", §5 tasks 2-4). Each runs on its own interval,
//! independent of the supervisor tick, and only ever writes gauges.

pub mod network;
pub mod stream;
pub mod system;
