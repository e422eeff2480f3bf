//! padlobby daemon: presence tracking of game controllers and the command api.

pub mod api;
pub mod lobby;
pub mod logging;
pub mod presence;
pub mod signals;
