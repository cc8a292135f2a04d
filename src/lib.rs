//! A headless automation engine for IBM i 5250 terminal sessions over
//! TN5250E: connect, negotiate, read the presentation space, drive it with
//! keystrokes, and wait on search predicates, with an evidence trail of
//! everything a script did.

pub mod codec;
pub mod config;
pub mod error;
pub mod evidence;
pub mod field;
pub mod keys;
pub mod oia;
pub mod pool;
pub mod producer;
pub mod screen;
pub mod session;
pub mod transport;
pub mod vt;
pub mod wait;

pub use config::{EngineConfig, QueuePolicy, ScreenSize, SessionConfig, SslType};
pub use error::{TermError, TermResult};
pub use keys::{Aid, KeyAction};
pub use oia::Oia;
pub use pool::SessionPool;
pub use session::{
    CancellationToken, ScreenSnapshot, Session, SessionChangeEvent, SessionConfigEvent,
    SessionListener, SessionState,
};
pub use wait::{Region, WaitPredicate};
