pub mod attention;
pub mod window;

pub use attention::{AttentionEvent, EventKind, Mode, Snapshot};
pub use window::WindowInfo;
