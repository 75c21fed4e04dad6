pub mod lifecycle;
pub mod maintenance;
pub mod payloads;
pub mod technician;

pub use lifecycle::*;
pub use maintenance::*;
pub use payloads::*;
pub use technician::*;
