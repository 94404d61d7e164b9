pub mod enums;
pub mod author;
pub mod bundle;
pub mod citation;
pub mod paper;

pub use author::*;
pub use bundle::*;
pub use citation::*;
pub use enums::*;
pub use paper::*;
