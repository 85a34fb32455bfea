// HTTP routes
pub mod direct_link;
pub mod extract;
pub mod harvest;
pub mod health;
pub mod image_proxy;

pub use direct_link::*;
pub use extract::*;
pub use harvest::*;
pub use health::*;
pub use image_proxy::*;
