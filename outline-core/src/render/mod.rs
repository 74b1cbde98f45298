pub mod backend;
pub mod framebuffer;
pub mod material;
pub mod outline;
pub mod post;

pub mod mesh;
