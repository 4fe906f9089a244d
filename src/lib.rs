pub mod logging;
pub mod particles;
pub mod quality;
pub mod shake;
