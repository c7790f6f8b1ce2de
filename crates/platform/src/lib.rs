//! Platform layer for the light-field viewer.
//!
//! - Window management via winit
//! - Vulkan surface creation
//! - Keyboard input tracking

mod input;
mod window;

pub use input::{InputState, KeyCode, digit_value};
pub use window::{Surface, Window};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
