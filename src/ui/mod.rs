// UI module - Slint window, controller and event loop bridge
//
// - EventLoopBridge: hands work between the tokio runtime and the Slint event loop
// - GuiController: wires the window to state and the model runner
// - image_display: scales generated images for the canvas

pub mod bridge;
pub mod controller;
pub mod image_display;

pub use bridge::{EventLoopBridge, EventLoopBridgeHandle};
pub use controller::GuiController;
