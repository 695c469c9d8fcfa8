#[cfg(not(target_arch = "wasm32"))]
pub mod beast;

#[cfg(not(target_arch = "wasm32"))]
pub mod radarcape;
