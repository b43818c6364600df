//! Host environment checks: graphics capability and the display surface

use crate::error::StartupError;

/// Reports whether the host can provide GPU access at all
pub trait GraphicsProbe {
    fn graphics_available(&self) -> bool;
}

/// Probe for the environment the crate is running in
///
/// On the web this checks for `navigator.gpu`. Natively it checks that wgpu
/// was built with at least one backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostProbe;

impl GraphicsProbe for HostProbe {
    #[cfg(target_arch = "wasm32")]
    fn graphics_available(&self) -> bool {
        let Some(window) = web_sys::window() else {
            return false;
        };
        js_sys::Reflect::get(&window.navigator(), &"gpu".into())
            .map(|gpu| !gpu.is_undefined() && !gpu.is_null())
            .unwrap_or(false)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn graphics_available(&self) -> bool {
        !wgpu::Instance::enabled_backend_features().is_empty()
    }
}

/// Fail fast when no graphics capability is present
pub fn ensure_graphics(probe: &impl GraphicsProbe) -> Result<(), StartupError> {
    if probe.graphics_available() {
        log::info!("WebGPU enabled");
        Ok(())
    } else {
        Err(StartupError::GraphicsUnsupported)
    }
}

/// Find the canvas to draw on: the element with `id`, or the first `<canvas>`
#[cfg(target_arch = "wasm32")]
pub fn find_canvas(id: Option<&str>) -> Result<web_sys::HtmlCanvasElement, StartupError> {
    use wasm_bindgen::JsCast;

    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or(StartupError::NoCanvas)?;
    let element = match id {
        Some(id) => document.get_element_by_id(id),
        None => document.query_selector("canvas").ok().flatten(),
    };
    element
        .ok_or(StartupError::NoCanvas)?
        .dyn_into()
        .map_err(|_| StartupError::NoCanvas)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FixedProbe {
        available: bool,
        calls: Cell<u32>,
    }

    impl GraphicsProbe for FixedProbe {
        fn graphics_available(&self) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.available
        }
    }

    #[test]
    fn missing_graphics_is_fatal() {
        let probe = FixedProbe {
            available: false,
            calls: Cell::new(0),
        };
        let err = ensure_graphics(&probe).unwrap_err();
        assert!(matches!(err, StartupError::GraphicsUnsupported));
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn available_graphics_passes() {
        let probe = FixedProbe {
            available: true,
            calls: Cell::new(0),
        };
        assert!(ensure_graphics(&probe).is_ok());
    }
}
