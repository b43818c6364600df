use std::sync::Arc;

use wasm_bindgen::prelude::*;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{WindowAttributes, WindowId},
};

#[cfg(target_arch = "wasm32")]
use winit::platform::web::WindowAttributesExtWebSys;

use crate::{
    cells::StateCycle,
    config::GridConfig,
    error::StartupError,
    gpu::{FrameOutcome, GridRenderer},
};

pub mod cells;
pub mod config;
pub mod error;
pub mod gpu;
pub mod host;
pub mod rendering;
#[cfg(not(target_arch = "wasm32"))]
pub mod timer;
pub mod util;

/// Events posted into the event loop from startup and the redraw timer
pub enum GridMessage {
    Initialized(GridRenderer),
    Failed(StartupError),
    Tick,
}

struct Application {
    config: GridConfig,
    proxy: Option<EventLoopProxy<GridMessage>>,
    renderer: Option<GridRenderer>,
    cycle: StateCycle,
    /// Set when startup failed; the event loop exits after storing it
    fatal: Option<StartupError>,
    #[cfg(target_arch = "wasm32")]
    interval: Option<gloo_timers::callback::Interval>,
    #[cfg(not(target_arch = "wasm32"))]
    ticker: Option<timer::Ticker>,
}

impl Application {
    fn new(event_loop: &EventLoop<GridMessage>, config: GridConfig) -> Self {
        Self {
            config,
            proxy: Some(event_loop.create_proxy()),
            renderer: None,
            cycle: StateCycle::new(),
            fatal: None,
            #[cfg(target_arch = "wasm32")]
            interval: None,
            #[cfg(not(target_arch = "wasm32"))]
            ticker: None,
        }
    }

    fn window_attributes(&self) -> Result<WindowAttributes, StartupError> {
        #[cfg(target_arch = "wasm32")]
        {
            let canvas = host::find_canvas(self.config.canvas_id.as_deref())?;
            Ok(WindowAttributes::default().with_canvas(Some(canvas)))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let title = format!("gridcells: {}", self.config.stage);
            Ok(WindowAttributes::default()
                .with_title(title)
                .with_resizable(false))
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: StartupError) {
        log::error!("{error}");
        self.fatal = Some(error);
        event_loop.exit();

        #[cfg(target_arch = "wasm32")]
        if let Some(error) = &self.fatal {
            wasm_bindgen::throw_str(&error.to_string());
        }
    }

    /// Start the fixed-period redraw timer for animated stages
    fn start_timer(&mut self) {
        if !self.config.stage.is_animated() {
            return;
        }
        let period = self.config.update_interval;
        log::info!("Redrawing every {}", humantime::format_duration(period));

        #[cfg(target_arch = "wasm32")]
        if let Some(proxy) = self.proxy.clone() {
            let millis = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
            self.interval = Some(gloo_timers::callback::Interval::new(millis, move || {
                let _ = proxy.send_event(GridMessage::Tick);
            }));
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            self.ticker = Some(timer::Ticker::new(period, std::time::Instant::now()));
        }
    }

    fn tick(&mut self) {
        let phase = self.cycle.advance();
        log::debug!("tick {}: drawing state {phase:?}", self.cycle.step());
        if let Some(ref renderer) = self.renderer {
            renderer.request_redraw();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(ref mut renderer) = self.renderer else {
            return;
        };
        match gpu::present_frame(renderer, self.cycle.phase()) {
            FrameOutcome::Presented | FrameOutcome::Skipped => {}
            FrameOutcome::OutOfMemory => {
                log::error!("Out of memory!");
                event_loop.exit();
            }
        }
    }
}

impl ApplicationHandler<GridMessage> for Application {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        let Some(proxy) = self.proxy.clone() else {
            return;
        };

        let window = match self
            .window_attributes()
            .and_then(|attrs| event_loop.create_window(attrs).map_err(StartupError::from))
        {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e),
        };
        let config = self.config.clone();

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(async move {
            let message = match GridRenderer::new(window, &config).await {
                Ok(renderer) => GridMessage::Initialized(renderer),
                Err(e) => GridMessage::Failed(e),
            };
            let _ = proxy.send_event(message);
        });

        #[cfg(not(target_arch = "wasm32"))]
        {
            // On native, use pollster to block on the future
            let message = match pollster::block_on(GridRenderer::new(window, &config)) {
                Ok(renderer) => GridMessage::Initialized(renderer),
                Err(e) => GridMessage::Failed(e),
            };
            let _ = proxy.send_event(message);
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, _cause: winit::event::StartCause) {
        let fired = self
            .ticker
            .as_mut()
            .is_some_and(|ticker| ticker.poll(std::time::Instant::now()));
        if fired {
            self.tick();
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(ref ticker) = self.ticker {
            event_loop.set_control_flow(winit::event_loop::ControlFlow::WaitUntil(
                ticker.deadline(),
            ));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.renderer = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                    renderer.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => (),
        };
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: GridMessage) {
        match event {
            GridMessage::Initialized(renderer) => {
                log::info!("Renderer initialized for the {} stage", renderer.stage());
                renderer.request_redraw();
                self.renderer = Some(renderer);
                self.start_timer();
            }
            GridMessage::Failed(e) => self.fail(event_loop, e),
            GridMessage::Tick => self.tick(),
        }
    }
}

#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();
    let _ = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(fern::Output::call(console_log::log))
        .apply();
}

/// Start drawing the given stage on the page's canvas
///
/// `stage` is one of `clear`, `square`, `grid` or `cells`.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start(stage: &str) -> Result<(), JsValue> {
    use winit::platform::web::EventLoopExtWebSys;

    let stage: config::Stage = stage
        .parse()
        .map_err(|e: error::ParseStageError| JsValue::from_str(&e.to_string()))?;
    let config = GridConfig::for_stage(stage);
    config
        .validate()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    log::info!("Starting the {stage} stage");

    let event_loop = EventLoop::<GridMessage>::with_user_event()
        .build()
        .map_err(|e| JsValue::from_str(&format!("Failed to create event loop: {e}")))?;
    let app = Application::new(&event_loop, config);
    event_loop.spawn_app(app);
    Ok(())
}

/// Run the renderer in a native window until it is closed
///
/// Returns the startup error if the renderer could not be brought up.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: GridConfig) -> anyhow::Result<()> {
    use anyhow::Context;

    config.validate()?;
    log::info!("Starting the {} stage", config.stage);

    let event_loop = EventLoop::<GridMessage>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let mut app = Application::new(&event_loop, config);
    event_loop.run_app(&mut app).context("event loop error")?;

    match app.fatal.take() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
