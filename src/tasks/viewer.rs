//! Windowed viewer driving the displacement scene.
//!
//! All host messages funnel into this task and are applied between frames,
//! so each rendered frame sees one consistent parameter set. The viewer also
//! owns the quilt capture session: while one is active the camera is driven
//! by the capture plan and user orbiting is suspended.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

use crate::camera::OrbitCamera;
use crate::config::Configuration;
use crate::events::{ImageRef, LoadSources, QuiltsComplete, SourcesLoaded, SyncMessage};
use crate::params::RenderParams;
use crate::quilt::{CaptureAdvance, QuiltCapture, QuiltTick};
use crate::render::capture::capture_png;
use crate::render::displace::{DisplacementRenderer, TargetKind};
use crate::upload;

/// Orbit degrees per pixel of mouse drag.
const DRAG_SCALE: f32 = 0.4;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

/// Admits source-pair generations in monotonic order: a result older than
/// the newest applied one is rejected, so a slow fetch never clobbers a
/// newer pair.
#[derive(Debug, Default)]
struct GenerationGate {
    applied: u64,
}

impl GenerationGate {
    fn accept(&mut self, generation: u64) -> bool {
        if generation < self.applied {
            return false;
        }
        self.applied = generation;
        true
    }
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,

    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    renderer: Option<DisplacementRenderer>,

    params: RenderParams,
    camera: OrbitCamera,
    quilt: QuiltCapture,

    api_url: Option<String>,
    sources: Option<(ImageRef, ImageRef)>,
    /// Generation of the newest load request sent out.
    generation: u64,
    /// Gate rejecting source pairs older than the newest applied one.
    source_gate: GenerationGate,
    /// The camera homes once when the first surface appears.
    home_pending: bool,

    dragging: bool,
    cursor: Option<(f64, f64)>,
    last_frame: Option<Instant>,
    pending_redraw: bool,

    sync_rx: mpsc::Receiver<SyncMessage>,
    load_tx: mpsc::Sender<LoadSources>,
    loaded_rx: mpsc::Receiver<SourcesLoaded>,
    complete_tx: mpsc::Sender<QuiltsComplete>,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        cancel: CancellationToken,
        sync_rx: mpsc::Receiver<SyncMessage>,
        load_tx: mpsc::Sender<LoadSources>,
        loaded_rx: mpsc::Receiver<SourcesLoaded>,
        complete_tx: mpsc::Sender<QuiltsComplete>,
    ) -> Self {
        let params = cfg.defaults.to_params();
        let mut camera = OrbitCamera::new(params.camera_fov);
        camera.reset_home(params.depth_strength, params.z_offset);
        let api_url = cfg.api_url.clone();
        Self {
            cfg,
            cancel,
            window: None,
            surface: None,
            surface_config: None,
            device: None,
            queue: None,
            renderer: None,
            params,
            camera,
            quilt: QuiltCapture::default(),
            api_url,
            sources: None,
            generation: 0,
            source_gate: GenerationGate::default(),
            home_pending: true,
            dragging: false,
            cursor: None,
            last_frame: None,
            pending_redraw: false,
            sync_rx,
            load_tx,
            loaded_rx,
            complete_tx,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default().with_title(self.cfg.window_title.clone());
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .unwrap_or(caps.formats[0]);

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured",
        );

        let renderer = DisplacementRenderer::new(&device, format);

        self.surface = Some(surface);
        self.surface_config = Some(config);
        self.device = Some(device);
        self.queue = Some(queue);
        self.renderer = Some(renderer);
        self.pending_redraw = true;
        Ok(())
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let (Some(surface), Some(device), Some(config)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.surface_config.as_mut(),
        ) else {
            return;
        };

        config.width = new_size.width.max(1);
        config.height = new_size.height.max(1);
        surface.configure(device, config);
        debug!(
            width = config.width,
            height = config.height,
            "viewer surface resized",
        );
        self.request_redraw();
    }

    /// Apply everything the other tasks sent since the previous frame.
    fn drain_messages(&mut self) {
        while let Ok(msg) = self.sync_rx.try_recv() {
            self.apply_sync(msg);
        }
        while let Ok(loaded) = self.loaded_rx.try_recv() {
            self.apply_sources(loaded);
        }
    }

    fn apply_sync(&mut self, msg: SyncMessage) {
        match msg {
            SyncMessage::Init { api_url } => {
                info!(%api_url, "sync channel initialized");
                self.api_url = Some(api_url);
            }
            SyncMessage::Update {
                reference_image,
                depth_map,
                params,
            } => {
                self.params.apply_update(&params);
                if let (Some(color), Some(depth)) = (reference_image, depth_map) {
                    self.request_sources(color, depth);
                }
            }
            SyncMessage::ResetView { depth_strength } => {
                // Homes the camera only; the live displacement scale is
                // governed by `update` messages.
                self.camera.reset_home(depth_strength, self.params.z_offset);
            }
            SyncMessage::UpdateZOffset { value } => self.params.z_offset = value,
            SyncMessage::UpdateCameraFov { value } => {
                self.params.camera_fov = value;
                self.camera.fov_deg = value;
            }
            SyncMessage::UpdateQuiltsNum { value } => self.params.quilts_num = value,
            SyncMessage::UpdateQuiltsAngleRange { value } => self.params.quilts_angle_range = value,
            SyncMessage::UpdateScreenshotSize { value } => self.params.screenshot_size = value,
            SyncMessage::ToggleQuilts => self.toggle_quilts(),
            SyncMessage::Screenshot => self.take_screenshot(),
        }
        self.request_redraw();
    }

    fn request_sources(&mut self, color: ImageRef, depth: ImageRef) {
        if !color.is_supported() || !depth.is_supported() {
            debug!(
                color = %color.filename,
                depth = %depth.filename,
                "unsupported image reference; keeping current sources"
            );
            return;
        }
        // Scalar-only refresh: same pair, nothing to reload.
        if self.sources.as_ref() == Some(&(color.clone(), depth.clone())) {
            return;
        }
        let Some(api_url) = self.api_url.clone() else {
            warn!("image references received before init; cannot resolve them");
            return;
        };

        self.generation += 1;
        let request = LoadSources {
            api_url,
            reference_image: color.clone(),
            depth_map: depth.clone(),
            generation: self.generation,
        };
        match self.load_tx.try_send(request) {
            Ok(()) => {
                self.sources = Some((color, depth));
            }
            Err(err) => warn!(error = %err, "image load queue full; dropping request"),
        }
    }

    fn apply_sources(&mut self, loaded: SourcesLoaded) {
        if !self.source_gate.accept(loaded.generation) {
            debug!(
                generation = loaded.generation,
                "dropping stale source pair"
            );
            return;
        }
        let (Some(device), Some(queue), Some(renderer)) = (
            self.device.as_ref(),
            self.queue.as_ref(),
            self.renderer.as_mut(),
        ) else {
            return;
        };

        renderer.set_sources(device, queue, &loaded.color, &loaded.depth);
        info!(
            width = loaded.color.width,
            height = loaded.color.height,
            generation = loaded.generation,
            "displaced surface rebuilt"
        );
        if self.home_pending {
            self.camera
                .reset_home(self.params.depth_strength, self.params.z_offset);
            self.home_pending = false;
        }
        self.request_redraw();
    }

    fn toggle_quilts(&mut self) {
        if self.quilt.is_active() {
            let batch = self.quilt.stop();
            info!(frames = batch.len(), "quilt capture stopped early");
            // A session with no captured frames ends silently.
            if !batch.is_empty() {
                self.send_complete(batch);
            }
            return;
        }
        match self
            .quilt
            .start(self.params.quilts_num, self.params.quilts_angle_range)
        {
            Ok(first_heading) => {
                info!(
                    frames = self.params.quilts_num,
                    range = self.params.quilts_angle_range,
                    size = self.params.screenshot_size,
                    "quilt capture started"
                );
                self.dragging = false;
                self.camera.set_heading_deg(first_heading);
            }
            Err(err) => warn!(error = %err, "quilt capture not started"),
        }
    }

    fn send_complete(&mut self, imgs: Vec<String>) {
        let batch = QuiltsComplete {
            imgs,
            id: self.cfg.viewer_id.clone(),
        };
        if let Err(err) = self.complete_tx.try_send(batch) {
            warn!(error = %err, "unable to hand off quilt batch");
        }
    }

    /// Render the scene offscreen at the configured screenshot size.
    fn capture_current(&mut self) -> Result<Vec<u8>> {
        let (Some(device), Some(queue), Some(renderer)) = (
            self.device.as_ref(),
            self.queue.as_ref(),
            self.renderer.as_mut(),
        ) else {
            anyhow::bail!("GPU not initialized");
        };
        capture_png(
            device,
            queue,
            renderer,
            &self.camera,
            &self.params,
            self.params.screenshot_size,
        )
    }

    fn take_screenshot(&mut self) {
        let png = match self.capture_current() {
            Ok(png) => png,
            Err(err) => {
                error!(error = ?err, "screenshot capture failed");
                return;
            }
        };
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = format!("screenshot-{stamp}.png");
        match std::fs::write(&path, &png) {
            Ok(()) => info!(%path, "screenshot saved"),
            Err(err) => error!(%path, error = %err, "failed to write screenshot"),
        }
    }

    /// Advance the capture session by one frame's wall-clock delta.
    fn advance_quilt(&mut self, dt: Duration) {
        match self.quilt.tick(dt) {
            Some(QuiltTick::Rotating { heading_deg }) => {
                self.camera.set_heading_deg(heading_deg);
            }
            Some(QuiltTick::CaptureDue { index, heading_deg }) => {
                self.camera.set_heading_deg(heading_deg);
                match self.capture_current() {
                    Ok(png) => {
                        let uri = upload::encode_data_uri(&png);
                        match self.quilt.record_captured(uri) {
                            Some(CaptureAdvance::Finished(batch)) => {
                                info!(frames = batch.len(), "quilt capture complete");
                                self.send_complete(batch);
                            }
                            Some(CaptureAdvance::NextLeg) => {
                                debug!(index, heading = heading_deg, "quilt frame captured");
                            }
                            None => {}
                        }
                    }
                    Err(err) => {
                        error!(error = ?err, "quilt frame capture failed; aborting session");
                        let batch = self.quilt.stop();
                        if !batch.is_empty() {
                            self.send_complete(batch);
                        }
                    }
                }
            }
            None => {}
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        self.drain_messages();

        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now.duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_frame = Some(now);

        if self.quilt.is_active() {
            self.advance_quilt(dt);
        } else {
            self.camera.update();
        }

        let (Some(surface), Some(device), Some(queue), Some(config), Some(window)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.queue.as_ref(),
            self.surface_config.as_ref(),
            self.window.as_ref().map(|w| w.as_ref()),
        ) else {
            return;
        };
        let window_size = window.inner_size();

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                self.handle_resize(window_size);
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                self.handle_resize(window_size);
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("viewer-encoder"),
        });

        let size = (config.width, config.height);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render(
                device,
                queue,
                &mut encoder,
                &view,
                size,
                TargetKind::Surface,
                &self.camera,
                &self.params,
                !self.quilt.is_active(),
            );
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        // The damped orbit and capture legs animate continuously; keep the
        // loop vsync-paced rather than event-driven.
        self.pending_redraw = true;
    }

    fn request_redraw(&mut self) {
        self.pending_redraw = true;
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.device.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                // The capture plan owns the camera while a session runs.
                self.dragging = state == ElementState::Pressed && !self.quilt.is_active();
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                if self.dragging && !self.quilt.is_active() {
                    if let Some((last_x, last_y)) = self.cursor {
                        let dx = (current.0 - last_x) as f32;
                        let dy = (current.1 - last_y) as f32;
                        self.camera.apply_drag(-dx * DRAG_SCALE, -dy * DRAG_SCALE);
                        self.request_redraw();
                    }
                }
                self.cursor = Some(current);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.pending_redraw {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }
}

pub fn run_windowed(
    cfg: Configuration,
    cancel: CancellationToken,
    sync_rx: mpsc::Receiver<SyncMessage>,
    load_tx: mpsc::Sender<LoadSources>,
    loaded_rx: mpsc::Receiver<SourcesLoaded>,
    complete_tx: mpsc::Sender<QuiltsComplete>,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, sync_rx, load_tx, loaded_rx, complete_tx);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("viewer event loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> (ViewerApp, mpsc::Receiver<QuiltsComplete>) {
        let (_sync_tx, sync_rx) = mpsc::channel(4);
        let (load_tx, _load_rx) = mpsc::channel(4);
        let (_loaded_tx, loaded_rx) = mpsc::channel(4);
        let (complete_tx, complete_rx) = mpsc::channel(4);
        let app = ViewerApp::new(
            Configuration::default(),
            CancellationToken::new(),
            sync_rx,
            load_tx,
            loaded_rx,
            complete_tx,
        );
        (app, complete_rx)
    }

    #[test]
    fn stop_without_captured_frames_emits_nothing() {
        let (mut app, mut complete_rx) = test_app();

        app.apply_sync(SyncMessage::ToggleQuilts);
        assert!(app.quilt.is_active());

        // Stop again before any frame was captured.
        app.apply_sync(SyncMessage::ToggleQuilts);
        assert!(!app.quilt.is_active());
        assert!(
            complete_rx.try_recv().is_err(),
            "an empty session must not produce a batch"
        );
    }

    #[test]
    fn stop_after_captured_frames_emits_partial_batch() {
        let (mut app, mut complete_rx) = test_app();

        app.apply_sync(SyncMessage::ToggleQuilts);
        match app.quilt.tick(Duration::ZERO) {
            Some(QuiltTick::CaptureDue { index: 0, .. }) => {
                app.quilt.record_captured("frame-0".into());
            }
            other => panic!("expected first capture, got {other:?}"),
        }

        app.apply_sync(SyncMessage::ToggleQuilts);
        let batch = complete_rx.try_recv().expect("partial batch");
        assert_eq!(batch.imgs, vec!["frame-0"]);
        assert_eq!(batch.id, "0");
    }

    #[test]
    fn reset_view_homes_without_touching_depth_strength() {
        let (mut app, _complete_rx) = test_app();
        let before = app.params.depth_strength;

        app.apply_sync(SyncMessage::ResetView {
            depth_strength: 0.25,
        });

        assert_eq!(app.params.depth_strength, before);
        assert_eq!(app.camera.position.x, 0.0);
        assert_eq!(app.camera.position.y, 0.0);
        // The payload, not the live parameter, drives the home distance.
        let mut expected = OrbitCamera::new(app.params.camera_fov);
        expected.reset_home(0.25, app.params.z_offset);
        assert!((app.camera.position.z - expected.position.z).abs() < 1e-5);
    }

    #[test]
    fn stale_generations_are_rejected() {
        let mut gate = GenerationGate::default();
        assert!(gate.accept(1));
        assert!(gate.accept(3));
        // A slower, older fetch must not displace the newer pair.
        assert!(!gate.accept(2));
        // Re-delivery of the applied generation stays accepted.
        assert!(gate.accept(3));
        assert!(gate.accept(4));
    }
}
