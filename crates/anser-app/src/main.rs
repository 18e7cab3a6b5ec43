use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use anser_gfx::error::GfxError;
use anser_gfx::foundation::instance::GfxInstance;
use anser_gfx::gfx_context::GfxContext;
use anser_gfx::resources::image::GfxImageDesc;
use anser_gfx::swapchain::surface::Surface;
use anser_render::render_context::RenderContext;

const APP_TITLE: &str = "anser sandbox";
const WINDOW_EXTENT: [f64; 2] = [1200.0, 800.0];

/// 清屏 + blit 的最小渲染负载
struct SandboxRenderer {
    gfx: GfxContext,
    surface: Surface,
    render_ctx: RenderContext,

    /// 离屏渲染目标，归 cleanup stack 所有，这里只留 handle
    draw_image: vk::Image,
    draw_extent: vk::Extent2D,

    frame_number: u64,

    /// 最近一次 Resized 事件报告的窗口尺寸
    window_extent: vk::Extent2D,
    resize_requested: bool,
}

// 创建与销毁
impl SandboxRenderer {
    fn new(window: &Window) -> Result<Self, GfxError> {
        let display_handle = window.display_handle().unwrap().as_raw();
        let window_handle = window.window_handle().unwrap().as_raw();

        let vk_entry = GfxContext::load_entry()?;
        let surface_exts = ash_window::enumerate_required_extensions(display_handle)?;
        let instance = GfxInstance::new(&vk_entry, APP_TITLE, surface_exts)?;
        let surface = Surface::new(&vk_entry, instance.ash_instance(), display_handle, window_handle)?;
        let gfx = GfxContext::new(vk_entry, instance, &surface)?;

        let size = window.inner_size();
        let window_extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };
        let mut render_ctx = RenderContext::new(&gfx, &surface, window_extent)?;

        // 每帧先画到离屏 image，再 blit 到 swapchain；
        // 窗口尺寸变化时无需重建，blit 会做缩放
        let draw_image = GfxImageDesc::new_2d(render_ctx.frame_extent(), vk::Format::R16G16B16A16_SFLOAT)
            .add_usage(
                vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            )
            .build(gfx.device().clone(), gfx.allocator(), "draw-image")?;

        let draw_handle = draw_image.vk_handle();
        let draw_extent = draw_image.extent();
        render_ctx.add_cleanup(move |gfx| draw_image.destroy(gfx.allocator()));

        Ok(Self {
            gfx,
            surface,
            render_ctx,
            draw_image: draw_handle,
            draw_extent,
            frame_number: 0,
            window_extent,
            resize_requested: false,
        })
    }

    fn destroy(self) {
        self.render_ctx.destroy(&self.gfx);
        self.surface.destroy();
        self.gfx.destroy();
    }
}

// 帧循环
impl SandboxRenderer {
    fn on_resize(&mut self, new_extent: vk::Extent2D) {
        self.window_extent = new_extent;
        self.resize_requested = true;
    }

    fn draw(&mut self) {
        if self.resize_requested {
            // 最小化时尺寸为 0，等窗口恢复后再重建
            if self.window_extent.width == 0 || self.window_extent.height == 0 {
                return;
            }
            self.render_ctx.resize(&self.gfx, &self.surface, self.window_extent).unwrap();
            self.resize_requested = false;
        }

        let frame = match self.render_ctx.begin_frame() {
            Ok(frame) => frame,
            Err(GfxError::SwapchainStale) => {
                self.resize_requested = true;
                return;
            }
            Err(e) => panic!("begin_frame failed: {e}"),
        };

        let flash = (self.frame_number as f32 / 120.0).sin().abs();
        let clear_value = vk::ClearColorValue {
            float32: [0.0, 0.0, flash, 1.0],
        };

        frame.cmd.transition_image(self.draw_image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL);
        frame.cmd.clear_color_image(self.draw_image, clear_value);
        frame.cmd.transition_image(
            self.draw_image,
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        );

        frame.cmd.transition_image(frame.image, vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        frame.cmd.blit_image_to_image(self.draw_image, frame.image, self.draw_extent, frame.extent);
        frame.cmd.transition_image(
            frame.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );

        match self.render_ctx.end_frame() {
            Ok(()) => {}
            Err(GfxError::SwapchainStale) => self.resize_requested = true,
            Err(e) => panic!("end_frame failed: {e}"),
        }

        self.frame_number += 1;
    }
}

struct WinitApp {
    renderer: Option<SandboxRenderer>,
    window: Option<Window>,
}

impl ApplicationHandler for WinitApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        assert!(self.window.is_none(), "window should be None when resumed.");
        log::info!("winit event: resumed");

        let window_attr = Window::default_attributes()
            .with_title(APP_TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(WINDOW_EXTENT[0], WINDOW_EXTENT[1]));
        let window = event_loop.create_window(window_attr).unwrap();

        match SandboxRenderer::new(&window) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => {
                log::error!("renderer init failed: {e}");
                event_loop.exit();
                return;
            }
        }
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                renderer.on_resize(vk::Extent2D {
                    width: size.width,
                    height: size.height,
                });
            }
            WindowEvent::RedrawRequested => {
                renderer.draw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}

fn main() {
    anser_utils::init_log::init_log();

    let event_loop = EventLoop::new().unwrap();
    let mut app = WinitApp {
        renderer: None,
        window: None,
    };
    event_loop.run_app(&mut app).unwrap();

    if let Some(renderer) = app.renderer.take() {
        renderer.destroy();
    }
    log::info!("end run.");
}
