//! Overlay window implementation
//!
//! Hosts one [`CaptureSession`] in a topmost popup spanning the virtual
//! desktop. The session (and with it the snapshot) is created before the
//! window exists, so the overlay never appears in its own capture.

use crate::{
    outcome_channel,
    render::{Frame, Guides, Notice, OverlayRenderer, PixelOrder, Spotlight},
    session::{CaptureSession, Key, OverlayEvent, OverlayOptions, PointerButton, Reaction},
    CancelReason, CaptureOutcome, OverlayResult,
};
use desktop::{DisplayService, Point, Rect};
use image::RgbaImage;
use std::cell::RefCell;
use std::mem::size_of;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, RECT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreatePen, CreateSolidBrush, DeleteObject, EndPaint, FillRect, GetStockObject,
    GetTextExtentPoint32W, InvalidateRect, LineTo, MoveToEx, Rectangle, SelectObject, SetBkMode,
    SetDIBitsToDevice, SetTextColor, TextOutW, UpdateWindow, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS, HDC, NULL_BRUSH, PAINTSTRUCT, PS_DOT, PS_SOLID, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{ReleaseCapture, SetCapture};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, LoadCursorW,
    PostMessageW, RegisterClassExW, SetForegroundWindow, ShowWindow, TranslateMessage, CS_HREDRAW,
    CS_VREDRAW, IDC_CROSS, MSG, SW_HIDE, SW_SHOW, WM_APP, WM_CLOSE, WM_DESTROY, WM_DISPLAYCHANGE,
    WM_ERASEBKGND, WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE, WM_PAINT, WNDCLASSEXW,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_POPUP,
};

/// Posted instead of showing the window when the snapshot failed
const WM_DEFERRED_CANCEL: u32 = WM_APP + 1;

thread_local! {
    static OVERLAY_STATE: RefCell<Option<Box<OverlayState>>> = RefCell::new(None);
}

struct OverlayState {
    session: CaptureSession,
    renderer: OverlayRenderer,
}

/// Overlay window for region selection
pub struct OverlayWindow;

impl OverlayWindow {
    const CLASS_NAME: PCWSTR = w!("TexsnipOverlay");

    /// Run one capture session and return its outcome.
    ///
    /// Blocks on a nested message loop; call from the UI thread. Host
    /// failures are logged and end the session as cancelled.
    pub fn show(service: &dyn DisplayService, options: &OverlayOptions) -> CaptureOutcome {
        let (outcome_tx, outcome_rx) = outcome_channel();

        // Snapshot first, before any window of ours is on screen
        let session = CaptureSession::new(service, options.clone(), outcome_tx);
        let bounds = session.geometry().bounds();
        let interactive = session.is_interactive();

        OVERLAY_STATE.with(|s| {
            *s.borrow_mut() = Some(Box::new(OverlayState {
                session,
                renderer: OverlayRenderer::new(options.style).with_order(PixelOrder::Bgra),
            }));
        });

        if let Err(err) = unsafe { Self::run(bounds, interactive) } {
            log::warn!("Overlay window failed: {}", err);
        }

        // Whatever stopped the loop, the session reports exactly once
        OVERLAY_STATE.with(|s| {
            if let Some(mut state) = s.borrow_mut().take() {
                state.session.abandon();
            }
        });

        outcome_rx
            .try_recv()
            .unwrap_or(CaptureOutcome::Cancelled(CancelReason::SurfaceClosed))
    }

    unsafe fn run(bounds: Rect, interactive: bool) -> OverlayResult<()> {
        let hmodule = GetModuleHandleW(None)?;
        let hinstance = HINSTANCE(hmodule.0);

        let wc = WNDCLASSEXW {
            cbSize: size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(Self::wnd_proc),
            hInstance: hinstance,
            hCursor: LoadCursorW(None, IDC_CROSS)?,
            lpszClassName: Self::CLASS_NAME,
            ..Default::default()
        };

        // Fails harmlessly when the class is already registered
        RegisterClassExW(&wc);

        let hwnd = CreateWindowExW(
            WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
            Self::CLASS_NAME,
            w!("texsnip"),
            WS_POPUP,
            bounds.x,
            bounds.y,
            bounds.width.max(1) as i32,
            bounds.height.max(1) as i32,
            None,
            None,
            hinstance,
            None,
        )?;

        if interactive {
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = SetForegroundWindow(hwnd);
            let _ = UpdateWindow(hwnd);
        } else if PostMessageW(hwnd, WM_DEFERRED_CANCEL, WPARAM(0), LPARAM(0)).is_err() {
            // Construction is over; deliver the failure directly
            Self::dispatch(hwnd, |state| state.session.dispatch_deferred());
        }

        let mut msg = MSG::default();
        while !Self::is_finished() {
            let ret = GetMessageW(&mut msg, None, 0, 0);
            if ret.0 <= 0 {
                break;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        let _ = DestroyWindow(hwnd);
        Ok(())
    }

    fn is_finished() -> bool {
        OVERLAY_STATE.with(|s| {
            s.borrow()
                .as_ref()
                .map_or(true, |state| state.session.is_finished())
        })
    }

    /// Run `f` against the session, then act on its reaction outside the borrow.
    unsafe fn dispatch(hwnd: HWND, f: impl FnOnce(&mut OverlayState) -> Reaction) {
        let reaction = OVERLAY_STATE.with(|s| s.borrow_mut().as_mut().map(|state| f(state)));

        match reaction {
            Some(Reaction::Redraw) => {
                let _ = InvalidateRect(hwnd, None, false);
            }
            Some(Reaction::Finished) => {
                let _ = ReleaseCapture();
                let _ = ShowWindow(hwnd, SW_HIDE);
            }
            Some(Reaction::Ignored) | None => {}
        }
    }

    unsafe extern "system" fn wnd_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_PAINT => {
                Self::paint(hwnd);
                LRESULT(0)
            }

            // Every paint covers the whole client area
            WM_ERASEBKGND => LRESULT(1),

            WM_LBUTTONDOWN => {
                SetCapture(hwnd);
                let position = point_from_lparam(lparam);
                Self::dispatch(hwnd, |state| {
                    state.session.handle(OverlayEvent::PointerDown {
                        position,
                        button: PointerButton::Primary,
                    })
                });
                LRESULT(0)
            }

            WM_MOUSEMOVE => {
                let position = point_from_lparam(lparam);
                Self::dispatch(hwnd, |state| state.session.handle(OverlayEvent::PointerMove { position }));
                LRESULT(0)
            }

            WM_LBUTTONUP => {
                let _ = ReleaseCapture();
                let position = point_from_lparam(lparam);
                Self::dispatch(hwnd, |state| {
                    state.session.handle(OverlayEvent::PointerUp {
                        position,
                        button: PointerButton::Primary,
                    })
                });
                LRESULT(0)
            }

            WM_KEYDOWN => {
                const VK_ESCAPE: usize = 0x1B;

                let key = if wparam.0 == VK_ESCAPE { Key::Escape } else { Key::Other };
                Self::dispatch(hwnd, |state| state.session.handle(OverlayEvent::KeyDown(key)));
                LRESULT(0)
            }

            WM_DISPLAYCHANGE => {
                Self::dispatch(hwnd, |state| state.session.invalidate_snapshot());
                LRESULT(0)
            }

            WM_DEFERRED_CANCEL => {
                Self::dispatch(hwnd, |state| state.session.dispatch_deferred());
                LRESULT(0)
            }

            WM_CLOSE => {
                Self::dispatch(hwnd, |state| state.session.handle(OverlayEvent::Closed));
                LRESULT(0)
            }

            WM_DESTROY => LRESULT(0),

            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }

    unsafe fn paint(hwnd: HWND) {
        let mut ps = PAINTSTRUCT::default();
        let hdc = BeginPaint(hwnd, &mut ps);

        OVERLAY_STATE.with(|s| {
            if let Some(state) = s.borrow_mut().as_mut() {
                let OverlayState { session, renderer } = &mut **state;
                draw_frame(hdc, &renderer.render(session));
            }
        });

        let _ = EndPaint(hwnd, &ps);
    }
}

fn point_from_lparam(lparam: LPARAM) -> Point {
    let x = (lparam.0 & 0xFFFF) as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
    Point::new(x, y)
}

fn colorref(color: [u8; 4]) -> COLORREF {
    COLORREF(u32::from(color[0]) | u32::from(color[1]) << 8 | u32::from(color[2]) << 16)
}

unsafe fn draw_frame(hdc: HDC, frame: &Frame) {
    match *frame {
        Frame::Desktop {
            layers,
            spotlight,
            guides,
        } => {
            let (width, height) = layers.dimensions();
            blit(hdc, layers.dimmed(), Rect::new(0, 0, width, height));

            if let Some(spot) = spotlight {
                blit(hdc, layers.clear(), spot.rect);
                draw_border(hdc, spot);
            }
            if let Some(guides) = guides {
                draw_guides(hdc, guides, width as i32, height as i32);
            }
        }
        Frame::Failure {
            width,
            height,
            fill,
            notice,
        } => {
            let brush = CreateSolidBrush(colorref(fill));
            let area = RECT {
                left: 0,
                top: 0,
                right: width as i32,
                bottom: height as i32,
            };
            FillRect(hdc, &area, brush);
            let _ = DeleteObject(brush);

            draw_notice(hdc, &notice, width as i32, height as i32);
        }
    }
}

/// Copy `rect` of a BGRA layer to the same place on the surface
unsafe fn blit(hdc: HDC, layer: &RgbaImage, rect: Rect) {
    if rect.is_empty() {
        return;
    }

    // Only the rows of `rect` go to GDI, so the source origin is row 0
    let stride = layer.width() as usize * 4;
    let rows = &layer.as_raw()[rect.y as usize * stride..rect.bottom() as usize * stride];

    let bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: layer.width() as i32,
            biHeight: -(rect.height as i32), // Top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            biSizeImage: 0,
            biXPelsPerMeter: 0,
            biYPelsPerMeter: 0,
            biClrUsed: 0,
            biClrImportant: 0,
        },
        bmiColors: [Default::default()],
    };

    SetDIBitsToDevice(
        hdc,
        rect.x,
        rect.y,
        rect.width,
        rect.height,
        rect.x,
        0,
        0,
        rect.height,
        rows.as_ptr() as *const _,
        &bmi,
        DIB_RGB_COLORS,
    );
}

unsafe fn draw_border(hdc: HDC, spot: Spotlight) {
    let pen = CreatePen(PS_SOLID, 1, colorref(spot.border));
    let old_pen = SelectObject(hdc, pen);
    let old_brush = SelectObject(hdc, GetStockObject(NULL_BRUSH));

    // Outline pixels run from left to right - 1
    let rect = spot.rect;
    let _ = Rectangle(hdc, rect.x - 1, rect.y - 1, rect.right() + 1, rect.bottom() + 1);

    SelectObject(hdc, old_brush);
    SelectObject(hdc, old_pen);
    let _ = DeleteObject(pen);
}

unsafe fn draw_guides(hdc: HDC, guides: Guides, width: i32, height: i32) {
    let style = if guides.dotted { PS_DOT } else { PS_SOLID };
    let pen = CreatePen(style, 1, colorref(guides.color));
    let old_pen = SelectObject(hdc, pen);
    // Gaps between dots show the backdrop
    SetBkMode(hdc, TRANSPARENT);

    let (x, y) = (guides.x as i32, guides.y as i32);
    let _ = MoveToEx(hdc, 0, y, None);
    let _ = LineTo(hdc, width, y);
    let _ = MoveToEx(hdc, x, 0, None);
    let _ = LineTo(hdc, x, height);

    SelectObject(hdc, old_pen);
    let _ = DeleteObject(pen);
}

unsafe fn draw_notice(hdc: HDC, notice: &Notice, width: i32, height: i32) {
    let text: Vec<u16> = notice.text.encode_utf16().collect();

    SetBkMode(hdc, TRANSPARENT);
    SetTextColor(hdc, colorref(notice.color));

    let mut extent = SIZE::default();
    let _ = GetTextExtentPoint32W(hdc, &text, &mut extent);

    let _ = TextOutW(
        hdc,
        (width - extent.cx).max(0) / 2,
        (height - extent.cy).max(0) / 2,
        &text,
    );
}
