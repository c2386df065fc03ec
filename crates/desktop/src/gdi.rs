//! Display enumeration and desktop capture using GDI
//!
//! Monitor rectangles come in the caller's DPI-virtualized coordinates. The
//! pixel ratio compares them with the monitor's current display mode, so a
//! per-monitor aware process sees 1.0 everywhere.

use crate::{scale_between, DesktopError, DesktopResult, DisplayInfo, DisplayService, Rect};
use image::RgbaImage;
use std::mem::size_of;
use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
use windows::core::PCWSTR;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject,
    EnumDisplayMonitors, EnumDisplaySettingsW, GetDC, GetDIBits, GetMonitorInfoW, ReleaseDC,
    SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DEVMODEW, DIB_RGB_COLORS,
    ENUM_CURRENT_SETTINGS, HDC, HMONITOR, MONITORINFO, MONITORINFOEXW, SRCCOPY,
};

const MONITORINFOF_PRIMARY: u32 = 0x1;

/// GDI-backed display service
#[derive(Debug, Default, Clone, Copy)]
pub struct GdiDisplayService;

impl GdiDisplayService {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayService for GdiDisplayService {
    fn list_displays(&self) -> DesktopResult<Vec<DisplayInfo>> {
        let mut monitors: Vec<HMONITOR> = Vec::new();

        unsafe {
            EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_monitor_callback),
                LPARAM(&mut monitors as *mut Vec<HMONITOR> as isize),
            )
            .ok()?;
        }

        let displays: Vec<DisplayInfo> = monitors
            .into_iter()
            .filter_map(|hmonitor| unsafe { monitor_info(hmonitor) })
            .collect();

        if displays.is_empty() {
            return Err(DesktopError::NoDisplays);
        }

        log::debug!("Enumerated {} display(s)", displays.len());
        Ok(displays)
    }

    fn capture_region(&self, region: Rect) -> DesktopResult<RgbaImage> {
        if region.is_empty() {
            return Err(DesktopError::EmptyImage);
        }

        let width = region.width as i32;
        let height = region.height as i32;

        unsafe {
            let screen_dc = GetDC(None);
            if screen_dc.is_invalid() {
                return Err(DesktopError::Capture("Failed to get screen DC".into()));
            }

            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let old_bitmap = SelectObject(mem_dc, bitmap);

            let blit = BitBlt(
                mem_dc,
                0,
                0,
                width,
                height,
                screen_dc,
                region.x,
                region.y,
                SRCCOPY,
            );

            let mut bmi = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    biHeight: -height, // Top-down DIB
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

            let mut data = vec![0u8; region.width as usize * region.height as usize * 4];
            let lines = if blit.is_ok() {
                GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    region.height,
                    Some(data.as_mut_ptr() as *mut _),
                    &mut bmi,
                    DIB_RGB_COLORS,
                )
            } else {
                0
            };

            SelectObject(mem_dc, old_bitmap);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(None, screen_dc);

            blit?;
            if lines == 0 {
                return Err(DesktopError::Capture("GetDIBits copied no scanlines".into()));
            }

            // BGRX -> opaque RGBA
            for px in data.chunks_exact_mut(4) {
                px.swap(0, 2);
                px[3] = 255;
            }

            RgbaImage::from_raw(region.width, region.height, data).ok_or(DesktopError::EmptyImage)
        }
    }
}

unsafe extern "system" fn enum_monitor_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = &mut *(lparam.0 as *mut Vec<HMONITOR>);
    monitors.push(hmonitor);
    BOOL(1) // Continue enumeration
}

unsafe fn monitor_info(hmonitor: HMONITOR) -> Option<DisplayInfo> {
    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = size_of::<MONITORINFOEXW>() as u32;

    if !GetMonitorInfoW(hmonitor, &mut info as *mut MONITORINFOEXW as *mut MONITORINFO).as_bool() {
        log::warn!("GetMonitorInfoW failed for monitor {:?}", hmonitor);
        return None;
    }

    let rc = info.monitorInfo.rcMonitor;
    let name_len = info.szDevice.iter().position(|&c| c == 0).unwrap_or(info.szDevice.len());
    let name = String::from_utf16_lossy(&info.szDevice[..name_len]);

    let geometry = Rect::new(
        rc.left,
        rc.top,
        (rc.right - rc.left) as u32,
        (rc.bottom - rc.top) as u32,
    );

    let mut mode = DEVMODEW {
        dmSize: size_of::<DEVMODEW>() as u16,
        ..Default::default()
    };
    let pixel_ratio =
        if EnumDisplaySettingsW(PCWSTR(info.szDevice.as_ptr()), ENUM_CURRENT_SETTINGS, &mut mode).as_bool() {
            scale_between(mode.dmPelsWidth, geometry.width)
        } else {
            log::warn!("No display mode for {}; assuming ratio 1.0", name);
            1.0
        };

    log::debug!("{}: {:?} at ratio {}", name, geometry, pixel_ratio);

    Some(DisplayInfo::new(
        name,
        geometry,
        pixel_ratio,
        info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY != 0,
    ))
}
