//! Aspect-correct sizing of the video surface inside the host window.

use common::{LayoutInput, LayoutResult, Size, ViewError};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// Called before the host window had a size
    #[error("Unexpected window size: {width}x{height}")]
    WindowNotMeasured { width: u32, height: u32 },

    #[error("Video has no visible area: {visible_width}x{visible_height}")]
    DegenerateVideo {
        visible_width: u32,
        visible_height: u32,
    },
}

impl From<LayoutError> for ViewError {
    fn from(e: LayoutError) -> Self {
        match e {
            LayoutError::WindowNotMeasured { width, height } => {
                ViewError::WindowNotMeasured { width, height }
            }
            LayoutError::DegenerateVideo {
                visible_width,
                visible_height,
            } => ViewError::DegenerateVideo {
                visible_width,
                visible_height,
            },
        }
    }
}

/// Fit the video described by `input` into its host window.
///
/// The visible frame is contain-fitted into the window at its display aspect
/// ratio. The container gets the fitted box (rounded down) and crops the
/// surface, which is scaled up (rounded up) to cover any decoded padding
/// outside the visible frame.
pub fn fit_surface(input: &LayoutInput) -> Result<LayoutResult, LayoutError> {
    let window = Size::new(input.window_width, input.window_height);
    if window.is_empty() {
        return Err(LayoutError::WindowNotMeasured {
            width: window.width,
            height: window.height,
        });
    }

    // engine is sizing the surface itself
    if input.width == 0 || input.height == 0 {
        return Ok(LayoutResult {
            surface: window,
            container: window,
            engine_managed: true,
        });
    }

    if input.visible_width == 0 || input.visible_height == 0 {
        return Err(LayoutError::DegenerateVideo {
            visible_width: input.visible_width,
            visible_height: input.visible_height,
        });
    }

    let aspect = display_aspect(input);

    let mut fitted_width = window.width as f32;
    let mut fitted_height = window.height as f32;
    let window_aspect = fitted_width / fitted_height;
    if window_aspect < aspect {
        fitted_height = fitted_width / aspect;
    } else {
        fitted_width = fitted_height * aspect;
    }

    let surface = Size::new(
        (fitted_width * input.width as f32 / input.visible_width as f32).ceil() as u32,
        (fitted_height * input.height as f32 / input.visible_height as f32).ceil() as u32,
    );
    let container = Size::new(fitted_width.floor() as u32, fitted_height.floor() as u32);

    log::debug!(
        "Fitted {}x{} (visible {}x{}, sar {}:{}, aspect {:.3}) into {}: surface {}, container {}",
        input.width,
        input.height,
        input.visible_width,
        input.visible_height,
        input.sar_num,
        input.sar_den,
        aspect,
        window,
        surface,
        container
    );

    Ok(LayoutResult {
        surface,
        container,
        engine_managed: false,
    })
}

/// Display aspect ratio of the visible frame.
///
/// Equal SAR terms mean square pixels. So does a zero term, which the engine
/// reports when the pixel aspect is unknown.
fn display_aspect(input: &LayoutInput) -> f32 {
    let square = input.sar_num == input.sar_den || input.sar_num == 0 || input.sar_den == 0;
    let display_width = if square {
        input.visible_width as f32
    } else {
        (input.visible_width as u64 * input.sar_num as u64) as f32 / input.sar_den as f32
    };
    display_width / input.visible_height as f32
}
