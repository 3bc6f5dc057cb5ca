//! Auto-scroll targets for the lyric list.
//!
//! Pure geometry: given the active range and the list's measurements, where
//! should the list scroll so the active line sits at the follow point? The UI
//! layer owns the actual scrolling.

use std::ops::RangeInclusive;

/// Measurements and settings for scroll follow. All lengths in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowConfig {
    /// Fraction of the viewport (0.0 top - 1.0 bottom) to hold the active line at
    pub follow_offset: f32,
    /// Pad above and below so every line can reach the follow point
    pub extra_padding: bool,
    /// Usable viewport height
    pub viewport_px: f32,
    pub line_height_px: f32,
    pub line_spacing_px: f32,
    /// Small constant nudge applied to every scroll
    pub static_scroll_offset_px: f32,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            follow_offset: 0.5,
            extra_padding: true,
            viewport_px: 0.0,
            line_height_px: 20.0,
            line_spacing_px: 25.0,
            static_scroll_offset_px: 2.0,
        }
    }
}

impl FollowConfig {
    /// Padding placed before the first and after the last line.
    pub fn padding_height(&self) -> i32 {
        let padding = if self.extra_padding {
            self.viewport_px + self.line_height_px + self.line_spacing_px
        } else {
            self.line_height_px
        };
        padding as i32 + self.static_scroll_offset_px as i32
    }

    /// Offset of the target line from the list's scroll origin.
    pub fn scroll_offset(&self, follow_offset: f32) -> i32 {
        (self.padding_height() as f32
            - self.static_scroll_offset_px.trunc()
            - self.viewport_px * follow_offset) as i32
    }

    /// Offset using the configured follow point.
    pub fn follow_scroll_offset(&self) -> i32 {
        self.scroll_offset(self.follow_offset)
    }
}

/// One scroll instruction for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollCommand {
    /// Line to bring to the follow point
    pub line: usize,
    /// Pixel offset for that line
    pub offset: i32,
    /// Animate (true) or jump (false)
    pub animate: bool,
}

/// Turns active-range changes into scroll commands.
///
/// The first command after attaching jumps; later ones animate.
#[derive(Debug, Clone)]
pub struct ScrollFollower {
    config: FollowConfig,
    enabled: bool,
    first_scroll: bool,
}

impl ScrollFollower {
    pub fn new(config: FollowConfig, enabled: bool) -> Self {
        Self {
            config,
            enabled,
            first_scroll: true,
        }
    }

    pub fn config(&self) -> &FollowConfig {
        &self.config
    }

    /// Update measurements (e.g. after a resize) without resetting state.
    pub fn set_config(&mut self, config: FollowConfig) {
        self.config = config;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Where to scroll when a document is first shown: top of the list.
    pub fn initial(&self) -> ScrollCommand {
        ScrollCommand {
            line: 0,
            offset: self.config.scroll_offset(0.0),
            animate: false,
        }
    }

    /// Command for a new active range, if any.
    pub fn on_range(&mut self, range: Option<&RangeInclusive<usize>>) -> Option<ScrollCommand> {
        if !self.enabled {
            return None;
        }
        let line = *range?.start();
        let animate = !std::mem::replace(&mut self.first_scroll, false);
        Some(ScrollCommand {
            line,
            offset: self.config.follow_scroll_offset(),
            animate,
        })
    }

    /// Forget the first-scroll state, e.g. when switching documents.
    pub fn reset(&mut self) {
        self.first_scroll = true;
    }
}
