//! Page geometry
//!
//! Edit rectangles arrive in **top-left origin** page coordinates (y grows
//! downward), the convention used by browser viewers and MuPDF. PDF content
//! streams use a **bottom-left origin** user space. The conversion is:
//!
//! ```text
//! pdf_x = mediabox.llx + x
//! pdf_y = mediabox.ury - y
//! ```

use serde::{Deserialize, Serialize};

/// Two-corner region `(x0, y0, x1, y1)` in top-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Region {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Zero or negative extent on either axis.
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Map into PDF user space relative to the page's media box.
    pub fn to_user_space(&self, media_box: &UserBox) -> UserBox {
        UserBox {
            llx: media_box.llx + self.x0,
            lly: media_box.ury - self.y1,
            urx: media_box.llx + self.x1,
            ury: media_box.ury - self.y0,
        }
    }
}

/// Axis-aligned box in PDF user space (bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl UserBox {
    /// US Letter, used when a page carries no usable MediaBox.
    pub const LETTER: UserBox = UserBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Swap corners so that `llx <= urx` and `lly <= ury`.
    pub fn normalized(&self) -> UserBox {
        UserBox {
            llx: self.llx.min(self.urx),
            lly: self.lly.min(self.ury),
            urx: self.llx.max(self.urx),
            ury: self.lly.max(self.ury),
        }
    }

    /// True when the two boxes share a region of positive area.
    pub fn intersects(&self, other: &UserBox) -> bool {
        self.llx < other.urx && self.urx > other.llx && self.lly < other.ury && self.ury > other.lly
    }

    /// True when `other` lies entirely within this box (edges included).
    pub fn contains(&self, other: &UserBox) -> bool {
        self.llx <= other.llx
            && self.lly <= other.lly
            && self.urx >= other.urx
            && self.ury >= other.ury
    }

    /// Smallest box containing all points.
    pub fn bounding(points: &[(f64, f64)]) -> Option<UserBox> {
        let (first, rest) = points.split_first()?;
        let init = UserBox {
            llx: first.0,
            lly: first.1,
            urx: first.0,
            ury: first.1,
        };
        Some(rest.iter().fold(init, |acc, &(x, y)| UserBox {
            llx: acc.llx.min(x),
            lly: acc.lly.min(y),
            urx: acc.urx.max(x),
            ury: acc.ury.max(y),
        }))
    }
}
