//! Search boxes and angle-to-pixel conversion around the display reference
//! point.

use std::fmt;
use std::str::FromStr;

use crate::error::ParameterError;

/// Pixels per degree of the display optics
pub const PIXELS_PER_DEGREE: f64 = 39.0;

/// Rectangle in image pixels; `right`/`bottom` are exclusive.
///
/// Coordinates are signed so an expanded or RDP-derived box can be reported
/// precisely when it leaves the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBox {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl SearchBox {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Parse `x0,y0,x1,y1`
    pub fn parse(text: &str) -> Result<Self, ParameterError> {
        let values = text
            .split(',')
            .map(|v| v.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ParameterError::new("box", format!("{} in \"{}\"", e, text)))?;
        match values.as_slice() {
            [left, top, right, bottom] => Ok(Self::new(*left, *top, *right, *bottom)),
            _ => Err(ParameterError::new(
                "box",
                format!("expected 4 coordinates (x0,y0,x1,y1), got \"{}\"", text),
            )),
        }
    }

    /// Grow the box by `tolerance` pixels on every side
    pub fn expanded(&self, tolerance: u32) -> Self {
        let t = tolerance as i64;
        Self::new(self.left - t, self.top - t, self.right + t, self.bottom + t)
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }
}

impl fmt::Display for SearchBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}),({}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizontal {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vertical {
    Above,
    Below,
}

impl FromStr for Horizontal {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LEFT" => Ok(Horizontal::Left),
            "RIGHT" => Ok(Horizontal::Right),
            _ => Err(ParameterError::new(
                "horizontal_indicator",
                format!("Invalid option: {}.", s),
            )),
        }
    }
}

impl FromStr for Vertical {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ABOVE" => Ok(Vertical::Above),
            "BELOW" => Ok(Vertical::Below),
            _ => Err(ParameterError::new(
                "vertical_indicator",
                format!("Invalid option: {}.", s),
            )),
        }
    }
}

impl fmt::Display for Horizontal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizontal::Left => write!(f, "LEFT"),
            Horizontal::Right => write!(f, "RIGHT"),
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vertical::Above => write!(f, "ABOVE"),
            Vertical::Below => write!(f, "BELOW"),
        }
    }
}

/// Angular position of a symbol relative to the display reference point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularOffset {
    pub horizontal: Horizontal,
    pub horizontal_degrees: f64,
    pub vertical: Vertical,
    pub vertical_degrees: f64,
}

impl AngularOffset {
    /// Parse `horiz,deg,vert,deg`
    pub fn parse(text: &str) -> Result<Self, ParameterError> {
        let parts: Vec<&str> = text.split(',').collect();
        let [h, h_deg, v, v_deg] = parts.as_slice() else {
            return Err(ParameterError::new(
                "angular_offset",
                format!("expected horiz,deg,vert,deg, got \"{}\"", text),
            ));
        };
        let degrees = |name: &str, value: &str| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| ParameterError::new(name, format!("\"{}\" is not a number", value)))
        };
        Ok(Self {
            horizontal: h.parse()?,
            horizontal_degrees: degrees("horizontal_degrees", h_deg)?,
            vertical: v.parse()?,
            vertical_degrees: degrees("vertical_degrees", v_deg)?,
        })
    }
}

/// Centre of a `width` x `height` image, shifted back one pixel on an even
/// width when the offset points left. The vertical centre is never shifted.
pub fn display_reference_point(width: u32, height: u32, offset: &AngularOffset) -> (f64, f64) {
    let mut x = width as f64 / 2.0;
    let y = height as f64 / 2.0;
    if width % 2 == 0 && offset.horizontal == Horizontal::Left {
        x -= 1.0;
    }
    (x, y)
}

/// Box where a golden of `golden_size` should appear so its reference point
/// lands at `offset` from the display reference point.
pub fn rdp_search_box(
    reference_size: (u32, u32),
    golden_size: (u32, u32),
    rp_offset: (f64, f64),
    offset: &AngularOffset,
    pixels_per_degree: f64,
) -> SearchBox {
    let (drp_x, drp_y) = display_reference_point(reference_size.0, reference_size.1, offset);

    let dx = pixels_per_degree * offset.horizontal_degrees;
    let dy = pixels_per_degree * offset.vertical_degrees;
    let x = match offset.horizontal {
        Horizontal::Left => (drp_x - dx).round_ties_even(),
        Horizontal::Right => (drp_x + dx).round_ties_even(),
    };
    let y = match offset.vertical {
        Vertical::Above => (drp_y - dy).round_ties_even(),
        Vertical::Below => (drp_y + dy).round_ties_even(),
    };

    let left = (x - rp_offset.0).trunc() as i64;
    let top = (y - rp_offset.1).trunc() as i64;
    SearchBox::new(
        left,
        top,
        left + golden_size.0 as i64,
        top + golden_size.1 as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(h: Horizontal, hd: f64, v: Vertical, vd: f64) -> AngularOffset {
        AngularOffset {
            horizontal: h,
            horizontal_degrees: hd,
            vertical: v,
            vertical_degrees: vd,
        }
    }

    #[test]
    fn test_parse_box() {
        assert_eq!(
            SearchBox::parse("0,0,50,50").unwrap(),
            SearchBox::new(0, 0, 50, 50)
        );
        assert!(SearchBox::parse("0,0,50").is_err());
        assert!(SearchBox::parse("a,0,50,1").is_err());
    }

    #[test]
    fn test_expanded_box() {
        let b = SearchBox::new(10, 20, 30, 40).expanded(5);
        assert_eq!(b, SearchBox::new(5, 15, 35, 45));
        assert_eq!(b.width(), 30);
    }

    #[test]
    fn test_invalid_compass_word() {
        let err = AngularOffset::parse("up,1,above,1").unwrap_err();
        assert_eq!(err.parameter, "horizontal_indicator");
        assert!(err.message.contains("Invalid option: up."));
        assert!(AngularOffset::parse("left,1,sideways,1").is_err());
        assert!(AngularOffset::parse("left,x,above,1").is_err());
    }

    #[test]
    fn test_reference_point_even_adjust() {
        let o = offset(Horizontal::Left, 0.0, Vertical::Above, 0.0);
        assert_eq!(display_reference_point(1280, 1024, &o), (639.0, 512.0));
        let o = offset(Horizontal::Right, 0.0, Vertical::Above, 0.0);
        assert_eq!(display_reference_point(1280, 1024, &o), (640.0, 512.0));
        let o = offset(Horizontal::Right, 0.0, Vertical::Below, 0.0);
        assert_eq!(display_reference_point(1280, 1024, &o), (640.0, 512.0));
        let o = offset(Horizontal::Left, 0.0, Vertical::Above, 0.0);
        assert_eq!(display_reference_point(101, 51, &o), (50.5, 25.5));
    }

    #[test]
    fn test_rdp_box_subtracts_rp_offset() {
        let o = offset(Horizontal::Right, 1.0, Vertical::Below, 2.0);
        let b = rdp_search_box((1280, 1024), (20, 10), (5.0, 3.0), &o, PIXELS_PER_DEGREE);
        // x = 640 + 39 = 679, y = 512 + 78 = 590
        assert_eq!(b, SearchBox::new(674, 587, 694, 597));
    }

    #[test]
    fn test_rdp_above_keeps_vertical_centre() {
        // 1024 / 2 - 39 * 2 = 434
        let o = offset(Horizontal::Left, 1.0, Vertical::Above, 2.0);
        let b = rdp_search_box((1280, 1024), (20, 10), (0.0, 0.0), &o, PIXELS_PER_DEGREE);
        assert_eq!((b.left, b.top), (600, 434));
    }

    #[test]
    fn test_rdp_rounds_half_to_even() {
        // 640 - 39 * 0.5 = 620.5 -> 620 ; 512 - 39 * 1.5 = 453.5 -> 454
        let o = offset(Horizontal::Right, -0.5, Vertical::Below, -1.5);
        let b = rdp_search_box((1280, 1024), (1, 1), (0.0, 0.0), &o, PIXELS_PER_DEGREE);
        assert_eq!((b.left, b.top), (620, 454));
    }
}
