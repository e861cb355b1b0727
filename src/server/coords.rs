//! Desktop / screen coordinate translation
//!
//! Coordinates travel in 16-bit wire fields; translation wraps the same way
//! the field does.

use crate::protocol::*;

/// Offset between desktop coordinates and one screen's coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Translation {
    pub dx: i32,
    pub dy: i32,
}

impl Translation {
    pub fn new(dx: i32, dy: i32) -> Self {
        Translation { dx, dy }
    }

    pub fn is_identity(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }

    /// Desktop x to screen x
    pub fn x(&self, x: i16) -> i16 {
        to_screen(x, self.dx)
    }

    /// Desktop y to screen y
    pub fn y(&self, y: i16) -> i16 {
        to_screen(y, self.dy)
    }

    pub fn apply(&self, x: &mut i16, y: &mut i16) {
        *x = self.x(*x);
        *y = self.y(*y);
    }

    /// In `CoordModePrevious` only the first point is absolute
    pub fn apply_points(&self, mode: CoordMode, points: &mut [Point]) {
        let count = match mode {
            CoordMode::Origin => points.len(),
            CoordMode::Previous => points.len().min(1),
        };
        for p in &mut points[..count] {
            self.apply(&mut p.x, &mut p.y);
        }
    }

    pub fn apply_rectangles(&self, rectangles: &mut [Rectangle]) {
        for r in rectangles {
            self.apply(&mut r.x, &mut r.y);
        }
    }

    pub fn apply_segments(&self, segments: &mut [Segment]) {
        for s in segments {
            self.apply(&mut s.x1, &mut s.y1);
            self.apply(&mut s.x2, &mut s.y2);
        }
    }

    pub fn apply_arcs(&self, arcs: &mut [Arc]) {
        for a in arcs {
            self.apply(&mut a.x, &mut a.y);
        }
    }

    /// Translate INT16 values carried in 32-bit value-list slots
    pub fn apply_values(&self, values: &mut ValueList, x_bit: u32, y_bit: u32) {
        if let Some(x) = values.get(x_bit) {
            values.set(x_bit, self.x(x as i16) as i32 as u32);
        }
        if let Some(y) = values.get(y_bit) {
            values.set(y_bit, self.y(y as i16) as i32 as u32);
        }
    }
}

/// Desktop coordinate to the coordinate of a screen placed at `origin`
pub fn to_screen(value: i16, origin: i32) -> i16 {
    (value as i32).wrapping_sub(origin) as i16
}

/// Screen coordinate back to the desktop
pub fn to_desktop(value: i16, origin: i32) -> i16 {
    (value as i32).wrapping_add(origin) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for origin in [0, 1920, -640, 40000] {
            for value in [i16::MIN, -1820, 0, 100, i16::MAX] {
                assert_eq!(to_desktop(to_screen(value, origin), origin), value);
            }
        }
    }

    #[test]
    fn test_wraps_like_the_wire_field() {
        assert_eq!(to_screen(i16::MIN, 1), i16::MAX);
        assert_eq!(to_screen(-1820, 1920), -3740);
    }

    #[test]
    fn test_previous_mode_translates_first_point_only() {
        let t = Translation::new(1920, 0);
        let mut points = vec![Point::new(2000, 5), Point::new(3, 3)];
        t.apply_points(CoordMode::Previous, &mut points);
        assert_eq!(points, vec![Point::new(80, 5), Point::new(3, 3)]);

        let mut points = vec![Point::new(2000, 5), Point::new(2003, 8)];
        t.apply_points(CoordMode::Origin, &mut points);
        assert_eq!(points, vec![Point::new(80, 5), Point::new(83, 8)]);
    }

    #[test]
    fn test_value_slots_keep_sign() {
        let t = Translation::new(1920, 0);
        let mut values = ValueList::new(config_window::X | config_window::Y, vec![100, 7]);
        t.apply_values(&mut values, config_window::X, config_window::Y);
        assert_eq!(values.get(config_window::X).map(|v| v as i16), Some(-1820));
        assert_eq!(values.get(config_window::Y), Some(7));
    }
}
