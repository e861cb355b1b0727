//! Physical screen layout and iteration
//!
//! The logical desktop is the union of N physical screens. Each screen keeps
//! its own coordinate space; `origin_x`/`origin_y` place it on the desktop.
//! Screen 0 is the primary screen.

use crate::protocol::XID;
use std::fmt;

/// Index of a physical screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScreenIndex(pub usize);

impl ScreenIndex {
    pub const PRIMARY: ScreenIndex = ScreenIndex(0);

    pub fn is_primary(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ScreenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen {}", self.0)
    }
}

/// One physical screen as the fanout engine sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDescriptor {
    pub index: ScreenIndex,
    pub origin_x: i32,
    pub origin_y: i32,
    pub width: u16,
    pub height: u16,
    pub root: XID,
}

impl ScreenDescriptor {
    /// Whether the desktop rectangle intersects this screen, and where
    pub fn intersect(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Option<(i32, i32, i32, i32)> {
        let x1 = x.max(self.origin_x);
        let y1 = y.max(self.origin_y);
        let x2 = (x + width).min(self.origin_x + self.width as i32);
        let y2 = (y + height).min(self.origin_y + self.height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// Traversal order of a fanout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// 0..N-1
    Forward,
    /// N-1..0
    Backward,
    /// 1..N-1
    ForwardSkippingFirst,
}

/// A screen position and size given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl ScreenGeometry {
    /// Parse `WxH+X+Y` (the offsets may be negative: `WxH-X-Y`)
    pub fn parse(spec: &str) -> Result<Self, String> {
        let err = || format!("Invalid screen geometry '{}', expected WxH+X+Y", spec);

        let (width, rest) = spec.split_once('x').ok_or_else(err)?;
        let split = rest.find(['+', '-']).ok_or_else(err)?;
        let (height, offsets) = rest.split_at(split);
        let second = offsets[1..].find(['+', '-']).ok_or_else(err)? + 1;
        let (x, y) = offsets.split_at(second);

        let width: u16 = width.parse().map_err(|_| err())?;
        let height: u16 = height.parse().map_err(|_| err())?;
        if width == 0 || height == 0 {
            return Err(err());
        }

        Ok(ScreenGeometry {
            x: x.parse().map_err(|_| err())?,
            y: y.parse().map_err(|_| err())?,
            width,
            height,
        })
    }
}

/// The active screen set, ordered by index
#[derive(Debug, Clone)]
pub struct ScreenSet {
    screens: Vec<ScreenDescriptor>,
}

impl ScreenSet {
    pub fn new(screens: Vec<ScreenDescriptor>) -> Self {
        ScreenSet { screens }
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn get(&self, index: ScreenIndex) -> Option<&ScreenDescriptor> {
        self.screens.get(index.0)
    }

    pub fn primary(&self) -> Option<&ScreenDescriptor> {
        self.screens.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScreenDescriptor> {
        self.screens.iter()
    }

    /// Screen indices in traversal order
    pub fn indices(&self, order: Order) -> Vec<ScreenIndex> {
        let n = self.screens.len();
        match order {
            Order::Forward => (0..n).map(ScreenIndex).collect(),
            Order::Backward => (0..n).rev().map(ScreenIndex).collect(),
            Order::ForwardSkippingFirst => (1..n).map(ScreenIndex).collect(),
        }
    }

    /// Visit screens in `order`; the first failure aborts the walk and is
    /// returned
    pub fn for_each<E>(
        &self,
        order: Order,
        mut f: impl FnMut(&ScreenDescriptor) -> Result<(), E>,
    ) -> Result<(), E> {
        for index in self.indices(order) {
            f(&self.screens[index.0])?;
        }
        Ok(())
    }

    pub fn for_each_forward<E>(
        &self,
        f: impl FnMut(&ScreenDescriptor) -> Result<(), E>,
    ) -> Result<(), E> {
        self.for_each(Order::Forward, f)
    }

    pub fn for_each_backward<E>(
        &self,
        f: impl FnMut(&ScreenDescriptor) -> Result<(), E>,
    ) -> Result<(), E> {
        self.for_each(Order::Backward, f)
    }

    pub fn for_each_forward_skipping_first<E>(
        &self,
        f: impl FnMut(&ScreenDescriptor) -> Result<(), E>,
    ) -> Result<(), E> {
        self.for_each(Order::ForwardSkippingFirst, f)
    }

    /// Size of the desktop: the bounding box of all screens, measured from
    /// the desktop origin
    pub fn desktop_size(&self) -> (u16, u16) {
        let width = self
            .screens
            .iter()
            .map(|s| s.origin_x + s.width as i32)
            .max()
            .unwrap_or(0);
        let height = self
            .screens
            .iter()
            .map(|s| s.origin_y + s.height as i32)
            .max()
            .unwrap_or(0);
        (
            width.clamp(0, u16::MAX as i32) as u16,
            height.clamp(0, u16::MAX as i32) as u16,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_screens() -> ScreenSet {
        ScreenSet::new(vec![
            ScreenDescriptor {
                index: ScreenIndex(0),
                origin_x: 0,
                origin_y: 0,
                width: 1920,
                height: 1080,
                root: XID(0x100),
            },
            ScreenDescriptor {
                index: ScreenIndex(1),
                origin_x: 1920,
                origin_y: 0,
                width: 1920,
                height: 1200,
                root: XID(0x101),
            },
        ])
    }

    #[test]
    fn test_iteration_orders() {
        let screens = two_screens();
        assert_eq!(
            screens.indices(Order::Backward),
            vec![ScreenIndex(1), ScreenIndex(0)]
        );
        assert_eq!(
            screens.indices(Order::ForwardSkippingFirst),
            vec![ScreenIndex(1)]
        );
    }

    #[test]
    fn test_for_each_stops_on_failure() {
        let screens = two_screens();
        let mut visited = Vec::new();
        let result = screens.for_each_backward(|s| {
            visited.push(s.index);
            Err::<(), _>("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(visited, vec![ScreenIndex(1)]);
    }

    #[test]
    fn test_desktop_size_is_bounding_box() {
        assert_eq!(two_screens().desktop_size(), (3840, 1200));
    }

    #[test]
    fn test_parse_geometry() {
        assert_eq!(
            ScreenGeometry::parse("1280x1024+1920+0"),
            Ok(ScreenGeometry {
                x: 1920,
                y: 0,
                width: 1280,
                height: 1024
            })
        );
        assert_eq!(ScreenGeometry::parse("800x600-800+0").map(|g| g.x), Ok(-800));
        assert!(ScreenGeometry::parse("800x600").is_err());
        assert!(ScreenGeometry::parse("0x600+0+0").is_err());
    }

    #[test]
    fn test_intersect() {
        let screens = two_screens();
        let second = screens.get(ScreenIndex(1)).unwrap();
        assert_eq!(second.intersect(1900, 10, 40, 5), Some((1920, 10, 20, 5)));
        assert_eq!(second.intersect(0, 0, 100, 100), None);
    }
}
