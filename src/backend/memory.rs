//! Memory Backend - in-process single-screen model
//!
//! Keeps a window tree, pixmaps with pixel storage, GCs, colormaps and RENDER
//! pictures entirely in memory. Pixels are stored as one `u32` per pixel
//! masked to the drawable's depth; children are not composited into their
//! parents, each window owns its own pixels.
//!
//! Every dispatched request is recorded, and a [`ScreenProbe`] obtained from
//! the backend can inspect the state or make selected requests fail.

use super::colors::lookup_named_color;
use super::*;
use crate::protocol::image;
use crate::protocol::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

const ID_ROOT_BASE: u32 = 0x100;
const ID_COLORMAP_BASE: u32 = 0x200;
const VISUAL_BASE: u32 = 0x21;

// StoreColors flags
const DO_RED: u8 = 1 << 0;
const DO_GREEN: u8 = 1 << 1;
const DO_BLUE: u8 = 1 << 2;

/// Pixel storage of a window or pixmap
#[derive(Debug, Clone)]
struct Surface {
    width: u16,
    height: u16,
    depth: u8,
    pixels: Vec<u32>,
}

impl Surface {
    fn new(width: u16, height: u16, depth: u8, fill: u32) -> Self {
        Surface {
            width,
            height,
            depth,
            pixels: vec![fill & image::depth_mask(depth); width as usize * height as usize],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn get(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    fn put(&mut self, x: i32, y: i32, pixel: u32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = pixel & image::depth_mask(self.depth);
        }
    }

    fn fill(&mut self, x: i32, y: i32, width: i32, height: i32, pixel: u32) {
        let x1 = x.max(0);
        let y1 = y.max(0);
        let x2 = (x + width).min(self.width as i32);
        let y2 = (y + height).min(self.height as i32);
        for py in y1..y2 {
            for px in x1..x2 {
                self.put(px, py, pixel);
            }
        }
    }

    /// Pixels of a rectangle; `None` where it leaves the surface
    fn read(&self, x: i32, y: i32, width: u16, height: u16) -> Vec<Option<u32>> {
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                out.push(self.get(x + dx, y + dy));
            }
        }
        out
    }

    fn write(&mut self, x: i32, y: i32, width: u16, pixels: &[Option<u32>]) {
        if width == 0 {
            return;
        }
        for (i, pixel) in pixels.iter().enumerate() {
            if let Some(pixel) = pixel {
                let dx = (i % width as usize) as i32;
                let dy = (i / width as usize) as i32;
                self.put(x + dx, y + dy, *pixel);
            }
        }
    }

    fn resize(&mut self, width: u16, height: u16, fill: u32) {
        let mut resized = Surface::new(width, height, self.depth, fill);
        let kept = self.read(0, 0, width.min(self.width), height.min(self.height));
        resized.write(0, 0, width.min(self.width), &kept);
        *self = resized;
    }

    /// Bresenham line, both endpoints included
    fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, pixel: u32) {
        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x1, y1, dx + dy);
        loop {
            self.put(x, y, pixel);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

#[derive(Debug)]
struct WindowNode {
    parent: XID,
    x: i16,
    y: i16,
    width: u16,
    height: u16,
    border_width: u16,
    class: WindowClass,
    depth: u8,
    visual: VisualID,
    mapped: bool,
    /// Bottom of the stacking order first
    children: Vec<XID>,
    background: Option<u32>,
    colormap: XID,
    in_save_set: bool,
    surface: Option<Surface>,
}

#[derive(Debug, Clone)]
struct GcNode {
    depth: u8,
    foreground: u32,
    background: u32,
    tile: XID,
    stipple: XID,
    clip_mask: XID,
    dash_offset: u16,
    dashes: Vec<u8>,
    clip_rectangles: Vec<Rectangle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Free,
    Shared { rgb: (u16, u16, u16), refs: u32 },
    Private((u16, u16, u16)),
}

#[derive(Debug, Clone)]
struct ColormapNode {
    visual: VisualInfo,
    /// Empty for static visuals
    cells: Vec<Cell>,
    installed: bool,
}

impl ColormapNode {
    fn new(visual: VisualInfo, alloc_all: bool) -> Self {
        let cells = if is_dynamic(visual.class) {
            let cell = if alloc_all {
                Cell::Private((0, 0, 0))
            } else {
                Cell::Free
            };
            vec![cell; visual.colormap_entries as usize]
        } else {
            Vec::new()
        };
        ColormapNode {
            visual,
            cells,
            installed: false,
        }
    }

    fn is_dynamic(&self) -> bool {
        is_dynamic(self.visual.class)
    }

    fn alloc(&mut self, red: u16, green: u16, blue: u16) -> X11Result<(u32, (u16, u16, u16))> {
        if !self.is_dynamic() {
            let (r, g, b) = (red >> 8, green >> 8, blue >> 8);
            let pixel = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            return Ok((pixel, (r * 0x101, g * 0x101, b * 0x101)));
        }

        let rgb = (red, green, blue);
        if let Some((pixel, cell)) = self
            .cells
            .iter_mut()
            .enumerate()
            .find(|(_, c)| matches!(c, Cell::Shared { rgb: shared, .. } if *shared == rgb))
        {
            if let Cell::Shared { refs, .. } = cell {
                *refs += 1;
            }
            return Ok((pixel as u32, rgb));
        }

        let pixel = self
            .cells
            .iter()
            .position(|c| *c == Cell::Free)
            .ok_or_else(X11Error::bad_alloc)?;
        self.cells[pixel] = Cell::Shared { rgb, refs: 1 };
        Ok((pixel as u32, rgb))
    }

    fn alloc_private(&mut self, count: usize) -> X11Result<Vec<u32>> {
        let free: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Cell::Free)
            .map(|(i, _)| i)
            .take(count)
            .collect();
        if free.len() < count {
            return Err(X11Error::bad_alloc());
        }
        for i in &free {
            self.cells[*i] = Cell::Private((0, 0, 0));
        }
        Ok(free.into_iter().map(|i| i as u32).collect())
    }

    fn cell_mut(&mut self, pixel: u32) -> X11Result<&mut Cell> {
        self.cells
            .get_mut(pixel as usize)
            .ok_or_else(|| X11Error::bad_value(pixel))
    }

    fn store(&mut self, pixel: u32, red: u16, green: u16, blue: u16, flags: u8) -> X11Result<()> {
        if !self.is_dynamic() {
            return Err(X11Error::bad_access(pixel));
        }
        match self.cell_mut(pixel)? {
            Cell::Private(rgb) => {
                if flags & DO_RED != 0 {
                    rgb.0 = red;
                }
                if flags & DO_GREEN != 0 {
                    rgb.1 = green;
                }
                if flags & DO_BLUE != 0 {
                    rgb.2 = blue;
                }
                Ok(())
            }
            _ => Err(X11Error::bad_access(pixel)),
        }
    }
}

fn is_dynamic(class: u8) -> bool {
    matches!(
        class,
        visual_class::GRAY_SCALE | visual_class::PSEUDO_COLOR | visual_class::DIRECT_COLOR
    )
}

#[derive(Debug, Clone, Copy)]
enum PictureSource {
    Drawable(XID),
    Solid(RenderColor),
}

#[derive(Debug, Clone)]
struct PictureNode {
    source: PictureSource,
    values: ValueList,
    clip_rectangles: Vec<Rectangle>,
}

fn render_pixel(color: RenderColor) -> u32 {
    ((color.red as u32 >> 8) << 16) | ((color.green as u32 >> 8) << 8) | (color.blue as u32 >> 8)
}

/// The screen's state, shared between the backend and its probes
struct ScreenState {
    index: usize,
    info: ScreenInfo,
    windows: HashMap<XID, WindowNode>,
    pixmaps: HashMap<XID, Surface>,
    gcs: HashMap<XID, GcNode>,
    colormaps: HashMap<XID, ColormapNode>,
    pictures: HashMap<XID, PictureNode>,
    requests: Vec<Request>,
    failures: HashMap<Opcode, ErrorCode>,
}

impl ScreenState {
    fn new(index: usize, width: u16, height: u16) -> Self {
        let base = index as u32;
        let true_color = VisualInfo {
            visual_id: VisualID::new(VISUAL_BASE + 0x10 * base),
            class: visual_class::TRUE_COLOR,
            depth: 24,
            bits_per_rgb: 8,
            colormap_entries: 256,
            red_mask: 0xFF0000,
            green_mask: 0x00FF00,
            blue_mask: 0x0000FF,
        };
        let pseudo_color = VisualInfo {
            visual_id: VisualID::new(VISUAL_BASE + 1 + 0x10 * base),
            class: visual_class::PSEUDO_COLOR,
            depth: 8,
            bits_per_rgb: 8,
            colormap_entries: 256,
            red_mask: 0,
            green_mask: 0,
            blue_mask: 0,
        };
        let info = ScreenInfo {
            width,
            height,
            root: XID(ID_ROOT_BASE + base),
            root_depth: 24,
            root_visual: true_color.visual_id,
            default_colormap: XID(ID_COLORMAP_BASE + base),
            white_pixel: 0xFFFFFF,
            black_pixel: 0x000000,
            visuals: vec![true_color, pseudo_color],
        };

        let mut windows = HashMap::new();
        windows.insert(
            info.root,
            WindowNode {
                parent: XID::NONE,
                x: 0,
                y: 0,
                width,
                height,
                border_width: 0,
                class: WindowClass::InputOutput,
                depth: 24,
                visual: true_color.visual_id,
                mapped: true,
                children: Vec::new(),
                background: Some(info.black_pixel),
                colormap: info.default_colormap,
                in_save_set: false,
                surface: Some(Surface::new(width, height, 24, info.black_pixel)),
            },
        );
        let mut colormaps = HashMap::new();
        colormaps.insert(info.default_colormap, ColormapNode::new(true_color, false));

        ScreenState {
            index,
            info,
            windows,
            pixmaps: HashMap::new(),
            gcs: HashMap::new(),
            colormaps,
            pictures: HashMap::new(),
            requests: Vec::new(),
            failures: HashMap::new(),
        }
    }

    fn id_in_use(&self, id: XID) -> bool {
        self.windows.contains_key(&id)
            || self.pixmaps.contains_key(&id)
            || self.gcs.contains_key(&id)
            || self.colormaps.contains_key(&id)
            || self.pictures.contains_key(&id)
    }

    fn require_new(&self, id: XID) -> X11Result<()> {
        if id.is_none() || self.id_in_use(id) {
            return Err(X11Error::bad_id_choice(id));
        }
        Ok(())
    }

    fn window(&self, id: XID) -> X11Result<&WindowNode> {
        self.windows.get(&id).ok_or_else(|| X11Error::bad_window(id))
    }

    fn window_mut(&mut self, id: XID) -> X11Result<&mut WindowNode> {
        self.windows.get_mut(&id).ok_or_else(|| X11Error::bad_window(id))
    }

    fn gc(&self, id: GContext) -> X11Result<&GcNode> {
        self.gcs.get(&id.id()).ok_or_else(|| X11Error::bad_gc(id.id()))
    }

    fn colormap_mut(&mut self, id: Colormap) -> X11Result<&mut ColormapNode> {
        self.colormaps
            .get_mut(&id.id())
            .ok_or_else(|| X11Error::bad_colormap(id.id()))
    }

    fn picture(&self, id: Picture) -> X11Result<&PictureNode> {
        self.pictures
            .get(&id.id())
            .ok_or_else(|| X11Error::bad_picture(id.id()))
    }

    fn require_pixmap(&self, value: u32) -> X11Result<()> {
        if !self.pixmaps.contains_key(&XID(value)) {
            return Err(X11Error::bad_pixmap(XID(value)));
        }
        Ok(())
    }

    fn drawable_exists(&self, id: XID) -> bool {
        self.windows.contains_key(&id) || self.pixmaps.contains_key(&id)
    }

    fn surface(&self, id: XID) -> X11Result<&Surface> {
        if let Some(window) = self.windows.get(&id) {
            return window
                .surface
                .as_ref()
                .ok_or_else(|| X11Error::bad_match(id.get()));
        }
        self.pixmaps.get(&id).ok_or_else(|| X11Error::bad_drawable(id))
    }

    fn surface_mut(&mut self, id: XID) -> X11Result<&mut Surface> {
        if let Some(window) = self.windows.get_mut(&id) {
            return window
                .surface
                .as_mut()
                .ok_or_else(|| X11Error::bad_match(id.get()));
        }
        self.pixmaps
            .get_mut(&id)
            .ok_or_else(|| X11Error::bad_drawable(id))
    }

    /// Foreground and background of a GC usable on `drawable`
    fn gc_colors(&self, drawable: XID, gc: GContext) -> X11Result<(u32, u32)> {
        let depth = self.surface(drawable)?.depth;
        let gc = self.gc(gc)?;
        if gc.depth != depth {
            return Err(X11Error::bad_match(drawable.get()));
        }
        Ok((gc.foreground, gc.background))
    }

    fn interior_origin(&self, id: XID) -> (i32, i32) {
        let (mut x, mut y) = (0, 0);
        let mut current = id;
        while let Some(node) = self.windows.get(&current) {
            if node.parent.is_none() {
                break;
            }
            x += node.x as i32 + node.border_width as i32;
            y += node.y as i32 + node.border_width as i32;
            current = node.parent;
        }
        (x, y)
    }

    fn viewable(&self, id: XID) -> bool {
        let mut current = id;
        while let Some(node) = self.windows.get(&current) {
            if !node.mapped {
                return false;
            }
            if node.parent.is_none() {
                return true;
            }
            current = node.parent;
        }
        false
    }

    fn is_ancestor(&self, ancestor: XID, id: XID) -> bool {
        let mut current = id;
        while let Some(node) = self.windows.get(&current) {
            if current == ancestor {
                return true;
            }
            current = node.parent;
        }
        false
    }

    fn window_info(&self, id: XID) -> Option<WindowInfo> {
        let node = self.windows.get(&id)?;
        let (abs_x, abs_y) = self.interior_origin(id);
        Some(WindowInfo {
            parent: node.parent,
            x: node.x,
            y: node.y,
            abs_x,
            abs_y,
            width: node.width,
            height: node.height,
            border_width: node.border_width,
            class: node.class,
            depth: node.depth,
            visual: node.visual,
            mapped: node.mapped,
            viewable: self.viewable(id),
            children: node.children.iter().rev().copied().collect(),
        })
    }

    fn drawable_info(&self, id: XID) -> Option<DrawableInfo> {
        if let Some(node) = self.windows.get(&id) {
            return Some(DrawableInfo {
                kind: DrawableKind::Window,
                depth: node.depth,
                width: node.width,
                height: node.height,
            });
        }
        self.pixmaps.get(&id).map(|p| DrawableInfo {
            kind: DrawableKind::Pixmap,
            depth: p.depth,
            width: p.width,
            height: p.height,
        })
    }

    fn execute(&mut self, request: &Request) -> X11Result<Response> {
        match request {
            Request::CreateWindow(req) => self.create_window(req),
            Request::ChangeWindowAttributes(req) => {
                let background = self.check_window_values(&req.values)?;
                let window = self.window_mut(req.window.id())?;
                if let Some(pixel) = background.0 {
                    window.background = Some(pixel);
                }
                if let Some(colormap) = background.1 {
                    window.colormap = colormap;
                }
                Ok(Response::done())
            }
            Request::DestroyWindow(req) => {
                let window = self.window(req.id)?;
                if window.parent.is_none() {
                    return Ok(Response::done());
                }
                let parent = window.parent;
                if let Some(parent) = self.windows.get_mut(&parent) {
                    parent.children.retain(|c| *c != req.id);
                }
                let mut freed = Vec::new();
                self.destroy_tree(req.id, &mut freed);
                Ok(Response::freed(freed))
            }
            Request::DestroySubwindows(req) => {
                let children = std::mem::take(&mut self.window_mut(req.id)?.children);
                let mut freed = Vec::new();
                for child in children.into_iter().rev() {
                    self.destroy_tree(child, &mut freed);
                }
                Ok(Response::freed(freed))
            }
            Request::ChangeSaveSet(req) => {
                if req.mode > 1 {
                    return Err(X11Error::bad_value(req.mode as u32));
                }
                self.window_mut(req.window.id())?.in_save_set = req.mode == 0;
                Ok(Response::done())
            }
            Request::ReparentWindow(req) => self.reparent_window(req),
            Request::MapWindow(req) => self.set_mapped(req.id, true),
            Request::UnmapWindow(req) => self.set_mapped(req.id, false),
            Request::MapSubwindows(req) => {
                let children = self.window(req.id)?.children.clone();
                for child in children {
                    self.set_mapped(child, true)?;
                }
                Ok(Response::done())
            }
            Request::UnmapSubwindows(req) => {
                let children = self.window(req.id)?.children.clone();
                for child in children {
                    self.set_mapped(child, false)?;
                }
                Ok(Response::done())
            }
            Request::ConfigureWindow(req) => self.configure_window(req),
            Request::CirculateWindow(req) => {
                if req.direction > 1 {
                    return Err(X11Error::bad_value(req.direction as u32));
                }
                let window = self.window_mut(req.window.id())?;
                if window.children.len() > 1 {
                    if req.direction == 0 {
                        // RaiseLowest
                        let lowest = window.children.remove(0);
                        window.children.push(lowest);
                    } else if let Some(highest) = window.children.pop() {
                        window.children.insert(0, highest);
                    }
                }
                Ok(Response::done())
            }
            Request::CreatePixmap(req) => {
                self.require_new(req.pid.id())?;
                if !self.drawable_exists(req.drawable) {
                    return Err(X11Error::bad_drawable(req.drawable));
                }
                if !matches!(req.depth, 1 | 8 | 24 | 32) {
                    return Err(X11Error::bad_value(req.depth as u32));
                }
                if req.width == 0 || req.height == 0 {
                    return Err(X11Error::bad_value(0));
                }
                self.pixmaps.insert(
                    req.pid.id(),
                    Surface::new(req.width, req.height, req.depth, 0),
                );
                Ok(Response::done())
            }
            Request::FreePixmap(req) => {
                self.pixmaps
                    .remove(&req.id)
                    .ok_or_else(|| X11Error::bad_pixmap(req.id))?;
                Ok(Response::freed(vec![req.id]))
            }
            Request::CreateGC(req) => {
                self.require_new(req.cid.id())?;
                let depth = self.surface(req.drawable).map(|s| s.depth).or_else(|e| {
                    // InputOnly windows carry no pixels but still fix a depth
                    match self.windows.get(&req.drawable) {
                        Some(window) => Ok(window.depth),
                        None => Err(e),
                    }
                })?;
                let mut gc = GcNode {
                    depth,
                    foreground: 0,
                    background: 1,
                    tile: XID::NONE,
                    stipple: XID::NONE,
                    clip_mask: XID::NONE,
                    dash_offset: 0,
                    dashes: vec![4, 4],
                    clip_rectangles: Vec::new(),
                };
                self.apply_gc_values(&mut gc, &req.values)?;
                self.gcs.insert(req.cid.id(), gc);
                Ok(Response::done())
            }
            Request::ChangeGC(req) => {
                let mut gc = self.gc(req.gc)?.clone();
                self.apply_gc_values(&mut gc, &req.values)?;
                self.gcs.insert(req.gc.id(), gc);
                Ok(Response::done())
            }
            Request::CopyGC(req) => {
                let src = self.gc(req.src_gc)?.clone();
                let dst = self
                    .gcs
                    .get_mut(&req.dst_gc.id())
                    .ok_or_else(|| X11Error::bad_gc(req.dst_gc.id()))?;
                if src.depth != dst.depth {
                    return Err(X11Error::bad_match(req.src_gc.id().get()));
                }
                if req.value_mask & gc_attr::FOREGROUND != 0 {
                    dst.foreground = src.foreground;
                }
                if req.value_mask & gc_attr::BACKGROUND != 0 {
                    dst.background = src.background;
                }
                if req.value_mask & gc_attr::TILE != 0 {
                    dst.tile = src.tile;
                }
                if req.value_mask & gc_attr::STIPPLE != 0 {
                    dst.stipple = src.stipple;
                }
                if req.value_mask & gc_attr::CLIP_MASK != 0 {
                    dst.clip_mask = src.clip_mask;
                    dst.clip_rectangles = src.clip_rectangles;
                }
                Ok(Response::done())
            }
            Request::SetDashes(req) => {
                if req.dashes.is_empty() || req.dashes.contains(&0) {
                    return Err(X11Error::bad_value(0));
                }
                let gc = self
                    .gcs
                    .get_mut(&req.gc.id())
                    .ok_or_else(|| X11Error::bad_gc(req.gc.id()))?;
                gc.dash_offset = req.dash_offset;
                gc.dashes = req.dashes.clone();
                Ok(Response::done())
            }
            Request::SetClipRectangles(req) => {
                if req.ordering > 3 {
                    return Err(X11Error::bad_value(req.ordering as u32));
                }
                let gc = self
                    .gcs
                    .get_mut(&req.gc.id())
                    .ok_or_else(|| X11Error::bad_gc(req.gc.id()))?;
                gc.clip_mask = XID::NONE;
                gc.clip_rectangles = req
                    .rectangles
                    .iter()
                    .map(|r| {
                        Rectangle::new(
                            r.x.wrapping_add(req.clip_x_origin),
                            r.y.wrapping_add(req.clip_y_origin),
                            r.width,
                            r.height,
                        )
                    })
                    .collect();
                Ok(Response::done())
            }
            Request::FreeGC(req) => {
                self.gcs
                    .remove(&req.id)
                    .ok_or_else(|| X11Error::bad_gc(req.id))?;
                Ok(Response::freed(vec![req.id]))
            }
            Request::ClearArea(req) => {
                let window = self.window(req.window.id())?;
                if window.class == WindowClass::InputOnly {
                    return Err(X11Error::bad_match(req.window.id().get()));
                }
                let background = window.background;
                let width = if req.width == 0 {
                    window.width as i32 - req.x as i32
                } else {
                    req.width as i32
                };
                let height = if req.height == 0 {
                    window.height as i32 - req.y as i32
                } else {
                    req.height as i32
                };
                if let Some(pixel) = background {
                    self.surface_mut(req.window.id())?.fill(
                        req.x as i32,
                        req.y as i32,
                        width,
                        height,
                        pixel,
                    );
                }
                Ok(Response::done())
            }
            Request::CopyArea(req) => {
                self.gc_colors(req.dst_drawable, req.gc)?;
                let src = self.surface(req.src_drawable)?;
                if src.depth != self.surface(req.dst_drawable)?.depth {
                    return Err(X11Error::bad_match(req.dst_drawable.get()));
                }
                let pixels = src.read(req.src_x as i32, req.src_y as i32, req.width, req.height);
                self.surface_mut(req.dst_drawable)?.write(
                    req.dst_x as i32,
                    req.dst_y as i32,
                    req.width,
                    &pixels,
                );
                Ok(Response::done())
            }
            Request::CopyPlane(req) => {
                let (fg, bg) = self.gc_colors(req.dst_drawable, req.gc)?;
                let src = self.surface(req.src_drawable)?;
                let plane = req.bit_plane;
                if plane == 0 || !plane.is_power_of_two() || plane > image::depth_mask(src.depth) {
                    return Err(X11Error::bad_value(plane));
                }
                let pixels: Vec<Option<u32>> = src
                    .read(req.src_x as i32, req.src_y as i32, req.width, req.height)
                    .into_iter()
                    .map(|p| p.map(|p| if p & plane != 0 { fg } else { bg }))
                    .collect();
                self.surface_mut(req.dst_drawable)?.write(
                    req.dst_x as i32,
                    req.dst_y as i32,
                    req.width,
                    &pixels,
                );
                Ok(Response::done())
            }
            Request::PolyPoint(req) => {
                let (fg, _) = self.gc_colors(req.drawable, req.gc)?;
                let surface = self.surface_mut(req.drawable)?;
                for point in absolute_points(req.coordinate_mode, &req.points) {
                    surface.put(point.0, point.1, fg);
                }
                Ok(Response::done())
            }
            Request::PolyLine(req) => {
                let (fg, _) = self.gc_colors(req.drawable, req.gc)?;
                let surface = self.surface_mut(req.drawable)?;
                let points = absolute_points(req.coordinate_mode, &req.points);
                for pair in points.windows(2) {
                    surface.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1, fg);
                }
                Ok(Response::done())
            }
            Request::PolySegment(req) => {
                let (fg, _) = self.gc_colors(req.drawable, req.gc)?;
                let surface = self.surface_mut(req.drawable)?;
                for s in &req.segments {
                    surface.line(s.x1 as i32, s.y1 as i32, s.x2 as i32, s.y2 as i32, fg);
                }
                Ok(Response::done())
            }
            Request::PolyRectangle(req) => {
                let (fg, _) = self.gc_colors(req.drawable, req.gc)?;
                let surface = self.surface_mut(req.drawable)?;
                for r in &req.rectangles {
                    let (x1, y1) = (r.x as i32, r.y as i32);
                    let (x2, y2) = (x1 + r.width as i32, y1 + r.height as i32);
                    surface.line(x1, y1, x2, y1, fg);
                    surface.line(x2, y1, x2, y2, fg);
                    surface.line(x2, y2, x1, y2, fg);
                    surface.line(x1, y2, x1, y1, fg);
                }
                Ok(Response::done())
            }
            Request::PolyFillRectangle(req) => {
                let (fg, _) = self.gc_colors(req.drawable, req.gc)?;
                let surface = self.surface_mut(req.drawable)?;
                for r in &req.rectangles {
                    surface.fill(r.x as i32, r.y as i32, r.width as i32, r.height as i32, fg);
                }
                Ok(Response::done())
            }
            Request::PolyArc(req) | Request::PolyFillArc(req) => {
                self.gc_colors(req.drawable, req.gc)?;
                Ok(Response::done())
            }
            Request::FillPoly(req) => {
                if req.shape > 2 {
                    return Err(X11Error::bad_value(req.shape as u32));
                }
                self.gc_colors(req.drawable, req.gc)?;
                Ok(Response::done())
            }
            Request::PutImage(req) => self.put_image(req),
            Request::GetImage(req) => self.get_image(req),
            Request::PolyText8(req)
            | Request::PolyText16(req)
            | Request::ImageText8(req)
            | Request::ImageText16(req) => {
                self.gc_colors(req.drawable, req.gc)?;
                Ok(Response::done())
            }
            Request::CreateColormap(req) => {
                self.require_new(req.mid.id())?;
                self.window(req.window.id())?;
                let visual = *self
                    .info
                    .visual(req.visual)
                    .ok_or_else(|| X11Error::bad_match(req.visual.get()))?;
                if req.alloc > 1 {
                    return Err(X11Error::bad_value(req.alloc as u32));
                }
                if req.alloc == 1 && !is_dynamic(visual.class) {
                    return Err(X11Error::bad_match(req.alloc as u32));
                }
                self.colormaps
                    .insert(req.mid.id(), ColormapNode::new(visual, req.alloc == 1));
                Ok(Response::done())
            }
            Request::FreeColormap(req) => {
                if !self.colormaps.contains_key(&req.id) {
                    return Err(X11Error::bad_colormap(req.id));
                }
                if req.id == self.info.default_colormap {
                    return Ok(Response::done());
                }
                self.colormaps.remove(&req.id);
                Ok(Response::freed(vec![req.id]))
            }
            Request::CopyColormapAndFree(req) => {
                self.require_new(req.mid.id())?;
                let copy = self.colormap_mut(req.src_cmap)?.clone();
                self.colormaps.insert(
                    req.mid.id(),
                    ColormapNode {
                        installed: false,
                        ..copy
                    },
                );
                Ok(Response::done())
            }
            Request::InstallColormap(req) => {
                self.colormap_mut(Colormap(req.id))?.installed = true;
                Ok(Response::done())
            }
            Request::UninstallColormap(req) => {
                self.colormap_mut(Colormap(req.id))?.installed = false;
                Ok(Response::done())
            }
            Request::AllocColor(req) => {
                let (pixel, (red, green, blue)) =
                    self.colormap_mut(req.cmap)?.alloc(req.red, req.green, req.blue)?;
                Ok(Response::reply(Reply::AllocColor(AllocColorReply {
                    red,
                    green,
                    blue,
                    pixel,
                })))
            }
            Request::AllocNamedColor(req) => {
                let cmap = self.colormap_mut(req.cmap)?;
                let exact = lookup_named_color(&req.name).ok_or_else(X11Error::bad_name)?;
                let (pixel, visual) = cmap.alloc(exact.0, exact.1, exact.2)?;
                Ok(Response::reply(Reply::AllocNamedColor(
                    AllocNamedColorReply {
                        pixel,
                        exact,
                        visual,
                    },
                )))
            }
            Request::AllocColorCells(req) => {
                let cmap = self.colormap_mut(req.cmap)?;
                if req.colors == 0 {
                    return Err(X11Error::bad_value(0));
                }
                if !cmap.is_dynamic() || req.planes > 0 {
                    return Err(X11Error::bad_alloc());
                }
                let pixels = cmap.alloc_private(req.colors as usize)?;
                Ok(Response::reply(Reply::AllocColorCells(
                    AllocColorCellsReply {
                        pixels,
                        masks: Vec::new(),
                    },
                )))
            }
            Request::AllocColorPlanes(req) => {
                let cmap = self.colormap_mut(req.cmap)?;
                if req.colors == 0 {
                    return Err(X11Error::bad_value(0));
                }
                if !cmap.is_dynamic() || req.reds + req.greens + req.blues > 0 {
                    return Err(X11Error::bad_alloc());
                }
                let pixels = cmap.alloc_private(req.colors as usize)?;
                Ok(Response::reply(Reply::AllocColorPlanes(
                    AllocColorPlanesReply {
                        pixels,
                        red_mask: 0,
                        green_mask: 0,
                        blue_mask: 0,
                    },
                )))
            }
            Request::FreeColors(req) => {
                let cmap = self.colormap_mut(req.cmap)?;
                if !cmap.is_dynamic() {
                    return Ok(Response::done());
                }
                for pixel in &req.pixels {
                    let cell = cmap.cell_mut(*pixel)?;
                    *cell = match *cell {
                        Cell::Free => return Err(X11Error::bad_access(*pixel)),
                        Cell::Shared { rgb, refs } if refs > 1 => Cell::Shared {
                            rgb,
                            refs: refs - 1,
                        },
                        _ => Cell::Free,
                    };
                }
                Ok(Response::done())
            }
            Request::StoreColors(req) => {
                let cmap = self.colormap_mut(req.cmap)?;
                for item in &req.items {
                    cmap.store(item.pixel, item.red, item.green, item.blue, item.flags)?;
                }
                Ok(Response::done())
            }
            Request::StoreNamedColor(req) => {
                let cmap = self.colormap_mut(req.cmap)?;
                let (red, green, blue) =
                    lookup_named_color(&req.name).ok_or_else(X11Error::bad_name)?;
                cmap.store(req.pixel, red, green, blue, req.flags)?;
                Ok(Response::done())
            }
            Request::RenderCreatePicture(req) => {
                self.require_new(req.pid.id())?;
                if !self.drawable_exists(req.drawable) {
                    return Err(X11Error::bad_drawable(req.drawable));
                }
                if req.format == 0 {
                    return Err(X11Error::with_value(ErrorCode::PictFormat, 0));
                }
                self.check_picture_values(&req.values)?;
                self.pictures.insert(
                    req.pid.id(),
                    PictureNode {
                        source: PictureSource::Drawable(req.drawable),
                        values: req.values.clone(),
                        clip_rectangles: Vec::new(),
                    },
                );
                Ok(Response::done())
            }
            Request::RenderChangePicture(req) => {
                self.picture(req.picture)?;
                self.check_picture_values(&req.values)?;
                if let Some(picture) = self.pictures.get_mut(&req.picture.id()) {
                    picture.values.merge(&req.values);
                }
                Ok(Response::done())
            }
            Request::RenderSetPictureClipRectangles(req) => {
                self.picture(req.picture)?;
                if let Some(picture) = self.pictures.get_mut(&req.picture.id()) {
                    picture.clip_rectangles = req
                        .rectangles
                        .iter()
                        .map(|r| {
                            Rectangle::new(
                                r.x.wrapping_add(req.clip_x_origin),
                                r.y.wrapping_add(req.clip_y_origin),
                                r.width,
                                r.height,
                            )
                        })
                        .collect();
                }
                Ok(Response::done())
            }
            Request::RenderFreePicture(req) => {
                self.pictures
                    .remove(&req.id)
                    .ok_or_else(|| X11Error::bad_picture(req.id))?;
                Ok(Response::freed(vec![req.id]))
            }
            Request::RenderComposite(req) => self.composite(req),
            Request::RenderFillRectangles(req) => {
                let target = self.picture_target(req.dst)?;
                let pixel = render_pixel(req.color);
                let surface = self.surface_mut(target)?;
                for r in &req.rectangles {
                    surface.fill(r.x as i32, r.y as i32, r.width as i32, r.height as i32, pixel);
                }
                Ok(Response::done())
            }
            Request::RenderCreateSolidFill(req) => {
                self.require_new(req.pid.id())?;
                self.pictures.insert(
                    req.pid.id(),
                    PictureNode {
                        source: PictureSource::Solid(req.color),
                        values: ValueList::empty(),
                        clip_rectangles: Vec::new(),
                    },
                );
                Ok(Response::done())
            }
            other => {
                log::debug!(
                    "Screen {}: {} is not a single-screen request",
                    self.index,
                    other.opcode()
                );
                Err(X11Error::bad_request())
            }
        }
    }

    /// Validate window attribute values; returns new background pixel and
    /// colormap when present
    fn check_window_values(&self, values: &ValueList) -> X11Result<(Option<u32>, Option<XID>)> {
        let mut background = None;
        let mut colormap = None;
        for (bit, value) in values.iter() {
            match bit {
                window_attr::BACK_PIXMAP => {
                    if value != NONE && value != PARENT_RELATIVE {
                        self.require_pixmap(value)?;
                    }
                }
                window_attr::BACK_PIXEL => background = Some(value),
                window_attr::BORDER_PIXMAP => {
                    if value != COPY_FROM_PARENT {
                        self.require_pixmap(value)?;
                    }
                }
                window_attr::COLORMAP => {
                    if value != COPY_FROM_PARENT {
                        if !self.colormaps.contains_key(&XID(value)) {
                            return Err(X11Error::bad_colormap(XID(value)));
                        }
                        colormap = Some(XID(value));
                    }
                }
                _ => {}
            }
        }
        Ok((background, colormap))
    }

    fn create_window(&mut self, req: &CreateWindowRequest) -> X11Result<Response> {
        let wid = req.wid.id();
        self.require_new(wid)?;
        let parent = self.window(req.parent.id())?;
        let (parent_class, parent_depth, parent_visual, parent_colormap) =
            (parent.class, parent.depth, parent.visual, parent.colormap);

        if req.width == 0 || req.height == 0 {
            return Err(X11Error::bad_value(0));
        }

        let class = match req.class {
            WindowClass::CopyFromParent => parent_class,
            class => class,
        };
        let visual = if req.visual == VisualID::COPY_FROM_PARENT {
            parent_visual
        } else {
            req.visual
        };

        let depth = if class == WindowClass::InputOnly {
            if req.depth != 0 || req.border_width != 0 {
                return Err(X11Error::bad_match(req.depth as u32));
            }
            0
        } else {
            if parent_class == WindowClass::InputOnly {
                return Err(X11Error::bad_match(req.parent.id().get()));
            }
            let info = self
                .info
                .visual(visual)
                .ok_or_else(|| X11Error::bad_match(visual.get()))?;
            let depth = if req.depth == 0 { parent_depth } else { req.depth };
            if depth != info.depth {
                return Err(X11Error::bad_match(depth as u32));
            }
            depth
        };

        let (background, colormap) = self.check_window_values(&req.values)?;
        let surface = (class == WindowClass::InputOutput)
            .then(|| Surface::new(req.width, req.height, depth, background.unwrap_or(0)));

        self.windows.insert(
            wid,
            WindowNode {
                parent: req.parent.id(),
                x: req.x,
                y: req.y,
                width: req.width,
                height: req.height,
                border_width: req.border_width,
                class,
                depth,
                visual,
                mapped: false,
                children: Vec::new(),
                background,
                colormap: colormap.unwrap_or(parent_colormap),
                in_save_set: false,
                surface,
            },
        );
        self.window_mut(req.parent.id())?.children.push(wid);
        Ok(Response::done())
    }

    fn destroy_tree(&mut self, id: XID, freed: &mut Vec<XID>) {
        if let Some(node) = self.windows.remove(&id) {
            for child in node.children.into_iter().rev() {
                self.destroy_tree(child, freed);
            }
            freed.push(id);
        }
    }

    fn set_mapped(&mut self, id: XID, mapped: bool) -> X11Result<Response> {
        let window = self.window_mut(id)?;
        if !window.parent.is_none() {
            window.mapped = mapped;
        }
        Ok(Response::done())
    }

    fn reparent_window(&mut self, req: &ReparentWindowRequest) -> X11Result<Response> {
        let id = req.window.id();
        let new_parent = req.parent.id();
        let old_parent = self.window(id)?.parent;
        self.window(new_parent)?;
        if old_parent.is_none() || self.is_ancestor(id, new_parent) {
            return Err(X11Error::bad_match(id.get()));
        }

        self.window_mut(old_parent)?.children.retain(|c| *c != id);
        self.window_mut(new_parent)?.children.push(id);
        let window = self.window_mut(id)?;
        window.parent = new_parent;
        window.x = req.x;
        window.y = req.y;
        Ok(Response::done())
    }

    fn configure_window(&mut self, req: &ConfigureWindowRequest) -> X11Result<Response> {
        let id = req.window.id();
        let window = self.window(id)?;
        if window.parent.is_none() {
            return Ok(Response::done());
        }
        let parent = window.parent;

        let sibling = req.values.get(config_window::SIBLING).map(XID);
        let stack_mode = req.values.get(config_window::STACK_MODE);
        if let Some(sibling) = sibling {
            if stack_mode.is_none() {
                return Err(X11Error::bad_match(sibling.get()));
            }
            let node = self.window(sibling)?;
            if sibling == id || node.parent != parent {
                return Err(X11Error::bad_match(sibling.get()));
            }
        }
        if let Some(mode) = stack_mode {
            if mode > 4 {
                return Err(X11Error::bad_value(mode));
            }
        }
        for bit in [config_window::WIDTH, config_window::HEIGHT] {
            if req.values.get(bit) == Some(0) {
                return Err(X11Error::bad_value(0));
            }
        }

        let window = self.window_mut(id)?;
        for (bit, value) in req.values.iter() {
            match bit {
                config_window::X => window.x = value as i16,
                config_window::Y => window.y = value as i16,
                config_window::WIDTH => window.width = value as u16,
                config_window::HEIGHT => window.height = value as u16,
                config_window::BORDER_WIDTH => window.border_width = value as u16,
                _ => {}
            }
        }
        let (width, height, fill) = (
            window.width,
            window.height,
            window.background.unwrap_or(0),
        );
        if let Some(surface) = window.surface.as_mut() {
            if surface.width != width || surface.height != height {
                surface.resize(width, height, fill);
            }
        }

        if let Some(mode) = stack_mode {
            let siblings = &mut self.window_mut(parent)?.children;
            siblings.retain(|c| *c != id);
            // Above, TopIf and Opposite raise; Below and BottomIf lower
            let raise = !matches!(mode, 1 | 3);
            let at = match (sibling.and_then(|s| siblings.iter().position(|c| *c == s)), raise) {
                (Some(pos), true) => pos + 1,
                (Some(pos), false) => pos,
                (None, true) => siblings.len(),
                (None, false) => 0,
            };
            siblings.insert(at, id);
        }
        Ok(Response::done())
    }

    fn apply_gc_values(&self, gc: &mut GcNode, values: &ValueList) -> X11Result<()> {
        for (bit, value) in values.iter() {
            match bit {
                gc_attr::FOREGROUND => gc.foreground = value,
                gc_attr::BACKGROUND => gc.background = value,
                gc_attr::TILE => {
                    self.require_pixmap(value)?;
                    gc.tile = XID(value);
                }
                gc_attr::STIPPLE => {
                    self.require_pixmap(value)?;
                    gc.stipple = XID(value);
                }
                gc_attr::CLIP_MASK => {
                    if value != NONE {
                        self.require_pixmap(value)?;
                    }
                    gc.clip_mask = XID(value);
                    gc.clip_rectangles.clear();
                }
                b if b > gc_attr::LAST => return Err(X11Error::bad_value(values.mask)),
                _ => {}
            }
        }
        Ok(())
    }

    fn check_picture_values(&self, values: &ValueList) -> X11Result<()> {
        for (bit, value) in values.iter() {
            match bit {
                picture_attr::ALPHA_MAP if value != NONE => {
                    if !self.pictures.contains_key(&XID(value)) {
                        return Err(X11Error::bad_picture(XID(value)));
                    }
                }
                picture_attr::CLIP_MASK if value != NONE => self.require_pixmap(value)?,
                b if b > picture_attr::LAST => return Err(X11Error::bad_value(values.mask)),
                _ => {}
            }
        }
        Ok(())
    }

    /// Drawable a picture renders into
    fn picture_target(&self, picture: Picture) -> X11Result<XID> {
        match self.picture(picture)?.source {
            PictureSource::Drawable(drawable) => Ok(drawable),
            PictureSource::Solid(_) => Err(X11Error::bad_match(picture.id().get())),
        }
    }

    fn composite(&mut self, req: &CompositeRequest) -> X11Result<Response> {
        let source = self.picture(req.src)?.source;
        if req.mask != Picture::NONE {
            self.picture(req.mask)?;
        }
        let target = self.picture_target(req.dst)?;

        let pixels = match source {
            PictureSource::Solid(color) => {
                vec![Some(render_pixel(color)); req.width as usize * req.height as usize]
            }
            PictureSource::Drawable(drawable) => self.surface(drawable)?.read(
                req.src_x as i32,
                req.src_y as i32,
                req.width,
                req.height,
            ),
        };
        self.surface_mut(target)?
            .write(req.dst_x as i32, req.dst_y as i32, req.width, &pixels);
        Ok(Response::done())
    }

    fn put_image(&mut self, req: &PutImageRequest) -> X11Result<Response> {
        let (fg, bg) = self.gc_colors(req.drawable, req.gc)?;
        let surface = self.surface_mut(req.drawable)?;
        let (width, height) = (req.width as usize, req.height as usize);
        let pad = req.left_pad as usize;

        let pixels: Vec<Option<u32>> = match req.format {
            ImageFormat::ZPixmap => {
                if req.depth != surface.depth || req.left_pad != 0 {
                    return Err(X11Error::bad_match(req.depth as u32));
                }
                let row = image::pixmap_row_bytes(width, req.depth)
                    .ok_or_else(X11Error::bad_length)?;
                if row * height > req.data.len() {
                    return Err(X11Error::bad_length());
                }
                (0..height)
                    .flat_map(|y| (0..width).map(move |x| (x, y)))
                    .map(|(x, y)| Some(image::get_pixel(&req.data, row, req.depth, x, y)))
                    .collect()
            }
            ImageFormat::Bitmap => {
                if req.depth != 1 {
                    return Err(X11Error::bad_match(req.depth as u32));
                }
                let row = image::bitmap_row_bytes(width + pad).ok_or_else(X11Error::bad_length)?;
                if row * height > req.data.len() {
                    return Err(X11Error::bad_length());
                }
                (0..height)
                    .flat_map(|y| (0..width).map(move |x| (x, y)))
                    .map(|(x, y)| {
                        let bit = image::get_pixel(&req.data, row, 1, x + pad, y);
                        Some(if bit != 0 { fg } else { bg })
                    })
                    .collect()
            }
            ImageFormat::XYPixmap => {
                if req.depth != surface.depth {
                    return Err(X11Error::bad_match(req.depth as u32));
                }
                let row = image::bitmap_row_bytes(width + pad).ok_or_else(X11Error::bad_length)?;
                let plane_len = row * height;
                if plane_len * req.depth as usize > req.data.len() {
                    return Err(X11Error::bad_length());
                }
                (0..height)
                    .flat_map(|y| (0..width).map(move |x| (x, y)))
                    .map(|(x, y)| {
                        let pixel = (0..req.depth as usize).fold(0u32, |acc, k| {
                            let plane = &req.data[k * plane_len..(k + 1) * plane_len];
                            let bit = image::get_pixel(plane, row, 1, x + pad, y);
                            acc | bit << (req.depth as usize - 1 - k)
                        });
                        Some(pixel)
                    })
                    .collect()
            }
        };

        surface.write(req.dst_x as i32, req.dst_y as i32, req.width, &pixels);
        Ok(Response::done())
    }

    fn get_image(&self, req: &GetImageRequest) -> X11Result<Response> {
        let (x, y) = (req.x as i32, req.y as i32);
        let (w, h) = (req.width as i32, req.height as i32);

        let (surface, visual) = if let Some(window) = self.windows.get(&req.drawable) {
            if !self.viewable(req.drawable) {
                return Err(X11Error::bad_match(req.drawable.get()));
            }
            let bw = window.border_width as i32;
            let (abs_x, abs_y) = self.interior_origin(req.drawable);
            let inside_border = x >= -bw
                && y >= -bw
                && x + w <= window.width as i32 + bw
                && y + h <= window.height as i32 + bw;
            let on_screen = abs_x + x >= 0
                && abs_y + y >= 0
                && abs_x + x + w <= self.info.width as i32
                && abs_y + y + h <= self.info.height as i32;
            if !inside_border || !on_screen {
                return Err(X11Error::bad_match(req.drawable.get()));
            }
            let surface = window
                .surface
                .as_ref()
                .ok_or_else(|| X11Error::bad_match(req.drawable.get()))?;
            (surface, window.visual)
        } else if let Some(pixmap) = self.pixmaps.get(&req.drawable) {
            if x < 0 || y < 0 || x + w > pixmap.width as i32 || y + h > pixmap.height as i32 {
                return Err(X11Error::bad_match(req.drawable.get()));
            }
            (pixmap, VisualID::new(0))
        } else {
            return Err(X11Error::bad_drawable(req.drawable));
        };

        let depth = surface.depth;
        let pixels: Vec<u32> = surface
            .read(x, y, req.width, req.height)
            .into_iter()
            .map(|p| p.unwrap_or(0) & req.plane_mask)
            .collect();
        let z = image::encode_z(&pixels, req.width as usize, req.height as usize, depth)?;
        let data = match req.format {
            ImageFormat::ZPixmap => z,
            ImageFormat::XYPixmap => image::z_to_xy(
                &z,
                req.width as usize,
                req.height as usize,
                depth,
                req.plane_mask,
            )?,
            ImageFormat::Bitmap => return Err(X11Error::bad_value(0)),
        };

        Ok(Response::reply(Reply::GetImage(GetImageReply {
            depth,
            visual,
            data,
        })))
    }
}

/// Resolve a point list to absolute coordinates
fn absolute_points(mode: CoordMode, points: &[Point]) -> Vec<(i32, i32)> {
    let mut out = Vec::with_capacity(points.len());
    let (mut x, mut y) = (0i32, 0i32);
    for (i, p) in points.iter().enumerate() {
        if mode == CoordMode::Previous && i > 0 {
            x += p.x as i32;
            y += p.y as i32;
        } else {
            x = p.x as i32;
            y = p.y as i32;
        }
        out.push((x, y));
    }
    out
}

fn lock(state: &Mutex<ScreenState>) -> MutexGuard<'_, ScreenState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-memory physical screen
pub struct MemoryBackend {
    state: Arc<Mutex<ScreenState>>,
}

impl MemoryBackend {
    /// Screen `index` of the given size. Root, default colormap and visual
    /// ids are derived from the index so that no two screens share them.
    pub fn new(index: usize, width: u16, height: u16) -> Self {
        MemoryBackend {
            state: Arc::new(Mutex::new(ScreenState::new(index, width, height))),
        }
    }

    /// Handle for inspecting this screen after it has been handed to a server
    pub fn probe(&self) -> ScreenProbe {
        ScreenProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Backend for MemoryBackend {
    fn screen_info(&self) -> ScreenInfo {
        lock(&self.state).info.clone()
    }

    fn dispatch(&mut self, request: &Request) -> X11Result<Response> {
        let mut state = lock(&self.state);
        state.requests.push(request.clone());
        log::debug!("Screen {}: {}", state.index, request.opcode());

        if let Some(code) = state.failures.get(&request.opcode()) {
            log::debug!("Screen {}: injected failure {:?}", state.index, code);
            return Err(X11Error::with_value(*code, 0));
        }
        state.execute(request)
    }

    fn drawable_info(&self, id: XID) -> Option<DrawableInfo> {
        lock(&self.state).drawable_info(id)
    }

    fn window_info(&self, id: XID) -> Option<WindowInfo> {
        lock(&self.state).window_info(id)
    }
}

/// Inspection and failure injection for a [`MemoryBackend`]
#[derive(Clone)]
pub struct ScreenProbe {
    state: Arc<Mutex<ScreenState>>,
}

impl ScreenProbe {
    /// Every request dispatched to the screen, in order
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.state).requests.clone()
    }

    /// Number of dispatched requests with the given opcode
    pub fn count(&self, opcode: Opcode) -> usize {
        lock(&self.state)
            .requests
            .iter()
            .filter(|r| r.opcode() == opcode)
            .count()
    }

    pub fn clear_requests(&self) {
        lock(&self.state).requests.clear();
    }

    /// Make every subsequent request with `opcode` fail with `code`
    pub fn fail_on(&self, opcode: Opcode, code: ErrorCode) {
        lock(&self.state).failures.insert(opcode, code);
    }

    pub fn clear_failures(&self) {
        lock(&self.state).failures.clear();
    }

    /// Whether a resource with this id exists on the screen
    pub fn contains(&self, id: XID) -> bool {
        lock(&self.state).id_in_use(id)
    }

    /// Pixel of a window or pixmap, in drawable coordinates
    pub fn pixel(&self, drawable: XID, x: i32, y: i32) -> Option<u32> {
        let state = lock(&self.state);
        let pixel = state.surface(drawable).ok()?.get(x, y);
        pixel
    }

    pub fn window(&self, id: XID) -> Option<WindowInfo> {
        lock(&self.state).window_info(id)
    }

    pub fn screen_info(&self) -> ScreenInfo {
        lock(&self.state).info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_window(wid: u32, parent: XID, x: i16, y: i16) -> Request {
        Request::CreateWindow(CreateWindowRequest {
            depth: 0,
            wid: Window::new(wid),
            parent: Window(parent),
            x,
            y,
            width: 100,
            height: 50,
            border_width: 2,
            class: WindowClass::InputOutput,
            visual: VisualID::COPY_FROM_PARENT,
            values: ValueList::new(window_attr::BACK_PIXEL, vec![0x123456]),
        })
    }

    #[test]
    fn test_window_tree_geometry() {
        let mut backend = MemoryBackend::new(0, 800, 600);
        let root = backend.screen_info().root;
        backend.dispatch(&create_window(0x10, root, 10, 20)).unwrap();
        backend.dispatch(&create_window(0x11, XID(0x10), 5, 5)).unwrap();

        let child = backend.window_info(XID(0x11)).unwrap();
        assert_eq!((child.abs_x, child.abs_y), (10 + 2 + 5 + 2, 20 + 2 + 5 + 2));
        assert!(!child.viewable);

        backend
            .dispatch(&Request::MapWindow(ResourceRequest::new(XID(0x10))))
            .unwrap();
        backend
            .dispatch(&Request::MapWindow(ResourceRequest::new(XID(0x11))))
            .unwrap();
        assert!(backend.window_info(XID(0x11)).unwrap().viewable);
        assert_eq!(backend.probe().pixel(XID(0x11), 0, 0), Some(0x123456));
    }

    #[test]
    fn test_destroy_reports_subtree() {
        let mut backend = MemoryBackend::new(0, 800, 600);
        let root = backend.screen_info().root;
        backend.dispatch(&create_window(0x10, root, 0, 0)).unwrap();
        backend.dispatch(&create_window(0x11, XID(0x10), 0, 0)).unwrap();

        let response = backend
            .dispatch(&Request::DestroyWindow(ResourceRequest::new(XID(0x10))))
            .unwrap();
        assert_eq!(response.freed, vec![XID(0x11), XID(0x10)]);
        assert!(backend.window_info(root).unwrap().children.is_empty());
    }

    #[test]
    fn test_duplicate_id_is_bad_id_choice() {
        let mut backend = MemoryBackend::new(0, 800, 600);
        let root = backend.screen_info().root;
        backend.dispatch(&create_window(0x10, root, 0, 0)).unwrap();
        let err = backend.dispatch(&create_window(0x10, root, 0, 0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::IDChoice);
    }

    #[test]
    fn test_pseudo_color_cells_share_and_free() {
        let mut backend = MemoryBackend::new(1, 800, 600);
        let info = backend.screen_info();
        let pseudo = info.visuals[1].visual_id;
        backend
            .dispatch(&Request::CreateColormap(CreateColormapRequest {
                alloc: 0,
                mid: Colormap::new(0x30),
                window: Window(info.root),
                visual: pseudo,
            }))
            .unwrap();

        let alloc = Request::AllocColor(AllocColorRequest {
            cmap: Colormap::new(0x30),
            red: 0xffff,
            green: 0,
            blue: 0,
        });
        let first = backend.dispatch(&alloc).unwrap().reply;
        let second = backend.dispatch(&alloc).unwrap().reply;
        assert_eq!(first, second);

        let free = Request::FreeColors(FreeColorsRequest {
            cmap: Colormap::new(0x30),
            plane_mask: 0,
            pixels: vec![0],
        });
        backend.dispatch(&free).unwrap();
        backend.dispatch(&free).unwrap();
        let err = backend.dispatch(&free).unwrap_err();
        assert_eq!(err.code, ErrorCode::Access);
    }

    #[test]
    fn test_true_color_alloc_rounds_channels() {
        let mut backend = MemoryBackend::new(0, 800, 600);
        let cmap = Colormap(backend.screen_info().default_colormap);
        let response = backend
            .dispatch(&Request::AllocColor(AllocColorRequest {
                cmap,
                red: 0x12ff,
                green: 0x3400,
                blue: 0x56aa,
            }))
            .unwrap();
        assert_eq!(
            response.reply,
            Some(Reply::AllocColor(AllocColorReply {
                red: 0x1212,
                green: 0x3434,
                blue: 0x5656,
                pixel: 0x123456,
            }))
        );
    }

    #[test]
    fn test_injected_failure_is_recorded() {
        let mut backend = MemoryBackend::new(0, 800, 600);
        let probe = backend.probe();
        let opcode = Opcode::Core(RequestOpcode::MapWindow);
        probe.fail_on(opcode, ErrorCode::Alloc);

        let root = backend.screen_info().root;
        let err = backend
            .dispatch(&Request::MapWindow(ResourceRequest::new(root)))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Alloc);
        assert_eq!(probe.count(opcode), 1);
    }

    #[test]
    fn test_get_image_reads_root_pixels() {
        let mut backend = MemoryBackend::new(0, 64, 64);
        let root = backend.screen_info().root;
        backend
            .dispatch(&Request::CreateGC(CreateGCRequest {
                cid: GContext::new(0x40),
                drawable: root,
                values: ValueList::new(gc_attr::FOREGROUND, vec![0xabcdef]),
            }))
            .unwrap();
        backend
            .dispatch(&Request::PolyPoint(PolyPointRequest {
                coordinate_mode: CoordMode::Previous,
                drawable: root,
                gc: GContext::new(0x40),
                points: vec![Point::new(1, 1), Point::new(1, 0)],
            }))
            .unwrap();

        let response = backend
            .dispatch(&Request::GetImage(GetImageRequest {
                format: ImageFormat::ZPixmap,
                drawable: root,
                x: 0,
                y: 1,
                width: 3,
                height: 1,
                plane_mask: u32::MAX,
            }))
            .unwrap();
        match response.reply {
            Some(Reply::GetImage(reply)) => {
                assert_eq!(reply.depth, 24);
                assert_eq!(image::get_pixel(&reply.data, 12, 24, 1, 0), 0xabcdef);
                assert_eq!(image::get_pixel(&reply.data, 12, 24, 2, 0), 0xabcdef);
                assert_eq!(image::get_pixel(&reply.data, 12, 24, 0, 0), 0);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
