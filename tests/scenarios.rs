//! End-to-end scenarios driving the server through its public API over
//! in-memory screens.

use x11panorama::protocol::*;
use x11panorama::security::SecurityPolicy;
use x11panorama::{ScreenGeometry, ScreenIndex, ScreenProbe, Server};

fn layout(screens: &[(i32, u16)], height: u16) -> Vec<ScreenGeometry> {
    screens
        .iter()
        .map(|&(x, width)| ScreenGeometry {
            x,
            y: 0,
            width,
            height,
        })
        .collect()
}

fn server(screens: &[(i32, u16)], policy: SecurityPolicy) -> (Server, Vec<ScreenProbe>) {
    Server::with_memory_screens(&layout(screens, 480), policy).unwrap()
}

fn two_screens() -> (Server, Vec<ScreenProbe>) {
    server(&[(0, 640), (640, 640)], SecurityPolicy::permissive())
}

fn create_window(wid: u32, parent: XID, x: i16, y: i16, width: u16) -> Request {
    Request::CreateWindow(CreateWindowRequest {
        depth: 0,
        wid: Window::new(wid),
        parent: Window(parent),
        x,
        y,
        width,
        height: 50,
        border_width: 0,
        class: WindowClass::InputOutput,
        visual: VisualID::COPY_FROM_PARENT,
        values: ValueList::new(window_attr::BACK_PIXEL, vec![0x00ff00]),
    })
}

fn create_gc(cid: u32, drawable: XID, foreground: u32) -> Request {
    Request::CreateGC(CreateGCRequest {
        cid: GContext::new(cid),
        drawable,
        values: ValueList::new(gc_attr::FOREGROUND, vec![foreground]),
    })
}

fn create_pixmap(pid: u32, drawable: XID, width: u16, height: u16) -> Request {
    Request::CreatePixmap(CreatePixmapRequest {
        depth: 24,
        pid: Pixmap::new(pid),
        drawable,
        width,
        height,
    })
}

fn sent<T>(probe: &ScreenProbe, pick: impl Fn(Request) -> Option<T>) -> Vec<T> {
    probe.requests().into_iter().filter_map(pick).collect()
}

#[test]
fn test_top_level_window_lands_off_screen_on_the_right_screen() {
    let layout = layout(&[(0, 1920), (1920, 1920)], 1080);
    let (mut server, probes) =
        Server::with_memory_screens(&layout, SecurityPolicy::permissive()).unwrap();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();

    server
        .handle(client, &create_window(0x0020_0001, root, 100, 50, 200))
        .unwrap();

    let pick = |r| match r {
        Request::CreateWindow(req) => Some((req.x, req.y)),
        _ => None,
    };
    assert_eq!(sent(&probes[0], pick), vec![(100, 50)]);
    assert_eq!(sent(&probes[1], pick), vec![(-1820, 50)]);
}

#[test]
fn test_root_points_are_moved_for_the_second_screen_only() {
    let (mut server, probes) = server(&[(0, 800), (800, 800)], SecurityPolicy::permissive());
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server.handle(client, &create_gc(0x0020_0020, root, 0xffffff)).unwrap();

    let original = PolyPointRequest {
        coordinate_mode: CoordMode::Origin,
        drawable: root,
        gc: GContext::new(0x0020_0020),
        points: vec![Point::new(810, 10), Point::new(900, 20), Point::new(1000, 30)],
    };
    server
        .handle(client, &Request::PolyPoint(original.clone()))
        .unwrap();

    let pick = |r| match r {
        Request::PolyPoint(req) => Some(req),
        _ => None,
    };
    assert_eq!(sent(&probes[0], pick), vec![original]);
    let second = sent(&probes[1], pick);
    let xs: Vec<i16> = second[0].points.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![10, 100, 200]);
}

#[test]
fn test_relative_points_move_only_the_first() {
    let (mut server, probes) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server.handle(client, &create_gc(0x0020_0020, root, 1)).unwrap();

    server
        .handle(
            client,
            &Request::PolyLine(PolyPointRequest {
                coordinate_mode: CoordMode::Previous,
                drawable: root,
                gc: GContext::new(0x0020_0020),
                points: vec![Point::new(700, 10), Point::new(5, 5)],
            }),
        )
        .unwrap();

    let second = sent(&probes[1], |r| match r {
        Request::PolyLine(req) => Some(req),
        _ => None,
    });
    assert_eq!(second[0].points, vec![Point::new(60, 10), Point::new(5, 5)]);
}

#[test]
fn test_freed_pixmap_is_gone_everywhere() {
    let (mut server, probes) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server
        .handle(client, &create_pixmap(0x0020_0010, root, 16, 16))
        .unwrap();

    let free = Request::FreePixmap(ResourceRequest::new(XID(0x0020_0010)));
    server.handle(client, &free).unwrap();
    let opcode = Opcode::Core(RequestOpcode::FreePixmap);
    assert_eq!(probes[0].count(opcode) + probes[1].count(opcode), 2);

    let err = server.handle(client, &free).unwrap_err();
    assert_eq!(err.code, ErrorCode::Pixmap);
    assert_eq!(probes[0].count(opcode) + probes[1].count(opcode), 2);
}

#[test]
fn test_alloc_color_calls_each_screen_once() {
    let (mut server, probes) = server(
        &[(0, 640), (640, 640), (1280, 640)],
        SecurityPolicy::permissive(),
    );
    let client = server.register_client(ByteOrder::LSBFirst);
    let cmap = server.default_colormap();

    let reply = server
        .handle(
            client,
            &Request::AllocColor(AllocColorRequest {
                cmap,
                red: 0x1234,
                green: 0x5678,
                blue: 0x9abc,
            }),
        )
        .unwrap();
    assert!(matches!(reply, Some(Reply::AllocColor(_))));

    let opcode = Opcode::Core(RequestOpcode::AllocColor);
    let calls: Vec<usize> = probes.iter().map(|p| p.count(opcode)).collect();
    assert_eq!(calls, vec![1, 1, 1]);
}

#[test]
fn test_first_failure_stops_the_walk() {
    let (mut server, probes) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server.handle(client, &create_gc(0x0020_0020, root, 1)).unwrap();
    probes[1].fail_on(Opcode::Core(RequestOpcode::ChangeGC), ErrorCode::Alloc);

    let err = server
        .handle(
            client,
            &Request::ChangeGC(ChangeGCRequest {
                gc: GContext::new(0x0020_0020),
                values: ValueList::new(gc_attr::FOREGROUND, vec![2]),
            }),
        )
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Alloc);
    assert_eq!(err.major_opcode, RequestOpcode::ChangeGC as u8);
    assert_eq!(probes[0].count(Opcode::Core(RequestOpcode::ChangeGC)), 0);
}

#[test]
fn test_forward_failure_leaves_later_screens_untouched() {
    let (mut server, probes) = server(
        &[(0, 640), (640, 640), (1280, 640)],
        SecurityPolicy::permissive(),
    );
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server
        .handle(client, &create_window(0x0020_0001, root, 600, 0, 800))
        .unwrap();
    let map = Opcode::Core(RequestOpcode::MapWindow);
    probes[1].fail_on(map, ErrorCode::Alloc);

    let err = server
        .handle(client, &Request::MapWindow(ResourceRequest::new(XID(0x0020_0001))))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Alloc);
    let calls: Vec<usize> = probes.iter().map(|p| p.count(map)).collect();
    assert_eq!(calls, vec![1, 1, 0]);
}

#[test]
fn test_destroy_removes_the_tree_on_three_screens() {
    let (mut server, probes) = server(
        &[(0, 640), (640, 640), (1280, 640)],
        SecurityPolicy::permissive(),
    );
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server
        .handle(client, &create_window(0x0020_0001, root, 600, 0, 800))
        .unwrap();
    server
        .handle(client, &create_window(0x0020_0002, XID(0x0020_0001), 5, 5, 20))
        .unwrap();
    let parent = server.physical_ids(XID(0x0020_0001)).unwrap();
    let child = server.physical_ids(XID(0x0020_0002)).unwrap();
    assert_eq!(parent.len(), 3);

    server
        .handle(client, &Request::DestroyWindow(ResourceRequest::new(XID(0x0020_0001))))
        .unwrap();

    for (i, probe) in probes.iter().enumerate() {
        let screen = ScreenIndex(i);
        assert!(!probe.contains(parent[&screen]));
        assert!(!probe.contains(child[&screen]));
    }
    assert!(!server.table().contains(XID(0x0020_0001)));
    assert!(!server.table().contains(XID(0x0020_0002)));
}

#[test]
fn test_shared_pixmap_is_drawn_once() {
    let (mut server, probes) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server
        .handle(client, &create_pixmap(0x0020_0010, root, 16, 16))
        .unwrap();
    server.handle(client, &create_gc(0x0020_0020, root, 7)).unwrap();
    server.adopt_shared_pixmap(XID(0x0020_0010)).unwrap();

    server
        .handle(
            client,
            &Request::PolyFillRectangle(PolyRectangleRequest {
                drawable: XID(0x0020_0010),
                gc: GContext::new(0x0020_0020),
                rectangles: vec![Rectangle::new(0, 0, 4, 4)],
            }),
        )
        .unwrap();

    let opcode = Opcode::Core(RequestOpcode::PolyFillRectangle);
    assert_eq!(probes[0].count(opcode), 1);
    assert_eq!(probes[1].count(opcode), 0);
    assert_eq!(probes[0].pixel(XID(0x0020_0010), 1, 1), Some(7));
}

#[test]
fn test_window_to_pixmap_copy_reads_every_screen() {
    let (mut server, probes) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    let window = XID(0x0020_0001);
    server
        .handle(client, &create_window(window.get(), root, 600, 0, 100))
        .unwrap();
    server
        .handle(client, &Request::MapWindow(ResourceRequest::new(window)))
        .unwrap();
    server.handle(client, &create_gc(0x0020_0020, window, 0xff00ff)).unwrap();
    server
        .handle(client, &create_pixmap(0x0020_0010, window, 100, 50))
        .unwrap();

    // Column 50 of the window is shown by screen 1
    server
        .handle(
            client,
            &Request::PolyPoint(PolyPointRequest {
                coordinate_mode: CoordMode::Origin,
                drawable: window,
                gc: GContext::new(0x0020_0020),
                points: vec![Point::new(50, 5), Point::new(10, 5)],
            }),
        )
        .unwrap();

    server
        .handle(
            client,
            &Request::CopyArea(CopyAreaRequest {
                src_drawable: window,
                dst_drawable: XID(0x0020_0010),
                gc: GContext::new(0x0020_0020),
                src_x: 0,
                src_y: 0,
                dst_x: 0,
                dst_y: 0,
                width: 100,
                height: 50,
            }),
        )
        .unwrap();

    let pixmap = server.physical_ids(XID(0x0020_0010)).unwrap();
    for (screen, id) in pixmap {
        let probe = &probes[screen.0];
        assert_eq!(probe.pixel(id, 50, 5), Some(0xff00ff));
        assert_eq!(probe.pixel(id, 10, 5), Some(0xff00ff));
        assert_eq!(probe.pixel(id, 70, 20), Some(0x00ff00));
        assert_eq!(probe.count(Opcode::Core(RequestOpcode::PutImage)), 1);
        assert_eq!(probe.count(Opcode::Core(RequestOpcode::CopyArea)), 0);
    }
}

#[test]
fn test_geometry_over_the_wire_reports_the_desktop() {
    let (mut server, _) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id().get();

    let mut bytes = vec![RequestOpcode::GetGeometry as u8, 0, 2, 0];
    bytes.extend_from_slice(&root.to_le_bytes());
    let output = server.process(client, &bytes);

    assert_eq!(output.len(), 32);
    assert_eq!(output[0], 1);
    assert_eq!(u16::from_le_bytes([output[2], output[3]]), 1);
    assert_eq!(u16::from_le_bytes([output[16], output[17]]), 1280);
    assert_eq!(u16::from_le_bytes([output[18], output[19]]), 480);
}

#[test]
fn test_closing_a_client_frees_its_composites() {
    let (mut server, probes) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server
        .handle(client, &create_window(0x0020_0001, root, 10, 10, 50))
        .unwrap();
    server
        .handle(client, &create_window(0x0020_0002, XID(0x0020_0001), 0, 0, 10))
        .unwrap();
    server.handle(client, &create_gc(0x0020_0020, root, 1)).unwrap();
    server
        .handle(client, &create_pixmap(0x0020_0010, root, 8, 8))
        .unwrap();
    let before = server.table().len();
    let pixmap = server.physical_ids(XID(0x0020_0010)).unwrap();

    server.close_client(client);

    assert_eq!(server.table().len(), before - 4);
    for id in [0x0020_0001, 0x0020_0002, 0x0020_0020, 0x0020_0010] {
        assert!(!server.table().contains(XID(id)));
    }
    assert!(!probes[1].contains(pixmap[&ScreenIndex(1)]));
    assert!(server.table().contains(server.root_window().id()));
}

#[test]
fn test_isolation_blocks_foreign_destroy() {
    let (mut server, probes) = server(&[(0, 640), (640, 640)], SecurityPolicy::strict());
    let owner = server.register_client(ByteOrder::LSBFirst);
    let intruder = server.register_client(ByteOrder::LSBFirst);
    let root = server.root_window().id();
    server
        .handle(owner, &create_window(0x0020_0001, root, 10, 10, 50))
        .unwrap();

    let err = server
        .handle(
            intruder,
            &Request::DestroyWindow(ResourceRequest::new(XID(0x0020_0001))),
        )
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Access);
    assert_eq!(probes[0].count(Opcode::Core(RequestOpcode::DestroyWindow)), 0);

    // Reading the shared root is denied under the strict policy
    let err = server
        .handle(
            intruder,
            &Request::GetImage(GetImageRequest {
                format: ImageFormat::ZPixmap,
                drawable: root,
                x: 0,
                y: 0,
                width: 4,
                height: 4,
                plane_mask: u32::MAX,
            }),
        )
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Access);
}

#[test]
fn test_screen_saver_draws_in_desktop_coordinates() {
    let (mut server, probes) = two_screens();
    let client = server.register_client(ByteOrder::LSBFirst);
    let saver = server.create_screen_saver().unwrap().id();
    server.handle(client, &create_gc(0x0020_0020, saver, 3)).unwrap();

    server
        .handle(
            client,
            &Request::PolyPoint(PolyPointRequest {
                coordinate_mode: CoordMode::Origin,
                drawable: saver,
                gc: GContext::new(0x0020_0020),
                points: vec![Point::new(650, 1)],
            }),
        )
        .unwrap();

    let saver1 = server.physical_ids(saver).unwrap()[&ScreenIndex(1)];
    assert_eq!(probes[1].pixel(saver1, 10, 1), Some(3));
}
