//! Request fanout
//!
//! A logical request is replayed once per physical screen. Before each replay
//! the request is restored from an untouched snapshot, then its ids and
//! root-relative coordinates are rewritten for the screen at hand.

use crate::backend::Backend;
use crate::protocol::*;
use crate::screens::{Order, ScreenIndex};

/// Which screen's reply becomes the client's reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    None,
    Primary,
}

/// How one opcode is replayed across the screens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutDirective {
    pub order: Order,
    pub stop_on_first_failure: bool,
    pub reply_source: ReplySource,
}

impl FanoutDirective {
    pub const fn forward() -> Self {
        FanoutDirective {
            order: Order::Forward,
            stop_on_first_failure: true,
            reply_source: ReplySource::None,
        }
    }

    pub const fn backward() -> Self {
        FanoutDirective {
            order: Order::Backward,
            stop_on_first_failure: true,
            reply_source: ReplySource::None,
        }
    }

    /// Keep going after a failure; the first one is still reported
    pub const fn continue_on_failure(mut self) -> Self {
        self.stop_on_first_failure = false;
        self
    }

    pub const fn reply_from_primary(mut self) -> Self {
        self.reply_source = ReplySource::Primary;
        self
    }
}

/// Directive of every request replayed across screens. Read-only requests
/// whose reply is synthesized have none.
pub fn directive_for(opcode: Opcode) -> Option<FanoutDirective> {
    use RequestOpcode as Op;

    let directive = match opcode {
        Opcode::Core(op) => match op {
            Op::MapWindow
            | Op::MapSubwindows
            | Op::UnmapWindow
            | Op::UnmapSubwindows
            | Op::ConfigureWindow
            | Op::CirculateWindow
            | Op::PolyPoint
            | Op::PolyLine
            | Op::PolySegment
            | Op::PolyRectangle
            | Op::PolyArc
            | Op::FillPoly
            | Op::PolyFillRectangle
            | Op::PolyFillArc => FanoutDirective::forward(),

            Op::ChangeWindowAttributes | Op::FreeColors => {
                FanoutDirective::backward().continue_on_failure()
            }

            Op::AllocColor | Op::AllocNamedColor | Op::AllocColorCells | Op::AllocColorPlanes => {
                FanoutDirective::backward().reply_from_primary()
            }

            Op::CreateWindow
            | Op::DestroyWindow
            | Op::DestroySubwindows
            | Op::ChangeSaveSet
            | Op::ReparentWindow
            | Op::CreatePixmap
            | Op::FreePixmap
            | Op::CreateGC
            | Op::ChangeGC
            | Op::CopyGC
            | Op::SetDashes
            | Op::SetClipRectangles
            | Op::FreeGC
            | Op::ClearArea
            | Op::CopyArea
            | Op::CopyPlane
            | Op::PutImage
            | Op::PolyText8
            | Op::PolyText16
            | Op::ImageText8
            | Op::ImageText16
            | Op::CreateColormap
            | Op::FreeColormap
            | Op::CopyColormapAndFree
            | Op::InstallColormap
            | Op::UninstallColormap
            | Op::StoreColors
            | Op::StoreNamedColor => FanoutDirective::backward(),

            _ => return None,
        },
        Opcode::Render(op) => match op {
            RenderOpcode::Composite | RenderOpcode::FillRectangles => FanoutDirective::forward(),
            RenderOpcode::CreatePicture
            | RenderOpcode::ChangePicture
            | RenderOpcode::SetPictureClipRectangles
            | RenderOpcode::FreePicture
            | RenderOpcode::CreateSolidFill => FanoutDirective::backward(),
        },
        Opcode::Xinerama(_) => return None,
    };
    Some(directive)
}

/// Request-scoped copy of a request: an immutable snapshot and the live copy
/// handed to the rewrite step
#[derive(Debug)]
pub struct ReplayBuffer<T> {
    snapshot: T,
    live: T,
}

impl<T: Clone> ReplayBuffer<T> {
    pub fn new(request: T) -> Self {
        ReplayBuffer {
            live: request.clone(),
            snapshot: request,
        }
    }

    /// Undo every rewrite made since the last restore
    pub fn restore(&mut self) {
        self.live.clone_from(&self.snapshot);
    }

    pub fn snapshot(&self) -> &T {
        &self.snapshot
    }

    pub fn live(&self) -> &T {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut T {
        &mut self.live
    }
}

/// Result of replaying one request
#[derive(Debug)]
pub struct FanoutOutcome {
    /// First failure, or success
    pub status: X11Result<()>,
    /// Screens that executed the request, in visiting order
    pub completed: Vec<ScreenIndex>,
    pub reply: Option<Reply>,
    /// Physical ids each screen reported as freed
    pub freed: Vec<(ScreenIndex, XID)>,
}

impl FanoutOutcome {
    pub fn into_result(self) -> X11Result<Option<Reply>> {
        self.status.map(|_| self.reply)
    }
}

/// Replay `request` on `screens` in the given order.
///
/// `rewrite` adapts the live copy to one screen; an error from it counts as
/// that screen's failure. `wrap` turns the typed request into the value the
/// backend executes.
pub fn run<T, W, R>(
    backends: &mut [Box<dyn Backend>],
    directive: FanoutDirective,
    screens: &[ScreenIndex],
    request: T,
    wrap: W,
    mut rewrite: R,
) -> FanoutOutcome
where
    T: Clone,
    W: Fn(T) -> Request,
    R: FnMut(&mut T, ScreenIndex) -> X11Result<()>,
{
    let mut buffer = ReplayBuffer::new(request);
    let mut outcome = FanoutOutcome {
        status: Ok(()),
        completed: Vec::new(),
        reply: None,
        freed: Vec::new(),
    };
    let mut replies: Vec<(ScreenIndex, Reply)> = Vec::new();

    for (n, &screen) in screens.iter().enumerate() {
        if n > 0 {
            buffer.restore();
        }

        let result = rewrite(buffer.live_mut(), screen).and_then(|_| {
            let request = wrap(buffer.live().clone());
            log::debug!("Fanout {} to {}", request.opcode(), screen);
            match backends.get_mut(screen.0) {
                Some(backend) => backend.dispatch(&request),
                None => Err(X11Error::implementation_error()),
            }
        });

        match result {
            Ok(response) => {
                outcome.completed.push(screen);
                if let Some(reply) = response.reply {
                    replies.push((screen, reply));
                }
                outcome
                    .freed
                    .extend(response.freed.into_iter().map(|id| (screen, id)));
            }
            Err(err) => {
                log::debug!("Fanout failed on {}: {}", screen, err);
                if outcome.status.is_ok() {
                    outcome.status = Err(err);
                }
                if directive.stop_on_first_failure {
                    break;
                }
            }
        }
    }

    if directive.reply_source == ReplySource::Primary && outcome.status.is_ok() {
        outcome.reply = replies
            .into_iter()
            .find(|(screen, _)| screen.is_primary())
            .map(|(_, reply)| reply);
    }
    outcome
}
