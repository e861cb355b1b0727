//! Opcode to handler table
//!
//! Every handled request has one entry. Extensions and tests can swap an
//! entry out; `replace` hands back the handler that was installed before.

use super::Server;
use crate::protocol::*;
use crate::security::ClientId;
use std::collections::HashMap;
use std::sync::Arc;

/// Handler of one opcode
pub trait RequestHandler: Send + Sync {
    fn handle(
        &self,
        server: &mut Server,
        client: ClientId,
        request: &Request,
    ) -> X11Result<Option<Reply>>;
}

impl<F> RequestHandler for F
where
    F: Fn(&mut Server, ClientId, &Request) -> X11Result<Option<Reply>> + Send + Sync,
{
    fn handle(
        &self,
        server: &mut Server,
        client: ClientId,
        request: &Request,
    ) -> X11Result<Option<Reply>> {
        self(server, client, request)
    }
}

pub type Handler = Arc<dyn RequestHandler>;

/// Dispatch table
#[derive(Default, Clone)]
pub struct Dispatcher {
    handlers: HashMap<Opcode, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher::default()
    }

    pub fn register(&mut self, opcode: Opcode, handler: impl RequestHandler + 'static) {
        self.handlers.insert(opcode, Arc::new(handler));
    }

    /// Install `handler` for `opcode`, returning the previous one
    pub fn replace(&mut self, opcode: Opcode, handler: Handler) -> Option<Handler> {
        self.handlers.insert(opcode, handler)
    }

    pub fn get(&self, opcode: Opcode) -> Option<Handler> {
        self.handlers.get(&opcode).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Register a handler that unpacks one `Request` variant and forwards it to a
/// `Server` method taking the client and the typed request
macro_rules! route {
    ($dispatcher:expr, $opcode:expr, $variant:ident => $method:ident) => {
        $dispatcher.register(
            $opcode,
            |server: &mut Server, client: ClientId, request: &Request| match request {
                Request::$variant(req) => server.$method(client, req),
                _ => Err(X11Error::implementation_error()),
            },
        )
    };
}

pub(crate) use route;
