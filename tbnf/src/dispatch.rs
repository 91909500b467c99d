//! Handler Dispatch: routes a decoded message to a user-supplied per-type handler, with a
//! default fallback for tags that were registered but never bound (§4.3).

use crate::error::DispatchError;
use crate::message::WireMessage;
use crate::net::frame::Envelope;
use crate::registry::{MessageRegistry, TypeTag};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

type TypedHandler<C> = Box<dyn Fn(&C, Box<dyn Any + Send + Sync>) + Send + Sync>;
type DefaultHandler<C> = Box<dyn Fn(&C, TypeTag) + Send + Sync>;

/// Builds a [`HandlerDispatch`] table. Bindings are resolved against an already-built
/// [`MessageRegistry`], so `on`/`ignore` can be called in any order.
pub struct HandlerDispatchBuilder<C> {
    registry: Arc<MessageRegistry>,
    handlers: HashMap<TypeTag, TypedHandler<C>>,
}

impl<C: 'static> HandlerDispatchBuilder<C> {
    pub fn new(registry: Arc<MessageRegistry>) -> HandlerDispatchBuilder<C> {
        HandlerDispatchBuilder {
            registry,
            handlers: HashMap::new(),
        }
    }

    /// Bind a handler for messages of variant `M`. Fails if a handler (or an `ignore`) is
    /// already bound for `M`'s tag.
    pub fn on<M, F>(mut self, handler: F) -> Result<Self, DispatchError>
    where
        M: WireMessage,
        F: Fn(&C, M) + Send + Sync + 'static,
    {
        let tag = self.tag_of::<M>();
        self.bind(tag, Box::new(move |ctx, payload| {
            if let Ok(message) = payload.downcast::<M>() {
                handler(ctx, *message);
            }
        }))?;
        Ok(self)
    }

    /// Bind variant `M` to a no-op sink, per the constructor's "ignored variants" set (§4.3).
    pub fn ignore<M: WireMessage>(mut self) -> Result<Self, DispatchError> {
        let tag = self.tag_of::<M>();
        self.bind(tag, Box::new(|_ctx, _payload| {}))?;
        Ok(self)
    }

    pub fn build(self) -> HandlerDispatch<C> {
        HandlerDispatch {
            handlers: self.handlers,
            default_handler: Box::new(|_ctx, tag| {
                eprintln!("tbnf: unhandled message with type tag {}", tag);
            }),
        }
    }

    fn tag_of<M: WireMessage>(&self) -> TypeTag {
        self.registry
            .tag_of::<M>()
            .unwrap_or_else(|| panic!("{} must be registered before a handler is bound", M::CANONICAL_NAME))
    }

    fn bind(&mut self, tag: TypeTag, handler: TypedHandler<C>) -> Result<(), DispatchError> {
        if self.handlers.contains_key(&tag) {
            return Err(DispatchError::DuplicateHandler(tag));
        }
        self.handlers.insert(tag, handler);
        Ok(())
    }
}

/// Routes decoded messages to their bound handler, or to [`Self::with_default_handler`]'s
/// fallback when a registered tag has no binding.
pub struct HandlerDispatch<C> {
    handlers: HashMap<TypeTag, TypedHandler<C>>,
    default_handler: DefaultHandler<C>,
}

impl<C> HandlerDispatch<C> {
    /// Override the fallback invoked for a recognized-but-unbound tag. The built-in default
    /// prints a diagnostic to stderr.
    pub fn with_default_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&C, TypeTag) + Send + Sync + 'static,
    {
        self.default_handler = Box::new(handler);
        self
    }

    /// `message == None` is treated as a cancelled/unrecognized read and is a silent no-op
    /// (§4.3). Otherwise route by tag, falling back to the default handler.
    pub fn handle(&self, ctx: &C, message: Option<Envelope>) {
        let envelope = match message {
            Some(envelope) => envelope,
            None => return,
        };

        match self.handlers.get(&envelope.tag) {
            Some(handler) => handler(ctx, envelope.payload),
            None => (self.default_handler)(ctx, envelope.tag),
        }
    }
}
