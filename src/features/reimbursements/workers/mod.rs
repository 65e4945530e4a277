mod event_dispatcher;

pub use event_dispatcher::EventDispatcher;
