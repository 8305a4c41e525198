/// Hub configuration loading.
pub mod config;
/// Interactive console: banner, command parsing, REPL.
pub mod console;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Hierarchical Pub/Sub: Hub, channel nodes, subscribers.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Status codes and error types.
pub use chanhub_error::{
    AskOp, ErrorExt, HubError, HubResult, LogLevel, RecvError, StatusCode, TryRecvError,
};
/// config
pub use config::{HubConfig, Settings};
/// Logging setup.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Pub/Sub API.
pub use pubsub::{
    mailbox, split_channel, Ack, Delivery, Envelope, Hub, HubStats, HubStatsSnapshot, Mailbox,
    NodeHandle, ReplyTo, RouteReport, Routee, RouteeId, RouteeKind, RoutingTable, Subscriber,
};
