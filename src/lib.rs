#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # xdgrs: the server-side xdg-shell protocol core
//!
//! This crate implements the role-bearing surface state machine and configure/commit
//! handshake of the `xdg_shell` Wayland protocol extension, together with the popup grab
//! chain that enforces the protocol's strict nesting and input-redirection rules.
//!
//! ## Structure of the crate
//!
//! [`wayland::shell::xdg`] is the core of this crate: the positioner, the per-role surface
//! state machine, the configure queue, and the popup grab chain all live there.
//! [`wayland::compositor`] provides the minimal double-buffered surface primitive (roles,
//! cached state, commit hooks) that [`wayland::shell::xdg`] is built on top of; it is
//! intentionally small, as damage tracking, rendering, and subsurfaces are out of scope.
//! [`input`] exposes only the seat-facing grab contracts xdg-shell installs against
//! (`PointerGrab`, `KeyboardGrab`) -- a full seat implementation is left to the embedding
//! compositor. [`utils`] contains geometry and bookkeeping helpers shared by all of the
//! above.
//!
//! ## General principles
//!
//! Like the rest of the Smithay family this crate is built around [`calloop`], a
//! callback-oriented event loop. There is no internal parallelism: all mutation happens in
//! event-loop callbacks (client message dispatch, idle tasks used to coalesce configures,
//! and timer callbacks for the ping-pong keepalive). See [`wayland::shell::xdg`] for a
//! complete walk-through of wiring up
//! [`XdgShellState`](wayland::shell::xdg::XdgShellState) and implementing
//! [`XdgShellHandler`](wayland::shell::xdg::XdgShellHandler).

pub mod input;
pub mod utils;
pub mod wayland;

pub mod reexports;
