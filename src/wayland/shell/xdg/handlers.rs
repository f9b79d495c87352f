//! `Dispatch`/`GlobalDispatch` implementations for every object `xdg_shell` hands out.

use wayland_protocols::xdg::shell::server::{
    xdg_popup::XdgPopup, xdg_positioner::XdgPositioner, xdg_surface::XdgSurface, xdg_toplevel::XdgToplevel,
    xdg_wm_base::XdgWmBase,
};
use wayland_server::{Dispatch, GlobalDispatch};

use super::XdgShellHandler;

mod wm_base;
pub use wm_base::XdgWmBaseUserData;

mod positioner;
pub use positioner::XdgPositionerUserData;

mod surface;
pub use surface::{XdgPopupUserData, XdgSurfaceUserData, XdgToplevelUserData};

/// Every `Dispatch`/`GlobalDispatch` bound `xdg_shell` needs from the embedding
/// compositor state, bundled so [`super::XdgShellState::new`] only has to name one bound.
pub trait XdgShellDispatch:
    GlobalDispatch<XdgWmBase, ()>
    + Dispatch<XdgWmBase, XdgWmBaseUserData>
    + Dispatch<XdgPositioner, XdgPositionerUserData>
    + Dispatch<XdgSurface, XdgSurfaceUserData>
    + Dispatch<XdgToplevel, XdgToplevelUserData>
    + Dispatch<XdgPopup, XdgPopupUserData>
    + XdgShellHandler
    + 'static
{
}

impl<D> XdgShellDispatch for D where
    D: GlobalDispatch<XdgWmBase, ()>
        + Dispatch<XdgWmBase, XdgWmBaseUserData>
        + Dispatch<XdgPositioner, XdgPositionerUserData>
        + Dispatch<XdgSurface, XdgSurfaceUserData>
        + Dispatch<XdgToplevel, XdgToplevelUserData>
        + Dispatch<XdgPopup, XdgPopupUserData>
        + XdgShellHandler
        + 'static
{
}
