use wayland_protocols::xdg::shell::server::{xdg_surface, xdg_toplevel::{self, XdgToplevel}};
use wayland_server::{protocol::wl_surface::WlSurface, DataInit, Dispatch, DisplayHandle, Resource, WEnum};

use crate::wayland::compositor;
use crate::wayland::shell::xdg::{SurfaceCachedState, ToplevelSurface, XdgShellHandler};
use crate::wayland::Serial;

use super::XdgSurfaceUserData;

/// Request-class requests (move/resize/show-window-menu) require the surface to have
/// been configured at least once (§4.2). Returns `false` and posts `NOT_CONSTRUCTED` on
/// the `xdg_surface` when that precondition does not hold.
fn require_constructed(wl_surface: &WlSurface, toplevel: &ToplevelSurface) -> bool {
    if toplevel.with_attributes(|a| a.configured) {
        return true;
    }
    let xdg_surface =
        compositor::with_states(wl_surface, |s| s.data_map.get::<xdg_surface::XdgSurface>().cloned());
    if let Some(xdg_surface) = xdg_surface {
        xdg_surface.post_error(
            xdg_surface::Error::NotConstructed,
            "move/resize/show_window_menu requested before the first ack_configure",
        );
    }
    false
}

/// User data backing a bound `xdg_toplevel` object.
#[derive(Debug)]
pub struct XdgToplevelUserData {
    pub(crate) wl_surface: WlSurface,
}

impl<D> Dispatch<XdgToplevel, XdgToplevelUserData, D> for D
where
    D: XdgShellHandler + 'static,
{
    fn request(
        state: &mut D,
        _client: &wayland_server::Client,
        _toplevel: &XdgToplevel,
        request: xdg_toplevel::Request,
        data: &XdgToplevelUserData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let handle = ToplevelSurface::from_surface(&data.wl_surface);

        match request {
            xdg_toplevel::Request::Destroy => {
                // Cleanup happens in `destroyed` below, once the object is actually gone.
            }
            xdg_toplevel::Request::SetParent { parent } => {
                let parent_surface = parent.map(|parent| {
                    parent
                        .data::<XdgSurfaceUserData>()
                        .expect("xdg_toplevel parent was not an xdg_surface")
                        .wl_surface
                        .clone()
                });
                handle.toplevel_data().attributes.lock().unwrap().parent = parent_surface;
                state.parent_changed(handle);
            }
            xdg_toplevel::Request::SetTitle { title } => {
                handle.toplevel_data().attributes.lock().unwrap().title = Some(title);
                state.title_changed(handle);
            }
            xdg_toplevel::Request::SetAppId { app_id } => {
                handle.toplevel_data().attributes.lock().unwrap().app_id = Some(app_id);
                state.app_id_changed(handle);
            }
            xdg_toplevel::Request::ShowWindowMenu { seat, serial, x, y } => {
                if require_constructed(&data.wl_surface, &handle) {
                    state.show_window_menu(handle, seat, Serial::from(serial), (x, y).into());
                }
            }
            xdg_toplevel::Request::Move { seat, serial } => {
                if require_constructed(&data.wl_surface, &handle) {
                    state.move_request(handle, seat, Serial::from(serial));
                }
            }
            xdg_toplevel::Request::Resize { seat, serial, edges } => {
                if let WEnum::Value(edges) = edges {
                    if require_constructed(&data.wl_surface, &handle) {
                        state.resize_request(handle, seat, Serial::from(serial), edges);
                    }
                }
            }
            xdg_toplevel::Request::SetMaxSize { width, height } => {
                compositor::with_states(&data.wl_surface, |states| {
                    states.cached_state.pending::<SurfaceCachedState>().max_size = (width, height).into();
                });
            }
            xdg_toplevel::Request::SetMinSize { width, height } => {
                compositor::with_states(&data.wl_surface, |states| {
                    states.cached_state.pending::<SurfaceCachedState>().min_size = (width, height).into();
                });
            }
            xdg_toplevel::Request::SetMaximized => state.maximize_request(handle),
            xdg_toplevel::Request::UnsetMaximized => state.unmaximize_request(handle),
            xdg_toplevel::Request::SetFullscreen { output } => state.fullscreen_request(handle, output),
            xdg_toplevel::Request::UnsetFullscreen => state.unfullscreen_request(handle),
            xdg_toplevel::Request::SetMinimized => state.minimize_request(handle),
            _ => unreachable!(),
        }
    }

    fn destroyed(state: &mut D, _client: wayland_server::backend::ClientId, resource: &XdgToplevel) {
        let wl_surface = resource
            .data::<XdgToplevelUserData>()
            .expect("xdg_toplevel destroyed without its user data")
            .wl_surface
            .clone();
        let handle = ToplevelSurface::from_surface(&wl_surface);
        state.xdg_shell_state().toplevel_destroyed(&wl_surface);
        state.toplevel_destroyed(handle);
    }
}
