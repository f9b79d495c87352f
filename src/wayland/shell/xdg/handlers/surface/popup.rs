use wayland_protocols::xdg::shell::server::xdg_popup::{self, XdgPopup};
use wayland_server::{protocol::wl_surface::WlSurface, DataInit, Dispatch, DisplayHandle, Resource};

use crate::wayland::shell::xdg::{popup_grab, PopupSurface, XdgShellHandler};
use crate::wayland::Serial;

/// User data backing a bound `xdg_popup` object.
#[derive(Debug)]
pub struct XdgPopupUserData {
    pub(crate) wl_surface: WlSurface,
}

impl<D> Dispatch<XdgPopup, XdgPopupUserData, D> for D
where
    D: XdgShellHandler + 'static,
{
    fn request(
        state: &mut D,
        _client: &wayland_server::Client,
        popup: &XdgPopup,
        request: xdg_popup::Request,
        data: &XdgPopupUserData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            xdg_popup::Request::Destroy => {
                let handle = PopupSurface::from_surface(&data.wl_surface);
                if let Err(err) = state.xdg_shell_state().popup_destroy_check(&handle) {
                    let wm_base = handle.popup_data().wm_base.clone();
                    wm_base.post_error(
                        wayland_protocols::xdg::shell::server::xdg_wm_base::Error::NotTheTopmostPopup,
                        err.to_string(),
                    );
                }
            }
            xdg_popup::Request::Grab { seat, serial } => {
                let handle = PopupSurface::from_surface(&data.wl_surface);
                state.grab(handle, seat, Serial::from(serial));
            }
            // `xdg_popup.reposition` is not implemented by this crate (see crate docs);
            // the request is accepted and ignored rather than treated as a protocol error.
            xdg_popup::Request::Reposition { .. } => {}
            _ => unreachable!(),
        }

        let _ = popup;
    }

    fn destroyed(state: &mut D, _client: wayland_server::backend::ClientId, resource: &XdgPopup) {
        let wl_surface = resource
            .data::<XdgPopupUserData>()
            .expect("xdg_popup destroyed without its user data")
            .wl_surface
            .clone();
        let handle = PopupSurface::from_surface(&wl_surface);
        state.xdg_shell_state().popup_destroyed(&wl_surface);
        popup_grab::cleanup_destroyed_popup(state, &handle);
        state.popup_destroyed(handle);
    }
}
