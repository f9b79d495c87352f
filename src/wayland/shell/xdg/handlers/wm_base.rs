use std::sync::Mutex;

use wayland_protocols::xdg::shell::server::{
    xdg_popup::XdgPopup,
    xdg_positioner::XdgPositioner,
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::XdgToplevel,
    xdg_wm_base::{self, XdgWmBase},
};
use wayland_server::{DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use crate::wayland::compositor::{self, BufferAssignment};
use crate::wayland::Serial;

use super::super::{commit_hook, destruction_hook, ShellClient, XdgShellHandler, XdgWmBaseUserData};
use super::positioner::XdgPositionerUserData;
use super::surface::{XdgPopupUserData, XdgSurfaceRoleObject, XdgSurfaceUserData, XdgToplevelUserData};

impl<D> GlobalDispatch<XdgWmBase, (), D> for D
where
    D: GlobalDispatch<XdgWmBase, ()>
        + Dispatch<XdgWmBase, XdgWmBaseUserData>
        + Dispatch<XdgSurface, XdgSurfaceUserData>
        + Dispatch<XdgToplevel, XdgToplevelUserData>
        + Dispatch<XdgPopup, XdgPopupUserData>
        + Dispatch<XdgPositioner, XdgPositionerUserData>
        + XdgShellHandler
        + 'static,
{
    fn bind(
        state: &mut D,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<XdgWmBase>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        let wm_base = data_init.init(resource, XdgWmBaseUserData::default());
        state.new_client(ShellClient::from_resource(&wm_base));
    }
}

impl<D> Dispatch<XdgWmBase, XdgWmBaseUserData, D> for D
where
    D: Dispatch<XdgWmBase, XdgWmBaseUserData>
        + Dispatch<XdgSurface, XdgSurfaceUserData>
        + Dispatch<XdgToplevel, XdgToplevelUserData>
        + Dispatch<XdgPopup, XdgPopupUserData>
        + Dispatch<XdgPositioner, XdgPositionerUserData>
        + XdgShellHandler
        + 'static,
{
    fn request(
        state: &mut D,
        _client: &wayland_server::Client,
        wm_base: &XdgWmBase,
        request: xdg_wm_base::Request,
        data: &XdgWmBaseUserData,
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            xdg_wm_base::Request::CreatePositioner { id } => {
                data_init.init(id, XdgPositionerUserData::default());
            }
            xdg_wm_base::Request::GetXdgSurface { id, surface } => {
                let has_buffer =
                    compositor::with_states(&surface, |s| s.cached_state.current::<BufferAssignment>().attached);

                let xdg_surface = data_init.init(
                    id,
                    XdgSurfaceUserData {
                        wl_surface: surface.clone(),
                        wm_base: wm_base.clone(),
                        role_object: Mutex::new(XdgSurfaceRoleObject::None),
                    },
                );

                if has_buffer {
                    xdg_surface.post_error(
                        xdg_surface::Error::UnconfiguredBuffer,
                        "xdg_surface requested on a wl_surface that already has a buffer attached",
                    );
                    return;
                }

                // The commit hook is installed before any role is assigned: it is what
                // turns a buffer committed on a bare `xdg_surface` into a protocol error.
                compositor::with_states(&surface, |states| {
                    states.data_map.insert_if_missing_threadsafe(|| xdg_surface.clone());
                });
                compositor::add_post_commit_hook::<D, _>(&surface, commit_hook::<D>);
                compositor::add_destruction_hook::<D, _>(&surface, destruction_hook::<D>);
            }
            xdg_wm_base::Request::Pong { serial } => {
                let serial = Serial::from(serial);
                let matched = {
                    let mut guard = data.client_data.lock().unwrap();
                    if guard.pending_ping == Some(serial) {
                        guard.pending_ping = None;
                        true
                    } else {
                        false
                    }
                };
                if matched {
                    state.client_pong(ShellClient::from_resource(wm_base));
                }
            }
            xdg_wm_base::Request::Destroy => {}
            _ => unreachable!(),
        }
    }

    fn destroyed(state: &mut D, _client: wayland_server::backend::ClientId, resource: &XdgWmBase) {
        state.client_destroyed(ShellClient::from_resource(resource));
    }
}
