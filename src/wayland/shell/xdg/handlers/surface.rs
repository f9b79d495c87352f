use std::sync::Mutex;

use wayland_protocols::xdg::shell::server::{
    xdg_popup::XdgPopup,
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::XdgToplevel,
    xdg_wm_base::{self, XdgWmBase},
};
use wayland_server::{protocol::wl_surface::WlSurface, DataInit, Dispatch, DisplayHandle, Resource};

use crate::utils::Rectangle;
use crate::wayland::compositor;
use crate::wayland::Serial;

use super::super::{
    PopupSurface, SurfaceCachedState, ToplevelSurface, XdgPopupSurfaceData, XdgPopupSurfaceRoleAttributes,
    XdgShellHandler, XdgToplevelSurfaceData, XdgToplevelSurfaceRoleAttributes, XDG_POPUP_ROLE, XDG_TOPLEVEL_ROLE,
};
use super::positioner::XdgPositionerUserData;

mod popup;
mod toplevel;

pub use popup::XdgPopupUserData;
pub use toplevel::XdgToplevelUserData;

/// The role object a bound `xdg_surface` currently owns, if any. Used only to enforce
/// that a client destroys the role object before the `xdg_surface` itself (§4.7).
#[derive(Debug, Default)]
pub(crate) enum XdgSurfaceRoleObject {
    #[default]
    None,
    Toplevel(XdgToplevel),
    Popup(XdgPopup),
}

/// User data backing a bound `xdg_surface` object.
#[derive(Debug)]
pub struct XdgSurfaceUserData {
    pub(crate) wl_surface: WlSurface,
    pub(crate) wm_base: XdgWmBase,
    pub(crate) role_object: Mutex<XdgSurfaceRoleObject>,
}

impl<D> Dispatch<XdgSurface, XdgSurfaceUserData, D> for D
where
    D: Dispatch<XdgSurface, XdgSurfaceUserData>
        + Dispatch<XdgToplevel, XdgToplevelUserData>
        + Dispatch<XdgPopup, XdgPopupUserData>
        + XdgShellHandler
        + 'static,
{
    fn request(
        state: &mut D,
        _client: &wayland_server::Client,
        xdg_surface: &XdgSurface,
        request: xdg_surface::Request,
        data: &XdgSurfaceUserData,
        _dh: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            xdg_surface::Request::Destroy => {
                let role_still_alive = match &*data.role_object.lock().unwrap() {
                    XdgSurfaceRoleObject::None => false,
                    XdgSurfaceRoleObject::Toplevel(t) => t.is_alive(),
                    XdgSurfaceRoleObject::Popup(p) => p.is_alive(),
                };
                if role_still_alive {
                    xdg_surface.post_error(
                        xdg_surface::Error::DefunctRoleObject,
                        "xdg_surface destroyed before its role object",
                    );
                }
            }
            xdg_surface::Request::GetToplevel { id } => {
                let surface = &data.wl_surface;

                if compositor::give_role(surface, XDG_TOPLEVEL_ROLE).is_err() {
                    data.wm_base.post_error(xdg_wm_base::Error::Role, "surface already has a role");
                    return;
                }

                let xdg_toplevel = data_init.init(
                    id,
                    XdgToplevelUserData {
                        wl_surface: surface.clone(),
                    },
                );
                *data.role_object.lock().unwrap() = XdgSurfaceRoleObject::Toplevel(xdg_toplevel.clone());

                let default_capabilities = state.xdg_shell_state().default_capabilities();
                compositor::with_states(surface, |states| {
                    states.data_map.insert_if_missing_threadsafe(|| XdgToplevelSurfaceData {
                        attributes: Mutex::new(XdgToplevelSurfaceRoleAttributes {
                            capabilities: default_capabilities,
                            ..Default::default()
                        }),
                        xdg_toplevel: xdg_toplevel.clone(),
                        wm_base: data.wm_base.clone(),
                    });
                });

                let handle = ToplevelSurface::from_surface(surface);
                state.xdg_shell_state().toplevel_created(handle.clone());
                state.new_toplevel(handle);
            }
            xdg_surface::Request::GetPopup {
                id,
                parent,
                positioner,
            } => {
                let positioner_data = *positioner.data::<XdgPositionerUserData>().unwrap().state.lock().unwrap();

                if positioner_data.rect_size.w <= 0 || positioner_data.anchor_rect.size.w <= 0 {
                    data.wm_base.post_error(
                        xdg_wm_base::Error::InvalidPositioner,
                        "positioner has a zero-size rect_size or anchor_rect",
                    );
                    return;
                }

                let parent_surface = parent.map(|parent| {
                    parent
                        .data::<XdgSurfaceUserData>()
                        .expect("xdg_popup parent was not an xdg_surface")
                        .wl_surface
                        .clone()
                });

                let surface = &data.wl_surface;

                if compositor::give_role(surface, XDG_POPUP_ROLE).is_err() {
                    data.wm_base.post_error(xdg_wm_base::Error::Role, "surface already has a role");
                    return;
                }

                let xdg_popup = data_init.init(
                    id,
                    XdgPopupUserData {
                        wl_surface: surface.clone(),
                    },
                );
                *data.role_object.lock().unwrap() = XdgSurfaceRoleObject::Popup(xdg_popup.clone());

                let geometry = positioner_data.get_geometry();
                compositor::with_states(surface, |states| {
                    states.data_map.insert_if_missing_threadsafe(|| XdgPopupSurfaceData {
                        attributes: Mutex::new(XdgPopupSurfaceRoleAttributes {
                            parent: parent_surface,
                            positioner: positioner_data,
                            geometry,
                            initial_configure_sent: false,
                            configured: false,
                            configure_serial: None,
                            committed: false,
                            added: false,
                            grab_seat: None,
                            configure_queue: Default::default(),
                        }),
                        xdg_popup: xdg_popup.clone(),
                        wm_base: data.wm_base.clone(),
                    });
                });

                let handle = PopupSurface::from_surface(surface);
                state.xdg_shell_state().popup_created(handle.clone());
                state.new_popup(handle, positioner_data);
            }
            xdg_surface::Request::SetWindowGeometry { x, y, width, height } => {
                let surface = &data.wl_surface;
                match compositor::get_role(surface) {
                    None => {
                        xdg_surface.post_error(xdg_surface::Error::NotConstructed, "xdg_surface has no role yet");
                    }
                    Some(role) if role == XDG_TOPLEVEL_ROLE || role == XDG_POPUP_ROLE => {
                        compositor::with_states(surface, |states| {
                            states.cached_state.pending::<SurfaceCachedState>().geometry =
                                Some(Rectangle::from_loc_and_size((x, y), (width, height)));
                        });
                    }
                    Some(_) => unreachable!(),
                }
            }
            xdg_surface::Request::AckConfigure { serial } => {
                let serial = Serial::from(serial);
                let surface = data.wl_surface.clone();

                match compositor::get_role(&surface) {
                    None => {
                        xdg_surface.post_error(xdg_surface::Error::NotConstructed, "xdg_surface has no role yet");
                        return;
                    }
                    Some(role) if role == XDG_TOPLEVEL_ROLE => {
                        let toplevel = ToplevelSurface::from_surface(&surface);
                        if toplevel.ack_configure(serial).is_none() {
                            data.wm_base.post_error(
                                xdg_wm_base::Error::InvalidSurfaceState,
                                format!("wrong configure serial: {}", u32::from(serial)),
                            );
                            return;
                        }
                    }
                    Some(role) if role == XDG_POPUP_ROLE => {
                        let popup = PopupSurface::from_surface(&surface);
                        if popup.ack_configure(serial).is_none() {
                            data.wm_base.post_error(
                                xdg_wm_base::Error::InvalidSurfaceState,
                                format!("wrong configure serial: {}", u32::from(serial)),
                            );
                            return;
                        }
                    }
                    Some(_) => unreachable!(),
                }

                state.ack_configure(surface, serial);
            }
            _ => unreachable!(),
        }
    }
}
