use std::sync::Mutex;

use wayland_protocols::xdg::shell::server::xdg_positioner::{self, XdgPositioner};
use wayland_server::{DataInit, Dispatch, DisplayHandle, Resource, WEnum};

use crate::utils::Rectangle;

use super::super::PositionerState;

/// User data backing a bound `xdg_positioner` object: just the accumulated parameters,
/// mutated in place by each setter request until the positioner is consumed at
/// `xdg_surface.get_popup`.
#[derive(Debug, Default)]
pub struct XdgPositionerUserData {
    pub(crate) state: Mutex<PositionerState>,
}

impl<D> Dispatch<XdgPositioner, XdgPositionerUserData, D> for D
where
    D: 'static,
{
    fn request(
        _state: &mut D,
        _client: &wayland_server::Client,
        positioner: &XdgPositioner,
        request: xdg_positioner::Request,
        data: &XdgPositionerUserData,
        _dh: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        let mut state = data.state.lock().unwrap();
        match request {
            xdg_positioner::Request::SetSize { width, height } => {
                if width < 1 || height < 1 {
                    positioner.post_error(
                        xdg_positioner::Error::InvalidInput,
                        "width and height must be positive and non-zero",
                    );
                } else {
                    state.rect_size = (width, height).into();
                }
            }
            xdg_positioner::Request::SetAnchorRect { x, y, width, height } => {
                if width < 1 || height < 1 {
                    positioner.post_error(
                        xdg_positioner::Error::InvalidInput,
                        "width and height of the anchor rect must be positive and non-zero",
                    );
                } else {
                    state.anchor_rect = Rectangle::from_loc_and_size((x, y), (width, height));
                }
            }
            xdg_positioner::Request::SetAnchor { anchor } => {
                if let WEnum::Value(anchor) = anchor {
                    state.anchor_edges = anchor;
                }
            }
            xdg_positioner::Request::SetGravity { gravity } => {
                if let WEnum::Value(gravity) = gravity {
                    state.gravity = gravity;
                }
            }
            xdg_positioner::Request::SetConstraintAdjustment {
                constraint_adjustment,
            } => {
                state.constraint_adjustment =
                    xdg_positioner::ConstraintAdjustment::from_bits_truncate(constraint_adjustment);
            }
            xdg_positioner::Request::SetOffset { x, y } => {
                state.offset = (x, y).into();
            }
            xdg_positioner::Request::SetReactive => {
                state.reactive = true;
            }
            // `xdg_popup.reposition` is not implemented by this crate (see crate docs); the
            // parent-size/configure hints it would consume are accepted and ignored.
            xdg_positioner::Request::SetParentSize { .. } | xdg_positioner::Request::SetParentConfigure { .. } => {}
            xdg_positioner::Request::Destroy => {}
            _ => unreachable!(),
        }
    }
}
