//! The popup grab chain: a per-seat stack of popups that have requested an input grab via
//! `xdg_popup.grab`, together with the pointer/keyboard handlers installed into the seat
//! while the chain is alive.
//!
//! This mirrors the shape of Smithay's own `desktop::popup::grab` module (`PopupGrab`,
//! `PopupKeyboardGrab`, `PopupPointerGrab`), adapted to the minimal [`crate::input`]
//! seat contract this crate defines rather than a full seat implementation.

use std::any::Any;
use std::sync::Arc;

use wayland_server::protocol::{wl_pointer, wl_seat, wl_surface::WlSurface};
use wayland_server::Resource;

use crate::input::{
    AxisEvent, ButtonEvent, KeyboardGrab, KeyboardGrabStartData, MotionEvent, PointerGrab, PointerGrabStartData,
    SeatHandle,
};
use crate::utils::{Logical, Point};
use crate::wayland::Serial;

use super::{PopupSurface, ShellClient, XdgShellHandler, XdgShellState, XDG_TOPLEVEL_ROLE};

/// Errors [`XdgShellState::grab_popup`] can return, surfaced by the caller as the
/// corresponding `xdg_popup`/`xdg_wm_base` protocol error.
#[derive(Debug, thiserror::Error)]
pub enum PopupGrabError {
    /// The popup (or its parent) is no longer alive.
    #[error("the surface has already been destroyed")]
    DeadResource,
    /// The popup's parent was dismissed before the grab could be installed.
    #[error("the popup's parent is no longer part of a valid chain")]
    ParentDismissed,
    /// The popup has already been mapped, or already holds a grab.
    #[error("xdg_popup.grab called on a surface that cannot be grabbed")]
    InvalidGrab,
    /// The popup is not the topmost popup of its seat's chain (or, if the chain is
    /// empty, its parent is not a toplevel).
    #[error("the popup is not the topmost popup of its grab chain")]
    NotTheTopmostPopup,
}

type ReleaseFn = dyn Fn(&mut dyn Any) + Send + Sync;

/// A seat's stack of actively-grabbing popups, topmost last. Installed the moment the
/// first popup in a chain calls `xdg_popup.grab`; torn down once the chain empties.
pub struct PopupGrabChain {
    seat: wl_seat::WlSeat,
    client: ShellClient,
    popups: Vec<PopupSurface>,
    release: Arc<ReleaseFn>,
}

impl std::fmt::Debug for PopupGrabChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupGrabChain")
            .field("seat", &self.seat)
            .field("client", &self.client)
            .field("popups", &self.popups)
            .finish_non_exhaustive()
    }
}

fn client_owns_surface(client: &ShellClient, surface: &WlSurface) -> bool {
    let surface_client = surface.client().map(|c| c.id());
    let grab_client = client.wm_base.client().map(|c| c.id());
    surface_client.is_some() && surface_client == grab_client
}

/// Send `xdg_popup.popup_done` to every popup in `chain`, topmost first, then release
/// both of the seat's grab slots. This is the *externally triggered* dismissal path: the
/// chain's owning client has not asked to destroy anything yet, so the clients must be
/// told to tear their popups down themselves.
fn tear_down<D: 'static>(state: &mut D, chain: &PopupGrabChain) {
    for popup in chain.popups.iter().rev() {
        popup.send_popup_done();
    }
    for popup in &chain.popups {
        if popup.alive() {
            popup.popup_data().attributes.lock().unwrap().grab_seat = None;
        }
    }
    (chain.release)(state as &mut dyn Any);
}

/// Remove `chain_idx` from the state's chain list and release its seat grab slots.
fn dismiss_chain<D: XdgShellHandler + 'static>(state: &mut D, chain_idx: usize) {
    let chain = state.xdg_shell_state().popup_grab_chains.remove(chain_idx);
    tear_down(state, &chain);
}

/// Called once a popup resource has actually been destroyed: pops it from whatever
/// grab chain it belonged to (it must have been topmost, enforced earlier by
/// [`XdgShellState::popup_destroy_check`]), and releases the seat's grab slots if that
/// was the last popup in the chain.
pub(crate) fn cleanup_destroyed_popup<D: XdgShellHandler + 'static>(state: &mut D, popup: &PopupSurface) {
    let chains = &mut state.xdg_shell_state().popup_grab_chains;
    let Some(idx) = chains.iter().position(|c| c.popups.iter().any(|p| p == popup)) else {
        return;
    };
    chains[idx].popups.retain(|p| p != popup);
    if chains[idx].popups.is_empty() {
        let chain = state.xdg_shell_state().popup_grab_chains.remove(idx);
        (chain.release)(state as &mut dyn Any);
    }
}

impl XdgShellState {
    /// Install a popup grab, per §4.3/§4.6: the popup must not yet be mapped, and must
    /// be the topmost popup of `seat`'s chain (or, if that chain is empty, its parent
    /// must be a toplevel). On success the popup is pushed onto the chain and, for a
    /// freshly created chain, `seat`'s pointer and keyboard grab slots are installed
    /// with handlers that enforce the chain's input-redirection rules.
    pub fn grab_popup<D, S>(
        &mut self,
        data: &mut D,
        popup: &PopupSurface,
        seat_handle: &S,
        wl_seat: wl_seat::WlSeat,
        serial: Serial,
    ) -> Result<(), PopupGrabError>
    where
        D: XdgShellHandler + 'static,
        S: SeatHandle<D> + Send + Sync + 'static,
    {
        if !popup.alive() {
            return Err(PopupGrabError::DeadResource);
        }
        if popup.with_attributes(|a| a.committed || a.grab_seat.is_some()) {
            return Err(PopupGrabError::InvalidGrab);
        }
        let parent = popup.with_attributes(|a| a.parent.clone()).ok_or(PopupGrabError::InvalidGrab)?;
        if !parent.is_alive() {
            return Err(PopupGrabError::ParentDismissed);
        }

        let chain_idx = self.popup_grab_chains.iter().position(|c| c.seat == wl_seat);
        let is_valid_parent = match chain_idx {
            Some(idx) => self.popup_grab_chains[idx].popups.last().map(|p| p.wl_surface()) == Some(&parent),
            None => crate::wayland::compositor::get_role(&parent) == Some(XDG_TOPLEVEL_ROLE),
        };
        if !is_valid_parent {
            return Err(PopupGrabError::NotTheTopmostPopup);
        }

        let chain_idx = match chain_idx {
            Some(idx) => idx,
            None => {
                let client = popup.client();
                let release: Arc<ReleaseFn> = {
                    let seat_handle = seat_handle.clone();
                    Arc::new(move |state: &mut dyn Any| {
                        let state: &mut D = state
                            .downcast_mut()
                            .expect("popup grab release invoked with the wrong state type");
                        seat_handle.unset_pointer_grab(state);
                        seat_handle.unset_keyboard_grab(state);
                    })
                };
                self.popup_grab_chains.push(PopupGrabChain {
                    seat: wl_seat.clone(),
                    client,
                    popups: Vec::new(),
                    release,
                });
                self.popup_grab_chains.len() - 1
            }
        };

        let client = self.popup_grab_chains[chain_idx].client.clone();
        self.popup_grab_chains[chain_idx].popups.push(popup.clone());
        popup.popup_data().attributes.lock().unwrap().grab_seat = Some(wl_seat.clone());

        if self.popup_grab_chains[chain_idx].popups.len() == 1 {
            let pointer_grab = PopupPointerGrabHandler::new(
                client.clone(),
                None,
                PointerGrabStartData {
                    focus: None,
                    button: 0,
                    serial,
                    location: Point::from((0.0, 0.0)),
                },
            );
            let keyboard_grab = PopupKeyboardGrabHandler {
                start_data: KeyboardGrabStartData { focus: None },
            };
            seat_handle.set_pointer_grab(data, Box::new(pointer_grab), serial);
            seat_handle.set_keyboard_grab(data, Box::new(keyboard_grab), serial);
        }

        Ok(())
    }

    /// Check whether `popup` may be destroyed right now: it must either hold no grab at
    /// all, or be the topmost popup of the chain it belongs to (§3 invariant 4).
    pub(crate) fn popup_destroy_check(&self, popup: &PopupSurface) -> Result<(), PopupGrabError> {
        let grab_seat = popup.with_attributes(|a| a.grab_seat.clone());
        let Some(seat) = grab_seat else {
            return Ok(());
        };
        match self.popup_grab_chains.iter().find(|c| c.seat == seat) {
            Some(chain) if chain.popups.last() == Some(popup) => Ok(()),
            Some(_) => Err(PopupGrabError::NotTheTopmostPopup),
            // The chain was already dismissed (e.g. by a foreign button press); nothing
            // left to enforce.
            None => Ok(()),
        }
    }
}

/// Installed into a seat's pointer-grab slot for the lifetime of a [`PopupGrabChain`].
struct PopupPointerGrabHandler<D> {
    client: ShellClient,
    /// The surface last reported by `motion`, used by `button` to decide whether a
    /// press landed inside the grab's own client.
    last_focus: Option<WlSurface>,
    start_data: PointerGrabStartData,
    /// `D` appears only behind a function pointer, which is `Send`/`Sync` regardless of
    /// `D`, so this marker doesn't force any bound on the embedding compositor's state.
    _marker: std::marker::PhantomData<fn(&mut D)>,
}

impl<D> PopupPointerGrabHandler<D> {
    fn new(client: ShellClient, last_focus: Option<WlSurface>, start_data: PointerGrabStartData) -> Self {
        PopupPointerGrabHandler {
            client,
            last_focus,
            start_data,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<D: XdgShellHandler + 'static> PointerGrab<D> for PopupPointerGrabHandler<D> {
    fn motion(&mut self, _data: &mut D, focus: Option<(WlSurface, Point<i32, Logical>)>, _event: &MotionEvent) {
        // Motion always passes through unchanged (§4.6); we only track the focused
        // surface so `button` can tell whether a press belongs to this grab's client.
        self.last_focus = focus.map(|(surface, _)| surface);
    }

    fn button(&mut self, data: &mut D, event: &ButtonEvent) {
        if event.state != wl_pointer::ButtonState::Pressed {
            return;
        }
        let same_client = self
            .last_focus
            .as_ref()
            .is_some_and(|surface| client_owns_surface(&self.client, surface));
        if same_client {
            return;
        }

        let Some(idx) = data
            .xdg_shell_state()
            .popup_grab_chains
            .iter()
            .position(|c| c.client == self.client)
        else {
            return;
        };
        dismiss_chain(data, idx);
    }

    fn axis(&mut self, _data: &mut D, _event: AxisEvent) {
        // Scroll events always pass through unchanged (§4.6).
    }

    fn unset(&mut self, _data: &mut D) {
        // Reached via `seat_handle.unset_pointer_grab` from `tear_down`/`dismiss_chain`,
        // which has already done all necessary chain bookkeeping.
    }

    fn start_data(&self) -> &PointerGrabStartData {
        &self.start_data
    }
}

/// Installed into a seat's keyboard-grab slot for the lifetime of a [`PopupGrabChain`].
struct PopupKeyboardGrabHandler {
    start_data: KeyboardGrabStartData,
}

impl<D: XdgShellHandler + 'static> KeyboardGrab<D> for PopupKeyboardGrabHandler {
    fn input(&mut self, _data: &mut D, _focus_changed: bool) {
        // Key events are delivered by the seat's own `wl_keyboard` implementation,
        // which is out of scope for this crate; focus itself stays pinned to the
        // topmost popup for as long as the grab is installed (see `set_focus`).
    }

    fn set_focus(&mut self, _data: &mut D, _focus: Option<WlSurface>, _serial: Serial) {
        // Ignore any focus change the seat proposes: keyboard focus remains on the
        // popup chain until the grab is unset (§4.6 "keyboard.enter: do nothing").
    }

    fn unset(&mut self, _data: &mut D) {}

    fn start_data(&self) -> &KeyboardGrabStartData {
        &self.start_data
    }
}
