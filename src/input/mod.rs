//! Seat-facing grab contracts that `xdg_popup` grabs install against.
//!
//! A full seat (focus tracking, libinput wiring, the pointer/keyboard grab *slot*
//! itself) is the embedding compositor's responsibility and out of scope for this
//! crate. What [`crate::wayland::shell::xdg::popup_grab`] needs is only the shape of a
//! grab: a trait a handler can implement, a start-data snapshot capturing where the
//! grab began, and a handle through which the grab can be installed into and removed
//! from a seat's single grab slot.

use wayland_server::protocol::{wl_pointer, wl_surface::WlSurface};

use crate::utils::{Logical, Point};
use crate::wayland::Serial;

/// A pointer motion event forwarded to the active grab.
#[derive(Debug, Clone)]
pub struct MotionEvent {
    /// The new pointer location, in the focused surface's coordinate space.
    pub location: Point<f64, Logical>,
    /// The serial of the event that caused this motion.
    pub serial: Serial,
    /// Event timestamp, in milliseconds.
    pub time: u32,
}

/// A pointer button event forwarded to the active grab.
#[derive(Debug, Clone)]
pub struct ButtonEvent {
    /// The Linux input-event code of the button.
    pub button: u32,
    /// Whether the button was pressed or released.
    pub state: wl_pointer::ButtonState,
    /// The serial assigned to this event by the seat.
    pub serial: Serial,
    /// Event timestamp, in milliseconds.
    pub time: u32,
}

/// A scroll-axis event forwarded to the active grab. Popup grabs never need to inspect
/// these, only pass them through, so no fields are modeled beyond the marker type.
#[derive(Debug, Clone, Copy)]
pub struct AxisEvent;

/// Snapshot of the pointer's state at the moment a grab began.
#[derive(Debug, Clone)]
pub struct PointerGrabStartData {
    /// The surface (and its origin, in the pointer's coordinate space) focused when the
    /// grab began, if any.
    pub focus: Option<(WlSurface, Point<i32, Logical>)>,
    /// The button whose press authorized the grab.
    pub button: u32,
    /// The serial of the button press that authorized the grab.
    pub serial: Serial,
    /// The pointer location when the grab began.
    pub location: Point<f64, Logical>,
}

/// Snapshot of the keyboard's state at the moment a grab began.
#[derive(Debug, Clone)]
pub struct KeyboardGrabStartData {
    /// The surface focused when the grab began, if any.
    pub focus: Option<WlSurface>,
}

/// A handler installed into a seat's single pointer-grab slot.
///
/// While a grab is active, the seat is expected to call these methods in place of its
/// default focus-follows-input handling.
pub trait PointerGrab<D>: Send {
    /// The pointer moved, potentially over a new surface.
    fn motion(
        &mut self,
        data: &mut D,
        focus: Option<(WlSurface, Point<i32, Logical>)>,
        event: &MotionEvent,
    );
    /// A button was pressed or released.
    fn button(&mut self, data: &mut D, event: &ButtonEvent);
    /// A scroll-axis event; most grabs pass this straight through to the seat's default
    /// handling.
    fn axis(&mut self, data: &mut D, event: AxisEvent);
    /// The grab has ended, either replaced by another grab or explicitly unset.
    fn unset(&mut self, data: &mut D);
    /// The data captured when this grab began.
    fn start_data(&self) -> &PointerGrabStartData;
}

/// A handler installed into a seat's single keyboard-grab slot.
pub trait KeyboardGrab<D>: Send {
    /// A key event was reported, or the keyboard's modifier state changed.
    fn input(&mut self, data: &mut D, focus_changed: bool);
    /// The seat's keyboard focus changed.
    fn set_focus(&mut self, data: &mut D, focus: Option<WlSurface>, serial: Serial);
    /// The grab has ended, either replaced by another grab or explicitly unset.
    fn unset(&mut self, data: &mut D);
    /// The data captured when this grab began.
    fn start_data(&self) -> &KeyboardGrabStartData;
}

/// A handle to a seat, through which grabs are installed into and removed from its
/// single pointer/keyboard grab slots.
///
/// The embedding compositor implements this trait on its own seat handle type; this
/// crate never constructs one.
pub trait SeatHandle<D>: Clone {
    /// Install `grab` into this seat's pointer-grab slot, replacing whatever grab (if
    /// any) is currently installed.
    fn set_pointer_grab(&self, data: &mut D, grab: Box<dyn PointerGrab<D>>, serial: Serial);
    /// Install `grab` into this seat's keyboard-grab slot, replacing whatever grab (if
    /// any) is currently installed.
    fn set_keyboard_grab(&self, data: &mut D, grab: Box<dyn KeyboardGrab<D>>, serial: Serial);
    /// Release whichever grab currently occupies the pointer slot.
    fn unset_pointer_grab(&self, data: &mut D);
    /// Release whichever grab currently occupies the keyboard slot.
    fn unset_keyboard_grab(&self, data: &mut D);
}
