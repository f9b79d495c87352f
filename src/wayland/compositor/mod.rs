//! The fundamental component by which clients build surfaces, and the minimal
//! double-buffered state primitive the shell protocols are built on top of.
//!
//! A `wl_surface` on its own is featureless: it only gains meaning once a protocol
//! extension (such as `xdg_shell`, see [`crate::wayland::shell::xdg`]) gives it a *role*.
//! This module provides:
//!
//! - [`CompositorState`], which creates the `wl_compositor` and `wl_region` globals;
//! - [`with_states`], [`get_role`] and [`give_role`], the surface-local bookkeeping every
//!   role extension builds on;
//! - [`MultiCache`]/[`Cacheable`], the double-buffering primitive used for state that
//!   should only become visible to the compositor on `wl_surface.commit`;
//! - pre-commit, post-commit and destruction hooks, used by role extensions to run code at
//!   the right point in a surface's commit or destruction.
//!
//! Subsurfaces, damage tracking and rendering are out of scope: this crate only needs
//! enough of the compositor primitive to host the xdg-shell role state machine.

use std::any::Any;
use std::sync::Mutex;

use wayland_server::{
    backend::GlobalId,
    protocol::{wl_compositor, wl_region, wl_surface},
    DisplayHandle, GlobalDispatch,
};

use crate::utils::alive_tracker::AliveTracker;
use crate::utils::user_data::UserDataMap;

pub mod cache;
mod handlers;
mod hook;

pub use cache::{Cacheable, MultiCache};
pub use hook::HookId;
use hook::Hook;

/// The advertised version of the `wl_compositor` global.
pub(crate) const COMPOSITOR_VERSION: u32 = 6;
/// The advertised version of the `wl_region` interface (bound through `wl_compositor`).
pub(crate) const REGION_VERSION: u32 = 1;

type PreCommitHook = dyn Fn(&mut dyn Any, &DisplayHandle, &wl_surface::WlSurface) + Send + Sync;
type PostCommitHook = dyn Fn(&mut dyn Any, &DisplayHandle, &wl_surface::WlSurface) + Send + Sync;
type DestructionHook = dyn Fn(&mut dyn Any, &wl_surface::WlSurface) + Send + Sync;

/// Per-surface state: the role it has been given, a typemap of caller-attached data, and
/// its double-buffered cached state.
pub struct SurfaceData {
    role: Mutex<Option<&'static str>>,
    /// A typemap that protocol extensions (and the embedding compositor) can use to attach
    /// arbitrary data to a surface.
    pub data_map: UserDataMap,
    /// The double-buffered state of this surface.
    pub cached_state: MultiCache,
    pub(crate) alive_tracker: AliveTracker,
    pre_commit_hooks: Mutex<Vec<Hook<PreCommitHook>>>,
    post_commit_hooks: Mutex<Vec<Hook<PostCommitHook>>>,
    destruction_hooks: Mutex<Vec<Hook<DestructionHook>>>,
}

impl Default for SurfaceData {
    fn default() -> Self {
        SurfaceData {
            role: Mutex::new(None),
            data_map: UserDataMap::new(),
            cached_state: MultiCache::new(),
            alive_tracker: AliveTracker::default(),
            pre_commit_hooks: Mutex::new(Vec::new()),
            post_commit_hooks: Mutex::new(Vec::new()),
            destruction_hooks: Mutex::new(Vec::new()),
        }
    }
}

impl std::fmt::Debug for SurfaceData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceData")
            .field("role", &self.role.lock().unwrap())
            .finish_non_exhaustive()
    }
}

/// Whether a surface currently has a buffer attached, double-buffered the same way any
/// other surface state is. `xdg_shell` reads [`MultiCache::current`] of this to implement
/// the "buffer before configure" validation and the initial-configure/mapped bookkeeping
/// in its commit hook; this crate does not otherwise care about buffer contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BufferAssignment {
    pub(crate) attached: bool,
}

impl Cacheable for BufferAssignment {
    fn commit(&mut self, _dh: &DisplayHandle) -> Self {
        *self
    }

    fn merge_into(self, into: &mut Self, _dh: &DisplayHandle) {
        *into = self;
    }
}

/// The surface already has a role and cannot be assigned another one.
#[derive(Debug, thiserror::Error)]
#[error("the surface already has a role")]
pub struct AlreadyHasRole;

/// The surface does not have the role this operation expects.
#[derive(Debug, thiserror::Error)]
#[error("the surface does not have the expected role")]
pub struct WrongRole;

fn surface_data(surface: &wl_surface::WlSurface) -> &SurfaceData {
    surface
        .data::<SurfaceData>()
        .expect("wl_surface without SurfaceData user data, was it created outside of CompositorState?")
}

/// Access the compositor-internal state of a surface.
///
/// The `SurfaceData` handed to the closure gives access to the surface's role, its
/// caller-attached data map, and its double-buffered cached state.
pub fn with_states<F, T>(surface: &wl_surface::WlSurface, f: F) -> T
where
    F: FnOnce(&SurfaceData) -> T,
{
    f(surface_data(surface))
}

/// Retrieve the role currently assigned to a surface, if any.
pub fn get_role(surface: &wl_surface::WlSurface) -> Option<&'static str> {
    *surface_data(surface).role.lock().unwrap()
}

/// Assign a role to a surface.
///
/// A surface can only ever be given a role once: attempting to assign a second role (even
/// the same one again) fails with [`AlreadyHasRole`].
pub fn give_role(surface: &wl_surface::WlSurface, role: &'static str) -> Result<(), AlreadyHasRole> {
    let mut guard = surface_data(surface).role.lock().unwrap();
    if guard.is_some() {
        return Err(AlreadyHasRole);
    }
    *guard = Some(role);
    Ok(())
}

/// Clear the role of a surface, checking that it currently has the expected one.
pub fn remove_role(surface: &wl_surface::WlSurface, expected: &'static str) -> Result<(), WrongRole> {
    let mut guard = surface_data(surface).role.lock().unwrap();
    if *guard != Some(expected) {
        return Err(WrongRole);
    }
    *guard = None;
    Ok(())
}

/// Register a hook to run just before a surface's pending state is committed.
pub fn add_pre_commit_hook<D, F>(surface: &wl_surface::WlSurface, hook: F) -> HookId
where
    D: 'static,
    F: Fn(&mut D, &DisplayHandle, &wl_surface::WlSurface) + Send + Sync + 'static,
{
    let erased: Box<PreCommitHook> = Box::new(move |state, dh, surface| {
        hook(downcast_state::<D>(state), dh, surface)
    });
    let hook = Hook::new(std::sync::Arc::from(erased));
    let id = hook.id;
    surface_data(surface).pre_commit_hooks.lock().unwrap().push(hook);
    id
}

/// Register a hook to run right after a surface's pending state has been merged into its
/// current state.
pub fn add_post_commit_hook<D, F>(surface: &wl_surface::WlSurface, hook: F) -> HookId
where
    D: 'static,
    F: Fn(&mut D, &DisplayHandle, &wl_surface::WlSurface) + Send + Sync + 'static,
{
    let erased: Box<PostCommitHook> = Box::new(move |state, dh, surface| {
        hook(downcast_state::<D>(state), dh, surface)
    });
    let hook = Hook::new(std::sync::Arc::from(erased));
    let id = hook.id;
    surface_data(surface).post_commit_hooks.lock().unwrap().push(hook);
    id
}

/// Register a hook to run when a surface is destroyed.
pub fn add_destruction_hook<D, F>(surface: &wl_surface::WlSurface, hook: F) -> HookId
where
    D: 'static,
    F: Fn(&mut D, &wl_surface::WlSurface) + Send + Sync + 'static,
{
    let erased: Box<DestructionHook> = Box::new(move |state, surface| hook(downcast_state::<D>(state), surface));
    let hook = Hook::new(std::sync::Arc::from(erased));
    let id = hook.id;
    surface_data(surface).destruction_hooks.lock().unwrap().push(hook);
    id
}

/// Remove a previously registered hook of any kind.
pub fn remove_hook(surface: &wl_surface::WlSurface, id: HookId) {
    let data = surface_data(surface);
    data.pre_commit_hooks.lock().unwrap().retain(|h| h.id != id);
    data.post_commit_hooks.lock().unwrap().retain(|h| h.id != id);
    data.destruction_hooks.lock().unwrap().retain(|h| h.id != id);
}

fn downcast_state<D: 'static>(state: &mut dyn Any) -> &mut D {
    state
        .downcast_mut::<D>()
        .expect("compositor hook invoked with the wrong state type")
}

pub(crate) fn run_pre_commit_hooks<D: 'static>(
    state: &mut D,
    dh: &DisplayHandle,
    surface: &wl_surface::WlSurface,
) {
    // Snapshot just the callbacks, not the `Hook`s themselves: dropping a cloned `Hook`
    // would free its id while the original (still stored) `Hook` keeps using it.
    let hooks: Vec<_> = surface_data(surface)
        .pre_commit_hooks
        .lock()
        .unwrap()
        .iter()
        .map(|hook| hook.cb.clone())
        .collect();
    for cb in hooks {
        cb(state as &mut dyn Any, dh, surface);
    }
}

pub(crate) fn run_post_commit_hooks<D: 'static>(
    state: &mut D,
    dh: &DisplayHandle,
    surface: &wl_surface::WlSurface,
) {
    let hooks: Vec<_> = surface_data(surface)
        .post_commit_hooks
        .lock()
        .unwrap()
        .iter()
        .map(|hook| hook.cb.clone())
        .collect();
    for cb in hooks {
        cb(state as &mut dyn Any, dh, surface);
    }
}

pub(crate) fn run_destruction_hooks<D: 'static>(state: &mut D, surface: &wl_surface::WlSurface) {
    let hooks: Vec<_> = surface_data(surface)
        .destruction_hooks
        .lock()
        .unwrap()
        .iter()
        .map(|hook| hook.cb.clone())
        .collect();
    for cb in hooks {
        cb(state as &mut dyn Any, surface);
    }
    surface_data(surface).alive_tracker.destroy_notify();
}

/// A trait implemented by the embedding compositor state to receive compositor-level
/// events: currently only the notification that a surface has finished committing.
pub trait CompositorHandler {
    /// Access the [`CompositorState`] stored in the embedding compositor state.
    fn compositor_state(&mut self) -> &mut CompositorState;

    /// Called after a surface's pending state has been committed and all post-commit
    /// hooks (such as the xdg-shell configure/ack bookkeeping) have run.
    fn commit(&mut self, surface: &wl_surface::WlSurface);
}

/// The state of the `wl_compositor` global.
#[derive(Debug)]
pub struct CompositorState {
    compositor_global: GlobalId,
}

impl CompositorState {
    /// Create new `wl_compositor` and `wl_region` globals.
    pub fn new<D>(display: &DisplayHandle) -> Self
    where
        D: GlobalDispatch<wl_compositor::WlCompositor, ()>
            + wayland_server::Dispatch<wl_compositor::WlCompositor, ()>
            + wayland_server::Dispatch<wl_region::WlRegion, ()>
            + wayland_server::Dispatch<wl_surface::WlSurface, SurfaceData>
            + CompositorHandler
            + 'static,
    {
        let compositor_global = display.create_global::<D, wl_compositor::WlCompositor, _>(COMPOSITOR_VERSION, ());
        Self { compositor_global }
    }

    /// The id of the `wl_compositor` global, should you need to remove it.
    pub fn global(&self) -> GlobalId {
        self.compositor_global.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_assignment_is_one_shot() {
        let data = SurfaceData::default();
        assert!(data.role.lock().unwrap().is_none());
        *data.role.lock().unwrap() = Some("xdg_toplevel");
        assert_eq!(*data.role.lock().unwrap(), Some("xdg_toplevel"));
    }
}
