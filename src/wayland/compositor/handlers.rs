use wayland_server::{
    protocol::{wl_compositor, wl_region, wl_surface},
    DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use super::{
    run_destruction_hooks, run_post_commit_hooks, run_pre_commit_hooks, BufferAssignment, CompositorHandler,
    SurfaceData,
};

impl<D> GlobalDispatch<wl_compositor::WlCompositor, (), D> for D
where
    D: GlobalDispatch<wl_compositor::WlCompositor, ()>
        + Dispatch<wl_compositor::WlCompositor, ()>
        + Dispatch<wl_region::WlRegion, ()>
        + Dispatch<wl_surface::WlSurface, SurfaceData>
        + CompositorHandler
        + 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &wayland_server::Client,
        resource: New<wl_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }
}

impl<D> Dispatch<wl_compositor::WlCompositor, (), D> for D
where
    D: Dispatch<wl_surface::WlSurface, SurfaceData> + Dispatch<wl_region::WlRegion, ()> + CompositorHandler,
{
    fn request(
        _state: &mut D,
        _client: &wayland_server::Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                data_init.init(id, SurfaceData::default());
            }
            wl_compositor::Request::CreateRegion { id } => {
                data_init.init(id, ());
            }
            _ => unreachable!(),
        }
    }
}

impl<D> Dispatch<wl_region::WlRegion, ()> for D
where
    D: CompositorHandler,
{
    fn request(
        _state: &mut D,
        _client: &wayland_server::Client,
        _resource: &wl_region::WlRegion,
        request: wl_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        // Regions are purely advisory input/opaque-area hints; this crate does not
        // track damage or input regions, so the requests are accepted and ignored.
        match request {
            wl_region::Request::Add { .. } | wl_region::Request::Subtract { .. } | wl_region::Request::Destroy => {}
            _ => unreachable!(),
        }
    }
}

impl<D> Dispatch<wl_surface::WlSurface, SurfaceData, D> for D
where
    D: CompositorHandler + 'static,
{
    fn request(
        state: &mut D,
        _client: &wayland_server::Client,
        resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        data: &SurfaceData,
        dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_surface::Request::Commit => {
                run_pre_commit_hooks(state, dhandle, resource);
                data.cached_state.commit(dhandle);
                run_post_commit_hooks(state, dhandle, resource);
                state.commit(resource);
            }
            wl_surface::Request::Attach { buffer, .. } => {
                *data.cached_state.pending::<BufferAssignment>() = BufferAssignment {
                    attached: buffer.is_some(),
                };
            }
            wl_surface::Request::Destroy => {}
            // Damage and opaque/input region hints, scale/transform: this crate does not
            // render, so these requests are acknowledged but not acted on beyond what the
            // xdg-shell role extension itself tracks through the cached state.
            _ => {}
        }
    }

    fn destroyed(state: &mut D, _client: wayland_server::backend::ClientId, resource: &wl_surface::WlSurface) {
        run_destruction_hooks(state, resource);
    }
}
