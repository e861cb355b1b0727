//! Colormap requests
//!
//! Every screen keeps its own copy of a colormap. Allocations run on all of
//! them and the client sees screen 0's answer, which is what pixel values in
//! later drawing requests refer to.

use super::core;
use crate::protocol::*;
use crate::resources::{KindData, ResourceKind};
use crate::security::{Access, ClientId};
use crate::server::Server;

impl Server {
    pub(crate) fn create_colormap(
        &mut self,
        client: ClientId,
        req: &CreateColormapRequest,
    ) -> X11Result<Option<Reply>> {
        let window = self.resolve(client, req.window.id(), ResourceKind::Window, Access::GetAttr)?;
        let visuals = self.visuals_for(req.visual)?;

        self.create_composite(
            client,
            core(RequestOpcode::CreateColormap),
            req.mid.id(),
            KindData::Colormap,
            *req,
            Request::CreateColormap,
            |req, screen, mid| {
                req.mid = Colormap(mid);
                req.window = Window(window.physical_on(screen)?);
                req.visual = visuals[screen.0];
                Ok(())
            },
        )
    }

    pub(crate) fn free_colormap(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.id, ResourceKind::Colormap, Access::Destroy)?;
        self.fan_out_destroy(
            core(RequestOpcode::FreeColormap),
            &cmap,
            *req,
            Request::FreeColormap,
            |req, screen| {
                req.id = cmap.physical_on(screen)?;
                Ok(())
            },
        )
    }

    pub(crate) fn copy_colormap_and_free(
        &mut self,
        client: ClientId,
        req: &CopyColormapAndFreeRequest,
    ) -> X11Result<Option<Reply>> {
        let src = self.resolve(client, req.src_cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.create_composite(
            client,
            core(RequestOpcode::CopyColormapAndFree),
            req.mid.id(),
            KindData::Colormap,
            *req,
            Request::CopyColormapAndFree,
            |req, screen, mid| {
                req.mid = Colormap(mid);
                req.src_cmap = Colormap(src.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn install_colormap(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.colormap_fanout(client, RequestOpcode::InstallColormap, req, Request::InstallColormap)
    }

    pub(crate) fn uninstall_colormap(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        self.colormap_fanout(
            client,
            RequestOpcode::UninstallColormap,
            req,
            Request::UninstallColormap,
        )
    }

    fn colormap_fanout(
        &mut self,
        client: ClientId,
        op: RequestOpcode,
        req: &ResourceRequest,
        wrap: fn(ResourceRequest) -> Request,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.id, ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(core(op), &cmap, *req, wrap, |req, screen| {
            req.id = cmap.physical_on(screen)?;
            Ok(())
        })
    }

    pub(crate) fn alloc_color(
        &mut self,
        client: ClientId,
        req: &AllocColorRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::AllocColor),
            &cmap,
            *req,
            Request::AllocColor,
            |req, screen| {
                req.cmap = Colormap(cmap.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn alloc_named_color(
        &mut self,
        client: ClientId,
        req: &AllocNamedColorRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::AllocNamedColor),
            &cmap,
            req.clone(),
            Request::AllocNamedColor,
            |req, screen| {
                req.cmap = Colormap(cmap.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn alloc_color_cells(
        &mut self,
        client: ClientId,
        req: &AllocColorCellsRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::AllocColorCells),
            &cmap,
            *req,
            Request::AllocColorCells,
            |req, screen| {
                req.cmap = Colormap(cmap.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn alloc_color_planes(
        &mut self,
        client: ClientId,
        req: &AllocColorPlanesRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::AllocColorPlanes),
            &cmap,
            *req,
            Request::AllocColorPlanes,
            |req, screen| {
                req.cmap = Colormap(cmap.physical_on(screen)?);
                Ok(())
            },
        )
    }

    /// Runs on every screen even after one fails; the first error is reported
    pub(crate) fn free_colors(
        &mut self,
        client: ClientId,
        req: &FreeColorsRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::FreeColors),
            &cmap,
            req.clone(),
            Request::FreeColors,
            |req, screen| {
                req.cmap = Colormap(cmap.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn store_colors(
        &mut self,
        client: ClientId,
        req: &StoreColorsRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::StoreColors),
            &cmap,
            req.clone(),
            Request::StoreColors,
            |req, screen| {
                req.cmap = Colormap(cmap.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn store_named_color(
        &mut self,
        client: ClientId,
        req: &StoreNamedColorRequest,
    ) -> X11Result<Option<Reply>> {
        let cmap = self.resolve(client, req.cmap.id(), ResourceKind::Colormap, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::StoreNamedColor),
            &cmap,
            req.clone(),
            Request::StoreNamedColor,
            |req, screen| {
                req.cmap = Colormap(cmap.physical_on(screen)?);
                Ok(())
            },
        )
    }
}
