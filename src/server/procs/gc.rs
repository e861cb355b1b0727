//! Graphics context requests

use super::{core, GC_ATTR_IDS};
use crate::protocol::*;
use crate::resources::{KindData, ResourceKind};
use crate::security::{Access, ClientId};
use crate::server::Server;

impl Server {
    pub(crate) fn create_gc(
        &mut self,
        client: ClientId,
        req: &CreateGCRequest,
    ) -> X11Result<Option<Reply>> {
        let drawable = self.resolve_drawable(client, req.drawable, Access::GetAttr)?;
        let attr_ids = self.resolve_attr_ids(client, &req.values, &GC_ATTR_IDS)?;

        self.create_composite(
            client,
            core(RequestOpcode::CreateGC),
            req.cid.id(),
            KindData::Gc,
            req.clone(),
            Request::CreateGC,
            |req, screen, cid| {
                req.cid = GContext(cid);
                req.drawable = drawable.physical_on(screen)?;
                attr_ids.apply(&mut req.values, screen);
                Ok(())
            },
        )
    }

    pub(crate) fn change_gc(
        &mut self,
        client: ClientId,
        req: &ChangeGCRequest,
    ) -> X11Result<Option<Reply>> {
        let gc = self.resolve(client, req.gc.id(), ResourceKind::Gc, Access::Write)?;
        let attr_ids = self.resolve_attr_ids(client, &req.values, &GC_ATTR_IDS)?;

        self.fan_out_on(
            core(RequestOpcode::ChangeGC),
            &gc,
            req.clone(),
            Request::ChangeGC,
            |req, screen| {
                req.gc = GContext(gc.physical_on(screen)?);
                attr_ids.apply(&mut req.values, screen);
                Ok(())
            },
        )
    }

    pub(crate) fn copy_gc(
        &mut self,
        client: ClientId,
        req: &CopyGCRequest,
    ) -> X11Result<Option<Reply>> {
        let src = self.resolve(client, req.src_gc.id(), ResourceKind::Gc, Access::GetAttr)?;
        let dst = self.resolve(client, req.dst_gc.id(), ResourceKind::Gc, Access::Write)?;

        self.fan_out_on(
            core(RequestOpcode::CopyGC),
            &dst,
            *req,
            Request::CopyGC,
            |req, screen| {
                req.src_gc = GContext(src.physical_on(screen)?);
                req.dst_gc = GContext(dst.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn set_dashes(
        &mut self,
        client: ClientId,
        req: &SetDashesRequest,
    ) -> X11Result<Option<Reply>> {
        let gc = self.resolve(client, req.gc.id(), ResourceKind::Gc, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::SetDashes),
            &gc,
            req.clone(),
            Request::SetDashes,
            |req, screen| {
                req.gc = GContext(gc.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn set_clip_rectangles(
        &mut self,
        client: ClientId,
        req: &SetClipRectanglesRequest,
    ) -> X11Result<Option<Reply>> {
        let gc = self.resolve(client, req.gc.id(), ResourceKind::Gc, Access::Write)?;
        self.fan_out_on(
            core(RequestOpcode::SetClipRectangles),
            &gc,
            req.clone(),
            Request::SetClipRectangles,
            |req, screen| {
                req.gc = GContext(gc.physical_on(screen)?);
                Ok(())
            },
        )
    }

    pub(crate) fn free_gc(
        &mut self,
        client: ClientId,
        req: &ResourceRequest,
    ) -> X11Result<Option<Reply>> {
        let gc = self.resolve(client, req.id, ResourceKind::Gc, Access::Destroy)?;
        self.fan_out_destroy(
            core(RequestOpcode::FreeGC),
            &gc,
            *req,
            Request::FreeGC,
            |req, screen| {
                req.id = gc.physical_on(screen)?;
                Ok(())
            },
        )
    }
}
