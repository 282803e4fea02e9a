use std::sync::Arc;

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use shared::{
    domain::{EnvironmentId, ZoneId},
    geometry::{ResizeHandle, ZoneRect, MIN_ZONE_SIZE},
    protocol::Zone,
};
use thiserror::Error;
use tracing::debug;

use crate::{
    gesture::{ActiveGesture, GestureKind, GestureSnapshot, NoopPointerCapture, PointerCapture},
    mapper::{CoordinateMapper, Point, RenderedRect},
    palette,
};

/// Grab distance around a resize handle, in rendered pixels.
pub const HANDLE_HIT_RADIUS: f64 = 8.0;
const DEFAULT_ZONE_SIZE: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("zone {0:?} does not exist in this editor")]
    UnknownZone(ZoneId),
    #[error("resize handles of zone {zone_id:?} are inactive because it is not selected")]
    HandleOnUnselectedZone { zone_id: ZoneId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ZonesLoaded,
    ZoneAdded(Zone),
    ZoneUpdated(Zone),
    ZoneRemoved(ZoneId),
    SelectionChanged(Option<ZoneId>),
    GestureEnded { zone_id: ZoneId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Resize { zone_id: ZoneId, handle: ResizeHandle },
    Move { zone_id: ZoneId },
    Deselected,
}

/// Zone editing state for one environment image.
///
/// At most one zone is selected and at most one gesture is in progress.
/// Gestures always recompute geometry from the rectangle captured when the
/// pointer went down, so long drags do not accumulate rounding error.
pub struct ZoneEditor {
    environment_id: EnvironmentId,
    zones: Vec<Zone>,
    selected: Option<ZoneId>,
    gesture: Option<ActiveGesture>,
    mapper: CoordinateMapper,
    capture: Arc<dyn PointerCapture>,
    subscribers: Vec<Sender<EditorEvent>>,
    next_provisional_id: i64,
    palette_cursor: usize,
    created_by: String,
    dirty: bool,
}

impl ZoneEditor {
    pub fn new(environment_id: EnvironmentId, mapper: CoordinateMapper) -> Self {
        Self::with_capture(environment_id, mapper, Arc::new(NoopPointerCapture))
    }

    pub fn with_capture(
        environment_id: EnvironmentId,
        mapper: CoordinateMapper,
        capture: Arc<dyn PointerCapture>,
    ) -> Self {
        Self {
            environment_id,
            zones: Vec::new(),
            selected: None,
            gesture: None,
            mapper,
            capture,
            subscribers: Vec::new(),
            next_provisional_id: -1,
            palette_cursor: 0,
            created_by: "admin".to_string(),
            dirty: false,
        }
    }

    pub fn set_created_by(&mut self, created_by: impl Into<String>) {
        self.created_by = created_by.into();
    }

    pub fn subscribe(&mut self) -> Receiver<EditorEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: EditorEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn environment_id(&self) -> EnvironmentId {
        self.environment_id
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, zone_id: ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.id == zone_id)
    }

    pub fn selected_zone_id(&self) -> Option<ZoneId> {
        self.selected
    }

    pub fn selected_zone(&self) -> Option<&Zone> {
        self.selected.and_then(|zone_id| self.zone(zone_id))
    }

    pub fn active_gesture(&self) -> Option<GestureSnapshot> {
        self.gesture.as_ref().map(ActiveGesture::snapshot)
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn mapper_mut(&mut self) -> &mut CoordinateMapper {
        &mut self.mapper
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replaces the working set with zones read from the catalog.
    pub fn load_zones(&mut self, zones: Vec<Zone>) {
        self.gesture = None;
        self.selected = None;
        self.zones = zones.into_iter().filter(|zone| zone.active).collect();
        let lowest = self.zones.iter().map(|zone| zone.id.0).min().unwrap_or(0);
        self.next_provisional_id = lowest.min(0) - 1;
        self.palette_cursor = self.zones.len();
        self.dirty = false;
        self.publish(EditorEvent::ZonesLoaded);
    }

    /// Adopts the catalog's copy after a save; provisional ids are replaced.
    pub fn mark_saved(&mut self, persisted: Vec<Zone>) {
        self.load_zones(persisted);
    }

    /// Overlays for drawing, in rendered coordinates and paint order.
    pub fn overlays(&self) -> Vec<(ZoneId, RenderedRect)> {
        self.zones
            .iter()
            .map(|zone| (zone.id, self.mapper.rect_to_rendered(&zone.rect)))
            .collect()
    }

    /// Topmost zone under a rendered pointer position.
    pub fn zone_at(&self, pointer: Point) -> Option<ZoneId> {
        self.zones
            .iter()
            .rev()
            .find(|zone| self.mapper.rect_to_rendered(&zone.rect).contains(pointer))
            .map(|zone| zone.id)
    }

    /// Resize handle of the selected zone under the pointer. The nearest
    /// handle wins; corners win ties against edges.
    pub fn handle_at(&self, pointer: Point) -> Option<ResizeHandle> {
        let zone = self.selected_zone()?;
        ResizeHandle::ALL
            .iter()
            .filter_map(|&handle| {
                let (x, y) = zone.rect.handle_point(handle);
                let distance = self.mapper.to_rendered(Point::new(x, y)).distance_to(pointer);
                (distance <= HANDLE_HIT_RADIUS).then_some((handle, distance))
            })
            .min_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then_with(|| b.0.is_corner().cmp(&a.0.is_corner()))
            })
            .map(|(handle, _)| handle)
    }

    /// Pointer-down on the canvas: resize if a handle of the selected zone is
    /// hit, otherwise move the zone under the pointer, otherwise deselect.
    pub fn press(&mut self, pointer: Point) -> Result<PressOutcome, EditorError> {
        if let (Some(zone_id), Some(handle)) = (self.selected, self.handle_at(pointer)) {
            self.on_handle_press(zone_id, handle, pointer)?;
            return Ok(PressOutcome::Resize { zone_id, handle });
        }
        if let Some(zone_id) = self.zone_at(pointer) {
            self.on_zone_press(zone_id, pointer)?;
            return Ok(PressOutcome::Move { zone_id });
        }
        self.deselect();
        Ok(PressOutcome::Deselected)
    }

    pub fn on_zone_press(&mut self, zone_id: ZoneId, pointer: Point) -> Result<(), EditorError> {
        let rect = self
            .zone(zone_id)
            .ok_or(EditorError::UnknownZone(zone_id))?
            .rect;
        self.begin_gesture(zone_id, GestureKind::Move, pointer, rect);
        if self.selected != Some(zone_id) {
            self.selected = Some(zone_id);
            self.publish(EditorEvent::SelectionChanged(Some(zone_id)));
        }
        Ok(())
    }

    pub fn on_handle_press(
        &mut self,
        zone_id: ZoneId,
        handle: ResizeHandle,
        pointer: Point,
    ) -> Result<(), EditorError> {
        if self.selected != Some(zone_id) {
            return Err(EditorError::HandleOnUnselectedZone { zone_id });
        }
        let rect = self
            .zone(zone_id)
            .ok_or(EditorError::UnknownZone(zone_id))?
            .rect;
        self.begin_gesture(zone_id, GestureKind::Resize(handle), pointer, rect);
        Ok(())
    }

    fn begin_gesture(
        &mut self,
        zone_id: ZoneId,
        kind: GestureKind,
        pointer: Point,
        rect: ZoneRect,
    ) {
        // The previous registration must be gone before a new one attaches.
        self.gesture = None;
        debug!(zone_id = zone_id.0, ?kind, "zone gesture started");
        self.gesture = Some(ActiveGesture::begin(
            Arc::clone(&self.capture),
            zone_id,
            kind,
            pointer,
            rect,
        ));
    }

    /// Applies the active gesture for the current pointer position and
    /// returns the zone if its geometry changed.
    pub fn on_pointer_move(&mut self, pointer: Point) -> Option<Zone> {
        let gesture = self.gesture.as_ref()?;
        let snapshot = gesture.snapshot();
        let (dx, dy) = self.mapper.delta_to_natural(snapshot.start_pointer, pointer);
        let mut rect = gesture.apply(dx, dy);
        if let Some((width, height)) = self.mapper.natural_bounds() {
            rect = clamp_to_image(rect, snapshot.kind, width, height);
        }

        let zone = self
            .zones
            .iter_mut()
            .find(|zone| zone.id == snapshot.zone_id)?;
        if zone.rect == rect {
            return None;
        }
        zone.rect = rect;
        let updated = zone.clone();
        self.dirty = true;
        self.publish(EditorEvent::ZoneUpdated(updated.clone()));
        Some(updated)
    }

    pub fn on_pointer_release(&mut self) {
        if let Some(gesture) = self.gesture.take() {
            let zone_id = gesture.snapshot().zone_id;
            drop(gesture);
            debug!(zone_id = zone_id.0, "zone gesture ended");
            self.publish(EditorEvent::GestureEnded { zone_id });
        }
    }

    /// Aborts the active gesture and puts the zone back where it started.
    pub fn cancel_gesture(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let snapshot = gesture.snapshot();
        drop(gesture);
        if let Some(zone) = self.zones.iter_mut().find(|zone| zone.id == snapshot.zone_id) {
            if zone.rect != snapshot.start_rect {
                zone.rect = snapshot.start_rect;
                let restored = zone.clone();
                self.publish(EditorEvent::ZoneUpdated(restored));
            }
        }
    }

    pub fn deselect(&mut self) {
        self.gesture = None;
        if self.selected.take().is_some() {
            self.publish(EditorEvent::SelectionChanged(None));
        }
    }

    /// Drops a new provisional zone with its top-left corner at a rendered
    /// position and selects it.
    pub fn add_zone(&mut self, name: impl Into<String>, at: Point) -> Zone {
        let origin = self.mapper.to_natural(at);
        let mut rect = ZoneRect::from_origin_size(
            origin.x.round() as i32,
            origin.y.round() as i32,
            DEFAULT_ZONE_SIZE,
            DEFAULT_ZONE_SIZE,
        );
        if let Some((width, height)) = self.mapper.natural_bounds() {
            rect = clamp_to_image(rect, GestureKind::Move, width, height);
        }

        let zone = Zone {
            id: ZoneId(self.next_provisional_id),
            environment_id: self.environment_id,
            name: name.into(),
            rect,
            color: palette::color_for(self.palette_cursor).to_string(),
            created_at: Some(Utc::now()),
            created_by: self.created_by.clone(),
            active: true,
        };
        self.next_provisional_id -= 1;
        self.palette_cursor += 1;
        self.zones.push(zone.clone());
        self.dirty = true;
        self.publish(EditorEvent::ZoneAdded(zone.clone()));

        self.gesture = None;
        self.selected = Some(zone.id);
        self.publish(EditorEvent::SelectionChanged(Some(zone.id)));
        zone
    }

    pub fn rename_zone(
        &mut self,
        zone_id: ZoneId,
        name: impl Into<String>,
    ) -> Result<(), EditorError> {
        let zone = self
            .zones
            .iter_mut()
            .find(|zone| zone.id == zone_id)
            .ok_or(EditorError::UnknownZone(zone_id))?;
        zone.name = name.into();
        let updated = zone.clone();
        self.dirty = true;
        self.publish(EditorEvent::ZoneUpdated(updated));
        Ok(())
    }

    pub fn delete_zone(&mut self, zone_id: ZoneId) -> Result<Zone, EditorError> {
        let index = self
            .zones
            .iter()
            .position(|zone| zone.id == zone_id)
            .ok_or(EditorError::UnknownZone(zone_id))?;
        if self.selected == Some(zone_id) {
            self.deselect();
        }
        let removed = self.zones.remove(index);
        self.dirty = true;
        self.publish(EditorEvent::ZoneRemoved(zone_id));
        Ok(removed)
    }

    pub fn delete_selected(&mut self) -> Option<Zone> {
        let zone_id = self.selected?;
        self.delete_zone(zone_id).ok()
    }
}

/// Keeps a rectangle inside the natural image. Moves shift the rectangle
/// back in without resizing; resizes stop the dragged edge at the image edge
/// but never below `MIN_ZONE_SIZE`.
fn clamp_to_image(rect: ZoneRect, kind: GestureKind, width: i32, height: i32) -> ZoneRect {
    match kind {
        GestureKind::Move => {
            let dx = if rect.width() <= width {
                -(rect.x1() - width).max(0)
            } else {
                0
            };
            let dy = if rect.height() <= height {
                -(rect.y1() - height).max(0)
            } else {
                0
            };
            rect.with_move(dx, dy)
        }
        GestureKind::Resize(handle) => {
            let mut x1 = rect.x1();
            let mut y1 = rect.y1();
            if handle.owns_right() && x1 > width {
                x1 = width.max(rect.x0() + MIN_ZONE_SIZE);
            }
            if handle.owns_bottom() && y1 > height {
                y1 = height.max(rect.y0() + MIN_ZONE_SIZE);
            }
            ZoneRect::from_corners(rect.x0(), rect.y0(), x1, y1)
        }
    }
}

#[cfg(test)]
#[path = "tests/editor_tests.rs"]
mod tests;
