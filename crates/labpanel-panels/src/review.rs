//! Reference review session of the camera panel.
//!
//! Edits a working copy of the camera references. Nothing reaches the camera
//! panel until [`ReviewSession::save`].

use labpanel_core::error::UserError;
use labpanel_core::reference::{Reference, ReferenceStore};

use crate::camera::{CameraPanel, View};

const PENDING: &str = "Reference modified";

/// Coordinate of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    X,
    Y,
    H,
    V,
}

/// Review dialog state.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    working: ReferenceStore,
    view: View,
    attribute: Option<String>,
    modified: bool,
}

impl ReviewSession {
    /// Start reviewing the reference of the attribute shown in `view`.
    pub fn open(camera: &CameraPanel, view: View) -> Self {
        Self {
            working: camera.references().clone(),
            view,
            attribute: camera.selected(view).map(str::to_string),
            modified: false,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Working reference of the current attribute.
    pub fn reference(&self) -> Option<Reference> {
        self.working.get(self.attribute.as_deref()?)
    }

    fn pending() -> UserError {
        UserError::new(PENDING, "The reference was modified. Save or reset it first")
    }

    /// Review another view. Refused while the current reference has
    /// unsaved changes.
    pub fn select_view(&mut self, camera: &CameraPanel, view: View) -> Result<(), UserError> {
        if self.modified {
            return Err(Self::pending());
        }
        self.view = view;
        self.attribute = camera.selected(view).map(str::to_string);
        Ok(())
    }

    /// Set one coordinate, creating a zero reference when none exists.
    pub fn set(&mut self, coordinate: Coordinate, value: f64) {
        let Some(attr) = self.attribute.clone() else {
            return;
        };
        let mut r = self.working.get(&attr).unwrap_or_default();
        match coordinate {
            Coordinate::X => r.x = value,
            Coordinate::Y => r.y = value,
            Coordinate::H => r.h = value,
            Coordinate::V => r.v = value,
        }
        self.working.set(&attr, Some(r));
        self.modified = true;
    }

    /// Take x and y from the last centroid of the reviewed attribute.
    pub fn set_from_centroid(&mut self, camera: &CameraPanel) -> Result<(), UserError> {
        let c = self.tracked_centroid(camera).ok_or_else(|| {
            UserError::new("Cannot get centroid", "To set reference to centroid tracking must be on")
        })?;
        self.set(Coordinate::X, c.x);
        self.set(Coordinate::Y, c.y);
        Ok(())
    }

    /// Take all four values from the last fitted ellipse.
    pub fn set_from_gauss(&mut self, camera: &CameraPanel) -> Result<(), UserError> {
        let c = self.tracked_centroid(camera).ok_or_else(|| {
            UserError::new("Cannot get fit", "To set reference to gauss fit tracking must be on")
        })?;
        self.set(Coordinate::X, c.ellipse.x);
        self.set(Coordinate::Y, c.ellipse.y);
        self.set(Coordinate::H, c.ellipse.width);
        self.set(Coordinate::V, c.ellipse.height);
        Ok(())
    }

    fn tracked_centroid(&self, camera: &CameraPanel) -> Option<labpanel_analysis::Centroid> {
        let attr = self.attribute.as_deref()?;
        if !camera.is_tracked(attr) {
            return None;
        }
        camera.last_centroid(attr)
    }

    /// Copy the working reference to the camera and persist the references.
    pub fn save(&mut self, camera: &mut CameraPanel) -> Result<(), UserError> {
        if let (true, Some(attr)) = (self.modified, self.attribute.as_deref()) {
            camera.set_reference(attr, self.working.get(attr));
            tracing::info!(attribute = attr, "Reference saved");
        }
        self.modified = false;
        camera.save_references()
    }

    /// Drop the working changes of the current attribute.
    pub fn reset(&mut self, camera: &CameraPanel) {
        if let Some(attr) = self.attribute.as_deref() {
            self.working.set(attr, camera.references().get(attr));
        }
        self.modified = false;
    }

    /// Finish the session. Refused while changes are pending.
    pub fn close(self) -> Result<(), (Self, UserError)> {
        if self.modified {
            return Err((self, Self::pending()));
        }
        Ok(())
    }
}
