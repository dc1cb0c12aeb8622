//! Page surface collaborator
//!
//! The scene graph that renders pages is external. Each page controller owns
//! one [`PageSurface`], which receives the bend force and spatial transform
//! derived from the page's flip progress and pushes them into vertex data on
//! [`PageSurface::apply`].

use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;

/// Opaque handle to a page's scene object
///
/// Used only for bookkeeping and log fields; the reader never inspects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

/// Rotation and depth of a page, derived from its flip progress
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpatialState {
    /// Rotation about the spine, 0 (unflipped) to π (flipped)
    pub rotation_y: f64,
    /// Depth offset along the viewing axis
    pub position_z: f64,
}

impl SpatialState {
    /// Compute the transform for page `index` of `total` at `progress`
    ///
    /// Unflipped, page 0 sits on top of the stack at depth 0 and later pages
    /// sit `depth_offset` further back each. Flipped, the order reverses: the
    /// last page turned is on top.
    pub fn from_progress(progress: f64, index: usize, total: usize, depth_offset: f64) -> Self {
        let progress = progress.clamp(0.0, 1.0);
        let unflipped_z = -(index as f64) * depth_offset;
        let flipped_z = -(total.saturating_sub(index + 1) as f64) * depth_offset;
        Self {
            rotation_y: progress.min(1.0) * PI,
            position_z: unflipped_z + (flipped_z - unflipped_z) * progress,
        }
    }
}

/// Bend force for a page at `progress`
///
/// Peaks mid-turn and vanishes at both ends. Forward flips bend with a
/// positive force, backward flips with a negative one.
pub fn bend_force(progress: f64, is_forward: bool, damping: f64) -> f64 {
    let magnitude = (progress.clamp(0.0, 1.0) * PI).sin() * damping;
    if is_forward {
        magnitude
    } else {
        -magnitude
    }
}

/// A page mesh with a bend modifier, owned by one page controller
pub trait PageSurface {
    /// Identity of the underlying scene object
    fn mesh(&self) -> MeshHandle;

    /// Set the bend modifier's force
    fn set_bend_force(&mut self, force: f64);

    /// Set the page's rotation and depth
    fn set_transform(&mut self, state: SpatialState);

    /// Push the current force and transform into the mesh
    fn apply(&mut self);
}

/// Everything a [`HeadlessSurface`] has been told
#[derive(Clone, Debug, Default)]
pub struct SurfaceLog {
    pub force: f64,
    pub transform: SpatialState,
    /// Number of `apply` calls
    pub applies: usize,
    /// Force and transform at each `apply`
    pub applied: Vec<(f64, SpatialState)>,
}

/// A surface with no renderer behind it
///
/// Records what it receives into a shared [`SurfaceLog`], so hosts without a
/// scene graph (servers, tests, the headless example) can still drive and
/// observe a book.
#[derive(Clone, Debug)]
pub struct HeadlessSurface {
    mesh: MeshHandle,
    log: Rc<RefCell<SurfaceLog>>,
}

impl HeadlessSurface {
    pub fn new(mesh: MeshHandle) -> Self {
        Self {
            mesh,
            log: Rc::new(RefCell::new(SurfaceLog::default())),
        }
    }

    /// Shared view of what this surface has recorded
    pub fn log(&self) -> Rc<RefCell<SurfaceLog>> {
        Rc::clone(&self.log)
    }
}

impl PageSurface for HeadlessSurface {
    fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    fn set_bend_force(&mut self, force: f64) {
        self.log.borrow_mut().force = force;
    }

    fn set_transform(&mut self, state: SpatialState) {
        self.log.borrow_mut().transform = state;
    }

    fn apply(&mut self) {
        let mut log = self.log.borrow_mut();
        log.applies += 1;
        let entry = (log.force, log.transform);
        log.applied.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn test_bend_force_shape() {
        assert!(bend_force(0.0, true, 0.88).abs() < TOLERANCE);
        assert!(bend_force(1.0, true, 0.88).abs() < 1e-9);
        assert!((bend_force(0.5, true, 0.88) - 0.88).abs() < TOLERANCE);
        assert!((bend_force(0.5, false, 0.88) + 0.88).abs() < TOLERANCE);
    }

    #[test]
    fn test_spatial_state_endpoints() {
        let flat = SpatialState::from_progress(0.0, 1, 5, 0.01);
        assert_eq!(flat.rotation_y, 0.0);
        assert!((flat.position_z + 0.01).abs() < TOLERANCE);

        let turned = SpatialState::from_progress(1.0, 1, 5, 0.01);
        assert!((turned.rotation_y - PI).abs() < TOLERANCE);
        assert!((turned.position_z + 0.03).abs() < TOLERANCE);
    }

    #[test]
    fn test_spatial_state_interpolates_depth() {
        let half = SpatialState::from_progress(0.5, 0, 3, 0.01);
        assert!((half.rotation_y - PI / 2.0).abs() < TOLERANCE);
        assert!((half.position_z + 0.01).abs() < TOLERANCE);
    }

    #[test]
    fn test_spatial_state_clamps_progress() {
        let over = SpatialState::from_progress(1.7, 0, 2, 0.01);
        assert!((over.rotation_y - PI).abs() < TOLERANCE);
    }

    #[test]
    fn test_headless_surface_records_applies() {
        let mut surface = HeadlessSurface::new(MeshHandle(7));
        let log = surface.log();

        surface.set_bend_force(0.4);
        surface.set_transform(SpatialState {
            rotation_y: 1.0,
            position_z: -0.5,
        });
        surface.apply();

        let log = log.borrow();
        assert_eq!(surface.mesh(), MeshHandle(7));
        assert_eq!(log.applies, 1);
        assert_eq!(log.applied[0].0, 0.4);
        assert_eq!(log.applied[0].1.position_z, -0.5);
    }
}
